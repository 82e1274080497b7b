use super::{ChainDocument, LedgerChain};
use crate::blockchain::{now_millis, AttendanceCounters, Block, Chain, ChainKind, ChainMetadata};
use crate::error::{LedgerError, Result};
use crate::transaction::{EventKind, Transaction};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Whether recording an event requires prior enrollment
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EnrollmentPolicy {
    /// An event naming a group needs enrollment in that group; an event
    /// without a group needs at least one enrollment.
    #[default]
    Enforced,
    Permissive,
}

/// One recorded event as seen by history views
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AttendanceRecord {
    pub block_index: u64,
    pub date: NaiveDate,
    pub kind: EventKind,
    pub recorded_by: String,
    pub group_id: Option<String>,
    pub recorded_at: u64,
    pub hash: String,
    pub prev_hash: String,
    pub nonce: u64,
}

impl AttendanceRecord {
    fn from_block(block: &Block) -> Option<Self> {
        match block.payload() {
            Transaction::EventRecorded {
                kind,
                date,
                recorded_by,
                group_id,
            } => Some(AttendanceRecord {
                block_index: block.index(),
                date: *date,
                kind: *kind,
                recorded_by: recorded_by.clone(),
                group_id: group_id.clone(),
                recorded_at: block.created_at(),
                hash: block.hash().to_string(),
                prev_hash: block.prev_hash().to_string(),
                nonce: block.nonce(),
            }),
            _ => None,
        }
    }
}

/// An individual member. Parented to a group, or directly to a unit when
/// unassigned. Also carries the member's enrollment set and event log.
#[derive(Debug, Clone, PartialEq)]
pub struct MemberChain {
    chain: Chain,
    metadata: ChainMetadata,
    unit_id: String,
    group_id: Option<String>,
    parent_hash: String,
    enrolled: BTreeSet<String>,
    counters: AttendanceCounters,
}

impl MemberChain {
    pub fn new(
        member_id: &str,
        name: &str,
        unit_id: &str,
        group_id: Option<&str>,
        parent_hash: &str,
        difficulty: u32,
    ) -> Result<Self> {
        let chain = Chain::open(ChainKind::Member, member_id, name, difficulty, parent_hash)?;
        Ok(MemberChain {
            chain,
            metadata: ChainMetadata::new(now_millis()),
            unit_id: unit_id.to_string(),
            group_id: group_id.map(str::to_string),
            parent_hash: parent_hash.to_string(),
            enrolled: BTreeSet::new(),
            counters: AttendanceCounters::default(),
        })
    }

    pub fn from_document(doc: ChainDocument) -> Result<Self> {
        doc.expect_kind(ChainKind::Member)?;
        let unit_id = doc.require(&doc.unit_id, "unitId")?.to_string();
        let parent_hash = doc.require(&doc.parent_hash, "parentHash")?.to_string();
        Ok(MemberChain {
            chain: doc.to_chain(),
            metadata: doc.to_metadata(),
            unit_id,
            group_id: doc.group_id.clone(),
            parent_hash,
            enrolled: doc.enrolled_groups.iter().cloned().collect(),
            counters: doc.metadata.counters.unwrap_or_default(),
        })
    }

    /// Append an `Enrolled` block unless already enrolled. Returns whether a
    /// block was appended.
    pub fn enroll(&mut self, group_id: &str) -> Result<bool> {
        if !self.is_active() {
            return Err(LedgerError::inactive(ChainKind::Member, self.subject_id(), "enroll"));
        }
        if self.enrolled.contains(group_id) {
            return Ok(false);
        }

        self.chain.append(Transaction::Enrolled {
            target_id: group_id.to_string(),
        })?;
        self.enrolled.insert(group_id.to_string());
        Ok(true)
    }

    /// Validate `kind`, append an `EventRecorded` block and bump the
    /// matching counter.
    pub fn record_event(
        &mut self,
        kind: &str,
        date: NaiveDate,
        recorded_by: &str,
        group_id: Option<&str>,
        policy: EnrollmentPolicy,
    ) -> Result<Block> {
        if !self.is_active() {
            return Err(LedgerError::inactive(ChainKind::Member, self.subject_id(), "record events for"));
        }
        let kind: EventKind = kind.parse()?;

        if policy == EnrollmentPolicy::Enforced {
            let enrolled = match group_id {
                Some(group) => self.enrolled.contains(group),
                None => !self.enrolled.is_empty(),
            };
            if !enrolled {
                return Err(LedgerError::NotEnrolled {
                    member: self.subject_id().to_string(),
                    group: group_id.map(str::to_string),
                });
            }
        }

        let block = self
            .chain
            .append(Transaction::EventRecorded {
                kind,
                date,
                recorded_by: recorded_by.to_string(),
                group_id: group_id.map(str::to_string),
            })?
            .clone();
        self.counters.record(kind);
        Ok(block)
    }

    /// Most recent event recorded for `date`
    pub fn status_on(&self, date: NaiveDate) -> Option<AttendanceRecord> {
        self.latest_event(|record| record.date == date)
    }

    /// Most recent event for `date` that applies to `group`; events recorded
    /// without a group apply to every group.
    pub fn status_on_in_group(&self, date: NaiveDate, group: &str) -> Option<AttendanceRecord> {
        self.latest_event(|record| {
            record.date == date && record.group_id.as_deref().map_or(true, |g| g == group)
        })
    }

    fn latest_event(&self, predicate: impl Fn(&AttendanceRecord) -> bool) -> Option<AttendanceRecord> {
        self.chain
            .blocks()
            .iter()
            .rev()
            .filter_map(AttendanceRecord::from_block)
            .find(|record| predicate(record))
    }

    pub fn attendance_history(&self) -> Vec<AttendanceRecord> {
        self.chain
            .blocks()
            .iter()
            .filter_map(AttendanceRecord::from_block)
            .collect()
    }

    /// Present share in percent, 0 when nothing was recorded
    pub fn attendance_percentage(&self) -> f64 {
        self.counters.percentage()
    }

    pub fn counters(&self) -> AttendanceCounters {
        self.counters
    }

    pub fn enrolled_groups(&self) -> &BTreeSet<String> {
        &self.enrolled
    }

    pub fn is_enrolled(&self, group_id: &str) -> bool {
        self.enrolled.contains(group_id)
    }

    pub fn unit_id(&self) -> &str {
        &self.unit_id
    }

    pub fn group_id(&self) -> Option<&str> {
        self.group_id.as_deref()
    }

    /// Replay the log and report where the stored enrollment set or counters
    /// disagree with it.
    pub fn derived_state_drift(&self) -> Vec<String> {
        let mut enrolled = BTreeSet::new();
        let mut counters = AttendanceCounters::default();
        for block in self.chain.blocks() {
            match block.payload() {
                Transaction::Enrolled { target_id } => {
                    enrolled.insert(target_id.clone());
                }
                Transaction::EventRecorded { kind, .. } => counters.record(*kind),
                _ => {}
            }
        }

        let mut drift = Vec::new();
        if enrolled != self.enrolled {
            drift.push(format!(
                "enrolled groups {:?} do not match log {:?}",
                self.enrolled, enrolled
            ));
        }
        if counters != self.counters {
            drift.push(format!(
                "counters {:?} do not match log {:?}",
                self.counters, counters
            ));
        }
        drift
    }
}

impl LedgerChain for MemberChain {
    const KIND: ChainKind = ChainKind::Member;

    fn chain(&self) -> &Chain {
        &self.chain
    }

    fn chain_mut(&mut self) -> &mut Chain {
        &mut self.chain
    }

    fn metadata(&self) -> &ChainMetadata {
        &self.metadata
    }

    fn metadata_mut(&mut self) -> &mut ChainMetadata {
        &mut self.metadata
    }

    fn parent_hash(&self) -> Option<&str> {
        Some(&self.parent_hash)
    }

    fn parent_id(&self) -> Option<&str> {
        Some(self.group_id.as_deref().unwrap_or(&self.unit_id))
    }

    fn to_document(&self) -> ChainDocument {
        let mut doc = ChainDocument::from_chain(&self.chain, &self.metadata);
        doc.parent_hash = Some(self.parent_hash.clone());
        doc.unit_id = Some(self.unit_id.clone());
        doc.group_id = self.group_id.clone();
        doc.enrolled_groups = self.enrolled.iter().cloned().collect();
        doc.metadata.counters = Some(self.counters);
        doc
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transaction::Profile;

    fn date(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 9, day).unwrap()
    }

    fn test_member() -> MemberChain {
        let mut member = MemberChain::new("M1", "Ada", "U1", Some("G1"), "00aa", 1).unwrap();
        member
            .record_creation(Profile::new("Ada").with_field("rollNumber", "CS-001"))
            .unwrap();
        member
    }

    fn events_in(member: &MemberChain) -> usize {
        member
            .chain()
            .blocks()
            .iter()
            .filter(|b| matches!(b.payload(), Transaction::EventRecorded { .. }))
            .count()
    }

    #[test]
    fn test_enroll_is_idempotent() {
        let mut member = test_member();
        assert!(member.enroll("G1").unwrap());
        assert!(!member.enroll("G1").unwrap());

        let enrolled_blocks = member
            .chain()
            .blocks()
            .iter()
            .filter(|b| matches!(b.payload(), Transaction::Enrolled { .. }))
            .count();
        assert_eq!(enrolled_blocks, 1);
        assert_eq!(member.enrolled_groups().len(), 1);
        assert!(member.is_valid());
    }

    #[test]
    fn test_created_payload_carries_no_enrollment() {
        let mut member = test_member();
        member.enroll("G1").unwrap();
        match member.chain().block_at(1).unwrap().payload() {
            Transaction::Created { profile } => assert!(!profile.fields.contains_key("enrolledGroups")),
            other => panic!("Expected Created payload, got {:?}", other),
        }
    }

    #[test]
    fn test_record_event_rejects_unknown_kind() {
        let mut member = test_member();
        member.enroll("G1").unwrap();
        let before = member.chain().len();

        let result = member.record_event("Late", date(2), "admin", Some("G1"), EnrollmentPolicy::Enforced);
        assert_eq!(result, Err(LedgerError::InvalidEventKind("Late".to_string())));
        assert_eq!(member.chain().len(), before);
        assert_eq!(member.counters().total(), 0);
    }

    #[test]
    fn test_record_event_requires_enrollment_when_enforced() {
        let mut member = test_member();

        let result = member.record_event("Present", date(2), "admin", Some("G1"), EnrollmentPolicy::Enforced);
        assert!(matches!(result, Err(LedgerError::NotEnrolled { .. })));
        let result = member.record_event("Present", date(2), "admin", None, EnrollmentPolicy::Enforced);
        assert!(matches!(result, Err(LedgerError::NotEnrolled { group: None, .. })));
        assert_eq!(events_in(&member), 0);

        member
            .record_event("Present", date(2), "admin", None, EnrollmentPolicy::Permissive)
            .unwrap();
        assert_eq!(events_in(&member), 1);
    }

    #[test]
    fn test_counters_follow_events() {
        let mut member = test_member();
        member.enroll("G1").unwrap();
        for (kind, day) in [("Present", 2), ("Present", 3), ("Absent", 4), ("Leave", 5)] {
            member
                .record_event(kind, date(day), "admin", Some("G1"), EnrollmentPolicy::Enforced)
                .unwrap();
        }

        let counters = member.counters();
        assert_eq!((counters.present, counters.absent, counters.leave), (2, 1, 1));
        assert_eq!(member.attendance_percentage(), 50.0);
        assert_eq!(member.attendance_history().len(), 4);
        assert!(member.derived_state_drift().is_empty());
        assert!(member.is_valid());
    }

    #[test]
    fn test_percentage_without_events_is_zero() {
        let member = test_member();
        assert_eq!(member.attendance_percentage(), 0.0);
    }

    #[test]
    fn test_most_recent_event_for_date_wins() {
        let mut member = test_member();
        member.enroll("G1").unwrap();
        member
            .record_event("Absent", date(2), "instructor", Some("G1"), EnrollmentPolicy::Enforced)
            .unwrap();
        member
            .record_event("Present", date(3), "instructor", Some("G1"), EnrollmentPolicy::Enforced)
            .unwrap();
        member
            .record_event("Leave", date(2), "office", Some("G1"), EnrollmentPolicy::Enforced)
            .unwrap();

        // Both events for the 2nd stay in the log
        assert_eq!(member.attendance_history().len(), 3);
        let status = member.status_on(date(2)).unwrap();
        assert_eq!(status.kind, EventKind::Leave);
        assert_eq!(status.recorded_by, "office");
        assert!(member.status_on(date(9)).is_none());
    }

    #[test]
    fn test_status_in_group_filters_other_groups() {
        let mut member = test_member();
        member.enroll("G1").unwrap();
        member.enroll("G2").unwrap();
        member
            .record_event("Present", date(2), "admin", Some("G1"), EnrollmentPolicy::Enforced)
            .unwrap();
        member
            .record_event("Absent", date(2), "admin", Some("G2"), EnrollmentPolicy::Enforced)
            .unwrap();

        assert_eq!(member.status_on_in_group(date(2), "G1").unwrap().kind, EventKind::Present);
        assert_eq!(member.status_on_in_group(date(2), "G2").unwrap().kind, EventKind::Absent);
        assert_eq!(member.status_on(date(2)).unwrap().kind, EventKind::Absent);
    }

    #[test]
    fn test_inactive_member_rejects_writes() {
        let mut member = test_member();
        member.enroll("G1").unwrap();
        member.delete("graduated").unwrap();

        assert!(matches!(member.enroll("G2"), Err(LedgerError::InactiveSubject { .. })));
        let result = member.record_event("Present", date(2), "admin", Some("G1"), EnrollmentPolicy::Enforced);
        assert!(matches!(result, Err(LedgerError::InactiveSubject { .. })));
    }

    #[test]
    fn test_drift_detected_after_document_edit() {
        let mut member = test_member();
        member.enroll("G1").unwrap();
        member
            .record_event("Present", date(2), "admin", Some("G1"), EnrollmentPolicy::Enforced)
            .unwrap();

        let mut doc = member.to_document();
        doc.metadata.counters = Some(AttendanceCounters {
            present: 5,
            absent: 0,
            leave: 0,
        });
        doc.enrolled_groups.push("G9".to_string());

        let restored = MemberChain::from_document(doc).unwrap();
        // Blocks are untouched so the chain itself still verifies
        assert!(restored.is_valid());
        assert_eq!(restored.derived_state_drift().len(), 2);
    }
}
