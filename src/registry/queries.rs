//! Read-only projections over the registry
use super::Registry;
use crate::blockchain::{AttendanceCounters, ChainKind, HistoryEntry, Status};
use crate::error::{LedgerError, Result};
use crate::hierarchy::{AttendanceRecord, ChainDocument, LedgerChain, MemberChain};
use crate::transaction::types::text_matches;
use crate::transaction::{EventKind, Fields};
use chrono::NaiveDate;
use serde::Serialize;
use std::collections::BTreeMap;

/// Latest known state of a unit or group
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityView {
    pub kind: ChainKind,
    pub id: String,
    pub name: String,
    pub fields: Fields,
    pub status: Status,
    pub parent_id: Option<String>,
    pub parent_hash: Option<String>,
    pub latest_hash: String,
    pub chain_length: usize,
    pub created: u64,
    pub last_updated: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MemberView {
    #[serde(flatten)]
    pub entity: EntityView,
    pub unit_id: String,
    pub group_id: Option<String>,
    pub enrolled_groups: Vec<String>,
    pub counters: AttendanceCounters,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceSummary {
    pub member_id: String,
    pub counters: AttendanceCounters,
    pub total: u64,
    pub percentage: f64,
}

/// One member's status on a given date. `status` is `None` when no event
/// was recorded for that date.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RosterEntry {
    pub member_id: String,
    pub name: String,
    pub group_id: Option<String>,
    pub status: Option<EventKind>,
    pub recorded_by: Option<String>,
    pub recorded_at: Option<u64>,
}

impl RosterEntry {
    fn new(member: &MemberChain, record: Option<AttendanceRecord>) -> Self {
        RosterEntry {
            member_id: member.subject_id().to_string(),
            name: member.chain().name().to_string(),
            group_id: member.group_id().map(str::to_string),
            status: record.as_ref().map(|r| r.kind),
            recorded_by: record.as_ref().map(|r| r.recorded_by.clone()),
            recorded_at: record.map(|r| r.recorded_at),
        }
    }

    pub fn status_label(&self) -> &'static str {
        self.status.map_or("Not marked", |kind| kind.as_str())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemStats {
    pub total_units: usize,
    pub active_units: usize,
    pub total_groups: usize,
    pub active_groups: usize,
    pub total_members: usize,
    pub active_members: usize,
    pub total_blocks: usize,
    pub attendance_records: u64,
}

impl Registry {
    fn entity_view<C: LedgerChain>(&self, chain: &C) -> EntityView {
        let record = self.cache().latest_profile(chain.chain());
        let (name, fields, last_updated) = match record {
            Some(record) => (record.profile.name, record.profile.fields, Some(record.recorded_at)),
            None => (chain.chain().name().to_string(), Fields::new(), None),
        };

        EntityView {
            kind: C::KIND,
            id: chain.subject_id().to_string(),
            name,
            fields,
            status: chain.status(),
            parent_id: chain.parent_id().map(str::to_string),
            parent_hash: chain.parent_hash().map(str::to_string),
            latest_hash: chain.chain().latest_hash().unwrap_or_default().to_string(),
            chain_length: chain.chain().len(),
            created: chain.metadata().created,
            last_updated,
        }
    }

    fn member_view(&self, member: &MemberChain) -> MemberView {
        MemberView {
            entity: self.entity_view(member),
            unit_id: member.unit_id().to_string(),
            group_id: member.group_id().map(str::to_string),
            enrolled_groups: member.enrolled_groups().iter().cloned().collect(),
            counters: member.counters(),
        }
    }

    fn member_chain(&self, member_id: &str) -> Result<&MemberChain> {
        self.member_map()
            .get(member_id)
            .ok_or_else(|| LedgerError::not_found(ChainKind::Member, member_id))
    }

    // ==================== SINGLE SUBJECT ====================

    pub fn unit(&self, unit_id: &str) -> Result<EntityView> {
        find(self.unit_map(), unit_id).map(|unit| self.entity_view(unit))
    }

    pub fn group(&self, group_id: &str) -> Result<EntityView> {
        find(self.group_map(), group_id).map(|group| self.entity_view(group))
    }

    pub fn member(&self, member_id: &str) -> Result<MemberView> {
        self.member_chain(member_id).map(|member| self.member_view(member))
    }

    pub fn unit_history(&self, unit_id: &str) -> Result<Vec<HistoryEntry>> {
        find(self.unit_map(), unit_id).map(|unit| unit.chain().history())
    }

    pub fn group_history(&self, group_id: &str) -> Result<Vec<HistoryEntry>> {
        find(self.group_map(), group_id).map(|group| group.chain().history())
    }

    pub fn member_history(&self, member_id: &str) -> Result<Vec<HistoryEntry>> {
        self.member_chain(member_id).map(|member| member.chain().history())
    }

    pub fn unit_document(&self, unit_id: &str) -> Result<ChainDocument> {
        find(self.unit_map(), unit_id).map(LedgerChain::to_document)
    }

    pub fn group_document(&self, group_id: &str) -> Result<ChainDocument> {
        find(self.group_map(), group_id).map(LedgerChain::to_document)
    }

    pub fn member_document(&self, member_id: &str) -> Result<ChainDocument> {
        self.member_chain(member_id).map(LedgerChain::to_document)
    }

    // ==================== LISTINGS ====================

    pub fn units(&self) -> Vec<EntityView> {
        self.unit_map().values().map(|unit| self.entity_view(unit)).collect()
    }

    pub fn groups(&self) -> Vec<EntityView> {
        self.group_map().values().map(|group| self.entity_view(group)).collect()
    }

    pub fn members(&self) -> Vec<MemberView> {
        self.member_map().values().map(|member| self.member_view(member)).collect()
    }

    pub fn groups_in_unit(&self, unit_id: &str) -> Result<Vec<EntityView>> {
        find(self.unit_map(), unit_id)?;
        Ok(self
            .group_map()
            .values()
            .filter(|group| group.unit_id() == unit_id)
            .map(|group| self.entity_view(group))
            .collect())
    }

    /// Members parented to the group or enrolled in it
    pub fn members_in_group(&self, group_id: &str) -> Result<Vec<MemberView>> {
        find(self.group_map(), group_id)?;
        Ok(self
            .group_members(group_id)
            .map(|member| self.member_view(member))
            .collect())
    }

    pub fn members_in_unit(&self, unit_id: &str) -> Result<Vec<MemberView>> {
        find(self.unit_map(), unit_id)?;
        Ok(self
            .member_map()
            .values()
            .filter(|member| member.unit_id() == unit_id)
            .map(|member| self.member_view(member))
            .collect())
    }

    fn group_members<'a>(&'a self, group_id: &'a str) -> impl Iterator<Item = &'a MemberChain> + 'a {
        self.member_map()
            .values()
            .filter(move |member| member.group_id() == Some(group_id) || member.is_enrolled(group_id))
    }

    // ==================== SEARCH ====================

    /// Case-insensitive match on name and string field values
    pub fn search_units(&self, term: &str) -> Vec<EntityView> {
        self.units().into_iter().filter(|view| matches_view(view, term)).collect()
    }

    pub fn search_groups(&self, term: &str) -> Vec<EntityView> {
        self.groups().into_iter().filter(|view| matches_view(view, term)).collect()
    }

    pub fn search_members(&self, term: &str) -> Vec<MemberView> {
        self.members()
            .into_iter()
            .filter(|view| matches_view(&view.entity, term))
            .collect()
    }

    // ==================== ATTENDANCE ====================

    pub fn attendance_history(&self, member_id: &str) -> Result<Vec<AttendanceRecord>> {
        self.member_chain(member_id).map(MemberChain::attendance_history)
    }

    pub fn attendance_summary(&self, member_id: &str) -> Result<AttendanceSummary> {
        let member = self.member_chain(member_id)?;
        let counters = member.counters();
        Ok(AttendanceSummary {
            member_id: member_id.to_string(),
            counters,
            total: counters.total(),
            percentage: member.attendance_percentage(),
        })
    }

    /// Roster of the group's active members with their status on `date`
    pub fn group_attendance(&self, group_id: &str, date: NaiveDate) -> Result<Vec<RosterEntry>> {
        find(self.group_map(), group_id)?;
        Ok(self
            .group_members(group_id)
            .filter(|member| member.is_active())
            .map(|member| RosterEntry::new(member, member.status_on_in_group(date, group_id)))
            .collect())
    }

    /// Roster of every active member in the unit with their status on `date`
    pub fn unit_attendance(&self, unit_id: &str, date: NaiveDate) -> Result<Vec<RosterEntry>> {
        find(self.unit_map(), unit_id)?;
        Ok(self
            .member_map()
            .values()
            .filter(|member| member.unit_id() == unit_id && member.is_active())
            .map(|member| RosterEntry::new(member, member.status_on(date)))
            .collect())
    }

    // ==================== STATISTICS ====================

    pub fn system_stats(&self) -> SystemStats {
        let members = self.member_map();
        SystemStats {
            total_units: self.unit_map().len(),
            active_units: count_active(self.unit_map()),
            total_groups: self.group_map().len(),
            active_groups: count_active(self.group_map()),
            total_members: members.len(),
            active_members: count_active(members),
            total_blocks: total_blocks(self.unit_map())
                + total_blocks(self.group_map())
                + total_blocks(members),
            attendance_records: members.values().map(|m| m.counters().total()).sum(),
        }
    }
}

fn find<'a, C: LedgerChain>(map: &'a BTreeMap<String, C>, id: &str) -> Result<&'a C> {
    map.get(id).ok_or_else(|| LedgerError::not_found(C::KIND, id))
}

fn count_active<C: LedgerChain>(map: &BTreeMap<String, C>) -> usize {
    map.values().filter(|chain| chain.is_active()).count()
}

fn total_blocks<C: LedgerChain>(map: &BTreeMap<String, C>) -> usize {
    map.values().map(|chain| chain.chain().len()).sum()
}

fn matches_view(view: &EntityView, term: &str) -> bool {
    view.id.to_lowercase().contains(&term.to_lowercase()) || text_matches(&view.name, &view.fields, term)
}
