//! Cross-chain validation of the whole forest
use super::Registry;
use crate::blockchain::ChainKind;
use crate::error::{LedgerError, Result};
use crate::hierarchy::{GroupChain, LedgerChain, MemberChain, UnitChain};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use tracing::{info, warn};

/// One problem found on one chain
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationIssue {
    pub kind: ChainKind,
    pub id: String,
    pub reason: String,
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} '{}': {}", self.kind, self.id, self.reason)
    }
}

/// Outcome of [`Registry::validate_all`]. An empty forest is valid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationReport {
    pub overall_valid: bool,
    pub per_unit: BTreeMap<String, bool>,
    pub per_group: BTreeMap<String, bool>,
    pub per_member: BTreeMap<String, bool>,
    pub errors: Vec<String>,
    #[serde(skip)]
    pub issues: Vec<ValidationIssue>,
}

impl Default for ValidationReport {
    fn default() -> Self {
        ValidationReport {
            overall_valid: true,
            per_unit: BTreeMap::new(),
            per_group: BTreeMap::new(),
            per_member: BTreeMap::new(),
            errors: Vec::new(),
            issues: Vec::new(),
        }
    }
}

impl ValidationReport {
    fn push(&mut self, issue: ValidationIssue) {
        self.overall_valid = false;
        self.errors.push(issue.to_string());
        self.issues.push(issue);
    }

    pub fn chains_checked(&self) -> usize {
        self.per_unit.len() + self.per_group.len() + self.per_member.len()
    }

    /// Convert the first problem into a `CorruptChain` error
    pub fn into_result(self) -> Result<()> {
        match self.issues.into_iter().next() {
            None => Ok(()),
            Some(issue) => Err(LedgerError::CorruptChain {
                kind: issue.kind,
                id: issue.id,
                reason: issue.reason,
            }),
        }
    }
}

impl Registry {
    /// Check every chain's hashes and links, each child's recorded parent
    /// hash, and member derived state. Never fails; problems go in the report.
    pub fn validate_all(&self) -> ValidationReport {
        let mut report = ValidationReport::default();

        for (id, unit) in self.unit_map() {
            let ok = check_chain(unit, self.difficulty(), &mut report);
            report.per_unit.insert(id.clone(), ok);
        }

        for (id, group) in self.group_map() {
            let mut ok = check_chain(group, self.difficulty(), &mut report);
            ok &= self.check_group_ancestry(group, &mut report);
            report.per_group.insert(id.clone(), ok);
        }

        for (id, member) in self.member_map() {
            let mut ok = check_chain(member, self.difficulty(), &mut report);
            ok &= self.check_member_ancestry(member, &mut report);
            for drift in member.derived_state_drift() {
                report.push(issue(member, drift));
                ok = false;
            }
            report.per_member.insert(id.clone(), ok);
        }

        if report.overall_valid {
            info!(chains = report.chains_checked(), "Forest validated");
        } else {
            warn!(
                chains = report.chains_checked(),
                problems = report.errors.len(),
                "Forest validation found problems"
            );
        }
        report
    }

    /// `validate_all` as a `Result`, for callers that refuse a corrupt forest
    pub fn ensure_valid(&self) -> Result<()> {
        self.validate_all().into_result()
    }

    fn check_group_ancestry(&self, group: &GroupChain, report: &mut ValidationReport) -> bool {
        let unit = self.unit_map().get(group.unit_id());
        check_ancestor(group, unit, group.unit_id(), report)
    }

    fn check_member_ancestry(&self, member: &MemberChain, report: &mut ValidationReport) -> bool {
        match member.group_id() {
            Some(group_id) => {
                let group = self.group_map().get(group_id);
                let mut ok = check_ancestor(member, group, group_id, report);
                if let Some(group) = group {
                    if group.unit_id() != member.unit_id() {
                        report.push(issue(
                            member,
                            format!(
                                "unit '{}' does not match group unit '{}'",
                                member.unit_id(),
                                group.unit_id()
                            ),
                        ));
                        ok = false;
                    }
                }
                ok
            }
            None => {
                let unit: Option<&UnitChain> = self.unit_map().get(member.unit_id());
                check_ancestor(member, unit, member.unit_id(), report)
            }
        }
    }
}

fn issue<C: LedgerChain>(chain: &C, reason: String) -> ValidationIssue {
    ValidationIssue {
        kind: C::KIND,
        id: chain.subject_id().to_string(),
        reason,
    }
}

/// Hashes, linkage, recorded parent hash and status/log agreement. The
/// chain's own difficulty may not undercut the configured one.
fn check_chain<C: LedgerChain>(chain: &C, min_difficulty: u32, report: &mut ValidationReport) -> bool {
    let mut ok = true;

    if chain.chain().difficulty() < min_difficulty {
        report.push(issue(
            chain,
            format!(
                "difficulty {} is below the required {}",
                chain.chain().difficulty(),
                min_difficulty
            ),
        ));
        ok = false;
    }

    let faults = chain.chain().audit();
    if !faults.is_empty() {
        let faults: Vec<String> = faults.iter().map(ToString::to_string).collect();
        report.push(issue(chain, format!("chain is invalid: {}", faults.join("; "))));
        ok = false;
    }

    if !chain.verify_parent_link() {
        report.push(issue(chain, "genesis does not link to the recorded parent hash".to_string()));
        ok = false;
    }

    if !chain.status_matches_log() {
        report.push(issue(
            chain,
            format!("status '{}' disagrees with the block log", chain.status()),
        ));
        ok = false;
    }

    ok
}

/// The parent exists and its chain contains the hash recorded at creation
fn check_ancestor<C: LedgerChain, P: LedgerChain>(
    child: &C,
    parent: Option<&P>,
    parent_id: &str,
    report: &mut ValidationReport,
) -> bool {
    let Some(parent) = parent else {
        report.push(issue(child, format!("parent {} '{}' is missing", P::KIND, parent_id)));
        return false;
    };

    let recorded = child.parent_hash().unwrap_or_default();
    if !parent.chain().contains_hash(recorded) {
        report.push(issue(
            child,
            format!("parent {} '{}' has no block with hash {}", P::KIND, parent_id, recorded),
        ));
        return false;
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::MemberParent;
    use crate::transaction::{Profile, ProfileUpdate};

    fn forest() -> Registry {
        let mut reg = Registry::new(1);
        reg.create_unit("U1", Profile::new("Engineering")).unwrap();
        reg.create_group("G1", "U1", Profile::new("Backend")).unwrap();
        reg.create_member("M1", MemberParent::Group("G1"), Profile::new("Ada")).unwrap();
        reg
    }

    #[test]
    fn test_empty_forest_is_valid() {
        let report = Registry::new(1).validate_all();
        assert!(report.overall_valid);
        assert_eq!(report.chains_checked(), 0);
        assert!(Registry::new(1).ensure_valid().is_ok());
    }

    #[test]
    fn test_fresh_forest_is_valid() {
        let report = forest().validate_all();
        assert!(report.overall_valid, "{:?}", report.errors);
        assert_eq!(report.per_unit["U1"], true);
        assert_eq!(report.per_group["G1"], true);
        assert_eq!(report.per_member["M1"], true);
    }

    #[test]
    fn test_parent_update_keeps_group_valid() {
        let mut reg = forest();
        let recorded = reg.group("G1").unwrap().parent_hash;
        reg.update_unit("U1", &ProfileUpdate::rename("Platform")).unwrap();

        assert_eq!(reg.group("G1").unwrap().parent_hash, recorded);
        assert!(reg.validate_all().overall_valid);
    }

    #[test]
    fn test_tampered_block_reported_per_chain() {
        let mut reg = forest();
        reg.groups.get_mut("G1").unwrap().chain_mut().blocks[1].nonce += 1;

        let report = reg.validate_all();
        assert!(!report.overall_valid);
        assert_eq!(report.per_group["G1"], false);
        assert_eq!(report.per_unit["U1"], true);
        assert!(report.errors.iter().any(|e| e.starts_with("group 'G1'")));

        match reg.ensure_valid() {
            Err(LedgerError::CorruptChain { kind, id, .. }) => {
                assert_eq!(kind, ChainKind::Group);
                assert_eq!(id, "G1");
            }
            other => panic!("Expected CorruptChain, got {:?}", other),
        }
    }

    #[test]
    fn test_member_counter_drift_detected() {
        let mut reg = forest();
        let mut doc = reg.member_document("M1").unwrap();
        doc.metadata.counters = Some(crate::blockchain::AttendanceCounters {
            present: 5,
            absent: 0,
            leave: 0,
        });
        reg.members.insert("M1".to_string(), MemberChain::from_document(doc).unwrap());

        let report = reg.validate_all();
        assert_eq!(report.per_member["M1"], false);
        assert!(report.errors.iter().any(|e| e.contains("counters")));
    }

    #[test]
    fn test_lowered_difficulty_detected() {
        let mut reg = forest();
        let mut doc = reg.unit_document("U1").unwrap();
        doc.difficulty = 0;
        reg.units.insert("U1".to_string(), UnitChain::from_document(doc).unwrap());

        let report = reg.validate_all();
        assert_eq!(report.per_unit["U1"], false);
        assert_eq!(report.per_group["G1"], true);
        assert!(report.errors.iter().any(|e| e.contains("difficulty 0 is below the required 1")));
    }

    #[test]
    fn test_missing_parent_detected() {
        let mut reg = forest();
        reg.units.clear();

        let report = reg.validate_all();
        assert_eq!(report.per_group["G1"], false);
        assert!(report.errors.iter().any(|e| e.contains("is missing")));
    }
}
