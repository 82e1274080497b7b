//! Integration tests for the registry lifecycle: creation order, cascades,
//! enrollment, events and tamper detection.

use chrono::NaiveDate;
use rollchain::blockchain::{ChainKind, Status};
use rollchain::error::LedgerError;
use rollchain::hierarchy::{ChainDocument, LedgerChain, UnitChain};
use rollchain::registry::{MemberParent, Registry};
use rollchain::transaction::{Profile, ProfileUpdate, Transaction};
use serde_json::{json, Value};

type TestResult = Result<(), Box<dyn std::error::Error>>;

const DIFFICULTY: u32 = 2;

/// U1 "Engineering" with group G1 and member M1 enrolled in it
fn engineering() -> Result<Registry, Box<dyn std::error::Error>> {
    let mut registry = Registry::new(DIFFICULTY);
    registry.create_unit("U1", Profile::new("Engineering"))?;
    registry.create_group("G1", "U1", Profile::new("Backend"))?;
    registry.create_member(
        "M1",
        MemberParent::Group("G1"),
        Profile::new("Ada Lovelace").with_field("rollNumber", "R-001"),
    )?;
    Ok(registry)
}

fn day(d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 9, d).unwrap()
}

fn count_payloads(doc: &ChainDocument, predicate: impl Fn(&Transaction) -> bool) -> usize {
    doc.blocks.iter().filter(|b| predicate(b.payload())).count()
}

/// Rewrite one field of one stored block through the document's JSON form
fn tamper(doc: &ChainDocument, index: usize, path: &[&str], value: Value) -> ChainDocument {
    let mut json = serde_json::to_value(doc).unwrap();
    let mut target = &mut json["blocks"][index];
    for key in path {
        target = &mut target[*key];
    }
    *target = value;
    serde_json::from_value(json).unwrap()
}

#[test]
fn test_every_block_verifies_after_operations() -> TestResult {
    let mut registry = engineering()?;
    registry.update_member("M1", &ProfileUpdate::default().with_field("email", "ada@example.org"))?;
    registry.record_event("M1", "Present", day(2), "admin", Some("G1"))?;
    registry.update_unit("U1", &ProfileUpdate::rename("Platform"))?;

    for doc in [
        registry.unit_document("U1")?,
        registry.group_document("G1")?,
        registry.member_document("M1")?,
    ] {
        for block in &doc.blocks {
            assert!(block.verify(DIFFICULTY), "block {} of {} failed", block.index(), doc.subject_id);
            assert!(block.hash().starts_with("00"));
        }
    }

    assert!(registry.validate_all().overall_valid);
    Ok(())
}

#[test]
fn test_tampering_nonce_payload_or_link_is_detected() -> TestResult {
    let registry = engineering()?;
    let doc = registry.unit_document("U1")?;
    assert!(UnitChain::from_document(doc.clone())?.is_valid());

    let nonce = doc.blocks[1].nonce() + 1;
    let cases = [
        tamper(&doc, 1, &["nonce"], json!(nonce)),
        tamper(&doc, 1, &["payload", "profile", "name"], json!("Mallory")),
        tamper(&doc, 1, &["prev_hash"], json!("00ff")),
    ];

    for tampered in cases {
        let chain = UnitChain::from_document(tampered)?;
        assert!(!chain.is_valid());
        assert!(chain.chain().first_fault().is_some());
    }
    Ok(())
}

#[test]
fn test_audit_collects_every_fault() -> TestResult {
    let mut registry = Registry::new(1);
    registry.create_unit("U1", Profile::new("Engineering"))?;
    registry.update_unit("U1", &ProfileUpdate::rename("Platform"))?;
    let doc = registry.unit_document("U1")?;

    let tampered = tamper(&doc, 1, &["payload", "profile", "name"], json!("X"));
    let tampered = tamper(&tampered, 2, &["payload", "new", "name"], json!("Y"));
    let chain = UnitChain::from_document(tampered)?;

    assert!(!chain.is_valid());
    assert_eq!(chain.chain().audit().len(), 2);
    Ok(())
}

#[test]
fn test_enroll_twice_appends_one_block() -> TestResult {
    let mut registry = engineering()?;
    registry.create_group("G2", "U1", Profile::new("Frontend"))?;

    assert!(registry.enroll("M1", "G2")?);
    assert!(!registry.enroll("M1", "G2")?);

    let doc = registry.member_document("M1")?;
    let enrolled_g2 = count_payloads(&doc, |tx| {
        matches!(tx, Transaction::Enrolled { target_id } if target_id == "G2")
    });
    assert_eq!(enrolled_g2, 1);
    assert_eq!(registry.member("M1")?.enrolled_groups, vec!["G1", "G2"]);
    Ok(())
}

#[test]
fn test_created_payload_has_no_enrollment() -> TestResult {
    let registry = engineering()?;
    let doc = registry.member_document("M1")?;

    match doc.blocks[1].payload() {
        Transaction::Created { profile } => {
            assert_eq!(profile.name, "Ada Lovelace");
            assert!(!profile.fields.contains_key("enrolledGroups"));
        }
        other => panic!("Expected Created, got {:?}", other),
    }
    assert!(matches!(doc.blocks[2].payload(), Transaction::Enrolled { .. }));
    Ok(())
}

#[test]
fn test_invalid_event_kind_appends_nothing() -> TestResult {
    let mut registry = engineering()?;
    let before = registry.member_document("M1")?.blocks.len();

    let result = registry.record_event("M1", "Late", day(2), "admin", Some("G1"));
    assert_eq!(result, Err(LedgerError::InvalidEventKind("Late".to_string())));
    assert_eq!(registry.member_document("M1")?.blocks.len(), before);
    assert_eq!(registry.attendance_summary("M1")?.total, 0);
    Ok(())
}

#[test]
fn test_enforced_policy_requires_enrollment() -> TestResult {
    let mut registry = engineering()?;
    registry.create_group("G2", "U1", Profile::new("Frontend"))?;

    let result = registry.record_event("M1", "Present", day(2), "admin", Some("G2"));
    assert_eq!(
        result,
        Err(LedgerError::NotEnrolled {
            member: "M1".to_string(),
            group: Some("G2".to_string()),
        })
    );

    registry.create_member("M2", MemberParent::Unit("U1"), Profile::new("Grace"))?;
    let result = registry.record_event("M2", "Present", day(2), "admin", None);
    assert!(matches!(result, Err(LedgerError::NotEnrolled { group: None, .. })));
    Ok(())
}

#[test]
fn test_latest_event_for_date_wins() -> TestResult {
    let mut registry = engineering()?;
    registry.record_event("M1", "Absent", day(2), "instructor-a", Some("G1"))?;
    registry.record_event("M1", "Present", day(2), "instructor-b", Some("G1"))?;

    let history = registry.attendance_history("M1")?;
    assert_eq!(history.len(), 2);

    let roster = registry.group_attendance("G1", day(2))?;
    assert_eq!(roster[0].status_label(), "Present");
    assert_eq!(roster[0].recorded_by.as_deref(), Some("instructor-b"));

    let summary = registry.attendance_summary("M1")?;
    assert_eq!(summary.counters.present, 1);
    assert_eq!(summary.counters.absent, 1);
    assert_eq!(summary.percentage, 50.0);
    Ok(())
}

#[test]
fn test_unit_delete_cascades_exactly_once() -> TestResult {
    let mut registry = engineering()?;
    let report = registry.delete_unit("U1", "restructured")?;
    assert_eq!(report.groups, vec!["G1"]);
    assert_eq!(report.members, vec!["M1"]);

    let is_deleted = |tx: &Transaction| matches!(tx, Transaction::Deleted { .. });
    for doc in [
        registry.unit_document("U1")?,
        registry.group_document("G1")?,
        registry.member_document("M1")?,
    ] {
        assert_eq!(doc.metadata.status, Status::Inactive);
        assert_eq!(count_payloads(&doc, is_deleted), 1);
    }

    assert!(registry.validate_all().overall_valid);
    Ok(())
}

#[test]
fn test_deleted_subjects_reject_further_changes() -> TestResult {
    let mut registry = engineering()?;
    registry.delete_member("M1", "graduated")?;

    let result = registry.record_event("M1", "Present", day(2), "admin", Some("G1"));
    assert!(matches!(result, Err(LedgerError::InactiveSubject { .. })));
    let result = registry.update_member("M1", &ProfileUpdate::rename("Ada"));
    assert!(matches!(result, Err(LedgerError::InactiveSubject { .. })));
    let result = registry.delete_member("M1", "again");
    assert!(matches!(result, Err(LedgerError::InactiveSubject { .. })));
    Ok(())
}

#[test]
fn test_group_parent_hash_is_a_snapshot() -> TestResult {
    let mut registry = Registry::new(DIFFICULTY);
    registry.create_unit("U1", Profile::new("Engineering"))?;
    let unit_hash_at_creation = registry.unit("U1")?.latest_hash;

    let receipt = registry.create_group("G1", "U1", Profile::new("Backend"))?;
    assert_eq!(receipt.parent_hash.as_deref(), Some(unit_hash_at_creation.as_str()));

    registry.update_unit("U1", &ProfileUpdate::rename("Platform"))?;
    assert_ne!(registry.unit("U1")?.latest_hash, unit_hash_at_creation);

    let group = registry.group("G1")?;
    assert_eq!(group.parent_hash.as_deref(), Some(unit_hash_at_creation.as_str()));

    let report = registry.validate_all();
    assert!(report.overall_valid);
    assert!(report.per_group["G1"]);
    Ok(())
}

#[test]
fn test_group_under_deleted_unit_is_refused() -> TestResult {
    let mut registry = Registry::new(DIFFICULTY);
    registry.create_unit("U1", Profile::new("Engineering"))?;
    registry.delete_unit("U1", "closed")?;

    let result = registry.create_group("G1", "U1", Profile::new("Backend"));
    assert_eq!(
        result,
        Err(LedgerError::InactiveParent {
            kind: ChainKind::Group,
            id: "G1".to_string(),
            parent: "U1".to_string(),
        })
    );
    assert!(registry.group("G1").is_err());
    assert!(registry.groups().is_empty());
    Ok(())
}

#[test]
fn test_duplicate_and_missing_ids() -> TestResult {
    let mut registry = engineering()?;

    let result = registry.create_member("M1", MemberParent::Group("G1"), Profile::new("Again"));
    assert!(matches!(result, Err(LedgerError::DuplicateId { kind: ChainKind::Member, .. })));

    let result = registry.create_group("G9", "U9", Profile::new("Orphan"));
    assert!(matches!(result, Err(LedgerError::NotFound { kind: ChainKind::Unit, .. })));

    let result = registry.update_unit("U9", &ProfileUpdate::rename("Nope"));
    assert!(matches!(result, Err(LedgerError::NotFound { .. })));
    Ok(())
}
