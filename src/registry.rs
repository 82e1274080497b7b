//! The registry owns every chain of the forest by identifier.
//!
//! It enforces creation order (unit before group before member), cascades
//! deletions downward, and is the only place chains are created or mutated.
//! Reads live in [`queries`], cross-chain checks in [`validation`].

pub mod queries;
pub mod validation;

pub use queries::*;
pub use validation::*;

use crate::blockchain::{now_millis, Block, ChainKind, DEFAULT_DIFFICULTY};
use crate::cache::ProjectionCache;
use crate::config::LedgerConfig;
use crate::error::{LedgerError, Result};
use crate::hierarchy::{
    ChainDocument, EnrollmentPolicy, GroupChain, LedgerChain, MemberChain, UnitChain,
};
use crate::persistence::{SnapshotDocument, SnapshotStore};
use crate::transaction::{Profile, ProfileUpdate};
use chrono::NaiveDate;
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::{debug, info};

/// Reason recorded on children deleted by a cascade
pub const PARENT_DELETED_REASON: &str = "parent deleted";

/// Where a new member hangs in the hierarchy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemberParent<'a> {
    Group(&'a str),
    /// Unassigned member attached directly to a unit
    Unit(&'a str),
}

/// Returned by the create operations
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CreationReceipt {
    pub kind: ChainKind,
    pub subject_id: String,
    pub latest_hash: String,
    pub parent_hash: Option<String>,
}

impl CreationReceipt {
    fn for_chain<C: LedgerChain>(chain: &C) -> Self {
        CreationReceipt {
            kind: C::KIND,
            subject_id: chain.subject_id().to_string(),
            latest_hash: chain.chain().latest_hash().unwrap_or_default().to_string(),
            parent_hash: chain.parent_hash().map(str::to_string),
        }
    }
}

/// Subjects deactivated by a unit or group deletion
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CascadeReport {
    pub subject_id: String,
    pub groups: Vec<String>,
    pub members: Vec<String>,
}

#[derive(Debug)]
pub struct Registry {
    difficulty: u32,
    policy: EnrollmentPolicy,
    units: BTreeMap<String, UnitChain>,
    groups: BTreeMap<String, GroupChain>,
    members: BTreeMap<String, MemberChain>,
    cache: ProjectionCache,
}

impl Default for Registry {
    fn default() -> Self {
        Self::new(DEFAULT_DIFFICULTY)
    }
}

impl Registry {
    pub fn new(difficulty: u32) -> Self {
        Registry {
            difficulty,
            policy: EnrollmentPolicy::default(),
            units: BTreeMap::new(),
            groups: BTreeMap::new(),
            members: BTreeMap::new(),
            cache: ProjectionCache::default(),
        }
    }

    pub fn with_config(config: &LedgerConfig) -> Self {
        Registry {
            policy: config.enrollment_policy,
            cache: ProjectionCache::new(config.projection_cache_capacity),
            ..Self::new(config.difficulty)
        }
    }

    pub fn with_policy(mut self, policy: EnrollmentPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn difficulty(&self) -> u32 {
        self.difficulty
    }

    pub fn policy(&self) -> EnrollmentPolicy {
        self.policy
    }

    // ==================== UNIT OPERATIONS ====================

    pub fn create_unit(&mut self, unit_id: &str, profile: Profile) -> Result<CreationReceipt> {
        validate_id(ChainKind::Unit, unit_id)?;
        if self.units.contains_key(unit_id) {
            return Err(LedgerError::duplicate(ChainKind::Unit, unit_id));
        }

        let mut unit = UnitChain::new(unit_id, &profile.name, self.difficulty)?;
        unit.record_creation(profile)?;

        let receipt = CreationReceipt::for_chain(&unit);
        self.units.insert(unit_id.to_string(), unit);
        info!(unit = unit_id, hash = %receipt.latest_hash, "Unit created");
        Ok(receipt)
    }

    pub fn update_unit(&mut self, unit_id: &str, update: &ProfileUpdate) -> Result<Block> {
        update_in(&mut self.units, unit_id, update)
    }

    /// Delete a unit and every active group and member beneath it
    pub fn delete_unit(&mut self, unit_id: &str, reason: &str) -> Result<CascadeReport> {
        lookup_mut(&mut self.units, unit_id)?.delete(reason)?;

        let mut report = CascadeReport {
            subject_id: unit_id.to_string(),
            ..CascadeReport::default()
        };

        let group_ids: Vec<String> = self
            .groups
            .values()
            .filter(|group| group.unit_id() == unit_id && group.is_active())
            .map(|group| group.subject_id().to_string())
            .collect();
        for group_id in group_ids {
            let members = self.cascade_group(&group_id, PARENT_DELETED_REASON)?;
            report.groups.push(group_id);
            report.members.extend(members);
        }

        // Unassigned members hang directly off the unit
        let member_ids: Vec<String> = self
            .members
            .values()
            .filter(|member| member.unit_id() == unit_id && member.is_active())
            .map(|member| member.subject_id().to_string())
            .collect();
        for member_id in member_ids {
            lookup_mut(&mut self.members, &member_id)?.delete(PARENT_DELETED_REASON)?;
            report.members.push(member_id);
        }

        info!(
            unit = unit_id,
            groups = report.groups.len(),
            members = report.members.len(),
            "Unit deleted with cascade"
        );
        Ok(report)
    }

    // ==================== GROUP OPERATIONS ====================

    pub fn create_group(&mut self, group_id: &str, unit_id: &str, profile: Profile) -> Result<CreationReceipt> {
        validate_id(ChainKind::Group, group_id)?;
        if self.groups.contains_key(group_id) {
            return Err(LedgerError::duplicate(ChainKind::Group, group_id));
        }

        let unit = lookup(&self.units, unit_id)?;
        if !unit.is_active() {
            return Err(LedgerError::InactiveParent {
                kind: ChainKind::Group,
                id: group_id.to_string(),
                parent: unit_id.to_string(),
            });
        }
        let unit_hash = latest_hash_of(unit)?;

        let mut group = GroupChain::new(group_id, &profile.name, unit_id, &unit_hash, self.difficulty)?;
        group.record_creation(profile)?;

        let receipt = CreationReceipt::for_chain(&group);
        self.groups.insert(group_id.to_string(), group);
        info!(group = group_id, unit = unit_id, parent_hash = %unit_hash, "Group created");
        Ok(receipt)
    }

    pub fn update_group(&mut self, group_id: &str, update: &ProfileUpdate) -> Result<Block> {
        update_in(&mut self.groups, group_id, update)
    }

    /// Delete a group and every active member parented to it
    pub fn delete_group(&mut self, group_id: &str, reason: &str) -> Result<CascadeReport> {
        let report = CascadeReport {
            subject_id: group_id.to_string(),
            groups: Vec::new(),
            members: self.cascade_group(group_id, reason)?,
        };

        info!(group = group_id, members = report.members.len(), "Group deleted with cascade");
        Ok(report)
    }

    /// Delete one group and its active members, returning the member ids
    fn cascade_group(&mut self, group_id: &str, reason: &str) -> Result<Vec<String>> {
        lookup_mut(&mut self.groups, group_id)?.delete(reason)?;

        let member_ids: Vec<String> = self
            .members
            .values()
            .filter(|member| member.group_id() == Some(group_id) && member.is_active())
            .map(|member| member.subject_id().to_string())
            .collect();
        for member_id in &member_ids {
            lookup_mut(&mut self.members, member_id)?.delete(PARENT_DELETED_REASON)?;
        }
        Ok(member_ids)
    }

    // ==================== MEMBER OPERATIONS ====================

    /// Create a member under a group (enrolling it there) or, when
    /// unassigned, directly under a unit.
    pub fn create_member(
        &mut self,
        member_id: &str,
        parent: MemberParent<'_>,
        profile: Profile,
    ) -> Result<CreationReceipt> {
        validate_id(ChainKind::Member, member_id)?;
        if self.members.contains_key(member_id) {
            return Err(LedgerError::duplicate(ChainKind::Member, member_id));
        }

        let inactive_parent = |parent: &str| LedgerError::InactiveParent {
            kind: ChainKind::Member,
            id: member_id.to_string(),
            parent: parent.to_string(),
        };

        let (unit_id, group_id, parent_hash) = match parent {
            MemberParent::Group(group_id) => {
                let group = lookup(&self.groups, group_id)?;
                if !group.is_active() {
                    return Err(inactive_parent(group_id));
                }
                (group.unit_id().to_string(), Some(group_id), latest_hash_of(group)?)
            }
            MemberParent::Unit(unit_id) => {
                let unit = lookup(&self.units, unit_id)?;
                if !unit.is_active() {
                    return Err(inactive_parent(unit_id));
                }
                (unit_id.to_string(), None, latest_hash_of(unit)?)
            }
        };

        let mut member = MemberChain::new(
            member_id,
            &profile.name,
            &unit_id,
            group_id,
            &parent_hash,
            self.difficulty,
        )?;
        member.record_creation(profile)?;
        if let Some(group_id) = group_id {
            member.enroll(group_id)?;
        }

        let receipt = CreationReceipt::for_chain(&member);
        self.members.insert(member_id.to_string(), member);
        info!(member = member_id, unit = %unit_id, group = ?group_id, "Member created");
        Ok(receipt)
    }

    pub fn update_member(&mut self, member_id: &str, update: &ProfileUpdate) -> Result<Block> {
        update_in(&mut self.members, member_id, update)
    }

    pub fn delete_member(&mut self, member_id: &str, reason: &str) -> Result<Block> {
        lookup_mut(&mut self.members, member_id)?.delete(reason)
    }

    /// Enroll a member in an active group. `Ok(false)` when already enrolled.
    pub fn enroll(&mut self, member_id: &str, group_id: &str) -> Result<bool> {
        lookup(&self.members, member_id)?;
        let group = lookup(&self.groups, group_id)?;
        if !group.is_active() {
            return Err(LedgerError::inactive(ChainKind::Group, group_id, "enroll into"));
        }

        let appended = lookup_mut(&mut self.members, member_id)?.enroll(group_id)?;
        debug!(member = member_id, group = group_id, appended, "Enrollment processed");
        Ok(appended)
    }

    /// Record an attendance-style event on a member's chain
    pub fn record_event(
        &mut self,
        member_id: &str,
        kind: &str,
        date: NaiveDate,
        recorded_by: &str,
        group_id: Option<&str>,
    ) -> Result<Block> {
        lookup(&self.members, member_id)?;
        if let Some(group_id) = group_id {
            if !lookup(&self.groups, group_id)?.is_active() {
                return Err(LedgerError::inactive(ChainKind::Group, group_id, "record events in"));
            }
        }

        let policy = self.policy;
        let block = lookup_mut(&mut self.members, member_id)?.record_event(kind, date, recorded_by, group_id, policy)?;
        debug!(member = member_id, kind, %date, index = block.index(), "Event recorded");
        Ok(block)
    }

    // ==================== PERSISTENCE OPERATIONS ====================

    /// Serialize the whole forest into one document
    pub fn snapshot_all(&self) -> SnapshotDocument {
        SnapshotDocument {
            units: documents(&self.units),
            groups: documents(&self.groups),
            members: documents(&self.members),
            saved_at: now_millis(),
        }
    }

    /// Replace the whole forest with the snapshot's contents. Blocks are
    /// taken verbatim, nothing is re-mined. On error the registry is left
    /// untouched.
    pub fn restore_all(&mut self, snapshot: &SnapshotDocument) -> Result<()> {
        let units = decode(&snapshot.units, UnitChain::from_document)?;
        let groups = decode(&snapshot.groups, GroupChain::from_document)?;
        let members = decode(&snapshot.members, MemberChain::from_document)?;

        self.units = units;
        self.groups = groups;
        self.members = members;
        self.cache.clear();

        info!(
            units = self.units.len(),
            groups = self.groups.len(),
            members = self.members.len(),
            saved_at = snapshot.saved_at,
            "Registry restored from snapshot"
        );
        Ok(())
    }

    pub fn from_snapshot(config: &LedgerConfig, snapshot: &SnapshotDocument) -> Result<Self> {
        let mut registry = Registry::with_config(config);
        registry.restore_all(snapshot)?;
        Ok(registry)
    }

    pub fn save_to(&self, store: &dyn SnapshotStore) -> Result<()> {
        store.save(&self.snapshot_all())
    }

    /// Restore from `store`, or start empty when it holds no snapshot yet
    pub fn load_from(config: &LedgerConfig, store: &dyn SnapshotStore) -> Result<Self> {
        match store.load()? {
            Some(snapshot) => Registry::from_snapshot(config, &snapshot),
            None => {
                info!(store = %store.describe(), "No saved snapshot found, starting fresh");
                Ok(Registry::with_config(config))
            }
        }
    }

    pub(crate) fn unit_map(&self) -> &BTreeMap<String, UnitChain> {
        &self.units
    }

    pub(crate) fn group_map(&self) -> &BTreeMap<String, GroupChain> {
        &self.groups
    }

    pub(crate) fn member_map(&self) -> &BTreeMap<String, MemberChain> {
        &self.members
    }

    pub(crate) fn cache(&self) -> &ProjectionCache {
        &self.cache
    }
}

fn validate_id(kind: ChainKind, id: &str) -> Result<()> {
    if id.trim().is_empty() {
        return Err(LedgerError::InvalidPayload(format!("{} id cannot be empty", kind)));
    }
    Ok(())
}

fn lookup<'a, C: LedgerChain>(map: &'a BTreeMap<String, C>, id: &str) -> Result<&'a C> {
    map.get(id).ok_or_else(|| LedgerError::not_found(C::KIND, id))
}

fn lookup_mut<'a, C: LedgerChain>(map: &'a mut BTreeMap<String, C>, id: &str) -> Result<&'a mut C> {
    map.get_mut(id).ok_or_else(|| LedgerError::not_found(C::KIND, id))
}

fn update_in<C: LedgerChain>(map: &mut BTreeMap<String, C>, id: &str, update: &ProfileUpdate) -> Result<Block> {
    let block = lookup_mut(map, id)?.update(update)?;
    info!(kind = %C::KIND, subject = id, index = block.index(), "Profile updated");
    Ok(block)
}

fn latest_hash_of<C: LedgerChain>(chain: &C) -> Result<String> {
    chain
        .chain()
        .latest_hash()
        .map(str::to_string)
        .ok_or_else(|| LedgerError::CorruptChain {
            kind: C::KIND,
            id: chain.subject_id().to_string(),
            reason: "Parent chain has no blocks".to_string(),
        })
}

fn documents<C: LedgerChain>(map: &BTreeMap<String, C>) -> BTreeMap<String, ChainDocument> {
    map.iter().map(|(id, chain)| (id.clone(), chain.to_document())).collect()
}

fn decode<C: LedgerChain>(
    docs: &BTreeMap<String, ChainDocument>,
    build: fn(ChainDocument) -> Result<C>,
) -> Result<BTreeMap<String, C>> {
    docs.iter()
        .map(|(id, doc)| {
            if doc.subject_id != *id {
                return Err(LedgerError::Snapshot(format!(
                    "Snapshot key '{}' does not match subject id '{}'",
                    id, doc.subject_id
                )));
            }
            Ok((id.clone(), build(doc.clone())?))
        })
        .collect()
}
