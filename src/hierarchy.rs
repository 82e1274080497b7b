//! The three nested chain types and the capability they share.
//!
//! Each wrapper owns a base [`Chain`] plus entity-specific identifiers and
//! metadata. Shared behavior lives in [`LedgerChain`] default methods so the
//! registry dispatches statically over the concrete types.

pub mod group;
pub mod member;
pub mod unit;

pub use group::GroupChain;
pub use member::{AttendanceRecord, EnrollmentPolicy, MemberChain};
pub use unit::UnitChain;

use crate::blockchain::{
    AttendanceCounters, Block, Chain, ChainKind, ChainMetadata, ProfileRecord, Status,
    ROOT_PARENT_HASH,
};
use crate::error::{LedgerError, Result};
use crate::transaction::{Profile, ProfileUpdate, Transaction};
use serde::{Deserialize, Serialize};
use tracing::info;

/// Serialized form of one chain inside a snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainDocument {
    pub name: String,
    pub kind: ChainKind,
    pub difficulty: u32,
    pub blocks: Vec<Block>,
    pub subject_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_hash: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_id: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub enrolled_groups: Vec<String>,
    pub metadata: MetadataDocument,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataDocument {
    pub created: u64,
    pub status: Status,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub counters: Option<AttendanceCounters>,
}

impl ChainDocument {
    pub(crate) fn expect_kind(&self, kind: ChainKind) -> Result<()> {
        if self.kind != kind {
            return Err(LedgerError::Snapshot(format!(
                "Chain '{}' is a {} chain, expected {}",
                self.subject_id, self.kind, kind
            )));
        }
        Ok(())
    }

    pub(crate) fn require<'a>(&self, field: &'a Option<String>, name: &str) -> Result<&'a str> {
        field.as_deref().ok_or_else(|| {
            LedgerError::Snapshot(format!(
                "{} chain '{}' is missing {}",
                self.kind, self.subject_id, name
            ))
        })
    }

    pub(crate) fn to_chain(&self) -> Chain {
        Chain::from_parts(
            self.kind,
            self.subject_id.clone(),
            self.name.clone(),
            self.difficulty,
            self.blocks.clone(),
        )
    }

    pub(crate) fn to_metadata(&self) -> ChainMetadata {
        ChainMetadata {
            created: self.metadata.created,
            status: self.metadata.status,
        }
    }

    fn from_chain(chain: &Chain, metadata: &ChainMetadata) -> Self {
        ChainDocument {
            name: chain.name().to_string(),
            kind: chain.kind(),
            difficulty: chain.difficulty(),
            blocks: chain.blocks().to_vec(),
            subject_id: chain.subject_id().to_string(),
            parent_hash: None,
            unit_id: None,
            group_id: None,
            enrolled_groups: Vec::new(),
            metadata: MetadataDocument {
                created: metadata.created,
                status: metadata.status,
                counters: None,
            },
        }
    }
}

/// Operations shared by unit, group and member chains
pub trait LedgerChain {
    const KIND: ChainKind;

    fn chain(&self) -> &Chain;
    fn chain_mut(&mut self) -> &mut Chain;
    fn metadata(&self) -> &ChainMetadata;
    fn metadata_mut(&mut self) -> &mut ChainMetadata;

    /// Parent hash captured when the chain was created; `None` for roots
    fn parent_hash(&self) -> Option<&str>;

    /// Identifier of the owning chain; `None` for roots
    fn parent_id(&self) -> Option<&str>;

    fn to_document(&self) -> ChainDocument;

    fn subject_id(&self) -> &str {
        self.chain().subject_id()
    }

    fn status(&self) -> Status {
        self.metadata().status
    }

    fn is_active(&self) -> bool {
        self.metadata().is_active()
    }

    fn is_valid(&self) -> bool {
        self.chain().is_valid()
    }

    fn verify_parent_link(&self) -> bool {
        let expected = self.parent_hash().unwrap_or(ROOT_PARENT_HASH);
        self.chain().verify_parent_link(expected)
    }

    fn latest_profile(&self) -> Option<ProfileRecord> {
        self.chain().latest_profile()
    }

    /// Status metadata agrees with the presence of a `Deleted` block
    fn status_matches_log(&self) -> bool {
        let deleted = self
            .chain()
            .blocks()
            .iter()
            .any(|block| matches!(block.payload(), Transaction::Deleted { .. }));
        deleted != self.is_active()
    }

    fn record_creation(&mut self, profile: Profile) -> Result<Block> {
        let name = profile.name.clone();
        let block = self.chain_mut().append(Transaction::Created { profile })?.clone();
        self.chain_mut().set_name(&name);
        Ok(block)
    }

    fn update(&mut self, update: &ProfileUpdate) -> Result<Block> {
        if !self.is_active() {
            return Err(LedgerError::inactive(Self::KIND, self.subject_id(), "update"));
        }

        let previous = self
            .latest_profile()
            .map(|record| record.profile)
            .unwrap_or_else(|| Profile::new(self.chain().name()));
        let new = previous.overlay(update);
        let name = new.name.clone();

        let block = self
            .chain_mut()
            .append(Transaction::Updated { previous, new })?
            .clone();
        self.chain_mut().set_name(&name);
        Ok(block)
    }

    fn delete(&mut self, reason: &str) -> Result<Block> {
        if !self.is_active() {
            return Err(LedgerError::inactive(Self::KIND, self.subject_id(), "delete"));
        }

        let block = self
            .chain_mut()
            .append(Transaction::Deleted {
                reason: reason.to_string(),
            })?
            .clone();
        self.metadata_mut().deactivate();
        info!(kind = %Self::KIND, subject = %self.subject_id(), reason, "Chain marked inactive");
        Ok(block)
    }
}
