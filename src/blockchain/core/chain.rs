use crate::blockchain::core::block::{now_millis, Block, BlockHash};
use crate::error::LedgerError;
use crate::transaction::{Profile, Transaction};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::info;

/// Proof-of-work target for newly created chains
pub const DEFAULT_DIFFICULTY: u32 = 4;

/// Which layer of the hierarchy a chain belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChainKind {
    Unit,
    Group,
    Member,
}

impl fmt::Display for ChainKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ChainKind::Unit => write!(f, "unit"),
            ChainKind::Group => write!(f, "group"),
            ChainKind::Member => write!(f, "member"),
        }
    }
}

/// One line of a chain's change history
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistoryEntry {
    pub block_index: u64,
    pub action: &'static str,
    pub timestamp: u64,
    pub payload: Transaction,
    pub hash: BlockHash,
}

/// Result of the backward scan for the most recent profile
#[derive(Debug, Clone, PartialEq)]
pub struct ProfileRecord {
    pub profile: Profile,
    pub block_index: u64,
    pub recorded_at: u64,
}

/// Ordered, append-only block sequence for one subject
#[derive(Debug, Clone, PartialEq)]
pub struct Chain {
    subject_id: String,
    name: String,
    kind: ChainKind,
    difficulty: u32,
    pub(crate) blocks: Vec<Block>,
}

impl Chain {
    /// Create a chain and seal its genesis block on top of `parent_hash`.
    pub fn open(
        kind: ChainKind,
        subject_id: &str,
        name: &str,
        difficulty: u32,
        parent_hash: &str,
    ) -> Result<Self, LedgerError> {
        let mut chain = Chain {
            subject_id: subject_id.to_string(),
            name: name.to_string(),
            kind,
            difficulty,
            blocks: Vec::new(),
        };
        chain.create_genesis(parent_hash)?;
        Ok(chain)
    }

    /// Rebuild a chain from stored blocks exactly as they were written.
    /// Nothing is re-mined; corruption stays visible to validation.
    pub fn from_parts(
        kind: ChainKind,
        subject_id: String,
        name: String,
        difficulty: u32,
        blocks: Vec<Block>,
    ) -> Self {
        Chain {
            subject_id,
            name,
            kind,
            difficulty,
            blocks,
        }
    }

    fn create_genesis(&mut self, parent_hash: &str) -> Result<&Block, LedgerError> {
        let payload = Transaction::Genesis {
            label: format!("Genesis block for {}: {}", self.kind, self.name),
        };
        let genesis = Block::seal(0, now_millis(), payload, parent_hash.to_string(), self.difficulty)?;
        info!(kind = %self.kind, subject = %self.subject_id, hash = %genesis.hash, "Genesis block sealed");
        self.blocks.push(genesis);
        Ok(&self.blocks[0])
    }

    /// The only write primitive: seal `payload` on top of the latest block.
    pub fn append(&mut self, payload: Transaction) -> Result<&Block, LedgerError> {
        payload.validate()?;

        let prev_hash = self
            .latest()
            .map(|block| block.hash.clone())
            .ok_or_else(|| LedgerError::CorruptChain {
                kind: self.kind,
                id: self.subject_id.clone(),
                reason: "Cannot append to a chain without a genesis block".to_string(),
            })?;

        let index = self.blocks.len() as u64;
        let block = Block::seal(index, now_millis(), payload, prev_hash, self.difficulty)?;
        self.blocks.push(block);
        Ok(&self.blocks[self.blocks.len() - 1])
    }

    /// Genesis predecessor equals the expected parent snapshot hash
    pub fn verify_parent_link(&self, expected_hash: &str) -> bool {
        self.blocks
            .first()
            .map(|genesis| genesis.prev_hash == expected_hash)
            .unwrap_or(false)
    }

    /// True when some block of this chain carries `hash`
    pub fn contains_hash(&self, hash: &str) -> bool {
        self.blocks.iter().any(|block| block.hash == hash)
    }

    /// Most recent `Created`/`Updated` profile, found by scanning backwards
    pub fn latest_profile(&self) -> Option<ProfileRecord> {
        self.blocks.iter().rev().find_map(|block| {
            block.payload.profile().map(|profile| ProfileRecord {
                profile: profile.clone(),
                block_index: block.index,
                recorded_at: block.created_at,
            })
        })
    }

    /// Every block after genesis as a history line
    pub fn history(&self) -> Vec<HistoryEntry> {
        self.blocks
            .iter()
            .skip(1)
            .map(|block| HistoryEntry {
                block_index: block.index,
                action: block.payload.action(),
                timestamp: block.created_at,
                payload: block.payload.clone(),
                hash: block.hash.clone(),
            })
            .collect()
    }

    pub fn latest(&self) -> Option<&Block> {
        self.blocks.last()
    }

    pub fn latest_hash(&self) -> Option<&str> {
        self.latest().map(|block| block.hash.as_str())
    }

    pub fn block_at(&self, index: usize) -> Option<&Block> {
        self.blocks.get(index)
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn subject_id(&self) -> &str {
        &self.subject_id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn set_name(&mut self, name: &str) {
        self.name = name.to_string();
    }

    pub fn kind(&self) -> ChainKind {
        self.kind
    }

    pub fn difficulty(&self) -> u32 {
        self.difficulty
    }
}
