use super::{ChainDocument, LedgerChain};
use crate::blockchain::{now_millis, Chain, ChainKind, ChainMetadata};
use crate::error::Result;

/// A group inside a unit. Its genesis block sits on the unit's latest hash
/// as it was when the group was created.
#[derive(Debug, Clone, PartialEq)]
pub struct GroupChain {
    chain: Chain,
    metadata: ChainMetadata,
    unit_id: String,
    parent_hash: String,
}

impl GroupChain {
    pub fn new(group_id: &str, name: &str, unit_id: &str, unit_hash: &str, difficulty: u32) -> Result<Self> {
        let chain = Chain::open(ChainKind::Group, group_id, name, difficulty, unit_hash)?;
        Ok(GroupChain {
            chain,
            metadata: ChainMetadata::new(now_millis()),
            unit_id: unit_id.to_string(),
            parent_hash: unit_hash.to_string(),
        })
    }

    pub fn from_document(doc: ChainDocument) -> Result<Self> {
        doc.expect_kind(ChainKind::Group)?;
        let unit_id = doc.require(&doc.unit_id, "unitId")?.to_string();
        let parent_hash = doc.require(&doc.parent_hash, "parentHash")?.to_string();
        Ok(GroupChain {
            chain: doc.to_chain(),
            metadata: doc.to_metadata(),
            unit_id,
            parent_hash,
        })
    }

    pub fn unit_id(&self) -> &str {
        &self.unit_id
    }
}

impl LedgerChain for GroupChain {
    const KIND: ChainKind = ChainKind::Group;

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
        Some(&self.unit_id)
    }

    fn to_document(&self) -> ChainDocument {
        let mut doc = ChainDocument::from_chain(&self.chain, &self.metadata);
        doc.parent_hash = Some(self.parent_hash.clone());
        doc.unit_id = Some(self.unit_id.clone());
        doc
    }
}
