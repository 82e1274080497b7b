use super::{ChainDocument, LedgerChain};
use crate::blockchain::{now_millis, Chain, ChainKind, ChainMetadata, ROOT_PARENT_HASH};
use crate::error::Result;

/// Root of the forest: an organizational unit
#[derive(Debug, Clone, PartialEq)]
pub struct UnitChain {
    chain: Chain,
    metadata: ChainMetadata,
}

impl UnitChain {
    pub fn new(unit_id: &str, name: &str, difficulty: u32) -> Result<Self> {
        let chain = Chain::open(ChainKind::Unit, unit_id, name, difficulty, ROOT_PARENT_HASH)?;
        Ok(UnitChain {
            chain,
            metadata: ChainMetadata::new(now_millis()),
        })
    }

    pub fn from_document(doc: ChainDocument) -> Result<Self> {
        doc.expect_kind(ChainKind::Unit)?;
        Ok(UnitChain {
            chain: doc.to_chain(),
            metadata: doc.to_metadata(),
        })
    }
}

impl LedgerChain for UnitChain {
    const KIND: ChainKind = ChainKind::Unit;

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
        None
    }

    fn parent_id(&self) -> Option<&str> {
        None
    }

    fn to_document(&self) -> ChainDocument {
        ChainDocument::from_chain(&self.chain, &self.metadata)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transaction::Profile;

    #[test]
    fn test_unit_genesis_is_root() {
        let unit = UnitChain::new("U1", "Engineering", 1).unwrap();
        assert_eq!(unit.chain().block_at(0).unwrap().prev_hash(), ROOT_PARENT_HASH);
        assert!(unit.verify_parent_link());
        assert!(unit.is_active());
        assert!(unit.parent_id().is_none());
    }

    #[test]
    fn test_unit_document_round_trip() {
        let mut unit = UnitChain::new("U1", "Engineering", 1).unwrap();
        unit.record_creation(Profile::new("Engineering").with_field("code", "ENG")).unwrap();

        let doc = unit.to_document();
        assert_eq!(doc.subject_id, "U1");
        assert!(doc.parent_hash.is_none());

        let restored = UnitChain::from_document(doc).unwrap();
        assert_eq!(restored, unit);
    }
}
