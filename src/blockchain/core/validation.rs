use crate::blockchain::core::block::meets_difficulty;
use crate::blockchain::core::chain::Chain;
use std::fmt;

/// A single structural defect found while auditing a chain
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChainFault {
    Empty,
    IndexMismatch { position: usize, found: u64 },
    HashMismatch { index: u64 },
    InsufficientWork { index: u64 },
    BrokenLink { index: u64 },
}

impl fmt::Display for ChainFault {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ChainFault::Empty => write!(f, "Chain has no genesis block"),
            ChainFault::IndexMismatch { position, found } => {
                write!(f, "Block at position {} has index {}", position, found)
            }
            ChainFault::HashMismatch { index } => write!(f, "Block {} has invalid hash", index),
            ChainFault::InsufficientWork { index } => {
                write!(f, "Block {} does not meet the proof-of-work target", index)
            }
            ChainFault::BrokenLink { index } => write!(f, "Block {} has invalid prev_hash", index),
        }
    }
}

impl Chain {
    /// Lazily yields every fault, block by block.
    fn faults(&self) -> impl Iterator<Item = ChainFault> + '_ {
        let empty = self.blocks.is_empty().then_some(ChainFault::Empty);

        let per_block = self.blocks.iter().enumerate().flat_map(move |(position, block)| {
            let mut faults = Vec::new();

            if block.index != position as u64 {
                faults.push(ChainFault::IndexMismatch {
                    position,
                    found: block.index,
                });
            }

            match block.calculate_hash() {
                Ok(hash) if hash == block.hash => {
                    if !meets_difficulty(&block.hash, self.difficulty()) {
                        faults.push(ChainFault::InsufficientWork { index: block.index });
                    }
                }
                _ => faults.push(ChainFault::HashMismatch { index: block.index }),
            }

            if position > 0 && block.prev_hash != self.blocks[position - 1].hash {
                faults.push(ChainFault::BrokenLink { index: block.index });
            }

            faults
        });

        empty.into_iter().chain(per_block)
    }

    /// Whole-chain validation, stopping at the first fault
    pub fn is_valid(&self) -> bool {
        self.first_fault().is_none()
    }

    pub fn first_fault(&self) -> Option<ChainFault> {
        self.faults().next()
    }

    /// Every fault in the chain, for diagnostics
    pub fn audit(&self) -> Vec<ChainFault> {
        self.faults().collect()
    }
}
