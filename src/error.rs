//! Error types for RollChain

use crate::blockchain::ChainKind;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    #[error("{kind} '{id}' already exists")]
    DuplicateId { kind: ChainKind, id: String },

    #[error("{kind} '{id}' not found")]
    NotFound { kind: ChainKind, id: String },

    #[error("Cannot create {kind} '{id}' under inactive parent '{parent}'")]
    InactiveParent {
        kind: ChainKind,
        id: String,
        parent: String,
    },

    #[error("Invalid event kind '{0}'. Must be Present, Absent, or Leave")]
    InvalidEventKind(String),

    #[error("Member '{member}' is not enrolled in {}", describe_group(.group))]
    NotEnrolled {
        member: String,
        group: Option<String>,
    },

    #[error("Cannot {operation} inactive {kind} '{id}'")]
    InactiveSubject {
        kind: ChainKind,
        id: String,
        operation: &'static str,
    },

    #[error("Corrupt {kind} chain '{id}': {reason}")]
    CorruptChain {
        kind: ChainKind,
        id: String,
        reason: String,
    },

    #[error("Invalid payload: {0}")]
    InvalidPayload(String),

    #[error("Nonce space exhausted while sealing block {index}")]
    MiningExhausted { index: u64 },

    #[error("Snapshot error: {0}")]
    Snapshot(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl LedgerError {
    pub fn not_found(kind: ChainKind, id: &str) -> Self {
        LedgerError::NotFound {
            kind,
            id: id.to_string(),
        }
    }

    pub fn duplicate(kind: ChainKind, id: &str) -> Self {
        LedgerError::DuplicateId {
            kind,
            id: id.to_string(),
        }
    }

    pub fn inactive(kind: ChainKind, id: &str, operation: &'static str) -> Self {
        LedgerError::InactiveSubject {
            kind,
            id: id.to_string(),
            operation,
        }
    }
}

fn describe_group(group: &Option<String>) -> String {
    match group {
        Some(id) => format!("group '{}'", id),
        None => "any group".to_string(),
    }
}

impl From<std::io::Error> for LedgerError {
    fn from(err: std::io::Error) -> Self {
        LedgerError::Storage(err.to_string())
    }
}

impl From<serde_json::Error> for LedgerError {
    fn from(err: serde_json::Error) -> Self {
        LedgerError::Snapshot(format!("JSON error: {}", err))
    }
}

impl From<rusqlite::Error> for LedgerError {
    fn from(err: rusqlite::Error) -> Self {
        LedgerError::Storage(format!("Database error: {}", err))
    }
}

impl From<toml::de::Error> for LedgerError {
    fn from(err: toml::de::Error) -> Self {
        LedgerError::Config(err.to_string())
    }
}

/// Convenience alias used across the crate
pub type Result<T> = std::result::Result<T, LedgerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages_carry_context() {
        let err = LedgerError::not_found(ChainKind::Group, "G1");
        assert_eq!(err.to_string(), "group 'G1' not found");

        let err = LedgerError::InactiveParent {
            kind: ChainKind::Group,
            id: "G2".to_string(),
            parent: "U1".to_string(),
        };
        assert!(err.to_string().contains("inactive parent 'U1'"));

        let err = LedgerError::inactive(ChainKind::Member, "M1", "record events for");
        assert_eq!(err.to_string(), "Cannot record events for inactive member 'M1'");

        let err = LedgerError::NotEnrolled {
            member: "M1".to_string(),
            group: None,
        };
        assert_eq!(err.to_string(), "Member 'M1' is not enrolled in any group");
    }
}
