//! Payload types carried by ledger blocks
use crate::error::LedgerError;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Maximum payload size in bytes (64KB) to keep mining input bounded
pub const MAX_PAYLOAD_SIZE: u64 = 64_000;

/// Free-form entity attributes. A `BTreeMap` keeps serialization order stable,
/// which the block hash depends on. Floats must parse back bit for bit from a
/// snapshot, so serde_json is built with `float_roundtrip`.
pub type Fields = BTreeMap<String, serde_json::Value>;

/// Display name plus attributes of a unit, group or member
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub name: String,
    #[serde(default)]
    pub fields: Fields,
}

impl Profile {
    pub fn new(name: impl Into<String>) -> Self {
        Profile {
            name: name.into(),
            fields: Fields::new(),
        }
    }

    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    /// Apply an update on top of this profile: rename if a name is given,
    /// overlay the given fields on the existing ones.
    pub fn overlay(&self, update: &ProfileUpdate) -> Profile {
        let mut fields = self.fields.clone();
        for (key, value) in &update.fields {
            fields.insert(key.clone(), value.clone());
        }
        Profile {
            name: update.name.clone().unwrap_or_else(|| self.name.clone()),
            fields,
        }
    }

    /// Case-insensitive match against the name and every string-valued field.
    pub fn matches(&self, term: &str) -> bool {
        text_matches(&self.name, &self.fields, term)
    }
}

pub(crate) fn text_matches(name: &str, fields: &Fields, term: &str) -> bool {
    let needle = term.to_lowercase();
    if name.to_lowercase().contains(&needle) {
        return true;
    }
    fields.values().any(|value| {
        value
            .as_str()
            .map(|s| s.to_lowercase().contains(&needle))
            .unwrap_or(false)
    })
}

/// Partial profile change requested by a caller
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProfileUpdate {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub fields: Fields,
}

impl ProfileUpdate {
    pub fn rename(name: impl Into<String>) -> Self {
        ProfileUpdate {
            name: Some(name.into()),
            fields: Fields::new(),
        }
    }

    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }
}

/// The closed set of member events
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventKind {
    Present,
    Absent,
    Leave,
}

impl EventKind {
    pub const ALL: [EventKind; 3] = [EventKind::Present, EventKind::Absent, EventKind::Leave];

    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Present => "Present",
            EventKind::Absent => "Absent",
            EventKind::Leave => "Leave",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventKind {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EventKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| LedgerError::InvalidEventKind(s.to_string()))
    }
}

/// A block payload. Every ledger action is exactly one of these variants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all_fields = "camelCase")]
pub enum Transaction {
    Genesis {
        label: String,
    },
    Created {
        profile: Profile,
    },
    Updated {
        previous: Profile,
        new: Profile,
    },
    Deleted {
        reason: String,
    },
    Enrolled {
        target_id: String,
    },
    EventRecorded {
        kind: EventKind,
        date: NaiveDate,
        recorded_by: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        group_id: Option<String>,
    },
}

impl Transaction {
    /// Short action name used by history views
    pub fn action(&self) -> &'static str {
        match self {
            Transaction::Genesis { .. } => "genesis",
            Transaction::Created { .. } => "create",
            Transaction::Updated { .. } => "update",
            Transaction::Deleted { .. } => "delete",
            Transaction::Enrolled { .. } => "enroll",
            Transaction::EventRecorded { .. } => "record_event",
        }
    }

    /// The profile this transaction establishes, if any
    pub fn profile(&self) -> Option<&Profile> {
        match self {
            Transaction::Created { profile } => Some(profile),
            Transaction::Updated { new, .. } => Some(new),
            _ => None,
        }
    }

    /// Canonical byte encoding fed into the block hash
    pub fn canonical_bytes(&self) -> Result<Vec<u8>, LedgerError> {
        serde_json::to_vec(self)
            .map_err(|e| LedgerError::InvalidPayload(format!("Serialization failed: {}", e)))
    }
}
