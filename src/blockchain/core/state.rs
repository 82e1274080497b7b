use crate::transaction::EventKind;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle status. Flips to `Inactive` once a `Deleted` block is appended
/// and is never reverted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    #[default]
    Active,
    Inactive,
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Status::Active => write!(f, "active"),
            Status::Inactive => write!(f, "inactive"),
        }
    }
}

/// Chain metadata tracked beside the blocks rather than re-derived from them
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainMetadata {
    pub created: u64,
    pub status: Status,
}

impl ChainMetadata {
    pub fn new(created: u64) -> Self {
        Self {
            created,
            status: Status::Active,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == Status::Active
    }

    pub(crate) fn deactivate(&mut self) {
        self.status = Status::Inactive;
    }
}

/// Running event counters of a member
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttendanceCounters {
    pub present: u64,
    pub absent: u64,
    pub leave: u64,
}

impl AttendanceCounters {
    pub fn record(&mut self, kind: EventKind) {
        let counter = match kind {
            EventKind::Present => &mut self.present,
            EventKind::Absent => &mut self.absent,
            EventKind::Leave => &mut self.leave,
        };
        *counter = counter.saturating_add(1);
    }

    pub fn total(&self) -> u64 {
        self.present + self.absent + self.leave
    }

    /// Share of `Present` events in percent; 0 when nothing was recorded.
    pub fn percentage(&self) -> f64 {
        let total = self.total();
        if total == 0 {
            return 0.0;
        }
        self.present as f64 / total as f64 * 100.0
    }
}
