//! Size and content limits on payloads
use crate::error::LedgerError;
use crate::transaction::types::{Profile, Transaction, MAX_PAYLOAD_SIZE};

/// Maximum length of a display name or genesis label
pub const MAX_NAME_LENGTH: usize = 256;
/// Maximum length of a deletion reason
pub const MAX_REASON_LENGTH: usize = 512;
/// Maximum number of attributes on a profile
pub const MAX_FIELDS: usize = 64;

impl Transaction {
    /// Stateless checks run before a payload is sealed into a block.
    pub fn validate(&self) -> Result<(), LedgerError> {
        match self {
            Transaction::Genesis { label } => validate_text("Genesis label", label, MAX_NAME_LENGTH)?,
            Transaction::Created { profile } => validate_profile(profile)?,
            Transaction::Updated { new, .. } => validate_profile(new)?,
            Transaction::Deleted { reason } => {
                if reason.len() > MAX_REASON_LENGTH {
                    return Err(LedgerError::InvalidPayload(format!(
                        "Deletion reason exceeds maximum length of {} characters",
                        MAX_REASON_LENGTH
                    )));
                }
            }
            Transaction::Enrolled { target_id } => validate_text("Enrollment target", target_id, MAX_NAME_LENGTH)?,
            Transaction::EventRecorded { recorded_by, .. } => {
                validate_text("Event recorder", recorded_by, MAX_NAME_LENGTH)?
            }
        }
        self.validate_size()
    }

    /// Validate payload size so a single block cannot grow without bound
    pub fn validate_size(&self) -> Result<(), LedgerError> {
        let size = bincode::serialized_size(self)
            .map_err(|e| LedgerError::InvalidPayload(format!("Serialization failed: {}", e)))?;

        if size > MAX_PAYLOAD_SIZE {
            return Err(LedgerError::InvalidPayload(format!(
                "Payload too large: {} bytes (max: {})",
                size, MAX_PAYLOAD_SIZE
            )));
        }
        Ok(())
    }
}

fn validate_profile(profile: &Profile) -> Result<(), LedgerError> {
    validate_text("Name", &profile.name, MAX_NAME_LENGTH)?;
    if profile.fields.len() > MAX_FIELDS {
        return Err(LedgerError::InvalidPayload(format!(
            "Profile has {} fields (max: {})",
            profile.fields.len(),
            MAX_FIELDS
        )));
    }
    Ok(())
}

fn validate_text(what: &str, value: &str, max: usize) -> Result<(), LedgerError> {
    if value.trim().is_empty() {
        return Err(LedgerError::InvalidPayload(format!("{} cannot be empty", what)));
    }
    if value.len() > max {
        return Err(LedgerError::InvalidPayload(format!(
            "{} exceeds maximum length of {} characters",
            what, max
        )));
    }
    Ok(())
}
