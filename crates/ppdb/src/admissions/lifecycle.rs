use serde::{Deserialize, Serialize};

use super::domain::{RegistrationId, RegistrationStatus, StudentRegistration};
use super::numbering::RegistrationNumber;

/// Field edits are only accepted while the registration awaits a decision.
pub fn can_be_edited(record: &StudentRegistration) -> bool {
    record.registration_status == RegistrationStatus::Pending
}

/// The printable registration slip exists only for accepted students.
pub fn can_be_printed(record: &StudentRegistration) -> bool {
    record.registration_status == RegistrationStatus::Approved
}

pub fn ensure_editable(record: &StudentRegistration) -> Result<(), PermissionDenied> {
    if can_be_edited(record) {
        Ok(())
    } else {
        Err(PermissionDenied {
            action: "edit",
            status: record.registration_status,
        })
    }
}

pub fn ensure_printable(record: &StudentRegistration) -> Result<(), PermissionDenied> {
    if can_be_printed(record) {
        Ok(())
    } else {
        Err(PermissionDenied {
            action: "print",
            status: record.registration_status,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("cannot {action} a registration that is {status}")]
pub struct PermissionDenied {
    pub action: &'static str,
    pub status: RegistrationStatus,
}

/// Outcome of a single status change.
///
/// Every transition between the three states is accepted; the ones that undo
/// a decision are reported through [`StatusTransition::is_flagged`] so callers
/// can surface them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusTransition {
    pub id: RegistrationId,
    pub registration_number: RegistrationNumber,
    pub from: RegistrationStatus,
    pub to: RegistrationStatus,
}

impl StatusTransition {
    /// A decided registration was sent back to pending.
    pub fn reopened(&self) -> bool {
        self.from.is_terminal() && self.to == RegistrationStatus::Pending
    }

    pub fn is_noop(&self) -> bool {
        self.from == self.to
    }

    /// Reopened, or flipped straight from one decision to the other.
    pub fn is_flagged(&self) -> bool {
        self.reopened() || (self.from.is_terminal() && self.to.is_terminal() && !self.is_noop())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct BulkStatusRequest {
    pub ids: Vec<RegistrationId>,
    pub status: RegistrationStatus,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BulkItemFailure {
    pub id: RegistrationId,
    pub reason: String,
}

/// Per-record result of a bulk status change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BulkStatusReport {
    pub status: RegistrationStatus,
    pub succeeded: Vec<StatusTransition>,
    pub failed: Vec<BulkItemFailure>,
}

impl BulkStatusReport {
    pub fn new(status: RegistrationStatus) -> Self {
        Self {
            status,
            succeeded: Vec::new(),
            failed: Vec::new(),
        }
    }

    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }

    pub fn succeeded_ids(&self) -> Vec<RegistrationId> {
        self.succeeded.iter().map(|transition| transition.id).collect()
    }

    pub fn failed_ids(&self) -> Vec<RegistrationId> {
        self.failed.iter().map(|failure| failure.id).collect()
    }
}
