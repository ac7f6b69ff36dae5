use chrono::{DateTime, Utc};
use serde::Serialize;

use super::domain::{
    Money, RegistrantDetails, RegistrationId, RegistrationStatus, StudentRegistration,
};
use super::fees::{AcademicYear, FeeCatalogError};
use super::lifecycle::StatusTransition;
use super::numbering::{NumberingError, RegistrationNumber};
use super::query::{ListCriteria, Page};

/// Payload handed to a store when a registration is created.
///
/// The store derives the registration year from `created_at` and assigns the
/// number itself, in the same atomic unit as the insert.
#[derive(Debug, Clone)]
pub struct NewRegistration {
    pub details: RegistrantDetails,
    pub created_at: DateTime<Utc>,
}

/// Storage abstraction for registrations so services can run against any backend.
///
/// Soft-deleted rows are invisible to every read and write except the number
/// allocator, which still counts them.
pub trait RegistrationRepository: Send + Sync {
    /// Allocates the next number for the creation year and inserts the record atomically.
    fn create(&self, registration: NewRegistration) -> Result<StudentRegistration, RepositoryError>;

    fn fetch(&self, id: RegistrationId) -> Result<Option<StudentRegistration>, RepositoryError>;

    /// Replaces the editable fields; fails with [`RepositoryError::Locked`] unless still pending.
    fn update_details(
        &self,
        id: RegistrationId,
        details: RegistrantDetails,
        updated_at: DateTime<Utc>,
    ) -> Result<StudentRegistration, RepositoryError>;

    fn set_status(
        &self,
        id: RegistrationId,
        status: RegistrationStatus,
        updated_at: DateTime<Utc>,
    ) -> Result<StatusTransition, RepositoryError>;

    fn soft_delete(&self, id: RegistrationId, deleted_at: DateTime<Utc>) -> Result<(), RepositoryError>;

    fn list(&self, criteria: &ListCriteria) -> Result<Page<StudentRegistration>, RepositoryError>;

    fn status_counts(&self) -> Result<StatusCounts, RepositoryError>;

    /// Distinct majors in use, sorted.
    fn distinct_majors(&self) -> Result<Vec<String>, RepositoryError>;

    fn major_counts(&self) -> Result<Vec<MajorCount>, RepositoryError>;

    fn income_summary(
        &self,
        status: Option<RegistrationStatus>,
    ) -> Result<IncomeSummary, RepositoryError>;
}

/// Storage for academic years and their fee lines, persisted as one aggregate.
pub trait FeeCatalogRepository: Send + Sync {
    /// Fails with [`RepositoryError::Duplicate`] when the year already exists.
    fn create_year(&self, year: AcademicYear) -> Result<AcademicYear, RepositoryError>;

    fn fetch_year(&self, year: i32) -> Result<Option<AcademicYear>, RepositoryError>;

    /// Loads `year`, applies `change` and persists the result as one atomic unit.
    ///
    /// Concurrent updates of the same year are serialized. Nothing is written
    /// when `change` fails.
    fn update_year<T>(
        &self,
        year: i32,
        change: impl FnOnce(&mut AcademicYear) -> Result<T, FeeCatalogError>,
    ) -> Result<T, FeeUpdateError>;

    /// All years, newest first.
    fn list_years(&self) -> Result<Vec<AcademicYear>, RepositoryError>;
}

/// Failure of [`FeeCatalogRepository::update_year`]: either the change itself
/// was refused or the store could not apply it.
#[derive(Debug, thiserror::Error)]
pub enum FeeUpdateError {
    #[error(transparent)]
    Catalog(#[from] FeeCatalogError),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// Error enumeration for repository failures.
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("registration number {0} is already taken")]
    NumberCollision(RegistrationNumber),
    #[error("{field} is already registered")]
    Duplicate { field: &'static str },
    #[error("record not found")]
    NotFound,
    #[error("registration is {0} and can no longer be edited")]
    Locked(RegistrationStatus),
    #[error(transparent)]
    Numbering(#[from] NumberingError),
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatusCounts {
    pub pending: u64,
    pub approved: u64,
    pub rejected: u64,
}

impl StatusCounts {
    pub fn record(&mut self, status: RegistrationStatus) {
        self.add(status, 1);
    }

    pub fn add(&mut self, status: RegistrationStatus, count: u64) {
        *self.slot(status) += count;
    }

    pub fn get(&self, status: RegistrationStatus) -> u64 {
        match status {
            RegistrationStatus::Pending => self.pending,
            RegistrationStatus::Approved => self.approved,
            RegistrationStatus::Rejected => self.rejected,
        }
    }

    fn slot(&mut self, status: RegistrationStatus) -> &mut u64 {
        match status {
            RegistrationStatus::Pending => &mut self.pending,
            RegistrationStatus::Approved => &mut self.approved,
            RegistrationStatus::Rejected => &mut self.rejected,
        }
    }

    pub fn total(&self) -> u64 {
        self.pending + self.approved + self.rejected
    }

    /// Dashboard badge: the pending count, hidden when nothing is waiting.
    pub fn pending_badge(&self) -> Option<u64> {
        (self.pending > 0).then_some(self.pending)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MajorCount {
    pub major: String,
    pub registrations: u64,
}

/// Sum of `father_income + mother_income` across matching registrations.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct IncomeSummary {
    pub registrations: u64,
    pub total_parent_income: Money,
}

impl IncomeSummary {
    pub fn average_parent_income(&self) -> Money {
        match i64::try_from(self.registrations) {
            Ok(count) if count > 0 => Money::from_minor(self.total_parent_income.minor() / count),
            _ => Money::ZERO,
        }
    }
}
