//! New-student admissions: registration intake, review and the fee catalog.
//!
//! Registrations are validated against the declarative form in [`descriptor`],
//! numbered per calendar year and stored through [`RegistrationRepository`].
//! Both an in-memory and a SQLite store are provided; services and the HTTP
//! router are generic over either.

pub mod clock;
pub mod descriptor;
pub mod domain;
pub mod error;
pub mod fees;
pub mod lifecycle;
pub mod memory;
pub mod numbering;
pub mod query;
pub mod report;
pub mod repository;
pub mod router;
pub mod service;
pub mod sqlite;
pub mod validation;

#[cfg(test)]
mod tests;

pub use clock::{Clock, FixedClock, SystemClock};
pub use descriptor::{FieldDescriptor, FieldKind, Rule, Section, REGISTRATION_FIELDS};
pub use domain::{
    BloodType, ChildStatus, Gender, Money, PreviousSchoolType, ReferenceSource, RegistrantDetails,
    RegistrationId, RegistrationStatus, RegistrationView, Religion, ResidenceStatus,
    SearchResultView, StudentRegistration, Transportation, UniformSize, UnknownVariant,
};
pub use error::ServiceError;
pub use fees::{
    AcademicYear, AcademicYearView, FeeCatalogError, FeeCatalogService, FeeDraft, FeeEntry,
    FeeEntryId,
};
pub use lifecycle::{
    can_be_edited, can_be_printed, BulkItemFailure, BulkStatusReport, BulkStatusRequest,
    PermissionDenied, StatusTransition,
};
pub use memory::{MemoryFeeCatalogRepository, MemoryRegistrationRepository};
pub use numbering::{NumberingError, RegistrationNumber};
pub use query::{Page, Pagination, RegistrationQuery, SortDirection, SortKey};
pub use report::AdmissionsSummary;
pub use repository::{
    FeeCatalogRepository, FeeUpdateError, IncomeSummary, MajorCount, RegistrationRepository,
    RepositoryError, StatusCounts,
};
pub use router::{admissions_router, AdmissionsState};
pub use service::RegistrationService;
pub use sqlite::SqliteStore;
pub use validation::{validate_details, FieldError, ValidationErrors};
