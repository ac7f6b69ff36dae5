use super::fees::FeeCatalogError;
use super::lifecycle::PermissionDenied;
use super::numbering::NumberingError;
use super::repository::RepositoryError;
use super::validation::ValidationErrors;

/// Error raised by the admission services.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error(transparent)]
    Validation(#[from] ValidationErrors),
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: String },
    #[error("conflict: {0}")]
    Conflict(String),
    #[error(transparent)]
    Permission(#[from] PermissionDenied),
    #[error(transparent)]
    Repository(RepositoryError),
}

impl ServiceError {
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    /// Whether the caller may simply try the same request again.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ServiceError::Conflict(_))
    }
}

impl From<RepositoryError> for ServiceError {
    fn from(value: RepositoryError) -> Self {
        match value {
            RepositoryError::Duplicate { field } => {
                ServiceError::Validation(ValidationErrors::single(field, "has already been taken"))
            }
            RepositoryError::NumberCollision(number) => {
                ServiceError::Conflict(format!("registration number {number} is already taken"))
            }
            RepositoryError::Numbering(NumberingError::SequenceExhausted { year }) => {
                ServiceError::Conflict(format!("no registration numbers left for {year}"))
            }
            RepositoryError::Locked(status) => ServiceError::Permission(PermissionDenied {
                action: "edit",
                status,
            }),
            RepositoryError::NotFound => ServiceError::not_found("record", "requested"),
            other => ServiceError::Repository(other),
        }
    }
}

impl From<FeeCatalogError> for ServiceError {
    fn from(value: FeeCatalogError) -> Self {
        match value {
            FeeCatalogError::Validation(errors) => ServiceError::Validation(errors),
            FeeCatalogError::FeeNotFound { year, id } => {
                ServiceError::not_found("fee", format!("{id} in academic year {year}"))
            }
        }
    }
}
