use std::collections::HashSet;
use std::sync::Arc;

use tracing::{info, warn};

use super::clock::Clock;
use super::domain::{
    RegistrantDetails, RegistrationId, RegistrationStatus, RegistrationView, SearchResultView,
    StudentRegistration,
};
use super::error::ServiceError;
use super::lifecycle::{
    ensure_editable, ensure_printable, BulkItemFailure, BulkStatusReport, StatusTransition,
};
use super::query::{
    Page, RegistrationQuery, SortDirection, SortKey, DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE,
};
use super::repository::{
    IncomeSummary, MajorCount, NewRegistration, RegistrationRepository, RepositoryError,
    StatusCounts,
};
use super::validation::validate_details;

/// Service owning the registration lifecycle: intake, edits, decisions and listings.
pub struct RegistrationService<R> {
    repository: Arc<R>,
    clock: Arc<dyn Clock>,
    page_size: u32,
}

impl<R> RegistrationService<R>
where
    R: RegistrationRepository + 'static,
{
    pub fn new(repository: Arc<R>, clock: Arc<dyn Clock>) -> Self {
        Self {
            repository,
            clock,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }

    /// Overrides the page size used when a listing does not ask for one.
    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size.clamp(1, MAX_PAGE_SIZE);
        self
    }

    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    /// Validate and store a new registration; it starts out pending with a fresh number.
    pub fn submit(&self, details: RegistrantDetails) -> Result<StudentRegistration, ServiceError> {
        let details = details.normalized();
        validate_details(&details, self.clock.today())?;

        let registration = NewRegistration {
            details,
            created_at: self.clock.now(),
        };
        let stored = match self.repository.create(registration.clone()) {
            Err(RepositoryError::NumberCollision(number)) => {
                warn!(registration_number = %number, "registration number collision, retrying once");
                self.repository.create(registration)?
            }
            other => other?,
        };

        info!(
            id = %stored.id,
            registration_number = %stored.registration_number,
            major = %stored.details.selected_major,
            "registration submitted"
        );
        Ok(stored)
    }

    pub fn get(&self, id: RegistrationId) -> Result<StudentRegistration, ServiceError> {
        self.repository
            .fetch(id)?
            .ok_or_else(|| ServiceError::not_found("registration", id))
    }

    /// Registration with its derived fields resolved against today's date.
    pub fn view(&self, id: RegistrationId) -> Result<RegistrationView, ServiceError> {
        Ok(self.get(id)?.view(self.clock.today()))
    }

    /// Replace the registrant's details; only pending registrations accept edits.
    pub fn update(
        &self,
        id: RegistrationId,
        details: RegistrantDetails,
    ) -> Result<StudentRegistration, ServiceError> {
        let current = self.get(id)?;
        ensure_editable(&current)?;

        let details = details.normalized();
        validate_details(&details, self.clock.today())?;

        let updated = self
            .repository
            .update_details(id, details, self.clock.now())
            .map_err(|err| missing_as_not_found(err, id))?;
        info!(id = %id, registration_number = %updated.registration_number, "registration updated");
        Ok(updated)
    }

    pub fn set_status(
        &self,
        id: RegistrationId,
        status: RegistrationStatus,
    ) -> Result<StatusTransition, ServiceError> {
        let transition = self
            .repository
            .set_status(id, status, self.clock.now())
            .map_err(|err| missing_as_not_found(err, id))?;
        log_transition(&transition);
        Ok(transition)
    }

    /// Applies `status` to each id separately; one failure never blocks the others.
    pub fn bulk_set_status(
        &self,
        ids: &[RegistrationId],
        status: RegistrationStatus,
    ) -> BulkStatusReport {
        let mut report = BulkStatusReport::new(status);
        let mut seen = HashSet::new();

        for id in ids.iter().copied().filter(|id| seen.insert(*id)) {
            match self.set_status(id, status) {
                Ok(transition) => report.succeeded.push(transition),
                Err(err) => {
                    warn!(id = %id, status = %status, error = %err, "bulk status change failed");
                    report.failed.push(BulkItemFailure {
                        id,
                        reason: err.to_string(),
                    });
                }
            }
        }

        info!(
            status = %status,
            succeeded = report.succeeded.len(),
            failed = report.failed.len(),
            "bulk status change finished"
        );
        report
    }

    /// Soft delete: the row disappears from reads but keeps its registration number.
    pub fn delete(&self, id: RegistrationId) -> Result<(), ServiceError> {
        self.repository
            .soft_delete(id, self.clock.now())
            .map_err(|err| missing_as_not_found(err, id))?;
        info!(id = %id, "registration deleted");
        Ok(())
    }

    pub fn list(&self, query: &RegistrationQuery) -> Result<Page<StudentRegistration>, ServiceError> {
        let criteria = query.resolve(self.clock.today(), self.page_size);
        Ok(self.repository.list(&criteria)?)
    }

    /// Listing page with derived fields attached to every row.
    pub fn list_views(&self, query: &RegistrationQuery) -> Result<Page<RegistrationView>, ServiceError> {
        let today = self.clock.today();
        Ok(self.list(query)?.map(|record| record.view(today)))
    }

    /// Global search: newest matches first, at most `limit` of them.
    pub fn search(&self, term: &str, limit: u32) -> Result<Vec<SearchResultView>, ServiceError> {
        if term.trim().is_empty() {
            return Ok(Vec::new());
        }
        let query = RegistrationQuery {
            per_page: Some(limit),
            ..RegistrationQuery::default()
        }
        .with_search(term)
        .sorted_by(SortKey::CreatedAt, SortDirection::Desc);

        let page = self.list(&query)?;
        Ok(page.items.iter().map(StudentRegistration::search_details).collect())
    }

    pub fn distinct_majors(&self) -> Result<Vec<String>, ServiceError> {
        Ok(self.repository.distinct_majors()?)
    }

    pub fn major_counts(&self) -> Result<Vec<MajorCount>, ServiceError> {
        Ok(self.repository.major_counts()?)
    }

    pub fn status_counts(&self) -> Result<StatusCounts, ServiceError> {
        Ok(self.repository.status_counts()?)
    }

    /// Number shown on the navigation badge; `None` when nothing is pending.
    pub fn pending_badge(&self) -> Result<Option<u64>, ServiceError> {
        Ok(self.status_counts()?.pending_badge())
    }

    pub fn income_summary(
        &self,
        status: Option<RegistrationStatus>,
    ) -> Result<IncomeSummary, ServiceError> {
        Ok(self.repository.income_summary(status)?)
    }

    /// Printable slip; only approved registrations have one.
    pub fn print_view(&self, id: RegistrationId) -> Result<RegistrationView, ServiceError> {
        let record = self.get(id)?;
        ensure_printable(&record)?;
        Ok(record.view(self.clock.today()))
    }
}

fn missing_as_not_found(err: RepositoryError, id: RegistrationId) -> ServiceError {
    match err {
        RepositoryError::NotFound => ServiceError::not_found("registration", id),
        other => other.into(),
    }
}

fn log_transition(transition: &StatusTransition) {
    if transition.is_flagged() {
        warn!(
            id = %transition.id,
            registration_number = %transition.registration_number,
            from = %transition.from,
            to = %transition.to,
            "decided registration changed status"
        );
    } else {
        info!(
            id = %transition.id,
            registration_number = %transition.registration_number,
            from = %transition.from,
            to = %transition.to,
            "registration status changed"
        );
    }
}
