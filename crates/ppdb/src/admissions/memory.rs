use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Datelike, Utc};

use super::domain::{RegistrantDetails, RegistrationId, RegistrationStatus, StudentRegistration};
use super::fees::{AcademicYear, FeeCatalogError};
use super::lifecycle::StatusTransition;
use super::numbering::SequenceLedger;
use super::query::{compare, ListCriteria, Page};
use super::repository::{
    FeeCatalogRepository, FeeUpdateError, IncomeSummary, MajorCount, NewRegistration,
    RegistrationRepository, RepositoryError, StatusCounts,
};

#[derive(Debug, Default)]
struct RegistrationState {
    next_id: u64,
    records: BTreeMap<RegistrationId, StudentRegistration>,
    sequences: SequenceLedger,
}

impl RegistrationState {
    fn live(&self) -> impl Iterator<Item = &StudentRegistration> {
        self.records.values().filter(|record| !record.is_deleted())
    }

    fn live_mut(&mut self, id: RegistrationId) -> Result<&mut StudentRegistration, RepositoryError> {
        self.records
            .get_mut(&id)
            .filter(|record| !record.is_deleted())
            .ok_or(RepositoryError::NotFound)
    }

    /// Unique keys among non-deleted rows, ignoring `except`.
    fn ensure_unique(
        &self,
        details: &RegistrantDetails,
        except: Option<RegistrationId>,
    ) -> Result<(), RepositoryError> {
        for other in self.live().filter(|record| Some(record.id) != except) {
            if other.details.nik == details.nik {
                return Err(RepositoryError::Duplicate { field: "nik" });
            }
            if other.details.nisn == details.nisn {
                return Err(RepositoryError::Duplicate { field: "nisn" });
            }
            if other.details.email.eq_ignore_ascii_case(&details.email) {
                return Err(RepositoryError::Duplicate { field: "email" });
            }
        }
        Ok(())
    }
}

/// Process-local registration store; a single mutex makes every operation atomic.
#[derive(Debug, Default, Clone)]
pub struct MemoryRegistrationRepository {
    state: Arc<Mutex<RegistrationState>>,
}

impl MemoryRegistrationRepository {
    /// Store pre-loaded with existing rows; their numbers seed the per-year counters.
    pub fn with_records(records: impl IntoIterator<Item = StudentRegistration>) -> Self {
        let mut state = RegistrationState::default();
        for record in records {
            state.next_id = state.next_id.max(record.id.0);
            state.sequences.observe(&record.registration_number);
            state.records.insert(record.id, record);
        }
        Self {
            state: Arc::new(Mutex::new(state)),
        }
    }

    fn state(&self) -> MutexGuard<'_, RegistrationState> {
        self.state.lock().expect("repository mutex poisoned")
    }

    /// Every stored row, soft-deleted ones included.
    pub fn all_records(&self) -> Vec<StudentRegistration> {
        self.state().records.values().cloned().collect()
    }
}

impl RegistrationRepository for MemoryRegistrationRepository {
    fn create(&self, registration: NewRegistration) -> Result<StudentRegistration, RepositoryError> {
        let mut state = self.state();
        state.ensure_unique(&registration.details, None)?;

        let number = state.sequences.allocate(registration.created_at.year())?;
        if state
            .records
            .values()
            .any(|record| record.registration_number == number)
        {
            return Err(RepositoryError::NumberCollision(number));
        }

        state.next_id += 1;
        let record = StudentRegistration {
            id: RegistrationId(state.next_id),
            registration_number: number,
            details: registration.details,
            registration_status: RegistrationStatus::Pending,
            created_at: registration.created_at,
            updated_at: registration.created_at,
            deleted_at: None,
        };
        state.records.insert(record.id, record.clone());
        Ok(record)
    }

    fn fetch(&self, id: RegistrationId) -> Result<Option<StudentRegistration>, RepositoryError> {
        let state = self.state();
        Ok(state.records.get(&id).filter(|record| !record.is_deleted()).cloned())
    }

    fn update_details(
        &self,
        id: RegistrationId,
        details: RegistrantDetails,
        updated_at: DateTime<Utc>,
    ) -> Result<StudentRegistration, RepositoryError> {
        let mut state = self.state();
        let status = state.live_mut(id)?.registration_status;
        if status != RegistrationStatus::Pending {
            return Err(RepositoryError::Locked(status));
        }
        state.ensure_unique(&details, Some(id))?;

        let record = state.live_mut(id)?;
        record.details = details;
        record.updated_at = updated_at;
        Ok(record.clone())
    }

    fn set_status(
        &self,
        id: RegistrationId,
        status: RegistrationStatus,
        updated_at: DateTime<Utc>,
    ) -> Result<StatusTransition, RepositoryError> {
        let mut state = self.state();
        let record = state.live_mut(id)?;
        let transition = StatusTransition {
            id,
            registration_number: record.registration_number.clone(),
            from: record.registration_status,
            to: status,
        };
        record.registration_status = status;
        record.updated_at = updated_at;
        Ok(transition)
    }

    fn soft_delete(&self, id: RegistrationId, deleted_at: DateTime<Utc>) -> Result<(), RepositoryError> {
        let mut state = self.state();
        let record = state.live_mut(id)?;
        record.deleted_at = Some(deleted_at);
        record.updated_at = deleted_at;
        Ok(())
    }

    fn list(&self, criteria: &ListCriteria) -> Result<Page<StudentRegistration>, RepositoryError> {
        let state = self.state();
        let mut matching: Vec<&StudentRegistration> = state
            .live()
            .filter(|record| criteria.filter.matches(record))
            .collect();
        matching.sort_by(|a, b| compare(a, b, criteria.sort, criteria.direction));

        let total = matching.len() as u64;
        let items = matching
            .into_iter()
            .skip(criteria.pagination.offset())
            .take(criteria.pagination.per_page as usize)
            .cloned()
            .collect();
        Ok(Page::new(items, total, criteria.pagination))
    }

    fn status_counts(&self) -> Result<StatusCounts, RepositoryError> {
        let state = self.state();
        let mut counts = StatusCounts::default();
        for record in state.live() {
            counts.record(record.registration_status);
        }
        Ok(counts)
    }

    fn distinct_majors(&self) -> Result<Vec<String>, RepositoryError> {
        let state = self.state();
        let majors: BTreeSet<String> = state
            .live()
            .map(|record| record.details.selected_major.clone())
            .collect();
        Ok(majors.into_iter().collect())
    }

    fn major_counts(&self) -> Result<Vec<MajorCount>, RepositoryError> {
        let state = self.state();
        let mut counts: BTreeMap<String, u64> = BTreeMap::new();
        for record in state.live() {
            *counts.entry(record.details.selected_major.clone()).or_default() += 1;
        }
        Ok(counts
            .into_iter()
            .map(|(major, registrations)| MajorCount {
                major,
                registrations,
            })
            .collect())
    }

    fn income_summary(
        &self,
        status: Option<RegistrationStatus>,
    ) -> Result<IncomeSummary, RepositoryError> {
        let state = self.state();
        let matching: Vec<&StudentRegistration> = state
            .live()
            .filter(|record| status.map_or(true, |status| record.registration_status == status))
            .collect();
        Ok(IncomeSummary {
            registrations: matching.len() as u64,
            total_parent_income: matching
                .iter()
                .map(|record| record.total_parent_income())
                .sum(),
        })
    }
}

/// Process-local fee catalog keyed by academic year.
#[derive(Debug, Default, Clone)]
pub struct MemoryFeeCatalogRepository {
    years: Arc<Mutex<BTreeMap<i32, AcademicYear>>>,
}

impl MemoryFeeCatalogRepository {
    fn years(&self) -> MutexGuard<'_, BTreeMap<i32, AcademicYear>> {
        self.years.lock().expect("fee catalog mutex poisoned")
    }
}

impl FeeCatalogRepository for MemoryFeeCatalogRepository {
    fn create_year(&self, year: AcademicYear) -> Result<AcademicYear, RepositoryError> {
        let mut years = self.years();
        if years.contains_key(&year.year) {
            return Err(RepositoryError::Duplicate {
                field: "academic_year",
            });
        }
        years.insert(year.year, year.clone());
        Ok(year)
    }

    fn fetch_year(&self, year: i32) -> Result<Option<AcademicYear>, RepositoryError> {
        Ok(self.years().get(&year).cloned())
    }

    fn update_year<T>(
        &self,
        year: i32,
        change: impl FnOnce(&mut AcademicYear) -> Result<T, FeeCatalogError>,
    ) -> Result<T, FeeUpdateError> {
        let mut years = self.years();
        let stored = years.get_mut(&year).ok_or(RepositoryError::NotFound)?;
        let mut updated = stored.clone();
        let outcome = change(&mut updated)?;
        *stored = updated;
        Ok(outcome)
    }

    fn list_years(&self) -> Result<Vec<AcademicYear>, RepositoryError> {
        Ok(self.years().values().rev().cloned().collect())
    }
}
