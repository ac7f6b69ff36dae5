//! Academic years and the registration fees charged in each of them.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::clock::Clock;
use super::error::ServiceError;
use super::repository::{FeeCatalogRepository, FeeUpdateError, RepositoryError};
use super::validation::ValidationErrors;

pub const MIN_ACADEMIC_YEAR: i32 = 2020;
pub const MAX_ACADEMIC_YEAR: i32 = 2100;
const MAX_FEE_NAME_LENGTH: usize = 255;

/// Identifier of a fee line, unique within its academic year.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FeeEntryId(pub u32);

impl fmt::Display for FeeEntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeEntry {
    pub id: FeeEntryId,
    pub name: String,
    /// Amount in the smallest currency unit.
    pub amount: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<DateTime<Utc>>,
}

impl FeeEntry {
    pub fn is_active(&self) -> bool {
        self.deleted_at.is_none()
    }
}

/// Fee line as submitted by an administrator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeDraft {
    pub name: String,
    pub amount: i64,
}

impl FeeDraft {
    fn validated(self) -> Result<Self, ValidationErrors> {
        let name = self.name.trim().to_string();
        let mut errors = ValidationErrors::default();
        if name.is_empty() {
            errors.push("name", "fee name is required");
        } else if name.chars().count() > MAX_FEE_NAME_LENGTH {
            errors.push(
                "name",
                format!("fee name may not be longer than {MAX_FEE_NAME_LENGTH} characters"),
            );
        }
        if self.amount < 0 {
            errors.push("amount", "fee amount may not be negative");
        }
        errors.into_result()?;
        Ok(Self {
            name,
            amount: self.amount,
        })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum FeeCatalogError {
    #[error(transparent)]
    Validation(#[from] ValidationErrors),
    #[error("fee {id} does not exist in academic year {year}")]
    FeeNotFound { year: i32, id: FeeEntryId },
}

/// An academic year together with its ordered fee lines.
///
/// Removed fees stay in `fees` with `deleted_at` set so the history survives;
/// they no longer count towards totals or appear in views.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AcademicYear {
    pub year: i32,
    pub fees: Vec<FeeEntry>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl AcademicYear {
    pub fn new(year: i32, now: DateTime<Utc>) -> Result<Self, ValidationErrors> {
        validate_year(year)?;
        Ok(Self {
            year,
            fees: Vec::new(),
            created_at: now,
            updated_at: now,
        })
    }

    pub fn active_fees(&self) -> impl Iterator<Item = &FeeEntry> {
        self.fees.iter().filter(|fee| fee.is_active())
    }

    pub fn total_amount(&self) -> i64 {
        self.active_fees()
            .fold(0i64, |total, fee| total.saturating_add(fee.amount))
    }

    fn next_fee_id(&self) -> FeeEntryId {
        FeeEntryId(self.fees.iter().map(|fee| fee.id.0).max().unwrap_or(0) + 1)
    }

    fn active_fee_mut(&mut self, id: FeeEntryId) -> Result<&mut FeeEntry, FeeCatalogError> {
        let year = self.year;
        self.fees
            .iter_mut()
            .find(|fee| fee.id == id && fee.is_active())
            .ok_or(FeeCatalogError::FeeNotFound { year, id })
    }

    pub fn add_fee(&mut self, draft: FeeDraft, now: DateTime<Utc>) -> Result<FeeEntry, FeeCatalogError> {
        let draft = draft.validated()?;
        let entry = FeeEntry {
            id: self.next_fee_id(),
            name: draft.name,
            amount: draft.amount,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        };
        self.fees.push(entry.clone());
        self.updated_at = now;
        Ok(entry)
    }

    pub fn update_fee(
        &mut self,
        id: FeeEntryId,
        draft: FeeDraft,
        now: DateTime<Utc>,
    ) -> Result<FeeEntry, FeeCatalogError> {
        let draft = draft.validated()?;
        let fee = self.active_fee_mut(id)?;
        fee.name = draft.name;
        fee.amount = draft.amount;
        fee.updated_at = now;
        let updated = fee.clone();
        self.updated_at = now;
        Ok(updated)
    }

    pub fn remove_fee(&mut self, id: FeeEntryId, now: DateTime<Utc>) -> Result<(), FeeCatalogError> {
        let fee = self.active_fee_mut(id)?;
        fee.deleted_at = Some(now);
        fee.updated_at = now;
        self.updated_at = now;
        Ok(())
    }

    /// Reorders the active fees; `order` must list each of them exactly once.
    pub fn reorder_fees(&mut self, order: &[FeeEntryId], now: DateTime<Utc>) -> Result<(), FeeCatalogError> {
        let active: HashSet<FeeEntryId> = self.active_fees().map(|fee| fee.id).collect();
        let requested: HashSet<FeeEntryId> = order.iter().copied().collect();
        if requested.len() != order.len() || requested != active {
            return Err(ValidationErrors::single(
                "fee_ids",
                "order must list every active fee of the year exactly once",
            )
            .into());
        }

        let (mut live, removed): (Vec<FeeEntry>, Vec<FeeEntry>) =
            self.fees.drain(..).partition(FeeEntry::is_active);
        live.sort_by_key(|fee| order.iter().position(|id| *id == fee.id));
        self.fees = live;
        self.fees.extend(removed);
        self.updated_at = now;
        Ok(())
    }

    pub fn view(&self) -> AcademicYearView {
        AcademicYearView {
            year: self.year,
            fees: self.active_fees().cloned().collect(),
            total_amount: self.total_amount(),
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

pub fn validate_year(year: i32) -> Result<(), ValidationErrors> {
    if (MIN_ACADEMIC_YEAR..=MAX_ACADEMIC_YEAR).contains(&year) {
        Ok(())
    } else {
        Err(ValidationErrors::single(
            "academic_year",
            format!("academic year must be between {MIN_ACADEMIC_YEAR} and {MAX_ACADEMIC_YEAR}"),
        ))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AcademicYearView {
    pub year: i32,
    pub fees: Vec<FeeEntry>,
    pub total_amount: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Service owning every change to the fee catalog.
pub struct FeeCatalogService<F> {
    repository: Arc<F>,
    clock: Arc<dyn Clock>,
}

impl<F> FeeCatalogService<F>
where
    F: FeeCatalogRepository + 'static,
{
    pub fn new(repository: Arc<F>, clock: Arc<dyn Clock>) -> Self {
        Self { repository, clock }
    }

    pub fn create_year(&self, year: i32) -> Result<AcademicYear, ServiceError> {
        let academic_year = AcademicYear::new(year, self.clock.now())?;
        let stored = self.repository.create_year(academic_year)?;
        info!(year, "academic year created");
        Ok(stored)
    }

    pub fn get_year(&self, year: i32) -> Result<AcademicYear, ServiceError> {
        self.repository
            .fetch_year(year)?
            .ok_or_else(|| ServiceError::not_found("academic year", year))
    }

    /// Years newest first.
    pub fn list_years(&self) -> Result<Vec<AcademicYearView>, ServiceError> {
        let years = self.repository.list_years()?;
        Ok(years.iter().map(AcademicYear::view).collect())
    }

    /// Sum of the active fees of `year`; zero when the year has none or is unknown.
    pub fn total_for_year(&self, year: i32) -> Result<i64, ServiceError> {
        Ok(self
            .repository
            .fetch_year(year)?
            .map_or(0, |academic_year| academic_year.total_amount()))
    }

    pub fn add_fee(&self, year: i32, draft: FeeDraft) -> Result<FeeEntry, ServiceError> {
        self.mutate(year, |academic_year, now| academic_year.add_fee(draft, now))
    }

    pub fn update_fee(&self, year: i32, id: FeeEntryId, draft: FeeDraft) -> Result<FeeEntry, ServiceError> {
        self.mutate(year, |academic_year, now| academic_year.update_fee(id, draft, now))
    }

    pub fn remove_fee(&self, year: i32, id: FeeEntryId) -> Result<(), ServiceError> {
        self.mutate(year, |academic_year, now| academic_year.remove_fee(id, now))?;
        info!(year, fee = %id, "registration fee removed");
        Ok(())
    }

    pub fn reorder_fees(&self, year: i32, order: &[FeeEntryId]) -> Result<AcademicYearView, ServiceError> {
        self.mutate(year, |academic_year, now| {
            academic_year.reorder_fees(order, now)?;
            Ok(academic_year.view())
        })
    }

    fn mutate<T>(
        &self,
        year: i32,
        change: impl FnOnce(&mut AcademicYear, DateTime<Utc>) -> Result<T, FeeCatalogError>,
    ) -> Result<T, ServiceError> {
        let now = self.clock.now();
        self.repository
            .update_year(year, |academic_year| change(academic_year, now))
            .map_err(|err| match err {
                FeeUpdateError::Catalog(err) => err.into(),
                FeeUpdateError::Repository(RepositoryError::NotFound) => {
                    ServiceError::not_found("academic year", year)
                }
                FeeUpdateError::Repository(other) => other.into(),
            })
    }
}
