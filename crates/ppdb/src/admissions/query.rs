use std::cmp::Ordering;

use chrono::{Months, NaiveDate};
use serde::{Deserialize, Serialize};

use super::domain::{Religion, RegistrationStatus, StudentRegistration};

pub const DEFAULT_PAGE_SIZE: u32 = 10;
pub const MAX_PAGE_SIZE: u32 = 100;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortKey {
    #[default]
    CreatedAt,
    UpdatedAt,
    RegistrationNumber,
    /// Case-insensitive; SQLite folds ASCII letters only, the memory store folds all of Unicode.
    FullName,
    SelectedMajor,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortDirection {
    Asc,
    #[default]
    Desc,
}

/// Listing request as callers phrase it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistrationQuery {
    pub status: Option<RegistrationStatus>,
    pub major: Option<String>,
    pub religion: Option<Religion>,
    pub created_from: Option<NaiveDate>,
    pub created_until: Option<NaiveDate>,
    pub min_age: Option<u32>,
    pub max_age: Option<u32>,
    pub search: Option<String>,
    pub sort: SortKey,
    pub direction: SortDirection,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

impl RegistrationQuery {
    pub fn with_status(mut self, status: RegistrationStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_search(mut self, term: impl Into<String>) -> Self {
        self.search = Some(term.into());
        self
    }

    pub fn sorted_by(mut self, sort: SortKey, direction: SortDirection) -> Self {
        self.sort = sort;
        self.direction = direction;
        self
    }

    /// Turns the request into store criteria: age bounds become birth-date
    /// bounds relative to `today` and the page size falls back to `default_page_size`.
    pub fn resolve(&self, today: NaiveDate, default_page_size: u32) -> ListCriteria {
        let (born_from, born_until) = birth_bounds(today, self.min_age, self.max_age);
        let blank_to_none = |value: &Option<String>| {
            value
                .as_deref()
                .map(str::trim)
                .filter(|value| !value.is_empty())
                .map(str::to_string)
        };

        ListCriteria {
            filter: RegistrationFilter {
                status: self.status,
                major: blank_to_none(&self.major),
                religion: self.religion,
                created_from: self.created_from,
                created_until: self.created_until,
                born_from,
                born_until,
                search: blank_to_none(&self.search),
            },
            sort: self.sort,
            direction: self.direction,
            pagination: Pagination::new(self.page, self.per_page, default_page_size),
        }
    }
}

/// Birth dates of everyone aged between `min_age` and `max_age` (inclusive) on `today`.
fn birth_bounds(
    today: NaiveDate,
    min_age: Option<u32>,
    max_age: Option<u32>,
) -> (Option<NaiveDate>, Option<NaiveDate>) {
    let years_before = |years: u32| today.checked_sub_months(Months::new(years.saturating_mul(12)));
    let born_until = min_age.and_then(years_before);
    let born_from = max_age
        .and_then(|max| years_before(max.saturating_add(1)))
        .and_then(|date| date.succ_opt());
    (born_from, born_until)
}

/// Store-facing filter; every present condition must hold.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegistrationFilter {
    pub status: Option<RegistrationStatus>,
    pub major: Option<String>,
    pub religion: Option<Religion>,
    pub created_from: Option<NaiveDate>,
    pub created_until: Option<NaiveDate>,
    pub born_from: Option<NaiveDate>,
    pub born_until: Option<NaiveDate>,
    pub search: Option<String>,
}

impl RegistrationFilter {
    pub fn matches(&self, record: &StudentRegistration) -> bool {
        if record.is_deleted() {
            return false;
        }
        let details = &record.details;
        let created = record.created_at.date_naive();

        self.status.map_or(true, |status| record.registration_status == status)
            && self
                .major
                .as_deref()
                .map_or(true, |major| details.selected_major == major)
            && self.religion.map_or(true, |religion| details.religion == religion)
            && self.created_from.map_or(true, |from| created >= from)
            && self.created_until.map_or(true, |until| created <= until)
            && self.born_from.map_or(true, |from| details.birth_date >= from)
            && self.born_until.map_or(true, |until| details.birth_date <= until)
            && self
                .search
                .as_deref()
                .map_or(true, |term| matches_search(record, term))
    }
}

/// Case-insensitive substring match over the searchable columns.
///
/// Folds all of Unicode, where the SQLite store's `LIKE` folds ASCII letters only.
pub fn matches_search(record: &StudentRegistration, term: &str) -> bool {
    let needle = term.trim().to_lowercase();
    if needle.is_empty() {
        return true;
    }
    let number = record.registration_number.to_string();
    let details = &record.details;
    [
        number.as_str(),
        details.full_name.as_str(),
        details.nik.as_str(),
        details.nisn.as_str(),
        details.email.as_str(),
    ]
    .iter()
    .any(|haystack| haystack.to_lowercase().contains(&needle))
}

/// Ordering used by listings; ties fall back to the id in the same direction.
pub fn compare(
    a: &StudentRegistration,
    b: &StudentRegistration,
    sort: SortKey,
    direction: SortDirection,
) -> Ordering {
    let primary = match sort {
        SortKey::CreatedAt => a.created_at.cmp(&b.created_at),
        SortKey::UpdatedAt => a.updated_at.cmp(&b.updated_at),
        SortKey::RegistrationNumber => a.registration_number.cmp(&b.registration_number),
        SortKey::FullName => a
            .details
            .full_name
            .to_lowercase()
            .cmp(&b.details.full_name.to_lowercase()),
        SortKey::SelectedMajor => a.details.selected_major.cmp(&b.details.selected_major),
    };
    let ordering = primary.then_with(|| a.id.cmp(&b.id));
    match direction {
        SortDirection::Asc => ordering,
        SortDirection::Desc => ordering.reverse(),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Pagination {
    pub page: u32,
    pub per_page: u32,
}

impl Pagination {
    pub fn new(page: Option<u32>, per_page: Option<u32>, default_page_size: u32) -> Self {
        Self {
            page: page.unwrap_or(1).max(1),
            per_page: per_page
                .unwrap_or(default_page_size)
                .clamp(1, MAX_PAGE_SIZE),
        }
    }

    pub fn offset(&self) -> usize {
        (self.page as usize - 1) * self.per_page as usize
    }
}

impl Default for Pagination {
    fn default() -> Self {
        Self::new(None, None, DEFAULT_PAGE_SIZE)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListCriteria {
    pub filter: RegistrationFilter,
    pub sort: SortKey,
    pub direction: SortDirection,
    pub pagination: Pagination,
}

/// One page of a listing plus the totals needed to page through the rest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub page: u32,
    pub per_page: u32,
    pub last_page: u32,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, total: u64, pagination: Pagination) -> Self {
        let per_page = u64::from(pagination.per_page);
        let last_page = total.div_ceil(per_page).max(1);
        Self {
            items,
            total,
            page: pagination.page,
            per_page: pagination.per_page,
            last_page: u32::try_from(last_page).unwrap_or(u32::MAX),
        }
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            total: self.total,
            page: self.page,
            per_page: self.per_page,
            last_page: self.last_page,
        }
    }
}
