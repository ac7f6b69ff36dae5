use serde::Serialize;

use super::domain::{Money, RegistrationStatus};
use super::error::ServiceError;
use super::fees::FeeCatalogService;
use super::repository::{FeeCatalogRepository, MajorCount, RegistrationRepository, StatusCounts};
use super::service::RegistrationService;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusCountEntry {
    pub status: RegistrationStatus,
    pub status_label: &'static str,
    pub tone: &'static str,
    pub registrations: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct IncomeOverview {
    pub status: Option<RegistrationStatus>,
    pub registrations: u64,
    pub total_parent_income: Money,
    pub average_parent_income: Money,
}

/// Dashboard figures for the admissions office.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AdmissionsSummary {
    pub pending_badge: Option<u64>,
    pub total_registrations: u64,
    pub statuses: Vec<StatusCountEntry>,
    pub income: IncomeOverview,
    pub majors: Vec<MajorCount>,
    pub fee_year: i32,
    pub fee_total: i64,
}

impl AdmissionsSummary {
    pub fn collect<R, F>(
        registrations: &RegistrationService<R>,
        fees: &FeeCatalogService<F>,
        fee_year: i32,
        income_status: Option<RegistrationStatus>,
    ) -> Result<Self, ServiceError>
    where
        R: RegistrationRepository + 'static,
        F: FeeCatalogRepository + 'static,
    {
        let counts = registrations.status_counts()?;
        let income = registrations.income_summary(income_status)?;

        Ok(Self {
            pending_badge: counts.pending_badge(),
            total_registrations: counts.total(),
            statuses: status_entries(&counts),
            income: IncomeOverview {
                status: income_status,
                registrations: income.registrations,
                total_parent_income: income.total_parent_income,
                average_parent_income: income.average_parent_income(),
            },
            majors: registrations.major_counts()?,
            fee_year,
            fee_total: fees.total_for_year(fee_year)?,
        })
    }
}

fn status_entries(counts: &StatusCounts) -> Vec<StatusCountEntry> {
    RegistrationStatus::ALL
        .iter()
        .map(|status| StatusCountEntry {
            status: *status,
            status_label: status.label(),
            tone: status.tone(),
            registrations: counts.get(*status),
        })
        .collect()
}
