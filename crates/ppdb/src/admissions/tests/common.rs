use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use axum::response::Response;
use axum::Router;
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use serde_json::Value;

use crate::admissions::clock::FixedClock;
use crate::admissions::domain::{
    ChildStatus, Gender, Money, PreviousSchoolType, ReferenceSource, RegistrantDetails,
    RegistrationId, RegistrationStatus, Religion, ResidenceStatus, StudentRegistration,
    Transportation, UniformSize,
};
use crate::admissions::fees::FeeCatalogService;
use crate::admissions::lifecycle::StatusTransition;
use crate::admissions::memory::{MemoryFeeCatalogRepository, MemoryRegistrationRepository};
use crate::admissions::numbering::RegistrationNumber;
use crate::admissions::query::{ListCriteria, Page};
use crate::admissions::repository::{
    IncomeSummary, MajorCount, NewRegistration, RegistrationRepository, RepositoryError,
    StatusCounts,
};
use crate::admissions::router::{admissions_router, AdmissionsState};
use crate::admissions::service::RegistrationService;

pub(super) fn timestamp(year: i32, month: u32, day: u32, hour: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(year, month, day, hour, 0, 0)
        .single()
        .expect("valid timestamp")
}

pub(super) fn date(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).expect("valid date")
}

/// 2025-03-01 08:00 UTC, the day most scenarios run on.
pub(super) fn clock() -> Arc<FixedClock> {
    Arc::new(FixedClock::new(timestamp(2025, 3, 1, 8)))
}

/// A complete, valid applicant; `n` keeps the unique keys apart.
pub(super) fn details(n: u32) -> RegistrantDetails {
    applicant(n, "Siti Rahmawati", "IPA")
}

pub(super) fn applicant(n: u32, full_name: &str, major: &str) -> RegistrantDetails {
    RegistrantDetails {
        nik: format!("32010100000{n:05}"),
        family_card_number: format!("32010200000{n:05}"),
        nisn: format!("{n:010}"),
        full_name: full_name.to_string(),
        gender: Gender::Female,
        birth_place: "Bandung".to_string(),
        birth_date: date(2010, 5, 14),
        religion: Religion::Islam,
        child_order: 1,
        siblings_count: 2,
        child_status: ChildStatus::Biological,
        height: 155,
        weight: 45,
        blood_type: None,
        address: "Jl. Merdeka No. 10".to_string(),
        village: "Sukajadi".to_string(),
        district: "Sukasari".to_string(),
        city: "Bandung".to_string(),
        province: "Jawa Barat".to_string(),
        postal_code: "40111".to_string(),
        email: format!("student{n}@example.com"),
        uniform_size: UniformSize::M,
        residence_status: ResidenceStatus::Owned,
        transportation: Transportation::Motorcycle,
        previous_school_type: PreviousSchoolType::Smpn,
        previous_school_address: "Jl. Pendidikan No. 1".to_string(),
        diploma_number: None,
        diploma_date: None,
        graduation_year: 2024,
        student_phone: "081234567890".to_string(),
        father_name: "Ahmad".to_string(),
        father_nik: format!("32010300000{n:05}"),
        father_occupation: "Wiraswasta".to_string(),
        father_income: Money::from_units(5_000_000),
        mother_name: "Aminah".to_string(),
        mother_nik: format!("32010400000{n:05}"),
        mother_occupation: "Guru".to_string(),
        mother_income: Money::from_units(3_000_000),
        parents_address: "Jl. Merdeka No. 10".to_string(),
        parents_phone: "081298765432".to_string(),
        guardian_name: None,
        guardian_occupation: None,
        guardian_income: None,
        guardian_address: None,
        guardian_phone: None,
        kks_number: None,
        kip_number: None,
        reference_source: ReferenceSource::Friend,
        selected_major: major.to_string(),
    }
}

/// Stored registration built directly, bypassing the service.
pub(super) fn registration(
    id: u64,
    sequence: u32,
    status: RegistrationStatus,
) -> StudentRegistration {
    let created_at = timestamp(2025, 2, 1, 9);
    StudentRegistration {
        id: RegistrationId(id),
        registration_number: RegistrationNumber::new(2025, sequence).expect("valid number"),
        details: details(id as u32),
        registration_status: status,
        created_at,
        updated_at: created_at,
        deleted_at: None,
    }
}

pub(super) fn build_service() -> (
    RegistrationService<MemoryRegistrationRepository>,
    Arc<MemoryRegistrationRepository>,
    Arc<FixedClock>,
) {
    let repository = Arc::new(MemoryRegistrationRepository::default());
    let clock = clock();
    let service = RegistrationService::new(repository.clone(), clock.clone());
    (service, repository, clock)
}

pub(super) fn build_fee_service() -> (
    FeeCatalogService<MemoryFeeCatalogRepository>,
    Arc<FixedClock>,
) {
    let clock = clock();
    let service = FeeCatalogService::new(
        Arc::new(MemoryFeeCatalogRepository::default()),
        clock.clone(),
    );
    (service, clock)
}

pub(super) fn state_with<R>(repository: Arc<R>) -> AdmissionsState<R, MemoryFeeCatalogRepository>
where
    R: RegistrationRepository + 'static,
{
    let clock = clock();
    AdmissionsState {
        registrations: Arc::new(RegistrationService::new(repository, clock.clone())),
        fees: Arc::new(FeeCatalogService::new(
            Arc::new(MemoryFeeCatalogRepository::default()),
            clock.clone(),
        )),
        clock,
    }
}

pub(super) fn memory_router() -> (
    Router,
    AdmissionsState<MemoryRegistrationRepository, MemoryFeeCatalogRepository>,
) {
    let state = state_with(Arc::new(MemoryRegistrationRepository::default()));
    (admissions_router(state.clone()), state)
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 1 << 20)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}

pub(super) struct UnavailableRepository;

impl UnavailableRepository {
    fn offline<T>() -> Result<T, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }
}

impl RegistrationRepository for UnavailableRepository {
    fn create(&self, _registration: NewRegistration) -> Result<StudentRegistration, RepositoryError> {
        Self::offline()
    }

    fn fetch(&self, _id: RegistrationId) -> Result<Option<StudentRegistration>, RepositoryError> {
        Self::offline()
    }

    fn update_details(
        &self,
        _id: RegistrationId,
        _details: RegistrantDetails,
        _updated_at: DateTime<Utc>,
    ) -> Result<StudentRegistration, RepositoryError> {
        Self::offline()
    }

    fn set_status(
        &self,
        _id: RegistrationId,
        _status: RegistrationStatus,
        _updated_at: DateTime<Utc>,
    ) -> Result<StatusTransition, RepositoryError> {
        Self::offline()
    }

    fn soft_delete(&self, _id: RegistrationId, _deleted_at: DateTime<Utc>) -> Result<(), RepositoryError> {
        Self::offline()
    }

    fn list(&self, _criteria: &ListCriteria) -> Result<Page<StudentRegistration>, RepositoryError> {
        Self::offline()
    }

    fn status_counts(&self) -> Result<StatusCounts, RepositoryError> {
        Self::offline()
    }

    fn distinct_majors(&self) -> Result<Vec<String>, RepositoryError> {
        Self::offline()
    }

    fn major_counts(&self) -> Result<Vec<MajorCount>, RepositoryError> {
        Self::offline()
    }

    fn income_summary(
        &self,
        _status: Option<RegistrationStatus>,
    ) -> Result<IncomeSummary, RepositoryError> {
        Self::offline()
    }
}

/// Memory store whose first `collisions` inserts report a number collision.
#[derive(Default)]
pub(super) struct CollidingRepository {
    pub(super) inner: MemoryRegistrationRepository,
    pub(super) collisions: AtomicUsize,
    pub(super) attempts: AtomicUsize,
}

impl CollidingRepository {
    pub(super) fn new(collisions: usize) -> Self {
        Self {
            collisions: AtomicUsize::new(collisions),
            ..Self::default()
        }
    }
}

impl RegistrationRepository for CollidingRepository {
    fn create(&self, registration: NewRegistration) -> Result<StudentRegistration, RepositoryError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        let remaining = self.collisions.load(Ordering::SeqCst);
        if remaining > 0 {
            self.collisions.store(remaining - 1, Ordering::SeqCst);
            let number = RegistrationNumber::first(2025).expect("valid number");
            return Err(RepositoryError::NumberCollision(number));
        }
        self.inner.create(registration)
    }

    fn fetch(&self, id: RegistrationId) -> Result<Option<StudentRegistration>, RepositoryError> {
        self.inner.fetch(id)
    }

    fn update_details(
        &self,
        id: RegistrationId,
        details: RegistrantDetails,
        updated_at: DateTime<Utc>,
    ) -> Result<StudentRegistration, RepositoryError> {
        self.inner.update_details(id, details, updated_at)
    }

    fn set_status(
        &self,
        id: RegistrationId,
        status: RegistrationStatus,
        updated_at: DateTime<Utc>,
    ) -> Result<StatusTransition, RepositoryError> {
        self.inner.set_status(id, status, updated_at)
    }

    fn soft_delete(&self, id: RegistrationId, deleted_at: DateTime<Utc>) -> Result<(), RepositoryError> {
        self.inner.soft_delete(id, deleted_at)
    }

    fn list(&self, criteria: &ListCriteria) -> Result<Page<StudentRegistration>, RepositoryError> {
        self.inner.list(criteria)
    }

    fn status_counts(&self) -> Result<StatusCounts, RepositoryError> {
        self.inner.status_counts()
    }

    fn distinct_majors(&self) -> Result<Vec<String>, RepositoryError> {
        self.inner.distinct_majors()
    }

    fn major_counts(&self) -> Result<Vec<MajorCount>, RepositoryError> {
        self.inner.major_counts()
    }

    fn income_summary(
        &self,
        status: Option<RegistrationStatus>,
    ) -> Result<IncomeSummary, RepositoryError> {
        self.inner.income_summary(status)
    }
}
