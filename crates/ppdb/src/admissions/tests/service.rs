use std::sync::atomic::Ordering;
use std::sync::Arc;

use chrono::Duration;

use super::common::*;
use crate::admissions::domain::{Money, RegistrationId, RegistrationStatus};
use crate::admissions::error::ServiceError;
use crate::admissions::memory::MemoryRegistrationRepository;
use crate::admissions::repository::{RegistrationRepository, RepositoryError};
use crate::admissions::service::RegistrationService;

#[test]
fn submissions_receive_sequential_numbers_and_start_pending() {
    let (service, _, clock) = build_service();

    let first = service.submit(details(1)).expect("first submission");
    clock.advance(Duration::minutes(5));
    let second = service.submit(details(2)).expect("second submission");

    assert_eq!(first.registration_number.to_string(), "REG20250001");
    assert_eq!(second.registration_number.to_string(), "REG20250002");
    assert_eq!(first.registration_status, RegistrationStatus::Pending);
    assert_eq!(second.created_at, timestamp(2025, 3, 1, 8) + Duration::minutes(5));
}

#[test]
fn numbering_restarts_each_calendar_year() {
    let (service, _, clock) = build_service();
    service.submit(details(1)).expect("2025 submission");

    clock.set(timestamp(2026, 1, 2, 7));
    let next_year = service.submit(details(2)).expect("2026 submission");
    assert_eq!(next_year.registration_number.to_string(), "REG20260001");
}

#[test]
fn numbering_continues_after_existing_records() {
    let seeded = registration(7, 41, RegistrationStatus::Approved);
    let repository = Arc::new(MemoryRegistrationRepository::with_records([seeded]));
    let service = RegistrationService::new(repository, clock());

    let stored = service.submit(details(8)).expect("submission");
    assert_eq!(stored.registration_number.to_string(), "REG20250042");
    assert_eq!(stored.id, RegistrationId(8));
}

#[test]
fn exhausted_year_is_a_conflict() {
    let seeded = registration(1, 9999, RegistrationStatus::Pending);
    let repository = Arc::new(MemoryRegistrationRepository::with_records([seeded]));
    let service = RegistrationService::new(repository, clock());

    let err = service.submit(details(2)).expect_err("no numbers left");
    assert!(matches!(err, ServiceError::Conflict(_)), "unexpected error {err:?}");
}

#[test]
fn duplicate_identity_is_a_field_error_and_stores_nothing() {
    let (service, repository, _) = build_service();
    service.submit(details(1)).expect("first submission");

    let mut duplicate = details(2);
    duplicate.nik = details(1).nik;
    match service.submit(duplicate) {
        Err(ServiceError::Validation(errors)) => assert!(errors.has_field("nik")),
        other => panic!("expected validation error, got {other:?}"),
    }

    let mut same_email = details(3);
    same_email.email = "STUDENT1@example.com".to_string();
    match service.submit(same_email) {
        Err(ServiceError::Validation(errors)) => assert!(errors.has_field("email")),
        other => panic!("expected validation error, got {other:?}"),
    }

    assert_eq!(repository.status_counts().expect("counts").total(), 1);
}

#[test]
fn invalid_payload_never_consumes_a_number() {
    let (service, _, _) = build_service();
    let mut invalid = details(1);
    invalid.postal_code = "abc".to_string();
    assert!(matches!(
        service.submit(invalid),
        Err(ServiceError::Validation(_))
    ));

    let stored = service.submit(details(2)).expect("valid submission");
    assert_eq!(stored.registration_number.to_string(), "REG20250001");
}

#[test]
fn deleted_registrations_free_identity_but_keep_their_number() {
    let (service, repository, _) = build_service();
    let first = service.submit(details(1)).expect("submission");
    service.delete(first.id).expect("delete");

    assert!(matches!(
        service.get(first.id),
        Err(ServiceError::NotFound { .. })
    ));
    assert!(matches!(
        service.delete(first.id),
        Err(ServiceError::NotFound { .. })
    ));

    let again = service.submit(details(1)).expect("resubmission");
    assert_eq!(again.registration_number.to_string(), "REG20250002");

    let all = repository.all_records();
    assert_eq!(all.len(), 2);
    assert!(all.iter().any(|record| record.is_deleted()));
}

#[test]
fn pending_registrations_can_be_edited() {
    let (service, _, clock) = build_service();
    let stored = service.submit(details(1)).expect("submission");

    clock.advance(Duration::hours(1));
    let mut changes = details(1);
    changes.selected_major = "IPS".to_string();
    let updated = service.update(stored.id, changes).expect("update");

    assert_eq!(updated.details.selected_major, "IPS");
    assert_eq!(updated.registration_number, stored.registration_number);
    assert_eq!(updated.created_at, stored.created_at);
    assert_eq!(updated.updated_at, stored.created_at + Duration::hours(1));
}

#[test]
fn decided_registrations_reject_edits_untouched() {
    let (service, _, _) = build_service();
    let stored = service.submit(details(1)).expect("submission");
    service
        .set_status(stored.id, RegistrationStatus::Approved)
        .expect("approve");

    let mut changes = details(1);
    changes.full_name = "Nama Baru".to_string();
    match service.update(stored.id, changes) {
        Err(ServiceError::Permission(denied)) => {
            assert_eq!(denied.status, RegistrationStatus::Approved)
        }
        other => panic!("expected permission error, got {other:?}"),
    }

    let current = service.get(stored.id).expect("still stored");
    assert_eq!(current.details.full_name, "Siti Rahmawati");
    assert_eq!(current.registration_status, RegistrationStatus::Approved);
}

#[test]
fn invalid_edit_leaves_the_record_as_it_was() {
    let (service, _, _) = build_service();
    let stored = service.submit(details(1)).expect("submission");

    let mut changes = details(1);
    changes.email = "broken".to_string();
    assert!(matches!(
        service.update(stored.id, changes),
        Err(ServiceError::Validation(_))
    ));
    assert_eq!(service.get(stored.id).expect("fetch"), stored);
}

#[test]
fn status_changes_are_permissive_but_reported() {
    let (service, _, _) = build_service();
    let stored = service.submit(details(1)).expect("submission");

    let approved = service
        .set_status(stored.id, RegistrationStatus::Approved)
        .expect("approve");
    assert!(!approved.is_flagged());

    let reopened = service
        .set_status(stored.id, RegistrationStatus::Pending)
        .expect("reopen");
    assert!(reopened.reopened());
    assert_eq!(reopened.from, RegistrationStatus::Approved);

    assert!(matches!(
        service.set_status(RegistrationId(404), RegistrationStatus::Approved),
        Err(ServiceError::NotFound { .. })
    ));
}

#[test]
fn bulk_status_reports_each_id_once() {
    let (service, _, _) = build_service();
    let a = service.submit(details(1)).expect("a");
    let b = service.submit(details(2)).expect("b");
    let c = service.submit(details(3)).expect("c");

    let report = service.bulk_set_status(
        &[a.id, RegistrationId(999), a.id, b.id],
        RegistrationStatus::Approved,
    );

    assert_eq!(report.succeeded_ids(), vec![a.id, b.id]);
    assert_eq!(report.failed_ids(), vec![RegistrationId(999)]);
    assert!(report.failed[0].reason.contains("not found"));
    assert_eq!(
        service.get(c.id).expect("c").registration_status,
        RegistrationStatus::Pending
    );
}

#[test]
fn print_view_requires_approval() {
    let (service, _, _) = build_service();
    let stored = service.submit(details(1)).expect("submission");

    assert!(matches!(
        service.print_view(stored.id),
        Err(ServiceError::Permission(_))
    ));

    service
        .set_status(stored.id, RegistrationStatus::Approved)
        .expect("approve");
    let slip = service.print_view(stored.id).expect("printable");
    assert!(slip.can_be_printed);
    assert!(!slip.can_be_edited);
    assert_eq!(slip.status_label, "Diterima");
    assert_eq!(slip.age, 14);
}

#[test]
fn dashboard_figures_follow_the_records() {
    let (service, _, _) = build_service();
    assert_eq!(service.pending_badge().expect("badge"), None);

    let a = service.submit(details(1)).expect("a");
    service.submit(details(2)).expect("b");
    let mut richer = details(3);
    richer.father_income = Money::from_units(10_000_000);
    let c = service.submit(richer).expect("c");

    service
        .bulk_set_status(&[a.id, c.id], RegistrationStatus::Approved);

    assert_eq!(service.pending_badge().expect("badge"), Some(1));
    let counts = service.status_counts().expect("counts");
    assert_eq!((counts.pending, counts.approved, counts.rejected), (1, 2, 0));

    let approved = service
        .income_summary(Some(RegistrationStatus::Approved))
        .expect("income");
    assert_eq!(approved.registrations, 2);
    assert_eq!(approved.total_parent_income, Money::from_units(21_000_000));
    assert_eq!(approved.average_parent_income(), Money::from_units(10_500_000));
}

#[test]
fn search_matches_identity_columns_case_insensitively() {
    let (service, _, clock) = build_service();
    service
        .submit(applicant(1, "Budi Santoso", "IPA"))
        .expect("budi");
    clock.advance(Duration::minutes(1));
    let citra = service
        .submit(applicant(2, "Citra Lestari", "IPS"))
        .expect("citra");

    let by_name = service.search("citra", 10).expect("search");
    assert_eq!(by_name.len(), 1);
    assert_eq!(by_name[0].registration_number, citra.registration_number);
    assert_eq!(by_name[0].title, "Citra Lestari");
    assert_eq!(by_name[0].status_label, "Menunggu");

    let by_number = service.search("reg2025", 10).expect("search");
    assert_eq!(by_number.len(), 2);
    assert_eq!(by_number[0].id, citra.id);

    assert!(service.search("   ", 10).expect("search").is_empty());
    assert_eq!(service.search("2025", 1).expect("search").len(), 1);
}

#[test]
fn majors_are_listed_once_each() {
    let (service, _, _) = build_service();
    service.submit(applicant(1, "A", "IPS")).expect("a");
    service.submit(applicant(2, "B", "IPA")).expect("b");
    service.submit(applicant(3, "C", "IPS")).expect("c");

    assert_eq!(service.distinct_majors().expect("majors"), ["IPA", "IPS"]);
    let counts = service.major_counts().expect("counts");
    assert_eq!(counts[1].major, "IPS");
    assert_eq!(counts[1].registrations, 2);
}

#[test]
fn number_collision_is_retried_once() {
    let repository = Arc::new(CollidingRepository::new(1));
    let service = RegistrationService::new(repository.clone(), clock());

    let stored = service.submit(details(1)).expect("retry succeeds");
    assert_eq!(stored.registration_number.to_string(), "REG20250001");
    assert_eq!(repository.attempts.load(Ordering::SeqCst), 2);
}

#[test]
fn repeated_collision_surfaces_as_conflict() {
    let repository = Arc::new(CollidingRepository::new(2));
    let service = RegistrationService::new(repository.clone(), clock());

    let err = service.submit(details(1)).expect_err("gives up");
    assert!(matches!(err, ServiceError::Conflict(_)));
    assert!(err.is_retryable());
    assert_eq!(repository.attempts.load(Ordering::SeqCst), 2);
    assert_eq!(repository.inner.all_records().len(), 0);
}

#[test]
fn store_failures_propagate() {
    let service = RegistrationService::new(Arc::new(UnavailableRepository), clock());
    assert!(matches!(
        service.submit(details(1)),
        Err(ServiceError::Repository(RepositoryError::Unavailable(_)))
    ));
    assert!(matches!(
        service.pending_badge(),
        Err(ServiceError::Repository(_))
    ));
}
