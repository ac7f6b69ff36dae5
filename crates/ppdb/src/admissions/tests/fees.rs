use chrono::Duration;

use super::common::*;
use crate::admissions::error::ServiceError;
use crate::admissions::fees::{FeeDraft, FeeEntryId};

fn draft(name: &str, amount: i64) -> FeeDraft {
    FeeDraft {
        name: name.to_string(),
        amount,
    }
}

#[test]
fn academic_years_are_validated_and_unique() {
    let (service, _) = build_fee_service();

    for year in [2019, 2101] {
        match service.create_year(year) {
            Err(ServiceError::Validation(errors)) => assert!(errors.has_field("academic_year")),
            other => panic!("expected validation error for {year}, got {other:?}"),
        }
    }

    service.create_year(2025).expect("create 2025");
    match service.create_year(2025) {
        Err(ServiceError::Validation(errors)) => assert!(errors.has_field("academic_year")),
        other => panic!("expected duplicate error, got {other:?}"),
    }
}

#[test]
fn totals_ignore_removed_fees() {
    let (service, _) = build_fee_service();
    service.create_year(2025).expect("year");

    let registration = service
        .add_fee(2025, draft("Formulir", 150_000))
        .expect("registration fee");
    service
        .add_fee(2025, draft("Seragam", 850_000))
        .expect("uniform fee");
    let books = service.add_fee(2025, draft("Buku", 400_000)).expect("book fee");

    assert_eq!(service.total_for_year(2025).expect("total"), 1_400_000);

    service.remove_fee(2025, books.id).expect("remove");
    service
        .update_fee(2025, registration.id, draft("Formulir Pendaftaran", 200_000))
        .expect("update");

    assert_eq!(service.total_for_year(2025).expect("total"), 1_050_000);
    let view = service.get_year(2025).expect("year").view();
    assert_eq!(view.fees.len(), 2);
    assert_eq!(view.fees[0].name, "Formulir Pendaftaran");
    assert_eq!(view.total_amount, 1_050_000);
}

#[test]
fn unknown_years_total_zero() {
    let (service, _) = build_fee_service();
    assert_eq!(service.total_for_year(2030).expect("total"), 0);
    service.create_year(2030).expect("year");
    assert_eq!(service.total_for_year(2030).expect("total"), 0);
}

#[test]
fn fee_drafts_are_validated() {
    let (service, _) = build_fee_service();
    service.create_year(2025).expect("year");

    match service.add_fee(2025, draft("  ", -1)) {
        Err(ServiceError::Validation(errors)) => {
            assert!(errors.has_field("name"));
            assert!(errors.has_field("amount"));
        }
        other => panic!("expected validation error, got {other:?}"),
    }
    assert!(matches!(
        service.add_fee(2031, draft("Formulir", 1)),
        Err(ServiceError::NotFound { .. })
    ));
}

#[test]
fn removed_fees_cannot_be_edited() {
    let (service, _) = build_fee_service();
    service.create_year(2025).expect("year");
    let fee = service.add_fee(2025, draft("Formulir", 1)).expect("fee");
    service.remove_fee(2025, fee.id).expect("remove");

    assert!(matches!(
        service.update_fee(2025, fee.id, draft("Formulir", 2)),
        Err(ServiceError::NotFound { .. })
    ));
    assert!(matches!(
        service.remove_fee(2025, fee.id),
        Err(ServiceError::NotFound { .. })
    ));
}

#[test]
fn reorder_requires_every_active_fee_once() {
    let (service, clock) = build_fee_service();
    service.create_year(2025).expect("year");
    let a = service.add_fee(2025, draft("A", 1)).expect("a");
    let b = service.add_fee(2025, draft("B", 2)).expect("b");
    let c = service.add_fee(2025, draft("C", 3)).expect("c");
    service.remove_fee(2025, b.id).expect("remove b");

    for order in [vec![c.id], vec![c.id, a.id, a.id], vec![c.id, b.id, a.id]] {
        assert!(
            matches!(
                service.reorder_fees(2025, &order),
                Err(ServiceError::Validation(_))
            ),
            "{order:?} should be rejected"
        );
    }

    clock.advance(Duration::minutes(3));
    let view = service.reorder_fees(2025, &[c.id, a.id]).expect("reorder");
    let ids: Vec<FeeEntryId> = view.fees.iter().map(|fee| fee.id).collect();
    assert_eq!(ids, vec![c.id, a.id]);
    assert_eq!(view.updated_at, timestamp(2025, 3, 1, 8) + Duration::minutes(3));

    let next = service.add_fee(2025, draft("D", 4)).expect("d");
    assert_eq!(next.id, FeeEntryId(4));
}

#[test]
fn years_are_listed_newest_first() {
    let (service, _) = build_fee_service();
    for year in [2024, 2026, 2025] {
        service.create_year(year).expect("year");
    }
    service.add_fee(2026, draft("Formulir", 100)).expect("fee");

    let years = service.list_years().expect("years");
    let listed: Vec<i32> = years.iter().map(|year| year.year).collect();
    assert_eq!(listed, vec![2026, 2025, 2024]);
    assert_eq!(years[0].total_amount, 100);
}
