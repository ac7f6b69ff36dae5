use std::sync::Arc;

use chrono::Duration;

use super::common::*;
use crate::admissions::domain::{BloodType, Money, RegistrationStatus, StudentRegistration};
use crate::admissions::error::ServiceError;
use crate::admissions::fees::{FeeCatalogService, FeeDraft};
use crate::admissions::query::{Page, RegistrationQuery, SortDirection, SortKey};
use crate::admissions::repository::{
    FeeCatalogRepository, NewRegistration, RegistrationRepository, RepositoryError,
};
use crate::admissions::service::RegistrationService;
use crate::admissions::sqlite::SqliteStore;

fn numbers(page: &Page<StudentRegistration>) -> Vec<String> {
    page.items
        .iter()
        .map(|record| record.registration_number.to_string())
        .collect()
}

fn store() -> Arc<SqliteStore> {
    Arc::new(SqliteStore::open_in_memory().expect("in-memory database"))
}

#[test]
fn registrations_round_trip_every_column() {
    let store = store();
    let mut applicant = details(1);
    applicant.blood_type = Some(BloodType::Ab);
    applicant.diploma_number = Some("DN-01/2024".to_string());
    applicant.diploma_date = Some(date(2024, 6, 20));
    applicant.guardian_name = Some("Paman Ujang".to_string());
    applicant.guardian_income = Some(Money::from_minor(250_000_050));
    applicant.kip_number = Some("KIP-77".to_string());

    let created = store
        .create(NewRegistration {
            details: applicant.clone(),
            created_at: timestamp(2025, 3, 1, 8),
        })
        .expect("insert");
    let fetched = store.fetch(created.id).expect("fetch").expect("present");

    assert_eq!(fetched, created);
    assert_eq!(fetched.details, applicant);
    assert_eq!(fetched.registration_number.to_string(), "REG20250001");
    assert_eq!(fetched.registration_status, RegistrationStatus::Pending);
}

#[test]
fn numbering_is_per_year_and_survives_reopening() {
    let dir = tempfile::tempdir().expect("temp dir");
    let path = dir.path().join("ppdb.sqlite");

    {
        let store = SqliteStore::open(&path).expect("open");
        for (n, year) in [(1, 2025), (2, 2025), (3, 2026)] {
            store
                .create(NewRegistration {
                    details: details(n),
                    created_at: timestamp(year, 3, 1, 8),
                })
                .expect("insert");
        }
    }

    let reopened = SqliteStore::open(&path).expect("reopen");
    let next = reopened
        .create(NewRegistration {
            details: details(4),
            created_at: timestamp(2025, 4, 1, 8),
        })
        .expect("insert");
    assert_eq!(next.registration_number.to_string(), "REG20250003");
}

#[test]
fn deleted_rows_keep_their_number_and_free_their_identity() {
    let store = store();
    let service = RegistrationService::new(store.clone(), clock());
    let first = service.submit(details(1)).expect("submit");
    service.delete(first.id).expect("delete");

    assert!(store.fetch(first.id).expect("fetch").is_none());
    let again = service.submit(details(1)).expect("resubmit");
    assert_eq!(again.registration_number.to_string(), "REG20250002");

    match service.submit(details(1)) {
        Err(ServiceError::Validation(errors)) => assert!(errors.has_field("nik")),
        other => panic!("expected duplicate nik, got {other:?}"),
    }
}

#[test]
fn edits_are_refused_once_decided() {
    let store = store();
    let created = store
        .create(NewRegistration {
            details: details(1),
            created_at: timestamp(2025, 3, 1, 8),
        })
        .expect("insert");
    let transition = store
        .set_status(created.id, RegistrationStatus::Rejected, timestamp(2025, 3, 2, 8))
        .expect("reject");
    assert_eq!(transition.from, RegistrationStatus::Pending);

    let mut changes = details(1);
    changes.full_name = "Nama Baru".to_string();
    assert!(matches!(
        store.update_details(created.id, changes, timestamp(2025, 3, 3, 8)),
        Err(RepositoryError::Locked(RegistrationStatus::Rejected))
    ));
}

#[test]
fn unique_keys_are_checked_on_update() {
    let store = store();
    let service = RegistrationService::new(store.clone(), clock());
    service.submit(details(1)).expect("first");
    let second = service.submit(details(2)).expect("second");

    let mut changes = details(2);
    changes.email = details(1).email;
    match service.update(second.id, changes) {
        Err(ServiceError::Validation(errors)) => assert!(errors.has_field("email")),
        other => panic!("expected duplicate email, got {other:?}"),
    }
}

#[test]
fn listing_matches_the_memory_store() {
    let store = store();
    let (memory, _, memory_clock) = build_service();
    let clock = clock();
    let sqlite = RegistrationService::new(store, clock.clone());

    let names = ["budi", "Andi", "Citra 100%", "dewi"];
    for (n, name) in names.iter().enumerate() {
        let major = if n % 2 == 0 { "IPA" } else { "IPS" };
        let applicant = applicant(n as u32 + 1, name, major);
        sqlite.submit(applicant.clone()).expect("sqlite submit");
        memory.submit(applicant).expect("memory submit");
        clock.advance(Duration::days(1));
        memory_clock.advance(Duration::days(1));
    }
    let newest = sqlite.list(&RegistrationQuery::default()).expect("ids");
    let ids: Vec<_> = newest.items.iter().map(|record| record.id).collect();
    sqlite.bulk_set_status(&ids[..2], RegistrationStatus::Approved);
    memory.bulk_set_status(&ids[..2], RegistrationStatus::Approved);

    let queries = [
        RegistrationQuery::default(),
        RegistrationQuery::default().with_status(RegistrationStatus::Approved),
        RegistrationQuery::default().sorted_by(SortKey::FullName, SortDirection::Asc),
        RegistrationQuery::default().sorted_by(SortKey::SelectedMajor, SortDirection::Desc),
        RegistrationQuery::default().with_search("100%"),
        RegistrationQuery::default().with_search("REG2025000"),
        RegistrationQuery {
            major: Some("IPS".to_string()),
            created_from: Some(date(2025, 3, 2)),
            ..RegistrationQuery::default()
        },
        RegistrationQuery {
            per_page: Some(3),
            page: Some(2),
            ..RegistrationQuery::default()
        },
    ];

    for query in queries {
        let from_sqlite = sqlite.list(&query).expect("sqlite list");
        let from_memory = memory.list(&query).expect("memory list");
        assert_eq!(numbers(&from_sqlite), numbers(&from_memory), "{query:?}");
        assert_eq!(from_sqlite.total, from_memory.total, "{query:?}");
    }

    assert_eq!(
        sqlite.status_counts().expect("counts"),
        memory.status_counts().expect("counts")
    );
    assert_eq!(
        sqlite.major_counts().expect("majors"),
        memory.major_counts().expect("majors")
    );
    assert_eq!(
        sqlite.income_summary(Some(RegistrationStatus::Approved)).expect("income"),
        memory.income_summary(Some(RegistrationStatus::Approved)).expect("income")
    );
    assert_eq!(sqlite.distinct_majors().expect("majors"), ["IPA", "IPS"]);
}

#[test]
fn like_wildcards_in_search_terms_are_literal() {
    let store = store();
    let service = RegistrationService::new(store, clock());
    service
        .submit(applicant(1, "Nur_Aini", "IPA"))
        .expect("submit");
    service.submit(applicant(2, "NurXAini", "IPA")).expect("submit");

    let page = service
        .list(&RegistrationQuery::default().with_search("nur_"))
        .expect("search");
    assert_eq!(page.total, 1);
    assert_eq!(page.items[0].details.full_name, "Nur_Aini");
}

#[test]
fn fee_catalog_persists_order_and_removals() {
    let store = store();
    let fees = FeeCatalogService::new(store.clone(), clock());
    fees.create_year(2025).expect("year");
    let a = fees
        .add_fee(2025, FeeDraft { name: "A".to_string(), amount: 100 })
        .expect("a");
    let b = fees
        .add_fee(2025, FeeDraft { name: "B".to_string(), amount: 200 })
        .expect("b");
    let c = fees
        .add_fee(2025, FeeDraft { name: "C".to_string(), amount: 300 })
        .expect("c");
    fees.remove_fee(2025, a.id).expect("remove");
    fees.reorder_fees(2025, &[c.id, b.id]).expect("reorder");

    let stored = store.fetch_year(2025).expect("fetch").expect("present");
    let names: Vec<_> = stored.fees.iter().map(|fee| fee.name.as_str()).collect();
    assert_eq!(names, ["C", "B", "A"]);
    assert!(stored.fees[2].deleted_at.is_some());
    assert_eq!(fees.total_for_year(2025).expect("total"), 500);

    match fees.create_year(2025) {
        Err(ServiceError::Validation(errors)) => assert!(errors.has_field("academic_year")),
        other => panic!("expected duplicate year, got {other:?}"),
    }

    fees.create_year(2026).expect("next year");
    let listed: Vec<i32> = store
        .list_years()
        .expect("years")
        .iter()
        .map(|year| year.year)
        .collect();
    assert_eq!(listed, [2026, 2025]);
}

#[test]
fn ascii_case_folding_agrees_across_stores() {
    let sqlite = RegistrationService::new(store(), clock());
    let (memory, _, _) = build_service();
    for (n, name) in [(1, "andi"), (2, "Budi"), (3, "CITRA")] {
        sqlite.submit(applicant(n, name, "IPA")).expect("sqlite submit");
        memory.submit(applicant(n, name, "IPA")).expect("memory submit");
    }

    let by_name = RegistrationQuery::default().sorted_by(SortKey::FullName, SortDirection::Asc);
    let sqlite_order = numbers(&sqlite.list(&by_name).expect("sqlite list"));
    assert_eq!(sqlite_order, numbers(&memory.list(&by_name).expect("memory list")));
    assert_eq!(sqlite_order, ["REG20250001", "REG20250002", "REG20250003"]);

    let search = RegistrationQuery::default().with_search("cItRa");
    assert_eq!(sqlite.list(&search).expect("sqlite search").total, 1);
    assert_eq!(memory.list(&search).expect("memory search").total, 1);
}
