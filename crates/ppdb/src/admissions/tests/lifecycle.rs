use super::common::*;
use crate::admissions::domain::{RegistrationId, RegistrationStatus};
use crate::admissions::lifecycle::{
    can_be_edited, can_be_printed, ensure_editable, ensure_printable, BulkItemFailure,
    BulkStatusReport, StatusTransition,
};
use crate::admissions::numbering::RegistrationNumber;

fn transition(from: RegistrationStatus, to: RegistrationStatus) -> StatusTransition {
    StatusTransition {
        id: RegistrationId(1),
        registration_number: RegistrationNumber::first(2025).expect("valid number"),
        from,
        to,
    }
}

#[test]
fn only_pending_registrations_are_editable() {
    assert!(can_be_edited(&registration(1, 1, RegistrationStatus::Pending)));
    assert!(!can_be_edited(&registration(2, 2, RegistrationStatus::Approved)));
    assert!(!can_be_edited(&registration(3, 3, RegistrationStatus::Rejected)));

    let denied = ensure_editable(&registration(2, 2, RegistrationStatus::Approved))
        .expect_err("approved registrations are locked");
    assert_eq!(denied.to_string(), "cannot edit a registration that is approved");
}

#[test]
fn only_approved_registrations_are_printable() {
    assert!(can_be_printed(&registration(1, 1, RegistrationStatus::Approved)));
    assert!(!can_be_printed(&registration(2, 2, RegistrationStatus::Pending)));
    ensure_printable(&registration(1, 1, RegistrationStatus::Approved)).expect("printable");
    let denied = ensure_printable(&registration(3, 3, RegistrationStatus::Rejected))
        .expect_err("rejected registrations have no slip");
    assert_eq!(denied.action, "print");
}

#[test]
fn undoing_a_decision_is_flagged() {
    use RegistrationStatus::*;

    let decided = transition(Pending, Approved);
    assert!(!decided.is_flagged());
    assert!(!decided.reopened());

    let reopened = transition(Approved, Pending);
    assert!(reopened.reopened());
    assert!(reopened.is_flagged());

    let flipped = transition(Approved, Rejected);
    assert!(!flipped.reopened());
    assert!(flipped.is_flagged());

    let repeated = transition(Rejected, Rejected);
    assert!(repeated.is_noop());
    assert!(!repeated.is_flagged());
}

#[test]
fn bulk_report_lists_both_outcomes() {
    let mut report = BulkStatusReport::new(RegistrationStatus::Approved);
    assert!(report.is_complete());

    report
        .succeeded
        .push(transition(RegistrationStatus::Pending, RegistrationStatus::Approved));
    report.failed.push(BulkItemFailure {
        id: RegistrationId(9),
        reason: "registration 9 not found".to_string(),
    });

    assert!(!report.is_complete());
    assert_eq!(report.succeeded_ids(), vec![RegistrationId(1)]);
    assert_eq!(report.failed_ids(), vec![RegistrationId(9)]);
}

#[test]
fn statuses_carry_labels_and_default_to_pending() {
    assert_eq!(RegistrationStatus::default(), RegistrationStatus::Pending);
    assert_eq!(RegistrationStatus::Approved.label(), "Diterima");
    assert_eq!(RegistrationStatus::Rejected.tone(), "danger");
    assert_eq!(
        " Approved ".parse::<RegistrationStatus>().expect("parses"),
        RegistrationStatus::Approved
    );
    assert!("archived".parse::<RegistrationStatus>().is_err());
}
