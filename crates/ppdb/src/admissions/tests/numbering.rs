use serde_json::json;

use crate::admissions::numbering::{NumberingError, RegistrationNumber, SequenceLedger};

#[test]
fn numbers_render_with_year_and_padded_sequence() {
    let number = RegistrationNumber::new(2025, 7).expect("valid number");
    assert_eq!(number.to_string(), "REG20250007");
    assert_eq!(number.year(), 2025);
    assert_eq!(number.sequence(), 7);
    assert_eq!(serde_json::to_value(&number).expect("serializes"), json!("REG20250007"));
}

#[test]
fn parse_accepts_rendered_numbers() {
    let parsed: RegistrationNumber = "REG20259999".parse().expect("parses");
    assert_eq!(parsed, RegistrationNumber::new(2025, 9999).expect("valid number"));
}

#[test]
fn parse_rejects_malformed_numbers() {
    for raw in ["REG2025001", "ABC20250001", "REG2025000A", "REG20250000", "20250001", ""] {
        assert!(
            matches!(raw.parse::<RegistrationNumber>(), Err(NumberingError::Malformed(_))),
            "{raw:?} should be rejected"
        );
    }
}

#[test]
fn next_after_continues_within_the_year_and_restarts_on_a_new_one() {
    let last = RegistrationNumber::new(2025, 41).expect("valid number");

    let next = RegistrationNumber::next_after(2025, Some(&last)).expect("next number");
    assert_eq!(next.to_string(), "REG20250042");

    let new_year = RegistrationNumber::next_after(2026, Some(&last)).expect("next number");
    assert_eq!(new_year.to_string(), "REG20260001");

    let first = RegistrationNumber::next_after(2025, None).expect("first number");
    assert_eq!(first.to_string(), "REG20250001");
}

#[test]
fn sequence_beyond_four_digits_is_refused() {
    let last = RegistrationNumber::new(2025, 9999).expect("valid number");
    assert_eq!(
        RegistrationNumber::next_after(2025, Some(&last)),
        Err(NumberingError::SequenceExhausted { year: 2025 })
    );
    assert_eq!(
        RegistrationNumber::new(999, 1),
        Err(NumberingError::YearOutOfRange(999))
    );
}

#[test]
fn ledger_tracks_each_year_independently() {
    let mut ledger = SequenceLedger::default();
    ledger.observe(&RegistrationNumber::new(2025, 12).expect("valid number"));
    ledger.observe(&RegistrationNumber::new(2025, 3).expect("valid number"));

    assert_eq!(ledger.last_for(2025), Some(12));
    assert_eq!(ledger.allocate(2025).expect("allocates").to_string(), "REG20250013");
    assert_eq!(ledger.allocate(2026).expect("allocates").to_string(), "REG20260001");
    assert_eq!(ledger.last_for(2025), Some(13));
}
