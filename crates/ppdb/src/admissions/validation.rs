use std::fmt;

use chrono::{Months, NaiveDate};
use serde::Serialize;

use super::descriptor::{FieldDescriptor, Rule, REGISTRATION_FIELDS};
use super::domain::{Money, RegistrantDetails};

/// A single rejected field with a human readable reason.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Every field that failed validation for one payload.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ValidationErrors {
    pub errors: Vec<FieldError>,
}

impl ValidationErrors {
    pub fn single(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            errors: vec![FieldError::new(field, message)],
        }
    }

    pub fn push(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.errors.push(FieldError::new(field, message));
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn has_field(&self, field: &str) -> bool {
        self.errors.iter().any(|error| error.field == field)
    }

    pub fn into_result(self) -> Result<(), ValidationErrors> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let fields: Vec<_> = self
            .errors
            .iter()
            .map(|error| format!("{}: {}", error.field, error.message))
            .collect();
        write!(f, "validation failed ({})", fields.join("; "))
    }
}

impl std::error::Error for ValidationErrors {}

/// Borrowed view of one field's value, as the rules see it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FieldValue<'a> {
    Text(Option<&'a str>),
    Integer(Option<i64>),
    Date(Option<NaiveDate>),
    Amount(Option<Money>),
    Choice(Option<&'static str>),
}

impl FieldValue<'_> {
    fn is_present(&self) -> bool {
        match self {
            FieldValue::Text(value) => value.is_some_and(|text| !text.trim().is_empty()),
            FieldValue::Integer(value) => value.is_some(),
            FieldValue::Date(value) => value.is_some(),
            FieldValue::Amount(value) => value.is_some(),
            FieldValue::Choice(value) => value.is_some(),
        }
    }
}

impl RegistrantDetails {
    /// Looks a field up by its descriptor name.
    pub fn field_value(&self, name: &str) -> Option<FieldValue<'_>> {
        use FieldValue::*;

        fn text(value: &str) -> FieldValue<'_> {
            FieldValue::Text(Some(value))
        }
        fn optional(value: &Option<String>) -> FieldValue<'_> {
            FieldValue::Text(value.as_deref())
        }

        let value = match name {
            "nik" => text(&self.nik),
            "family_card_number" => text(&self.family_card_number),
            "nisn" => text(&self.nisn),
            "full_name" => text(&self.full_name),
            "gender" => Choice(Some(self.gender.as_str())),
            "birth_place" => text(&self.birth_place),
            "birth_date" => Date(Some(self.birth_date)),
            "religion" => Choice(Some(self.religion.as_str())),
            "child_order" => Integer(Some(self.child_order.into())),
            "siblings_count" => Integer(Some(self.siblings_count.into())),
            "child_status" => Choice(Some(self.child_status.as_str())),
            "height" => Integer(Some(self.height.into())),
            "weight" => Integer(Some(self.weight.into())),
            "blood_type" => Choice(self.blood_type.map(|value| value.as_str())),
            "address" => text(&self.address),
            "village" => text(&self.village),
            "district" => text(&self.district),
            "city" => text(&self.city),
            "province" => text(&self.province),
            "postal_code" => text(&self.postal_code),
            "email" => text(&self.email),
            "uniform_size" => Choice(Some(self.uniform_size.as_str())),
            "residence_status" => Choice(Some(self.residence_status.as_str())),
            "transportation" => Choice(Some(self.transportation.as_str())),
            "previous_school_type" => Choice(Some(self.previous_school_type.as_str())),
            "previous_school_address" => text(&self.previous_school_address),
            "diploma_number" => optional(&self.diploma_number),
            "diploma_date" => Date(self.diploma_date),
            "graduation_year" => Integer(Some(self.graduation_year.into())),
            "student_phone" => text(&self.student_phone),
            "father_name" => text(&self.father_name),
            "father_nik" => text(&self.father_nik),
            "father_occupation" => text(&self.father_occupation),
            "father_income" => Amount(Some(self.father_income)),
            "mother_name" => text(&self.mother_name),
            "mother_nik" => text(&self.mother_nik),
            "mother_occupation" => text(&self.mother_occupation),
            "mother_income" => Amount(Some(self.mother_income)),
            "parents_address" => text(&self.parents_address),
            "parents_phone" => text(&self.parents_phone),
            "guardian_name" => optional(&self.guardian_name),
            "guardian_occupation" => optional(&self.guardian_occupation),
            "guardian_income" => Amount(self.guardian_income),
            "guardian_address" => optional(&self.guardian_address),
            "guardian_phone" => optional(&self.guardian_phone),
            "kks_number" => optional(&self.kks_number),
            "kip_number" => optional(&self.kip_number),
            "reference_source" => Choice(Some(self.reference_source.as_str())),
            "selected_major" => text(&self.selected_major),
            _ => return None,
        };
        Some(value)
    }
}

/// Applies every descriptor rule to the payload, collecting all failures.
///
/// Uniqueness is left to the store, which checks it inside the same atomic
/// unit as the write.
pub fn validate_details(
    details: &RegistrantDetails,
    today: NaiveDate,
) -> Result<(), ValidationErrors> {
    let mut errors = ValidationErrors::default();
    for descriptor in REGISTRATION_FIELDS {
        let Some(value) = details.field_value(descriptor.name) else {
            continue;
        };
        if let Some(message) = check_field(descriptor, value, today) {
            errors.push(descriptor.name, message);
        }
    }
    errors.into_result()
}

fn check_field(descriptor: &FieldDescriptor, value: FieldValue<'_>, today: NaiveDate) -> Option<String> {
    if !value.is_present() {
        return descriptor
            .rules
            .contains(&Rule::Required)
            .then(|| format!("{} is required", descriptor.label));
    }

    descriptor
        .rules
        .iter()
        .find_map(|rule| check_rule(descriptor, *rule, value, today))
}

fn check_rule(
    descriptor: &FieldDescriptor,
    rule: Rule,
    value: FieldValue<'_>,
    today: NaiveDate,
) -> Option<String> {
    let label = descriptor.label;
    match (rule, value) {
        (Rule::MaxLength(max), FieldValue::Text(Some(text))) if text.chars().count() > max => {
            Some(format!("{label} may not be longer than {max} characters"))
        }
        (Rule::ExactDigits(len), FieldValue::Text(Some(text)))
            if text.len() != len || !text.bytes().all(|b| b.is_ascii_digit()) =>
        {
            Some(format!("{label} must be exactly {len} digits"))
        }
        (Rule::Min(min), FieldValue::Integer(Some(number))) if number < min => {
            Some(format!("{label} must be at least {min}"))
        }
        (Rule::Max(max), FieldValue::Integer(Some(number))) if number > max => {
            Some(format!("{label} may not be greater than {max}"))
        }
        (Rule::NonNegative, FieldValue::Amount(Some(amount))) if amount.is_negative() => {
            Some(format!("{label} may not be negative"))
        }
        (Rule::MaxAmount(max), FieldValue::Amount(Some(amount))) if amount > max => {
            Some(format!("{label} may not be greater than {max}"))
        }
        (Rule::Email, FieldValue::Text(Some(text))) if !is_email(text) => {
            Some(format!("{label} must be a valid email address"))
        }
        (Rule::Phone, FieldValue::Text(Some(text))) if !is_phone(text) => {
            Some(format!("{label} must be a valid phone number"))
        }
        (Rule::BornAtLeastYearsAgo(years), FieldValue::Date(Some(date))) => {
            let latest = today.checked_sub_months(Months::new(years * 12))?;
            (date > latest).then(|| format!("{label} must be on or before {latest}"))
        }
        _ => None,
    }
}

pub(crate) fn is_email(raw: &str) -> bool {
    let Some((local, domain)) = raw.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.contains('@')
        && !raw.chars().any(char::is_whitespace)
        && domain.split('.').count() >= 2
        && domain.split('.').all(|label| !label.is_empty())
}

pub(crate) fn is_phone(raw: &str) -> bool {
    let mut digits = 0;
    for ch in raw.chars() {
        match ch {
            '0'..='9' => digits += 1,
            '+' | '-' | ' ' | '(' | ')' => {}
            _ => return false,
        }
    }
    digits >= 6
}
