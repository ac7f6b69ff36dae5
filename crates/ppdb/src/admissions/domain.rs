use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use super::numbering::RegistrationNumber;

/// Raised when a stored or submitted value is not part of an enum's lookup table.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("'{value}' is not a valid {kind}")]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}

/// Declares a closed set of values backed by a single value/label lookup table.
///
/// Serialization, parsing and display all go through the same table so a value
/// that is not listed can never reach the domain.
macro_rules! labelled_enum {
    (
        $(#[$meta:meta])*
        $name:ident ($kind:literal) {
            $($variant:ident => ($value:literal, $label:literal)),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            /// `(value, label)` pairs in declaration order.
            pub const OPTIONS: &'static [(&'static str, &'static str)] = &[$(($value, $label)),+];

            pub const fn as_str(self) -> &'static str {
                match self {
                    $($name::$variant => $value),+
                }
            }

            pub const fn label(self) -> &'static str {
                match self {
                    $($name::$variant => $label),+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = UnknownVariant;

            fn from_str(value: &str) -> Result<Self, Self::Err> {
                match value.trim().to_ascii_lowercase().as_str() {
                    $($value => Ok($name::$variant),)+
                    _ => Err(UnknownVariant {
                        kind: $kind,
                        value: value.to_string(),
                    }),
                }
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_str(self.as_str())
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let raw = String::deserialize(deserializer)?;
                raw.parse().map_err(de::Error::custom)
            }
        }
    };
}

labelled_enum! {
    Gender ("gender") {
        Male => ("male", "Laki-laki"),
        Female => ("female", "Perempuan"),
    }
}

labelled_enum! {
    Religion ("religion") {
        Islam => ("islam", "Islam"),
        Protestant => ("protestant", "Protestan"),
        Catholic => ("catholic", "Katolik"),
        Hindu => ("hindu", "Hindu"),
        Buddha => ("buddha", "Buddha"),
        Confucian => ("confucian", "Konghucu"),
    }
}

labelled_enum! {
    ChildStatus ("child status") {
        Biological => ("biological", "Anak Kandung"),
        Step => ("step", "Anak Tiri"),
        Adopted => ("adopted", "Anak Angkat"),
    }
}

labelled_enum! {
    BloodType ("blood type") {
        A => ("a", "A"),
        B => ("b", "B"),
        Ab => ("ab", "AB"),
        O => ("o", "O"),
    }
}

labelled_enum! {
    UniformSize ("uniform size") {
        S => ("s", "S"),
        M => ("m", "M"),
        L => ("l", "L"),
        Xl => ("xl", "XL"),
        Xxl => ("xxl", "XXL"),
        Xxxl => ("xxxl", "XXXL"),
        Jumbo => ("jumbo", "Jumbo"),
    }
}

labelled_enum! {
    ResidenceStatus ("residence status") {
        Owned => ("owned", "Milik Sendiri"),
        Rented => ("rented", "Sewa"),
    }
}

labelled_enum! {
    Transportation ("transportation") {
        Walking => ("walking", "Jalan Kaki"),
        Motorcycle => ("motorcycle", "Motor"),
        Car => ("car", "Mobil"),
        PublicTransportation => ("public_transportation", "Transportasi Umum"),
    }
}

labelled_enum! {
    PreviousSchoolType ("previous school type") {
        Smpn => ("smpn", "SMPN"),
        Smpit => ("smpit", "SMPIT"),
        Smp => ("smp", "SMP"),
        Mtsn => ("mtsn", "MTsN"),
        Mts => ("mts", "MTs"),
        Pkbm => ("pkbm", "PKBM"),
        Ponpes => ("ponpes", "Ponpes"),
    }
}

labelled_enum! {
    ReferenceSource ("reference source") {
        Friend => ("friend", "Teman"),
        Teacher => ("teacher", "Guru"),
        Alumni => ("alumni", "Alumni"),
        Neighbor => ("neighbor", "Tetangga"),
        Personal => ("personal", "Pribadi"),
    }
}

labelled_enum! {
    /// Lifecycle state of a registration; new submissions start as pending.
    RegistrationStatus ("registration status") {
        Pending => ("pending", "Menunggu"),
        Approved => ("approved", "Diterima"),
        Rejected => ("rejected", "Ditolak"),
    }
}

impl RegistrationStatus {
    pub const fn is_terminal(self) -> bool {
        !matches!(self, RegistrationStatus::Pending)
    }

    /// Badge colour used by listings.
    pub const fn tone(self) -> &'static str {
        match self {
            RegistrationStatus::Pending => "warning",
            RegistrationStatus::Approved => "success",
            RegistrationStatus::Rejected => "danger",
        }
    }
}

impl Default for RegistrationStatus {
    fn default() -> Self {
        RegistrationStatus::Pending
    }
}

/// Fixed-point currency amount stored as hundredths of the currency unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Money(i64);

impl Money {
    pub const ZERO: Money = Money(0);

    pub const fn from_minor(minor: i64) -> Self {
        Self(minor)
    }

    pub const fn from_units(units: i64) -> Self {
        Self(units * 100)
    }

    pub const fn minor(self) -> i64 {
        self.0
    }

    pub fn is_negative(self) -> bool {
        self.0 < 0
    }
}

impl std::ops::Add for Money {
    type Output = Money;

    fn add(self, rhs: Money) -> Money {
        Money(self.0.saturating_add(rhs.0))
    }
}

impl std::iter::Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Money {
        iter.fold(Money::ZERO, |acc, value| acc + value)
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        write!(f, "{sign}{}.{:02}", abs / 100, abs % 100)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("'{0}' is not a decimal amount with at most two fractional digits")]
pub struct InvalidMoney(pub String);

impl FromStr for Money {
    type Err = InvalidMoney;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let invalid = || InvalidMoney(raw.to_string());
        let trimmed = raw.trim();
        let (negative, digits) = match trimmed.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, trimmed),
        };
        let (whole, fraction) = match digits.split_once('.') {
            Some((whole, fraction)) => (whole, fraction),
            None => (digits, ""),
        };
        if whole.is_empty()
            || fraction.len() > 2
            || !whole.bytes().all(|b| b.is_ascii_digit())
            || !fraction.bytes().all(|b| b.is_ascii_digit())
        {
            return Err(invalid());
        }

        let whole: i64 = whole.parse().map_err(|_| invalid())?;
        let fraction: i64 = match fraction.len() {
            0 => 0,
            1 => fraction.parse::<i64>().map_err(|_| invalid())? * 10,
            _ => fraction.parse().map_err(|_| invalid())?,
        };
        let minor = whole
            .checked_mul(100)
            .and_then(|value| value.checked_add(fraction))
            .ok_or_else(invalid)?;

        Ok(Money(if negative { -minor } else { minor }))
    }
}

impl Serialize for Money {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Money {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct MoneyVisitor;

        impl Visitor<'_> for MoneyVisitor {
            type Value = Money;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a decimal amount as a number or string")
            }

            fn visit_i64<E: de::Error>(self, value: i64) -> Result<Money, E> {
                value
                    .checked_mul(100)
                    .map(Money)
                    .ok_or_else(|| E::custom("amount out of range"))
            }

            fn visit_u64<E: de::Error>(self, value: u64) -> Result<Money, E> {
                i64::try_from(value)
                    .ok()
                    .and_then(|value| value.checked_mul(100))
                    .map(Money)
                    .ok_or_else(|| E::custom("amount out of range"))
            }

            fn visit_f64<E: de::Error>(self, value: f64) -> Result<Money, E> {
                let minor = (value * 100.0).round();
                if !minor.is_finite() || minor.abs() > i64::MAX as f64 {
                    return Err(E::custom("amount out of range"));
                }
                Ok(Money(minor as i64))
            }

            fn visit_str<E: de::Error>(self, value: &str) -> Result<Money, E> {
                value.parse().map_err(E::custom)
            }
        }

        deserializer.deserialize_any(MoneyVisitor)
    }
}

/// Surrogate key of a persisted registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RegistrationId(pub u64);

impl fmt::Display for RegistrationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Every field an applicant (or an administrator on their behalf) may fill in.
///
/// The same payload is used for submission and for edits while the
/// registration is still pending.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistrantDetails {
    pub nik: String,
    pub family_card_number: String,
    pub nisn: String,
    pub full_name: String,
    pub gender: Gender,
    pub birth_place: String,
    pub birth_date: NaiveDate,
    pub religion: Religion,

    pub child_order: u8,
    pub siblings_count: u8,
    pub child_status: ChildStatus,

    pub height: u16,
    pub weight: u16,
    #[serde(default)]
    pub blood_type: Option<BloodType>,

    pub address: String,
    pub village: String,
    pub district: String,
    pub city: String,
    pub province: String,
    pub postal_code: String,
    pub email: String,

    pub uniform_size: UniformSize,
    pub residence_status: ResidenceStatus,
    pub transportation: Transportation,

    pub previous_school_type: PreviousSchoolType,
    pub previous_school_address: String,
    #[serde(default)]
    pub diploma_number: Option<String>,
    #[serde(default)]
    pub diploma_date: Option<NaiveDate>,
    pub graduation_year: u16,
    pub student_phone: String,

    pub father_name: String,
    pub father_nik: String,
    pub father_occupation: String,
    pub father_income: Money,

    pub mother_name: String,
    pub mother_nik: String,
    pub mother_occupation: String,
    pub mother_income: Money,

    pub parents_address: String,
    pub parents_phone: String,

    #[serde(default)]
    pub guardian_name: Option<String>,
    #[serde(default)]
    pub guardian_occupation: Option<String>,
    #[serde(default)]
    pub guardian_income: Option<Money>,
    #[serde(default)]
    pub guardian_address: Option<String>,
    #[serde(default)]
    pub guardian_phone: Option<String>,

    #[serde(default)]
    pub kks_number: Option<String>,
    #[serde(default)]
    pub kip_number: Option<String>,

    pub reference_source: ReferenceSource,
    pub selected_major: String,
}

impl RegistrantDetails {
    /// Trims free text and drops optional values that are blank.
    pub fn normalized(mut self) -> Self {
        fn text(value: &mut String) {
            let trimmed = value.trim();
            if trimmed.len() != value.len() {
                *value = trimmed.to_string();
            }
        }
        fn optional(value: &mut Option<String>) {
            *value = value
                .take()
                .map(|inner| inner.trim().to_string())
                .filter(|inner| !inner.is_empty());
        }

        for field in [
            &mut self.nik,
            &mut self.family_card_number,
            &mut self.nisn,
            &mut self.full_name,
            &mut self.birth_place,
            &mut self.address,
            &mut self.village,
            &mut self.district,
            &mut self.city,
            &mut self.province,
            &mut self.postal_code,
            &mut self.previous_school_address,
            &mut self.student_phone,
            &mut self.father_name,
            &mut self.father_nik,
            &mut self.father_occupation,
            &mut self.mother_name,
            &mut self.mother_nik,
            &mut self.mother_occupation,
            &mut self.parents_address,
            &mut self.parents_phone,
            &mut self.selected_major,
        ] {
            text(field);
        }
        self.email = self.email.trim().to_ascii_lowercase();

        for field in [
            &mut self.diploma_number,
            &mut self.guardian_name,
            &mut self.guardian_occupation,
            &mut self.guardian_address,
            &mut self.guardian_phone,
            &mut self.kks_number,
            &mut self.kip_number,
        ] {
            optional(field);
        }

        self
    }
}

/// A persisted registration, including audit metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StudentRegistration {
    pub id: RegistrationId,
    pub registration_number: RegistrationNumber,
    #[serde(flatten)]
    pub details: RegistrantDetails,
    pub registration_status: RegistrationStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing)]
    pub deleted_at: Option<DateTime<Utc>>,
}

impl StudentRegistration {
    /// Whole years elapsed between the birth date and `today`.
    pub fn age(&self, today: NaiveDate) -> u32 {
        full_years_between(self.details.birth_date, today)
    }

    pub fn total_parent_income(&self) -> Money {
        self.details.father_income + self.details.mother_income
    }

    /// Name with every word capitalised, the way listings print it.
    pub fn display_name(&self) -> String {
        self.details
            .full_name
            .split_whitespace()
            .map(|word| {
                let lower = word.to_lowercase();
                let mut chars = lower.chars();
                match chars.next() {
                    Some(first) => first.to_uppercase().chain(chars).collect(),
                    None => String::new(),
                }
            })
            .collect::<Vec<_>>()
            .join(" ")
    }

    pub fn has_complete_parent_info(&self) -> bool {
        let d = &self.details;
        [&d.father_name, &d.father_nik, &d.mother_name, &d.mother_nik]
            .iter()
            .all(|value| !value.trim().is_empty())
    }

    pub fn has_guardian(&self) -> bool {
        self.details
            .guardian_name
            .as_deref()
            .is_some_and(|name| !name.trim().is_empty())
    }

    pub fn has_social_support(&self) -> bool {
        [&self.details.kks_number, &self.details.kip_number]
            .iter()
            .any(|value| value.as_deref().is_some_and(|v| !v.trim().is_empty()))
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }

    /// Response shape with derived values resolved against `today`.
    pub fn view(&self, today: NaiveDate) -> RegistrationView {
        RegistrationView {
            record: self.clone(),
            display_name: self.display_name(),
            age: self.age(today),
            total_parent_income: self.total_parent_income(),
            status_label: self.registration_status.label(),
            can_be_edited: super::lifecycle::can_be_edited(self),
            can_be_printed: super::lifecycle::can_be_printed(self),
            has_complete_parent_info: self.has_complete_parent_info(),
            has_guardian: self.has_guardian(),
            has_social_support: self.has_social_support(),
        }
    }

    /// Compact summary used by global search results.
    pub fn search_details(&self) -> SearchResultView {
        SearchResultView {
            id: self.id,
            title: self.display_name(),
            registration_number: self.registration_number.clone(),
            selected_major: self.details.selected_major.clone(),
            status: self.registration_status,
            status_label: self.registration_status.label(),
        }
    }
}

pub(crate) fn full_years_between(from: NaiveDate, to: NaiveDate) -> u32 {
    if to <= from {
        return 0;
    }
    let mut years = to.year() - from.year();
    if (to.month(), to.day()) < (from.month(), from.day()) {
        years -= 1;
    }
    years.max(0) as u32
}

/// Registration enriched with derived fields for API responses.
#[derive(Debug, Clone, Serialize)]
pub struct RegistrationView {
    #[serde(flatten)]
    pub record: StudentRegistration,
    pub display_name: String,
    pub age: u32,
    pub total_parent_income: Money,
    pub status_label: &'static str,
    pub can_be_edited: bool,
    pub can_be_printed: bool,
    pub has_complete_parent_info: bool,
    pub has_guardian: bool,
    pub has_social_support: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct SearchResultView {
    pub id: RegistrationId,
    pub title: String,
    pub registration_number: RegistrationNumber,
    pub selected_major: String,
    pub status: RegistrationStatus,
    pub status_label: &'static str,
}
