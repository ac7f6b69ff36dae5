use std::fmt;
use std::str::FromStr;

use serde::{de, Deserialize, Deserializer, Serialize, Serializer};

const PREFIX: &str = "REG";

/// Highest sequence the four digit suffix can carry.
pub const MAX_SEQUENCE: u32 = 9_999;

/// Identifier handed to applicants: `REG` + four digit year + four digit sequence.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RegistrationNumber {
    year: i32,
    sequence: u32,
}

impl RegistrationNumber {
    pub fn new(year: i32, sequence: u32) -> Result<Self, NumberingError> {
        if !(1000..=9999).contains(&year) {
            return Err(NumberingError::YearOutOfRange(year));
        }
        if sequence == 0 || sequence > MAX_SEQUENCE {
            return Err(NumberingError::SequenceExhausted { year });
        }
        Ok(Self { year, sequence })
    }

    /// First number issued in `year`.
    pub fn first(year: i32) -> Result<Self, NumberingError> {
        Self::new(year, 1)
    }

    /// Number following `last` within `year`; starts at `0001` when nothing was issued yet.
    ///
    /// `last` belonging to another year is ignored, sequences never carry across years.
    pub fn next_after(year: i32, last: Option<&RegistrationNumber>) -> Result<Self, NumberingError> {
        match last.filter(|number| number.year == year) {
            Some(number) => Self::new(year, number.sequence + 1),
            None => Self::first(year),
        }
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn sequence(&self) -> u32 {
        self.sequence
    }
}

impl fmt::Display for RegistrationNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{PREFIX}{:04}{:04}", self.year, self.sequence)
    }
}

impl FromStr for RegistrationNumber {
    type Err = NumberingError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let malformed = || NumberingError::Malformed(raw.to_string());
        let digits = raw.trim().strip_prefix(PREFIX).ok_or_else(malformed)?;
        if digits.len() != 8 || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return Err(malformed());
        }
        let year = digits[..4].parse().map_err(|_| malformed())?;
        let sequence = digits[4..].parse().map_err(|_| malformed())?;
        Self::new(year, sequence).map_err(|_| malformed())
    }
}

impl Serialize for RegistrationNumber {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for RegistrationNumber {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(de::Error::custom)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NumberingError {
    #[error("'{0}' is not a registration number")]
    Malformed(String),
    #[error("year {0} cannot be encoded in a registration number")]
    YearOutOfRange(i32),
    #[error("registration sequence for {year} is exhausted")]
    SequenceExhausted { year: i32 },
}

/// Per-year high-water marks used by stores to serialize number allocation.
///
/// Each store keeps one of these (or an equivalent table) and advances it in
/// the same critical section as the insert it numbers.
#[derive(Debug, Default, Clone)]
pub struct SequenceLedger {
    last: std::collections::HashMap<i32, u32>,
}

impl SequenceLedger {
    /// Raises the mark for the number's year if it is behind.
    pub fn observe(&mut self, number: &RegistrationNumber) {
        let entry = self.last.entry(number.year).or_insert(0);
        if number.sequence > *entry {
            *entry = number.sequence;
        }
    }

    pub fn last_for(&self, year: i32) -> Option<u32> {
        self.last.get(&year).copied()
    }

    /// Reserves the next number for `year` and advances the mark.
    pub fn allocate(&mut self, year: i32) -> Result<RegistrationNumber, NumberingError> {
        let next = self.last_for(year).unwrap_or(0) + 1;
        let number = RegistrationNumber::new(year, next)?;
        self.last.insert(year, next);
        Ok(number)
    }
}
