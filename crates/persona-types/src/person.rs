//! The `Person` record as stored in the remote document store and in queued payloads.

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::rut::is_valid_identifier;

/// Wire format of `birthDate` (e.g. `01-01-1990`).
pub const BIRTH_DATE_FORMAT: &str = "%d-%m-%Y";

/// Postal address of a person.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Address {
    pub street: String,
    pub district: String,
    pub region: String,
}

/// A person record, keyed by its identifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Person {
    /// Identifier (RUT); immutable once the record exists.
    pub id: String,
    pub given_name: String,
    pub family_name: String,
    #[serde(with = "birth_date")]
    pub birth_date: NaiveDate,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<Address>,
}

impl Person {
    /// Check every required field, collecting all problems.
    pub fn validate(&self) -> Result<(), ValidationError> {
        let mut problems = Vec::new();

        if self.id.trim().is_empty() {
            problems.push("id: identifier is required".to_string());
        } else if !is_valid_identifier(&self.id) {
            problems.push(format!("id: '{}' is not a valid identifier", self.id));
        }
        if self.given_name.trim().is_empty() {
            problems.push("givenName: is required".to_string());
        }
        if self.family_name.trim().is_empty() {
            problems.push("familyName: is required".to_string());
        }
        if let Some(address) = &self.address {
            if address.street.trim().is_empty() {
                problems.push("address.street: is required".to_string());
            }
            if address.district.trim().is_empty() {
                problems.push("address.district: is required".to_string());
            }
            if address.region.trim().is_empty() {
                problems.push("address.region: is required".to_string());
            }
        }

        if problems.is_empty() {
            Ok(())
        } else {
            Err(ValidationError { problems })
        }
    }

    /// Completed years of age on `today`. Zero for birth dates in the future.
    pub fn age_on(&self, today: NaiveDate) -> u32 {
        if today < self.birth_date {
            return 0;
        }
        let mut years = today.year() - self.birth_date.year();
        if (today.month(), today.day()) < (self.birth_date.month(), self.birth_date.day()) {
            years -= 1;
        }
        u32::try_from(years).unwrap_or(0)
    }
}

/// Field-level validation failure for a `Person`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub problems: Vec<String>,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "invalid person: {}", self.problems.join("; "))
    }
}

impl std::error::Error for ValidationError {}

mod birth_date {
    use super::BIRTH_DATE_FORMAT;
    use chrono::NaiveDate;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(date: &NaiveDate, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&date.format(BIRTH_DATE_FORMAT).to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveDate, D::Error> {
        let raw = String::deserialize(deserializer)?;
        NaiveDate::parse_from_str(raw.trim(), BIRTH_DATE_FORMAT).map_err(|e| {
            serde::de::Error::custom(format!(
                "birthDate '{}' must be dd-MM-yyyy: {}",
                raw, e
            ))
        })
    }
}
