//! Core type definitions with validation.

use std::fmt;

use chrono::{DateTime, FixedOffset, NaiveDate};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Calendar date format used for stored dates and bucket labels.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Validation errors for core types.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// The provided value was empty.
    #[error("{field} cannot be empty")]
    Empty { field: &'static str },

    /// A calendar date was not `YYYY-MM-DD`.
    #[error("invalid {field}: {value} (expected YYYY-MM-DD)")]
    InvalidDate { field: &'static str, value: String },

    /// A timestamp was not RFC 3339.
    #[error("invalid {field}: {value} (expected RFC 3339)")]
    InvalidTimestamp { field: &'static str, value: String },

    /// A date range ended before it started.
    #[error("date range ends before it starts: {start} > {end}")]
    ReversedRange { start: NaiveDate, end: NaiveDate },

    /// Invalid filter kind value.
    #[error("invalid filter kind: {value} (expected whitelist or blacklist)")]
    InvalidFilterKind { value: String },

    /// Invalid report period value.
    #[error("invalid period: {value} (expected week, month or year)")]
    InvalidPeriod { value: String },

    /// Invalid series granularity value.
    #[error("invalid granularity: {value} (expected day, week or month)")]
    InvalidGranularity { value: String },

    /// Invalid import mode value.
    #[error("invalid import mode: {value} (expected merge or replace)")]
    InvalidImportMode { value: String },

    /// Unrecognized time zone.
    #[error("invalid time zone: {value} (expected local, utc, an offset like +02:00 or a zone like Europe/Paris)")]
    InvalidZone { value: String },
}

/// Which list a filter entry belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterKind {
    /// Identities that may be tracked.
    Whitelist,
    /// Identities that must never be tracked or reported.
    Blacklist,
}

impl FilterKind {
    /// String representation for database storage.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Whitelist => "whitelist",
            Self::Blacklist => "blacklist",
        }
    }
}

impl fmt::Display for FilterKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for FilterKind {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "whitelist" => Ok(Self::Whitelist),
            "blacklist" => Ok(Self::Blacklist),
            _ => Err(ValidationError::InvalidFilterKind {
                value: s.to_string(),
            }),
        }
    }
}

/// Generates a validated, trimmed name newtype with common trait implementations.
macro_rules! define_name {
    (
        $(#[$meta:meta])*
        $name:ident, $field_name:literal
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(try_from = "String", into = "String")]
        pub struct $name(String);

        impl $name {
            /// Creates a new name after trimming and validation.
            pub fn new(name: impl Into<String>) -> Result<Self, ValidationError> {
                let name = name.into();
                let trimmed = name.trim();
                if trimmed.is_empty() {
                    return Err(ValidationError::Empty { field: $field_name });
                }
                if trimmed.len() == name.len() {
                    Ok(Self(name))
                } else {
                    Ok(Self(trimmed.to_string()))
                }
            }

            /// Returns the name as a string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl TryFrom<String> for $name {
            type Error = ValidationError;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                Self::new(value)
            }
        }

        impl From<$name> for String {
            fn from(name: $name) -> Self {
                name.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

define_name!(
    /// The identifier captured at recording time (e.g., an executable name).
    RawIdentity, "raw identity"
);

define_name!(
    /// The user-facing name a raw identity resolves to.
    ///
    /// Several raw identities may share one display name.
    DisplayName, "display name"
);

/// Parses a `YYYY-MM-DD` calendar date.
pub fn parse_date(field: &'static str, value: &str) -> Result<NaiveDate, ValidationError> {
    NaiveDate::parse_from_str(value.trim(), DATE_FORMAT).map_err(|_| {
        ValidationError::InvalidDate {
            field,
            value: value.to_string(),
        }
    })
}

/// Parses an RFC 3339 timestamp, keeping its offset.
pub fn parse_timestamp(
    field: &'static str,
    value: &str,
) -> Result<DateTime<FixedOffset>, ValidationError> {
    DateTime::parse_from_rfc3339(value.trim()).map_err(|_| ValidationError::InvalidTimestamp {
        field,
        value: value.to_string(),
    })
}

/// An inclusive range of calendar dates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    /// Creates a range, rejecting ranges that end before they start.
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self, ValidationError> {
        if end < start {
            return Err(ValidationError::ReversedRange { start, end });
        }
        Ok(Self { start, end })
    }

    /// Parses both bounds as `YYYY-MM-DD`.
    pub fn parse(start: &str, end: &str) -> Result<Self, ValidationError> {
        Self::new(parse_date("start date", start)?, parse_date("end date", end)?)
    }

    /// Returns true when `date` lies inside the range.
    #[must_use]
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }

    /// Iterates every day of the range in order.
    pub fn days(&self) -> impl Iterator<Item = NaiveDate> + use<> {
        let end = self.end;
        self.start.iter_days().take_while(move |day| *day <= end)
    }

    /// Start bound formatted for SQL comparisons.
    #[must_use]
    pub fn start_str(&self) -> String {
        self.start.format(DATE_FORMAT).to_string()
    }

    /// End bound formatted for SQL comparisons.
    #[must_use]
    pub fn end_str(&self) -> String {
        self.end.format(DATE_FORMAT).to_string()
    }
}
