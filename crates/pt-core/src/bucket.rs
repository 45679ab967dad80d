//! Time buckets for series queries and report periods.

use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, Duration, Months, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::types::{DATE_FORMAT, DateRange, ValidationError};

/// Report period selected by the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Period {
    #[default]
    Week,
    Month,
    Year,
}

impl Period {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Week => "week",
            Self::Month => "month",
            Self::Year => "year",
        }
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Period {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "week" => Ok(Self::Week),
            "month" => Ok(Self::Month),
            "year" => Ok(Self::Year),
            _ => Err(ValidationError::InvalidPeriod {
                value: s.to_string(),
            }),
        }
    }
}

/// Requested series granularity. Only consulted for yearly periods.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Granularity {
    #[default]
    Day,
    Week,
    Month,
}

impl FromStr for Granularity {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "day" => Ok(Self::Day),
            "week" => Ok(Self::Week),
            "month" => Ok(Self::Month),
            _ => Err(ValidationError::InvalidGranularity {
                value: s.to_string(),
            }),
        }
    }
}

/// The bucket key scheme a series query aggregates by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BucketScheme {
    /// `YYYY-MM-DD` of the day itself.
    Daily,
    /// `YYYY-MM-DD` of the Monday on or before the day.
    Weekly,
    /// `YYYY-MM` of the day.
    Monthly,
}

impl BucketScheme {
    /// Chooses the scheme for a series query.
    ///
    /// Yearly periods bucket by week when asked to and by month otherwise; every other
    /// period buckets by day regardless of the requested granularity.
    #[must_use]
    pub const fn for_query(period: Period, granularity: Granularity) -> Self {
        match (period, granularity) {
            (Period::Year, Granularity::Week) => Self::Weekly,
            (Period::Year, _) => Self::Monthly,
            _ => Self::Daily,
        }
    }

    /// Bucket label for a calendar day.
    #[must_use]
    pub fn key(self, date: NaiveDate) -> String {
        match self {
            Self::Daily => date.format(DATE_FORMAT).to_string(),
            Self::Weekly => monday_on_or_before(date).format(DATE_FORMAT).to_string(),
            Self::Monthly => date.format("%Y-%m").to_string(),
        }
    }

    /// Every bucket label the range can produce, in order, whether or not data exists.
    #[must_use]
    pub fn labels(self, range: &DateRange) -> Vec<String> {
        match self {
            Self::Daily => range.days().map(|day| self.key(day)).collect(),
            Self::Weekly => {
                let last = monday_on_or_before(range.end);
                let mut labels = Vec::new();
                let mut cursor = monday_on_or_before(range.start);
                while cursor <= last {
                    labels.push(self.key(cursor));
                    cursor += Duration::days(7);
                }
                labels
            }
            Self::Monthly => {
                let last = first_of_month(range.end);
                let mut labels = Vec::new();
                let mut cursor = first_of_month(range.start);
                while cursor <= last {
                    labels.push(self.key(cursor));
                    match cursor.checked_add_months(Months::new(1)) {
                        Some(next) => cursor = next,
                        None => break,
                    }
                }
                labels
            }
        }
    }
}

fn monday_on_or_before(date: NaiveDate) -> NaiveDate {
    date - Duration::days(i64::from(date.weekday().num_days_from_monday()))
}

fn first_of_month(date: NaiveDate) -> NaiveDate {
    date.with_day(1).unwrap_or(date)
}

/// Default date range for a period ending on `today`.
///
/// A week is today and the six days before it; a month and a year reach back one month or
/// one year and then forward one day, so the range never repeats a calendar day.
#[must_use]
pub fn period_range(period: Period, today: NaiveDate) -> DateRange {
    let start = match period {
        Period::Week => today - Duration::days(6),
        Period::Month => today
            .checked_sub_months(Months::new(1))
            .map_or(today, |d| d + Duration::days(1)),
        Period::Year => today
            .checked_sub_months(Months::new(12))
            .map_or(today, |d| d + Duration::days(1)),
    };
    DateRange {
        start: start.min(today),
        end: today,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(text: &str) -> NaiveDate {
        NaiveDate::parse_from_str(text, DATE_FORMAT).unwrap()
    }

    #[test]
    fn scheme_selection_follows_period_and_granularity() {
        assert_eq!(
            BucketScheme::for_query(Period::Year, Granularity::Week),
            BucketScheme::Weekly
        );
        assert_eq!(
            BucketScheme::for_query(Period::Year, Granularity::Day),
            BucketScheme::Monthly
        );
        assert_eq!(
            BucketScheme::for_query(Period::Month, Granularity::Week),
            BucketScheme::Daily
        );
        assert_eq!(
            BucketScheme::for_query(Period::Week, Granularity::Month),
            BucketScheme::Daily
        );
    }

    #[test]
    fn weekly_key_is_monday_on_or_before() {
        // 2024-03-10 is a Sunday, 2024-03-11 a Monday
        assert_eq!(BucketScheme::Weekly.key(date("2024-03-10")), "2024-03-04");
        assert_eq!(BucketScheme::Weekly.key(date("2024-03-11")), "2024-03-11");
        assert_eq!(BucketScheme::Monthly.key(date("2024-03-11")), "2024-03");
    }

    #[test]
    fn weekly_labels_cover_range() {
        let range = DateRange::parse("2024-03-06", "2024-03-20").unwrap();
        assert_eq!(
            BucketScheme::Weekly.labels(&range),
            vec!["2024-03-04", "2024-03-11", "2024-03-18"]
        );
    }

    #[test]
    fn monthly_labels_cross_year_boundary() {
        let range = DateRange::parse("2023-11-15", "2024-02-01").unwrap();
        assert_eq!(
            BucketScheme::Monthly.labels(&range),
            vec!["2023-11", "2023-12", "2024-01", "2024-02"]
        );
    }

    #[test]
    fn daily_labels_are_every_day() {
        let range = DateRange::parse("2024-03-10", "2024-03-12").unwrap();
        assert_eq!(
            BucketScheme::Daily.labels(&range),
            vec!["2024-03-10", "2024-03-11", "2024-03-12"]
        );
    }

    #[test]
    fn period_ranges_end_today() {
        let today = date("2024-03-15");
        let week = period_range(Period::Week, today);
        assert_eq!(week.start, date("2024-03-09"));
        assert_eq!(week.end, today);

        let month = period_range(Period::Month, today);
        assert_eq!(month.start, date("2024-02-16"));

        let year = period_range(Period::Year, today);
        assert_eq!(year.start, date("2023-03-16"));
    }

    #[test]
    fn period_parses_known_values_only() {
        assert_eq!("year".parse::<Period>().unwrap(), Period::Year);
        assert!("decade".parse::<Period>().is_err());
        assert_eq!("week".parse::<Granularity>().unwrap(), Granularity::Week);
        assert!("hour".parse::<Granularity>().is_err());
    }
}
