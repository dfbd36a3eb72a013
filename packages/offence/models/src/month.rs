//! Reporting-month keys.
//!
//! Every record in the dataset is bucketed by month. Query parameters arrive
//! as `YYYY-MM-DD` strings whose day component is ignored, while the dataset
//! labels months as `DD/MM/YYYY` strings pinned to the first of the month.
//! [`MonthKey`] is the date-typed bridge between the two.

use std::fmt;

use chrono::{Datelike as _, NaiveDate};
use serde::{Serialize, Serializer};

/// `chrono` format of the month labels stored in the dataset.
pub const STORE_FORMAT: &str = "%d/%m/%Y";

/// `chrono` format used for query parameters and the store's sortable key.
pub const ISO_FORMAT: &str = "%Y-%m-%d";

/// Errors produced while normalizing a month.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MonthKeyError {
    /// The input did not split into `year-month-day` components.
    #[error("invalid date '{input}': expected YYYY-MM-DD")]
    Shape {
        /// The rejected input.
        input: String,
    },

    /// The components did not form a real calendar date.
    #[error("invalid date '{input}': {message}")]
    Calendar {
        /// The rejected input.
        input: String,
        /// Parser message.
        message: String,
    },
}

/// The first day of a reporting month.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MonthKey(NaiveDate);

impl MonthKey {
    /// Normalizes a `YYYY-MM-DD` query value to its month.
    ///
    /// The day component is discarded without validation, so `2017-07-99`
    /// is accepted as July 2017.
    ///
    /// # Errors
    ///
    /// * [`MonthKeyError::Shape`] if the input is not three `-`-separated
    ///   components
    /// * [`MonthKeyError::Calendar`] if the year and month do not form a
    ///   valid date
    pub fn parse(input: &str) -> Result<Self, MonthKeyError> {
        let parts: Vec<&str> = input.split('-').collect();
        let [year, month, _day] = parts.as_slice() else {
            return Err(MonthKeyError::Shape {
                input: input.to_string(),
            });
        };

        let aligned = format!("{year}-{month}-01");
        NaiveDate::parse_from_str(&aligned, ISO_FORMAT)
            .map(Self)
            .map_err(|e| MonthKeyError::Calendar {
                input: input.to_string(),
                message: e.to_string(),
            })
    }

    /// Parses a dataset month label (`DD/MM/YYYY`), aligning it to the
    /// first of its month.
    ///
    /// # Errors
    ///
    /// Returns [`MonthKeyError::Calendar`] if the label is not a valid
    /// `DD/MM/YYYY` date.
    pub fn from_store_format(label: &str) -> Result<Self, MonthKeyError> {
        NaiveDate::parse_from_str(label.trim(), STORE_FORMAT)
            .map(Self::containing)
            .map_err(|e| MonthKeyError::Calendar {
                input: label.to_string(),
                message: e.to_string(),
            })
    }

    /// Returns the month containing `date`.
    #[must_use]
    pub fn containing(date: NaiveDate) -> Self {
        Self(date.with_day(1).unwrap_or(date))
    }

    /// Returns the month containing the current local date.
    #[must_use]
    pub fn current() -> Self {
        Self::containing(chrono::Local::now().date_naive())
    }

    /// Renders the dataset label, e.g. `01/07/2017`.
    #[must_use]
    pub fn to_store_format(self) -> String {
        self.0.format(STORE_FORMAT).to_string()
    }

    /// Renders the sortable ISO key, e.g. `2017-07-01`.
    #[must_use]
    pub fn to_iso(self) -> String {
        self.0.format(ISO_FORMAT).to_string()
    }

    /// Parses a sortable ISO key written by [`Self::to_iso`].
    ///
    /// # Errors
    ///
    /// Returns [`MonthKeyError::Calendar`] if `key` is not `YYYY-MM-DD`.
    pub fn from_iso(key: &str) -> Result<Self, MonthKeyError> {
        NaiveDate::parse_from_str(key, ISO_FORMAT)
            .map(Self::containing)
            .map_err(|e| MonthKeyError::Calendar {
                input: key.to_string(),
                message: e.to_string(),
            })
    }
}

impl fmt::Display for MonthKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format(STORE_FORMAT))
    }
}

impl Serialize for MonthKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn discards_day_component() {
        let key = MonthKey::parse("2017-07-31").unwrap();
        assert_eq!(key.to_iso(), "2017-07-01");
        assert_eq!(key.to_store_format(), "01/07/2017");
    }

    #[test]
    fn ignores_invalid_day() {
        let key = MonthKey::parse("2018-02-xx").unwrap();
        assert_eq!(key.to_store_format(), "01/02/2018");
    }

    #[test]
    fn accepts_unpadded_month() {
        let key = MonthKey::parse("2019-3-15").unwrap();
        assert_eq!(key.to_iso(), "2019-03-01");
    }

    #[test]
    fn rejects_missing_day_component() {
        assert!(matches!(
            MonthKey::parse("2017-07"),
            Err(MonthKeyError::Shape { .. })
        ));
    }

    #[test]
    fn rejects_extra_components() {
        assert!(matches!(
            MonthKey::parse("2017-07-01-01"),
            Err(MonthKeyError::Shape { .. })
        ));
    }

    #[test]
    fn rejects_invalid_month() {
        assert!(matches!(
            MonthKey::parse("2017-13-01"),
            Err(MonthKeyError::Calendar { .. })
        ));
        assert!(matches!(
            MonthKey::parse("abcd-07-01"),
            Err(MonthKeyError::Calendar { .. })
        ));
    }

    #[test]
    fn parses_store_label() {
        let key = MonthKey::from_store_format("01/12/2018").unwrap();
        assert_eq!(key.to_iso(), "2018-12-01");
        assert_eq!(key.to_string(), "01/12/2018");
    }

    #[test]
    fn aligns_store_label_to_first_of_month() {
        let key = MonthKey::from_store_format("15/08/2020").unwrap();
        assert_eq!(key.to_store_format(), "01/08/2020");
    }

    #[test]
    fn orders_chronologically_across_years() {
        let dec = MonthKey::from_store_format("01/12/2017").unwrap();
        let jan = MonthKey::from_store_format("01/01/2018").unwrap();
        assert!(dec < jan);
        // The labels themselves sort the other way round.
        assert!(dec.to_store_format() > jan.to_store_format());
    }

    #[test]
    fn round_trips_iso_key() {
        let key = MonthKey::parse("2021-06-09").unwrap();
        assert_eq!(MonthKey::from_iso(&key.to_iso()).unwrap(), key);
    }
}
