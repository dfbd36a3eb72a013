#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Record store query parameters and aggregate row types.
//!
//! These are the shapes the reporting queries accept and return. They are
//! kept apart from the JSON response types in
//! `penalty_report_server_models` so the API contract can change without
//! touching the store.

use penalty_report_offence_models::MonthKey;

/// An inclusive range of reporting months.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonthRange {
    /// First month included.
    pub from: MonthKey,
    /// Last month included.
    pub to: MonthKey,
}

impl MonthRange {
    /// Creates a range covering `from` through `to`.
    #[must_use]
    pub const fn new(from: MonthKey, to: MonthKey) -> Self {
        Self { from, to }
    }
}

/// Parameters for listing raw records.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordQuery {
    /// Months to include.
    pub range: MonthRange,
    /// Case-insensitive substring the offence description must contain.
    pub description_contains: Option<String>,
}

impl RecordQuery {
    /// Lists every record in `range`.
    #[must_use]
    pub const fn in_range(range: MonthRange) -> Self {
        Self {
            range,
            description_contains: None,
        }
    }

    /// Restricts the listing to descriptions containing `keyword`.
    #[must_use]
    pub fn with_description(mut self, keyword: &str) -> Self {
        self.description_contains = Some(keyword.to_string());
        self
    }
}

/// Summed notice count for one offence code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CodeTotal {
    pub offence_code: i64,
    /// Sum of `TOTAL_NUMBER` over the code's records.
    pub total: i64,
}

/// Summed notice count for one reporting month.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonthTotal {
    pub month: MonthKey,
    /// Sum of `TOTAL_NUMBER` over the month's records.
    pub total: i64,
}

/// The month of the record holding an extreme value, plus that value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MonthExtreme<T> {
    pub month: MonthKey,
    pub value: T,
}

/// Summary statistics over the mobile phone records of a range.
///
/// Extremes are taken per record, not per month total. When several
/// records share an extreme the earliest loaded one wins.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MobileSummary {
    /// Sum of `TOTAL_NUMBER`.
    pub total_cases: i64,
    /// Number of records also flagged as inside a school zone.
    pub school_zone_records: i64,
    pub min_total_number: Option<MonthExtreme<i64>>,
    pub max_total_number: Option<MonthExtreme<i64>>,
    pub min_total_value: Option<MonthExtreme<f64>>,
    pub max_total_value: Option<MonthExtreme<f64>>,
}

/// Returns the `limit` largest totals, largest first.
///
/// The sort is stable, so codes with equal totals keep their order in
/// `totals`.
#[must_use]
pub fn top_by_total(totals: &[CodeTotal], limit: usize) -> Vec<CodeTotal> {
    let mut ranked = totals.to_vec();
    ranked.sort_by(|a, b| b.total.cmp(&a.total));
    ranked.truncate(limit);
    ranked
}

#[cfg(test)]
mod tests {
    use super::*;

    fn totals(pairs: &[(i64, i64)]) -> Vec<CodeTotal> {
        pairs
            .iter()
            .map(|&(offence_code, total)| CodeTotal { offence_code, total })
            .collect()
    }

    #[test]
    fn ranks_largest_first() {
        let ranked = top_by_total(&totals(&[(101, 5), (102, 30), (103, 12)]), 20);
        let codes: Vec<i64> = ranked.iter().map(|t| t.offence_code).collect();
        assert_eq!(codes, vec![102, 103, 101]);
    }

    #[test]
    fn keeps_group_order_for_ties() {
        let ranked = top_by_total(&totals(&[(201, 7), (202, 9), (203, 7), (204, 7)]), 3);
        let codes: Vec<i64> = ranked.iter().map(|t| t.offence_code).collect();
        assert_eq!(codes, vec![202, 201, 203]);
    }

    #[test]
    fn truncates_to_limit() {
        let many: Vec<CodeTotal> = (0..50)
            .map(|i| CodeTotal {
                offence_code: i,
                total: i * 3,
            })
            .collect();

        let ranked = top_by_total(&many, 20);

        assert_eq!(ranked.len(), 20);
        assert!(ranked.windows(2).all(|w| w[0].total >= w[1].total));
        assert!(ranked.iter().all(|t| many.contains(t)));
        assert_eq!(ranked[0].offence_code, 49);
    }

    #[test]
    fn handles_fewer_groups_than_limit() {
        assert!(top_by_total(&[], 20).is_empty());
        assert_eq!(top_by_total(&totals(&[(1, 1)]), 20).len(), 1);
    }
}
