#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! API request and response types for the penalty report server.
//!
//! Field names follow the report page's existing contract: dataset columns
//! keep their `SCREAMING_SNAKE_CASE` headers and summary fields are
//! `snake_case`.

use penalty_report_database_models::{CodeTotal, MobileSummary};
use penalty_report_offence_models::{MonthKey, OffenceRecord};
use serde::{Deserialize, Serialize};

/// Query parameters for endpoints filtered by a month range.
///
/// Dates are `YYYY-MM-DD`; the day is ignored.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DateRangeParams {
    pub date1: Option<String>,
    pub date2: Option<String>,
}

/// Query parameters for the description search endpoint.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct KeywordSearchParams {
    pub date1: Option<String>,
    pub date2: Option<String>,
    /// Substring to look for in the offence description.
    pub key_word: Option<String>,
}

/// Query parameters for the two-code comparison endpoint.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CodeComparisonParams {
    pub date1: Option<String>,
    pub date2: Option<String>,
    pub offense_code_1: Option<String>,
    pub offense_code_2: Option<String>,
}

/// Raw records for the report table.
#[derive(Debug, Serialize)]
pub struct RecordsResponse {
    pub data: Vec<OffenceRecord>,
}

/// Summed notice count for one offence code, as shown in the report table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ApiCodeCount {
    /// Offence code, rendered as text.
    #[serde(rename = "OFFENCE_CODE")]
    pub offence_code: String,
    pub count: i64,
}

impl From<CodeTotal> for ApiCodeCount {
    fn from(total: CodeTotal) -> Self {
        Self {
            offence_code: total.offence_code.to_string(),
            count: total.total,
        }
    }
}

/// Offence-code distribution: a chart of the largest codes plus the full
/// table.
#[derive(Debug, Serialize)]
pub struct DistributionResponse {
    /// Base64 PNG, or `null` when the range holds no records.
    pub plot: Option<String>,
    pub table_data: Vec<ApiCodeCount>,
}

/// Monthly mobile phone offence trend and summary statistics.
#[derive(Debug, Serialize)]
pub struct MobileTrendResponse {
    /// Base64 PNG, or `null` when the range holds no mobile phone records.
    pub plot: Option<String>,
    /// Total mobile phone notices.
    pub mobile_cases: i64,
    /// Mobile phone records also flagged as inside a school zone.
    pub mobile_cases_in_school_zone: i64,
    /// Month of the record with the fewest notices.
    pub min_offence_month: Option<MonthKey>,
    /// Month of the record with the most notices.
    pub max_offence_month: Option<MonthKey>,
    /// Month of the record with the smallest total value.
    pub min_offence_month_total_value: Option<MonthKey>,
    /// Month of the record with the largest total value.
    pub max_offence_month_total_value: Option<MonthKey>,
    pub min_total_value: Option<f64>,
    pub max_total_value: Option<f64>,
    pub min_total_number: Option<i64>,
    pub max_total_number: Option<i64>,
}

impl MobileTrendResponse {
    #[must_use]
    pub fn new(plot: Option<String>, summary: &MobileSummary) -> Self {
        Self {
            plot,
            mobile_cases: summary.total_cases,
            mobile_cases_in_school_zone: summary.school_zone_records,
            min_offence_month: summary.min_total_number.map(|e| e.month),
            max_offence_month: summary.max_total_number.map(|e| e.month),
            min_offence_month_total_value: summary.min_total_value.map(|e| e.month),
            max_offence_month_total_value: summary.max_total_value.map(|e| e.month),
            min_total_value: summary.min_total_value.map(|e| e.value),
            max_total_value: summary.max_total_value.map(|e| e.value),
            min_total_number: summary.min_total_number.map(|e| e.value),
            max_total_number: summary.max_total_number.map(|e| e.value),
        }
    }
}

/// A chart with no accompanying data.
#[derive(Debug, Serialize)]
pub struct PlotResponse {
    /// Base64 PNG, or `null` when nothing matched.
    pub plot: Option<String>,
}

/// Error body returned for failed requests.
#[derive(Debug, Serialize)]
pub struct ApiErrorBody {
    pub error: String,
}

/// Health check response.
#[derive(Debug, Serialize)]
pub struct ApiHealth {
    /// Whether the service is healthy.
    pub healthy: bool,
    /// Service version.
    pub version: String,
}
