#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Offence record types for the penalty report.
//!
//! The dataset is a table of pre-aggregated penalty notice buckets: one row
//! per (reporting month, offence classification). [`OffenceColumn`] is the
//! fixed column schema shared by the CSV loader and the record store, and
//! [`OffenceRecord`] is one row of it.

pub mod month;

pub use month::{MonthKey, MonthKeyError};

use serde::Serialize;
use strum_macros::{AsRefStr, Display, EnumCount, EnumIter, EnumString};

/// Indicator value marking a record as belonging to a category.
pub const INDICATOR_YES: &str = "Y";

/// A column of the offence dataset.
///
/// Variant names serialize to the dataset's `SCREAMING_SNAKE_CASE` headers.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Display,
    EnumString,
    AsRefStr,
    EnumIter,
    EnumCount,
)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum OffenceColumn {
    OffenceFinyear,
    OffenceMonth,
    OffenceCode,
    OffenceDesc,
    Legislation,
    SectionClause,
    FaceValue,
    CameraInd,
    CameraType,
    LocationCode,
    LocationDetails,
    SchoolZoneInd,
    SpeedBand,
    SpeedInd,
    PointToPointInd,
    RedLightCameraInd,
    SpeedCameraInd,
    SeatbeltInd,
    MobilePhoneInd,
    ParkingInd,
    CinsInd,
    FoodInd,
    BicycleToyEtcInd,
    TotalNumber,
    TotalValue,
}

impl OffenceColumn {
    /// Name of the corresponding record store column.
    #[must_use]
    pub fn store_name(self) -> String {
        self.as_ref().to_ascii_lowercase()
    }
}

/// One pre-aggregated bucket of penalty notices.
///
/// Records are immutable once loaded; every report is computed at query
/// time from the stored set.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub struct OffenceRecord {
    /// Financial year label, e.g. `2017-2018`.
    pub offence_finyear: Option<String>,
    /// Reporting month.
    pub offence_month: MonthKey,
    pub offence_code: i64,
    pub offence_desc: Option<String>,
    /// Act or regulation the offence is defined in.
    pub legislation: Option<String>,
    pub section_clause: Option<String>,
    /// Penalty amount of a single notice.
    pub face_value: Option<f64>,
    pub camera_ind: Option<String>,
    pub camera_type: Option<String>,
    pub location_code: Option<f64>,
    pub location_details: Option<String>,
    pub school_zone_ind: Option<String>,
    pub speed_band: Option<String>,
    pub speed_ind: Option<String>,
    pub point_to_point_ind: Option<String>,
    pub red_light_camera_ind: Option<String>,
    pub speed_camera_ind: Option<String>,
    pub seatbelt_ind: Option<String>,
    pub mobile_phone_ind: Option<String>,
    pub parking_ind: Option<String>,
    pub cins_ind: Option<String>,
    pub food_ind: Option<String>,
    pub bicycle_toy_etc_ind: Option<String>,
    /// Number of notices in this bucket.
    pub total_number: i64,
    /// Sum of the face values of all notices in this bucket.
    pub total_value: f64,
}

impl OffenceRecord {
    /// Whether the bucket counts mobile phone offences.
    #[must_use]
    pub fn is_mobile_phone(&self) -> bool {
        is_flagged(self.mobile_phone_ind.as_deref())
    }
}

fn is_flagged(value: Option<&str>) -> bool {
    value == Some(INDICATOR_YES)
}
