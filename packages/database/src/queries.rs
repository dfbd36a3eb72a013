//! Record store queries.
//!
//! Every report filters on an inclusive month range over `month_key`, then
//! lists or aggregates the matching records. Rows come back in load order
//! (`id`) unless a grouping imposes its own order.

use std::fmt::Write as _;

use moosicbox_json_utils::database::ToValue as _;
use penalty_report_database_models::{
    CodeTotal, MobileSummary, MonthExtreme, MonthRange, MonthTotal, RecordQuery,
};
use penalty_report_offence_models::{INDICATOR_YES, MonthKey, OffenceColumn, OffenceRecord};
use strum::{EnumCount as _, IntoEnumIterator as _};
use switchy_database::{Database, DatabaseValue, Row};

use crate::DbError;

/// Returns the number of stored records.
///
/// # Errors
///
/// Returns [`DbError`] if the database operation fails.
pub async fn count_records(db: &dyn Database) -> Result<u64, DbError> {
    let rows = db
        .query_raw_params("SELECT COUNT(*) AS record_count FROM offences", &[])
        .await?;

    let Some(row) = rows.first() else {
        return Ok(0);
    };

    let count: i64 = row
        .to_value("record_count")
        .map_err(|e| conversion("record_count", &e))?;

    u64::try_from(count).map_err(|e| conversion("record_count", &e))
}

/// Inserts `records` in a single transaction.
///
/// Either every record is committed or, if any insert fails, the
/// transaction is rolled back and nothing is stored.
///
/// # Errors
///
/// Returns [`DbError`] if any database operation fails.
pub async fn insert_records(db: &dyn Database, records: &[OffenceRecord]) -> Result<u64, DbError> {
    write_records(db, records, false).await
}

/// Replaces every stored record with `records` in a single transaction.
///
/// If any insert fails the delete is rolled back too, leaving the
/// previous records in place.
///
/// # Errors
///
/// Returns [`DbError`] if any database operation fails.
pub async fn replace_records(
    db: &dyn Database,
    records: &[OffenceRecord],
) -> Result<u64, DbError> {
    write_records(db, records, true).await
}

async fn write_records(
    db: &dyn Database,
    records: &[OffenceRecord],
    replace: bool,
) -> Result<u64, DbError> {
    let txn = db.begin_transaction().await?;
    let staged = stage_records(txn.as_ref(), records, replace).await;

    match staged {
        Ok(inserted) => {
            txn.commit().await?;
            log::debug!("Committed {inserted} records");
            Ok(inserted)
        }
        Err(e) => {
            if let Err(rollback_err) = txn.rollback().await {
                log::error!("Failed to roll back record write: {rollback_err}");
            }
            Err(e)
        }
    }
}

async fn stage_records(
    db: &dyn Database,
    records: &[OffenceRecord],
    replace: bool,
) -> Result<u64, DbError> {
    if replace {
        let removed = db.exec_raw_params("DELETE FROM offences", &[]).await?;
        log::debug!("Removed {removed} existing records");
    }

    let sql = insert_sql();
    let mut inserted = 0u64;

    for record in records {
        inserted += db.exec_raw_params(&sql, &insert_params(record)).await?;
    }

    Ok(inserted)
}

/// Store columns holding the [`OffenceRecord`] fields, in
/// [`OffenceColumn`] order.
fn record_columns() -> String {
    OffenceColumn::iter()
        .map(OffenceColumn::store_name)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Inserts one record: every dataset column followed by `month_key`.
fn insert_sql() -> String {
    let mut sql = format!(
        "INSERT INTO offences ({}, month_key) VALUES (",
        record_columns()
    );

    for i in 1..=OffenceColumn::COUNT + 1 {
        if i > 1 {
            sql.push_str(", ");
        }
        write!(sql, "${i}").unwrap();
    }
    sql.push(')');

    sql
}

fn insert_params(record: &OffenceRecord) -> Vec<DatabaseValue> {
    let mut params: Vec<DatabaseValue> = OffenceColumn::iter()
        .map(|column| column_value(record, column))
        .collect();
    params.push(DatabaseValue::String(record.offence_month.to_iso()));
    params
}

fn column_value(record: &OffenceRecord, column: OffenceColumn) -> DatabaseValue {
    use OffenceColumn as C;

    match column {
        C::OffenceFinyear => text(record.offence_finyear.as_deref()),
        C::OffenceMonth => DatabaseValue::String(record.offence_month.to_store_format()),
        C::OffenceCode => DatabaseValue::Int64(record.offence_code),
        C::OffenceDesc => text(record.offence_desc.as_deref()),
        C::Legislation => text(record.legislation.as_deref()),
        C::SectionClause => text(record.section_clause.as_deref()),
        C::FaceValue => real(record.face_value),
        C::CameraInd => text(record.camera_ind.as_deref()),
        C::CameraType => text(record.camera_type.as_deref()),
        C::LocationCode => real(record.location_code),
        C::LocationDetails => text(record.location_details.as_deref()),
        C::SchoolZoneInd => text(record.school_zone_ind.as_deref()),
        C::SpeedBand => text(record.speed_band.as_deref()),
        C::SpeedInd => text(record.speed_ind.as_deref()),
        C::PointToPointInd => text(record.point_to_point_ind.as_deref()),
        C::RedLightCameraInd => text(record.red_light_camera_ind.as_deref()),
        C::SpeedCameraInd => text(record.speed_camera_ind.as_deref()),
        C::SeatbeltInd => text(record.seatbelt_ind.as_deref()),
        C::MobilePhoneInd => text(record.mobile_phone_ind.as_deref()),
        C::ParkingInd => text(record.parking_ind.as_deref()),
        C::CinsInd => text(record.cins_ind.as_deref()),
        C::FoodInd => text(record.food_ind.as_deref()),
        C::BicycleToyEtcInd => text(record.bicycle_toy_etc_ind.as_deref()),
        C::TotalNumber => DatabaseValue::Int64(record.total_number),
        C::TotalValue => DatabaseValue::Real64(record.total_value),
    }
}

/// Lists the records matching `query` in load order.
///
/// The description filter is a case-insensitive literal substring match;
/// `%` and `_` in the keyword have no special meaning.
///
/// # Errors
///
/// Returns [`DbError`] if the database operation fails or a row cannot be
/// decoded.
pub async fn list_records(
    db: &dyn Database,
    query: &RecordQuery,
) -> Result<Vec<OffenceRecord>, DbError> {
    let mut sql = format!(
        "SELECT {} FROM offences
         WHERE month_key BETWEEN $1 AND $2",
        record_columns()
    );
    let mut params = range_params(&query.range);

    if let Some(keyword) = &query.description_contains {
        sql.push_str(" AND instr(lower(offence_desc), lower($3)) > 0");
        params.push(DatabaseValue::String(keyword.clone()));
    }

    sql.push_str(" ORDER BY id");

    let rows = db.query_raw_params(&sql, &params).await?;
    log::debug!("list_records matched {} rows", rows.len());

    rows.iter().map(record_from_row).collect()
}

/// Sums `TOTAL_NUMBER` per offence code over the records in `range`,
/// ordered by offence code.
///
/// With `codes`, only those offence codes are considered; an empty slice
/// matches nothing.
///
/// # Errors
///
/// Returns [`DbError`] if the database operation fails.
pub async fn offence_code_totals(
    db: &dyn Database,
    range: &MonthRange,
    codes: Option<&[i64]>,
) -> Result<Vec<CodeTotal>, DbError> {
    let mut sql = String::from(
        "SELECT offence_code, SUM(total_number) AS total FROM offences
         WHERE month_key BETWEEN $1 AND $2",
    );
    let mut params = range_params(range);

    if let Some(codes) = codes {
        if codes.is_empty() {
            return Ok(Vec::new());
        }

        sql.push_str(" AND offence_code IN (");
        for (i, code) in codes.iter().enumerate() {
            if i > 0 {
                sql.push_str(", ");
            }
            params.push(DatabaseValue::Int64(*code));
            write!(sql, "${}", params.len()).unwrap();
        }
        sql.push(')');
    }

    sql.push_str(" GROUP BY offence_code ORDER BY offence_code");

    let rows = db.query_raw_params(&sql, &params).await?;

    rows.iter()
        .map(|row| {
            Ok(CodeTotal {
                offence_code: row
                    .to_value("offence_code")
                    .map_err(|e| conversion("offence_code", &e))?,
                total: row.to_value("total").map_err(|e| conversion("total", &e))?,
            })
        })
        .collect()
}

/// Sums `TOTAL_NUMBER` per month over the mobile phone records in
/// `range`, in chronological order.
///
/// # Errors
///
/// Returns [`DbError`] if the database operation fails.
pub async fn mobile_month_totals(
    db: &dyn Database,
    range: &MonthRange,
) -> Result<Vec<MonthTotal>, DbError> {
    let mut params = range_params(range);
    params.push(DatabaseValue::String(INDICATOR_YES.to_string()));

    let rows = db
        .query_raw_params(
            "SELECT month_key, SUM(total_number) AS total FROM offences
             WHERE month_key BETWEEN $1 AND $2 AND mobile_phone_ind = $3
             GROUP BY month_key
             ORDER BY month_key",
            &params,
        )
        .await?;

    rows.iter()
        .map(|row| {
            Ok(MonthTotal {
                month: month_from_row(row)?,
                total: row.to_value("total").map_err(|e| conversion("total", &e))?,
            })
        })
        .collect()
}

/// Computes the summary statistics over the mobile phone records in
/// `range`.
///
/// # Errors
///
/// Returns [`DbError`] if any database operation fails.
pub async fn mobile_summary(
    db: &dyn Database,
    range: &MonthRange,
) -> Result<MobileSummary, DbError> {
    let mut params = range_params(range);
    params.push(DatabaseValue::String(INDICATOR_YES.to_string()));

    let rows = db
        .query_raw_params(
            "SELECT
                COALESCE(SUM(total_number), 0) AS total_cases,
                COALESCE(SUM(CASE WHEN school_zone_ind = $3 THEN 1 ELSE 0 END), 0)
                    AS school_zone_records
             FROM offences
             WHERE month_key BETWEEN $1 AND $2 AND mobile_phone_ind = $3",
            &params,
        )
        .await?;

    let mut summary = MobileSummary::default();

    if let Some(row) = rows.first() {
        summary.total_cases = row
            .to_value("total_cases")
            .map_err(|e| conversion("total_cases", &e))?;
        summary.school_zone_records = row
            .to_value("school_zone_records")
            .map_err(|e| conversion("school_zone_records", &e))?;
    }

    summary.min_total_number = mobile_extreme(db, range, "total_number", false)
        .await?
        .map(|row| integer_extreme(&row))
        .transpose()?;
    summary.max_total_number = mobile_extreme(db, range, "total_number", true)
        .await?
        .map(|row| integer_extreme(&row))
        .transpose()?;
    summary.min_total_value = mobile_extreme(db, range, "total_value", false)
        .await?
        .map(|row| real_extreme(&row))
        .transpose()?;
    summary.max_total_value = mobile_extreme(db, range, "total_value", true)
        .await?
        .map(|row| real_extreme(&row))
        .transpose()?;

    Ok(summary)
}

/// Fetches the mobile phone record with the smallest (or largest) value in
/// `column`. Ties go to the earliest loaded record.
async fn mobile_extreme(
    db: &dyn Database,
    range: &MonthRange,
    column: &'static str,
    largest: bool,
) -> Result<Option<Row>, DbError> {
    let direction = if largest { "DESC" } else { "ASC" };
    let sql = format!(
        "SELECT month_key, {column} AS value FROM offences
         WHERE month_key BETWEEN $1 AND $2 AND mobile_phone_ind = $3
         ORDER BY {column} {direction}, id ASC
         LIMIT 1"
    );

    let mut params = range_params(range);
    params.push(DatabaseValue::String(INDICATOR_YES.to_string()));

    let rows = db.query_raw_params(&sql, &params).await?;

    Ok(rows.into_iter().next())
}

fn integer_extreme(row: &Row) -> Result<MonthExtreme<i64>, DbError> {
    Ok(MonthExtreme {
        month: month_from_row(row)?,
        value: row.to_value("value").map_err(|e| conversion("value", &e))?,
    })
}

fn real_extreme(row: &Row) -> Result<MonthExtreme<f64>, DbError> {
    Ok(MonthExtreme {
        month: month_from_row(row)?,
        value: row.to_value("value").map_err(|e| conversion("value", &e))?,
    })
}

fn record_from_row(row: &Row) -> Result<OffenceRecord, DbError> {
    Ok(OffenceRecord {
        offence_finyear: row.to_value("offence_finyear").unwrap_or(None),
        offence_month: label_from_row(row)?,
        offence_code: row
            .to_value("offence_code")
            .map_err(|e| conversion("offence_code", &e))?,
        offence_desc: row.to_value("offence_desc").unwrap_or(None),
        legislation: row.to_value("legislation").unwrap_or(None),
        section_clause: row.to_value("section_clause").unwrap_or(None),
        face_value: row.to_value("face_value").unwrap_or(None),
        camera_ind: row.to_value("camera_ind").unwrap_or(None),
        camera_type: row.to_value("camera_type").unwrap_or(None),
        location_code: row.to_value("location_code").unwrap_or(None),
        location_details: row.to_value("location_details").unwrap_or(None),
        school_zone_ind: row.to_value("school_zone_ind").unwrap_or(None),
        speed_band: row.to_value("speed_band").unwrap_or(None),
        speed_ind: row.to_value("speed_ind").unwrap_or(None),
        point_to_point_ind: row.to_value("point_to_point_ind").unwrap_or(None),
        red_light_camera_ind: row.to_value("red_light_camera_ind").unwrap_or(None),
        speed_camera_ind: row.to_value("speed_camera_ind").unwrap_or(None),
        seatbelt_ind: row.to_value("seatbelt_ind").unwrap_or(None),
        mobile_phone_ind: row.to_value("mobile_phone_ind").unwrap_or(None),
        parking_ind: row.to_value("parking_ind").unwrap_or(None),
        cins_ind: row.to_value("cins_ind").unwrap_or(None),
        food_ind: row.to_value("food_ind").unwrap_or(None),
        bicycle_toy_etc_ind: row.to_value("bicycle_toy_etc_ind").unwrap_or(None),
        total_number: row
            .to_value("total_number")
            .map_err(|e| conversion("total_number", &e))?,
        total_value: row
            .to_value("total_value")
            .map_err(|e| conversion("total_value", &e))?,
    })
}

fn month_from_row(row: &Row) -> Result<MonthKey, DbError> {
    let key: String = row
        .to_value("month_key")
        .map_err(|e| conversion("month_key", &e))?;

    MonthKey::from_iso(&key).map_err(|e| conversion("month_key", &e))
}

fn label_from_row(row: &Row) -> Result<MonthKey, DbError> {
    let label: String = row
        .to_value("offence_month")
        .map_err(|e| conversion("offence_month", &e))?;

    MonthKey::from_store_format(&label).map_err(|e| conversion("offence_month", &e))
}

fn range_params(range: &MonthRange) -> Vec<DatabaseValue> {
    vec![
        DatabaseValue::String(range.from.to_iso()),
        DatabaseValue::String(range.to.to_iso()),
    ]
}

fn text(value: Option<&str>) -> DatabaseValue {
    value.map_or(DatabaseValue::Null, |v| DatabaseValue::String(v.to_string()))
}

fn real(value: Option<f64>) -> DatabaseValue {
    value.map_or(DatabaseValue::Null, DatabaseValue::Real64)
}

fn conversion(column: &str, error: &impl std::fmt::Display) -> DbError {
    DbError::Conversion {
        message: format!("Failed to read column '{column}': {error}"),
    }
}
