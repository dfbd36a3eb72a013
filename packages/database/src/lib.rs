#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! `SQLite` record store for the penalty report.
//!
//! Holds one `offences` table of pre-aggregated penalty notice buckets.
//! Uses `switchy_database` for all access; reporting filters and
//! aggregations are plain SQL in [`queries`].

pub mod queries;

use std::path::Path;

use switchy_database::Database;
use switchy_database_connection::init_sqlite_rusqlite;

/// Default path of the record store file.
pub const DEFAULT_DB_PATH: &str = "data/data.db";

/// Errors that can occur during record store operations.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    /// Database query error.
    #[error("Database error: {0}")]
    Database(#[from] switchy_database::DatabaseError),

    /// The store file could not be opened or created.
    #[error("Failed to open record store: {message}")]
    Open {
        /// Description of what went wrong.
        message: String,
    },

    /// Data conversion error.
    #[error("Data conversion error: {message}")]
    Conversion {
        /// Description of what went wrong.
        message: String,
    },
}

/// Opens (or creates) the record store at `path` and ensures the schema
/// exists.
///
/// # Errors
///
/// Returns [`DbError`] if the file cannot be opened or schema creation
/// fails.
pub async fn open_db(path: &Path) -> Result<Box<dyn Database>, DbError> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent).map_err(|e| DbError::Open {
            message: format!("{}: {e}", parent.display()),
        })?;
    }

    let db = init_sqlite_rusqlite(Some(path)).map_err(|e| DbError::Open {
        message: format!("{}: {e}", path.display()),
    })?;

    ensure_schema(db.as_ref()).await?;

    Ok(db)
}

/// Creates the `offences` table and its indexes if they don't already
/// exist.
///
/// `month_key` holds the reporting month as an ISO date so range filters
/// order chronologically; `offence_month` keeps the dataset's
/// `DD/MM/YYYY` label.
///
/// # Errors
///
/// Returns [`DbError`] if any statement fails.
pub async fn ensure_schema(db: &dyn Database) -> Result<(), DbError> {
    db.exec_raw(
        "CREATE TABLE IF NOT EXISTS offences (
            id                   INTEGER PRIMARY KEY AUTOINCREMENT,
            offence_finyear      TEXT,
            offence_month        TEXT NOT NULL,
            month_key            TEXT NOT NULL,
            offence_code         INTEGER NOT NULL,
            offence_desc         TEXT,
            legislation          TEXT,
            section_clause       TEXT,
            face_value           REAL,
            camera_ind           TEXT,
            camera_type          TEXT,
            location_code        REAL,
            location_details     TEXT,
            school_zone_ind      TEXT,
            speed_band           TEXT,
            speed_ind            TEXT,
            point_to_point_ind   TEXT,
            red_light_camera_ind TEXT,
            speed_camera_ind     TEXT,
            seatbelt_ind         TEXT,
            mobile_phone_ind     TEXT,
            parking_ind          TEXT,
            cins_ind             TEXT,
            food_ind             TEXT,
            bicycle_toy_etc_ind  TEXT,
            total_number         INTEGER NOT NULL,
            total_value          REAL NOT NULL
        )",
    )
    .await?;

    db.exec_raw("CREATE INDEX IF NOT EXISTS idx_offences_month_key ON offences (month_key)")
        .await?;

    db.exec_raw(
        "CREATE INDEX IF NOT EXISTS idx_offences_mobile_month
         ON offences (mobile_phone_ind, month_key)",
    )
    .await?;

    Ok(())
}
