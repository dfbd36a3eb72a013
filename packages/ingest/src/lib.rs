#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Loads the offence dataset CSV into the record store.
//!
//! The CSV header must name exactly the columns in
//! [`OffenceColumn`]; values are mapped by header name, so column order is
//! free. The whole file is parsed and validated before anything is written,
//! then every record is inserted in a single transaction.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use penalty_report_database::{DbError, queries};
use penalty_report_offence_models::{MonthKey, OffenceColumn, OffenceRecord};
use strum::IntoEnumIterator as _;
use switchy_database::Database;

/// Default location of the dataset CSV.
pub const DEFAULT_CSV_PATH: &str = "data/dataSet.csv";

/// Errors that can occur while loading the dataset.
#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    /// The CSV file could not be opened.
    #[error("Failed to open {}: {source}", path.display())]
    Io {
        /// Path that was being opened.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// The CSV could not be parsed.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// The header does not match the dataset schema.
    #[error("CSV header mismatch: {message}")]
    Header {
        /// Which columns were unexpected, missing, or repeated.
        message: String,
    },

    /// A cell could not be converted to its column's type.
    #[error("Line {line}, column {column}: invalid value '{value}': {message}")]
    Value {
        /// 1-based line number in the file.
        line: u64,
        /// Column the value belongs to.
        column: OffenceColumn,
        /// The raw cell content.
        value: String,
        /// Why the conversion failed.
        message: String,
    },

    /// Writing to the record store failed.
    #[error(transparent)]
    Database(#[from] DbError),
}

/// What [`populate_if_empty`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    /// The store already held records; the CSV was not read.
    Skipped {
        /// Number of records already present.
        existing: u64,
    },
    /// The store was empty and has been populated.
    Loaded {
        /// Number of records inserted.
        records: u64,
    },
}

/// Populates the store from the CSV at `path` unless it already holds
/// records.
///
/// # Errors
///
/// Returns [`IngestError`] if the file is missing or malformed, or if the
/// insert fails. Nothing is stored in that case.
pub async fn populate_if_empty(db: &dyn Database, path: &Path) -> Result<LoadOutcome, IngestError> {
    let existing = queries::count_records(db).await?;
    if existing > 0 {
        log::info!("Record store already holds {existing} records, skipping load");
        return Ok(LoadOutcome::Skipped { existing });
    }

    log::info!("Populating record store from {}...", path.display());
    let records = load(db, path).await?;

    Ok(LoadOutcome::Loaded { records })
}

/// Replaces every stored record with the contents of the CSV at `path`.
///
/// The file is fully parsed before the store is touched. The old records
/// are removed and the new ones inserted in one transaction, so a failed
/// insert leaves the previous records in place.
///
/// # Errors
///
/// Returns [`IngestError`] if the file is missing or malformed, or if the
/// store operations fail.
pub async fn reload(db: &dyn Database, path: &Path) -> Result<u64, IngestError> {
    let records = read_records(path)?;

    let inserted = queries::replace_records(db, &records).await?;
    log::info!("Reloaded {inserted} records from {}", path.display());

    Ok(inserted)
}

async fn load(db: &dyn Database, path: &Path) -> Result<u64, IngestError> {
    let records = read_records(path)?;
    let inserted = queries::insert_records(db, &records).await?;
    log::info!("Loaded {inserted} records from {}", path.display());
    Ok(inserted)
}

/// Reads and validates every record in the CSV file at `path`.
///
/// # Errors
///
/// Returns [`IngestError`] if the file cannot be opened or any record is
/// invalid.
pub fn read_records(path: &Path) -> Result<Vec<OffenceRecord>, IngestError> {
    let file = File::open(path).map_err(|source| IngestError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    parse_records(file)
}

/// Parses offence records from CSV data.
///
/// # Errors
///
/// Returns [`IngestError`] if the header does not match the schema or a
/// value cannot be converted.
pub fn parse_records<R: Read>(reader: R) -> Result<Vec<OffenceRecord>, IngestError> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);

    let columns = ColumnIndex::from_headers(reader.headers()?)?;

    let mut records = Vec::new();
    for result in reader.records() {
        let row = result?;
        let cells = Cells {
            row: &row,
            columns: &columns,
        };
        records.push(cells.to_record()?);
    }

    log::debug!("Parsed {} records", records.len());

    Ok(records)
}

/// Position of each dataset column in the CSV.
struct ColumnIndex(BTreeMap<OffenceColumn, usize>);

impl ColumnIndex {
    fn from_headers(headers: &csv::StringRecord) -> Result<Self, IngestError> {
        let mut positions = BTreeMap::new();
        let mut unexpected = Vec::new();
        let mut repeated = Vec::new();

        for (i, header) in headers.iter().enumerate() {
            match header.parse::<OffenceColumn>() {
                Ok(column) => {
                    if positions.insert(column, i).is_some() {
                        repeated.push(header.to_string());
                    }
                }
                Err(_) => unexpected.push(header.to_string()),
            }
        }

        let missing: Vec<String> = OffenceColumn::iter()
            .filter(|c| !positions.contains_key(c))
            .map(|c| c.to_string())
            .collect();

        let mut problems = Vec::new();
        if !unexpected.is_empty() {
            problems.push(format!("unexpected columns [{}]", unexpected.join(", ")));
        }
        if !missing.is_empty() {
            problems.push(format!("missing columns [{}]", missing.join(", ")));
        }
        if !repeated.is_empty() {
            problems.push(format!("repeated columns [{}]", repeated.join(", ")));
        }

        if problems.is_empty() {
            Ok(Self(positions))
        } else {
            Err(IngestError::Header {
                message: problems.join("; "),
            })
        }
    }
}

/// One CSV row, addressed by column.
struct Cells<'a> {
    row: &'a csv::StringRecord,
    columns: &'a ColumnIndex,
}

impl Cells<'_> {
    fn to_record(&self) -> Result<OffenceRecord, IngestError> {
        use OffenceColumn as C;

        Ok(OffenceRecord {
            offence_finyear: self.text(C::OffenceFinyear),
            offence_month: self.month(C::OffenceMonth)?,
            offence_code: self.integer(C::OffenceCode)?,
            offence_desc: self.text(C::OffenceDesc),
            legislation: self.text(C::Legislation),
            section_clause: self.text(C::SectionClause),
            face_value: self.optional_real(C::FaceValue)?,
            camera_ind: self.text(C::CameraInd),
            camera_type: self.text(C::CameraType),
            location_code: self.optional_real(C::LocationCode)?,
            location_details: self.text(C::LocationDetails),
            school_zone_ind: self.text(C::SchoolZoneInd),
            speed_band: self.text(C::SpeedBand),
            speed_ind: self.text(C::SpeedInd),
            point_to_point_ind: self.text(C::PointToPointInd),
            red_light_camera_ind: self.text(C::RedLightCameraInd),
            speed_camera_ind: self.text(C::SpeedCameraInd),
            seatbelt_ind: self.text(C::SeatbeltInd),
            mobile_phone_ind: self.text(C::MobilePhoneInd),
            parking_ind: self.text(C::ParkingInd),
            cins_ind: self.text(C::CinsInd),
            food_ind: self.text(C::FoodInd),
            bicycle_toy_etc_ind: self.text(C::BicycleToyEtcInd),
            total_number: self.integer(C::TotalNumber)?,
            total_value: self.real(C::TotalValue)?,
        })
    }

    fn raw(&self, column: OffenceColumn) -> &str {
        self.columns
            .0
            .get(&column)
            .and_then(|&i| self.row.get(i))
            .unwrap_or("")
    }

    fn text(&self, column: OffenceColumn) -> Option<String> {
        let value = self.raw(column);
        (!value.is_empty()).then(|| value.to_string())
    }

    fn month(&self, column: OffenceColumn) -> Result<MonthKey, IngestError> {
        let value = self.raw(column);
        MonthKey::from_store_format(value).map_err(|e| self.invalid(column, value, &e))
    }

    fn integer(&self, column: OffenceColumn) -> Result<i64, IngestError> {
        let value = self.raw(column);
        if let Ok(n) = value.parse::<i64>() {
            return Ok(n);
        }

        // Spreadsheet exports sometimes write whole numbers as `12.0`.
        match value.parse::<f64>() {
            #[allow(clippy::cast_possible_truncation)]
            Ok(n) if n.fract() == 0.0 && n.abs() < 9.0e15 => Ok(n as i64),
            _ => Err(self.invalid(column, value, &"expected an integer")),
        }
    }

    fn real(&self, column: OffenceColumn) -> Result<f64, IngestError> {
        self.optional_real(column)?
            .ok_or_else(|| self.invalid(column, "", &"value is required"))
    }

    fn optional_real(&self, column: OffenceColumn) -> Result<Option<f64>, IngestError> {
        let value = self.raw(column);
        if value.is_empty() {
            return Ok(None);
        }

        value
            .parse::<f64>()
            .map(Some)
            .map_err(|e| self.invalid(column, value, &e))
    }

    fn invalid(
        &self,
        column: OffenceColumn,
        value: &str,
        message: &impl std::fmt::Display,
    ) -> IngestError {
        IngestError::Value {
            line: self.row.position().map_or(0, csv::Position::line),
            column,
            value: value.to_string(),
            message: message.to_string(),
        }
    }
}
