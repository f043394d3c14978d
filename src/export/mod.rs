//! # Export Module
//!
//! Writes accumulated readings to an Excel workbook.
//!
//! One workbook per run, named `bioimpedance<YYYYMMDD_HHMMSS>.xlsx`, with a
//! header row of [`READING_COLUMNS`] and one text row per reading. There is
//! no index column.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{Local, NaiveDateTime};
use rust_xlsxwriter::{Format, Workbook};
use tracing::{error, info, warn};

use crate::acquisition::reading::{Reading, READING_COLUMNS};
use crate::error::Result;

/// Stem prefix of exported workbooks
pub const EXPORT_FILE_PREFIX: &str = "bioimpedance";

/// Timestamp layout appended to the stem
pub const EXPORT_TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

/// Result of the export step
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExportOutcome {
    /// Workbook written
    Saved { path: PathBuf, rows: usize },
    /// No readings, no file
    NothingToSave,
    /// Writing failed; readings are discarded
    Failed(String),
}

/// Workbook file name for an export made at `at`
///
/// # Examples
///
/// ```
/// use bioimpedance_bridge::export::export_file_name;
/// use chrono::NaiveDate;
///
/// let at = NaiveDate::from_ymd_opt(2024, 3, 14).unwrap().and_hms_opt(15, 9, 26).unwrap();
/// assert_eq!(export_file_name(at), "bioimpedance20240314_150926.xlsx");
/// ```
pub fn export_file_name(at: NaiveDateTime) -> String {
    format!("{}{}.xlsx", EXPORT_FILE_PREFIX, at.format(EXPORT_TIMESTAMP_FORMAT))
}

/// Create the output directory if it is missing
pub fn prepare_output_dir(dir: &Path) -> Result<()> {
    if dir.is_dir() {
        info!("Folder already exists: {}", dir.display());
    } else {
        fs::create_dir_all(dir)?;
        info!("Created folder: {}", dir.display());
    }
    Ok(())
}

/// Write `readings` to a new workbook at `path`
///
/// # Errors
///
/// Returns `BridgeError::Export` if a cell or the file cannot be written.
pub fn write_workbook(readings: &[Reading], path: &Path) -> Result<()> {
    let mut workbook = Workbook::new();
    let header = Format::new().set_bold();
    let worksheet = workbook.add_worksheet();

    for (col, name) in READING_COLUMNS.iter().enumerate() {
        worksheet.write_string_with_format(0, col as u16, *name, &header)?;
    }

    for (index, reading) in readings.iter().enumerate() {
        let row = index as u32 + 1;
        for (col, field) in reading.fields().iter().enumerate() {
            worksheet.write_string(row, col as u16, field.as_str())?;
        }
    }

    workbook.save(path)?;
    Ok(())
}

/// Export `readings` into `dir`, naming the file after `at`
pub fn export_readings_at(readings: Vec<Reading>, dir: &Path, at: NaiveDateTime) -> ExportOutcome {
    if readings.is_empty() {
        warn!("No data to save.");
        return ExportOutcome::NothingToSave;
    }

    let path = dir.join(export_file_name(at));
    let written = prepare_output_dir(dir).and_then(|()| write_workbook(&readings, &path));

    match written {
        Ok(()) => {
            info!("Data saved to {} ({} rows)", path.display(), readings.len());
            ExportOutcome::Saved {
                path,
                rows: readings.len(),
            }
        }
        Err(e) => {
            error!("Error saving file {}: {}", path.display(), e);
            ExportOutcome::Failed(e.to_string())
        }
    }
}

/// Export `readings` into `dir`, naming the file after the current local time
pub fn export_readings(readings: Vec<Reading>, dir: &Path) -> ExportOutcome {
    export_readings_at(readings, dir, Local::now().naive_local())
}
