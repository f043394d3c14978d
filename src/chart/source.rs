//! # Chart Data Source
//!
//! Finds the newest exported workbook and pulls the frequency/impedance
//! series out of it.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use calamine::{open_workbook, Data, Reader, Xlsx};
use tracing::{debug, warn};

use crate::error::{BridgeError, Result};

/// Column holding the sweep frequency in kHz
pub const FREQUENCY_COLUMN: &str = "c_frequency";

/// Column holding the impedance in ohms
pub const IMPEDANCE_COLUMN: &str = "impedance";

/// Factor from the exported kHz to plotted Hz
pub const KHZ_TO_HZ: f64 = 1000.0;

/// One plotted point
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ImpedancePoint {
    pub frequency_hz: f64,
    pub impedance_ohms: f64,
}

impl ImpedancePoint {
    /// Build a point from the exported kHz frequency
    pub fn from_khz(frequency_khz: f64, impedance_ohms: f64) -> Self {
        Self {
            frequency_hz: frequency_khz * KHZ_TO_HZ,
            impedance_ohms,
        }
    }

    /// Both coordinates are finite
    pub fn is_finite(&self) -> bool {
        self.frequency_hz.is_finite() && self.impedance_ohms.is_finite()
    }
}

fn is_workbook(path: &Path) -> bool {
    let is_xlsx = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("xlsx"));

    // Excel keeps "~$name.xlsx" lock files next to open workbooks
    let is_lock_file = path
        .file_name()
        .and_then(|name| name.to_str())
        .is_some_and(|name| name.starts_with("~$"));

    is_xlsx && !is_lock_file
}

/// Find the most recently modified `.xlsx` file in `dir`
///
/// # Errors
///
/// - `Io` if the directory cannot be listed
/// - `NoWorkbook` if it holds no workbook
pub fn find_latest_workbook(dir: &Path) -> Result<PathBuf> {
    let mut latest: Option<(SystemTime, PathBuf)> = None;

    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if !path.is_file() || !is_workbook(&path) {
            continue;
        }

        let modified = fs::metadata(&path)?.modified()?;
        debug!("Candidate workbook {} ({:?})", path.display(), modified);

        if latest.as_ref().map_or(true, |(newest, _)| modified > *newest) {
            latest = Some((modified, path));
        }
    }

    latest
        .map(|(_, path)| path)
        .ok_or_else(|| BridgeError::NoWorkbook(dir.to_path_buf()))
}

/// Numeric value of a cell, accepting numbers and numeric text
///
/// `inf` and `NaN` (which `f64::from_str` accepts) are not plottable and
/// count as non-numeric.
pub fn cell_as_f64(cell: &Data) -> Option<f64> {
    let value = match cell {
        Data::Float(value) => *value,
        Data::Int(value) => *value as f64,
        Data::String(text) => text.trim().parse().ok()?,
        _ => return None,
    };
    value.is_finite().then_some(value)
}

fn column_index(header: &[Data], name: &str) -> Result<usize> {
    header
        .iter()
        .position(|cell| matches!(cell, Data::String(text) if text.trim() == name))
        .ok_or_else(|| BridgeError::MissingColumn(name.to_string()))
}

/// Load the frequency/impedance series from the first sheet of `path`
///
/// Frequencies are converted from kHz to Hz. Rows where either value is not
/// numeric, or where the scaled frequency overflows, are skipped.
///
/// # Errors
///
/// - `Workbook` if the file cannot be opened as xlsx
/// - `MissingColumn` if a required header is absent
/// - `EmptySeries` if no row is plottable
pub fn load_series(path: &Path) -> Result<Vec<ImpedancePoint>> {
    let mut workbook: Xlsx<_> = open_workbook(path)?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| BridgeError::EmptySeries(path.to_path_buf()))??;

    let mut rows = range.rows();
    let header = rows
        .next()
        .ok_or_else(|| BridgeError::EmptySeries(path.to_path_buf()))?;
    let frequency_col = column_index(header, FREQUENCY_COLUMN)?;
    let impedance_col = column_index(header, IMPEDANCE_COLUMN)?;

    let mut points = Vec::new();
    for (index, row) in rows.enumerate() {
        let frequency = row.get(frequency_col).and_then(cell_as_f64);
        let impedance = row.get(impedance_col).and_then(cell_as_f64);

        match (frequency, impedance) {
            (Some(frequency), Some(impedance)) => {
                let point = ImpedancePoint::from_khz(frequency, impedance);
                if point.is_finite() {
                    points.push(point);
                } else {
                    warn!("Skipping out-of-range row {} in {}", index + 2, path.display());
                }
            }
            _ => warn!("Skipping non-numeric row {} in {}", index + 2, path.display()),
        }
    }

    if points.is_empty() {
        return Err(BridgeError::EmptySeries(path.to_path_buf()));
    }

    Ok(points)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_xlsxwriter::Workbook;
    use std::fs::File;
    use std::time::Duration;

    fn write_sheet(path: &Path, header: &[&str], rows: &[&[&str]]) {
        let mut workbook = Workbook::new();
        let sheet = workbook.add_worksheet();
        for (col, name) in header.iter().enumerate() {
            sheet.write_string(0, col as u16, *name).unwrap();
        }
        for (r, row) in rows.iter().enumerate() {
            for (col, value) in row.iter().enumerate() {
                sheet.write_string(r as u32 + 1, col as u16, *value).unwrap();
            }
        }
        workbook.save(path).unwrap();
    }

    fn touch(path: &Path, modified: SystemTime) {
        let file = File::create(path).unwrap();
        file.set_modified(modified).unwrap();
    }

    #[test]
    fn test_find_latest_by_modification_time() {
        let dir = tempfile::tempdir().unwrap();
        let base = SystemTime::now() - Duration::from_secs(3600);

        touch(&dir.path().join("bioimpedance20240101_000000.xlsx"), base + Duration::from_secs(30));
        touch(&dir.path().join("bioimpedance20230101_000000.xlsx"), base + Duration::from_secs(60));
        touch(&dir.path().join("newer-but-not-excel.csv"), base + Duration::from_secs(90));
        touch(&dir.path().join("~$bioimpedance20240101_000000.xlsx"), base + Duration::from_secs(120));

        let latest = find_latest_workbook(dir.path()).unwrap();
        assert_eq!(latest, dir.path().join("bioimpedance20230101_000000.xlsx"));
    }

    #[test]
    fn test_find_latest_ignores_directories() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("archive.xlsx")).unwrap();

        let result = find_latest_workbook(dir.path());
        assert!(matches!(result, Err(BridgeError::NoWorkbook(_))));
    }

    #[test]
    fn test_find_latest_in_missing_directory() {
        let result = find_latest_workbook(Path::new("/nonexistent/bioimpedance"));
        assert!(matches!(result, Err(BridgeError::Io(_))));
    }

    #[test]
    fn test_cell_as_f64() {
        assert_eq!(cell_as_f64(&Data::Float(12.3)), Some(12.3));
        assert_eq!(cell_as_f64(&Data::Int(50)), Some(50.0));
        assert_eq!(cell_as_f64(&Data::String(" 50 ".to_string())), Some(50.0));
        assert_eq!(cell_as_f64(&Data::String("n/a".to_string())), None);
        assert_eq!(cell_as_f64(&Data::Empty), None);
    }

    #[test]
    fn test_cell_as_f64_rejects_non_finite() {
        for text in ["inf", "-inf", "NaN", "infinity", "1e999"] {
            assert_eq!(cell_as_f64(&Data::String(text.to_string())), None, "{:?}", text);
        }
        assert_eq!(cell_as_f64(&Data::Float(f64::NAN)), None);
        assert_eq!(cell_as_f64(&Data::Float(f64::NEG_INFINITY)), None);
    }

    #[test]
    fn test_load_series_scales_khz_to_hz() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sweep.xlsx");
        write_sheet(
            &path,
            &["timestamp", "c_frequency", "impedance"],
            &[&["t0", "50", "12.3"], &["t1", "60", "13.1"]],
        );

        let points = load_series(&path).unwrap();

        assert_eq!(points.len(), 2);
        assert_eq!(points[0].frequency_hz, 50000.0);
        assert_eq!(points[0].impedance_ohms, 12.3);
        assert_eq!(points[1].frequency_hz, 60000.0);
    }

    #[test]
    fn test_load_series_skips_non_numeric_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sweep.xlsx");
        write_sheet(
            &path,
            &["c_frequency", "impedance"],
            &[&["50", "12.3"], &["sixty", "13.1"], &["70", ""]],
        );

        let points = load_series(&path).unwrap();
        assert_eq!(points, vec![ImpedancePoint::from_khz(50.0, 12.3)]);
    }

    #[test]
    fn test_load_series_skips_non_finite_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sweep.xlsx");
        write_sheet(
            &path,
            &["c_frequency", "impedance"],
            &[
                &["50", "12.3"],
                &["60", "inf"],
                &["70", "13.1"],
                &["NaN", "12.0"],
                &["80", "-inf"],
                &["1e306", "12.5"],
            ],
        );

        let points = load_series(&path).unwrap();
        assert_eq!(
            points,
            vec![ImpedancePoint::from_khz(50.0, 12.3), ImpedancePoint::from_khz(70.0, 13.1)]
        );
    }

    #[test]
    fn test_load_series_missing_column() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sweep.xlsx");
        write_sheet(&path, &["c_frequency", "gain"], &[&["50", "1"]]);

        match load_series(&path) {
            Err(BridgeError::MissingColumn(name)) => assert_eq!(name, IMPEDANCE_COLUMN),
            other => panic!("Expected MissingColumn, got: {:?}", other),
        }
    }

    #[test]
    fn test_load_series_header_only() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sweep.xlsx");
        write_sheet(&path, &["c_frequency", "impedance"], &[]);

        assert!(matches!(load_series(&path), Err(BridgeError::EmptySeries(_))));
    }

    #[test]
    fn test_load_series_rejects_non_workbook() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.xlsx");
        fs::write(&path, b"not a zip archive").unwrap();

        assert!(matches!(load_series(&path), Err(BridgeError::Workbook(_))));
    }
}
