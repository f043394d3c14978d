//! # Error Types
//!
//! Custom error types for Bioimpedance Bridge using `thiserror`.

use std::path::PathBuf;

use thiserror::Error;

/// Main error type for Bioimpedance Bridge
#[derive(Debug, Error)]
pub enum BridgeError {
    /// Serial port could not be opened or read
    #[error("Serial error: {0}")]
    Serial(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Spreadsheet could not be written
    #[error("Export error: {0}")]
    Export(#[from] rust_xlsxwriter::XlsxError),

    /// Spreadsheet could not be read back
    #[error("Workbook error: {0}")]
    Workbook(#[from] calamine::XlsxError),

    /// Workbook lacks a column the chart needs
    #[error("Column '{0}' not found in workbook header")]
    MissingColumn(String),

    /// Directory holds no `.xlsx` file
    #[error("No Excel files found in {}", .0.display())]
    NoWorkbook(PathBuf),

    /// PDF rendering failed
    #[error("Chart error: {0}")]
    Chart(String),

    /// Nothing numeric to plot
    #[error("No plottable rows in {}", .0.display())]
    EmptySeries(PathBuf),
}

/// Result type alias for Bioimpedance Bridge
pub type Result<T> = std::result::Result<T, BridgeError>;
