//! # Bioimpedance Bridge Library
//!
//! Capture bioimpedance frequency sweeps from a serial sensor board into Excel
//! workbooks, and plot them.
//!
//! The acquisition side reads `1,frequency_sweep_easy,...` records from the
//! board's USB serial port until interrupted, then writes one timestamped
//! workbook. The chart side picks the newest workbook in a folder and renders
//! impedance against frequency as a PDF.

pub mod acquisition;
pub mod chart;
pub mod config;
pub mod error;
pub mod export;
pub mod serial;
