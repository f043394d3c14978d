//! # Chart Module
//!
//! Plots impedance against frequency from the newest exported workbook.
//!
//! This module handles:
//! - Finding the most recently modified `.xlsx` file in a folder
//! - Reading the `c_frequency` and `impedance` columns (kHz converted to Hz)
//! - Rendering a marker-and-line chart to `<stem>_<description>_plot.pdf`

pub mod render;
pub mod source;

pub use render::{chart_title, plot_file_name, plot_latest, render_pdf};
pub use source::{find_latest_workbook, load_series, ImpedancePoint};
