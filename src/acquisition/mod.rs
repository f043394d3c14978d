//! # Acquisition Module
//!
//! Reads sweep records from the sensor's serial stream and saves them.
//!
//! This module handles:
//! - Decoding serial lines (lossy UTF-8) and filtering by the record prefix
//! - Timestamping and accumulating readings in arrival order
//! - Stopping on Ctrl+C or end of stream
//! - Handing the readings to the spreadsheet export

pub mod reading;
pub mod session;

use std::path::Path;
use std::time::Duration;

use tokio::io::AsyncRead;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::export::{export_readings, ExportOutcome};

pub use reading::{Reading, READING_COLUMNS};
pub use session::{AcquisitionSession, AcquisitionState, StopReason};

/// Run one acquisition over `stream` and export whatever was captured
///
/// Polls until `cancel` fires or the stream ends, closes the stream, then
/// writes the readings to a new workbook in `output_dir`. Export failures are
/// logged and reported through the returned outcome, never raised.
pub async fn run_acquisition<R: AsyncRead + Unpin>(
    stream: R,
    prefix: &str,
    read_timeout: Duration,
    output_dir: &Path,
    cancel: &CancellationToken,
) -> ExportOutcome {
    let mut session = AcquisitionSession::new(stream, prefix, read_timeout);

    let reason = session.poll(cancel).await;
    info!(
        "Acquisition stopped ({:?}) with {} readings",
        reason,
        session.readings().len()
    );

    let readings = session.finalize();
    export_readings(readings, output_dir)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SWEEP_RECORD_PREFIX;
    use tokio_test::io::Builder;

    #[tokio::test]
    async fn test_run_acquisition_writes_one_workbook() {
        let dir = tempfile::tempdir().unwrap();
        let output_dir = dir.path().join("sweeps");
        let stream = Builder::new()
            .read(b"noise\n-1,bad\n")
            .read(b"1,frequency_sweep_easy,50,10,2,1,5,12.3\n")
            .read(b"1,frequency_sweep_easy,60,11,3,1.1,5.2,13.1\n")
            .build();

        let outcome = run_acquisition(
            stream,
            SWEEP_RECORD_PREFIX,
            Duration::from_millis(20),
            &output_dir,
            &CancellationToken::new(),
        )
        .await;

        let path = match outcome {
            ExportOutcome::Saved { path, rows } => {
                assert_eq!(rows, 2);
                path
            }
            other => panic!("Expected Saved, got: {:?}", other),
        };
        assert!(path.starts_with(&output_dir));
        assert_eq!(std::fs::read_dir(&output_dir).unwrap().count(), 1);
    }

    #[tokio::test]
    async fn test_run_acquisition_without_records_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let output_dir = dir.path().join("sweeps");
        let stream = Builder::new().read(b"noise\n-1,bad\n").build();

        let outcome = run_acquisition(
            stream,
            SWEEP_RECORD_PREFIX,
            Duration::from_millis(20),
            &output_dir,
            &CancellationToken::new(),
        )
        .await;

        assert_eq!(outcome, ExportOutcome::NothingToSave);
        assert!(!output_dir.exists());
    }
}
