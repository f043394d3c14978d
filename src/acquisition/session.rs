//! # Acquisition Session
//!
//! Owns the serial stream and the reading buffer for one run.
//!
//! The session has two states. It starts in [`AcquisitionState::Polling`],
//! reading newline-terminated records until the cancellation token fires or
//! the stream ends, then moves to [`AcquisitionState::Finalizing`], closes the
//! stream and hands its readings to the export step.

use std::time::Duration;

use chrono::Local;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

use super::reading::{classify_line, decode_line, LineClass, Reading};

/// Lifecycle of an acquisition session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcquisitionState {
    /// Reading lines from the stream
    Polling,
    /// Stream closed, readings ready for export (terminal)
    Finalizing,
}

/// Why polling stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// Cancellation token fired (Ctrl+C)
    Interrupted,
    /// Stream reported end of file
    EndOfStream,
    /// Stream read failed
    ReadError,
}

enum PollEvent {
    Cancelled,
    Read(std::result::Result<std::io::Result<usize>, tokio::time::error::Elapsed>),
}

/// One acquisition run over a byte stream
pub struct AcquisitionSession<R> {
    reader: Option<BufReader<R>>,
    prefix: String,
    read_timeout: Duration,
    state: AcquisitionState,
    readings: Vec<Reading>,
}

impl<R> std::fmt::Debug for AcquisitionSession<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AcquisitionSession")
            .field("prefix", &self.prefix)
            .field("state", &self.state)
            .field("readings", &self.readings.len())
            .field("open", &self.reader.is_some())
            .finish()
    }
}

impl<R: AsyncRead + Unpin> AcquisitionSession<R> {
    /// Start a session over an already-open stream
    pub fn new(stream: R, prefix: impl Into<String>, read_timeout: Duration) -> Self {
        Self {
            reader: Some(BufReader::new(stream)),
            prefix: prefix.into(),
            read_timeout,
            state: AcquisitionState::Polling,
            readings: Vec::new(),
        }
    }

    /// Current state
    pub fn state(&self) -> AcquisitionState {
        self.state
    }

    /// Readings accumulated so far, in arrival order
    pub fn readings(&self) -> &[Reading] {
        &self.readings
    }

    /// Whether the stream is still open
    pub fn is_open(&self) -> bool {
        self.reader.is_some()
    }

    /// Poll the stream until `cancel` fires or the stream ends
    ///
    /// A read that produces nothing within the read timeout just polls again;
    /// bytes of a partially received line are kept for the next attempt.
    pub async fn poll(&mut self, cancel: &CancellationToken) -> StopReason {
        let mut line = Vec::new();

        loop {
            let Some(reader) = self.reader.as_mut() else {
                self.state = AcquisitionState::Finalizing;
                return StopReason::EndOfStream;
            };

            let event = tokio::select! {
                biased;
                _ = cancel.cancelled() => PollEvent::Cancelled,
                read = tokio::time::timeout(self.read_timeout, reader.read_until(b'\n', &mut line)) => {
                    PollEvent::Read(read)
                }
            };

            let reason = match event {
                PollEvent::Cancelled => {
                    info!("Interrupt received. Closing connection.");
                    StopReason::Interrupted
                }
                PollEvent::Read(Err(_)) => {
                    trace!("No data within {:?}", self.read_timeout);
                    continue;
                }
                PollEvent::Read(Ok(Ok(0))) => {
                    if !line.is_empty() {
                        self.handle_line(&line);
                    }
                    warn!("Serial stream ended");
                    StopReason::EndOfStream
                }
                PollEvent::Read(Ok(Ok(_))) => {
                    self.handle_line(&line);
                    line.clear();
                    continue;
                }
                PollEvent::Read(Ok(Err(e))) => {
                    error!("Serial read failed: {}", e);
                    StopReason::ReadError
                }
            };

            self.state = AcquisitionState::Finalizing;
            return reason;
        }
    }

    fn handle_line(&mut self, raw: &[u8]) {
        let decoded = decode_line(raw);
        debug!("Received: {}", decoded);

        match classify_line(&decoded, &self.prefix, Local::now().naive_local()) {
            LineClass::Accepted(reading) => {
                info!("Reading: {}", reading.fields().join(","));
                self.readings.push(reading);
            }
            LineClass::Malformed { tokens } => {
                warn!("Dropping sweep record with {} fields: {}", tokens, decoded);
            }
            LineClass::Ignored => {}
        }
    }

    /// Close the stream; closing an already-closed stream does nothing
    pub fn close(&mut self) {
        if self.reader.take().is_some() {
            info!("Serial connection closed.");
        }
    }

    /// Enter the terminal state, closing the stream and handing over the
    /// readings
    pub fn finalize(mut self) -> Vec<Reading> {
        self.state = AcquisitionState::Finalizing;
        self.close();
        std::mem::take(&mut self.readings)
    }
}
