//! # Bioimpedance Bridge
//!
//! Capture bioimpedance frequency sweeps from a serial sensor board and plot
//! them.
//!
//! # Control Flow
//!
//! `acquire`:
//!
//! 1. **Initialization**
//!    - Load configuration (built-in defaults unless `--config` is given)
//!    - Set up logging with tracing subscriber
//!    - Create the output folder, open the serial port, wait for the board
//!
//! 2. **Main Loop**
//!    - Read lines, keep `1,frequency_sweep_easy` records with a timestamp
//!    - Handle Ctrl+C for graceful shutdown
//!
//! 3. **Shutdown**
//!    - Close the serial port
//!    - Save the readings to `bioimpedance<YYYYMMDD_HHMMSS>.xlsx`
//!
//! `plot`:
//!
//! 1. Ask for a description (unless `--description` is given)
//! 2. Chart the newest workbook in the input folder to a PDF beside it
//!
//! # Examples
//!
//! ```bash
//! bioimpedance-bridge acquire --port /dev/ttyACM0
//! bioimpedance-bridge plot --description "donor 3"
//! ```

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use bioimpedance_bridge::acquisition::run_acquisition;
use bioimpedance_bridge::chart::plot_latest;
use bioimpedance_bridge::config::{Config, LoggingConfig};
use bioimpedance_bridge::export::{prepare_output_dir, ExportOutcome};
use bioimpedance_bridge::serial::SensorSerial;

/// Log file name inside `[logging] log_dir`
const LOG_FILE_NAME: &str = "bioimpedance-bridge.log";

/// Bioimpedance Bridge
///
/// Capture frequency sweeps from the sensor board and plot them
#[derive(Parser, Debug)]
#[command(name = "bioimpedance-bridge")]
#[command(version)]
#[command(about = "Capture bioimpedance frequency sweeps over serial and plot them")]
struct Cli {
    /// TOML configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Record sweeps until Ctrl+C, then save them as a workbook
    Acquire {
        /// Serial port path (e.g., /dev/cu.usbmodem101)
        #[arg(short, long)]
        port: Option<String>,

        /// Folder for the saved workbook
        #[arg(short, long)]
        output_dir: Option<PathBuf>,
    },

    /// Chart the newest workbook in a folder as a PDF
    Plot {
        /// Folder to search for workbooks
        #[arg(short, long)]
        dir: Option<PathBuf>,

        /// Description for the chart title and file name
        #[arg(short = 'n', long)]
        description: Option<String>,
    },
}

/// Install the console subscriber, plus a daily rolling file when configured
///
/// The returned guard flushes the file writer and must outlive all logging.
fn init_logging(config: &LoggingConfig) -> Option<WorkerGuard> {
    let (file_layer, guard) = match &config.log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, LOG_FILE_NAME);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            (Some(fmt::layer().with_writer(writer).with_ansi(false)), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .with(fmt::layer())
        .with(file_layer)
        .init();

    guard
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::load_or_default(cli.config.as_ref())
        .context("Failed to load configuration")?;

    let _guard = init_logging(&config.logging);
    info!("Bioimpedance Bridge v{} starting...", env!("CARGO_PKG_VERSION"));

    match cli.command {
        Commands::Acquire { port, output_dir } => acquire(config, port, output_dir).await,
        Commands::Plot { dir, description } => plot(config, dir, description).await,
    }
}

async fn acquire(mut config: Config, port: Option<String>, output_dir: Option<PathBuf>) -> Result<()> {
    if let Some(port) = port {
        config.serial.port = port;
    }
    if let Some(output_dir) = output_dir {
        config.acquisition.output_dir = output_dir;
    }
    config.validate()?;

    prepare_output_dir(&config.acquisition.output_dir)
        .context("Failed to prepare output folder")?;

    let serial = SensorSerial::open(&config.serial)
        .context("Failed to establish a serial connection")?;

    // Registered before settling so Ctrl+C never reaches the default handler
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Received Ctrl+C, shutting down...");
            trigger.cancel();
        }
    });

    serial.settle(&config.serial).await;
    info!(
        "Listening on {} at {} baud. Press Ctrl+C to stop and save",
        serial.device_path(),
        serial.baud_rate()
    );

    let outcome = run_acquisition(
        serial,
        &config.acquisition.prefix,
        config.serial.read_timeout(),
        &config.acquisition.output_dir,
        &cancel,
    )
    .await;

    match outcome {
        ExportOutcome::Saved { path, rows } => info!("Saved {} readings to {}", rows, path.display()),
        ExportOutcome::NothingToSave => info!("Nothing recorded"),
        ExportOutcome::Failed(reason) => error!("Readings were not saved: {}", reason),
    }

    Ok(())
}

async fn plot(config: Config, dir: Option<PathBuf>, description: Option<String>) -> Result<()> {
    let dir = dir.unwrap_or(config.chart.input_dir);
    let description = match description {
        Some(description) => description,
        None => prompt_description().await?,
    };

    let out = plot_latest(&dir, &description)
        .with_context(|| format!("Failed to plot latest workbook in {}", dir.display()))?;
    println!("Plot saved at: {}", out.display());

    Ok(())
}

async fn prompt_description() -> Result<String> {
    let mut stdout = tokio::io::stdout();
    stdout
        .write_all(b"Enter the name or description to include in the plot title: ")
        .await?;
    stdout.flush().await?;

    let mut line = String::new();
    BufReader::new(tokio::io::stdin()).read_line(&mut line).await?;
    Ok(line.trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_acquire() {
        let cli = Cli::try_parse_from([
            "bioimpedance-bridge",
            "acquire",
            "--port",
            "/dev/ttyACM0",
            "-o",
            "/tmp/sweeps",
        ])
        .unwrap();

        match cli.command {
            Commands::Acquire { port, output_dir } => {
                assert_eq!(port.as_deref(), Some("/dev/ttyACM0"));
                assert_eq!(output_dir, Some(PathBuf::from("/tmp/sweeps")));
            }
            other => panic!("Expected Acquire, got: {:?}", other),
        }
        assert!(cli.config.is_none());
    }

    #[test]
    fn test_parse_plot_with_global_config() {
        let cli = Cli::try_parse_from([
            "bioimpedance-bridge",
            "plot",
            "-n",
            "donor 3",
            "--config",
            "bridge.toml",
        ])
        .unwrap();

        assert_eq!(cli.config, Some(PathBuf::from("bridge.toml")));
        match cli.command {
            Commands::Plot { dir, description } => {
                assert!(dir.is_none());
                assert_eq!(description.as_deref(), Some("donor 3"));
            }
            other => panic!("Expected Plot, got: {:?}", other),
        }
    }

    #[test]
    fn test_subcommand_required() {
        assert!(Cli::try_parse_from(["bioimpedance-bridge"]).is_err());
    }
}
