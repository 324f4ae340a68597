//! CLI entry point for the Go Direct force publisher node.
//!
//! # Usage
//!
//! Stream from the simulated dynamometer and echo the topic as JSON lines:
//! ```bash
//! godirect_publisher --device-name "GDX-HD 15T10012" --sampling-rate 100 --echo
//! ```
//!
//! Parameters come from `config/godirect.toml` (or `--config`), then
//! `GODIRECT_*` environment variables, then the flags below. Ctrl+C or
//! SIGTERM stops the stream and releases the device.

use anyhow::Result;
use clap::Parser;
use godirect_publisher::config::{
    LoggingOverrides, LoggingParameters, NodeParameters, ParameterOverrides,
};
use godirect_publisher::controller::{run_with_params, AcquisitionOutcome, StopReason};
use godirect_publisher::data::MeasurementType;
use godirect_publisher::error::{AcquisitionError, ConfigError};
use godirect_publisher::publisher::{self, TopicPublisher};
use godirect_publisher::{drivers, telemetry};
use std::path::PathBuf;
use tracing::{error, info, warn};

#[derive(Parser, Debug)]
#[command(name = "godirect_publisher")]
#[command(about = "Publish Go Direct Hand Dynamometer force samples", long_about = None)]
struct Cli {
    /// Parameter file (defaults to config/godirect.toml when present)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Device to connect to, e.g. "GDX-HD 15T10012"
    #[arg(long)]
    device_name: Option<String>,

    /// Sensor channel to stream
    #[arg(long)]
    selected_sensor: Option<u32>,

    /// Tag attached to every published sample (grip or pinch)
    #[arg(long)]
    measurement_type: Option<MeasurementType>,

    /// Sampling rate in Hz
    #[arg(long)]
    sampling_rate: Option<u32>,

    /// Calibration window in seconds
    #[arg(long)]
    calibrate_signal: Option<f64>,

    /// Publisher queue depth
    #[arg(long)]
    queue_size: Option<usize>,

    /// Device backend
    #[arg(long)]
    driver: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long)]
    log_level: Option<String>,

    /// Log format (pretty, compact, json)
    #[arg(long)]
    log_format: Option<String>,

    /// Print every published sample to stdout as a JSON line
    #[arg(long)]
    echo: bool,
}

impl Cli {
    fn overrides(&self) -> ParameterOverrides {
        ParameterOverrides {
            device_name: self.device_name.clone(),
            selected_sensor: self.selected_sensor,
            measurement_type: self.measurement_type,
            sampling_rate: self.sampling_rate,
            calibrate_signal: self.calibrate_signal,
            queue_size: self.queue_size,
            driver: self.driver.clone(),
            logging: LoggingOverrides {
                level: self.log_level.clone(),
                format: self.log_format.clone(),
            },
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let params = NodeParameters::load(cli.config.as_deref(), &cli.overrides());
    let logging = params
        .as_ref()
        .map(|p| p.logging.clone())
        .unwrap_or_default();
    if let Err(e) = telemetry::init_from_params(&logging) {
        eprintln!("Invalid logging parameters ({}); using defaults", e);
        telemetry::init_from_params(&LoggingParameters::default())
            .map_err(anyhow::Error::msg)?;
    }

    // Failures are logged here and never escape as a process error.
    match run(params, cli.echo).await {
        Ok(outcome) => info!(
            reason = ?outcome.reason,
            published = outcome.published,
            "Node shut down"
        ),
        Err(e) if is_parameter_failure(&e) => error!("Parameter lookup failed: {:?}", e),
        Err(e) if e.is::<AcquisitionError>() => error!("Acquisition failed: {:?}", e),
        Err(e) => error!("Caught error: {:?}. Exiting!", e),
    }

    Ok(())
}

fn is_parameter_failure(err: &anyhow::Error) -> bool {
    err.chain().any(|cause| {
        cause.is::<ConfigError>()
            || matches!(
                cause.downcast_ref::<AcquisitionError>(),
                Some(AcquisitionError::Config(_))
            )
    })
}

async fn run(
    params: Result<NodeParameters, ConfigError>,
    echo: bool,
) -> Result<AcquisitionOutcome> {
    let params = params?;
    let driver = drivers::from_params(&params)?;
    let topic = TopicPublisher::new(params.topic.clone(), params.queue_size).map_err(|e| {
        ConfigError::InvalidParameter {
            name: "queue_size",
            reason: e.to_string(),
        }
    })?;

    let echo_task = echo.then(|| {
        let receiver = topic.subscribe();
        tokio::spawn(publisher::echo(receiver, tokio::io::stdout()))
    });

    let outcome = run_with_params(&params, driver.as_ref(), &topic, shutdown_signal()).await;

    // Closing the topic lets the echo subscriber drain and return.
    drop(topic);
    if let Some(task) = echo_task {
        match task.await {
            Ok(Ok(written)) => info!(written, "Echo subscriber finished"),
            Ok(Err(e)) => warn!(error = %e, "Echo subscriber stopped early"),
            Err(e) => warn!(error = %e, "Echo task failed"),
        }
    }

    let outcome = outcome?;
    if outcome.reason == StopReason::Interrupted {
        info!("Shutdown requested; device released");
    }
    Ok(outcome)
}

/// Resolves on Ctrl+C, or SIGTERM on unix.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Could not listen for Ctrl+C");
            futures::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Could not listen for SIGTERM");
                futures::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = futures::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
