//! Acquisition-publish lifecycle controller.
//!
//! Drives one device through a fixed sequence and forwards every sample to a
//! [`PublishSink`]:
//!
//! ```text
//! Unconnected ─connect─▶ Connected ─select─▶ SensorSelected ─start─▶ Sampling
//!      ─calibrate─▶ Calibrating ─▶ Streaming ─(interrupt | end | failure)─▶ Terminated
//! ```
//!
//! There is no branching on success and no retry: a failing step abandons the
//! session. Whatever the exit path (stream end, interruption, failure), the
//! device handle is released exactly once through [`DeviceSession::release`].
//!
//! Interruption is modelled as a future passed in by the caller (Ctrl+C in
//! the binary, a channel in tests). It is raced against the whole sequence,
//! so it also cuts calibration or a slow connect short.

use crate::config::{AcquisitionConfig, NodeParameters};
use crate::data::GripForce;
use crate::device::DeviceSession;
use crate::device::DeviceDriver;
use crate::error::{AcquisitionError, AcquisitionResult, DriverErrorKind};
use crate::publisher::PublishSink;
use std::future::Future;
use tracing::{debug, info, warn, Instrument};

/// Lifecycle states of one acquisition session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcquisitionState {
    /// Handle created, no I/O yet.
    Unconnected,
    /// Device answered.
    Connected,
    /// Sensor channel active.
    SensorSelected,
    /// Device is sampling.
    Sampling,
    /// Zero-baseline window in progress.
    Calibrating,
    /// Samples are being published.
    Streaming,
    /// Session over, device released.
    Terminated,
}

/// Why a session that did not fail came to an end.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// External interruption.
    Interrupted,
    /// The device ended its stream.
    StreamEnded,
}

/// Summary of a completed session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AcquisitionOutcome {
    /// Terminal reason.
    pub reason: StopReason,
    /// Last state reached before termination.
    pub last_state: AcquisitionState,
    /// Samples handed to the sink.
    pub published: u64,
}

/// State tracker shared between the step sequence and the final report.
#[derive(Debug)]
struct Lifecycle {
    state: AcquisitionState,
    published: u64,
}

impl Lifecycle {
    fn new() -> Self {
        Self {
            state: AcquisitionState::Unconnected,
            published: 0,
        }
    }

    fn advance(&mut self, next: AcquisitionState) {
        debug!(from = ?self.state, to = ?next, "Lifecycle transition");
        self.state = next;
    }
}

/// Run one acquisition session until interruption, end of stream or failure.
///
/// `config` has already been resolved, so a missing `device_name` can never
/// reach this point. `shutdown` resolving counts as an interruption; it is
/// logged as a warning and reported as [`StopReason::Interrupted`].
pub async fn run_acquisition<F>(
    config: &AcquisitionConfig,
    driver: &dyn DeviceDriver,
    sink: &dyn PublishSink,
    shutdown: F,
) -> AcquisitionResult<AcquisitionOutcome>
where
    F: Future<Output = ()>,
{
    let span = tracing::info_span!(
        "acquisition",
        device = %config.device_name,
        driver = driver.driver_type(),
        topic = sink.topic()
    );

    async move {
        let mut lifecycle = Lifecycle::new();
        let mut session = DeviceSession::open(driver, &config.device_name);

        let result = tokio::select! {
            biased;
            _ = shutdown => {
                warn!("Acquisition interrupted by user");
                Ok(StopReason::Interrupted)
            }
            result = drive(&mut session, config, sink, &mut lifecycle) => result,
        };

        session.release().await;
        let last_state = lifecycle.state;
        lifecycle.advance(AcquisitionState::Terminated);

        result.map(|reason| {
            let outcome = AcquisitionOutcome {
                reason,
                last_state,
                published: lifecycle.published,
            };
            info!(
                reason = ?outcome.reason,
                published = outcome.published,
                "Acquisition finished"
            );
            outcome
        })
    }
    .instrument(span)
    .await
}

/// Resolve `params` and run one session with them.
///
/// Resolution happens before the driver is asked for a handle, so a missing
/// or invalid parameter ends the run with [`AcquisitionError::Config`] and no
/// device I/O at all.
pub async fn run_with_params<F>(
    params: &NodeParameters,
    driver: &dyn DeviceDriver,
    sink: &dyn PublishSink,
    shutdown: F,
) -> AcquisitionResult<AcquisitionOutcome>
where
    F: Future<Output = ()>,
{
    let config = AcquisitionConfig::resolve(params)?;
    info!(
        device = %config.device_name,
        sensor = config.selected_sensor,
        rate_hz = config.sampling_rate,
        measurement_type = %config.measurement_type,
        calibration = ?config.calibration_duration,
        topic = sink.topic(),
        driver = driver.driver_type(),
        "Parameters resolved"
    );
    run_acquisition(&config, driver, sink, shutdown).await
}

/// Steps 1-7. Returns only when the stream ends or a step fails.
async fn drive(
    session: &mut DeviceSession,
    config: &AcquisitionConfig,
    sink: &dyn PublishSink,
    lifecycle: &mut Lifecycle,
) -> AcquisitionResult<StopReason> {
    let device_name = session.device_name().to_string();
    let driver_type = session.driver_type();
    let Some(device) = session.device() else {
        return Err(AcquisitionError::Device {
            operation: "connect",
            source: crate::error::DriverError::new(
                driver_type,
                DriverErrorKind::InvalidState,
                "device already released",
            ),
        });
    };

    // 1. Connect
    device
        .connect()
        .await
        .map_err(|source| AcquisitionError::DeviceNotFound {
            device: device_name.clone(),
            source,
        })?;
    lifecycle.advance(AcquisitionState::Connected);

    // 2. Describe
    match device.device_info().await {
        Ok(info) => info!(
            name = %info.name,
            order_code = %info.order_code,
            serial = %info.serial_number,
            firmware = %info.firmware,
            battery_percent = ?info.battery_percent,
            "Connected to device"
        ),
        Err(e) => warn!(error = %e, "Could not read device info"),
    }

    // 3. Select sensor
    let sensor = config.selected_sensor;
    device
        .select_sensors(&[sensor])
        .await
        .map_err(|source| AcquisitionError::SensorSelection { sensor, source })?;
    lifecycle.advance(AcquisitionState::SensorSelected);

    // 4. Describe selected sensor
    match device.enabled_sensor_info().await {
        Ok(sensors) => {
            for info in sensors {
                info!(
                    sensor = info.number,
                    description = %info.description,
                    units = %info.units,
                    "Sensor enabled"
                );
            }
        }
        Err(e) => warn!(error = %e, "Could not read enabled sensor info"),
    }

    // 5. Start sampling
    let rate_hz = config.sampling_rate;
    device.start(rate_hz).await.map_err(|source| {
        if source.kind == DriverErrorKind::InvalidParameter {
            AcquisitionError::UnsupportedRate { rate_hz, source }
        } else {
            AcquisitionError::Device {
                operation: "start",
                source,
            }
        }
    })?;
    lifecycle.advance(AcquisitionState::Sampling);
    info!(rate_hz, "Sampling started");

    // 6. Calibrate
    lifecycle.advance(AcquisitionState::Calibrating);
    let baseline = device
        .calibrate(config.calibration_duration)
        .await
        .map_err(AcquisitionError::Calibration)?;
    info!(
        baseline,
        window = ?config.calibration_duration,
        "Zero baseline acquired"
    );

    // 7. Stream
    lifecycle.advance(AcquisitionState::Streaming);
    loop {
        let sample = device
            .read()
            .await
            .map_err(|source| AcquisitionError::Read {
                published: lifecycle.published,
                source,
            })?;

        let Some(sample) = sample else {
            info!("Device ended its stream");
            return Ok(StopReason::StreamEnded);
        };

        let message = GripForce::from_sample(lifecycle.published, sample, config.measurement_type);
        tracing::trace!(seq = message.seq, force = message.force, "Publishing sample");
        sink.publish(message)?;
        lifecycle.published += 1;
    }
}
