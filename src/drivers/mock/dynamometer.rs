//! Simulated Go Direct Hand Dynamometer (GDX-HD).
//!
//! Reproduces what the controller sees from the real device:
//! - device discovery by name (optional roster; empty roster answers any name)
//! - a single `Force` channel in newtons on sensor 1
//! - a sampling-rate ceiling of 1000 Hz
//! - a sensor zero offset that calibration removes
//! - repeated squeeze cycles (rest, then a sin² force pulse) plus noise
//!
//! # Example
//!
//! ```rust,ignore
//! use godirect_publisher::drivers::mock::{MockDriverConfig, MockDynamometerDriver};
//!
//! let driver = MockDynamometerDriver::new(MockDriverConfig {
//!     seed: Some(42),
//!     max_samples: Some(100),
//!     ..Default::default()
//! });
//! let mut device = driver.open("GDX-HD 15T10012");
//! device.connect().await?;
//! ```

use super::common::{ErrorConfig, MockMode, MockRng, TimingConfig};
use crate::data::{DeviceInfo, RawSample, SensorInfo};
use crate::device::{DeviceDriver, DeviceHandle, GdxDevice};
use crate::error::{DriverError, DriverErrorKind};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{Interval, MissedTickBehavior};

/// Driver identifier used in logs and errors.
pub const DRIVER_TYPE: &str = "mock_gdx_hd";

/// Highest rate the GDX-HD accepts.
pub const GDX_HD_MAX_RATE_HZ: u32 = 1000;

/// Upper bound on samples averaged into a calibration baseline.
const MAX_CALIBRATION_SAMPLES: u64 = 1000;

/// Channels of the GDX-HD: (number, description, units).
const GDX_HD_SENSORS: &[(u32, &str, &str)] = &[(1, "Force", "N")];

// =============================================================================
// Configuration
// =============================================================================

/// Settings of the simulated backend (`[mock]` section of the parameters).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MockDriverConfig {
    /// Pacing mode
    #[serde(default)]
    pub mode: MockMode,
    /// Device names that answer discovery; empty answers any name
    #[serde(default)]
    pub devices: Vec<String>,
    /// RNG seed for reproducible noise and failures
    #[serde(default)]
    pub seed: Option<u64>,
    /// End the stream after this many samples (unbounded when unset)
    #[serde(default)]
    pub max_samples: Option<u64>,
    /// Peak force of a squeeze, in newtons
    #[serde(default = "default_peak_force")]
    pub peak_force: f64,
    /// Length of one rest + squeeze cycle, in seconds
    #[serde(default = "default_squeeze_period")]
    pub squeeze_period_s: f64,
    /// Reading of the unloaded sensor before calibration, in newtons
    #[serde(default = "default_zero_offset")]
    pub zero_offset: f64,
    /// Noise amplitude, in newtons
    #[serde(default = "default_noise")]
    pub noise: f64,
    /// Random failure probability applied to every operation
    #[serde(default)]
    pub failure_rate: f64,
}

fn default_peak_force() -> f64 {
    250.0
}

fn default_squeeze_period() -> f64 {
    4.0
}

fn default_zero_offset() -> f64 {
    1.8
}

fn default_noise() -> f64 {
    0.3
}

impl Default for MockDriverConfig {
    fn default() -> Self {
        Self {
            mode: MockMode::default(),
            devices: Vec::new(),
            seed: None,
            max_samples: None,
            peak_force: default_peak_force(),
            squeeze_period_s: default_squeeze_period(),
            zero_offset: default_zero_offset(),
            noise: default_noise(),
            failure_rate: 0.0,
        }
    }
}

// =============================================================================
// Activity counters
// =============================================================================

/// Counters shared by every handle a driver hands out.
#[derive(Debug, Default)]
pub struct DeviceActivity {
    opened: AtomicU64,
    connects: AtomicU64,
    closes: AtomicU64,
    samples: AtomicU64,
}

impl DeviceActivity {
    /// Handles created with `open`.
    pub fn opened(&self) -> u64 {
        self.opened.load(Ordering::SeqCst)
    }

    /// Successful connects.
    pub fn connects(&self) -> u64 {
        self.connects.load(Ordering::SeqCst)
    }

    /// Calls to `close`.
    pub fn closes(&self) -> u64 {
        self.closes.load(Ordering::SeqCst)
    }

    /// Samples returned by `read`.
    pub fn samples(&self) -> u64 {
        self.samples.load(Ordering::SeqCst)
    }
}

// =============================================================================
// Driver
// =============================================================================

/// Factory for simulated GDX-HD handles.
pub struct MockDynamometerDriver {
    config: Arc<MockDriverConfig>,
    error_config: ErrorConfig,
    timing: TimingConfig,
    activity: Arc<DeviceActivity>,
}

impl MockDynamometerDriver {
    /// Driver with the given settings. A non-zero `failure_rate` enables
    /// random failures on every operation.
    pub fn new(config: MockDriverConfig) -> Self {
        let error_config = if config.failure_rate > 0.0 {
            ErrorConfig::random_failures_seeded(config.failure_rate, config.seed)
        } else {
            ErrorConfig::none()
        };
        let timing = match config.mode {
            MockMode::Instant => TimingConfig::default(),
            MockMode::Realistic => TimingConfig::usb(),
        };
        Self {
            config: Arc::new(config),
            error_config,
            timing,
            activity: Arc::new(DeviceActivity::default()),
        }
    }

    /// Replace the error injection configuration.
    pub fn with_error_config(mut self, error_config: ErrorConfig) -> Self {
        self.error_config = error_config;
        self
    }

    /// Replace the link latencies used in realistic mode.
    pub fn with_timing(mut self, timing: TimingConfig) -> Self {
        self.timing = timing;
        self
    }

    /// Counters across all handles of this driver.
    pub fn activity(&self) -> Arc<DeviceActivity> {
        self.activity.clone()
    }
}

impl DeviceDriver for MockDynamometerDriver {
    fn driver_type(&self) -> &'static str {
        DRIVER_TYPE
    }

    fn open(&self, device_name: &str) -> DeviceHandle {
        self.activity.opened.fetch_add(1, Ordering::SeqCst);
        Box::new(MockDynamometer {
            name: device_name.to_string(),
            config: self.config.clone(),
            error_config: self.error_config.clone(),
            timing: self.timing,
            activity: self.activity.clone(),
            rng: MockRng::new(self.config.seed),
            link: LinkState::Closed,
            selected: Vec::new(),
            rate_hz: 0,
            ticker: None,
            sample_index: 0,
            emitted: 0,
            baseline: 0.0,
            started_at: Utc::now(),
        })
    }
}

// =============================================================================
// Device handle
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LinkState {
    Closed,
    Connected,
    Sampling,
}

/// One simulated GDX-HD connection.
pub struct MockDynamometer {
    name: String,
    config: Arc<MockDriverConfig>,
    error_config: ErrorConfig,
    timing: TimingConfig,
    activity: Arc<DeviceActivity>,
    rng: MockRng,
    link: LinkState,
    selected: Vec<u32>,
    rate_hz: u32,
    ticker: Option<Interval>,
    /// Samples generated so far, calibration included
    sample_index: u64,
    /// Samples returned by `read`
    emitted: u64,
    baseline: f64,
    started_at: DateTime<Utc>,
}

impl MockDynamometer {
    fn error(&self, kind: DriverErrorKind, message: impl Into<String>) -> DriverError {
        DriverError::new(DRIVER_TYPE, kind, message)
    }

    fn require(&self, expected: LinkState, operation: &str) -> Result<(), DriverError> {
        if self.link == expected {
            Ok(())
        } else {
            Err(self.error(
                DriverErrorKind::InvalidState,
                format!(
                    "'{}' requires the device to be {:?}, but it is {:?}",
                    operation, expected, self.link
                ),
            ))
        }
    }

    async fn command_latency(&self) {
        if self.config.mode == MockMode::Realistic && self.timing.command_delay_ms > 0 {
            tokio::time::sleep(self.timing.command_delay()).await;
        }
    }

    /// Squeeze profile: rest for the first 40% of a cycle, then a sin² pulse.
    fn squeeze_force(&self, t: f64) -> f64 {
        let period = self.config.squeeze_period_s;
        if period <= 0.0 {
            return 0.0;
        }
        let phase = (t % period) / period;
        if phase < 0.4 {
            0.0
        } else {
            let x = (phase - 0.4) / 0.6;
            self.config.peak_force * (PI * x).sin().powi(2)
        }
    }

    /// Next uncorrected reading and its offset from the start of sampling.
    fn next_raw(&mut self) -> (f64, f64) {
        let t = self.sample_index as f64 / f64::from(self.rate_hz.max(1));
        self.sample_index += 1;
        let raw = self.config.zero_offset + self.squeeze_force(t) + self.rng.noise(self.config.noise);
        (raw, t)
    }
}

#[async_trait]
impl GdxDevice for MockDynamometer {
    async fn connect(&mut self) -> Result<(), DriverError> {
        self.error_config.check_operation(DRIVER_TYPE, "connect")?;
        if self.config.mode == MockMode::Realistic {
            tokio::time::sleep(self.timing.connect_delay()).await;
        }

        if !self.config.devices.is_empty() && !self.config.devices.contains(&self.name) {
            return Err(self.error(
                DriverErrorKind::Initialization,
                format!("no Go Direct device matching '{}' responded", self.name),
            ));
        }

        if self.link == LinkState::Closed {
            self.link = LinkState::Connected;
            self.activity.connects.fetch_add(1, Ordering::SeqCst);
            tracing::trace!(device = %self.name, "Simulated device connected");
        }
        Ok(())
    }

    async fn device_info(&mut self) -> Result<DeviceInfo, DriverError> {
        if self.link == LinkState::Closed {
            return Err(self.error(DriverErrorKind::InvalidState, "device is not connected"));
        }
        self.command_latency().await;

        let serial_number = self
            .name
            .split_whitespace()
            .last()
            .filter(|token| *token != "GDX-HD")
            .unwrap_or("00000000")
            .to_string();

        Ok(DeviceInfo {
            name: self.name.clone(),
            order_code: "GDX-HD".to_string(),
            serial_number,
            firmware: "1.30".to_string(),
            battery_percent: Some(self.rng.gen_range(60..=100)),
        })
    }

    async fn select_sensors(&mut self, sensors: &[u32]) -> Result<(), DriverError> {
        self.require(LinkState::Connected, "select_sensors")?;
        self.error_config.check_operation(DRIVER_TYPE, "select_sensors")?;
        self.command_latency().await;

        if sensors.is_empty() {
            return Err(self.error(DriverErrorKind::InvalidParameter, "no sensor given"));
        }
        if let Some(bad) = sensors
            .iter()
            .find(|n| !GDX_HD_SENSORS.iter().any(|(num, _, _)| num == *n))
        {
            return Err(self.error(
                DriverErrorKind::InvalidParameter,
                format!("sensor {} is not available on GDX-HD (available: 1)", bad),
            ));
        }

        self.selected = sensors.to_vec();
        Ok(())
    }

    async fn enabled_sensor_info(&mut self) -> Result<Vec<SensorInfo>, DriverError> {
        Ok(GDX_HD_SENSORS
            .iter()
            .filter(|(num, _, _)| self.selected.contains(num))
            .map(|(num, description, units)| SensorInfo {
                number: *num,
                description: (*description).to_string(),
                units: (*units).to_string(),
            })
            .collect())
    }

    async fn start(&mut self, sampling_rate_hz: u32) -> Result<(), DriverError> {
        self.require(LinkState::Connected, "start")?;
        if self.selected.is_empty() {
            return Err(self.error(
                DriverErrorKind::InvalidState,
                "select a sensor before starting",
            ));
        }
        self.error_config.check_operation(DRIVER_TYPE, "start")?;

        if sampling_rate_hz == 0 || sampling_rate_hz > GDX_HD_MAX_RATE_HZ {
            return Err(self.error(
                DriverErrorKind::InvalidParameter,
                format!(
                    "sampling rate {} Hz outside 1..={} Hz",
                    sampling_rate_hz, GDX_HD_MAX_RATE_HZ
                ),
            ));
        }
        self.command_latency().await;

        self.rate_hz = sampling_rate_hz;
        self.sample_index = 0;
        self.started_at = Utc::now();
        if self.config.mode == MockMode::Realistic {
            let mut ticker =
                tokio::time::interval(Duration::from_secs_f64(1.0 / f64::from(sampling_rate_hz)));
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            self.ticker = Some(ticker);
        }
        self.link = LinkState::Sampling;
        Ok(())
    }

    async fn calibrate(&mut self, duration: Duration) -> Result<f64, DriverError> {
        self.require(LinkState::Sampling, "calibrate")?;
        self.error_config.check_operation(DRIVER_TYPE, "calibrate")?;

        // The window is wall-clock time regardless of pacing mode.
        tokio::time::sleep(duration).await;
        if let Some(ticker) = self.ticker.as_mut() {
            ticker.reset();
        }

        // The hand rests while zeroing, so only offset and noise are averaged.
        let window = (duration.as_secs_f64() * f64::from(self.rate_hz)).round() as u64;
        let count = window.clamp(1, MAX_CALIBRATION_SAMPLES);
        let sum: f64 = (0..count)
            .map(|_| self.config.zero_offset + self.rng.noise(self.config.noise))
            .sum();
        self.sample_index = self.sample_index.saturating_add(window.max(1));

        self.baseline = sum / count as f64;
        Ok(self.baseline)
    }

    async fn read(&mut self) -> Result<Option<RawSample>, DriverError> {
        self.require(LinkState::Sampling, "read")?;
        if self
            .config
            .max_samples
            .is_some_and(|max| self.emitted >= max)
        {
            return Ok(None);
        }
        self.error_config.check_operation(DRIVER_TYPE, "read")?;

        if let Some(ticker) = self.ticker.as_mut() {
            ticker.tick().await;
        }

        let (raw, t) = self.next_raw();
        self.emitted += 1;
        self.activity.samples.fetch_add(1, Ordering::SeqCst);

        let offset = chrono::Duration::microseconds((t * 1e6) as i64);
        Ok(Some(RawSample {
            force: raw - self.baseline,
            timestamp: self.started_at + offset,
        }))
    }

    async fn close(&mut self) -> Result<(), DriverError> {
        self.activity.closes.fetch_add(1, Ordering::SeqCst);
        let was_open = self.link != LinkState::Closed;
        self.link = LinkState::Closed;
        self.selected.clear();
        self.ticker = None;
        if was_open {
            self.error_config.check_operation(DRIVER_TYPE, "close")?;
        }
        Ok(())
    }
}
