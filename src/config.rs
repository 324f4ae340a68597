//! Parameter loading and resolution using Figment
//!
//! Parameters are layered, later sources overriding earlier ones:
//! 1. Built-in defaults (serde defaults below)
//! 2. A TOML parameter file (`config/godirect.toml` unless `--config` is given)
//! 3. Environment variables prefixed with `GODIRECT_` (nested keys use `__`,
//!    e.g. `GODIRECT_LOGGING__LEVEL=info`)
//! 4. Command-line overrides
//!
//! Loading produces [`NodeParameters`], a loose view of the store where
//! `device_name` may still be missing. [`AcquisitionConfig::resolve`] turns it
//! into the immutable, validated value the controller runs with.
//!
//! # Example
//! ```no_run
//! use godirect_publisher::config::{AcquisitionConfig, NodeParameters, ParameterOverrides};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let params = NodeParameters::load(None, &ParameterOverrides::default())?;
//! let config = AcquisitionConfig::resolve(&params)?;
//! println!("Streaming from {}", config.device_name);
//! # Ok(())
//! # }
//! ```

use crate::data::MeasurementType;
use crate::drivers::mock::MockDriverConfig;
use crate::error::ConfigError;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Parameter file read when no explicit path is given.
pub const DEFAULT_CONFIG_PATH: &str = "config/godirect.toml";

/// Environment variable prefix.
pub const ENV_PREFIX: &str = "GODIRECT_";

/// Hardware ceiling of the GDX-HD sampling rate.
pub const MAX_SAMPLING_RATE_HZ: u32 = 1000;

/// Topic the force samples are published on.
pub const DEFAULT_TOPIC: &str = "grip_force_stream";

/// Raw parameter set as read from the parameter store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeParameters {
    /// Dynamometer name and ID (required)
    #[serde(default)]
    pub device_name: Option<String>,
    /// Sensor channel to sample (1 = Force)
    #[serde(default = "default_selected_sensor")]
    pub selected_sensor: u32,
    /// Tag applied to published samples
    #[serde(default)]
    pub measurement_type: MeasurementType,
    /// Sampling rate in Hz
    #[serde(default = "default_sampling_rate")]
    pub sampling_rate: u32,
    /// Zero-baseline window in seconds
    #[serde(default = "default_calibrate_signal")]
    pub calibrate_signal: f64,
    /// Publisher queue bound
    #[serde(default = "default_queue_size")]
    pub queue_size: usize,
    /// Output topic name
    #[serde(default = "default_topic")]
    pub topic: String,
    /// Device backend (`mock`)
    #[serde(default = "default_driver")]
    pub driver: String,
    /// Logging settings
    #[serde(default)]
    pub logging: LoggingParameters,
    /// Settings for the simulated device backend
    #[serde(default)]
    pub mock: MockDriverConfig,
}

/// Logging section of the parameter store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingParameters {
    /// Logging level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Output format (pretty, compact, json)
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LoggingParameters {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

// Default value functions
fn default_selected_sensor() -> u32 {
    1
}

fn default_sampling_rate() -> u32 {
    50
}

fn default_calibrate_signal() -> f64 {
    0.5
}

fn default_queue_size() -> usize {
    10
}

fn default_topic() -> String {
    DEFAULT_TOPIC.to_string()
}

fn default_driver() -> String {
    "mock".to_string()
}

fn default_log_level() -> String {
    "debug".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for NodeParameters {
    fn default() -> Self {
        Self {
            device_name: None,
            selected_sensor: default_selected_sensor(),
            measurement_type: MeasurementType::default(),
            sampling_rate: default_sampling_rate(),
            calibrate_signal: default_calibrate_signal(),
            queue_size: default_queue_size(),
            topic: default_topic(),
            driver: default_driver(),
            logging: LoggingParameters::default(),
            mock: MockDriverConfig::default(),
        }
    }
}

/// Values given on the command line. Unset fields leave the store untouched.
#[derive(Debug, Clone, Default, Serialize)]
#[allow(missing_docs)]
pub struct ParameterOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub selected_sensor: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub measurement_type: Option<MeasurementType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sampling_rate: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub calibrate_signal: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub queue_size: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub driver: Option<String>,
    #[serde(skip_serializing_if = "LoggingOverrides::is_empty")]
    pub logging: LoggingOverrides,
}

/// Command-line overrides of the logging section.
#[derive(Debug, Clone, Default, Serialize)]
#[allow(missing_docs)]
pub struct LoggingOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub level: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
}

impl LoggingOverrides {
    fn is_empty(&self) -> bool {
        self.level.is_none() && self.format.is_none()
    }
}

impl NodeParameters {
    /// Load parameters from file, environment and command-line overrides.
    ///
    /// An explicit `path` must exist; the default path is optional.
    pub fn load(path: Option<&Path>, overrides: &ParameterOverrides) -> Result<Self, ConfigError> {
        let file: PathBuf = match path {
            Some(p) if !p.exists() => return Err(ConfigError::FileNotFound(p.to_path_buf())),
            Some(p) => p.to_path_buf(),
            None => PathBuf::from(DEFAULT_CONFIG_PATH),
        };

        let params = Self::figment(&file)
            .merge(Serialized::defaults(overrides))
            .extract()?;
        Ok(params)
    }

    /// Figment with the file and environment layers, without overrides.
    pub fn figment(file: &Path) -> Figment {
        Figment::new()
            .merge(Toml::file(file))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
    }
}

/// Immutable acquisition settings, resolved once at startup.
#[derive(Debug, Clone, PartialEq)]
pub struct AcquisitionConfig {
    /// Target device identity.
    pub device_name: String,
    /// Sensor channel to activate.
    pub selected_sensor: u32,
    /// Tag applied to every published sample.
    pub measurement_type: MeasurementType,
    /// Acquisition rate in Hz.
    pub sampling_rate: u32,
    /// Zero-baseline window.
    pub calibration_duration: Duration,
    /// Backpressure bound of the publishing sink.
    pub publish_queue_size: usize,
}

impl AcquisitionConfig {
    /// Config for `device_name` with every other option at its default.
    pub fn new(device_name: impl Into<String>) -> Self {
        Self {
            device_name: device_name.into(),
            selected_sensor: default_selected_sensor(),
            measurement_type: MeasurementType::default(),
            sampling_rate: default_sampling_rate(),
            calibration_duration: Duration::from_millis(500),
            publish_queue_size: default_queue_size(),
        }
    }

    /// Set the sensor channel.
    pub fn with_sensor(mut self, sensor: u32) -> Self {
        self.selected_sensor = sensor;
        self
    }

    /// Set the measurement tag.
    pub fn with_measurement_type(mut self, measurement_type: MeasurementType) -> Self {
        self.measurement_type = measurement_type;
        self
    }

    /// Set the sampling rate.
    pub fn with_sampling_rate(mut self, rate_hz: u32) -> Self {
        self.sampling_rate = rate_hz;
        self
    }

    /// Set the calibration window.
    pub fn with_calibration(mut self, duration: Duration) -> Self {
        self.calibration_duration = duration;
        self
    }

    /// Set the publisher queue bound.
    pub fn with_queue_size(mut self, queue_size: usize) -> Self {
        self.publish_queue_size = queue_size;
        self
    }

    /// Resolve and validate the loaded parameters.
    ///
    /// Fails with [`ConfigError::MissingParameter`] when `device_name` is
    /// absent or blank; no device is touched before this succeeds.
    pub fn resolve(params: &NodeParameters) -> Result<Self, ConfigError> {
        let device_name = params
            .device_name
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .ok_or(ConfigError::MissingParameter("device_name"))?;

        if !params.calibrate_signal.is_finite() || params.calibrate_signal < 0.0 {
            return Err(ConfigError::InvalidParameter {
                name: "calibrate_signal",
                reason: format!(
                    "must be a non-negative number of seconds (got {})",
                    params.calibrate_signal
                ),
            });
        }

        let calibration_duration = Duration::try_from_secs_f64(params.calibrate_signal)
            .map_err(|e| ConfigError::InvalidParameter {
                name: "calibrate_signal",
                reason: e.to_string(),
            })?;

        let config = Self {
            device_name: device_name.to_string(),
            selected_sensor: params.selected_sensor,
            measurement_type: params.measurement_type,
            sampling_rate: params.sampling_rate,
            calibration_duration,
            publish_queue_size: params.queue_size,
        };
        config.validate()?;
        Ok(config)
    }

    /// Check ranges. Called by [`Self::resolve`].
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.selected_sensor == 0 {
            return Err(ConfigError::InvalidParameter {
                name: "selected_sensor",
                reason: "sensor channels are numbered from 1".into(),
            });
        }

        if self.sampling_rate == 0 || self.sampling_rate > MAX_SAMPLING_RATE_HZ {
            return Err(ConfigError::InvalidParameter {
                name: "sampling_rate",
                reason: format!(
                    "must be between 1 and {} Hz (got {})",
                    MAX_SAMPLING_RATE_HZ, self.sampling_rate
                ),
            });
        }

        if self.publish_queue_size == 0 {
            return Err(ConfigError::InvalidParameter {
                name: "queue_size",
                reason: "must hold at least one message".into(),
            });
        }

        let period = Duration::from_secs_f64(1.0 / f64::from(self.sampling_rate));
        if self.calibration_duration < period {
            tracing::warn!(
                calibration = ?self.calibration_duration,
                period = ?period,
                "Calibration window is shorter than one sample period; baseline will use a single sample"
            );
        }

        Ok(())
    }

    /// Sample period at the configured rate.
    pub fn sample_period(&self) -> Duration {
        Duration::from_secs_f64(1.0 / f64::from(self.sampling_rate.max(1)))
    }
}
