//! Error types for the acquisition node.
//!
//! Errors are split by where they originate:
//!
//! - **[`DriverError`]**: raised by a device driver (connect, select, start,
//!   calibrate, read, close). Carries the driver type and a [`DriverErrorKind`]
//!   so callers can tell a timeout from a bad argument without string matching.
//! - **[`ConfigError`]**: parameter resolution failed before any device I/O.
//!   Always fatal for the process invocation.
//! - **[`PublishError`]**: the publishing sink refused a message.
//! - **[`AcquisitionError`]**: the lifecycle controller's error. Each variant
//!   names the lifecycle step that failed and wraps the underlying
//!   [`DriverError`] as its source; `Config` covers resolution failures
//!   when the controller is started from raw parameters.
//!
//! Interruption is not an error: it is reported through
//! [`crate::controller::StopReason::Interrupted`].

use thiserror::Error;

// =============================================================================
// Driver Errors
// =============================================================================

/// Category of a driver failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverErrorKind {
    /// No device answered, or the device refused the connection.
    Initialization,
    /// Link to the device was lost or a frame was corrupted.
    Communication,
    /// Error raised while closing the device.
    Shutdown,
    /// Device reported an internal fault.
    Hardware,
    /// Device did not answer in time.
    Timeout,
    /// An argument is outside what the device supports.
    InvalidParameter,
    /// Operation called out of order (e.g. read before start).
    InvalidState,
}

impl std::fmt::Display for DriverErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            DriverErrorKind::Initialization => "initialization",
            DriverErrorKind::Communication => "communication",
            DriverErrorKind::Shutdown => "shutdown",
            DriverErrorKind::Hardware => "hardware",
            DriverErrorKind::Timeout => "timeout",
            DriverErrorKind::InvalidParameter => "invalid_parameter",
            DriverErrorKind::InvalidState => "invalid_state",
        };
        write!(f, "{}", label)
    }
}

/// Failure reported by a device driver.
#[derive(Error, Debug, Clone)]
#[error("Driver '{driver_type}' {kind} error: {message}")]
pub struct DriverError {
    /// Driver that raised the error (e.g. `mock_gdx_hd`).
    pub driver_type: String,
    /// Failure category.
    pub kind: DriverErrorKind,
    /// Human-readable detail.
    pub message: String,
}

impl DriverError {
    /// Build a driver error.
    pub fn new(
        driver_type: impl Into<String>,
        kind: DriverErrorKind,
        message: impl Into<String>,
    ) -> Self {
        Self {
            driver_type: driver_type.into(),
            kind,
            message: message.into(),
        }
    }
}

// =============================================================================
// Configuration Errors
// =============================================================================

/// Parameter resolution failed.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The parameter store could not be read or a value had the wrong type.
    #[error("parameter lookup failed: {0}")]
    Lookup(#[from] Box<figment::Error>),

    /// An explicitly requested parameter file does not exist.
    #[error("parameter file '{}' not found", .0.display())]
    FileNotFound(std::path::PathBuf),

    /// A required parameter is absent.
    #[error("required parameter '{0}' is not set")]
    MissingParameter(&'static str),

    /// A parameter is present but outside its allowed range.
    #[error("invalid parameter '{name}': {reason}")]
    InvalidParameter {
        /// Parameter name as it appears in the parameter store.
        name: &'static str,
        /// Why the value was rejected.
        reason: String,
    },

    /// The configured driver name matches no known backend.
    #[error(
        "unknown device driver '{0}' (expected one of: {})",
        crate::drivers::AVAILABLE_DRIVERS.join(", ")
    )]
    UnknownDriver(String),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        ConfigError::Lookup(Box::new(err))
    }
}

// =============================================================================
// Publishing Errors
// =============================================================================

/// The publishing sink could not accept a message.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PublishError {
    /// Queue size must hold at least one message.
    #[error("queue_size must be at least 1 (got {0})")]
    InvalidQueueSize(usize),

    /// The topic was shut down.
    #[error("topic '{0}' is closed")]
    Closed(String),
}

// =============================================================================
// Acquisition Errors
// =============================================================================

/// Failure of one lifecycle step. Any of these aborts the session.
#[derive(Error, Debug)]
pub enum AcquisitionError {
    /// Step 1: no matching device responded.
    #[error("device '{device}' not found")]
    DeviceNotFound {
        /// Requested device name.
        device: String,
        /// Driver failure.
        #[source]
        source: DriverError,
    },

    /// Step 3: the sensor channel is not valid for this device.
    #[error("could not select sensor {sensor}")]
    SensorSelection {
        /// Requested sensor channel.
        sensor: u32,
        /// Driver failure.
        #[source]
        source: DriverError,
    },

    /// Step 5: the sampling rate exceeds what the device supports.
    #[error("sampling rate {rate_hz} Hz is not supported")]
    UnsupportedRate {
        /// Requested rate.
        rate_hz: u32,
        /// Driver failure.
        #[source]
        source: DriverError,
    },

    /// Step 6: the zero-baseline window could not be acquired.
    #[error("calibration failed")]
    Calibration(#[source] DriverError),

    /// Step 7: the device reported a terminal read failure.
    #[error("read failed after {published} samples")]
    Read {
        /// Samples published before the failure.
        published: u64,
        /// Driver failure.
        #[source]
        source: DriverError,
    },

    /// Any other device failure (e.g. start failing for a reason other than the rate).
    #[error("device operation '{operation}' failed")]
    Device {
        /// Operation name.
        operation: &'static str,
        /// Driver failure.
        #[source]
        source: DriverError,
    },

    /// The sink refused a sample.
    #[error("publishing failed")]
    Publish(#[from] PublishError),

    /// Parameters could not be resolved; no device was opened.
    #[error("parameter lookup failed")]
    Config(#[from] ConfigError),
}

/// Convenience alias for controller results.
pub type AcquisitionResult<T> = std::result::Result<T, AcquisitionError>;
