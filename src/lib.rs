//! # Go Direct force publisher
//!
//! Acquires grip or pinch force from a Vernier Go Direct Hand Dynamometer
//! (GDX-HD) and republishes every sample on a named topic.
//!
//! ## Crate Structure
//!
//! - **`config`**: parameter loading (defaults, TOML file, `GODIRECT_*`
//!   environment, CLI overrides) and resolution into an immutable
//!   [`AcquisitionConfig`].
//! - **`controller`**: the acquisition lifecycle: connect, describe, select,
//!   start, calibrate, stream, release.
//! - **`data`**: device descriptions and the [`GripForce`] message.
//! - **`device`**: the [`GdxDevice`]/[`DeviceDriver`] seam and the
//!   [`DeviceSession`] scope guard.
//! - **`drivers`**: device backends; currently a simulated GDX-HD.
//! - **`error`**: error types for drivers, parameters, publishing and the
//!   lifecycle.
//! - **`publisher`**: the [`PublishSink`] seam and the broadcast topic.
//! - **`telemetry`**: `tracing` subscriber setup.

pub mod config;
pub mod controller;
pub mod data;
pub mod device;
pub mod drivers;
pub mod error;
pub mod publisher;
pub mod telemetry;

pub use config::{AcquisitionConfig, NodeParameters, ParameterOverrides};
pub use controller::{
    run_acquisition, run_with_params, AcquisitionOutcome, AcquisitionState, StopReason,
};
pub use data::{GripForce, MeasurementType};
pub use device::{DeviceDriver, DeviceSession, GdxDevice};
pub use error::{AcquisitionError, ConfigError, DriverError, DriverErrorKind, PublishError};
pub use publisher::{PublishSink, TopicPublisher};
