//! Device backends.
//!
//! Backends are selected by the `driver` parameter. Only the simulated
//! GDX-HD ships with the node; a hardware backend plugs in by implementing
//! [`DeviceDriver`](crate::device::DeviceDriver) and adding an arm to
//! [`from_params`].

pub mod mock;

use crate::config::NodeParameters;
use crate::device::DeviceDriver;
use crate::error::ConfigError;
use std::sync::Arc;

/// Names accepted by the `driver` parameter.
pub const AVAILABLE_DRIVERS: &[&str] = &["mock"];

/// Build the backend named by `params.driver`.
pub fn from_params(params: &NodeParameters) -> Result<Arc<dyn DeviceDriver>, ConfigError> {
    match params.driver.as_str() {
        "mock" => Ok(Arc::new(mock::MockDynamometerDriver::new(params.mock.clone()))),
        other => Err(ConfigError::UnknownDriver(other.to_string())),
    }
}
