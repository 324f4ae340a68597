//! Simulated Go Direct devices for running the node without hardware.

pub mod common;
pub mod dynamometer;

pub use common::{ErrorConfig, ErrorScenario, MockMode, MockRng, TimingConfig};
pub use dynamometer::{
    DeviceActivity, MockDriverConfig, MockDynamometer, MockDynamometerDriver, DRIVER_TYPE,
    GDX_HD_MAX_RATE_HZ,
};
