//! Shared infrastructure for simulated devices.
//!
//! - **mode**: pacing (Instant, Realistic)
//! - **timing**: link latencies applied in realistic mode
//! - **errors**: error injection framework
//! - **rng**: seeded random number generator

pub mod errors;
pub mod mode;
pub mod rng;
pub mod timing;

pub use errors::{ErrorConfig, ErrorScenario};
pub use mode::MockMode;
pub use rng::MockRng;
pub use timing::TimingConfig;
