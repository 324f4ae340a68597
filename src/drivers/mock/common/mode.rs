//! Operational modes for simulated devices.

use serde::{Deserialize, Serialize};

/// How a simulated device paces itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MockMode {
    /// Samples are produced as fast as they are read; no link latency.
    #[default]
    Instant,
    /// Samples are paced at the sampling rate and commands pay link latency.
    Realistic,
}
