//! Link latencies for realistic mode.

use std::time::Duration;

/// Latencies a simulated Go Direct link adds to commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TimingConfig {
    /// Time to enumerate and open the device, in milliseconds
    pub connect_delay_ms: u64,
    /// Round trip of a configuration command, in milliseconds
    pub command_delay_ms: u64,
}

impl TimingConfig {
    /// Wired USB connection
    pub fn usb() -> Self {
        Self {
            connect_delay_ms: 150,
            command_delay_ms: 5,
        }
    }

    /// Bluetooth Low Energy connection (discovery scan dominates)
    pub fn ble() -> Self {
        Self {
            connect_delay_ms: 2500,
            command_delay_ms: 30,
        }
    }

    /// Connect latency as a duration
    pub fn connect_delay(&self) -> Duration {
        Duration::from_millis(self.connect_delay_ms)
    }

    /// Command latency as a duration
    pub fn command_delay(&self) -> Duration {
        Duration::from_millis(self.command_delay_ms)
    }
}
