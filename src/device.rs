//! Device driver seam and scoped device ownership.
//!
//! A backend implements two traits:
//!
//! - [`DeviceDriver`]: the factory. `open()` hands out a [`GdxDevice`] for a
//!   device name without doing any I/O, so a handle exists (and can be
//!   released) even when the connect step itself fails.
//! - [`GdxDevice`]: one exclusive connection. Methods map one-to-one onto the
//!   lifecycle steps: connect, describe, select, describe sensors, start,
//!   calibrate, read, close.
//!
//! [`DeviceSession`] is the scope guard around a handle. The controller calls
//! [`DeviceSession::release`] on its single exit path; if the session is
//! dropped without being released (the owning future was cancelled or
//! panicked), `Drop` schedules the close on the current tokio runtime.
//!
//! ```text
//! DeviceDriver::open(name) ──▶ DeviceSession ──▶ connect … read … ──▶ release() ──▶ close()
//!                                    │
//!                                    └── Drop (not released) ──▶ spawned close()
//! ```

use crate::data::{DeviceInfo, RawSample, SensorInfo};
use crate::error::DriverError;
use async_trait::async_trait;
use std::time::Duration;

/// Boxed device handle as produced by [`DeviceDriver::open`].
pub type DeviceHandle = Box<dyn GdxDevice>;

/// One exclusive connection to a Go Direct device.
///
/// # Contract
/// - `connect` must succeed before any other operation except `close`
/// - `select_sensors` must precede `start`
/// - `read` returns `Ok(None)` once the device has ended its stream
/// - `close` is idempotent and valid in every state
#[async_trait]
pub trait GdxDevice: Send {
    /// Open the connection to the named device.
    async fn connect(&mut self) -> Result<(), DriverError>;

    /// Identity of the connected device.
    async fn device_info(&mut self) -> Result<DeviceInfo, DriverError>;

    /// Activate the given sensor channels.
    async fn select_sensors(&mut self, sensors: &[u32]) -> Result<(), DriverError>;

    /// Description of the currently enabled channels.
    async fn enabled_sensor_info(&mut self) -> Result<Vec<SensorInfo>, DriverError>;

    /// Begin continuous acquisition at `sampling_rate_hz`.
    async fn start(&mut self, sampling_rate_hz: u32) -> Result<(), DriverError>;

    /// Consume `duration` worth of signal as zero baseline.
    ///
    /// Returns the baseline in sensor units. Later reads are corrected by it.
    async fn calibrate(&mut self, duration: Duration) -> Result<f64, DriverError>;

    /// Block until the next sample is ready.
    async fn read(&mut self) -> Result<Option<RawSample>, DriverError>;

    /// Stop acquisition and disconnect.
    async fn close(&mut self) -> Result<(), DriverError>;
}

/// Factory for device handles.
pub trait DeviceDriver: Send + Sync {
    /// Short identifier used in logs and errors (e.g. `mock_gdx_hd`).
    fn driver_type(&self) -> &'static str;

    /// Create an unconnected handle for `device_name`. Performs no I/O.
    fn open(&self, device_name: &str) -> DeviceHandle;
}

/// Scope guard owning one device handle for one acquisition session.
pub struct DeviceSession {
    device_name: String,
    driver_type: &'static str,
    device: Option<DeviceHandle>,
}

impl DeviceSession {
    /// Enter the device scope.
    pub fn open(driver: &dyn DeviceDriver, device_name: &str) -> Self {
        tracing::debug!(
            device = device_name,
            driver = driver.driver_type(),
            "Opening device handle"
        );
        Self {
            device_name: device_name.to_string(),
            driver_type: driver.driver_type(),
            device: Some(driver.open(device_name)),
        }
    }

    /// Name the session was opened for.
    pub fn device_name(&self) -> &str {
        &self.device_name
    }

    /// Driver type of the underlying handle.
    pub fn driver_type(&self) -> &'static str {
        self.driver_type
    }

    /// Access the handle. `None` only after release.
    pub fn device(&mut self) -> Option<&mut DeviceHandle> {
        self.device.as_mut()
    }

    /// Leave the scope: close the device exactly once.
    ///
    /// Close failures are logged and swallowed; the session is over either way.
    pub async fn release(mut self) {
        if let Some(mut device) = self.device.take() {
            match device.close().await {
                Ok(()) => tracing::debug!(device = %self.device_name, "Device released"),
                Err(e) => tracing::warn!(
                    device = %self.device_name,
                    error = %e,
                    "Device close reported an error"
                ),
            }
        }
    }
}

impl Drop for DeviceSession {
    fn drop(&mut self) {
        let Some(mut device) = self.device.take() else {
            return;
        };
        let name = std::mem::take(&mut self.device_name);
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                tracing::warn!(device = %name, "Device session dropped without release; closing in background");
                handle.spawn(async move {
                    if let Err(e) = device.close().await {
                        tracing::warn!(device = %name, error = %e, "Background device close failed");
                    }
                });
            }
            Err(_) => {
                tracing::error!(device = %name, "Device session dropped outside a runtime; handle leaked");
            }
        }
    }
}

impl std::fmt::Debug for DeviceSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceSession")
            .field("device_name", &self.device_name)
            .field("driver_type", &self.driver_type)
            .field("released", &self.device.is_none())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    struct CountingDevice {
        closes: Arc<AtomicU32>,
    }

    #[async_trait]
    impl GdxDevice for CountingDevice {
        async fn connect(&mut self) -> Result<(), DriverError> {
            Ok(())
        }
        async fn device_info(&mut self) -> Result<DeviceInfo, DriverError> {
            unreachable!()
        }
        async fn select_sensors(&mut self, _sensors: &[u32]) -> Result<(), DriverError> {
            Ok(())
        }
        async fn enabled_sensor_info(&mut self) -> Result<Vec<SensorInfo>, DriverError> {
            Ok(Vec::new())
        }
        async fn start(&mut self, _rate: u32) -> Result<(), DriverError> {
            Ok(())
        }
        async fn calibrate(&mut self, _duration: Duration) -> Result<f64, DriverError> {
            Ok(0.0)
        }
        async fn read(&mut self) -> Result<Option<RawSample>, DriverError> {
            Ok(None)
        }
        async fn close(&mut self) -> Result<(), DriverError> {
            self.closes.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    struct CountingDriver {
        closes: Arc<AtomicU32>,
    }

    impl DeviceDriver for CountingDriver {
        fn driver_type(&self) -> &'static str {
            "counting"
        }
        fn open(&self, _device_name: &str) -> DeviceHandle {
            Box::new(CountingDevice {
                closes: self.closes.clone(),
            })
        }
    }

    #[tokio::test]
    async fn test_release_closes_once() {
        let closes = Arc::new(AtomicU32::new(0));
        let driver = CountingDriver {
            closes: closes.clone(),
        };

        let mut session = DeviceSession::open(&driver, "GDX-HD 1A");
        assert_eq!(session.device_name(), "GDX-HD 1A");
        assert!(session.device().is_some());
        session.release().await;

        assert_eq!(closes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_drop_without_release_closes_in_background() {
        let closes = Arc::new(AtomicU32::new(0));
        let driver = CountingDriver {
            closes: closes.clone(),
        };

        drop(DeviceSession::open(&driver, "GDX-HD 1A"));
        for _ in 0..3 {
            tokio::task::yield_now().await;
        }

        assert_eq!(closes.load(Ordering::SeqCst), 1);
    }
}
