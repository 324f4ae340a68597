//! Integration tests for the acquisition lifecycle.
//!
//! A scripted device records every call it receives, so these tests can check
//! step ordering, abort points and release counts without the simulator's
//! signal model getting in the way.

use async_trait::async_trait;
use chrono::Utc;
use godirect_publisher::config::{AcquisitionConfig, NodeParameters};
use godirect_publisher::controller::{
    run_acquisition, run_with_params, AcquisitionState, StopReason,
};
use godirect_publisher::data::{DeviceInfo, GripForce, MeasurementType, RawSample, SensorInfo};
use godirect_publisher::device::{DeviceDriver, DeviceHandle, GdxDevice};
use godirect_publisher::error::{
    AcquisitionError, ConfigError, DriverError, DriverErrorKind, PublishError,
};
use godirect_publisher::publisher::PublishSink;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

// =============================================================================
// Scripted device
// =============================================================================

#[derive(Clone, Default)]
struct Script {
    /// Operation that fails, if any
    fail_at: Option<&'static str>,
    /// Kind reported by the failing operation
    fail_kind: Option<DriverErrorKind>,
    /// Samples before the stream ends; `None` streams forever
    samples: Option<u64>,
}

#[derive(Default)]
struct Recorder {
    calls: Mutex<Vec<&'static str>>,
    opens: AtomicU32,
}

impl Recorder {
    fn calls(&self) -> Vec<&'static str> {
        self.calls.lock().clone()
    }

    fn count(&self, op: &str) -> usize {
        self.calls.lock().iter().filter(|c| **c == op).count()
    }
}

struct ScriptedDevice {
    script: Script,
    recorder: Arc<Recorder>,
    emitted: u64,
}

impl ScriptedDevice {
    fn step(&self, op: &'static str) -> Result<(), DriverError> {
        self.recorder.calls.lock().push(op);
        if self.script.fail_at == Some(op) {
            let kind = self.script.fail_kind.unwrap_or(DriverErrorKind::Hardware);
            return Err(DriverError::new("scripted", kind, format!("{} failed", op)));
        }
        Ok(())
    }
}

#[async_trait]
impl GdxDevice for ScriptedDevice {
    async fn connect(&mut self) -> Result<(), DriverError> {
        self.step("connect")
    }

    async fn device_info(&mut self) -> Result<DeviceInfo, DriverError> {
        self.step("device_info")?;
        Ok(DeviceInfo {
            name: "GDX-HD 1A".into(),
            order_code: "GDX-HD".into(),
            serial_number: "1A".into(),
            firmware: "1.30".into(),
            battery_percent: None,
        })
    }

    async fn select_sensors(&mut self, _sensors: &[u32]) -> Result<(), DriverError> {
        self.step("select_sensors")
    }

    async fn enabled_sensor_info(&mut self) -> Result<Vec<SensorInfo>, DriverError> {
        self.step("enabled_sensor_info")?;
        Ok(vec![SensorInfo {
            number: 1,
            description: "Force".into(),
            units: "N".into(),
        }])
    }

    async fn start(&mut self, _rate: u32) -> Result<(), DriverError> {
        self.step("start")
    }

    async fn calibrate(&mut self, duration: Duration) -> Result<f64, DriverError> {
        self.step("calibrate")?;
        tokio::time::sleep(duration).await;
        Ok(0.0)
    }

    async fn read(&mut self) -> Result<Option<RawSample>, DriverError> {
        if self.script.samples.is_some_and(|max| self.emitted >= max) {
            return Ok(None);
        }
        self.step("read")?;
        tokio::time::sleep(Duration::from_millis(10)).await;
        self.emitted += 1;
        Ok(Some(RawSample {
            force: self.emitted as f64,
            timestamp: Utc::now(),
        }))
    }

    async fn close(&mut self) -> Result<(), DriverError> {
        self.recorder.calls.lock().push("close");
        Ok(())
    }
}

struct ScriptedDriver {
    script: Script,
    recorder: Arc<Recorder>,
}

impl ScriptedDriver {
    fn new(script: Script) -> Self {
        Self {
            script,
            recorder: Arc::new(Recorder::default()),
        }
    }
}

impl DeviceDriver for ScriptedDriver {
    fn driver_type(&self) -> &'static str {
        "scripted"
    }

    fn open(&self, _device_name: &str) -> DeviceHandle {
        self.recorder.opens.fetch_add(1, Ordering::SeqCst);
        Box::new(ScriptedDevice {
            script: self.script.clone(),
            recorder: self.recorder.clone(),
            emitted: 0,
        })
    }
}

// =============================================================================
// Recording sink
// =============================================================================

struct RecordingSink {
    messages: Mutex<Vec<GripForce>>,
    published: watch::Sender<u64>,
}

impl RecordingSink {
    fn new() -> Self {
        let (published, _) = watch::channel(0);
        Self {
            messages: Mutex::new(Vec::new()),
            published,
        }
    }

    fn messages(&self) -> Vec<GripForce> {
        self.messages.lock().clone()
    }
}

impl PublishSink for RecordingSink {
    fn topic(&self) -> &str {
        "grip_force_stream"
    }

    fn publish(&self, message: GripForce) -> Result<(), PublishError> {
        let mut messages = self.messages.lock();
        messages.push(message);
        self.published.send_replace(messages.len() as u64);
        Ok(())
    }
}

fn config() -> AcquisitionConfig {
    AcquisitionConfig::new("GDX-HD 1A").with_calibration(Duration::from_millis(200))
}

// =============================================================================
// Tests
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_steps_run_in_order() {
    let driver = ScriptedDriver::new(Script {
        samples: Some(2),
        ..Default::default()
    });
    let sink = RecordingSink::new();

    let outcome = run_acquisition(&config(), &driver, &sink, std::future::pending())
        .await
        .unwrap();

    assert_eq!(outcome.reason, StopReason::StreamEnded);
    assert_eq!(
        driver.recorder.calls(),
        vec![
            "connect",
            "device_info",
            "select_sensors",
            "enabled_sensor_info",
            "start",
            "calibrate",
            "read",
            "read",
            "close",
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn test_samples_published_in_order_with_tag() {
    let driver = ScriptedDriver::new(Script {
        samples: Some(20),
        ..Default::default()
    });
    let sink = RecordingSink::new();
    let config = config().with_measurement_type(MeasurementType::Pinch);

    let outcome = run_acquisition(&config, &driver, &sink, std::future::pending())
        .await
        .unwrap();

    assert_eq!(outcome.published, 20);
    let messages = sink.messages();
    assert_eq!(messages.len(), 20);
    for (i, message) in messages.iter().enumerate() {
        assert_eq!(message.seq, i as u64);
        assert_eq!(message.force, (i + 1) as f64);
        assert_eq!(message.measurement_type, MeasurementType::Pinch);
    }
    assert_eq!(driver.recorder.count("close"), 1);
}

#[tokio::test(start_paused = true)]
async fn test_interrupt_while_streaming_releases_once() {
    let driver = ScriptedDriver::new(Script::default());
    let sink = RecordingSink::new();
    let mut published = sink.published.subscribe();

    let shutdown = async move {
        let _ = published.wait_for(|n| *n >= 5).await;
    };

    let outcome = run_acquisition(&config(), &driver, &sink, shutdown)
        .await
        .unwrap();

    assert_eq!(outcome.reason, StopReason::Interrupted);
    assert_eq!(outcome.last_state, AcquisitionState::Streaming);
    assert_eq!(outcome.published, 5);
    assert_eq!(driver.recorder.count("close"), 1);
    assert_eq!(driver.recorder.calls().last(), Some(&"close"));

    // Nothing is published once the session has ended
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(sink.messages().len(), 5);
}

#[tokio::test(start_paused = true)]
async fn test_interrupt_during_calibration_skips_streaming() {
    let driver = ScriptedDriver::new(Script::default());
    let sink = RecordingSink::new();
    let config = config().with_calibration(Duration::from_secs(10));

    let outcome = run_acquisition(
        &config,
        &driver,
        &sink,
        tokio::time::sleep(Duration::from_secs(1)),
    )
    .await
    .unwrap();

    assert_eq!(outcome.reason, StopReason::Interrupted);
    assert_eq!(outcome.last_state, AcquisitionState::Calibrating);
    assert_eq!(driver.recorder.count("read"), 0);
    assert_eq!(driver.recorder.count("close"), 1);
    assert!(sink.messages().is_empty());
}

async fn run_failing(
    op: &'static str,
    kind: DriverErrorKind,
) -> (ScriptedDriver, RecordingSink, AcquisitionError) {
    let driver = ScriptedDriver::new(Script {
        fail_at: Some(op),
        fail_kind: Some(kind),
        samples: Some(3),
    });
    let sink = RecordingSink::new();
    let err = run_acquisition(&config(), &driver, &sink, std::future::pending())
        .await
        .unwrap_err();
    (driver, sink, err)
}

#[tokio::test(start_paused = true)]
async fn test_connect_failure_aborts() {
    let (driver, sink, err) = run_failing("connect", DriverErrorKind::Initialization).await;

    assert!(matches!(err, AcquisitionError::DeviceNotFound { ref device, .. } if device == "GDX-HD 1A"));
    assert_eq!(driver.recorder.calls(), vec!["connect", "close"]);
    assert!(sink.messages().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_sensor_selection_failure_aborts() {
    let (driver, sink, err) = run_failing("select_sensors", DriverErrorKind::InvalidParameter).await;

    assert!(matches!(err, AcquisitionError::SensorSelection { sensor: 1, .. }));
    assert_eq!(driver.recorder.count("start"), 0);
    assert_eq!(driver.recorder.count("close"), 1);
    assert!(sink.messages().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_rejected_rate_is_unsupported_rate() {
    let (driver, sink, err) = run_failing("start", DriverErrorKind::InvalidParameter).await;

    assert!(matches!(err, AcquisitionError::UnsupportedRate { rate_hz: 50, .. }));
    assert_eq!(driver.recorder.count("calibrate"), 0);
    assert_eq!(driver.recorder.count("close"), 1);
    assert!(sink.messages().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_start_hardware_failure_is_device_error() {
    let (driver, _sink, err) = run_failing("start", DriverErrorKind::Hardware).await;

    assert!(matches!(err, AcquisitionError::Device { operation: "start", .. }));
    assert_eq!(driver.recorder.count("close"), 1);
}

#[tokio::test(start_paused = true)]
async fn test_calibration_failure_aborts_before_streaming() {
    let (driver, sink, err) = run_failing("calibrate", DriverErrorKind::Timeout).await;

    assert!(matches!(err, AcquisitionError::Calibration(_)));
    assert_eq!(driver.recorder.count("read"), 0);
    assert_eq!(driver.recorder.count("close"), 1);
    assert!(sink.messages().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_read_failure_is_terminal() {
    let (driver, sink, err) = run_failing("read", DriverErrorKind::Communication).await;

    match err {
        AcquisitionError::Read { published, source } => {
            assert_eq!(published, 0);
            assert_eq!(source.kind, DriverErrorKind::Communication);
        }
        other => panic!("expected read failure, got {:?}", other),
    }
    assert_eq!(driver.recorder.count("read"), 1);
    assert_eq!(driver.recorder.count("close"), 1);
    assert!(sink.messages().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_describe_failures_do_not_abort() {
    for op in ["device_info", "enabled_sensor_info"] {
        let driver = ScriptedDriver::new(Script {
            fail_at: Some(op),
            fail_kind: None,
            samples: Some(3),
        });
        let sink = RecordingSink::new();

        let outcome = run_acquisition(&config(), &driver, &sink, std::future::pending())
            .await
            .unwrap();

        assert_eq!(outcome.reason, StopReason::StreamEnded, "failing {}", op);
        assert_eq!(outcome.published, 3);
        assert_eq!(driver.recorder.count("close"), 1);
    }
}

#[tokio::test]
async fn test_missing_device_name_fails_before_any_device_io() {
    let driver = ScriptedDriver::new(Script::default());
    let sink = RecordingSink::new();
    let params = NodeParameters::default();

    let err = run_with_params(&params, &driver, &sink, std::future::pending())
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        AcquisitionError::Config(ConfigError::MissingParameter("device_name"))
    ));
    assert_eq!(driver.recorder.opens.load(Ordering::SeqCst), 0);
    assert!(driver.recorder.calls().is_empty());
    assert!(sink.messages().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_resolved_params_drive_the_session() {
    let driver = ScriptedDriver::new(Script {
        samples: Some(4),
        ..Default::default()
    });
    let sink = RecordingSink::new();
    let params = NodeParameters {
        device_name: Some("GDX-HD 1A".into()),
        measurement_type: MeasurementType::Pinch,
        calibrate_signal: 0.2,
        ..Default::default()
    };

    let outcome = run_with_params(&params, &driver, &sink, std::future::pending())
        .await
        .unwrap();

    assert_eq!(outcome.published, 4);
    assert_eq!(driver.recorder.opens.load(Ordering::SeqCst), 1);
    assert!(sink
        .messages()
        .iter()
        .all(|m| m.measurement_type == MeasurementType::Pinch));
}
