//! Value types exchanged between the device, the controller and the topic.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Kind of hand measurement a sample belongs to.
///
/// The device cannot tell a grip from a pinch; the tag comes from
/// configuration and is copied onto every published message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MeasurementType {
    /// Whole-hand grip.
    #[default]
    Grip,
    /// Finger pinch.
    Pinch,
}

impl MeasurementType {
    /// Lowercase label used on the wire and in parameters.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Grip => "grip",
            Self::Pinch => "pinch",
        }
    }
}

impl fmt::Display for MeasurementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MeasurementType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "grip" => Ok(Self::Grip),
            "pinch" => Ok(Self::Pinch),
            other => Err(format!(
                "unknown measurement type '{}'. Must be one of: grip, pinch",
                other
            )),
        }
    }
}

/// Identity reported by a connected device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceInfo {
    /// Advertised name, e.g. `GDX-HD 15T10012`.
    pub name: String,
    /// Order code / model, e.g. `GDX-HD`.
    pub order_code: String,
    /// Serial number.
    pub serial_number: String,
    /// Firmware version string.
    pub firmware: String,
    /// Battery charge in percent, if the device reports it.
    pub battery_percent: Option<u8>,
}

/// Description of one sensor channel on a device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorInfo {
    /// Channel number as used by `select_sensors`.
    pub number: u32,
    /// Human-readable description (e.g. `Force`).
    pub description: String,
    /// Measurement units (e.g. `N`).
    pub units: String,
}

/// One zero-corrected reading as produced by the device.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RawSample {
    /// Force in newtons, baseline already subtracted.
    pub force: f64,
    /// Acquisition time.
    pub timestamp: DateTime<Utc>,
}

/// Message published on the grip force topic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GripForce {
    /// Per-session sequence number, starting at 0.
    pub seq: u64,
    /// Acquisition time.
    pub stamp: DateTime<Utc>,
    /// Force in newtons.
    pub force: f64,
    /// Configured measurement tag.
    pub measurement_type: MeasurementType,
}

impl GripForce {
    /// Build the message for the `seq`-th sample of a session.
    pub fn from_sample(seq: u64, sample: RawSample, measurement_type: MeasurementType) -> Self {
        Self {
            seq,
            stamp: sample.timestamp,
            force: sample.force,
            measurement_type,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_measurement_type_parse() {
        assert_eq!("grip".parse::<MeasurementType>(), Ok(MeasurementType::Grip));
        assert_eq!(" Pinch ".parse::<MeasurementType>(), Ok(MeasurementType::Pinch));
        assert!("squeeze".parse::<MeasurementType>().is_err());
    }

    #[test]
    fn test_grip_force_wire_format() {
        let sample = RawSample {
            force: 12.5,
            timestamp: DateTime::<Utc>::UNIX_EPOCH,
        };
        let msg = GripForce::from_sample(3, sample, MeasurementType::Pinch);
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["seq"], 3);
        assert_eq!(json["force"], 12.5);
        assert_eq!(json["measurement_type"], "pinch");
    }
}
