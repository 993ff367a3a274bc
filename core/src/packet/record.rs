use serde::{Deserialize, Serialize};
use std::fmt;

/// Sensor triple in the probe's native units.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vector3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vector3 {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }
}

/// One fully decoded telemetry packet.
///
/// Serialized field names follow the relay collector's schema
/// (`numpaq`, `lat`, `lng`, ..., `paracaidas`).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TelemetryRecord {
    #[serde(rename = "numpaq")]
    pub sequence: u64,
    #[serde(rename = "lat")]
    pub latitude: f64,
    #[serde(rename = "lng")]
    pub longitude: f64,
    #[serde(rename = "alt")]
    pub altitude: f64,
    #[serde(rename = "pres")]
    pub pressure: f64,
    #[serde(rename = "temp")]
    pub temperature: f64,
    #[serde(rename = "acel")]
    pub acceleration: Vector3,
    #[serde(rename = "giro")]
    pub angular_rate: Vector3,
    #[serde(rename = "mag")]
    pub magnetic_field: Vector3,
    #[serde(rename = "paracaidas")]
    pub parachute_deployed: bool,
}

impl TelemetryRecord {
    /// `(lat, lng)` in degrees, as consumed by the map view.
    pub fn position(&self) -> (f64, f64) {
        (self.latitude, self.longitude)
    }

    /// `(roll, pitch, yaw)` in degrees. The probe reports its attitude in the
    /// gyro triple, so the orientation view reads x/y/z straight from it.
    pub fn orientation(&self) -> (f64, f64, f64) {
        (
            self.angular_rate.x,
            self.angular_rate.y,
            self.angular_rate.z,
        )
    }
}

/// Formats the record back into its wire packet, e.g. `<12,19.5,...,true>`.
impl fmt::Display for TelemetryRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Vector3 { x: ax, y: ay, z: az } = self.acceleration;
        let Vector3 { x: gx, y: gy, z: gz } = self.angular_rate;
        let Vector3 { x: mx, y: my, z: mz } = self.magnetic_field;
        write!(
            f,
            "<{},{},{},{},{},{},{},{},{},{},{},{},{},{},{},{}>",
            self.sequence,
            self.latitude,
            self.longitude,
            self.altitude,
            self.pressure,
            self.temperature,
            ax,
            ay,
            az,
            gx,
            gy,
            gz,
            mx,
            my,
            mz,
            self.parachute_deployed
        )
    }
}
