use groundcore::packet::{TelemetryRecord, Vector3};
use rand::{rngs::StdRng, Rng, SeedableRng};
use serde::{Deserialize, Serialize};

const GRAVITY: f64 = 9.81;

/// Shape of a synthetic flight used to exercise the station without hardware.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct FlightProfile {
    pub seed: u64,
    pub interval_ms: u64,
    pub launch_lat: f64,
    pub launch_lng: f64,
    pub apogee_m: f64,
    pub ascent_rate: f64,
    pub descent_rate: f64,
    pub ground_pressure_hpa: f64,
    pub ground_temp_c: f64,
    pub noise: f64,
    /// Emit a free-text status line every N packets.
    pub chatter_every: Option<u32>,
    /// Fraction of packets sent with a garbled field.
    pub corrupt_ratio: f64,
}

impl Default for FlightProfile {
    fn default() -> Self {
        Self {
            seed: 0,
            interval_ms: 500,
            launch_lat: 19.5,
            launch_lng: -99.1,
            apogee_m: 500.0,
            ascent_rate: 40.0,
            descent_rate: 8.0,
            ground_pressure_hpa: 1013.25,
            ground_temp_c: 24.0,
            noise: 0.05,
            chatter_every: Some(10),
            corrupt_ratio: 0.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlightPhase {
    Ascent,
    Descent,
    Landed,
}

/// Steps a simple ascent / parachute descent and renders each step as packets.
pub struct FlightSimulator {
    profile: FlightProfile,
    rng: StdRng,
    phase: FlightPhase,
    elapsed: f64,
    altitude: f64,
    latitude: f64,
    longitude: f64,
    sequence: u64,
}

impl FlightSimulator {
    pub fn new(profile: FlightProfile) -> Self {
        Self {
            rng: StdRng::seed_from_u64(profile.seed),
            phase: FlightPhase::Ascent,
            elapsed: 0.0,
            altitude: 0.0,
            latitude: profile.launch_lat,
            longitude: profile.launch_lng,
            sequence: 0,
            profile,
        }
    }

    pub fn phase(&self) -> FlightPhase {
        self.phase
    }

    fn step_seconds(&self) -> f64 {
        self.profile.interval_ms.max(1) as f64 / 1000.0
    }

    fn jitter(&mut self, scale: f64) -> f64 {
        let amplitude = self.profile.noise.abs() * scale;
        if amplitude > 0.0 {
            self.rng.gen_range(-amplitude..amplitude)
        } else {
            0.0
        }
    }

    fn advance(&mut self) {
        let dt = self.step_seconds();
        self.elapsed += dt;
        match self.phase {
            FlightPhase::Ascent => {
                self.altitude += self.profile.ascent_rate * dt;
                if self.altitude >= self.profile.apogee_m {
                    self.altitude = self.profile.apogee_m;
                    self.phase = FlightPhase::Descent;
                }
            }
            FlightPhase::Descent => {
                self.altitude -= self.profile.descent_rate * dt;
                if self.altitude <= 0.0 {
                    self.altitude = 0.0;
                    self.phase = FlightPhase::Landed;
                }
            }
            FlightPhase::Landed => {}
        }
        if self.phase != FlightPhase::Landed {
            // Steady easterly drift with a little wander.
            self.latitude += 0.000_002 + self.jitter(0.000_02);
            self.longitude += 0.000_01 + self.jitter(0.000_02);
        }
    }

    /// Advances one interval and returns the packet the probe would send.
    pub fn next_record(&mut self) -> TelemetryRecord {
        self.advance();
        let sequence = self.sequence;
        self.sequence = self.sequence.wrapping_add(1);

        let altitude = self.altitude + self.jitter(10.0);
        let pressure =
            self.profile.ground_pressure_hpa * (1.0 - 2.25577e-5 * altitude.max(0.0)).powf(5.25588);
        let temperature = self.profile.ground_temp_c - 0.0065 * altitude.max(0.0);
        let thrust = match self.phase {
            FlightPhase::Ascent => 15.0,
            _ => 0.0,
        };
        let t = self.elapsed;
        let spin = match self.phase {
            FlightPhase::Landed => 0.0,
            _ => (t * 30.0) % 360.0,
        };

        TelemetryRecord {
            sequence,
            latitude: round_to(self.latitude, 6),
            longitude: round_to(self.longitude, 6),
            altitude: round_to(altitude, 2),
            pressure: round_to(pressure + self.jitter(1.0), 2),
            temperature: round_to(temperature + self.jitter(1.0), 2),
            acceleration: Vector3::new(
                round_to(self.jitter(2.0), 3),
                round_to(self.jitter(2.0), 3),
                round_to(GRAVITY + thrust + self.jitter(4.0), 3),
            ),
            angular_rate: Vector3::new(
                round_to(spin, 2),
                round_to(5.0 * t.sin() + self.jitter(2.0), 2),
                round_to(2.0 * (t * 0.5).cos() + self.jitter(2.0), 2),
            ),
            magnetic_field: Vector3::new(
                round_to(20.0 + self.jitter(10.0), 2),
                round_to(5.0 + self.jitter(10.0), 2),
                round_to(-40.0 + self.jitter(10.0), 2),
            ),
            parachute_deployed: self.phase != FlightPhase::Ascent,
        }
    }

    /// Lines sent during the next interval: the packet, sometimes garbled, and
    /// now and then a status line ahead of it.
    pub fn next_lines(&mut self) -> Vec<String> {
        let record = self.next_record();
        let mut lines = Vec::with_capacity(2);
        if let Some(every) = self.profile.chatter_every.filter(|every| *every > 0) {
            if record.sequence % u64::from(every) == 0 {
                lines.push(format!(
                    "# sim t={:.1}s phase={:?} alt={:.1}m",
                    self.elapsed, self.phase, self.altitude
                ));
            }
        }
        let packet = record.to_string();
        let ratio = self.profile.corrupt_ratio.clamp(0.0, 1.0);
        if ratio > 0.0 && self.rng.gen_bool(ratio) {
            lines.push(garble(&packet, self.rng.gen_range(1..15)));
        } else {
            lines.push(packet);
        }
        lines
    }
}

/// Replaces field `index` (1-based inside the envelope) with non-numeric text.
fn garble(packet: &str, index: usize) -> String {
    let body = &packet[1..packet.len() - 1];
    let fields: Vec<&str> = body
        .split(',')
        .enumerate()
        .map(|(i, field)| if i == index { "ERR" } else { field })
        .collect();
    format!("<{}>", fields.join(","))
}

fn round_to(value: f64, decimals: i32) -> f64 {
    let scale = 10f64.powi(decimals);
    (value * scale).round() / scale
}
