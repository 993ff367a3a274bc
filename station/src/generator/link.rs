use super::profile::{FlightProfile, FlightSimulator};
use log::info;
use std::collections::VecDeque;
use std::io::{self, Read};
use std::thread;
use std::time::Duration;

/// Byte source that behaves like a serial port wired to a simulated probe:
/// each read waits one packet interval (at most a second) when nothing is
/// buffered, then hands out the next lines.
pub struct SimulatedLink {
    simulator: FlightSimulator,
    pending: VecDeque<u8>,
    interval: Duration,
}

impl SimulatedLink {
    pub fn new(profile: FlightProfile) -> Self {
        let interval = Duration::from_millis(profile.interval_ms.clamp(1, 1000));
        Self {
            simulator: FlightSimulator::new(profile),
            pending: VecDeque::new(),
            interval,
        }
    }

    fn refill(&mut self) {
        let before = self.simulator.phase();
        for line in self.simulator.next_lines() {
            self.pending.extend(line.as_bytes());
            self.pending.extend(b"\r\n");
        }
        let after = self.simulator.phase();
        if after != before {
            info!("simulated flight entered {:?} phase", after);
        }
    }
}

impl Read for SimulatedLink {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        if self.pending.is_empty() {
            thread::sleep(self.interval);
            self.refill();
        }
        let count = buf.len().min(self.pending.len());
        for (slot, byte) in buf.iter_mut().zip(self.pending.drain(..count)) {
            *slot = byte;
        }
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generator::profile::FlightPhase;
    use groundcore::packet::{decode_packet, LineFramer};

    #[test]
    fn link_streams_framed_packets() {
        let mut link = SimulatedLink::new(FlightProfile {
            interval_ms: 1,
            chatter_every: None,
            ..Default::default()
        });
        let mut framer = LineFramer::new();
        let mut lines = Vec::new();
        let mut buf = [0u8; 7];
        while lines.len() < 5 {
            let count = link.read(&mut buf).unwrap();
            assert!(count > 0);
            lines.extend(framer.push(&buf[..count]));
        }
        let sequences: Vec<u64> = lines
            .iter()
            .map(|line| decode_packet(line).unwrap().sequence)
            .collect();
        assert_eq!(sequences, vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn link_follows_the_flight_through_landing() {
        let mut link = SimulatedLink::new(FlightProfile {
            interval_ms: 1,
            apogee_m: 100.0,
            ascent_rate: 50_000.0,
            descent_rate: 25_000.0,
            chatter_every: None,
            ..Default::default()
        });
        let mut framer = LineFramer::new();
        let mut deployed = Vec::new();
        let mut buf = [0u8; 256];
        for _ in 0..200 {
            if link.simulator.phase() == FlightPhase::Landed {
                break;
            }
            let count = link.read(&mut buf).unwrap();
            for line in framer.push(&buf[..count]) {
                deployed.push(decode_packet(&line).unwrap().parachute_deployed);
            }
        }
        assert_eq!(link.simulator.phase(), FlightPhase::Landed);
        assert_eq!(deployed.first(), Some(&false));
        assert!(deployed.contains(&true));
    }
}
