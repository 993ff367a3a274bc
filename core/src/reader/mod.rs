//! Background serial reader.
//!
//! A [`TelemetryReader`] owns one byte source on a dedicated thread, frames it
//! into lines and emits [`ReaderEvent`](crate::prelude::ReaderEvent)s over a
//! channel that never blocks the reader.

pub mod serial;
pub mod worker;

pub use serial::{available_ports, open_port};
pub use worker::TelemetryReader;

use std::time::Duration;

pub const DEFAULT_BAUD_RATE: u32 = 9600;
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(1);

/// Where and how to open the downlink.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReaderConfig {
    pub endpoint: String,
    pub baud_rate: u32,
    pub read_timeout: Duration,
}

impl ReaderConfig {
    pub fn new(endpoint: impl Into<String>, baud_rate: u32) -> Self {
        Self {
            endpoint: endpoint.into(),
            baud_rate,
            read_timeout: DEFAULT_READ_TIMEOUT,
        }
    }
}

#[derive(thiserror::Error, Debug)]
pub enum ReaderError {
    #[error("cannot open {endpoint}: {source}")]
    Open {
        endpoint: String,
        #[source]
        source: serialport::Error,
    },
    #[error("cannot enumerate serial ports: {0}")]
    Enumerate(#[source] serialport::Error),
    #[error("cannot spawn reader thread: {0}")]
    Spawn(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_config_uses_default_read_timeout() {
        let config = ReaderConfig::new("COM7", 115_200);
        assert_eq!(config.endpoint, "COM7");
        assert_eq!(config.baud_rate, 115_200);
        assert_eq!(config.read_timeout, DEFAULT_READ_TIMEOUT);
    }
}
