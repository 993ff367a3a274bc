use crate::generator::profile::FlightProfile;
use anyhow::Context;
use groundcore::reader::{ReaderConfig, DEFAULT_BAUD_RATE, DEFAULT_READ_TIMEOUT};
use serde::{Deserialize, Serialize};
use std::fs;
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

pub const DEFAULT_RELAY_TIMEOUT: Duration = Duration::from_secs(2);

/// Station settings. Every field falls back to a documented default, so an
/// empty YAML document is a valid configuration with the relay disabled.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct StationConfig {
    /// Serial device opened at startup; `None` waits for a connect request.
    pub port: Option<String>,
    pub baud_rate: u32,
    pub read_timeout_ms: u64,
    /// Collector receiving one POST per decoded packet; `None` disables the relay.
    pub webhook_url: Option<String>,
    pub relay_timeout_ms: u64,
    /// Packets allowed to wait for the relay before new ones are dropped.
    pub relay_queue: usize,
    pub bind: SocketAddr,
    pub history_limit: usize,
    pub console_limit: usize,
    pub simulation: FlightProfile,
}

impl Default for StationConfig {
    fn default() -> Self {
        Self {
            port: None,
            baud_rate: DEFAULT_BAUD_RATE,
            read_timeout_ms: DEFAULT_READ_TIMEOUT.as_millis() as u64,
            webhook_url: None,
            relay_timeout_ms: DEFAULT_RELAY_TIMEOUT.as_millis() as u64,
            relay_queue: 64,
            bind: SocketAddr::from(([127, 0, 0, 1], 9000)),
            history_limit: 2000,
            console_limit: 500,
            simulation: FlightProfile::default(),
        }
    }
}

impl StationConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path_ref = path.as_ref();
        let contents = fs::read_to_string(path_ref)
            .with_context(|| format!("reading station config {}", path_ref.display()))?;
        let config: StationConfig = serde_yaml::from_str(&contents)
            .with_context(|| format!("parsing station config {}", path_ref.display()))?;
        Ok(config)
    }

    pub fn from_args(port: Option<String>, baud_rate: u32, webhook_url: Option<String>) -> Self {
        Self {
            port,
            baud_rate,
            webhook_url,
            ..Default::default()
        }
    }

    /// Command-line values win over whatever the file said.
    pub fn apply_overrides(
        &mut self,
        port: Option<String>,
        baud_rate: Option<u32>,
        webhook_url: Option<String>,
        bind: Option<SocketAddr>,
    ) {
        if port.is_some() {
            self.port = port;
        }
        if let Some(baud_rate) = baud_rate {
            self.baud_rate = baud_rate;
        }
        if webhook_url.is_some() {
            self.webhook_url = webhook_url;
        }
        if let Some(bind) = bind {
            self.bind = bind;
        }
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms.max(1))
    }

    pub fn relay_timeout(&self) -> Duration {
        Duration::from_millis(self.relay_timeout_ms.max(1))
    }

    /// Reader settings for `port`, if one is configured.
    pub fn reader_config(&self) -> Option<ReaderConfig> {
        self.port.as_ref().map(|port| self.reader_config_for(port, None))
    }

    pub fn reader_config_for(&self, port: &str, baud_rate: Option<u32>) -> ReaderConfig {
        ReaderConfig {
            endpoint: port.to_string(),
            baud_rate: baud_rate.unwrap_or(self.baud_rate),
            read_timeout: self.read_timeout(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn defaults_match_the_documented_fallbacks() {
        let cfg = StationConfig::default();
        assert_eq!(cfg.baud_rate, 9600);
        assert_eq!(cfg.read_timeout(), Duration::from_secs(1));
        assert_eq!(cfg.relay_timeout(), Duration::from_secs(2));
        assert_eq!(cfg.bind, "127.0.0.1:9000".parse::<SocketAddr>().unwrap());
        assert!(cfg.webhook_url.is_none());
        assert!(cfg.reader_config().is_none());
    }

    #[test]
    fn config_from_args_produces_reader_config() {
        let cfg = StationConfig::from_args(Some("COM7".into()), 115200, None);
        let reader = cfg.reader_config().unwrap();
        assert_eq!(reader.endpoint, "COM7");
        assert_eq!(reader.baud_rate, 115200);
        assert_eq!(reader.read_timeout, Duration::from_secs(1));
    }

    #[test]
    fn config_load_reads_yaml() {
        let mut temp = NamedTempFile::new().unwrap();
        temp.write_all(
            b"port: /dev/ttyUSB0\nwebhook_url: http://collector.local/hook\nrelay_timeout_ms: 500\nsimulation:\n  seed: 42\n",
        )
        .unwrap();
        let path = temp.into_temp_path();
        let cfg = StationConfig::load(&path).unwrap();
        assert_eq!(cfg.port.as_deref(), Some("/dev/ttyUSB0"));
        assert_eq!(cfg.baud_rate, 9600);
        assert_eq!(cfg.relay_timeout(), Duration::from_millis(500));
        assert_eq!(cfg.webhook_url.as_deref(), Some("http://collector.local/hook"));
        assert_eq!(cfg.simulation.seed, 42);
    }

    #[test]
    fn config_load_reports_bad_yaml() {
        let mut temp = NamedTempFile::new().unwrap();
        temp.write_all(b"baud_rate: fast\n").unwrap();
        let path = temp.into_temp_path();
        let err = StationConfig::load(&path).unwrap_err();
        assert!(format!("{:#}", err).contains("parsing station config"));
    }

    #[test]
    fn overrides_replace_only_given_values() {
        let mut cfg = StationConfig::from_args(Some("COM7".into()), 9600, Some("http://a".into()));
        cfg.apply_overrides(None, Some(57600), None, None);
        assert_eq!(cfg.port.as_deref(), Some("COM7"));
        assert_eq!(cfg.baud_rate, 57600);
        assert_eq!(cfg.webhook_url.as_deref(), Some("http://a"));
        let reader = cfg.reader_config_for("/dev/ttyACM0", Some(19200));
        assert_eq!(reader.endpoint, "/dev/ttyACM0");
        assert_eq!(reader.baud_rate, 19200);
    }
}
