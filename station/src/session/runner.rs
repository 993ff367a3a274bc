use crate::generator::link::SimulatedLink;
use crate::generator::profile::FlightProfile;
use anyhow::Context;
use groundcore::prelude::TelemetrySink;
use groundcore::reader::{ReaderConfig, TelemetryReader};
use groundcore::telemetry::LinkMetrics;
use groundcore::FanOut;
use log::info;
use std::fs::File;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

pub type SharedSession = Arc<Mutex<Session>>;

/// Where the downlink bytes come from.
#[derive(Debug, Clone)]
pub enum LinkSource {
    Serial(ReaderConfig),
    /// A captured downlink file, read once to the end.
    Replay(PathBuf),
    Simulated(FlightProfile),
}

impl LinkSource {
    pub fn endpoint(&self) -> String {
        match self {
            LinkSource::Serial(config) => config.endpoint.clone(),
            LinkSource::Replay(path) => format!("replay:{}", path.display()),
            LinkSource::Simulated(profile) => format!("simulated:seed={}", profile.seed),
        }
    }
}

/// At most one reader at a time, feeding a fan-out that outlives connections.
pub struct Session {
    fanout: FanOut,
    metrics: Arc<LinkMetrics>,
    reader: Option<TelemetryReader>,
}

impl Session {
    pub fn new(sinks: Vec<Box<dyn TelemetrySink>>, metrics: Arc<LinkMetrics>) -> anyhow::Result<Self> {
        let fanout = FanOut::spawn(sinks, metrics.clone()).context("starting sink fan-out")?;
        Ok(Self {
            fanout,
            metrics,
            reader: None,
        })
    }

    /// Stops any running reader, then starts one on `source`.
    pub fn connect(&mut self, source: LinkSource) -> anyhow::Result<String> {
        self.disconnect();
        let endpoint = source.endpoint();
        let events = self.fanout.sender();
        let metrics = self.metrics.clone();
        let reader = match source {
            LinkSource::Serial(config) => TelemetryReader::start(&config, events, metrics)?,
            LinkSource::Replay(path) => {
                let file = File::open(&path)
                    .with_context(|| format!("opening capture {}", path.display()))?;
                TelemetryReader::spawn(endpoint.clone(), file, events, metrics)?
            }
            LinkSource::Simulated(profile) => {
                TelemetryReader::spawn(endpoint.clone(), SimulatedLink::new(profile), events, metrics)?
            }
        };
        info!("downlink started on {}", endpoint);
        self.reader = Some(reader);
        Ok(endpoint)
    }

    /// Stops the reader and waits for its thread. Returns whether one was running.
    pub fn disconnect(&mut self) -> bool {
        match self.reader.take() {
            Some(mut reader) => {
                reader.stop();
                true
            }
            None => false,
        }
    }

    /// Endpoint of a reader whose loop is still alive.
    pub fn active_endpoint(&self) -> Option<&str> {
        self.reader
            .as_ref()
            .filter(|reader| reader.is_running())
            .map(|reader| reader.endpoint())
    }

    /// Stops reading and flushes every queued event to the sinks.
    pub fn shutdown(&mut self) {
        self.disconnect();
        self.fanout.shutdown();
    }
}
