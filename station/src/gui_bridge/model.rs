use groundcore::packet::TelemetryRecord;
use groundcore::prelude::{LinkClosure, RawLine, SinkError, SinkResult, TelemetrySink};
use groundcore::telemetry::LinkStats;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::{Arc, RwLock};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ConnectionStatus {
    #[default]
    Disconnected,
    Connected {
        endpoint: String,
    },
    Closed {
        endpoint: String,
        reason: String,
    },
}

/// One point on the altitude / temperature / pressure charts.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct ChartPoint {
    pub sequence: u64,
    pub altitude: f64,
    pub temperature: f64,
    pub pressure: f64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct TrackPoint {
    pub lat: f64,
    pub lng: f64,
}

/// What the visualizer renders. Chart history, track and console are
/// bounded; the oldest entries fall off first.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct DisplayModel {
    pub connection: ConnectionStatus,
    pub latest: Option<TelemetryRecord>,
    pub history: VecDeque<ChartPoint>,
    pub track: VecDeque<TrackPoint>,
    pub console: VecDeque<String>,
    pub stats: LinkStats,
    #[serde(skip)]
    history_limit: usize,
    #[serde(skip)]
    console_limit: usize,
}

impl DisplayModel {
    pub fn with_limits(history_limit: usize, console_limit: usize) -> Self {
        Self {
            history_limit: history_limit.max(1),
            console_limit: console_limit.max(1),
            ..Default::default()
        }
    }

    pub fn apply_record(&mut self, record: &TelemetryRecord) {
        self.latest = Some(*record);
        push_bounded(
            &mut self.history,
            ChartPoint {
                sequence: record.sequence,
                altitude: record.altitude,
                temperature: record.temperature,
                pressure: record.pressure,
            },
            self.history_limit,
        );
        let (lat, lng) = record.position();
        push_bounded(&mut self.track, TrackPoint { lat, lng }, self.history_limit);
    }

    pub fn push_console(&mut self, line: impl Into<String>) {
        push_bounded(&mut self.console, line.into(), self.console_limit);
    }

    pub fn mark_connected(&mut self, endpoint: &str) {
        self.connection = ConnectionStatus::Connected {
            endpoint: endpoint.to_string(),
        };
        self.push_console(format!("[link] connected to {}", endpoint));
    }

    pub fn mark_closed(&mut self, closure: &LinkClosure) {
        let endpoint = match &self.connection {
            ConnectionStatus::Connected { endpoint } => endpoint.clone(),
            ConnectionStatus::Closed { endpoint, .. } => endpoint.clone(),
            ConnectionStatus::Disconnected => String::new(),
        };
        self.push_console(format!("[link] {}: {}", endpoint, closure));
        self.connection = match closure {
            LinkClosure::Stopped => ConnectionStatus::Disconnected,
            other => ConnectionStatus::Closed {
                endpoint,
                reason: other.to_string(),
            },
        };
    }
}

fn push_bounded<T>(queue: &mut VecDeque<T>, item: T, limit: usize) {
    while queue.len() >= limit.max(1) {
        queue.pop_front();
    }
    queue.push_back(item);
}

/// Feeds reader events into the shared display model.
pub struct DisplaySink {
    state: Arc<RwLock<DisplayModel>>,
}

impl DisplaySink {
    pub fn new(state: Arc<RwLock<DisplayModel>>) -> Self {
        Self { state }
    }

    fn with_model(&self, apply: impl FnOnce(&mut DisplayModel)) -> SinkResult<()> {
        let mut guard = self
            .state
            .write()
            .map_err(|_| SinkError::Internal("display state poisoned".into()))?;
        apply(&mut guard);
        Ok(())
    }
}

impl TelemetrySink for DisplaySink {
    fn name(&self) -> &str {
        "display"
    }

    fn on_record(&mut self, record: &TelemetryRecord) -> SinkResult<()> {
        self.with_model(|model| model.apply_record(record))
    }

    fn on_raw(&mut self, line: &RawLine) -> SinkResult<()> {
        self.with_model(|model| model.push_console(line.as_str()))
    }

    fn on_opened(&mut self, endpoint: &str) -> SinkResult<()> {
        self.with_model(|model| model.mark_connected(endpoint))
    }

    fn on_closed(&mut self, closure: &LinkClosure) -> SinkResult<()> {
        self.with_model(|model| model.mark_closed(closure))
    }
}
