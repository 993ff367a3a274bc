use crate::packet::TelemetryRecord;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

/// Exact text of one received line, surfaced for diagnostics only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawLine(pub String);

impl RawLine {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Why a reader loop ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LinkClosure {
    Stopped,
    EndOfStream,
    Failed(String),
}

impl std::fmt::Display for LinkClosure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LinkClosure::Stopped => write!(f, "stopped"),
            LinkClosure::EndOfStream => write!(f, "end of stream"),
            LinkClosure::Failed(reason) => write!(f, "failed: {}", reason),
        }
    }
}

/// Everything a reader emits, in framing order.
#[derive(Debug, Clone, PartialEq)]
pub enum ReaderEvent {
    Opened { endpoint: String },
    Raw(RawLine),
    Telemetry(TelemetryRecord),
    Closed(LinkClosure),
}

pub type EventSender = mpsc::UnboundedSender<ReaderEvent>;
pub type EventReceiver = mpsc::UnboundedReceiver<ReaderEvent>;

/// Queue between a reader and whoever consumes its events. Sending never blocks.
pub fn event_channel() -> (EventSender, EventReceiver) {
    mpsc::unbounded_channel()
}

/// Delivery failure reported by a sink.
#[derive(thiserror::Error, Debug)]
pub enum SinkError {
    #[error("delivery failed: {0}")]
    Delivery(String),
    #[error("collector rejected record with status {status}")]
    Rejected { status: u16 },
    #[error("internal failure: {0}")]
    Internal(String),
}

pub type SinkResult<T> = Result<T, SinkError>;

/// Consumer of reader events. Each sink runs on its own worker, so a slow
/// or failing sink only ever delays itself.
pub trait TelemetrySink: Send + 'static {
    fn name(&self) -> &str;

    fn on_record(&mut self, record: &TelemetryRecord) -> SinkResult<()>;

    fn on_raw(&mut self, _line: &RawLine) -> SinkResult<()> {
        Ok(())
    }

    fn on_opened(&mut self, _endpoint: &str) -> SinkResult<()> {
        Ok(())
    }

    fn on_closed(&mut self, _closure: &LinkClosure) -> SinkResult<()> {
        Ok(())
    }

    /// `None` queues without bound; `Some(n)` drops events once `n` are waiting.
    fn queue_capacity(&self) -> Option<usize> {
        None
    }
}
