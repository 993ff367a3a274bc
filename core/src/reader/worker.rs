use super::serial::open_port;
use super::{ReaderConfig, ReaderError};
use crate::packet::{decode_packet, DecodeError, LineFramer};
use crate::prelude::{EventSender, LinkClosure, RawLine, ReaderEvent};
use crate::telemetry::LinkMetrics;
use log::{debug, error, info, warn};
use std::io::{self, Read};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

const READ_CHUNK: usize = 256;
const TRANSIENT_BACKOFF: Duration = Duration::from_millis(10);

/// Handle to a running reader thread.
///
/// Dropping the handle stops the thread the same way [`TelemetryReader::stop`] does.
pub struct TelemetryReader {
    endpoint: String,
    shutdown: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl TelemetryReader {
    /// Opens the serial endpoint and starts reading it. Open failures are
    /// returned to the caller; nothing is retried.
    pub fn start(
        config: &ReaderConfig,
        events: EventSender,
        metrics: Arc<LinkMetrics>,
    ) -> Result<Self, ReaderError> {
        let port = open_port(config)?;
        Self::spawn(config.endpoint.clone(), port, events, metrics)
    }

    /// Starts reading an already opened byte source. Reads must return within
    /// a bounded time (a timeout error counts as "no data") for `stop` to be
    /// prompt.
    pub fn spawn<S>(
        endpoint: impl Into<String>,
        source: S,
        events: EventSender,
        metrics: Arc<LinkMetrics>,
    ) -> Result<Self, ReaderError>
    where
        S: Read + Send + 'static,
    {
        let endpoint = endpoint.into();
        let shutdown = Arc::new(AtomicBool::new(false));
        let read_loop = ReadLoop {
            endpoint: endpoint.clone(),
            source,
            framer: LineFramer::new(),
            events,
            metrics,
            shutdown: shutdown.clone(),
        };
        let handle = thread::Builder::new()
            .name(format!("reader:{}", endpoint))
            .spawn(move || read_loop.run())?;

        Ok(Self {
            endpoint,
            shutdown,
            handle: Some(handle),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// False once the loop has exited, whether stopped or because the link died.
    pub fn is_running(&self) -> bool {
        self.handle
            .as_ref()
            .map(|handle| !handle.is_finished())
            .unwrap_or(false)
    }

    /// Asks the loop to finish its current read and waits for the thread to exit.
    pub fn stop(&mut self) {
        self.shutdown.store(true, Ordering::Release);
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                error!("reader thread for {} panicked", self.endpoint);
            }
            info!("reader for {} stopped", self.endpoint);
        }
    }
}

impl Drop for TelemetryReader {
    fn drop(&mut self) {
        self.stop();
    }
}

enum ReadOutcome {
    Idle,
    Transient,
    Fatal,
}

fn classify(err: &io::Error) -> ReadOutcome {
    match err.kind() {
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted => {
            ReadOutcome::Idle
        }
        io::ErrorKind::InvalidData => ReadOutcome::Transient,
        _ => ReadOutcome::Fatal,
    }
}

struct ReadLoop<S> {
    endpoint: String,
    source: S,
    framer: LineFramer,
    events: EventSender,
    metrics: Arc<LinkMetrics>,
    shutdown: Arc<AtomicBool>,
}

impl<S: Read> ReadLoop<S> {
    fn run(mut self) {
        if !self.emit(ReaderEvent::Opened {
            endpoint: self.endpoint.clone(),
        }) {
            return;
        }
        let closure = match self.pump() {
            Some(closure) => closure,
            None => {
                debug!("no event receivers left, reader for {} exiting", self.endpoint);
                return;
            }
        };
        if let LinkClosure::Failed(reason) = &closure {
            error!("serial link {} failed: {}", self.endpoint, reason);
        }
        self.emit(ReaderEvent::Closed(closure));
    }

    /// Reads until stopped or the link dies. `None` means every receiver is gone.
    fn pump(&mut self) -> Option<LinkClosure> {
        let mut buffer = [0u8; READ_CHUNK];
        while !self.shutdown.load(Ordering::Acquire) {
            match self.source.read(&mut buffer) {
                Ok(0) => {
                    if let Some(line) = self.framer.finish() {
                        if !self.handle_line(line) {
                            return None;
                        }
                    }
                    return Some(LinkClosure::EndOfStream);
                }
                Ok(count) => {
                    for line in self.framer.push(&buffer[..count]) {
                        if !self.handle_line(line) {
                            return None;
                        }
                    }
                }
                Err(err) => match classify(&err) {
                    ReadOutcome::Idle => {}
                    ReadOutcome::Transient => {
                        warn!("read error on {}: {}", self.endpoint, err);
                        thread::sleep(TRANSIENT_BACKOFF);
                    }
                    ReadOutcome::Fatal => return Some(LinkClosure::Failed(err.to_string())),
                },
            }
        }
        Some(LinkClosure::Stopped)
    }

    fn handle_line(&mut self, line: String) -> bool {
        self.metrics.record_line();
        let decoded = decode_packet(&line);
        if !self.emit(ReaderEvent::Raw(RawLine(line))) {
            return false;
        }
        match decoded {
            Ok(record) => {
                self.metrics.record_packet();
                self.emit(ReaderEvent::Telemetry(record))
            }
            Err(DecodeError::MissingEnvelope) => true,
            Err(err) => {
                self.metrics.record_rejected();
                warn!("discarding packet from {}: {}", self.endpoint, err);
                true
            }
        }
    }

    fn emit(&self, event: ReaderEvent) -> bool {
        self.events.send(event).is_ok()
    }
}
