//! Sink fan-out.
//!
//! A dispatcher thread drains the reader's event channel in order and hands
//! every event to one queue per sink. Each sink drains its own queue on its
//! own worker thread, so a slow relay never holds up the display and the other
//! way round, while every sink still sees events in arrival order.

use crate::prelude::{
    event_channel, EventReceiver, EventSender, ReaderEvent, SinkResult, TelemetrySink,
};
use crate::telemetry::LinkMetrics;
use log::{debug, error, warn};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tokio::sync::mpsc::{self, error::TrySendError};

enum SinkQueue {
    Unbounded(mpsc::UnboundedSender<ReaderEvent>),
    Bounded(mpsc::Sender<ReaderEvent>),
}

struct SinkWorker {
    name: String,
    queue: SinkQueue,
    handle: JoinHandle<()>,
}

impl SinkWorker {
    fn spawn(mut sink: Box<dyn TelemetrySink>, metrics: Arc<LinkMetrics>) -> std::io::Result<Self> {
        let name = sink.name().to_string();
        let builder = thread::Builder::new().name(format!("sink:{}", name));
        let (queue, handle) = match sink.queue_capacity() {
            None => {
                let (tx, mut rx) = mpsc::unbounded_channel();
                let handle = builder.spawn(move || {
                    while let Some(event) = rx.blocking_recv() {
                        deliver(sink.as_mut(), &event, &metrics);
                    }
                })?;
                (SinkQueue::Unbounded(tx), handle)
            }
            Some(capacity) => {
                let (tx, mut rx) = mpsc::channel(capacity.max(1));
                let handle = builder.spawn(move || {
                    while let Some(event) = rx.blocking_recv() {
                        deliver(sink.as_mut(), &event, &metrics);
                    }
                })?;
                (SinkQueue::Bounded(tx), handle)
            }
        };
        Ok(Self {
            name,
            queue,
            handle,
        })
    }

    /// Queues without waiting. Returns false once the worker is gone.
    fn offer(&self, event: &ReaderEvent, metrics: &LinkMetrics) -> bool {
        match &self.queue {
            SinkQueue::Unbounded(tx) => tx.send(event.clone()).is_ok(),
            SinkQueue::Bounded(tx) => match tx.try_send(event.clone()) {
                Ok(()) => true,
                Err(TrySendError::Full(_)) => {
                    metrics.record_dropped();
                    warn!("{} is falling behind, dropping event", self.name);
                    true
                }
                Err(TrySendError::Closed(_)) => false,
            },
        }
    }
}

fn deliver(sink: &mut dyn TelemetrySink, event: &ReaderEvent, metrics: &LinkMetrics) {
    let result: SinkResult<()> = match event {
        ReaderEvent::Telemetry(record) => sink.on_record(record),
        ReaderEvent::Raw(line) => sink.on_raw(line),
        ReaderEvent::Opened { endpoint } => sink.on_opened(endpoint),
        ReaderEvent::Closed(closure) => sink.on_closed(closure),
    };
    let is_record = matches!(event, ReaderEvent::Telemetry(_));
    match result {
        Ok(()) if is_record => metrics.record_delivered(),
        Ok(()) => {}
        Err(err) => {
            if is_record {
                metrics.record_failed();
            }
            warn!("{}: {}", sink.name(), err);
        }
    }
}

/// Running fan-out: one dispatcher plus one worker per sink.
pub struct FanOut {
    sender: Option<EventSender>,
    dispatcher: Option<JoinHandle<()>>,
}

impl FanOut {
    pub fn spawn(
        sinks: Vec<Box<dyn TelemetrySink>>,
        metrics: Arc<LinkMetrics>,
    ) -> std::io::Result<Self> {
        let workers = sinks
            .into_iter()
            .map(|sink| SinkWorker::spawn(sink, metrics.clone()))
            .collect::<std::io::Result<Vec<_>>>()?;
        let (sender, receiver) = event_channel();
        let dispatcher = thread::Builder::new()
            .name("fanout".into())
            .spawn(move || dispatch(receiver, workers, metrics))?;

        Ok(Self {
            sender: Some(sender),
            dispatcher: Some(dispatcher),
        })
    }

    /// Sender handed to readers. Any number of readers may hold one.
    pub fn sender(&self) -> EventSender {
        match &self.sender {
            Some(sender) => sender.clone(),
            // Only reachable after shutdown; hand out a sender whose events go nowhere.
            None => event_channel().0,
        }
    }

    /// Waits for every queued event to be delivered, then joins all threads.
    /// Readers holding a sender must be stopped first.
    pub fn shutdown(&mut self) {
        self.sender.take();
        if let Some(dispatcher) = self.dispatcher.take() {
            if dispatcher.join().is_err() {
                error!("fan-out dispatcher panicked");
            }
        }
    }
}

impl Drop for FanOut {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn dispatch(mut receiver: EventReceiver, mut workers: Vec<SinkWorker>, metrics: Arc<LinkMetrics>) {
    while let Some(event) = receiver.blocking_recv() {
        workers.retain(|worker| {
            let alive = worker.offer(&event, &metrics);
            if !alive {
                error!("sink {} stopped accepting events", worker.name);
            }
            alive
        });
    }
    for worker in workers {
        let SinkWorker { name, queue, handle } = worker;
        drop(queue);
        if handle.join().is_err() {
            error!("sink {} panicked", name);
        }
        debug!("sink {} drained", name);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packet::{TelemetryRecord, Vector3};
    use crate::prelude::{LinkClosure, RawLine, SinkError};
    use std::sync::mpsc as std_mpsc;
    use std::time::{Duration, Instant};

    fn record(sequence: u64) -> TelemetryRecord {
        TelemetryRecord {
            sequence,
            latitude: 19.5,
            longitude: -99.1,
            altitude: 100.0 + sequence as f64,
            pressure: 1000.0,
            temperature: 20.0,
            acceleration: Vector3::default(),
            angular_rate: Vector3::default(),
            magnetic_field: Vector3::default(),
            parachute_deployed: false,
        }
    }

    #[derive(Debug, PartialEq)]
    enum Seen {
        Record(u64),
        Raw(String),
        Closed,
    }

    struct Recorder(std_mpsc::Sender<Seen>);

    impl TelemetrySink for Recorder {
        fn name(&self) -> &str {
            "recorder"
        }

        fn on_record(&mut self, record: &TelemetryRecord) -> SinkResult<()> {
            let _ = self.0.send(Seen::Record(record.sequence));
            Ok(())
        }

        fn on_raw(&mut self, line: &RawLine) -> SinkResult<()> {
            let _ = self.0.send(Seen::Raw(line.as_str().to_string()));
            Ok(())
        }

        fn on_closed(&mut self, _closure: &LinkClosure) -> SinkResult<()> {
            let _ = self.0.send(Seen::Closed);
            Ok(())
        }
    }

    /// Stands in for a relay whose collector hangs and then errors.
    struct StalledRelay {
        delay: Duration,
        capacity: Option<usize>,
    }

    impl TelemetrySink for StalledRelay {
        fn name(&self) -> &str {
            "stalled"
        }

        fn on_record(&mut self, _record: &TelemetryRecord) -> SinkResult<()> {
            thread::sleep(self.delay);
            Err(SinkError::Delivery("timed out".into()))
        }

        fn queue_capacity(&self) -> Option<usize> {
            self.capacity
        }
    }

    #[test]
    fn every_sink_sees_events_in_arrival_order() {
        let (seen_tx, seen_rx) = std_mpsc::channel();
        let metrics = Arc::new(LinkMetrics::new());
        let mut fanout =
            FanOut::spawn(vec![Box::new(Recorder(seen_tx))], metrics.clone()).unwrap();
        let sender = fanout.sender();

        sender
            .send(ReaderEvent::Raw(RawLine("hello".into())))
            .unwrap();
        for sequence in [5, 3, 3, 9] {
            sender.send(ReaderEvent::Telemetry(record(sequence))).unwrap();
        }
        sender
            .send(ReaderEvent::Closed(LinkClosure::Stopped))
            .unwrap();
        drop(sender);
        fanout.shutdown();

        let seen: Vec<Seen> = seen_rx.try_iter().collect();
        assert_eq!(
            seen,
            vec![
                Seen::Raw("hello".into()),
                Seen::Record(5),
                Seen::Record(3),
                Seen::Record(3),
                Seen::Record(9),
                Seen::Closed,
            ]
        );
        assert_eq!(metrics.snapshot().delivered, 4);
    }

    #[test]
    fn stalled_relay_does_not_delay_display() {
        let (seen_tx, seen_rx) = std_mpsc::channel();
        let metrics = Arc::new(LinkMetrics::new());
        let mut fanout = FanOut::spawn(
            vec![
                Box::new(StalledRelay {
                    delay: Duration::from_millis(300),
                    capacity: None,
                }),
                Box::new(Recorder(seen_tx)),
            ],
            metrics.clone(),
        )
        .unwrap();
        let sender = fanout.sender();

        let started = Instant::now();
        for sequence in 0..3 {
            sender.send(ReaderEvent::Telemetry(record(sequence))).unwrap();
        }
        for expected in 0..3 {
            let seen = seen_rx.recv_timeout(Duration::from_secs(1)).unwrap();
            assert_eq!(seen, Seen::Record(expected));
        }
        assert!(started.elapsed() < Duration::from_millis(300));

        drop(sender);
        fanout.shutdown();
        let stats = metrics.snapshot();
        assert_eq!(stats.delivered, 3);
        assert_eq!(stats.failed, 3);
    }

    #[test]
    fn full_bounded_queue_drops_for_that_sink_only() {
        let (seen_tx, seen_rx) = std_mpsc::channel();
        let metrics = Arc::new(LinkMetrics::new());
        let mut fanout = FanOut::spawn(
            vec![
                Box::new(StalledRelay {
                    delay: Duration::from_millis(100),
                    capacity: Some(1),
                }),
                Box::new(Recorder(seen_tx)),
            ],
            metrics.clone(),
        )
        .unwrap();
        let sender = fanout.sender();
        for sequence in 0..10 {
            sender.send(ReaderEvent::Telemetry(record(sequence))).unwrap();
        }
        drop(sender);
        fanout.shutdown();

        assert_eq!(seen_rx.try_iter().count(), 10);
        let stats = metrics.snapshot();
        assert!(stats.dropped > 0);
        assert_eq!(stats.failed + stats.dropped, 10);
    }
}
