//! Telemetry link core for the CANSAT ground station.
//!
//! The modules cover the downlink from bytes to consumers: the packet wire
//! format, a background serial reader, and a fan-out that feeds independent
//! sinks (display state, network relay, diagnostic log).

pub mod fanout;
pub mod packet;
pub mod prelude;
pub mod reader;
pub mod telemetry;

pub use fanout::FanOut;
pub use packet::{decode_packet, DecodeError, TelemetryRecord, Vector3};
pub use prelude::{
    event_channel, LinkClosure, RawLine, ReaderEvent, SinkError, SinkResult, TelemetrySink,
};
pub use reader::{ReaderConfig, ReaderError, TelemetryReader};
