use crate::packet::TelemetryRecord;
use crate::prelude::{LinkClosure, RawLine, SinkResult, TelemetrySink};
use log::{debug, info, warn};

/// Log target every received line is written under.
pub const RAW_TARGET: &str = "cansat::raw";

/// Sink that mirrors link traffic into the process log.
pub struct DiagnosticLog;

impl DiagnosticLog {
    pub fn new() -> Self {
        Self
    }
}

impl Default for DiagnosticLog {
    fn default() -> Self {
        Self::new()
    }
}

impl TelemetrySink for DiagnosticLog {
    fn name(&self) -> &str {
        "diagnostic-log"
    }

    fn on_record(&mut self, record: &TelemetryRecord) -> SinkResult<()> {
        debug!(
            "packet {} alt {:.1} m, parachute {}",
            record.sequence, record.altitude, record.parachute_deployed
        );
        Ok(())
    }

    fn on_raw(&mut self, line: &RawLine) -> SinkResult<()> {
        info!(target: RAW_TARGET, "{}", line.as_str());
        Ok(())
    }

    fn on_opened(&mut self, endpoint: &str) -> SinkResult<()> {
        info!("link opened on {}", endpoint);
        Ok(())
    }

    fn on_closed(&mut self, closure: &LinkClosure) -> SinkResult<()> {
        match closure {
            LinkClosure::Failed(reason) => warn!("link lost: {}", reason),
            other => info!("link closed: {}", other),
        }
        Ok(())
    }
}
