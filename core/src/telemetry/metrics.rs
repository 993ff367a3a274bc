use serde::{Deserialize, Serialize};
use std::sync::Mutex;

/// Link counters shared by the reader and the fan-out.
pub struct LinkMetrics {
    inner: Mutex<LinkStats>,
}

/// Point-in-time copy of the link counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkStats {
    pub lines: u64,
    pub packets: u64,
    pub rejected: u64,
    pub delivered: u64,
    pub failed: u64,
    pub dropped: u64,
}

impl LinkMetrics {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(LinkStats::default()),
        }
    }

    pub fn record_line(&self) {
        self.update(|stats| stats.lines += 1);
    }

    pub fn record_packet(&self) {
        self.update(|stats| stats.packets += 1);
    }

    pub fn record_rejected(&self) {
        self.update(|stats| stats.rejected += 1);
    }

    pub fn record_delivered(&self) {
        self.update(|stats| stats.delivered += 1);
    }

    pub fn record_failed(&self) {
        self.update(|stats| stats.failed += 1);
    }

    pub fn record_dropped(&self) {
        self.update(|stats| stats.dropped += 1);
    }

    pub fn snapshot(&self) -> LinkStats {
        if let Ok(stats) = self.inner.lock() {
            *stats
        } else {
            LinkStats::default()
        }
    }

    fn update(&self, apply: impl FnOnce(&mut LinkStats)) {
        if let Ok(mut stats) = self.inner.lock() {
            apply(&mut stats);
        }
    }
}

impl Default for LinkMetrics {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_accumulate_independently() {
        let metrics = LinkMetrics::new();
        metrics.record_line();
        metrics.record_line();
        metrics.record_packet();
        metrics.record_rejected();
        metrics.record_dropped();
        let stats = metrics.snapshot();
        assert_eq!(stats.lines, 2);
        assert_eq!(stats.packets, 1);
        assert_eq!(stats.rejected, 1);
        assert_eq!(stats.delivered, 0);
        assert_eq!(stats.dropped, 1);
    }
}
