pub mod log;
pub mod metrics;

pub use self::log::DiagnosticLog;
pub use metrics::{LinkMetrics, LinkStats};
