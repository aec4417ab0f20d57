//! Structured logging and crate-wide metrics.

pub mod logging;
pub mod telemetry;

pub use logging::{ActivityLog, LedgerRef, LogLevel, LoggingError};
pub use telemetry::TallyMetrics;
