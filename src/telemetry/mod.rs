//! Telemetry for the guard.
//!
//! Structured logging, security event logging and metric counters.
//! Everything goes to the local tracing subscriber and the `metrics` facade;
//! nothing here opens a network connection.

mod logging;
mod metrics;
pub mod security_log;

pub use logging::{init_logging, LogConfig, LogError, LogFormat};
pub use self::metrics::{init_metrics, record_audit_evictions, record_decision, record_redactions};
pub use security_log::{log_security_event, SecurityEvent, SecuritySeverity};
