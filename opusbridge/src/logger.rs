//! Logging interface for the bridge.
//!
//! Diagnostics are observability only; nothing in the bridge depends on
//! whether a message was delivered.

use std::sync::Arc;

/// Fixed tag every default log line is filed under.
pub const LOG_TARGET: &str = "opus_bridge";

/// Logger capability injected into a [`Bridge`](crate::Bridge).
///
/// The default implementation forwards to the `tracing` crate.
pub trait Logger: Send + Sync {
    fn error(&self, msg: &str);
    fn warn(&self, msg: &str);
    fn info(&self, msg: &str);
    fn debug(&self, msg: &str);
}

/// Returns the default logger that uses the `tracing` crate.
pub fn default_logger() -> Arc<dyn Logger> {
    Arc::new(TracingLogger)
}

struct TracingLogger;

impl Logger for TracingLogger {
    fn error(&self, msg: &str) {
        tracing::error!(target: LOG_TARGET, "{}", msg);
    }

    fn warn(&self, msg: &str) {
        tracing::warn!(target: LOG_TARGET, "{}", msg);
    }

    fn info(&self, msg: &str) {
        tracing::info!(target: LOG_TARGET, "{}", msg);
    }

    fn debug(&self, msg: &str) {
        tracing::debug!(target: LOG_TARGET, "{}", msg);
    }
}

/// No-op logger that discards all messages.
pub struct NopLogger;

impl Logger for NopLogger {
    fn error(&self, _msg: &str) {}
    fn warn(&self, _msg: &str) {}
    fn info(&self, _msg: &str) {}
    fn debug(&self, _msg: &str) {}
}

macro_rules! log_error {
    ($logger:expr, $($arg:tt)*) => {
        $logger.error(&format!($($arg)*))
    };
}

macro_rules! log_warn {
    ($logger:expr, $($arg:tt)*) => {
        $logger.warn(&format!($($arg)*))
    };
}

macro_rules! log_info {
    ($logger:expr, $($arg:tt)*) => {
        $logger.info(&format!($($arg)*))
    };
}

macro_rules! log_debug {
    ($logger:expr, $($arg:tt)*) => {
        $logger.debug(&format!($($arg)*))
    };
}

pub(crate) use {log_debug, log_error, log_info, log_warn};
