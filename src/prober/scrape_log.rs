use std::sync::Arc;

use tracing::Level;

/// Upstream destination for per-probe log lines. The process-wide tracing
/// subscriber sits behind [`TracingSink`]; tests substitute a recording sink.
pub trait LogSink: Send + Sync {
    fn write(&self, level: Level, target: &str, message: &str);
}

/// Forwards to the global tracing subscriber.
pub struct TracingSink;

impl LogSink for TracingSink {
    fn write(&self, level: Level, target: &str, message: &str) {
        match level {
            Level::ERROR => tracing::error!(probe_target = target, "{message}"),
            Level::WARN => tracing::warn!(probe_target = target, "{message}"),
            Level::INFO => tracing::info!(probe_target = target, "{message}"),
            Level::DEBUG => tracing::debug!(probe_target = target, "{message}"),
            Level::TRACE => tracing::trace!(probe_target = target, "{message}"),
        }
    }
}

/// Per-probe logging façade, bound to one target for the lifetime of a
/// request. Whatever severity the caller asks for, the line reaches the
/// shared stream at debug, so per-probe detail stays out of
/// default-visibility logs while remaining available under LOG_LEVEL=debug.
pub struct ScrapeLogger {
    target: String,
    sink: Arc<dyn LogSink>,
}

impl ScrapeLogger {
    pub fn new(target: impl Into<String>, sink: Arc<dyn LogSink>) -> Self {
        ScrapeLogger {
            target: target.into(),
            sink,
        }
    }

    /// Forward one line to the sink with the level rewritten to debug.
    pub fn log(&self, _requested: Level, message: &str) {
        self.sink.write(Level::DEBUG, &self.target, message);
    }

    pub fn info(&self, message: &str) {
        self.log(Level::INFO, message);
    }

    pub fn warn(&self, message: &str) {
        self.log(Level::WARN, message);
    }

    pub fn error(&self, message: &str) {
        self.log(Level::ERROR, message);
    }

    pub fn debug(&self, message: &str) {
        self.log(Level::DEBUG, message);
    }
}
