//! Injectable logging. The store holds an `Arc<dyn Sink>` instead of
//! touching any process-wide logger, per the design note that the
//! source's singleton logger should become an injected sink/trait
//! parameter rather than global state in the core.

use std::fmt;
use std::sync::Arc;

/// Severity of a single log event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    /// Diagnostic detail, off by default in most sinks.
    Debug,
    /// Routine operational events (open, close, rotate).
    Info,
    /// Recoverable anomalies (ledger self-heal truncation).
    Warn,
    /// Operation failed.
    Error,
}

/// A destination for store log events. Implementors decide format and
/// routing; the store only ever calls [`Sink::log`].
pub trait Sink: Send + Sync {
    /// Records one event at `level` with message `msg`.
    fn log(&self, level: Level, msg: &str);
}

/// Default sink: discards everything. Keeps the core free of any
/// ambient logging behavior when the caller doesn't want one.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopSink;

impl Sink for NoopSink {
    fn log(&self, _level: Level, _msg: &str) {}
}

/// Forwards events to the `tracing` crate. Enabled with the
/// `tracing` feature; does not install a global subscriber itself —
/// the caller's own `tracing` setup receives these events.
#[cfg(feature = "tracing")]
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

#[cfg(feature = "tracing")]
impl Sink for TracingSink {
    fn log(&self, level: Level, msg: &str) {
        match level {
            Level::Debug => tracing::debug!("{msg}"),
            Level::Info => tracing::info!("{msg}"),
            Level::Warn => tracing::warn!("{msg}"),
            Level::Error => tracing::error!("{msg}"),
        }
    }
}

/// A shared handle to the configured sink, with a convenience
/// formatting method mirroring `tracing`'s macro ergonomics.
#[derive(Clone)]
pub(crate) struct Logger(pub(crate) Arc<dyn Sink>);

impl Logger {
    pub(crate) fn noop() -> Self {
        Self(Arc::new(NoopSink))
    }

    pub(crate) fn log(&self, level: Level, args: fmt::Arguments<'_>) {
        self.0.log(level, &args.to_string());
    }
}

macro_rules! log_info {
    ($logger:expr, $($arg:tt)*) => {
        $logger.log($crate::logging::Level::Info, format_args!($($arg)*))
    };
}
macro_rules! log_warn {
    ($logger:expr, $($arg:tt)*) => {
        $logger.log($crate::logging::Level::Warn, format_args!($($arg)*))
    };
}

pub(crate) use log_info;
pub(crate) use log_warn;
