use crate::record::{Level, Record};
use crate::value::Attr;
use std::error::Error;
use std::fmt;
use std::sync::Arc;

/// Error returned by [`Handler::handle`].
#[derive(thiserror::Error, Debug)]
pub enum HandleError {
    #[error("failed to write log record: {0}")]
    Write(#[source] Box<dyn Error + Send + Sync>),
}

/// Backend-agnostic record handler.
///
/// Handlers are immutable values: `with_attrs` and `with_group` return new
/// handlers and leave the receiver untouched, so one handler may be shared
/// across threads while others derive from it.
pub trait Handler: Send + Sync {
    /// Whether a record at `level` would be written. Callers use this to
    /// skip building attributes for suppressed records.
    fn enabled(&self, level: Level) -> bool;

    /// Write `record`, including every attribute and group accumulated by
    /// this handler.
    fn handle(&self, record: &Record) -> Result<(), HandleError>;

    /// Handler whose records also carry `attrs`, qualified by the current
    /// group nesting.
    fn with_attrs(&self, attrs: Vec<Attr>) -> Arc<dyn Handler>;

    /// Handler that nests every later attribute under `name`.
    fn with_group(&self, name: &str) -> Arc<dyn Handler>;
}

/// Front-end for application code: builds records and passes them to a
/// [`Handler`].
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use zslog::{Attr, BackendLogger, Logger, MemorySink, ZslogHandler};
///
/// let sink = MemorySink::new();
/// let logger = Logger::new(ZslogHandler::new(BackendLogger::new(Arc::new(sink.clone()))));
/// logger
///     .with(vec![Attr::new("a", "aa")])
///     .with_group("1")
///     .info("hello", vec![Attr::new("b", "bb")]);
///
/// let out = &sink.json_lines().unwrap()[0];
/// assert_eq!(out["a"], "aa");
/// assert_eq!(out["1"]["b"], "bb");
/// ```
#[derive(Clone)]
pub struct Logger {
    handler: Arc<dyn Handler>,
}

impl Logger {
    pub fn new(handler: impl Handler + 'static) -> Self {
        Logger { handler: Arc::new(handler) }
    }

    pub fn from_handler(handler: Arc<dyn Handler>) -> Self {
        Logger { handler }
    }

    pub fn handler(&self) -> &Arc<dyn Handler> {
        &self.handler
    }

    /// Logger whose records carry `attrs`. Returns a clone of the receiver
    /// when `attrs` is empty.
    pub fn with(&self, attrs: Vec<Attr>) -> Self {
        if attrs.is_empty() {
            return self.clone();
        }
        Logger { handler: self.handler.with_attrs(attrs) }
    }

    /// Logger that nests later attributes under `name`. Returns a clone of
    /// the receiver when `name` is empty.
    pub fn with_group(&self, name: &str) -> Self {
        if name.is_empty() {
            return self.clone();
        }
        Logger { handler: self.handler.with_group(name) }
    }

    pub fn enabled(&self, level: Level) -> bool {
        self.handler.enabled(level)
    }

    /// Build and handle a record, returning any handler error.
    pub fn try_log(&self, level: Level, message: &str, attrs: Vec<Attr>) -> Result<(), HandleError> {
        if !self.handler.enabled(level) {
            return Ok(());
        }
        let mut record = Record::new(level, message);
        record.add_attrs(attrs);
        self.handler.handle(&record)
    }

    /// Build and handle a record. Handler errors are dropped; use
    /// [`try_log`](Self::try_log) to observe them.
    pub fn log(&self, level: Level, message: &str, attrs: Vec<Attr>) {
        let _ = self.try_log(level, message, attrs);
    }

    pub fn debug(&self, message: &str, attrs: Vec<Attr>) {
        self.log(Level::DEBUG, message, attrs);
    }

    pub fn info(&self, message: &str, attrs: Vec<Attr>) {
        self.log(Level::INFO, message, attrs);
    }

    pub fn warn(&self, message: &str, attrs: Vec<Attr>) {
        self.log(Level::WARN, message, attrs);
    }

    pub fn error(&self, message: &str, attrs: Vec<Attr>) {
        self.log(Level::ERROR, message, attrs);
    }
}

impl fmt::Debug for Logger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Logger").finish_non_exhaustive()
    }
}
