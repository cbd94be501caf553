use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::event::{Context, Event};
use crate::sink::LogSink;

/// Severity scale of the backend logger.
///
/// Coarser than the front-end scale: one backend step covers four
/// front-end units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(i8)]
pub enum BackendLevel {
    Trace = -1,
    Debug = 0,
    Info = 1,
    Warn = 2,
    Error = 3,
    Fatal = 4,
    Panic = 5,
    /// Events carry no level field and pass every filter but `Disabled`.
    NoLevel = 6,
    Disabled = 7,
}

impl BackendLevel {
    pub fn as_i8(self) -> i8 {
        self as i8
    }

    /// Convert a numeric level, clamping out-of-range values to the
    /// nearest end of the scale.
    pub fn from_i8(level: i8) -> Self {
        match level {
            i8::MIN..=-1 => BackendLevel::Trace,
            0 => BackendLevel::Debug,
            1 => BackendLevel::Info,
            2 => BackendLevel::Warn,
            3 => BackendLevel::Error,
            4 => BackendLevel::Fatal,
            5 => BackendLevel::Panic,
            6 => BackendLevel::NoLevel,
            _ => BackendLevel::Disabled,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            BackendLevel::Trace => "trace",
            BackendLevel::Debug => "debug",
            BackendLevel::Info => "info",
            BackendLevel::Warn => "warn",
            BackendLevel::Error => "error",
            BackendLevel::Fatal => "fatal",
            BackendLevel::Panic => "panic",
            BackendLevel::NoLevel => "",
            BackendLevel::Disabled => "disabled",
        }
    }
}

impl fmt::Display for BackendLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parse a level name (case-insensitive) or its numeric value.
///
/// Examples: `"info"`, `"WARN"`, `"-1"`, `""` (no level).
pub fn parse_level(s: &str) -> Result<BackendLevel, LevelParseError> {
    let lower = s.trim().to_ascii_lowercase();
    match lower.as_str() {
        "trace" => Ok(BackendLevel::Trace),
        "debug" => Ok(BackendLevel::Debug),
        "info" => Ok(BackendLevel::Info),
        "warn" | "warning" => Ok(BackendLevel::Warn),
        "error" => Ok(BackendLevel::Error),
        "fatal" => Ok(BackendLevel::Fatal),
        "panic" => Ok(BackendLevel::Panic),
        "" => Ok(BackendLevel::NoLevel),
        "disabled" => Ok(BackendLevel::Disabled),
        other => match other.parse::<i8>() {
            Ok(n) if (-1..=7).contains(&n) => Ok(BackendLevel::from_i8(n)),
            _ => Err(LevelParseError::Unknown(s.to_string())),
        },
    }
}

/// Error returned when a level name cannot be parsed.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum LevelParseError {
    #[error("unknown log level {0:?}")]
    Unknown(String),
}

impl Serialize for BackendLevel {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for BackendLevel {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        parse_level(&s).map_err(serde::de::Error::custom)
    }
}

/// Names of the fields the backend writes on its own.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FieldNames {
    pub timestamp: String,
    pub level: String,
    pub message: String,
}

impl Default for FieldNames {
    fn default() -> Self {
        FieldNames {
            timestamp: "time".to_string(),
            level: "level".to_string(),
            message: "message".to_string(),
        }
    }
}

/// Backend logger configuration.
///
/// **Fields**
/// - `level`: minimum level written; events below it are dropped.
/// - `fields`: names of the built-in timestamp, level and message fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    pub level: BackendLevel,
    pub fields: FieldNames,
}

impl Default for BackendConfig {
    fn default() -> Self {
        BackendConfig {
            level: BackendLevel::Trace,
            fields: FieldNames::default(),
        }
    }
}

/// Leveled JSON event logger.
///
/// Cheap to clone; clones share the sink. Derived loggers
/// ([`level`](Self::level), [`with`](Self::with)) never affect the logger
/// they were derived from.
#[derive(Clone)]
pub struct BackendLogger {
    sink: Arc<dyn LogSink>,
    names: Arc<FieldNames>,
    level: BackendLevel,
    context: Arc<[u8]>,
}

impl BackendLogger {
    /// Create a logger writing to `sink` that accepts every level.
    pub fn new(sink: Arc<dyn LogSink>) -> Self {
        Self::from_config(sink, &BackendConfig::default())
    }

    pub fn from_config(sink: Arc<dyn LogSink>, config: &BackendConfig) -> Self {
        BackendLogger {
            sink,
            names: Arc::new(config.fields.clone()),
            level: config.level,
            context: Arc::from(Vec::new()),
        }
    }

    /// Child logger with a different minimum level.
    pub fn level(&self, level: BackendLevel) -> Self {
        BackendLogger { level, ..self.clone() }
    }

    pub fn get_level(&self) -> BackendLevel {
        self.level
    }

    pub fn field_names(&self) -> &FieldNames {
        &self.names
    }

    /// Flush the underlying sink. Events never flush on their own, so a
    /// buffered sink only reaches its destination through this call.
    pub fn flush(&self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        self.sink.flush()
    }

    /// Whether an event at `level` would be written.
    pub fn should(&self, level: BackendLevel) -> bool {
        level != BackendLevel::Disabled && level >= self.level
    }

    /// Start an event at `level`, or `None` if the logger filters it out.
    pub fn with_level(&self, level: BackendLevel) -> Option<Event> {
        if !self.should(level) {
            return None;
        }
        Some(Event::new(
            level,
            Arc::clone(&self.sink),
            Arc::clone(&self.names),
            &self.context,
        ))
    }

    /// Start building fields shared by every event of a derived logger.
    pub fn with(&self) -> Context {
        Context::new(self.clone())
    }

    pub fn trace(&self) -> Option<Event> {
        self.with_level(BackendLevel::Trace)
    }

    pub fn debug(&self) -> Option<Event> {
        self.with_level(BackendLevel::Debug)
    }

    pub fn info(&self) -> Option<Event> {
        self.with_level(BackendLevel::Info)
    }

    pub fn warn(&self) -> Option<Event> {
        self.with_level(BackendLevel::Warn)
    }

    pub fn error(&self) -> Option<Event> {
        self.with_level(BackendLevel::Error)
    }

    pub(crate) fn context_fields(&self) -> &[u8] {
        &self.context
    }

    pub(crate) fn with_context(self, fields: &[u8]) -> Self {
        BackendLogger { context: Arc::from(fields), ..self }
    }
}

impl fmt::Debug for BackendLogger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BackendLogger")
            .field("level", &self.level)
            .field("fields", &self.names)
            .field("context", &String::from_utf8_lossy(&self.context))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::Fields;
    use crate::sink::MemorySink;

    #[test]
    fn test_parse_level() {
        assert_eq!(parse_level("info"), Ok(BackendLevel::Info));
        assert_eq!(parse_level("WARN"), Ok(BackendLevel::Warn));
        assert_eq!(parse_level(" -1 "), Ok(BackendLevel::Trace));
        assert_eq!(parse_level(""), Ok(BackendLevel::NoLevel));
        assert!(parse_level("verbose").is_err());
        assert!(parse_level("9").is_err());
    }

    #[test]
    fn test_from_i8_clamps() {
        assert_eq!(BackendLevel::from_i8(-3), BackendLevel::Trace);
        assert_eq!(BackendLevel::from_i8(2), BackendLevel::Warn);
        assert_eq!(BackendLevel::from_i8(42), BackendLevel::Disabled);
    }

    #[test]
    fn test_level_filtering() {
        let sink = MemorySink::new();
        let logger = BackendLogger::new(Arc::new(sink.clone())).level(BackendLevel::Warn);
        assert!(logger.info().is_none());
        assert!(logger.with_level(BackendLevel::Disabled).is_none());
        logger.error().unwrap().msg("boom").unwrap();
        logger.with_level(BackendLevel::NoLevel).unwrap().msg("plain").unwrap();
        assert_eq!(
            sink.lines(),
            vec![r#"{"level":"error","message":"boom"}"#, r#"{"message":"plain"}"#]
        );
    }

    #[test]
    fn test_context_fields_are_prepended() {
        let sink = MemorySink::new();
        let base = BackendLogger::new(Arc::new(sink.clone()));
        let svc = base.with().str("service", "api").logger();
        let req = svc.with().u64("req", 7).logger();
        req.info().unwrap().str("k", "v").msg("m").unwrap();
        base.info().unwrap().msg("plain").unwrap();
        assert_eq!(
            sink.lines(),
            vec![
                r#"{"level":"info","service":"api","req":7,"k":"v","message":"m"}"#,
                r#"{"level":"info","message":"plain"}"#,
            ]
        );
    }

    #[test]
    fn test_custom_field_names() {
        let sink = MemorySink::new();
        let config: BackendConfig = serde_json::from_str(
            r#"{"level":"debug","fields":{"message":"msg","level":"lvl"}}"#,
        )
        .unwrap();
        assert_eq!(config.level, BackendLevel::Debug);
        assert_eq!(config.fields.timestamp, "time");
        let logger = BackendLogger::from_config(Arc::new(sink.clone()), &config);
        assert!(logger.trace().is_none());
        logger.debug().unwrap().msg("x").unwrap();
        assert_eq!(sink.lines(), vec![r#"{"lvl":"debug","msg":"x"}"#]);
    }

    #[test]
    fn test_flush_reaches_buffered_writer() {
        use crate::sink::WriterSink;
        use std::io::{BufWriter, Write};
        use std::sync::Mutex;

        #[derive(Clone, Default)]
        struct Shared(Arc<Mutex<Vec<u8>>>);

        impl Write for Shared {
            fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
                self.0.lock().unwrap().extend_from_slice(buf);
                Ok(buf.len())
            }

            fn flush(&mut self) -> std::io::Result<()> {
                Ok(())
            }
        }

        let out = Shared::default();
        let sink = WriterSink::new(BufWriter::new(out.clone()));
        let logger = BackendLogger::new(Arc::new(sink));
        logger.info().unwrap().msg("buffered").unwrap();
        assert!(out.0.lock().unwrap().is_empty());
        logger.flush().unwrap();
        assert_eq!(
            String::from_utf8(out.0.lock().unwrap().clone()).unwrap(),
            "{\"level\":\"info\",\"message\":\"buffered\"}\n"
        );
    }
}
