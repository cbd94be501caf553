//! JSON event encoding for the backend logger.
//!
//! Fields are appended to a byte buffer in call order, so duplicate keys
//! are kept and nothing is re-sorted. [`Event`], [`Context`] and [`Dict`]
//! all accept the same typed setters through the [`Fields`] trait.

use crate::backend::{BackendLevel, BackendLogger, FieldNames};
use crate::sink::LogSink;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use std::error::Error;
use std::sync::Arc;
use std::time::Duration;

/// Append-only JSON object buffer. Always starts with `{`; the closing
/// brace is added when the object is finished.
#[derive(Debug, Clone)]
pub(crate) struct Encoder {
    buf: Vec<u8>,
}

impl Encoder {
    pub(crate) fn new() -> Self {
        Encoder { buf: vec![b'{'] }
    }

    /// Start an object that already contains the given encoded fields.
    pub(crate) fn with_fields(fields: &[u8]) -> Self {
        let mut enc = Encoder::new();
        enc.append_fields(fields);
        enc
    }

    /// Encoded fields without the surrounding braces.
    pub(crate) fn fields(&self) -> &[u8] {
        &self.buf[1..]
    }

    pub(crate) fn append_fields(&mut self, fields: &[u8]) {
        if fields.is_empty() {
            return;
        }
        self.comma();
        self.buf.extend_from_slice(fields);
    }

    fn comma(&mut self) {
        if self.buf.last() != Some(&b'{') {
            self.buf.push(b',');
        }
    }

    fn key(&mut self, key: &str) {
        self.comma();
        self.json(key);
        self.buf.push(b':');
    }

    fn json<T: Serialize + ?Sized>(&mut self, value: &T) {
        // Writing into a Vec only fails for values serde_json cannot
        // represent; keep the document well formed in that case.
        let mark = self.buf.len();
        if serde_json::to_writer(&mut self.buf, value).is_err() {
            self.buf.truncate(mark);
            self.buf.extend_from_slice(b"null");
        }
    }

    pub(crate) fn field<T: Serialize + ?Sized>(&mut self, key: &str, value: &T) {
        self.key(key);
        self.json(value);
    }

    pub(crate) fn dur(&mut self, key: &str, d: Duration) {
        self.field(key, &(d.as_secs_f64() * 1000.0));
    }

    pub(crate) fn time(&mut self, key: &str, t: &DateTime<Utc>) {
        self.field(key, &t.to_rfc3339_opts(SecondsFormat::AutoSi, true));
    }

    pub(crate) fn object(&mut self, key: &str, mut other: Encoder) {
        self.key(key);
        other.buf.push(b'}');
        self.buf.extend_from_slice(&other.buf);
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.buf.len() == 1
    }

    fn finish_line(mut self) -> Vec<u8> {
        self.buf.push(b'}');
        self.buf.push(b'\n');
        self.buf
    }
}

/// Typed field setters shared by every destination the backend offers.
///
/// Setters consume and return the destination so calls chain.
pub trait Fields: Sized {
    fn any(self, key: &str, value: &serde_json::Value) -> Self;
    fn bool(self, key: &str, value: bool) -> Self;
    /// Durations are written as fractional milliseconds.
    fn dur(self, key: &str, value: Duration) -> Self;
    fn f64(self, key: &str, value: f64) -> Self;
    fn i64(self, key: &str, value: i64) -> Self;
    fn str(self, key: &str, value: &str) -> Self;
    /// Timestamps are written as RFC 3339 in UTC.
    fn time(self, key: &str, value: &DateTime<Utc>) -> Self;
    fn u64(self, key: &str, value: u64) -> Self;
    /// Attach a nested object built with [`Dict`].
    fn dict(self, key: &str, dict: Dict) -> Self;
}

macro_rules! impl_fields {
    ($($ty:ty),+) => {
        $(
            impl Fields for $ty {
                fn any(mut self, key: &str, value: &serde_json::Value) -> Self {
                    self.enc.field(key, value);
                    self
                }

                fn bool(mut self, key: &str, value: bool) -> Self {
                    self.enc.field(key, &value);
                    self
                }

                fn dur(mut self, key: &str, value: Duration) -> Self {
                    self.enc.dur(key, value);
                    self
                }

                fn f64(mut self, key: &str, value: f64) -> Self {
                    self.enc.field(key, &value);
                    self
                }

                fn i64(mut self, key: &str, value: i64) -> Self {
                    self.enc.field(key, &value);
                    self
                }

                fn str(mut self, key: &str, value: &str) -> Self {
                    self.enc.field(key, value);
                    self
                }

                fn time(mut self, key: &str, value: &DateTime<Utc>) -> Self {
                    self.enc.time(key, value);
                    self
                }

                fn u64(mut self, key: &str, value: u64) -> Self {
                    self.enc.field(key, &value);
                    self
                }

                fn dict(mut self, key: &str, dict: Dict) -> Self {
                    self.enc.object(key, dict.enc);
                    self
                }
            }
        )+
    };
}

impl_fields!(Event, Context, Dict);

/// A nested object under construction.
#[derive(Debug, Clone)]
pub struct Dict {
    enc: Encoder,
}

impl Dict {
    pub fn new() -> Self {
        Dict { enc: Encoder::new() }
    }

    /// Whether no field has been added yet.
    pub fn is_empty(&self) -> bool {
        self.enc.is_empty()
    }
}

impl Default for Dict {
    fn default() -> Self {
        Self::new()
    }
}

/// A log line in progress, created by [`BackendLogger::with_level`].
///
/// Nothing is written until [`Event::msg`] is called.
pub struct Event {
    enc: Encoder,
    level: BackendLevel,
    sink: Arc<dyn LogSink>,
    names: Arc<FieldNames>,
}

impl Event {
    pub(crate) fn new(
        level: BackendLevel,
        sink: Arc<dyn LogSink>,
        names: Arc<FieldNames>,
        context: &[u8],
    ) -> Self {
        let mut enc = Encoder::new();
        if level != BackendLevel::NoLevel && !names.level.is_empty() {
            enc.field(&names.level, level.as_str());
        }
        enc.append_fields(context);
        Event { enc, level, sink, names }
    }

    pub fn level(&self) -> BackendLevel {
        self.level
    }

    /// Add the configured timestamp field.
    pub fn timestamp(self, t: &DateTime<Utc>) -> Self {
        let names = Arc::clone(&self.names);
        self.time(&names.timestamp, t)
    }

    /// Finish the event with `message` and write it to the sink.
    ///
    /// An empty message adds no message field.
    pub fn msg(mut self, message: &str) -> Result<(), Box<dyn Error + Send + Sync>> {
        if !message.is_empty() {
            self.enc.field(&self.names.message, message);
        }
        let line = self.enc.finish_line();
        self.sink.write(&line)
    }

    /// Finish the event without a message.
    pub fn send(self) -> Result<(), Box<dyn Error + Send + Sync>> {
        self.msg("")
    }
}

/// Fields to pre-attach to every event of a derived logger.
///
/// Obtained from [`BackendLogger::with`]; call [`Context::logger`] to get
/// the logger back.
pub struct Context {
    enc: Encoder,
    logger: BackendLogger,
}

impl Context {
    pub(crate) fn new(logger: BackendLogger) -> Self {
        let enc = Encoder::with_fields(logger.context_fields());
        Context { enc, logger }
    }

    pub fn logger(self) -> BackendLogger {
        self.logger.with_context(self.enc.fields())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::MemorySink;
    use chrono::TimeZone;

    fn event(sink: &MemorySink) -> Event {
        Event::new(
            BackendLevel::Info,
            Arc::new(sink.clone()),
            Arc::new(FieldNames::default()),
            b"",
        )
    }

    #[test]
    fn test_event_encodes_in_order_with_duplicates() {
        let sink = MemorySink::new();
        event(&sink)
            .str("a", "1")
            .i64("a", 2)
            .bool("ok", true)
            .msg("hi")
            .unwrap();
        assert_eq!(
            sink.lines(),
            vec![r#"{"level":"info","a":"1","a":2,"ok":true,"message":"hi"}"#]
        );
    }

    #[test]
    fn test_nested_dicts() {
        let sink = MemorySink::new();
        let inner = Dict::new().u64("n", 7);
        let outer = Dict::new().dict("inner", inner).str("s", "x");
        event(&sink).dict("outer", outer).send().unwrap();
        assert_eq!(
            sink.lines(),
            vec![r#"{"level":"info","outer":{"inner":{"n":7},"s":"x"}}"#]
        );
    }

    #[test]
    fn test_duration_and_time_encoding() {
        let sink = MemorySink::new();
        let t = Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap();
        event(&sink)
            .dur("d", Duration::from_micros(1500))
            .time("t", &t)
            .f64("f", 0.5)
            .send()
            .unwrap();
        let out = &sink.json_lines().unwrap()[0];
        assert_eq!(out["d"], 1.5);
        assert_eq!(out["t"], "2024-01-02T03:04:05Z");
        assert_eq!(out["f"], 0.5);
    }

    #[test]
    fn test_strings_are_escaped() {
        let sink = MemorySink::new();
        event(&sink).str("q\"k", "line\nbreak").send().unwrap();
        let out = &sink.json_lines().unwrap()[0];
        assert_eq!(out["q\"k"], "line\nbreak");
    }

    #[test]
    fn test_non_finite_float_is_null() {
        let sink = MemorySink::new();
        event(&sink).f64("nan", f64::NAN).send().unwrap();
        let out = &sink.json_lines().unwrap()[0];
        assert!(out["nan"].is_null());
    }
}
