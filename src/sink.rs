use std::error::Error;
use std::io::{self, Write};
use std::sync::{Arc, Mutex};

/// Destination for encoded log lines produced by the backend logger.
///
/// Each call to [`write`](LogSink::write) receives one complete JSON object
/// terminated by a newline. Implementations must be safe to call from many
/// threads at once: the handler adds no synchronization of its own.
pub trait LogSink: Send + Sync {
    /// Write a single encoded line.
    ///
    /// **Returns**
    /// - `Ok(())` if the line was accepted.
    /// - `Err(..)` if the destination failed; the error is handed back to
    ///   whoever called `Handler::handle`.
    fn write(&self, line: &[u8]) -> Result<(), Box<dyn Error + Send + Sync>>;

    /// Flush any buffered lines. Default implementation is a no-op.
    ///
    /// Loggers never call this while writing events; callers flush through
    /// `BackendLogger::flush` or `ZslogHandler::flush`.
    fn flush(&self) -> Result<(), Box<dyn Error + Send + Sync>> {
        Ok(())
    }
}

/// Sink over any [`Write`] implementation, serialized by a mutex.
pub struct WriterSink<W> {
    writer: Mutex<W>,
}

impl<W: Write + Send> WriterSink<W> {
    pub fn new(writer: W) -> Self {
        WriterSink { writer: Mutex::new(writer) }
    }
}

impl WriterSink<io::Stdout> {
    pub fn stdout() -> Self {
        WriterSink::new(io::stdout())
    }
}

impl WriterSink<io::Stderr> {
    pub fn stderr() -> Self {
        WriterSink::new(io::stderr())
    }
}

impl<W: Write + Send> LogSink for WriterSink<W> {
    fn write(&self, line: &[u8]) -> Result<(), Box<dyn Error + Send + Sync>> {
        let mut guard = self
            .writer
            .lock()
            .map_err(|_| "log writer mutex poisoned")?;
        guard.write_all(line)?;
        Ok(())
    }

    fn flush(&self) -> Result<(), Box<dyn Error + Send + Sync>> {
        let mut guard = self
            .writer
            .lock()
            .map_err(|_| "log writer mutex poisoned")?;
        guard.flush()?;
        Ok(())
    }
}

/// In-memory sink that keeps every written line.
///
/// Clones share the same buffer, so a test can hand one clone to the
/// logger and inspect the output through another.
#[derive(Clone, Default)]
pub struct MemorySink {
    buf: Arc<Mutex<Vec<u8>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything written so far, lossily decoded as UTF-8.
    pub fn contents(&self) -> String {
        match self.buf.lock() {
            Ok(buf) => String::from_utf8_lossy(&buf).into_owned(),
            Err(poisoned) => String::from_utf8_lossy(&poisoned.into_inner()).into_owned(),
        }
    }

    /// Written lines without their trailing newline.
    pub fn lines(&self) -> Vec<String> {
        self.contents().lines().map(|l| l.to_string()).collect()
    }

    /// Written lines parsed as JSON objects. Lines that fail to parse are
    /// reported as errors.
    pub fn json_lines(&self) -> Result<Vec<serde_json::Map<String, serde_json::Value>>, serde_json::Error> {
        self.lines()
            .iter()
            .map(|l| serde_json::from_str::<serde_json::Map<String, serde_json::Value>>(l))
            .collect()
    }

    pub fn clear(&self) {
        if let Ok(mut buf) = self.buf.lock() {
            buf.clear();
        }
    }
}

impl LogSink for MemorySink {
    fn write(&self, line: &[u8]) -> Result<(), Box<dyn Error + Send + Sync>> {
        let mut buf = self.buf.lock().map_err(|_| "memory sink mutex poisoned")?;
        buf.extend_from_slice(line);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_sink_shares_buffer() {
        let sink = MemorySink::new();
        let other = sink.clone();
        sink.write(b"{\"a\":1}\n").unwrap();
        other.write(b"{\"b\":2}\n").unwrap();
        assert_eq!(sink.lines(), vec!["{\"a\":1}", "{\"b\":2}"]);
        let parsed = other.json_lines().unwrap();
        assert_eq!(parsed[1]["b"], 2);
        sink.clear();
        assert!(other.lines().is_empty());
    }

    #[test]
    fn test_writer_sink_writes_through() {
        let sink = WriterSink::new(Vec::new());
        sink.write(b"line\n").unwrap();
        sink.flush().unwrap();
        let inner = sink.writer.into_inner().unwrap();
        assert_eq!(inner, b"line\n");
    }
}
