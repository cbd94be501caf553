use crate::sink::LogSink;
use std::error::Error;

/// A sink that simply drops all lines.
///
/// Useful for measuring the cost of the handler and encoder without any
/// I/O, and for tests that only care about level gating.
#[derive(Clone, Default)]
pub struct NoopSink;

impl LogSink for NoopSink {
    fn write(&self, _line: &[u8]) -> Result<(), Box<dyn Error + Send + Sync>> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::ZslogHandler;
    use crate::backend::BackendLogger;
    use crate::handler::Handler;
    use crate::record::{Level, Record};
    use crate::value::Attr;
    use std::sync::Arc;

    #[test]
    fn test_handle_into_noop_sink() {
        let h = ZslogHandler::new(BackendLogger::new(Arc::new(NoopSink)));
        let mut r = Record::new(Level::WARN, "dropped");
        r.add_attrs(vec![Attr::group("g", vec![Attr::new("k", "v")])]);
        assert!(h.with_group("x").handle(&r).is_ok());
    }
}
