use crate::handler::Handler;
use crate::record::{Level as RecordLevel, Record};
use crate::value::{Attr, Value};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::field::{Field, Visit};
use tracing::span::{Attributes, Id, Record as SpanRecord};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::{Context, Layer};
use tracing_subscriber::registry::LookupSpan;

/// `tracing_subscriber` layer that turns `tracing` events into records
/// and passes them to a [`Handler`].
///
/// Every span enclosing an event becomes a group named after the span,
/// holding the span's fields, outermost span first. Event fields become
/// record attributes and the `message` field becomes the record message.
pub struct HandlerLayer {
    handler: Arc<dyn Handler>,
    include_target: bool,
    /// Total events seen by the layer (before level gating).
    pub total_events: Arc<AtomicU64>,
    /// Events passed to the handler successfully.
    pub handled_events: Arc<AtomicU64>,
    /// Events the handler failed to write.
    pub failed_events: Arc<AtomicU64>,
}

impl HandlerLayer {
    pub fn new(handler: Arc<dyn Handler>) -> Self {
        HandlerLayer {
            handler,
            include_target: false,
            total_events: Arc::new(AtomicU64::new(0)),
            handled_events: Arc::new(AtomicU64::new(0)),
            failed_events: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Add the event's target as a top-level `target` attribute.
    pub fn with_target(mut self, include: bool) -> Self {
        self.include_target = include;
        self
    }
}

/// Map a `tracing` level onto the record level scale.
pub fn record_level(level: &Level) -> RecordLevel {
    if *level == Level::ERROR {
        RecordLevel::ERROR
    } else if *level == Level::WARN {
        RecordLevel::WARN
    } else if *level == Level::INFO {
        RecordLevel::INFO
    } else if *level == Level::DEBUG {
        RecordLevel::DEBUG
    } else {
        RecordLevel(RecordLevel::DEBUG.0 - 4)
    }
}

/// Span fields stored in the span's extensions.
struct SpanAttrs(Vec<Attr>);

impl<S> Layer<S> for HandlerLayer
where
    S: Subscriber + for<'span> LookupSpan<'span>,
{
    fn on_new_span(&self, attrs: &Attributes<'_>, id: &Id, ctx: Context<'_, S>) {
        let Some(span) = ctx.span(id) else {
            return;
        };
        let mut fields = Vec::new();
        attrs.record(&mut FieldVisitor { attrs: &mut fields, message: None });
        span.extensions_mut().insert(SpanAttrs(fields));
    }

    fn on_record(&self, id: &Id, values: &SpanRecord<'_>, ctx: Context<'_, S>) {
        let Some(span) = ctx.span(id) else {
            return;
        };
        let mut updates = Vec::new();
        values.record(&mut FieldVisitor { attrs: &mut updates, message: None });
        let mut ext = span.extensions_mut();
        if let Some(SpanAttrs(fields)) = ext.get_mut::<SpanAttrs>() {
            // Recording a field again replaces its value.
            for attr in updates {
                match fields.iter_mut().find(|a| a.key == attr.key) {
                    Some(existing) => *existing = attr,
                    None => fields.push(attr),
                }
            }
        }
    }

    fn on_event(&self, event: &Event<'_>, ctx: Context<'_, S>) {
        self.total_events.fetch_add(1, Ordering::Relaxed);
        let meta = event.metadata();
        let level = record_level(meta.level());
        if !self.handler.enabled(level) {
            return;
        }

        let mut handler = if self.include_target {
            self.handler.with_attrs(vec![Attr::string("target", meta.target())])
        } else {
            Arc::clone(&self.handler)
        };
        if let Some(scope) = ctx.event_scope(event) {
            for span in scope.from_root() {
                handler = handler.with_group(span.name());
                let ext = span.extensions();
                if let Some(SpanAttrs(fields)) = ext.get::<SpanAttrs>() {
                    if !fields.is_empty() {
                        handler = handler.with_attrs(fields.clone());
                    }
                }
            }
        }

        let mut attrs = Vec::new();
        let mut message = None;
        event.record(&mut FieldVisitor { attrs: &mut attrs, message: Some(&mut message) });

        let mut record = Record::new(level, message.unwrap_or_default());
        record.add_attrs(attrs);
        match handler.handle(&record) {
            Ok(()) => {
                self.handled_events.fetch_add(1, Ordering::Relaxed);
            }
            Err(e) => {
                self.failed_events.fetch_add(1, Ordering::Relaxed);
                eprintln!("error writing log record: {}", e);
            }
        }
    }
}

/// Collects `tracing` fields as typed attributes.
///
/// When `message` is set the `message` field is captured there instead
/// of becoming an attribute.
pub struct FieldVisitor<'a> {
    pub attrs: &'a mut Vec<Attr>,
    pub message: Option<&'a mut Option<String>>,
}

impl<'a> FieldVisitor<'a> {
    fn push(&mut self, field: &Field, attr: Attr) {
        if field.name() == "message" {
            if let (Some(message), Value::String(s)) = (self.message.as_deref_mut(), &attr.value) {
                *message = Some(s.clone());
                return;
            }
        }
        self.attrs.push(attr);
    }
}

impl<'a> Visit for FieldVisitor<'a> {
    fn record_f64(&mut self, field: &Field, value: f64) {
        self.push(field, Attr::float(field.name(), value));
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.push(field, Attr::int(field.name(), value));
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.push(field, Attr::uint(field.name(), value));
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.push(field, Attr::bool(field.name(), value));
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        self.push(field, Attr::string(field.name(), value));
    }

    fn record_error(&mut self, field: &Field, value: &(dyn std::error::Error + 'static)) {
        self.push(field, Attr::string(field.name(), value.to_string()));
    }

    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        self.push(field, Attr::string(field.name(), format!("{:?}", value)));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::ZslogHandler;
    use crate::backend::{BackendLevel, BackendLogger};
    use crate::sink::MemorySink;
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::Registry;

    fn layer(sink: &MemorySink, level: BackendLevel) -> HandlerLayer {
        let backend = BackendLogger::new(Arc::new(sink.clone())).level(level);
        HandlerLayer::new(Arc::new(ZslogHandler::new(backend)))
    }

    #[test]
    fn test_level_mapping() {
        assert_eq!(record_level(&Level::ERROR), RecordLevel::ERROR);
        assert_eq!(record_level(&Level::INFO), RecordLevel::INFO);
        assert_eq!(record_level(&Level::TRACE), RecordLevel(-8));
    }

    #[test]
    fn test_event_fields_and_message() {
        let sink = MemorySink::new();
        let layer = layer(&sink, BackendLevel::Trace).with_target(true);
        let subscriber = Registry::default().with(layer);
        tracing::subscriber::with_default(subscriber, || {
            tracing::warn!(user_id = 42u64, ok = false, reason = "bad", "login failed");
        });
        let out = &sink.json_lines().unwrap()[0];
        assert_eq!(out["level"], "warn");
        assert_eq!(out["message"], "login failed");
        assert_eq!(out["user_id"], 42);
        assert_eq!(out["ok"], false);
        assert_eq!(out["reason"], "bad");
        assert!(out["target"].as_str().unwrap().starts_with("zslog"));
        assert!(out.contains_key("time"));
    }

    #[test]
    fn test_spans_become_nested_groups() {
        let sink = MemorySink::new();
        let subscriber = Registry::default().with(layer(&sink, BackendLevel::Trace));
        tracing::subscriber::with_default(subscriber, || {
            let outer = tracing::info_span!("request", id = 7u64);
            let _o = outer.enter();
            let inner = tracing::info_span!("db", table = tracing::field::Empty);
            inner.record("table", "users");
            let _i = inner.enter();
            tracing::info!(rows = 3i64, "query done");
        });
        let out = &sink.json_lines().unwrap()[0];
        assert_eq!(out["request"]["id"], 7);
        assert_eq!(out["request"]["db"]["table"], "users");
        assert_eq!(out["request"]["db"]["rows"], 3);
        assert_eq!(out["message"], "query done");
    }

    #[test]
    fn test_gated_events_are_not_handled() {
        let sink = MemorySink::new();
        let layer = layer(&sink, BackendLevel::Error);
        let total = Arc::clone(&layer.total_events);
        let handled = Arc::clone(&layer.handled_events);
        let subscriber = Registry::default().with(layer);
        tracing::subscriber::with_default(subscriber, || {
            tracing::info!("dropped");
            tracing::error!("dropped at the minimum");
        });
        assert_eq!(total.load(Ordering::Relaxed), 2);
        assert_eq!(handled.load(Ordering::Relaxed), 0);
        assert!(sink.lines().is_empty());

        let sink = MemorySink::new();
        let layer = self::layer(&sink, BackendLevel::Warn);
        let handled = Arc::clone(&layer.handled_events);
        let subscriber = Registry::default().with(layer);
        tracing::subscriber::with_default(subscriber, || {
            tracing::warn!("dropped");
            tracing::error!("kept");
        });
        assert_eq!(handled.load(Ordering::Relaxed), 1);
        let out = sink.json_lines().unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0]["message"], "kept");
    }

    #[test]
    fn test_span_record_overwrites_field() {
        let sink = MemorySink::new();
        let subscriber = Registry::default().with(layer(&sink, BackendLevel::Trace));
        tracing::subscriber::with_default(subscriber, || {
            let span = tracing::info_span!("s", n = 1i64, other = "x");
            span.record("n", 2i64);
            let _g = span.enter();
            tracing::info!("inside");
        });
        let line = &sink.lines()[0];
        assert_eq!(line.matches(r#""n":"#).count(), 1);
        let out = &sink.json_lines().unwrap()[0];
        assert_eq!(out["s"]["n"], 2);
        assert_eq!(out["s"]["other"], "x");
    }
}
