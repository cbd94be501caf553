#![cfg(feature = "tracing-bridge")]

use std::sync::Arc;

use zslog::init::{init_tracing, init_tracing_with_config, InitError, LayerConfig};
use zslog::{BackendLevel, BackendLogger, MemorySink, ZslogHandler};

// Installing a global subscriber is process-wide, so this file holds a
// single test.
#[test]
fn global_subscriber_routes_events_through_handler() {
    let sink = MemorySink::new();
    let backend = BackendLogger::new(Arc::new(sink.clone())).level(BackendLevel::Info);
    init_tracing(Arc::new(ZslogHandler::new(backend))).unwrap();

    tracing::debug!("filtered");
    {
        let span = tracing::info_span!("job", id = 3u64);
        let _guard = span.enter();
        tracing::error!(attempt = 2i64, "job failed");
    }

    let out = sink.json_lines().unwrap();
    assert_eq!(out.len(), 1);
    assert_eq!(out[0]["level"], "error");
    assert_eq!(out[0]["message"], "job failed");
    assert_eq!(out[0]["job"]["id"], 3);
    assert_eq!(out[0]["job"]["attempt"], 2);
    assert_eq!(out[0]["target"], "init");

    let again = init_tracing_with_config(
        Arc::new(ZslogHandler::new(BackendLogger::new(Arc::new(sink.clone())))),
        LayerConfig::default(),
    );
    assert!(matches!(again, Err(InitError::SetGlobal(_))));
}
