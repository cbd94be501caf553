use std::sync::Arc;

use tracing::{error, info, info_span};
use zslog::init::{init_tracing_with_config, LayerConfig};
use zslog::{BackendLevel, BackendLogger, WriterSink, ZslogHandler};

fn main() {
    let backend = BackendLogger::new(Arc::new(WriterSink::stdout())).level(BackendLevel::Debug);
    let config = LayerConfig {
        include_target: true,
        enable_stdout: false,
    };
    if let Err(e) = init_tracing_with_config(Arc::new(ZslogHandler::new(backend)), config) {
        eprintln!("{}", e);
        return;
    }

    info!("starting service");

    let span = info_span!("request", user_id = 42u64);
    let _guard = span.enter();
    error!(reason = "invalid password", "authentication failed");
}
