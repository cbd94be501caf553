use std::sync::Arc;
use std::time::Duration;

use zslog::{Attr, BackendConfig, BackendLogger, Logger, WriterSink, ZslogHandler};

fn main() {
    let config = match BackendConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{}", e);
            return;
        }
    };
    let backend = BackendLogger::from_config(Arc::new(WriterSink::stdout()), &config);
    let l = Logger::new(ZslogHandler::new(backend.clone()));

    l.info("hello", vec![Attr::new("a", "aa")]);
    l.with(vec![Attr::new("a", "aa")]).info("hello", vec![Attr::new("b", "bb")]);
    l.with_group("1").with(vec![Attr::new("a", "aa")]).info("hello", vec![]);
    l.with(vec![Attr::new("a", "aa")])
        .with_group("1")
        .with_group("2")
        .with(vec![Attr::new("b", "bb")])
        .info("hello", vec![]);
    l.with_group("1").with_group("2").with_group("3").error("oops", vec![Attr::new("a", "aa")]);
    l.with_group("request")
        .with(vec![Attr::uint("id", 7), Attr::string("path", "/api")])
        .warn(
            "slow request",
            vec![
                Attr::duration("elapsed", Duration::from_millis(1250)),
                Attr::group("db", vec![Attr::int("queries", 12)]),
            ],
        );

    if let Err(e) = backend.flush() {
        eprintln!("{}", e);
    }
}
