//! Structured-logging handler backed by a leveled JSON event logger.
//!
//! Application code logs through [`Logger`] / [`Handler`]; [`ZslogHandler`]
//! translates each [`Record`] with its attributes and nested groups into a
//! [`BackendLogger`] event and writes it to a [`LogSink`].

pub mod value;
pub mod record;
pub mod handler;
pub mod adapter;

pub mod backend;
pub mod event;
pub mod sink;
pub mod noop_sink;
pub mod env;

pub mod handlertest;

#[cfg(feature = "tracing-bridge")]
pub mod layer;
#[cfg(feature = "tracing-bridge")]
pub mod init;

pub use adapter::ZslogHandler;
pub use backend::{BackendConfig, BackendLevel, BackendLogger};
pub use handler::{HandleError, Handler, Logger};
pub use record::{Level, Record};
pub use sink::{LogSink, MemorySink, WriterSink};
pub use value::{Attr, LogValuer, Value};
