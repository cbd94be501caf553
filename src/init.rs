use crate::handler::Handler;
use crate::layer::HandlerLayer;
use std::sync::Arc;
use tracing::subscriber::SetGlobalDefaultError;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::Registry;

/// Configuration of the global `tracing` bridge.
///
/// **Fields**
/// - `include_target`: add each event's target as a `target` attribute.
/// - `enable_stdout`: if `true`, a `tracing_subscriber::fmt::Layer` is
///   installed next to [`HandlerLayer`] and events are also printed in
///   human-readable form.
#[derive(Clone, Debug)]
pub struct LayerConfig {
    pub include_target: bool,
    pub enable_stdout: bool,
}

impl Default for LayerConfig {
    fn default() -> Self {
        Self {
            include_target: true,
            enable_stdout: false,
        }
    }
}

/// Error returned when the global subscriber cannot be installed.
#[derive(thiserror::Error, Debug)]
pub enum InitError {
    #[error("failed to install global tracing subscriber: {0}")]
    SetGlobal(#[from] SetGlobalDefaultError),
}

/// Install a [`Registry`] combined with [`HandlerLayer`] as the global
/// default subscriber, so every `tracing` event in the process is written
/// through `handler`.
///
/// Fails if a global subscriber was already set.
pub fn init_tracing_with_config(handler: Arc<dyn Handler>, config: LayerConfig) -> Result<(), InitError> {
    let layer = HandlerLayer::new(handler).with_target(config.include_target);

    // The two subscriber shapes have different types, so each branch
    // installs its own.
    if config.enable_stdout {
        let fmt_layer = tracing_subscriber::fmt::layer();
        let subscriber = Registry::default().with(layer).with(fmt_layer);
        tracing::subscriber::set_global_default(subscriber)?;
    } else {
        let subscriber = Registry::default().with(layer);
        tracing::subscriber::set_global_default(subscriber)?;
    }
    Ok(())
}

/// Initialize tracing with [`LayerConfig::default`].
pub fn init_tracing(handler: Arc<dyn Handler>) -> Result<(), InitError> {
    init_tracing_with_config(handler, LayerConfig::default())
}
