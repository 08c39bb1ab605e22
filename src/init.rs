use crate::appender::{RingSink, SinkError};
use crate::backend::{make_store_from_config, parse_dsn, BackendBuildError, DsnError};
use crate::config::{ConfigError, SinkConfig};
use crate::env::{env_or, RING_LOG_SINK_DSN_ENV};
use crate::layer::RingSinkLayer;
use crate::store::DocumentStore;
use std::sync::Arc;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::Registry;

/// Configuration of the global logging setup.
///
/// **Fields**
/// - `sink`: [`SinkConfig`] for the buffered store sink (capacity,
///   overflow window, shutdown timeout, filtering).
/// - `enable_stdout`: if `true`, a `tracing_subscriber::fmt::Layer` is
///   added on top of [`RingSinkLayer`] so events are also printed to the
///   console.
#[derive(Clone, Debug)]
pub struct LayerConfig {
    pub sink: SinkConfig,
    pub enable_stdout: bool,
}

impl Default for LayerConfig {
    fn default() -> Self {
        Self {
            sink: SinkConfig::default(),
            enable_stdout: true,
        }
    }
}

/// Error returned by [`init_tracing_with_config`].
#[derive(thiserror::Error, Debug)]
pub enum InitError {
    #[error(transparent)]
    Sink(#[from] SinkError),

    #[error("a global tracing subscriber is already installed")]
    AlreadyInstalled(#[from] tracing::subscriber::SetGlobalDefaultError),

    #[error("invalid RING_LOG_SINK_DSN: {0}")]
    Dsn(#[from] DsnError),

    #[error(transparent)]
    Backend(#[from] BackendBuildError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Start a [`RingSink`] over `store` and install it as the global
/// `tracing` subscriber.
///
/// **Returns**
/// - the running sink; call [`RingSink::close`] on it before the process
///   exits so the buffer gets drained.
pub fn init_tracing_with_config(
    store: Arc<dyn DocumentStore>,
    config: LayerConfig,
) -> Result<Arc<RingSink>, InitError> {
    let sink = Arc::new(RingSink::start(config.sink, store)?);
    let layer = RingSinkLayer::new(Arc::clone(&sink));

    // The two subscriber shapes have different types, hence two calls.
    if config.enable_stdout {
        let fmt_layer = tracing_subscriber::fmt::layer();
        let subscriber = Registry::default().with(layer).with(fmt_layer);
        tracing::subscriber::set_global_default(subscriber)?;
    } else {
        let subscriber = Registry::default().with(layer);
        tracing::subscriber::set_global_default(subscriber)?;
    }

    Ok(sink)
}

/// Initialize tracing with sensible defaults.
///
/// Equivalent to calling [`init_tracing_with_config`] with
/// [`LayerConfig::default`].
pub fn init_tracing(store: Arc<dyn DocumentStore>) -> Result<Arc<RingSink>, InitError> {
    init_tracing_with_config(store, LayerConfig::default())
}

/// Build both the store and the sink configuration from `RING_LOG_SINK_*`
/// environment variables, then install tracing.
///
/// Without `RING_LOG_SINK_DSN` events go to a [`NoopStore`].
///
/// [`NoopStore`]: crate::noop_store::NoopStore
pub fn init_tracing_from_env() -> Result<Arc<RingSink>, InitError> {
    let backend = parse_dsn(&env_or(RING_LOG_SINK_DSN_ENV, "noop://"))?;
    let store = make_store_from_config(&backend)?;
    let config = LayerConfig {
        sink: SinkConfig::from_env()?,
        ..LayerConfig::default()
    };
    init_tracing_with_config(store, config)
}
