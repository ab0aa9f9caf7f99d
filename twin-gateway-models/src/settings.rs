use config::{Config, File};
use serde::Deserialize;
use std::{ops::Deref, sync::Arc};
use twin_gateway_error::TGResult;

/// Immutable, cheaply-cloneable gateway settings.
#[derive(Debug, Clone)]
pub struct Settings(Arc<Inner>);

impl Deref for Settings {
    type Target = Inner;
    fn deref(&self) -> &Self::Target {
        self.0.as_ref()
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self(Arc::new(Inner::default()))
    }
}

impl From<Inner> for Settings {
    fn from(inner: Inner) -> Self {
        Self(Arc::new(inner))
    }
}

impl Settings {
    /// Load settings from an optional file plus `TWIN__*` environment
    /// overrides (e.g. `TWIN__SESSION__DEFAULT_TTL_MS=60000`).
    pub fn new(config_path: &str) -> TGResult<Self> {
        let builder = Config::builder()
            .add_source(File::with_name(config_path).required(false))
            .add_source(
                config::Environment::with_prefix("TWIN")
                    .separator("__")
                    .try_parsing(true),
            );
        let inner: Inner = builder.build()?.try_deserialize()?;
        Ok(Self(Arc::new(inner)))
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Inner {
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub session: SessionConfig,
}

/// Command execution engine configuration.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct EngineConfig {
    /// Bounded command queue capacity; submitters back-pressure when full.
    #[serde(default = "EngineConfig::queue_capacity_default")]
    pub queue_capacity: usize,
    /// Grace period for draining queued commands at shutdown.
    #[serde(default = "EngineConfig::shutdown_timeout_ms_default")]
    pub shutdown_timeout_ms: u64,
}

impl EngineConfig {
    fn queue_capacity_default() -> usize {
        1024
    }

    fn shutdown_timeout_ms_default() -> u64 {
        5_000
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            queue_capacity: Self::queue_capacity_default(),
            shutdown_timeout_ms: Self::shutdown_timeout_ms_default(),
        }
    }
}

/// Session lifecycle configuration.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct SessionConfig {
    /// Time-to-live applied to newly created sessions.
    #[serde(default = "SessionConfig::default_ttl_ms_default")]
    pub default_ttl_ms: u64,
}

impl SessionConfig {
    fn default_ttl_ms_default() -> u64 {
        600_000
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            default_ttl_ms: Self::default_ttl_ms_default(),
        }
    }
}
