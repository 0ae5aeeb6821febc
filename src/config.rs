//! Runtime bootstrap configuration.
//!
//! Grounded on `cloud-service/src/config.rs` (`CloudServiceConfig`,
//! `SafeDisplay`, a `make_config_loader()` free function returning a loader
//! keyed to a default TOML path) and the workspace's `figment = { features =
//! ["toml", "env"] }` dependency. `golem_common::config::ConfigLoader` isn't
//! available to depend on here (no full source was retrieved for
//! `golem-common`), so its layering behavior — defaults, then an optional
//! file, then environment overrides — is reproduced directly on `figment`.

use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::RuntimeError;
use crate::telemetry::TracingConfig;

/// Tunables for one [`crate::pool::WorkerPool`], per spec section 4.2.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct PoolConfig {
    /// Threads kept alive even when idle.
    pub core_size: usize,
    /// Hard ceiling on concurrently live threads.
    pub max_size: usize,
    /// How long an above-`core_size` thread may sit idle before exiting.
    #[serde(with = "humantime_serde")]
    pub keep_alive: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        PoolConfig {
            core_size: 2,
            max_size: 16,
            keep_alive: Duration::from_secs(60),
        }
    }
}

/// Top-level configuration for embedding this crate's runtime.
///
/// Spec section 6 lists the abstract configuration keys this maps to:
/// thread-pool core/max/keep-alive, the static-pool equivalents, the
/// shutdown poll interval, and the HTTP log tag.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RuntimeConfig {
    pub pools: PoolConfig,
    pub static_pool: PoolConfig,
    #[serde(with = "humantime_serde")]
    pub shutdown_poll_interval: Duration,
    pub http_log_tag: String,
    pub tracing: TracingConfig,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        RuntimeConfig {
            pools: PoolConfig::default(),
            static_pool: PoolConfig {
                core_size: 1,
                max_size: 8,
                keep_alive: Duration::from_secs(30),
            },
            shutdown_poll_interval: Duration::from_millis(100),
            http_log_tag: "http".to_string(),
            tracing: TracingConfig::default(),
        }
    }
}

impl RuntimeConfig {
    /// Human-readable rendering safe to log at startup (no secrets live in
    /// this config today, but the method exists so one can be added later
    /// without touching call sites — mirrors `SafeDisplay` in the corpus).
    pub fn to_safe_string(&self) -> String {
        format!(
            "pools: core={} max={} keep_alive={:?} | static_pool: core={} max={} keep_alive={:?} | shutdown_poll_interval={:?} | http_log_tag={}",
            self.pools.core_size,
            self.pools.max_size,
            self.pools.keep_alive,
            self.static_pool.core_size,
            self.static_pool.max_size,
            self.static_pool.keep_alive,
            self.shutdown_poll_interval,
            self.http_log_tag,
        )
    }
}

/// Loads a [`RuntimeConfig`] by layering, in ascending precedence:
/// compiled-in defaults, an optional TOML file, and `SERVITOR_`-prefixed
/// environment variables — the same two `figment` providers
/// (`Toml`, `Env`) the reference corpus enables in its workspace
/// `Cargo.toml`.
pub struct ConfigLoader {
    file_path: PathBuf,
    env_prefix: String,
}

impl ConfigLoader {
    pub fn new(file_path: impl Into<PathBuf>) -> Self {
        ConfigLoader {
            file_path: file_path.into(),
            env_prefix: "SERVITOR_".to_string(),
        }
    }

    pub fn load(&self) -> Result<RuntimeConfig, RuntimeError> {
        let mut figment = Figment::from(Serialized::defaults(RuntimeConfig::default()));
        if self.file_path.exists() {
            figment = figment.merge(Toml::file(&self.file_path));
        }
        figment = figment.merge(Env::prefixed(&self.env_prefix).split("__"));
        figment
            .extract()
            .map_err(|err| RuntimeError::bad_argument(format!("config load failed: {err}")))
    }
}

pub fn make_config_loader() -> ConfigLoader {
    ConfigLoader::new(Path::new("config/servitor.toml"))
}

/// The narrow seam spec section 1/6 leaves for an external system-properties
/// store: a key-value provider the embedding application supplies, used to
/// resolve the abstract configuration keys spec section 6 names (thread
/// pool sizes, keep-alive, HTTP log tag) when an embedder wants those
/// driven by *their* configuration system rather than this crate's own
/// `RuntimeConfig`. This crate never implements a concrete store — only
/// the trait other collaborators (the out-of-scope system-properties
/// store) are expected to satisfy.
pub trait ConfigSource: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
}

/// A [`ConfigSource`] that always answers `None`, used as the default when
/// no embedder-supplied store is configured.
#[derive(Default)]
pub struct EmptyConfigSource;

impl ConfigSource for EmptyConfigSource {
    fn get(&self, _key: &str) -> Option<String> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_r::test;

    #[test]
    pub fn defaults_round_trip_through_figment() {
        let loader = ConfigLoader::new(Path::new("/nonexistent/servitor.toml"));
        let config = loader.load().expect("defaults alone must load");
        assert_eq!(config.pools.core_size, 2);
        assert_eq!(config.pools.max_size, 16);
        assert_eq!(config.http_log_tag, "http");
    }

    #[test]
    pub fn empty_config_source_never_answers() {
        let source = EmptyConfigSource;
        assert_eq!(source.get("anything"), None);
    }
}
