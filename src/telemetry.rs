//! Logging bootstrap.
//!
//! Grounded on `golem_common::tracing::init_tracing_with_default_env_filter`
//! and `TracingConfig::local_dev(...)` as used from
//! `cloud-component-service/src/server.rs` and
//! `cloud-debugging-service/src/server.rs`. `golem-common` itself isn't a
//! dependency of this crate (it was never retrieved as full source), so the
//! shape is reproduced locally rather than imported.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use tracing_subscriber::EnvFilter;

use crate::error::RuntimeError;

/// Configuration for the process-wide `tracing` subscriber.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TracingConfig {
    /// Enable ANSI color codes in the formatted output.
    pub ansi: bool,
    /// Emit newline-delimited JSON instead of human-readable text.
    pub json: bool,
    /// `EnvFilter` directive string, e.g. `"info,servitor=debug"`. Falls
    /// back to `RUST_LOG`, then `"info"`, when absent.
    pub env_filter: Option<String>,
}

impl TracingConfig {
    /// A sensible default for running under `cargo run`/tests: ANSI on,
    /// plain text, `info` by default.
    pub fn local_dev(service_name: &str) -> Self {
        TracingConfig {
            ansi: true,
            json: false,
            env_filter: Some(format!("info,{service_name}=debug")),
        }
    }
}

impl Default for TracingConfig {
    fn default() -> Self {
        TracingConfig {
            ansi: false,
            json: false,
            env_filter: None,
        }
    }
}

static SUBSCRIBER_INSTALLED: AtomicBool = AtomicBool::new(false);

/// Installs the global `tracing` subscriber. Safe to call more than once;
/// only the first call takes effect, later calls are a no-op (matching the
/// corpus's tolerance for tests and binaries both calling init).
pub fn init(config: &TracingConfig) -> Result<(), RuntimeError> {
    if SUBSCRIBER_INSTALLED.swap(true, Ordering::SeqCst) {
        return Ok(());
    }

    let filter = config
        .env_filter
        .clone()
        .map(EnvFilter::new)
        .unwrap_or_else(|| EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")));

    if config.json {
        tracing_subscriber::fmt()
            .with_ansi(config.ansi)
            .with_env_filter(filter)
            .json()
            .try_init()
            .map_err(|err| RuntimeError::bad_argument(format!("tracing init failed: {err}")))
    } else {
        tracing_subscriber::fmt()
            .with_ansi(config.ansi)
            .with_env_filter(filter)
            .try_init()
            .map_err(|err| RuntimeError::bad_argument(format!("tracing init failed: {err}")))
    }
}
