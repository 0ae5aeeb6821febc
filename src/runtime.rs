//! `Runtime`: the explicit, constructible value that replaces the source's
//! process-wide singleton registry reached through a static initializer.
//!
//! Grounded on spec section 9's redesign flag: "replace with an explicit
//! `Runtime` value constructed at program entry; tests instantiate fresh
//! runtimes. The process-termination hook becomes a signal-handler
//! registration owned by the runtime." The `tokio::signal` dependency
//! (already in the workspace `Cargo.toml` under the `signal` feature) is
//! what that signal-handler registration is grounded on.

use std::sync::Arc;
use tracing::{error, info};

use crate::config::{PoolConfig, RuntimeConfig};
use crate::error::RuntimeError;
use crate::registry::ServiceRegistry;
use crate::service::Service;
use crate::shutdown::ShutdownCoordinator;
use crate::telemetry;

/// Bundles the pieces an embedding process needs: the service registry,
/// the shutdown coordinator, and the configuration both were built from.
/// Constructed once at program entry (or once per test) rather than
/// reached for through a process-wide static.
pub struct Runtime {
    config: RuntimeConfig,
    registry: ServiceRegistry,
    shutdown: ShutdownCoordinator,
}

impl Runtime {
    /// Initializes tracing and builds a fresh [`ServiceRegistry`] and
    /// [`ShutdownCoordinator`] from `config`.
    pub fn bootstrap(config: RuntimeConfig) -> Result<Self, RuntimeError> {
        telemetry::init(&config.tracing)?;
        let registry = ServiceRegistry::new(config.static_pool);
        let shutdown = ShutdownCoordinator::new(config.shutdown_poll_interval);
        Ok(Runtime {
            config,
            registry,
            shutdown,
        })
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    pub fn registry(&self) -> &ServiceRegistry {
        &self.registry
    }

    /// Registers a new service with this runtime's primary pool tunables
    /// (spec section 6's "thread-pool core size, max size, keep-alive
    /// seconds" configuration keys), unless the caller overrides them.
    pub fn register_service(&self, name: impl Into<String>, priority: i64) -> Result<Arc<Service>, RuntimeError> {
        self.register_service_with_pool(name, priority, self.config.pools)
    }

    pub fn register_service_with_pool(
        &self,
        name: impl Into<String>,
        priority: i64,
        pool_config: PoolConfig,
    ) -> Result<Arc<Service>, RuntimeError> {
        self.registry.register(Service::new(name, priority, pool_config))
    }

    /// Triggers the full three-stage shutdown walk and returns the
    /// accumulated hook-exception count. Callers that want the source's
    /// "exit the process" behavior call `std::process::exit` with this
    /// value themselves (see [`Runtime::shutdown_and_exit`]); tests call
    /// this directly, per spec section 8 invariant 4's "test harness that
    /// stubs the halt".
    pub fn system_shutdown(&self) -> i32 {
        info!("system shutdown triggered");
        crate::shutdown::system_shutdown(&self.registry, &self.shutdown)
    }

    /// Runs shutdown and exits the process with the accumulated error
    /// count as status, per spec section 6's process exit contract. Never
    /// returns.
    pub fn shutdown_and_exit(&self) -> ! {
        let code = self.system_shutdown();
        std::process::exit(code);
    }

    /// Installs a `Ctrl+C` signal handler that runs [`Runtime::shutdown_and_exit`]
    /// once triggered — the owned signal-handler registration spec section
    /// 9 calls for in place of a bare process-termination hook.
    pub async fn run_until_shutdown_signal(self: Arc<Self>) {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("shutdown signal received");
                self.shutdown_and_exit();
            }
            Err(err) => {
                error!(error = %err, "failed to listen for shutdown signal");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_r::test;

    #[test]
    pub fn bootstrap_then_shutdown_terminates_every_primary_pool() {
        let runtime = Runtime::bootstrap(RuntimeConfig::default()).unwrap();
        let a = runtime.register_service("alpha", 1).unwrap();
        let b = runtime.register_service("beta", 2).unwrap();
        let errors = runtime.system_shutdown();
        assert_eq!(errors, 0);
        assert!(a.primary_pool().is_terminated());
        assert!(b.primary_pool().is_terminated());
    }

    #[test]
    pub fn duplicate_service_name_is_rejected() {
        let runtime = Runtime::bootstrap(RuntimeConfig::default()).unwrap();
        runtime.register_service("dup", 1).unwrap();
        let err = runtime.register_service("dup", 1).unwrap_err();
        assert_eq!(err.kind(), crate::error::RuntimeErrorKindTag::NameConflict);
    }
}
