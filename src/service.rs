//! `Service`: a named, priority-ranked, long-lived component with its own
//! primary worker pool and any number of auxiliary pools it dispatches to.
//!
//! Grounded on the capability-set redesign spec section 9 calls for in
//! place of an abstract base class with protected `init`/`shutdown` hooks:
//! a `LifecycleHooks` trait the embedder supplies alongside the service,
//! the same shape `AuthService`/`AuthServiceDefault`
//! (`cloud-debugging-service/src/auth.rs`) uses to separate a narrow
//! trait contract from one concrete implementation.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use tracing::{debug, info, warn};

use crate::config::PoolConfig;
use crate::error::RuntimeError;
use crate::pool::{PoolFuture, WorkerPool};
use crate::task::TaskWrapper;

/// One of the two shutdown stages a [`LifecycleHooks`] implementation is
/// invoked with, per spec section 4.5. `Start` quiesces external ingress
/// while auxiliary pools are still live; `End` performs final resource
/// release after they've drained.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownStage {
    Start,
    End,
}

/// The opaque handle a concrete service registers/unregisters through
/// `register_consumer`/`unregister_consumer`. Spec section 1 treats the
/// concrete consumer types (an HTTP context, an ingress port binding) as
/// external collaborators; this crate only needs something `Send + Sync`
/// to hold onto and hand back.
pub trait ConsumerHandle: Send + Sync {
    /// A short label for logging; no other behavior is assumed of it.
    fn label(&self) -> &str {
        "consumer"
    }
}

/// Lifecycle hooks a service implementation supplies, invoked only by the
/// [`crate::shutdown::ShutdownCoordinator`] — spec section 4.3's `init` and
/// `shutdown(stage)`. Default implementations are no-ops so a minimal
/// service needs to override nothing.
pub trait LifecycleHooks: Send + Sync {
    /// Called once, immediately after the service is registered.
    fn init(&self) -> Result<(), RuntimeError> {
        Ok(())
    }

    /// Called twice during shutdown, once per [`ShutdownStage`]. Exceptions
    /// (in this port, `Err` returns) are counted by the coordinator and
    /// swallowed — shutdown must complete regardless (spec section 7).
    fn shutdown(&self, _stage: ShutdownStage) -> Result<(), RuntimeError> {
        Ok(())
    }

    /// Called once per registered auxiliary pool, between the `Start` and
    /// `End` stages.
    fn shutdown_aux_pool(&self, _pool: &WorkerPool) {}
}

struct NoopHooks;
impl LifecycleHooks for NoopHooks {}

/// A named, priority-ranked, long-lived service: the unit spec section 3
/// calls `(name, priority, primary_pool, aux_pools, consumers)`.
pub struct Service {
    name: String,
    priority: i64,
    primary_pool: WorkerPool,
    aux_pools: Mutex<HashSet<String>>,
    aux_pools_by_name: Mutex<Vec<WorkerPool>>,
    consumers: Mutex<Vec<Arc<dyn ConsumerHandle>>>,
    hooks: Arc<dyn LifecycleHooks>,
    shutting_down: std::sync::atomic::AtomicBool,
}

impl Service {
    /// Constructs a service with its primary pool sized from `pool_config`.
    /// Does not register it with any [`crate::registry::ServiceRegistry`] —
    /// callers do that explicitly (spec section 9's "explicit `Runtime`
    /// value" redesign in place of a static singleton reaching into its
    /// own constructor).
    pub fn new(name: impl Into<String>, priority: i64, pool_config: PoolConfig) -> Self {
        Self::with_hooks(name, priority, pool_config, Arc::new(NoopHooks))
    }

    pub fn with_hooks(
        name: impl Into<String>,
        priority: i64,
        pool_config: PoolConfig,
        hooks: Arc<dyn LifecycleHooks>,
    ) -> Self {
        let name = name.into();
        let primary_pool = WorkerPool::new(name.clone(), pool_config);
        Service {
            name,
            priority,
            primary_pool,
            aux_pools: Mutex::new(HashSet::new()),
            aux_pools_by_name: Mutex::new(Vec::new()),
            consumers: Mutex::new(Vec::new()),
            hooks,
            shutting_down: std::sync::atomic::AtomicBool::new(false),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn priority(&self) -> i64 {
        self.priority
    }

    pub fn primary_pool(&self) -> &WorkerPool {
        &self.primary_pool
    }

    pub fn register_consumer(&self, consumer: Arc<dyn ConsumerHandle>) {
        self.consumers.lock().unwrap_or_else(|p| p.into_inner()).push(consumer);
    }

    pub fn unregister_consumer(&self, label: &str) {
        let mut consumers = self.consumers.lock().unwrap_or_else(|p| p.into_inner());
        consumers.retain(|c| c.label() != label);
    }

    /// The sanctioned way to submit work to this service's primary pool,
    /// preserving the propagation rule of spec section 4.1. Using the
    /// primary pool directly is a programmer error because it bypasses
    /// session capture — that's why [`Service::primary_pool`] exists for
    /// introspection (naming, termination checks) but not for submission.
    pub fn fork<F, T>(&self, task: F) -> Result<PoolFuture<T>, RuntimeError>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        self.fork_to(task, &self.primary_pool)
    }

    /// Submits work to `pool` instead of the primary pool. If `pool` isn't
    /// the primary pool, it's recorded as an auxiliary pool under mutual
    /// exclusion (spec section 4.3), so the shutdown coordinator later
    /// drains it between `Start` and `End`.
    pub fn fork_to<F, T>(&self, task: F, pool: &WorkerPool) -> Result<PoolFuture<T>, RuntimeError>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        if self.shutting_down.load(std::sync::atomic::Ordering::SeqCst) {
            return Err(RuntimeError::ShutdownInProgress {
                service: self.name.clone(),
            });
        }
        if !crate::session::is_current_thread_worker() {
            return Err(RuntimeError::programmer_error(format!(
                "Service::fork called from a non-worker thread for service '{}'; use run(task, session) instead",
                self.name
            )));
        }
        if pool.name() != self.primary_pool.name() {
            self.register_aux_pool(pool.clone());
        }
        let wrapper = TaskWrapper::capture(task);
        pool.submit(move || wrapper.run())
    }

    fn register_aux_pool(&self, pool: WorkerPool) {
        let mut seen = self.aux_pools.lock().unwrap_or_else(|p| p.into_inner());
        if seen.insert(pool.name().to_string()) {
            self.aux_pools_by_name
                .lock()
                .unwrap_or_else(|p| p.into_inner())
                .push(pool);
        }
    }

    /// Auxiliary pools registered via [`Service::fork_to`], in registration
    /// order. Used by the shutdown coordinator to invoke
    /// `shutdown_aux_pool` on each and to poll their termination.
    pub fn aux_pools(&self) -> Vec<WorkerPool> {
        self.aux_pools_by_name.lock().unwrap_or_else(|p| p.into_inner()).clone()
    }

    /// Invoked only by the shutdown coordinator. Runs `init` immediately
    /// after registration; see [`crate::registry::ServiceRegistry::register`].
    pub(crate) fn init(&self) -> Result<(), RuntimeError> {
        self.hooks.init()
    }

    pub(crate) fn begin_shutdown(&self) {
        self.shutting_down.store(true, std::sync::atomic::Ordering::SeqCst);
    }

    pub(crate) fn shutdown_hook(&self, stage: ShutdownStage) -> Result<(), RuntimeError> {
        debug!(service = self.name, stage = ?stage, "service shutdown hook");
        self.hooks.shutdown(stage)
    }

    pub(crate) fn shutdown_aux_pool_hook(&self, pool: &WorkerPool) {
        self.hooks.shutdown_aux_pool(pool);
        pool.shutdown();
    }

    pub(crate) fn shutdown_primary_pool(&self) {
        info!(service = self.name, "shutting down primary pool");
        self.primary_pool.shutdown();
    }

    pub(crate) fn is_primary_pool_terminated(&self) -> bool {
        self.primary_pool.is_terminated()
    }
}

impl Drop for Service {
    fn drop(&mut self) {
        if !self.primary_pool.is_terminated() {
            warn!(service = self.name, "service dropped without a completed shutdown");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PoolConfig;
    use crate::session::{self, SessionContext};
    use test_r::test;

    fn config() -> PoolConfig {
        PoolConfig {
            core_size: 1,
            max_size: 2,
            keep_alive: std::time::Duration::from_millis(50),
        }
    }

    #[test]
    pub async fn fork_from_non_worker_thread_is_programmer_error() {
        let service = Service::new("svc-a", 1, config());
        let err = service.fork(|| 1).unwrap_err();
        assert_eq!(err.kind(), crate::error::RuntimeErrorKindTag::ProgrammerError);
    }

    #[test]
    pub async fn fork_preserves_session_across_the_hop() {
        let service = Arc::new(Service::new("svc-b", 1, config()));
        let primary = service.primary_pool().clone();
        let session = SessionContext::new();
        session.put_all(std::collections::HashMap::from([(
            "u".to_string(),
            serde_json::Value::from("alice"),
        )]));
        let service_for_task = service.clone();
        let outcome = primary
            .submit(move || {
                let previous = session::bind(session.clone());
                let seen = service_for_task
                    .fork(|| {
                        let current = SessionContext::current();
                        current.properties().get("u")
                    })
                    .unwrap()
                    .blocking_recv();
                session::restore(previous);
                seen
            })
            .unwrap();
        let value = outcome.await.unwrap().unwrap();
        assert_eq!(value, Some(serde_json::Value::from("alice")));
    }
}
