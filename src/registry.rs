//! `ServiceRegistry`: the process-wide (or, in this rewrite, explicit-value)
//! mapping from name to [`Service`], plus the registry's own static pool
//! for the external `run(task, session)` gateway.
//!
//! Grounded on spec section 9's redesign flag: "replace a process-wide
//! singleton registry with static initializer... with an explicit `Runtime`
//! value constructed at program entry; tests instantiate fresh runtimes."
//! `ServiceRegistry` plays that `Runtime` role here — an owned value rather
//! than a `OnceLock`-backed global, the same way `cloud-debugging-service`'s
//! `AdditionalDeps` is an explicit value threaded through `All<T>` instead
//! of reached for through ambient statics.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing::info;

use crate::config::PoolConfig;
use crate::error::RuntimeError;
use crate::pool::{PoolFuture, WorkerPool};
use crate::service::Service;
use crate::session::SessionContext;
use crate::task::TaskWrapper;

/// Process-wide (by convention — nothing prevents multiple instances in
/// tests) mapping from unique service name to [`Service`], per spec
/// section 3/4.4.
pub struct ServiceRegistry {
    services: Mutex<HashMap<String, Arc<Service>>>,
    /// The logging service's own slot, separate from `services` so
    /// registering it doesn't try to route its own registration message
    /// through itself (spec section 4.4's cycle).
    logging_service: Mutex<Option<Arc<Service>>>,
    static_pool: WorkerPool,
}

impl ServiceRegistry {
    /// Constructs a fresh registry with its own static pool, sized from
    /// `static_pool_config` (spec section 6's "static-thread-pool
    /// equivalents" configuration key).
    pub fn new(static_pool_config: PoolConfig) -> Self {
        ServiceRegistry {
            services: Mutex::new(HashMap::new()),
            logging_service: Mutex::new(None),
            static_pool: WorkerPool::new("registry-static-pool", static_pool_config),
        }
    }

    /// Registers `service`, calling its `init` hook immediately afterward.
    /// Fails with `NameConflict` if the name is already taken (spec
    /// section 8, invariant 1).
    pub fn register(&self, service: Service) -> Result<Arc<Service>, RuntimeError> {
        let name = service.name().to_string();
        let service = Arc::new(service);
        {
            let mut services = self.services.lock().unwrap_or_else(|p| p.into_inner());
            if services.contains_key(&name) {
                return Err(RuntimeError::NameConflict(name));
            }
            services.insert(name.clone(), service.clone());
        }
        info!(service = name, "service registered");
        service.init()?;
        Ok(service)
    }

    /// Registers the distinguished logging service, bypassing the general
    /// uniqueness map and its registration log line — spec section 4.4:
    /// "registered through a separate setter because it bootstraps before
    /// general services can log".
    pub fn set_logging_service(&self, service: Service) -> Result<Arc<Service>, RuntimeError> {
        let service = Arc::new(service);
        service.init()?;
        *self.logging_service.lock().unwrap_or_else(|p| p.into_inner()) = Some(service.clone());
        Ok(service)
    }

    pub fn logging_service(&self) -> Option<Arc<Service>> {
        self.logging_service.lock().unwrap_or_else(|p| p.into_inner()).clone()
    }

    pub fn get(&self, name: &str) -> Option<Arc<Service>> {
        self.services.lock().unwrap_or_else(|p| p.into_inner()).get(name).cloned()
    }

    /// Snapshot of every registered (non-logging) service, in no
    /// particular order — [`crate::shutdown::ShutdownCoordinator`] sorts
    /// its own copy by priority.
    pub fn services(&self) -> Vec<Arc<Service>> {
        self.services
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .values()
            .cloned()
            .collect()
    }

    pub fn static_pool(&self) -> &WorkerPool {
        &self.static_pool
    }

    /// The external gateway: fire-and-forget submission onto the
    /// registry's static pool, for ingress adapters without a service of
    /// their own. Per spec section 4.1, the supplied session is used
    /// verbatim (the guest session substituted if `None`) rather than
    /// captured from an ambient worker thread, since the caller here is
    /// explicitly allowed to be off a worker thread (spec section 8,
    /// scenario S6).
    pub fn run<F>(&self, task: F, session: Option<SessionContext>) -> Result<(), RuntimeError>
    where
        F: FnOnce() + Send + 'static,
    {
        let session = session.unwrap_or_else(SessionContext::guest);
        let wrapper = TaskWrapper::with_session(task, session);
        self.static_pool.execute(move || wrapper.run())
    }

    /// Same as [`ServiceRegistry::run`] but returns a future with the
    /// task's result, for callers that want to await completion.
    pub fn run_and_wait<F, T>(
        &self,
        task: F,
        session: Option<SessionContext>,
    ) -> Result<PoolFuture<T>, RuntimeError>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        let session = session.unwrap_or_else(SessionContext::guest);
        let wrapper = TaskWrapper::with_session(task, session);
        self.static_pool.submit(move || wrapper.run())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_r::test;

    fn pool_config() -> PoolConfig {
        PoolConfig {
            core_size: 1,
            max_size: 2,
            keep_alive: std::time::Duration::from_millis(50),
        }
    }

    #[test]
    pub fn duplicate_name_is_a_conflict() {
        let registry = ServiceRegistry::new(pool_config());
        registry.register(Service::new("dup", 1, pool_config())).unwrap();
        let err = registry.register(Service::new("dup", 1, pool_config())).unwrap_err();
        assert_eq!(err.kind(), crate::error::RuntimeErrorKindTag::NameConflict);
    }

    #[test]
    pub fn logging_service_is_exempt_from_the_uniqueness_map() {
        let registry = ServiceRegistry::new(pool_config());
        registry.register(Service::new("log", 1, pool_config())).unwrap();
        // Same name as a regular service is fine in the logging slot: it's
        // a different map entirely.
        registry.set_logging_service(Service::new("log", 1, pool_config())).unwrap();
        assert!(registry.logging_service().is_some());
        assert!(registry.get("log").is_some());
    }

    #[test]
    pub async fn run_executes_on_the_static_pool_with_the_supplied_session() {
        let registry = ServiceRegistry::new(pool_config());
        let session = SessionContext::new();
        session.put_all(std::collections::HashMap::from([(
            "u".to_string(),
            serde_json::Value::from("bob"),
        )]));
        let future = registry
            .run_and_wait(
                || SessionContext::current().properties().get("u"),
                Some(session),
            )
            .unwrap();
        assert_eq!(future.await.unwrap(), Some(serde_json::Value::from("bob")));
    }

    #[test]
    pub async fn run_substitutes_guest_session_when_none_supplied() {
        let registry = ServiceRegistry::new(pool_config());
        let future = registry
            .run_and_wait(|| SessionContext::current().is_guest(), None)
            .unwrap();
        assert!(future.await.unwrap());
    }
}
