//! `ShutdownCoordinator`: the multi-stage, priority-ordered shutdown walk.
//!
//! Grounded on spec section 4.5/9's redesign flag: "replace the
//! exception-swallowing shutdown loop with a result-accumulating fold:
//! each hook returns a result, errors are collected, the final exit code is
//! the count." The polling-until-terminated loop mirrors the
//! `isTerminated()` busy-wait the spec describes, sleeping
//! `shutdown_poll_interval` between checks — the coordinator is, per spec
//! section 5, "the only systemic blocking loop" in the runtime.

use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{error, info, warn};

use crate::error::RuntimeError;
use crate::registry::ServiceRegistry;
use crate::service::{Service, ShutdownStage};

/// A hook for tests that want to observe shutdown ordering without
/// depending on log output — spec section 8's "observable via a recording
/// hook" for invariant 5 and scenario S4.
pub trait ShutdownObserver: Send + Sync {
    fn on_stage(&self, service_name: &str, stage: &str) {
        let _ = (service_name, stage);
    }
}

struct NoopObserver;
impl ShutdownObserver for NoopObserver {}

/// Runs the three-phase shutdown sequence over every registered service in
/// strictly descending priority order, per spec section 4.5.
///
/// **Shutdown order convention (resolves spec section 9's open question):**
/// services are visited in *descending* priority order — the
/// highest-priority service's `shutdown(Start)` runs first. For priorities
/// `1, 5, 3` this visits `5, 3, 1`. Pinned by
/// `tests/shutdown.rs::shuts_down_in_descending_priority_order`.
pub struct ShutdownCoordinator {
    poll_interval: Duration,
    observer: Arc<dyn ShutdownObserver>,
}

impl ShutdownCoordinator {
    pub fn new(poll_interval: Duration) -> Self {
        ShutdownCoordinator {
            poll_interval,
            observer: Arc::new(NoopObserver),
        }
    }

    pub fn with_observer(poll_interval: Duration, observer: Arc<dyn ShutdownObserver>) -> Self {
        ShutdownCoordinator { poll_interval, observer }
    }

    /// Runs the full shutdown sequence: every registered service in
    /// descending priority order, then the logging service last. Returns
    /// the accumulated hook-exception count — spec section 6's "process
    /// exits with status equal to the count of exceptions raised by
    /// service-defined shutdown hooks".
    pub fn shutdown(&self, registry: &ServiceRegistry) -> u32 {
        let mut services = registry.services();
        services.sort_by(|a, b| {
            b.priority()
                .cmp(&a.priority())
                .then_with(|| a.name().cmp(b.name()))
        });

        let mut error_count = 0;
        for service in &services {
            error_count += self.shutdown_one(service);
        }

        if let Some(logging_service) = registry.logging_service() {
            info!("shutting down logging service last");
            error_count += self.shutdown_one(&logging_service);
        }

        info!(errors = error_count, "shutdown complete");
        error_count
    }

    fn shutdown_one(&self, service: &Arc<Service>) -> u32 {
        let mut errors = 0;
        service.begin_shutdown();

        self.observer.on_stage(service.name(), "start");
        if let Err(err) = service.shutdown_hook(ShutdownStage::Start) {
            errors += 1;
            error!(service = service.name(), error = %err, "shutdown(START) failed");
        }

        for pool in service.aux_pools() {
            self.observer.on_stage(service.name(), "aux_drain");
            service.shutdown_aux_pool_hook(&pool);
            self.wait_for_termination(&pool, service.name());
        }

        self.observer.on_stage(service.name(), "end");
        if let Err(err) = service.shutdown_hook(ShutdownStage::End) {
            errors += 1;
            error!(service = service.name(), error = %err, "shutdown(END) failed");
        }

        self.observer.on_stage(service.name(), "pool_terminate");
        service.shutdown_primary_pool();
        self.wait_for_primary_termination(service);

        errors
    }

    fn wait_for_termination(&self, pool: &crate::pool::WorkerPool, service_name: &str) {
        let started = Instant::now();
        while !pool.is_terminated() {
            std::thread::sleep(self.poll_interval);
            if started.elapsed() > Duration::from_secs(30) {
                warn!(service = service_name, pool = pool.name(), "aux pool termination taking unusually long");
            }
        }
    }

    fn wait_for_primary_termination(&self, service: &Service) {
        let started = Instant::now();
        while !service.is_primary_pool_terminated() {
            std::thread::sleep(self.poll_interval);
            if started.elapsed() > Duration::from_secs(30) {
                warn!(service = service.name(), "primary pool termination taking unusually long");
            }
        }
    }
}

/// Triggers a [`ShutdownCoordinator`] run and returns the accumulated
/// error count as a process exit status, per spec section 6's process
/// exit contract. Callers that genuinely want to terminate the process
/// call `std::process::exit` themselves with this value; the function
/// itself never exits the process, so tests can call it directly (spec
/// section 8, invariant 4's "test harness that stubs the halt").
pub fn system_shutdown(registry: &ServiceRegistry, coordinator: &ShutdownCoordinator) -> i32 {
    coordinator.shutdown(registry) as i32
}
