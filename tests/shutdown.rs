//! S4 (shutdown order) and invariants 4 & 5 from spec section 8, driven
//! entirely through the public API rather than inline unit tests, since
//! they exercise the registry + coordinator together.

use servitor::config::PoolConfig;
use servitor::service::Service;
use servitor::shutdown::ShutdownCoordinator;
use servitor::ServiceRegistry;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use test_r::test;

fn pool_config() -> PoolConfig {
    PoolConfig {
        core_size: 1,
        max_size: 2,
        keep_alive: Duration::from_millis(50),
    }
}

struct RecordingObserver {
    stages: Mutex<Vec<(String, String)>>,
}

impl servitor::shutdown::ShutdownObserver for RecordingObserver {
    fn on_stage(&self, service_name: &str, stage: &str) {
        self.stages
            .lock()
            .unwrap()
            .push((service_name.to_string(), stage.to_string()));
    }
}

/// S4: register three services with priorities 1, 5, 3; expect
/// `shutdown(START)` to be invoked in descending priority order `[5, 3, 1]`
/// — the convention this rewrite pins for spec section 9's open question.
#[test]
pub fn shuts_down_in_descending_priority_order() {
    let registry = ServiceRegistry::new(pool_config());
    registry.register(Service::new("priority-1", 1, pool_config())).unwrap();
    registry.register(Service::new("priority-5", 5, pool_config())).unwrap();
    registry.register(Service::new("priority-3", 3, pool_config())).unwrap();

    let observer = Arc::new(RecordingObserver {
        stages: Mutex::new(Vec::new()),
    });
    let coordinator = ShutdownCoordinator::with_observer(Duration::from_millis(5), observer.clone());
    coordinator.shutdown(&registry);

    let starts: Vec<String> = observer
        .stages
        .lock()
        .unwrap()
        .iter()
        .filter(|(_, stage)| stage == "start")
        .map(|(name, _)| name.clone())
        .collect();
    assert_eq!(starts, vec!["priority-5", "priority-3", "priority-1"]);
}

/// Invariant 4: after shutdown returns, every registered service's primary
/// pool reports `is_terminated() == true`.
#[test]
pub fn every_primary_pool_is_terminated_after_shutdown() {
    let registry = ServiceRegistry::new(pool_config());
    let a = registry.register(Service::new("a", 1, pool_config())).unwrap();
    let b = registry.register(Service::new("b", 2, pool_config())).unwrap();
    let c = registry.register(Service::new("c", 3, pool_config())).unwrap();

    let coordinator = ShutdownCoordinator::new(Duration::from_millis(5));
    let errors = coordinator.shutdown(&registry);

    assert_eq!(errors, 0);
    assert!(a.primary_pool().is_terminated());
    assert!(b.primary_pool().is_terminated());
    assert!(c.primary_pool().is_terminated());
}

/// Invariant 5: within one service, `START` precedes every
/// `shutdown_aux_pool`, which precedes `END`, which precedes pool
/// termination.
#[test]
pub fn stage_order_within_one_service_is_strict() {
    let registry = ServiceRegistry::new(pool_config());
    let service = registry.register(Service::new("ordered", 1, pool_config())).unwrap();

    let aux_pool = servitor::pool::WorkerPool::new("ordered-aux", pool_config());
    // Registering an aux pool happens via `fork_to`, which requires a
    // worker thread; drive it through the registry's static pool so the
    // call is on a worker, per spec section 4.3.
    registry
        .run_and_wait(
            move || {
                service.fork_to(|| (), &aux_pool).unwrap();
            },
            None,
        )
        .unwrap()
        .blocking_recv()
        .unwrap();

    let observer = Arc::new(RecordingObserver {
        stages: Mutex::new(Vec::new()),
    });
    let coordinator = ShutdownCoordinator::with_observer(Duration::from_millis(5), observer.clone());
    coordinator.shutdown(&registry);

    let stages: Vec<String> = observer
        .stages
        .lock()
        .unwrap()
        .iter()
        .filter(|(name, _)| name == "ordered")
        .map(|(_, stage)| stage.clone())
        .collect();
    assert_eq!(stages, vec!["start", "aux_drain", "end", "pool_terminate"]);
}
