//! S5 (session propagation across a fork hop) and invariant 2 from spec
//! section 8.

use servitor::config::PoolConfig;
use servitor::service::Service;
use servitor::session::SessionContext;
use servitor::ServiceRegistry;
use std::collections::HashMap;
use std::time::Duration;
use test_r::test;

fn pool_config() -> PoolConfig {
    PoolConfig {
        core_size: 1,
        max_size: 2,
        keep_alive: Duration::from_millis(50),
    }
}

/// S5: on a worker thread bound to session `S` with `{"u": "alice"}`, call
/// `fork(task)` where `task` reads `current()`; expect the task to see
/// session `S` and `u == "alice"`.
#[test]
pub fn forked_task_observes_the_submitters_session() {
    let registry = ServiceRegistry::new(pool_config());
    let service = registry.register(Service::new("svc", 1, pool_config())).unwrap();

    let session = SessionContext::new();
    session.put_all(HashMap::from([("u".to_string(), serde_json::Value::from("alice"))]));
    let expected_id = session.id();

    let outer = registry
        .run_and_wait(
            move || {
                service
                    .fork(|| {
                        let current = SessionContext::current();
                        (current.id(), current.properties().get("u"))
                    })
                    .unwrap()
                    .blocking_recv()
            },
            Some(session),
        )
        .unwrap();

    let (seen_id, seen_u) = outer.blocking_recv().unwrap().unwrap();
    assert_eq!(seen_id, expected_id);
    assert_eq!(seen_u, Some(serde_json::Value::from("alice")));
}

/// Invariant 2: for all tasks submitted via `fork` on a worker thread, the
/// callee observes the *same* session instance that was current at the
/// submitter (not merely an equal-content copy).
#[test]
pub fn forked_task_shares_the_same_session_instance() {
    let registry = ServiceRegistry::new(pool_config());
    let service = registry.register(Service::new("svc-identity", 1, pool_config())).unwrap();
    let session = SessionContext::new();

    let outer = registry
        .run_and_wait(
            move || {
                let submitter_session = SessionContext::current();
                let forked_session_id = service
                    .fork(|| SessionContext::current().id())
                    .unwrap()
                    .blocking_recv()
                    .unwrap();
                (submitter_session.id(), forked_session_id)
            },
            Some(session),
        )
        .unwrap();

    let (submitter_id, forked_id) = outer.blocking_recv().unwrap();
    assert_eq!(submitter_id, forked_id);
}

/// Properties mutated after capture but before the forked task runs are
/// visible too, since sessions are shared by reference (spec section 3).
#[test]
pub fn property_mutations_on_the_shared_session_are_visible_to_forked_tasks() {
    let registry = ServiceRegistry::new(pool_config());
    let service = registry.register(Service::new("svc-mutate", 1, pool_config())).unwrap();
    let session = SessionContext::new();

    let outer = registry
        .run_and_wait(
            move || {
                let current = SessionContext::current();
                current.properties().put("late", serde_json::Value::from(1));
                service
                    .fork(|| SessionContext::current().properties().get("late"))
                    .unwrap()
                    .blocking_recv()
                    .unwrap()
            },
            Some(session),
        )
        .unwrap();

    assert_eq!(outer.blocking_recv().unwrap(), Some(serde_json::Value::from(1)));
}
