//! Session identity and the property bag propagated across task hops.
//!
//! Grounded on `DebugSessionsDefault` (cloud-debugging-service/src/debug_session.rs):
//! an `Arc<Mutex<HashMap<..>>>` shared-state map reached through a trait,
//! rather than anything generic-over-backend. `SessionContext` here plays
//! the same role `DebugSessionData` plays there, minus the oplog-specific
//! fields.

use serde_json::Value;
use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex};
use uuid::Uuid;

/// The live, mutable property bag attached to a [`SessionContext`].
///
/// Per spec section 3: "owned by the session's current holder... not
/// guaranteed thread-safe for concurrent writers (callers serialize via
/// their task boundaries)". The `Mutex` here is the minimal amount of
/// synchronization needed to make that true rather than merely assumed;
/// it is not meant to provide fine-grained concurrent-writer safety beyond
/// what a single lock gives for free.
#[derive(Clone)]
pub struct Properties(Arc<Mutex<HashMap<String, Value>>>);

impl Properties {
    fn new() -> Self {
        Properties(Arc::new(Mutex::new(HashMap::new())))
    }

    /// Merges `other` into this bag, last-write-wins on key collision.
    pub fn put_all(&self, other: HashMap<String, Value>) {
        let mut guard = self.0.lock().unwrap_or_else(|poison| poison.into_inner());
        guard.extend(other);
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        let guard = self.0.lock().unwrap_or_else(|poison| poison.into_inner());
        guard.get(key).cloned()
    }

    pub fn put(&self, key: impl Into<String>, value: Value) {
        let mut guard = self.0.lock().unwrap_or_else(|poison| poison.into_inner());
        guard.insert(key.into(), value);
    }

    /// A point-in-time copy, used to capture properties at task-submission
    /// time for propagation (spec section 4.1).
    pub fn snapshot(&self) -> HashMap<String, Value> {
        self.0
            .lock()
            .unwrap_or_else(|poison| poison.into_inner())
            .clone()
    }
}

struct SessionInner {
    id: Uuid,
    is_guest: bool,
    properties: Properties,
}

/// Identity plus a mutable property bag representing the logical caller,
/// shared by reference between a parent task and any task it forks off.
///
/// See spec section 3 ("SessionContext") and section 4.1 (propagation).
#[derive(Clone)]
pub struct SessionContext(Arc<SessionInner>);

impl SessionContext {
    /// A fresh, non-guest session with an empty property bag. Created by
    /// an ingress adapter, per spec section 3's lifecycle note.
    pub fn new() -> Self {
        SessionContext(Arc::new(SessionInner {
            id: Uuid::new_v4(),
            is_guest: false,
            properties: Properties::new(),
        }))
    }

    /// The distinguished guest session returned when no caller session
    /// exists. A single process-wide instance, so `guest().id()` is stable
    /// across calls.
    pub fn guest() -> Self {
        GUEST_SESSION.with(|g| g.clone())
    }

    pub fn id(&self) -> Uuid {
        self.0.id
    }

    pub fn is_guest(&self) -> bool {
        self.0.is_guest
    }

    pub fn properties(&self) -> Properties {
        self.0.properties.clone()
    }

    pub fn put_all(&self, props: HashMap<String, Value>) {
        self.0.properties.put_all(props);
    }

    /// The session bound to the executing worker thread, or the guest
    /// session if none is bound (spec section 4.1: `current()`).
    pub fn current() -> Self {
        CURRENT_SESSION.with(|cell| cell.borrow().clone()).unwrap_or_else(Self::guest)
    }

    fn guest_inner() -> Self {
        SessionContext(Arc::new(SessionInner {
            id: Uuid::nil(),
            is_guest: true,
            properties: Properties::new(),
        }))
    }
}

impl Default for SessionContext {
    fn default() -> Self {
        SessionContext::new()
    }
}

impl fmt::Debug for SessionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionContext")
            .field("id", &self.0.id)
            .field("is_guest", &self.0.is_guest)
            .finish()
    }
}

impl PartialEq for SessionContext {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

thread_local! {
    static GUEST_SESSION: SessionContext = SessionContext::guest_inner();
    static CURRENT_SESSION: RefCell<Option<SessionContext>> = const { RefCell::new(None) };
    static IS_WORKER_THREAD: std::cell::Cell<bool> = const { std::cell::Cell::new(false) };
}

/// Binds `session` to the calling thread's session slot, returning whatever
/// was previously bound. Called by a [`crate::pool::WorkerPool`] worker
/// thread on task entry; never called by application code directly.
pub(crate) fn bind(session: SessionContext) -> Option<SessionContext> {
    CURRENT_SESSION.with(|cell| cell.borrow_mut().replace(session))
}

/// Clears the calling thread's session slot, restoring `previous` (usually
/// `None` between tasks). Called on task exit, both success and failure
/// paths — spec section 3's `WorkerThread` invariant.
pub(crate) fn restore(previous: Option<SessionContext>) {
    CURRENT_SESSION.with(|cell| *cell.borrow_mut() = previous);
}

/// Marks the calling thread as a worker thread for the lifetime of the
/// closure. Worker pool threads call this once, around their entire
/// dispatch loop — not per task — since a pool thread remains a worker
/// thread between jobs too.
pub(crate) fn mark_current_thread_as_worker() {
    IS_WORKER_THREAD.with(|flag| flag.set(true));
}

/// Whether the calling thread is a worker thread, per spec section 3's
/// invariant that all runtime-submitted tasks execute on one. Used by
/// [`crate::service::Service::fork`] to reject off-thread submission
/// (spec section 8, scenario S6) unless it goes through
/// [`crate::registry::ServiceRegistry::run`].
pub fn is_current_thread_worker() -> bool {
    IS_WORKER_THREAD.with(|flag| flag.get())
}

/// Restores a previously-bound session after a guard's scope ends, whether
/// the scope exited normally or by panic. Spec section 3: "the slot is
/// bound on task entry and cleared on task exit (both success and failure
/// paths)".
struct SessionRestoreGuard(Option<SessionContext>);

impl Drop for SessionRestoreGuard {
    fn drop(&mut self) {
        restore(self.0.take());
    }
}

/// Binds `session` on the calling worker thread, merges `properties` into
/// it, runs `task`, then restores whatever session was bound before —
/// even if `task` panics. This is the propagation rule of spec section 4.1
/// made concrete: a [`crate::task::TaskWrapper`] calls this exactly once
/// when its job runs on a pool thread.
pub(crate) fn run_with_session<T>(
    session: SessionContext,
    properties: HashMap<String, Value>,
    task: impl FnOnce() -> T,
) -> T {
    let previous = bind(session.clone());
    let _guard = SessionRestoreGuard(previous);
    session.put_all(properties);
    task()
}
