//! The internal carrier that wraps a user task with its captured session.
//!
//! Grounded on spec section 3's `TaskWrapper`: `(user_task, captured_session,
//! captured_properties_snapshot, creation_timestamp)`, ordered by creation
//! timestamp descending with a stable tiebreaker. This crate uses a
//! monotonic `AtomicU64` sequence number as that tiebreaker (and, per spec
//! section 5, as the total order a priority-queue-backed pool would sort
//! on) rather than comparing `Instant`s directly, since two tasks captured
//! in the same tick would otherwise compare equal.

use serde_json::Value;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::time::Instant;

use crate::session::{self, SessionContext};

static SEQUENCE: AtomicU64 = AtomicU64::new(0);

/// Wraps a `FnOnce() -> T` closure with the session state captured at
/// submission time, per spec section 4.1's propagation rule.
pub struct TaskWrapper<F> {
    task: F,
    session: SessionContext,
    properties_snapshot: HashMap<String, Value>,
    created_at: Instant,
    seq: u64,
}

impl<F> TaskWrapper<F> {
    /// Captures [`SessionContext::current`] (the guest session off a
    /// worker thread) and its live properties at the moment of the call.
    /// This is what [`crate::service::Service::fork`] calls from the
    /// submitting thread, before handing the wrapper to a pool.
    pub fn capture(task: F) -> Self {
        Self::with_session(task, SessionContext::current())
    }

    /// Captures an explicitly supplied session instead of the ambient one,
    /// used by the external `run(task, session)` gateway (spec section
    /// 4.1: "the supplied session is used verbatim").
    pub fn with_session(task: F, session: SessionContext) -> Self {
        let properties_snapshot = session.properties().snapshot();
        TaskWrapper {
            task,
            session,
            properties_snapshot,
            created_at: Instant::now(),
            seq: SEQUENCE.fetch_add(1, AtomicOrdering::Relaxed),
        }
    }

    pub fn created_at(&self) -> Instant {
        self.created_at
    }

    pub fn seq(&self) -> u64 {
        self.seq
    }

    pub fn session(&self) -> &SessionContext {
        &self.session
    }
}

impl<T, F> TaskWrapper<F>
where
    F: FnOnce() -> T,
{
    /// Runs the wrapped task with its captured session bound on the
    /// calling (worker) thread for the task's duration.
    pub fn run(self) -> T {
        session::run_with_session(self.session, self.properties_snapshot, self.task)
    }
}

impl<F> PartialEq for TaskWrapper<F> {
    fn eq(&self, other: &Self) -> bool {
        self.seq == other.seq
    }
}

impl<F> Eq for TaskWrapper<F> {}

impl<F> PartialOrd for TaskWrapper<F> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Newer tasks (higher `seq`) sort greater, so a `BinaryHeap<TaskWrapper<_>>`
/// pops the most-recently-created task first on ties — spec section 5:
/// "the sort inverts timestamp so newer tasks win ties".
impl<F> Ord for TaskWrapper<F> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.seq.cmp(&other.seq)
    }
}
