//! The dynamically-sized worker pool behind every [`crate::service::Service`].
//!
//! Grounded on the thread-pool shape described in spec section 4.2, built
//! from primitives the workspace already depends on rather than a
//! third-party pool crate: `crossbeam-channel` for the job queue (already a
//! workspace dependency; the corpus reaches for `crossbeam` channels in its
//! CLI REPL, `cli/golem-cli/src/evcxr_repl/repl.rs`) and `tokio::sync::oneshot`
//! for the per-task result handle (`submit` returns a future, matching the
//! "returns future" contract in spec section 6's interface table).

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};
use std::thread;
use std::time::Duration;
use tokio::sync::oneshot;
use tracing::{debug, trace, warn};

use crate::config::PoolConfig;
use crate::error::RuntimeError;
use crate::session;

type Job = Box<dyn FnOnce() + Send>;

/// How often an idle worker wakes to re-check the shutdown flag and its own
/// idle budget. Not a spec-visible tunable; purely an internal poll cadence.
const POLL_INTERVAL: Duration = Duration::from_millis(200);

struct PoolInner {
    name: String,
    core_size: usize,
    max_size: usize,
    keep_alive: Duration,
    sender: Sender<Job>,
    receiver: Receiver<Job>,
    live_count: AtomicUsize,
    next_thread_id: AtomicUsize,
    shutdown: AtomicBool,
}

/// A dynamically-sized pool of worker threads, bounded by `core_size`,
/// `max_size`, and `keep_alive`, per spec section 4.2. Produces only worker
/// threads: every job it runs has `session::mark_current_thread_as_worker()`
/// called once for the life of the thread, satisfying spec section 3's
/// invariant that all runtime-submitted tasks execute on a worker thread.
#[derive(Clone)]
pub struct WorkerPool {
    inner: Arc<PoolInner>,
}

impl WorkerPool {
    /// Creates a pool and eagerly spawns `core_size` always-alive threads,
    /// named `{name}-{n}` per spec section 4.2's "stable debug name derived
    /// from the owning service's name plus a unique suffix".
    pub fn new(name: impl Into<String>, config: PoolConfig) -> Self {
        let (sender, receiver) = crossbeam_channel::unbounded();
        let inner = Arc::new(PoolInner {
            name: name.into(),
            core_size: config.core_size,
            max_size: config.max_size.max(config.core_size).max(1),
            keep_alive: config.keep_alive,
            sender,
            receiver,
            live_count: AtomicUsize::new(0),
            next_thread_id: AtomicUsize::new(0),
            shutdown: AtomicBool::new(false),
        });
        for _ in 0..inner.core_size {
            spawn_worker(&inner, true);
        }
        WorkerPool { inner }
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Submits `f`, returning a future that resolves once a worker thread
    /// has run it. Spawns an additional non-core worker (up to `max_size`)
    /// if the queue already has backlog, per spec section 4.2's lazy
    /// creation up to `max`.
    pub fn submit<F, T>(&self, f: F) -> Result<PoolFuture<T>, RuntimeError>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        if self.inner.shutdown.load(Ordering::SeqCst) {
            return Err(RuntimeError::ShutdownInProgress {
                service: self.inner.name.clone(),
            });
        }
        let (tx, rx) = oneshot::channel();
        let job: Job = Box::new(move || {
            let result = f();
            let _ = tx.send(result);
        });
        self.inner.sender.send(job).map_err(|_| RuntimeError::ResourceExhausted {
            pool: self.inner.name.clone(),
            reason: "queue disconnected".to_string(),
        })?;
        self.maybe_grow();
        Ok(PoolFuture { inner: rx })
    }

    /// Fire-and-forget submission: same queueing and growth behavior as
    /// [`WorkerPool::submit`], but the result is discarded.
    pub fn execute<F>(&self, f: F) -> Result<(), RuntimeError>
    where
        F: FnOnce() + Send + 'static,
    {
        self.submit(f).map(|_future| ())
    }

    fn maybe_grow(&self) {
        let live = self.inner.live_count.load(Ordering::SeqCst);
        if live < self.inner.max_size && self.inner.receiver.len() > 0 {
            spawn_worker(&self.inner, false);
        }
    }

    /// Refuses new work and lets already-queued and in-flight jobs finish.
    /// Does not block — callers poll [`WorkerPool::is_terminated`], as the
    /// [`crate::shutdown::ShutdownCoordinator`] does.
    pub fn shutdown(&self) {
        if !self.inner.shutdown.swap(true, Ordering::SeqCst) {
            debug!(pool = self.inner.name, "pool shutdown requested");
        }
    }

    pub fn is_terminated(&self) -> bool {
        self.inner.shutdown.load(Ordering::SeqCst) && self.inner.live_count.load(Ordering::SeqCst) == 0
    }

    pub fn live_thread_count(&self) -> usize {
        self.inner.live_count.load(Ordering::SeqCst)
    }
}

fn spawn_worker(inner: &Arc<PoolInner>, is_core: bool) {
    let id = inner.next_thread_id.fetch_add(1, Ordering::SeqCst);
    let inner = Arc::clone(inner);
    inner.live_count.fetch_add(1, Ordering::SeqCst);
    let thread_name = format!("{}-{}", inner.name, id);
    let spawned = thread::Builder::new().name(thread_name.clone()).spawn(move || {
        worker_loop(inner, is_core);
    });
    if let Err(err) = spawned {
        warn!(pool = %thread_name, error = %err, "failed to spawn worker thread");
    }
}

fn worker_loop(inner: Arc<PoolInner>, is_core: bool) {
    session::mark_current_thread_as_worker();
    let mut idle = Duration::ZERO;
    loop {
        match inner.receiver.recv_timeout(POLL_INTERVAL) {
            Ok(job) => {
                idle = Duration::ZERO;
                job();
            }
            Err(RecvTimeoutError::Timeout) => {
                idle += POLL_INTERVAL;
                if inner.shutdown.load(Ordering::SeqCst) && inner.receiver.is_empty() {
                    break;
                }
                if !is_core && idle >= inner.keep_alive {
                    trace!(pool = inner.name, "idle worker past keep_alive, exiting");
                    break;
                }
            }
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }
    inner.live_count.fetch_sub(1, Ordering::SeqCst);
}

/// The future returned by [`WorkerPool::submit`]. Resolves to
/// `Err(RuntimeError::ProgrammerError)` only if the task's worker thread
/// died without sending a result (e.g. the process is exiting) — the
/// runtime itself never drops a job silently under normal operation.
pub struct PoolFuture<T> {
    inner: oneshot::Receiver<T>,
}

impl<T> Future for PoolFuture<T> {
    type Output = Result<T, RuntimeError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.inner).poll(cx).map(|result| {
            result.map_err(|_| RuntimeError::programmer_error("task dropped before completion"))
        })
    }
}

impl<T> PoolFuture<T> {
    /// Blocks the calling thread until the result is in. Used by code
    /// running on a plain (non-tokio) worker thread that needs to wait on
    /// a nested `fork` result synchronously, e.g. a handler that fans out
    /// to an auxiliary pool and needs the answer before returning.
    pub fn blocking_recv(self) -> Result<T, RuntimeError> {
        self.inner
            .blocking_recv()
            .map_err(|_| RuntimeError::programmer_error("task dropped before completion"))
    }
}
