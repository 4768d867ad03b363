//! The task runner: scheduler state, the worker loop, and the public handle.
//!
//! One [`TaskRunner`] owns one background worker thread. Any number of
//! producer threads may post work; the worker drains everything currently
//! due in one pass and executes it with no lock held, so a task may itself
//! post more work without deadlocking.

use crate::clock::TimeSource;
use crate::queue::{DelayQueue, ReadyBatch, Task};
use crate::types::PanicPayload;
use parking_lot::{Condvar, Mutex};
use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread::JoinHandle;
use std::time::Duration;
use thiserror::Error;

/// Report describing a task that panicked on the worker thread.
///
/// The worker isolates the panic: it is counted, reported through the
/// optional hook, and the worker keeps running later-due work.
#[derive(Debug, Clone, Error)]
#[error("task #{seq} panicked: {payload}")]
pub struct TaskPanic {
    seq: u64,
    payload: PanicPayload,
}

impl TaskPanic {
    /// Submission sequence of the task that panicked.
    #[must_use]
    pub fn seq(&self) -> u64 {
        self.seq
    }

    /// The captured panic payload.
    #[must_use]
    pub fn payload(&self) -> &PanicPayload {
        &self.payload
    }
}

/// Observer invoked on the worker thread after a task panics.
pub type PanicHook = Box<dyn Fn(&TaskPanic) + Send + Sync>;

/// Queue plus termination flag, everything the mutex protects.
struct QueueState {
    queue: DelayQueue,
    /// Transitions false to true exactly once; after the worker observes it,
    /// it exits without running newly visible future-dated items.
    should_exit: bool,
}

/// Scheduler state shared between the handle and the worker thread.
///
/// The worker holds its own `Arc`, so a detached worker keeps the state
/// alive after the handle is gone.
struct Shared {
    state: Mutex<QueueState>,
    wakeup: Condvar,
    clock: Arc<dyn TimeSource>,
    panicked: AtomicU64,
    panic_hook: Option<PanicHook>,
}

impl Shared {
    fn worker_loop(&self) {
        loop {
            let Some(batch) = self.wait_for_due_batch() else {
                break;
            };
            #[cfg(feature = "tracing-integration")]
            tracing::trace!(count = batch.len(), "draining due tasks");
            self.run_batch(batch);
        }
        #[cfg(feature = "tracing-integration")]
        tracing::debug!("worker stopped");
    }

    /// Blocks until at least one task is due, returning the drained batch,
    /// or `None` once the exit flag is observed.
    fn wait_for_due_batch(&self) -> Option<ReadyBatch> {
        let mut state = self.state.lock();
        loop {
            if state.should_exit {
                return None;
            }
            let now = self.clock.now();
            match state.queue.peek_due() {
                // Earliest item not due yet: sleep until its deadline, or
                // until a submission makes an earlier item the new minimum.
                Some(due) if due > now => {
                    let timeout = Duration::from_nanos(due.duration_since(now));
                    let _ = self.wakeup.wait_for(&mut state, timeout);
                }
                // Something is already due: drain without sleeping.
                Some(_) => {}
                // Nothing queued: sleep until submission or shutdown.
                None => self.wakeup.wait(&mut state),
            }
            if state.should_exit {
                return None;
            }
            let now = self.clock.now();
            let batch = state.queue.pop_due(now);
            if !batch.is_empty() {
                return Some(batch);
            }
            // Timeout raced a clock read, or the wake was spurious; re-evaluate.
        }
    }

    /// Runs a drained batch in pop order with no lock held.
    fn run_batch(&self, batch: ReadyBatch) {
        for ready in batch {
            if let Err(unwind) = catch_unwind(AssertUnwindSafe(ready.task)) {
                let report = TaskPanic {
                    seq: ready.seq,
                    payload: PanicPayload::from_unwind(&*unwind),
                };
                self.panicked.fetch_add(1, Ordering::Relaxed);
                #[cfg(feature = "tracing-integration")]
                tracing::error!(seq = report.seq, payload = %report.payload, "scheduled task panicked");
                if let Some(hook) = &self.panic_hook {
                    hook(&report);
                }
            }
        }
    }
}

/// Handle to a delay-aware, single-worker task runner.
///
/// Construction spawns the worker immediately. Dropping the handle drains
/// everything already due, stops the worker, and joins it, unless
/// [`detach`](Self::detach) was called first.
///
/// # Ordering
///
/// Tasks with the same due time run in submission order; an earlier-due
/// task never starts after a later-due one. Task bodies are serialized on
/// the single worker, so a slow task delays all later-due work.
pub struct TaskRunner {
    shared: Arc<Shared>,
    worker: Option<JoinHandle<()>>,
    detached: bool,
}

impl TaskRunner {
    /// Constructs a runner and starts its worker thread immediately.
    #[must_use]
    pub fn new(clock: Arc<dyn TimeSource>) -> Self {
        Self::build(clock, None)
    }

    /// Like [`new`](Self::new), with an observer for tasks that panic.
    ///
    /// The hook runs on the worker thread, after the panic has been caught
    /// and counted.
    #[must_use]
    pub fn with_panic_hook<F>(clock: Arc<dyn TimeSource>, hook: F) -> Self
    where
        F: Fn(&TaskPanic) + Send + Sync + 'static,
    {
        Self::build(clock, Some(Box::new(hook)))
    }

    fn build(clock: Arc<dyn TimeSource>, panic_hook: Option<PanicHook>) -> Self {
        let shared = Arc::new(Shared {
            state: Mutex::new(QueueState {
                queue: DelayQueue::new(),
                should_exit: false,
            }),
            wakeup: Condvar::new(),
            clock,
            panicked: AtomicU64::new(0),
            panic_hook,
        });
        let worker_shared = Arc::clone(&shared);
        let worker = std::thread::Builder::new()
            .name("postwork-worker".to_owned())
            .spawn(move || worker_shared.worker_loop())
            .expect("spawn postwork worker thread");
        Self {
            shared,
            worker: Some(worker),
            detached: false,
        }
    }

    /// Enqueues a task to run as soon as possible.
    ///
    /// Equivalent to [`post_delayed_task`](Self::post_delayed_task) with a
    /// zero delay. Never blocks on task execution.
    pub fn post_task<F>(&self, task: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.post_delayed_task(task, Duration::ZERO);
    }

    /// Enqueues a task to run once the clock reaches `now + delay`.
    ///
    /// Returns as soon as the task is queued. The due time saturates at
    /// [`Time::MAX`](crate::types::Time::MAX) for absurd delays.
    pub fn post_delayed_task<F>(&self, task: F, delay: Duration)
    where
        F: FnOnce() + Send + 'static,
    {
        self.post_boxed(Box::new(task), delay);
    }

    fn post_boxed(&self, task: Task, delay: Duration) {
        let due = self.shared.clock.now() + delay;
        {
            let mut state = self.shared.state.lock();
            state.queue.push(due, task);
        }
        // One signal so a sleeping worker re-evaluates its wait target,
        // including the case where this item is the new earliest.
        self.shared.wakeup.notify_one();
    }

    /// Relinquishes join ownership of the worker thread.
    ///
    /// The worker keeps running independently; the handle stays usable for
    /// posting, and dropping it no longer waits for or joins the worker.
    /// Idempotent.
    pub fn detach(&mut self) {
        self.detached = true;
        // Dropping the JoinHandle detaches the OS thread.
        drop(self.worker.take());
    }

    /// Returns true once [`detach`](Self::detach) has been called.
    #[must_use]
    pub fn is_detached(&self) -> bool {
        self.detached
    }

    /// Returns the number of tasks not yet handed to the worker.
    #[must_use]
    pub fn pending_tasks(&self) -> usize {
        self.shared.state.lock().queue.len()
    }

    /// Returns how many tasks have panicked on the worker so far.
    #[must_use]
    pub fn panicked_tasks(&self) -> u64 {
        self.shared.panicked.load(Ordering::Relaxed)
    }

    /// Explicit form of the destructor: drains currently-due work, stops
    /// the worker, and joins it (unless detached).
    pub fn close(self) {
        drop(self);
    }
}

impl Drop for TaskRunner {
    fn drop(&mut self) {
        if self.detached {
            // Courtesy flag only, no wakeup: the worker observes it at its
            // next natural wake and exits then. Until that wake, its own
            // Arc keeps the scheduler state alive.
            self.shared.state.lock().should_exit = true;
            return;
        }
        let Some(worker) = self.worker.take() else {
            return;
        };

        // Drain handshake on a dedicated mutex/condvar pair, decoupled from
        // the scheduler's own lock. The sentinel is queued after everything
        // already due, so FIFO-on-tie guarantees all of it ran before the
        // sentinel flips the flag. Future-dated items are dropped.
        let done = Arc::new((Mutex::new(false), Condvar::new()));
        let sentinel_done = Arc::clone(&done);
        self.post_task(move || {
            let (flag, signal) = &*sentinel_done;
            *flag.lock() = true;
            signal.notify_one();
        });
        let (flag, signal) = &*done;
        let mut drained = flag.lock();
        while !*drained {
            signal.wait(&mut drained);
        }
        drop(drained);

        {
            let mut state = self.shared.state.lock();
            state.should_exit = true;
        }
        self.shared.wakeup.notify_one();
        // The loop isolates task panics, so join only fails if the worker
        // thread itself died; nothing to recover at this point.
        let _ = worker.join();
    }
}

impl fmt::Debug for TaskRunner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskRunner")
            .field("pending", &self.pending_tasks())
            .field("detached", &self.detached)
            .finish_non_exhaustive()
    }
}
