//! Fixed-size thread-pool scheduler for dependency-ordered tasks.
//!
//! A [`Worker`] owns a FIFO queue of [`Task`]s and a set of pool threads
//! that repeatedly pick the first *eligible* task: dependencies complete,
//! and — for tasks on the GPU-accelerated path — the shared-resource cap
//! not exhausted. Completion is observable through [`Worker::wait_all`]
//! and [`Worker::get_status`]; the first task failure is latched and never
//! overwritten by later ones.
//!
//! What happens to dependents of a failed task is an [`ErrorPolicy`]
//! decision, not a task property: by default they still run (stages like
//! saving partial output remain useful), while [`ErrorPolicy::SkipDependents`]
//! marks them failed without executing.

use crate::error::StackError;
use crate::log::Logger;
use crate::task::Task;
use crate::tasks::load::RETRY_INTERVAL;
use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// What pool threads do with tasks whose dependency has failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ErrorPolicy {
    /// Dependents run anyway; stages are expected to cope with partial
    /// upstream results.
    #[default]
    ContinueOnError,
    /// Dependents are marked failed without executing.
    SkipDependents,
}

/// Pool sizing and scheduling policy.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Number of pool threads.
    pub threads: usize,
    /// Maximum tasks on the GPU-accelerated path running at once.
    pub opencl_cap: usize,
    /// Failed-dependency handling.
    pub error_policy: ErrorPolicy,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            threads: thread::available_parallelism().map(|n| n.get()).unwrap_or(2),
            opencl_cap: 1,
            error_policy: ErrorPolicy::default(),
        }
    }
}

/// Progress snapshot for status displays.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerStatus {
    /// Tasks submitted so far.
    pub total: usize,
    /// Tasks that reached a terminal state (skipped ones included).
    pub completed: usize,
    /// Name of the running task with the highest ordering index.
    pub running_name: Option<String>,
}

struct QueueState {
    pending: VecDeque<Arc<dyn Task>>,
    running: Vec<Arc<dyn Task>>,
    closed: bool,
    opencl_users: usize,
    total: usize,
    completed: usize,
    error: Option<String>,
}

struct Shared {
    state: Mutex<QueueState>,
    wake: Condvar,
    opencl_cap: usize,
    policy: ErrorPolicy,
    logger: Arc<dyn Logger>,
}

/// Thread pool executing [`Task`]s in dependency order.
///
/// Dropping the pool closes the queue and joins every thread. Pending
/// tasks are drained normally first; tasks that can never become ready —
/// a dependency that was never submitted, an input that never appeared —
/// are failed with [`StackError::Shutdown`] instead of hanging the join.
pub struct Worker {
    shared: Arc<Shared>,
    threads: Vec<JoinHandle<()>>,
}

impl Worker {
    /// Starts the pool threads.
    pub fn new(config: WorkerConfig, logger: Arc<dyn Logger>) -> Self {
        let shared = Arc::new(Shared {
            state: Mutex::new(QueueState {
                pending: VecDeque::new(),
                running: Vec::new(),
                closed: false,
                opencl_users: 0,
                total: 0,
                completed: 0,
                error: None,
            }),
            wake: Condvar::new(),
            opencl_cap: config.opencl_cap,
            policy: config.error_policy,
            logger,
        });

        tracing::debug!(
            threads = config.threads,
            opencl_cap = config.opencl_cap,
            "starting worker pool"
        );

        let threads = (0..config.threads.max(1))
            .map(|_| {
                let shared = shared.clone();
                thread::spawn(move || pool_thread(&shared))
            })
            .collect();

        Self { shared, threads }
    }

    /// Appends a task to the queue.
    pub fn add(&self, task: Arc<dyn Task>) {
        let mut state = self.shared.state.lock();
        state.total += 1;
        state.pending.push_back(task);
        self.shared.wake.notify_all();
    }

    /// Inserts a task at the head of the queue, ahead of pending work.
    pub fn prepend(&self, task: Arc<dyn Task>) {
        let mut state = self.shared.state.lock();
        state.total += 1;
        state.pending.push_front(task);
        self.shared.wake.notify_all();
    }

    /// Blocks until every submitted task has completed.
    ///
    /// Returns false if `timeout` elapsed first; `None` waits forever.
    pub fn wait_all(&self, timeout: Option<Duration>) -> bool {
        let deadline = timeout.map(|t| Instant::now() + t);
        let mut state = self.shared.state.lock();
        while state.completed < state.total {
            match deadline {
                None => self.shared.wake.wait(&mut state),
                Some(d) => {
                    if self.shared.wake.wait_until(&mut state, d).timed_out() {
                        return state.completed >= state.total;
                    }
                }
            }
        }
        true
    }

    /// True once any task has failed.
    pub fn failed(&self) -> bool {
        self.shared.state.lock().error.is_some()
    }

    /// The first failure message, latched; later failures never replace it.
    pub fn error(&self) -> Option<String> {
        self.shared.state.lock().error.clone()
    }

    /// Snapshot of queue progress.
    pub fn get_status(&self) -> WorkerStatus {
        let state = self.shared.state.lock();
        WorkerStatus {
            total: state.total,
            completed: state.completed,
            running_name: state
                .running
                .iter()
                .max_by_key(|t| t.index())
                .map(|t| t.name().to_string()),
        }
    }
}

impl Drop for Worker {
    fn drop(&mut self) {
        {
            let mut state = self.shared.state.lock();
            state.closed = true;
            self.shared.wake.notify_all();
        }
        for handle in self.threads.drain(..) {
            let _ = handle.join();
        }
    }
}

fn pool_thread(shared: &Shared) {
    let mut state = shared.state.lock();
    loop {
        // Scan in queue order: resolve skip-policy casualties, then take
        // the first task that is ready and within the opencl cap.
        let mut next = None;
        let mut skipped = false;
        let mut i = 0;
        while i < state.pending.len() {
            let task = state.pending[i].clone();

            if shared.policy == ErrorPolicy::SkipDependents
                && task.core().has_failed_dependency()
            {
                state.pending.remove(i);
                let dep = task.core().failed_dependency().unwrap_or_default();
                let err = StackError::DependencyFailed(dep);
                if task.core().fail_without_running(&err) {
                    shared.logger.verbose(format_args!("{}: {}", task.name(), err));
                }
                state.completed += 1;
                skipped = true;
                continue;
            }

            if task.ready_to_run()
                && (!task.uses_opencl() || state.opencl_users < shared.opencl_cap)
            {
                next = Some(i);
                break;
            }
            i += 1;
        }
        if skipped {
            shared.wake.notify_all();
        }

        if let Some(task) = next.and_then(|i| state.pending.remove(i)) {
            let opencl = task.uses_opencl();
            if opencl {
                state.opencl_users += 1;
            }
            state.running.push(task.clone());
            drop(state);

            task.run(&shared.logger);

            state = shared.state.lock();
            state.running.retain(|t| !Arc::ptr_eq(t, &task));
            if opencl {
                state.opencl_users -= 1;
            }
            state.completed += 1;
            if state.error.is_none() {
                if let Some(msg) = task.error() {
                    state.error = Some(format!("{}: {}", task.name(), msg));
                }
            }
            shared.wake.notify_all();
            continue;
        }

        if state.pending.is_empty() {
            if state.closed {
                return;
            }
            shared.wake.wait(&mut state);
        } else if state.closed && state.running.is_empty() {
            // Queue is closing and nothing in flight can unblock the
            // remaining tasks (a dependency was never submitted, or an
            // input never appeared). Fail them rather than hang the
            // thread joining us.
            while let Some(task) = state.pending.pop_front() {
                let err = StackError::Shutdown;
                if task.core().fail_without_running(&err) {
                    shared.logger.verbose(format_args!("{}: {}", task.name(), err));
                }
                state.completed += 1;
            }
            shared.wake.notify_all();
            return;
        } else {
            // Pending tasks exist but none is eligible. Readiness can flip
            // without a queue event (a loader's file appearing on disk),
            // so bound the sleep to the loader retry cadence.
            shared.wake.wait_for(&mut state, RETRY_INTERVAL);
        }
    }
}
