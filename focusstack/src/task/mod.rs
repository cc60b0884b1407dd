//! Dependency-ordered units of deferred work.
//!
//! A [`Task`] is the atomic unit the scheduler dispatches: it carries a
//! display name, an ordered dependency list, and a small thread-safe
//! lifecycle (Pending → Running → Succeeded | Failed). Concrete stages
//! embed a [`TaskCore`] for the shared state and implement the single
//! [`Task::execute`] seam with their own work; everything else — the
//! readiness check, the run-once guard, failure capture, and blocking
//! [`Task::wait`] — is provided by the trait in terms of the core.
//!
//! Failure never leaves a task stuck in Running: any error raised by
//! `execute` is caught exactly once at the `run()` boundary, stored, and
//! the task still reaches a terminal state so dependents are unblocked.

pub mod image;

use crate::error::StackError;
use crate::log::Logger;
use parking_lot::{Condvar, Mutex};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Lifecycle state of a task.
///
/// `Failed` still counts as "completed" for dependency purposes; whether
/// dependents of a failed task execute is a scheduler policy, not a task
/// concern (see [`crate::worker::ErrorPolicy`]).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskState {
    /// Not yet started.
    Pending,
    /// Currently executing on a pool thread.
    Running,
    /// Finished successfully.
    Succeeded,
    /// Finished with the stored error message.
    Failed(String),
}

impl TaskState {
    /// Returns true for either terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed(_))
    }
}

/// Shared identity and lifecycle state embedded by every concrete task.
pub struct TaskCore {
    name: String,
    filename: String,
    index: AtomicUsize,
    depends_on: Vec<Arc<dyn Task>>,
    state: Mutex<TaskState>,
    done: Condvar,
}

impl TaskCore {
    /// Creates a core with no dependencies.
    ///
    /// # Arguments
    ///
    /// * `name` - Display name for diagnostics, e.g. "load img01.jpg"
    /// * `filename` - Source path, or a short label for in-memory inputs
    pub fn new(name: impl Into<String>, filename: impl Into<String>) -> Self {
        Self::with_depends(name, filename, Vec::new())
    }

    /// Creates a core with the given dependency list.
    pub fn with_depends(
        name: impl Into<String>,
        filename: impl Into<String>,
        depends_on: Vec<Arc<dyn Task>>,
    ) -> Self {
        Self {
            name: name.into(),
            filename: filename.into(),
            index: AtomicUsize::new(0),
            depends_on,
            state: Mutex::new(TaskState::Pending),
            done: Condvar::new(),
        }
    }

    /// True once every dependency has reached a terminal state.
    pub fn depends_ready(&self) -> bool {
        self.depends_on.iter().all(|d| d.is_completed())
    }

    /// True if any dependency finished with a failure.
    pub fn has_failed_dependency(&self) -> bool {
        self.depends_on.iter().any(|d| d.has_failed())
    }

    /// Name of the first failed dependency, if any.
    pub fn failed_dependency(&self) -> Option<String> {
        self.depends_on
            .iter()
            .find(|d| d.has_failed())
            .map(|d| d.name().to_string())
    }

    /// Atomically transitions Pending → Running.
    ///
    /// Returns false if the task is already running or terminal, in which
    /// case the caller must not execute the work again.
    fn begin_run(&self) -> bool {
        let mut state = self.state.lock();
        if *state != TaskState::Pending {
            return false;
        }
        *state = TaskState::Running;
        true
    }

    /// Records the outcome and wakes every thread blocked in `wait()`.
    fn finish(&self, result: Result<(), StackError>) {
        let mut state = self.state.lock();
        *state = match result {
            Ok(()) => TaskState::Succeeded,
            Err(e) => TaskState::Failed(e.to_string()),
        };
        self.done.notify_all();
    }

    /// Marks the task terminally failed without running it.
    ///
    /// Used by the scheduler's skip-dependents policy. A no-op unless the
    /// task is still pending.
    pub(crate) fn fail_without_running(&self, error: &StackError) -> bool {
        let mut state = self.state.lock();
        if *state != TaskState::Pending {
            return false;
        }
        *state = TaskState::Failed(error.to_string());
        self.done.notify_all();
        true
    }
}

/// A unit of deferred, dependency-ordered work with a blocking wait.
///
/// Implementors supply [`core`](Task::core) and [`execute`](Task::execute);
/// the lifecycle methods are provided and must not be overridden. Only
/// [`ready_to_run`](Task::ready_to_run) may be refined, and refinements
/// must keep the base dependency check (tighten, never loosen).
pub trait Task: Send + Sync {
    /// Shared lifecycle state.
    fn core(&self) -> &TaskCore;

    /// The stage-specific work. Called at most once, from `run()`.
    fn execute(&self, logger: &Arc<dyn Logger>) -> Result<(), StackError>;

    /// Whether this task must serialize on the constrained shared
    /// resource (the GPU-accelerated code path).
    fn uses_opencl(&self) -> bool {
        false
    }

    /// True when the task can be started.
    ///
    /// The base condition is that every dependency is completed; a failed
    /// dependency still reads as completed here.
    fn ready_to_run(&self) -> bool {
        self.core().depends_ready()
    }

    /// Display name for diagnostics and progress reporting.
    fn name(&self) -> &str {
        &self.core().name
    }

    /// Source path, or a short label for in-memory inputs.
    fn filename(&self) -> &str {
        &self.core().filename
    }

    /// Short label derived from the path, for diagnostics only.
    fn basename(&self) -> String {
        Path::new(self.filename())
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.filename().to_string())
    }

    /// Orchestrator-assigned ordering index.
    fn index(&self) -> usize {
        self.core().index.load(Ordering::Relaxed)
    }

    /// Assigns the ordering index. Called once by the orchestrator.
    fn set_index(&self, index: usize) {
        self.core().index.store(index, Ordering::Relaxed);
    }

    /// Tasks whose results this task consumes, in construction order.
    fn depends_on(&self) -> &[Arc<dyn Task>] {
        &self.core().depends_on
    }

    /// True while the task is executing.
    fn is_running(&self) -> bool {
        *self.core().state.lock() == TaskState::Running
    }

    /// True once the task reached a terminal state (success or failure).
    fn is_completed(&self) -> bool {
        self.core().state.lock().is_terminal()
    }

    /// True if the task reached the failed terminal state.
    fn has_failed(&self) -> bool {
        matches!(*self.core().state.lock(), TaskState::Failed(_))
    }

    /// The stored failure message, if the task failed.
    fn error(&self) -> Option<String> {
        match &*self.core().state.lock() {
            TaskState::Failed(msg) => Some(msg.clone()),
            _ => None,
        }
    }

    /// Runs the task to a terminal state.
    ///
    /// Re-entering on an already-running or terminal task is a no-op. Any
    /// error from `execute` is caught here, stored, and reported through
    /// the logger; the task still terminates so dependents are unblocked.
    fn run(&self, logger: &Arc<dyn Logger>) {
        if !self.core().begin_run() {
            return;
        }
        let result = self.execute(logger);
        if let Err(e) = &result {
            logger.error(format_args!("{}: {}", self.name(), e));
        }
        self.core().finish(result);
    }

    /// Blocks the calling thread until the task reaches a terminal state.
    fn wait(&self) {
        let core = self.core();
        let mut state = core.state.lock();
        while !state.is_terminal() {
            core.done.wait(&mut state);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::log::NoOpLogger;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    /// Test task that counts executions and optionally fails.
    struct ProbeTask {
        core: TaskCore,
        runs: AtomicUsize,
        fail_with: Option<String>,
    }

    impl ProbeTask {
        fn new(name: &str) -> Self {
            Self {
                core: TaskCore::new(name, name),
                runs: AtomicUsize::new(0),
                fail_with: None,
            }
        }

        fn failing(name: &str, message: &str) -> Self {
            Self {
                fail_with: Some(message.to_string()),
                ..Self::new(name)
            }
        }

        fn with_depends(name: &str, depends: Vec<Arc<dyn Task>>) -> Self {
            Self {
                core: TaskCore::with_depends(name, name, depends),
                runs: AtomicUsize::new(0),
                fail_with: None,
            }
        }
    }

    impl Task for ProbeTask {
        fn core(&self) -> &TaskCore {
            &self.core
        }

        fn execute(&self, _logger: &Arc<dyn Logger>) -> Result<(), StackError> {
            self.runs.fetch_add(1, Ordering::SeqCst);
            match &self.fail_with {
                Some(msg) => Err(StackError::LoadFailed(msg.clone())),
                None => Ok(()),
            }
        }
    }

    fn logger() -> Arc<dyn Logger> {
        Arc::new(NoOpLogger)
    }

    #[test]
    fn test_lifecycle_success() {
        let task = ProbeTask::new("t");
        assert!(!task.is_running());
        assert!(!task.is_completed());

        task.run(&logger());
        assert!(task.is_completed());
        assert!(!task.is_running());
        assert!(!task.has_failed());
        assert_eq!(task.error(), None);
        assert_eq!(task.runs.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_run_is_not_reentrant() {
        let task = ProbeTask::new("t");
        task.run(&logger());
        task.run(&logger());
        assert_eq!(task.runs.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_failure_is_terminal_and_stored() {
        let task = ProbeTask::failing("t", "input/img.jpg");
        task.run(&logger());

        assert!(task.is_completed());
        assert!(task.has_failed());
        assert_eq!(task.error(), Some("could not load input/img.jpg".to_string()));
    }

    #[test]
    fn test_ready_to_run_tracks_dependencies() {
        let dep: Arc<dyn Task> = Arc::new(ProbeTask::new("dep"));
        let task = ProbeTask::with_depends("t", vec![dep.clone()]);

        assert!(!task.ready_to_run());
        dep.run(&logger());
        assert!(task.ready_to_run());
    }

    #[test]
    fn test_failed_dependency_still_reads_completed() {
        let dep: Arc<dyn Task> = Arc::new(ProbeTask::failing("dep", "x"));
        let task = ProbeTask::with_depends("t", vec![dep.clone()]);

        dep.run(&logger());
        assert!(dep.has_failed());
        assert!(task.ready_to_run());
        assert!(task.core().has_failed_dependency());
        assert_eq!(task.core().failed_dependency(), Some("dep".to_string()));
    }

    #[test]
    fn test_wait_blocks_until_terminal() {
        let task = Arc::new(ProbeTask::new("t"));
        let waiter = {
            let task = task.clone();
            std::thread::spawn(move || task.wait())
        };

        std::thread::sleep(Duration::from_millis(50));
        assert!(!waiter.is_finished());

        task.run(&logger());
        waiter.join().unwrap();
    }

    #[test]
    fn test_basename_strips_directory_and_extension() {
        let task = ProbeTask::new("input/stack/img0042.jpg");
        assert_eq!(task.basename(), "img0042");
    }

    #[test]
    fn test_fail_without_running_skips_pending_only() {
        let task = ProbeTask::new("t");
        let err = StackError::DependencyFailed("dep".to_string());
        assert!(task.core().fail_without_running(&err));
        assert!(task.has_failed());
        assert_eq!(task.runs.load(Ordering::SeqCst), 0);

        // Second attempt is a no-op on the terminal task.
        assert!(!task.core().fail_without_running(&err));
    }

    #[test]
    fn test_index_assignment() {
        let task = ProbeTask::new("t");
        assert_eq!(task.index(), 0);
        task.set_index(7);
        assert_eq!(task.index(), 7);
    }
}
