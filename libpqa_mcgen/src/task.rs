use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;

use crate::error::TaskError;

/// The kinds of background work a session can run. At most one task of each
/// kind may be in flight at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskKind {
    PlanLoad,
    LogLoad,
    RangeTableLoad,
    TopasGenerate,
    MoquiGenerate,
    SpreadsheetExport,
    LogDivision,
}

const TASK_KIND_COUNT: usize = 7;

impl TaskKind {
    pub fn label(&self) -> &'static str {
        match self {
            TaskKind::PlanLoad => "plan load",
            TaskKind::LogLoad => "log load",
            TaskKind::RangeTableLoad => "range table load",
            TaskKind::TopasGenerate => "TOPAS generation",
            TaskKind::MoquiGenerate => "MOQUI generation",
            TaskKind::SpreadsheetExport => "spreadsheet export",
            TaskKind::LogDivision => "log division",
        }
    }
}

/// Progress fraction in [0, 1], owned by a single task and polled by the
/// caller. Each task gets its own instance; nothing is multiplexed.
#[derive(Debug, Clone, Default)]
pub struct Progress(Arc<Mutex<f32>>);

impl Progress {
    pub fn set(&self, value: f32) {
        if let Ok(mut guard) = self.0.lock() {
            *guard = value;
        }
    }

    pub fn add(&self, delta: f32) {
        if let Ok(mut guard) = self.0.lock() {
            *guard += delta;
        }
    }

    pub fn get(&self) -> f32 {
        self.0.lock().map(|guard| *guard).unwrap_or(0.0)
    }
}

/// Handle to one spawned background task.
///
/// The task runs to completion or failure; there is no cancellation. Poll
/// with [`TaskHandle::is_finished`] and take the outcome with
/// [`TaskHandle::join`].
#[derive(Debug)]
pub struct TaskHandle<T> {
    kind: TaskKind,
    progress: Progress,
    handle: JoinHandle<T>,
}

impl<T> TaskHandle<T> {
    pub fn kind(&self) -> TaskKind {
        self.kind
    }

    pub fn progress(&self) -> f32 {
        self.progress.get()
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    pub fn join(self) -> std::thread::Result<T> {
        self.handle.join()
    }
}

/// Per-kind busy flags enforcing the one-task-per-kind rule.
#[derive(Debug, Default)]
pub struct TaskRegistry {
    busy: [Arc<AtomicBool>; TASK_KIND_COUNT],
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawn a job on its own thread, handing it the task's progress state.
    ///
    /// Fails with [`TaskError::AlreadyRunning`] when a task of the same kind
    /// has been started and has not yet finished.
    pub fn spawn<T, F>(&self, kind: TaskKind, job: F) -> Result<TaskHandle<T>, TaskError>
    where
        T: Send + 'static,
        F: FnOnce(&Progress) -> T + Send + 'static,
    {
        let flag = self.busy[kind as usize].clone();
        if flag
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(TaskError::AlreadyRunning(kind.label()));
        }

        let progress = Progress::default();
        let thread_progress = progress.clone();
        let handle = std::thread::spawn(move || {
            let outcome = job(&thread_progress);
            flag.store(false, Ordering::Release);
            outcome
        });

        Ok(TaskHandle {
            kind,
            progress,
            handle,
        })
    }

    pub fn is_busy(&self, kind: TaskKind) -> bool {
        self.busy[kind as usize].load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;

    #[test]
    fn a_second_task_of_the_same_kind_is_rejected_while_one_runs() {
        let registry = TaskRegistry::new();
        let (release_tx, release_rx) = mpsc::channel::<()>();

        let first = registry
            .spawn(TaskKind::TopasGenerate, move |_| {
                release_rx.recv().ok();
                42
            })
            .unwrap();
        assert!(registry.is_busy(TaskKind::TopasGenerate));

        match registry.spawn(TaskKind::TopasGenerate, |_| 0) {
            Err(TaskError::AlreadyRunning(label)) => assert_eq!(label, "TOPAS generation"),
            other => panic!("expected AlreadyRunning, got {other:?}"),
        }

        // A different kind is unaffected
        let other = registry.spawn(TaskKind::MoquiGenerate, |_| 1).unwrap();
        assert_eq!(other.join().unwrap(), 1);

        release_tx.send(()).unwrap();
        assert_eq!(first.join().unwrap(), 42);
        assert!(registry.spawn(TaskKind::TopasGenerate, |_| 7).is_ok());
    }

    #[test]
    fn progress_is_owned_per_task_and_polled_by_the_caller() {
        let registry = TaskRegistry::new();
        let (release_tx, release_rx) = mpsc::channel::<()>();
        let task = registry
            .spawn(TaskKind::LogLoad, move |progress| {
                progress.set(0.5);
                release_rx.recv().ok();
                progress.set(1.0);
            })
            .unwrap();

        while task.progress() < 0.5 {
            std::thread::yield_now();
        }
        release_tx.send(()).unwrap();
        task.join().unwrap();
    }
}
