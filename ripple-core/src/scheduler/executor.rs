//! Deferral backends for the update scheduler.
//!
//! The scheduler never runs a flush inline. It hands a single task to an
//! [`Executor`], which runs it on a later turn of whatever event loop hosts
//! the runtime.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::fmt;

/// A deferred unit of work.
pub type Task = Box<dyn FnOnce()>;

/// Runs tasks on a later turn.
pub trait Executor {
    /// Queue `task` to run after the current synchronous burst.
    fn defer(&self, task: Task);

    /// Run tasks this executor drives itself. Returns how many ran.
    ///
    /// Executors backed by an external event loop return 0.
    fn run_pending(&self) -> usize {
        0
    }
}

/// In-process task queue. Nothing runs until [`Executor::run_pending`].
#[derive(Default)]
pub struct TaskQueue {
    tasks: RefCell<VecDeque<Task>>,
}

impl TaskQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.tasks.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.borrow().is_empty()
    }
}

impl Executor for TaskQueue {
    fn defer(&self, task: Task) {
        self.tasks.borrow_mut().push_back(task);
    }

    /// Run the tasks queued when the call began. Tasks deferred while
    /// draining wait for the next call.
    fn run_pending(&self) -> usize {
        let batch = std::mem::take(&mut *self.tasks.borrow_mut());
        let count = batch.len();
        for task in batch {
            task();
        }
        count
    }
}

impl fmt::Debug for TaskQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskQueue")
            .field("pending", &self.len())
            .finish()
    }
}

/// Defers onto the current tokio `LocalSet`.
///
/// # Panics
///
/// Deferring outside a `LocalSet` context panics, as `spawn_local` does.
/// For a runtime using this executor, that includes any write that queues a
/// job on the scheduler.
#[derive(Debug, Default, Clone, Copy)]
pub struct TokioExecutor;

impl Executor for TokioExecutor {
    fn defer(&self, task: Task) {
        tokio::task::spawn_local(async move { task() });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::rc::Rc;

    #[test]
    fn task_queue_defers_until_drained() {
        let queue = TaskQueue::new();
        let ran = Rc::new(Cell::new(0));

        for _ in 0..3 {
            let ran = ran.clone();
            queue.defer(Box::new(move || ran.set(ran.get() + 1)));
        }
        assert_eq!(ran.get(), 0);
        assert_eq!(queue.len(), 3);

        assert_eq!(queue.run_pending(), 3);
        assert_eq!(ran.get(), 3);
        assert!(queue.is_empty());
    }

    #[test]
    fn tasks_deferred_while_draining_wait() {
        let queue = Rc::new(TaskQueue::new());
        let ran = Rc::new(Cell::new(0));

        {
            let inner_queue = queue.clone();
            let ran = ran.clone();
            queue.defer(Box::new(move || {
                ran.set(ran.get() + 1);
                let ran = ran.clone();
                inner_queue.defer(Box::new(move || ran.set(ran.get() + 10)));
            }));
        }

        assert_eq!(queue.run_pending(), 1);
        assert_eq!(ran.get(), 1);
        assert_eq!(queue.run_pending(), 1);
        assert_eq!(ran.get(), 11);
    }

    #[test]
    #[should_panic]
    fn tokio_executor_outside_local_set_panics() {
        TokioExecutor.defer(Box::new(|| {}));
    }

    #[tokio::test(flavor = "current_thread")]
    async fn tokio_executor_runs_on_local_set() {
        let local = tokio::task::LocalSet::new();
        let ran = Rc::new(Cell::new(false));

        local
            .run_until({
                let ran = ran.clone();
                async move {
                    TokioExecutor.defer(Box::new(move || ran.set(true)));
                    tokio::task::yield_now().await;
                }
            })
            .await;
        local.await;

        assert!(ran.get());
    }
}
