#![forbid(unsafe_code)]

//! Single-assignment value with at-most-once delivery.
//!
//! A [`Task`] starts `Pending`. The first [`send`](Task::send) latches the
//! value, runs every listener registered so far with it, and clears the
//! listener list; the task is then `Resolved` for good. Later sends are
//! ignored (first write wins, silently). A listener added after resolution is
//! not queued: it runs on the next scheduler turn with the latched value.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use crate::scheduler::Scheduler;

type Pending<T> = Vec<Box<dyn FnOnce(&T)>>;

enum TaskState<T> {
    Pending(Pending<T>),
    Resolved(Rc<T>),
}

/// A value delivered at most once to each listener.
pub struct Task<T: 'static> {
    state: Rc<RefCell<TaskState<T>>>,
    scheduler: Scheduler,
}

impl<T: 'static> Clone for Task<T> {
    fn clone(&self) -> Self {
        Self {
            state: Rc::clone(&self.state),
            scheduler: self.scheduler.clone(),
        }
    }
}

impl<T: 'static> Task<T> {
    /// Pending task on the thread's global scheduler.
    #[must_use]
    pub fn new() -> Self {
        Self::with_scheduler(Scheduler::global())
    }

    #[must_use]
    pub fn with_scheduler(scheduler: Scheduler) -> Self {
        Self {
            state: Rc::new(RefCell::new(TaskState::Pending(Vec::new()))),
            scheduler,
        }
    }

    /// Resolve with `value`. Returns `false` if already resolved.
    pub fn send(&self, value: T) -> bool {
        let value = Rc::new(value);
        let previous = {
            let mut state = self.state.borrow_mut();
            if matches!(*state, TaskState::Resolved(_)) {
                tracing::trace!("task already resolved; send ignored");
                return false;
            }
            std::mem::replace(&mut *state, TaskState::Resolved(Rc::clone(&value)))
        };
        if let TaskState::Pending(listeners) = previous {
            for listener in listeners {
                listener(&value);
            }
        }
        true
    }

    /// Run `callback` once with the value.
    ///
    /// Pending: queued until the first send. Resolved: scheduled for the next
    /// turn.
    pub fn recv(&self, callback: impl FnOnce(&T) + 'static) {
        let resolved = match &mut *self.state.borrow_mut() {
            TaskState::Pending(listeners) => {
                listeners.push(Box::new(callback));
                return;
            }
            TaskState::Resolved(value) => Rc::clone(value),
        };
        self.scheduler.schedule(move || callback(&resolved));
    }

    #[must_use]
    pub fn is_resolved(&self) -> bool {
        matches!(*self.state.borrow(), TaskState::Resolved(_))
    }

    /// The latched value, if any.
    #[must_use]
    pub fn value(&self) -> Option<Rc<T>> {
        match &*self.state.borrow() {
            TaskState::Pending(_) => None,
            TaskState::Resolved(value) => Some(Rc::clone(value)),
        }
    }
}

impl<T: 'static> Default for Task<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: fmt::Debug + 'static> fmt::Debug for Task<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &*self.state.borrow() {
            TaskState::Pending(listeners) => f
                .debug_struct("Task")
                .field("state", &"Pending")
                .field("listeners", &listeners.len())
                .finish(),
            TaskState::Resolved(value) => f
                .debug_struct("Task")
                .field("state", &"Resolved")
                .field("value", value)
                .finish(),
        }
    }
}
