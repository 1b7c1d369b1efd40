#![forbid(unsafe_code)]

//! Cooperative single-threaded task queue.
//!
//! "Next turn" delivery for [`Mailbox`](crate::Mailbox) and
//! [`Task`](crate::Task) goes through a [`Scheduler`]. The host drives it: a
//! browser backend runs [`Scheduler::run_turn`] from a zero-delay timeout
//! requested by the wake hook, tests call it directly. Nothing runs in
//! parallel; a turn is just a batch of deferred closures.
//!
//! # Invariants
//!
//! 1. Jobs run in the order they were scheduled.
//! 2. A turn runs exactly the jobs queued when it started. Jobs scheduled
//!    during a turn run in a later turn.
//! 3. The wake hook fires once each time the queue goes from empty to
//!    non-empty.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::fmt;
use std::rc::Rc;

type Job = Box<dyn FnOnce()>;

thread_local! {
    static GLOBAL_SCHEDULER: Scheduler = Scheduler::new();
}

struct SchedulerInner {
    queue: RefCell<VecDeque<Job>>,
    wake: RefCell<Option<Rc<dyn Fn()>>>,
    turns: Cell<u64>,
}

/// Shared handle to a task queue.
#[derive(Clone)]
pub struct Scheduler {
    inner: Rc<SchedulerInner>,
}

impl Scheduler {
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Rc::new(SchedulerInner {
                queue: RefCell::new(VecDeque::new()),
                wake: RefCell::new(None),
                turns: Cell::new(0),
            }),
        }
    }

    /// The thread's default scheduler.
    #[must_use]
    pub fn global() -> Self {
        GLOBAL_SCHEDULER.with(Clone::clone)
    }

    /// Install the hook called when the queue becomes non-empty.
    pub fn set_wake(&self, wake: impl Fn() + 'static) {
        *self.inner.wake.borrow_mut() = Some(Rc::new(wake));
    }

    /// Defer `job` to a later turn.
    pub fn schedule(&self, job: impl FnOnce() + 'static) {
        let was_empty = {
            let mut queue = self.inner.queue.borrow_mut();
            let was_empty = queue.is_empty();
            queue.push_back(Box::new(job));
            was_empty
        };
        if was_empty {
            let wake = self.inner.wake.borrow().clone();
            if let Some(wake) = wake {
                wake();
            }
        }
    }

    /// Number of queued jobs.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.inner.queue.borrow().len()
    }

    /// Turns run so far.
    #[must_use]
    pub fn turns(&self) -> u64 {
        self.inner.turns.get()
    }

    /// Run one turn. Returns the number of jobs run.
    pub fn run_turn(&self) -> usize {
        let batch = std::mem::take(&mut *self.inner.queue.borrow_mut());
        if batch.is_empty() {
            return 0;
        }
        let turn = self.inner.turns.get() + 1;
        self.inner.turns.set(turn);
        let count = batch.len();
        tracing::trace!(turn, jobs = count, "scheduler turn");
        for job in batch {
            job();
        }
        count
    }

    /// Run turns until the queue is empty or `max_turns` turns have run.
    ///
    /// Returns the total number of jobs run. Jobs left over after the budget
    /// stay queued.
    pub fn run_until_idle(&self, max_turns: usize) -> usize {
        let mut total = 0;
        for _ in 0..max_turns {
            let ran = self.run_turn();
            if ran == 0 {
                return total;
            }
            total += ran;
        }
        let left = self.pending();
        if left > 0 {
            tracing::warn!(max_turns, pending = left, "scheduler turn budget exhausted");
        }
        total
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scheduler")
            .field("pending", &self.pending())
            .field("turns", &self.turns())
            .finish()
    }
}
