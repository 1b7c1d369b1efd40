#![forbid(unsafe_code)]

//! Deferred entry points into the signal graph.
//!
//! A [`Mailbox`] is where user actions enter. Its [`send`](Mailbox::send)
//! never propagates synchronously: the value is queued on the
//! [`Scheduler`] and pushed into the mailbox's [`Signal`] on the next turn.
//! Event handlers can therefore post actions while a render is still on the
//! stack without re-entering the pipeline.
//!
//! An [`Address`] is a cloneable, type-erased "send here" handle, usually
//! handed to views so they can build event handlers.

use std::fmt;
use std::rc::Rc;

use crate::scheduler::Scheduler;
use crate::signal::Signal;

/// Signal entry point with next-turn delivery.
pub struct Mailbox<T: 'static> {
    signal: Signal<T>,
    scheduler: Scheduler,
}

impl<T: 'static> Clone for Mailbox<T> {
    fn clone(&self) -> Self {
        Self {
            signal: self.signal.clone(),
            scheduler: self.scheduler.clone(),
        }
    }
}

impl<T: 'static> Mailbox<T> {
    /// Mailbox on the thread's global scheduler.
    #[must_use]
    pub fn new() -> Self {
        Self::with_scheduler(Scheduler::global())
    }

    #[must_use]
    pub fn with_scheduler(scheduler: Scheduler) -> Self {
        Self {
            signal: Signal::new(),
            scheduler,
        }
    }

    /// Queue `initial` right away, so it is delivered on the first turn to
    /// whatever is connected by then.
    #[must_use]
    pub fn with_initial(self, initial: T) -> Self {
        self.send(initial);
        self
    }

    /// Deliver `value` on the next scheduler turn.
    pub fn send(&self, value: T) {
        let signal = self.signal.clone();
        self.scheduler.schedule(move || signal.send(value));
    }

    /// The node values come out of.
    #[must_use]
    pub fn signal(&self) -> &Signal<T> {
        &self.signal
    }

    #[must_use]
    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    /// A cloneable handle posting into this mailbox.
    #[must_use]
    pub fn address(&self) -> Address<T> {
        let mailbox = self.clone();
        Address::new(move |value| mailbox.send(value))
    }
}

impl<T: 'static> Default for Mailbox<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: 'static> fmt::Debug for Mailbox<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Mailbox")
            .field("signal", &self.signal)
            .field("scheduler", &self.scheduler)
            .finish()
    }
}

/// Where to send values of type `T`.
pub struct Address<T> {
    deliver: Rc<dyn Fn(T)>,
}

impl<T> Clone for Address<T> {
    fn clone(&self) -> Self {
        Self {
            deliver: Rc::clone(&self.deliver),
        }
    }
}

impl<T: 'static> Address<T> {
    pub fn new(deliver: impl Fn(T) + 'static) -> Self {
        Self {
            deliver: Rc::new(deliver),
        }
    }

    pub fn send(&self, value: T) {
        (self.deliver)(value);
    }

    /// Address accepting `U`, converted with `f` before delivery here.
    pub fn forward<U: 'static>(&self, f: impl Fn(U) -> T + 'static) -> Address<U> {
        let target = self.clone();
        Address::new(move |value| target.send(f(value)))
    }
}

impl<T> fmt::Debug for Address<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Address")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    #[test]
    fn send_is_deferred_to_next_turn() {
        let scheduler = Scheduler::new();
        let mailbox = Mailbox::with_scheduler(scheduler.clone());
        let seen = Rc::new(RefCell::new(Vec::new()));
        let s = Rc::clone(&seen);
        let _sub = mailbox.signal().recv(move |v: &u32| s.borrow_mut().push(*v));

        mailbox.send(1);
        mailbox.send(2);
        assert!(seen.borrow().is_empty());

        scheduler.run_turn();
        assert_eq!(*seen.borrow(), [1, 2]);
    }

    #[test]
    fn initial_value_reaches_late_listener() {
        let scheduler = Scheduler::new();
        let mailbox = Mailbox::with_scheduler(scheduler.clone()).with_initial("boot");
        let seen = Rc::new(RefCell::new(Vec::new()));
        let s = Rc::clone(&seen);
        let _sub = mailbox.signal().recv(move |v: &&str| s.borrow_mut().push(*v));

        assert_eq!(scheduler.pending(), 1);
        scheduler.run_turn();
        assert_eq!(*seen.borrow(), ["boot"]);
    }

    #[test]
    fn address_forward_converts() {
        let scheduler = Scheduler::new();
        let mailbox: Mailbox<String> = Mailbox::with_scheduler(scheduler.clone());
        let seen = Rc::new(RefCell::new(Vec::new()));
        let s = Rc::clone(&seen);
        let _sub = mailbox.signal().recv(move |v: &String| s.borrow_mut().push(v.clone()));

        let numbers = mailbox.address().forward(|n: u8| format!("n={n}"));
        numbers.send(4);
        scheduler.run_turn();
        assert_eq!(*seen.borrow(), ["n=4"]);
    }

    #[test]
    fn sends_from_listener_land_in_later_turn() {
        let scheduler = Scheduler::new();
        let mailbox: Mailbox<u8> = Mailbox::with_scheduler(scheduler.clone());
        let seen = Rc::new(RefCell::new(Vec::new()));
        let s = Rc::clone(&seen);
        let again = mailbox.clone();
        let _sub = mailbox.signal().recv(move |v| {
            s.borrow_mut().push(*v);
            if *v < 3 {
                again.send(v + 1);
            }
        });

        mailbox.send(1);
        assert_eq!(scheduler.run_until_idle(10), 3);
        assert_eq!(*seen.borrow(), [1, 2, 3]);
        assert_eq!(scheduler.turns(), 3);
    }
}
