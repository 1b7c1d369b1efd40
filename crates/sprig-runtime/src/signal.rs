#![forbid(unsafe_code)]

//! Push-based signal nodes.
//!
//! A [`Signal<T>`] forwards every value it receives to its listeners, in
//! registration order, synchronously and depth-first: when [`Signal::send`]
//! returns, the value has reached every terminal listener downstream.
//!
//! Derived nodes ([`map`](Signal::map), [`filter`](Signal::filter),
//! [`reduce`](Signal::reduce), ...) wrap a step function. A step that yields
//! nothing stops propagation for that value.
//!
//! # Ownership
//!
//! A source holds its listeners weakly. The strong side of every edge lives
//! downstream:
//!
//! - [`Signal::recv`] returns a [`Subscription`] that owns the callback and
//!   keeps the source alive. Dropping it detaches the callback.
//! - A derived node owns the edge to its parent. Dropping every handle to a
//!   derived node detaches it and releases its upstream chain.
//!
//! So a chain such as `input.map(f).filter(p).recv(g)` stays connected
//! exactly as long as the returned subscription (or a handle to one of the
//! nodes) is held, and dead listeners are pruned on the next send.
//!
//! # Invariants
//!
//! 1. Listeners are notified in registration order.
//! 2. A listener whose subscription was dropped before a send is not called
//!    by that send.
//! 3. No `RefCell` borrow is held while user callbacks run, so listeners may
//!    attach new listeners or send into unrelated signals.

use std::any::Any;
use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

use smallvec::SmallVec;

struct Listener<T> {
    callback: Box<dyn Fn(&T)>,
}

struct SignalInner<T> {
    listeners: RefCell<Vec<Weak<Listener<T>>>>,
    upstream: RefCell<Vec<Subscription>>,
}

/// A dataflow node emitting values of type `T`.
pub struct Signal<T: 'static> {
    inner: Rc<SignalInner<T>>,
}

impl<T: 'static> Clone for Signal<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T: 'static> Default for Signal<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: 'static> fmt::Debug for Signal<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Signal")
            .field("listeners", &self.inner.listeners.borrow().len())
            .field("upstream", &self.inner.upstream.borrow().len())
            .finish()
    }
}

impl<T: 'static> Signal<T> {
    /// Create a source node with no listeners.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Rc::new(SignalInner {
                listeners: RefCell::new(Vec::new()),
                upstream: RefCell::new(Vec::new()),
            }),
        }
    }

    /// Push `value` through the graph.
    pub fn send(&self, value: T) {
        self.emit(&value);
    }

    /// Push a borrowed value through the graph.
    pub fn emit(&self, value: &T) {
        let live: SmallVec<[Rc<Listener<T>>; 4]> = {
            let mut listeners = self.inner.listeners.borrow_mut();
            listeners.retain(|listener| listener.strong_count() > 0);
            listeners.iter().filter_map(Weak::upgrade).collect()
        };
        for listener in live {
            (listener.callback)(value);
        }
    }

    /// Attach a terminal listener.
    ///
    /// The callback stays attached while the returned [`Subscription`] lives.
    pub fn recv(&self, callback: impl Fn(&T) + 'static) -> Subscription {
        let listener = Rc::new(Listener {
            callback: Box::new(callback),
        });
        let mut listeners = self.inner.listeners.borrow_mut();
        listeners.retain(|listener| listener.strong_count() > 0);
        listeners.push(Rc::downgrade(&listener));
        drop(listeners);
        Subscription {
            _listener: listener,
            _source: Rc::clone(&self.inner) as Rc<dyn Any>,
        }
    }

    /// Forward every value of this node into `listener`, returning it.
    ///
    /// The edge is owned by `listener` and lasts as long as it does.
    pub fn connect(&self, listener: Signal<T>) -> Signal<T> {
        let weak = Rc::downgrade(&listener.inner);
        let sub = self.recv(move |value| {
            if let Some(inner) = weak.upgrade() {
                Signal { inner }.emit(value);
            }
        });
        listener.inner.upstream.borrow_mut().push(sub);
        listener
    }

    /// Drop every upstream edge of this node, turning it into a source.
    pub fn detach_upstream(&self) {
        let edges = std::mem::take(&mut *self.inner.upstream.borrow_mut());
        drop(edges);
    }

    /// Number of live listeners; dead ones are pruned first.
    #[must_use]
    pub fn listener_count(&self) -> usize {
        let mut listeners = self.inner.listeners.borrow_mut();
        listeners.retain(|listener| listener.strong_count() > 0);
        listeners.len()
    }

    /// General derived node: `step` receives each value plus the child to
    /// emit into, and may emit zero or more times.
    fn derive<U: 'static>(&self, step: impl Fn(&T, &Signal<U>) + 'static) -> Signal<U> {
        let child = Signal::<U>::new();
        let weak = Rc::downgrade(&child.inner);
        let sub = self.recv(move |value| {
            if let Some(inner) = weak.upgrade() {
                step(value, &Signal { inner });
            }
        });
        child.inner.upstream.borrow_mut().push(sub);
        child
    }

    /// Transform values; `None` stops propagation.
    pub fn filter_map<U: 'static>(&self, f: impl Fn(&T) -> Option<U> + 'static) -> Signal<U> {
        self.derive(move |value, out| {
            if let Some(mapped) = f(value) {
                out.send(mapped);
            }
        })
    }

    pub fn map<U: 'static>(&self, f: impl Fn(&T) -> U + 'static) -> Signal<U> {
        self.derive(move |value, out| out.send(f(value)))
    }

    /// Forward only values satisfying `predicate`.
    pub fn filter(&self, predicate: impl Fn(&T) -> bool + 'static) -> Signal<T> {
        self.derive(move |value, out| {
            if predicate(value) {
                out.emit(value);
            }
        })
    }

    /// Fold values into state, emitting each new state.
    ///
    /// `reducer` must return a fresh state; the previous one is only lent.
    /// The initial state itself is not emitted.
    pub fn reduce<S: 'static>(
        &self,
        initial: S,
        reducer: impl Fn(&S, &T) -> S + 'static,
    ) -> Signal<S> {
        let state = RefCell::new(Rc::new(initial));
        self.derive(move |value, out: &Signal<S>| {
            // No borrow is held across the reducer, so it may send into this
            // node again; the nested step folds over the same previous state.
            let current = Rc::clone(&state.borrow());
            let next = Rc::new(reducer(&current, value));
            *state.borrow_mut() = Rc::clone(&next);
            out.emit(&*next);
        })
    }

    /// Combine with `other` into one node emitting values from both.
    pub fn merge(&self, other: &Signal<T>) -> Signal<T> {
        let child = Signal::<T>::new();
        for source in [self, other] {
            let weak = Rc::downgrade(&child.inner);
            let sub = source.recv(move |value| {
                if let Some(inner) = weak.upgrade() {
                    Signal { inner }.emit(value);
                }
            });
            child.inner.upstream.borrow_mut().push(sub);
        }
        child
    }
}

impl<T: Clone + PartialEq + 'static> Signal<T> {
    /// Suppress values equal to the last one forwarded.
    pub fn dedupe(&self) -> Signal<T> {
        let last: RefCell<Option<T>> = RefCell::new(None);
        self.derive(move |value, out| {
            if last.borrow().as_ref() == Some(value) {
                return;
            }
            *last.borrow_mut() = Some(value.clone());
            out.emit(value);
        })
    }
}

/// Handle keeping a listener attached.
///
/// Dropping it detaches the listener before the source's next send.
#[must_use = "dropping a Subscription detaches its listener immediately"]
pub struct Subscription {
    _listener: Rc<dyn Any>,
    _source: Rc<dyn Any>,
}

impl Subscription {
    /// Detach now. Same as dropping.
    pub fn unsubscribe(self) {}
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    fn collect<T: Clone + 'static>(signal: &Signal<T>) -> (Rc<RefCell<Vec<T>>>, Subscription) {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        let sub = signal.recv(move |v: &T| sink.borrow_mut().push(v.clone()));
        (seen, sub)
    }

    #[test]
    fn send_reaches_listeners_in_order() {
        let signal = Signal::new();
        let order = Rc::new(RefCell::new(Vec::new()));
        let o1 = Rc::clone(&order);
        let o2 = Rc::clone(&order);
        let _a = signal.recv(move |v: &i32| o1.borrow_mut().push(("a", *v)));
        let _b = signal.recv(move |v: &i32| o2.borrow_mut().push(("b", *v)));

        signal.send(1);
        signal.send(2);
        assert_eq!(*order.borrow(), [("a", 1), ("b", 1), ("a", 2), ("b", 2)]);
    }

    #[test]
    fn map_filter_chain() {
        let input = Signal::new();
        let evens_squared = input.filter(|v: &i32| v % 2 == 0).map(|v| v * v);
        let (seen, _sub) = collect(&evens_squared);

        for v in 1..=6 {
            input.send(v);
        }
        assert_eq!(*seen.borrow(), [4, 16, 36]);
    }

    #[test]
    fn filter_map_none_stops_propagation() {
        let input = Signal::new();
        let parsed = input.filter_map(|s: &String| s.parse::<u8>().ok());
        let (seen, _sub) = collect(&parsed);

        input.send("7".to_string());
        input.send("x".to_string());
        input.send("300".to_string());
        assert_eq!(*seen.borrow(), [7]);
    }

    #[test]
    fn reduce_emits_each_new_state() {
        let input = Signal::new();
        let total = input.reduce(10, |acc: &i32, v: &i32| acc + v);
        let (seen, _sub) = collect(&total);

        input.send(1);
        input.send(2);
        assert_eq!(*seen.borrow(), [11, 13]);
    }

    #[test]
    fn reducer_may_send_into_its_own_input() {
        let input: Signal<i32> = Signal::new();
        let again = input.clone();
        let total = input.reduce(0, move |acc: &i32, v: &i32| {
            if *v == 1 {
                again.send(10);
            }
            acc + v
        });
        let (seen, _sub) = collect(&total);

        input.send(1);
        // The nested step folds over the state the outer step started from.
        assert_eq!(*seen.borrow(), [10, 1]);
        input.send(2);
        assert_eq!(*seen.borrow(), [10, 1, 3]);
    }

    #[test]
    fn recv_prunes_dead_listeners_without_a_send() {
        let signal: Signal<u8> = Signal::new();
        for _ in 0..5 {
            drop(signal.recv(|_| {}));
        }
        let _kept = signal.recv(|_| {});
        assert_eq!(signal.inner.listeners.borrow().len(), 1);
    }

    #[test]
    fn dedupe_drops_repeats() {
        let input = Signal::new();
        let (seen, _sub) = collect(&input.dedupe());
        for v in [1, 1, 2, 2, 2, 1] {
            input.send(v);
        }
        assert_eq!(*seen.borrow(), [1, 2, 1]);
    }

    #[test]
    fn merge_forwards_both_sources() {
        let left = Signal::new();
        let right = Signal::new();
        let (seen, _sub) = collect(&left.merge(&right));
        left.send('l');
        right.send('r');
        assert_eq!(*seen.borrow(), ['l', 'r']);
    }

    #[test]
    fn connect_returns_listener_for_chaining() {
        let source = Signal::new();
        let sink = source.connect(Signal::new());
        let (seen, _sub) = collect(&sink.map(|v: &u8| v + 1));
        source.send(1u8);
        assert_eq!(*seen.borrow(), [2]);
    }

    #[test]
    fn dropping_subscription_detaches() {
        let signal = Signal::new();
        let hits = Rc::new(Cell::new(0));
        let h = Rc::clone(&hits);
        let sub = signal.recv(move |_: &()| h.set(h.get() + 1));

        signal.send(());
        assert_eq!(signal.listener_count(), 1);
        drop(sub);
        signal.send(());
        assert_eq!(hits.get(), 1);
        assert_eq!(signal.listener_count(), 0);
    }

    #[test]
    fn terminal_subscription_keeps_chain_alive() {
        let input = Signal::new();
        let hits = Rc::new(Cell::new(0));
        let h = Rc::clone(&hits);
        // Intermediate nodes are dropped immediately; the subscription holds them.
        let sub = input.map(|v: &i32| v * 2).filter(|v| *v > 2).recv(move |_| h.set(h.get() + 1));

        input.send(1);
        input.send(2);
        assert_eq!(hits.get(), 1);

        sub.unsubscribe();
        input.send(3);
        assert_eq!(hits.get(), 1);
        assert_eq!(input.listener_count(), 0);
    }

    #[test]
    fn dropped_derived_node_is_pruned() {
        let input: Signal<i32> = Signal::new();
        let mapped = input.map(|v| v + 1);
        assert_eq!(input.listener_count(), 1);
        drop(mapped);
        assert_eq!(input.listener_count(), 0);
    }

    #[test]
    fn detach_upstream_stops_flow() {
        let input = Signal::new();
        let mapped = input.map(|v: &i32| *v);
        let (seen, _sub) = collect(&mapped);
        input.send(1);
        mapped.detach_upstream();
        input.send(2);
        mapped.send(3);
        assert_eq!(*seen.borrow(), [1, 3]);
    }

    #[test]
    fn listener_may_subscribe_during_send() {
        let signal: Signal<i32> = Signal::new();
        let late: Rc<RefCell<Vec<Subscription>>> = Rc::new(RefCell::new(Vec::new()));
        let hits = Rc::new(Cell::new(0));

        let s = signal.clone();
        let l = Rc::clone(&late);
        let h = Rc::clone(&hits);
        let _outer = signal.recv(move |_| {
            let h = Rc::clone(&h);
            l.borrow_mut().push(s.recv(move |_| h.set(h.get() + 1)));
        });

        signal.send(1);
        assert_eq!(hits.get(), 0, "new listener does not see the value in flight");
        signal.send(2);
        assert_eq!(hits.get(), 1);
    }
}
