#![forbid(unsafe_code)]

//! Lifetime management for groups of subscriptions.
//!
//! A [`SubscriptionScope`] collects the [`Subscription`]s belonging to one
//! logical owner (an app, a mounted view, a port bridge). Dropping the scope
//! detaches everything it holds.
//!
//! # Invariants
//!
//! 1. Subscriptions are released in reverse registration order, on
//!    [`clear`](SubscriptionScope::clear) and on drop.
//! 2. After release, no callback registered through this scope fires.
//! 3. A cleared scope is empty and can be reused.

use std::fmt;

use crate::signal::{Signal, Subscription};

/// Owner of a set of subscriptions.
#[derive(Default)]
pub struct SubscriptionScope {
    subscriptions: Vec<Subscription>,
}

impl SubscriptionScope {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Keep `sub` alive until the scope is cleared or dropped.
    pub fn hold(&mut self, sub: Subscription) -> &mut Self {
        self.subscriptions.push(sub);
        self
    }

    /// Attach `callback` to `source` for the lifetime of the scope.
    pub fn recv<T: 'static>(
        &mut self,
        source: &Signal<T>,
        callback: impl Fn(&T) + 'static,
    ) -> &mut Self {
        self.hold(source.recv(callback))
    }

    /// Keep a derived node (and its upstream chain) connected.
    pub fn retain<T: 'static>(&mut self, node: &Signal<T>) -> &mut Self {
        self.hold(node.recv(|_| {}))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.subscriptions.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.subscriptions.is_empty()
    }

    /// Release everything now, newest first.
    pub fn clear(&mut self) {
        while let Some(sub) = self.subscriptions.pop() {
            drop(sub);
        }
    }
}

impl Drop for SubscriptionScope {
    fn drop(&mut self) {
        self.clear();
    }
}

impl fmt::Debug for SubscriptionScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubscriptionScope")
            .field("subscriptions", &self.subscriptions.len())
            .finish()
    }
}
