#![forbid(unsafe_code)]

//! Push-based signal graph for sprig.
//!
//! This crate provides the dataflow half of the framework:
//!
//! - [`Signal`]: a node forwarding values to listeners, with `map`,
//!   `filter`, `reduce`, `merge` and `connect` combinators.
//! - [`Subscription`] / [`SubscriptionScope`]: RAII handles keeping
//!   listeners attached.
//! - [`Scheduler`]: the cooperative queue behind "next turn" delivery.
//! - [`Mailbox`] / [`Address`]: deferred entry points for user actions.
//! - [`Task`]: a single-assignment value delivered at most once.
//! - [`DispatchGuard`]: rejects re-entrant synchronous updates.
//! - [`Ports`]: named inbound and outbound channels to the host.
//!
//! # Architecture
//!
//! Everything is single-threaded: nodes share state through `Rc<RefCell<..>>`
//! and sources hold their listeners as `Weak` references, pruned lazily on
//! send. Propagation is synchronous and depth-first. Only mailboxes and
//! resolved tasks go through the scheduler.

pub mod guard;
pub mod mailbox;
pub mod ports;
pub mod scheduler;
pub mod scope;
pub mod signal;
pub mod task;

pub use guard::{DispatchError, DispatchGuard, DispatchToken};
pub use mailbox::{Address, Mailbox};
pub use ports::{InboundPort, OutboundPort, PortDirection, PortError, Ports};
pub use scheduler::Scheduler;
pub use scope::SubscriptionScope;
pub use signal::{Signal, Subscription};
pub use task::Task;
