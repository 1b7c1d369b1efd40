#![forbid(unsafe_code)]

//! Document patching and application runtimes for sprig.
//!
//! This crate turns [`VTree`](sprig_core::VTree) values into document
//! mutations and wires user events back into the signal graph:
//!
//! - [`Document`]: the host tree the patcher drives, with a headless
//!   [`MemoryDocument`] and (feature `web`, wasm32) a `BrowserDocument`.
//! - [`Renderer`]: mounts trees and patches old against new, keyed by
//!   [`VTree::key_eq`](sprig_core::VTree::key_eq).
//! - [`HandlerRegistry`] / [`EventDelegator`]: one root listener per event
//!   type, routed to the handler bags of rendered nodes.
//! - [`render`]: keep a document in sync with a signal of views.
//! - [`App`]: the mailbox-driven update loop.
//! - [`Program`]: the synchronous, re-entrancy-guarded update loop.
//! - [`RuntimeConfig`]: event root, extra events, ports and drain budget.
//!
//! # Example
//!
//! ```
//! use sprig_core::{Handlers, VTree, attrs, el};
//! use sprig_runtime::{Address, Scheduler};
//! use sprig_web::{App, MemoryDocument, RuntimeConfig, fire};
//!
//! fn view(count: &i32, address: &Address<i32>) -> VTree {
//!     let address = address.clone();
//!     let bump = Handlers::new().on("click", move |_| address.send(1));
//!     el("button", attrs! { "on" => bump }, [count.to_string()])
//! }
//!
//! let doc = MemoryDocument::new().shared();
//! let root = doc.borrow().root();
//! let scheduler = Scheduler::new();
//! let app = App::start_on(
//!     scheduler,
//!     RuntimeConfig::default(),
//!     &doc,
//!     root,
//!     0,
//!     |count: &i32, step: &i32| count + step,
//!     view,
//! )
//! .unwrap();
//! app.run_until_idle();
//! assert_eq!(doc.borrow().inner_html(root), "<button>0</button>");
//!
//! let button = doc.borrow().children(root)[0];
//! fire(&doc, button, "click").unwrap();
//! app.run_until_idle();
//! assert_eq!(doc.borrow().inner_html(root), "<button>1</button>");
//! ```

pub mod app;
pub mod config;
pub mod document;
pub mod events;
pub mod memory;
pub mod patch;
pub mod render;
#[cfg(all(feature = "web", target_arch = "wasm32"))]
pub mod web;

pub use app::{App, AppError, Dispatcher, Program};
pub use config::{ConfigError, EventRoot, RuntimeConfig};
pub use document::{Document, DomError, EventSink, SharedDocument};
pub use events::{EventDelegator, HandlerRegistry, STANDARD_EVENTS, delegated_kinds};
pub use memory::{MemoryDocument, MutationCounters, RaisedEvent, fire};
pub use patch::{PatchError, PatchStats, Renderer};
pub use render::{RenderHandle, render, render_with};
#[cfg(all(feature = "web", target_arch = "wasm32"))]
pub use web::{BrowserDocument, drive_with_timeouts};
