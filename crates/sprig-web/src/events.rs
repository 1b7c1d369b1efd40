#![forbid(unsafe_code)]

//! Delegated event handling.
//!
//! Elements never get their own host listeners. The patcher records each
//! element's [`Handlers`] in a [`HandlerRegistry`] under the element's
//! [`NodeId`], and an [`EventDelegator`] installs one listener per event type
//! at the mount root. When an event arrives, the registry walks the event
//! path from the target up to the root and runs every handler registered
//! for that event type, stopping early if a handler calls
//! [`DomEvent::stop_propagation`].

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use ahash::AHashMap;
use smallvec::SmallVec;
use sprig_core::{DomEvent, EventHandler, Handlers, NodeId};

use crate::document::{Document, DomError, EventSink};

/// Event types delegated by default.
pub const STANDARD_EVENTS: [&str; 10] = [
    "click", "dblclick", "keyup", "keydown", "keypress", "blur", "focusout", "input", "change",
    "load",
];

/// Standard event types followed by `extra`, without duplicates.
#[must_use]
pub fn delegated_kinds<S: AsRef<str>>(extra: &[S]) -> Vec<String> {
    let mut kinds: Vec<String> = Vec::with_capacity(STANDARD_EVENTS.len() + extra.len());
    let mut push = |kind: &str| {
        if !kind.is_empty() && !kinds.iter().any(|k| k == kind) {
            kinds.push(kind.to_owned());
        }
    };
    for kind in STANDARD_EVENTS {
        push(kind);
    }
    for kind in extra {
        push(kind.as_ref());
    }
    kinds
}

/// Handlers of every rendered element, by node.
#[derive(Default)]
pub struct HandlerRegistry {
    nodes: AHashMap<NodeId, Handlers>,
}

impl HandlerRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `handlers` for `node`, replacing what was there.
    pub fn register(&mut self, node: NodeId, handlers: &Handlers) {
        if handlers.is_empty() {
            self.nodes.remove(&node);
        } else {
            self.nodes.insert(node, handlers.clone());
        }
    }

    /// Forget `node`. Returns whether it had handlers.
    pub fn unregister(&mut self, node: NodeId) -> bool {
        self.nodes.remove(&node).is_some()
    }

    #[must_use]
    pub fn contains(&self, node: NodeId) -> bool {
        self.nodes.contains_key(&node)
    }

    /// Number of nodes with handlers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    fn matching(&self, node: NodeId, kind: &str) -> SmallVec<[EventHandler; 2]> {
        self.nodes
            .get(&node)
            .map(|handlers| handlers.for_kind(kind).cloned().collect())
            .unwrap_or_default()
    }

    /// Run the handlers `event` reaches. Returns how many ran.
    ///
    /// The registry is not borrowed while handlers run, so a handler may
    /// trigger a synchronous re-render.
    pub fn dispatch(registry: &RefCell<Self>, event: &DomEvent) -> usize {
        let mut ran = 0;
        for node in event.path() {
            let handlers = registry.borrow().matching(*node, event.kind());
            for handler in handlers {
                handler(event);
                ran += 1;
            }
            if event.propagation_stopped() {
                break;
            }
        }
        if ran == 0 {
            tracing::trace!(kind = event.kind(), target = %event.target(), "no handler for event");
        }
        ran
    }
}

impl fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerRegistry")
            .field("nodes", &self.nodes.len())
            .finish()
    }
}

/// Root listeners feeding a [`HandlerRegistry`].
pub struct EventDelegator {
    root: NodeId,
    kinds: Vec<String>,
}

impl EventDelegator {
    /// Listen for each of `kinds` at `root` and route events to `registry`.
    pub fn install<D: Document + ?Sized>(
        doc: &mut D,
        root: NodeId,
        kinds: Vec<String>,
        capture: bool,
        registry: &Rc<RefCell<HandlerRegistry>>,
    ) -> Result<Self, DomError> {
        for kind in &kinds {
            let registry = Rc::clone(registry);
            let sink: EventSink = Rc::new(move |event: &DomEvent| {
                HandlerRegistry::dispatch(&registry, event);
            });
            doc.listen(root, kind, capture, sink)?;
        }
        tracing::debug!(root = %root, kinds = kinds.len(), capture, "event delegation installed");
        Ok(Self { root, kinds })
    }

    #[must_use]
    pub fn root(&self) -> NodeId {
        self.root
    }

    #[must_use]
    pub fn kinds(&self) -> &[String] {
        &self.kinds
    }
}

impl fmt::Debug for EventDelegator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventDelegator")
            .field("root", &self.root)
            .field("kinds", &self.kinds)
            .finish()
    }
}
