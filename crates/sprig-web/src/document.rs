#![forbid(unsafe_code)]

//! Host document abstraction.
//!
//! The patcher never talks to a DOM directly; it drives a [`Document`], which
//! hands out [`NodeId`] handles for the nodes it owns. Two backends exist:
//!
//! - [`MemoryDocument`](crate::MemoryDocument): an arena tree for headless
//!   use and tests.
//! - `BrowserDocument` (feature `web`, wasm32 only): the live page through
//!   `web-sys`.
//!
//! Child positions are plain indices into a parent's child list, matching
//! how the patcher walks sibling lists.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use sprig_core::{DomEvent, NodeId};

/// Callback a document invokes for every event observed at a listening root.
pub type EventSink = Rc<dyn Fn(&DomEvent)>;

/// A document shared between the renderer, delegated listeners and the app.
pub type SharedDocument<D> = Rc<RefCell<D>>;

/// Error type for document operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DomError {
    /// The handle does not name a live node.
    UnknownNode(NodeId),
    /// `parent` has no child at `index`.
    MissingChild { parent: NodeId, index: usize },
    /// Insertion index past the end of the child list.
    IndexOutOfRange {
        parent: NodeId,
        index: usize,
        len: usize,
    },
    /// Text nodes cannot hold attributes or children.
    NotAnElement(NodeId),
    /// The host rejected the operation.
    Host(String),
}

impl fmt::Display for DomError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownNode(node) => write!(f, "unknown node {node}"),
            Self::MissingChild { parent, index } => {
                write!(f, "node {parent} has no child at index {index}")
            }
            Self::IndexOutOfRange { parent, index, len } => {
                write!(f, "index {index} out of range for node {parent} with {len} children")
            }
            Self::NotAnElement(node) => write!(f, "node {node} is not an element"),
            Self::Host(message) => write!(f, "host error: {message}"),
        }
    }
}

impl std::error::Error for DomError {}

/// A mutable tree of element and text nodes.
pub trait Document {
    fn create_element(&mut self, tag: &str) -> Result<NodeId, DomError>;

    fn create_text(&mut self, text: &str) -> Result<NodeId, DomError>;

    fn set_attribute(&mut self, node: NodeId, name: &str, value: &str) -> Result<(), DomError>;

    fn remove_attribute(&mut self, node: NodeId, name: &str) -> Result<(), DomError>;

    fn child_count(&self, parent: NodeId) -> Result<usize, DomError>;

    fn child_at(&self, parent: NodeId, index: usize) -> Result<NodeId, DomError>;

    /// Insert `child` so that it ends up at `index`; `index == len` appends.
    fn insert_at(&mut self, parent: NodeId, index: usize, child: NodeId) -> Result<(), DomError>;

    /// Detach and return the child at `index`.
    fn remove_at(&mut self, parent: NodeId, index: usize) -> Result<NodeId, DomError>;

    /// Swap the child at `index` for `child`, returning the detached node.
    fn replace_at(&mut self, parent: NodeId, index: usize, child: NodeId)
    -> Result<NodeId, DomError>;

    fn parent(&self, node: NodeId) -> Option<NodeId>;

    /// The page body (or the arena root of a headless document).
    fn body(&self) -> NodeId;

    /// Element whose `id` attribute is `id`, if attached.
    fn element_by_id(&self, id: &str) -> Option<NodeId>;

    /// Forget a detached subtree. Handles inside it become invalid.
    fn release(&mut self, node: NodeId);

    /// Route every `kind` event occurring under `root` to `sink`.
    fn listen(
        &mut self,
        root: NodeId,
        kind: &str,
        capture: bool,
        sink: EventSink,
    ) -> Result<(), DomError>;

    fn append(&mut self, parent: NodeId, child: NodeId) -> Result<(), DomError> {
        let len = self.child_count(parent)?;
        self.insert_at(parent, len, child)
    }

    /// Detach and release every child of `parent`.
    fn clear_children(&mut self, parent: NodeId) -> Result<(), DomError> {
        for index in (0..self.child_count(parent)?).rev() {
            let child = self.remove_at(parent, index)?;
            self.release(child);
        }
        Ok(())
    }
}
