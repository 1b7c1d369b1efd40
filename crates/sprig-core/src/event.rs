#![forbid(unsafe_code)]

//! Host-neutral node handles and the wrapped DOM event.
//!
//! A [`DomEvent`] carries what handlers usually need from the event target
//! (class list, element id, current value) plus the propagation path from the
//! target up to the listening root. The raw host event is kept behind
//! [`DomEvent::raw`] for anything the wrapper does not expose.

use std::any::Any;
use std::cell::Cell;
use std::fmt;
use std::rc::Rc;

use smallvec::SmallVec;

/// Opaque handle to a node owned by a host document.
///
/// Handles are assigned by the document when a node is created and are the
/// identifier event handlers are registered under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u32);

impl NodeId {
    /// Wrap a raw handle value.
    #[inline]
    #[must_use]
    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    /// The raw handle value.
    #[inline]
    #[must_use]
    pub const fn raw(self) -> u32 {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Propagation path, innermost node first.
pub type EventPath = SmallVec<[NodeId; 8]>;

/// A browser event wrapped for handler consumption.
#[derive(Clone)]
pub struct DomEvent {
    kind: String,
    target: NodeId,
    path: EventPath,
    class_list: Vec<String>,
    id: Option<String>,
    value: Option<String>,
    raw: Option<Rc<dyn Any>>,
    stopped: Rc<Cell<bool>>,
}

impl DomEvent {
    /// Create an event of `kind` aimed at `target`.
    ///
    /// The path starts out as just the target.
    #[must_use]
    pub fn new(kind: impl Into<String>, target: NodeId) -> Self {
        let mut path = EventPath::new();
        path.push(target);
        Self {
            kind: kind.into(),
            target,
            path,
            class_list: Vec::new(),
            id: None,
            value: None,
            raw: None,
            stopped: Rc::new(Cell::new(false)),
        }
    }

    /// Replace the propagation path (target first, root last).
    #[must_use]
    pub fn with_path(mut self, path: impl IntoIterator<Item = NodeId>) -> Self {
        self.path = path.into_iter().collect();
        self
    }

    /// Set the class list from a whitespace-separated `class` attribute.
    #[must_use]
    pub fn with_class_attr(mut self, class: &str) -> Self {
        self.class_list = class.split_whitespace().map(str::to_owned).collect();
        self
    }

    #[must_use]
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    #[must_use]
    pub fn with_value(mut self, value: impl Into<String>) -> Self {
        self.value = Some(value.into());
        self
    }

    /// Attach the underlying host event.
    #[must_use]
    pub fn with_raw<T: Any>(mut self, raw: T) -> Self {
        self.raw = Some(Rc::new(raw));
        self
    }

    /// Event type name, e.g. `"click"`.
    #[must_use]
    pub fn kind(&self) -> &str {
        &self.kind
    }

    #[must_use]
    pub fn target(&self) -> NodeId {
        self.target
    }

    /// Nodes the event travels through, target first.
    #[must_use]
    pub fn path(&self) -> &[NodeId] {
        &self.path
    }

    /// Class names of the target element.
    #[must_use]
    pub fn class_list(&self) -> &[String] {
        &self.class_list
    }

    #[must_use]
    pub fn has_class(&self, class: &str) -> bool {
        self.class_list.iter().any(|c| c == class)
    }

    /// Element id of the target, if it has one.
    #[must_use]
    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    /// Current `value` of the target (inputs, selects, textareas).
    #[must_use]
    pub fn value(&self) -> Option<&str> {
        self.value.as_deref()
    }

    /// Downcast the raw host event.
    #[must_use]
    pub fn raw<T: Any>(&self) -> Option<&T> {
        self.raw.as_deref().and_then(|raw| raw.downcast_ref::<T>())
    }

    /// Stop delivery to handlers further up the path.
    ///
    /// Handlers already registered on the current node still run.
    pub fn stop_propagation(&self) {
        self.stopped.set(true);
    }

    #[must_use]
    pub fn propagation_stopped(&self) -> bool {
        self.stopped.get()
    }
}

impl fmt::Debug for DomEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DomEvent")
            .field("kind", &self.kind)
            .field("target", &self.target)
            .field("path", &self.path)
            .field("class_list", &self.class_list)
            .field("id", &self.id)
            .field("value", &self.value)
            .field("has_raw", &self.raw.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn class_attr_is_split_on_whitespace() {
        let event = DomEvent::new("click", NodeId::new(3)).with_class_attr("  todo  done\tnew ");
        assert_eq!(event.class_list(), ["todo", "done", "new"]);
        assert!(event.has_class("done"));
        assert!(!event.has_class("to"));
    }

    #[test]
    fn default_path_is_target() {
        let event = DomEvent::new("input", NodeId::new(9));
        assert_eq!(event.path(), [NodeId::new(9)]);
        assert_eq!(event.id(), None);
        assert_eq!(event.value(), None);
    }

    #[test]
    fn raw_downcast() {
        let event = DomEvent::new("keyup", NodeId::new(1)).with_raw(13u32);
        assert_eq!(event.raw::<u32>(), Some(&13));
        assert_eq!(event.raw::<String>(), None);
    }

    #[test]
    fn stop_propagation_is_shared_by_clones() {
        let event = DomEvent::new("click", NodeId::new(1));
        let copy = event.clone();
        copy.stop_propagation();
        assert!(event.propagation_stopped());
    }
}
