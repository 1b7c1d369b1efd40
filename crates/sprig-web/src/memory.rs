#![forbid(unsafe_code)]

//! In-memory document backend.
//!
//! [`MemoryDocument`] is an arena of element and text nodes addressed by
//! [`NodeId`]. It backs headless rendering and every patcher test: it can
//! serialize itself to HTML, count mutations, and raise synthetic events
//! that travel to delegated listeners the same way browser events do.

use std::fmt;
use std::rc::Rc;

use ahash::AHashMap;
use sprig_core::{Attrs, DomEvent, EventPath, NodeId};

use crate::document::{Document, DomError, EventSink, SharedDocument};

enum NodeData {
    Element {
        tag: String,
        attrs: Attrs,
        children: Vec<NodeId>,
    },
    Text(String),
}

struct Slot {
    data: NodeData,
    parent: Option<NodeId>,
}

struct RootListener {
    root: NodeId,
    kind: String,
    capture: bool,
    sink: EventSink,
}

/// Mutation counts since creation or the last [`MemoryDocument::reset_counters`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MutationCounters {
    pub created: usize,
    pub inserted: usize,
    pub removed: usize,
    pub replaced: usize,
    pub attributes_set: usize,
    pub attributes_removed: usize,
}

impl MutationCounters {
    /// Whether no node or attribute was touched.
    #[must_use]
    pub fn is_quiet(&self) -> bool {
        *self == Self::default()
    }
}

/// Arena-backed [`Document`].
pub struct MemoryDocument {
    nodes: AHashMap<NodeId, Slot>,
    next_id: u32,
    root: NodeId,
    listeners: Vec<RootListener>,
    counters: MutationCounters,
}

impl MemoryDocument {
    /// New document with a `<body>` root.
    #[must_use]
    pub fn new() -> Self {
        Self::with_root("body")
    }

    #[must_use]
    pub fn with_root(tag: &str) -> Self {
        let root = NodeId::new(0);
        let mut nodes = AHashMap::new();
        nodes.insert(
            root,
            Slot {
                data: NodeData::Element {
                    tag: tag.to_owned(),
                    attrs: Attrs::new(),
                    children: Vec::new(),
                },
                parent: None,
            },
        );
        Self {
            nodes,
            next_id: 1,
            root,
            listeners: Vec::new(),
            counters: MutationCounters::default(),
        }
    }

    /// Wrap into the shared handle the renderer and apps take.
    #[must_use]
    pub fn shared(self) -> SharedDocument<Self> {
        Rc::new(std::cell::RefCell::new(self))
    }

    #[must_use]
    pub fn root(&self) -> NodeId {
        self.root
    }

    #[must_use]
    pub fn counters(&self) -> MutationCounters {
        self.counters
    }

    pub fn reset_counters(&mut self) {
        self.counters = MutationCounters::default();
    }

    /// Number of nodes alive in the arena, root included.
    #[must_use]
    pub fn live_nodes(&self) -> usize {
        self.nodes.len()
    }

    #[must_use]
    pub fn contains(&self, node: NodeId) -> bool {
        self.nodes.contains_key(&node)
    }

    #[must_use]
    pub fn tag(&self, node: NodeId) -> Option<&str> {
        match &self.nodes.get(&node)?.data {
            NodeData::Element { tag, .. } => Some(tag),
            NodeData::Text(_) => None,
        }
    }

    #[must_use]
    pub fn attribute(&self, node: NodeId, name: &str) -> Option<&str> {
        match &self.nodes.get(&node)?.data {
            NodeData::Element { attrs, .. } => attrs.get(name).map(String::as_str),
            NodeData::Text(_) => None,
        }
    }

    #[must_use]
    pub fn attributes(&self, node: NodeId) -> Option<&Attrs> {
        match &self.nodes.get(&node)?.data {
            NodeData::Element { attrs, .. } => Some(attrs),
            NodeData::Text(_) => None,
        }
    }

    #[must_use]
    pub fn children(&self, node: NodeId) -> &[NodeId] {
        match self.nodes.get(&node).map(|slot| &slot.data) {
            Some(NodeData::Element { children, .. }) => children.as_slice(),
            _ => &[],
        }
    }

    /// Concatenated text of the subtree.
    #[must_use]
    pub fn text_content(&self, node: NodeId) -> String {
        let mut out = String::new();
        self.collect_text(node, &mut out);
        out
    }

    fn collect_text(&self, node: NodeId, out: &mut String) {
        match self.nodes.get(&node).map(|slot| &slot.data) {
            Some(NodeData::Text(text)) => out.push_str(text),
            Some(NodeData::Element { children, .. }) => {
                for child in children {
                    self.collect_text(*child, out);
                }
            }
            None => {}
        }
    }

    /// Serialize `node` and its subtree.
    #[must_use]
    pub fn to_html(&self, node: NodeId) -> String {
        let mut out = String::new();
        self.write_html(node, &mut out);
        out
    }

    /// Serialize the children of `node`.
    #[must_use]
    pub fn inner_html(&self, node: NodeId) -> String {
        let mut out = String::new();
        for child in self.children(node) {
            self.write_html(*child, &mut out);
        }
        out
    }

    fn write_html(&self, node: NodeId, out: &mut String) {
        let Some(slot) = self.nodes.get(&node) else {
            return;
        };
        match &slot.data {
            NodeData::Text(text) => escape_into(text, false, out),
            NodeData::Element {
                tag,
                attrs,
                children,
            } => {
                out.push('<');
                out.push_str(tag);
                for (name, value) in attrs {
                    out.push(' ');
                    out.push_str(name);
                    out.push_str("=\"");
                    escape_into(value, true, out);
                    out.push('"');
                }
                out.push('>');
                for child in children {
                    self.write_html(*child, out);
                }
                out.push_str("</");
                out.push_str(tag);
                out.push('>');
            }
        }
    }

    /// Build the event a host would dispatch for `kind` on `target`, along
    /// with the listeners it reaches.
    ///
    /// Nothing runs until [`RaisedEvent::deliver`], so the document can be
    /// unborrowed first.
    pub fn raise(&self, target: NodeId, kind: &str) -> Result<RaisedEvent, DomError> {
        if !self.contains(target) {
            return Err(DomError::UnknownNode(target));
        }
        let mut path = EventPath::new();
        let mut cursor = Some(target);
        while let Some(node) = cursor {
            path.push(node);
            cursor = self.parent(node);
        }

        let mut event = DomEvent::new(kind, target).with_path(path.iter().copied());
        if let Some(class) = self.attribute(target, "class") {
            event = event.with_class_attr(class);
        }
        if let Some(id) = self.attribute(target, "id") {
            event = event.with_id(id);
        }
        if let Some(value) = self.attribute(target, "value") {
            event = event.with_value(value);
        }

        // Capturing listeners first, then bubbling ones, registration order
        // within each phase.
        let mut sinks = Vec::new();
        for phase in [true, false] {
            sinks.extend(
                self.listeners
                    .iter()
                    .filter(|l| l.capture == phase && l.kind == kind && path.contains(&l.root))
                    .map(|l| Rc::clone(&l.sink)),
            );
        }
        Ok(RaisedEvent { event, sinks })
    }

    fn slot(&self, node: NodeId) -> Result<&Slot, DomError> {
        self.nodes.get(&node).ok_or(DomError::UnknownNode(node))
    }

    fn children_mut(&mut self, node: NodeId) -> Result<&mut Vec<NodeId>, DomError> {
        match &mut self
            .nodes
            .get_mut(&node)
            .ok_or(DomError::UnknownNode(node))?
            .data
        {
            NodeData::Element { children, .. } => Ok(children),
            NodeData::Text(_) => Err(DomError::NotAnElement(node)),
        }
    }

    fn attrs_mut(&mut self, node: NodeId) -> Result<&mut Attrs, DomError> {
        match &mut self
            .nodes
            .get_mut(&node)
            .ok_or(DomError::UnknownNode(node))?
            .data
        {
            NodeData::Element { attrs, .. } => Ok(attrs),
            NodeData::Text(_) => Err(DomError::NotAnElement(node)),
        }
    }

    fn set_parent(&mut self, node: NodeId, parent: Option<NodeId>) {
        if let Some(slot) = self.nodes.get_mut(&node) {
            slot.parent = parent;
        }
    }

    fn detach(&mut self, node: NodeId) -> Result<(), DomError> {
        if let Some(parent) = self.slot(node)?.parent {
            let siblings = self.children_mut(parent)?;
            siblings.retain(|child| *child != node);
            self.set_parent(node, None);
        }
        Ok(())
    }

    fn alloc(&mut self, data: NodeData) -> NodeId {
        let id = NodeId::new(self.next_id);
        self.next_id += 1;
        self.nodes.insert(id, Slot { data, parent: None });
        self.counters.created += 1;
        id
    }
}

impl Default for MemoryDocument {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for MemoryDocument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryDocument")
            .field("root", &self.root)
            .field("live_nodes", &self.nodes.len())
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

impl Document for MemoryDocument {
    fn create_element(&mut self, tag: &str) -> Result<NodeId, DomError> {
        Ok(self.alloc(NodeData::Element {
            tag: tag.to_owned(),
            attrs: Attrs::new(),
            children: Vec::new(),
        }))
    }

    fn create_text(&mut self, text: &str) -> Result<NodeId, DomError> {
        Ok(self.alloc(NodeData::Text(text.to_owned())))
    }

    fn set_attribute(&mut self, node: NodeId, name: &str, value: &str) -> Result<(), DomError> {
        self.attrs_mut(node)?
            .insert(name.to_owned(), value.to_owned());
        self.counters.attributes_set += 1;
        Ok(())
    }

    fn remove_attribute(&mut self, node: NodeId, name: &str) -> Result<(), DomError> {
        if self.attrs_mut(node)?.remove(name).is_some() {
            self.counters.attributes_removed += 1;
        }
        Ok(())
    }

    fn child_count(&self, parent: NodeId) -> Result<usize, DomError> {
        match &self.slot(parent)?.data {
            NodeData::Element { children, .. } => Ok(children.len()),
            NodeData::Text(_) => Ok(0),
        }
    }

    fn child_at(&self, parent: NodeId, index: usize) -> Result<NodeId, DomError> {
        self.slot(parent)?;
        self.children(parent)
            .get(index)
            .copied()
            .ok_or(DomError::MissingChild { parent, index })
    }

    fn insert_at(&mut self, parent: NodeId, index: usize, child: NodeId) -> Result<(), DomError> {
        self.detach(child)?;
        let siblings = self.children_mut(parent)?;
        let len = siblings.len();
        if index > len {
            return Err(DomError::IndexOutOfRange { parent, index, len });
        }
        siblings.insert(index, child);
        self.set_parent(child, Some(parent));
        self.counters.inserted += 1;
        Ok(())
    }

    fn remove_at(&mut self, parent: NodeId, index: usize) -> Result<NodeId, DomError> {
        let siblings = self.children_mut(parent)?;
        if index >= siblings.len() {
            return Err(DomError::MissingChild { parent, index });
        }
        let child = siblings.remove(index);
        self.set_parent(child, None);
        self.counters.removed += 1;
        Ok(child)
    }

    fn replace_at(
        &mut self,
        parent: NodeId,
        index: usize,
        child: NodeId,
    ) -> Result<NodeId, DomError> {
        self.detach(child)?;
        let siblings = self.children_mut(parent)?;
        let slot = siblings
            .get_mut(index)
            .ok_or(DomError::MissingChild { parent, index })?;
        let old = std::mem::replace(slot, child);
        self.set_parent(old, None);
        self.set_parent(child, Some(parent));
        self.counters.replaced += 1;
        Ok(old)
    }

    fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.nodes.get(&node)?.parent
    }

    fn body(&self) -> NodeId {
        self.root
    }

    fn element_by_id(&self, id: &str) -> Option<NodeId> {
        let mut stack = vec![self.root];
        while let Some(node) = stack.pop() {
            if self.attribute(node, "id") == Some(id) {
                return Some(node);
            }
            stack.extend(self.children(node).iter().rev());
        }
        None
    }

    fn release(&mut self, node: NodeId) {
        let mut stack = vec![node];
        while let Some(next) = stack.pop() {
            if let Some(slot) = self.nodes.remove(&next)
                && let NodeData::Element { children, .. } = slot.data
            {
                stack.extend(children);
            }
        }
    }

    fn listen(
        &mut self,
        root: NodeId,
        kind: &str,
        capture: bool,
        sink: EventSink,
    ) -> Result<(), DomError> {
        self.slot(root)?;
        self.listeners.push(RootListener {
            root,
            kind: kind.to_owned(),
            capture,
            sink,
        });
        Ok(())
    }
}

/// An event built by [`MemoryDocument::raise`], not yet delivered.
pub struct RaisedEvent {
    event: DomEvent,
    sinks: Vec<EventSink>,
}

impl RaisedEvent {
    #[must_use]
    pub fn event(&self) -> &DomEvent {
        &self.event
    }

    /// Run every listener the event reaches. Returns how many ran.
    pub fn deliver(self) -> usize {
        let count = self.sinks.len();
        for sink in &self.sinks {
            sink(&self.event);
        }
        if count == 0 {
            tracing::trace!(kind = self.event.kind(), target = %self.event.target(), "event reached no listener");
        }
        count
    }
}

impl fmt::Debug for RaisedEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RaisedEvent")
            .field("event", &self.event)
            .field("sinks", &self.sinks.len())
            .finish()
    }
}

/// Raise `kind` on `target` in a shared document and deliver it.
pub fn fire(
    doc: &SharedDocument<MemoryDocument>,
    target: NodeId,
    kind: &str,
) -> Result<usize, DomError> {
    let raised = doc.borrow().raise(target, kind)?;
    Ok(raised.deliver())
}

fn escape_into(text: &str, attribute: bool, out: &mut String) {
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' if attribute => out.push_str("&quot;"),
            c => out.push(c),
        }
    }
}
