#![forbid(unsafe_code)]

//! Tree diff and DOM patching.
//!
//! [`Renderer::patch`] reconciles one position of a parent's child list,
//! moving the document from the state described by `old` to the state
//! described by `new` in a single synchronous pass:
//!
//! | old      | new      | action                                            |
//! |----------|----------|---------------------------------------------------|
//! | some     | none     | tear down the subtree, remove the node            |
//! | none     | some     | materialize and insert                            |
//! | element  | element, same tag | reconcile attributes, handlers, children |
//! | text     | text, same content | nothing                                 |
//! | anything else       |          | tear down, replace with a fresh node     |
//!
//! Children are reconciled by running [`diff_array`] with
//! [`VTree::key_eq`] and replaying the script against a running index:
//! `Merge` recurses and advances, `Delete` removes without advancing,
//! `Insert` materializes and advances.
//!
//! The renderer assumes `old` reflects the document. Divergence is only
//! noticed when the document reports a missing child.
//!
//! # Hooks
//!
//! An element's creation hook runs once, right after the element and its
//! subtree are built and before it is attached. A teardown it returns is kept
//! by the renderer under the node's handle and runs when that node is
//! removed or replaced. Hooks and teardowns run while the document is
//! mutably borrowed: they may record the handle or schedule work, but must
//! not touch a shared document synchronously.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use ahash::AHashMap;
use sprig_core::{Edit, EditStats, Element, NodeId, Teardown, VTree, diff_array};

use crate::document::{Document, DomError};
use crate::events::HandlerRegistry;

/// Error type for patch operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PatchError {
    /// The document rejected an operation.
    Dom(DomError),
}

impl fmt::Display for PatchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Dom(err) => write!(f, "patch failed: {err}"),
        }
    }
}

impl std::error::Error for PatchError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Dom(err) => Some(err),
        }
    }
}

impl From<DomError> for PatchError {
    fn from(err: DomError) -> Self {
        Self::Dom(err)
    }
}

/// Work done by a renderer since creation or the last reset.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PatchStats {
    /// Nodes built (elements and text, descendants included).
    pub created: usize,
    /// Subtrees removed by a `Delete`.
    pub removed: usize,
    /// Nodes replaced wholesale.
    pub replaced: usize,
    /// Elements reconciled in place.
    pub merged: usize,
    pub attributes_set: usize,
    pub attributes_removed: usize,
    pub hooks_run: usize,
    pub teardowns_run: usize,
}

impl PatchStats {
    /// Whether no node was created, removed or replaced.
    #[must_use]
    pub fn is_structurally_quiet(&self) -> bool {
        self.created == 0 && self.removed == 0 && self.replaced == 0
    }
}

impl fmt::Display for PatchStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "created={} removed={} replaced={} merged={} attrs_set={} attrs_removed={}",
            self.created,
            self.removed,
            self.replaced,
            self.merged,
            self.attributes_set,
            self.attributes_removed
        )
    }
}

/// Applies virtual trees to a [`Document`].
///
/// Owns the bookkeeping that outlives a single pass: the handler registry
/// consulted by delegated listeners and the teardowns of live nodes.
pub struct Renderer {
    registry: Rc<RefCell<HandlerRegistry>>,
    teardowns: AHashMap<NodeId, Teardown>,
    stats: PatchStats,
}

impl Renderer {
    #[must_use]
    pub fn new() -> Self {
        Self::with_registry(Rc::new(RefCell::new(HandlerRegistry::new())))
    }

    #[must_use]
    pub fn with_registry(registry: Rc<RefCell<HandlerRegistry>>) -> Self {
        Self {
            registry,
            teardowns: AHashMap::new(),
            stats: PatchStats::default(),
        }
    }

    /// Registry delegated listeners should dispatch into.
    #[must_use]
    pub fn registry(&self) -> &Rc<RefCell<HandlerRegistry>> {
        &self.registry
    }

    #[must_use]
    pub fn stats(&self) -> PatchStats {
        self.stats
    }

    pub fn reset_stats(&mut self) {
        self.stats = PatchStats::default();
    }

    /// Live nodes holding a teardown.
    #[must_use]
    pub fn pending_teardowns(&self) -> usize {
        self.teardowns.len()
    }

    /// Empty `root` and render `tree` as its only child.
    ///
    /// Returns the handle of the new top node.
    pub fn mount<D: Document + ?Sized>(
        &mut self,
        doc: &mut D,
        root: NodeId,
        tree: &VTree,
    ) -> Result<NodeId, PatchError> {
        let _span =
            tracing::debug_span!("mount", root = %root, nodes = tree.node_count()).entered();
        self.unmount(doc, root)?;
        let node = self.materialize(doc, tree)?;
        doc.append(root, node)?;
        Ok(node)
    }

    /// Tear down and remove every child of `root`.
    ///
    /// Children the document has no handle for (page markup under a mount
    /// point) have nothing to tear down and are just removed.
    pub fn unmount<D: Document + ?Sized>(
        &mut self,
        doc: &mut D,
        root: NodeId,
    ) -> Result<(), PatchError> {
        for index in 0..doc.child_count(root)? {
            match doc.child_at(root, index) {
                Ok(child) => self.forget(doc, child)?,
                Err(DomError::MissingChild { .. }) => {
                    tracing::trace!(root = %root, index, "removing untracked child");
                }
                Err(err) => return Err(err.into()),
            }
        }
        doc.clear_children(root)?;
        Ok(())
    }

    /// Reconcile the child of `parent` at `index` from `old` to `new`.
    pub fn patch<D: Document + ?Sized>(
        &mut self,
        doc: &mut D,
        parent: NodeId,
        old: Option<&VTree>,
        new: Option<&VTree>,
        index: usize,
    ) -> Result<(), PatchError> {
        let _span = tracing::debug_span!("patch", parent = %parent, index).entered();
        let before = self.stats;
        self.patch_at(doc, parent, old, new, index)?;
        tracing::trace!(
            created = self.stats.created - before.created,
            replaced = self.stats.replaced - before.replaced,
            removed = self.stats.removed - before.removed,
            "patch applied"
        );
        Ok(())
    }

    fn patch_at<D: Document + ?Sized>(
        &mut self,
        doc: &mut D,
        parent: NodeId,
        old: Option<&VTree>,
        new: Option<&VTree>,
        index: usize,
    ) -> Result<(), PatchError> {
        match (old, new) {
            (None, None) => Ok(()),
            (Some(_), None) => {
                let node = doc.child_at(parent, index)?;
                self.forget(doc, node)?;
                doc.remove_at(parent, index)?;
                doc.release(node);
                self.stats.removed += 1;
                Ok(())
            }
            (None, Some(new)) => {
                let node = self.materialize(doc, new)?;
                doc.insert_at(parent, index, node)?;
                Ok(())
            }
            (Some(VTree::Text(a)), Some(VTree::Text(b))) if a == b => Ok(()),
            (Some(VTree::Element(a)), Some(VTree::Element(b))) if a.tag() == b.tag() => {
                let node = doc.child_at(parent, index)?;
                self.reconcile(doc, node, a, b)
            }
            (Some(_), Some(new)) => {
                let stale = doc.child_at(parent, index)?;
                self.forget(doc, stale)?;
                let fresh = self.materialize(doc, new)?;
                doc.replace_at(parent, index, fresh)?;
                doc.release(stale);
                self.stats.replaced += 1;
                Ok(())
            }
        }
    }

    fn reconcile<D: Document + ?Sized>(
        &mut self,
        doc: &mut D,
        node: NodeId,
        old: &Element,
        new: &Element,
    ) -> Result<(), PatchError> {
        for name in old.attrs().keys() {
            if !new.attrs().contains_key(name) {
                doc.remove_attribute(node, name)?;
                self.stats.attributes_removed += 1;
            }
        }
        for (name, value) in new.attrs() {
            if old.attr(name) != Some(value.as_str()) {
                doc.set_attribute(node, name, value)?;
                self.stats.attributes_set += 1;
            }
        }
        self.registry.borrow_mut().register(node, new.handlers());
        self.stats.merged += 1;

        let edits = diff_array(old.children(), new.children(), VTree::key_eq);
        tracing::trace!(node = %node, edits = %EditStats::of(&edits), "children");
        let mut cursor = 0;
        for edit in edits {
            match edit {
                Edit::Merge(a, b) => {
                    self.patch_at(doc, node, Some(a), Some(b), cursor)?;
                    cursor += 1;
                }
                Edit::Delete(a) => self.patch_at(doc, node, Some(a), None, cursor)?,
                Edit::Insert(b) => {
                    self.patch_at(doc, node, None, Some(b), cursor)?;
                    cursor += 1;
                }
            }
        }
        Ok(())
    }

    /// Build a detached node for `tree`.
    fn materialize<D: Document + ?Sized>(
        &mut self,
        doc: &mut D,
        tree: &VTree,
    ) -> Result<NodeId, PatchError> {
        let node = match tree {
            VTree::Text(text) => doc.create_text(text)?,
            VTree::Element(element) => {
                let node = doc.create_element(element.tag())?;
                for (name, value) in element.attrs() {
                    doc.set_attribute(node, name, value)?;
                    self.stats.attributes_set += 1;
                }
                self.registry
                    .borrow_mut()
                    .register(node, element.handlers());
                for child in element.children() {
                    let child = self.materialize(doc, child)?;
                    doc.append(node, child)?;
                }
                if let Some(hook) = element.on_create() {
                    self.stats.hooks_run += 1;
                    if let Some(teardown) = hook.call(node) {
                        self.teardowns.insert(node, teardown);
                    }
                }
                node
            }
        };
        self.stats.created += 1;
        Ok(node)
    }

    /// Run teardowns and drop handlers for the subtree at `node`,
    /// innermost nodes first.
    fn forget<D: Document + ?Sized>(&mut self, doc: &D, node: NodeId) -> Result<(), PatchError> {
        let mut order = Vec::new();
        let mut stack = vec![node];
        while let Some(next) = stack.pop() {
            order.push(next);
            for index in 0..doc.child_count(next)? {
                stack.push(doc.child_at(next, index)?);
            }
        }
        for node in order.into_iter().rev() {
            self.registry.borrow_mut().unregister(node);
            if let Some(teardown) = self.teardowns.remove(&node) {
                self.stats.teardowns_run += 1;
                teardown();
            }
        }
        Ok(())
    }
}

impl Default for Renderer {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Renderer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Renderer")
            .field("registry", &self.registry.borrow())
            .field("teardowns", &self.teardowns.len())
            .field("stats", &self.stats)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryDocument;
    use sprig_core::{NO_ATTRS, el, text};

    fn list(keys: &[&str]) -> VTree {
        el(
            "ul",
            NO_ATTRS,
            keys.iter()
                .map(|k| el("li", [("key", *k)], [text(*k)]))
                .collect::<Vec<_>>(),
        )
    }

    #[test]
    fn mount_renders_tree() {
        let mut doc = MemoryDocument::new();
        let root = doc.root();
        let mut renderer = Renderer::new();
        renderer.mount(&mut doc, root, &list(&["a", "b"])).expect("mount");
        assert_eq!(doc.inner_html(root), "<ul><li>a</li><li>b</li></ul>");
        assert_eq!(renderer.stats().created, 5);
    }

    /// A memory document whose `foreign` children have no handle, like page
    /// markup seen through the browser backend.
    struct MarkupDocument {
        inner: MemoryDocument,
        foreign: Vec<NodeId>,
    }

    impl Document for MarkupDocument {
        fn create_element(&mut self, tag: &str) -> Result<NodeId, DomError> {
            self.inner.create_element(tag)
        }

        fn create_text(&mut self, text: &str) -> Result<NodeId, DomError> {
            self.inner.create_text(text)
        }

        fn set_attribute(&mut self, node: NodeId, name: &str, value: &str) -> Result<(), DomError> {
            self.inner.set_attribute(node, name, value)
        }

        fn remove_attribute(&mut self, node: NodeId, name: &str) -> Result<(), DomError> {
            self.inner.remove_attribute(node, name)
        }

        fn child_count(&self, parent: NodeId) -> Result<usize, DomError> {
            self.inner.child_count(parent)
        }

        fn child_at(&self, parent: NodeId, index: usize) -> Result<NodeId, DomError> {
            let child = self.inner.child_at(parent, index)?;
            if self.foreign.contains(&child) {
                return Err(DomError::MissingChild { parent, index });
            }
            Ok(child)
        }

        fn insert_at(&mut self, parent: NodeId, index: usize, child: NodeId) -> Result<(), DomError> {
            self.inner.insert_at(parent, index, child)
        }

        fn remove_at(&mut self, parent: NodeId, index: usize) -> Result<NodeId, DomError> {
            self.inner.remove_at(parent, index)
        }

        fn replace_at(
            &mut self,
            parent: NodeId,
            index: usize,
            child: NodeId,
        ) -> Result<NodeId, DomError> {
            self.inner.replace_at(parent, index, child)
        }

        fn parent(&self, node: NodeId) -> Option<NodeId> {
            self.inner.parent(node)
        }

        fn body(&self) -> NodeId {
            self.inner.body()
        }

        fn element_by_id(&self, id: &str) -> Option<NodeId> {
            self.inner.element_by_id(id)
        }

        fn release(&mut self, node: NodeId) {
            self.inner.release(node);
        }

        fn listen(
            &mut self,
            root: NodeId,
            kind: &str,
            capture: bool,
            sink: crate::document::EventSink,
        ) -> Result<(), DomError> {
            self.inner.listen(root, kind, capture, sink)
        }
    }

    #[test]
    fn mount_clears_untracked_markup() {
        let mut inner = MemoryDocument::new();
        let root = inner.root();
        let whitespace = inner.create_text("\n  ").expect("text");
        let script = inner.create_element("script").expect("element");
        inner.append(root, whitespace).expect("append");
        inner.append(root, script).expect("append");
        let mut doc = MarkupDocument {
            inner,
            foreign: vec![whitespace, script],
        };

        let mut renderer = Renderer::new();
        renderer
            .mount(&mut doc, root, &el("p", NO_ATTRS, ["app"]))
            .expect("mount over markup");
        assert_eq!(doc.inner.inner_html(root), "<p>app</p>");
        assert!(!doc.inner.contains(script));
    }

    #[test]
    fn unmount_still_reports_unknown_roots() {
        let mut doc = MemoryDocument::new();
        let mut renderer = Renderer::new();
        let missing = NodeId::new(99);
        assert_eq!(
            renderer.unmount(&mut doc, missing),
            Err(PatchError::Dom(DomError::UnknownNode(missing)))
        );
    }

    #[test]
    fn delete_does_not_advance_cursor() {
        let mut doc = MemoryDocument::new();
        let root = doc.root();
        let mut renderer = Renderer::new();
        let old = list(&["a", "b", "c", "d"]);
        let new = list(&["b", "d"]);
        renderer.mount(&mut doc, root, &old).expect("mount");
        let ul = doc.child_at(root, 0).expect("ul");
        let b = doc.child_at(ul, 1).expect("b");

        renderer
            .patch(&mut doc, root, Some(&old), Some(&new), 0)
            .expect("patch");
        assert_eq!(doc.inner_html(root), "<ul><li>b</li><li>d</li></ul>");
        assert_eq!(doc.child_at(ul, 0), Ok(b), "b was kept, not rebuilt");
    }

    #[test]
    fn tag_change_replaces_node() {
        let mut doc = MemoryDocument::new();
        let root = doc.root();
        let mut renderer = Renderer::new();
        let old = el("p", NO_ATTRS, ["x"]);
        let new = el("div", NO_ATTRS, ["x"]);
        renderer.mount(&mut doc, root, &old).expect("mount");
        let before = doc.child_at(root, 0).expect("p");

        renderer
            .patch(&mut doc, root, Some(&old), Some(&new), 0)
            .expect("patch");
        assert_eq!(doc.inner_html(root), "<div>x</div>");
        assert_ne!(doc.child_at(root, 0), Ok(before));
        assert!(!doc.contains(before), "stale subtree released");
        assert_eq!(renderer.stats().replaced, 1);
    }

    #[test]
    fn text_and_element_replace_each_other() {
        let mut doc = MemoryDocument::new();
        let root = doc.root();
        let mut renderer = Renderer::new();
        let plain = text("x");
        let para = el("p", NO_ATTRS, ["y"]);
        renderer.mount(&mut doc, root, &plain).expect("mount");
        assert_eq!(doc.live_nodes(), 2);

        renderer
            .patch(&mut doc, root, Some(&plain), Some(&para), 0)
            .expect("text to element");
        assert_eq!(doc.inner_html(root), "<p>y</p>");
        assert_eq!(doc.live_nodes(), 3);

        renderer
            .patch(&mut doc, root, Some(&para), Some(&plain), 0)
            .expect("element to text");
        assert_eq!(doc.inner_html(root), "x");
        assert_eq!(doc.live_nodes(), 2);
        assert_eq!(renderer.stats().replaced, 2);
    }

    #[test]
    fn text_change_replaces_text_node() {
        let mut doc = MemoryDocument::new();
        let root = doc.root();
        let mut renderer = Renderer::new();
        let old = el("p", NO_ATTRS, ["one"]);
        let new = el("p", NO_ATTRS, ["two"]);
        renderer.mount(&mut doc, root, &old).expect("mount");
        renderer.reset_stats();

        renderer
            .patch(&mut doc, root, Some(&old), Some(&new), 0)
            .expect("patch");
        assert_eq!(doc.inner_html(root), "<p>two</p>");
        let stats = renderer.stats();
        assert_eq!((stats.merged, stats.replaced, stats.created), (1, 1, 1));
    }

    #[test]
    fn missing_child_is_reported() {
        let mut doc = MemoryDocument::new();
        let root = doc.root();
        let mut renderer = Renderer::new();
        let tree = text("x");
        let err = renderer
            .patch(&mut doc, root, Some(&tree), None, 0)
            .unwrap_err();
        assert_eq!(
            err,
            PatchError::Dom(DomError::MissingChild {
                parent: root,
                index: 0
            })
        );
        assert_eq!(err.to_string(), "patch failed: node #0 has no child at index 0");
    }
}
