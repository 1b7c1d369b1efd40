#![forbid(unsafe_code)]

//! Browser document backend over `web-sys`.
//!
//! Every node the backend creates or adopts is stamped with its [`NodeId`]
//! in a JS expando property, so a delegated listener can map an event's
//! target and ancestors back to handles without a lookup table in JS.
//! Nodes the backend never saw (markup outside the mount point, nodes added
//! by other scripts) carry no stamp and are skipped when building the
//! event path.

use std::cell::Cell;
use std::fmt;
use std::rc::Rc;

use ahash::AHashMap;
use sprig_core::{DomEvent, NodeId};
use sprig_runtime::Scheduler;
use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;

use crate::document::{Document, DomError, EventSink};

const NODE_PROPERTY: &str = "__sprigNode";

fn host_error(value: JsValue) -> DomError {
    DomError::Host(
        value
            .as_string()
            .unwrap_or_else(|| format!("{value:?}")),
    )
}

fn stamped_id(node: &JsValue) -> Option<NodeId> {
    let raw = js_sys::Reflect::get(node, &JsValue::from_str(NODE_PROPERTY)).ok()?;
    let raw = raw.as_f64()?;
    (raw >= 0.0 && raw <= f64::from(u32::MAX)).then(|| NodeId::new(raw as u32))
}

/// The live page as a [`Document`].
pub struct BrowserDocument {
    document: web_sys::Document,
    nodes: AHashMap<NodeId, web_sys::Node>,
    next_id: u32,
    body: NodeId,
    listeners: Vec<Closure<dyn FnMut(web_sys::Event)>>,
}

impl BrowserDocument {
    /// Attach to `window.document`, adopting its body.
    pub fn new() -> Result<Self, DomError> {
        let document = web_sys::window()
            .and_then(|window| window.document())
            .ok_or_else(|| DomError::Host("no window.document".into()))?;
        let body = document
            .body()
            .ok_or_else(|| DomError::Host("document has no body".into()))?;
        let mut this = Self {
            document,
            nodes: AHashMap::new(),
            next_id: 0,
            body: NodeId::new(0),
            listeners: Vec::new(),
        };
        this.body = this.adopt(body.into())?;
        Ok(this)
    }

    /// Start tracking an existing node (typically a mount point from the
    /// page markup).
    pub fn adopt(&mut self, node: web_sys::Node) -> Result<NodeId, DomError> {
        if let Some(id) = stamped_id(&node)
            && self.nodes.contains_key(&id)
        {
            return Ok(id);
        }
        let id = NodeId::new(self.next_id);
        self.next_id += 1;
        js_sys::Reflect::set(
            &node,
            &JsValue::from_str(NODE_PROPERTY),
            &JsValue::from(id.raw()),
        )
        .map_err(host_error)?;
        self.nodes.insert(id, node);
        Ok(id)
    }

    /// Adopt the element with `id` from the page markup.
    pub fn mount_point(&mut self, id: &str) -> Result<NodeId, DomError> {
        let element = self
            .document
            .get_element_by_id(id)
            .ok_or_else(|| DomError::Host(format!("no element with id `{id}`")))?;
        self.adopt(element.into())
    }

    /// The `web-sys` node behind a handle.
    #[must_use]
    pub fn node(&self, id: NodeId) -> Option<&web_sys::Node> {
        self.nodes.get(&id)
    }

    fn get(&self, id: NodeId) -> Result<&web_sys::Node, DomError> {
        self.nodes.get(&id).ok_or(DomError::UnknownNode(id))
    }

    fn element(&self, id: NodeId) -> Result<&web_sys::Element, DomError> {
        self.get(id)?
            .dyn_ref::<web_sys::Element>()
            .ok_or(DomError::NotAnElement(id))
    }

    fn tracked_child(&self, parent: NodeId, index: usize) -> Result<web_sys::Node, DomError> {
        let position = u32::try_from(index).map_err(|_| DomError::MissingChild { parent, index })?;
        self.get(parent)?
            .child_nodes()
            .item(position)
            .ok_or(DomError::MissingChild { parent, index })
    }
}

impl fmt::Debug for BrowserDocument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BrowserDocument")
            .field("body", &self.body)
            .field("nodes", &self.nodes.len())
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

impl Document for BrowserDocument {
    fn create_element(&mut self, tag: &str) -> Result<NodeId, DomError> {
        let element = self.document.create_element(tag).map_err(host_error)?;
        self.adopt(element.into())
    }

    fn create_text(&mut self, text: &str) -> Result<NodeId, DomError> {
        let node = self.document.create_text_node(text);
        self.adopt(node.into())
    }

    fn set_attribute(&mut self, node: NodeId, name: &str, value: &str) -> Result<(), DomError> {
        let element = self.element(node)?;
        element.set_attribute(name, value).map_err(host_error)?;
        // The attribute only seeds a form control; keep the live value in step.
        if name == "value" {
            if let Some(input) = element.dyn_ref::<web_sys::HtmlInputElement>() {
                input.set_value(value);
            } else if let Some(area) = element.dyn_ref::<web_sys::HtmlTextAreaElement>() {
                area.set_value(value);
            }
        }
        Ok(())
    }

    fn remove_attribute(&mut self, node: NodeId, name: &str) -> Result<(), DomError> {
        self.element(node)?
            .remove_attribute(name)
            .map_err(host_error)
    }

    fn child_count(&self, parent: NodeId) -> Result<usize, DomError> {
        Ok(self.get(parent)?.child_nodes().length() as usize)
    }

    fn child_at(&self, parent: NodeId, index: usize) -> Result<NodeId, DomError> {
        let child = self.tracked_child(parent, index)?;
        stamped_id(&child).ok_or(DomError::MissingChild { parent, index })
    }

    fn insert_at(&mut self, parent: NodeId, index: usize, child: NodeId) -> Result<(), DomError> {
        let parent_node = self.get(parent)?;
        let child_node = self.get(child)?;
        let len = parent_node.child_nodes().length() as usize;
        if index > len {
            return Err(DomError::IndexOutOfRange { parent, index, len });
        }
        let reference = if index == len {
            None
        } else {
            Some(self.tracked_child(parent, index)?)
        };
        parent_node
            .insert_before(child_node, reference.as_ref())
            .map_err(host_error)?;
        Ok(())
    }

    fn remove_at(&mut self, parent: NodeId, index: usize) -> Result<NodeId, DomError> {
        let child = self.tracked_child(parent, index)?;
        let id = stamped_id(&child).ok_or(DomError::MissingChild { parent, index })?;
        self.get(parent)?.remove_child(&child).map_err(host_error)?;
        Ok(id)
    }

    fn replace_at(
        &mut self,
        parent: NodeId,
        index: usize,
        child: NodeId,
    ) -> Result<NodeId, DomError> {
        let old = self.tracked_child(parent, index)?;
        let old_id = stamped_id(&old).ok_or(DomError::MissingChild { parent, index })?;
        let new = self.get(child)?;
        self.get(parent)?
            .replace_child(new, &old)
            .map_err(host_error)?;
        Ok(old_id)
    }

    fn parent(&self, node: NodeId) -> Option<NodeId> {
        let parent = self.nodes.get(&node)?.parent_node()?;
        stamped_id(&parent)
    }

    fn body(&self) -> NodeId {
        self.body
    }

    fn element_by_id(&self, id: &str) -> Option<NodeId> {
        let element = self.document.get_element_by_id(id)?;
        stamped_id(&element).filter(|id| self.nodes.contains_key(id))
    }

    fn release(&mut self, node: NodeId) {
        let Some(root) = self.nodes.remove(&node) else {
            return;
        };
        let mut stack = vec![root];
        while let Some(next) = stack.pop() {
            let children = next.child_nodes();
            for index in 0..children.length() {
                if let Some(child) = children.item(index) {
                    if let Some(id) = stamped_id(&child) {
                        self.nodes.remove(&id);
                    }
                    stack.push(child);
                }
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
        let target = self.get(root)?.clone();
        let closure = Closure::<dyn FnMut(_)>::new(move |event: web_sys::Event| {
            match wrap_event(&event) {
                Some(wrapped) => sink(&wrapped),
                None => tracing::trace!(kind = %event.type_(), "event outside rendered nodes"),
            }
        });
        target
            .add_event_listener_with_callback_and_bool(
                kind,
                closure.as_ref().unchecked_ref(),
                capture,
            )
            .map_err(host_error)?;
        self.listeners.push(closure);
        Ok(())
    }

    /// Remove every child of `parent`, including markup the backend never
    /// stamped.
    fn clear_children(&mut self, parent: NodeId) -> Result<(), DomError> {
        let parent_node = self.get(parent)?.clone();
        while let Some(child) = parent_node.first_child() {
            parent_node.remove_child(&child).map_err(host_error)?;
            if let Some(id) = stamped_id(&child) {
                self.release(id);
            }
        }
        Ok(())
    }
}

/// Build a [`DomEvent`] from a browser event, or `None` if no stamped node
/// is on its path.
fn wrap_event(event: &web_sys::Event) -> Option<DomEvent> {
    let mut cursor = event.target()?.dyn_into::<web_sys::Node>().ok();
    let mut path = Vec::new();
    let mut target_node = None;
    while let Some(node) = cursor {
        if let Some(id) = stamped_id(&node) {
            if target_node.is_none() {
                target_node = Some(node.clone());
            }
            path.push(id);
        }
        cursor = node.parent_node();
    }
    let target_node = target_node?;
    let target = *path.first()?;

    let mut wrapped = DomEvent::new(event.type_(), target).with_path(path);
    if let Some(element) = target_node.dyn_ref::<web_sys::Element>() {
        if let Some(class) = element.get_attribute("class") {
            wrapped = wrapped.with_class_attr(&class);
        }
        let id = element.id();
        if !id.is_empty() {
            wrapped = wrapped.with_id(id);
        }
    }
    if let Some(input) = target_node.dyn_ref::<web_sys::HtmlInputElement>() {
        wrapped = wrapped.with_value(input.value());
    } else if let Some(select) = target_node.dyn_ref::<web_sys::HtmlSelectElement>() {
        wrapped = wrapped.with_value(select.value());
    } else if let Some(area) = target_node.dyn_ref::<web_sys::HtmlTextAreaElement>() {
        wrapped = wrapped.with_value(area.value());
    }
    Some(wrapped.with_raw(event.clone()))
}

/// Drive `scheduler` from `setTimeout(0)`: whenever work is queued, a turn
/// batch (at most `max_turns` turns) runs on a later macrotask.
///
/// At most one timeout is pending at a time. Work queued while a batch runs
/// is drained by that batch; whatever the budget leaves over gets a fresh
/// timeout.
///
/// The wake hook holds the scheduler, so the scheduler lives as long as the
/// page.
pub fn drive_with_timeouts(scheduler: &Scheduler, max_turns: usize) {
    let armed = Rc::new(Cell::new(false));
    let driven = scheduler.clone();
    scheduler.set_wake(move || {
        if !armed.replace(true) {
            arm_timeout(driven.clone(), Rc::clone(&armed), max_turns);
        }
    });
}

fn arm_timeout(scheduler: Scheduler, armed: Rc<Cell<bool>>, max_turns: usize) {
    let Some(window) = web_sys::window() else {
        tracing::warn!("no window; scheduler left idle");
        armed.set(false);
        return;
    };
    let closure = Closure::once(move || {
        scheduler.run_until_idle(max_turns);
        if scheduler.pending() > 0 {
            arm_timeout(scheduler, armed, max_turns);
        } else {
            armed.set(false);
        }
    });
    if let Err(err) = window.set_timeout_with_callback_and_timeout_and_arguments_0(
        closure.as_ref().unchecked_ref(),
        0,
    ) {
        tracing::error!(error = ?err, "setTimeout failed");
    }
    closure.forget();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::patch::Renderer;
    use sprig_core::{NO_ATTRS, el};
    use wasm_bindgen_test::{wasm_bindgen_test, wasm_bindgen_test_configure};

    wasm_bindgen_test_configure!(run_in_browser);

    #[wasm_bindgen_test]
    fn nodes_are_stamped_and_found_again() {
        let mut doc = BrowserDocument::new().expect("document");
        let body = doc.body();
        let div = doc.create_element("div").expect("div");
        doc.set_attribute(div, "id", "sprig-stamp-test").expect("attr");
        doc.append(body, div).expect("append");
        assert_eq!(doc.element_by_id("sprig-stamp-test"), Some(div));
        assert_eq!(doc.parent(div), Some(body));

        let index = doc.child_count(body).expect("count") - 1;
        assert_eq!(doc.remove_at(body, index), Ok(div));
        doc.release(div);
        assert!(doc.node(div).is_none());
    }

    #[wasm_bindgen_test]
    fn mount_replaces_page_markup() {
        let mut doc = BrowserDocument::new().expect("document");
        let page = doc.document.create_element("div").expect("div");
        page.set_id("sprig-mount-test");
        page.set_inner_html("\n  <span>server text</span>\n");
        let body = doc.node(doc.body()).expect("body").clone();
        body.append_child(&page).expect("append");

        let mount = doc.mount_point("sprig-mount-test").expect("mount point");
        let mut renderer = Renderer::new();
        renderer
            .mount(&mut doc, mount, &el("p", NO_ATTRS, ["app"]))
            .expect("mount over markup");
        assert_eq!(page.inner_html(), "<p>app</p>");
        assert_eq!(doc.child_count(mount), Ok(1));

        body.remove_child(&page).expect("cleanup");
    }
}
