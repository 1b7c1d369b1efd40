#![forbid(unsafe_code)]

//! Virtual tree nodes and their construction.
//!
//! A [`VTree`] describes one DOM node: either text or an [`Element`] with a
//! tag, rendered attributes, children, an event-handler bag and an optional
//! creation hook. Trees are built fresh by every render call and compared
//! against their predecessor by the patcher; nothing here touches a document.
//!
//! # Keys
//!
//! The [`Key`] of an element is fixed when the element is built:
//!
//! 1. a `key` attribute wins and is removed from the rendered attributes;
//! 2. otherwise an `id` attribute is used and stays rendered;
//! 3. otherwise the tag name.
//!
//! [`VTree::key_eq`] compares keys only. Content never takes part in it.
//!
//! # Reserved attributes
//!
//! `on` carries the handler bag and is never rendered. Any
//! [`AttrValue::On`] value is merged into the bag whatever its attribute name;
//! a plain string under `on` is dropped.
//!
//! # Example
//!
//! ```
//! use sprig_core::{Element, VTree, attrs, el};
//!
//! let list = el(
//!     "ul",
//!     attrs! { "class" => "todos" },
//!     [
//!         Element::build("li").key("a").child("first").finish(),
//!         Element::build("li").key("b").child("second").finish(),
//!     ],
//! );
//! assert_eq!(list.children().len(), 2);
//! assert_eq!(list.children()[0].key().as_str(), Some("a"));
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

use smallvec::SmallVec;

use crate::event::{DomEvent, NodeId};
use crate::key::Key;

/// Rendered attributes, ordered by name.
pub type Attrs = BTreeMap<String, String>;

/// Callback run once when the node it was returned for is destroyed.
pub type Teardown = Box<dyn FnOnce()>;

/// Event handler stored in a node's handler bag.
pub type EventHandler = Rc<dyn Fn(&DomEvent)>;

/// Attribute name reserved for the handler bag.
pub const ON_ATTR: &str = "on";
/// Attribute name that sets an explicit key.
pub const KEY_ATTR: &str = "key";
/// Attribute name used as the key fallback.
pub const ID_ATTR: &str = "id";

// ---------------------------------------------------------------------------
// Hooks and handlers
// ---------------------------------------------------------------------------

/// Creation hook: called with the freshly created node, may hand back a
/// teardown callback.
#[derive(Clone)]
pub struct Hook(Rc<dyn Fn(NodeId) -> Option<Teardown>>);

impl Hook {
    pub fn new(f: impl Fn(NodeId) -> Option<Teardown> + 'static) -> Self {
        Self(Rc::new(f))
    }

    /// Run the hook for `node`.
    pub fn call(&self, node: NodeId) -> Option<Teardown> {
        (self.0)(node)
    }
}

impl fmt::Debug for Hook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Hook")
    }
}

/// Event handlers of one element, in registration order.
///
/// Several handlers may be registered for the same event type.
#[derive(Clone, Default)]
pub struct Handlers {
    entries: SmallVec<[(Rc<str>, EventHandler); 2]>,
}

impl Handlers {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a handler for `kind`, builder style.
    #[must_use]
    pub fn on(mut self, kind: &str, handler: impl Fn(&DomEvent) + 'static) -> Self {
        self.push(kind, Rc::new(handler));
        self
    }

    pub fn push(&mut self, kind: &str, handler: EventHandler) {
        self.entries.push((Rc::from(kind), handler));
    }

    /// Append every handler of `other`.
    pub fn extend(&mut self, other: Handlers) {
        self.entries.extend(other.entries);
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Handlers registered for `kind`.
    pub fn for_kind<'a>(&'a self, kind: &'a str) -> impl Iterator<Item = &'a EventHandler> {
        self.entries
            .iter()
            .filter(move |(k, _)| &**k == kind)
            .map(|(_, handler)| handler)
    }

    /// Every `(kind, handler)` pair.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &EventHandler)> {
        self.entries.iter().map(|(k, handler)| (&**k, handler))
    }
}

impl fmt::Debug for Handlers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.entries.iter().map(|(kind, _)| kind))
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Attribute input
// ---------------------------------------------------------------------------

/// Value side of an attribute passed to [`el`].
#[derive(Clone, Debug)]
pub enum AttrValue {
    /// Rendered attribute text.
    Text(String),
    /// Handler bag; never rendered.
    On(Handlers),
}

impl From<&str> for AttrValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_owned())
    }
}

impl From<String> for AttrValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<&String> for AttrValue {
    fn from(value: &String) -> Self {
        Self::Text(value.clone())
    }
}

impl From<Handlers> for AttrValue {
    fn from(value: Handlers) -> Self {
        Self::On(value)
    }
}

/// Attributes split into the rendered map and the handler bag.
#[derive(Clone, Debug, Default)]
pub struct Props {
    pub attrs: Attrs,
    pub handlers: Handlers,
}

impl Props {
    /// Split raw attribute pairs, pulling handler bags out of the rendered set.
    pub fn from_pairs<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<AttrValue>,
    {
        let mut props = Self::default();
        for (name, value) in pairs {
            let name = name.into();
            match value.into() {
                AttrValue::On(handlers) => props.handlers.extend(handlers),
                AttrValue::Text(_) if name == ON_ATTR => {}
                AttrValue::Text(text) => {
                    props.attrs.insert(name, text);
                }
            }
        }
        props
    }
}

/// Build a `Vec<(String, AttrValue)>` from `name => value` pairs.
///
/// ```
/// use sprig_core::{Handlers, attrs};
///
/// let pairs = attrs! { "class" => "btn", "on" => Handlers::new().on("click", |_| {}) };
/// assert_eq!(pairs.len(), 2);
/// ```
#[macro_export]
macro_rules! attrs {
    () => {
        ::std::vec::Vec::<(::std::string::String, $crate::AttrValue)>::new()
    };
    ($($name:expr => $value:expr),+ $(,)?) => {
        ::std::vec![$((::std::string::String::from($name), $crate::AttrValue::from($value))),+]
    };
}

// ---------------------------------------------------------------------------
// Element
// ---------------------------------------------------------------------------

/// An element node.
#[derive(Clone)]
pub struct Element {
    tag: String,
    attrs: Attrs,
    children: Vec<VTree>,
    key: Key,
    handlers: Handlers,
    on_create: Option<Hook>,
}

impl Element {
    /// Create an element, deriving its key from `attrs`.
    ///
    /// A `key` attribute is consumed here and never rendered.
    #[must_use]
    pub fn new(tag: impl Into<String>, mut attrs: Attrs, children: Vec<VTree>) -> Self {
        let tag = tag.into();
        let key = match attrs.remove(KEY_ATTR) {
            Some(key) => Key::named(key),
            None => match attrs.get(ID_ATTR) {
                Some(id) => Key::named(id),
                None => Key::named(&tag),
            },
        };
        Self {
            tag,
            attrs,
            children,
            key,
            handlers: Handlers::new(),
            on_create: None,
        }
    }

    /// Start a builder for `tag`.
    pub fn build(tag: impl Into<String>) -> ElementBuilder {
        ElementBuilder::new(tag)
    }

    #[must_use]
    pub fn with_handlers(mut self, handlers: Handlers) -> Self {
        self.handlers.extend(handlers);
        self
    }

    #[must_use]
    pub fn with_hook(mut self, hook: Hook) -> Self {
        self.on_create = Some(hook);
        self
    }

    #[must_use]
    pub fn tag(&self) -> &str {
        &self.tag
    }

    /// Attributes written to the document.
    #[must_use]
    pub fn attrs(&self) -> &Attrs {
        &self.attrs
    }

    #[must_use]
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs.get(name).map(String::as_str)
    }

    #[must_use]
    pub fn children(&self) -> &[VTree] {
        &self.children
    }

    #[must_use]
    pub fn key(&self) -> &Key {
        &self.key
    }

    #[must_use]
    pub fn handlers(&self) -> &Handlers {
        &self.handlers
    }

    #[must_use]
    pub fn on_create(&self) -> Option<&Hook> {
        self.on_create.as_ref()
    }
}

impl fmt::Debug for Element {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Element")
            .field("tag", &self.tag)
            .field("key", &self.key)
            .field("attrs", &self.attrs)
            .field("handlers", &self.handlers)
            .field("has_hook", &self.on_create.is_some())
            .field("children", &self.children)
            .finish()
    }
}

/// Fluent construction of an [`Element`].
#[must_use]
pub struct ElementBuilder {
    tag: String,
    attrs: Attrs,
    handlers: Handlers,
    hook: Option<Hook>,
    children: Vec<VTree>,
}

impl ElementBuilder {
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            attrs: Attrs::new(),
            handlers: Handlers::new(),
            hook: None,
            children: Vec::new(),
        }
    }

    pub fn attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attrs.insert(name.into(), value.into());
        self
    }

    /// Explicit key; shorthand for the `key` attribute.
    pub fn key(self, key: impl Into<String>) -> Self {
        self.attr(KEY_ATTR, key)
    }

    pub fn id(self, id: impl Into<String>) -> Self {
        self.attr(ID_ATTR, id)
    }

    pub fn class(self, class: impl Into<String>) -> Self {
        self.attr("class", class)
    }

    pub fn on(mut self, kind: &str, handler: impl Fn(&DomEvent) + 'static) -> Self {
        self.handlers.push(kind, Rc::new(handler));
        self
    }

    pub fn on_create(mut self, hook: impl Fn(NodeId) -> Option<Teardown> + 'static) -> Self {
        self.hook = Some(Hook::new(hook));
        self
    }

    pub fn child(mut self, child: impl Into<VTree>) -> Self {
        self.children.push(child.into());
        self
    }

    pub fn children<C: Into<VTree>>(mut self, children: impl IntoIterator<Item = C>) -> Self {
        self.children.extend(children.into_iter().map(Into::into));
        self
    }

    pub fn finish(self) -> VTree {
        VTree::Element(self.into_element())
    }

    #[must_use]
    pub fn into_element(self) -> Element {
        let mut element = Element::new(self.tag, self.attrs, self.children).with_handlers(self.handlers);
        element.on_create = self.hook;
        element
    }
}

// ---------------------------------------------------------------------------
// VTree
// ---------------------------------------------------------------------------

/// One virtual DOM node.
#[derive(Clone)]
pub enum VTree {
    Text(String),
    Element(Element),
}

impl VTree {
    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text(text.into())
    }

    /// Identity used to pair siblings across renders.
    #[must_use]
    pub fn key(&self) -> Key {
        match self {
            Self::Text(_) => Key::Text,
            Self::Element(element) => element.key.clone(),
        }
    }

    /// Key equality; the only equality the patcher uses.
    #[must_use]
    pub fn key_eq(&self, other: &VTree) -> bool {
        match (self, other) {
            (Self::Text(_), Self::Text(_)) => true,
            (Self::Element(a), Self::Element(b)) => a.key == b.key,
            _ => false,
        }
    }

    #[must_use]
    pub fn is_text(&self) -> bool {
        matches!(self, Self::Text(_))
    }

    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            Self::Element(_) => None,
        }
    }

    #[must_use]
    pub fn as_element(&self) -> Option<&Element> {
        match self {
            Self::Text(_) => None,
            Self::Element(element) => Some(element),
        }
    }

    /// Tag name, `None` for text.
    #[must_use]
    pub fn tag(&self) -> Option<&str> {
        self.as_element().map(Element::tag)
    }

    /// Children; always empty for text.
    #[must_use]
    pub fn children(&self) -> &[VTree] {
        match self {
            Self::Text(_) => &[],
            Self::Element(element) => element.children.as_slice(),
        }
    }

    /// Number of nodes in this subtree, including `self`.
    #[must_use]
    pub fn node_count(&self) -> usize {
        1 + self.children().iter().map(VTree::node_count).sum::<usize>()
    }

    /// Structural comparison of tags, keys, attributes, text and children.
    ///
    /// Handlers and hooks are not compared. The patcher never calls this.
    #[must_use]
    pub fn same_content(&self, other: &VTree) -> bool {
        match (self, other) {
            (Self::Text(a), Self::Text(b)) => a == b,
            (Self::Element(a), Self::Element(b)) => {
                a.tag == b.tag
                    && a.key == b.key
                    && a.attrs == b.attrs
                    && a.children.len() == b.children.len()
                    && a
                        .children
                        .iter()
                        .zip(&b.children)
                        .all(|(x, y)| x.same_content(y))
            }
            _ => false,
        }
    }
}

impl fmt::Debug for VTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(text) => f.debug_tuple("Text").field(text).finish(),
            Self::Element(element) => element.fmt(f),
        }
    }
}

impl From<&str> for VTree {
    fn from(text: &str) -> Self {
        Self::Text(text.to_owned())
    }
}

impl From<String> for VTree {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

impl From<&String> for VTree {
    fn from(text: &String) -> Self {
        Self::Text(text.clone())
    }
}

impl From<Element> for VTree {
    fn from(element: Element) -> Self {
        Self::Element(element)
    }
}

impl From<ElementBuilder> for VTree {
    fn from(builder: ElementBuilder) -> Self {
        builder.finish()
    }
}

// ---------------------------------------------------------------------------
// Construction helpers
// ---------------------------------------------------------------------------

/// Empty attribute list for [`el`].
pub const NO_ATTRS: [(&str, &str); 0] = [];

/// Empty child list for [`el`].
pub const NO_CHILDREN: [VTree; 0] = [];

/// Build an element node.
///
/// Handler bags are pulled out of `attrs` (see the module docs); strings
/// become text children.
pub fn el<K, V, C>(
    tag: &str,
    attrs: impl IntoIterator<Item = (K, V)>,
    children: impl IntoIterator<Item = C>,
) -> VTree
where
    K: Into<String>,
    V: Into<AttrValue>,
    C: Into<VTree>,
{
    let props = Props::from_pairs(attrs);
    let children = children.into_iter().map(Into::into).collect();
    VTree::Element(Element::new(tag, props.attrs, children).with_handlers(props.handlers))
}

/// Build a text node.
pub fn text(text: impl Into<String>) -> VTree {
    VTree::text(text)
}

/// A reusable view fragment rendered from props and children.
pub trait Component {
    fn render(&self, props: Props, children: Vec<VTree>) -> VTree;
}

impl<F> Component for F
where
    F: Fn(Props, Vec<VTree>) -> VTree,
{
    fn render(&self, props: Props, children: Vec<VTree>) -> VTree {
        self(props, children)
    }
}

/// Render `component` with the given attributes and children.
pub fn el_component<K, V, C>(
    component: &impl Component,
    attrs: impl IntoIterator<Item = (K, V)>,
    children: impl IntoIterator<Item = C>,
) -> VTree
where
    K: Into<String>,
    V: Into<AttrValue>,
    C: Into<VTree>,
{
    let props = Props::from_pairs(attrs);
    component.render(props, children.into_iter().map(Into::into).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn key_attribute_wins_and_is_not_rendered() {
        let node = el("li", [("key", "k1"), ("id", "item"), ("class", "row")], NO_CHILDREN);
        let element = node.as_element().expect("element");
        assert_eq!(element.key().as_str(), Some("k1"));
        assert_eq!(element.attr("key"), None);
        assert_eq!(element.attr("id"), Some("item"));
        assert_eq!(element.attr("class"), Some("row"));
    }

    #[test]
    fn id_is_key_and_still_rendered() {
        let node = el("section", [("id", "main")], NO_CHILDREN);
        assert_eq!(node.key(), Key::named("main"));
        assert_eq!(node.as_element().and_then(|e| e.attr("id")), Some("main"));
    }

    #[test]
    fn tag_is_fallback_key() {
        let node = el("p", NO_ATTRS, ["hello"]);
        assert_eq!(node.key(), Key::named("p"));
    }

    #[test]
    fn text_nodes_share_sentinel_key() {
        let a = text("one");
        let b = text("two");
        assert_eq!(a.key(), Key::Text);
        assert!(a.key_eq(&b));
        assert!(!a.same_content(&b));
    }

    #[test]
    fn key_eq_ignores_content() {
        let a = el("li", [("key", "x"), ("class", "a")], ["left"]);
        let b = el("li", [("key", "x"), ("class", "b")], ["right"]);
        assert!(a.key_eq(&b));
        assert!(!a.same_content(&b));
    }

    #[test]
    fn text_never_key_equals_element() {
        let t = text("div");
        let e = el("div", NO_ATTRS, NO_CHILDREN);
        assert!(!t.key_eq(&e));
        assert!(!e.key_eq(&t));
    }

    #[test]
    fn on_is_extracted_into_handlers() {
        let hits = Rc::new(Cell::new(0));
        let h = Rc::clone(&hits);
        let node = el(
            "button",
            attrs! {
                "class" => "go",
                "on" => Handlers::new().on("click", move |_| h.set(h.get() + 1)),
            },
            ["Go"],
        );
        let element = node.as_element().expect("element");
        assert_eq!(element.attr("on"), None);
        assert_eq!(element.attrs().len(), 1);
        assert_eq!(element.handlers().len(), 1);

        let event = DomEvent::new("click", NodeId::new(1));
        for handler in element.handlers().for_kind("click") {
            handler(&event);
        }
        assert_eq!(hits.get(), 1);
        assert_eq!(element.handlers().for_kind("keyup").count(), 0);
    }

    #[test]
    fn plain_string_under_on_is_dropped() {
        let node = el("div", [("on", "click")], NO_CHILDREN);
        let element = node.as_element().expect("element");
        assert!(element.attrs().is_empty());
        assert!(element.handlers().is_empty());
    }

    #[test]
    fn builder_matches_el() {
        let built = Element::build("a")
            .attr("href", "/x")
            .key("link")
            .child("x")
            .finish();
        let direct = el("a", [("href", "/x"), ("key", "link")], ["x"]);
        assert!(built.same_content(&direct));
        assert!(built.key_eq(&direct));
    }

    #[test]
    fn component_receives_props_and_children() {
        let card = |props: Props, children: Vec<VTree>| {
            let title = props.attrs.get("title").cloned().unwrap_or_default();
            Element::build("div")
                .class("card")
                .child(Element::build("h2").child(title))
                .children(children)
                .finish()
        };
        let node = el_component(&card, [("title", "Gears")], ["body"]);
        assert_eq!(node.tag(), Some("div"));
        assert_eq!(node.children().len(), 2);
        assert_eq!(node.children()[1].as_text(), Some("body"));
        assert_eq!(node.node_count(), 4);
    }

    #[test]
    fn hook_is_kept_on_element() {
        let node = Element::build("canvas").on_create(|_| None).finish();
        assert!(node.as_element().and_then(Element::on_create).is_some());
    }
}
