#![forbid(unsafe_code)]

//! sprig: Elm-style views over a keyed virtual tree.
//!
//! This crate re-exports the workspace crates behind one name:
//!
//! - [`core`]: virtual trees, keys and the edit-script diff.
//! - [`runtime`]: signals, mailboxes, tasks, ports and the scheduler.
//! - [`web`] (feature `runtime`, on by default): the patcher, event
//!   delegation and the `App` / `Program` runtimes.
//!
//! Most applications only need the [`prelude`].

pub use sprig_core as core;
pub use sprig_runtime as runtime;
#[cfg(feature = "runtime")]
pub use sprig_web as web;

pub use sprig_core::attrs;

pub mod prelude {
    pub use sprig_core::{
        DomEvent, Element, Handlers, Key, NO_ATTRS, NO_CHILDREN, NodeId, Props, VTree, attrs,
        diff_array, el, el_component, text,
    };
    pub use sprig_runtime::{
        Address, DispatchError, Mailbox, Ports, Scheduler, Signal, Subscription,
        SubscriptionScope, Task,
    };

    #[cfg(feature = "runtime")]
    pub use sprig_web::{
        App, Dispatcher, Document, EventRoot, MemoryDocument, Program, RuntimeConfig, render,
    };

    #[cfg(all(feature = "web", target_arch = "wasm32"))]
    pub use sprig_web::{BrowserDocument, drive_with_timeouts};
}

#[cfg(test)]
mod tests {
    use super::prelude::*;

    #[test]
    fn prelude_builds_and_diffs() {
        let old = el("ul", NO_ATTRS, [Element::build("li").key("a").finish()]);
        let new = el(
            "ul",
            attrs! { "class" => "list" },
            [
                Element::build("li").key("a").finish(),
                Element::build("li").key("b").finish(),
            ],
        );
        let edits = diff_array(old.children(), new.children(), VTree::key_eq);
        assert_eq!(edits.len(), 2);
    }

    #[cfg(feature = "runtime")]
    #[test]
    fn prelude_renders() {
        let doc = MemoryDocument::new().shared();
        let root = doc.borrow().root();
        let view = Signal::new();
        let _handle = render(&view, &doc, root);
        view.send(el("p", NO_ATTRS, ["hello"]));
        assert_eq!(doc.borrow().inner_html(root), "<p>hello</p>");
    }
}
