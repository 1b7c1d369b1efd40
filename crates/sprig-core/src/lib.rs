#![forbid(unsafe_code)]

//! Virtual tree and diff kernel for sprig.
//!
//! This crate provides:
//! - [`VTree`] / [`Element`] with keyed identity and the [`el`] constructor
//! - [`diff_array`], the edit-script diff the patcher runs over sibling lists
//! - [`DomEvent`] and [`NodeId`], the host-neutral event and node handle types

pub mod diff;
pub mod event;
pub mod key;
pub mod vtree;

pub use diff::{Edit, EditStats, apply_edits, diff_array};
pub use event::{DomEvent, EventPath, NodeId};
pub use key::Key;
pub use vtree::{
    AttrValue, Attrs, Component, Element, ElementBuilder, EventHandler, Handlers, Hook,
    NO_ATTRS, NO_CHILDREN, Props, Teardown, VTree, el, el_component, text,
};
