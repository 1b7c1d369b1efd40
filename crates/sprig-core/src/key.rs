#![forbid(unsafe_code)]

//! Identity tokens used to pair nodes across renders.

use std::fmt;
use std::rc::Rc;

/// Identity of a virtual node.
///
/// Elements take their key from the `key` attribute, then the `id`
/// attribute, then the tag name. Every text node shares the [`Key::Text`]
/// sentinel, so two text siblings at the same position always pair up and
/// differing content is handled by the patcher rather than by the list diff.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Key {
    /// Shared key of all text nodes.
    Text,
    /// Key of an element.
    Named(Rc<str>),
}

impl Key {
    #[must_use]
    pub fn named(name: impl AsRef<str>) -> Self {
        Self::Named(Rc::from(name.as_ref()))
    }

    /// The element key, or `None` for text.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text => None,
            Self::Named(name) => Some(name),
        }
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text => f.write_str("#text"),
            Self::Named(name) => f.write_str(name),
        }
    }
}
