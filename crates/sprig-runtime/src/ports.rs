#![forbid(unsafe_code)]

//! Named endpoints between the application and its host page.
//!
//! Ports are declared up front by name and direction:
//!
//! - **Inbound** (host → app): the host calls [`InboundPort::send`]; values
//!   arrive on the app side through a [`Mailbox`], so on the next turn.
//! - **Outbound** (app → host): the app feeds a signal into the port and the
//!   host attaches with [`OutboundPort::recv`].
//!
//! Looking a port up by a name that was not declared, in the wrong
//! direction, or with a different value type is a [`PortError`].

use std::any::{Any, type_name};
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use ahash::AHashMap;

use crate::mailbox::Mailbox;
use crate::scheduler::Scheduler;
use crate::signal::{Signal, Subscription};

/// Which way values travel through a port.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortDirection {
    Inbound,
    Outbound,
}

impl fmt::Display for PortDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Inbound => write!(f, "inbound"),
            Self::Outbound => write!(f, "outbound"),
        }
    }
}

/// Error type for port lookups.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PortError {
    /// No port with this name was declared.
    Undeclared(String),
    /// The port exists but travels the other way.
    WrongDirection {
        name: String,
        declared: PortDirection,
    },
    /// The port was first opened with a different value type.
    TypeMismatch {
        name: String,
        requested: &'static str,
    },
}

impl fmt::Display for PortError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Undeclared(name) => write!(f, "port `{name}` is not declared"),
            Self::WrongDirection { name, declared } => {
                write!(f, "port `{name}` is declared {declared}")
            }
            Self::TypeMismatch { name, requested } => {
                write!(f, "port `{name}` does not carry values of type {requested}")
            }
        }
    }
}

impl std::error::Error for PortError {}

/// Host-facing sender into the app.
pub struct InboundPort<T: 'static> {
    name: Rc<str>,
    mailbox: Mailbox<T>,
}

impl<T: 'static> Clone for InboundPort<T> {
    fn clone(&self) -> Self {
        Self {
            name: Rc::clone(&self.name),
            mailbox: self.mailbox.clone(),
        }
    }
}

impl<T: 'static> InboundPort<T> {
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Post a value into the app (delivered next turn).
    pub fn send(&self, value: T) {
        self.mailbox.send(value);
    }

    /// App-side signal carrying the posted values.
    #[must_use]
    pub fn signal(&self) -> &Signal<T> {
        self.mailbox.signal()
    }
}

impl<T: 'static> fmt::Debug for InboundPort<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InboundPort").field("name", &self.name).finish()
    }
}

/// Host-facing listener on values leaving the app.
pub struct OutboundPort<T: 'static> {
    name: Rc<str>,
    signal: Signal<T>,
}

impl<T: 'static> Clone for OutboundPort<T> {
    fn clone(&self) -> Self {
        Self {
            name: Rc::clone(&self.name),
            signal: self.signal.clone(),
        }
    }
}

impl<T: 'static> OutboundPort<T> {
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Emit a value to the host synchronously.
    pub fn send(&self, value: T) {
        self.signal.send(value);
    }

    /// Route every value of `source` out through this port.
    pub fn feed(&self, source: &Signal<T>) {
        source.connect(self.signal.clone());
    }

    /// Host side: attach a listener.
    #[doc(alias = "listen")]
    pub fn recv(&self, callback: impl Fn(&T) + 'static) -> Subscription {
        self.signal.recv(callback)
    }
}

impl<T: 'static> fmt::Debug for OutboundPort<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OutboundPort").field("name", &self.name).finish()
    }
}

/// Registry of declared ports.
pub struct Ports {
    declared: AHashMap<String, PortDirection>,
    open: RefCell<AHashMap<String, Box<dyn Any>>>,
    scheduler: Scheduler,
}

impl Ports {
    #[must_use]
    pub fn new(scheduler: Scheduler) -> Self {
        Self {
            declared: AHashMap::new(),
            open: RefCell::new(AHashMap::new()),
            scheduler,
        }
    }

    /// Declare ports from name lists.
    #[must_use]
    pub fn declare<I, O>(scheduler: Scheduler, inbound: I, outbound: O) -> Self
    where
        I: IntoIterator,
        I::Item: Into<String>,
        O: IntoIterator,
        O::Item: Into<String>,
    {
        let mut ports = Self::new(scheduler);
        for name in inbound {
            ports.declare_inbound(name);
        }
        for name in outbound {
            ports.declare_outbound(name);
        }
        ports
    }

    pub fn declare_inbound(&mut self, name: impl Into<String>) {
        self.declared.insert(name.into(), PortDirection::Inbound);
    }

    pub fn declare_outbound(&mut self, name: impl Into<String>) {
        self.declared.insert(name.into(), PortDirection::Outbound);
    }

    #[must_use]
    pub fn direction(&self, name: &str) -> Option<PortDirection> {
        self.declared.get(name).copied()
    }

    /// Declared names, sorted.
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.declared.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    fn check(&self, name: &str, wanted: PortDirection) -> Result<(), PortError> {
        match self.direction(name) {
            None => Err(PortError::Undeclared(name.to_owned())),
            Some(declared) if declared != wanted => Err(PortError::WrongDirection {
                name: name.to_owned(),
                declared,
            }),
            Some(_) => Ok(()),
        }
    }

    fn open_as<P: Clone + 'static>(
        &self,
        name: &str,
        create: impl FnOnce(Rc<str>) -> P,
    ) -> Result<P, PortError> {
        let mut open = self.open.borrow_mut();
        if let Some(existing) = open.get(name) {
            return existing
                .downcast_ref::<P>()
                .cloned()
                .ok_or_else(|| PortError::TypeMismatch {
                    name: name.to_owned(),
                    requested: type_name::<P>(),
                });
        }
        let port = create(Rc::from(name));
        open.insert(name.to_owned(), Box::new(port.clone()));
        tracing::debug!(port = name, "port opened");
        Ok(port)
    }

    /// Open (or reopen) an inbound port carrying `T`.
    pub fn inbound<T: 'static>(&self, name: &str) -> Result<InboundPort<T>, PortError> {
        self.check(name, PortDirection::Inbound)?;
        let scheduler = self.scheduler.clone();
        self.open_as(name, |name| InboundPort {
            name,
            mailbox: Mailbox::with_scheduler(scheduler),
        })
    }

    /// Open (or reopen) an outbound port carrying `T`.
    pub fn outbound<T: 'static>(&self, name: &str) -> Result<OutboundPort<T>, PortError> {
        self.check(name, PortDirection::Outbound)?;
        self.open_as(name, |name| OutboundPort {
            name,
            signal: Signal::new(),
        })
    }
}

impl fmt::Debug for Ports {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Ports")
            .field("declared", &self.names())
            .field("open", &self.open.borrow().len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ports(scheduler: &Scheduler) -> Ports {
        Ports::declare(scheduler.clone(), ["setTheme"], ["accentColor"])
    }

    #[test]
    fn inbound_delivers_next_turn() {
        let scheduler = Scheduler::new();
        let ports = ports(&scheduler);
        let port = ports.inbound::<String>("setTheme").expect("declared");
        let seen = Rc::new(RefCell::new(Vec::new()));
        let s = Rc::clone(&seen);
        let _sub = port.signal().recv(move |v: &String| s.borrow_mut().push(v.clone()));

        port.send("dark".into());
        assert!(seen.borrow().is_empty());
        scheduler.run_turn();
        assert_eq!(*seen.borrow(), ["dark"]);
    }

    #[test]
    fn outbound_feed_reaches_host() {
        let scheduler = Scheduler::new();
        let ports = ports(&scheduler);
        let state = Signal::new();
        ports
            .outbound::<String>("accentColor")
            .expect("declared")
            .feed(&state.map(|hue: &u16| format!("hsl({hue}, 60%, 50%)")));

        let host = ports.outbound::<String>("accentColor").expect("reopen");
        let seen = Rc::new(RefCell::new(Vec::new()));
        let s = Rc::clone(&seen);
        let _sub = host.recv(move |css| s.borrow_mut().push(css.clone()));

        state.send(120);
        assert_eq!(*seen.borrow(), ["hsl(120, 60%, 50%)"]);
    }

    #[test]
    fn lookup_errors() {
        let scheduler = Scheduler::new();
        let ports = ports(&scheduler);
        assert_eq!(
            ports.inbound::<u8>("missing").unwrap_err(),
            PortError::Undeclared("missing".into())
        );
        assert_eq!(
            ports.outbound::<u8>("setTheme").unwrap_err(),
            PortError::WrongDirection {
                name: "setTheme".into(),
                declared: PortDirection::Inbound
            }
        );
        let _first = ports.inbound::<String>("setTheme").expect("open");
        let err = ports.inbound::<u32>("setTheme").unwrap_err();
        assert!(matches!(err, PortError::TypeMismatch { .. }));
        assert!(err.to_string().starts_with("port `setTheme` does not carry"));
    }

    #[test]
    fn names_are_sorted() {
        let scheduler = Scheduler::new();
        let ports = ports(&scheduler);
        assert_eq!(ports.names(), ["accentColor", "setTheme"]);
        assert_eq!(ports.direction("accentColor"), Some(PortDirection::Outbound));
    }
}
