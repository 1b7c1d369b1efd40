#![forbid(unsafe_code)]

//! Application runtimes.
//!
//! Two ways to run an update/view pair against a document:
//!
//! - [`App`]: the signal pipeline. Messages posted to the app's
//!   [`Address`] go through a [`Mailbox`], so every update happens on a
//!   later scheduler turn: `mailbox → reduce(update) → dedupe → map(view) →
//!   render`.
//! - [`Program`]: synchronous. [`Program::dispatch`] updates the state,
//!   notifies subscribers and patches the document before returning. A
//!   dispatch attempted while another is running fails with
//!   [`DispatchError::Reentrant`].
//!
//! Both install event delegation at the configured root and declare the
//! configured ports.

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

use sprig_core::{NodeId, VTree};
use sprig_runtime::{
    Address, DispatchError, DispatchGuard, Mailbox, Ports, Scheduler, Signal, Subscription,
    SubscriptionScope,
};

use crate::config::{EventRoot, RuntimeConfig};
use crate::document::{Document, DomError, SharedDocument};
use crate::events::{EventDelegator, delegated_kinds};
use crate::patch::{PatchError, PatchStats, Renderer};
use crate::render::{RenderHandle, render_with};

/// Error type for starting a runtime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppError {
    /// No element carries the configured event root id.
    MissingEventRoot(String),
    /// The document was already borrowed.
    DocumentBusy,
    /// The document rejected listener installation or the initial mount.
    Dom(DomError),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingEventRoot(id) => write!(f, "no element with id `{id}` to listen on"),
            Self::DocumentBusy => write!(f, "document is borrowed elsewhere"),
            Self::Dom(err) => write!(f, "{err}"),
        }
    }
}

impl std::error::Error for AppError {}

impl From<DomError> for AppError {
    fn from(err: DomError) -> Self {
        Self::Dom(err)
    }
}

fn install_delegation<D: Document>(
    config: &RuntimeConfig,
    doc: &SharedDocument<D>,
    mount: NodeId,
    renderer: &RefCell<Renderer>,
) -> Result<EventDelegator, AppError> {
    let mut doc = doc.try_borrow_mut().map_err(|_| AppError::DocumentBusy)?;
    let root = match &config.event_root {
        EventRoot::Body => doc.body(),
        EventRoot::Mount => mount,
        EventRoot::Id(id) => doc
            .element_by_id(id)
            .ok_or_else(|| AppError::MissingEventRoot(id.clone()))?,
    };
    let registry = Rc::clone(renderer.borrow().registry());
    Ok(EventDelegator::install(
        &mut *doc,
        root,
        delegated_kinds(&config.extra_events),
        config.capture,
        &registry,
    )?)
}

// ---------------------------------------------------------------------------
// App
// ---------------------------------------------------------------------------

/// Signal-driven application.
///
/// The initial state is rendered on the first scheduler turn after
/// [`App::start`]. Dropping the app detaches the pipeline.
pub struct App<M: 'static, S: 'static> {
    address: Address<M>,
    states: Signal<S>,
    latest: Rc<RefCell<Option<S>>>,
    render: RenderHandle,
    ports: Ports,
    delegator: EventDelegator,
    scheduler: Scheduler,
    config: RuntimeConfig,
    _scope: SubscriptionScope,
}

impl<M: 'static, S: Clone + PartialEq + 'static> App<M, S> {
    /// Start on the thread's global scheduler.
    pub fn start<D: Document + 'static>(
        config: RuntimeConfig,
        doc: &SharedDocument<D>,
        mount: NodeId,
        init: S,
        update: impl Fn(&S, &M) -> S + 'static,
        view: impl Fn(&S, &Address<M>) -> VTree + 'static,
    ) -> Result<Self, AppError> {
        Self::start_on(Scheduler::global(), config, doc, mount, init, update, view)
    }

    /// Start on `scheduler`.
    pub fn start_on<D: Document + 'static>(
        scheduler: Scheduler,
        config: RuntimeConfig,
        doc: &SharedDocument<D>,
        mount: NodeId,
        init: S,
        update: impl Fn(&S, &M) -> S + 'static,
        view: impl Fn(&S, &Address<M>) -> VTree + 'static,
    ) -> Result<Self, AppError> {
        let config = config.sanitized();
        let renderer = Rc::new(RefCell::new(Renderer::new()));
        let delegator = install_delegation(&config, doc, mount, &renderer)?;
        let ports = config.ports(scheduler.clone());

        // `None` is the boot step: it re-emits the initial state so the
        // first turn renders it.
        let mailbox: Mailbox<Option<M>> =
            Mailbox::with_scheduler(scheduler.clone()).with_initial(None);
        let address = mailbox.address().forward(Some);

        let states = mailbox
            .signal()
            .reduce(init, move |state: &S, step: &Option<M>| match step {
                Some(message) => update(state, message),
                None => state.clone(),
            })
            .dedupe();
        let view_address = address.clone();
        let views = states.map(move |state| view(state, &view_address));
        let render = render_with(&views, doc, mount, renderer);

        let latest = Rc::new(RefCell::new(None));
        let mut scope = SubscriptionScope::new();
        let l = Rc::clone(&latest);
        scope.recv(&states, move |state: &S| *l.borrow_mut() = Some(state.clone()));

        tracing::debug!(
            mount = %mount,
            inbound = config.inbound_ports.len(),
            outbound = config.outbound_ports.len(),
            "app started"
        );
        Ok(Self {
            address,
            states,
            latest,
            render,
            ports,
            delegator,
            scheduler,
            config,
            _scope: scope,
        })
    }

    /// Where views and hosts post messages.
    #[must_use]
    pub fn address(&self) -> &Address<M> {
        &self.address
    }

    /// Post `message`; it is processed on a later turn.
    pub fn send(&self, message: M) {
        self.address.send(message);
    }

    /// Every distinct state, as it is produced.
    #[must_use]
    pub fn states(&self) -> &Signal<S> {
        &self.states
    }

    /// The most recent state, once the first turn has run.
    #[must_use]
    pub fn state(&self) -> Option<S> {
        self.latest.borrow().clone()
    }

    #[must_use]
    pub fn ports(&self) -> &Ports {
        &self.ports
    }

    #[must_use]
    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    #[must_use]
    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    #[must_use]
    pub fn delegator(&self) -> &EventDelegator {
        &self.delegator
    }

    /// Views rendered so far.
    #[must_use]
    pub fn renders(&self) -> u64 {
        self.render.renders()
    }

    #[must_use]
    pub fn stats(&self) -> PatchStats {
        self.render.stats()
    }

    /// Drive the scheduler within the configured turn budget.
    pub fn run_until_idle(&self) -> usize {
        self.scheduler
            .run_until_idle(self.config.max_turns_per_drain)
    }
}

impl<M: 'static, S: 'static> fmt::Debug for App<M, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("App")
            .field("render", &self.render)
            .field("ports", &self.ports)
            .field("delegator", &self.delegator)
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// Program
// ---------------------------------------------------------------------------

/// Synchronous entry point into a [`Program`], handed to views.
pub struct Dispatcher<M> {
    dispatch: Rc<dyn Fn(M) -> Result<(), DispatchError>>,
}

impl<M> Clone for Dispatcher<M> {
    fn clone(&self) -> Self {
        Self {
            dispatch: Rc::clone(&self.dispatch),
        }
    }
}

impl<M: 'static> Dispatcher<M> {
    /// Run `message` through the program now.
    pub fn dispatch(&self, message: M) -> Result<(), DispatchError> {
        (self.dispatch)(message)
    }

    /// Like [`dispatch`](Self::dispatch), logging instead of returning the
    /// error. Convenient inside event handlers.
    pub fn send(&self, message: M) {
        if let Err(err) = self.dispatch(message) {
            tracing::warn!(error = %err, "message dropped");
        }
    }
}

impl<M> fmt::Debug for Dispatcher<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Dispatcher")
    }
}

type UpdateFn<M, S> = Box<dyn Fn(&S, &M) -> S>;
type ViewFn<M, S> = Box<dyn Fn(&S, &Dispatcher<M>) -> VTree>;

struct ProgramInner<M: 'static, S: 'static, D: 'static> {
    guard: DispatchGuard,
    state: RefCell<Rc<S>>,
    update: UpdateFn<M, S>,
    view: ViewFn<M, S>,
    changes: Signal<S>,
    doc: SharedDocument<D>,
    mount: NodeId,
    renderer: RefCell<Renderer>,
    tree: RefCell<Option<VTree>>,
    dispatcher: Dispatcher<M>,
}

impl<M: 'static, S: 'static, D: Document + 'static> ProgramInner<M, S, D> {
    fn dispatch(&self, message: M) -> Result<(), DispatchError> {
        let _token = self.guard.enter()?;
        let _span = tracing::debug_span!("dispatch").entered();

        let next = {
            let current = Rc::clone(&self.state.borrow());
            Rc::new((self.update)(&current, &message))
        };
        *self.state.borrow_mut() = Rc::clone(&next);
        self.changes.emit(&next);
        if let Err(error) = self.redraw(&next) {
            tracing::error!(%error, "redraw failed; keeping previous view");
        }
        Ok(())
    }

    /// Render `state` and patch it in. On failure the previous tree stays
    /// the baseline.
    fn redraw(&self, state: &S) -> Result<(), AppError> {
        let tree = (self.view)(state, &self.dispatcher);
        let mut doc = self
            .doc
            .try_borrow_mut()
            .map_err(|_| AppError::DocumentBusy)?;
        let mut renderer = self.renderer.borrow_mut();
        let previous = self.tree.borrow_mut().take();
        let result = match &previous {
            None => renderer.mount(&mut *doc, self.mount, &tree).map(drop),
            Some(old) => renderer.patch(&mut *doc, self.mount, Some(old), Some(&tree), 0),
        };
        match result {
            Ok(()) => {
                *self.tree.borrow_mut() = Some(tree);
                Ok(())
            }
            Err(PatchError::Dom(err)) => {
                *self.tree.borrow_mut() = previous;
                Err(AppError::Dom(err))
            }
        }
    }
}

/// Guarded synchronous application.
pub struct Program<M: 'static, S: 'static, D: Document + 'static> {
    inner: Rc<ProgramInner<M, S, D>>,
    ports: Ports,
    delegator: EventDelegator,
}

impl<M: 'static, S: 'static, D: Document + 'static> Program<M, S, D> {
    /// Mount `view(init)` under `mount` and return the running program.
    pub fn new(
        config: RuntimeConfig,
        doc: &SharedDocument<D>,
        mount: NodeId,
        init: S,
        update: impl Fn(&S, &M) -> S + 'static,
        view: impl Fn(&S, &Dispatcher<M>) -> VTree + 'static,
    ) -> Result<Self, AppError> {
        let config = config.sanitized();
        let renderer = RefCell::new(Renderer::new());
        let delegator = install_delegation(&config, doc, mount, &renderer)?;

        let inner = Rc::new_cyclic(|weak: &Weak<ProgramInner<M, S, D>>| {
            let weak = weak.clone();
            ProgramInner {
                guard: DispatchGuard::new(),
                state: RefCell::new(Rc::new(init)),
                update: Box::new(update),
                view: Box::new(view),
                changes: Signal::new(),
                doc: Rc::clone(doc),
                mount,
                renderer,
                tree: RefCell::new(None),
                dispatcher: Dispatcher {
                    dispatch: Rc::new(move |message: M| match weak.upgrade() {
                        Some(inner) => inner.dispatch(message),
                        None => Ok(()),
                    }),
                },
            }
        });

        {
            // Hooks fired by the initial mount must not dispatch either.
            let _token = inner.guard.enter();
            let state = Rc::clone(&inner.state.borrow());
            inner.redraw(&state)?;
        }

        Ok(Self {
            ports: config.ports(Scheduler::global()),
            inner,
            delegator,
        })
    }

    /// Process `message` now.
    pub fn dispatch(&self, message: M) -> Result<(), DispatchError> {
        self.inner.dispatch(message)
    }

    #[must_use]
    pub fn dispatcher(&self) -> Dispatcher<M> {
        self.inner.dispatcher.clone()
    }

    /// Call `listener` with every new state, after the update and before
    /// the redraw.
    pub fn subscribe(&self, listener: impl Fn(&S) + 'static) -> Subscription {
        self.inner.changes.recv(listener)
    }

    #[must_use]
    pub fn state(&self) -> Rc<S> {
        Rc::clone(&self.inner.state.borrow())
    }

    #[must_use]
    pub fn is_dispatching(&self) -> bool {
        self.inner.guard.is_active()
    }

    #[must_use]
    pub fn ports(&self) -> &Ports {
        &self.ports
    }

    #[must_use]
    pub fn delegator(&self) -> &EventDelegator {
        &self.delegator
    }

    #[must_use]
    pub fn stats(&self) -> PatchStats {
        self.inner.renderer.borrow().stats()
    }
}

impl<M: 'static, S: 'static, D: Document + 'static> fmt::Debug for Program<M, S, D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Program")
            .field("mount", &self.inner.mount)
            .field("dispatching", &self.inner.guard.is_active())
            .field("delegator", &self.delegator)
            .finish_non_exhaustive()
    }
}
