#![forbid(unsafe_code)]

//! Render entry point: keep a document in sync with a signal of views.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use sprig_core::{NodeId, VTree};
use sprig_runtime::Signal;

use crate::document::{Document, SharedDocument};
use crate::patch::{PatchError, PatchStats, Renderer};

/// Keeps a render pipeline attached. Dropping it stops rendering; the
/// document keeps whatever was rendered last.
#[must_use = "rendering stops when the handle is dropped"]
pub struct RenderHandle {
    baseline: Signal<Option<VTree>>,
    renderer: Rc<RefCell<Renderer>>,
    renders: Rc<Cell<u64>>,
    root: NodeId,
}

impl RenderHandle {
    #[must_use]
    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Views applied so far (failed patches are not counted).
    #[must_use]
    pub fn renders(&self) -> u64 {
        self.renders.get()
    }

    #[must_use]
    pub fn stats(&self) -> PatchStats {
        self.renderer.borrow().stats()
    }

    #[must_use]
    pub fn renderer(&self) -> &Rc<RefCell<Renderer>> {
        &self.renderer
    }

    /// The tree baseline as a signal: emits after every render attempt.
    #[must_use]
    pub fn baseline(&self) -> &Signal<Option<VTree>> {
        &self.baseline
    }
}

impl fmt::Debug for RenderHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RenderHandle")
            .field("root", &self.root)
            .field("renders", &self.renders.get())
            .finish()
    }
}

/// Mount the first view emitted by `view` under `root`, then patch against
/// the previous view on every later emission.
pub fn render<D: Document + 'static>(
    view: &Signal<VTree>,
    doc: &SharedDocument<D>,
    root: NodeId,
) -> RenderHandle {
    render_with(view, doc, root, Rc::new(RefCell::new(Renderer::new())))
}

/// [`render`] with a caller-provided renderer, so its handler registry can
/// be shared with an event delegator.
pub fn render_with<D: Document + 'static>(
    view: &Signal<VTree>,
    doc: &SharedDocument<D>,
    root: NodeId,
    renderer: Rc<RefCell<Renderer>>,
) -> RenderHandle {
    let renders = Rc::new(Cell::new(0));
    let (r, n, d) = (Rc::clone(&renderer), Rc::clone(&renders), Rc::clone(doc));
    let baseline = view.reduce(None, move |previous: &Option<VTree>, next: &VTree| {
        match apply(&d, &r, root, previous.as_ref(), next) {
            Ok(()) => {
                n.set(n.get() + 1);
                Some(next.clone())
            }
            Err(err) => {
                tracing::error!(error = %err, root = %root, "render failed; keeping previous view");
                previous.clone()
            }
        }
    });
    RenderHandle {
        baseline,
        renderer,
        renders,
        root,
    }
}

#[derive(Debug)]
enum RenderError {
    Patch(PatchError),
    DocumentBusy,
}

impl fmt::Display for RenderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Patch(err) => write!(f, "{err}"),
            Self::DocumentBusy => write!(f, "document is borrowed elsewhere"),
        }
    }
}

fn apply<D: Document>(
    doc: &SharedDocument<D>,
    renderer: &RefCell<Renderer>,
    root: NodeId,
    previous: Option<&VTree>,
    next: &VTree,
) -> Result<(), RenderError> {
    let mut doc = doc.try_borrow_mut().map_err(|_| RenderError::DocumentBusy)?;
    let mut renderer = renderer
        .try_borrow_mut()
        .map_err(|_| RenderError::DocumentBusy)?;
    let result = match previous {
        None => renderer.mount(&mut *doc, root, next).map(drop),
        Some(previous) => renderer.patch(&mut *doc, root, Some(previous), Some(next), 0),
    };
    result.map_err(RenderError::Patch)
}
