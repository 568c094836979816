use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use crate::cascading::{CascadingParameterInfo, CascadingValueSupplier};
use crate::collections::map::HashSet;
use crate::component::Component;
use crate::frames::Frame;
use crate::params::ParameterCollection;
use crate::renderer::RendererInner;
use crate::ComponentId;

/// Explicit lifecycle position of a component instance.
///
/// `Unattached` covers the gap between instantiation and the first
/// parameter delivery; `PendingRender` means the component sits in the
/// render queue. Disposal is one-way.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComponentStatus {
    Unattached,
    Active,
    PendingRender,
    Disposing,
    Disposed,
}

/// A resolved cascading supplier for one declared parameter. Non-fixed
/// suppliers carry a live subscription the renderer drops on disposal;
/// fixed ones are recorded only so fixed-flag drift is detected.
pub(crate) struct CascadingSubscription {
    pub(crate) supplier: Rc<dyn CascadingValueSupplier>,
    pub(crate) info: CascadingParameterInfo,
    pub(crate) was_fixed: bool,
}

/// Renderer-side bookkeeping for one component instance: identity, parent
/// back-reference, lifecycle status, the frames of its most recent render
/// and its cascading subscriptions.
pub struct ComponentState {
    component_id: ComponentId,
    renderer: Weak<RendererInner>,
    component: Rc<RefCell<Box<dyn Component>>>,
    parent: Option<Weak<ComponentState>>,
    status: Cell<ComponentStatus>,
    initialized: Cell<bool>,
    has_rendered: Cell<bool>,
    force_empty_render: Cell<bool>,
    frames: RefCell<Vec<Frame>>,
    latest_parameters: RefCell<Option<ParameterCollection>>,
    subscriptions: RefCell<Vec<CascadingSubscription>>,
    delivered_single: RefCell<HashSet<String>>,
}

impl ComponentState {
    pub(crate) fn new(
        component_id: ComponentId,
        renderer: Weak<RendererInner>,
        component: Box<dyn Component>,
        parent: Option<Weak<ComponentState>>,
    ) -> Self {
        Self {
            component_id,
            renderer,
            component: Rc::new(RefCell::new(component)),
            parent,
            status: Cell::new(ComponentStatus::Unattached),
            initialized: Cell::new(false),
            has_rendered: Cell::new(false),
            force_empty_render: Cell::new(false),
            frames: RefCell::new(Vec::new()),
            latest_parameters: RefCell::new(None),
            subscriptions: RefCell::new(Vec::new()),
            delivered_single: RefCell::new(HashSet::new()),
        }
    }

    pub fn component_id(&self) -> ComponentId {
        self.component_id
    }

    pub fn status(&self) -> ComponentStatus {
        self.status.get()
    }

    pub(crate) fn set_status(&self, status: ComponentStatus) {
        self.status.set(status);
    }

    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }

    pub fn parent(&self) -> Option<Rc<ComponentState>> {
        self.parent.as_ref().and_then(Weak::upgrade)
    }

    pub(crate) fn renderer(&self) -> Option<Rc<RendererInner>> {
        self.renderer.upgrade()
    }

    pub(crate) fn component(&self) -> Rc<RefCell<Box<dyn Component>>> {
        self.component.clone()
    }

    pub(crate) fn is_initialized(&self) -> bool {
        self.initialized.get()
    }

    pub(crate) fn mark_initialized(&self) {
        self.initialized.set(true);
    }

    pub(crate) fn has_rendered(&self) -> bool {
        self.has_rendered.get()
    }

    pub(crate) fn mark_rendered(&self) {
        self.has_rendered.set(true);
    }

    /// Set when an error boundary must clear its subtree: the next render
    /// produces an empty tree without consulting the component.
    pub(crate) fn force_empty_render(&self) {
        self.force_empty_render.set(true);
    }

    pub(crate) fn take_force_empty_render(&self) -> bool {
        self.force_empty_render.replace(false)
    }

    pub(crate) fn take_frames(&self) -> Vec<Frame> {
        std::mem::take(&mut *self.frames.borrow_mut())
    }

    pub(crate) fn set_frames(&self, frames: Vec<Frame>) {
        *self.frames.borrow_mut() = frames;
    }

    /// Read-only access to the frames of the most recent render.
    pub fn with_frames<R>(&self, f: impl FnOnce(&[Frame]) -> R) -> R {
        f(&self.frames.borrow())
    }

    pub(crate) fn set_latest_parameters(&self, parameters: ParameterCollection) {
        *self.latest_parameters.borrow_mut() = Some(parameters);
    }

    pub(crate) fn latest_parameters(&self) -> Option<ParameterCollection> {
        self.latest_parameters.borrow().clone()
    }

    pub(crate) fn subscriptions(&self) -> &RefCell<Vec<CascadingSubscription>> {
        &self.subscriptions
    }

    pub(crate) fn take_subscriptions(&self) -> Vec<CascadingSubscription> {
        std::mem::take(&mut *self.subscriptions.borrow_mut())
    }

    pub(crate) fn was_delivered_once(&self, parameter_name: &str) -> bool {
        self.delivered_single.borrow().contains(parameter_name)
    }

    pub(crate) fn mark_delivered_once(&self, parameter_name: &str) {
        self.delivered_single
            .borrow_mut()
            .insert(parameter_name.to_owned());
    }
}
