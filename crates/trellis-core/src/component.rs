use std::any::Any;
use std::rc::Rc;

use crate::builder::TreeBuilder;
use crate::cascading::{CascadingParameterInfo, CascadingValueSupplier};
use crate::errors::{LifecycleFault, ParameterError, RenderError};
use crate::operation::Operation;
use crate::params::ParameterView;
use crate::renderer::RenderHandle;

/// How a lifecycle method finished: synchronously (cleanly or with a
/// fault), or not yet. A pending outcome triggers an immediate render with
/// whatever state the component has, and a second render when the
/// operation settles.
pub enum LifecycleOutcome {
    Done(Result<(), LifecycleFault>),
    Pending(Operation),
}

impl LifecycleOutcome {
    pub fn done() -> Self {
        LifecycleOutcome::Done(Ok(()))
    }

    pub fn failed(fault: LifecycleFault) -> Self {
        LifecycleOutcome::Done(Err(fault))
    }

    pub fn pending(operation: Operation) -> Self {
        LifecycleOutcome::Pending(operation)
    }
}

/// A unit of UI. The renderer drives each instance through an explicit
/// state machine: attach, parameter delivery, initialization, renders,
/// after-render notifications, disposal.
///
/// Only `apply_parameters` and `render` are mandatory; everything else has
/// a no-op default.
pub trait Component: Any {
    /// Called once, before any parameters arrive. The handle is how the
    /// component requests re-renders later.
    fn attach(&mut self, handle: RenderHandle) {
        let _ = handle;
    }

    /// Bind a delivered parameter set onto the component's fields.
    fn apply_parameters(&mut self, parameters: &ParameterView<'_>) -> Result<(), ParameterError>;

    /// Runs after the first successful parameter binding, before the first
    /// render.
    fn on_initialized(&mut self) -> LifecycleOutcome {
        LifecycleOutcome::done()
    }

    /// Runs after every parameter binding (including the first, after
    /// `on_initialized`).
    fn on_parameters_set(&mut self) -> LifecycleOutcome {
        LifecycleOutcome::done()
    }

    /// Emit the component's current frame tree.
    fn render(&mut self, builder: &mut TreeBuilder) -> Result<(), RenderError>;

    /// Runs after a batch containing this component's diff has been
    /// committed by the display layer.
    fn on_after_render(&mut self, first_render: bool) -> LifecycleOutcome {
        let _ = first_render;
        LifecycleOutcome::done()
    }

    fn dispose(&mut self) -> LifecycleOutcome {
        LifecycleOutcome::done()
    }

    /// Cascading parameters this component consumes. The renderer resolves
    /// them against ancestor suppliers before each `apply_parameters`.
    fn declared_cascading_parameters(&self) -> Vec<CascadingParameterInfo> {
        Vec::new()
    }

    /// A supplier this component offers to its descendants, if any.
    fn cascading_supplier(&self) -> Option<Rc<dyn CascadingValueSupplier>> {
        None
    }

    /// Opt in to absorbing descendant failures.
    fn as_error_boundary(&mut self) -> Option<&mut dyn ErrorBoundary> {
        None
    }
}

/// A component that absorbs faults from its descendants. When a routable
/// error reaches a boundary, the renderer forces the boundary to render an
/// empty tree (disposing the failed subtree) and then hands it the error;
/// the boundary typically stores it and requests a render of fallback
/// content.
pub trait ErrorBoundary {
    fn handle_error(&mut self, error: &RenderError);
}

/// Seam between captured parameters and component fields. The default
/// binder delegates to the component itself; hosts can install one that
/// does conversions or validation first.
pub trait ParameterBinder {
    fn bind(
        &self,
        component: &mut dyn Component,
        parameters: &ParameterView<'_>,
    ) -> Result<(), ParameterError>;
}

#[derive(Default)]
pub struct DirectBinder;

impl ParameterBinder for DirectBinder {
    fn bind(
        &self,
        component: &mut dyn Component,
        parameters: &ParameterView<'_>,
    ) -> Result<(), ParameterError> {
        component.apply_parameters(parameters)
    }
}
