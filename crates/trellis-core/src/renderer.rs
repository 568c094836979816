use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::fmt;
use std::rc::{Rc, Weak};

use crate::batch::{BatchBuilder, RenderBatch};
use crate::builder::TreeBuilder;
use crate::cascading::{resolve_cascading_parameters, CascadingParameterInfo, CascadingValueSupplier};
use crate::collections::map::HashMap;
use crate::component::{Component, DirectBinder, LifecycleOutcome, ParameterBinder};
use crate::diff::{compute_diff, dispose_frames, DiffEnv};
use crate::errors::{DispatchError, DisposalError, LifecycleFault, RenderError};
use crate::events::EventRegistry;
use crate::frames::{ComponentDescriptor, EventArgs, EventCallback, RenderMode};
use crate::operation::Operation;
use crate::params::{ParameterCollection, ParameterView};
use crate::state::{ComponentState, ComponentStatus};
use crate::{ComponentId, EventHandlerId};

/// What the display layer did with a batch: applied it synchronously, or
/// took it and will acknowledge later. Handler unregistration and
/// after-render notifications wait for the acknowledgement either way.
pub enum CommitOutcome {
    Committed,
    Deferred(Operation),
}

impl fmt::Debug for CommitOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommitOutcome::Committed => f.write_str("Committed"),
            CommitOutcome::Deferred(_) => f.write_str("Deferred"),
        }
    }
}

/// Result of a successful event dispatch. `Pending` carries the handler's
/// own completion token so the caller can observe when the handler's
/// deferred work finishes.
pub enum DispatchStatus {
    Completed,
    Pending(Operation),
}

impl fmt::Debug for DispatchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DispatchStatus::Completed => f.write_str("Completed"),
            DispatchStatus::Pending(_) => f.write_str("Pending"),
        }
    }
}

/// The external display layer. The renderer pushes each finished batch
/// through `update_display`; errors nothing absorbed go to
/// `unhandled_error`.
pub trait RenderSink {
    fn update_display(&self, batch: &RenderBatch) -> CommitOutcome;

    fn unhandled_error(&self, error: &RenderError) {
        log::error!("unhandled render error: {error}");
    }
}

/// Maps a render-mode tag on a component frame to a concrete instance.
/// Resolvers are consulted in registration order; the first to return a
/// component wins.
pub trait ResolveComponentRenderMode {
    fn resolve(
        &self,
        descriptor: &ComponentDescriptor,
        mode: RenderMode,
    ) -> Option<Box<dyn Component>>;
}

/// A component's line back to its renderer. Cheap to clone, holds no
/// strong reference; requests against a dropped renderer are ignored.
#[derive(Clone)]
pub struct RenderHandle {
    inner: Weak<RendererInner>,
    component_id: ComponentId,
}

impl RenderHandle {
    pub fn component_id(&self) -> ComponentId {
        self.component_id
    }

    /// Queue a re-render of this component. Takes effect immediately when
    /// no batch is being built, otherwise folds into the current pass.
    pub fn request_render(&self) {
        let Some(inner) = self.inner.upgrade() else {
            return;
        };
        let Some(state) = inner.component_state(self.component_id) else {
            return;
        };
        inner.enqueue_render(&state);
        inner.process_render_queue();
    }
}

/// Drives the component tree: parameter delivery, the render queue, diff
/// batches, event dispatch and disposal. Single-threaded by design; all
/// shared state is behind `Cell`/`RefCell`.
pub struct Renderer {
    inner: Rc<RendererInner>,
}

impl Renderer {
    pub fn new(sink: impl RenderSink + 'static) -> Self {
        Self::with_binder(sink, DirectBinder)
    }

    pub fn with_binder(
        sink: impl RenderSink + 'static,
        binder: impl ParameterBinder + 'static,
    ) -> Self {
        let inner = Rc::new_cyclic(|self_weak| RendererInner {
            self_weak: self_weak.clone(),
            sink: Box::new(sink),
            binder: Box::new(binder),
            components: RefCell::new(HashMap::new()),
            next_component_id: Cell::new(0),
            element_reference_ids: Cell::new(1),
            events: EventRegistry::new(),
            render_queue: RefCell::new(VecDeque::new()),
            batch_builder: RefCell::new(BatchBuilder::new()),
            batch_in_progress: Cell::new(false),
            global_suppliers: RefCell::new(Vec::new()),
            mode_resolvers: RefCell::new(Vec::new()),
        });
        Renderer { inner }
    }

    /// Register a root component. It does not render until parameters are
    /// delivered with `render_root`.
    pub fn attach_root(&self, component: Box<dyn Component>) -> ComponentId {
        let state = self.inner.register_component(component, None);
        state.component_id()
    }

    /// Deliver parameters to a root component and run the resulting render
    /// pass. Fatal errors come back to the caller; a root has no ancestors,
    /// so boundary-routable errors do too.
    pub fn render_root(
        &self,
        component_id: ComponentId,
        parameters: ParameterCollection,
    ) -> Result<(), RenderError> {
        let state = self
            .inner
            .component_state(component_id)
            .ok_or(RenderError::UnknownComponent { component_id })?;
        self.inner.set_parameters(&state, parameters)?;
        self.inner.process_render_queue();
        Ok(())
    }

    /// Dispose a root component and its whole subtree, reporting the
    /// removals in a batch.
    pub fn remove_root(&self, component_id: ComponentId) -> Result<(), RenderError> {
        if self.inner.component_state(component_id).is_none() {
            return Err(RenderError::UnknownComponent { component_id });
        }
        self.inner
            .batch_builder
            .borrow_mut()
            .queue_component_disposal(component_id);
        self.inner.process_render_queue();
        Ok(())
    }

    /// Invoke the handler registered under `handler_id`, then run any
    /// renders it queued.
    pub fn dispatch_event(
        &self,
        handler_id: EventHandlerId,
        args: &EventArgs,
    ) -> Result<DispatchStatus, DispatchError> {
        self.inner.dispatch_event(handler_id, args)
    }

    /// Register a supplier consulted when no ancestor can satisfy a
    /// cascading parameter.
    pub fn register_global_supplier(&self, supplier: Rc<dyn CascadingValueSupplier>) {
        self.inner.global_suppliers.borrow_mut().push(supplier);
    }

    pub fn add_render_mode_resolver(&self, resolver: impl ResolveComponentRenderMode + 'static) {
        self.inner
            .mode_resolvers
            .borrow_mut()
            .push(Box::new(resolver));
    }

    pub fn component_state(&self, component_id: ComponentId) -> Option<Rc<ComponentState>> {
        self.inner.component_state(component_id)
    }

    pub fn render_handle(&self, component_id: ComponentId) -> RenderHandle {
        RenderHandle {
            inner: Rc::downgrade(&self.inner),
            component_id,
        }
    }

    /// Number of live event handler registrations.
    pub fn event_handler_count(&self) -> usize {
        self.inner.events.binding_count()
    }

    /// Dispose every component and drop all registrations. Disposal faults
    /// are aggregated and reported once.
    pub fn dispose(&self) {
        self.inner.dispose_all();
    }
}

pub(crate) struct RendererInner {
    self_weak: Weak<RendererInner>,
    sink: Box<dyn RenderSink>,
    binder: Box<dyn ParameterBinder>,
    components: RefCell<HashMap<ComponentId, Rc<ComponentState>>>,
    next_component_id: Cell<ComponentId>,
    element_reference_ids: Cell<u64>,
    events: EventRegistry,
    render_queue: RefCell<VecDeque<ComponentId>>,
    batch_builder: RefCell<BatchBuilder>,
    batch_in_progress: Cell<bool>,
    global_suppliers: RefCell<Vec<Rc<dyn CascadingValueSupplier>>>,
    mode_resolvers: RefCell<Vec<Box<dyn ResolveComponentRenderMode>>>,
}

impl RendererInner {
    pub(crate) fn component_state(&self, component_id: ComponentId) -> Option<Rc<ComponentState>> {
        self.components.borrow().get(&component_id).cloned()
    }

    pub(crate) fn global_supplier_for(
        &self,
        info: &CascadingParameterInfo,
    ) -> Option<Rc<dyn CascadingValueSupplier>> {
        self.global_suppliers
            .borrow()
            .iter()
            .find(|supplier| supplier.can_supply(info))
            .cloned()
    }

    fn register_component(
        &self,
        component: Box<dyn Component>,
        parent: Option<&Rc<ComponentState>>,
    ) -> Rc<ComponentState> {
        let component_id = self.next_component_id.get();
        self.next_component_id.set(component_id + 1);
        let state = Rc::new(ComponentState::new(
            component_id,
            self.self_weak.clone(),
            component,
            parent.map(Rc::downgrade),
        ));
        self.components.borrow_mut().insert(component_id, state.clone());
        let handle = RenderHandle {
            inner: self.self_weak.clone(),
            component_id,
        };
        state.component().borrow_mut().attach(handle);
        log::trace!("component {component_id} registered");
        state
    }

    /// Bind parameters onto a component and run the associated lifecycle
    /// methods. Returns synchronous faults to the caller; pending lifecycle
    /// outcomes queue a second render for when they settle.
    fn set_parameters(
        self: &Rc<Self>,
        state: &Rc<ComponentState>,
        parameters: ParameterCollection,
    ) -> Result<(), RenderError> {
        state.set_latest_parameters(parameters.clone());
        let cascading = resolve_cascading_parameters(self, state)?;
        {
            let component = state.component();
            let mut component = component.borrow_mut();
            let view = ParameterView::new(parameters.as_slice(), &cascading);
            self.binder.bind(component.as_mut(), &view)?;
        }
        if state.status() == ComponentStatus::Unattached {
            state.set_status(ComponentStatus::Active);
        }
        if !state.is_initialized() {
            state.mark_initialized();
            let outcome = state.component().borrow_mut().on_initialized();
            self.observe_lifecycle(state, outcome)?;
        }
        let outcome = state.component().borrow_mut().on_parameters_set();
        self.observe_lifecycle(state, outcome)?;
        self.enqueue_render(state);
        Ok(())
    }

    /// Parameter delivery for callers that cannot propagate: cascading
    /// refreshes and the diff's child updates. Faults route to the nearest
    /// boundary.
    pub(crate) fn deliver_parameters(
        self: &Rc<Self>,
        state: &Rc<ComponentState>,
        parameters: ParameterCollection,
    ) {
        if let Err(err) = self.set_parameters(state, parameters) {
            self.handle_error(Some(state), err);
        }
        self.process_render_queue();
    }

    /// For initialization-phase lifecycle outcomes: a fault, including
    /// cancellation, is an error. A pending outcome lets the current render
    /// proceed and schedules another when it settles.
    fn observe_lifecycle(
        self: &Rc<Self>,
        state: &Rc<ComponentState>,
        outcome: LifecycleOutcome,
    ) -> Result<(), RenderError> {
        match outcome {
            LifecycleOutcome::Done(Ok(())) => Ok(()),
            LifecycleOutcome::Done(Err(fault)) => Err(RenderError::Lifecycle(fault)),
            LifecycleOutcome::Pending(operation) => {
                let inner = self.self_weak.clone();
                let weak_state = Rc::downgrade(state);
                operation.on_settled(move |result| {
                    let Some(inner) = inner.upgrade() else { return };
                    let Some(state) = weak_state.upgrade() else { return };
                    match result {
                        Ok(()) => inner.enqueue_render(&state),
                        Err(fault) => {
                            inner.handle_error(Some(&state), RenderError::Lifecycle(fault.clone()));
                        }
                    }
                    inner.process_render_queue();
                });
                Ok(())
            }
        }
    }

    fn enqueue_render(&self, state: &Rc<ComponentState>) {
        match state.status() {
            ComponentStatus::PendingRender
            | ComponentStatus::Disposing
            | ComponentStatus::Disposed => return,
            ComponentStatus::Unattached | ComponentStatus::Active => {}
        }
        state.set_status(ComponentStatus::PendingRender);
        self.render_queue
            .borrow_mut()
            .push_back(state.component_id());
    }

    /// Route an error to the nearest ancestor boundary, or to the sink when
    /// nothing absorbs it. The boundary's subtree is cleared first so the
    /// failed content is disposed before fallback content renders.
    pub(crate) fn handle_error(
        self: &Rc<Self>,
        source: Option<&Rc<ComponentState>>,
        error: RenderError,
    ) {
        if !error.is_boundary_routable() {
            self.sink.unhandled_error(&error);
            return;
        }
        let mut cursor = source.and_then(|state| state.parent());
        while let Some(ancestor) = cursor {
            let is_boundary = ancestor
                .component()
                .borrow_mut()
                .as_error_boundary()
                .is_some();
            if is_boundary {
                ancestor.force_empty_render();
                self.enqueue_render(&ancestor);
                let component = ancestor.component();
                let mut component = component.borrow_mut();
                if let Some(boundary) = component.as_error_boundary() {
                    boundary.handle_error(&error);
                }
                return;
            }
            cursor = ancestor.parent();
        }
        self.sink.unhandled_error(&error);
    }

    /// Run render passes until the queue and the disposal queue are both
    /// empty. Re-entrant calls while a batch is being built are no-ops; the
    /// pass in progress picks up whatever they queued.
    pub(crate) fn process_render_queue(self: &Rc<Self>) {
        if self.batch_in_progress.get() {
            return;
        }
        loop {
            let idle = self.render_queue.borrow().is_empty()
                && !self.batch_builder.borrow().has_pending_disposals();
            if idle {
                return;
            }
            self.batch_in_progress.set(true);
            self.render_pass();
            self.batch_in_progress.set(false);
        }
    }

    fn render_pass(self: &Rc<Self>) {
        let mut after_render: Vec<(Weak<ComponentState>, bool)> = Vec::new();
        let mut disposal_faults: Vec<LifecycleFault> = Vec::new();

        loop {
            // Disposals queued by the previous render happen before the
            // next one runs: a still-queued component whose parent just
            // removed it must not render into this batch.
            if self.batch_builder.borrow().has_pending_disposals() {
                self.drain_disposal_queue(&mut disposal_faults);
            }
            let next = self.render_queue.borrow_mut().pop_front();
            let Some(component_id) = next else { break };
            let Some(state) = self.component_state(component_id) else {
                continue;
            };
            if matches!(
                state.status(),
                ComponentStatus::Disposing | ComponentStatus::Disposed
            ) {
                continue;
            }
            if let Err(err) = self.render_component(&state, &mut after_render) {
                if err.is_boundary_routable() {
                    self.handle_error(Some(&state), err);
                } else {
                    self.abort_pass(err);
                    return;
                }
            }
        }

        if !disposal_faults.is_empty() {
            self.sink.unhandled_error(&RenderError::Disposal(DisposalError {
                faults: disposal_faults,
            }));
        }

        let batch = self.batch_builder.borrow_mut().finish();
        if batch.is_empty() {
            if !after_render.is_empty() {
                self.notify_after_render(&after_render);
            }
            return;
        }

        log::debug!(
            "committing batch: {} updated component(s), {} disposed",
            batch.updated_components.len(),
            batch.disposed_component_ids.len()
        );
        match self.sink.update_display(&batch) {
            CommitOutcome::Committed => {
                self.events.remove_ids(&batch.disposed_event_handler_ids);
                self.notify_after_render(&after_render);
            }
            CommitOutcome::Deferred(operation) => {
                // The batch hands over now; handler retirement and
                // after-render notifications wait for the acknowledgement.
                let inner = self.self_weak.clone();
                let handler_ids = batch.disposed_event_handler_ids.clone();
                operation.on_settled(move |result| {
                    let Some(inner) = inner.upgrade() else { return };
                    inner.events.remove_ids(&handler_ids);
                    match result {
                        Ok(()) => {
                            let was_in_progress = inner.batch_in_progress.replace(true);
                            inner.notify_after_render(&after_render);
                            inner.batch_in_progress.set(was_in_progress);
                        }
                        Err(fault) if fault.is_cancellation() => {}
                        Err(fault) => {
                            inner
                                .sink
                                .unhandled_error(&RenderError::Lifecycle(fault.clone()));
                        }
                    }
                    inner.process_render_queue();
                });
            }
        }
    }

    fn render_component(
        self: &Rc<Self>,
        state: &Rc<ComponentState>,
        after_render: &mut Vec<(Weak<ComponentState>, bool)>,
    ) -> Result<(), RenderError> {
        state.set_status(ComponentStatus::Active);

        let forced_empty = state.take_force_empty_render();
        let mut new_frames = if forced_empty {
            Vec::new()
        } else {
            let mut builder = TreeBuilder::new();
            {
                let component = state.component();
                let mut component = component.borrow_mut();
                component.render(&mut builder)?;
            }
            builder.finish()?
        };

        let old_frames = state.take_frames();
        let diff = {
            let mut batch = self.batch_builder.borrow_mut();
            match compute_diff(
                &**self,
                &mut batch,
                state.component_id(),
                &old_frames,
                &mut new_frames,
            ) {
                Ok(diff) => diff,
                Err(err) => {
                    drop(batch);
                    // Keep the committed tree so a later render still diffs
                    // against what the display layer has.
                    state.set_frames(old_frames);
                    return Err(err);
                }
            }
        };

        state.set_frames(new_frames);
        self.batch_builder
            .borrow_mut()
            .updated_components
            .push(diff);

        let first_render = !state.has_rendered();
        state.mark_rendered();
        after_render.push((Rc::downgrade(state), first_render));

        // A forced-empty render is transitional: it clears a boundary's
        // failed subtree within this batch. Queue the follow-up render that
        // shows whatever the boundary produces now.
        if forced_empty {
            self.enqueue_render(state);
        }
        Ok(())
    }

    fn abort_pass(&self, error: RenderError) {
        self.batch_builder.borrow_mut().clear();
        let drained: Vec<ComponentId> = self.render_queue.borrow_mut().drain(..).collect();
        for component_id in drained {
            if let Some(state) = self.component_state(component_id) {
                if state.status() == ComponentStatus::PendingRender {
                    state.set_status(ComponentStatus::Active);
                }
            }
        }
        log::debug!("render pass aborted: {error}");
        self.sink.unhandled_error(&error);
    }

    fn drain_disposal_queue(self: &Rc<Self>, faults: &mut Vec<LifecycleFault>) {
        loop {
            let next = self
                .batch_builder
                .borrow_mut()
                .component_disposal_queue
                .pop_front();
            let Some(component_id) = next else { break };
            let removed = self.components.borrow_mut().remove(&component_id);
            let Some(state) = removed else { continue };
            if state.status() == ComponentStatus::Disposed {
                continue;
            }
            state.set_status(ComponentStatus::Disposing);
            log::trace!("disposing component {component_id}");

            for subscription in state.take_subscriptions() {
                if !subscription.was_fixed {
                    subscription.supplier.unsubscribe(&state, &subscription.info);
                }
            }

            // Disposing the frames queues descendants, so the loop keeps
            // going until the whole subtree is gone.
            let frames = state.take_frames();
            {
                let mut batch = self.batch_builder.borrow_mut();
                dispose_frames(&mut batch, component_id, &frames);
                batch.disposed_component_ids.push(component_id);
            }

            let outcome = state.component().borrow_mut().dispose();
            self.observe_disposal(outcome, faults);
            state.set_status(ComponentStatus::Disposed);
        }
    }

    /// Disposal faults never route to boundaries: synchronous ones are
    /// aggregated per pass, late-settling ones go straight to the sink.
    fn observe_disposal(&self, outcome: LifecycleOutcome, faults: &mut Vec<LifecycleFault>) {
        match outcome {
            LifecycleOutcome::Done(Ok(())) => {}
            LifecycleOutcome::Done(Err(fault)) => {
                if !fault.is_cancellation() {
                    faults.push(fault);
                }
            }
            LifecycleOutcome::Pending(operation) => {
                let inner = self.self_weak.clone();
                operation.on_settled(move |result| {
                    if let Err(fault) = result {
                        if !fault.is_cancellation() {
                            if let Some(inner) = inner.upgrade() {
                                inner
                                    .sink
                                    .unhandled_error(&RenderError::Lifecycle(fault.clone()));
                            }
                        }
                    }
                });
            }
        }
    }

    fn notify_after_render(self: &Rc<Self>, entries: &[(Weak<ComponentState>, bool)]) {
        for (weak_state, first_render) in entries {
            let Some(state) = weak_state.upgrade() else {
                continue;
            };
            if matches!(
                state.status(),
                ComponentStatus::Disposing | ComponentStatus::Disposed
            ) {
                continue;
            }
            let outcome = state.component().borrow_mut().on_after_render(*first_render);
            match outcome {
                LifecycleOutcome::Done(Ok(())) => {}
                LifecycleOutcome::Done(Err(fault)) => {
                    // Cancellation after a render is benign.
                    if !fault.is_cancellation() {
                        self.handle_error(Some(&state), RenderError::Lifecycle(fault));
                    }
                }
                LifecycleOutcome::Pending(operation) => {
                    let inner = self.self_weak.clone();
                    let weak_state = Rc::downgrade(&state);
                    operation.on_settled(move |result| {
                        let Some(inner) = inner.upgrade() else { return };
                        if let Err(fault) = result {
                            if !fault.is_cancellation() {
                                if let Some(state) = weak_state.upgrade() {
                                    inner.handle_error(
                                        Some(&state),
                                        RenderError::Lifecycle(fault.clone()),
                                    );
                                }
                            }
                        }
                        inner.process_render_queue();
                    });
                }
            }
        }
    }

    fn dispatch_event(
        self: &Rc<Self>,
        handler_id: EventHandlerId,
        args: &EventArgs,
    ) -> Result<DispatchStatus, DispatchError> {
        assert!(
            !self.batch_in_progress.get(),
            "events cannot be dispatched while a render batch is being built"
        );
        let binding = self
            .events
            .get(handler_id)
            .ok_or(DispatchError::UnknownHandler { handler_id })?;
        log::trace!("dispatching event to handler {handler_id}");

        // The batch latch is held while the handler runs, so every render
        // it requests queues up and commits as one batch afterwards.
        self.batch_in_progress.set(true);
        let outcome = binding.callback.invoke(args);
        self.batch_in_progress.set(false);
        let status = match outcome {
            LifecycleOutcome::Done(Ok(())) => DispatchStatus::Completed,
            LifecycleOutcome::Done(Err(fault)) => {
                if !fault.is_cancellation() {
                    self.report_owner_fault(binding.owner, fault);
                }
                DispatchStatus::Completed
            }
            LifecycleOutcome::Pending(operation) => {
                let inner = self.self_weak.clone();
                let owner = binding.owner;
                let token = operation.clone();
                operation.on_settled(move |result| {
                    let Some(inner) = inner.upgrade() else { return };
                    if let Err(fault) = result {
                        if !fault.is_cancellation() {
                            inner.report_owner_fault(owner, fault.clone());
                        }
                    }
                    inner.process_render_queue();
                });
                DispatchStatus::Pending(token)
            }
        };

        self.process_render_queue();
        Ok(status)
    }

    fn report_owner_fault(self: &Rc<Self>, owner: ComponentId, fault: LifecycleFault) {
        let error = RenderError::Lifecycle(fault);
        match self.component_state(owner) {
            Some(state) => self.handle_error(Some(&state), error),
            None => self.sink.unhandled_error(&error),
        }
    }

    fn dispose_all(&self) {
        let states: Vec<Rc<ComponentState>> = self
            .components
            .borrow_mut()
            .drain()
            .map(|(_, state)| state)
            .collect();
        let mut faults = Vec::new();
        for state in states {
            if state.status() == ComponentStatus::Disposed {
                continue;
            }
            state.set_status(ComponentStatus::Disposing);
            for subscription in state.take_subscriptions() {
                if !subscription.was_fixed {
                    subscription.supplier.unsubscribe(&state, &subscription.info);
                }
            }
            let outcome = state.component().borrow_mut().dispose();
            self.observe_disposal(outcome, &mut faults);
            state.set_status(ComponentStatus::Disposed);
        }
        self.render_queue.borrow_mut().clear();
        self.batch_builder.borrow_mut().clear();
        self.events.clear();
        if !faults.is_empty() {
            self.sink
                .unhandled_error(&RenderError::Disposal(DisposalError { faults }));
        }
    }
}

impl DiffEnv for RendererInner {
    fn instantiate_component(
        &self,
        descriptor: &ComponentDescriptor,
        render_mode: Option<RenderMode>,
        parent: ComponentId,
    ) -> Result<ComponentId, RenderError> {
        let component = match render_mode {
            None => descriptor.instantiate(),
            Some(mode) => {
                let resolvers = self.mode_resolvers.borrow();
                let resolved = resolvers
                    .iter()
                    .find_map(|resolver| resolver.resolve(descriptor, mode));
                match resolved {
                    Some(component) => component,
                    None => {
                        return Err(RenderError::UnsupportedRenderMode {
                            type_name: descriptor.type_name(),
                            mode,
                        })
                    }
                }
            }
        };
        let parent_state = self.component_state(parent);
        let state = self.register_component(component, parent_state.as_ref());
        Ok(state.component_id())
    }

    fn deliver_initial_parameters(&self, component_id: ComponentId, parameters: ParameterCollection) {
        self.update_parameters(component_id, parameters);
    }

    fn update_parameters(&self, component_id: ComponentId, parameters: ParameterCollection) {
        let Some(inner) = self.self_weak.upgrade() else {
            return;
        };
        let Some(state) = inner.component_state(component_id) else {
            return;
        };
        if let Err(err) = inner.set_parameters(&state, parameters) {
            inner.handle_error(Some(&state), err);
        }
    }

    fn assign_event_handler(&self, callback: &EventCallback, owner: ComponentId) -> EventHandlerId {
        self.events.assign(callback.clone(), owner)
    }

    fn next_element_reference_id(&self) -> u64 {
        let id = self.element_reference_ids.get();
        self.element_reference_ids.set(id + 1);
        id
    }
}
