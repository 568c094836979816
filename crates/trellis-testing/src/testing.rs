//! Sinks, harness and small stock components for exercising a renderer in
//! tests. Panics freely on misuse; this crate never ships in production.

use std::cell::RefCell;
use std::rc::Rc;

use trellis_core::batch::RenderBatch;
use trellis_core::builder::TreeBuilder;
use trellis_core::component::Component;
use trellis_core::edits::Edit;
use trellis_core::errors::{DispatchError, ParameterError, RenderError};
use trellis_core::frames::{AttributeValue, EventArgs, Frame};
use trellis_core::operation::Operation;
use trellis_core::params::{ParameterCollection, ParameterView};
use trellis_core::renderer::{
    CommitOutcome, DispatchStatus, Renderer, RenderSink,
};
use trellis_core::{ComponentId, EventHandlerId};

/// A sink that applies every batch synchronously and keeps a copy of
/// everything it sees.
#[derive(Clone, Default)]
pub struct CollectingSink {
    batches: Rc<RefCell<Vec<RenderBatch>>>,
    errors: Rc<RefCell<Vec<String>>>,
}

impl CollectingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn batches(&self) -> Vec<RenderBatch> {
        self.batches.borrow().clone()
    }

    pub fn batch_count(&self) -> usize {
        self.batches.borrow().len()
    }

    pub fn last_batch(&self) -> RenderBatch {
        self.batches
            .borrow()
            .last()
            .cloned()
            .unwrap_or_else(|| panic!("no batch has been committed"))
    }

    pub fn errors(&self) -> Vec<String> {
        self.errors.borrow().clone()
    }
}

impl RenderSink for CollectingSink {
    fn update_display(&self, batch: &RenderBatch) -> CommitOutcome {
        self.batches.borrow_mut().push(batch.clone());
        CommitOutcome::Committed
    }

    fn unhandled_error(&self, error: &RenderError) {
        self.errors.borrow_mut().push(error.to_string());
    }
}

/// A sink that defers every commit, handing control of the acknowledgement
/// to the test.
#[derive(Clone, Default)]
pub struct DeferredSink {
    batches: Rc<RefCell<Vec<RenderBatch>>>,
    pending: Rc<RefCell<Vec<Operation>>>,
    errors: Rc<RefCell<Vec<String>>>,
}

impl DeferredSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn batches(&self) -> Vec<RenderBatch> {
        self.batches.borrow().clone()
    }

    pub fn errors(&self) -> Vec<String> {
        self.errors.borrow().clone()
    }

    pub fn pending_count(&self) -> usize {
        self.pending.borrow().len()
    }

    /// Acknowledge the oldest outstanding batch.
    pub fn acknowledge_next(&self) {
        let operation = self.take_next();
        operation.complete();
    }

    /// Cancel the oldest outstanding batch's acknowledgement.
    pub fn cancel_next(&self) {
        let operation = self.take_next();
        operation.cancel();
    }

    fn take_next(&self) -> Operation {
        let mut pending = self.pending.borrow_mut();
        if pending.is_empty() {
            panic!("no batch commit is outstanding");
        }
        pending.remove(0)
    }
}

impl RenderSink for DeferredSink {
    fn update_display(&self, batch: &RenderBatch) -> CommitOutcome {
        self.batches.borrow_mut().push(batch.clone());
        let operation = Operation::new();
        self.pending.borrow_mut().push(operation.clone());
        CommitOutcome::Deferred(operation)
    }

    fn unhandled_error(&self, error: &RenderError) {
        self.errors.borrow_mut().push(error.to_string());
    }
}

/// One root component wired to a collecting sink.
pub struct TestHarness {
    renderer: Renderer,
    sink: CollectingSink,
    root_id: ComponentId,
}

impl TestHarness {
    pub fn new(component: Box<dyn Component>) -> Self {
        let sink = CollectingSink::new();
        let renderer = Renderer::new(sink.clone());
        let root_id = renderer.attach_root(component);
        Self {
            renderer,
            sink,
            root_id,
        }
    }

    pub fn renderer(&self) -> &Renderer {
        &self.renderer
    }

    pub fn sink(&self) -> &CollectingSink {
        &self.sink
    }

    pub fn root_id(&self) -> ComponentId {
        self.root_id
    }

    pub fn render(&self, parameters: ParameterCollection) -> Result<(), RenderError> {
        self.renderer.render_root(self.root_id, parameters)
    }

    /// Render with no parameters; panics on failure.
    pub fn render_empty(&self) {
        if let Err(err) = self.render(ParameterCollection::new()) {
            panic!("render failed: {err}");
        }
    }

    pub fn dispatch(
        &self,
        handler_id: EventHandlerId,
        args: &EventArgs,
    ) -> Result<DispatchStatus, DispatchError> {
        self.renderer.dispatch_event(handler_id, args)
    }

    pub fn last_batch(&self) -> RenderBatch {
        self.sink.last_batch()
    }

    pub fn batch_count(&self) -> usize {
        self.sink.batch_count()
    }

    /// The committed frames of any live component.
    pub fn frames_of(&self, component_id: ComponentId) -> Vec<Frame> {
        match self.renderer.component_state(component_id) {
            Some(state) => state.with_frames(|frames| frames.to_vec()),
            None => panic!("component {component_id} is not registered"),
        }
    }

    pub fn root_frames(&self) -> Vec<Frame> {
        self.frames_of(self.root_id)
    }
}

/// Edit script for one component, pulled out of a batch.
pub fn edits_for(batch: &RenderBatch, component_id: ComponentId) -> Vec<Edit> {
    batch
        .updated_components
        .iter()
        .find(|diff| diff.component_id == component_id)
        .map(|diff| diff.edits.clone())
        .unwrap_or_else(|| panic!("batch has no diff for component {component_id}"))
}

/// Compact edit-script shape for assertions.
pub fn edit_kinds(edits: &[Edit]) -> Vec<&'static str> {
    edits
        .iter()
        .map(|edit| match edit {
            Edit::PrependFrame { .. } => "prepend",
            Edit::RemoveFrame { .. } => "remove",
            Edit::SetAttribute { .. } => "set-attribute",
            Edit::RemoveAttribute { .. } => "remove-attribute",
            Edit::UpdateText { .. } => "update-text",
            Edit::UpdateMarkup { .. } => "update-markup",
            Edit::StepIn { .. } => "step-in",
            Edit::StepOut => "step-out",
            Edit::PermutationListEntry { .. } => "permute",
            Edit::PermutationListEnd => "permute-end",
        })
        .collect()
}

/// Stock component: renders its `text` parameter as a single text frame.
#[derive(Default)]
pub struct Label {
    text: String,
}

impl Component for Label {
    fn apply_parameters(&mut self, parameters: &ParameterView<'_>) -> Result<(), ParameterError> {
        self.text = parameters.require_str("text")?.to_owned();
        Ok(())
    }

    fn render(&mut self, builder: &mut TreeBuilder) -> Result<(), RenderError> {
        builder.add_text(0, self.text.clone());
        Ok(())
    }
}

/// Shorthand for a one-parameter text collection.
pub fn text_parameters(name: &str, value: &str) -> ParameterCollection {
    ParameterCollection::new().with(name, AttributeValue::text(value))
}
