use std::cell::{Cell, RefCell};
use std::rc::Rc;

use trellis_core::{
    AttributeValue, Component, ComponentDescriptor, DispatchError, DispatchStatus, ErrorBoundary,
    EventArgs, EventCallback, LifecycleFault, LifecycleOutcome, Operation, ParameterCollection,
    ParameterError, ParameterView, RenderError, RenderHandle, Renderer, TreeBuilder,
};
use trellis_testing::{edit_kinds, edits_for, text_parameters, DeferredSink, Label, TestHarness};

#[test]
fn initial_render_commits_one_batch() {
    let harness = TestHarness::new(Box::new(Label::default()));
    harness.render(text_parameters("text", "hello")).unwrap();

    assert_eq!(harness.batch_count(), 1);
    let edits = edits_for(&harness.last_batch(), harness.root_id());
    assert_eq!(edit_kinds(&edits), vec!["prepend"]);
    assert_eq!(harness.root_frames()[0].text_content(), Some("hello"));
}

#[test]
fn changed_parameters_produce_an_update() {
    let harness = TestHarness::new(Box::new(Label::default()));
    harness.render(text_parameters("text", "hello")).unwrap();
    harness.render(text_parameters("text", "goodbye")).unwrap();

    assert_eq!(harness.batch_count(), 2);
    let edits = edits_for(&harness.last_batch(), harness.root_id());
    assert_eq!(edit_kinds(&edits), vec!["update-text"]);
    assert_eq!(harness.root_frames()[0].text_content(), Some("goodbye"));
}

#[test]
fn render_root_rejects_unknown_components() {
    let harness = TestHarness::new(Box::new(Label::default()));
    let err = harness
        .renderer()
        .render_root(99, ParameterCollection::new())
        .unwrap_err();
    assert!(matches!(
        err,
        RenderError::UnknownComponent { component_id: 99 }
    ));
}

struct Recorder {
    log: Rc<RefCell<Vec<String>>>,
}

impl Recorder {
    fn note(&self, entry: impl Into<String>) {
        self.log.borrow_mut().push(entry.into());
    }
}

impl Component for Recorder {
    fn attach(&mut self, _handle: RenderHandle) {
        self.note("attach");
    }

    fn apply_parameters(&mut self, _: &ParameterView<'_>) -> Result<(), ParameterError> {
        self.note("bind");
        Ok(())
    }

    fn on_initialized(&mut self) -> LifecycleOutcome {
        self.note("init");
        LifecycleOutcome::done()
    }

    fn on_parameters_set(&mut self) -> LifecycleOutcome {
        self.note("params");
        LifecycleOutcome::done()
    }

    fn render(&mut self, builder: &mut TreeBuilder) -> Result<(), RenderError> {
        self.note("render");
        builder.add_text(0, "recorded");
        Ok(())
    }

    fn on_after_render(&mut self, first_render: bool) -> LifecycleOutcome {
        self.note(format!("after-render first={first_render}"));
        LifecycleOutcome::done()
    }
}

#[test]
fn lifecycle_methods_run_in_order() {
    let log = Rc::new(RefCell::new(Vec::new()));
    let harness = TestHarness::new(Box::new(Recorder { log: log.clone() }));
    harness.render_empty();
    harness.render_empty();

    assert_eq!(
        *log.borrow(),
        vec![
            "attach",
            "bind",
            "init",
            "params",
            "render",
            "after-render first=true",
            "bind",
            "params",
            "render",
            "after-render first=false",
        ]
    );
}

#[test]
fn request_render_runs_another_pass() {
    let harness = TestHarness::new(Box::new(Label::default()));
    harness.render(text_parameters("text", "same")).unwrap();

    harness.renderer().render_handle(harness.root_id()).request_render();

    // Same output, so the diff is empty, but the pass still commits.
    assert_eq!(harness.batch_count(), 2);
    let edits = edits_for(&harness.last_batch(), harness.root_id());
    assert!(edits.is_empty());
}

#[derive(Default)]
struct Clicker {
    clicks: Rc<Cell<u32>>,
    callback: Option<EventCallback>,
    handle: Option<RenderHandle>,
}

impl Component for Clicker {
    fn attach(&mut self, handle: RenderHandle) {
        self.handle = Some(handle);
    }

    fn apply_parameters(&mut self, _: &ParameterView<'_>) -> Result<(), ParameterError> {
        Ok(())
    }

    fn on_initialized(&mut self) -> LifecycleOutcome {
        let clicks = self.clicks.clone();
        let handle = self.handle.clone();
        self.callback = Some(EventCallback::from_fn(move |_| {
            clicks.set(clicks.get() + 1);
            if let Some(handle) = &handle {
                handle.request_render();
            }
        }));
        LifecycleOutcome::done()
    }

    fn render(&mut self, builder: &mut TreeBuilder) -> Result<(), RenderError> {
        builder.open_element(0, "button");
        if let Some(callback) = &self.callback {
            builder.add_attribute(1, "onclick", AttributeValue::Callback(callback.clone()))?;
        }
        builder.add_text(2, format!("clicks: {}", self.clicks.get()));
        builder.close_element()?;
        Ok(())
    }
}

#[test]
fn dispatching_an_event_invokes_the_handler_and_rerenders() {
    let clicks = Rc::new(Cell::new(0));
    let harness = TestHarness::new(Box::new(Clicker {
        clicks: clicks.clone(),
        ..Clicker::default()
    }));
    harness.render_empty();

    let handler_id = harness.root_frames()[1].event_handler_id();
    assert_eq!(handler_id, 1);

    let status = harness.dispatch(handler_id, &EventArgs::empty()).unwrap();
    assert!(matches!(status, DispatchStatus::Completed));
    assert_eq!(clicks.get(), 1);

    // The callback's render request ran synchronously.
    assert_eq!(harness.batch_count(), 2);
    let edits = edits_for(&harness.last_batch(), harness.root_id());
    assert_eq!(edit_kinds(&edits), vec!["step-in", "update-text", "step-out"]);

    // A stable callback keeps its handler registration.
    assert_eq!(harness.root_frames()[1].event_handler_id(), 1);
    assert_eq!(harness.renderer().event_handler_count(), 1);
}

/// Its click handler requests a re-render of every handle in `targets`.
struct FanOut {
    targets: Rc<RefCell<Vec<RenderHandle>>>,
}

impl Component for FanOut {
    fn apply_parameters(&mut self, _: &ParameterView<'_>) -> Result<(), ParameterError> {
        Ok(())
    }

    fn render(&mut self, builder: &mut TreeBuilder) -> Result<(), RenderError> {
        let targets = self.targets.clone();
        builder.open_element(0, "button");
        builder.add_attribute(
            1,
            "onclick",
            AttributeValue::Callback(EventCallback::from_fn(move |_| {
                for handle in targets.borrow().iter() {
                    handle.request_render();
                }
            })),
        )?;
        builder.close_element()?;
        Ok(())
    }
}

#[test]
fn renders_requested_by_one_handler_commit_as_one_batch() {
    let targets = Rc::new(RefCell::new(Vec::new()));
    let harness = TestHarness::new(Box::new(FanOut {
        targets: targets.clone(),
    }));
    harness.render_empty();

    let renderer = harness.renderer();
    let left = renderer.attach_root(Box::new(Label::default()));
    renderer.render_root(left, text_parameters("text", "left")).unwrap();
    let right = renderer.attach_root(Box::new(Label::default()));
    renderer.render_root(right, text_parameters("text", "right")).unwrap();
    targets.borrow_mut().push(renderer.render_handle(left));
    targets.borrow_mut().push(renderer.render_handle(right));
    assert_eq!(harness.batch_count(), 3);

    harness.dispatch(1, &EventArgs::empty()).unwrap();

    // Both requested renders landed in a single batch.
    assert_eq!(harness.batch_count(), 4);
    let rendered: Vec<_> = harness
        .last_batch()
        .updated_components
        .iter()
        .map(|diff| diff.component_id)
        .collect();
    assert_eq!(rendered, vec![left, right]);
}

#[test]
fn unknown_handlers_are_rejected() {
    let harness = TestHarness::new(Box::new(Label::default()));
    harness.render(text_parameters("text", "x")).unwrap();

    let err = harness.dispatch(42, &EventArgs::empty()).unwrap_err();
    assert_eq!(err, DispatchError::UnknownHandler { handler_id: 42 });
}

struct FaultyButton;

impl Component for FaultyButton {
    fn apply_parameters(&mut self, _: &ParameterView<'_>) -> Result<(), ParameterError> {
        Ok(())
    }

    fn render(&mut self, builder: &mut TreeBuilder) -> Result<(), RenderError> {
        builder.open_element(0, "button");
        builder.add_attribute(
            1,
            "onclick",
            AttributeValue::Callback(EventCallback::new(|_| {
                LifecycleOutcome::failed(LifecycleFault::message("button exploded"))
            })),
        )?;
        builder.close_element()?;
        Ok(())
    }
}

#[test]
fn handler_faults_without_a_boundary_reach_the_sink() {
    let harness = TestHarness::new(Box::new(FaultyButton));
    harness.render_empty();

    let status = harness.dispatch(1, &EventArgs::empty()).unwrap();
    assert!(matches!(status, DispatchStatus::Completed));

    let errors = harness.sink().errors();
    assert_eq!(errors.len(), 1);
    assert!(errors[0].contains("button exploded"));
}

struct PendingButton {
    operation: Operation,
}

impl Component for PendingButton {
    fn apply_parameters(&mut self, _: &ParameterView<'_>) -> Result<(), ParameterError> {
        Ok(())
    }

    fn render(&mut self, builder: &mut TreeBuilder) -> Result<(), RenderError> {
        let operation = self.operation.clone();
        builder.open_element(0, "button");
        builder.add_attribute(
            1,
            "onclick",
            AttributeValue::Callback(EventCallback::new(move |_| {
                LifecycleOutcome::pending(operation.clone())
            })),
        )?;
        builder.close_element()?;
        Ok(())
    }
}

#[test]
fn pending_handlers_hand_back_their_operation() {
    let operation = Operation::new();
    let harness = TestHarness::new(Box::new(PendingButton {
        operation: operation.clone(),
    }));
    harness.render_empty();

    let status = harness.dispatch(1, &EventArgs::empty()).unwrap();
    let token = match status {
        DispatchStatus::Pending(token) => token,
        DispatchStatus::Completed => panic!("expected a pending dispatch"),
    };
    assert!(!token.is_settled());

    operation.complete();
    assert!(token.is_settled());
    assert!(harness.sink().errors().is_empty());
}

struct SlowSettle {
    operation: Operation,
    renders: Cell<u32>,
}

impl Component for SlowSettle {
    fn apply_parameters(&mut self, _: &ParameterView<'_>) -> Result<(), ParameterError> {
        Ok(())
    }

    fn on_parameters_set(&mut self) -> LifecycleOutcome {
        LifecycleOutcome::pending(self.operation.clone())
    }

    fn render(&mut self, builder: &mut TreeBuilder) -> Result<(), RenderError> {
        self.renders.set(self.renders.get() + 1);
        builder.add_text(0, format!("render {}", self.renders.get()));
        Ok(())
    }
}

#[test]
fn pending_lifecycle_outcome_renders_now_and_again_on_settle() {
    let operation = Operation::new();
    let harness = TestHarness::new(Box::new(SlowSettle {
        operation: operation.clone(),
        renders: Cell::new(0),
    }));
    harness.render_empty();
    assert_eq!(harness.batch_count(), 1);
    assert_eq!(harness.root_frames()[0].text_content(), Some("render 1"));

    operation.complete();
    assert_eq!(harness.batch_count(), 2);
    assert_eq!(harness.root_frames()[0].text_content(), Some("render 2"));
}

#[derive(Default)]
struct FailsToInitialize;

impl Component for FailsToInitialize {
    fn apply_parameters(&mut self, _: &ParameterView<'_>) -> Result<(), ParameterError> {
        Ok(())
    }

    fn on_initialized(&mut self) -> LifecycleOutcome {
        LifecycleOutcome::failed(LifecycleFault::message("init exploded"))
    }

    fn render(&mut self, _: &mut TreeBuilder) -> Result<(), RenderError> {
        Ok(())
    }
}

#[test]
fn root_initialization_faults_come_back_to_the_caller() {
    let harness = TestHarness::new(Box::new(FailsToInitialize));
    let err = harness.render(ParameterCollection::new()).unwrap_err();
    assert!(matches!(err, RenderError::Lifecycle(_)));
    assert_eq!(harness.batch_count(), 0);
}

struct BrokenTree;

impl Component for BrokenTree {
    fn apply_parameters(&mut self, _: &ParameterView<'_>) -> Result<(), ParameterError> {
        Ok(())
    }

    fn render(&mut self, builder: &mut TreeBuilder) -> Result<(), RenderError> {
        // No element is open, so this attribute is misplaced.
        builder.add_attribute(0, "class", AttributeValue::text("x"))?;
        Ok(())
    }
}

#[test]
fn structural_errors_abort_the_pass() {
    let harness = TestHarness::new(Box::new(BrokenTree));
    harness.render(ParameterCollection::new()).unwrap();

    assert_eq!(harness.batch_count(), 0);
    let errors = harness.sink().errors();
    assert_eq!(errors.len(), 1);
    assert!(errors[0].contains("attribute"));
}

struct Boundary {
    error: Option<String>,
}

impl Component for Boundary {
    fn apply_parameters(&mut self, _: &ParameterView<'_>) -> Result<(), ParameterError> {
        Ok(())
    }

    fn render(&mut self, builder: &mut TreeBuilder) -> Result<(), RenderError> {
        match &self.error {
            Some(message) => builder.add_text(0, format!("something went wrong: {message}")),
            None => {
                builder.open_component(1, ComponentDescriptor::of::<FailsToInitialize>());
                builder.close_component()?;
            }
        }
        Ok(())
    }

    fn as_error_boundary(&mut self) -> Option<&mut dyn ErrorBoundary> {
        Some(self)
    }
}

impl ErrorBoundary for Boundary {
    fn handle_error(&mut self, error: &RenderError) {
        self.error = Some(error.to_string());
    }
}

#[test]
fn boundaries_absorb_descendant_faults_and_render_fallback_content() {
    let harness = TestHarness::new(Box::new(Boundary { error: None }));
    harness.render_empty();

    // Everything happened in one pass: failed subtree in, cleared, fallback
    // rendered, child disposed.
    assert_eq!(harness.batch_count(), 1);
    assert!(harness.sink().errors().is_empty());

    let text = harness.root_frames()[0].text_content().map(str::to_owned);
    assert_eq!(
        text.as_deref(),
        Some("something went wrong: init exploded")
    );

    let batch = harness.last_batch();
    assert_eq!(batch.disposed_component_ids, vec![1]);
    assert!(harness.renderer().component_state(1).is_none());
}

#[test]
fn remove_root_disposes_the_component() {
    let harness = TestHarness::new(Box::new(Label::default()));
    harness.render(text_parameters("text", "bye")).unwrap();

    harness.renderer().remove_root(harness.root_id()).unwrap();

    assert_eq!(harness.batch_count(), 2);
    let batch = harness.last_batch();
    assert_eq!(batch.disposed_component_ids, vec![harness.root_id()]);
    assert!(harness
        .renderer()
        .component_state(harness.root_id())
        .is_none());

    let err = harness.renderer().remove_root(harness.root_id()).unwrap_err();
    assert!(matches!(err, RenderError::UnknownComponent { .. }));
}

/// Shows a `Label` child until its click handler hides it; the handler
/// also requests a render of every handle in `targets`.
struct HidingParent {
    show_child: Rc<Cell<bool>>,
    targets: Rc<RefCell<Vec<RenderHandle>>>,
}

impl Component for HidingParent {
    fn apply_parameters(&mut self, _: &ParameterView<'_>) -> Result<(), ParameterError> {
        Ok(())
    }

    fn render(&mut self, builder: &mut TreeBuilder) -> Result<(), RenderError> {
        let show = self.show_child.clone();
        let targets = self.targets.clone();
        builder.open_element(0, "section");
        builder.add_attribute(
            1,
            "onclick",
            AttributeValue::Callback(EventCallback::from_fn(move |_| {
                show.set(false);
                for handle in targets.borrow().iter() {
                    handle.request_render();
                }
            })),
        )?;
        builder.close_element()?;
        if self.show_child.get() {
            builder.open_component(2, ComponentDescriptor::of::<Label>());
            builder.add_attribute(3, "text", AttributeValue::text("inner"))?;
            builder.close_component()?;
        }
        Ok(())
    }
}

#[test]
fn a_child_removed_mid_pass_never_renders_into_the_batch() {
    let show_child = Rc::new(Cell::new(true));
    let targets = Rc::new(RefCell::new(Vec::new()));
    let harness = TestHarness::new(Box::new(HidingParent {
        show_child,
        targets: targets.clone(),
    }));
    harness.render_empty();

    // Queue order on dispatch: parent first, then the doomed child.
    targets
        .borrow_mut()
        .push(harness.renderer().render_handle(harness.root_id()));
    targets.borrow_mut().push(harness.renderer().render_handle(1));

    harness.dispatch(1, &EventArgs::empty()).unwrap();

    // The parent's diff removed the child, so the child was disposed
    // between the two renders and never contributed a diff of its own.
    assert_eq!(harness.batch_count(), 2);
    let batch = harness.last_batch();
    assert_eq!(batch.disposed_component_ids, vec![1]);
    let rendered: Vec<_> = batch
        .updated_components
        .iter()
        .map(|diff| diff.component_id)
        .collect();
    assert_eq!(rendered, vec![harness.root_id()]);
}

#[derive(Default)]
struct NoisyDisposal;

impl Component for NoisyDisposal {
    fn apply_parameters(&mut self, _: &ParameterView<'_>) -> Result<(), ParameterError> {
        Ok(())
    }

    fn render(&mut self, builder: &mut TreeBuilder) -> Result<(), RenderError> {
        builder.add_text(0, "noisy");
        Ok(())
    }

    fn dispose(&mut self) -> LifecycleOutcome {
        LifecycleOutcome::failed(LifecycleFault::message("cleanup failed"))
    }
}

#[test]
fn disposal_faults_are_aggregated_and_reported_once() {
    let harness = TestHarness::new(Box::new(NoisyDisposal));
    harness.render_empty();

    harness.renderer().dispose();

    let errors = harness.sink().errors();
    assert_eq!(errors.len(), 1);
    assert!(errors[0].contains("disposing"));
}

struct NoisyNest;

impl Component for NoisyNest {
    fn apply_parameters(&mut self, _: &ParameterView<'_>) -> Result<(), ParameterError> {
        Ok(())
    }

    fn render(&mut self, builder: &mut TreeBuilder) -> Result<(), RenderError> {
        for sequence in 0..3 {
            builder.open_component(sequence, ComponentDescriptor::of::<NoisyDisposal>());
            builder.close_component()?;
        }
        Ok(())
    }
}

#[test]
fn sibling_disposal_faults_aggregate_into_one_report() {
    let harness = TestHarness::new(Box::new(NoisyNest));
    harness.render_empty();

    harness.renderer().remove_root(harness.root_id()).unwrap();

    // Three children each failed to dispose; one aggregated report.
    let errors = harness.sink().errors();
    assert_eq!(errors.len(), 1);
    assert!(errors[0].contains("3 error(s)"));
    assert_eq!(harness.last_batch().disposed_component_ids, vec![0, 1, 2, 3]);
}

/// Mints a fresh callback on every render, so each re-render replaces the
/// previous handler registration.
#[derive(Default)]
struct FreshClicker;

impl Component for FreshClicker {
    fn apply_parameters(&mut self, _: &ParameterView<'_>) -> Result<(), ParameterError> {
        Ok(())
    }

    fn render(&mut self, builder: &mut TreeBuilder) -> Result<(), RenderError> {
        builder.open_element(0, "button");
        builder.add_attribute(
            1,
            "onclick",
            AttributeValue::Callback(EventCallback::from_fn(|_| {})),
        )?;
        builder.close_element()?;
        Ok(())
    }
}

#[test]
fn replaced_handlers_stay_dispatchable_until_the_commit_is_acknowledged() {
    let sink = DeferredSink::new();
    let renderer = Renderer::new(sink.clone());
    let root = renderer.attach_root(Box::new(FreshClicker));

    renderer.render_root(root, ParameterCollection::new()).unwrap();
    assert_eq!(sink.pending_count(), 1);
    sink.acknowledge_next();

    renderer.render_handle(root).request_render();
    assert_eq!(sink.batches().len(), 2);

    // Handler 1 was replaced by handler 2 but the display layer has not
    // applied the second batch yet, so both remain live.
    assert_eq!(renderer.event_handler_count(), 2);
    assert!(renderer.dispatch_event(1, &EventArgs::empty()).is_ok());

    sink.acknowledge_next();
    assert_eq!(renderer.event_handler_count(), 1);
    let err = renderer.dispatch_event(1, &EventArgs::empty()).unwrap_err();
    assert!(matches!(err, DispatchError::UnknownHandler { handler_id: 1 }));
    assert!(renderer.dispatch_event(2, &EventArgs::empty()).is_ok());
}

struct AfterRenderCounter {
    notifications: Rc<Cell<u32>>,
}

impl Component for AfterRenderCounter {
    fn apply_parameters(&mut self, _: &ParameterView<'_>) -> Result<(), ParameterError> {
        Ok(())
    }

    fn render(&mut self, builder: &mut TreeBuilder) -> Result<(), RenderError> {
        builder.add_text(0, "counted");
        Ok(())
    }

    fn on_after_render(&mut self, _first_render: bool) -> LifecycleOutcome {
        self.notifications.set(self.notifications.get() + 1);
        LifecycleOutcome::done()
    }
}

#[test]
fn cancelled_commits_skip_after_render_notifications() {
    let notifications = Rc::new(Cell::new(0));
    let sink = DeferredSink::new();
    let renderer = Renderer::new(sink.clone());
    let root = renderer.attach_root(Box::new(AfterRenderCounter {
        notifications: notifications.clone(),
    }));

    renderer.render_root(root, ParameterCollection::new()).unwrap();
    sink.cancel_next();
    assert_eq!(notifications.get(), 0);
    assert!(sink.errors().is_empty());

    renderer.render_handle(root).request_render();
    sink.acknowledge_next();
    assert_eq!(notifications.get(), 1);
}
