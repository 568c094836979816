use std::any::{Any, TypeId};
use std::cell::{Cell, RefCell};
use std::rc::Rc;

use trellis_core::{
    AttributeValue, CascadingParameterInfo, CascadingValue, CascadingValueSource,
    CascadingValueSupplier, Component, ComponentDescriptor, ParameterCollection, ParameterError,
    ParameterView, RenderError, RenderFragment, TreeBuilder,
};
use trellis_testing::{edit_kinds, edits_for, TestHarness};

#[derive(Debug)]
struct Theme {
    name: &'static str,
}

/// Consumes a `Theme` cascading value and renders its name, logging what it
/// saw on each render.
struct ThemedLabel {
    log: Rc<RefCell<Vec<String>>>,
    theme: Option<Rc<Theme>>,
    declaration: CascadingParameterInfo,
}

impl ThemedLabel {
    fn new(log: Rc<RefCell<Vec<String>>>) -> Self {
        Self {
            log,
            theme: None,
            declaration: CascadingParameterInfo::of::<Theme>("theme"),
        }
    }

    fn with_declaration(log: Rc<RefCell<Vec<String>>>, declaration: CascadingParameterInfo) -> Self {
        Self {
            log,
            theme: None,
            declaration,
        }
    }
}

impl Component for ThemedLabel {
    fn declared_cascading_parameters(&self) -> Vec<CascadingParameterInfo> {
        vec![self.declaration.clone()]
    }

    fn apply_parameters(&mut self, parameters: &ParameterView<'_>) -> Result<(), ParameterError> {
        if let Some(theme) = parameters.get_data::<Theme>("theme")? {
            self.theme = Some(theme);
        }
        Ok(())
    }

    fn render(&mut self, builder: &mut TreeBuilder) -> Result<(), RenderError> {
        let name = self.theme.as_ref().map(|t| t.name).unwrap_or("unset");
        self.log.borrow_mut().push(name.to_owned());
        builder.add_text(0, name);
        Ok(())
    }
}

/// Hosts a `CascadingValue` that supplies a theme to a `ThemedLabel` child.
struct App {
    log: Rc<RefCell<Vec<String>>>,
}

impl Component for App {
    fn apply_parameters(&mut self, _: &ParameterView<'_>) -> Result<(), ParameterError> {
        Ok(())
    }

    fn render(&mut self, builder: &mut TreeBuilder) -> Result<(), RenderError> {
        let log = self.log.clone();
        let child = ComponentDescriptor::new(move || ThemedLabel::new(log.clone()));
        builder.open_component(0, ComponentDescriptor::of::<CascadingValue>());
        builder.add_attribute(1, "value", AttributeValue::data(Theme { name: "dark" }))?;
        builder.add_attribute(
            2,
            "child_content",
            AttributeValue::Fragment(RenderFragment::new(move |builder| {
                builder.open_component(0, child.clone());
                builder.close_component()?;
                Ok(())
            })),
        )?;
        builder.close_component()?;
        Ok(())
    }
}

#[test]
fn ancestor_supplied_value_reaches_the_consumer() {
    let log = Rc::new(RefCell::new(Vec::new()));
    let harness = TestHarness::new(Box::new(App { log: log.clone() }));
    harness.render_empty();

    assert_eq!(*log.borrow(), vec!["dark"]);
    // Root is 0, the CascadingValue is 1, the label is 2.
    assert_eq!(harness.frames_of(2)[0].text_content(), Some("dark"));
}

#[test]
fn global_source_redelivers_on_change() {
    let source = CascadingValueSource::new(Theme { name: "dark" }, false);
    let log = Rc::new(RefCell::new(Vec::new()));
    let harness = TestHarness::new(Box::new(ThemedLabel::new(log.clone())));
    harness.renderer().register_global_supplier(source.supplier());
    harness.render_empty();
    assert_eq!(*log.borrow(), vec!["dark"]);

    source.notify_changed(Theme { name: "light" }).unwrap();

    assert_eq!(*log.borrow(), vec!["dark", "light"]);
    assert_eq!(harness.batch_count(), 2);
    let edits = edits_for(&harness.last_batch(), harness.root_id());
    assert_eq!(edit_kinds(&edits), vec!["update-text"]);
}

#[test]
fn fixed_sources_cannot_notify() {
    let source = CascadingValueSource::new(Theme { name: "dark" }, true);
    let log = Rc::new(RefCell::new(Vec::new()));
    let harness = TestHarness::new(Box::new(ThemedLabel::new(log.clone())));
    harness.renderer().register_global_supplier(source.supplier());
    harness.render_empty();
    assert_eq!(*log.borrow(), vec!["dark"]);

    assert!(source.notify_changed(Theme { name: "light" }).is_err());
    assert_eq!(harness.batch_count(), 1);
}

#[test]
fn single_delivery_values_arrive_once_and_never_refresh() {
    let source = CascadingValueSource::new(Theme { name: "dark" }, false);
    let log = Rc::new(RefCell::new(Vec::new()));
    let harness = TestHarness::new(Box::new(ThemedLabel::with_declaration(
        log.clone(),
        CascadingParameterInfo::single_delivery::<Theme>("theme"),
    )));
    harness.renderer().register_global_supplier(source.supplier());
    harness.render_empty();

    // Single-delivery consumers are never subscribed, so this is silent.
    source.notify_changed(Theme { name: "light" }).unwrap();
    assert_eq!(harness.batch_count(), 1);

    // Even an explicit re-render keeps the originally delivered value.
    harness.render_empty();
    assert_eq!(*log.borrow(), vec!["dark", "dark"]);
}

/// A supplier whose fixed answer can be flipped from outside, which a
/// well-behaved supplier must never do.
struct MoodySupplier {
    value: Rc<Theme>,
    fixed: Cell<bool>,
}

impl CascadingValueSupplier for MoodySupplier {
    fn can_supply(&self, info: &CascadingParameterInfo) -> bool {
        info.type_id == TypeId::of::<Theme>()
    }

    fn is_fixed(&self) -> bool {
        self.fixed.get()
    }

    fn current_value(&self, _: &CascadingParameterInfo) -> Option<Rc<dyn Any>> {
        Some(self.value.clone())
    }
}

#[test]
fn a_suppliers_fixed_flag_cannot_change_between_deliveries() {
    let supplier = Rc::new(MoodySupplier {
        value: Rc::new(Theme { name: "dark" }),
        fixed: Cell::new(true),
    });
    let log = Rc::new(RefCell::new(Vec::new()));
    let harness = TestHarness::new(Box::new(ThemedLabel::new(log.clone())));
    harness.renderer().register_global_supplier(supplier.clone());
    harness.render_empty();
    assert_eq!(*log.borrow(), vec!["dark"]);

    // Fixed on the first delivery, suddenly non-fixed on the second.
    supplier.fixed.set(false);
    let err = harness.render(ParameterCollection::new()).unwrap_err();
    assert!(matches!(
        err,
        RenderError::Parameter(ParameterError::FixedFlagChanged)
    ));
}

/// Supplies a theme through `CascadingValue` with an externally driven
/// `is_fixed` parameter.
struct TogglingApp {
    log: Rc<RefCell<Vec<String>>>,
    fixed: Rc<Cell<bool>>,
}

impl Component for TogglingApp {
    fn apply_parameters(&mut self, _: &ParameterView<'_>) -> Result<(), ParameterError> {
        Ok(())
    }

    fn render(&mut self, builder: &mut TreeBuilder) -> Result<(), RenderError> {
        let log = self.log.clone();
        let child = ComponentDescriptor::new(move || ThemedLabel::new(log.clone()));
        builder.open_component(0, ComponentDescriptor::of::<CascadingValue>());
        builder.add_attribute(1, "value", AttributeValue::data(Theme { name: "dark" }))?;
        builder.add_attribute(2, "is_fixed", AttributeValue::Bool(self.fixed.get()))?;
        builder.add_attribute(
            3,
            "child_content",
            AttributeValue::Fragment(RenderFragment::new(move |builder| {
                builder.open_component(0, child.clone());
                builder.close_component()?;
                Ok(())
            })),
        )?;
        builder.close_component()?;
        Ok(())
    }
}

#[test]
fn cascading_value_rejects_an_is_fixed_toggle() {
    let log = Rc::new(RefCell::new(Vec::new()));
    let fixed = Rc::new(Cell::new(true));
    let harness = TestHarness::new(Box::new(TogglingApp {
        log: log.clone(),
        fixed: fixed.clone(),
    }));
    harness.render_empty();
    assert_eq!(*log.borrow(), vec!["dark"]);

    // The parameter update fails inside the pass, so the fault routes to
    // the sink rather than back to the caller.
    fixed.set(false);
    harness.render_empty();
    let errors = harness.sink().errors();
    assert_eq!(errors.len(), 1);
    assert!(errors[0].contains("fixed flag cannot change"));
}

#[test]
fn named_consumers_only_match_named_sources() {
    let unnamed = CascadingValueSource::new(Theme { name: "plain" }, false);
    let named = CascadingValueSource::named("accent", Theme { name: "crimson" }, false);

    let log = Rc::new(RefCell::new(Vec::new()));
    let harness = TestHarness::new(Box::new(ThemedLabel::with_declaration(
        log.clone(),
        CascadingParameterInfo::named::<Theme>("theme", "accent"),
    )));
    harness.renderer().register_global_supplier(unnamed.supplier());
    harness.renderer().register_global_supplier(named.supplier());
    harness.render_empty();

    assert_eq!(*log.borrow(), vec!["crimson"]);
}
