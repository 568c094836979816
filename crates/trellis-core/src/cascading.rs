use std::any::{Any, TypeId};
use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use crate::builder::TreeBuilder;
use crate::component::Component;
use crate::errors::{ParameterError, RenderError};
use crate::frames::{AttributeValue, RenderFragment};
use crate::params::Parameter;
use crate::renderer::RendererInner;
use crate::state::{CascadingSubscription, ComponentState};
use crate::ComponentId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CascadingParameterKind {
    /// Matched by value type; re-delivered when the supplier changes.
    Cascading,
    /// Matched by value type; delivered at most once per component and
    /// never subscribed, so later changes are invisible.
    SingleDelivery,
    /// Matched by supplier name rather than type alone.
    Named,
}

/// A cascading parameter a component declares it consumes. The renderer
/// resolves each one against ancestor suppliers (then globally registered
/// ones) before every parameter delivery.
#[derive(Clone)]
pub struct CascadingParameterInfo {
    pub parameter_name: String,
    /// Supplier-side name filter; `None` matches purely by type.
    pub value_name: Option<String>,
    pub type_id: TypeId,
    pub type_name: &'static str,
    pub kind: CascadingParameterKind,
}

impl CascadingParameterInfo {
    pub fn of<T: 'static>(parameter_name: impl Into<String>) -> Self {
        Self {
            parameter_name: parameter_name.into(),
            value_name: None,
            type_id: TypeId::of::<T>(),
            type_name: std::any::type_name::<T>(),
            kind: CascadingParameterKind::Cascading,
        }
    }

    pub fn named<T: 'static>(
        parameter_name: impl Into<String>,
        value_name: impl Into<String>,
    ) -> Self {
        Self {
            value_name: Some(value_name.into()),
            kind: CascadingParameterKind::Named,
            ..Self::of::<T>(parameter_name)
        }
    }

    pub fn single_delivery<T: 'static>(parameter_name: impl Into<String>) -> Self {
        Self {
            kind: CascadingParameterKind::SingleDelivery,
            ..Self::of::<T>(parameter_name)
        }
    }
}

impl fmt::Debug for CascadingParameterInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "CascadingParameterInfo({} <- {:?} {} {:?})",
            self.parameter_name, self.value_name, self.type_name, self.kind
        )
    }
}

/// Something that can feed cascading parameters to descendants. Fixed
/// suppliers promise their value never changes and are never subscribed
/// to.
pub trait CascadingValueSupplier {
    fn can_supply(&self, info: &CascadingParameterInfo) -> bool;

    fn is_fixed(&self) -> bool;

    fn current_value(&self, info: &CascadingParameterInfo) -> Option<Rc<dyn Any>>;

    fn subscribe(&self, subscriber: &Rc<ComponentState>, info: &CascadingParameterInfo) {
        let _ = (subscriber, info);
    }

    fn unsubscribe(&self, subscriber: &Rc<ComponentState>, info: &CascadingParameterInfo) {
        let _ = (subscriber, info);
    }
}

/// Shared supplier state behind both `CascadingValue` and
/// `CascadingValueSource`.
pub(crate) struct CascadingSlot {
    name: RefCell<Option<String>>,
    value: RefCell<Option<Rc<dyn Any>>>,
    value_type: Cell<Option<TypeId>>,
    fixed: Cell<bool>,
    subscribers: RefCell<Vec<SlotSubscriber>>,
}

struct SlotSubscriber {
    component_id: ComponentId,
    parameter_name: String,
    state: Weak<ComponentState>,
}

impl CascadingSlot {
    pub(crate) fn new() -> Self {
        Self {
            name: RefCell::new(None),
            value: RefCell::new(None),
            value_type: Cell::new(None),
            fixed: Cell::new(false),
            subscribers: RefCell::new(Vec::new()),
        }
    }

    pub(crate) fn configure(
        &self,
        name: Option<String>,
        value: Rc<dyn Any>,
        value_type: TypeId,
        fixed: bool,
    ) {
        *self.name.borrow_mut() = name;
        *self.value.borrow_mut() = Some(value);
        self.value_type.set(Some(value_type));
        self.fixed.set(fixed);
    }

    pub(crate) fn replace_value(&self, value: Rc<dyn Any>, value_type: TypeId) {
        *self.value.borrow_mut() = Some(value);
        self.value_type.set(Some(value_type));
    }

    pub(crate) fn fixed(&self) -> bool {
        self.fixed.get()
    }

    pub(crate) fn value_ptr_eq(&self, other: &Rc<dyn Any>) -> bool {
        match &*self.value.borrow() {
            Some(current) => Rc::ptr_eq(current, other),
            None => false,
        }
    }

    /// Re-deliver to every current subscriber. The list is snapshotted
    /// first: subscribers added while the pass runs already saw the
    /// current value at resolution and must not be delivered twice.
    pub(crate) fn notify_subscribers(&self) {
        let snapshot: Vec<Weak<ComponentState>> = {
            let mut subscribers = self.subscribers.borrow_mut();
            subscribers.retain(|s| s.state.strong_count() > 0);
            subscribers.iter().map(|s| s.state.clone()).collect()
        };
        for weak in snapshot {
            if let Some(state) = weak.upgrade() {
                refresh_consumer(&state);
            }
        }
    }
}

impl CascadingValueSupplier for CascadingSlot {
    fn can_supply(&self, info: &CascadingParameterInfo) -> bool {
        if self.value_type.get() != Some(info.type_id) {
            return false;
        }
        let name = self.name.borrow();
        match (&info.kind, &info.value_name) {
            // Named consumers only match named suppliers.
            (CascadingParameterKind::Named, Some(wanted)) => match &*name {
                Some(supplied) => supplied.eq_ignore_ascii_case(wanted),
                None => false,
            },
            (CascadingParameterKind::Named, None) => false,
            (_, Some(wanted)) => match &*name {
                Some(supplied) => supplied.eq_ignore_ascii_case(wanted),
                None => false,
            },
            (_, None) => true,
        }
    }

    fn is_fixed(&self) -> bool {
        self.fixed.get()
    }

    fn current_value(&self, _info: &CascadingParameterInfo) -> Option<Rc<dyn Any>> {
        self.value.borrow().clone()
    }

    fn subscribe(&self, subscriber: &Rc<ComponentState>, info: &CascadingParameterInfo) {
        let mut subscribers = self.subscribers.borrow_mut();
        let already = subscribers.iter().any(|s| {
            s.component_id == subscriber.component_id() && s.parameter_name == info.parameter_name
        });
        if !already {
            subscribers.push(SlotSubscriber {
                component_id: subscriber.component_id(),
                parameter_name: info.parameter_name.clone(),
                state: Rc::downgrade(subscriber),
            });
        }
    }

    fn unsubscribe(&self, subscriber: &Rc<ComponentState>, info: &CascadingParameterInfo) {
        self.subscribers.borrow_mut().retain(|s| {
            !(s.component_id == subscriber.component_id()
                && s.parameter_name == info.parameter_name)
        });
    }
}

/// Component that supplies a value to its descendants. Parameters:
/// `value` (data, required), `name` (text, optional), `is_fixed` (bool,
/// optional, immutable after first delivery), `child_content` (fragment).
pub struct CascadingValue {
    slot: Rc<CascadingSlot>,
    child_content: Option<RenderFragment>,
    configured: bool,
}

impl Default for CascadingValue {
    fn default() -> Self {
        Self {
            slot: Rc::new(CascadingSlot::new()),
            child_content: None,
            configured: false,
        }
    }
}

impl Component for CascadingValue {
    fn apply_parameters(
        &mut self,
        parameters: &crate::params::ParameterView<'_>,
    ) -> Result<(), ParameterError> {
        let mut value: Option<Rc<dyn Any>> = None;
        let mut name: Option<String> = None;
        let mut is_fixed = false;
        let mut child_content: Option<RenderFragment> = None;

        for parameter in parameters.direct() {
            if parameter.name.eq_ignore_ascii_case("value") {
                match &parameter.value {
                    AttributeValue::Data(data) => value = Some(data.clone()),
                    _ => {
                        return Err(ParameterError::TypeMismatch {
                            name: parameter.name.clone(),
                            expected: "data",
                        })
                    }
                }
            } else if parameter.name.eq_ignore_ascii_case("name") {
                name = parameter.value.as_str().map(str::to_owned);
            } else if parameter.name.eq_ignore_ascii_case("is_fixed") {
                is_fixed = parameter.value.as_bool().unwrap_or(false);
            } else if parameter.name.eq_ignore_ascii_case("child_content") {
                child_content = parameter.value.as_fragment().cloned();
            } else {
                return Err(ParameterError::Unknown {
                    component: "CascadingValue",
                    name: parameter.name.clone(),
                });
            }
        }

        let value = value.ok_or_else(|| ParameterError::Missing {
            name: "value".to_owned(),
        })?;
        let value_type = (*value).type_id();

        if self.configured {
            if is_fixed != self.slot.fixed() {
                return Err(ParameterError::FixedFlagChanged);
            }
            let changed = !self.slot.value_ptr_eq(&value);
            self.slot.replace_value(value, value_type);
            self.child_content = child_content;
            if changed && !is_fixed {
                self.slot.notify_subscribers();
            }
        } else {
            self.configured = true;
            self.slot.configure(name, value, value_type, is_fixed);
            self.child_content = child_content;
        }
        Ok(())
    }

    fn render(&mut self, builder: &mut TreeBuilder) -> Result<(), RenderError> {
        if let Some(child_content) = &self.child_content {
            child_content.invoke(builder)?;
        }
        Ok(())
    }

    fn cascading_supplier(&self) -> Option<Rc<dyn CascadingValueSupplier>> {
        Some(self.slot.clone())
    }
}

/// Error returned when an external source marked fixed is asked to notify.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedSourceError;

impl fmt::Display for FixedSourceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "cannot notify subscribers of a fixed cascading source")
    }
}

impl std::error::Error for FixedSourceError {}

/// An externally driven supplier, typically registered on the renderer as
/// a global fallback. The owner pushes new values; subscribed consumers
/// are re-delivered on each change.
pub struct CascadingValueSource {
    slot: Rc<CascadingSlot>,
}

impl CascadingValueSource {
    pub fn new<T: 'static>(value: T, is_fixed: bool) -> Self {
        Self::build(None, value, is_fixed)
    }

    pub fn named<T: 'static>(name: impl Into<String>, value: T, is_fixed: bool) -> Self {
        Self::build(Some(name.into()), value, is_fixed)
    }

    fn build<T: 'static>(name: Option<String>, value: T, is_fixed: bool) -> Self {
        let slot = Rc::new(CascadingSlot::new());
        slot.configure(name, Rc::new(value), TypeId::of::<T>(), is_fixed);
        Self { slot }
    }

    pub fn supplier(&self) -> Rc<dyn CascadingValueSupplier> {
        self.slot.clone()
    }

    /// Replace the value and re-deliver to all subscribers.
    pub fn notify_changed<T: 'static>(&self, value: T) -> Result<(), FixedSourceError> {
        if self.slot.fixed() {
            return Err(FixedSourceError);
        }
        self.slot.replace_value(Rc::new(value), TypeId::of::<T>());
        self.slot.notify_subscribers();
        Ok(())
    }

    /// Re-deliver the current value without replacing it, for values
    /// mutated in place.
    pub fn notify_subscribers(&self) -> Result<(), FixedSourceError> {
        if self.slot.fixed() {
            return Err(FixedSourceError);
        }
        self.slot.notify_subscribers();
        Ok(())
    }
}

/// Resolve every cascading parameter `state`'s component declares, walking
/// ancestor suppliers first and the renderer's global registry second.
/// Values resolve to `Data` parameters; unresolved declarations are simply
/// absent from the view.
pub(crate) fn resolve_cascading_parameters(
    inner: &Rc<RendererInner>,
    state: &Rc<ComponentState>,
) -> Result<Vec<Parameter>, ParameterError> {
    let declared = state.component().borrow().declared_cascading_parameters();
    if declared.is_empty() {
        return Ok(Vec::new());
    }

    let mut resolved = Vec::new();
    for info in declared {
        if info.kind == CascadingParameterKind::SingleDelivery
            && state.was_delivered_once(&info.parameter_name)
        {
            continue;
        }

        let existing = state
            .subscriptions()
            .borrow()
            .iter()
            .find(|s| s.info.parameter_name == info.parameter_name)
            .map(|s| (s.supplier.clone(), s.was_fixed));

        let (supplier, already_subscribed) = match existing {
            Some((supplier, was_fixed)) => {
                if supplier.is_fixed() != was_fixed {
                    return Err(ParameterError::FixedFlagChanged);
                }
                (Some(supplier), true)
            }
            None => (find_supplier(inner, state, &info), false),
        };

        let Some(supplier) = supplier else { continue };
        let Some(value) = supplier.current_value(&info) else {
            continue;
        };

        resolved.push(Parameter {
            name: info.parameter_name.clone(),
            value: AttributeValue::Data(value),
        });

        match info.kind {
            CascadingParameterKind::SingleDelivery => {
                state.mark_delivered_once(&info.parameter_name);
            }
            _ => {
                // Fixed suppliers are never subscribed, but the resolution
                // is still recorded so a later flip of the fixed flag is
                // caught as drift instead of silently resubscribing.
                if !already_subscribed {
                    let was_fixed = supplier.is_fixed();
                    if !was_fixed {
                        supplier.subscribe(state, &info);
                    }
                    state.subscriptions().borrow_mut().push(CascadingSubscription {
                        supplier: supplier.clone(),
                        info,
                        was_fixed,
                    });
                }
            }
        }
    }
    Ok(resolved)
}

fn find_supplier(
    inner: &Rc<RendererInner>,
    state: &Rc<ComponentState>,
    info: &CascadingParameterInfo,
) -> Option<Rc<dyn CascadingValueSupplier>> {
    let mut cursor = state.parent();
    while let Some(ancestor) = cursor {
        let supplier = ancestor.component().borrow().cascading_supplier();
        if let Some(supplier) = supplier {
            if supplier.can_supply(info) {
                return Some(supplier);
            }
        }
        cursor = ancestor.parent();
    }
    inner.global_supplier_for(info)
}

/// Re-deliver a subscribed consumer's cached direct parameters so its
/// cascading values are recomputed.
pub(crate) fn refresh_consumer(state: &Rc<ComponentState>) {
    let Some(inner) = state.renderer() else { return };
    let Some(parameters) = state.latest_parameters() else {
        return;
    };
    inner.deliver_parameters(state, parameters);
}
