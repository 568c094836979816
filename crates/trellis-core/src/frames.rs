use std::any::{Any, TypeId};
use std::fmt;
use std::rc::Rc;

use crate::builder::TreeBuilder;
use crate::component::{Component, LifecycleOutcome};
use crate::errors::RenderError;
use crate::{ComponentId, EventHandlerId, Key, Sequence};

/// Payload handed to an event callback. The renderer treats it as opaque.
#[derive(Clone, Default)]
pub struct EventArgs {
    pub payload: Option<Rc<dyn Any>>,
}

impl EventArgs {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn with_payload<T: 'static>(value: T) -> Self {
        Self {
            payload: Some(Rc::new(value)),
        }
    }

    pub fn payload_as<T: 'static>(&self) -> Option<&T> {
        self.payload.as_deref().and_then(<dyn Any>::downcast_ref)
    }
}

/// A stored event handler. Identity (not structure) decides equality: a
/// component that keeps the same callback across renders keeps its handler
/// id; a fresh closure every render mints a new one.
#[derive(Clone)]
pub struct EventCallback {
    func: Rc<dyn Fn(&EventArgs) -> LifecycleOutcome>,
}

impl EventCallback {
    pub fn new(f: impl Fn(&EventArgs) -> LifecycleOutcome + 'static) -> Self {
        Self { func: Rc::new(f) }
    }

    /// Wrap an infallible synchronous handler.
    pub fn from_fn(f: impl Fn(&EventArgs) + 'static) -> Self {
        Self::new(move |args| {
            f(args);
            LifecycleOutcome::done()
        })
    }

    pub fn invoke(&self, args: &EventArgs) -> LifecycleOutcome {
        (self.func)(args)
    }

    pub fn ptr_eq(&self, other: &EventCallback) -> bool {
        Rc::ptr_eq(&self.func, &other.func)
    }
}

/// A deferred chunk of tree construction, used for child content passed
/// between components.
#[derive(Clone)]
pub struct RenderFragment {
    func: Rc<dyn Fn(&mut TreeBuilder) -> Result<(), RenderError>>,
}

impl RenderFragment {
    pub fn new(f: impl Fn(&mut TreeBuilder) -> Result<(), RenderError> + 'static) -> Self {
        Self { func: Rc::new(f) }
    }

    pub fn invoke(&self, builder: &mut TreeBuilder) -> Result<(), RenderError> {
        (self.func)(builder)
    }

    pub fn ptr_eq(&self, other: &RenderFragment) -> bool {
        Rc::ptr_eq(&self.func, &other.func)
    }
}

/// Value carried by an attribute frame; doubles as a component parameter
/// value when the attribute sits in a component frame's header.
#[derive(Clone)]
pub enum AttributeValue {
    Text(String),
    Bool(bool),
    Callback(EventCallback),
    Fragment(RenderFragment),
    Data(Rc<dyn Any>),
}

impl AttributeValue {
    pub fn text(value: impl Into<String>) -> Self {
        AttributeValue::Text(value.into())
    }

    pub fn data<T: 'static>(value: T) -> Self {
        AttributeValue::Data(Rc::new(value))
    }

    /// Equality used when diffing attribute frames: plain values compare by
    /// value, reference values by identity.
    pub fn value_equal(&self, other: &AttributeValue) -> bool {
        match (self, other) {
            (AttributeValue::Text(a), AttributeValue::Text(b)) => a == b,
            (AttributeValue::Bool(a), AttributeValue::Bool(b)) => a == b,
            (AttributeValue::Callback(a), AttributeValue::Callback(b)) => a.ptr_eq(b),
            (AttributeValue::Fragment(a), AttributeValue::Fragment(b)) => a.ptr_eq(b),
            (AttributeValue::Data(a), AttributeValue::Data(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }

    /// Conservative equality used when deciding whether a child component
    /// can skip a parameter update. Only plain values are ever definitely
    /// equal; anything that might capture state is not.
    pub fn definitely_equals(&self, other: &AttributeValue) -> bool {
        match (self, other) {
            (AttributeValue::Text(a), AttributeValue::Text(b)) => a == b,
            (AttributeValue::Bool(a), AttributeValue::Bool(b)) => a == b,
            _ => false,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            AttributeValue::Text(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            AttributeValue::Bool(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_callback(&self) -> Option<&EventCallback> {
        match self {
            AttributeValue::Callback(callback) => Some(callback),
            _ => None,
        }
    }

    pub fn as_fragment(&self) -> Option<&RenderFragment> {
        match self {
            AttributeValue::Fragment(fragment) => Some(fragment),
            _ => None,
        }
    }

    pub fn downcast<T: 'static>(&self) -> Option<Rc<T>> {
        match self {
            AttributeValue::Data(value) => value.clone().downcast::<T>().ok(),
            _ => None,
        }
    }
}

impl fmt::Debug for AttributeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttributeValue::Text(value) => write!(f, "Text({value:?})"),
            AttributeValue::Bool(value) => write!(f, "Bool({value})"),
            AttributeValue::Callback(_) => write!(f, "Callback"),
            AttributeValue::Fragment(_) => write!(f, "Fragment"),
            AttributeValue::Data(_) => write!(f, "Data"),
        }
    }
}

/// How to construct instances of a component type, plus the type identity
/// the diff uses to decide whether a frame still describes the same
/// component.
#[derive(Clone)]
pub struct ComponentDescriptor {
    type_id: TypeId,
    type_name: &'static str,
    create: Rc<dyn Fn() -> Box<dyn Component>>,
}

impl ComponentDescriptor {
    pub fn new<C: Component + 'static>(factory: impl Fn() -> C + 'static) -> Self {
        Self {
            type_id: TypeId::of::<C>(),
            type_name: std::any::type_name::<C>(),
            create: Rc::new(move || Box::new(factory())),
        }
    }

    pub fn of<C: Component + Default + 'static>() -> Self {
        Self::new(C::default)
    }

    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub fn instantiate(&self) -> Box<dyn Component> {
        (self.create)()
    }

    pub fn same_component_type(&self, other: &ComponentDescriptor) -> bool {
        self.type_id == other.type_id
    }
}

impl fmt::Debug for ComponentDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ComponentDescriptor({})", self.type_name)
    }
}

/// Opaque tag a component frame may carry; a resolver installed on the
/// renderer maps it to a concrete instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RenderMode(&'static str);

impl RenderMode {
    pub const fn new(name: &'static str) -> Self {
        RenderMode(name)
    }

    pub fn name(&self) -> &'static str {
        self.0
    }
}

/// Handed to an element reference capture callback exactly once, when the
/// element is first inserted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ElementRef {
    pub id: u64,
}

/// Handed to a component reference capture callback when the referenced
/// component is instantiated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ComponentRef {
    pub component_id: ComponentId,
}

pub type ElementReferenceAction = Rc<dyn Fn(ElementRef)>;
pub type ComponentReferenceAction = Rc<dyn Fn(ComponentRef)>;

#[derive(Clone)]
pub enum FrameKind {
    Text {
        content: String,
    },
    Markup {
        content: String,
    },
    Element {
        name: String,
        subtree_len: usize,
        key: Key,
    },
    Attribute {
        name: String,
        value: AttributeValue,
        event_handler_id: EventHandlerId,
    },
    Component {
        descriptor: ComponentDescriptor,
        subtree_len: usize,
        key: Key,
        component_id: Option<ComponentId>,
        render_mode: Option<RenderMode>,
    },
    /// Transparent grouping emitted by fragments and loops; invisible to
    /// the display layer.
    Region {
        subtree_len: usize,
    },
    ElementReferenceCapture {
        capture_id: u64,
        callback: ElementReferenceAction,
    },
    ComponentReferenceCapture {
        parent_frame_index: usize,
        callback: ComponentReferenceAction,
    },
    /// Lives in an element header; changes are reported on the batch, not
    /// in the edit script.
    NamedEventMarker {
        event_type: String,
        assigned_name: String,
    },
}

/// One node of the flat pre-order tree representation.
#[derive(Clone)]
pub struct Frame {
    pub sequence: Sequence,
    pub kind: FrameKind,
}

impl Frame {
    /// Number of frames this frame spans, itself included. Container
    /// frames carry it; everything else spans exactly one.
    pub fn subtree_len(&self) -> usize {
        match &self.kind {
            FrameKind::Element { subtree_len, .. }
            | FrameKind::Component { subtree_len, .. }
            | FrameKind::Region { subtree_len } => *subtree_len,
            _ => 1,
        }
    }

    pub(crate) fn set_subtree_len(&mut self, len: usize) {
        match &mut self.kind {
            FrameKind::Element { subtree_len, .. }
            | FrameKind::Component { subtree_len, .. }
            | FrameKind::Region { subtree_len } => *subtree_len = len,
            _ => {}
        }
    }

    /// Reconciliation key; zero means unkeyed.
    pub fn key(&self) -> Key {
        match &self.kind {
            FrameKind::Element { key, .. } | FrameKind::Component { key, .. } => *key,
            _ => 0,
        }
    }

    pub(crate) fn set_key(&mut self, new_key: Key) {
        match &mut self.kind {
            FrameKind::Element { key, .. } | FrameKind::Component { key, .. } => *key = new_key,
            _ => {}
        }
    }

    pub fn element_name(&self) -> Option<&str> {
        match &self.kind {
            FrameKind::Element { name, .. } => Some(name),
            _ => None,
        }
    }

    pub fn attribute_name(&self) -> Option<&str> {
        match &self.kind {
            FrameKind::Attribute { name, .. } => Some(name),
            _ => None,
        }
    }

    pub fn text_content(&self) -> Option<&str> {
        match &self.kind {
            FrameKind::Text { content } | FrameKind::Markup { content } => Some(content),
            _ => None,
        }
    }

    pub fn component_id(&self) -> Option<ComponentId> {
        match &self.kind {
            FrameKind::Component { component_id, .. } => *component_id,
            _ => None,
        }
    }

    pub fn event_handler_id(&self) -> EventHandlerId {
        match &self.kind {
            FrameKind::Attribute {
                event_handler_id, ..
            } => *event_handler_id,
            _ => 0,
        }
    }

    pub fn kind_name(&self) -> &'static str {
        match &self.kind {
            FrameKind::Text { .. } => "text",
            FrameKind::Markup { .. } => "markup",
            FrameKind::Element { .. } => "element",
            FrameKind::Attribute { .. } => "attribute",
            FrameKind::Component { .. } => "component",
            FrameKind::Region { .. } => "region",
            FrameKind::ElementReferenceCapture { .. } => "element reference capture",
            FrameKind::ComponentReferenceCapture { .. } => "component reference capture",
            FrameKind::NamedEventMarker { .. } => "named event",
        }
    }
}

impl fmt::Debug for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            FrameKind::Text { content } => write!(f, "[{}] Text {content:?}", self.sequence),
            FrameKind::Markup { content } => write!(f, "[{}] Markup {content:?}", self.sequence),
            FrameKind::Element {
                name,
                subtree_len,
                key,
            } => write!(
                f,
                "[{}] Element <{name}> len={subtree_len} key={key}",
                self.sequence
            ),
            FrameKind::Attribute {
                name,
                value,
                event_handler_id,
            } => write!(
                f,
                "[{}] Attribute {name}={value:?} handler={event_handler_id}",
                self.sequence
            ),
            FrameKind::Component {
                descriptor,
                subtree_len,
                key,
                component_id,
                ..
            } => write!(
                f,
                "[{}] Component {} len={subtree_len} key={key} id={component_id:?}",
                self.sequence,
                descriptor.type_name()
            ),
            FrameKind::Region { subtree_len } => {
                write!(f, "[{}] Region len={subtree_len}", self.sequence)
            }
            FrameKind::ElementReferenceCapture { capture_id, .. } => {
                write!(f, "[{}] ElementReferenceCapture id={capture_id}", self.sequence)
            }
            FrameKind::ComponentReferenceCapture {
                parent_frame_index, ..
            } => write!(
                f,
                "[{}] ComponentReferenceCapture parent={parent_frame_index}",
                self.sequence
            ),
            FrameKind::NamedEventMarker {
                event_type,
                assigned_name,
            } => write!(
                f,
                "[{}] NamedEvent {event_type}={assigned_name}",
                self.sequence
            ),
        }
    }
}

/// Index of the frame after `index`'s whole subtree.
pub fn next_sibling_index(frames: &[Frame], index: usize) -> usize {
    index + frames[index].subtree_len()
}
