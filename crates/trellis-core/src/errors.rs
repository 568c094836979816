use std::fmt;
use std::rc::Rc;

use crate::frames::RenderMode;
use crate::{ComponentId, EventHandlerId, Key};

/// Misuse of the tree builder or a malformed frame array. Structural errors
/// abort the whole render pass before any batch is emitted.
#[derive(Debug, Clone, PartialEq)]
pub enum StructuralError {
    /// An attribute was appended somewhere other than the header of an open
    /// element or component frame.
    MisplacedAttribute { name: String },
    /// A named event marker was appended outside an open element header.
    MisplacedNamedEvent { event_type: String },
    /// A reference capture was appended outside the frame kind that accepts it.
    MisplacedReferenceCapture,
    /// A close call did not match the most recently opened frame.
    CloseMismatch {
        expected: &'static str,
        found: &'static str,
    },
    /// A close call with no open frame.
    CloseWithoutOpen,
    /// `finish` was called with open frames remaining.
    UnclosedFrames { count: usize },
    /// `set_key` or `set_render_mode` with no frame open, or on the wrong kind.
    MisplacedKey,
    MisplacedRenderMode,
    /// Two siblings in the same list carry the same key.
    DuplicateKey { key: Key },
    /// The diff engine met a frame kind that cannot appear in this position.
    UnexpectedFrame { context: &'static str },
}

impl fmt::Display for StructuralError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StructuralError::MisplacedAttribute { name } => {
                write!(f, "attribute '{name}' must directly follow an open element or component")
            }
            StructuralError::MisplacedNamedEvent { event_type } => {
                write!(f, "named event '{event_type}' must appear in an element header")
            }
            StructuralError::MisplacedReferenceCapture => {
                write!(f, "reference capture is not valid in this position")
            }
            StructuralError::CloseMismatch { expected, found } => {
                write!(f, "attempted to close a {expected} frame but a {found} frame is open")
            }
            StructuralError::CloseWithoutOpen => write!(f, "close called with no open frame"),
            StructuralError::UnclosedFrames { count } => {
                write!(f, "finish called with {count} unclosed frame(s)")
            }
            StructuralError::MisplacedKey => {
                write!(f, "set_key requires an open element or component frame")
            }
            StructuralError::MisplacedRenderMode => {
                write!(f, "set_render_mode requires an open component frame")
            }
            StructuralError::DuplicateKey { key } => {
                write!(
                    f,
                    "more than one sibling has the same key value, '{key}'; key values must be unique"
                )
            }
            StructuralError::UnexpectedFrame { context } => {
                write!(f, "unexpected frame kind while {context}")
            }
        }
    }
}

impl std::error::Error for StructuralError {}

/// Failure to bind a parameter collection onto a component.
#[derive(Debug, Clone, PartialEq)]
pub enum ParameterError {
    Unknown { component: &'static str, name: String },
    TypeMismatch { name: String, expected: &'static str },
    DuplicateName { name: String },
    Missing { name: String },
    /// A cascading supplier's fixed flag changed after delivery began.
    FixedFlagChanged,
}

impl fmt::Display for ParameterError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParameterError::Unknown { component, name } => {
                write!(f, "component {component} does not accept a parameter named '{name}'")
            }
            ParameterError::TypeMismatch { name, expected } => {
                write!(f, "parameter '{name}' type mismatch; expected {expected}")
            }
            ParameterError::DuplicateName { name } => {
                write!(f, "parameter '{name}' appears more than once")
            }
            ParameterError::Missing { name } => {
                write!(f, "required parameter '{name}' was not supplied")
            }
            ParameterError::FixedFlagChanged => {
                write!(f, "a cascading value's fixed flag cannot change after the initial delivery")
            }
        }
    }
}

impl std::error::Error for ParameterError {}

/// Outcome of a lifecycle method or callback that did not finish cleanly.
#[derive(Debug, Clone)]
pub enum LifecycleFault {
    Cancelled,
    Error(Rc<dyn std::error::Error>),
}

impl LifecycleFault {
    pub fn error(err: impl std::error::Error + 'static) -> Self {
        LifecycleFault::Error(Rc::new(err))
    }

    pub fn message(msg: impl Into<String>) -> Self {
        LifecycleFault::Error(Rc::new(FaultMessage(msg.into())))
    }

    pub fn is_cancellation(&self) -> bool {
        matches!(self, LifecycleFault::Cancelled)
    }
}

impl fmt::Display for LifecycleFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LifecycleFault::Cancelled => write!(f, "the operation was cancelled"),
            LifecycleFault::Error(err) => err.fmt(f),
        }
    }
}

impl std::error::Error for LifecycleFault {}

/// Plain-string fault payload for components that have nothing richer to say.
#[derive(Debug, Clone)]
pub struct FaultMessage(pub String);

impl fmt::Display for FaultMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::error::Error for FaultMessage {}

/// Every fault raised while disposing components during one render pass,
/// reported once per pass.
#[derive(Debug, Clone)]
pub struct DisposalError {
    pub faults: Vec<LifecycleFault>,
}

impl fmt::Display for DisposalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} error(s) were encountered while disposing components",
            self.faults.len()
        )
    }
}

impl std::error::Error for DisposalError {}

/// Returned to the external caller of `dispatch_event`; never routed to
/// error boundaries.
#[derive(Debug, Clone, PartialEq)]
pub enum DispatchError {
    UnknownHandler { handler_id: EventHandlerId },
}

impl fmt::Display for DispatchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DispatchError::UnknownHandler { handler_id } => {
                write!(f, "there is no event handler associated with this event; id: '{handler_id}'")
            }
        }
    }
}

impl std::error::Error for DispatchError {}

/// Umbrella error for the render pipeline. `Structural` and
/// `UnsupportedRenderMode` are fatal to the pass; `Parameter` and
/// `Lifecycle` are routed to the nearest error boundary; `Disposal`
/// aggregates per-pass disposal faults.
#[derive(Debug, Clone)]
pub enum RenderError {
    Structural(StructuralError),
    Parameter(ParameterError),
    Lifecycle(LifecycleFault),
    Disposal(DisposalError),
    UnsupportedRenderMode {
        type_name: &'static str,
        mode: RenderMode,
    },
    /// A root-level operation named a component id the renderer does not
    /// know.
    UnknownComponent { component_id: ComponentId },
}

impl RenderError {
    /// Errors a boundary may absorb. Everything else tears down the pass.
    pub fn is_boundary_routable(&self) -> bool {
        matches!(self, RenderError::Parameter(_) | RenderError::Lifecycle(_))
    }
}

impl fmt::Display for RenderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RenderError::Structural(err) => err.fmt(f),
            RenderError::Parameter(err) => err.fmt(f),
            RenderError::Lifecycle(err) => err.fmt(f),
            RenderError::Disposal(err) => err.fmt(f),
            RenderError::UnsupportedRenderMode { type_name, mode } => {
                write!(
                    f,
                    "cannot instantiate {type_name}: no resolver accepted render mode '{}'",
                    mode.name()
                )
            }
            RenderError::UnknownComponent { component_id } => {
                write!(f, "no component with id {component_id} is registered")
            }
        }
    }
}

impl std::error::Error for RenderError {}

impl From<StructuralError> for RenderError {
    fn from(err: StructuralError) -> Self {
        RenderError::Structural(err)
    }
}

impl From<ParameterError> for RenderError {
    fn from(err: ParameterError) -> Self {
        RenderError::Parameter(err)
    }
}

impl From<LifecycleFault> for RenderError {
    fn from(err: LifecycleFault) -> Self {
        RenderError::Lifecycle(err)
    }
}

impl From<DisposalError> for RenderError {
    fn from(err: DisposalError) -> Self {
        RenderError::Disposal(err)
    }
}
