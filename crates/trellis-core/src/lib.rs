#![doc = r"Rendering core for the Trellis component framework.

Components emit flat pre-order frame arrays; the diff engine turns
successive arrays into edit scripts; the renderer batches the results
for an external display layer."]

pub mod batch;
pub mod builder;
pub mod cascading;
pub mod collections;
pub mod component;
pub mod diff;
pub mod edits;
pub mod errors;
pub mod events;
pub mod frames;
pub mod hash;
pub mod operation;
pub mod params;
pub mod renderer;
pub mod state;

pub use batch::{ComponentDiff, RenderBatch};
pub use builder::TreeBuilder;
pub use cascading::{
    CascadingParameterInfo, CascadingParameterKind, CascadingValue, CascadingValueSource,
    CascadingValueSupplier,
};
pub use component::{
    Component, DirectBinder, ErrorBoundary, LifecycleOutcome, ParameterBinder,
};
pub use edits::{Edit, NamedEventChange, NamedEventChangeKind};
pub use errors::{
    DispatchError, DisposalError, LifecycleFault, ParameterError, RenderError, StructuralError,
};
pub use frames::{
    AttributeValue, ComponentDescriptor, ComponentRef, ElementRef, EventArgs, EventCallback,
    Frame, FrameKind, RenderFragment, RenderMode,
};
pub use operation::Operation;
pub use params::{Parameter, ParameterCollection, ParameterView};
pub use renderer::{
    CommitOutcome, DispatchStatus, RenderHandle, RenderSink, Renderer, ResolveComponentRenderMode,
};
pub use state::{ComponentState, ComponentStatus};

/// Reconciliation key derived by hashing; zero is reserved for "no key".
pub type Key = u64;
pub type ComponentId = usize;
pub type EventHandlerId = u64;

/// Position marker assigned by the code that emits frames. Diffing matches
/// siblings by sequence, so sequences must be ascending within a sibling
/// list for the unkeyed heuristics to work well.
pub type Sequence = i32;

/// Sequence given to attribute frames the diff inserts on behalf of the
/// system (duplicated attributes during slow-path merging). Sorts before
/// every author-assigned sequence.
pub const SYSTEM_ADDED_ATTRIBUTE_SEQUENCE: Sequence = i32::MIN;
