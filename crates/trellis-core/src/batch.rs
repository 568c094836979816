use std::collections::VecDeque;

use crate::edits::{Edit, NamedEventChange};
use crate::frames::Frame;
use crate::{ComponentId, EventHandlerId};

/// Edit script for one component within a batch.
#[derive(Debug, Clone)]
pub struct ComponentDiff {
    pub component_id: ComponentId,
    pub edits: Vec<Edit>,
}

/// Everything the display layer needs to apply one render pass atomically:
/// per-component edit scripts, the shared frame buffer those scripts
/// reference, and the ids retired by this pass.
#[derive(Debug, Clone, Default)]
pub struct RenderBatch {
    pub updated_components: Vec<ComponentDiff>,
    pub reference_frames: Vec<Frame>,
    pub disposed_component_ids: Vec<ComponentId>,
    pub disposed_event_handler_ids: Vec<EventHandlerId>,
    pub named_event_changes: Vec<NamedEventChange>,
}

impl RenderBatch {
    pub fn is_empty(&self) -> bool {
        self.updated_components.is_empty()
            && self.disposed_component_ids.is_empty()
            && self.disposed_event_handler_ids.is_empty()
            && self.named_event_changes.is_empty()
    }
}

/// Accumulates diff output across one render pass. The renderer owns one
/// and reuses it; `finish` drains the accumulated state into a batch and
/// leaves the builder empty.
pub struct BatchBuilder {
    pub(crate) updated_components: Vec<ComponentDiff>,
    pub(crate) reference_frames: Vec<Frame>,
    pub(crate) component_disposal_queue: VecDeque<ComponentId>,
    pub(crate) disposed_component_ids: Vec<ComponentId>,
    pub(crate) disposed_event_handler_ids: Vec<EventHandlerId>,
    pub(crate) named_event_changes: Vec<NamedEventChange>,
}

impl BatchBuilder {
    pub fn new() -> Self {
        Self {
            updated_components: Vec::new(),
            reference_frames: Vec::new(),
            component_disposal_queue: VecDeque::new(),
            disposed_component_ids: Vec::new(),
            disposed_event_handler_ids: Vec::new(),
            named_event_changes: Vec::new(),
        }
    }

    pub(crate) fn queue_component_disposal(&mut self, component_id: ComponentId) {
        self.component_disposal_queue.push_back(component_id);
    }

    pub(crate) fn has_pending_disposals(&self) -> bool {
        !self.component_disposal_queue.is_empty()
    }

    pub(crate) fn finish(&mut self) -> RenderBatch {
        RenderBatch {
            updated_components: std::mem::take(&mut self.updated_components),
            reference_frames: std::mem::take(&mut self.reference_frames),
            disposed_component_ids: std::mem::take(&mut self.disposed_component_ids),
            disposed_event_handler_ids: std::mem::take(&mut self.disposed_event_handler_ids),
            named_event_changes: std::mem::take(&mut self.named_event_changes),
        }
    }

    /// Abort path: throw away everything accumulated this pass.
    pub(crate) fn clear(&mut self) {
        self.updated_components.clear();
        self.reference_frames.clear();
        self.component_disposal_queue.clear();
        self.disposed_component_ids.clear();
        self.disposed_event_handler_ids.clear();
        self.named_event_changes.clear();
    }
}

impl Default for BatchBuilder {
    fn default() -> Self {
        Self::new()
    }
}
