use crate::ComponentId;

/// One instruction in a component's edit script. Sibling indices are
/// relative to the display layer's current position; `StepIn`/`StepOut`
/// move that position into and out of container frames.
///
/// `reference_frame_index` points into the batch's shared reference frame
/// buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Edit {
    PrependFrame {
        sibling_index: usize,
        reference_frame_index: usize,
    },
    RemoveFrame {
        sibling_index: usize,
    },
    SetAttribute {
        sibling_index: usize,
        reference_frame_index: usize,
    },
    RemoveAttribute {
        sibling_index: usize,
        name: String,
    },
    UpdateText {
        sibling_index: usize,
        reference_frame_index: usize,
    },
    UpdateMarkup {
        sibling_index: usize,
        reference_frame_index: usize,
    },
    StepIn {
        sibling_index: usize,
    },
    StepOut,
    /// Keyed move within one sibling list. A run of these is always
    /// terminated by `PermutationListEnd`.
    PermutationListEntry {
        from_sibling_index: usize,
        to_sibling_index: usize,
    },
    PermutationListEnd,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NamedEventChangeKind {
    Added,
    Removed,
}

/// Named event markers are reported on the batch rather than woven into
/// edit scripts. For `Added` the frame index points into the component's
/// new tree; for `Removed`, into the old tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamedEventChange {
    pub kind: NamedEventChangeKind,
    pub component_id: ComponentId,
    pub frame_index: usize,
    pub event_type: String,
    pub assigned_name: String,
}
