use crate::errors::StructuralError;
use crate::frames::{
    AttributeValue, ComponentDescriptor, ComponentReferenceAction, ElementReferenceAction, Frame,
    FrameKind, RenderMode,
};
use crate::{Key, Sequence};

/// Where we are inside the currently open frame. Attributes come first,
/// then named event markers, then children; going backwards is a
/// structural error.
#[derive(Clone, Copy, PartialEq, Eq)]
enum Phase {
    Attributes,
    Markers,
    Children,
}

struct OpenFrame {
    index: usize,
    phase: Phase,
}

/// Append-only construction of a flat pre-order frame array.
///
/// Container frames (`Element`, `Component`, `Region`) are opened and
/// closed in bracketed pairs; closing back-patches the container's subtree
/// length. Misuse surfaces as `StructuralError`, which aborts the render
/// pass before any batch is emitted.
pub struct TreeBuilder {
    frames: Vec<Frame>,
    open: Vec<OpenFrame>,
}

impl TreeBuilder {
    pub fn new() -> Self {
        Self {
            frames: Vec::new(),
            open: Vec::new(),
        }
    }

    pub fn add_text(&mut self, sequence: Sequence, content: impl Into<String>) {
        self.enter_children();
        self.frames.push(Frame {
            sequence,
            kind: FrameKind::Text {
                content: content.into(),
            },
        });
    }

    pub fn add_markup(&mut self, sequence: Sequence, content: impl Into<String>) {
        self.enter_children();
        self.frames.push(Frame {
            sequence,
            kind: FrameKind::Markup {
                content: content.into(),
            },
        });
    }

    pub fn open_element(&mut self, sequence: Sequence, name: impl Into<String>) {
        self.enter_children();
        self.open.push(OpenFrame {
            index: self.frames.len(),
            phase: Phase::Attributes,
        });
        self.frames.push(Frame {
            sequence,
            kind: FrameKind::Element {
                name: name.into(),
                subtree_len: 0,
                key: 0,
            },
        });
    }

    pub fn close_element(&mut self) -> Result<(), StructuralError> {
        self.close(
            "element",
            |kind| matches!(kind, FrameKind::Element { .. }),
        )
    }

    pub fn open_component(&mut self, sequence: Sequence, descriptor: ComponentDescriptor) {
        self.enter_children();
        self.open.push(OpenFrame {
            index: self.frames.len(),
            phase: Phase::Attributes,
        });
        self.frames.push(Frame {
            sequence,
            kind: FrameKind::Component {
                descriptor,
                subtree_len: 0,
                key: 0,
                component_id: None,
                render_mode: None,
            },
        });
    }

    pub fn close_component(&mut self) -> Result<(), StructuralError> {
        self.close(
            "component",
            |kind| matches!(kind, FrameKind::Component { .. }),
        )
    }

    pub fn open_region(&mut self, sequence: Sequence) {
        self.enter_children();
        self.open.push(OpenFrame {
            index: self.frames.len(),
            // Regions carry no attributes.
            phase: Phase::Children,
        });
        self.frames.push(Frame {
            sequence,
            kind: FrameKind::Region { subtree_len: 0 },
        });
    }

    pub fn close_region(&mut self) -> Result<(), StructuralError> {
        self.close("region", |kind| matches!(kind, FrameKind::Region { .. }))
    }

    /// Append an attribute to the currently open element or component
    /// header. On component frames attributes act as parameters.
    pub fn add_attribute(
        &mut self,
        sequence: Sequence,
        name: impl Into<String>,
        value: AttributeValue,
    ) -> Result<(), StructuralError> {
        let name = name.into();
        let valid = self.open.last().is_some_and(|top| {
            top.phase == Phase::Attributes
                && matches!(
                    self.frames[top.index].kind,
                    FrameKind::Element { .. } | FrameKind::Component { .. }
                )
        });
        if !valid {
            return Err(StructuralError::MisplacedAttribute { name });
        }
        self.frames.push(Frame {
            sequence,
            kind: FrameKind::Attribute {
                name,
                value,
                event_handler_id: 0,
            },
        });
        Ok(())
    }

    /// Append a named event marker to the currently open element header.
    /// Markers come after attributes and before children.
    pub fn add_named_event(
        &mut self,
        event_type: impl Into<String>,
        assigned_name: impl Into<String>,
    ) -> Result<(), StructuralError> {
        let event_type = event_type.into();
        let valid = match self.open.last() {
            Some(top) => {
                top.phase != Phase::Children
                    && matches!(self.frames[top.index].kind, FrameKind::Element { .. })
            }
            None => false,
        };
        if !valid {
            return Err(StructuralError::MisplacedNamedEvent { event_type });
        }
        if let Some(top) = self.open.last_mut() {
            top.phase = Phase::Markers;
        }
        self.frames.push(Frame {
            sequence: 0,
            kind: FrameKind::NamedEventMarker {
                event_type,
                assigned_name: assigned_name.into(),
            },
        });
        Ok(())
    }

    /// Capture a reference to the enclosing element. The callback runs
    /// exactly once, when the element is first inserted.
    pub fn add_element_reference_capture(
        &mut self,
        sequence: Sequence,
        callback: ElementReferenceAction,
    ) -> Result<(), StructuralError> {
        let valid = self
            .open
            .last()
            .is_some_and(|top| matches!(self.frames[top.index].kind, FrameKind::Element { .. }));
        if !valid {
            return Err(StructuralError::MisplacedReferenceCapture);
        }
        self.enter_children();
        self.frames.push(Frame {
            sequence,
            kind: FrameKind::ElementReferenceCapture {
                capture_id: 0,
                callback,
            },
        });
        Ok(())
    }

    /// Capture a reference to the enclosing component once it has been
    /// instantiated.
    pub fn add_component_reference_capture(
        &mut self,
        sequence: Sequence,
        callback: ComponentReferenceAction,
    ) -> Result<(), StructuralError> {
        let parent_frame_index = match self.open.last() {
            Some(top) if matches!(self.frames[top.index].kind, FrameKind::Component { .. }) => {
                top.index
            }
            _ => return Err(StructuralError::MisplacedReferenceCapture),
        };
        self.enter_children();
        self.frames.push(Frame {
            sequence,
            kind: FrameKind::ComponentReferenceCapture {
                parent_frame_index,
                callback,
            },
        });
        Ok(())
    }

    /// Assign a reconciliation key to the currently open element or
    /// component.
    pub fn set_key(&mut self, key: Key) -> Result<(), StructuralError> {
        match self.open.last() {
            Some(top)
                if matches!(
                    self.frames[top.index].kind,
                    FrameKind::Element { .. } | FrameKind::Component { .. }
                ) =>
            {
                let index = top.index;
                self.frames[index].set_key(key);
                Ok(())
            }
            _ => Err(StructuralError::MisplacedKey),
        }
    }

    /// Tag the currently open component frame with a render mode.
    pub fn set_render_mode(&mut self, mode: RenderMode) -> Result<(), StructuralError> {
        match self.open.last() {
            Some(top) => {
                let index = top.index;
                match &mut self.frames[index].kind {
                    FrameKind::Component { render_mode, .. } => {
                        *render_mode = Some(mode);
                        Ok(())
                    }
                    _ => Err(StructuralError::MisplacedRenderMode),
                }
            }
            None => Err(StructuralError::MisplacedRenderMode),
        }
    }

    /// Finish building; all opened frames must have been closed.
    pub fn finish(self) -> Result<Vec<Frame>, StructuralError> {
        if !self.open.is_empty() {
            return Err(StructuralError::UnclosedFrames {
                count: self.open.len(),
            });
        }
        Ok(self.frames)
    }

    pub fn frames(&self) -> &[Frame] {
        &self.frames
    }

    fn enter_children(&mut self) {
        if let Some(top) = self.open.last_mut() {
            top.phase = Phase::Children;
        }
    }

    fn close(
        &mut self,
        expected: &'static str,
        matches_kind: impl Fn(&FrameKind) -> bool,
    ) -> Result<(), StructuralError> {
        let top = match self.open.pop() {
            Some(top) => top,
            None => return Err(StructuralError::CloseWithoutOpen),
        };
        if !matches_kind(&self.frames[top.index].kind) {
            let found = self.frames[top.index].kind_name();
            return Err(StructuralError::CloseMismatch { expected, found });
        }
        let len = self.frames.len() - top.index;
        self.frames[top.index].set_subtree_len(len);
        Ok(())
    }
}

impl Default for TreeBuilder {
    fn default() -> Self {
        Self::new()
    }
}
