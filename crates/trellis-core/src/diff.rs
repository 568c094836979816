use indexmap::IndexMap;

use crate::batch::{BatchBuilder, ComponentDiff};
use crate::edits::{Edit, NamedEventChange, NamedEventChangeKind};
use crate::errors::{RenderError, StructuralError};
use crate::frames::{
    next_sibling_index, AttributeValue, ComponentDescriptor, ComponentRef, ElementRef, EventCallback,
    Frame, FrameKind, RenderMode,
};
use crate::params::ParameterCollection;
use crate::{ComponentId, EventHandlerId, Key, SYSTEM_ADDED_ATTRIBUTE_SEQUENCE};

/// The renderer-side services the diff needs while walking trees:
/// instantiating child components, forwarding parameters and minting ids.
pub(crate) trait DiffEnv {
    fn instantiate_component(
        &self,
        descriptor: &ComponentDescriptor,
        render_mode: Option<RenderMode>,
        parent: ComponentId,
    ) -> Result<ComponentId, RenderError>;

    fn deliver_initial_parameters(&self, component_id: ComponentId, parameters: ParameterCollection);

    fn update_parameters(&self, component_id: ComponentId, parameters: ParameterCollection);

    fn assign_event_handler(&self, callback: &EventCallback, owner: ComponentId) -> EventHandlerId;

    fn next_element_reference_id(&self) -> u64;
}

/// Compare a component's previous frame tree against its new one, emitting
/// the edit script and batch-level bookkeeping (reference frames, disposal
/// queues, named event changes). The new tree is mutated in place: child
/// component ids, event handler ids and capture ids are written into it,
/// and retained handler-valued attributes are copied over from the old
/// tree so their ids survive.
pub(crate) fn compute_diff(
    env: &dyn DiffEnv,
    batch: &mut BatchBuilder,
    component_id: ComponentId,
    old_tree: &[Frame],
    new_tree: &mut [Frame],
) -> Result<ComponentDiff, RenderError> {
    let old_len = old_tree.len();
    let new_len = new_tree.len();
    let mut ctx = DiffContext {
        env,
        batch,
        component_id,
        old_tree,
        new_tree,
        edits: Vec::new(),
        sibling_index: 0,
    };
    append_diff_entries_for_range(&mut ctx, 0, old_len, 0, new_len)?;
    Ok(ComponentDiff {
        component_id,
        edits: ctx.edits,
    })
}

/// Queue everything in `frames` that owns renderer-side resources for
/// disposal: child components, event handler ids, named event markers.
pub(crate) fn dispose_frames(batch: &mut BatchBuilder, component_id: ComponentId, frames: &[Frame]) {
    dispose_frames_in_range(batch, component_id, frames, 0, frames.len());
}

struct DiffContext<'a> {
    env: &'a dyn DiffEnv,
    batch: &'a mut BatchBuilder,
    component_id: ComponentId,
    old_tree: &'a [Frame],
    new_tree: &'a mut [Frame],
    edits: Vec<Edit>,
    sibling_index: usize,
}

enum DiffAction {
    Match { new_index: usize },
    Insert,
    Delete,
}

#[derive(Clone, Copy, Default)]
struct KeyedItemInfo {
    old_index: Option<usize>,
    new_index: Option<usize>,
    old_sibling_index: Option<usize>,
    new_sibling_index: Option<usize>,
}

fn append_diff_entries_for_range(
    ctx: &mut DiffContext<'_>,
    old_start_index: usize,
    old_end_index_excl: usize,
    new_start_index: usize,
    new_end_index_excl: usize,
) -> Result<(), RenderError> {
    let orig_old_start = old_start_index;
    let orig_new_start = new_start_index;
    let mut old_start = old_start_index;
    let mut new_start = new_start_index;
    let mut has_more_old = old_end_index_excl > old_start;
    let mut has_more_new = new_end_index_excl > new_start;
    let mut prev_old_seq: i64 = -1;
    let mut prev_new_seq: i64 = -1;
    let mut keyed_item_infos: Option<IndexMap<Key, KeyedItemInfo>> = None;

    while has_more_old || has_more_new {
        let (old_seq, old_key) = if has_more_old {
            let frame = &ctx.old_tree[old_start];
            (frame.sequence as i64, nonzero_key(frame.key()))
        } else {
            (i64::MAX, None)
        };
        let (new_seq, new_key) = if has_more_new {
            let frame = &ctx.new_tree[new_start];
            (frame.sequence as i64, nonzero_key(frame.key()))
        } else {
            (i64::MAX, None)
        };

        let action;
        if old_key.is_some() || new_key.is_some() {
            // A key on either side means we match by key, not sequence.
            // Build the lookup eagerly so duplicate keys are rejected even
            // when every key happens to line up.
            if keyed_item_infos.is_none() {
                keyed_item_infos = Some(build_key_lookup(
                    ctx,
                    orig_old_start,
                    old_end_index_excl,
                    orig_new_start,
                    new_end_index_excl,
                )?);
            }
            let map = keyed_item_infos
                .as_mut()
                .expect("key lookup just built");

            if old_key.is_some() && old_key == new_key {
                action = DiffAction::Match {
                    new_index: new_start,
                };
            } else {
                let old_info = old_key
                    .and_then(|k| map.get(&k).copied())
                    .unwrap_or_default();
                let new_info = new_key
                    .and_then(|k| map.get(&k).copied())
                    .unwrap_or_default();

                match (old_key, new_key, old_info.new_index, new_info.old_index) {
                    // Both keys exist in both trees: a move. The recipient
                    // still has the old frame at the current sibling index,
                    // so update its descendants in place and record the
                    // permutation for after the loop. Sibling indices only
                    // grow, so the values recorded here stay correct.
                    (Some(old_k), Some(new_k), Some(old_key_new_index), Some(_)) => {
                        action = DiffAction::Match {
                            new_index: old_key_new_index,
                        };
                        if let Some(entry) = map.get_mut(&old_k) {
                            entry.old_sibling_index = Some(ctx.sibling_index);
                        }
                        if let Some(entry) = map.get_mut(&new_k) {
                            entry.new_sibling_index = Some(ctx.sibling_index);
                        }
                    }
                    _ => {
                        let new_key_in_old_tree = new_info.old_index.is_some();
                        if !has_more_old {
                            action = DiffAction::Insert;
                        } else if !has_more_new || new_key_in_old_tree {
                            action = DiffAction::Delete;
                        } else {
                            action = DiffAction::Insert;
                        }
                    }
                }
            }
        } else if old_seq == new_seq {
            action = DiffAction::Match {
                new_index: new_start,
            };
        } else {
            // Neither side is keyed and the sequences differ. Decide which
            // side to consume based on loop-back detection: a sequence
            // lower than its predecessor means the frame source looped.
            let old_looped_back = old_seq <= prev_old_seq;
            let new_looped_back = new_seq <= prev_new_seq;
            if old_looped_back == new_looped_back {
                // Same loop block on both sides: preordered merge join,
                // picking whichever side brings us back in sync sooner.
                action = if new_seq < old_seq {
                    DiffAction::Insert
                } else {
                    DiffAction::Delete
                };
                if old_looped_back {
                    prev_old_seq = -1;
                    prev_new_seq = -1;
                }
            } else if old_looped_back {
                // The new side either has extra trailing frames in the
                // current loop block (insert them) or the old side has
                // trailing loop blocks that went away (delete those).
                let mut new_loops_back_later = false;
                for test_index in new_start + 1..new_end_index_excl {
                    if (ctx.new_tree[test_index].sequence as i64) < new_seq {
                        new_loops_back_later = true;
                        break;
                    }
                }
                action = if new_loops_back_later {
                    DiffAction::Insert
                } else {
                    DiffAction::Delete
                };
            } else {
                let mut old_loops_back_later = false;
                for test_index in old_start + 1..old_end_index_excl {
                    if (ctx.old_tree[test_index].sequence as i64) < old_seq {
                        old_loops_back_later = true;
                        break;
                    }
                }
                action = if old_loops_back_later {
                    DiffAction::Delete
                } else {
                    DiffAction::Insert
                };
            }
        }

        match action {
            DiffAction::Match { new_index } => {
                append_diff_entries_for_frames_with_same_sequence(ctx, old_start, new_index)?;
                old_start = next_sibling_index(ctx.old_tree, old_start);
                new_start = next_sibling_index(ctx.new_tree, new_start);
                has_more_old = old_end_index_excl > old_start;
                has_more_new = new_end_index_excl > new_start;
                prev_old_seq = old_seq;
                prev_new_seq = new_seq;
            }
            DiffAction::Insert => {
                insert_new_frame(ctx, new_start)?;
                new_start = next_sibling_index(ctx.new_tree, new_start);
                has_more_new = new_end_index_excl > new_start;
                prev_new_seq = new_seq;
            }
            DiffAction::Delete => {
                remove_old_frame(ctx, old_start)?;
                old_start = next_sibling_index(ctx.old_tree, old_start);
                has_more_old = old_end_index_excl > old_start;
                prev_old_seq = old_seq;
            }
        }
    }

    if let Some(map) = keyed_item_infos {
        let mut has_permutations = false;
        for info in map.values() {
            if let (Some(from), Some(to)) = (info.old_sibling_index, info.new_sibling_index) {
                has_permutations = true;
                ctx.edits.push(Edit::PermutationListEntry {
                    from_sibling_index: from,
                    to_sibling_index: to,
                });
            }
        }
        if has_permutations {
            // An explicit terminator is much easier for the recipient than
            // inferring where the list ends.
            ctx.edits.push(Edit::PermutationListEnd);
        }
    }

    Ok(())
}

fn nonzero_key(key: Key) -> Option<Key> {
    if key == 0 {
        None
    } else {
        Some(key)
    }
}

fn build_key_lookup(
    ctx: &DiffContext<'_>,
    mut old_start: usize,
    old_end_index_excl: usize,
    mut new_start: usize,
    new_end_index_excl: usize,
) -> Result<IndexMap<Key, KeyedItemInfo>, RenderError> {
    let mut result: IndexMap<Key, KeyedItemInfo> = IndexMap::new();

    while old_start < old_end_index_excl {
        let frame = &ctx.old_tree[old_start];
        if let Some(key) = nonzero_key(frame.key()) {
            if result.contains_key(&key) {
                return Err(StructuralError::DuplicateKey { key }.into());
            }
            result.insert(
                key,
                KeyedItemInfo {
                    old_index: Some(old_start),
                    ..KeyedItemInfo::default()
                },
            );
        }
        old_start = next_sibling_index(ctx.old_tree, old_start);
    }

    while new_start < new_end_index_excl {
        let frame = &ctx.new_tree[new_start];
        if let Some(key) = nonzero_key(frame.key()) {
            match result.get_mut(&key) {
                Some(existing) => {
                    if existing.new_index.is_some() {
                        return Err(StructuralError::DuplicateKey { key }.into());
                    }
                    existing.new_index = Some(new_start);
                }
                None => {
                    result.insert(
                        key,
                        KeyedItemInfo {
                            new_index: Some(new_start),
                            ..KeyedItemInfo::default()
                        },
                    );
                }
            }
        }
        new_start = next_sibling_index(ctx.new_tree, new_start);
    }

    Ok(result)
}

fn append_diff_entries_for_frames_with_same_sequence(
    ctx: &mut DiffContext<'_>,
    old_frame_index: usize,
    new_frame_index: usize,
) -> Result<(), RenderError> {
    // Positionally matched frames of different kinds can happen with
    // hand-written builder logic or when dissimilar frames match by key.
    // Treat them as completely unrelated.
    if std::mem::discriminant(&ctx.old_tree[old_frame_index].kind)
        != std::mem::discriminant(&ctx.new_tree[new_frame_index].kind)
    {
        insert_new_frame(ctx, new_frame_index)?;
        remove_old_frame(ctx, old_frame_index)?;
        return Ok(());
    }

    match &ctx.new_tree[new_frame_index].kind {
        FrameKind::Text { content } => {
            let changed = ctx.old_tree[old_frame_index].text_content() != Some(content.as_str());
            if changed {
                let reference_frame_index = append_reference_frame(ctx, new_frame_index);
                ctx.edits.push(Edit::UpdateText {
                    sibling_index: ctx.sibling_index,
                    reference_frame_index,
                });
            }
            ctx.sibling_index += 1;
        }
        FrameKind::Markup { content } => {
            let changed = ctx.old_tree[old_frame_index].text_content() != Some(content.as_str());
            if changed {
                let reference_frame_index = append_reference_frame(ctx, new_frame_index);
                ctx.edits.push(Edit::UpdateMarkup {
                    sibling_index: ctx.sibling_index,
                    reference_frame_index,
                });
            }
            ctx.sibling_index += 1;
        }
        FrameKind::Element { .. } => {
            let same_name = ctx.old_tree[old_frame_index].element_name()
                == ctx.new_tree[new_frame_index].element_name();
            if same_name {
                diff_matched_element(ctx, old_frame_index, new_frame_index)?;
            } else {
                // Elements with different names are completely unrelated.
                remove_old_frame(ctx, old_frame_index)?;
                insert_new_frame(ctx, new_frame_index)?;
            }
        }
        FrameKind::Region { subtree_len } => {
            // Regions are transparent: recurse within the same sibling
            // list, no step-in and no sibling advance for the region
            // frame itself.
            let new_subtree_len = *subtree_len;
            let old_subtree_len = ctx.old_tree[old_frame_index].subtree_len();
            append_diff_entries_for_range(
                ctx,
                old_frame_index + 1,
                old_frame_index + old_subtree_len,
                new_frame_index + 1,
                new_frame_index + new_subtree_len,
            )?;
        }
        FrameKind::Component { descriptor, .. } => {
            let same_type = match &ctx.old_tree[old_frame_index].kind {
                FrameKind::Component {
                    descriptor: old_descriptor,
                    ..
                } => old_descriptor.same_component_type(descriptor),
                _ => false,
            };
            if same_type {
                update_retained_child_component(ctx, old_frame_index, new_frame_index);
                ctx.sibling_index += 1;
            } else {
                // Child components of different types are unrelated.
                remove_old_frame(ctx, old_frame_index)?;
                insert_new_frame(ctx, new_frame_index)?;
            }
        }
        FrameKind::ElementReferenceCapture { .. } => {
            // The capture action runs only once per element, so a retained
            // capture frame needs no work.
        }
        FrameKind::Attribute { .. }
        | FrameKind::ComponentReferenceCapture { .. }
        | FrameKind::NamedEventMarker { .. } => {
            // Attributes and markers are diffed as part of their owner's
            // header; component reference captures live inside component
            // subtrees the sibling walk never descends into.
            return Err(StructuralError::UnexpectedFrame {
                context: "matching sibling frames",
            }
            .into());
        }
    }
    Ok(())
}

fn diff_matched_element(
    ctx: &mut DiffContext<'_>,
    old_frame_index: usize,
    new_frame_index: usize,
) -> Result<(), RenderError> {
    let old_subtree_end = old_frame_index + ctx.old_tree[old_frame_index].subtree_len();
    let new_subtree_end = new_frame_index + ctx.new_tree[new_frame_index].subtree_len();

    let old_attrs_end = attributes_end(ctx.old_tree, old_frame_index + 1, old_subtree_end);
    let new_attrs_end = attributes_end(ctx.new_tree, new_frame_index + 1, new_subtree_end);

    append_attribute_diff_entries_for_range(
        ctx,
        old_frame_index + 1,
        old_attrs_end,
        new_frame_index + 1,
        new_attrs_end,
    )?;

    let old_markers_end = markers_end(ctx.old_tree, old_attrs_end, old_subtree_end);
    let new_markers_end = markers_end(ctx.new_tree, new_attrs_end, new_subtree_end);
    append_named_event_diff(
        ctx,
        old_attrs_end,
        old_markers_end,
        new_attrs_end,
        new_markers_end,
    );

    let has_children_to_process =
        old_subtree_end > old_markers_end || new_subtree_end > new_markers_end;
    if has_children_to_process {
        ctx.edits.push(Edit::StepIn {
            sibling_index: ctx.sibling_index,
        });
        let prev_sibling_index = ctx.sibling_index;
        ctx.sibling_index = 0;
        append_diff_entries_for_range(
            ctx,
            old_markers_end,
            old_subtree_end,
            new_markers_end,
            new_subtree_end,
        )?;
        append_step_out(ctx);
        ctx.sibling_index = prev_sibling_index + 1;
    } else {
        ctx.sibling_index += 1;
    }
    Ok(())
}

/// Attributes are conceptually unordered, so the diff avoids meaningless
/// reorderings: a sorted merge-join handles the common case and a
/// map-based join takes over when sequence numbers stop being reliable.
fn append_attribute_diff_entries_for_range(
    ctx: &mut DiffContext<'_>,
    mut old_start: usize,
    old_end_index_excl: usize,
    mut new_start: usize,
    new_end_index_excl: usize,
) -> Result<(), RenderError> {
    let mut has_more_old = old_end_index_excl > old_start;
    let mut has_more_new = new_end_index_excl > new_start;

    while has_more_old || has_more_new {
        let old_seq = if has_more_old {
            ctx.old_tree[old_start].sequence as i64
        } else {
            i64::MAX
        };
        let new_seq = if has_more_new {
            ctx.new_tree[new_start].sequence as i64
        } else {
            i64::MAX
        };
        let same_name = has_more_old
            && has_more_new
            && ctx.old_tree[old_start].attribute_name()
                == ctx.new_tree[new_start].attribute_name();

        if old_seq == new_seq && same_name {
            append_diff_entries_for_attribute_frame(ctx, old_start, new_start)?;
            old_start += 1;
            new_start += 1;
            has_more_old = old_end_index_excl > old_start;
            has_more_new = new_end_index_excl > new_start;
        } else if old_seq < new_seq {
            if old_seq == SYSTEM_ADDED_ATTRIBUTE_SEQUENCE as i64 {
                // System-added attributes carry no usable sequence; only
                // the map-based join produces a minimal diff for them.
                return append_attribute_diff_entries_for_range_slow(
                    ctx,
                    old_start,
                    old_end_index_excl,
                    new_start,
                    new_end_index_excl,
                );
            }
            remove_old_frame(ctx, old_start)?;
            old_start += 1;
            has_more_old = old_end_index_excl > old_start;
        } else if old_seq > new_seq {
            insert_new_frame(ctx, new_start)?;
            new_start += 1;
            has_more_new = new_end_index_excl > new_start;
        } else {
            // Same sequence, different names: merge-join can't cope.
            return append_attribute_diff_entries_for_range_slow(
                ctx,
                old_start,
                old_end_index_excl,
                new_start,
                new_end_index_excl,
            );
        }
    }
    Ok(())
}

fn append_attribute_diff_entries_for_range_slow(
    ctx: &mut DiffContext<'_>,
    old_start: usize,
    old_end_index_excl: usize,
    new_start: usize,
    new_end_index_excl: usize,
) -> Result<(), RenderError> {
    let mut attribute_set: IndexMap<String, usize> = IndexMap::new();
    for i in new_start..new_end_index_excl {
        if let Some(name) = ctx.new_tree[i].attribute_name() {
            attribute_set.insert(name.to_owned(), i);
        }
    }

    for i in old_start..old_end_index_excl {
        let matched = ctx.old_tree[i]
            .attribute_name()
            .and_then(|name| attribute_set.shift_remove(name));
        match matched {
            Some(new_index) => append_diff_entries_for_attribute_frame(ctx, i, new_index)?,
            None => remove_old_frame(ctx, i)?,
        }
    }

    for (_, new_index) in attribute_set {
        insert_new_frame(ctx, new_index)?;
    }
    Ok(())
}

// Only called for attributes with the same name.
fn append_diff_entries_for_attribute_frame(
    ctx: &mut DiffContext<'_>,
    old_frame_index: usize,
    new_frame_index: usize,
) -> Result<(), RenderError> {
    let (value_changed, old_handler_id) = match (
        &ctx.old_tree[old_frame_index].kind,
        &ctx.new_tree[new_frame_index].kind,
    ) {
        (
            FrameKind::Attribute {
                value: old_value,
                event_handler_id,
                ..
            },
            FrameKind::Attribute {
                value: new_value, ..
            },
        ) => (!old_value.value_equal(new_value), *event_handler_id),
        _ => {
            return Err(StructuralError::UnexpectedFrame {
                context: "diffing attribute frames",
            }
            .into())
        }
    };

    if value_changed {
        initialize_new_attribute_frame(ctx, new_frame_index);
        let reference_frame_index = append_reference_frame(ctx, new_frame_index);
        ctx.edits.push(Edit::SetAttribute {
            sibling_index: ctx.sibling_index,
            reference_frame_index,
        });
        // A replaced handler id is retired with this batch; the new id
        // took its place in the committed tree.
        if old_handler_id > 0 {
            ctx.batch.disposed_event_handler_ids.push(old_handler_id);
        }
    } else if old_handler_id > 0 {
        // Unchanged handler: copy the old frame over the new one so the
        // existing id survives instead of being disposed and re-minted.
        ctx.new_tree[new_frame_index] = ctx.old_tree[old_frame_index].clone();
    }
    Ok(())
}

fn insert_new_frame(ctx: &mut DiffContext<'_>, new_frame_index: usize) -> Result<(), RenderError> {
    match &ctx.new_tree[new_frame_index].kind {
        FrameKind::Attribute { .. } => {
            initialize_new_attribute_frame(ctx, new_frame_index);
            let reference_frame_index = append_reference_frame(ctx, new_frame_index);
            ctx.edits.push(Edit::SetAttribute {
                sibling_index: ctx.sibling_index,
                reference_frame_index,
            });
        }
        FrameKind::Element { .. } | FrameKind::Component { .. } => {
            initialize_new_subtree(ctx, new_frame_index)?;
            let subtree_len = ctx.new_tree[new_frame_index].subtree_len();
            let reference_frame_index = ctx.batch.reference_frames.len();
            ctx.batch
                .reference_frames
                .extend_from_slice(&ctx.new_tree[new_frame_index..new_frame_index + subtree_len]);
            ctx.edits.push(Edit::PrependFrame {
                sibling_index: ctx.sibling_index,
                reference_frame_index,
            });
            ctx.sibling_index += 1;
        }
        FrameKind::Region { subtree_len } => {
            let end_index_excl = new_frame_index + subtree_len;
            let mut child_index = new_frame_index + 1;
            while child_index < end_index_excl {
                insert_new_frame(ctx, child_index)?;
                child_index = next_sibling_index(ctx.new_tree, child_index);
            }
        }
        FrameKind::Text { .. } | FrameKind::Markup { .. } => {
            let reference_frame_index = append_reference_frame(ctx, new_frame_index);
            ctx.edits.push(Edit::PrependFrame {
                sibling_index: ctx.sibling_index,
                reference_frame_index,
            });
            ctx.sibling_index += 1;
        }
        FrameKind::ElementReferenceCapture { .. } => {
            initialize_new_element_reference_capture_frame(ctx, new_frame_index);
        }
        FrameKind::ComponentReferenceCapture { .. } => {
            initialize_new_component_reference_capture_frame(ctx, new_frame_index)?;
        }
        FrameKind::NamedEventMarker { .. } => {
            return Err(StructuralError::UnexpectedFrame {
                context: "inserting frames",
            }
            .into());
        }
    }
    Ok(())
}

fn remove_old_frame(ctx: &mut DiffContext<'_>, old_frame_index: usize) -> Result<(), RenderError> {
    match &ctx.old_tree[old_frame_index].kind {
        FrameKind::Attribute {
            name,
            event_handler_id,
            ..
        } => {
            ctx.edits.push(Edit::RemoveAttribute {
                sibling_index: ctx.sibling_index,
                name: name.clone(),
            });
            if *event_handler_id > 0 {
                ctx.batch.disposed_event_handler_ids.push(*event_handler_id);
            }
        }
        FrameKind::Element { subtree_len, .. } | FrameKind::Component { subtree_len, .. } => {
            let end_index_excl = old_frame_index + subtree_len;
            dispose_frames_in_range(
                ctx.batch,
                ctx.component_id,
                ctx.old_tree,
                old_frame_index,
                end_index_excl,
            );
            ctx.edits.push(Edit::RemoveFrame {
                sibling_index: ctx.sibling_index,
            });
        }
        FrameKind::Region { subtree_len } => {
            let end_index_excl = old_frame_index + subtree_len;
            let mut child_index = old_frame_index + 1;
            while child_index < end_index_excl {
                remove_old_frame(ctx, child_index)?;
                child_index = next_sibling_index(ctx.old_tree, child_index);
            }
        }
        FrameKind::Text { .. } | FrameKind::Markup { .. } => {
            ctx.edits.push(Edit::RemoveFrame {
                sibling_index: ctx.sibling_index,
            });
        }
        FrameKind::ElementReferenceCapture { .. }
        | FrameKind::ComponentReferenceCapture { .. }
        | FrameKind::NamedEventMarker { .. } => {
            return Err(StructuralError::UnexpectedFrame {
                context: "removing frames",
            }
            .into());
        }
    }
    Ok(())
}

fn update_retained_child_component(
    ctx: &mut DiffContext<'_>,
    old_component_index: usize,
    new_component_index: usize,
) {
    // Preserve the live component instance.
    let child_id = ctx.old_tree[old_component_index].component_id();
    if let FrameKind::Component { component_id, .. } = &mut ctx.new_tree[new_component_index].kind {
        *component_id = child_id;
    }

    // Skip the parameter update only when every parameter is definitely
    // unchanged; reference-typed values always re-deliver and it is up to
    // the recipient to do its own change detection.
    let old_parameters = ParameterCollection::capture(ctx.old_tree, old_component_index);
    let new_parameters = ParameterCollection::capture(ctx.new_tree, new_component_index);
    if !new_parameters.definitely_equals(&old_parameters) {
        if let Some(child_id) = child_id {
            ctx.env.update_parameters(child_id, new_parameters);
        }
    }
}

/// First index at or after `start` that is not an attribute frame.
fn attributes_end(tree: &[Frame], start: usize, subtree_end: usize) -> usize {
    let mut index = start;
    while index < subtree_end && matches!(tree[index].kind, FrameKind::Attribute { .. }) {
        index += 1;
    }
    index
}

/// First index at or after `start` that is not a named event marker.
fn markers_end(tree: &[Frame], start: usize, subtree_end: usize) -> usize {
    let mut index = start;
    while index < subtree_end && matches!(tree[index].kind, FrameKind::NamedEventMarker { .. }) {
        index += 1;
    }
    index
}

/// Compare the named event markers of a retained element. Changes go on
/// the batch, not into the edit script: the display layer tracks markers
/// by (component, frame index), so a marker that moved or was renamed is
/// reported as a removal plus an addition.
fn append_named_event_diff(
    ctx: &mut DiffContext<'_>,
    old_start: usize,
    old_end_index_excl: usize,
    new_start: usize,
    new_end_index_excl: usize,
) {
    let old_markers = collect_markers(ctx.old_tree, old_start, old_end_index_excl);
    let new_markers = collect_markers(ctx.new_tree, new_start, new_end_index_excl);
    let mut new_matched = vec![false; new_markers.len()];

    for (old_index, old_type, old_name) in &old_markers {
        let matched = new_markers
            .iter()
            .position(|(_, new_type, _)| new_type == old_type);
        match matched {
            Some(pos) => {
                new_matched[pos] = true;
                let (new_index, _, new_name) = &new_markers[pos];
                if new_index == old_index && new_name == old_name {
                    continue;
                }
                push_named_event_change(
                    ctx,
                    NamedEventChangeKind::Removed,
                    *old_index,
                    old_type,
                    old_name,
                );
                push_named_event_change(
                    ctx,
                    NamedEventChangeKind::Added,
                    *new_index,
                    old_type,
                    new_name,
                );
            }
            None => {
                push_named_event_change(
                    ctx,
                    NamedEventChangeKind::Removed,
                    *old_index,
                    old_type,
                    old_name,
                );
            }
        }
    }

    for (pos, (new_index, new_type, new_name)) in new_markers.iter().enumerate() {
        if !new_matched[pos] {
            push_named_event_change(
                ctx,
                NamedEventChangeKind::Added,
                *new_index,
                new_type,
                new_name,
            );
        }
    }
}

fn collect_markers(tree: &[Frame], start: usize, end: usize) -> Vec<(usize, String, String)> {
    let mut markers = Vec::new();
    for (index, frame) in tree.iter().enumerate().take(end).skip(start) {
        if let FrameKind::NamedEventMarker {
            event_type,
            assigned_name,
        } = &frame.kind
        {
            markers.push((index, event_type.clone(), assigned_name.clone()));
        }
    }
    markers
}

fn push_named_event_change(
    ctx: &mut DiffContext<'_>,
    kind: NamedEventChangeKind,
    frame_index: usize,
    event_type: &str,
    assigned_name: &str,
) {
    ctx.batch.named_event_changes.push(NamedEventChange {
        kind,
        component_id: ctx.component_id,
        frame_index,
        event_type: event_type.to_owned(),
        assigned_name: assigned_name.to_owned(),
    });
}

fn append_step_out(ctx: &mut DiffContext<'_>) {
    // A StepOut directly after a StepIn cancels it.
    if matches!(ctx.edits.last(), Some(Edit::StepIn { .. })) {
        ctx.edits.pop();
    } else {
        ctx.edits.push(Edit::StepOut);
    }
}

/// Walk every frame of an inserted subtree, instantiating components,
/// minting handler and capture ids, and reporting named event markers.
fn initialize_new_subtree(
    ctx: &mut DiffContext<'_>,
    frame_index: usize,
) -> Result<(), RenderError> {
    let end_index_excl = frame_index + ctx.new_tree[frame_index].subtree_len();
    for i in frame_index..end_index_excl {
        match &ctx.new_tree[i].kind {
            FrameKind::Component { .. } => initialize_new_component_frame(ctx, i)?,
            FrameKind::Attribute { .. } => initialize_new_attribute_frame(ctx, i),
            FrameKind::ElementReferenceCapture { .. } => {
                initialize_new_element_reference_capture_frame(ctx, i);
            }
            FrameKind::ComponentReferenceCapture { .. } => {
                initialize_new_component_reference_capture_frame(ctx, i)?;
            }
            FrameKind::NamedEventMarker {
                event_type,
                assigned_name,
            } => {
                let (event_type, assigned_name) = (event_type.clone(), assigned_name.clone());
                push_named_event_change(
                    ctx,
                    NamedEventChangeKind::Added,
                    i,
                    &event_type,
                    &assigned_name,
                );
            }
            _ => {}
        }
    }
    Ok(())
}

fn initialize_new_component_frame(
    ctx: &mut DiffContext<'_>,
    frame_index: usize,
) -> Result<(), RenderError> {
    let (descriptor, render_mode) = match &ctx.new_tree[frame_index].kind {
        FrameKind::Component {
            descriptor,
            component_id,
            render_mode,
            ..
        } => {
            if component_id.is_some() {
                return Err(StructuralError::UnexpectedFrame {
                    context: "instantiating a child component that already exists",
                }
                .into());
            }
            (descriptor.clone(), *render_mode)
        }
        _ => {
            return Err(StructuralError::UnexpectedFrame {
                context: "instantiating a child component",
            }
            .into())
        }
    };

    let child_id = ctx
        .env
        .instantiate_component(&descriptor, render_mode, ctx.component_id)?;
    if let FrameKind::Component { component_id, .. } = &mut ctx.new_tree[frame_index].kind {
        *component_id = Some(child_id);
    }

    let initial_parameters = ParameterCollection::capture(ctx.new_tree, frame_index);
    ctx.env.deliver_initial_parameters(child_id, initial_parameters);
    Ok(())
}

/// Handler ids are only minted for callback-valued attributes whose name
/// marks them as events (`on` prefix); callback parameters with other
/// names flow to child components untouched.
fn initialize_new_attribute_frame(ctx: &mut DiffContext<'_>, frame_index: usize) {
    let env = ctx.env;
    let owner = ctx.component_id;
    if let FrameKind::Attribute {
        name,
        value: AttributeValue::Callback(callback),
        event_handler_id,
    } = &mut ctx.new_tree[frame_index].kind
    {
        if *event_handler_id == 0 && name.len() >= 3 && name.starts_with("on") {
            *event_handler_id = env.assign_event_handler(callback, owner);
        }
    }
}

fn initialize_new_element_reference_capture_frame(ctx: &mut DiffContext<'_>, frame_index: usize) {
    let env = ctx.env;
    let mut invoke = None;
    if let FrameKind::ElementReferenceCapture {
        capture_id,
        callback,
    } = &mut ctx.new_tree[frame_index].kind
    {
        let id = env.next_element_reference_id();
        *capture_id = id;
        invoke = Some((callback.clone(), id));
    }
    if let Some((callback, id)) = invoke {
        callback(ElementRef { id });
    }
}

fn initialize_new_component_reference_capture_frame(
    ctx: &mut DiffContext<'_>,
    frame_index: usize,
) -> Result<(), RenderError> {
    let (parent_frame_index, callback) = match &ctx.new_tree[frame_index].kind {
        FrameKind::ComponentReferenceCapture {
            parent_frame_index,
            callback,
        } => (*parent_frame_index, callback.clone()),
        _ => {
            return Err(StructuralError::UnexpectedFrame {
                context: "initializing a component reference capture",
            }
            .into())
        }
    };

    match ctx.new_tree[parent_frame_index].component_id() {
        Some(component_id) => {
            callback(ComponentRef { component_id });
            Ok(())
        }
        // The parent component is always assigned before its capture
        // frames are reached; anything else is a malformed tree.
        None => Err(StructuralError::UnexpectedFrame {
            context: "initializing a component reference capture before its parent",
        }
        .into()),
    }
}

fn append_reference_frame(ctx: &mut DiffContext<'_>, new_frame_index: usize) -> usize {
    let index = ctx.batch.reference_frames.len();
    ctx.batch
        .reference_frames
        .push(ctx.new_tree[new_frame_index].clone());
    index
}

fn dispose_frames_in_range(
    batch: &mut BatchBuilder,
    component_id: ComponentId,
    frames: &[Frame],
    start_index: usize,
    end_index_excl: usize,
) {
    for (index, frame) in frames
        .iter()
        .enumerate()
        .take(end_index_excl)
        .skip(start_index)
    {
        match &frame.kind {
            FrameKind::Component {
                component_id: Some(child_id),
                ..
            } => {
                batch.queue_component_disposal(*child_id);
            }
            FrameKind::Attribute {
                event_handler_id, ..
            } => {
                if *event_handler_id > 0 {
                    batch.disposed_event_handler_ids.push(*event_handler_id);
                }
            }
            FrameKind::NamedEventMarker {
                event_type,
                assigned_name,
            } => {
                batch.named_event_changes.push(NamedEventChange {
                    kind: NamedEventChangeKind::Removed,
                    component_id,
                    frame_index: index,
                    event_type: event_type.clone(),
                    assigned_name: assigned_name.clone(),
                });
            }
            _ => {}
        }
    }
}
