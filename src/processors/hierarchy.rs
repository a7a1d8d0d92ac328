//! Parent/child hierarchy construction for heuristic mode.
//!
//! Every element's parent is the smallest other element whose box contains it
//! (with a small margin). Elements without a container become roots. Media
//! elements (image, logo, icon) are stored as assets and attached to their
//! parent as content instead of becoming structural children; anything whose
//! container is a media element moves up to the nearest non-media ancestor.

use crate::core::constants::{CONTAINMENT_MARGIN, MEDIA_LABELS};
use crate::core::errors::PipelineResult;
use crate::domain::{
    ComponentDescription, ComponentNode, ComponentTree, Content, HeuristicElement, MediaRef,
};
use tracing::{debug, warn};

/// Destination for media assets found while building the hierarchy.
pub trait MediaStore {
    /// Stores the asset for `element` and returns its path relative to the
    /// final output directory, or `None` when the element covers no pixels.
    fn store(&mut self, element: &HeuristicElement) -> PipelineResult<Option<String>>;
}

/// A [`MediaStore`] that writes nothing and hands out `assets/image_{n}.png` paths.
#[derive(Debug, Default)]
pub struct PlaceholderMedia {
    next: usize,
}

impl MediaStore for PlaceholderMedia {
    fn store(&mut self, _element: &HeuristicElement) -> PipelineResult<Option<String>> {
        let path = format!("assets/image_{}.png", self.next);
        self.next += 1;
        Ok(Some(path))
    }
}

/// Returns `true` for labels treated as media content.
pub fn is_media_label(label: &str) -> bool {
    let label = label.to_lowercase();
    MEDIA_LABELS.contains(&label.as_str())
}

/// Index of the immediate container of `elements[index]`, if any.
///
/// Among all boxes containing the element the smallest one wins, ties going to
/// the earliest. When two boxes contain each other (duplicates, or near
/// duplicates within the margin) only the earlier one may be the parent.
pub fn find_parent_index(index: usize, elements: &[HeuristicElement]) -> Option<usize> {
    let element = &elements[index];

    elements
        .iter()
        .enumerate()
        .filter(|&(j, other)| {
            j != index
                && element.bbox.is_inside(&other.bbox, CONTAINMENT_MARGIN)
                && !(j > index && other.bbox.is_inside(&element.bbox, CONTAINMENT_MARGIN))
        })
        .min_by_key(|&(j, other)| (other.bbox.area(), j))
        .map(|(j, _)| j)
}

/// Cuts parent links that close a cycle, making the first node met on each
/// cycle a root.
fn break_cycles(parents: &mut [Option<usize>]) {
    for start in 0..parents.len() {
        let mut seen = vec![start];
        let mut current = parents[start];
        while let Some(p) = current {
            if p == start {
                warn!(index = start, "breaking containment cycle");
                parents[start] = None;
                break;
            }
            if seen.contains(&p) {
                break;
            }
            seen.push(p);
            current = parents[p];
        }
    }
}

struct Slot<'a> {
    element: &'a HeuristicElement,
    parent: Option<usize>,
    children: Vec<usize>,
    media: Vec<usize>,
    is_media: bool,
}

/// Builds the component hierarchy from a flat element list.
///
/// Component ids are `comp_{n}` with `n` the 1-based position in `elements`.
pub fn build_hierarchy(
    elements: &[HeuristicElement],
    store: &mut dyn MediaStore,
) -> PipelineResult<ComponentTree> {
    let mut slots: Vec<Slot<'_>> = elements
        .iter()
        .map(|element| Slot {
            element,
            parent: None,
            children: Vec::new(),
            media: Vec::new(),
            is_media: is_media_label(&element.label),
        })
        .collect();

    let mut parents: Vec<Option<usize>> = (0..elements.len())
        .map(|index| find_parent_index(index, elements))
        .collect();
    break_cycles(&mut parents);

    let mut media_refs: Vec<Option<MediaRef>> = vec![None; slots.len()];
    for (index, slot) in slots.iter_mut().enumerate() {
        if !slot.is_media {
            continue;
        }
        let element = slot.element;
        let Some(file_path) = store.store(element)? else {
            warn!(
                label = %element.label,
                bbox = ?element.bbox,
                "media element covers no pixels, keeping it as a component"
            );
            slot.is_media = false;
            continue;
        };
        media_refs[index] = Some(MediaRef {
            original_label: element.label.clone(),
            coordinates: element.bbox.into(),
            file_path,
            kind: element.label.to_lowercase(),
            styles: None,
            layout: None,
        });
    }

    // Media never hosts components, so everything attaches to the nearest
    // structural ancestor.
    let attach_to: Vec<Option<usize>> = (0..slots.len())
        .map(|index| {
            let mut current = parents[index];
            while let Some(p) = current {
                if !slots[p].is_media {
                    return Some(p);
                }
                current = parents[p];
            }
            None
        })
        .collect();
    for (index, parent) in attach_to.into_iter().enumerate() {
        let Some(parent) = parent else {
            continue;
        };
        slots[index].parent = Some(parent);
        if slots[index].is_media {
            slots[parent].media.push(index);
        } else {
            slots[parent].children.push(index);
        }
    }

    fn materialize(
        index: usize,
        slots: &[Slot<'_>],
        media_refs: &[Option<MediaRef>],
    ) -> ComponentNode {
        let slot = &slots[index];
        let element = slot.element;

        let media: Vec<MediaRef> = std::iter::once(index)
            .chain(slot.media.iter().copied())
            .filter_map(|i| media_refs[i].clone())
            .collect();
        let children: Vec<ComponentNode> = slot
            .children
            .iter()
            .map(|&child| materialize(child, slots, media_refs))
            .collect();

        ComponentNode {
            id: format!("comp_{}", index + 1),
            component_type: element.label.clone(),
            coordinates: element.bbox.into(),
            description: ComponentDescription {
                component_type: element.label.clone(),
                description: element.description.clone(),
                content: Content {
                    text: element.text.clone(),
                    media,
                },
                children,
                styles: None,
                layout: None,
            },
        }
    }

    let roots: Vec<ComponentNode> = (0..slots.len())
        .filter(|&i| slots[i].parent.is_none())
        .map(|i| materialize(i, &slots, &media_refs))
        .collect();

    let tree = ComponentTree::new(roots);
    debug!(
        elements = elements.len(),
        roots = tree.len(),
        nodes = tree.node_count(),
        "component hierarchy built"
    );
    Ok(tree)
}
