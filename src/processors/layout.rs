//! Percentage-based layout synthesis over the component hierarchy.
//!
//! Each node is positioned relative to its parent (or the 1000x1000 viewport
//! for roots) and to the viewport itself. Nodes are annotated parent before
//! children, at every depth. Media references are placed absolutely in raw
//! normalized units of their owning component.

use crate::core::constants::{CONTAINER_TYPES, FLOATING_TYPES};
use crate::domain::{
    ComponentNode, ComponentTree, LayoutInfo, MediaLayout, MediaRef, PercentOffsets, Positioning,
    Styles, UnitOffsets,
};
use crate::processors::geometry::Box2D;
use tracing::debug;

/// What a child needs to know about its parent and siblings.
#[derive(Debug, Clone)]
pub struct ParentFrame {
    /// Parent box.
    pub bbox: Box2D,
    /// Lower-cased parent type.
    pub type_key: String,
    /// Boxes of all children of the parent, including the node itself.
    pub sibling_boxes: Vec<Box2D>,
}

impl ParentFrame {
    fn of(node: &ComponentNode) -> Self {
        Self {
            bbox: node.bbox(),
            type_key: node.type_key(),
            sibling_boxes: node.children().iter().map(ComponentNode::bbox).collect(),
        }
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// `numerator / denominator * 100`, rounded to two decimals; 0 for an empty frame.
fn percent(numerator: i32, denominator: i32) -> f64 {
    if denominator == 0 {
        return 0.0;
    }
    round2(numerator as f64 / denominator as f64 * 100.0)
}

/// Offsets of `child` from each edge of `frame`, in percent of the frame size.
pub fn percent_offsets(child: &Box2D, frame: &Box2D) -> PercentOffsets {
    PercentOffsets {
        top: percent(child.y_min - frame.y_min, frame.height()),
        right: percent(frame.x_max - child.x_max, frame.width()),
        bottom: percent(frame.y_max - child.y_max, frame.height()),
        left: percent(child.x_min - frame.x_min, frame.width()),
    }
}

/// Returns `true` when `boxes[index]` truly intersects any other entry.
pub fn overlaps_any_sibling(index: usize, boxes: &[Box2D]) -> bool {
    let own = &boxes[index];
    boxes
        .iter()
        .enumerate()
        .any(|(i, other)| i != index && own.overlaps(other))
}

/// Chooses the positioning strategy of a child node.
///
/// Absolute when the node overlaps a sibling, when its type always floats, or
/// when it shares a generic container with other children.
pub fn determine_positioning(index: usize, type_key: &str, parent: &ParentFrame) -> Positioning {
    if overlaps_any_sibling(index, &parent.sibling_boxes) {
        return Positioning::Absolute;
    }
    if FLOATING_TYPES.contains(&type_key) {
        return Positioning::Absolute;
    }
    if CONTAINER_TYPES.contains(&parent.type_key.as_str()) && parent.sibling_boxes.len() > 1 {
        return Positioning::Absolute;
    }
    Positioning::Relative
}

/// Computes the layout of a node with box `bbox`.
///
/// `placement` is `None` for roots, otherwise the node's index among its
/// siblings together with the parent frame.
pub fn compute_layout(
    bbox: &Box2D,
    type_key: &str,
    placement: Option<(usize, &ParentFrame)>,
) -> LayoutInfo {
    let viewport = Box2D::viewport();
    let frame = placement.map_or(viewport, |(_, parent)| parent.bbox);

    let position_parent = percent_offsets(bbox, &frame);
    let position_body = percent_offsets(bbox, &viewport);
    let width_percent = percent(bbox.width(), frame.width());
    let height_percent = percent(bbox.height(), frame.height());

    let positioning = match placement {
        Some((index, parent)) => determine_positioning(index, type_key, parent),
        None => Positioning::Relative,
    };

    let mut classes = vec![
        positioning.to_string(),
        format!("w-[{width_percent}%]"),
        format!("h-[{height_percent}%]"),
    ];
    if positioning == Positioning::Absolute {
        let p = &position_parent;
        classes.push(if p.top < p.bottom {
            format!("top-[{}%]", p.top)
        } else {
            format!("bottom-[{}%]", p.bottom)
        });
        classes.push(if p.left < p.right {
            format!("left-[{}%]", p.left)
        } else {
            format!("right-[{}%]", p.right)
        });
    }

    LayoutInfo {
        position_parent,
        position_body,
        positioning,
        width_percent,
        height_percent,
        tailwind_classes: classes.join(" "),
    }
}

/// Places a media reference inside its owning component, in raw units.
pub fn media_layout(media: &MediaRef, owner: &Box2D) -> MediaLayout {
    let m = media.coordinates.to_box();
    let viewport = Box2D::viewport();
    let position_parent = UnitOffsets {
        top: m.y_min - owner.y_min,
        right: owner.x_max - m.x_max,
        bottom: owner.y_max - m.y_max,
        left: m.x_min - owner.x_min,
    };
    let position_body = UnitOffsets {
        top: m.y_min,
        right: viewport.x_max - m.x_max,
        bottom: viewport.y_max - m.y_max,
        left: m.x_min,
    };
    MediaLayout {
        tailwind_classes: format!(
            "absolute w-[{}px] h-[{}px] top-[{}px] left-[{}px]",
            m.width(),
            m.height(),
            position_parent.top,
            position_parent.left
        ),
        position_parent,
        position_body,
        positioning: Positioning::Absolute,
    }
}

fn size_styles(bbox: &Box2D) -> Styles {
    Styles {
        width: bbox.width().to_string(),
        height: bbox.height().to_string(),
        color_palette: Vec::new(),
    }
}

fn annotate(node: &mut ComponentNode, placement: Option<(usize, &ParentFrame)>) {
    let bbox = node.bbox();
    let type_key = node.type_key();

    let description = &mut node.description;
    if description.styles.is_none() {
        description.styles = Some(size_styles(&bbox));
    }
    description.layout = Some(compute_layout(&bbox, &type_key, placement));

    for media in &mut description.content.media {
        let media_box = media.coordinates.to_box();
        if media.styles.is_none() {
            media.styles = Some(size_styles(&media_box));
        }
        media.layout = Some(media_layout(media, &bbox));
    }

    let frame = ParentFrame::of(node);
    for (index, child) in node.description.children.iter_mut().enumerate() {
        annotate(child, Some((index, &frame)));
    }
}

/// Annotates every node and media reference of the tree with layout and size styles.
pub fn apply_layout(tree: &mut ComponentTree) {
    for root in &mut tree.roots {
        annotate(root, None);
    }
    debug!(nodes = tree.node_count(), "layout synthesized");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ComponentDescription, Content, MediaCoordinates};

    fn node(id: &str, kind: &str, b: [i32; 4], children: Vec<ComponentNode>) -> ComponentNode {
        ComponentNode {
            id: id.to_string(),
            component_type: kind.to_string(),
            coordinates: Box2D::from(b).into(),
            description: ComponentDescription {
                component_type: kind.to_string(),
                description: String::new(),
                content: Content::default(),
                children,
                styles: None,
                layout: None,
            },
        }
    }

    fn layout_of(node: &ComponentNode) -> &LayoutInfo {
        node.description.layout.as_ref().unwrap()
    }

    #[test]
    fn test_child_spanning_parent_has_zero_offsets() {
        let mut tree = ComponentTree::new(vec![node(
            "comp_1",
            "section",
            [100, 200, 600, 800],
            vec![node("comp_2", "text", [100, 200, 600, 800], vec![])],
        )]);
        apply_layout(&mut tree);

        let child = &tree.roots[0].children()[0];
        let layout = layout_of(child);
        assert_eq!(layout.position_parent, PercentOffsets::default());
        assert_eq!(layout.width_percent, 100.0);
        assert_eq!(layout.height_percent, 100.0);
    }

    #[test]
    fn test_root_is_relative_and_uses_viewport() {
        let mut tree = ComponentTree::new(vec![node("comp_1", "modal", [250, 100, 750, 400], vec![])]);
        apply_layout(&mut tree);

        let layout = layout_of(&tree.roots[0]);
        assert_eq!(layout.positioning, Positioning::Relative);
        assert_eq!(
            layout.position_body,
            PercentOffsets {
                top: 25.0,
                right: 60.0,
                bottom: 25.0,
                left: 10.0
            }
        );
        assert_eq!(layout.position_parent, layout.position_body);
        let styles = tree.roots[0].description.styles.as_ref().unwrap();
        assert_eq!(styles.width, "300");
        assert_eq!(styles.height, "500");
    }

    #[test]
    fn test_overlapping_siblings_are_absolute() {
        let mut tree = ComponentTree::new(vec![node(
            "comp_1",
            "nav",
            [0, 0, 1000, 1000],
            vec![
                node("comp_2", "button", [100, 100, 300, 300], vec![]),
                node("comp_3", "badge", [200, 200, 400, 400], vec![]),
            ],
        )]);
        apply_layout(&mut tree);
        for child in tree.roots[0].children() {
            assert_eq!(layout_of(child).positioning, Positioning::Absolute);
        }
    }

    #[test]
    fn test_single_child_of_div_is_relative() {
        let mut tree = ComponentTree::new(vec![node(
            "comp_1",
            "div",
            [0, 0, 500, 1000],
            vec![node("comp_2", "text", [100, 100, 200, 900], vec![])],
        )]);
        apply_layout(&mut tree);
        let layout = layout_of(&tree.roots[0].children()[0]);
        assert_eq!(layout.positioning, Positioning::Relative);
        assert_eq!(layout.tailwind_classes, "relative w-[80%] h-[20%]");
    }

    #[test]
    fn test_container_with_several_children_uses_nearest_edges() {
        let mut tree = ComponentTree::new(vec![node(
            "comp_1",
            "card",
            [0, 0, 1000, 1000],
            vec![
                node("comp_2", "title", [50, 100, 150, 400], vec![]),
                node("comp_3", "button", [800, 700, 900, 950], vec![]),
            ],
        )]);
        apply_layout(&mut tree);

        let children = tree.roots[0].children();
        let first = layout_of(&children[0]);
        assert_eq!(first.positioning, Positioning::Absolute);
        assert!(first.tailwind_classes.contains("top-[5%]"));
        assert!(first.tailwind_classes.contains("left-[10%]"));

        let second = layout_of(&children[1]);
        assert!(second.tailwind_classes.contains("bottom-[10%]"));
        assert!(second.tailwind_classes.contains("right-[5%]"));
    }

    #[test]
    fn test_floating_type_is_absolute_in_any_parent() {
        let frame = ParentFrame {
            bbox: Box2D::viewport(),
            type_key: "nav".to_string(),
            sibling_boxes: vec![Box2D::new(0, 0, 100, 100)],
        };
        assert_eq!(determine_positioning(0, "dropdown", &frame), Positioning::Absolute);
        assert_eq!(determine_positioning(0, "link", &frame), Positioning::Relative);
    }

    #[test]
    fn test_grandchildren_are_annotated_and_may_go_negative() {
        let mut tree = ComponentTree::new(vec![node(
            "comp_1",
            "section",
            [0, 0, 1000, 1000],
            vec![node(
                "comp_2",
                "list",
                [100, 100, 300, 300],
                vec![node("comp_3", "item", [90, 110, 150, 290], vec![])],
            )],
        )]);
        apply_layout(&mut tree);

        let grandchild = &tree.roots[0].children()[0].children()[0];
        let layout = layout_of(grandchild);
        assert_eq!(layout.position_parent.top, -5.0);
        assert_eq!(layout.position_parent.left, 5.0);
    }

    #[test]
    fn test_media_uses_raw_units() {
        let mut root = node("comp_1", "header", [0, 0, 100, 1000], vec![]);
        root.description.content.media.push(MediaRef {
            original_label: "Logo".to_string(),
            coordinates: MediaCoordinates {
                y_min: 10,
                x_min: 20,
                y_max: 90,
                x_max: 120,
            },
            file_path: "assets/image_a.png".to_string(),
            kind: "logo".to_string(),
            styles: None,
            layout: None,
        });
        let mut tree = ComponentTree::new(vec![root]);
        apply_layout(&mut tree);

        let media = &tree.roots[0].description.content.media[0];
        let layout = media.layout.as_ref().unwrap();
        assert_eq!(layout.positioning, Positioning::Absolute);
        assert_eq!(
            layout.position_parent,
            UnitOffsets {
                top: 10,
                right: 880,
                bottom: 10,
                left: 20
            }
        );
        assert_eq!(
            layout.tailwind_classes,
            "absolute w-[100px] h-[80px] top-[10px] left-[20px]"
        );
    }
}
