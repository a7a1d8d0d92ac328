//! Component records produced from detected element boxes.
//!
//! Two families live here:
//!
//! - the flat, non-heuristic records ([`FlatComponent`] from the box detector,
//!   [`ComponentRecord`] after per-component description), and
//! - the hierarchical, heuristic tree ([`HeuristicElement`] from the box
//!   detector, [`ComponentNode`] / [`ComponentTree`] after hierarchy building,
//!   annotated in place with [`LayoutInfo`] and [`Styles`]).

use crate::processors::geometry::Box2D;
use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// A labeled box from the non-heuristic detector.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlatComponent {
    /// Element label as reported by the model.
    pub label: String,
    /// Normalized box.
    pub box_2d: Box2D,
}

impl FlatComponent {
    /// Creates a new flat component.
    pub fn new(label: impl Into<String>, box_2d: Box2D) -> Self {
        Self {
            label: label.into(),
            box_2d,
        }
    }
}

/// A labeled box with free text from the heuristic detector.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeuristicElement {
    /// Normalized box.
    pub bbox: Box2D,
    /// Element label.
    pub label: String,
    /// Model-provided description.
    #[serde(default)]
    pub description: String,
    /// Visible text content.
    #[serde(default)]
    pub text: String,
}

/// Named-edge coordinates of a tree node, in normalized units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Coordinates {
    pub y1: i32,
    pub x1: i32,
    pub y2: i32,
    pub x2: i32,
}

impl From<Box2D> for Coordinates {
    fn from(b: Box2D) -> Self {
        Self {
            y1: b.y_min,
            x1: b.x_min,
            y2: b.y_max,
            x2: b.x_max,
        }
    }
}

impl Coordinates {
    /// Converts back to a [`Box2D`].
    pub fn to_box(&self) -> Box2D {
        Box2D::new(self.y1, self.x1, self.y2, self.x2)
    }
}

/// Coordinates of a media reference, in normalized units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaCoordinates {
    pub y_min: i32,
    pub x_min: i32,
    pub y_max: i32,
    pub x_max: i32,
}

impl From<Box2D> for MediaCoordinates {
    fn from(b: Box2D) -> Self {
        Self {
            y_min: b.y_min,
            x_min: b.x_min,
            y_max: b.y_max,
            x_max: b.x_max,
        }
    }
}

impl MediaCoordinates {
    /// Converts back to a [`Box2D`].
    pub fn to_box(&self) -> Box2D {
        Box2D::new(self.y_min, self.x_min, self.y_max, self.x_max)
    }
}

/// Offsets in percent of a reference frame.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PercentOffsets {
    pub top: f64,
    pub right: f64,
    pub bottom: f64,
    pub left: f64,
}

/// Offsets in raw normalized units.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitOffsets {
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
    pub left: i32,
}

/// Positioning strategy chosen for a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Positioning {
    /// Explicitly offset inside its parent.
    Absolute,
    /// Flows with its siblings.
    Relative,
}

impl fmt::Display for Positioning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Positioning::Absolute => write!(f, "absolute"),
            Positioning::Relative => write!(f, "relative"),
        }
    }
}

/// Derived layout of a component node.
///
/// Percentages may be negative when a detected box sticks out of its parent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayoutInfo {
    /// Offsets relative to the parent box (or the viewport for roots).
    #[serde(rename = "%_position_parent")]
    pub position_parent: PercentOffsets,
    /// Offsets relative to the full viewport.
    #[serde(rename = "%_position_body")]
    pub position_body: PercentOffsets,
    /// Positioning strategy.
    pub positioning: Positioning,
    /// Width in percent of the parent width.
    pub width_percent: f64,
    /// Height in percent of the parent height.
    pub height_percent: f64,
    /// Utility class string for the downstream code generator.
    pub tailwind_classes: String,
}

/// Derived layout of a media reference, in raw units of the owning component's frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaLayout {
    pub position_parent: UnitOffsets,
    pub position_body: UnitOffsets,
    pub positioning: Positioning,
    pub tailwind_classes: String,
}

/// Size and color annotations of a node.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Styles {
    pub width: String,
    pub height: String,
    #[serde(rename = "colorPalette")]
    pub color_palette: Vec<String>,
}

/// A cropped media asset attached to a component.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaRef {
    /// Label the detector gave the media element.
    pub original_label: String,
    /// Normalized box of the media element.
    pub coordinates: MediaCoordinates,
    /// Path of the asset relative to the request's `final` directory.
    pub file_path: String,
    /// Lower-cased media label (image, logo, icon).
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub styles: Option<Styles>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub layout: Option<MediaLayout>,
}

/// Text and media content of a node.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Content {
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub media: Vec<MediaRef>,
}

/// Descriptive payload of a node, including its children.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentDescription {
    #[serde(rename = "type")]
    pub component_type: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub content: Content,
    #[serde(default)]
    pub children: Vec<ComponentNode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub styles: Option<Styles>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub layout: Option<LayoutInfo>,
}

/// A node of the heuristic component hierarchy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentNode {
    pub id: String,
    #[serde(rename = "type")]
    pub component_type: String,
    pub coordinates: Coordinates,
    pub description: ComponentDescription,
}

impl ComponentNode {
    /// Normalized box of the node.
    pub fn bbox(&self) -> Box2D {
        self.coordinates.to_box()
    }

    /// Child nodes.
    pub fn children(&self) -> &[ComponentNode] {
        &self.description.children
    }

    /// Lower-cased type, used for type-set lookups.
    pub fn type_key(&self) -> String {
        self.component_type.to_lowercase()
    }

    /// Number of nodes in this subtree, including `self`.
    pub fn subtree_len(&self) -> usize {
        1 + self
            .description
            .children
            .iter()
            .map(ComponentNode::subtree_len)
            .sum::<usize>()
    }
}

/// Root nodes of the hierarchy, serialized as a JSON object keyed by node id
/// in root order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ComponentTree {
    pub roots: Vec<ComponentNode>,
}

impl ComponentTree {
    /// Wraps root nodes.
    pub fn new(roots: Vec<ComponentNode>) -> Self {
        Self { roots }
    }

    /// Looks up a root by id.
    pub fn get(&self, id: &str) -> Option<&ComponentNode> {
        self.roots.iter().find(|node| node.id == id)
    }

    /// Number of roots.
    pub fn len(&self) -> usize {
        self.roots.len()
    }

    /// Returns `true` when the tree has no roots.
    pub fn is_empty(&self) -> bool {
        self.roots.is_empty()
    }

    /// Total number of nodes across all roots.
    pub fn node_count(&self) -> usize {
        self.roots.iter().map(ComponentNode::subtree_len).sum()
    }
}

impl Serialize for ComponentTree {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.roots.len()))?;
        for node in &self.roots {
            map.serialize_entry(&node.id, node)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for ComponentTree {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct TreeVisitor;

        impl<'de> Visitor<'de> for TreeVisitor {
            type Value = ComponentTree;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a map of component id to component node")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
                let mut roots = Vec::with_capacity(access.size_hint().unwrap_or(0));
                while let Some((_id, node)) = access.next_entry::<String, ComponentNode>()? {
                    roots.push(node);
                }
                Ok(ComponentTree { roots })
            }
        }

        deserializer.deserialize_map(TreeVisitor)
    }
}

/// Pixel coordinates of a non-heuristic component.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PixelCoordinates {
    pub x1: u32,
    pub y1: u32,
    pub x2: u32,
    pub y2: u32,
}

/// An image asset cropped out of a non-heuristic `image` component.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageAsset {
    pub id: String,
    pub coordinates: PixelCoordinates,
    #[serde(rename = "filePath")]
    pub file_path: String,
    pub role: String,
    pub description: String,
}

/// Media attached to a non-heuristic component.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MediaBundle {
    #[serde(default)]
    pub images: Vec<ImageAsset>,
    #[serde(default)]
    pub icons: Vec<serde_json::Value>,
}

/// Result of describing one non-heuristic component.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentRecord {
    pub id: String,
    #[serde(rename = "type")]
    pub component_type: String,
    pub coordinates: PixelCoordinates,
    /// Model-provided description document; `null` for image components.
    pub description: serde_json::Value,
    #[serde(default)]
    pub content: serde_json::Map<String, serde_json::Value>,
    #[serde(default)]
    pub media: MediaBundle,
}

/// Well-shaped stand-in used when a description reply cannot be parsed.
pub fn default_description(component_label: &str) -> serde_json::Value {
    serde_json::json!({
        "type": component_label,
        "styles": {
            "colorPalette": {},
            "typography": {},
            "spacing": {"padding": {}, "margin": {}},
            "layout": {}
        },
        "content": {},
        "media": {"images": [], "icons": []},
        "children": []
    })
}
