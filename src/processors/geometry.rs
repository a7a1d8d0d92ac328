//! Geometric primitives for normalized element boxes.
//!
//! Vision models report element boxes in a resolution-independent 0-1000
//! coordinate space as `[y_min, x_min, y_max, x_max]`. This module provides
//! [`Box2D`] for that space, [`PixelRect`] for concrete image regions, and the
//! containment / overlap tests used by nesting filters, hierarchy building and
//! layout synthesis.

use crate::core::constants::NORMALIZED_EXTENT;
use serde::{Deserialize, Serialize};

/// A rectangle in the normalized 0-1000 coordinate space.
///
/// Serialized as the array `[y_min, x_min, y_max, x_max]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "[i32; 4]", into = "[i32; 4]")]
pub struct Box2D {
    /// Top edge.
    pub y_min: i32,
    /// Left edge.
    pub x_min: i32,
    /// Bottom edge.
    pub y_max: i32,
    /// Right edge.
    pub x_max: i32,
}

impl From<[i32; 4]> for Box2D {
    fn from([y_min, x_min, y_max, x_max]: [i32; 4]) -> Self {
        Self {
            y_min,
            x_min,
            y_max,
            x_max,
        }
    }
}

impl From<Box2D> for [i32; 4] {
    fn from(b: Box2D) -> Self {
        [b.y_min, b.x_min, b.y_max, b.x_max]
    }
}

impl Box2D {
    /// Creates a box from its four edges.
    pub fn new(y_min: i32, x_min: i32, y_max: i32, x_max: i32) -> Self {
        Self {
            y_min,
            x_min,
            y_max,
            x_max,
        }
    }

    /// The full normalized viewport `[0, 0, 1000, 1000]`.
    pub fn viewport() -> Self {
        Self::new(0, 0, NORMALIZED_EXTENT, NORMALIZED_EXTENT)
    }

    /// Converts the legacy percent box `[x_min, y_min, x_max, y_max]` (0-100).
    pub fn from_percent(values: [f64; 4]) -> Self {
        let [x_min, y_min, x_max, y_max] = values.map(|v| (v * 10.0) as i32);
        Self::new(y_min, x_min, y_max, x_max)
    }

    /// Returns `true` when both extents are strictly positive.
    pub fn is_valid(&self) -> bool {
        self.y_min < self.y_max && self.x_min < self.x_max
    }

    /// Horizontal extent.
    #[inline]
    pub fn width(&self) -> i32 {
        self.x_max - self.x_min
    }

    /// Vertical extent.
    #[inline]
    pub fn height(&self) -> i32 {
        self.y_max - self.y_min
    }

    /// Area in normalized units. Inverted boxes yield a non-positive value.
    pub fn area(&self) -> i64 {
        self.width() as i64 * self.height() as i64
    }

    /// Checks whether `self` lies inside `container`, allowing every edge of
    /// `self` to stick out by up to `margin` units.
    ///
    /// # Arguments
    ///
    /// * `container` - The candidate enclosing box.
    /// * `margin` - Slack applied to each edge of the container.
    pub fn is_inside(&self, container: &Box2D, margin: i32) -> bool {
        container.y_min - margin <= self.y_min
            && container.x_min - margin <= self.x_min
            && container.y_max + margin >= self.y_max
            && container.x_max + margin >= self.x_max
    }

    /// True rectangle intersection on both axes; touching edges do not count.
    pub fn overlaps(&self, other: &Box2D) -> bool {
        let x_overlap = self.x_min < other.x_max && self.x_max > other.x_min;
        let y_overlap = self.y_min < other.y_max && self.y_max > other.y_min;
        x_overlap && y_overlap
    }

    /// Maps the box onto an image of the given pixel size.
    ///
    /// Coordinates are scaled with truncation and then clamped to the image,
    /// so the result may be empty for boxes outside the frame.
    pub fn to_pixels(&self, width: u32, height: u32) -> PixelRect {
        let scale = |v: i32, extent: u32| -> u32 {
            let px = (v as i64 * extent as i64) / NORMALIZED_EXTENT as i64;
            px.clamp(0, extent as i64) as u32
        };
        PixelRect {
            x1: scale(self.x_min, width),
            y1: scale(self.y_min, height),
            x2: scale(self.x_max, width),
            y2: scale(self.y_max, height),
        }
    }
}

/// A pixel region `[x1, x2) x [y1, y2)` inside a concrete image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PixelRect {
    /// Left edge.
    pub x1: u32,
    /// Top edge.
    pub y1: u32,
    /// Right edge (exclusive).
    pub x2: u32,
    /// Bottom edge (exclusive).
    pub y2: u32,
}

impl PixelRect {
    /// Width in pixels; zero for degenerate rects.
    pub fn width(&self) -> u32 {
        self.x2.saturating_sub(self.x1)
    }

    /// Height in pixels; zero for degenerate rects.
    pub fn height(&self) -> u32 {
        self.y2.saturating_sub(self.y1)
    }

    /// Returns `true` when the rect covers no pixels.
    pub fn is_empty(&self) -> bool {
        self.width() == 0 || self.height() == 0
    }
}
