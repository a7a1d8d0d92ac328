//! Cut lines and the sections they delimit.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Detector that proposed a cut line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LineSource {
    /// Blank-space separation-line detector.
    Separation,
    /// Blank-region detector.
    BlankRegion,
    /// Color-transition detector.
    ColorTransition,
}

impl fmt::Display for LineSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LineSource::Separation => write!(f, "separation"),
            LineSource::BlankRegion => write!(f, "blank_region"),
            LineSource::ColorTransition => write!(f, "color_transition"),
        }
    }
}

/// A candidate horizontal boundary at a pixel row.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CutLine {
    /// Pixel row of the line.
    pub position: u32,
    /// Confidence in `[0, 1]` for fused lines; raw border strength for detector candidates.
    pub confidence: f64,
    /// Which detector proposed it.
    pub source: LineSource,
}

impl CutLine {
    /// Creates a new cut line.
    pub fn new(position: u32, confidence: f64, source: LineSource) -> Self {
        Self {
            position,
            confidence,
            source,
        }
    }
}

/// A half-open row interval `[y_min, y_max)` spanning the full image width.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Section {
    /// First row (inclusive).
    pub y_min: u32,
    /// Last row (exclusive).
    pub y_max: u32,
}

impl Section {
    /// Creates a new section.
    pub fn new(y_min: u32, y_max: u32) -> Self {
        Self { y_min, y_max }
    }

    /// Number of rows covered.
    pub fn height(&self) -> u32 {
        self.y_max.saturating_sub(self.y_min)
    }

    /// Builds the sections delimited by sorted `lines` over an image of `height` rows.
    ///
    /// The boundaries `0` and `height` are added, so the result always covers
    /// `[0, height)` without gaps. Lines outside `(0, height)` and repeated
    /// positions are ignored so no section is empty.
    pub fn from_lines(lines: &[u32], height: u32) -> Vec<Section> {
        let mut boundaries = Vec::with_capacity(lines.len() + 2);
        boundaries.push(0);
        boundaries.extend(lines.iter().copied().filter(|&l| l > 0 && l < height));
        boundaries.push(height);
        boundaries.dedup();

        boundaries
            .windows(2)
            .filter(|pair| pair[0] < pair[1])
            .map(|pair| Section::new(pair[0], pair[1]))
            .collect()
    }
}
