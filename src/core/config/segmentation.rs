//! Configuration for cut-line detection and section derivation.

use super::errors::{
    ConfigError, ConfigValidator, validate_at_least, validate_positive, validate_range,
};
use serde::{Deserialize, Serialize};

/// Thresholds for the blank-space separation-line detector.
///
/// Default values follow the standalone detector; the multi-signal segmenter
/// builds its own instance from [`SegmentationConfig::separation`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeparationConfig {
    /// Window variance below which the window counts as blank (default: 100)
    pub var_thr: f64,
    /// Per-column intensity difference that marks a border (default: 30)
    pub diff_thr: f64,
    /// Fraction of columns that must exceed `diff_thr` (default: 0.5)
    pub portion_thr: f64,
    /// Number of rows in the sliding window (default: 10)
    pub window_size: usize,
    /// Minimum pixel distance between accepted lines; 0 derives 3% of the height (default: 100)
    pub min_line_distance: u32,
}

impl Default for SeparationConfig {
    fn default() -> Self {
        Self {
            var_thr: 100.0,
            diff_thr: 30.0,
            portion_thr: 0.5,
            window_size: 10,
            min_line_distance: 100,
        }
    }
}

impl SeparationConfig {
    /// Sets the minimum distance between accepted lines.
    pub fn with_min_line_distance(mut self, distance: u32) -> Self {
        self.min_line_distance = distance;
        self
    }

    /// Sets the sliding window height.
    pub fn with_window_size(mut self, window_size: usize) -> Self {
        self.window_size = window_size;
        self
    }
}

impl ConfigValidator for SeparationConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        validate_positive("var_thr", self.var_thr)?;
        validate_range("diff_thr", self.diff_thr, 0.0, 255.0)?;
        validate_range("portion_thr", self.portion_thr, 0.0, 1.0)?;
        validate_at_least("window_size", self.window_size, 1)
    }
}

/// Thresholds for the blank-region detector.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlankRegionConfig {
    /// Row variance below which a row is blank (default: 102)
    #[serde(default = "BlankRegionConfig::default_var_thr")]
    pub var_thr: f64,
    /// Where inside a blank run the split is placed, as a fraction of its height (default: 0.5)
    #[serde(default = "BlankRegionConfig::default_split_position")]
    pub split_position: f64,
    /// Shortest blank run, in rows, that produces a split (default: 10)
    #[serde(default = "BlankRegionConfig::default_min_run")]
    pub min_run: usize,
}

impl BlankRegionConfig {
    fn default_var_thr() -> f64 {
        102.0
    }

    fn default_split_position() -> f64 {
        0.5
    }

    fn default_min_run() -> usize {
        10
    }
}

impl Default for BlankRegionConfig {
    fn default() -> Self {
        Self {
            var_thr: Self::default_var_thr(),
            split_position: Self::default_split_position(),
            min_run: Self::default_min_run(),
        }
    }
}

impl ConfigValidator for BlankRegionConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        validate_positive("blank_region.var_thr", self.var_thr)?;
        validate_range("blank_region.split_position", self.split_position, 0.0, 1.0)?;
        validate_at_least("blank_region.min_run", self.min_run, 1)
    }
}

/// Thresholds for the color-transition detector.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColorTransitionConfig {
    /// Row variance below which a row counts as a flat color band
    pub var_thr: f64,
    /// Minimum per-channel mean difference between adjacent flat rows
    pub diff_thr: f64,
}

impl Default for ColorTransitionConfig {
    fn default() -> Self {
        Self {
            var_thr: 100.0,
            diff_thr: 15.0,
        }
    }
}

/// Configuration of the multi-signal segmenter and the segmentation stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SegmentationConfig {
    /// Candidates below this confidence are discarded (default: 0.6)
    #[serde(default = "SegmentationConfig::default_confidence_threshold")]
    pub confidence_threshold: f64,
    /// Minimum distance between fused lines; 0 derives 5% of the height (default: 0)
    #[serde(default)]
    pub min_line_distance: u32,
    /// Window variance threshold handed to the separation detector (default: 80)
    #[serde(default = "SegmentationConfig::default_blank_var_thr")]
    pub blank_var_thr: f64,
    /// Border difference threshold handed to the separation detector (default: 40)
    #[serde(default = "SegmentationConfig::default_blank_diff_thr")]
    pub blank_diff_thr: f64,
    /// Border portion threshold handed to the separation detector (default: 0.5)
    #[serde(default = "SegmentationConfig::default_blank_portion_thr")]
    pub blank_portion_thr: f64,
    /// Row variance threshold of the color-transition detector (default: 100)
    #[serde(default = "SegmentationConfig::default_color_var_thr")]
    pub color_var_thr: f64,
    /// Mean color difference threshold of the color-transition detector (default: 15)
    #[serde(default = "SegmentationConfig::default_color_diff_thr")]
    pub color_diff_thr: f64,
    /// Sliding window height of the separation detector (default: 10)
    #[serde(default = "SegmentationConfig::default_window_size")]
    pub window_size: usize,
    /// Images no taller than this are passed through unsegmented (default: 1430)
    #[serde(default = "SegmentationConfig::default_height_threshold")]
    pub height_threshold: u32,
    /// Blank-region detector settings
    #[serde(default)]
    pub blank_region: BlankRegionConfig,
}

impl SegmentationConfig {
    /// Create a new SegmentationConfig with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the confidence threshold.
    pub fn with_confidence_threshold(mut self, threshold: f64) -> Self {
        self.confidence_threshold = threshold;
        self
    }

    /// Set the minimum line distance (0 = derive from height).
    pub fn with_min_line_distance(mut self, distance: u32) -> Self {
        self.min_line_distance = distance;
        self
    }

    /// Set the pass-through height threshold.
    pub fn with_height_threshold(mut self, height: u32) -> Self {
        self.height_threshold = height;
        self
    }

    /// Separation detector settings for a fused run with the given effective distance.
    pub fn separation(&self, min_line_distance: u32) -> SeparationConfig {
        SeparationConfig {
            var_thr: self.blank_var_thr,
            diff_thr: self.blank_diff_thr,
            portion_thr: self.blank_portion_thr,
            window_size: self.window_size,
            min_line_distance,
        }
    }

    /// Color-transition detector settings.
    pub fn color_transition(&self) -> ColorTransitionConfig {
        ColorTransitionConfig {
            var_thr: self.color_var_thr,
            diff_thr: self.color_diff_thr,
        }
    }

    fn default_confidence_threshold() -> f64 {
        0.6
    }

    fn default_blank_var_thr() -> f64 {
        80.0
    }

    fn default_blank_diff_thr() -> f64 {
        40.0
    }

    fn default_blank_portion_thr() -> f64 {
        0.5
    }

    fn default_color_var_thr() -> f64 {
        100.0
    }

    fn default_color_diff_thr() -> f64 {
        15.0
    }

    fn default_window_size() -> usize {
        10
    }

    fn default_height_threshold() -> u32 {
        1430
    }
}

impl Default for SegmentationConfig {
    fn default() -> Self {
        Self {
            confidence_threshold: Self::default_confidence_threshold(),
            min_line_distance: 0,
            blank_var_thr: Self::default_blank_var_thr(),
            blank_diff_thr: Self::default_blank_diff_thr(),
            blank_portion_thr: Self::default_blank_portion_thr(),
            color_var_thr: Self::default_color_var_thr(),
            color_diff_thr: Self::default_color_diff_thr(),
            window_size: Self::default_window_size(),
            height_threshold: Self::default_height_threshold(),
            blank_region: BlankRegionConfig::default(),
        }
    }
}

impl ConfigValidator for SegmentationConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        validate_range("confidence_threshold", self.confidence_threshold, 0.0, 1.0)?;
        validate_positive("color_var_thr", self.color_var_thr)?;
        validate_range("color_diff_thr", self.color_diff_thr, 0.0, 255.0)?;
        self.separation(self.min_line_distance).validate()?;
        self.blank_region.validate()
    }
}
