//! Constants shared across the pipeline.

/// Extent of the normalized box coordinate space on both axes.
pub const NORMALIZED_EXTENT: i32 = 1000;

/// Containment slack, in normalized units, when matching a component to its parent.
pub const CONTAINMENT_MARGIN: i32 = 5;

/// Containment slack, in normalized units, of the nested-element filter.
pub const NESTING_MARGIN: i32 = 5;

/// Fraction of the image height used as the detector's default line spacing.
pub const DETECTOR_MIN_DISTANCE_FRACTION: f64 = 0.03;

/// Fraction of the image height used as the fused segmenter's default line spacing.
pub const FUSION_MIN_DISTANCE_FRACTION: f64 = 0.05;

/// Lines closer than this fraction of the height to an edge get a confidence boost.
pub const EDGE_PROXIMITY_FRACTION: f64 = 0.05;

/// Multiplier applied to edge-proximate candidates.
pub const EDGE_CONFIDENCE_BOOST: f64 = 1.5;

/// Detector runs accepting fewer lines than this are retried with a relaxed spacing.
pub const MIN_EXPECTED_LINES: usize = 3;

/// Fixed confidence of lines reported by the separation-line detector.
pub const SEPARATION_CONFIDENCE: f64 = 0.8;

/// Confidence of a blank-region line corroborated by the separation detector.
pub const BLANK_CORROBORATED_CONFIDENCE: f64 = 0.9;

/// Confidence of an uncorroborated blank-region line.
pub const BLANK_CONFIDENCE: f64 = 0.7;

/// Confidence of a color transition corroborated by the separation detector.
pub const COLOR_CORROBORATED_CONFIDENCE: f64 = 0.9;

/// Confidence of a color transition near a blank-region line.
pub const COLOR_NEAR_BLANK_CONFIDENCE: f64 = 0.75;

/// Confidence of a color transition seen by no other detector.
pub const COLOR_CONFIDENCE: f64 = 0.6;

/// Labels whose boxes may swallow nested detections in flat mode.
pub const PARENT_LABELS: &[&str] = &[
    "div",
    "header",
    "footer",
    "sidebar",
    "navbar",
    "search-bar",
    "form",
];

/// Labels treated as media content in heuristic mode.
pub const MEDIA_LABELS: &[&str] = &["image", "logo", "icon"];

/// Types painted out of the medialess image and skipped by palette extraction.
pub const MEDIA_TYPES: &[&str] = &["media", "icon", "logo", "image"];

/// Component types that always float above the flow.
pub const FLOATING_TYPES: &[&str] = &[
    "modal", "tooltip", "dropdown", "popup", "overlay", "dialog", "menu",
];

/// Container types whose children are positioned explicitly when there are several.
pub const CONTAINER_TYPES: &[&str] = &[
    "card", "container", "section", "article", "main", "div", "header", "footer",
];

/// Hex color returned when a region has no usable pixels.
pub const DEFAULT_COLOR: &str = "#ffffff";
