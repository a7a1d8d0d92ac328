//! CPU-bound image and layout processors.
//!
//! - Segmentation: [`separation`], [`signals`] and the fusing [`segmenter`]
//! - Box post-processing: [`bbox_parse`], [`nesting`], [`hierarchy`]
//! - Layout: [`layout`] and [`palette`]
//!
//! Everything here is synchronous and free of I/O except for the media store
//! handed to the hierarchy builder.

pub mod bbox_parse;
pub mod geometry;
pub mod hierarchy;
pub mod layout;
pub mod nesting;
pub mod palette;
pub mod segmenter;
pub mod separation;
pub mod signals;

pub use bbox_parse::{ParseTier, parse_flat_components, parse_heuristic_elements};
pub use geometry::{Box2D, PixelRect};
pub use hierarchy::{MediaStore, PlaceholderMedia, build_hierarchy, find_parent_index};
pub use layout::{apply_layout, compute_layout, determine_positioning};
pub use nesting::{filter_nested_elements, is_parent_label};
pub use palette::{apply_palettes, create_medialess, extract_dominant_colors};
pub use segmenter::{MultiSignalSegmenter, Segmentation};
pub use separation::{RowProfile, SeparationDetector};
pub use signals::{BlankRegionDetector, ColorTransitionDetector};
