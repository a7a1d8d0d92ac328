//! Configuration management for the screenshot pipeline.
//!
//! This module provides configuration types, validation traits, and utilities
//! for tuning segmentation, palette extraction, concurrency and model retries.

pub mod errors;
pub mod parallel;
pub mod pipeline;
pub mod segmentation;

// Re-export commonly used types
pub use errors::{ConfigError, ConfigValidator, validate_at_least, validate_positive, validate_range};
pub use parallel::ConcurrencyPolicy;
pub use pipeline::{PaletteConfig, PipelineConfig, PromptSet, RetryPolicy};
pub use segmentation::{
    BlankRegionConfig, ColorTransitionConfig, SegmentationConfig, SeparationConfig,
};
