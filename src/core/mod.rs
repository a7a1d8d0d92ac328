//! The core module of the screenshot pipeline.
//!
//! This module contains the pieces every other module depends on:
//! - Configuration management
//! - Constants used throughout the pipeline
//! - Error handling
//!
//! It also provides re-exports of commonly used types for convenience.

pub mod config;
pub mod constants;
pub mod errors;

pub use config::{
    ConcurrencyPolicy, ConfigError, ConfigValidator, PaletteConfig, PipelineConfig, PromptSet,
    RetryPolicy, SegmentationConfig,
};
pub use errors::{
    ErrorStatus, ImageProcessError, PipelineError, PipelineResult, ProcessingStage, ServiceError,
};
