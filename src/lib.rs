//! Screenshot segmentation and layout reconstruction.
//!
//! The crate turns a tall web page screenshot into independently processable
//! sections, and turns the flat element boxes a vision model reports for each
//! section into a percentage-based layout tree with color palettes.
//!
//! # Modules
//!
//! - [`core`] - errors, configuration and shared constants
//! - [`domain`] - cut lines, sections, components and layout records
//! - [`processors`] - the CPU-bound algorithms (segmentation, box post-processing,
//!   layout synthesis, palette extraction)
//! - [`pipeline`] - the async stages that talk to the external vision capability
//! - [`utils`] - image helpers and logging setup

pub mod core;
pub mod domain;
pub mod pipeline;
pub mod processors;
pub mod utils;

pub use crate::core::{PipelineError, PipelineResult, ProcessingStage, ServiceError};
