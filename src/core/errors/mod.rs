//! Error types for the screenshot pipeline.

mod types;

pub use types::{
    ErrorStatus, ImageProcessError, PipelineError, PipelineResult, ProcessingStage, ServiceError,
};
