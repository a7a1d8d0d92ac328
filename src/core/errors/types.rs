//! Core error types for the screenshot pipeline.
//!
//! This module defines the fundamental error types used throughout the pipeline,
//! including the main [`PipelineError`] enum, the [`ProcessingStage`] it is tagged
//! with, and the uniform [`ServiceError`] every stage boundary hands to its caller.

use std::fmt;
use thiserror::Error;

/// Errors that can occur while cropping or painting image regions.
#[derive(Debug, Error)]
pub enum ImageProcessError {
    /// The crop region collapses to zero width or height after clamping.
    #[error("empty crop region ({x1}, {y1}) to ({x2}, {y2})")]
    EmptyRegion {
        /// Left edge in pixels.
        x1: u32,
        /// Top edge in pixels.
        y1: u32,
        /// Right edge in pixels.
        x2: u32,
        /// Bottom edge in pixels.
        y2: u32,
    },
    /// A section interval lies outside the image.
    #[error("section [{y_min}, {y_max}) outside image of height {height}")]
    SectionOutOfBounds {
        /// Section start row.
        y_min: u32,
        /// Section end row (exclusive).
        y_max: u32,
        /// Image height.
        height: u32,
    },
    /// The image has no pixels.
    #[error("image has zero width or height")]
    EmptyImage,
}

/// Enum representing the stages of the screenshot pipeline.
///
/// Used to tag errors and log records with the stage they originate from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessingStage {
    /// Cut-line detection and section derivation.
    Segmentation,
    /// Cropping sections to files.
    Splitting,
    /// Bounding box detection and post-processing.
    BoundingBox,
    /// Parent/child hierarchy construction.
    Hierarchy,
    /// Medialess image and palette extraction.
    ColorExtraction,
    /// Per-component description through the external model.
    Description,
    /// Per-request directory management.
    Workspace,
    /// Generic processing.
    Generic,
}

impl fmt::Display for ProcessingStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProcessingStage::Segmentation => write!(f, "segmentation"),
            ProcessingStage::Splitting => write!(f, "section splitting"),
            ProcessingStage::BoundingBox => write!(f, "bounding box"),
            ProcessingStage::Hierarchy => write!(f, "hierarchy"),
            ProcessingStage::ColorExtraction => write!(f, "color extraction"),
            ProcessingStage::Description => write!(f, "description"),
            ProcessingStage::Workspace => write!(f, "workspace"),
            ProcessingStage::Generic => write!(f, "processing"),
        }
    }
}

/// HTTP-agnostic classification of a failure, used by callers to pick a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorStatus {
    /// A required input (image, labels file) does not exist.
    NotFound,
    /// The input exists but cannot be used.
    InvalidInput,
    /// The external model capability failed.
    Upstream,
    /// Anything else.
    Internal,
}

impl fmt::Display for ErrorStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorStatus::NotFound => write!(f, "not found"),
            ErrorStatus::InvalidInput => write!(f, "invalid input"),
            ErrorStatus::Upstream => write!(f, "upstream failure"),
            ErrorStatus::Internal => write!(f, "internal error"),
        }
    }
}

/// Enum representing the errors that can occur in the screenshot pipeline.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// Error occurred while decoding or encoding an image.
    #[error("image load")]
    ImageLoad(#[source] image::ImageError),

    /// Error occurred during processing.
    #[error("{kind} failed: {context}")]
    Processing {
        /// The stage of processing where the error occurred.
        kind: ProcessingStage,
        /// Additional context about the error.
        context: String,
        /// The underlying error that caused this error.
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// A required file is missing.
    #[error("{what} not found: {path}")]
    NotFound {
        /// What was being looked up (image, labels, ...).
        what: String,
        /// The path that was checked.
        path: String,
    },

    /// Error indicating invalid input.
    #[error("invalid input: {message}")]
    InvalidInput {
        /// A message describing the invalid input.
        message: String,
    },

    /// Error indicating a configuration problem.
    #[error("configuration: {message}")]
    ConfigError {
        /// A message describing the configuration error.
        message: String,
    },

    /// Error returned by the external model capability.
    #[error("model '{provider}' failed: {context}")]
    Model {
        /// Provider name of the model.
        provider: String,
        /// Additional context about the failure.
        context: String,
        /// Whether retrying the same call may succeed (network, timeout, 5xx).
        transient: bool,
        /// The underlying error, if any.
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// IO error.
    #[error("io")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization error.
    #[error("json")]
    Json(#[from] serde_json::Error),
}

/// Convenience alias used across the crate.
pub type PipelineResult<T> = Result<T, PipelineError>;

impl From<image::ImageError> for PipelineError {
    /// Converts an image::ImageError to PipelineError::ImageLoad.
    fn from(error: image::ImageError) -> Self {
        Self::ImageLoad(error)
    }
}

impl From<crate::core::config::ConfigError> for PipelineError {
    /// Converts a ConfigError to PipelineError::ConfigError.
    fn from(error: crate::core::config::ConfigError) -> Self {
        Self::ConfigError {
            message: error.to_string(),
        }
    }
}

impl From<ImageProcessError> for PipelineError {
    /// Converts an ImageProcessError to PipelineError::Processing.
    fn from(error: ImageProcessError) -> Self {
        Self::Processing {
            kind: ProcessingStage::Generic,
            context: "image processing failed".to_string(),
            source: Box::new(error),
        }
    }
}

impl PipelineError {
    /// Wraps an error raised while running `kind`.
    pub fn processing(
        kind: ProcessingStage,
        context: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Processing {
            kind,
            context: context.into(),
            source: Box::new(source),
        }
    }

    /// Creates a not-found error for a missing prerequisite file.
    pub fn not_found(what: impl Into<String>, path: impl AsRef<std::path::Path>) -> Self {
        Self::NotFound {
            what: what.into(),
            path: path.as_ref().display().to_string(),
        }
    }

    /// Creates an invalid-input error.
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    /// Creates a model error.
    ///
    /// `transient` marks failures (timeouts, connection resets, 5xx) that the
    /// retry wrapper is allowed to repeat.
    pub fn model_error(
        provider: impl Into<String>,
        context: impl Into<String>,
        transient: bool,
    ) -> Self {
        Self::Model {
            provider: provider.into(),
            context: context.into(),
            transient,
            source: None,
        }
    }

    /// Creates a configuration error for invalid field values.
    ///
    /// # Arguments
    ///
    /// * `field` - The name of the field with an invalid value
    /// * `expected` - Description of what was expected
    /// * `actual` - Description of what was actually provided
    pub fn invalid_field(
        field: impl Into<String>,
        expected: impl Into<String>,
        actual: impl Into<String>,
    ) -> Self {
        Self::ConfigError {
            message: format!(
                "invalid value for field '{}': expected {}, got {}",
                field.into(),
                expected.into(),
                actual.into()
            ),
        }
    }

    /// Returns `true` when a retry of the failed call may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Model { transient: true, .. })
    }

    /// Classifies the error for the caller.
    pub fn status(&self) -> ErrorStatus {
        match self {
            Self::NotFound { .. } => ErrorStatus::NotFound,
            Self::Io(err) if err.kind() == std::io::ErrorKind::NotFound => ErrorStatus::NotFound,
            Self::InvalidInput { .. } | Self::ImageLoad(_) | Self::ConfigError { .. } => {
                ErrorStatus::InvalidInput
            }
            Self::Model { .. } => ErrorStatus::Upstream,
            Self::Processing { .. } | Self::Io(_) | Self::Json(_) => ErrorStatus::Internal,
        }
    }

    /// Converts the error into the uniform boundary error, logging it with
    /// stage and request context.
    pub fn into_service(self, stage: ProcessingStage, request_id: &str) -> ServiceError {
        let status = self.status();
        let message = error_chain(&self);
        tracing::error!(
            request_id = %request_id,
            stage = %stage,
            status = %status,
            error = %message,
            "pipeline stage failed"
        );
        ServiceError {
            status,
            stage,
            request_id: request_id.to_string(),
            message,
            source: Some(Box::new(self)),
        }
    }
}

/// Uniform error emitted at every pipeline boundary.
#[derive(Debug, Error)]
#[error("[{request_id}] {stage} ({status}): {message}")]
pub struct ServiceError {
    /// HTTP-agnostic status.
    pub status: ErrorStatus,
    /// Stage that failed.
    pub stage: ProcessingStage,
    /// Identifier of the pipeline run.
    pub request_id: String,
    /// Flattened message including the source chain.
    pub message: String,
    /// The original error.
    #[source]
    pub source: Option<Box<PipelineError>>,
}

/// Joins an error and its sources with `": "`.
fn error_chain(error: &(dyn std::error::Error + 'static)) -> String {
    let mut message = error.to_string();
    let mut current = error.source();
    while let Some(source) = current {
        message.push_str(": ");
        message.push_str(&source.to_string());
        current = source.source();
    }
    message
}
