//! Configuration loading for the CLI.

use screenshot_layout::core::{ConfigError, ConfigValidator, PipelineConfig};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Loads `path` when given, otherwise the defaults.
pub fn load(path: Option<&Path>) -> Result<PipelineConfig, ConfigError> {
    match path {
        Some(path) => {
            debug!(path = %path.display(), "loading configuration");
            PipelineConfig::from_json_file(path)
        }
        None => Ok(PipelineConfig::default()),
    }
}

/// Flags of the `segment` command that override the loaded configuration.
pub struct SegmentOverrides {
    pub out: Option<PathBuf>,
    pub confidence_threshold: Option<f64>,
    pub min_line_distance: Option<u32>,
}

impl SegmentOverrides {
    pub fn apply(self, mut config: PipelineConfig) -> Result<PipelineConfig, ConfigError> {
        if let Some(out) = self.out {
            config.output_root = out;
        }
        if let Some(threshold) = self.confidence_threshold {
            config.segmentation = config.segmentation.with_confidence_threshold(threshold);
        }
        if let Some(distance) = self.min_line_distance {
            config.segmentation = config.segmentation.with_min_line_distance(distance);
        }
        config.validate()?;
        Ok(config)
    }
}
