//! Top-level pipeline configuration.

use super::errors::{
    ConfigError, ConfigValidator, validate_at_least, validate_positive, validate_range,
};
use super::parallel::ConcurrencyPolicy;
use super::segmentation::SegmentationConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Settings of the color palette extractor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaletteConfig {
    /// Maximum number of colors reported per component (default: 5)
    #[serde(default = "PaletteConfig::default_max_colors")]
    pub max_colors: usize,
    /// Pixel sampling stride of the quantizer; 1 visits every pixel (default: 10)
    #[serde(default = "PaletteConfig::default_quality")]
    pub quality: usize,
}

impl PaletteConfig {
    fn default_max_colors() -> usize {
        5
    }

    fn default_quality() -> usize {
        10
    }
}

impl Default for PaletteConfig {
    fn default() -> Self {
        Self {
            max_colors: Self::default_max_colors(),
            quality: Self::default_quality(),
        }
    }
}

impl ConfigValidator for PaletteConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        validate_at_least("palette.max_colors", self.max_colors, 1)?;
        validate_at_least("palette.quality", self.quality, 1)
    }
}

/// Bounded exponential backoff applied to external model calls.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Total attempts including the first one (default: 3)
    #[serde(default = "RetryPolicy::default_max_attempts")]
    pub max_attempts: u32,
    /// Delay before the first retry in milliseconds (default: 500)
    #[serde(default = "RetryPolicy::default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,
    /// Upper bound for a single delay in milliseconds (default: 8000)
    #[serde(default = "RetryPolicy::default_max_backoff_ms")]
    pub max_backoff_ms: u64,
    /// Growth factor between consecutive delays (default: 2.0)
    #[serde(default = "RetryPolicy::default_multiplier")]
    pub multiplier: f64,
}

impl RetryPolicy {
    /// A policy that never retries.
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// Delay to wait after the `attempt`-th failure (1-based).
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1) as i32;
        let millis = self.initial_backoff_ms as f64 * self.multiplier.powi(exponent);
        Duration::from_millis(millis.min(self.max_backoff_ms as f64) as u64)
    }

    fn default_max_attempts() -> u32 {
        3
    }

    fn default_initial_backoff_ms() -> u64 {
        500
    }

    fn default_max_backoff_ms() -> u64 {
        8_000
    }

    fn default_multiplier() -> f64 {
        2.0
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: Self::default_max_attempts(),
            initial_backoff_ms: Self::default_initial_backoff_ms(),
            max_backoff_ms: Self::default_max_backoff_ms(),
            multiplier: Self::default_multiplier(),
        }
    }
}

impl ConfigValidator for RetryPolicy {
    fn validate(&self) -> Result<(), ConfigError> {
        validate_at_least("retry.max_attempts", self.max_attempts as usize, 1)?;
        validate_positive("retry.multiplier", self.multiplier)
    }
}

/// Prompt texts sent to the external model.
///
/// `{component_label}` in the description prompts is replaced with the label
/// of the component being described.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptSet {
    /// Flat box detection prompt.
    pub bbox: String,
    /// Hierarchical box detection prompt.
    pub heuristic_bbox: String,
    /// System prompt for component description.
    pub description_system: String,
    /// User prompt for component description.
    pub description_user: String,
}

impl Default for PromptSet {
    fn default() -> Self {
        Self {
            bbox: "Detect every UI element in this web page screenshot. Return a JSON array of \
                   {\"label\", \"box_2d\": [y_min, x_min, y_max, x_max]} with coordinates \
                   normalized to 0-1000."
                .to_string(),
            heuristic_bbox: "Detect every UI element in this web page screenshot. Return a JSON \
                             array of {\"bbox\": [y_min, x_min, y_max, x_max], \"label\", \
                             \"description\", \"text\"} with coordinates normalized to 0-1000."
                .to_string(),
            description_system: "You describe a single highlighted {component_label} of a web \
                                 page as JSON."
                .to_string(),
            description_user: "Describe the highlighted {component_label}: styles, content, \
                               media and children, as JSON."
                .to_string(),
        }
    }
}

impl PromptSet {
    /// Renders the description prompts for one component label.
    pub fn description_for(&self, component_label: &str) -> (String, String) {
        (
            self.description_system
                .replace("{component_label}", component_label),
            self.description_user
                .replace("{component_label}", component_label),
        )
    }
}

/// Aggregated configuration for a conversion run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Root under which per-request directories are created (default: "uploads")
    #[serde(default = "PipelineConfig::default_output_root")]
    pub output_root: PathBuf,
    /// Build the full component hierarchy instead of the flat filtered list
    #[serde(default)]
    pub use_heuristic: bool,
    /// Temperature for box detection calls (default: 0.1)
    #[serde(default = "PipelineConfig::default_bbox_temperature")]
    pub bbox_temperature: f32,
    /// Temperature for component description calls (default: 0.2)
    #[serde(default = "PipelineConfig::default_description_temperature")]
    pub description_temperature: f32,
    /// Segmentation settings
    #[serde(default)]
    pub segmentation: SegmentationConfig,
    /// Palette settings
    #[serde(default)]
    pub palette: PaletteConfig,
    /// Concurrency settings
    #[serde(default)]
    pub concurrency: ConcurrencyPolicy,
    /// Retry settings for model calls
    #[serde(default)]
    pub retry: RetryPolicy,
    /// Prompt texts
    #[serde(default)]
    pub prompts: PromptSet,
}

impl PipelineConfig {
    /// Create a new PipelineConfig with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads and validates a JSON configuration file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Set the output root.
    pub fn with_output_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.output_root = root.into();
        self
    }

    /// Select heuristic (hierarchical) mode.
    pub fn with_heuristic(mut self, use_heuristic: bool) -> Self {
        self.use_heuristic = use_heuristic;
        self
    }

    /// Replace the segmentation settings.
    pub fn with_segmentation(mut self, segmentation: SegmentationConfig) -> Self {
        self.segmentation = segmentation;
        self
    }

    /// Replace the retry policy.
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    fn default_output_root() -> PathBuf {
        PathBuf::from("uploads")
    }

    fn default_bbox_temperature() -> f32 {
        0.1
    }

    fn default_description_temperature() -> f32 {
        0.2
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            output_root: Self::default_output_root(),
            use_heuristic: false,
            bbox_temperature: Self::default_bbox_temperature(),
            description_temperature: Self::default_description_temperature(),
            segmentation: SegmentationConfig::default(),
            palette: PaletteConfig::default(),
            concurrency: ConcurrencyPolicy::default(),
            retry: RetryPolicy::default(),
            prompts: PromptSet::default(),
        }
    }
}

impl ConfigValidator for PipelineConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        validate_range("bbox_temperature", self.bbox_temperature as f64, 0.0, 2.0)?;
        validate_range(
            "description_temperature",
            self.description_temperature as f64,
            0.0,
            2.0,
        )?;
        self.segmentation.validate()?;
        self.palette.validate()?;
        self.concurrency.validate()?;
        self.retry.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_backoff_grows_and_caps() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.backoff_for(1), Duration::from_millis(500));
        assert_eq!(policy.backoff_for(2), Duration::from_millis(1000));
        assert_eq!(policy.backoff_for(3), Duration::from_millis(2000));
        assert_eq!(policy.backoff_for(10), Duration::from_millis(8000));
    }

    #[test]
    fn test_description_prompt_substitution() {
        let prompts = PromptSet::default();
        let (system, user) = prompts.description_for("navbar");
        assert!(system.contains("navbar"));
        assert!(user.contains("navbar"));
        assert!(!user.contains("{component_label}"));
    }

    #[test]
    fn test_from_json_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"output_root": "/tmp/runs", "use_heuristic": true, "retry": {{"max_attempts": 5}}}}"#
        )
        .unwrap();

        let config = PipelineConfig::from_json_file(file.path()).unwrap();
        assert_eq!(config.output_root, PathBuf::from("/tmp/runs"));
        assert!(config.use_heuristic);
        assert_eq!(config.retry.max_attempts, 5);
        assert_eq!(config.retry.initial_backoff_ms, 500);
        assert_eq!(config.palette.max_colors, 5);
    }

    #[test]
    fn test_from_json_file_rejects_invalid_values() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"palette": {{"max_colors": 0}}}}"#).unwrap();
        assert!(matches!(
            PipelineConfig::from_json_file(file.path()),
            Err(ConfigError::InvalidValue { .. })
        ));
    }
}
