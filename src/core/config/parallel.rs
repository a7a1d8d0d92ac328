//! Shared concurrency configuration types.

use super::errors::{ConfigError, ConfigValidator, validate_at_least};
use serde::{Deserialize, Serialize};

/// Centralized configuration for concurrency across the screenshot pipeline.
///
/// CPU-bound row scanning uses rayon above a row-count threshold; calls to the
/// external description capability are capped by a semaphore.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConcurrencyPolicy {
    /// Maximum number of threads to use for parallel row scanning.
    /// If None, rayon will use the default thread pool size (typically number of CPU cores).
    #[serde(default)]
    pub max_threads: Option<usize>,

    /// Images with more rows than this compute row statistics in parallel.
    /// Default: 2000
    #[serde(default = "ConcurrencyPolicy::default_row_parallel_threshold")]
    pub row_parallel_threshold: usize,

    /// Maximum number of in-flight component description calls per section.
    /// Default: 5
    #[serde(default = "ConcurrencyPolicy::default_max_concurrent_descriptions")]
    pub max_concurrent_descriptions: usize,
}

impl ConcurrencyPolicy {
    /// Create a new ConcurrencyPolicy with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the maximum number of threads.
    pub fn with_max_threads(mut self, max_threads: Option<usize>) -> Self {
        self.max_threads = max_threads;
        self
    }

    /// Set the row count above which scanning runs in parallel.
    pub fn with_row_parallel_threshold(mut self, threshold: usize) -> Self {
        self.row_parallel_threshold = threshold;
        self
    }

    /// Set the description concurrency cap.
    pub fn with_max_concurrent_descriptions(mut self, limit: usize) -> Self {
        self.max_concurrent_descriptions = limit;
        self
    }

    /// Whether an image with `rows` rows should be scanned in parallel.
    pub fn scan_in_parallel(&self, rows: usize) -> bool {
        rows > self.row_parallel_threshold
    }

    /// Install the global rayon thread pool with the configured number of threads.
    ///
    /// This method should be called once at application startup before any parallel
    /// processing occurs. If `max_threads` is None, this method does nothing and
    /// rayon will use its default thread pool size.
    ///
    /// # Returns
    ///
    /// - `Ok(true)` if the thread pool was successfully configured
    /// - `Ok(false)` if `max_threads` is None (no configuration needed)
    /// - `Err` if the thread pool has already been initialized
    pub fn install_global_thread_pool(&self) -> Result<bool, rayon::ThreadPoolBuildError> {
        if let Some(num_threads) = self.max_threads {
            rayon::ThreadPoolBuilder::new()
                .num_threads(num_threads)
                .build_global()?;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    fn default_row_parallel_threshold() -> usize {
        2_000
    }

    fn default_max_concurrent_descriptions() -> usize {
        5
    }
}

impl Default for ConcurrencyPolicy {
    fn default() -> Self {
        Self {
            max_threads: None,
            row_parallel_threshold: Self::default_row_parallel_threshold(),
            max_concurrent_descriptions: Self::default_max_concurrent_descriptions(),
        }
    }
}

impl ConfigValidator for ConcurrencyPolicy {
    fn validate(&self) -> Result<(), ConfigError> {
        if let Some(threads) = self.max_threads {
            validate_at_least("max_threads", threads, 1)?;
        }
        validate_at_least(
            "max_concurrent_descriptions",
            self.max_concurrent_descriptions,
            1,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_deserialize_from_empty_object() {
        let policy: ConcurrencyPolicy = serde_json::from_str("{}").unwrap();
        assert_eq!(policy.max_threads, None);
        assert_eq!(policy.row_parallel_threshold, 2_000);
        assert_eq!(policy.max_concurrent_descriptions, 5);
        assert!(policy.validate().is_ok());
    }

    #[test]
    fn test_zero_permits_rejected() {
        let policy = ConcurrencyPolicy::new().with_max_concurrent_descriptions(0);
        assert!(policy.validate().is_err());
    }

    #[test]
    fn test_scan_in_parallel_threshold() {
        let policy = ConcurrencyPolicy::new().with_row_parallel_threshold(100);
        assert!(!policy.scan_in_parallel(100));
        assert!(policy.scan_in_parallel(101));
    }
}
