//! Auxiliary boundary signals fused by the segmenter.
//!
//! - [`BlankRegionDetector`] finds runs of flat rows between content and
//!   proposes a split inside each run.
//! - [`ColorTransitionDetector`] finds rows where one flat background color
//!   changes to another.

use crate::core::config::{BlankRegionConfig, ColorTransitionConfig, ConcurrencyPolicy};
use crate::processors::separation::RowProfile;
use image::{GrayImage, RgbImage};
use rayon::prelude::*;

/// Detects interior runs of blank rows.
#[derive(Debug, Clone, Default)]
pub struct BlankRegionDetector {
    config: BlankRegionConfig,
    policy: ConcurrencyPolicy,
}

impl BlankRegionDetector {
    /// Creates a detector.
    pub fn new(config: BlankRegionConfig) -> Self {
        Self {
            config,
            policy: ConcurrencyPolicy::default(),
        }
    }

    /// Sets the concurrency policy used for row scanning.
    pub fn with_policy(mut self, policy: ConcurrencyPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Returns one split row per blank run, top to bottom.
    ///
    /// Runs touching the top or bottom edge are page margins, not separators,
    /// and are skipped.
    pub fn detect(&self, gray: &GrayImage) -> Vec<u32> {
        let profile = RowProfile::compute(gray, &self.policy);
        let height = profile.height();
        let blank: Vec<bool> = (0..height)
            .map(|y| profile.row_variance(y) < self.config.var_thr)
            .collect();

        let mut splits = Vec::new();
        let mut y = 0;
        while y < height {
            if !blank[y] {
                y += 1;
                continue;
            }
            let start = y;
            while y < height && blank[y] {
                y += 1;
            }
            let run = y - start;
            if start > 0 && y < height && run >= self.config.min_run {
                let offset = (run as f64 * self.config.split_position) as usize;
                splits.push((start + offset.min(run - 1)) as u32);
            }
        }
        splits
    }
}

/// Mean color and gray variance of each row.
struct RowColors {
    means: Vec<[f64; 3]>,
    variances: Vec<f64>,
}

impl RowColors {
    fn compute(rgb: &RgbImage, policy: &ConcurrencyPolicy) -> Self {
        let width = rgb.width() as usize;
        let height = rgb.height() as usize;
        let row_stats = |y: usize| -> ([f64; 3], f64) {
            if width == 0 {
                return ([0.0; 3], 0.0);
            }
            let start = y * width * 3;
            let row = &rgb.as_raw()[start..start + width * 3];
            let mut channel = [0.0f64; 3];
            let (mut sum, mut sq) = (0.0f64, 0.0f64);
            for px in row.chunks_exact(3) {
                for (c, v) in channel.iter_mut().zip(px) {
                    *c += *v as f64;
                }
                let luma = 0.299 * px[0] as f64 + 0.587 * px[1] as f64 + 0.114 * px[2] as f64;
                sum += luma;
                sq += luma * luma;
            }
            let n = width as f64;
            let mean = sum / n;
            (channel.map(|c| c / n), (sq / n - mean * mean).max(0.0))
        };

        let stats: Vec<([f64; 3], f64)> = if policy.scan_in_parallel(height) {
            (0..height).into_par_iter().map(row_stats).collect()
        } else {
            (0..height).map(row_stats).collect()
        };
        let (means, variances) = stats.into_iter().unzip();
        Self { means, variances }
    }
}

/// Detects changes between flat background colors.
#[derive(Debug, Clone, Default)]
pub struct ColorTransitionDetector {
    config: ColorTransitionConfig,
    policy: ConcurrencyPolicy,
}

impl ColorTransitionDetector {
    /// Creates a detector.
    pub fn new(config: ColorTransitionConfig) -> Self {
        Self {
            config,
            policy: ConcurrencyPolicy::default(),
        }
    }

    /// Sets the concurrency policy used for row scanning.
    pub fn with_policy(mut self, policy: ConcurrencyPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Returns the first row of every new flat color band, top to bottom.
    ///
    /// Both rows around the transition must be flat, and at least one
    /// channel mean must move by more than `diff_thr`. Consecutive
    /// transition rows (gradients) collapse to the first one.
    pub fn detect(&self, rgb: &RgbImage) -> Vec<u32> {
        let rows = RowColors::compute(rgb, &self.policy);
        let flat = |y: usize| rows.variances[y] < self.config.var_thr;

        let mut transitions = Vec::new();
        let mut last_hit: Option<usize> = None;
        for y in 1..rows.means.len() {
            if !(flat(y - 1) && flat(y)) {
                continue;
            }
            let (prev, cur) = (rows.means[y - 1], rows.means[y]);
            let shift = prev
                .iter()
                .zip(cur.iter())
                .map(|(a, b)| (a - b).abs())
                .fold(0.0, f64::max);
            if shift > self.config.diff_thr {
                if last_hit != Some(y - 1) {
                    transitions.push(y as u32);
                }
                last_hit = Some(y);
            }
        }
        transitions
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Luma, Rgb};

    #[test]
    fn test_blank_region_split_in_middle_of_run() {
        let gray = GrayImage::from_fn(32, 300, |x, y| {
            if (100..140).contains(&y) {
                Luma([250])
            } else {
                Luma([if x % 2 == 0 { 0 } else { 200 }])
            }
        });
        let detector = BlankRegionDetector::new(BlankRegionConfig::default());
        assert_eq!(detector.detect(&gray), vec![120]);
    }

    #[test]
    fn test_blank_margins_and_short_runs_ignored() {
        let gray = GrayImage::from_fn(32, 300, |x, y| {
            let blank = y < 50 || (150..155).contains(&y) || y >= 280;
            if blank {
                Luma([255])
            } else {
                Luma([if x % 2 == 0 { 0 } else { 200 }])
            }
        });
        let detector = BlankRegionDetector::new(BlankRegionConfig::default());
        assert!(detector.detect(&gray).is_empty());
    }

    #[test]
    fn test_color_transition_between_flat_bands() {
        let rgb = RgbImage::from_fn(40, 200, |_, y| {
            if y < 80 {
                Rgb([20, 40, 200])
            } else {
                Rgb([255, 255, 255])
            }
        });
        let detector = ColorTransitionDetector::new(ColorTransitionConfig::default());
        assert_eq!(detector.detect(&rgb), vec![80]);
    }

    #[test]
    fn test_gradient_collapses_to_one_transition() {
        let rgb = RgbImage::from_fn(10, 100, |_, y| match y {
            0..40 => Rgb([0, 0, 0]),
            40..43 => {
                let v = ((y - 39) * 60) as u8;
                Rgb([v, v, v])
            }
            _ => Rgb([240, 240, 240]),
        });
        let detector = ColorTransitionDetector::new(ColorTransitionConfig::default());
        assert_eq!(detector.detect(&rgb).len(), 1);
    }

    #[test]
    fn test_textured_rows_are_not_transitions() {
        let rgb = RgbImage::from_fn(40, 100, |x, y| {
            let base = if y < 50 { 0 } else { 120 };
            Rgb([base + if x % 2 == 0 { 0 } else { 120 }, 0, 0])
        });
        let detector = ColorTransitionDetector::new(ColorTransitionConfig::default());
        assert!(detector.detect(&rgb).is_empty());
    }
}
