//! Blank-space separation-line detection.
//!
//! A window of `window_size` rows slides down a grayscale image. A window that
//! is visually flat (low variance) and sits directly against a strong
//! intensity change above or below it marks a candidate boundary between two
//! page sections. Candidates are then thinned greedily by confidence under a
//! minimum-distance constraint.

use crate::core::config::{ConcurrencyPolicy, SeparationConfig};
use crate::core::constants::{
    DETECTOR_MIN_DISTANCE_FRACTION, EDGE_CONFIDENCE_BOOST, EDGE_PROXIMITY_FRACTION,
    MIN_EXPECTED_LINES,
};
use crate::domain::{CutLine, LineSource};
use image::GrayImage;
use rayon::prelude::*;
use tracing::debug;

/// Per-row intensity sums of a grayscale image.
///
/// Lets window and row variances be computed in O(1) per query.
#[derive(Debug, Clone)]
pub struct RowProfile {
    width: usize,
    sums: Vec<f64>,
    sq_sums: Vec<f64>,
}

impl RowProfile {
    /// Computes the profile, scanning rows in parallel when the policy asks for it.
    pub fn compute(gray: &GrayImage, policy: &ConcurrencyPolicy) -> Self {
        let width = gray.width() as usize;
        let height = gray.height() as usize;
        let row_stats = |y: usize| -> (f64, f64) {
            let start = y * width;
            gray.as_raw()[start..start + width]
                .iter()
                .fold((0.0, 0.0), |(s, sq), &p| {
                    let v = p as f64;
                    (s + v, sq + v * v)
                })
        };

        let stats: Vec<(f64, f64)> = if policy.scan_in_parallel(height) {
            (0..height).into_par_iter().map(row_stats).collect()
        } else {
            (0..height).map(row_stats).collect()
        };
        let (sums, sq_sums) = stats.into_iter().unzip();

        Self {
            width,
            sums,
            sq_sums,
        }
    }

    /// Number of rows.
    pub fn height(&self) -> usize {
        self.sums.len()
    }

    /// Population variance of the pixels in rows `[start, end)`.
    pub fn variance(&self, start: usize, end: usize) -> f64 {
        let n = ((end - start) * self.width) as f64;
        if n == 0.0 {
            return 0.0;
        }
        let sum: f64 = self.sums[start..end].iter().sum();
        let sq: f64 = self.sq_sums[start..end].iter().sum();
        let mean = sum / n;
        (sq / n - mean * mean).max(0.0)
    }

    /// Population variance of a single row.
    pub fn row_variance(&self, row: usize) -> f64 {
        self.variance(row, row + 1)
    }
}

/// Mean absolute difference between two rows and whether it qualifies as a border.
///
/// A border needs both a mean difference above `diff_thr` and more than
/// `portion_thr` of the columns individually above `diff_thr`.
fn border_between(gray: &GrayImage, a: u32, b: u32, diff_thr: f64, portion_thr: f64) -> (f64, bool) {
    let width = gray.width() as usize;
    if width == 0 {
        return (0.0, false);
    }
    let row = |y: u32| {
        let start = y as usize * width;
        &gray.as_raw()[start..start + width]
    };
    let (total, above) = row(a)
        .iter()
        .zip(row(b))
        .fold((0u64, 0usize), |(total, above), (&p, &q)| {
            let d = p.abs_diff(q);
            (total + d as u64, above + usize::from(d as f64 > diff_thr))
        });
    let mean = total as f64 / width as f64;
    let portion = above as f64 / width as f64;
    (mean, mean > diff_thr && portion > portion_thr)
}

/// Greedy selection in the given (confidence-descending) order: a position is
/// accepted when it is at least `min_distance` rows from every accepted one.
pub(crate) fn select_spaced<I>(positions: I, min_distance: u32, mut accepted: Vec<u32>) -> Vec<u32>
where
    I: IntoIterator<Item = u32>,
{
    for pos in positions {
        if accepted
            .iter()
            .all(|&existing| existing.abs_diff(pos) >= min_distance)
        {
            accepted.push(pos);
        }
    }
    accepted
}

/// Blank-space separation-line detector.
#[derive(Debug, Clone, Default)]
pub struct SeparationDetector {
    config: SeparationConfig,
    policy: ConcurrencyPolicy,
}

impl SeparationDetector {
    /// Creates a detector with the given thresholds.
    pub fn new(config: SeparationConfig) -> Self {
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

    /// The thresholds in use.
    pub fn config(&self) -> &SeparationConfig {
        &self.config
    }

    /// Minimum distance actually enforced for an image of `height` rows.
    pub fn effective_min_distance(&self, height: u32) -> u32 {
        if self.config.min_line_distance == 0 {
            (height as f64 * DETECTOR_MIN_DISTANCE_FRACTION) as u32
        } else {
            self.config.min_line_distance
        }
    }

    /// Scans the image and returns every candidate line with its border strength,
    /// in scan order.
    pub fn candidates(&self, gray: &GrayImage) -> Vec<CutLine> {
        let height = gray.height() as usize;
        let ws = self.config.window_size;
        if ws == 0 || height < 2 * ws + 3 {
            return Vec::new();
        }

        let profile = RowProfile::compute(gray, &self.policy);
        let SeparationConfig {
            var_thr,
            diff_thr,
            portion_thr,
            ..
        } = self.config;

        let probe = |i: usize| -> Option<CutLine> {
            if profile.variance(i - ws, i) >= var_thr {
                return None;
            }
            let (top_diff, border_top) =
                border_between(gray, (i - ws - 1) as u32, (i - ws) as u32, diff_thr, portion_thr);
            let (bottom_diff, border_bottom) =
                border_between(gray, i as u32, (i - 1) as u32, diff_thr, portion_thr);
            if !(border_top || border_bottom) {
                return None;
            }

            let pos = if border_bottom { i } else { i - ws };
            let mut confidence = top_diff.max(bottom_diff);
            let edge_proximity = pos.min(height - pos) as f64 / height as f64;
            if edge_proximity < EDGE_PROXIMITY_FRACTION {
                confidence *= EDGE_CONFIDENCE_BOOST;
            }
            Some(CutLine::new(pos as u32, confidence, LineSource::Separation))
        };

        let range = (ws + 1)..(height - ws - 1);
        if self.policy.scan_in_parallel(height) {
            range.into_par_iter().filter_map(probe).collect()
        } else {
            range.filter_map(probe).collect()
        }
    }

    /// Detects separation lines, returned sorted top to bottom.
    ///
    /// Candidates are accepted by descending confidence while keeping the
    /// minimum distance. When fewer than three lines survive, the selection is
    /// redone with the strongest candidate forced in and half the distance.
    pub fn detect(&self, gray: &GrayImage) -> Vec<u32> {
        let mut candidates = self.candidates(gray);
        if candidates.is_empty() {
            return Vec::new();
        }
        candidates.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));

        let min_distance = self.effective_min_distance(gray.height());
        let ordered = || candidates.iter().map(|c| c.position);

        let mut selected = select_spaced(ordered(), min_distance, Vec::new());
        if selected.len() < MIN_EXPECTED_LINES {
            let strongest = candidates[0].position;
            selected = select_spaced(ordered().skip(1), min_distance / 2, vec![strongest]);
            debug!(
                lines = selected.len(),
                min_distance = min_distance / 2,
                "separation detector relaxed spacing"
            );
        }
        selected.sort_unstable();

        debug!(
            candidates = candidates.len(),
            lines = selected.len(),
            min_distance,
            "separation lines detected"
        );
        selected
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;

    /// Noisy content with white bands of the given height starting at each row in `bands`.
    pub(crate) fn banded_image(width: u32, height: u32, bands: &[u32], band_height: u32) -> GrayImage {
        GrayImage::from_fn(width, height, |x, y| {
            if bands.iter().any(|&b| y >= b && y < b + band_height) {
                Luma([255])
            } else if (x / 4 + y / 4) % 2 == 0 {
                Luma([0])
            } else {
                Luma([160])
            }
        })
    }

    #[test]
    fn test_row_profile_variance() {
        let gray = GrayImage::from_fn(4, 2, |x, _| Luma([if x % 2 == 0 { 0 } else { 100 }]));
        let profile = RowProfile::compute(&gray, &ConcurrencyPolicy::default());
        assert_eq!(profile.height(), 2);
        assert!((profile.row_variance(0) - 2500.0).abs() < 1e-9);
        assert!((profile.variance(0, 2) - 2500.0).abs() < 1e-9);
    }

    #[test]
    fn test_candidates_at_band_edges() {
        let gray = banded_image(64, 600, &[300], 40);
        let detector = SeparationDetector::new(SeparationConfig::default());
        let positions: Vec<u32> = detector.candidates(&gray).iter().map(|c| c.position).collect();
        assert_eq!(positions, vec![300, 340]);
    }

    #[test]
    fn test_flat_image_has_no_lines() {
        let gray = GrayImage::from_pixel(50, 500, Luma([255]));
        let detector = SeparationDetector::new(SeparationConfig::default());
        assert!(detector.detect(&gray).is_empty());
    }

    #[test]
    fn test_tiny_image_has_no_candidates() {
        let gray = GrayImage::from_pixel(10, 15, Luma([0]));
        let detector = SeparationDetector::new(SeparationConfig::default());
        assert!(detector.candidates(&gray).is_empty());
    }

    #[test]
    fn test_accepted_lines_respect_distance() {
        let gray = banded_image(64, 3000, &[400, 900, 1500, 2100, 2600], 30);
        let detector =
            SeparationDetector::new(SeparationConfig::default().with_min_line_distance(200));
        let lines = detector.detect(&gray);
        assert!(lines.len() >= 3);
        assert!(lines.windows(2).all(|w| w[0] < w[1]));
        for (i, a) in lines.iter().enumerate() {
            for b in &lines[i + 1..] {
                assert!(a.abs_diff(*b) >= 200);
            }
        }
    }

    #[test]
    fn test_relaxed_pass_forces_strongest_line() {
        let gray = banded_image(64, 2000, &[1000], 60);
        let detector =
            SeparationDetector::new(SeparationConfig::default().with_min_line_distance(100));
        // Band edges are 60 rows apart: too close for 100, far enough for 50.
        assert_eq!(detector.detect(&gray), vec![1000, 1060]);
    }

    #[test]
    fn test_select_spaced_prefers_order_over_position() {
        let accepted = select_spaced([500, 100, 520, 90, 300], 50, Vec::new());
        assert_eq!(accepted, vec![500, 100, 300]);
    }

    #[test]
    fn test_auto_distance_is_three_percent() {
        let detector =
            SeparationDetector::new(SeparationConfig::default().with_min_line_distance(0));
        assert_eq!(detector.effective_min_distance(2000), 60);
    }
}
