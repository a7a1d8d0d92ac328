//! Multi-signal cut-line fusion and section derivation.

use crate::core::config::{ConcurrencyPolicy, SegmentationConfig};
use crate::core::constants::{
    BLANK_CONFIDENCE, BLANK_CORROBORATED_CONFIDENCE, COLOR_CONFIDENCE,
    COLOR_CORROBORATED_CONFIDENCE, COLOR_NEAR_BLANK_CONFIDENCE, FUSION_MIN_DISTANCE_FRACTION,
    SEPARATION_CONFIDENCE,
};
use crate::domain::{CutLine, LineSource, Section};
use crate::processors::separation::{SeparationDetector, select_spaced};
use crate::processors::signals::{BlankRegionDetector, ColorTransitionDetector};
use image::DynamicImage;
use serde::Serialize;
use tracing::{debug, info};

/// Outcome of a segmentation run.
#[derive(Debug, Clone, Serialize)]
pub struct Segmentation {
    /// Accepted lines, top to bottom.
    pub lines: Vec<CutLine>,
    /// Sections covering the whole image height.
    pub sections: Vec<Section>,
    /// Minimum distance enforced between accepted lines.
    pub min_line_distance: u32,
}

impl Segmentation {
    /// Row positions of the accepted lines.
    pub fn positions(&self) -> Vec<u32> {
        self.lines.iter().map(|line| line.position).collect()
    }
}

/// Fuses the separation, blank-region and color-transition signals.
#[derive(Debug, Clone, Default)]
pub struct MultiSignalSegmenter {
    config: SegmentationConfig,
    policy: ConcurrencyPolicy,
}

impl MultiSignalSegmenter {
    /// Creates a segmenter.
    pub fn new(config: SegmentationConfig) -> Self {
        Self {
            config,
            policy: ConcurrencyPolicy::default(),
        }
    }

    /// Sets the concurrency policy handed to every detector.
    pub fn with_policy(mut self, policy: ConcurrencyPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Minimum distance enforced for an image of `height` rows.
    pub fn effective_min_distance(&self, height: u32) -> u32 {
        if self.config.min_line_distance == 0 {
            (height as f64 * FUSION_MIN_DISTANCE_FRACTION) as u32
        } else {
            self.config.min_line_distance
        }
    }

    /// Pools the scored candidates of all three signals, in signal order.
    pub fn score_candidates(&self, image: &DynamicImage, min_distance: u32) -> Vec<CutLine> {
        let gray = image.to_luma8();
        let rgb = image.to_rgb8();

        let separation = SeparationDetector::new(self.config.separation(min_distance))
            .with_policy(self.policy.clone())
            .detect(&gray);
        let blank = BlankRegionDetector::new(self.config.blank_region.clone())
            .with_policy(self.policy.clone())
            .detect(&gray);
        let color = ColorTransitionDetector::new(self.config.color_transition())
            .with_policy(self.policy.clone())
            .detect(&rgb);
        debug!(
            separation = separation.len(),
            blank = blank.len(),
            color = color.len(),
            "segmentation signals collected"
        );

        let half = min_distance as f64 / 2.0;
        let near = |pos: u32, others: &[u32]| others.iter().any(|&o| (o.abs_diff(pos) as f64) < half);

        let mut pooled: Vec<CutLine> = separation
            .iter()
            .map(|&pos| CutLine::new(pos, SEPARATION_CONFIDENCE, LineSource::Separation))
            .collect();

        pooled.extend(blank.iter().map(|&pos| {
            let confidence = if near(pos, &separation) {
                BLANK_CORROBORATED_CONFIDENCE
            } else {
                BLANK_CONFIDENCE
            };
            CutLine::new(pos, confidence, LineSource::BlankRegion)
        }));

        pooled.extend(color.iter().map(|&pos| {
            let confidence = if near(pos, &separation) {
                COLOR_CORROBORATED_CONFIDENCE
            } else if near(pos, &blank) {
                COLOR_NEAR_BLANK_CONFIDENCE
            } else {
                COLOR_CONFIDENCE
            };
            CutLine::new(pos, confidence, LineSource::ColorTransition)
        }));

        pooled
    }

    /// Selects the final cut lines and derives the sections.
    ///
    /// Candidates below the confidence threshold are dropped; the rest are
    /// accepted by descending confidence while keeping the minimum distance,
    /// then sorted by position.
    pub fn segment(&self, image: &DynamicImage) -> Segmentation {
        let height = image.height();
        let min_distance = self.effective_min_distance(height);

        let mut pooled = self.score_candidates(image, min_distance);
        pooled.retain(|line| line.confidence >= self.config.confidence_threshold);
        pooled.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));

        let accepted = select_spaced(pooled.iter().map(|l| l.position), min_distance, Vec::new());
        let mut lines: Vec<CutLine> = accepted
            .iter()
            .filter_map(|&pos| pooled.iter().find(|l| l.position == pos).copied())
            .collect();
        lines.sort_by_key(|line| line.position);

        let positions: Vec<u32> = lines.iter().map(|l| l.position).collect();
        let sections = Section::from_lines(&positions, height);
        info!(
            height,
            lines = lines.len(),
            sections = sections.len(),
            min_line_distance = min_distance,
            "image segmented"
        );

        Segmentation {
            lines,
            sections,
            min_line_distance: min_distance,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, Luma};

    fn page_with_bands(height: u32, bands: &[u32], band_height: u32) -> DynamicImage {
        DynamicImage::ImageLuma8(GrayImage::from_fn(64, height, |x, y| {
            if bands.iter().any(|&b| y >= b && y < b + band_height) {
                Luma([255])
            } else if (x / 4 + y / 4) % 2 == 0 {
                Luma([0])
            } else {
                Luma([160])
            }
        }))
    }

    #[test]
    fn test_two_blank_bands_give_three_sections() {
        let image = page_with_bands(3000, &[1000, 2000], 50);
        let segmenter =
            MultiSignalSegmenter::new(SegmentationConfig::new().with_min_line_distance(100));
        let result = segmenter.segment(&image);

        let positions = result.positions();
        assert_eq!(positions.len(), 2, "lines: {positions:?}");
        assert!(positions[0].abs_diff(1000) <= 50);
        assert!(positions[1].abs_diff(2000) <= 50);

        assert_eq!(result.sections.len(), 3);
        assert_eq!(result.sections[0].y_min, 0);
        assert_eq!(result.sections[0].y_max, positions[0]);
        assert_eq!(result.sections[1], Section::new(positions[0], positions[1]));
        assert_eq!(result.sections[2].y_max, 3000);
    }

    #[test]
    fn test_sections_partition_height() {
        let image = page_with_bands(1800, &[300, 700, 1200], 40);
        for min in [0, 50, 200, 600] {
            let segmenter =
                MultiSignalSegmenter::new(SegmentationConfig::new().with_min_line_distance(min));
            let result = segmenter.segment(&image);
            let effective = result.min_line_distance;

            assert_eq!(result.sections.first().map(|s| s.y_min), Some(0));
            assert_eq!(result.sections.last().map(|s| s.y_max), Some(1800));
            for pair in result.sections.windows(2) {
                assert_eq!(pair[0].y_max, pair[1].y_min);
            }
            let positions = result.positions();
            assert!(positions.windows(2).all(|w| w[0] < w[1]));
            for (i, a) in positions.iter().enumerate() {
                for b in &positions[i + 1..] {
                    assert!(a.abs_diff(*b) >= effective);
                }
            }
        }
    }

    #[test]
    fn test_corroborated_blank_region_outranks_separation() {
        let image = page_with_bands(3000, &[1000, 2000], 50);
        let segmenter =
            MultiSignalSegmenter::new(SegmentationConfig::new().with_min_line_distance(100));
        let pooled = segmenter.score_candidates(&image, 100);
        let blank: Vec<&CutLine> = pooled
            .iter()
            .filter(|l| l.source == LineSource::BlankRegion)
            .collect();
        assert_eq!(blank.len(), 2);
        assert!(blank.iter().all(|l| l.confidence == BLANK_CORROBORATED_CONFIDENCE));
    }

    #[test]
    fn test_high_threshold_yields_single_section() {
        let image = page_with_bands(3000, &[1000, 2000], 50);
        let segmenter = MultiSignalSegmenter::new(
            SegmentationConfig::new()
                .with_min_line_distance(100)
                .with_confidence_threshold(0.95),
        );
        let result = segmenter.segment(&image);
        assert!(result.lines.is_empty());
        assert_eq!(result.sections, vec![Section::new(0, 3000)]);
    }

    #[test]
    fn test_auto_distance_is_five_percent() {
        let segmenter = MultiSignalSegmenter::new(SegmentationConfig::default());
        assert_eq!(segmenter.effective_min_distance(3000), 150);
    }
}
