//! Segmentation stage: decides whether a screenshot needs splitting, then
//! detects cut lines and writes one image file per section.

use crate::core::config::{ConcurrencyPolicy, SegmentationConfig};
use crate::core::errors::{PipelineError, PipelineResult, ProcessingStage};
use crate::domain::{CutLine, Section};
use crate::pipeline::workspace::{RequestWorkspace, file_stem};
use crate::processors::MultiSignalSegmenter;
use crate::utils::{BoxCrop, load_dynamic};
use image::{Rgb, RgbImage};
use imageproc::drawing::draw_filled_rect_mut;
use imageproc::rect::Rect;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;

/// Thickness of a rendered cut line, in pixels.
const CUT_LINE_THICKNESS: u32 = 6;
const CUT_LINE_COLOR: Rgb<u8> = Rgb([255, 0, 255]);

/// One written section file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SegmentInfo {
    /// 0-based section index, top to bottom.
    pub index: usize,
    pub y_min: u32,
    pub y_max: u32,
    pub height: u32,
    pub file_path: PathBuf,
}

/// Result of the segmentation stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SegmentationReport {
    pub image_width: u32,
    pub image_height: u32,
    pub segmentation_performed: bool,
    /// Accepted cut lines; empty when segmentation was skipped.
    #[serde(default)]
    pub detected_lines: Vec<CutLine>,
    #[serde(default)]
    pub segments: Vec<SegmentInfo>,
    /// First section, or the copied original when nothing was split.
    pub image_path: PathBuf,
}

impl SegmentationReport {
    /// Images the later stages must process, top to bottom.
    pub fn section_paths(&self) -> Vec<PathBuf> {
        if self.segments.is_empty() {
            vec![self.image_path.clone()]
        } else {
            self.segments.iter().map(|s| s.file_path.clone()).collect()
        }
    }
}

/// Draws every cut line as a magenta band across the full width.
pub fn render_cut_lines(image: &RgbImage, lines: &[u32]) -> RgbImage {
    let mut out = image.clone();
    let half = CUT_LINE_THICKNESS / 2;
    for &line in lines {
        let top = line.saturating_sub(half);
        let bottom = (line + half).min(out.height());
        if bottom > top && out.width() > 0 {
            let rect = Rect::at(0, top as i32).of_size(out.width(), bottom - top);
            draw_filled_rect_mut(&mut out, rect, CUT_LINE_COLOR);
        }
    }
    out
}

/// Writes `{stem}_section_{n}.png` for every section into `output_dir`.
pub fn split_into_sections(
    image: &RgbImage,
    sections: &[Section],
    stem: &str,
    output_dir: &Path,
) -> PipelineResult<Vec<SegmentInfo>> {
    std::fs::create_dir_all(output_dir)?;
    sections
        .iter()
        .enumerate()
        .map(|(index, section)| {
            let crop = BoxCrop::crop_section(image, section).map_err(|err| {
                PipelineError::processing(
                    ProcessingStage::Splitting,
                    format!("section {}", index + 1),
                    err,
                )
            })?;
            let file_path = output_dir.join(format!("{stem}_section_{}.png", index + 1));
            crop.save(&file_path)?;
            Ok(SegmentInfo {
                index,
                y_min: section.y_min,
                y_max: section.y_max,
                height: section.height(),
                file_path,
            })
        })
        .collect()
}

/// Runs segmentation for one uploaded screenshot.
#[derive(Debug, Clone, Default)]
pub struct SegmentationStage {
    config: SegmentationConfig,
    policy: ConcurrencyPolicy,
}

impl SegmentationStage {
    pub fn new(config: SegmentationConfig) -> Self {
        Self {
            config,
            policy: ConcurrencyPolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: ConcurrencyPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Segments `image_path` into `workspace.images_dir()`.
    ///
    /// Images no taller than the height threshold are copied unchanged.
    pub fn run(
        &self,
        image_path: &Path,
        workspace: &RequestWorkspace,
    ) -> PipelineResult<SegmentationReport> {
        self.run_into(image_path, &workspace.images_dir())
    }

    /// Same as [`Self::run`] with an explicit output directory.
    pub fn run_into(
        &self,
        image_path: &Path,
        output_dir: &Path,
    ) -> PipelineResult<SegmentationReport> {
        let image = load_dynamic(image_path)?;
        let (width, height) = (image.width(), image.height());
        std::fs::create_dir_all(output_dir)?;

        if height <= self.config.height_threshold {
            let file_name = image_path
                .file_name()
                .ok_or_else(|| PipelineError::invalid_input("image path has no file name"))?;
            let target = output_dir.join(file_name);
            if target != image_path {
                std::fs::copy(image_path, &target)?;
            }
            info!(
                width,
                height,
                threshold = self.config.height_threshold,
                "image below height threshold, not segmented"
            );
            return Ok(SegmentationReport {
                image_width: width,
                image_height: height,
                segmentation_performed: false,
                detected_lines: Vec::new(),
                segments: Vec::new(),
                image_path: target,
            });
        }

        let segmentation = MultiSignalSegmenter::new(self.config.clone())
            .with_policy(self.policy.clone())
            .segment(&image);
        let stem = file_stem(image_path)?;
        let rgb = image.to_rgb8();
        let segments = split_into_sections(&rgb, &segmentation.sections, &stem, output_dir)?;
        info!(
            lines = segmentation.lines.len(),
            sections = segments.len(),
            "image segmented"
        );

        let image_path = segments
            .first()
            .map(|s| s.file_path.clone())
            .unwrap_or_else(|| image_path.to_path_buf());
        Ok(SegmentationReport {
            image_width: width,
            image_height: height,
            segmentation_performed: true,
            detected_lines: segmentation.lines,
            segments,
            image_path,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// White page with checkered content blocks separated by 50px white bands.
    fn page(height: u32, bands: &[u32]) -> RgbImage {
        RgbImage::from_fn(400, height, |x, y| {
            let in_band = bands.iter().any(|&b| y >= b && y < b + 50);
            if in_band || ((x / 4 + y / 4) % 2 == 0) {
                Rgb([255, 255, 255])
            } else {
                Rgb([0, 0, 160])
            }
        })
    }

    #[test]
    fn test_short_image_is_copied() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("shot.png");
        page(600, &[]).save(&src).unwrap();

        let ws = RequestWorkspace::create(dir.path(), "req").unwrap();
        let report = SegmentationStage::default().run(&src, &ws).unwrap();
        assert!(!report.segmentation_performed);
        assert!(report.segments.is_empty());
        assert_eq!(report.image_path, ws.images_dir().join("shot.png"));
        assert!(report.image_path.exists());
        assert_eq!(report.section_paths(), vec![report.image_path.clone()]);
    }

    #[test]
    fn test_tall_image_is_split_into_named_sections() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("landing.png");
        page(3000, &[1000, 2000]).save(&src).unwrap();

        let ws = RequestWorkspace::create(dir.path(), "req").unwrap();
        let stage = SegmentationStage::new(SegmentationConfig::new().with_min_line_distance(100));
        let report = stage.run(&src, &ws).unwrap();

        assert!(report.segmentation_performed);
        assert_eq!(report.image_height, 3000);
        assert!(!report.segments.is_empty());
        let total: u32 = report.segments.iter().map(|s| s.height).sum();
        assert_eq!(total, 3000);
        for (n, segment) in report.segments.iter().enumerate() {
            assert_eq!(segment.index, n);
            let name = format!("landing_section_{}.png", n + 1);
            assert_eq!(segment.file_path, ws.images_dir().join(name));
            assert!(segment.file_path.exists());
        }
        assert_eq!(report.image_path, report.segments[0].file_path);
    }

    #[test]
    fn test_render_cut_lines() {
        let image = RgbImage::from_pixel(20, 100, Rgb([0, 0, 0]));
        let out = render_cut_lines(&image, &[50, 99]);
        assert_eq!(out.get_pixel(10, 47), &CUT_LINE_COLOR);
        assert_eq!(out.get_pixel(10, 52), &CUT_LINE_COLOR);
        assert_eq!(out.get_pixel(10, 53), &Rgb([0, 0, 0]));
        assert_eq!(out.get_pixel(0, 99), &CUT_LINE_COLOR);
    }

    #[test]
    fn test_split_rejects_out_of_bounds_sections() {
        let dir = tempfile::tempdir().unwrap();
        let image = RgbImage::new(10, 10);
        let err = split_into_sections(&image, &[Section::new(0, 20)], "x", dir.path()).unwrap_err();
        assert!(matches!(
            err,
            PipelineError::Processing {
                kind: ProcessingStage::Splitting,
                ..
            }
        ));
    }
}
