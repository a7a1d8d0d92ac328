//! Box based cropping and painting on screenshot images.

use crate::core::errors::{ImageProcessError, PipelineError, PipelineResult};
use crate::domain::{HeuristicElement, Section};
use crate::processors::geometry::{Box2D, PixelRect};
use crate::processors::hierarchy::MediaStore;
use image::{Rgb, RgbImage, imageops};
use imageproc::drawing::{draw_filled_rect_mut, draw_hollow_rect_mut};
use imageproc::rect::Rect;
use std::path::PathBuf;

/// Outline color of a highlighted component.
const HIGHLIGHT_COLOR: Rgb<u8> = Rgb([255, 0, 0]);
/// Outline thickness of a highlighted component, in pixels.
const HIGHLIGHT_THICKNESS: u32 = 5;
/// Opacity of the black veil laid over everything but the highlighted box.
const DIM_ALPHA: u16 = 80;

const WHITE: Rgb<u8> = Rgb([255, 255, 255]);

/// Box based image cropping utilities.
pub struct BoxCrop;

impl BoxCrop {
    /// Crops the region of a normalized box out of `image`.
    ///
    /// # Arguments
    ///
    /// * `image` - The source image
    /// * `bbox` - Box in the 0-1000 coordinate space
    ///
    /// # Returns
    ///
    /// The cropped image, or [`ImageProcessError::EmptyRegion`] when the box
    /// covers no pixels after clamping.
    pub fn crop_normalized(image: &RgbImage, bbox: &Box2D) -> Result<RgbImage, ImageProcessError> {
        let rect = bbox.to_pixels(image.width(), image.height());
        if rect.is_empty() {
            return Err(ImageProcessError::EmptyRegion {
                x1: rect.x1,
                y1: rect.y1,
                x2: rect.x2,
                y2: rect.y2,
            });
        }
        Ok(Self::slice_rgb_image(image, &rect))
    }

    /// Crops the full-width band of a section.
    pub fn crop_section(image: &RgbImage, section: &Section) -> Result<RgbImage, ImageProcessError> {
        if image.width() == 0 || image.height() == 0 {
            return Err(ImageProcessError::EmptyImage);
        }
        if section.y_max > image.height() || section.y_min >= section.y_max {
            return Err(ImageProcessError::SectionOutOfBounds {
                y_min: section.y_min,
                y_max: section.y_max,
                height: image.height(),
            });
        }
        let rect = PixelRect {
            x1: 0,
            y1: section.y_min,
            x2: image.width(),
            y2: section.y_max,
        };
        Ok(Self::slice_rgb_image(image, &rect))
    }

    fn slice_rgb_image(image: &RgbImage, rect: &PixelRect) -> RgbImage {
        imageops::crop_imm(image, rect.x1, rect.y1, rect.width(), rect.height()).to_image()
    }

    fn to_rect(rect: &PixelRect) -> Option<Rect> {
        (!rect.is_empty())
            .then(|| Rect::at(rect.x1 as i32, rect.y1 as i32).of_size(rect.width(), rect.height()))
    }

    /// Paints the region of a normalized box white. Empty regions are ignored.
    pub fn paint_white(image: &mut RgbImage, bbox: &Box2D) {
        let rect = bbox.to_pixels(image.width(), image.height());
        if let Some(rect) = Self::to_rect(&rect) {
            draw_filled_rect_mut(image, rect, WHITE);
        }
    }

    /// Draws a `thickness` pixel outline along the inside of `rect`.
    pub fn draw_outline(image: &mut RgbImage, rect: &PixelRect, color: Rgb<u8>, thickness: u32) {
        for inset in 0..thickness {
            let inner = PixelRect {
                x1: rect.x1 + inset,
                y1: rect.y1 + inset,
                x2: rect.x2.saturating_sub(inset),
                y2: rect.y2.saturating_sub(inset),
            };
            match Self::to_rect(&inner) {
                Some(r) => draw_hollow_rect_mut(image, r, color),
                None => break,
            }
        }
    }

    /// Returns a copy of `image` with everything outside `bbox` dimmed and
    /// the box itself outlined in red.
    pub fn highlight(image: &RgbImage, bbox: &Box2D) -> RgbImage {
        let rect = bbox.to_pixels(image.width(), image.height());
        let mut out = image.clone();
        for (x, y, pixel) in out.enumerate_pixels_mut() {
            let inside = x >= rect.x1 && x < rect.x2 && y >= rect.y1 && y < rect.y2;
            if !inside {
                for channel in pixel.0.iter_mut() {
                    *channel = (*channel as u16 * (255 - DIM_ALPHA) / 255) as u8;
                }
            }
        }
        Self::draw_outline(&mut out, &rect, HIGHLIGHT_COLOR, HIGHLIGHT_THICKNESS);
        out
    }
}

/// A [`MediaStore`] that crops media elements out of the source image and
/// writes them as `image_{id}.{ext}` into an assets directory.
pub struct AssetCropper<'a> {
    image: &'a RgbImage,
    assets_dir: PathBuf,
    extension: String,
}

impl<'a> AssetCropper<'a> {
    /// Creates a cropper writing into `assets_dir` with the given file extension.
    pub fn new(image: &'a RgbImage, assets_dir: impl Into<PathBuf>, extension: &str) -> Self {
        Self {
            image,
            assets_dir: assets_dir.into(),
            extension: extension.trim_start_matches('.').to_string(),
        }
    }

    /// Directory the assets are written to.
    pub fn assets_dir(&self) -> &std::path::Path {
        &self.assets_dir
    }
}

impl MediaStore for AssetCropper<'_> {
    fn store(&mut self, element: &HeuristicElement) -> PipelineResult<Option<String>> {
        let crop = match BoxCrop::crop_normalized(self.image, &element.bbox) {
            Ok(crop) => crop,
            Err(ImageProcessError::EmptyRegion { .. }) => return Ok(None),
            Err(err) => return Err(err.into()),
        };
        std::fs::create_dir_all(&self.assets_dir)?;
        let file_name = format!("image_{}.{}", crate::utils::short_id(), self.extension);
        let path = self.assets_dir.join(&file_name);
        crop.save(&path).map_err(PipelineError::from)?;
        Ok(Some(format!("assets/{file_name}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::ImageBuffer;

    fn create_test_image(width: u32, height: u32) -> RgbImage {
        ImageBuffer::from_fn(width, height, |x, y| {
            Rgb([(x * 255 / width.max(1)) as u8, (y * 255 / height.max(1)) as u8, 128])
        })
    }

    #[test]
    fn test_crop_normalized_scales_box() {
        let img = create_test_image(200, 400);
        let cropped = BoxCrop::crop_normalized(&img, &Box2D::new(100, 250, 500, 750)).unwrap();
        assert_eq!(cropped.dimensions(), (100, 160));
        assert_eq!(cropped.get_pixel(0, 0), img.get_pixel(50, 40));
    }

    #[test]
    fn test_crop_normalized_empty_region() {
        let img = create_test_image(100, 100);
        let err = BoxCrop::crop_normalized(&img, &Box2D::new(1100, 0, 1200, 500)).unwrap_err();
        assert!(matches!(err, ImageProcessError::EmptyRegion { .. }));
    }

    #[test]
    fn test_crop_section_bounds() {
        let img = create_test_image(50, 300);
        let band = BoxCrop::crop_section(&img, &Section::new(100, 250)).unwrap();
        assert_eq!(band.dimensions(), (50, 150));
        assert!(BoxCrop::crop_section(&img, &Section::new(100, 301)).is_err());
    }

    #[test]
    fn test_paint_white_and_highlight() {
        let mut img = RgbImage::from_pixel(100, 100, Rgb([100, 100, 100]));
        BoxCrop::paint_white(&mut img, &Box2D::new(0, 0, 500, 500));
        assert_eq!(img.get_pixel(10, 10), &WHITE);
        assert_eq!(img.get_pixel(60, 60), &Rgb([100, 100, 100]));

        let base = RgbImage::from_pixel(100, 100, Rgb([200, 200, 200]));
        let highlighted = BoxCrop::highlight(&base, &Box2D::new(200, 200, 800, 800));
        assert_eq!(highlighted.get_pixel(20, 20), &HIGHLIGHT_COLOR);
        assert_eq!(highlighted.get_pixel(50, 50), &Rgb([200, 200, 200]));
        assert!(highlighted.get_pixel(5, 5)[0] < 200);
    }

    #[test]
    fn test_asset_cropper_writes_file() {
        let dir = tempfile::tempdir().unwrap();
        let img = create_test_image(100, 100);
        let mut store = AssetCropper::new(&img, dir.path().join("assets"), ".png");
        let element = HeuristicElement {
            bbox: Box2D::new(0, 0, 500, 500),
            label: "image".to_string(),
            description: String::new(),
            text: String::new(),
        };
        let path = store.store(&element).unwrap().unwrap();
        assert!(path.starts_with("assets/image_"));
        assert!(path.ends_with(".png"));
        assert!(dir.path().join(&path).exists());

        let empty = HeuristicElement {
            bbox: Box2D::new(500, 500, 500, 900),
            ..element
        };
        assert_eq!(store.store(&empty).unwrap(), None);
    }
}
