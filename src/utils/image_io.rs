//! Image loading and saving helpers.

use crate::core::errors::{ImageProcessError, PipelineError, PipelineResult};
use image::{DynamicImage, RgbImage};
use std::path::Path;

/// Loads an image from disk without converting its color type.
///
/// Missing files are reported as [`PipelineError::NotFound`].
pub fn load_dynamic(path: impl AsRef<Path>) -> PipelineResult<DynamicImage> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(PipelineError::not_found("image", path));
    }
    let image = image::open(path)?;
    if image.width() == 0 || image.height() == 0 {
        return Err(ImageProcessError::EmptyImage.into());
    }
    Ok(image)
}

/// Loads an image from disk as 8-bit RGB.
pub fn load_image(path: impl AsRef<Path>) -> PipelineResult<RgbImage> {
    Ok(load_dynamic(path)?.to_rgb8())
}

/// Saves an RGB image, creating the parent directory if needed. The format
/// follows the file extension.
pub fn save_image(image: &RgbImage, path: impl AsRef<Path>) -> PipelineResult<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    image.save(path)?;
    Ok(())
}

/// Extension of `path` including the dot, `.jpg` when there is none.
pub fn extension_or_jpg(path: impl AsRef<Path>) -> String {
    path.as_ref()
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| format!(".{ext}"))
        .unwrap_or_else(|| ".jpg".to_string())
}
