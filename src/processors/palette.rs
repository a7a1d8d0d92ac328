//! Dominant color extraction per component.
//!
//! Colors are sampled from a "medialess" copy of the screenshot in which every
//! image, logo and icon region is painted white, so palettes describe the page
//! chrome rather than photographic content.

use crate::core::config::PaletteConfig;
use crate::core::constants::{DEFAULT_COLOR, MEDIA_TYPES};
use crate::domain::{ComponentNode, ComponentTree, Styles};
use crate::utils::BoxCrop;
use image::RgbImage;
use itertools::Itertools;
use std::collections::BTreeSet;
use tracing::{debug, trace};

/// Channel value above which a pixel counts as near-white for the quantizer.
const NEAR_WHITE: u8 = 250;

fn is_media_type(type_key: &str) -> bool {
    MEDIA_TYPES.contains(&type_key)
}

fn to_hex([r, g, b]: [u8; 3]) -> String {
    format!("#{r:02x}{g:02x}{b:02x}")
}

fn blank_node(image: &mut RgbImage, node: &ComponentNode) {
    if is_media_type(&node.type_key()) {
        BoxCrop::paint_white(image, &node.bbox());
    }
    for media in &node.description.content.media {
        BoxCrop::paint_white(image, &media.coordinates.to_box());
    }
    for child in node.children() {
        blank_node(image, child);
    }
}

/// Returns a copy of `image` with all media regions of `tree` painted white.
///
/// Covers media-typed nodes and every media reference, at any depth.
pub fn create_medialess(image: &RgbImage, tree: &ComponentTree) -> RgbImage {
    let mut out = image.clone();
    for root in &tree.roots {
        blank_node(&mut out, root);
    }
    out
}

/// An axis-aligned box in RGB space holding a set of sampled pixels.
struct ColorBox {
    pixels: Vec<[u8; 3]>,
}

impl ColorBox {
    /// Widest channel and its value range.
    fn widest_channel(&self) -> (usize, u8) {
        (0..3)
            .map(|channel| {
                let (min, max) = self
                    .pixels
                    .iter()
                    .map(|p| p[channel])
                    .minmax()
                    .into_option()
                    .unwrap_or((0, 0));
                (channel, max - min)
            })
            .max_by_key(|&(channel, range)| (range, std::cmp::Reverse(channel)))
            .unwrap_or((0, 0))
    }

    fn split(mut self) -> (ColorBox, ColorBox) {
        let (channel, _) = self.widest_channel();
        self.pixels.sort_unstable_by_key(|p| p[channel]);
        let upper = self.pixels.split_off(self.pixels.len() / 2);
        (self, ColorBox { pixels: upper })
    }

    fn average(&self) -> [u8; 3] {
        let n = self.pixels.len().max(1) as u64;
        let mut sums = [0u64; 3];
        for p in &self.pixels {
            for (sum, &v) in sums.iter_mut().zip(p) {
                *sum += v as u64;
            }
        }
        sums.map(|s| ((s + n / 2) / n) as u8)
    }
}

/// Median-cut quantization of the non-white pixels of `image`, visiting every
/// `quality`-th pixel. Returns `None` when no usable pixel was sampled.
fn quantize(image: &RgbImage, max_colors: usize, quality: usize) -> Option<Vec<String>> {
    let pixels: Vec<[u8; 3]> = image
        .pixels()
        .step_by(quality.max(1))
        .map(|p| p.0)
        .filter(|p| !p.iter().all(|&v| v > NEAR_WHITE))
        .collect();
    if pixels.is_empty() {
        return None;
    }

    let mut boxes = vec![ColorBox { pixels }];
    while boxes.len() < max_colors {
        let candidate = boxes
            .iter()
            .enumerate()
            .filter(|(_, b)| b.pixels.len() > 1 && b.widest_channel().1 > 0)
            .max_by_key(|(i, b)| {
                let volume = b.pixels.len() as u64 * b.widest_channel().1 as u64;
                (volume, std::cmp::Reverse(*i))
            })
            .map(|(i, _)| i);
        let Some(index) = candidate else {
            break;
        };
        let (lower, upper) = boxes.swap_remove(index).split();
        boxes.push(lower);
        boxes.push(upper);
    }

    boxes.sort_by_key(|b| std::cmp::Reverse(b.pixels.len()));
    let palette: Vec<String> = boxes
        .iter()
        .map(|b| to_hex(b.average()))
        .unique()
        .take(max_colors)
        .collect();
    Some(palette)
}

/// Evenly spaced picks from the sorted unique colors of `image`.
fn sample_unique(image: &RgbImage, max_colors: usize) -> Vec<String> {
    if image.width() as u64 * image.height() as u64 <= 1 {
        return vec![DEFAULT_COLOR.to_string()];
    }
    let unique: Vec<[u8; 3]> = image
        .pixels()
        .map(|p| p.0)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();
    let step = if unique.len() > max_colors {
        unique.len() / max_colors.max(1)
    } else {
        1
    };
    unique
        .into_iter()
        .step_by(step)
        .take(max_colors)
        .map(to_hex)
        .collect()
}

/// Extracts up to `max_colors` dominant colors of `crop` as `#rrggbb` strings.
///
/// Falls back to uniform sampling of unique pixel values when the quantizer
/// has nothing to work with (for example an all-white crop), and to white for
/// degenerate crops.
pub fn extract_dominant_colors(crop: &RgbImage, max_colors: usize, quality: usize) -> Vec<String> {
    match quantize(crop, max_colors, quality) {
        Some(palette) if !palette.is_empty() => palette,
        _ => {
            trace!("quantizer found no colors, sampling unique pixels");
            sample_unique(crop, max_colors)
        }
    }
}

fn color_node(node: &mut ComponentNode, medialess: &RgbImage, config: &PaletteConfig) {
    if is_media_type(&node.type_key()) {
        return;
    }
    let bbox = node.bbox();
    match BoxCrop::crop_normalized(medialess, &bbox) {
        Ok(crop) => {
            let palette = extract_dominant_colors(&crop, config.max_colors, config.quality);
            let styles = node.description.styles.get_or_insert_with(|| Styles {
                width: bbox.width().to_string(),
                height: bbox.height().to_string(),
                color_palette: Vec::new(),
            });
            styles.color_palette = palette;
        }
        Err(err) => debug!(id = %node.id, error = %err, "skipping palette for empty region"),
    }
    for child in &mut node.description.children {
        color_node(child, medialess, config);
    }
}

/// Writes a color palette into the styles of every non-media node.
pub fn apply_palettes(tree: &mut ComponentTree, medialess: &RgbImage, config: &PaletteConfig) {
    for root in &mut tree.roots {
        color_node(root, medialess, config);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ComponentDescription, Content, MediaRef};
    use crate::processors::geometry::Box2D;
    use image::Rgb;

    fn node(id: &str, kind: &str, b: [i32; 4], children: Vec<ComponentNode>) -> ComponentNode {
        ComponentNode {
            id: id.to_string(),
            component_type: kind.to_string(),
            coordinates: Box2D::from(b).into(),
            description: ComponentDescription {
                component_type: kind.to_string(),
                description: String::new(),
                content: Content::default(),
                children,
                styles: None,
                layout: None,
            },
        }
    }

    #[test]
    fn test_all_white_crop_yields_white() {
        let crop = RgbImage::from_pixel(20, 20, Rgb([255, 255, 255]));
        assert_eq!(extract_dominant_colors(&crop, 5, 10), vec!["#ffffff"]);
    }

    #[test]
    fn test_single_pixel_crop_yields_default() {
        let crop = RgbImage::from_pixel(1, 1, Rgb([255, 255, 255]));
        assert_eq!(extract_dominant_colors(&crop, 5, 10), vec![DEFAULT_COLOR]);
    }

    #[test]
    fn test_two_color_crop() {
        let crop = RgbImage::from_fn(40, 40, |x, _| {
            if x < 30 {
                Rgb([200, 30, 30])
            } else {
                Rgb([20, 20, 120])
            }
        });
        let palette = extract_dominant_colors(&crop, 5, 1);
        assert_eq!(palette[0], "#c81e1e");
        assert!(palette.contains(&"#141478".to_string()));
        assert!(palette.len() <= 5);
    }

    #[test]
    fn test_sample_unique_spacing() {
        let crop = RgbImage::from_fn(10, 1, |x, _| Rgb([x as u8 * 20, 0, 0]));
        let picks = sample_unique(&crop, 5);
        assert_eq!(picks, vec!["#000000", "#280000", "#500000", "#780000", "#a00000"]);
    }

    #[test]
    fn test_medialess_and_palettes() {
        let image = RgbImage::from_pixel(100, 100, Rgb([10, 120, 10]));
        let mut root = node(
            "comp_1",
            "section",
            [0, 0, 1000, 1000],
            vec![node("comp_2", "icon", [0, 0, 100, 100], vec![])],
        );
        root.description.content.media.push(MediaRef {
            original_label: "image".to_string(),
            coordinates: Box2D::new(500, 500, 1000, 1000).into(),
            file_path: "assets/image_a.png".to_string(),
            kind: "image".to_string(),
            styles: None,
            layout: None,
        });
        let mut tree = ComponentTree::new(vec![root]);

        let medialess = create_medialess(&image, &tree);
        assert_eq!(medialess.get_pixel(5, 5), &Rgb([255, 255, 255]));
        assert_eq!(medialess.get_pixel(75, 75), &Rgb([255, 255, 255]));
        assert_eq!(medialess.get_pixel(30, 70), &Rgb([10, 120, 10]));

        apply_palettes(&mut tree, &medialess, &PaletteConfig::default());
        let root = &tree.roots[0];
        let styles = root.description.styles.as_ref().unwrap();
        assert_eq!(styles.color_palette, vec!["#0a780a"]);
        assert!(root.children()[0].description.styles.is_none());
    }
}
