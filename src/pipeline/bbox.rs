//! Bounding-box stage: asks the model for element boxes of one section image,
//! post-processes them and persists the result.

use crate::core::config::PromptSet;
use crate::core::errors::{PipelineError, PipelineResult, ProcessingStage};
use crate::domain::{FlatComponent, HeuristicElement};
use crate::pipeline::model::{GenerationRequest, TokenUsage, VisionModel};
use crate::pipeline::run_blocking;
use crate::pipeline::workspace::{RequestWorkspace, file_stem};
use crate::processors::geometry::Box2D;
use crate::processors::{filter_nested_elements, parse_flat_components, parse_heuristic_elements};
use crate::utils::{BoxCrop, load_image, save_image};
use image::{Rgb, RgbImage};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;

const OVERLAY_THICKNESS: u32 = 3;

/// Outline color of a label in the debug overlay.
fn label_color(label: &str) -> Rgb<u8> {
    match label.to_lowercase().as_str() {
        "header" | "main_content_area" | "text_block" | "headline" => Rgb([255, 0, 0]),
        "logo" | "image" | "icon" => Rgb([0, 255, 255]),
        "nav_link" | "link" => Rgb([0, 0, 255]),
        "news_article" => Rgb([255, 0, 255]),
        _ => Rgb([255, 165, 0]),
    }
}

/// Parsed boxes of one section, in the shape of the selected mode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BoxList {
    /// Non-heuristic mode: nested elements already filtered out.
    Flat(Vec<FlatComponent>),
    /// Heuristic mode: every element, hierarchy built later.
    Heuristic(Vec<HeuristicElement>),
}

impl BoxList {
    pub fn len(&self) -> usize {
        match self {
            BoxList::Flat(items) => items.len(),
            BoxList::Heuristic(items) => items.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Label and box of every entry.
    pub fn boxes(&self) -> Vec<(&str, Box2D)> {
        match self {
            BoxList::Flat(items) => items.iter().map(|c| (c.label.as_str(), c.box_2d)).collect(),
            BoxList::Heuristic(items) => items.iter().map(|e| (e.label.as_str(), e.bbox)).collect(),
        }
    }
}

/// Draws every box outlined in its label color.
pub fn render_overlay(image: &RgbImage, boxes: &BoxList) -> RgbImage {
    let mut out = image.clone();
    for (label, bbox) in boxes.boxes() {
        let rect = bbox.to_pixels(out.width(), out.height());
        BoxCrop::draw_outline(&mut out, &rect, label_color(label), OVERLAY_THICKNESS);
    }
    out
}

/// Output of the bounding-box stage.
#[derive(Debug, Clone)]
pub struct BoundingBoxOutput {
    pub boxes: BoxList,
    /// `labels/{stem}.json`
    pub labels_path: PathBuf,
    /// `images/bboxes/{stem}.jpg`
    pub overlay_path: PathBuf,
    pub usage: TokenUsage,
}

/// Runs box detection for one section image.
#[derive(Debug, Clone)]
pub struct BoundingBoxStage {
    prompts: PromptSet,
    temperature: f32,
}

impl BoundingBoxStage {
    pub fn new(prompts: PromptSet, temperature: f32) -> Self {
        Self {
            prompts,
            temperature,
        }
    }

    /// Parses a raw model reply in the shape of the selected mode.
    pub fn parse_reply(reply: &str, heuristic: bool) -> BoxList {
        if heuristic {
            BoxList::Heuristic(parse_heuristic_elements(reply))
        } else {
            BoxList::Flat(filter_nested_elements(&parse_flat_components(reply)))
        }
    }

    pub async fn run(
        &self,
        model: &dyn VisionModel,
        image_path: &Path,
        workspace: &RequestWorkspace,
        heuristic: bool,
    ) -> PipelineResult<BoundingBoxOutput> {
        let stem = file_stem(image_path)?;
        let image = {
            let image_path = image_path.to_path_buf();
            run_blocking(ProcessingStage::BoundingBox, move || load_image(&image_path)).await?
        };

        let prompt = if heuristic {
            &self.prompts.heuristic_bbox
        } else {
            &self.prompts.bbox
        };
        let generation = model
            .generate(GenerationRequest::new(prompt.clone(), image_path, self.temperature))
            .await?;

        let boxes = Self::parse_reply(&generation.text, heuristic);
        info!(
            request_id = workspace.request_id(),
            section = %stem,
            components = boxes.len(),
            heuristic,
            "bounding boxes parsed"
        );

        let labels_path = workspace.labels_path(&stem);
        let json = serde_json::to_string_pretty(&boxes)?;
        tokio::fs::write(&labels_path, json).await.map_err(|err| {
            PipelineError::processing(
                ProcessingStage::BoundingBox,
                format!("writing {}", labels_path.display()),
                err,
            )
        })?;

        let overlay_path = workspace.overlay_path(&stem);
        {
            let boxes = boxes.clone();
            let overlay_path = overlay_path.clone();
            run_blocking(ProcessingStage::BoundingBox, move || {
                save_image(&render_overlay(&image, &boxes), &overlay_path)
            })
            .await?;
        }

        Ok(BoundingBoxOutput {
            boxes,
            labels_path,
            overlay_path,
            usage: generation.usage,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::model::testing::ScriptedModel;

    #[test]
    fn test_flat_reply_is_filtered() {
        let reply = r#"[
            {"label": "navbar", "box_2d": [0, 0, 100, 1000]},
            {"label": "link", "box_2d": [10, 10, 90, 100]},
            {"label": "hero", "box_2d": [100, 0, 600, 1000]}
        ]"#;
        let boxes = BoundingBoxStage::parse_reply(reply, false);
        let BoxList::Flat(items) = boxes else {
            panic!("expected flat boxes");
        };
        let labels: Vec<&str> = items.iter().map(|c| c.label.as_str()).collect();
        assert_eq!(labels, vec!["navbar", "hero"]);
    }

    #[test]
    fn test_heuristic_reply_keeps_everything() {
        let reply = r#"[
            {"bbox": [0, 0, 100, 1000], "label": "navbar", "description": "top"},
            {"bbox": [10, 10, 90, 100], "label": "link", "description": "home"}
        ]"#;
        assert_eq!(BoundingBoxStage::parse_reply(reply, true).len(), 2);
    }

    #[test]
    fn test_box_list_json_shapes() {
        let flat = BoxList::Flat(vec![FlatComponent::new("a", Box2D::new(1, 2, 3, 4))]);
        let json = serde_json::to_string(&flat).unwrap();
        assert_eq!(json, r#"[{"label":"a","box_2d":[1,2,3,4]}]"#);
        let back: BoxList = serde_json::from_str(&json).unwrap();
        assert_eq!(back, flat);
    }

    #[test]
    fn test_overlay_outlines_boxes() {
        let image = RgbImage::from_pixel(100, 100, Rgb([255, 255, 255]));
        let boxes = BoxList::Flat(vec![FlatComponent::new("logo", Box2D::new(100, 100, 500, 500))]);
        let out = render_overlay(&image, &boxes);
        assert_eq!(out.get_pixel(10, 10), &Rgb([0, 255, 255]));
        assert_eq!(out.get_pixel(30, 30), &Rgb([255, 255, 255]));
    }

    #[tokio::test]
    async fn test_run_writes_labels_and_overlay() {
        let dir = tempfile::tempdir().unwrap();
        let ws = RequestWorkspace::create(dir.path(), "req").unwrap();
        let image_path = ws.images_dir().join("shot_section_1.png");
        RgbImage::from_pixel(50, 50, Rgb([240, 240, 240]))
            .save(&image_path)
            .unwrap();

        let prompts = PromptSet::default();
        let model = ScriptedModel::new(r#"```json
[{"label": "button", "box_2d": [100, 100, 300, 400]},]
```"#);
        let stage = BoundingBoxStage::new(prompts.clone(), 0.1);
        let output = stage.run(&model, &image_path, &ws, false).await.unwrap();

        assert_eq!(output.boxes.len(), 1);
        assert_eq!(output.usage.requests, 1);
        assert!(output.overlay_path.exists());
        let saved: Vec<FlatComponent> =
            serde_json::from_str(&std::fs::read_to_string(&output.labels_path).unwrap()).unwrap();
        assert_eq!(saved[0].box_2d, Box2D::new(100, 100, 300, 400));

        let calls = model.calls.lock().unwrap();
        assert_eq!(calls[0].prompt, prompts.bbox);
        assert_eq!(calls[0].images, vec![image_path.clone()]);
    }
}
