//! Non-heuristic description stage: describes every filtered component of a
//! section through the model, one highlighted render per component.

use crate::core::config::PromptSet;
use crate::core::errors::{PipelineError, PipelineResult, ProcessingStage};
use crate::domain::{
    ComponentRecord, FlatComponent, ImageAsset, MediaBundle, PixelCoordinates, default_description,
};
use crate::pipeline::model::{GenerationRequest, TokenUsage, VisionModel};
use crate::pipeline::run_blocking;
use crate::pipeline::workspace::{RequestWorkspace, file_stem};
use crate::processors::geometry::Box2D;
use crate::utils::{BoxCrop, extension_or_jpg, load_image, save_image, short_id, strip_code_fences};
use futures::future::join_all;
use image::RgbImage;
use serde::ser::{Serialize, SerializeMap, Serializer};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

/// Records serialized as a JSON object keyed by component id, in input order.
pub struct RecordMap<'a>(pub &'a [ComponentRecord]);

impl Serialize for RecordMap<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for record in self.0 {
            map.serialize_entry(&record.id, record)?;
        }
        map.end()
    }
}

/// Output of the description stage.
#[derive(Debug, Clone)]
pub struct DescriptionOutput {
    pub records: Vec<ComponentRecord>,
    /// `description/{stem}.json`
    pub output_path: PathBuf,
    pub usage: TokenUsage,
}

/// Label made safe for use in a file name.
fn file_safe(label: &str) -> String {
    label
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '_' })
        .collect()
}

/// Parses a description reply; `None` when it is not JSON.
pub fn parse_description(reply: &str) -> Option<Value> {
    serde_json::from_str(strip_code_fences(reply)).ok()
}

/// Renumbers images the model reported inside a description as
/// `{id}_img_{n}`, marks them as detected and drops their file paths.
fn tag_detected_images(description: &mut Value, component_id: &str) {
    let Some(images) = description
        .get_mut("media")
        .and_then(|media| media.get_mut("images"))
        .and_then(Value::as_array_mut)
    else {
        return;
    };
    for (i, image) in images.iter_mut().enumerate() {
        if let Some(entry) = image.as_object_mut() {
            entry.insert("id".into(), Value::String(format!("{component_id}_img_{i}")));
            entry.insert("detected".into(), Value::Bool(true));
            entry.remove("filePath");
        }
    }
}

/// Describes the components of one section image.
#[derive(Debug, Clone)]
pub struct DescriptionStage {
    prompts: PromptSet,
    temperature: f32,
    max_concurrent: usize,
}

impl DescriptionStage {
    pub fn new(prompts: PromptSet, temperature: f32, max_concurrent: usize) -> Self {
        Self {
            prompts,
            temperature,
            max_concurrent: max_concurrent.max(1),
        }
    }

    /// Reads `labels/{stem}.json`, describes every component with at most
    /// `max_concurrent` model calls in flight and writes `description/{stem}.json`.
    pub async fn run(
        &self,
        model: &dyn VisionModel,
        image_path: &Path,
        workspace: &RequestWorkspace,
    ) -> PipelineResult<DescriptionOutput> {
        let stem = file_stem(image_path)?;
        let labels_path = workspace.labels_path(&stem);
        if !tokio::fs::try_exists(&labels_path).await? {
            return Err(PipelineError::not_found("labels", &labels_path));
        }
        let components: Vec<FlatComponent> =
            serde_json::from_str(&tokio::fs::read_to_string(&labels_path).await?)?;
        let image = {
            let image_path = image_path.to_path_buf();
            let image =
                run_blocking(ProcessingStage::Description, move || load_image(&image_path)).await?;
            Arc::new(image)
        };
        let extension = extension_or_jpg(image_path);

        let semaphore = Semaphore::new(self.max_concurrent);
        let total = components.len();
        let tasks = components.iter().enumerate().map(|(index, component)| {
            let semaphore = &semaphore;
            let image = &image;
            let extension = extension.as_str();
            async move {
                let _permit = semaphore.acquire().await.map_err(|err| {
                    PipelineError::processing(ProcessingStage::Description, "semaphore closed", err)
                })?;
                debug!(index = index + 1, total, label = %component.label, "describing component");
                self.describe(model, image, extension, component, workspace)
                    .await
            }
        });
        let results = join_all(tasks).await;

        let mut usage = TokenUsage::default();
        let mut records = Vec::with_capacity(total);
        for result in results {
            let (record, call_usage) = result?;
            usage.merge(&call_usage);
            records.push(record);
        }

        let output_path = workspace.description_path(&stem);
        let json = serde_json::to_string_pretty(&RecordMap(&records))?;
        tokio::fs::write(&output_path, json).await?;
        info!(
            request_id = workspace.request_id(),
            section = %stem,
            components = records.len(),
            input_tokens = usage.input_tokens,
            output_tokens = usage.output_tokens,
            "component descriptions written"
        );

        Ok(DescriptionOutput {
            records,
            output_path,
            usage,
        })
    }

    async fn describe(
        &self,
        model: &dyn VisionModel,
        image: &Arc<RgbImage>,
        extension: &str,
        component: &FlatComponent,
        workspace: &RequestWorkspace,
    ) -> PipelineResult<(ComponentRecord, TokenUsage)> {
        let id = short_id();
        let rect = component
            .box_2d
            .to_pixels(image.width(), image.height());
        let coordinates = PixelCoordinates {
            x1: rect.x1,
            y1: rect.y1,
            x2: rect.x2,
            y2: rect.y2,
        };

        if component.label.eq_ignore_ascii_case("image") {
            let image = Arc::clone(image);
            let bbox = component.box_2d;
            let file_name = format!("image_{id}{extension}");
            let assets_dir = workspace.assets_dir();
            let id = id.clone();
            let record = run_blocking(ProcessingStage::Description, move || {
                clip_image(&image, &bbox, &id, coordinates, &assets_dir, &file_name)
            })
            .await?;
            return Ok((record, TokenUsage::default()));
        }

        let label = &component.label;
        let temp_path = workspace
            .temp_dir()
            .join(format!("{id}_{}.png", file_safe(label)));
        {
            let image = Arc::clone(image);
            let bbox = component.box_2d;
            let temp_path = temp_path.clone();
            run_blocking(ProcessingStage::Description, move || {
                save_image(&BoxCrop::highlight(&image, &bbox), &temp_path)
            })
            .await?;
        }

        let (system, user) = self.prompts.description_for(label);
        let request = GenerationRequest::new(user, &temp_path, self.temperature)
            .with_system_prompt(system);
        let (description, usage) = match model.generate(request).await {
            Ok(generation) => match parse_description(&generation.text) {
                Some(mut value) => {
                    tag_detected_images(&mut value, &id);
                    (value, generation.usage)
                }
                None => {
                    warn!(id = %id, label = %label, "description reply is not JSON, using default");
                    (default_description(label), generation.usage)
                }
            },
            Err(err) => {
                warn!(id = %id, label = %label, error = %err, "description call failed, using default");
                (default_description(label), TokenUsage::default())
            }
        };

        Ok((
            ComponentRecord {
                id,
                component_type: label.clone(),
                coordinates,
                description,
                content: Map::new(),
                media: MediaBundle::default(),
            },
            usage,
        ))
    }
}

/// Image components are cropped into the assets directory instead of being
/// described. Blocking: encodes and writes the crop.
fn clip_image(
    image: &RgbImage,
    bbox: &Box2D,
    id: &str,
    coordinates: PixelCoordinates,
    assets_dir: &Path,
    file_name: &str,
) -> PipelineResult<ComponentRecord> {
    let mut record = ComponentRecord {
        id: id.to_string(),
        component_type: "img".to_string(),
        coordinates,
        description: Value::Null,
        content: Map::new(),
        media: MediaBundle::default(),
    };
    let crop = match BoxCrop::crop_normalized(image, bbox) {
        Ok(crop) => crop,
        Err(err) => {
            warn!(id = %id, error = %err, "image component covers no pixels");
            return Ok(record);
        }
    };
    save_image(&crop, assets_dir.join(file_name))?;
    let file_path = format!("assets/{file_name}");

    record
        .content
        .insert("src".into(), Value::String(file_path.clone()));
    record.media.images.push(ImageAsset {
        id: id.to_string(),
        coordinates,
        file_path,
        role: "content".to_string(),
        description: "Image clipped from UI".to_string(),
    });
    Ok(record)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::model::testing::{ScriptedModel, transient};
    use crate::processors::geometry::Box2D;
    use image::Rgb;

    fn setup(components: &[FlatComponent]) -> (tempfile::TempDir, RequestWorkspace, PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let ws = RequestWorkspace::create(dir.path(), "req").unwrap();
        let image_path = ws.images_dir().join("page.png");
        RgbImage::from_fn(200, 100, |x, _| Rgb([(x % 256) as u8, 90, 200]))
            .save(&image_path)
            .unwrap();
        std::fs::write(
            ws.labels_path("page"),
            serde_json::to_string(components).unwrap(),
        )
        .unwrap();
        (dir, ws, image_path)
    }

    #[tokio::test]
    async fn test_missing_labels_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let ws = RequestWorkspace::create(dir.path(), "req").unwrap();
        let stage = DescriptionStage::new(PromptSet::default(), 0.2, 2);
        let err = stage
            .run(&ScriptedModel::new("{}"), &ws.images_dir().join("nope.png"), &ws)
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_describes_components_and_clips_images() {
        let components = vec![
            FlatComponent::new("navbar", Box2D::new(0, 0, 200, 1000)),
            FlatComponent::new("image", Box2D::new(300, 100, 900, 500)),
            FlatComponent::new("footer", Box2D::new(900, 0, 1000, 1000)),
        ];
        let (_dir, ws, image_path) = setup(&components);
        let model = ScriptedModel::new("not json at all").on(
            "navbar",
            r#"```json
{"type": "navbar", "media": {"images": [{"filePath": "x.png", "role": "logo"}]}}
```"#,
        );

        let stage = DescriptionStage::new(PromptSet::default(), 0.2, 2);
        let output = stage.run(&model, &image_path, &ws).await.unwrap();

        assert_eq!(output.records.len(), 3);
        assert_eq!(output.usage.requests, 2);
        assert_eq!(model.call_count(), 2);

        let navbar = &output.records[0];
        assert_eq!(navbar.id.len(), 8);
        assert_eq!(navbar.coordinates, PixelCoordinates { x1: 0, y1: 0, x2: 200, y2: 20 });
        let image_entry = &navbar.description["media"]["images"][0];
        assert_eq!(image_entry["id"], format!("{}_img_0", navbar.id));
        assert_eq!(image_entry["detected"], true);
        assert!(image_entry.get("filePath").is_none());

        let image = &output.records[1];
        assert_eq!(image.component_type, "img");
        assert!(image.description.is_null());
        let asset = &image.media.images[0];
        assert_eq!(asset.file_path, format!("assets/image_{}.png", image.id));
        assert!(ws.final_dir().join(&asset.file_path).exists());

        let footer = &output.records[2];
        assert_eq!(footer.description, default_description("footer"));

        let written: Value =
            serde_json::from_str(&std::fs::read_to_string(&output.output_path).unwrap()).unwrap();
        assert_eq!(written.as_object().unwrap().len(), 3);
        assert_eq!(std::fs::read_dir(ws.temp_dir()).unwrap().count(), 2);
    }

    #[tokio::test]
    async fn test_model_failure_falls_back_to_default() {
        let components = vec![FlatComponent::new("card", Box2D::new(0, 0, 500, 500))];
        let (_dir, ws, image_path) = setup(&components);
        let model = ScriptedModel::new("{}").then(Err(transient()));

        let stage = DescriptionStage::new(PromptSet::default(), 0.2, 1);
        let output = stage.run(&model, &image_path, &ws).await.unwrap();
        assert_eq!(output.records[0].description, default_description("card"));
        assert_eq!(output.usage, TokenUsage::default());
    }

    #[test]
    fn test_file_safe_label() {
        assert_eq!(file_safe("nav/link item"), "nav_link_item");
    }
}
