//! Heuristic description stage: builds the component hierarchy of a section
//! from its labels, synthesizes the layout and extracts color palettes. No
//! model call is involved.

use crate::core::config::PaletteConfig;
use crate::core::errors::{PipelineError, PipelineResult, ProcessingStage};
use crate::domain::{ComponentTree, HeuristicElement};
use crate::pipeline::run_blocking;
use crate::pipeline::workspace::{RequestWorkspace, file_stem};
use crate::processors::{apply_layout, apply_palettes, build_hierarchy, create_medialess};
use crate::utils::{AssetCropper, extension_or_jpg, load_image, save_image};
use std::path::{Path, PathBuf};
use tracing::info;

/// Output of the heuristic description stage.
#[derive(Debug, Clone)]
pub struct HeuristicOutput {
    pub tree: ComponentTree,
    /// `description/{stem}.json`
    pub output_path: PathBuf,
    /// `description/{stem}_medialess.jpg`
    pub medialess_path: PathBuf,
}

/// Runs hierarchy, layout and palette extraction for one section.
#[derive(Debug, Clone, Default)]
pub struct HeuristicDescriptionStage {
    palette: PaletteConfig,
}

impl HeuristicDescriptionStage {
    pub fn new(palette: PaletteConfig) -> Self {
        Self { palette }
    }

    /// Builds the annotated tree from already parsed elements.
    ///
    /// Media crops go to `assets_dir`; the medialess image is returned
    /// alongside the tree. Blocking: decodes the image and writes assets.
    pub fn build_tree(
        &self,
        image_path: &Path,
        elements: &[HeuristicElement],
        assets_dir: &Path,
    ) -> PipelineResult<(ComponentTree, image::RgbImage)> {
        let image = load_image(image_path)?;
        let extension = extension_or_jpg(image_path);

        let mut store = AssetCropper::new(&image, assets_dir, &extension);
        let mut tree = build_hierarchy(elements, &mut store).map_err(|err| {
            PipelineError::processing(ProcessingStage::Hierarchy, "building hierarchy", err)
        })?;
        apply_layout(&mut tree);

        let medialess = create_medialess(&image, &tree);
        apply_palettes(&mut tree, &medialess, &self.palette);
        Ok((tree, medialess))
    }

    /// Reads `labels/{stem}.json` and writes `description/{stem}.json`.
    pub async fn run(
        &self,
        image_path: &Path,
        workspace: &RequestWorkspace,
    ) -> PipelineResult<HeuristicOutput> {
        let stem = file_stem(image_path)?;
        let labels_path = workspace.labels_path(&stem);
        self.run_with_labels(
            image_path,
            &labels_path,
            workspace.description_dir(),
            workspace.assets_dir(),
        )
        .await
    }

    /// Same as [`Self::run`] with explicit label and output locations.
    ///
    /// Outputs are `{output_dir}/{stem}.json` and `{output_dir}/{stem}_medialess.jpg`.
    pub async fn run_with_labels(
        &self,
        image_path: &Path,
        labels_path: &Path,
        output_dir: PathBuf,
        assets_dir: PathBuf,
    ) -> PipelineResult<HeuristicOutput> {
        if !tokio::fs::try_exists(labels_path).await? {
            return Err(PipelineError::not_found("labels", labels_path));
        }
        let elements: Vec<HeuristicElement> =
            serde_json::from_str(&tokio::fs::read_to_string(labels_path).await?)?;
        let stem = file_stem(image_path)?;
        tokio::fs::create_dir_all(&output_dir).await?;
        let medialess_path = output_dir.join(format!("{stem}_medialess.jpg"));
        let element_count = elements.len();

        let tree = {
            let stage = self.clone();
            let image_path = image_path.to_path_buf();
            let medialess_path = medialess_path.clone();
            run_blocking(ProcessingStage::Hierarchy, move || {
                let (tree, medialess) = stage.build_tree(&image_path, &elements, &assets_dir)?;
                save_image(&medialess, &medialess_path).map_err(|err| {
                    PipelineError::processing(
                        ProcessingStage::ColorExtraction,
                        "writing medialess image",
                        err,
                    )
                })?;
                Ok(tree)
            })
            .await?
        };

        let output_path = output_dir.join(format!("{stem}.json"));
        tokio::fs::write(&output_path, serde_json::to_string_pretty(&tree)?).await?;

        info!(
            section = %stem,
            elements = element_count,
            roots = tree.len(),
            nodes = tree.node_count(),
            "heuristic description written"
        );
        Ok(HeuristicOutput {
            tree,
            output_path,
            medialess_path,
        })
    }
}
