//! Async pipeline stages around the CPU-bound processors.
//!
//! A conversion run creates a [`RequestWorkspace`], segments the input, and
//! then processes every section independently: box detection through the
//! [`VisionModel`], followed by either per-component description (flat mode)
//! or hierarchy, layout and palette synthesis (heuristic mode).
//!
//! Failures leave each stage as a [`ServiceError`] tagged with the stage and
//! the request id. A failing section does not abort its siblings.

pub mod bbox;
pub mod description;
pub mod heuristic;
pub mod model;
pub mod segmentation;
pub mod workspace;

pub use bbox::{BoundingBoxOutput, BoundingBoxStage, BoxList, render_overlay};
pub use description::{DescriptionOutput, DescriptionStage, RecordMap};
pub use heuristic::{HeuristicDescriptionStage, HeuristicOutput};
pub use model::{Generation, GenerationRequest, RetryingModel, TokenUsage, VisionModel};
pub use segmentation::{
    SegmentInfo, SegmentationReport, SegmentationStage, render_cut_lines, split_into_sections,
};
pub use workspace::RequestWorkspace;

use crate::core::config::PipelineConfig;
use crate::core::errors::{PipelineError, PipelineResult, ProcessingStage, ServiceError};
use futures::future::join_all;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, info_span, Instrument};

/// Runs decoding, pixel passes and blocking file writes on the blocking pool
/// so section futures only suspend on model calls and async I/O.
pub(crate) async fn run_blocking<T, F>(stage: ProcessingStage, task: F) -> PipelineResult<T>
where
    T: Send + 'static,
    F: FnOnce() -> PipelineResult<T> + Send + 'static,
{
    tokio::task::spawn_blocking(task)
        .await
        .map_err(|err| PipelineError::processing(stage, "blocking task", err))?
}

/// Result of processing one section.
#[derive(Debug, Clone)]
pub struct SectionOutcome {
    pub image_path: PathBuf,
    pub description_path: PathBuf,
    pub usage: TokenUsage,
}

/// Box detection followed by the mode-dependent description stage.
#[derive(Clone)]
pub struct SectionPipeline {
    model: Arc<dyn VisionModel>,
    bbox: BoundingBoxStage,
    description: DescriptionStage,
    heuristic: HeuristicDescriptionStage,
}

impl SectionPipeline {
    pub fn new(config: &PipelineConfig, model: Arc<dyn VisionModel>) -> Self {
        Self {
            model,
            bbox: BoundingBoxStage::new(config.prompts.clone(), config.bbox_temperature),
            description: DescriptionStage::new(
                config.prompts.clone(),
                config.description_temperature,
                config.concurrency.max_concurrent_descriptions,
            ),
            heuristic: HeuristicDescriptionStage::new(config.palette.clone()),
        }
    }

    pub async fn run(
        &self,
        section_image: &Path,
        workspace: &RequestWorkspace,
        use_heuristic: bool,
    ) -> Result<SectionOutcome, ServiceError> {
        let request_id = workspace.request_id();

        let boxes = self
            .bbox
            .run(self.model.as_ref(), section_image, workspace, use_heuristic)
            .await
            .map_err(|err| err.into_service(ProcessingStage::BoundingBox, request_id))?;
        let mut usage = boxes.usage;

        let description_path = if use_heuristic {
            self.heuristic
                .run(section_image, workspace)
                .await
                .map_err(|err| err.into_service(ProcessingStage::Hierarchy, request_id))?
                .output_path
        } else {
            let output = self
                .description
                .run(self.model.as_ref(), section_image, workspace)
                .await
                .map_err(|err| err.into_service(ProcessingStage::Description, request_id))?;
            usage.merge(&output.usage);
            output.output_path
        };

        Ok(SectionOutcome {
            image_path: section_image.to_path_buf(),
            description_path,
            usage,
        })
    }
}

/// Outcome of a full conversion run.
#[derive(Debug)]
pub struct ConvertReport {
    pub request_id: String,
    pub workspace: PathBuf,
    pub segmentation: SegmentationReport,
    /// One entry per section, top to bottom.
    pub sections: Vec<Result<SectionOutcome, ServiceError>>,
    /// Usage summed over all successful sections.
    pub usage: TokenUsage,
}

impl ConvertReport {
    /// Number of sections that completed.
    pub fn succeeded(&self) -> usize {
        self.sections.iter().filter(|s| s.is_ok()).count()
    }
}

/// Segments a screenshot and runs a [`SectionPipeline`] per section.
pub struct ConvertPipeline {
    config: PipelineConfig,
    model: Arc<dyn VisionModel>,
}

impl ConvertPipeline {
    /// Wraps `model` with the configured retry policy.
    pub fn new<M: VisionModel + 'static>(config: PipelineConfig, model: M) -> Self {
        let model = Arc::new(RetryingModel::new(model, config.retry.clone()));
        Self { config, model }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Runs the conversion under a fresh random request id.
    pub async fn run(&self, input_image: &Path) -> Result<ConvertReport, ServiceError> {
        let request_id = uuid::Uuid::new_v4().to_string();
        self.run_with_id(input_image, &request_id).await
    }

    pub async fn run_with_id(
        &self,
        input_image: &Path,
        request_id: &str,
    ) -> Result<ConvertReport, ServiceError> {
        let span = info_span!("convert", request_id = %request_id);
        self.run_inner(input_image, request_id).instrument(span).await
    }

    async fn run_inner(
        &self,
        input_image: &Path,
        request_id: &str,
    ) -> Result<ConvertReport, ServiceError> {
        let workspace = RequestWorkspace::create(&self.config.output_root, request_id)
            .map_err(|err| err.into_service(ProcessingStage::Workspace, request_id))?;

        let stage = SegmentationStage::new(self.config.segmentation.clone())
            .with_policy(self.config.concurrency.clone());
        let segmentation = {
            let workspace = workspace.clone();
            let input = input_image.to_path_buf();
            run_blocking(ProcessingStage::Segmentation, move || stage.run(&input, &workspace))
                .await
                .map_err(|err| err.into_service(ProcessingStage::Segmentation, request_id))?
        };

        let section_paths = segmentation.section_paths();
        info!(
            request_id,
            sections = section_paths.len(),
            heuristic = self.config.use_heuristic,
            "processing sections"
        );

        let section_pipeline = SectionPipeline::new(&self.config, Arc::clone(&self.model));
        let sections = join_all(section_paths.iter().map(|path| {
            section_pipeline.run(path, &workspace, self.config.use_heuristic)
        }))
        .await;

        let mut usage = TokenUsage::default();
        for outcome in sections.iter().flatten() {
            usage.merge(&outcome.usage);
        }
        info!(
            request_id,
            succeeded = sections.iter().filter(|s| s.is_ok()).count(),
            failed = sections.iter().filter(|s| s.is_err()).count(),
            total_tokens = usage.total_tokens(),
            "conversion finished"
        );

        Ok(ConvertReport {
            request_id: request_id.to_string(),
            workspace: workspace.root().to_path_buf(),
            segmentation,
            sections,
            usage,
        })
    }
}
