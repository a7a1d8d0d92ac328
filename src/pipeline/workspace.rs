//! Per-request directory layout.
//!
//! ```text
//! {output_root}/{request_id}/
//!   images/               original image or its sections
//!   images/bboxes/        box overlays
//!   labels/               parsed box lists, one JSON per section
//!   description/          description trees, medialess images
//!   description/temp/     highlighted component renders
//!   final/assets/         cropped media assets
//! ```

use crate::core::errors::{PipelineError, PipelineResult, ProcessingStage};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Directory tree owned by one pipeline run.
#[derive(Debug, Clone)]
pub struct RequestWorkspace {
    request_id: String,
    root: PathBuf,
}

impl RequestWorkspace {
    /// Creates the directory tree for `request_id` under `output_root`.
    pub fn create(
        output_root: impl AsRef<Path>,
        request_id: impl Into<String>,
    ) -> PipelineResult<Self> {
        let request_id = request_id.into();
        let workspace = Self {
            root: output_root.as_ref().join(&request_id),
            request_id,
        };
        for dir in [
            workspace.images_dir(),
            workspace.bboxes_dir(),
            workspace.labels_dir(),
            workspace.description_dir(),
            workspace.temp_dir(),
            workspace.assets_dir(),
        ] {
            std::fs::create_dir_all(&dir).map_err(|err| {
                PipelineError::processing(
                    ProcessingStage::Workspace,
                    format!("creating {}", dir.display()),
                    err,
                )
            })?;
        }
        debug!(
            request_id = %workspace.request_id,
            root = %workspace.root.display(),
            "workspace ready"
        );
        Ok(workspace)
    }

    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn images_dir(&self) -> PathBuf {
        self.root.join("images")
    }

    pub fn bboxes_dir(&self) -> PathBuf {
        self.images_dir().join("bboxes")
    }

    pub fn labels_dir(&self) -> PathBuf {
        self.root.join("labels")
    }

    pub fn description_dir(&self) -> PathBuf {
        self.root.join("description")
    }

    pub fn temp_dir(&self) -> PathBuf {
        self.description_dir().join("temp")
    }

    pub fn final_dir(&self) -> PathBuf {
        self.root.join("final")
    }

    pub fn assets_dir(&self) -> PathBuf {
        self.final_dir().join("assets")
    }

    /// `labels/{stem}.json`
    pub fn labels_path(&self, stem: &str) -> PathBuf {
        self.labels_dir().join(format!("{stem}.json"))
    }

    /// `description/{stem}.json`
    pub fn description_path(&self, stem: &str) -> PathBuf {
        self.description_dir().join(format!("{stem}.json"))
    }

    /// `images/bboxes/{stem}.jpg`
    pub fn overlay_path(&self, stem: &str) -> PathBuf {
        self.bboxes_dir().join(format!("{stem}.jpg"))
    }

    /// `description/{stem}_medialess.jpg`
    pub fn medialess_path(&self, stem: &str) -> PathBuf {
        self.description_dir().join(format!("{stem}_medialess.jpg"))
    }
}

/// File stem of `path`, or an error naming the path.
pub fn file_stem(path: &Path) -> PipelineResult<String> {
    path.file_stem()
        .and_then(|stem| stem.to_str())
        .map(str::to_string)
        .ok_or_else(|| {
            PipelineError::invalid_input(format!("no file name in {}", path.display()))
        })
}
