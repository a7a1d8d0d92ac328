//! Command handlers.

use screenshot_layout::core::PipelineConfig;
use screenshot_layout::pipeline::{HeuristicDescriptionStage, SegmentationStage, render_cut_lines};
use screenshot_layout::processors::{filter_nested_elements, parse_flat_components};
use screenshot_layout::utils::{load_image, save_image, short_id};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::info;

type CliResult<T> = Result<T, Box<dyn std::error::Error + Send + Sync>>;

/// Downloads an image and stores it as PNG inside `out_dir`.
pub async fn download_image(url: &str, out_dir: &Path) -> CliResult<PathBuf> {
    let start = Instant::now();
    let response = reqwest::get(url).await?;
    if !response.status().is_success() {
        return Err(format!("HTTP error: {}", response.status()).into());
    }
    let bytes = response.bytes().await?;
    info!(
        bytes = bytes.len(),
        elapsed_ms = start.elapsed().as_millis() as u64,
        "downloaded screenshot"
    );

    let image = image::load_from_memory(&bytes)?;
    std::fs::create_dir_all(out_dir)?;
    let path = out_dir.join(format!("screenshot_{}.png", short_id()));
    image.save(&path)?;
    Ok(path)
}

/// Segments `image_path` into `out_dir` and prints the report.
pub fn segment(
    image_path: &Path,
    out_dir: &Path,
    config: &PipelineConfig,
    visualize: Option<&Path>,
) -> CliResult<()> {
    let start = Instant::now();
    let report = SegmentationStage::new(config.segmentation.clone())
        .with_policy(config.concurrency.clone())
        .run_into(image_path, out_dir)?;
    info!(
        sections = report.segments.len(),
        lines = report.detected_lines.len(),
        elapsed_ms = start.elapsed().as_millis() as u64,
        "segmentation finished"
    );

    if let Some(target) = visualize {
        let image = load_image(image_path)?;
        let positions: Vec<u32> = report.detected_lines.iter().map(|l| l.position).collect();
        save_image(&render_cut_lines(&image, &positions), target)?;
        info!(path = %target.display(), "cut lines rendered");
    }

    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

/// Prints the filtered flat component list of a raw model reply.
pub fn filter(labels: &Path) -> CliResult<()> {
    let raw = std::fs::read_to_string(labels)?;
    let parsed = parse_flat_components(&raw);
    let filtered = filter_nested_elements(&parsed);
    info!(
        parsed = parsed.len(),
        kept = filtered.len(),
        "nested elements filtered"
    );
    println!("{}", serde_json::to_string_pretty(&filtered)?);
    Ok(())
}

/// Runs hierarchy, layout and palette extraction offline and prints the output path.
pub async fn hierarchy(
    image: &Path,
    labels: &Path,
    out: &Path,
    config: &PipelineConfig,
) -> CliResult<()> {
    let output = HeuristicDescriptionStage::new(config.palette.clone())
        .run_with_labels(image, labels, out.to_path_buf(), out.join("assets"))
        .await?;
    println!("{}", output.output_path.display());
    Ok(())
}
