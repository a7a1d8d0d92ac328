//! screenshot-layout CLI
//!
//! Offline access to the CPU-bound stages of the pipeline.
//!
//! # Usage
//!
//! ```bash
//! screenshot-layout segment --file page.png --out runs/page --visualize runs/page/lines.png
//! screenshot-layout segment --url "https://example.com/shot.png" --confidence-threshold 0.7
//! screenshot-layout filter --labels reply.json
//! screenshot-layout hierarchy --image section.png --labels labels.json --out runs/desc
//! ```

mod cli;
mod config;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::info;

#[derive(Parser)]
#[command(name = "screenshot-layout")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Screenshot segmentation and layout reconstruction", long_about = None)]
struct Cli {
    /// JSON pipeline configuration; flags override its values
    #[arg(long, global = true, env = "SSL_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Split a tall screenshot into sections and print the report as JSON
    Segment {
        /// Local file path of the screenshot
        #[arg(long, conflicts_with = "url")]
        file: Option<PathBuf>,

        /// URL of the screenshot
        #[arg(long, conflicts_with = "file")]
        url: Option<String>,

        /// Directory receiving the section images
        #[arg(long, env = "SSL_OUTPUT_ROOT")]
        out: Option<PathBuf>,

        /// Write the input with accepted cut lines drawn to this path
        #[arg(long)]
        visualize: Option<PathBuf>,

        /// Minimum fused confidence for a cut line
        #[arg(long = "confidence-threshold", env = "SSL_CONFIDENCE_THRESHOLD")]
        confidence_threshold: Option<f64>,

        /// Minimum pixel distance between cut lines (0 = 5% of the height)
        #[arg(long = "min-line-distance", env = "SSL_MIN_LINE_DISTANCE")]
        min_line_distance: Option<u32>,
    },
    /// Parse a raw box-detection reply and drop nested elements
    Filter {
        /// File holding the raw model reply
        #[arg(long)]
        labels: PathBuf,
    },
    /// Build the annotated component tree of a section from heuristic labels
    Hierarchy {
        /// Section image
        #[arg(long)]
        image: PathBuf,

        /// Heuristic labels JSON
        #[arg(long)]
        labels: PathBuf,

        /// Output directory; media crops go to `{out}/assets`
        #[arg(long)]
        out: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    screenshot_layout::utils::init_tracing();

    let cli = Cli::parse();
    let base = config::load(cli.config.as_deref())?;
    if base.concurrency.install_global_thread_pool()? {
        info!(threads = ?base.concurrency.max_threads, "rayon thread pool configured");
    }

    match cli.command {
        Commands::Segment {
            file,
            url,
            out,
            visualize,
            confidence_threshold,
            min_line_distance,
        } => {
            let overrides = config::SegmentOverrides {
                out,
                confidence_threshold,
                min_line_distance,
            };
            let pipeline_config = overrides.apply(base)?;
            let out_dir = pipeline_config.output_root.clone();

            let image_path = if let Some(url) = url {
                info!(url = %url, "processing URL");
                cli::download_image(&url, &out_dir).await?
            } else if let Some(file) = file {
                info!(file = %file.display(), "processing file");
                file
            } else {
                eprintln!("Error: Either --url or --file must be provided");
                std::process::exit(1);
            };

            cli::segment(&image_path, &out_dir, &pipeline_config, visualize.as_deref())?;
        }
        Commands::Filter { labels } => {
            cli::filter(&labels)?;
        }
        Commands::Hierarchy { image, labels, out } => {
            cli::hierarchy(&image, &labels, &out, &base).await?;
        }
    }

    Ok(())
}
