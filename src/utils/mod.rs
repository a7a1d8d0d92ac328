//! Utility functions for the screenshot pipeline.
//!
//! Image loading and saving, box based cropping and painting, model reply
//! cleanup, identifiers and logging setup.

pub mod bbox_crop;
pub mod image_io;
pub mod text;

pub use bbox_crop::{AssetCropper, BoxCrop};
pub use image_io::{extension_or_jpg, load_dynamic, load_image, save_image};
pub use text::strip_code_fences;

/// Returns a short random identifier: the first 8 hex digits of a v4 UUID.
pub fn short_id() -> String {
    let mut id = uuid::Uuid::new_v4().simple().to_string();
    id.truncate(8);
    id
}

/// Installs the global tracing subscriber.
///
/// The filter is read from `RUST_LOG` and defaults to `info`. Calling this
/// more than once is harmless.
pub fn init_tracing() {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let _ = tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .try_init();
}
