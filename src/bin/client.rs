use std::io::Cursor;
use std::path::{Path, PathBuf};

use image::ImageFormat;
use ocr_dispatch::{
    config::AppConfig,
    models::batch::{ResultDisposition, SlotState},
    services::{batch_tracker::BatchTracker, client::HttpJobSink},
};
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "bmp", "tif", "tiff"];

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .compact()
        .init();

    let paths: Vec<PathBuf> = std::env::args_os().skip(1).map(PathBuf::from).collect();
    if paths.is_empty() {
        eprintln!("usage: ocr-client <image>...");
        std::process::exit(2);
    }

    let config = AppConfig::from_env().expect("Failed to load configuration from environment");

    let (results_tx, mut results_rx) = mpsc::unbounded_channel();
    let sink = HttpJobSink::new(&config.server_url, results_tx)
        .expect("Failed to initialize HTTP client");
    let mut tracker = BatchTracker::new(sink);

    tracker.begin_batch_if_ready();

    for path in &paths {
        let Some(png) = load_as_png(path).await else {
            continue;
        };
        let label = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());

        let index = tracker.submit(label.clone(), png);
        tracing::debug!(index, filename = %label, "Submitted image");
    }

    if tracker.total() == 0 {
        tracing::warn!("No readable images to submit");
        return;
    }

    tracing::info!(
        batch_id = tracker.batch_id(),
        total = tracker.total(),
        server = %config.server_url,
        "Batch submitted"
    );

    while !tracker.is_complete() {
        let Some(result) = results_rx.recv().await else {
            break;
        };
        if tracker.on_result(result) == ResultDisposition::Accepted {
            tracing::info!(
                completed = tracker.completed(),
                total = tracker.total(),
                progress = tracker.progress_percent(),
                "Progress"
            );
        }
    }

    for (index, slot) in tracker.slots() {
        match &slot.state {
            SlotState::Succeeded { text, elapsed_ms } => {
                println!("[{index}] {} ({elapsed_ms} ms)\n{text}\n", slot.label);
            }
            SlotState::Failed { error } => println!("[{index}] {}: Error: {error}\n", slot.label),
            SlotState::Pending => println!("[{index}] {}: In progress\n", slot.label),
        }
    }
}

/// Read and decode an image file, re-encoding it as PNG for upload.
///
/// Unsupported or unreadable files are skipped with a warning.
async fn load_as_png(path: &Path) -> Option<Vec<u8>> {
    let supported = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| IMAGE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()));
    if !supported {
        tracing::warn!(path = %path.display(), "Skipping file without an image extension");
        return None;
    }

    let bytes = match tokio::fs::read(path).await {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "Skipping unreadable file");
            return None;
        }
    };

    let decoded = match image::load_from_memory(&bytes) {
        Ok(img) => img,
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "Skipping undecodable image");
            return None;
        }
    };

    let mut png = Vec::new();
    if let Err(e) = decoded.write_to(&mut Cursor::new(&mut png), ImageFormat::Png) {
        tracing::warn!(path = %path.display(), error = %e, "Failed to re-encode image");
        return None;
    }
    Some(png)
}
