use crate::{
    error::{DepthcapError, Result},
    frame::CapturedFrame,
    manifest::{FrameRecord, Manifest},
    raster::{encode_color_image, encode_depth_buffer},
};
use parking_lot::Mutex;
use std::path::PathBuf;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tokio::fs;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::metadata::FrameCounters;

/// Frame accepted by the session, waiting to be encoded and written
pub(crate) struct FrameJob {
    pub(crate) frame: CapturedFrame,
}

/// Everything the background writer needs to persist frames of one project
pub(crate) struct FrameWriter {
    pub(crate) project_name: String,
    pub(crate) project_dir: PathBuf,
    pub(crate) jpeg_quality: f32,
    pub(crate) manifest: Arc<Mutex<Manifest>>,
    pub(crate) counters: Arc<FrameCounters>,
}

/// Background worker that encodes and writes frames in arrival order.
///
/// Returns once the queue is closed and every accepted frame has either been
/// recorded in the manifest or skipped.
pub(crate) async fn frame_writer_worker(
    mut queue_rx: mpsc::Receiver<FrameJob>,
    writer: FrameWriter,
) {
    info!("Frame writer started for project {}", writer.project_name);

    while let Some(job) = queue_rx.recv().await {
        let index = writer.manifest.lock().next_index();

        match writer.write_frame(index, job).await {
            Ok(()) => {
                writer.counters.written.fetch_add(1, Ordering::SeqCst);
                debug!("Recorded frame {} for {}", index, writer.project_name);
            }
            Err(e) => {
                writer.counters.failed.fetch_add(1, Ordering::SeqCst);
                warn!(
                    "Skipping frame {} of project {}: {}",
                    index, writer.project_name, e
                );
                writer.remove_partial_files(index).await;
            }
        }
    }

    info!(
        "Frame writer drained for project {} ({} frames recorded)",
        writer.project_name,
        writer.manifest.lock().frame_count()
    );
}

impl FrameWriter {
    /// Encode both images, write them under `index`, then append the record.
    async fn write_frame(&self, index: usize, job: FrameJob) -> Result<()> {
        let FrameJob { frame } = job;
        if !frame.timestamp.is_finite() || !frame.transform.is_finite() {
            return Err(DepthcapError::encode(format!(
                "Frame {} has a non-finite pose or timestamp",
                index
            )));
        }
        let (file_path, depth_path) = FrameRecord::paths_for(index);

        let quality = self.jpeg_quality;
        let color = frame.color;
        let depth = frame.depth;
        let (jpeg, tiff) = tokio::task::spawn_blocking(move || -> Result<(Vec<u8>, Vec<u8>)> {
            let jpeg = encode_color_image(&color, quality)?;
            let tiff = encode_depth_buffer(&depth)?;
            Ok((jpeg, tiff))
        })
        .await
        .map_err(|e| DepthcapError::component("frame_writer", format!("Encode task failed: {}", e)))??;

        fs::write(self.project_dir.join(&file_path), jpeg).await?;
        fs::write(self.project_dir.join(&depth_path), tiff).await?;

        let record = FrameRecord {
            file_path,
            depth_path,
            transform_matrix: frame.transform,
            timestamp: Some(frame.timestamp),
        };
        self.manifest.lock().append_frame(record)?;

        Ok(())
    }

    /// Remove whatever a failed frame left behind so no file lacks a record
    async fn remove_partial_files(&self, index: usize) {
        let (file_path, depth_path) = FrameRecord::paths_for(index);
        for relative in [file_path, depth_path] {
            let path = self.project_dir.join(&relative);
            match fs::remove_file(&path).await {
                Ok(()) => debug!("Removed partial file {}", path.display()),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => warn!("Failed to remove partial file {}: {}", path.display(), e),
            }
        }
    }
}
