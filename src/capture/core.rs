use crate::{
    archive::ArchivePackager,
    config::{ArchiveConfig, CaptureConfig},
    error::{DepthcapError, Result},
    frame::CapturedFrame,
    manifest::{CameraIntrinsics, Manifest, ManifestProfile, IMAGES_DIR, MANIFEST_FILE_NAME},
};
use parking_lot::Mutex;
use std::path::PathBuf;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::SystemTime;
use tokio::fs;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::{
    encode::{frame_writer_worker, FrameJob, FrameWriter},
    metadata::{
        CaptureStats, FrameCounters, FrameDisposition, ProjectHandle, SessionHandle, SessionState,
    },
    naming::{project_name, resolve_timestamp_timezone},
};

/// One recording: owns its project directory, manifest and frame writer
pub struct CaptureSession {
    config: CaptureConfig,
    archive_config: ArchiveConfig,
    inner: Mutex<SessionInner>,
    manifest: Arc<Mutex<Manifest>>,
    counters: Arc<FrameCounters>,
}

struct SessionInner {
    state: SessionState,
    project: Option<SessionHandle>,
    queue_tx: Option<mpsc::Sender<FrameJob>>,
    worker: Option<JoinHandle<()>>,
    last_accepted: Option<f64>,
    sealed: Option<ProjectHandle>,
}

impl CaptureSession {
    pub fn new(config: CaptureConfig, archive_config: ArchiveConfig) -> Self {
        let manifest = Manifest::unset().with_profile(config.manifest_profile);

        Self {
            config,
            archive_config,
            inner: Mutex::new(SessionInner {
                state: SessionState::Idle,
                project: None,
                queue_tx: None,
                worker: None,
                last_accepted: None,
                sealed: None,
            }),
            manifest: Arc::new(Mutex::new(manifest)),
            counters: Arc::new(FrameCounters::default()),
        }
    }

    pub fn state(&self) -> SessionState {
        self.inner.lock().state
    }

    pub fn stats(&self) -> CaptureStats {
        self.counters.snapshot(self.state())
    }

    /// Handle of the sealed project, once finalized
    pub fn project(&self) -> Option<ProjectHandle> {
        self.inner.lock().sealed.clone()
    }

    /// Snapshot of the manifest as recorded so far
    pub fn manifest(&self) -> Manifest {
        self.manifest.lock().clone()
    }

    /// Start recording into a project named after the current time
    pub async fn start(&self) -> Result<SessionHandle> {
        let timezone = resolve_timestamp_timezone(&self.config.timestamp_timezone);
        let name = project_name(SystemTime::now(), &timezone);
        self.start_with_name(&name).await
    }

    /// Start recording into `<capture path>/<name>`.
    ///
    /// Fails with `AlreadyExists` if that directory is already present.
    pub async fn start_with_name(&self, name: &str) -> Result<SessionHandle> {
        {
            let inner = self.inner.lock();
            if inner.state != SessionState::Idle {
                return Err(DepthcapError::state("start", inner.state));
            }
        }

        let capture_root = PathBuf::from(&self.config.path);
        fs::create_dir_all(&capture_root).await?;

        let project_root = capture_root.join(name);
        match fs::create_dir(&project_root).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                return Err(DepthcapError::AlreadyExists { path: project_root });
            }
            Err(e) => return Err(e.into()),
        }
        fs::create_dir(project_root.join(IMAGES_DIR)).await?;

        let handle = SessionHandle {
            name: name.to_string(),
            root: project_root.clone(),
        };

        let mut inner = self.inner.lock();
        if inner.state != SessionState::Idle {
            // Lost a race with a concurrent start; leave the winner's state alone
            drop(inner);
            if let Err(e) = fs::remove_dir_all(&project_root).await {
                warn!("Failed to remove {}: {}", project_root.display(), e);
            }
            return Err(DepthcapError::state("start", SessionState::Recording));
        }

        let (queue_tx, queue_rx) = mpsc::channel(self.config.max_queued_frames.max(1));
        let writer = FrameWriter {
            project_name: handle.name.clone(),
            project_dir: project_root.clone(),
            jpeg_quality: self.config.jpeg_quality,
            manifest: Arc::clone(&self.manifest),
            counters: Arc::clone(&self.counters),
        };
        let worker = tokio::spawn(async move {
            frame_writer_worker(queue_rx, writer).await;
        });

        inner.state = SessionState::Recording;
        inner.project = Some(handle.clone());
        inner.queue_tx = Some(queue_tx);
        inner.worker = Some(worker);

        info!("Started capture session {}", project_root.display());
        Ok(handle)
    }

    /// Hand a frame to the background writer without waiting for it to be written.
    ///
    /// The first accepted frame latches the session's camera intrinsics. A
    /// timestamp earlier than the last accepted one resets the throttle.
    /// When the writer queue is full the frame is dropped.
    pub fn add_frame(&self, frame: CapturedFrame) -> Result<FrameDisposition> {
        let mut inner = self.inner.lock();
        if inner.state != SessionState::Recording {
            return Err(DepthcapError::state("add frame", inner.state));
        }

        if let Some(last) = inner.last_accepted {
            let interval = self.config.min_frame_interval_ms as f64 / 1000.0;
            let delta = frame.timestamp - last;
            if delta < 0.0 {
                debug!(
                    "Frame timestamp went back from {} to {}, resetting throttle",
                    last, frame.timestamp
                );
            } else if delta < interval {
                self.counters.throttled.fetch_add(1, Ordering::SeqCst);
                return Ok(FrameDisposition::Throttled);
            }
        }

        {
            let mut manifest = self.manifest.lock();
            let mut intrinsics = CameraIntrinsics::from_frame(&frame.intrinsics);
            if manifest.profile == ManifestProfile::DepthScale {
                intrinsics = intrinsics.with_depth_scale(self.config.integer_depth_scale);
            }
            if manifest.latch_intrinsics(intrinsics) {
                debug!(
                    "Latched intrinsics {}x{} fl=({}, {})",
                    intrinsics.w, intrinsics.h, intrinsics.fl_x, intrinsics.fl_y
                );
            }
        }

        let timestamp = frame.timestamp;
        let queue_tx = inner
            .queue_tx
            .as_ref()
            .ok_or_else(|| DepthcapError::component("capture", "Frame queue is closed"))?;
        match queue_tx.try_send(FrameJob { frame }) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(_)) => {
                self.counters.dropped.fetch_add(1, Ordering::SeqCst);
                warn!("Frame writer queue is full, dropping frame at {}", timestamp);
                return Ok(FrameDisposition::Dropped);
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                return Err(DepthcapError::component("capture", "Frame writer has stopped"));
            }
        }

        if timestamp.is_finite() {
            inner.last_accepted = Some(timestamp);
        }
        self.counters.queued.fetch_add(1, Ordering::SeqCst);
        Ok(FrameDisposition::Queued)
    }

    /// Drain accepted frames, write the manifest and optionally archive the project.
    ///
    /// The session is finalized once the manifest is written, even if
    /// archiving then fails; `project()` still returns the sealed handle.
    pub async fn finalize(&self, archive: bool) -> Result<ProjectHandle> {
        let (handle, queue_tx, worker) = {
            let mut inner = self.inner.lock();
            if inner.state != SessionState::Recording {
                return Err(DepthcapError::state("finalize", inner.state));
            }
            inner.state = SessionState::Finalizing;
            let handle = inner
                .project
                .clone()
                .ok_or_else(|| DepthcapError::component("capture", "Recording without project"))?;
            (handle, inner.queue_tx.take(), inner.worker.take())
        };

        // Closing the queue lets the worker finish what was accepted, then exit
        drop(queue_tx);
        if let Some(worker) = worker {
            if let Err(e) = worker.await {
                error!("Frame writer for {} panicked: {}", handle.name, e);
            }
        }

        let manifest = self.manifest.lock().clone();
        let manifest_path = handle.root.join(MANIFEST_FILE_NAME);
        if let Err(e) = manifest.save(&manifest_path).await {
            error!("Failed to write manifest for {}: {}", handle.name, e);
            self.inner.lock().state = SessionState::Finalized;
            return Err(e);
        }

        let mut sealed = ProjectHandle {
            name: handle.name.clone(),
            root: handle.root.clone(),
            manifest_path,
            frame_count: manifest.frame_count(),
            archive_path: None,
            root_removed: false,
        };

        {
            let mut inner = self.inner.lock();
            inner.state = SessionState::Finalized;
            inner.sealed = Some(sealed.clone());
        }

        info!(
            "Finalized project {} with {} frames",
            sealed.name, sealed.frame_count
        );

        if !archive {
            return Ok(sealed);
        }

        let packager = ArchivePackager::new(&self.archive_config);
        let project_root = sealed.root.clone();
        let outcome = tokio::task::spawn_blocking(move || packager.package(&project_root))
            .await
            .map_err(|e| DepthcapError::component("archive", format!("Archive task failed: {}", e)))?;

        match outcome {
            Ok(outcome) => {
                sealed.archive_path = Some(outcome.archive_path);
                sealed.root_removed = outcome.source_removed;
                self.inner.lock().sealed = Some(sealed.clone());
                Ok(sealed)
            }
            Err(e) => {
                error!("Failed to archive project {}: {}", sealed.name, e);
                Err(e)
            }
        }
    }
}

impl Drop for CaptureSession {
    fn drop(&mut self) {
        let inner = self.inner.get_mut();
        if inner.state == SessionState::Recording {
            warn!(
                "Capture session dropped while recording; frames already queued will still be written but no manifest is saved"
            );
        }
    }
}
