use std::fmt;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};

/// Lifecycle of a capture session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Recording,
    /// Draining in-flight frames and sealing the manifest
    Finalizing,
    Finalized,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::Idle => "idle",
            SessionState::Recording => "recording",
            SessionState::Finalizing => "finalizing",
            SessionState::Finalized => "finalized",
        };
        write!(f, "session is {}", name)
    }
}

/// Identifies a project while it is being recorded
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionHandle {
    pub name: String,
    pub root: PathBuf,
}

/// Identifies a sealed project
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectHandle {
    pub name: String,
    /// Project directory; removed when the archive replaced it
    pub root: PathBuf,
    pub manifest_path: PathBuf,
    pub frame_count: usize,
    pub archive_path: Option<PathBuf>,
    pub root_removed: bool,
}

/// Outcome of handing a frame to the session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameDisposition {
    /// Accepted and queued for encoding
    Queued,
    /// Dropped by the minimum frame interval
    Throttled,
    /// Dropped because the writer queue is full
    Dropped,
}

/// Statistics about a capture session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureStats {
    pub state: SessionState,
    pub frames_queued: u64,
    pub frames_written: u64,
    pub frames_failed: u64,
    pub frames_throttled: u64,
    pub frames_dropped: u64,
}

#[derive(Debug, Default)]
pub(crate) struct FrameCounters {
    pub(crate) queued: AtomicU64,
    pub(crate) written: AtomicU64,
    pub(crate) failed: AtomicU64,
    pub(crate) throttled: AtomicU64,
    pub(crate) dropped: AtomicU64,
}

impl FrameCounters {
    pub(crate) fn snapshot(&self, state: SessionState) -> CaptureStats {
        CaptureStats {
            state,
            frames_queued: self.queued.load(Ordering::SeqCst),
            frames_written: self.written.load(Ordering::SeqCst),
            frames_failed: self.failed.load(Ordering::SeqCst),
            frames_throttled: self.throttled.load(Ordering::SeqCst),
            frames_dropped: self.dropped.load(Ordering::SeqCst),
        }
    }
}
