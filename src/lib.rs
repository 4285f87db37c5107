pub mod archive;
pub mod capture;
pub mod catalog;
pub mod config;
pub mod error;
pub mod frame;
pub mod manifest;
pub mod raster;

pub use archive::{ArchiveOutcome, ArchivePackager};
pub use capture::{
    CaptureSession, CaptureStats, FrameDisposition, ProjectHandle, SessionHandle, SessionState,
};
pub use catalog::{CaptureSummary, ProjectCatalog};
pub use config::{ArchiveConfig, CaptureConfig, DepthcapConfig};
pub use error::{DepthcapError, Result};
pub use frame::{
    CapturedFrame, ColorBuffer, DepthBuffer, FrameIntrinsics, PixelFormat, Transform,
};
pub use manifest::{CameraIntrinsics, FrameRecord, Manifest, ManifestProfile};
