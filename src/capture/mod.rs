mod core;
mod encode;
mod metadata;
mod naming;

pub use core::CaptureSession;
pub use metadata::{CaptureStats, FrameDisposition, ProjectHandle, SessionHandle, SessionState};
pub use naming::{is_project_name, parse_project_name, project_name, PROJECT_NAME_FORMAT};
pub(crate) use naming::resolve_timestamp_timezone;
