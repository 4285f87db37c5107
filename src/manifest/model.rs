use crate::error::{DepthcapError, Result};
use crate::frame::{FrameIntrinsics, Transform};
use std::path::Path;
use tokio::fs;
use tracing::debug;

use super::schema::{self, ManifestProfile};

/// Manifest file name at the project root
pub const MANIFEST_FILE_NAME: &str = "transforms.json";

/// Image subtree holding per-frame files
pub const IMAGES_DIR: &str = "images";

/// Camera intrinsics latched from the first recorded frame
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct CameraIntrinsics {
    pub fl_x: f32,
    pub fl_y: f32,
    pub cx: f32,
    pub cy: f32,
    pub w: u32,
    pub h: u32,
    /// Horizontal field of view in radians
    pub camera_angle_x: f32,
    /// Vertical field of view in radians
    pub camera_angle_y: f32,
    /// Depth quantization scale (depth_scale profile only)
    pub integer_depth_scale: Option<f32>,
}

impl CameraIntrinsics {
    /// Derive intrinsics, including field-of-view angles, from frame metadata.
    pub fn from_frame(frame: &FrameIntrinsics) -> Self {
        Self {
            fl_x: frame.fx,
            fl_y: frame.fy,
            cx: frame.cx,
            cy: frame.cy,
            w: frame.width,
            h: frame.height,
            camera_angle_x: field_of_view(frame.width, frame.fx),
            camera_angle_y: field_of_view(frame.height, frame.fy),
            integer_depth_scale: None,
        }
    }

    pub fn with_depth_scale(mut self, scale: f32) -> Self {
        self.integer_depth_scale = Some(scale);
        self
    }

    /// Intrinsics count as set once both image dimensions are known
    pub fn is_set(&self) -> bool {
        self.w > 0 && self.h > 0
    }
}

/// `2 * atan(dimension / (2 * focal))`, in radians.
pub(super) fn field_of_view(dimension: u32, focal_length: f32) -> f32 {
    2.0 * (dimension as f32 / (2.0 * focal_length)).atan()
}

/// One recorded frame in manifest order
#[derive(Debug, Clone, PartialEq)]
pub struct FrameRecord {
    pub file_path: String,
    pub depth_path: String,
    pub transform_matrix: Transform,
    /// Capture time in seconds; absent in depth_scale manifests
    pub timestamp: Option<f64>,
}

impl FrameRecord {
    pub fn new(index: usize, transform: Transform, timestamp: f64) -> Self {
        let (file_path, depth_path) = Self::paths_for(index);
        Self {
            file_path,
            depth_path,
            transform_matrix: transform,
            timestamp: Some(timestamp),
        }
    }

    /// Project-relative color and depth paths for a frame index
    pub fn paths_for(index: usize) -> (String, String) {
        (
            format!("{}/{}.jpg", IMAGES_DIR, index),
            format!("{}/{}.depth.tiff", IMAGES_DIR, index),
        )
    }
}

/// Camera intrinsics plus the ordered frame list of a project
#[derive(Debug, Clone, PartialEq)]
pub struct Manifest {
    pub intrinsics: CameraIntrinsics,
    pub frames: Vec<FrameRecord>,
    pub profile: ManifestProfile,
}

impl Manifest {
    pub fn new(intrinsics: CameraIntrinsics) -> Self {
        Self {
            intrinsics,
            frames: Vec::new(),
            profile: ManifestProfile::default(),
        }
    }

    /// Manifest whose intrinsics are not known yet
    pub fn unset() -> Self {
        Self::new(CameraIntrinsics::default())
    }

    pub fn with_profile(mut self, profile: ManifestProfile) -> Self {
        self.profile = profile;
        self
    }

    /// Set intrinsics if none are latched yet. Returns whether they were taken.
    pub fn latch_intrinsics(&mut self, intrinsics: CameraIntrinsics) -> bool {
        if self.intrinsics.is_set() {
            return false;
        }
        self.intrinsics = intrinsics;
        true
    }

    /// Index the next appended frame will occupy
    pub fn next_index(&self) -> usize {
        self.frames.len()
    }

    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }

    /// Append a record at the next sequential index.
    pub fn append_frame(&mut self, record: FrameRecord) -> Result<usize> {
        if !self.intrinsics.is_set() {
            return Err(DepthcapError::state(
                "append frame",
                "camera intrinsics are unset",
            ));
        }

        let index = self.frames.len();
        self.frames.push(record);
        Ok(index)
    }

    pub fn serialize(&self) -> Result<Vec<u8>> {
        schema::encode(self)
    }

    pub fn deserialize(bytes: &[u8]) -> Result<Self> {
        schema::decode(bytes)
    }

    /// Write the manifest to `path`, replacing any existing file
    pub async fn save(&self, path: &Path) -> Result<()> {
        let bytes = self.serialize()?;
        fs::write(path, bytes).await?;
        debug!(
            "Saved manifest with {} frames to {}",
            self.frames.len(),
            path.display()
        );
        Ok(())
    }

    pub async fn load(path: &Path) -> Result<Self> {
        let bytes = fs::read(path).await?;
        Self::deserialize(&bytes)
    }
}
