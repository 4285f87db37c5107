//! On-disk manifest documents.
//!
//! Two profiles exist. `nerfcapture` (the default) carries field-of-view
//! angles and per-frame timestamps. `depth_scale` carries
//! `integer_depth_scale` and no timestamps. A document is written in exactly
//! one profile; reading detects the profile from its marker field.

use crate::error::{DepthcapError, Result};
use crate::frame::Transform;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::model::{field_of_view, CameraIntrinsics, FrameRecord, Manifest};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ManifestProfile {
    #[default]
    #[serde(rename = "nerfcapture")]
    NerfCapture,
    #[serde(rename = "depth_scale")]
    DepthScale,
}

impl ManifestProfile {
    fn marker(&self) -> &'static str {
        match self {
            ManifestProfile::NerfCapture => "camera_angle_x",
            ManifestProfile::DepthScale => "integer_depth_scale",
        }
    }
}

#[derive(Serialize, Deserialize)]
struct NerfCaptureDocument {
    camera_angle_x: f32,
    camera_angle_y: f32,
    fl_x: f32,
    fl_y: f32,
    cx: f32,
    cy: f32,
    w: u32,
    h: u32,
    frames: Vec<NerfCaptureFrame>,
}

#[derive(Serialize, Deserialize)]
struct NerfCaptureFrame {
    file_path: String,
    depth_path: String,
    transform_matrix: [[f32; 4]; 4],
    timestamp: f64,
}

#[derive(Serialize, Deserialize)]
struct DepthScaleDocument {
    fl_x: f32,
    fl_y: f32,
    cx: f32,
    cy: f32,
    w: u32,
    h: u32,
    integer_depth_scale: f32,
    frames: Vec<DepthScaleFrame>,
}

#[derive(Serialize, Deserialize)]
struct DepthScaleFrame {
    file_path: String,
    depth_path: String,
    transform_matrix: [[f32; 4]; 4],
}

/// JSON has no NaN or infinity; serde_json would write them as `null`
fn ensure_finite(manifest: &Manifest) -> Result<()> {
    let intrinsics = &manifest.intrinsics;
    let scalars = [
        intrinsics.fl_x,
        intrinsics.fl_y,
        intrinsics.cx,
        intrinsics.cy,
        intrinsics.camera_angle_x,
        intrinsics.camera_angle_y,
        intrinsics.integer_depth_scale.unwrap_or(1.0),
    ];
    if scalars.iter().any(|v| !v.is_finite()) {
        return Err(DepthcapError::encode("Camera intrinsics contain a non-finite value"));
    }

    for (index, frame) in manifest.frames.iter().enumerate() {
        let timestamp_ok = frame.timestamp.map_or(true, f64::is_finite);
        if !timestamp_ok || !frame.transform_matrix.is_finite() {
            return Err(DepthcapError::encode(format!(
                "Frame {} has a non-finite pose or timestamp",
                index
            )));
        }
    }

    Ok(())
}

pub(crate) fn encode(manifest: &Manifest) -> Result<Vec<u8>> {
    ensure_finite(manifest)?;

    let intrinsics = &manifest.intrinsics;
    let bytes = match manifest.profile {
        ManifestProfile::NerfCapture => serde_json::to_vec_pretty(&NerfCaptureDocument {
            camera_angle_x: intrinsics.camera_angle_x,
            camera_angle_y: intrinsics.camera_angle_y,
            fl_x: intrinsics.fl_x,
            fl_y: intrinsics.fl_y,
            cx: intrinsics.cx,
            cy: intrinsics.cy,
            w: intrinsics.w,
            h: intrinsics.h,
            frames: manifest
                .frames
                .iter()
                .map(|frame| NerfCaptureFrame {
                    file_path: frame.file_path.clone(),
                    depth_path: frame.depth_path.clone(),
                    transform_matrix: frame.transform_matrix.0,
                    timestamp: frame.timestamp.unwrap_or(0.0),
                })
                .collect(),
        })?,
        ManifestProfile::DepthScale => serde_json::to_vec_pretty(&DepthScaleDocument {
            fl_x: intrinsics.fl_x,
            fl_y: intrinsics.fl_y,
            cx: intrinsics.cx,
            cy: intrinsics.cy,
            w: intrinsics.w,
            h: intrinsics.h,
            integer_depth_scale: intrinsics.integer_depth_scale.unwrap_or(1.0),
            frames: manifest
                .frames
                .iter()
                .map(|frame| DepthScaleFrame {
                    file_path: frame.file_path.clone(),
                    depth_path: frame.depth_path.clone(),
                    transform_matrix: frame.transform_matrix.0,
                })
                .collect(),
        })?,
    };
    Ok(bytes)
}

pub(crate) fn decode(bytes: &[u8]) -> Result<Manifest> {
    let value: Value = serde_json::from_slice(bytes)?;
    let object = value
        .as_object()
        .ok_or_else(|| DepthcapError::parse("Manifest root must be a JSON object"))?;

    let nerfcapture = object.contains_key(ManifestProfile::NerfCapture.marker());
    let depth_scale = object.contains_key(ManifestProfile::DepthScale.marker());

    let profile = match (nerfcapture, depth_scale) {
        (true, false) => ManifestProfile::NerfCapture,
        (false, true) => ManifestProfile::DepthScale,
        (true, true) => {
            return Err(DepthcapError::parse(
                "Manifest mixes camera_angle_x and integer_depth_scale profiles",
            ))
        }
        (false, false) => {
            return Err(DepthcapError::parse(
                "Manifest has neither camera_angle_x nor integer_depth_scale",
            ))
        }
    };

    let manifest = match profile {
        ManifestProfile::NerfCapture => {
            let doc: NerfCaptureDocument = serde_json::from_value(value)?;
            Manifest {
                intrinsics: CameraIntrinsics {
                    fl_x: doc.fl_x,
                    fl_y: doc.fl_y,
                    cx: doc.cx,
                    cy: doc.cy,
                    w: doc.w,
                    h: doc.h,
                    camera_angle_x: doc.camera_angle_x,
                    camera_angle_y: doc.camera_angle_y,
                    integer_depth_scale: None,
                },
                frames: doc
                    .frames
                    .into_iter()
                    .map(|frame| FrameRecord {
                        file_path: frame.file_path,
                        depth_path: frame.depth_path,
                        transform_matrix: Transform(frame.transform_matrix),
                        timestamp: Some(frame.timestamp),
                    })
                    .collect(),
                profile,
            }
        }
        ManifestProfile::DepthScale => {
            let doc: DepthScaleDocument = serde_json::from_value(value)?;
            Manifest {
                intrinsics: CameraIntrinsics {
                    fl_x: doc.fl_x,
                    fl_y: doc.fl_y,
                    cx: doc.cx,
                    cy: doc.cy,
                    w: doc.w,
                    h: doc.h,
                    camera_angle_x: field_of_view(doc.w, doc.fl_x),
                    camera_angle_y: field_of_view(doc.h, doc.fl_y),
                    integer_depth_scale: Some(doc.integer_depth_scale),
                },
                frames: doc
                    .frames
                    .into_iter()
                    .map(|frame| FrameRecord {
                        file_path: frame.file_path,
                        depth_path: frame.depth_path,
                        transform_matrix: Transform(frame.transform_matrix),
                        timestamp: None,
                    })
                    .collect(),
                profile,
            }
        }
    };

    Ok(manifest)
}
