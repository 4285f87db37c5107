use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Color pixel layouts delivered by the sensor session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PixelFormat {
    /// Packed 8-bit RGB
    Rgb24,
    /// Packed 8-bit BGRA (alpha ignored)
    Bgra32,
    /// Bi-planar YCbCr 4:2:0, full range: Y plane followed by interleaved CbCr
    Nv12,
    /// Packed YCbCr 4:2:2 (Y0 Cb Y1 Cr)
    Yuyv,
    /// Any other source format, identified by its FourCC code
    Other(u32),
}

impl PixelFormat {
    /// Expected buffer length for a tightly packed image of this format
    pub fn expected_len(&self, width: u32, height: u32) -> Option<usize> {
        let (w, h) = (width as usize, height as usize);
        match self {
            PixelFormat::Rgb24 => Some(w * h * 3),
            PixelFormat::Bgra32 => Some(w * h * 4),
            PixelFormat::Nv12 => Some(w * h + 2 * w.div_ceil(2) * h.div_ceil(2)),
            PixelFormat::Yuyv => Some(w.div_ceil(2) * 4 * h),
            PixelFormat::Other(_) => None,
        }
    }
}

/// Color image as handed over by the sensor session
#[derive(Debug, Clone)]
pub struct ColorBuffer {
    pub width: u32,
    pub height: u32,
    pub format: PixelFormat,
    pub data: Arc<Vec<u8>>,
}

impl ColorBuffer {
    pub fn new(width: u32, height: u32, format: PixelFormat, data: Vec<u8>) -> Self {
        Self {
            width,
            height,
            format,
            data: Arc::new(data),
        }
    }

    /// Validate data size against the declared format
    pub fn validate_size(&self) -> bool {
        match self.format.expected_len(self.width, self.height) {
            Some(expected) => self.data.len() == expected,
            None => false,
        }
    }
}

/// Single-channel depth map in meters, row-major
#[derive(Debug, Clone)]
pub struct DepthBuffer {
    pub width: u32,
    pub height: u32,
    pub data: Arc<Vec<f32>>,
}

impl DepthBuffer {
    pub fn new(width: u32, height: u32, data: Vec<f32>) -> Self {
        Self {
            width,
            height,
            data: Arc::new(data),
        }
    }
}

/// Camera intrinsics as reported with a single frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameIntrinsics {
    pub fx: f32,
    pub fy: f32,
    pub cx: f32,
    pub cy: f32,
    pub width: u32,
    pub height: u32,
}

impl FrameIntrinsics {
    /// Build from a column-major 3x3 camera matrix, as delivered by the sensor.
    pub fn from_columns(k: [[f32; 3]; 3], width: u32, height: u32) -> Self {
        Self {
            fx: k[0][0],
            fy: k[1][1],
            cx: k[2][0],
            cy: k[2][1],
            width,
            height,
        }
    }
}

/// Row-major 4x4 camera-to-world transform
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Transform(pub [[f32; 4]; 4]);

impl Transform {
    pub const IDENTITY: Transform = Transform([
        [1.0, 0.0, 0.0, 0.0],
        [0.0, 1.0, 0.0, 0.0],
        [0.0, 0.0, 1.0, 0.0],
        [0.0, 0.0, 0.0, 1.0],
    ]);

    pub fn from_rows(rows: [[f32; 4]; 4]) -> Self {
        Self(rows)
    }

    /// Convert a column-major matrix (columns[c][r]) to row-major form.
    pub fn from_columns(columns: [[f32; 4]; 4]) -> Self {
        let mut rows = [[0.0f32; 4]; 4];
        for (c, column) in columns.iter().enumerate() {
            for (r, value) in column.iter().enumerate() {
                rows[r][c] = *value;
            }
        }
        Self(rows)
    }

    pub fn rows(&self) -> &[[f32; 4]; 4] {
        &self.0
    }

    /// True when no entry is NaN or infinite
    pub fn is_finite(&self) -> bool {
        self.0.iter().flatten().all(|v| v.is_finite())
    }
}

impl Default for Transform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// One synchronized sample from the sensor session
#[derive(Debug, Clone)]
pub struct CapturedFrame {
    pub color: ColorBuffer,
    pub depth: DepthBuffer,
    pub intrinsics: FrameIntrinsics,
    pub transform: Transform,
    /// Capture time in seconds
    pub timestamp: f64,
}
