use crate::error::{DepthcapError, Result};
use crate::frame::DepthBuffer;
use std::io::Cursor;
use tiff::decoder::{Decoder, DecodingResult};
use tiff::encoder::{colortype, TiffEncoder};
use tiff::ColorType;
use tracing::debug;

/// Summary of a depth raster, used for inspection tooling
#[derive(Debug, Clone, PartialEq)]
pub struct DepthRasterInfo {
    pub width: u32,
    pub height: u32,
    pub finite_count: usize,
    pub min: Option<f32>,
    pub max: Option<f32>,
}

/// Encode a row-major float depth map as an uncompressed single-channel
/// 32-bit IEEE float TIFF.
pub fn encode_depth_raster(data: &[f32], width: u32, height: u32) -> Result<Vec<u8>> {
    if width == 0 || height == 0 {
        return Err(DepthcapError::encode(format!(
            "Depth raster dimensions must be non-zero (got {}x{})",
            width, height
        )));
    }

    let expected = (width as usize) * (height as usize);
    if data.len() != expected {
        return Err(DepthcapError::encode(format!(
            "Depth buffer holds {} samples, expected {} for {}x{}",
            data.len(),
            expected,
            width,
            height
        )));
    }

    let mut cursor = Cursor::new(Vec::with_capacity(expected * 4 + 256));
    {
        let mut encoder = TiffEncoder::new(&mut cursor)
            .map_err(|e| DepthcapError::encode(format!("Failed to start TIFF: {}", e)))?;
        encoder
            .write_image::<colortype::Gray32Float>(width, height, data)
            .map_err(|e| DepthcapError::encode(format!("Failed to write TIFF: {}", e)))?;
    }

    let bytes = cursor.into_inner();
    debug!(
        "Encoded {}x{} depth raster ({} bytes)",
        width,
        height,
        bytes.len()
    );
    Ok(bytes)
}

/// Decode a depth raster produced by [`encode_depth_raster`].
///
/// Only single-channel 32-bit IEEE float samples are accepted.
pub fn decode_depth_raster(bytes: &[u8]) -> Result<(Vec<f32>, u32, u32)> {
    let mut decoder = Decoder::new(Cursor::new(bytes))
        .map_err(|e| DepthcapError::decode(format!("Malformed TIFF container: {}", e)))?;

    let (width, height) = decoder
        .dimensions()
        .map_err(|e| DepthcapError::decode(format!("Missing raster dimensions: {}", e)))?;
    if width == 0 || height == 0 {
        return Err(DepthcapError::decode(format!(
            "Depth raster declares zero dimensions ({}x{})",
            width, height
        )));
    }

    let color_type = decoder
        .colortype()
        .map_err(|e| DepthcapError::decode(format!("Unsupported sample layout: {}", e)))?;
    if color_type != ColorType::Gray(32) {
        return Err(DepthcapError::decode(format!(
            "Unsupported depth sample layout {:?}, expected single 32-bit channel",
            color_type
        )));
    }

    let samples = match decoder
        .read_image()
        .map_err(|e| DepthcapError::decode(format!("Failed to read raster data: {}", e)))?
    {
        DecodingResult::F32(samples) => samples,
        _ => {
            return Err(DepthcapError::decode(
                "Depth samples are not IEEE floating point",
            ))
        }
    };

    let expected = (width as usize) * (height as usize);
    if samples.len() != expected {
        return Err(DepthcapError::decode(format!(
            "Raster holds {} samples, expected {}",
            samples.len(),
            expected
        )));
    }

    Ok((samples, width, height))
}

pub fn encode_depth_buffer(depth: &DepthBuffer) -> Result<Vec<u8>> {
    encode_depth_raster(&depth.data, depth.width, depth.height)
}

pub fn decode_depth_buffer(bytes: &[u8]) -> Result<DepthBuffer> {
    let (data, width, height) = decode_depth_raster(bytes)?;
    Ok(DepthBuffer::new(width, height, data))
}

/// Decode a raster and report its dimensions and finite value range.
pub fn inspect_depth_raster(bytes: &[u8]) -> Result<DepthRasterInfo> {
    let (samples, width, height) = decode_depth_raster(bytes)?;

    let mut finite_count = 0;
    let mut min: Option<f32> = None;
    let mut max: Option<f32> = None;
    for value in samples.iter().copied().filter(|v| v.is_finite()) {
        finite_count += 1;
        min = Some(min.map_or(value, |m| m.min(value)));
        max = Some(max.map_or(value, |m| m.max(value)));
    }

    Ok(DepthRasterInfo {
        width,
        height,
        finite_count,
        min,
        max,
    })
}
