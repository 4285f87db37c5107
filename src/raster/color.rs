use crate::error::{DepthcapError, Result};
use crate::frame::{ColorBuffer, PixelFormat};
use image::codecs::jpeg::JpegEncoder;
use image::{ColorType, ImageFormat, RgbImage};
use tracing::debug;

pub const DEFAULT_JPEG_QUALITY: f32 = 0.9;

/// Encode a sensor color buffer as an sRGB JPEG. `quality` is in 0.0..=1.0.
pub fn encode_color_image(buffer: &ColorBuffer, quality: f32) -> Result<Vec<u8>> {
    let rgb = to_rgb24(buffer)?;

    let quality = (quality.clamp(0.0, 1.0) * 100.0).round().max(1.0) as u8;
    let mut jpeg = Vec::new();
    let mut encoder = JpegEncoder::new_with_quality(&mut jpeg, quality);
    encoder
        .encode(&rgb, buffer.width, buffer.height, ColorType::Rgb8)
        .map_err(|e| DepthcapError::encode(format!("JPEG encoding failed: {}", e)))?;

    debug!(
        "Encoded {}x{} {:?} frame to JPEG q{} ({} bytes)",
        buffer.width,
        buffer.height,
        buffer.format,
        quality,
        jpeg.len()
    );
    Ok(jpeg)
}

/// Convert any supported source layout to packed RGB24.
pub fn to_rgb24(buffer: &ColorBuffer) -> Result<Vec<u8>> {
    if let PixelFormat::Other(code) = buffer.format {
        return Err(unsupported_format(code));
    }

    if buffer.width == 0 || buffer.height == 0 {
        return Err(DepthcapError::encode(format!(
            "Color image dimensions must be non-zero (got {}x{})",
            buffer.width, buffer.height
        )));
    }

    if !buffer.validate_size() {
        return Err(DepthcapError::encode(format!(
            "{:?} buffer holds {} bytes, expected {:?} for {}x{}",
            buffer.format,
            buffer.data.len(),
            buffer.format.expected_len(buffer.width, buffer.height),
            buffer.width,
            buffer.height
        )));
    }

    let (w, h) = (buffer.width as usize, buffer.height as usize);
    let src = buffer.data.as_slice();
    let mut rgb = Vec::with_capacity(w * h * 3);

    match buffer.format {
        PixelFormat::Rgb24 => rgb.extend_from_slice(src),
        PixelFormat::Bgra32 => {
            for px in src.chunks_exact(4) {
                rgb.extend_from_slice(&[px[2], px[1], px[0]]);
            }
        }
        PixelFormat::Nv12 => {
            let (luma, chroma) = src.split_at(w * h);
            let chroma_stride = w.div_ceil(2) * 2;
            for y in 0..h {
                let chroma_row = &chroma[(y / 2) * chroma_stride..];
                for x in 0..w {
                    let cb = chroma_row[(x / 2) * 2];
                    let cr = chroma_row[(x / 2) * 2 + 1];
                    rgb.extend_from_slice(&ycbcr_to_rgb(luma[y * w + x], cb, cr));
                }
            }
        }
        PixelFormat::Yuyv => {
            let row_stride = w.div_ceil(2) * 4;
            for y in 0..h {
                let row = &src[y * row_stride..(y + 1) * row_stride];
                for x in 0..w {
                    let group = &row[(x / 2) * 4..(x / 2) * 4 + 4];
                    let luma = if x % 2 == 0 { group[0] } else { group[2] };
                    rgb.extend_from_slice(&ycbcr_to_rgb(luma, group[1], group[3]));
                }
            }
        }
        PixelFormat::Other(code) => return Err(unsupported_format(code)),
    }

    Ok(rgb)
}

/// Decode an encoded color image and scale it to an exact thumbnail size.
pub fn decode_color_thumbnail(bytes: &[u8], width: u32, height: u32) -> Result<RgbImage> {
    let image = image::load_from_memory_with_format(bytes, ImageFormat::Jpeg)
        .map_err(|e| DepthcapError::decode(format!("Failed to decode JPEG: {}", e)))?;
    Ok(image.thumbnail_exact(width, height).to_rgb8())
}

/// Full-range BT.601 YCbCr to RGB.
fn ycbcr_to_rgb(y: u8, cb: u8, cr: u8) -> [u8; 3] {
    let y = y as f32;
    let cb = cb as f32 - 128.0;
    let cr = cr as f32 - 128.0;

    let r = y + 1.402 * cr;
    let g = y - 0.344_136 * cb - 0.714_136 * cr;
    let b = y + 1.772 * cb;

    [clamp_u8(r), clamp_u8(g), clamp_u8(b)]
}

fn clamp_u8(value: f32) -> u8 {
    value.round().clamp(0.0, 255.0) as u8
}

fn unsupported_format(code: u32) -> DepthcapError {
    DepthcapError::encode(format!(
        "Unsupported source pixel format '{}'",
        fourcc(code)
    ))
}

fn fourcc(code: u32) -> String {
    let bytes = code.to_be_bytes();
    if bytes.iter().all(|b| b.is_ascii_graphic() || *b == b' ') {
        String::from_utf8_lossy(&bytes).into_owned()
    } else {
        format!("0x{:08x}", code)
    }
}
