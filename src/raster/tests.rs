use super::*;
use crate::error::DepthcapError;
use crate::frame::{ColorBuffer, DepthBuffer, PixelFormat};

fn sample_depth(width: u32, height: u32) -> Vec<f32> {
    (0..width * height)
        .map(|i| 0.25 + i as f32 * 0.013_7)
        .collect()
}

#[test]
fn test_depth_raster_round_trip() {
    let data = sample_depth(256, 192);
    let encoded = encode_depth_raster(&data, 256, 192).unwrap();

    let (decoded, width, height) = decode_depth_raster(&encoded).unwrap();
    assert_eq!((width, height), (256, 192));
    assert_eq!(decoded.len(), data.len());
    for (a, b) in decoded.iter().zip(data.iter()) {
        assert_eq!(a.to_bits(), b.to_bits());
    }
}

#[test]
fn test_depth_raster_preserves_special_values() {
    let data = vec![0.0, -0.0, f32::MAX, 1.0e-38, f32::INFINITY, f32::NEG_INFINITY, f32::NAN, 5.5];
    let encoded = encode_depth_raster(&data, 4, 2).unwrap();
    let (decoded, _, _) = decode_depth_raster(&encoded).unwrap();

    for (a, b) in decoded.iter().zip(data.iter()) {
        assert_eq!(a.to_bits(), b.to_bits());
    }
}

#[test]
fn test_depth_raster_declares_float_samples() {
    let encoded = encode_depth_raster(&[1.0, 2.0], 2, 1).unwrap();
    let mut decoder = tiff::decoder::Decoder::new(std::io::Cursor::new(&encoded)).unwrap();
    assert_eq!(decoder.colortype().unwrap(), tiff::ColorType::Gray(32));
    assert_eq!(decoder.dimensions().unwrap(), (2, 1));
}

#[test]
fn test_depth_raster_rejects_size_mismatch() {
    let result = encode_depth_raster(&[1.0; 5], 2, 2);
    assert!(matches!(result, Err(DepthcapError::Encode { .. })));

    let result = encode_depth_raster(&[], 0, 4);
    assert!(matches!(result, Err(DepthcapError::Encode { .. })));
}

#[test]
fn test_depth_raster_rejects_malformed_input() {
    let result = decode_depth_raster(b"definitely not a tiff");
    assert!(matches!(result, Err(DepthcapError::Decode { .. })));

    let mut truncated = encode_depth_raster(&sample_depth(16, 16), 16, 16).unwrap();
    truncated.truncate(truncated.len() / 2);
    assert!(decode_depth_raster(&truncated).is_err());
}

#[test]
fn test_depth_raster_rejects_integer_samples() {
    let mut cursor = std::io::Cursor::new(Vec::new());
    {
        let mut encoder = tiff::encoder::TiffEncoder::new(&mut cursor).unwrap();
        encoder
            .write_image::<tiff::encoder::colortype::Gray16>(2, 2, &[1u16, 2, 3, 4])
            .unwrap();
    }

    let result = decode_depth_raster(cursor.get_ref());
    assert!(matches!(result, Err(DepthcapError::Decode { .. })));
}

#[test]
fn test_depth_buffer_helpers_and_inspection() {
    let depth = DepthBuffer::new(3, 1, vec![0.5, f32::NAN, 2.5]);
    let encoded = encode_depth_buffer(&depth).unwrap();

    let decoded = decode_depth_buffer(&encoded).unwrap();
    assert_eq!((decoded.width, decoded.height), (3, 1));

    let info = inspect_depth_raster(&encoded).unwrap();
    assert_eq!(info.finite_count, 2);
    assert_eq!(info.min, Some(0.5));
    assert_eq!(info.max, Some(2.5));
}

#[test]
fn test_encode_rgb_color_image() {
    let buffer = ColorBuffer::new(16, 8, PixelFormat::Rgb24, vec![200u8; 16 * 8 * 3]);
    let jpeg = encode_color_image(&buffer, DEFAULT_JPEG_QUALITY).unwrap();

    assert_eq!(&jpeg[..2], &[0xFF, 0xD8]);
    let decoded = image::load_from_memory(&jpeg).unwrap();
    assert_eq!(decoded.width(), 16);
    assert_eq!(decoded.height(), 8);
}

#[test]
fn test_nv12_neutral_gray_converts_to_gray() {
    let (w, h) = (8u32, 4u32);
    let mut data = vec![128u8; (w * h) as usize];
    data.extend(std::iter::repeat(128u8).take((w * h / 2) as usize));
    let buffer = ColorBuffer::new(w, h, PixelFormat::Nv12, data);

    let rgb = to_rgb24(&buffer).unwrap();
    assert_eq!(rgb.len(), (w * h * 3) as usize);
    assert!(rgb.iter().all(|&v| v == 128));
}

#[test]
fn test_nv12_chroma_is_applied() {
    // Y=76, Cb=85, Cr=255 is close to pure red in full-range BT.601
    let mut data = vec![76u8; 4];
    data.extend_from_slice(&[85, 255]);
    let buffer = ColorBuffer::new(2, 2, PixelFormat::Nv12, data);

    let rgb = to_rgb24(&buffer).unwrap();
    assert!(rgb[0] > 240, "red channel was {}", rgb[0]);
    assert!(rgb[1] < 20, "green channel was {}", rgb[1]);
    assert!(rgb[2] < 20, "blue channel was {}", rgb[2]);
}

#[test]
fn test_bgra_and_yuyv_conversion() {
    let bgra = ColorBuffer::new(1, 1, PixelFormat::Bgra32, vec![10, 20, 30, 255]);
    assert_eq!(to_rgb24(&bgra).unwrap(), vec![30, 20, 10]);

    let yuyv = ColorBuffer::new(2, 1, PixelFormat::Yuyv, vec![50, 128, 200, 128]);
    assert_eq!(to_rgb24(&yuyv).unwrap(), vec![50, 50, 50, 200, 200, 200]);
}

#[test]
fn test_color_encoding_rejects_bad_input() {
    let unsupported = ColorBuffer::new(2, 2, PixelFormat::Other(u32::from_be_bytes(*b"x422")), vec![0; 12]);
    match encode_color_image(&unsupported, 0.9) {
        Err(DepthcapError::Encode { message }) => assert!(message.contains("x422")),
        other => panic!("expected encode error, got {:?}", other),
    }

    let short = ColorBuffer::new(4, 4, PixelFormat::Rgb24, vec![0; 10]);
    assert!(matches!(
        encode_color_image(&short, 0.9),
        Err(DepthcapError::Encode { .. })
    ));
}

#[test]
fn test_color_thumbnail() {
    let buffer = ColorBuffer::new(64, 32, PixelFormat::Rgb24, vec![90u8; 64 * 32 * 3]);
    let jpeg = encode_color_image(&buffer, 0.9).unwrap();

    let thumbnail = decode_color_thumbnail(&jpeg, 10, 10).unwrap();
    assert_eq!(thumbnail.dimensions(), (10, 10));
    assert!(decode_color_thumbnail(b"nope", 10, 10).is_err());
}
