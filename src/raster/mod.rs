mod color;
mod depth;
#[cfg(test)]
mod tests;

pub use color::{decode_color_thumbnail, encode_color_image, to_rgb24, DEFAULT_JPEG_QUALITY};
pub use depth::{
    decode_depth_buffer, decode_depth_raster, encode_depth_buffer, encode_depth_raster,
    inspect_depth_raster, DepthRasterInfo,
};
