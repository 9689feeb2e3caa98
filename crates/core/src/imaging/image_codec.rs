use std::io::Cursor;
use std::path::Path;

use image::{DynamicImage, GrayImage, ImageFormat, RgbImage, RgbaImage};

use crate::imaging::image_error::ImageError;
use crate::shared::frame::{Frame, PixelFormat};

/// Parses an encoded image (any container the `image` crate can read).
pub fn decode(bytes: &[u8]) -> Result<Frame, ImageError> {
    let img = image::load_from_memory(bytes).map_err(ImageError::Decode)?;
    Ok(from_dynamic_image(img, 0))
}

/// Serializes a frame into `format`.
///
/// Fails for empty frames and for pixel layouts the target format cannot
/// carry (e.g. RGBA as JPEG).
pub fn encode(frame: &Frame, format: ImageFormat) -> Result<Vec<u8>, ImageError> {
    if frame.is_empty() {
        return Err(ImageError::Encode {
            format: format!("{format:?}"),
            reason: "frame is empty".to_string(),
        });
    }
    let img = to_dynamic_image(frame)?;
    let mut out = Cursor::new(Vec::new());
    img.write_to(&mut out, format)
        .map_err(|e| ImageError::Encode {
            format: format!("{format:?}"),
            reason: e.to_string(),
        })?;
    Ok(out.into_inner())
}

/// Picks the encoding for an output path from its extension, falling back to
/// JPEG.
pub fn format_for_path(path: &Path) -> ImageFormat {
    ImageFormat::from_path(path).unwrap_or(ImageFormat::Jpeg)
}

/// Copies a frame into an `image` buffer of the matching colour type.
pub fn to_dynamic_image(frame: &Frame) -> Result<DynamicImage, ImageError> {
    if frame.is_empty() {
        return Err(ImageError::EmptyFrame);
    }
    let (w, h) = (frame.width(), frame.height());
    let data = frame.data().to_vec();
    let img = match frame.format() {
        PixelFormat::Gray8 => GrayImage::from_raw(w, h, data).map(DynamicImage::ImageLuma8),
        PixelFormat::Rgb8 => RgbImage::from_raw(w, h, data).map(DynamicImage::ImageRgb8),
        PixelFormat::Rgba8 => RgbaImage::from_raw(w, h, data).map(DynamicImage::ImageRgba8),
    };
    img.ok_or(ImageError::EmptyFrame)
}

/// Converts a decoded image into a frame, narrowing to 8-bit layouts.
pub fn from_dynamic_image(img: DynamicImage, index: usize) -> Frame {
    let (w, h) = (img.width(), img.height());
    match img {
        DynamicImage::ImageLuma8(buf) => Frame::new(buf.into_raw(), w, h, PixelFormat::Gray8, index),
        DynamicImage::ImageRgb8(buf) => Frame::new(buf.into_raw(), w, h, PixelFormat::Rgb8, index),
        DynamicImage::ImageRgba8(buf) => {
            Frame::new(buf.into_raw(), w, h, PixelFormat::Rgba8, index)
        }
        other if other.color().has_alpha() => {
            Frame::new(other.to_rgba8().into_raw(), w, h, PixelFormat::Rgba8, index)
        }
        other if other.color().has_color() => {
            Frame::new(other.to_rgb8().into_raw(), w, h, PixelFormat::Rgb8, index)
        }
        other => Frame::new(other.to_luma8().into_raw(), w, h, PixelFormat::Gray8, index),
    }
}
