use image::imageops::FilterType;
use image::Rgba;
use imageproc::drawing::draw_hollow_rect_mut;
use imageproc::rect::Rect;

use crate::imaging::image_codec::{from_dynamic_image, to_dynamic_image};
use crate::imaging::image_error::ImageError;
use crate::shared::frame::Frame;
use crate::shared::region::Region;

/// Copies the pixels inside `region` into a new, independently owned frame.
pub fn crop(frame: &Frame, region: &Region) -> Result<Frame, ImageError> {
    if !region.is_within(frame.width(), frame.height()) {
        return Err(ImageError::InvalidRegion {
            region: *region,
            width: frame.width(),
            height: frame.height(),
        });
    }
    let img = to_dynamic_image(frame)?;
    let cropped = img.crop_imm(
        region.x as u32,
        region.y as u32,
        region.width as u32,
        region.height as u32,
    );
    Ok(from_dynamic_image(cropped, frame.index()))
}

/// Resamples the frame in place to exactly `width x height`.
///
/// The previous pixel storage is released. Resizing to the current size
/// leaves the pixels untouched.
pub fn resize(frame: &mut Frame, width: u32, height: u32) -> Result<(), ImageError> {
    if width == 0 || height == 0 {
        return Err(ImageError::InvalidDimensions { width, height });
    }
    if frame.is_empty() {
        return Err(ImageError::EmptyFrame);
    }
    if frame.width() == width && frame.height() == height {
        return Ok(());
    }
    // Triangle widens its support by the downscale ratio, so shrinking
    // averages over each destination pixel's source area.
    let resized = to_dynamic_image(frame)?.resize_exact(width, height, FilterType::Triangle);
    frame.replace_data(resized.into_bytes(), width, height);
    Ok(())
}

/// Returns a copy with rows reversed top-to-bottom.
pub fn flip_vertical(frame: &Frame) -> Result<Frame, ImageError> {
    let img = to_dynamic_image(frame)?;
    Ok(from_dynamic_image(img.flipv(), frame.index()))
}

/// Returns a copy with columns reversed left-to-right.
pub fn flip_horizontal(frame: &Frame) -> Result<Frame, ImageError> {
    let img = to_dynamic_image(frame)?;
    Ok(from_dynamic_image(img.fliph(), frame.index()))
}

/// Draws a one-pixel outline around each region, in place.
///
/// Regions are clamped to the frame; those entirely outside are skipped.
pub fn annotate(frame: &mut Frame, regions: &[Region], color: [u8; 3]) -> Result<(), ImageError> {
    if regions.is_empty() {
        return Ok(());
    }
    let (w, h) = (frame.width(), frame.height());
    let mut img = to_dynamic_image(frame)?;
    let outline = Rgba([color[0], color[1], color[2], 255]);
    for region in regions.iter().filter_map(|r| r.clamp_to(w, h)) {
        let rect = Rect::at(region.x, region.y).of_size(region.width as u32, region.height as u32);
        draw_hollow_rect_mut(&mut img, rect, outline);
    }
    frame.replace_data(img.into_bytes(), w, h);
    Ok(())
}
