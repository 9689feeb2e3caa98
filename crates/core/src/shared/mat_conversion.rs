//! Frame <-> `Mat` conversion for the OpenCV adapters.
//!
//! Frames are RGB(A); OpenCV works in BGR(A). Channel order is swapped at
//! this boundary and nowhere else.

use opencv::core::{Mat, Scalar, CV_8UC1, CV_8UC3, CV_8UC4};
use opencv::imgproc;
use opencv::prelude::*;

use crate::shared::frame::{Frame, PixelFormat};

/// Copies a frame into a new BGR/BGRA/gray `Mat`.
pub fn frame_to_bgr_mat(frame: &Frame) -> opencv::Result<Mat> {
    let (typ, to_bgr) = match frame.format() {
        PixelFormat::Gray8 => (CV_8UC1, None),
        PixelFormat::Rgb8 => (CV_8UC3, Some(imgproc::COLOR_RGB2BGR)),
        PixelFormat::Rgba8 => (CV_8UC4, Some(imgproc::COLOR_RGBA2BGRA)),
    };
    let mut mat = Mat::new_rows_cols_with_default(
        frame.height() as i32,
        frame.width() as i32,
        typ,
        Scalar::all(0.0),
    )?;
    mat.data_bytes_mut()?.copy_from_slice(frame.data());

    match to_bgr {
        Some(code) => {
            let mut bgr = Mat::default();
            imgproc::cvt_color(&mat, &mut bgr, code, 0)?;
            Ok(bgr)
        }
        None => Ok(mat),
    }
}

/// Overwrites `frame` with the content of a BGR/BGRA/gray `Mat`.
///
/// An empty `Mat` clears the frame.
pub fn bgr_mat_into_frame(mat: &Mat, frame: &mut Frame, index: usize) -> opencv::Result<()> {
    if mat.rows() <= 0 || mat.cols() <= 0 {
        frame.clear();
        return Ok(());
    }
    let (format, to_rgb) = match mat.channels() {
        1 => (PixelFormat::Gray8, None),
        4 => (PixelFormat::Rgba8, Some(imgproc::COLOR_BGRA2RGBA)),
        _ => (PixelFormat::Rgb8, Some(imgproc::COLOR_BGR2RGB)),
    };
    let mut converted = Mat::default();
    match to_rgb {
        Some(code) => imgproc::cvt_color(mat, &mut converted, code, 0)?,
        None => converted = mat.try_clone()?,
    }
    if !converted.is_continuous() {
        converted = converted.try_clone()?;
    }
    frame.fill_from(
        converted.data_bytes()?,
        converted.cols() as u32,
        converted.rows() as u32,
        format,
        index,
    );
    Ok(())
}
