use std::path::Path;

use opencv::core::{Mat, Rect, Size, Vector};
use opencv::imgproc;
use opencv::objdetect::CascadeClassifier;
use opencv::prelude::*;

use crate::detection::domain::face_detector::FaceDetector;
use crate::shared::frame::{Frame, PixelFormat};
use crate::shared::mat_conversion::frame_to_bgr_mat;
use crate::shared::region::Region;

const SCALE_FACTOR: f64 = 1.1;
const MIN_NEIGHBORS: i32 = 3;

/// Haar/LBP cascade face detector backed by OpenCV's `CascadeClassifier`.
///
/// Runs on a histogram-equalised grayscale copy of the frame.
pub struct CascadeDetector {
    classifier: Option<CascadeClassifier>,
    min_face: Size,
}

impl CascadeDetector {
    pub fn new() -> Self {
        Self {
            classifier: None,
            min_face: Size::new(30, 30),
        }
    }
}

impl Default for CascadeDetector {
    fn default() -> Self {
        Self::new()
    }
}

impl FaceDetector for CascadeDetector {
    fn load(&mut self, model_path: &Path) -> Result<(), Box<dyn std::error::Error>> {
        let path = model_path
            .to_str()
            .ok_or_else(|| format!("non UTF-8 model path: {}", model_path.display()))?;
        if !model_path.is_file() {
            return Err(format!("cascade file not found: {path}").into());
        }
        let classifier = CascadeClassifier::new(path)?;
        if classifier.empty()? {
            return Err(format!("cascade file {path} holds no classifier").into());
        }
        self.classifier = Some(classifier);
        Ok(())
    }

    fn detect(&mut self, frame: &Frame) -> Result<Vec<Region>, Box<dyn std::error::Error>> {
        let classifier = self
            .classifier
            .as_mut()
            .ok_or("cascade detector used before load")?;
        if frame.is_empty() {
            return Ok(Vec::new());
        }

        let gray = to_equalized_gray(frame)?;
        let mut faces: Vector<Rect> = Vector::new();
        classifier.detect_multi_scale(
            &gray,
            &mut faces,
            SCALE_FACTOR,
            MIN_NEIGHBORS,
            0,
            self.min_face,
            Size::new(0, 0),
        )?;

        Ok(faces
            .iter()
            .map(|r| Region::new(r.x, r.y, r.width, r.height))
            .collect())
    }

    fn close(&mut self) {
        self.classifier = None;
    }
}

fn to_equalized_gray(frame: &Frame) -> opencv::Result<Mat> {
    let mat = frame_to_bgr_mat(frame)?;
    let gray = match frame.format() {
        PixelFormat::Gray8 => mat,
        PixelFormat::Rgb8 => {
            let mut gray = Mat::default();
            imgproc::cvt_color(&mat, &mut gray, imgproc::COLOR_BGR2GRAY, 0)?;
            gray
        }
        PixelFormat::Rgba8 => {
            let mut gray = Mat::default();
            imgproc::cvt_color(&mat, &mut gray, imgproc::COLOR_BGRA2GRAY, 0)?;
            gray
        }
    };
    let mut equalized = Mat::default();
    imgproc::equalize_hist(&gray, &mut equalized)?;
    Ok(equalized)
}
