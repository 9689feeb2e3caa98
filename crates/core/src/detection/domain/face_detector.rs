use std::path::Path;

use crate::shared::frame::Frame;
use crate::shared::region::Region;

/// Domain interface for face detection.
///
/// The model artifact is loaded once with [`FaceDetector::load`] before any
/// call to `detect`. Rectangles come back in detector-defined order, in the
/// coordinate space of the frame passed in; an empty result means no faces.
pub trait FaceDetector {
    fn load(&mut self, model_path: &Path) -> Result<(), Box<dyn std::error::Error>>;

    fn detect(&mut self, frame: &Frame) -> Result<Vec<Region>, Box<dyn std::error::Error>>;

    /// Releases the loaded model.
    fn close(&mut self);
}
