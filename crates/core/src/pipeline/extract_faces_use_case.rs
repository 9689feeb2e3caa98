use std::path::{Path, PathBuf};

use crate::detection::domain::face_detector::FaceDetector;
use crate::imaging::{frame_ops, image_codec};

/// Saves every face found in one still image as its own file.
///
/// Crops are numbered in detector order: `face_0.<ext>`, `face_1.<ext>`, ...
/// with the input's extension. Detections reaching past the image edge are
/// clamped; ones lying fully outside are skipped.
pub struct ExtractFacesUseCase {
    detector: Box<dyn FaceDetector>,
}

impl ExtractFacesUseCase {
    pub fn new(detector: Box<dyn FaceDetector>) -> Self {
        Self { detector }
    }

    /// Loads the model, detects, and writes crops into `output_dir` (created
    /// if missing). Returns the written paths.
    pub fn execute(
        &mut self,
        input_path: &Path,
        model_path: &Path,
        output_dir: &Path,
    ) -> Result<Vec<PathBuf>, Box<dyn std::error::Error>> {
        let bytes = std::fs::read(input_path)
            .map_err(|e| format!("cannot read {}: {e}", input_path.display()))?;
        let frame = image_codec::decode(&bytes)?;

        self.detector
            .load(model_path)
            .map_err(|e| format!("error reading detector model {}: {e}", model_path.display()))?;
        let detected = self.detector.detect(&frame);
        self.detector.close();
        let regions = detected?;
        log::info!("Detected {} faces in {}", regions.len(), input_path.display());

        std::fs::create_dir_all(output_dir)?;
        let ext = input_path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("jpg")
            .to_lowercase();
        let format = image_codec::format_for_path(Path::new(&format!("face.{ext}")));

        let mut written = Vec::new();
        for region in &regions {
            let Some(clamped) = region.clamp_to(frame.width(), frame.height()) else {
                log::debug!("Skipping face outside the image: {region:?}");
                continue;
            };
            let crop = frame_ops::crop(&frame, &clamped)?;
            let path = output_dir.join(format!("face_{}.{ext}", written.len()));
            std::fs::write(&path, image_codec::encode(&crop, format)?)?;
            written.push(path);
        }
        Ok(written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::frame::{Frame, PixelFormat};
    use crate::shared::region::Region;
    use std::sync::{Arc, Mutex};

    // --- Stubs ---

    struct StubDetector {
        regions: Vec<Region>,
        fail_load: bool,
        calls: Arc<Mutex<Vec<String>>>,
    }

    impl StubDetector {
        fn new(regions: Vec<Region>) -> Self {
            Self {
                regions,
                fail_load: false,
                calls: Arc::new(Mutex::new(Vec::new())),
            }
        }
    }

    impl FaceDetector for StubDetector {
        fn load(&mut self, _model_path: &Path) -> Result<(), Box<dyn std::error::Error>> {
            self.calls.lock().unwrap().push("load".into());
            if self.fail_load {
                return Err("bad model".into());
            }
            Ok(())
        }

        fn detect(&mut self, _frame: &Frame) -> Result<Vec<Region>, Box<dyn std::error::Error>> {
            self.calls.lock().unwrap().push("detect".into());
            Ok(self.regions.clone())
        }

        fn close(&mut self) {
            self.calls.lock().unwrap().push("close".into());
        }
    }

    fn write_png(dir: &Path, width: u32, height: u32) -> PathBuf {
        let frame = Frame::new(
            vec![128; (width * height * 3) as usize],
            width,
            height,
            PixelFormat::Rgb8,
            0,
        );
        let path = dir.join("group.png");
        std::fs::write(&path, image_codec::encode(&frame, image::ImageFormat::Png).unwrap())
            .unwrap();
        path
    }

    fn dims(path: &Path) -> (u32, u32) {
        let frame = image_codec::decode(&std::fs::read(path).unwrap()).unwrap();
        (frame.width(), frame.height())
    }

    // --- Tests ---

    #[test]
    fn test_writes_one_file_per_face_in_detector_order() {
        let dir = tempfile::tempdir().unwrap();
        let input = write_png(dir.path(), 40, 30);
        let out = dir.path().join("faces");
        let detector = StubDetector::new(vec![
            Region::new(0, 0, 10, 10),
            Region::new(20, 5, 8, 12),
        ]);

        let mut use_case = ExtractFacesUseCase::new(Box::new(detector));
        let written = use_case
            .execute(&input, Path::new("model.xml"), &out)
            .unwrap();

        assert_eq!(written, vec![out.join("face_0.png"), out.join("face_1.png")]);
        assert_eq!(dims(&written[0]), (10, 10));
        assert_eq!(dims(&written[1]), (8, 12));
    }

    #[test]
    fn test_clamps_partial_faces_and_skips_outside_ones() {
        let dir = tempfile::tempdir().unwrap();
        let input = write_png(dir.path(), 40, 30);
        let out = dir.path().join("faces");
        let detector = StubDetector::new(vec![
            Region::new(100, 100, 10, 10),
            Region::new(35, 25, 10, 10),
        ]);

        let mut use_case = ExtractFacesUseCase::new(Box::new(detector));
        let written = use_case
            .execute(&input, Path::new("model.xml"), &out)
            .unwrap();

        assert_eq!(written, vec![out.join("face_0.png")]);
        assert_eq!(dims(&written[0]), (5, 5));
    }

    #[test]
    fn test_no_faces_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let input = write_png(dir.path(), 16, 16);
        let out = dir.path().join("faces");

        let mut use_case = ExtractFacesUseCase::new(Box::new(StubDetector::new(vec![])));
        let written = use_case
            .execute(&input, Path::new("model.xml"), &out)
            .unwrap();

        assert!(written.is_empty());
    }

    #[test]
    fn test_detector_is_loaded_used_and_closed() {
        let dir = tempfile::tempdir().unwrap();
        let input = write_png(dir.path(), 16, 16);
        let detector = StubDetector::new(vec![]);
        let calls = detector.calls.clone();

        let mut use_case = ExtractFacesUseCase::new(Box::new(detector));
        use_case
            .execute(&input, Path::new("model.xml"), dir.path())
            .unwrap();

        assert_eq!(*calls.lock().unwrap(), vec!["load", "detect", "close"]);
    }

    #[test]
    fn test_load_failure_names_model() {
        let dir = tempfile::tempdir().unwrap();
        let input = write_png(dir.path(), 16, 16);
        let mut detector = StubDetector::new(vec![]);
        detector.fail_load = true;

        let mut use_case = ExtractFacesUseCase::new(Box::new(detector));
        let err = use_case
            .execute(&input, Path::new("broken.xml"), dir.path())
            .unwrap_err();

        assert!(err.to_string().contains("error reading detector model broken.xml"));
    }
}
