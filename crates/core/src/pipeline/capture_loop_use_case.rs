use std::path::PathBuf;
use std::time::{Duration, Instant};

use thiserror::Error;

use crate::detection::domain::face_detector::FaceDetector;
use crate::detection::domain::region_selector::CropPolicy;
use crate::display::domain::display_sink::DisplaySink;
use crate::imaging::frame_ops;
use crate::pipeline::loop_logger::{LoopLogger, NullLoopLogger};
use crate::shared::constants::{
    ANNOTATION_COLOR, DEFAULT_CASCADE_MODEL, DEFAULT_DEVICE_ID, DEFAULT_KEY_WAIT_MS,
    DEFAULT_WINDOW_TITLE,
};
use crate::shared::frame::Frame;
use crate::shared::region::Region;
use crate::video::domain::video_source::VideoSource;

/// Settings for one capture session.
#[derive(Clone, Debug, PartialEq)]
pub struct LoopConfig {
    pub device_id: u32,
    pub model_path: PathBuf,
    pub window_title: String,
    pub crop_policy: CropPolicy,
    /// Outline every detected face before cropping and display.
    pub annotate: bool,
    /// Bounded wait for a key press after each rendered frame.
    pub key_wait: Duration,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            device_id: DEFAULT_DEVICE_ID,
            model_path: PathBuf::from(DEFAULT_CASCADE_MODEL),
            window_title: DEFAULT_WINDOW_TITLE.to_string(),
            crop_policy: CropPolicy::default(),
            annotate: false,
            key_wait: Duration::from_millis(DEFAULT_KEY_WAIT_MS),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LoopState {
    Opening,
    Ready,
    Capturing,
    Detecting,
    Rendering,
    Stopped,
    Failed,
}

/// Counters reported when the loop stops on a key press.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LoopSummary {
    pub frames_read: usize,
    pub empty_frames: usize,
    pub frames_rendered: usize,
    pub faces_detected: usize,
    pub exit_key: Option<i32>,
}

/// Loop-fatal failures. Each names the stage that failed.
#[derive(Debug, Error)]
pub enum CaptureLoopError {
    #[error("cannot open video device {device_id}: {source}")]
    Open {
        device_id: u32,
        source: Box<dyn std::error::Error>,
    },
    #[error("cannot open display window '{title}': {source}")]
    DisplayOpen {
        title: String,
        source: Box<dyn std::error::Error>,
    },
    #[error("error reading detector model {}: {source}", .path.display())]
    Load {
        path: PathBuf,
        source: Box<dyn std::error::Error>,
    },
    #[error("cannot read device {device_id}: {source}")]
    Capture {
        device_id: u32,
        source: Box<dyn std::error::Error>,
    },
    #[error("cannot render frame: {source}")]
    Render { source: Box<dyn std::error::Error> },
}

/// Live capture → detect → crop → display loop.
///
/// Single-threaded: every stage blocks until done, and the bounded key poll
/// after each rendered frame is the only yield point. The video source,
/// display and detector are acquired once and released exactly once on
/// every exit path, in reverse order of acquisition.
pub struct CaptureLoopUseCase {
    source: Box<dyn VideoSource>,
    detector: Box<dyn FaceDetector>,
    display: Box<dyn DisplaySink>,
    config: LoopConfig,
    logger: Box<dyn LoopLogger>,
    state: LoopState,
}

impl CaptureLoopUseCase {
    pub fn new(
        source: Box<dyn VideoSource>,
        detector: Box<dyn FaceDetector>,
        display: Box<dyn DisplaySink>,
        config: LoopConfig,
        logger: Option<Box<dyn LoopLogger>>,
    ) -> Self {
        Self {
            source,
            detector,
            display,
            config,
            logger: logger.unwrap_or_else(|| Box::new(NullLoopLogger)),
            state: LoopState::Opening,
        }
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    /// Runs until a key is pressed or a fatal error occurs.
    pub fn execute(&mut self) -> Result<LoopSummary, CaptureLoopError> {
        self.transition(LoopState::Opening);
        if let Err(e) = self.acquire() {
            self.transition(LoopState::Failed);
            return Err(e);
        }

        // One buffer for the whole session; it outlives the released devices.
        let mut frame = Frame::empty();
        let result = self.run_frames(&mut frame);
        self.release();
        drop(frame);
        self.logger.summary();
        result
    }

    fn acquire(&mut self) -> Result<(), CaptureLoopError> {
        let device_id = self.config.device_id;
        self.source
            .open(device_id)
            .map_err(|source| CaptureLoopError::Open { device_id, source })?;

        if let Err(source) = self.display.open(&self.config.window_title) {
            self.source.close();
            return Err(CaptureLoopError::DisplayOpen {
                title: self.config.window_title.clone(),
                source,
            });
        }

        if let Err(source) = self.detector.load(&self.config.model_path) {
            self.display.close();
            self.source.close();
            return Err(CaptureLoopError::Load {
                path: self.config.model_path.clone(),
                source,
            });
        }
        Ok(())
    }

    fn release(&mut self) {
        self.detector.close();
        self.display.close();
        self.source.close();
    }

    fn run_frames(&mut self, frame: &mut Frame) -> Result<LoopSummary, CaptureLoopError> {
        let device_id = self.config.device_id;
        let mut summary = LoopSummary::default();
        self.logger
            .info(&format!("start reading camera device: {device_id}"));

        loop {
            self.transition(LoopState::Ready);
            self.transition(LoopState::Capturing);
            let started = Instant::now();
            if let Err(source) = self.source.read_next(frame) {
                self.transition(LoopState::Failed);
                return Err(CaptureLoopError::Capture { device_id, source });
            }
            self.logger.timing("capture", elapsed_ms(started));
            summary.frames_read += 1;

            if frame.is_empty() {
                log::debug!("Empty frame from device {device_id}, skipping");
                summary.empty_frames += 1;
                self.logger.frame_skipped();
                continue;
            }

            self.transition(LoopState::Detecting);
            let started = Instant::now();
            let regions = self.detect(frame);
            self.logger.timing("detect", elapsed_ms(started));
            log::debug!("found {} faces", regions.len());
            self.logger.metric("faces", regions.len() as f64);
            summary.faces_detected += regions.len();

            self.transition(LoopState::Rendering);
            let started = Instant::now();
            if self.config.annotate {
                if let Err(e) = frame_ops::annotate(frame, &regions, ANNOTATION_COLOR) {
                    log::warn!("Could not annotate frame {}: {e}", frame.index());
                }
            }
            let cropped = self.crop_to_selection(frame, &regions);
            let key = match self.render(cropped.as_ref().unwrap_or(&*frame)) {
                Ok(key) => key,
                Err(e) => {
                    self.transition(LoopState::Failed);
                    return Err(e);
                }
            };
            self.logger.timing("render", elapsed_ms(started));
            self.logger.frame_rendered(frame.index());
            summary.frames_rendered += 1;

            if let Some(code) = key {
                log::info!("Key {code} pressed, stopping capture");
                summary.exit_key = Some(code);
                self.transition(LoopState::Stopped);
                return Ok(summary);
            }
        }
    }

    /// Detector failures degrade to "no faces" for this frame.
    fn detect(&mut self, frame: &Frame) -> Vec<Region> {
        match self.detector.detect(frame) {
            Ok(regions) => regions,
            Err(e) => {
                log::warn!("Face detection failed on frame {}: {e}", frame.index());
                Vec::new()
            }
        }
    }

    fn crop_to_selection(&self, frame: &Frame, regions: &[Region]) -> Option<Frame> {
        let selected = self.config.crop_policy.select(regions)?;
        let Some(region) = selected.clamp_to(frame.width(), frame.height()) else {
            log::warn!("Detected region {selected:?} lies outside the frame, showing full frame");
            return None;
        };
        match frame_ops::crop(frame, &region) {
            Ok(cropped) => Some(cropped),
            Err(e) => {
                log::warn!("Could not crop frame {}: {e}", frame.index());
                None
            }
        }
    }

    fn render(&mut self, frame: &Frame) -> Result<Option<i32>, CaptureLoopError> {
        self.display
            .show(frame)
            .map_err(|source| CaptureLoopError::Render { source })?;
        self.display
            .poll_key(self.config.key_wait)
            .map_err(|source| CaptureLoopError::Render { source })
    }

    fn transition(&mut self, next: LoopState) {
        log::trace!("Capture loop: {:?} -> {:?}", self.state, next);
        self.state = next;
    }
}

fn elapsed_ms(started: Instant) -> f64 {
    started.elapsed().as_secs_f64() * 1000.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::frame::PixelFormat;
    use std::collections::VecDeque;
    use std::path::Path;
    use std::sync::{Arc, Mutex};

    type Events = Arc<Mutex<Vec<&'static str>>>;

    // --- Stubs ---

    enum Read {
        Empty,
        Frame(u32, u32),
        Fail,
    }

    struct ScriptedSource {
        events: Events,
        reads: VecDeque<Read>,
        fail_open: bool,
        next_index: usize,
        buffers: Arc<Mutex<Vec<usize>>>,
    }

    impl VideoSource for ScriptedSource {
        fn open(&mut self, _device_id: u32) -> Result<(), Box<dyn std::error::Error>> {
            self.events.lock().unwrap().push("source.open");
            if self.fail_open {
                return Err("no such device".into());
            }
            Ok(())
        }

        fn read_next(&mut self, frame: &mut Frame) -> Result<(), Box<dyn std::error::Error>> {
            self.events.lock().unwrap().push("source.read");
            match self.reads.pop_front() {
                Some(Read::Empty) => frame.clear(),
                Some(Read::Frame(w, h)) => {
                    let shade = (self.next_index % 256) as u8;
                    let pixels = vec![shade; (w * h * 3) as usize];
                    frame.fill_from(&pixels, w, h, PixelFormat::Rgb8, self.next_index);
                    self.buffers
                        .lock()
                        .unwrap()
                        .push(frame.data().as_ptr() as usize);
                }
                Some(Read::Fail) | None => return Err("device unplugged".into()),
            }
            self.next_index += 1;
            Ok(())
        }

        fn close(&mut self) {
            self.events.lock().unwrap().push("source.close");
        }
    }

    struct StubDetector {
        events: Events,
        regions: Vec<Region>,
        fail_load: bool,
        fail_detect: bool,
    }

    impl FaceDetector for StubDetector {
        fn load(&mut self, _model_path: &Path) -> Result<(), Box<dyn std::error::Error>> {
            self.events.lock().unwrap().push("detector.load");
            if self.fail_load {
                return Err("missing cascade".into());
            }
            Ok(())
        }

        fn detect(&mut self, _frame: &Frame) -> Result<Vec<Region>, Box<dyn std::error::Error>> {
            self.events.lock().unwrap().push("detector.detect");
            if self.fail_detect {
                return Err("inference failed".into());
            }
            Ok(self.regions.clone())
        }

        fn close(&mut self) {
            self.events.lock().unwrap().push("detector.close");
        }
    }

    struct RecordingDisplay {
        events: Events,
        shown: Arc<Mutex<Vec<Frame>>>,
        keys: VecDeque<Option<i32>>,
        fail_open: bool,
        fail_show: bool,
    }

    impl DisplaySink for RecordingDisplay {
        fn open(&mut self, _title: &str) -> Result<(), Box<dyn std::error::Error>> {
            self.events.lock().unwrap().push("display.open");
            if self.fail_open {
                return Err("no display".into());
            }
            Ok(())
        }

        fn show(&mut self, frame: &Frame) -> Result<(), Box<dyn std::error::Error>> {
            self.events.lock().unwrap().push("display.show");
            if self.fail_show {
                return Err("window closed".into());
            }
            self.shown.lock().unwrap().push(frame.clone());
            Ok(())
        }

        fn poll_key(
            &mut self,
            _timeout: Duration,
        ) -> Result<Option<i32>, Box<dyn std::error::Error>> {
            self.events.lock().unwrap().push("display.poll");
            Ok(self.keys.pop_front().unwrap_or(Some(27)))
        }

        fn close(&mut self) {
            self.events.lock().unwrap().push("display.close");
        }
    }

    // --- Harness ---

    struct Harness {
        events: Events,
        shown: Arc<Mutex<Vec<Frame>>>,
        source: ScriptedSource,
        detector: StubDetector,
        display: RecordingDisplay,
        config: LoopConfig,
    }

    impl Harness {
        fn new(reads: Vec<Read>, keys: Vec<Option<i32>>) -> Self {
            let events: Events = Arc::new(Mutex::new(Vec::new()));
            let shown = Arc::new(Mutex::new(Vec::new()));
            Self {
                source: ScriptedSource {
                    events: events.clone(),
                    reads: reads.into(),
                    fail_open: false,
                    next_index: 0,
                    buffers: Arc::new(Mutex::new(Vec::new())),
                },
                detector: StubDetector {
                    events: events.clone(),
                    regions: Vec::new(),
                    fail_load: false,
                    fail_detect: false,
                },
                display: RecordingDisplay {
                    events: events.clone(),
                    shown: shown.clone(),
                    keys: keys.into(),
                    fail_open: false,
                    fail_show: false,
                },
                config: LoopConfig::default(),
                events,
                shown,
            }
        }

        fn with_regions(mut self, regions: Vec<Region>) -> Self {
            self.detector.regions = regions;
            self
        }

        fn with_policy(mut self, policy: CropPolicy) -> Self {
            self.config.crop_policy = policy;
            self
        }

        fn run(self) -> (Result<LoopSummary, CaptureLoopError>, LoopState, Recorded) {
            let mut uc = CaptureLoopUseCase::new(
                Box::new(self.source),
                Box::new(self.detector),
                Box::new(self.display),
                self.config,
                None,
            );
            let result = uc.execute();
            let recorded = Recorded {
                events: self.events.lock().unwrap().clone(),
                shown: self.shown.lock().unwrap().clone(),
            };
            (result, uc.state(), recorded)
        }
    }

    struct Recorded {
        events: Vec<&'static str>,
        shown: Vec<Frame>,
    }

    impl Recorded {
        fn count(&self, event: &str) -> usize {
            self.events.iter().filter(|e| **e == event).count()
        }

        fn assert_released_once(&self) {
            assert_eq!(self.count("source.close"), 1);
            assert_eq!(self.count("display.close"), 1);
            assert_eq!(self.count("detector.close"), 1);
        }
    }

    // --- Tests ---

    #[test]
    fn test_one_capture_buffer_is_reused_across_iterations() {
        let reads = vec![Read::Frame(8, 8), Read::Empty, Read::Frame(8, 8), Read::Frame(8, 8)];
        let harness = Harness::new(reads, vec![None, None, Some(27)]);
        let buffers = harness.source.buffers.clone();
        let (result, _, rec) = harness.run();

        assert_eq!(result.unwrap().frames_rendered, 3);
        let buffers = buffers.lock().unwrap();
        assert_eq!(buffers.len(), 3);
        assert!(buffers.iter().all(|p| *p == buffers[0]));
        rec.assert_released_once();
    }

    #[test]
    fn test_empty_frames_are_skipped_until_valid_frame() {
        let reads = vec![Read::Empty, Read::Empty, Read::Empty, Read::Frame(640, 480)];
        let (result, state, rec) = Harness::new(reads, vec![Some(27)]).run();

        let summary = result.unwrap();
        assert_eq!(summary.frames_read, 4);
        assert_eq!(summary.empty_frames, 3);
        assert_eq!(summary.frames_rendered, 1);
        assert_eq!(summary.exit_key, Some(27));
        assert_eq!(rec.count("detector.detect"), 1);
        assert_eq!(rec.count("display.show"), 1);
        assert_eq!(rec.count("display.poll"), 1);
        assert_eq!((rec.shown[0].width(), rec.shown[0].height()), (640, 480));
        assert_eq!(state, LoopState::Stopped);
    }

    #[test]
    fn test_detection_and_render_only_after_valid_read() {
        let reads = vec![Read::Empty, Read::Empty, Read::Empty, Read::Frame(640, 480)];
        let (_, _, rec) = Harness::new(reads, vec![Some(27)]).run();

        let first_detect = rec
            .events
            .iter()
            .position(|e| *e == "detector.detect")
            .unwrap();
        let reads_before = rec.events[..first_detect]
            .iter()
            .filter(|e| **e == "source.read")
            .count();
        assert_eq!(reads_before, 4);
    }

    #[test]
    fn test_failed_read_terminates_without_detecting_or_rendering() {
        let (result, state, rec) = Harness::new(vec![Read::Fail], vec![]).run();

        assert!(matches!(
            result,
            Err(CaptureLoopError::Capture { device_id: 2, .. })
        ));
        assert_eq!(rec.count("detector.detect"), 0);
        assert_eq!(rec.count("display.show"), 0);
        assert_eq!(rec.count("display.poll"), 0);
        rec.assert_released_once();
        assert_eq!(state, LoopState::Failed);
    }

    #[test]
    fn test_read_failure_mid_run_releases_resources() {
        let reads = vec![Read::Frame(32, 32), Read::Frame(32, 32), Read::Fail];
        let (result, _, rec) = Harness::new(reads, vec![None, None]).run();

        assert!(matches!(result, Err(CaptureLoopError::Capture { .. })));
        assert_eq!(rec.count("display.show"), 2);
        rec.assert_released_once();
    }

    #[test]
    fn test_zero_detections_render_unmodified_frames() {
        let reads = vec![
            Read::Frame(64, 48),
            Read::Frame(64, 48),
            Read::Frame(64, 48),
        ];
        let (result, _, rec) = Harness::new(reads, vec![None, None, Some(113)]).run();

        let summary = result.unwrap();
        assert_eq!(summary.frames_rendered, 3);
        assert_eq!(summary.faces_detected, 0);
        for (i, shown) in rec.shown.iter().enumerate() {
            assert_eq!((shown.width(), shown.height()), (64, 48));
            assert_eq!(shown.index(), i);
            assert!(shown.data().iter().all(|&v| v == i as u8));
        }
    }

    #[test]
    fn test_first_region_is_cropped_by_default() {
        let regions = vec![Region::new(10, 10, 20, 30), Region::new(0, 0, 60, 40)];
        let (result, _, rec) = Harness::new(vec![Read::Frame(64, 48)], vec![Some(27)])
            .with_regions(regions)
            .run();

        assert_eq!(result.unwrap().faces_detected, 2);
        assert_eq!((rec.shown[0].width(), rec.shown[0].height()), (20, 30));
    }

    #[test]
    fn test_largest_policy_crops_largest_region() {
        let regions = vec![Region::new(10, 10, 20, 30), Region::new(0, 0, 60, 40)];
        let (_, _, rec) = Harness::new(vec![Read::Frame(64, 48)], vec![Some(27)])
            .with_regions(regions)
            .with_policy(CropPolicy::Largest)
            .run();

        assert_eq!((rec.shown[0].width(), rec.shown[0].height()), (60, 40));
    }

    #[test]
    fn test_off_policy_renders_full_frame() {
        let (_, _, rec) = Harness::new(vec![Read::Frame(64, 48)], vec![Some(27)])
            .with_regions(vec![Region::new(10, 10, 20, 30)])
            .with_policy(CropPolicy::Off)
            .run();

        assert_eq!((rec.shown[0].width(), rec.shown[0].height()), (64, 48));
    }

    #[test]
    fn test_overhanging_region_is_clamped_before_crop() {
        let (_, _, rec) = Harness::new(vec![Read::Frame(64, 48)], vec![Some(27)])
            .with_regions(vec![Region::new(50, 40, 30, 30)])
            .run();

        assert_eq!((rec.shown[0].width(), rec.shown[0].height()), (14, 8));
    }

    #[test]
    fn test_region_outside_frame_renders_full_frame() {
        let (result, _, rec) = Harness::new(vec![Read::Frame(64, 48)], vec![Some(27)])
            .with_regions(vec![Region::new(100, 100, 10, 10)])
            .run();

        assert!(result.is_ok());
        assert_eq!((rec.shown[0].width(), rec.shown[0].height()), (64, 48));
    }

    #[test]
    fn test_detector_error_is_treated_as_no_faces() {
        let mut harness = Harness::new(
            vec![Read::Frame(16, 16), Read::Frame(16, 16)],
            vec![None, Some(27)],
        )
        .with_regions(vec![Region::new(0, 0, 4, 4)]);
        harness.detector.fail_detect = true;
        let (result, _, rec) = harness.run();

        assert_eq!(result.unwrap().frames_rendered, 2);
        assert!(rec.shown.iter().all(|f| f.width() == 16));
    }

    #[test]
    fn test_annotation_outlines_faces_before_display() {
        let mut harness = Harness::new(vec![Read::Frame(16, 16)], vec![Some(27)])
            .with_regions(vec![Region::new(2, 2, 6, 6)])
            .with_policy(CropPolicy::Off);
        harness.config.annotate = true;
        let (_, _, rec) = harness.run();

        let shown = &rec.shown[0];
        let corner = ((2 * 16 + 2) * 3) as usize;
        assert_eq!(&shown.data()[corner..corner + 3], &ANNOTATION_COLOR);
        assert_eq!(&shown.data()[0..3], &[0, 0, 0]);
    }

    #[test]
    fn test_key_press_stops_and_releases_in_reverse_order() {
        let (result, state, rec) = Harness::new(vec![Read::Frame(8, 8)], vec![Some(32)]).run();

        assert_eq!(result.unwrap().exit_key, Some(32));
        assert_eq!(state, LoopState::Stopped);
        assert_eq!(
            &rec.events[..3],
            &["source.open", "display.open", "detector.load"]
        );
        assert_eq!(
            &rec.events[rec.events.len() - 3..],
            &["detector.close", "display.close", "source.close"]
        );
        rec.assert_released_once();
    }

    #[test]
    fn test_device_open_failure_aborts_before_loop() {
        let mut harness = Harness::new(vec![Read::Frame(8, 8)], vec![]);
        harness.source.fail_open = true;
        let (result, state, rec) = harness.run();

        let err = result.unwrap_err();
        assert!(matches!(err, CaptureLoopError::Open { device_id: 2, .. }));
        assert!(err.to_string().contains("cannot open video device 2"));
        assert_eq!(rec.events, vec!["source.open"]);
        assert_eq!(state, LoopState::Failed);
    }

    #[test]
    fn test_display_open_failure_releases_source() {
        let mut harness = Harness::new(vec![Read::Frame(8, 8)], vec![]);
        harness.display.fail_open = true;
        let (result, _, rec) = harness.run();

        assert!(matches!(result, Err(CaptureLoopError::DisplayOpen { .. })));
        assert_eq!(
            rec.events,
            vec!["source.open", "display.open", "source.close"]
        );
    }

    #[test]
    fn test_model_load_failure_releases_and_never_reads() {
        let mut harness = Harness::new(vec![Read::Frame(8, 8)], vec![]);
        harness.detector.fail_load = true;
        let (result, state, rec) = harness.run();

        let err = result.unwrap_err();
        assert!(matches!(err, CaptureLoopError::Load { .. }));
        assert!(err
            .to_string()
            .contains("haarcascade_frontalface_default.xml"));
        assert_eq!(rec.count("source.read"), 0);
        assert_eq!(rec.count("display.close"), 1);
        assert_eq!(rec.count("source.close"), 1);
        assert_eq!(rec.count("detector.close"), 0);
        assert_eq!(state, LoopState::Failed);
    }

    #[test]
    fn test_show_failure_is_fatal_and_releases() {
        let mut harness = Harness::new(vec![Read::Frame(8, 8)], vec![]);
        harness.display.fail_show = true;
        let (result, state, rec) = harness.run();

        assert!(matches!(result, Err(CaptureLoopError::Render { .. })));
        assert_eq!(rec.count("display.poll"), 0);
        rec.assert_released_once();
        assert_eq!(state, LoopState::Failed);
    }

    #[test]
    fn test_state_starts_opening() {
        let h = Harness::new(vec![], vec![]);
        let uc = CaptureLoopUseCase::new(
            Box::new(h.source),
            Box::new(h.detector),
            Box::new(h.display),
            h.config,
            None,
        );
        assert_eq!(uc.state(), LoopState::Opening);
    }

    #[test]
    fn test_default_config() {
        let config = LoopConfig::default();
        assert_eq!(config.device_id, 2);
        assert_eq!(config.crop_policy, CropPolicy::First);
        assert_eq!(config.key_wait, Duration::from_millis(1));
        assert!(!config.annotate);
    }
}
