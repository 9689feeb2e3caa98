use opencv::core::Mat;
use opencv::prelude::*;
use opencv::videoio::{self, VideoCapture};

use crate::shared::frame::Frame;
use crate::shared::mat_conversion::bgr_mat_into_frame;
use crate::video::domain::video_source::VideoSource;

/// Camera capture through OpenCV's `VideoCapture`, addressed by index.
pub struct OpencvCamera {
    capture: Option<VideoCapture>,
    scratch: Mat,
    device_id: u32,
    frame_index: usize,
}

impl OpencvCamera {
    pub fn new() -> Self {
        Self {
            capture: None,
            scratch: Mat::default(),
            device_id: 0,
            frame_index: 0,
        }
    }
}

impl Default for OpencvCamera {
    fn default() -> Self {
        Self::new()
    }
}

impl VideoSource for OpencvCamera {
    fn open(&mut self, device_id: u32) -> Result<(), Box<dyn std::error::Error>> {
        let index = i32::try_from(device_id)?;
        let capture = VideoCapture::new(index, videoio::CAP_ANY)?;
        if !capture.is_opened()? {
            return Err(format!("device {device_id} did not open").into());
        }
        self.capture = Some(capture);
        self.device_id = device_id;
        self.frame_index = 0;
        Ok(())
    }

    fn read_next(&mut self, frame: &mut Frame) -> Result<(), Box<dyn std::error::Error>> {
        let capture = self.capture.as_mut().ok_or("camera is not open")?;
        if !capture.read(&mut self.scratch)? {
            return Err(format!("device {} returned no frame", self.device_id).into());
        }
        bgr_mat_into_frame(&self.scratch, frame, self.frame_index)?;
        self.frame_index += 1;
        Ok(())
    }

    fn close(&mut self) {
        if let Some(mut capture) = self.capture.take() {
            if let Err(e) = capture.release() {
                log::warn!("Could not release device {}: {e}", self.device_id);
            }
        }
    }
}
