use std::time::Duration;

use opencv::highgui;

use crate::display::domain::display_sink::DisplaySink;
use crate::shared::frame::Frame;
use crate::shared::mat_conversion::frame_to_bgr_mat;

/// Native window rendered through OpenCV's highgui module.
pub struct HighguiWindow {
    title: Option<String>,
}

impl HighguiWindow {
    pub fn new() -> Self {
        Self { title: None }
    }
}

impl Default for HighguiWindow {
    fn default() -> Self {
        Self::new()
    }
}

impl DisplaySink for HighguiWindow {
    fn open(&mut self, title: &str) -> Result<(), Box<dyn std::error::Error>> {
        highgui::named_window(title, highgui::WINDOW_AUTOSIZE)?;
        self.title = Some(title.to_string());
        Ok(())
    }

    fn show(&mut self, frame: &Frame) -> Result<(), Box<dyn std::error::Error>> {
        let title = self.title.as_deref().ok_or("window is not open")?;
        let mat = frame_to_bgr_mat(frame)?;
        highgui::imshow(title, &mat)?;
        Ok(())
    }

    fn poll_key(&mut self, timeout: Duration) -> Result<Option<i32>, Box<dyn std::error::Error>> {
        // wait_key(0) blocks forever, so never pass zero.
        let delay = i32::try_from(timeout.as_millis()).unwrap_or(i32::MAX).max(1);
        Ok(key_from_code(highgui::wait_key(delay)?))
    }

    fn close(&mut self) {
        if let Some(title) = self.title.take() {
            if let Err(e) = highgui::destroy_window(&title) {
                log::warn!("Could not destroy window '{title}': {e}");
            }
        }
    }
}

/// `wait_key` reports "no key" as a negative code.
fn key_from_code(code: i32) -> Option<i32> {
    (code >= 0).then_some(code)
}
