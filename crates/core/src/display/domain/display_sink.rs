use std::time::Duration;

use crate::shared::frame::Frame;

/// A visible surface that renders frames and reports key presses.
pub trait DisplaySink {
    fn open(&mut self, title: &str) -> Result<(), Box<dyn std::error::Error>>;

    fn show(&mut self, frame: &Frame) -> Result<(), Box<dyn std::error::Error>>;

    /// Waits at most `timeout` for a key press and returns its code.
    fn poll_key(&mut self, timeout: Duration) -> Result<Option<i32>, Box<dyn std::error::Error>>;

    fn close(&mut self);
}
