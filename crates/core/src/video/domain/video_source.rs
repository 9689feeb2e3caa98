use crate::shared::frame::Frame;

/// A live frame source such as a camera device.
///
/// Implementations overwrite the caller's frame on every read so one buffer
/// is reused across the whole capture session.
pub trait VideoSource {
    /// Acquires the device identified by `device_id`.
    fn open(&mut self, device_id: u32) -> Result<(), Box<dyn std::error::Error>>;

    /// Fills `frame` with the next picture.
    ///
    /// `Ok` with an empty frame means the device answered but had nothing
    /// decodable yet (e.g. warming up). `Err` means the device can no longer
    /// be read.
    fn read_next(&mut self, frame: &mut Frame) -> Result<(), Box<dyn std::error::Error>>;

    /// Releases the device. Safe to call on an unopened source.
    fn close(&mut self);
}
