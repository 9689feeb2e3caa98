pub const DEFAULT_DEVICE_ID: u32 = 2;
pub const DEFAULT_CASCADE_MODEL: &str = "haarcascade_frontalface_default.xml";
pub const DEFAULT_WINDOW_TITLE: &str = "Hello Computer!";

/// Bounded wait for a key press after each rendered frame.
pub const DEFAULT_KEY_WAIT_MS: u64 = 1;

/// Outline colour for annotated face rectangles (RGB).
pub const ANNOTATION_COLOR: [u8; 3] = [0, 0, 255];

pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "bmp", "tiff", "tif", "webp"];
