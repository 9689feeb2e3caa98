#[cfg(feature = "opencv")]
pub mod highgui_window;
