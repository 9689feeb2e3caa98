pub mod ffmpeg_camera;
#[cfg(feature = "opencv")]
pub mod opencv_camera;
