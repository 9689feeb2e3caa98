#[cfg(feature = "opencv")]
pub mod cascade_detector;
pub mod onnx_blazeface_detector;
