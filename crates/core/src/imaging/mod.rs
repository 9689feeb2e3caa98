pub mod frame_ops;
pub mod image_codec;
pub mod image_error;
