use thiserror::Error;

use crate::shared::region::Region;

/// Failures of a single image utility call. None of these leave the input
/// frame modified.
#[derive(Debug, Error)]
pub enum ImageError {
    #[error("cannot decode image: {0}")]
    Decode(#[source] image::ImageError),
    #[error("cannot encode image as {format}: {reason}")]
    Encode { format: String, reason: String },
    #[error("region {region:?} is degenerate or outside the {width}x{height} frame")]
    InvalidRegion {
        region: Region,
        width: u32,
        height: u32,
    },
    #[error("invalid target dimensions {width}x{height}")]
    InvalidDimensions { width: u32, height: u32 },
    #[error("operation requires a non-empty frame")]
    EmptyFrame,
}
