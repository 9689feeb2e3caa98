use std::path::Path;

use crate::imaging::{frame_ops, image_codec};
use crate::shared::frame::Frame;
use crate::shared::region::Region;

/// One step of an offline image edit.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ImageOp {
    Crop(Region),
    Resize { width: u32, height: u32 },
    FlipVertical,
    FlipHorizontal,
}

impl ImageOp {
    fn apply(&self, frame: Frame) -> Result<Frame, Box<dyn std::error::Error>> {
        let out = match self {
            ImageOp::Crop(region) => frame_ops::crop(&frame, region)?,
            ImageOp::Resize { width, height } => {
                let mut frame = frame;
                frame_ops::resize(&mut frame, *width, *height)?;
                frame
            }
            ImageOp::FlipVertical => frame_ops::flip_vertical(&frame)?,
            ImageOp::FlipHorizontal => frame_ops::flip_horizontal(&frame)?,
        };
        Ok(out)
    }
}

/// Single-image edit pipeline: read → decode → ops → encode → write.
pub struct ProcessImageUseCase {
    ops: Vec<ImageOp>,
}

impl ProcessImageUseCase {
    pub fn new(ops: Vec<ImageOp>) -> Self {
        Self { ops }
    }

    /// Applies the ops in order and writes the result, encoded according to
    /// the output extension. Returns the written frame's dimensions.
    pub fn execute(
        &self,
        input_path: &Path,
        output_path: &Path,
    ) -> Result<(u32, u32), Box<dyn std::error::Error>> {
        let bytes = std::fs::read(input_path)
            .map_err(|e| format!("cannot read {}: {e}", input_path.display()))?;
        let mut frame = image_codec::decode(&bytes)?;
        log::debug!(
            "Decoded {} ({}x{}, {:?})",
            input_path.display(),
            frame.width(),
            frame.height(),
            frame.format()
        );

        for op in &self.ops {
            frame = op.apply(frame)?;
            log::debug!("{op:?} -> {}x{}", frame.width(), frame.height());
        }

        let encoded = image_codec::encode(&frame, image_codec::format_for_path(output_path))?;
        std::fs::write(output_path, encoded)
            .map_err(|e| format!("cannot write {}: {e}", output_path.display()))?;
        Ok((frame.width(), frame.height()))
    }
}
