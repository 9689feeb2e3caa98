use ndarray::ArrayView3;

/// Pixel layout of a [`Frame`]. All formats are 8 bits per channel.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PixelFormat {
    Gray8,
    Rgb8,
    Rgba8,
}

impl PixelFormat {
    pub fn channels(self) -> u8 {
        match self {
            PixelFormat::Gray8 => 1,
            PixelFormat::Rgb8 => 3,
            PixelFormat::Rgba8 => 4,
        }
    }
}

/// A single captured or decoded image: contiguous bytes in row-major order.
///
/// A frame is either *empty* (0x0, no storage, nothing captured yet) or
/// *valid* (positive dimensions, `width * height * channels` bytes).
/// Capture sources overwrite one frame in place across loop iterations via
/// [`Frame::fill_from`], so the allocation is reused.
#[derive(Clone, Debug, PartialEq)]
pub struct Frame {
    data: Vec<u8>,
    width: u32,
    height: u32,
    format: PixelFormat,
    index: usize,
}

impl Frame {
    /// Wraps `data` as a frame, or `None` when its length is not
    /// `width * height * channels`.
    pub fn from_raw(
        data: Vec<u8>,
        width: u32,
        height: u32,
        format: PixelFormat,
        index: usize,
    ) -> Option<Self> {
        if data.len() != byte_len(width, height, format) {
            return None;
        }
        Some(Self {
            data,
            width,
            height,
            format,
            index,
        })
    }

    /// Unchecked constructor for buffers whose size is known to match.
    pub(crate) fn new(
        data: Vec<u8>,
        width: u32,
        height: u32,
        format: PixelFormat,
        index: usize,
    ) -> Self {
        debug_assert_eq!(
            data.len(),
            byte_len(width, height, format),
            "data length must equal width * height * channels"
        );
        Self {
            data,
            width,
            height,
            format,
            index,
        }
    }

    pub fn empty() -> Self {
        Self {
            data: Vec::new(),
            width: 0,
            height: 0,
            format: PixelFormat::Rgb8,
            index: 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0 || self.data.is_empty()
    }

    /// Drops the pixel content but keeps the allocation for the next fill.
    pub fn clear(&mut self) {
        self.data.clear();
        self.width = 0;
        self.height = 0;
    }

    /// Overwrites this frame with a copy of `pixels`.
    ///
    /// A `pixels` length that does not match the dimensions leaves the frame
    /// empty.
    pub fn fill_from(
        &mut self,
        pixels: &[u8],
        width: u32,
        height: u32,
        format: PixelFormat,
        index: usize,
    ) {
        if pixels.len() != byte_len(width, height, format) {
            self.clear();
            return;
        }
        self.data.clear();
        self.data.extend_from_slice(pixels);
        self.width = width;
        self.height = height;
        self.format = format;
        self.index = index;
    }

    /// Swaps in new pixel storage; the previous buffer is released here.
    pub(crate) fn replace_data(&mut self, data: Vec<u8>, width: u32, height: u32) {
        debug_assert_eq!(data.len(), byte_len(width, height, self.format));
        self.data = data;
        self.width = width;
        self.height = height;
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn format(&self) -> PixelFormat {
        self.format
    }

    pub fn channels(&self) -> u8 {
        self.format.channels()
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn as_ndarray(&self) -> ArrayView3<'_, u8> {
        ArrayView3::from_shape(self.shape(), &self.data)
            .expect("Frame data length must match dimensions")
    }

    fn shape(&self) -> (usize, usize, usize) {
        (
            self.height as usize,
            self.width as usize,
            self.channels() as usize,
        )
    }
}

impl Default for Frame {
    fn default() -> Self {
        Self::empty()
    }
}

fn byte_len(width: u32, height: u32, format: PixelFormat) -> usize {
    (width as usize) * (height as usize) * (format.channels() as usize)
}
