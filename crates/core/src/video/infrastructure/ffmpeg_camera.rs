use ffmpeg_next::format::context::Input;
use ffmpeg_next::software::scaling;
use ffmpeg_next::util::frame::video::Video;

use crate::shared::frame::{Frame, PixelFormat};
use crate::video::domain::video_source::VideoSource;

/// Reads a camera through libavdevice (ffmpeg-next) and converts each
/// picture to RGB24.
///
/// A packet that does not complete a picture leaves the caller's frame
/// empty; the end of the packet stream is treated as a device failure.
pub struct FfmpegCamera {
    input_ctx: Option<Input>,
    decoder: Option<ffmpeg_next::decoder::Video>,
    scaler: Option<scaling::Context>,
    video_stream_index: usize,
    device_id: u32,
    frame_index: usize,
}

impl FfmpegCamera {
    pub fn new() -> Self {
        Self {
            input_ctx: None,
            decoder: None,
            scaler: None,
            video_stream_index: 0,
            device_id: 0,
            frame_index: 0,
        }
    }
}

impl Default for FfmpegCamera {
    fn default() -> Self {
        Self::new()
    }
}

/// The libavdevice demuxer and device URL for a camera index on this platform.
fn capture_device(device_id: u32) -> (&'static str, String) {
    if cfg!(target_os = "linux") {
        ("video4linux2", format!("/dev/video{device_id}"))
    } else if cfg!(target_os = "macos") {
        ("avfoundation", device_id.to_string())
    } else {
        ("vfwcap", device_id.to_string())
    }
}

/// Classifies a `receive_frame` result: `Ok(false)` when the decoder only
/// needs more packets, `Err` for real decode failures and end of stream.
fn picture_ready(received: Result<(), ffmpeg_next::Error>) -> Result<bool, ffmpeg_next::Error> {
    match received {
        Ok(()) => Ok(true),
        Err(ffmpeg_next::Error::Other { errno }) if errno == ffmpeg_next::util::error::EAGAIN => {
            Ok(false)
        }
        Err(e) => Err(e),
    }
}

fn extract_rgb_pixels(rgb_frame: &Video, width: u32, height: u32) -> Vec<u8> {
    let stride = rgb_frame.stride(0);
    let data = rgb_frame.data(0);
    let w = width as usize;
    let h = height as usize;

    let mut pixels = Vec::with_capacity(w * h * 3);
    for row in 0..h {
        let row_start = row * stride;
        pixels.extend_from_slice(&data[row_start..row_start + w * 3]);
    }
    pixels
}

impl VideoSource for FfmpegCamera {
    fn open(&mut self, device_id: u32) -> Result<(), Box<dyn std::error::Error>> {
        ffmpeg_next::init()?;
        ffmpeg_next::device::register_all();

        let (demuxer, url) = capture_device(device_id);
        let format = ffmpeg_next::device::input::video()
            .find(|f| f.name() == demuxer)
            .ok_or_else(|| format!("capture backend '{demuxer}' is not available"))?;

        let ictx = ffmpeg_next::format::open_with(&url, &format, ffmpeg_next::Dictionary::new())?
            .input();

        let stream = ictx
            .streams()
            .best(ffmpeg_next::media::Type::Video)
            .ok_or("No video stream found")?;
        let video_stream_index = stream.index();
        let codec_ctx = ffmpeg_next::codec::context::Context::from_parameters(stream.parameters())?;
        let decoder = codec_ctx.decoder().video()?;

        log::info!(
            "Opened {url} via {demuxer}: {}x{}",
            decoder.width(),
            decoder.height()
        );

        self.video_stream_index = video_stream_index;
        self.decoder = Some(decoder);
        self.input_ctx = Some(ictx);
        self.scaler = None;
        self.device_id = device_id;
        self.frame_index = 0;
        Ok(())
    }

    fn read_next(&mut self, frame: &mut Frame) -> Result<(), Box<dyn std::error::Error>> {
        let (Some(ictx), Some(decoder)) = (self.input_ctx.as_mut(), self.decoder.as_mut()) else {
            return Err("camera is not open".into());
        };

        let Some((stream, packet)) = ictx.packets().next() else {
            return Err(format!("device {} stopped delivering frames", self.device_id).into());
        };
        if stream.index() != self.video_stream_index {
            frame.clear();
            return Ok(());
        }

        decoder.send_packet(&packet)?;
        let mut decoded = Video::empty();
        if !picture_ready(decoder.receive_frame(&mut decoded))? {
            frame.clear();
            return Ok(());
        }

        let (width, height) = (decoded.width(), decoded.height());
        let stale = self
            .scaler
            .as_ref()
            .map_or(true, |s| s.input().width != width || s.input().height != height);
        if stale {
            self.scaler = Some(scaling::Context::get(
                decoded.format(),
                width,
                height,
                ffmpeg_next::format::Pixel::RGB24,
                width,
                height,
                scaling::Flags::BILINEAR,
            )?);
        }
        let scaler = self.scaler.as_mut().ok_or("scaler missing")?;

        let mut rgb_frame = Video::empty();
        scaler.run(&decoded, &mut rgb_frame)?;
        let pixels = extract_rgb_pixels(&rgb_frame, width, height);
        frame.fill_from(&pixels, width, height, PixelFormat::Rgb8, self.frame_index);
        self.frame_index += 1;
        Ok(())
    }

    fn close(&mut self) {
        self.scaler = None;
        self.decoder = None;
        self.input_ctx = None;
    }
}
