use std::path::{Path, PathBuf};
use std::process;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};

use facecam_core::detection::domain::face_detector::FaceDetector;
use facecam_core::detection::domain::region_selector::CropPolicy;
use facecam_core::detection::infrastructure::onnx_blazeface_detector::{
    OnnxBlazefaceDetector, DEFAULT_CONFIDENCE,
};
use facecam_core::display::domain::display_sink::DisplaySink;
use facecam_core::pipeline::capture_loop_use_case::{CaptureLoopUseCase, LoopConfig};
use facecam_core::pipeline::extract_faces_use_case::ExtractFacesUseCase;
use facecam_core::pipeline::loop_logger::SummaryLoopLogger;
use facecam_core::pipeline::process_image_use_case::{ImageOp, ProcessImageUseCase};
use facecam_core::shared::constants::{
    DEFAULT_CASCADE_MODEL, DEFAULT_DEVICE_ID, DEFAULT_KEY_WAIT_MS, DEFAULT_WINDOW_TITLE,
    IMAGE_EXTENSIONS,
};
use facecam_core::shared::region::Region;
use facecam_core::video::domain::video_source::VideoSource;
use facecam_core::video::infrastructure::ffmpeg_camera::FfmpegCamera;

/// Live camera face detection and simple image edits.
#[derive(Parser)]
#[command(name = "facecam")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Show the camera feed, cropped to a detected face, until a key is pressed.
    Live(LiveArgs),
    /// Crop, resize or flip a single image file.
    Image(ImageArgs),
    /// Save every face found in an image as its own file.
    Faces(FacesArgs),
}

#[derive(Args)]
struct LiveArgs {
    /// Camera index.
    #[arg(long, default_value_t = DEFAULT_DEVICE_ID)]
    device: u32,

    /// Detector model: a Haar cascade (.xml) or a BlazeFace network (.onnx).
    #[arg(long, default_value = DEFAULT_CASCADE_MODEL)]
    model: PathBuf,

    /// Window title.
    #[arg(long, default_value = DEFAULT_WINDOW_TITLE)]
    title: String,

    /// Which detection to crop to: off, first or largest.
    #[arg(long, default_value = "first")]
    crop: String,

    /// Outline every detected face.
    #[arg(long)]
    annotate: bool,

    /// Capture backend: ffmpeg or opencv.
    #[arg(long)]
    camera: Option<String>,

    /// Milliseconds to wait for a key press after each frame.
    #[arg(long, default_value_t = DEFAULT_KEY_WAIT_MS)]
    key_wait_ms: u64,

    /// Face detection confidence threshold (0.0-1.0, ONNX models only).
    #[arg(long, default_value_t = DEFAULT_CONFIDENCE)]
    confidence: f64,
}

#[derive(Args)]
struct ImageArgs {
    /// Input image file.
    input: PathBuf,

    /// Output image file. The extension picks the encoding (JPEG if unknown).
    output: PathBuf,

    /// Crop rectangle as left,top,right,bottom.
    #[arg(long)]
    crop: Option<String>,

    /// Target size as WIDTHxHEIGHT.
    #[arg(long)]
    resize: Option<String>,

    /// Mirror top-to-bottom.
    #[arg(long)]
    flip_vertical: bool,

    /// Mirror left-to-right.
    #[arg(long)]
    flip_horizontal: bool,
}

#[derive(Args)]
struct FacesArgs {
    /// Input image file.
    input: PathBuf,

    /// Directory to write face_<n> crops into.
    output_dir: PathBuf,

    /// Detector model: a Haar cascade (.xml) or a BlazeFace network (.onnx).
    #[arg(long, default_value = DEFAULT_CASCADE_MODEL)]
    model: PathBuf,

    /// Face detection confidence threshold (0.0-1.0, ONNX models only).
    #[arg(long, default_value_t = DEFAULT_CONFIDENCE)]
    confidence: f64,
}

fn main() {
    env_logger::init();

    if let Err(e) = run() {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    match cli.command {
        Command::Live(args) => run_live(args),
        Command::Image(args) => run_image(args),
        Command::Faces(args) => run_faces(args),
    }
}

fn run_live(args: LiveArgs) -> Result<(), Box<dyn std::error::Error>> {
    validate_confidence(args.confidence)?;
    let crop_policy: CropPolicy = args.crop.parse()?;
    let camera = args.camera.as_deref().unwrap_or(default_camera());

    let source = build_camera(camera)?;
    let detector = build_detector(&args.model, args.confidence)?;
    let display = build_display()?;

    let config = LoopConfig {
        device_id: args.device,
        model_path: args.model,
        window_title: args.title,
        crop_policy,
        annotate: args.annotate,
        key_wait: Duration::from_millis(args.key_wait_ms),
    };

    let mut use_case = CaptureLoopUseCase::new(
        source,
        detector,
        display,
        config,
        Some(Box::new(SummaryLoopLogger::default())),
    );
    let summary = use_case.execute()?;
    log::info!(
        "Stopped after {} frames ({} faces, key {:?})",
        summary.frames_rendered,
        summary.faces_detected,
        summary.exit_key
    );
    Ok(())
}

fn run_image(args: ImageArgs) -> Result<(), Box<dyn std::error::Error>> {
    validate_input(&args.input)?;
    let ops = image_ops(&args)?;
    let (width, height) = ProcessImageUseCase::new(ops).execute(&args.input, &args.output)?;
    log::info!(
        "Output written to {} ({width}x{height})",
        args.output.display()
    );
    Ok(())
}

fn run_faces(args: FacesArgs) -> Result<(), Box<dyn std::error::Error>> {
    validate_input(&args.input)?;
    validate_confidence(args.confidence)?;
    let detector = build_detector(&args.model, args.confidence)?;

    let mut use_case = ExtractFacesUseCase::new(detector);
    let written = use_case.execute(&args.input, &args.model, &args.output_dir)?;
    log::info!(
        "Saved {} face crops to {}",
        written.len(),
        args.output_dir.display()
    );
    Ok(())
}

/// Edits in the fixed order crop → resize → vertical flip → horizontal flip.
fn image_ops(args: &ImageArgs) -> Result<Vec<ImageOp>, Box<dyn std::error::Error>> {
    let mut ops = Vec::new();
    if let Some(crop) = &args.crop {
        ops.push(ImageOp::Crop(parse_corners(crop)?));
    }
    if let Some(size) = &args.resize {
        let (width, height) = parse_size(size)?;
        ops.push(ImageOp::Resize { width, height });
    }
    if args.flip_vertical {
        ops.push(ImageOp::FlipVertical);
    }
    if args.flip_horizontal {
        ops.push(ImageOp::FlipHorizontal);
    }
    Ok(ops)
}

fn build_detector(
    model: &Path,
    confidence: f64,
) -> Result<Box<dyn FaceDetector>, Box<dyn std::error::Error>> {
    let ext = model
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "onnx" => Ok(Box::new(OnnxBlazefaceDetector::new(confidence))),
        "xml" => cascade_detector(),
        _ => Err(format!(
            "Model must be a cascade (.xml) or an ONNX network (.onnx), got '{}'",
            model.display()
        )
        .into()),
    }
}

#[cfg(feature = "opencv")]
fn cascade_detector() -> Result<Box<dyn FaceDetector>, Box<dyn std::error::Error>> {
    use facecam_core::detection::infrastructure::cascade_detector::CascadeDetector;
    Ok(Box::new(CascadeDetector::new()))
}

#[cfg(not(feature = "opencv"))]
fn cascade_detector() -> Result<Box<dyn FaceDetector>, Box<dyn std::error::Error>> {
    Err("Cascade models need a build with the 'opencv' feature; use an .onnx model".into())
}

fn default_camera() -> &'static str {
    if cfg!(feature = "opencv") {
        "opencv"
    } else {
        "ffmpeg"
    }
}

fn build_camera(camera: &str) -> Result<Box<dyn VideoSource>, Box<dyn std::error::Error>> {
    match camera {
        "ffmpeg" => Ok(Box::new(FfmpegCamera::new())),
        "opencv" => opencv_camera(),
        other => Err(format!("Camera must be 'ffmpeg' or 'opencv', got '{other}'").into()),
    }
}

#[cfg(feature = "opencv")]
fn opencv_camera() -> Result<Box<dyn VideoSource>, Box<dyn std::error::Error>> {
    use facecam_core::video::infrastructure::opencv_camera::OpencvCamera;
    Ok(Box::new(OpencvCamera::new()))
}

#[cfg(not(feature = "opencv"))]
fn opencv_camera() -> Result<Box<dyn VideoSource>, Box<dyn std::error::Error>> {
    Err("The opencv camera needs a build with the 'opencv' feature".into())
}

#[cfg(feature = "opencv")]
fn build_display() -> Result<Box<dyn DisplaySink>, Box<dyn std::error::Error>> {
    use facecam_core::display::infrastructure::highgui_window::HighguiWindow;
    Ok(Box::new(HighguiWindow::new()))
}

#[cfg(not(feature = "opencv"))]
fn build_display() -> Result<Box<dyn DisplaySink>, Box<dyn std::error::Error>> {
    Err("The live window needs a build with the 'opencv' feature".into())
}

fn validate_input(input: &Path) -> Result<(), Box<dyn std::error::Error>> {
    if !input.exists() {
        return Err(format!("Input file not found: {}", input.display()).into());
    }
    if !is_image(input) {
        log::warn!(
            "{} has no known image extension; decoding by content",
            input.display()
        );
    }
    Ok(())
}

fn validate_confidence(confidence: f64) -> Result<(), Box<dyn std::error::Error>> {
    if !(0.0..=1.0).contains(&confidence) {
        return Err(format!("Confidence must be between 0.0 and 1.0, got {confidence}").into());
    }
    Ok(())
}

fn is_image(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| IMAGE_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
        .unwrap_or(false)
}

/// Parses `left,top,right,bottom`.
fn parse_corners(s: &str) -> Result<Region, Box<dyn std::error::Error>> {
    let parts = s
        .split(',')
        .map(|p| p.trim().parse::<i32>())
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| format!("Crop must be left,top,right,bottom, got '{s}': {e}"))?;
    let [left, top, right, bottom] = parts[..] else {
        return Err(format!("Crop must be left,top,right,bottom, got '{s}'").into());
    };
    Ok(Region::from_corners(left, top, right, bottom))
}

/// Parses `WIDTHxHEIGHT`.
fn parse_size(s: &str) -> Result<(u32, u32), Box<dyn std::error::Error>> {
    let (w, h) = s
        .split_once(|c| c == 'x' || c == 'X')
        .ok_or_else(|| format!("Size must be WIDTHxHEIGHT, got '{s}'"))?;
    let width = w.trim().parse::<u32>()?;
    let height = h.trim().parse::<u32>()?;
    if width == 0 || height == 0 {
        return Err(format!("Size must be non-zero, got '{s}'").into());
    }
    Ok((width, height))
}
