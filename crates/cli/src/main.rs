use std::path::{Path, PathBuf};
use std::process;
use std::time::Duration;

use clap::Parser;

use attention_core::capture::domain::device_manager::DeviceManager;
use attention_core::capture::domain::frame_source_adapter::FrameSourceAdapter;
use attention_core::capture::infrastructure::ffmpeg_camera::FfmpegDeviceOpener;
use attention_core::detection::domain::landmark_extractor::LandmarkExtractor;
use attention_core::detection::domain::model_gate::ModelGate;
use attention_core::detection::infrastructure::onnx_face_locator::OnnxFaceLocator;
use attention_core::detection::infrastructure::onnx_face_mesh_extractor::OnnxFaceMeshExtractor;
use attention_core::pipeline::attention_session::AttentionSession;
use attention_core::pipeline::pipeline_logger::StdoutPipelineLogger;
use attention_core::pipeline::session_config::TrackerConfig;
use attention_core::reporting::domain::session_reporter::SessionReporter;
use attention_core::reporting::infrastructure::http_session_reporter::{
    HttpSessionReporter, ReporterConfig,
};
use attention_core::scoring::domain::attention_report::AttentionReport;
use attention_core::shared::constants::{FACE_LOCATOR_MODEL_NAME, FACE_MESH_MODEL_NAME};
use attention_core::shared::model_resolver::{self, ModelLocation};

/// Live attention scoring from a camera or video file.
#[derive(Parser)]
#[command(name = "attention-track")]
struct Cli {
    /// Camera index, device path, or a video file to replay.
    #[arg(long)]
    device: Option<String>,

    /// Face locator ONNX model (resolved from the cache when omitted).
    #[arg(long)]
    face_model: Option<PathBuf>,

    /// Face mesh ONNX model (resolved from the cache when omitted).
    #[arg(long)]
    landmark_model: Option<PathBuf>,

    /// Base URL to download missing models from.
    #[arg(long)]
    model_url: Option<String>,

    /// JSON config file (defaults to the user config dir when present).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Face locator confidence threshold (0.0-1.0).
    #[arg(long, default_value = "0.5")]
    confidence: f64,

    /// Logging endpoint for periodic session reports.
    #[arg(long)]
    report_endpoint: Option<String>,

    /// Student identifier sent with each session report.
    #[arg(long)]
    student_id: Option<String>,

    /// API key for the logging endpoint.
    #[arg(long)]
    api_key: Option<String>,

    /// Milliseconds between session reports.
    #[arg(long)]
    report_interval_ms: Option<u64>,

    /// Trailing window for score smoothing (1 = off).
    #[arg(long)]
    smoothing_window: Option<usize>,

    /// Stop after this many scored frames.
    #[arg(long)]
    max_frames: Option<usize>,
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
    validate(&cli)?;

    let config = load_config(&cli)?;
    log::info!("Capturing from device '{}'", config.device);

    let gate = spawn_model_load(&cli);
    let manager = DeviceManager::new(Box::new(FfmpegDeviceOpener));
    let adapter = FrameSourceAdapter::new(
        manager,
        config.device.clone(),
        Duration::from_millis(config.frame_timeout_ms),
    );

    let mut session = AttentionSession::new(adapter, gate, &config)
        .with_logger(Box::new(StdoutPipelineLogger::default()));

    let stop = session.stop_handle();
    let max_frames = cli.max_frames;
    let mut emitted = 0usize;
    session = session.with_callback(Box::new(move |report: &AttentionReport| {
        print_report(report);
        emitted += 1;
        if max_frames.is_some_and(|max| emitted >= max) {
            stop.stop();
        }
    }));

    if let Some(reporter) = config.reporter.clone() {
        log::info!("Session reports go to {}", reporter.endpoint);
        let interval = Duration::from_millis(reporter.interval_ms);
        session = session.with_reporter(
            Box::new(move || {
                HttpSessionReporter::new(&reporter)
                    .map(|r| Box::new(r) as Box<dyn SessionReporter>)
            }),
            interval,
        );
    }

    session.start(None)?;
    let frames = session.run()?;
    session.stop();
    log::info!("Scored {frames} frames");
    Ok(())
}

fn print_report(report: &AttentionReport) {
    println!(
        "{:>8} ms  score {:>3}  face {:<5}  looking {}",
        report.timestamp_ms, report.score, report.face_detected, report.looking_at_screen
    );
}

fn load_config(cli: &Cli) -> Result<TrackerConfig, Box<dyn std::error::Error>> {
    let mut config = match &cli.config {
        Some(path) => TrackerConfig::load(path)?,
        None => match TrackerConfig::default_path().filter(|p| p.exists()) {
            Some(path) => {
                log::info!("Using config {}", path.display());
                TrackerConfig::load(&path)?
            }
            None => TrackerConfig::default(),
        },
    };

    if let Some(device) = &cli.device {
        config.device = device.clone();
    }
    if let Some(window) = cli.smoothing_window {
        config.scoring.smoothing_window = window;
    }
    if let Some(endpoint) = &cli.report_endpoint {
        let base = config.reporter.take().unwrap_or_default();
        config.reporter = Some(ReporterConfig {
            endpoint: endpoint.clone(),
            ..base
        });
    }
    check_reporter_flags(cli, config.reporter.is_some())?;
    if let Some(reporter) = config.reporter.as_mut() {
        if let Some(id) = &cli.student_id {
            reporter.student_id = id.clone();
        }
        if let Some(key) = &cli.api_key {
            reporter.api_key = Some(key.clone());
        }
        if let Some(ms) = cli.report_interval_ms {
            reporter.interval_ms = ms;
        }
    }

    config.validate()?;
    Ok(config)
}

/// Resolves both models and builds the extractor on a background thread.
fn spawn_model_load(cli: &Cli) -> ModelGate {
    let face_model = cli.face_model.clone();
    let landmark_model = cli.landmark_model.clone();
    let base_url = cli.model_url.clone();
    let confidence = cli.confidence;

    ModelGate::spawn(move || {
        let face_path = model_path(face_model, FACE_LOCATOR_MODEL_NAME, base_url.as_deref())?;
        let mesh_path = model_path(landmark_model, FACE_MESH_MODEL_NAME, base_url.as_deref())?;
        let locator = OnnxFaceLocator::new(&face_path, confidence).map_err(|e| e.to_string())?;
        let extractor =
            OnnxFaceMeshExtractor::new(locator, &mesh_path).map_err(|e| e.to_string())?;
        log::info!("Landmark model ready");
        Ok(Box::new(extractor) as Box<dyn LandmarkExtractor>)
    })
}

fn model_path(
    explicit: Option<PathBuf>,
    name: &str,
    base_url: Option<&str>,
) -> Result<PathBuf, Box<dyn std::error::Error + Send + Sync>> {
    if let Some(path) = explicit {
        return Ok(path);
    }
    log::info!("Resolving model: {name}");
    let url = base_url.map(|base| format!("{}/{name}", base.trim_end_matches('/')));
    let location = ModelLocation::cached(name)?.with_url(url.as_deref());
    let path = model_resolver::resolve(&location, Some(Box::new(download_progress)))?;
    Ok(path)
}

fn validate(cli: &Cli) -> Result<(), Box<dyn std::error::Error>> {
    if !(0.0..=1.0).contains(&cli.confidence) {
        return Err(format!(
            "Confidence must be between 0.0 and 1.0, got {}",
            cli.confidence
        )
        .into());
    }
    for path in [&cli.face_model, &cli.landmark_model].into_iter().flatten() {
        ensure_file(path)?;
    }
    if let Some(path) = &cli.config {
        ensure_file(path)?;
    }
    if cli.max_frames == Some(0) {
        return Err("Max frames must be at least 1".into());
    }
    if cli.smoothing_window == Some(0) {
        return Err("Smoothing window must be at least 1".into());
    }
    if cli.report_interval_ms == Some(0) {
        return Err("Report interval must be positive".into());
    }
    Ok(())
}

/// Reporter flags only tune an endpoint; without one they would be dropped.
fn check_reporter_flags(cli: &Cli, has_reporter: bool) -> Result<(), Box<dyn std::error::Error>> {
    if has_reporter {
        return Ok(());
    }
    let orphaned: Vec<&str> = [
        ("--student-id", cli.student_id.is_some()),
        ("--api-key", cli.api_key.is_some()),
        ("--report-interval-ms", cli.report_interval_ms.is_some()),
    ]
    .into_iter()
    .filter_map(|(flag, set)| set.then_some(flag))
    .collect();
    if orphaned.is_empty() {
        Ok(())
    } else {
        Err(format!(
            "{} requires --report-endpoint or a reporter in the config file",
            orphaned.join(", ")
        )
        .into())
    }
}

fn ensure_file(path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    if path.is_file() {
        Ok(())
    } else {
        Err(format!("File not found: {}", path.display()).into())
    }
}

fn download_progress(downloaded: u64, total: u64) {
    if total > 0 {
        let pct = (downloaded as f64 / total as f64 * 100.0) as u32;
        eprint!("\rDownloading model... {pct}%");
    } else {
        eprint!("\rDownloading model... {downloaded} bytes");
    }
}
