pub const FACE_LOCATOR_MODEL_NAME: &str = "blazeface_short_range.onnx";
pub const FACE_MESH_MODEL_NAME: &str = "face_mesh_478.onnx";

/// Requested capture resolution for local cameras.
pub const CAMERA_WIDTH: u32 = 640;
pub const CAMERA_HEIGHT: u32 = 480;
pub const CAMERA_FPS: u32 = 30;

/// EAR used when an eye's landmarks are missing or degenerate.
pub const DEFAULT_EYE_ASPECT_RATIO: f64 = 0.2;

/// Both eyes below this EAR count as closed.
pub const CLOSED_EYE_THRESHOLD: f64 = 0.15;
pub const BLINK_DEBOUNCE_MS: u64 = 200;
pub const SUSTAINED_CLOSURE_MS: u64 = 5_000;
pub const BLINK_RATE_WINDOW_MS: u64 = 60_000;

pub const POSITION_HISTORY_CAPACITY: usize = 30;
pub const ANGLE_HISTORY_CAPACITY: usize = 20;
pub const BLINK_HISTORY_CAPACITY: usize = 60;

pub const MIN_DIRECTION_CHANGES: usize = 4;
/// Angle steps smaller than this are treated as landmark noise.
pub const MIN_OSCILLATION_SWING_DEG: f64 = 5.0;
pub const SHAKE_MIN_MAGNITUDE_DEG: f64 = 50.0;
pub const NOD_MIN_MAGNITUDE_DEG: f64 = 30.0;

pub const DEFAULT_REPORT_INTERVAL_MS: u64 = 2_500;
pub const DEFAULT_REPORT_TIMEOUT_MS: u64 = 5_000;
pub const DEFAULT_JPEG_QUALITY: u8 = 70;
