use std::time::Duration;

use base64::Engine;
use serde::{Deserialize, Serialize};

use crate::reporting::domain::session_reporter::{FeatureBundle, ReportAck, ReportError, SessionReporter};
use crate::shared::constants::{DEFAULT_JPEG_QUALITY, DEFAULT_REPORT_INTERVAL_MS, DEFAULT_REPORT_TIMEOUT_MS};
use crate::shared::frame::Frame;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReporterConfig {
    pub endpoint: String,
    /// Opaque identifier the logging service files reports under.
    pub student_id: String,
    /// Sent as both `apikey` and bearer token when set.
    pub api_key: Option<String>,
    pub interval_ms: u64,
    pub timeout_ms: u64,
    pub jpeg_quality: u8,
}

impl Default for ReporterConfig {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            student_id: String::new(),
            api_key: None,
            interval_ms: DEFAULT_REPORT_INTERVAL_MS,
            timeout_ms: DEFAULT_REPORT_TIMEOUT_MS,
            jpeg_quality: DEFAULT_JPEG_QUALITY,
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ReportRequest<'a> {
    student_id: &'a str,
    frame_data: String,
    detection_data: &'a FeatureBundle,
}

/// Posts feature bundles with a JPEG of the matching frame as JSON.
///
/// The logging service rejects reports without `frameData`, so a snapshot
/// with no frame fails locally instead of being sent.
pub struct HttpSessionReporter {
    client: reqwest::blocking::Client,
    endpoint: String,
    student_id: String,
    api_key: Option<String>,
    jpeg_quality: u8,
}

impl HttpSessionReporter {
    pub fn new(config: &ReporterConfig) -> Result<Self, ReportError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .map_err(|e| ReportError::Transport(e.to_string()))?;
        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
            student_id: config.student_id.clone(),
            api_key: config.api_key.clone(),
            jpeg_quality: config.jpeg_quality.clamp(1, 100),
        })
    }
}

impl SessionReporter for HttpSessionReporter {
    fn submit(&mut self, frame: Option<&Frame>, bundle: &FeatureBundle) -> Result<ReportAck, ReportError> {
        let frame = frame.ok_or(ReportError::MissingFrame)?;
        let frame_data = jpeg_data_url(frame, self.jpeg_quality)?;
        let body = ReportRequest {
            student_id: &self.student_id,
            frame_data,
            detection_data: bundle,
        };

        let mut request = self.client.post(&self.endpoint).json(&body);
        if let Some(key) = &self.api_key {
            request = request.header("apikey", key).bearer_auth(key);
        }
        let response = request
            .send()
            .map_err(|e| ReportError::Transport(e.to_string()))?;

        let status = response.status();
        let text = response
            .text()
            .map_err(|e| ReportError::Transport(e.to_string()))?;
        if !status.is_success() {
            return Err(ReportError::Status {
                status: status.as_u16(),
                body: text,
            });
        }
        if text.trim().is_empty() {
            return Ok(ReportAck::default());
        }
        serde_json::from_str(&text).map_err(|e| ReportError::InvalidResponse(e.to_string()))
    }
}

/// Encodes an RGB frame as a `data:image/jpeg;base64,` URL.
pub fn jpeg_data_url(frame: &Frame, quality: u8) -> Result<String, ReportError> {
    if frame.channels() != 3 {
        return Err(ReportError::Encode(format!(
            "expected 3-channel RGB, got {} channels",
            frame.channels()
        )));
    }
    let mut jpeg = Vec::new();
    image::codecs::jpeg::JpegEncoder::new_with_quality(&mut jpeg, quality)
        .encode(
            frame.data(),
            frame.width(),
            frame.height(),
            image::ExtendedColorType::Rgb8,
        )
        .map_err(|e| ReportError::Encode(e.to_string()))?;
    Ok(format!(
        "data:image/jpeg;base64,{}",
        base64::engine::general_purpose::STANDARD.encode(&jpeg)
    ))
}
