use std::path::Path;
use std::time::Instant;

use ffmpeg_next::format::context::Input;
use ffmpeg_next::software::scaling;
use ffmpeg_next::util::frame::video::Video;

use crate::capture::domain::capture_device::{CaptureDevice, DeviceOpener};
use crate::shared::constants::{CAMERA_FPS, CAMERA_HEIGHT, CAMERA_WIDTH};
use crate::shared::frame::Frame;

/// Live camera capture (or file replay) through libavdevice / libavformat.
///
/// Device ids that name an existing file are replayed; anything else is
/// opened through the platform capture format at 640x480 @ 30 fps. Frames
/// are converted to RGB24.
pub struct FfmpegCamera {
    ictx: Option<Input>,
    decoder: ffmpeg_next::decoder::Video,
    scaler: scaling::Context,
    stream_index: usize,
    time_base: ffmpeg_next::Rational,
    width: u32,
    height: u32,
    frame_index: usize,
    first_pts: Option<i64>,
    started: Instant,
    flushing: bool,
}

// Safety: a camera is owned by one lease holder at a time behind a mutex;
// the raw ffmpeg pointers are never shared between threads.
unsafe impl Send for FfmpegCamera {}

impl FfmpegCamera {
    pub fn open(device: &str) -> Result<Self, Box<dyn std::error::Error>> {
        ffmpeg_next::init()?;

        let ictx = if Path::new(device).is_file() {
            ffmpeg_next::format::input(&device)?
        } else {
            open_capture_device(device)?
        };

        let stream = ictx
            .streams()
            .best(ffmpeg_next::media::Type::Video)
            .ok_or("No video stream found")?;
        let stream_index = stream.index();
        let time_base = stream.time_base();
        let codec_ctx = ffmpeg_next::codec::context::Context::from_parameters(stream.parameters())?;
        let decoder = codec_ctx.decoder().video()?;

        let width = decoder.width();
        let height = decoder.height();
        let scaler = scaling::Context::get(
            decoder.format(),
            width,
            height,
            ffmpeg_next::format::Pixel::RGB24,
            width,
            height,
            scaling::Flags::BILINEAR,
        )?;

        log::debug!("Capture '{device}' opened at {width}x{height}");

        Ok(Self {
            ictx: Some(ictx),
            decoder,
            scaler,
            stream_index,
            time_base,
            width,
            height,
            frame_index: 0,
            first_pts: None,
            started: Instant::now(),
            flushing: false,
        })
    }

    fn try_receive(&mut self) -> Result<Option<Frame>, Box<dyn std::error::Error>> {
        let mut decoded = Video::empty();
        if self.decoder.receive_frame(&mut decoded).is_err() {
            return Ok(None);
        }
        let mut rgb = Video::empty();
        self.scaler.run(&decoded, &mut rgb)?;

        let pixels = extract_rgb_pixels(&rgb, self.width, self.height);
        let timestamp_ms = self.timestamp_ms(decoded.timestamp());
        let frame = Frame::new(pixels, self.width, self.height, 3, self.frame_index, timestamp_ms);
        self.frame_index += 1;
        Ok(Some(frame))
    }

    /// Milliseconds since the first frame, from stream PTS when present.
    fn timestamp_ms(&mut self, pts: Option<i64>) -> u64 {
        let den = self.time_base.denominator();
        match pts {
            Some(pts) if den != 0 => {
                let first = *self.first_pts.get_or_insert(pts);
                let ticks = pts.saturating_sub(first).max(0) as f64;
                (ticks * f64::from(self.time_base.numerator()) * 1000.0 / f64::from(den)) as u64
            }
            _ => self.started.elapsed().as_millis() as u64,
        }
    }
}

impl CaptureDevice for FfmpegCamera {
    fn read_frame(&mut self) -> Result<Option<Frame>, Box<dyn std::error::Error>> {
        loop {
            if self.ictx.is_none() {
                return Ok(None);
            }
            if let Some(frame) = self.try_receive()? {
                return Ok(Some(frame));
            }
            if self.flushing {
                self.close();
                return Ok(None);
            }

            let next = self.ictx.as_mut().and_then(|ictx| {
                ictx.packets()
                    .next()
                    .map(|(stream, packet)| (stream.index(), packet))
            });
            match next {
                Some((index, packet)) => {
                    if index != self.stream_index {
                        continue;
                    }
                    if let Err(e) = self.decoder.send_packet(&packet) {
                        log::debug!("Dropping undecodable packet: {e}");
                    }
                }
                None => {
                    let _ = self.decoder.send_eof();
                    self.flushing = true;
                }
            }
        }
    }

    fn close(&mut self) {
        if self.ictx.take().is_some() {
            log::debug!("Capture stopped after {} frames", self.frame_index);
        }
    }
}

/// Opens real capture hardware by id.
#[derive(Clone, Copy, Debug, Default)]
pub struct FfmpegDeviceOpener;

impl DeviceOpener for FfmpegDeviceOpener {
    fn open(&self, device: &str) -> Result<Box<dyn CaptureDevice>, Box<dyn std::error::Error>> {
        Ok(Box::new(FfmpegCamera::open(device)?))
    }
}

fn open_capture_device(device: &str) -> Result<Input, Box<dyn std::error::Error>> {
    ffmpeg_next::device::register_all();

    let format_name = platform_input_format();
    let format = ffmpeg_next::device::input::video()
        .find(|f| f.name() == format_name)
        .ok_or_else(|| format!("capture input format '{format_name}' is not available"))?;

    let mut options = ffmpeg_next::Dictionary::new();
    options.set("video_size", &format!("{CAMERA_WIDTH}x{CAMERA_HEIGHT}"));
    options.set("framerate", &CAMERA_FPS.to_string());

    let url = device_url(device);
    let ctx = ffmpeg_next::format::open_with(
        &url,
        &ffmpeg_next::format::format::Format::Input(format),
        options,
    )?;
    Ok(ctx.input())
}

fn platform_input_format() -> &'static str {
    if cfg!(target_os = "macos") {
        "avfoundation"
    } else if cfg!(target_os = "windows") {
        "dshow"
    } else {
        "v4l2"
    }
}

/// Maps a bare camera index to the platform's device URL.
fn device_url(device: &str) -> String {
    let is_index = !device.is_empty() && device.chars().all(|c| c.is_ascii_digit());
    if cfg!(target_os = "macos") {
        if is_index {
            format!("{device}:none")
        } else {
            device.to_string()
        }
    } else if cfg!(target_os = "windows") {
        if device.starts_with("video=") {
            device.to_string()
        } else {
            format!("video={device}")
        }
    } else if is_index {
        format!("/dev/video{device}")
    } else {
        device.to_string()
    }
}

/// Copies the visible rows of an RGB24 frame, dropping any stride padding.
fn extract_rgb_pixels(rgb: &Video, width: u32, height: u32) -> Vec<u8> {
    let stride = rgb.stride(0);
    let data = rgb.data(0);
    let row_bytes = width as usize * 3;

    let mut pixels = Vec::with_capacity(row_bytes * height as usize);
    for row in 0..height as usize {
        let start = row * stride;
        pixels.extend_from_slice(&data[start..start + row_bytes]);
    }
    pixels
}
