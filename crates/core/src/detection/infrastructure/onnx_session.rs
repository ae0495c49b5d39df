//! Session loading and image-to-tensor conversion shared by the ONNX models.

use std::path::Path;

use crate::shared::frame::Frame;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TensorLayout {
    Nchw,
    Nhwc,
}

/// Square input expected by a model.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct InputSpec {
    pub layout: TensorLayout,
    pub size: usize,
}

/// Return the preferred ONNX execution providers for the current platform.
///
/// Falls back to CPU if the platform-specific provider is unavailable.
pub fn preferred_execution_providers() -> Vec<ort::execution_providers::ExecutionProviderDispatch> {
    #[cfg(target_os = "macos")]
    {
        vec![ort::execution_providers::CoreMLExecutionProvider::default().build()]
    }
    #[cfg(target_os = "windows")]
    {
        vec![ort::execution_providers::DirectMLExecutionProvider::default().build()]
    }
    #[cfg(not(any(target_os = "macos", target_os = "windows")))]
    {
        vec![]
    }
}

pub fn load_session(model_path: &Path) -> Result<ort::session::Session, Box<dyn std::error::Error>> {
    let session = ort::session::Session::builder()?
        .with_execution_providers(preferred_execution_providers())?
        .commit_from_file(model_path)?;
    log::debug!("Loaded ONNX model {}", model_path.display());
    Ok(session)
}

/// Reads layout and resolution from the first input, or assumes NCHW at `default_size`.
pub fn input_spec(session: &ort::session::Session, default_size: usize) -> InputSpec {
    session
        .inputs()
        .first()
        .and_then(|input| {
            if let ort::value::ValueType::Tensor { ref shape, .. } = input.dtype() {
                spec_from_shape(shape, default_size)
            } else {
                None
            }
        })
        .unwrap_or(InputSpec {
            layout: TensorLayout::Nchw,
            size: default_size,
        })
}

fn spec_from_shape(shape: &[i64], default_size: usize) -> Option<InputSpec> {
    if shape.len() != 4 {
        return None;
    }
    let size_or_default = |d: i64| if d > 0 { d as usize } else { default_size };
    if shape[1] == 3 {
        Some(InputSpec {
            layout: TensorLayout::Nchw,
            size: size_or_default(shape[2]),
        })
    } else if shape[3] == 3 {
        Some(InputSpec {
            layout: TensorLayout::Nhwc,
            size: size_or_default(shape[1]),
        })
    } else {
        None
    }
}

/// Samples the `[x1, y1, x2, y2]` region of `frame` into a square tensor with
/// values mapped linearly from 0..=255 to `range`. Pixels outside the frame
/// read as black.
pub fn crop_to_tensor(
    frame: &Frame,
    region: [f64; 4],
    spec: InputSpec,
    range: (f32, f32),
) -> ndarray::Array4<f32> {
    let src = frame.as_ndarray();
    let src_w = frame.width() as i64;
    let src_h = frame.height() as i64;
    let s = spec.size.max(1);
    let [x1, y1, x2, y2] = region;
    let step_x = (x2 - x1) / s as f64;
    let step_y = (y2 - y1) / s as f64;
    let (lo, hi) = range;
    let scale = (hi - lo) / 255.0;

    let mut tensor = match spec.layout {
        TensorLayout::Nchw => ndarray::Array4::<f32>::from_elem((1, 3, s, s), lo),
        TensorLayout::Nhwc => ndarray::Array4::<f32>::from_elem((1, s, s, 3), lo),
    };

    for y in 0..s {
        let sy = (y1 + (y as f64 + 0.5) * step_y).floor() as i64;
        if sy < 0 || sy >= src_h {
            continue;
        }
        for x in 0..s {
            let sx = (x1 + (x as f64 + 0.5) * step_x).floor() as i64;
            if sx < 0 || sx >= src_w {
                continue;
            }
            for c in 0..3 {
                let v = lo + src[[sy as usize, sx as usize, c]] as f32 * scale;
                match spec.layout {
                    TensorLayout::Nchw => tensor[[0, c, y, x]] = v,
                    TensorLayout::Nhwc => tensor[[0, y, x, c]] = v,
                }
            }
        }
    }

    tensor
}
