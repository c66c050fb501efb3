use std::fmt;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::time::Duration;

use ndarray::prelude::*;
use ort::{
    execution_providers::{CUDAExecutionProvider, TensorRTExecutionProvider},
    session::{builder::GraphOptimizationLevel, Session},
    value::TensorRef,
};
use parking_lot::Mutex;
use tracing::{debug, info};
use url::Url;

use crate::{
    errors::{ClassifyError, Result},
    taxonomy::WasteClass,
    traits::{TensorLayout, WasteClassificationModel},
};

/// Input resolution used when the model leaves its spatial dims dynamic.
pub const DEFAULT_INPUT_SIZE: u32 = 224;

const MAX_MODEL_BYTES: u64 = 512 * 1024 * 1024;
const FETCH_TIMEOUT: Duration = Duration::from_secs(60);

/// Where the serialized model lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelSource {
    Remote(Url),
    Local(PathBuf),
}

impl ModelSource {
    /// Accepts `http(s)://` and `file://` URLs or a plain filesystem path.
    pub fn parse(location: &str) -> Result<Self> {
        match Url::parse(location) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => Ok(Self::Remote(url)),
            Ok(url) if url.scheme() == "file" => url
                .to_file_path()
                .map(Self::Local)
                .map_err(|()| ClassifyError::Configuration {
                    message: format!("invalid file URL: {location}"),
                }),
            _ if location.trim().is_empty() => Err(ClassifyError::Configuration {
                message: "model location is empty".to_string(),
            }),
            _ => Ok(Self::Local(PathBuf::from(location))),
        }
    }

    /// Downloads a remote model.
    pub fn fetch_bytes(url: &Url) -> Result<Vec<u8>> {
        let response = ureq::get(url.as_str())
            .timeout(FETCH_TIMEOUT)
            .call()
            .map_err(|e| ClassifyError::model(format!("model download: {url}"), e))?;

        let mut bytes = Vec::new();
        response
            .into_reader()
            .take(MAX_MODEL_BYTES)
            .read_to_end(&mut bytes)
            .map_err(|e| ClassifyError::model(format!("model download: {url}"), e))?;
        Ok(bytes)
    }
}

impl fmt::Display for ModelSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Remote(url) => write!(f, "{url}"),
            Self::Local(path) => write!(f, "{}", path.display()),
        }
    }
}

/// ONNX Runtime session settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RuntimeOptions {
    pub intra_threads: usize,
    /// GPU used by the TensorRT/CUDA providers when they are compiled in.
    pub device_id: i32,
}

impl Default for RuntimeOptions {
    fn default() -> Self {
        Self {
            intra_threads: 1,
            device_id: 0,
        }
    }
}

/// ONNX Runtime backed classifier.
pub struct OnnxModel {
    input_size: u32,
    num_classes: usize,
    layout: TensorLayout,
    input_name: String,
    output_name: String,
    session: Mutex<Session>,
}

impl OnnxModel {
    pub fn load(source: &ModelSource, options: RuntimeOptions) -> Result<Self> {
        info!(%source, ?options, "loading classification model");
        let builder = Session::builder()
            .map_err(|e| ClassifyError::model("session builder init", e))?
            .with_execution_providers([
                TensorRTExecutionProvider::default()
                    .with_device_id(options.device_id)
                    .build(),
                CUDAExecutionProvider::default()
                    .with_device_id(options.device_id)
                    .build(),
            ])
            .map_err(|e| ClassifyError::model("execution providers", e))?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(|e| ClassifyError::model("optimization level", e))?
            .with_intra_threads(options.intra_threads.max(1))
            .map_err(|e| ClassifyError::model("intra-op threads", e))?;

        let session = match source {
            ModelSource::Local(path) => builder
                .commit_from_file(path)
                .map_err(|e| ClassifyError::model(format!("model file load: {}", path.display()), e))?,
            ModelSource::Remote(url) => {
                let bytes = ModelSource::fetch_bytes(url)?;
                builder
                    .commit_from_memory(&bytes)
                    .map_err(|e| ClassifyError::model(format!("model parse: {url}"), e))?
            }
        };

        Self::from_session(session)
    }

    pub fn from_file(path: &Path, options: RuntimeOptions) -> Result<Self> {
        Self::load(&ModelSource::Local(path.to_path_buf()), options)
    }

    fn from_session(mut session: Session) -> Result<Self> {
        let input = session.inputs.first().ok_or_else(|| ClassifyError::Configuration {
            message: "model declares no inputs".to_string(),
        })?;
        let output = session.outputs.first().ok_or_else(|| ClassifyError::Configuration {
            message: "model declares no outputs".to_string(),
        })?;
        let input_name = input.name.clone();
        let output_name = output.name.clone();

        let dims: Vec<i64> = input
            .input_type
            .tensor_shape()
            .ok_or_else(|| ClassifyError::Configuration {
                message: format!("model input `{input_name}` is not a tensor"),
            })?
            .iter()
            .copied()
            .collect();
        let (layout, input_size) = input_geometry(&dims)?;

        // warm-up run also tells us the real output length
        let warmup = match layout {
            TensorLayout::Nhwc => {
                Array4::<f32>::zeros((1, input_size as usize, input_size as usize, 3))
            }
            TensorLayout::Nchw => {
                Array4::<f32>::zeros((1, 3, input_size as usize, input_size as usize))
            }
        };
        let num_classes = {
            let outputs = session.run(
                ort::inputs![input_name.as_str() => TensorRef::from_array_view(&warmup)?],
            )?;
            outputs[output_name.as_str()]
                .try_extract_array::<f32>()?
                .len()
        };

        debug!(?layout, input_size, num_classes, "model ready");
        Ok(Self {
            input_size,
            num_classes,
            layout,
            input_name,
            output_name,
            session: Mutex::new(session),
        })
    }
}

/// Works out layout and square resolution from a rank-4 image input shape.
fn input_geometry(dims: &[i64]) -> Result<(TensorLayout, u32)> {
    let side = |d: i64| if d > 0 { d as u32 } else { DEFAULT_INPUT_SIZE };
    match dims {
        [_, h, _, 3] => Ok((TensorLayout::Nhwc, side(*h))),
        [_, 3, h, _] => Ok((TensorLayout::Nchw, side(*h))),
        _ => Err(ClassifyError::Configuration {
            message: format!("unsupported model input shape {dims:?}, expected an RGB image tensor"),
        }),
    }
}

impl WasteClassificationModel for OnnxModel {
    fn input_size(&self) -> u32 {
        self.input_size
    }

    fn num_classes(&self) -> usize {
        self.num_classes
    }

    fn input_layout(&self) -> TensorLayout {
        self.layout
    }

    fn predict(&self, tensor: ArrayView4<f32>) -> Result<Vec<f32>> {
        let mut binding = self.session.lock();
        let outputs = binding.run(ort::inputs![
            self.input_name.as_str() => TensorRef::from_array_view(&tensor.as_standard_layout())?
        ])?;
        let scores = outputs[self.output_name.as_str()]
            .try_extract_array::<f32>()?
            .iter()
            .copied()
            .collect();
        Ok(scores)
    }
}

/// Stand-in used when the real model cannot be loaded.
///
/// Always answers with the same scores, leaning towards general waste.
#[derive(Debug, Clone, Copy, Default)]
pub struct FallbackModel;

impl FallbackModel {
    pub const TRASH_SCORE: f32 = 0.45;
    pub const OTHER_SCORE: f32 = 0.05;

    pub fn scores() -> Vec<f32> {
        let mut scores = vec![Self::OTHER_SCORE; WasteClass::COUNT];
        scores[WasteClass::Trash.index()] = Self::TRASH_SCORE;
        scores
    }
}

impl WasteClassificationModel for FallbackModel {
    fn input_size(&self) -> u32 {
        DEFAULT_INPUT_SIZE
    }

    fn num_classes(&self) -> usize {
        WasteClass::COUNT
    }

    fn predict(&self, _tensor: ArrayView4<f32>) -> Result<Vec<f32>> {
        Ok(Self::scores())
    }
}
