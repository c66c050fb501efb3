use std::path::PathBuf;
use thiserror::Error;

type BoxedSource = Box<dyn std::error::Error + Send + Sync>;

/// Structured error types for the waste classification pipeline.
///
/// Only [`ClassifyError::Input`] is meant to reach an end user as a real error.
/// Load and inference failures are absorbed by the loader and the classifier,
/// which degrade to fallback answers instead.
#[derive(Error, Debug)]
pub enum ClassifyError {
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Filesystem error: {operation} failed for {path:?}")]
    FileSystem {
        path: PathBuf,
        operation: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid input: {0}")]
    Input(#[from] InputError),

    #[error("Model error: {operation} failed")]
    Model {
        operation: String,
        #[source]
        source: BoxedSource,
    },

    #[error("prediction failed: {reason}")]
    Prediction { reason: String },

    #[error("Timed out waiting for model to load after {attempts} attempts")]
    LoadTimeout { attempts: u32 },
}

/// Rejections of a user-supplied image, raised before any model work starts.
#[derive(Error, Debug)]
pub enum InputError {
    #[error("image payload is empty")]
    Empty,

    #[error("unsupported MIME type `{mime}`, expected image/*")]
    UnsupportedMimeType { mime: String },

    #[error("file is {size} bytes, the limit is {limit} bytes")]
    TooLarge { size: usize, limit: usize },

    #[error("malformed data URL: {reason}")]
    MalformedDataUrl { reason: String },

    #[error("image could not be decoded")]
    Undecodable {
        #[source]
        source: image::ImageError,
    },
}

pub type Result<T> = std::result::Result<T, ClassifyError>;

impl ClassifyError {
    /// True for errors caused by the caller's input rather than by the pipeline.
    pub const fn is_input_error(&self) -> bool {
        matches!(self, Self::Input(_))
    }

    pub(crate) fn model<E>(operation: impl Into<String>, source: E) -> Self
    where
        E: Into<BoxedSource>,
    {
        Self::Model {
            operation: operation.into(),
            source: source.into(),
        }
    }

    pub(crate) fn prediction(reason: impl std::fmt::Display) -> Self {
        Self::Prediction {
            reason: reason.to_string(),
        }
    }
}

/// Flattens an error and its sources into a single line.
pub fn error_chain(err: &(dyn std::error::Error + 'static)) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}

/// Convert anyhow errors to configuration errors.
impl From<anyhow::Error> for ClassifyError {
    fn from(err: anyhow::Error) -> Self {
        Self::Configuration {
            message: err.to_string(),
        }
    }
}

/// Convert I/O errors to filesystem errors.
///
/// Code that knows the path and operation should build
/// [`ClassifyError::FileSystem`] directly instead.
impl From<std::io::Error> for ClassifyError {
    fn from(err: std::io::Error) -> Self {
        Self::FileSystem {
            path: PathBuf::from("unknown"),
            operation: "unknown".to_string(),
            source: err,
        }
    }
}

impl From<ort::Error> for ClassifyError {
    fn from(err: ort::Error) -> Self {
        Self::model("ort operation", err)
    }
}

/// Shape errors come out of tensor plumbing around inference, so they are
/// reported as model errors.
impl From<ndarray::ShapeError> for ClassifyError {
    fn from(err: ndarray::ShapeError) -> Self {
        Self::model("tensor shape conversion", err)
    }
}
