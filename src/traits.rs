use crate::errors::Result;
use ndarray::prelude::*;

/// Memory order of the image tensor a model expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TensorLayout {
    /// `[batch, height, width, channels]`, the layout Keras-exported graphs use.
    #[default]
    Nhwc,
    /// `[batch, channels, height, width]`
    Nchw,
}

/// Abstraction over waste classification models.
///
/// Implementations are shared across threads behind an `Arc`, so they must be
/// safe for concurrent `predict` calls.
pub trait WasteClassificationModel: Send + Sync {
    /// Side length of the square input image.
    fn input_size(&self) -> u32;

    /// Length of the score vector one forward pass produces.
    fn num_classes(&self) -> usize;

    fn input_layout(&self) -> TensorLayout {
        TensorLayout::Nhwc
    }

    /// Runs one forward pass over a `[1, H, W, 3]` (or NCHW) tensor and returns
    /// the raw class scores.
    fn predict(&self, tensor: ArrayView4<f32>) -> Result<Vec<f32>>;
}
