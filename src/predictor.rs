use std::cmp::Ordering;

use ndarray::prelude::*;
use num_traits::{Float, NumCast};
use tracing::debug;

use crate::errors::{error_chain, ClassifyError, Result};
use crate::tensor::Tensor;
use crate::traits::{TensorLayout, WasteClassificationModel};

/// Outcome of one forward pass.
#[derive(Debug, Clone, PartialEq)]
pub struct Prediction {
    pub class_index: usize,
    /// `round(score * 100)`, clamped to `0..=100`.
    pub confidence: u8,
    pub probabilities: Vec<f32>,
}

/// Index of the largest value. Ties go to the first occurrence; NaN never wins.
pub fn argmax<T: Float>(values: &[T]) -> Option<usize> {
    let mut best: Option<(usize, T)> = None;
    for (i, &value) in values.iter().enumerate() {
        if value.is_nan() {
            continue;
        }
        match best {
            Some((_, current)) if value <= current => {}
            _ => best = Some((i, value)),
        }
    }
    best.map(|(i, _)| i)
}

/// Converts a raw score to an integer percentage.
///
/// Scores are not guaranteed to be probabilities, so out-of-range values clamp.
pub fn confidence_percent<T: Float>(score: T) -> u8 {
    let hundred = <T as NumCast>::from(100.0).unwrap_or_else(T::one);
    let percent = (score * hundred).round();
    if percent.is_nan() {
        return 0;
    }
    percent.max(T::zero()).min(hundred).to_u8().unwrap_or(0)
}

/// The `k` highest scores, best first. Equal scores keep their index order.
pub fn top_k(scores: &[f32], k: usize) -> Vec<(usize, f32)> {
    let mut ranked: Vec<(usize, f32)> = scores
        .iter()
        .copied()
        .enumerate()
        .filter(|(_, score)| !score.is_nan())
        .collect();
    ranked.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));
    ranked.truncate(k);
    ranked
}

/// Runs one forward pass and picks the winning class.
///
/// Takes ownership of the input tensor so it is released on every exit path.
pub fn predict(model: &dyn WasteClassificationModel, tensor: Tensor) -> Result<Prediction> {
    let ledger = tensor.ledger().clone();
    let view = match model.input_layout() {
        TensorLayout::Nhwc => tensor.view(),
        TensorLayout::Nchw => tensor.view().permuted_axes([0, 3, 1, 2]),
    };

    let scores = model
        .predict(view)
        .map_err(|e| ClassifyError::prediction(error_chain(&e)))?;
    drop(tensor);

    if scores.is_empty() {
        return Err(ClassifyError::prediction("model returned an empty output"));
    }
    let len = scores.len();
    let output: Tensor<Ix2> = Tensor::new(
        Array2::from_shape_vec((1, len), scores)
            .map_err(|e| ClassifyError::prediction(error_chain(&e)))?,
        &ledger,
    );

    let probabilities = output.row(0).to_vec();
    let class_index = argmax(&probabilities)
        .ok_or_else(|| ClassifyError::prediction("model output contains no finite scores"))?;
    let confidence = confidence_percent(probabilities[class_index]);

    debug!(class_index, confidence, ?probabilities, "forward pass done");
    Ok(Prediction {
        class_index,
        confidence,
        probabilities,
    })
}
