use crate::errors::{ClassifyError, Result};
use crate::taxonomy::WasteClass;
use crate::traits::{TensorLayout, WasteClassificationModel};
use ndarray::prelude::*;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Mock classification model for tests.
#[derive(Debug)]
pub struct MockClassificationModel {
    pub input_size: u32,
    scores: Vec<f32>,
    layout: TensorLayout,
    fail_with: Option<String>,
    calls: AtomicUsize,
}

impl MockClassificationModel {
    /// Mock that always predicts cardboard with 0.8.
    pub fn new(input_size: u32) -> Self {
        let mut scores = vec![0.02; WasteClass::COUNT];
        scores[WasteClass::Cardboard.index()] = 0.8;
        Self::with_scores(input_size, scores)
    }

    pub fn with_scores(input_size: u32, scores: Vec<f32>) -> Self {
        Self {
            input_size,
            scores,
            layout: TensorLayout::Nhwc,
            fail_with: None,
            calls: AtomicUsize::new(0),
        }
    }

    /// Mock whose forward pass always errors.
    pub fn failing(input_size: u32, message: impl Into<String>) -> Self {
        Self {
            fail_with: Some(message.into()),
            ..Self::new(input_size)
        }
    }

    pub fn with_layout(mut self, layout: TensorLayout) -> Self {
        self.layout = layout;
        self
    }

    /// Number of forward passes run so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl WasteClassificationModel for MockClassificationModel {
    fn input_size(&self) -> u32 {
        self.input_size
    }

    fn num_classes(&self) -> usize {
        self.scores.len()
    }

    fn input_layout(&self) -> TensorLayout {
        self.layout
    }

    fn predict(&self, tensor: ArrayView4<f32>) -> Result<Vec<f32>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(message) = &self.fail_with {
            return Err(ClassifyError::model("mock forward pass", message.clone()));
        }

        let size = self.input_size as usize;
        let expected = match self.layout {
            TensorLayout::Nhwc => [1, size, size, 3],
            TensorLayout::Nchw => [1, 3, size, size],
        };
        if tensor.shape() != &expected[..] {
            return Err(ClassifyError::model(
                "mock forward pass",
                format!("expected shape {expected:?}, got {:?}", tensor.shape()),
            ));
        }
        Ok(self.scores.clone())
    }
}
