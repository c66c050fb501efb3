use std::ops::Deref;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use ndarray::prelude::*;

/// Counts tensors allocated through the pipeline.
///
/// Every [`Tensor`] registers itself on creation and unregisters on drop, so
/// `live()` returning to zero after a classification means nothing leaked on
/// any exit path.
#[derive(Debug, Default)]
pub struct TensorLedger {
    live: AtomicUsize,
    total: AtomicUsize,
}

impl TensorLedger {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Tensors currently allocated.
    pub fn live(&self) -> usize {
        self.live.load(Ordering::Acquire)
    }

    /// Tensors allocated since the ledger was created.
    pub fn allocated_total(&self) -> usize {
        self.total.load(Ordering::Acquire)
    }

    fn acquire(&self) {
        self.live.fetch_add(1, Ordering::AcqRel);
        self.total.fetch_add(1, Ordering::AcqRel);
    }

    fn release(&self) {
        self.live.fetch_sub(1, Ordering::AcqRel);
    }
}

/// An owned tensor whose lifetime is tracked by a [`TensorLedger`].
///
/// Defaults to the 4-D image batch the preprocessor produces.
#[derive(Debug)]
pub struct Tensor<D: Dimension = Ix4> {
    data: Array<f32, D>,
    ledger: Arc<TensorLedger>,
}

impl<D: Dimension> Tensor<D> {
    pub fn new(data: Array<f32, D>, ledger: &Arc<TensorLedger>) -> Self {
        ledger.acquire();
        Self {
            data,
            ledger: Arc::clone(ledger),
        }
    }

    pub fn ledger(&self) -> &Arc<TensorLedger> {
        &self.ledger
    }
}

impl<D: Dimension> Deref for Tensor<D> {
    type Target = Array<f32, D>;

    fn deref(&self) -> &Self::Target {
        &self.data
    }
}

impl<D: Dimension> Drop for Tensor<D> {
    fn drop(&mut self) {
        self.ledger.release();
    }
}
