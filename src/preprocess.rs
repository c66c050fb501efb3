use std::sync::Arc;

use image::{imageops, imageops::FilterType, DynamicImage};
use ndarray::prelude::*;
use nshare::AsNdarray3;

use crate::errors::{ClassifyError, Result};
use crate::tensor::{Tensor, TensorLedger};

/// Turns a decoded image into a `[1, size, size, 3]` tensor with values in `[0, 1]`.
///
/// The image is stretched to the square input with nearest-neighbour sampling;
/// aspect ratio is not preserved and nothing is padded or cropped.
pub fn preprocess(image: &DynamicImage, size: u32, ledger: &Arc<TensorLedger>) -> Result<Tensor> {
    if size == 0 {
        return Err(ClassifyError::Configuration {
            message: "model input size must be positive".to_string(),
        });
    }

    let rgb = image.to_rgb8();
    let resized = imageops::resize(&rgb, size, size, FilterType::Nearest);

    // nshare yields (channel, height, width)
    let hwc = resized.as_ndarray3().permuted_axes([1, 2, 0]);
    let tensor = hwc
        .insert_axis(Axis(0))
        .mapv(|v| f32::from(v) / 255.0)
        .as_standard_layout()
        .into_owned();

    debug_assert_eq!(tensor.shape(), &[1, size as usize, size as usize, 3]);
    Ok(Tensor::new(tensor, ledger))
}
