//! Loss functions.
//!
//! Losses here are regular Rust functions over output/target tensor
//! pairs, reducing to a scalar. They sit outside the module contract -
//! a training loop combines them with `Module::forward` and an external
//! gradient computation.
//!
//! # Available Loss Functions
//!
//! - [`mean_squared_error`]
//! - [`absolute_difference_error`]
//! - [`sigmoid_cross_entropy`] (numerically stable, from logits)
//! - [`binary_cross_entropy`] (from probabilities)

use crate::nn::module::{LayerError, LayerResult};
use crate::tensor::Tensor;

fn check_same_shape(name: &str, output: &Tensor, target: &Tensor) -> LayerResult<()> {
    if output.shape() != target.shape() {
        return Err(LayerError::Shape {
            context: name.to_string(),
            message: format!(
                "output shape {:?} does not match target shape {:?}",
                output.shape(),
                target.shape()
            ),
        });
    }
    Ok(())
}

/// Mean of the squared element-wise differences.
pub fn mean_squared_error(output: &Tensor, target: &Tensor) -> LayerResult<f32> {
    check_same_shape("mean_squared_error", output, target)?;
    let diff = output.data() - target.data();
    Ok(diff.mapv(|v| v * v).mean().unwrap_or(0.0))
}

/// Mean of the absolute element-wise differences.
pub fn absolute_difference_error(output: &Tensor, target: &Tensor) -> LayerResult<f32> {
    check_same_shape("absolute_difference_error", output, target)?;
    let diff = output.data() - target.data();
    Ok(diff.mapv(f32::abs).mean().unwrap_or(0.0))
}

/// Sigmoid cross-entropy from raw logits.
///
/// Uses the stable formulation
/// `max(x, 0) - x * z + ln(1 + exp(-|x|))` averaged over all elements.
pub fn sigmoid_cross_entropy(logits: &Tensor, labels: &Tensor) -> LayerResult<f32> {
    check_same_shape("sigmoid_cross_entropy", logits, labels)?;
    let total: f32 = logits
        .data()
        .iter()
        .zip(labels.data().iter())
        .map(|(&x, &z)| x.max(0.0) - x * z + (-x.abs()).exp().ln_1p())
        .sum();
    Ok(total / logits.len().max(1) as f32)
}

/// Binary cross-entropy from probabilities in `(0, 1)`.
pub fn binary_cross_entropy(output: &Tensor, target: &Tensor) -> LayerResult<f32> {
    check_same_shape("binary_cross_entropy", output, target)?;
    const EPS: f32 = 1e-7;
    let total: f32 = output
        .data()
        .iter()
        .zip(target.data().iter())
        .map(|(&o, &t)| -(t * (o + EPS).ln() + (1.0 - t) * (1.0 - o + EPS).ln()))
        .sum();
    Ok(total / output.len().max(1) as f32)
}
