//! Module defining the `Tensor` handle passed in and out of layers.
//!
//! A `Tensor` wraps the backend-native payload (an `ndarray::ArrayD<f32>`)
//! together with a process-unique identity. The identity is what the graph
//! recorder uses to connect an input-producing layer to the layer that
//! consumes its output; it plays no role in the numerics.
//!
//! Operator implementations inside the backends work on the raw payload
//! (`&ArrayD<f32>`), not on `Tensor` - the handle exists at the module
//! boundary only.

use crate::nn::module::{LayerError, LayerResult};
use ndarray::{ArrayD, IxDyn};
use std::sync::atomic::{AtomicU64, Ordering};

/// Process-unique tensor identity.
pub type TensorId = u64;

static NEXT_TENSOR_ID: AtomicU64 = AtomicU64::new(1);

fn next_id() -> TensorId {
    NEXT_TENSOR_ID.fetch_add(1, Ordering::Relaxed)
}

/// A value flowing between layers: backend-native data plus identity.
///
/// Cloning keeps the identity - a clone refers to the same logical value
/// and therefore to the same producer in the recorded graph. Every freshly
/// computed tensor (layer output, operator result) gets a new identity.
#[derive(Debug, Clone)]
pub struct Tensor {
    data: ArrayD<f32>,
    id: TensorId,
}

impl Tensor {
    /// Wraps backend-native data in a new handle with a fresh identity.
    pub fn new(data: ArrayD<f32>) -> Self {
        Self {
            data,
            id: next_id(),
        }
    }

    /// Builds a tensor from a flat row-major buffer.
    ///
    /// Fails with a shape error if `data.len()` does not equal the product
    /// of `shape`.
    pub fn from_vec(shape: &[usize], data: Vec<f32>) -> LayerResult<Self> {
        let arr = ArrayD::from_shape_vec(IxDyn(shape), data).map_err(|e| LayerError::Shape {
            context: "tensor".to_string(),
            message: e.to_string(),
        })?;
        Ok(Self::new(arr))
    }

    /// A tensor of the given shape filled with zeros.
    pub fn zeros(shape: &[usize]) -> Self {
        Self::new(ArrayD::zeros(IxDyn(shape)))
    }

    /// The shape of the underlying data.
    pub fn shape(&self) -> &[usize] {
        self.data.shape()
    }

    /// Number of axes.
    pub fn ndim(&self) -> usize {
        self.data.ndim()
    }

    /// Total number of elements.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Borrows the backend-native payload.
    pub fn data(&self) -> &ArrayD<f32> {
        &self.data
    }

    /// Consumes the handle, returning the payload.
    pub fn into_data(self) -> ArrayD<f32> {
        self.data
    }

    /// The process-unique identity of this value.
    pub fn id(&self) -> TensorId {
        self.id
    }
}

impl From<ArrayD<f32>> for Tensor {
    fn from(data: ArrayD<f32>) -> Self {
        Self::new(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_vec_shape_roundtrip() {
        let t = Tensor::from_vec(&[2, 3], vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]).unwrap();
        assert_eq!(t.shape(), &[2, 3]);
        assert_eq!(t.len(), 6);
        assert_eq!(t.data()[[1, 2]], 6.0);
    }

    #[test]
    fn test_from_vec_rejects_wrong_length() {
        let result = Tensor::from_vec(&[2, 3], vec![1.0, 2.0]);
        assert!(result.is_err());
    }

    #[test]
    fn test_fresh_ids_and_clone_identity() {
        let a = Tensor::zeros(&[2]);
        let b = Tensor::zeros(&[2]);
        assert_ne!(a.id(), b.id());

        let c = a.clone();
        assert_eq!(a.id(), c.id());
    }
}
