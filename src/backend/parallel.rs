//! Rayon data-parallel CPU backend.
//!
//! Carries the dense capability set only. The quantized dense operators
//! (`sign`, `binary_dense`, `ternary_dense`) are deliberately absent -
//! layers that need them must run under the `cpu` backend, and resolving
//! them here fails with `UnsupportedOperator` at build time.
//!
//! Kernels flatten the payload to a row-major buffer and parallelize over
//! output rows, so results match the single-threaded backend exactly.

use super::{BackendError, OpAttrs, OpKind, OperatorFn};
use ndarray::{ArrayD, IxDyn};
use rayon::prelude::*;
use std::collections::HashMap;

/// The capability set of the `parallel` backend.
pub fn capabilities() -> HashMap<OpKind, OperatorFn> {
    let mut ops: HashMap<OpKind, OperatorFn> = HashMap::new();
    ops.insert(OpKind::MatMul, op_matmul);
    ops.insert(OpKind::BiasAdd, op_bias_add);
    ops.insert(OpKind::Relu, op_relu);
    ops.insert(OpKind::LeakyRelu, op_leaky_relu);
    ops.insert(OpKind::Sigmoid, op_sigmoid);
    ops.insert(OpKind::Tanh, op_tanh);
    ops.insert(OpKind::Softmax, op_softmax);
    ops
}

fn flat(a: &ArrayD<f32>) -> Vec<f32> {
    a.iter().copied().collect()
}

fn elementwise<F>(
    inputs: &[&ArrayD<f32>],
    op: &str,
    f: F,
) -> Result<ArrayD<f32>, BackendError>
where
    F: Fn(f32) -> f32 + Sync + Send,
{
    let x = match inputs {
        [x] => x,
        _ => {
            return Err(BackendError::Shape(format!(
                "'{op}' expects 1 input tensor, got {}",
                inputs.len()
            )))
        }
    };
    let data: Vec<f32> = flat(x).par_iter().map(|&v| f(v)).collect();
    ArrayD::from_shape_vec(IxDyn(x.shape()), data).map_err(|e| BackendError::Shape(e.to_string()))
}

fn op_matmul(inputs: &[&ArrayD<f32>], _attrs: &OpAttrs) -> Result<ArrayD<f32>, BackendError> {
    let (x, w) = match inputs {
        [x, w] => (x, w),
        _ => {
            return Err(BackendError::Shape(format!(
                "'matmul' expects 2 input tensors, got {}",
                inputs.len()
            )))
        }
    };
    if x.ndim() < 2 || w.ndim() != 2 {
        return Err(BackendError::Shape(format!(
            "matmul expects input of rank >= 2 and weights of rank 2, got {:?} and {:?}",
            x.shape(),
            w.shape()
        )));
    }
    let k = x.shape()[x.ndim() - 1];
    let n = w.shape()[1];
    if k != w.shape()[0] {
        return Err(BackendError::Shape(format!(
            "incompatible matmul shapes: {:?} and {:?}",
            x.shape(),
            w.shape()
        )));
    }

    let rows: usize = x.shape()[..x.ndim() - 1].iter().product();
    let x_buf = flat(x);
    let w_buf = flat(w);

    let mut out = vec![0.0f32; rows * n];
    out.par_chunks_mut(n).enumerate().for_each(|(i, row)| {
        for l in 0..k {
            let xv = x_buf[i * k + l];
            let w_row = &w_buf[l * n..(l + 1) * n];
            for (o, &wv) in row.iter_mut().zip(w_row) {
                *o += xv * wv;
            }
        }
    });

    let mut out_shape: Vec<usize> = x.shape()[..x.ndim() - 1].to_vec();
    out_shape.push(n);
    ArrayD::from_shape_vec(IxDyn(&out_shape), out).map_err(|e| BackendError::Shape(e.to_string()))
}

fn op_bias_add(inputs: &[&ArrayD<f32>], _attrs: &OpAttrs) -> Result<ArrayD<f32>, BackendError> {
    let (x, b) = match inputs {
        [x, b] => (x, b),
        _ => {
            return Err(BackendError::Shape(format!(
                "'bias_add' expects 2 input tensors, got {}",
                inputs.len()
            )))
        }
    };
    let n = b.len();
    if b.ndim() != 1 || x.shape().last() != Some(&n) {
        return Err(BackendError::Shape(format!(
            "bias_add expects a rank-1 bias matching the trailing axis, got {:?} and {:?}",
            x.shape(),
            b.shape()
        )));
    }
    let b_buf = flat(b);
    let mut out = flat(x);
    out.par_chunks_mut(n).for_each(|row| {
        for (o, &bv) in row.iter_mut().zip(&b_buf) {
            *o += bv;
        }
    });
    ArrayD::from_shape_vec(IxDyn(x.shape()), out).map_err(|e| BackendError::Shape(e.to_string()))
}

fn op_relu(inputs: &[&ArrayD<f32>], _attrs: &OpAttrs) -> Result<ArrayD<f32>, BackendError> {
    elementwise(inputs, "relu", |v| v.max(0.0))
}

fn op_leaky_relu(inputs: &[&ArrayD<f32>], attrs: &OpAttrs) -> Result<ArrayD<f32>, BackendError> {
    let slope = attrs.alpha;
    elementwise(inputs, "leaky_relu", move |v| {
        if v > 0.0 {
            v
        } else {
            slope * v
        }
    })
}

fn op_sigmoid(inputs: &[&ArrayD<f32>], _attrs: &OpAttrs) -> Result<ArrayD<f32>, BackendError> {
    elementwise(inputs, "sigmoid", |v| 1.0 / (1.0 + (-v).exp()))
}

fn op_tanh(inputs: &[&ArrayD<f32>], _attrs: &OpAttrs) -> Result<ArrayD<f32>, BackendError> {
    elementwise(inputs, "tanh", |v| v.tanh())
}

fn op_softmax(inputs: &[&ArrayD<f32>], _attrs: &OpAttrs) -> Result<ArrayD<f32>, BackendError> {
    let x = match inputs {
        [x] => x,
        _ => {
            return Err(BackendError::Shape(format!(
                "'softmax' expects 1 input tensor, got {}",
                inputs.len()
            )))
        }
    };
    let n = x.shape()[x.ndim() - 1];
    let mut out = flat(x);
    out.par_chunks_mut(n).for_each(|lane| {
        let max_val = lane.iter().fold(f32::NEG_INFINITY, |m, &v| m.max(v));
        let mut sum = 0.0;
        for v in lane.iter_mut() {
            *v = (*v - max_val).exp();
            sum += *v;
        }
        for v in lane.iter_mut() {
            *v /= sum;
        }
    });
    ArrayD::from_shape_vec(IxDyn(x.shape()), out).map_err(|e| BackendError::Shape(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::cpu;

    #[test]
    fn test_matmul_matches_single_threaded_backend() {
        let x = ArrayD::from_shape_vec(
            IxDyn(&[3, 4]),
            (0..12).map(|v| v as f32 * 0.25 - 1.0).collect(),
        )
        .unwrap();
        let w = ArrayD::from_shape_vec(
            IxDyn(&[4, 2]),
            (0..8).map(|v| v as f32 * 0.5).collect(),
        )
        .unwrap();

        let attrs = OpAttrs::default();
        let par = op_matmul(&[&x, &w], &attrs).unwrap();
        let reference = cpu::capabilities()[&OpKind::MatMul](&[&x, &w], &attrs).unwrap();
        assert_eq!(par.shape(), reference.shape());
        for (a, b) in par.iter().zip(reference.iter()) {
            assert!((a - b).abs() < 1e-5);
        }
    }

    #[test]
    fn test_bias_add_rows() {
        let x = ArrayD::zeros(IxDyn(&[2, 3]));
        let b = ArrayD::from_shape_vec(IxDyn(&[3]), vec![1.0, 2.0, 3.0]).unwrap();
        let out = op_bias_add(&[&x, &b], &OpAttrs::default()).unwrap();
        assert_eq!(out[[0, 1]], 2.0);
        assert_eq!(out[[1, 2]], 3.0);
    }

    #[test]
    fn test_no_quantized_capabilities() {
        let ops = capabilities();
        assert!(!ops.contains_key(&OpKind::Sign));
        assert!(!ops.contains_key(&OpKind::BinaryDense));
        assert!(!ops.contains_key(&OpKind::TernaryDense));
    }

    #[test]
    fn test_softmax_normalizes_rows() {
        let x = ArrayD::from_shape_vec(IxDyn(&[2, 2]), vec![3.0, 3.0, 1.0, 2.0]).unwrap();
        let out = op_softmax(&[&x], &OpAttrs::default()).unwrap();
        assert!((out[[0, 0]] - 0.5).abs() < 1e-6);
        let row1: f32 = out[[1, 0]] + out[[1, 1]];
        assert!((row1 - 1.0).abs() < 1e-6);
    }
}
