//! Single-threaded CPU backend.
//!
//! Implements the full capability set over `ndarray`, including the
//! quantized dense operators that other backends do not carry.

use super::{BackendError, OpAttrs, OpKind, OperatorFn};
use ndarray::{ArrayD, Axis, Ix2, IxDyn};
use std::collections::HashMap;

/// The capability set of the `cpu` backend.
pub fn capabilities() -> HashMap<OpKind, OperatorFn> {
    let mut ops: HashMap<OpKind, OperatorFn> = HashMap::new();
    ops.insert(OpKind::MatMul, op_matmul);
    ops.insert(OpKind::BiasAdd, op_bias_add);
    ops.insert(OpKind::Relu, op_relu);
    ops.insert(OpKind::LeakyRelu, op_leaky_relu);
    ops.insert(OpKind::Sigmoid, op_sigmoid);
    ops.insert(OpKind::Tanh, op_tanh);
    ops.insert(OpKind::Softmax, op_softmax);
    ops.insert(OpKind::Sign, op_sign);
    ops.insert(OpKind::BinaryDense, op_binary_dense);
    ops.insert(OpKind::TernaryDense, op_ternary_dense);
    ops
}

fn unary<'a>(inputs: &[&'a ArrayD<f32>], op: &str) -> Result<&'a ArrayD<f32>, BackendError> {
    match inputs {
        [x] => Ok(x),
        _ => Err(BackendError::Shape(format!(
            "'{op}' expects 1 input tensor, got {}",
            inputs.len()
        ))),
    }
}

fn binary<'a>(
    inputs: &[&'a ArrayD<f32>],
    op: &str,
) -> Result<(&'a ArrayD<f32>, &'a ArrayD<f32>), BackendError> {
    match inputs {
        [a, b] => Ok((a, b)),
        _ => Err(BackendError::Shape(format!(
            "'{op}' expects 2 input tensors, got {}",
            inputs.len()
        ))),
    }
}

/// `x @ w`, contracting the trailing axis of `x` with the first axis of a
/// rank-2 `w`. Leading axes of `x` are free and preserved.
fn op_matmul(inputs: &[&ArrayD<f32>], _attrs: &OpAttrs) -> Result<ArrayD<f32>, BackendError> {
    let (x, w) = binary(inputs, "matmul")?;
    matmul(x, w)
}

fn matmul(x: &ArrayD<f32>, w: &ArrayD<f32>) -> Result<ArrayD<f32>, BackendError> {
    if x.ndim() < 2 || w.ndim() != 2 {
        return Err(BackendError::Shape(format!(
            "matmul expects input of rank >= 2 and weights of rank 2, got {:?} and {:?}",
            x.shape(),
            w.shape()
        )));
    }
    let k = x.shape()[x.ndim() - 1];
    if k != w.shape()[0] {
        return Err(BackendError::Shape(format!(
            "incompatible matmul shapes: {:?} and {:?}",
            x.shape(),
            w.shape()
        )));
    }

    let rows: usize = x.shape()[..x.ndim() - 1].iter().product();
    let x2 = x
        .to_shape((rows, k))
        .map_err(|e| BackendError::Shape(e.to_string()))?;
    let w2 = w
        .view()
        .into_dimensionality::<Ix2>()
        .map_err(|e| BackendError::Shape(e.to_string()))?;
    let out2 = x2.dot(&w2);

    let mut out_shape: Vec<usize> = x.shape()[..x.ndim() - 1].to_vec();
    out_shape.push(w.shape()[1]);
    let data: Vec<f32> = out2.iter().copied().collect();
    ArrayD::from_shape_vec(IxDyn(&out_shape), data)
        .map_err(|e| BackendError::Shape(e.to_string()))
}

/// `x + b`, broadcasting a rank-1 bias over the trailing axis.
fn op_bias_add(inputs: &[&ArrayD<f32>], _attrs: &OpAttrs) -> Result<ArrayD<f32>, BackendError> {
    let (x, b) = binary(inputs, "bias_add")?;
    if b.ndim() != 1 || x.shape().last() != Some(&b.len()) {
        return Err(BackendError::Shape(format!(
            "bias_add expects a rank-1 bias matching the trailing axis, got {:?} and {:?}",
            x.shape(),
            b.shape()
        )));
    }
    Ok(x + b)
}

fn op_relu(inputs: &[&ArrayD<f32>], _attrs: &OpAttrs) -> Result<ArrayD<f32>, BackendError> {
    Ok(unary(inputs, "relu")?.mapv(|v| v.max(0.0)))
}

fn op_leaky_relu(inputs: &[&ArrayD<f32>], attrs: &OpAttrs) -> Result<ArrayD<f32>, BackendError> {
    let slope = attrs.alpha;
    Ok(unary(inputs, "leaky_relu")?.mapv(|v| if v > 0.0 { v } else { slope * v }))
}

fn op_sigmoid(inputs: &[&ArrayD<f32>], _attrs: &OpAttrs) -> Result<ArrayD<f32>, BackendError> {
    Ok(unary(inputs, "sigmoid")?.mapv(|v| 1.0 / (1.0 + (-v).exp())))
}

fn op_tanh(inputs: &[&ArrayD<f32>], _attrs: &OpAttrs) -> Result<ArrayD<f32>, BackendError> {
    Ok(unary(inputs, "tanh")?.mapv(|v| v.tanh()))
}

/// Softmax over the trailing axis, shifted by the row maximum.
fn op_softmax(inputs: &[&ArrayD<f32>], _attrs: &OpAttrs) -> Result<ArrayD<f32>, BackendError> {
    let x = unary(inputs, "softmax")?;
    let mut result = x.clone();
    let last_axis = Axis(x.ndim() - 1);
    result.axis_iter_mut(last_axis).for_each(|mut lane| {
        let max_val = lane.iter().fold(f32::NEG_INFINITY, |m, &v| m.max(v));
        lane.mapv_inplace(|v| (v - max_val).exp());
        let sum = lane.sum();
        lane.mapv_inplace(|v| v / sum);
    });
    Ok(result)
}

fn op_sign(inputs: &[&ArrayD<f32>], _attrs: &OpAttrs) -> Result<ArrayD<f32>, BackendError> {
    Ok(unary(inputs, "sign")?.mapv(sign))
}

fn sign(v: f32) -> f32 {
    if v > 0.0 {
        1.0
    } else if v < 0.0 {
        -1.0
    } else {
        0.0
    }
}

/// Dense product with weights binarized to ±1. The bias, when a layer
/// uses one, goes through `bias_add` unquantized.
fn op_binary_dense(inputs: &[&ArrayD<f32>], _attrs: &OpAttrs) -> Result<ArrayD<f32>, BackendError> {
    let (x, w) = binary(inputs, "binary_dense")?;
    let quantized = w.mapv(|v| if v >= 0.0 { 1.0 } else { -1.0 });
    matmul(x, &quantized)
}

/// Dense product with weights ternarized to {-1, 0, +1}. The threshold is
/// 0.7 times the mean absolute weight.
fn op_ternary_dense(
    inputs: &[&ArrayD<f32>],
    _attrs: &OpAttrs,
) -> Result<ArrayD<f32>, BackendError> {
    let (x, w) = binary(inputs, "ternary_dense")?;
    let mean_abs = w.mapv(f32::abs).mean().unwrap_or(0.0);
    let threshold = 0.7 * mean_abs;
    let quantized = w.mapv(|v| {
        if v > threshold {
            1.0
        } else if v < -threshold {
            -1.0
        } else {
            0.0
        }
    });
    matmul(x, &quantized)
}
