//! Activation capabilities attachable to a layer.
//!
//! An activation is configured at construction and routed through the
//! operator registry like any other operator, so its backend support is
//! checked at build time together with the layer's own operators.

use crate::backend::{OpAttrs, OpKind};

/// Default negative slope of [`Activation::LeakyRelu`].
pub const DEFAULT_LEAKY_SLOPE: f32 = 0.2;

/// The closed set of activations a layer can carry.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Activation {
    Relu,
    LeakyRelu { negative_slope: f32 },
    Sigmoid,
    Tanh,
    Softmax,
    /// Element-wise sign, the companion of the binary-quantized layers.
    /// Backend-restricted like they are.
    Sign,
}

impl Activation {
    /// A leaky ReLU with the default slope.
    pub fn leaky_relu() -> Self {
        Self::LeakyRelu {
            negative_slope: DEFAULT_LEAKY_SLOPE,
        }
    }

    /// The registry operator implementing this activation.
    pub fn op_kind(&self) -> OpKind {
        match self {
            Self::Relu => OpKind::Relu,
            Self::LeakyRelu { .. } => OpKind::LeakyRelu,
            Self::Sigmoid => OpKind::Sigmoid,
            Self::Tanh => OpKind::Tanh,
            Self::Softmax => OpKind::Softmax,
            Self::Sign => OpKind::Sign,
        }
    }

    /// Scalar attributes forwarded to the operator.
    pub fn attrs(&self) -> OpAttrs {
        match *self {
            Self::LeakyRelu { negative_slope } => OpAttrs {
                alpha: negative_slope,
            },
            _ => OpAttrs::default(),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Relu => "relu",
            Self::LeakyRelu { .. } => "leaky_relu",
            Self::Sigmoid => "sigmoid",
            Self::Tanh => "tanh",
            Self::Softmax => "softmax",
            Self::Sign => "sign",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_leaky_relu_carries_slope() {
        let act = Activation::leaky_relu();
        assert_eq!(act.attrs().alpha, DEFAULT_LEAKY_SLOPE);
        assert_eq!(act.op_kind(), OpKind::LeakyRelu);
    }

    #[test]
    fn test_plain_activations_use_default_attrs() {
        assert_eq!(Activation::Relu.attrs(), OpAttrs::default());
        assert_eq!(Activation::Tanh.op_kind(), OpKind::Tanh);
    }
}
