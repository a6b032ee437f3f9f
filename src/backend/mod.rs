//! Backend selection and operator dispatch.
//!
//! A layer never calls numeric code directly. It asks the
//! [`OperatorRegistry`] of the active backend for the capability behind an
//! abstract operator name ([`OpKind`]) and caches the resolved function at
//! build time. Each submodule here is one backend: a capability set
//! mapping operator names to implementations over the backend-native
//! tensor payload.
//!
//! The active backend is one configuration value, chosen when the network
//! context is created (typically at process start, optionally from the
//! `LAYERKIT_BACKEND` environment variable) and never changed afterwards.
//! Registries are read-only after construction; modules built under one
//! registry are unaffected by contexts created later.

pub mod cpu;
pub mod parallel;

use ndarray::ArrayD;
use std::collections::HashMap;
use std::env;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Environment variable consulted by [`BackendKind::from_env`].
pub const BACKEND_ENV: &str = "LAYERKIT_BACKEND";

/// Errors raised while resolving or executing backend operators.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum BackendError {
    #[error("operator '{op}' is not implemented by the '{backend}' backend")]
    UnsupportedOperator { op: OpKind, backend: BackendKind },

    #[error("unknown backend identifier '{0}'")]
    UnknownBackend(String),

    #[error("shape error: {0}")]
    Shape(String),
}

/// Identifier of a numerical-computation engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackendKind {
    /// Single-threaded ndarray kernels. Full capability set, including
    /// the quantized dense operators.
    Cpu,
    /// Rayon data-parallel kernels. Dense capability set only.
    Parallel,
}

impl BackendKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Cpu => "cpu",
            Self::Parallel => "parallel",
        }
    }

    /// Reads the backend identifier from `LAYERKIT_BACKEND`, defaulting
    /// to [`BackendKind::Cpu`] when the variable is unset. An unknown
    /// value fails fast rather than silently falling back.
    pub fn from_env() -> Result<Self, BackendError> {
        match env::var(BACKEND_ENV) {
            Ok(value) => value.parse(),
            Err(_) => Ok(Self::Cpu),
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BackendKind {
    type Err = BackendError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "cpu" => Ok(Self::Cpu),
            "parallel" => Ok(Self::Parallel),
            other => Err(BackendError::UnknownBackend(other.to_string())),
        }
    }
}

/// Abstract operator names understood by the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OpKind {
    MatMul,
    BiasAdd,
    Relu,
    LeakyRelu,
    Sigmoid,
    Tanh,
    Softmax,
    Sign,
    BinaryDense,
    TernaryDense,
}

impl OpKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MatMul => "matmul",
            Self::BiasAdd => "bias_add",
            Self::Relu => "relu",
            Self::LeakyRelu => "leaky_relu",
            Self::Sigmoid => "sigmoid",
            Self::Tanh => "tanh",
            Self::Softmax => "softmax",
            Self::Sign => "sign",
            Self::BinaryDense => "binary_dense",
            Self::TernaryDense => "ternary_dense",
        }
    }
}

impl fmt::Display for OpKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Scalar attributes passed alongside an operator's tensor inputs.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OpAttrs {
    /// Slope or scale for operators that take one (`leaky_relu`).
    pub alpha: f32,
}

impl Default for OpAttrs {
    fn default() -> Self {
        Self { alpha: 0.0 }
    }
}

/// Signature shared by every registered operator implementation: a pure
/// function from backend-native tensors plus scalar attributes to a
/// backend-native tensor.
pub type OperatorFn = fn(&[&ArrayD<f32>], &OpAttrs) -> Result<ArrayD<f32>, BackendError>;

/// Per-backend mapping from abstract operator name to implementation.
///
/// Populated once from the backend's capability set and read-only
/// afterwards.
pub struct OperatorRegistry {
    backend: BackendKind,
    ops: HashMap<OpKind, OperatorFn>,
}

impl OperatorRegistry {
    /// Builds the registry for the given backend.
    pub fn for_backend(backend: BackendKind) -> Self {
        let ops = match backend {
            BackendKind::Cpu => cpu::capabilities(),
            BackendKind::Parallel => parallel::capabilities(),
        };
        log::debug!(
            "operator registry for backend '{}': {} operators",
            backend,
            ops.len()
        );
        Self { backend, ops }
    }

    pub fn backend(&self) -> BackendKind {
        self.backend
    }

    /// Whether the backend implements the operator.
    pub fn supports(&self, op: OpKind) -> bool {
        self.ops.contains_key(&op)
    }

    /// Looks up the capability behind `op`, or fails naming both the
    /// operator and the backend.
    pub fn resolve(&self, op: OpKind) -> Result<OperatorFn, BackendError> {
        self.ops
            .get(&op)
            .copied()
            .ok_or(BackendError::UnsupportedOperator {
                op,
                backend: self.backend,
            })
    }
}

impl fmt::Debug for OperatorRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OperatorRegistry")
            .field("backend", &self.backend)
            .field("operators", &self.ops.len())
            .finish()
    }
}
