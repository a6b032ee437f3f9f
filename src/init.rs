//! Weight initializers.
//!
//! A layer configuration names its initializers either by preset string
//! (`"truncated_normal"`, `"constant"`, ...) or by passing an
//! [`Initializer`] value directly. Preset strings are resolved to the
//! closed [`Initializer`] enum while the configuration is parsed, so an
//! unknown name fails at construction rather than at build time.
//!
//! Sampling happens exactly once per parameter, when the owning layer is
//! built.

use crate::nn::module::{LayerError, LayerResult};
use ndarray::{ArrayD, IxDyn};
use ndarray_rand::rand_distr::{Normal, Uniform};
use ndarray_rand::RandomExt;
use rand::Rng;

/// Standard deviation used by the `truncated_normal` and `random_normal`
/// presets.
const DEFAULT_STDDEV: f32 = 0.05;

/// Half-width of the `random_uniform` preset's interval.
const DEFAULT_UNIFORM_LIMIT: f32 = 0.05;

/// The closed set of weight initializers.
#[derive(Debug, Clone, PartialEq)]
pub enum Initializer {
    /// All zeros.
    Zeros,
    /// All ones.
    Ones,
    /// A single constant value.
    Constant { value: f32 },
    /// Gaussian samples.
    RandomNormal { mean: f32, stddev: f32 },
    /// Gaussian samples redrawn until they fall within two standard
    /// deviations of zero.
    TruncatedNormal { stddev: f32 },
    /// Uniform samples from `[minval, maxval)`.
    RandomUniform { minval: f32, maxval: f32 },
    /// Gaussian with stddev `sqrt(2 / fan_in)`.
    HeNormal,
    /// Uniform over `[-limit, limit]` with `limit = sqrt(6 / (fan_in + fan_out))`.
    XavierUniform,
}

impl Initializer {
    /// Resolves a preset name to an initializer.
    ///
    /// Unknown names fail immediately with
    /// [`LayerError::UnknownInitializer`].
    pub fn from_name(name: &str) -> LayerResult<Self> {
        match name {
            "zeros" => Ok(Self::Zeros),
            "ones" => Ok(Self::Ones),
            "constant" => Ok(Self::Constant { value: 0.0 }),
            "random_normal" => Ok(Self::RandomNormal {
                mean: 0.0,
                stddev: DEFAULT_STDDEV,
            }),
            "truncated_normal" => Ok(Self::TruncatedNormal {
                stddev: DEFAULT_STDDEV,
            }),
            "random_uniform" => Ok(Self::RandomUniform {
                minval: -DEFAULT_UNIFORM_LIMIT,
                maxval: DEFAULT_UNIFORM_LIMIT,
            }),
            "he_normal" => Ok(Self::HeNormal),
            "xavier_uniform" => Ok(Self::XavierUniform),
            other => Err(LayerError::UnknownInitializer(other.to_string())),
        }
    }

    /// Draws one tensor of the given shape.
    ///
    /// # Panics
    ///
    /// Panics if a gaussian variant carries a non-finite or non-positive
    /// standard deviation. The presets always carry valid values; the
    /// check only concerns hand-constructed initializers.
    pub fn sample(&self, shape: &[usize]) -> ArrayD<f32> {
        let dim = IxDyn(shape);
        match *self {
            Self::Zeros => ArrayD::zeros(dim),
            Self::Ones => ArrayD::ones(dim),
            Self::Constant { value } => ArrayD::from_elem(dim, value),
            Self::RandomNormal { mean, stddev } => {
                let dist =
                    Normal::new(mean, stddev).expect("stddev must be finite and positive");
                ArrayD::random(dim, dist)
            }
            Self::TruncatedNormal { stddev } => truncated_normal(shape, stddev),
            Self::RandomUniform { minval, maxval } => {
                ArrayD::random(dim, Uniform::new(minval, maxval))
            }
            Self::HeNormal => {
                let stddev = (2.0 / fan_in(shape) as f32).sqrt();
                let dist = Normal::new(0.0, stddev).expect("fan_in is positive");
                ArrayD::random(dim, dist)
            }
            Self::XavierUniform => {
                let limit = (6.0 / (fan_in(shape) + fan_out(shape)) as f32).sqrt();
                ArrayD::random(dim, Uniform::new(-limit, limit))
            }
        }
    }
}

/// Initializer selector accepted by layer configurations: a preset name
/// resolved while parsing, or a caller-supplied initializer.
#[derive(Debug, Clone, PartialEq)]
pub enum InitSpec {
    Preset(String),
    Custom(Initializer),
}

impl InitSpec {
    /// A preset selector, e.g. `InitSpec::preset("truncated_normal")`.
    pub fn preset(name: &str) -> Self {
        Self::Preset(name.to_string())
    }

    /// Resolves the selector to a concrete initializer, failing fast on
    /// unknown preset names.
    pub fn resolve(&self) -> LayerResult<Initializer> {
        match self {
            Self::Preset(name) => Initializer::from_name(name),
            Self::Custom(init) => Ok(init.clone()),
        }
    }
}

impl From<Initializer> for InitSpec {
    fn from(init: Initializer) -> Self {
        Self::Custom(init)
    }
}

fn fan_in(shape: &[usize]) -> usize {
    shape.first().copied().unwrap_or(1).max(1)
}

fn fan_out(shape: &[usize]) -> usize {
    shape.last().copied().unwrap_or(1).max(1)
}

fn truncated_normal(shape: &[usize], stddev: f32) -> ArrayD<f32> {
    let dist = Normal::new(0.0, stddev).expect("stddev must be finite and positive");
    let bound = 2.0 * stddev;
    let mut rng = rand::thread_rng();
    let len: usize = shape.iter().product();
    let data = (0..len)
        .map(|_| loop {
            let x: f32 = rng.sample(dist);
            if x.abs() <= bound {
                break x;
            }
        })
        .collect();
    ArrayD::from_shape_vec(IxDyn(shape), data).expect("buffer length matches shape")
}
