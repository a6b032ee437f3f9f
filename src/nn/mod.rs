//! # Neural Network Layers Module
//!
//! Building blocks for constructing neural networks on top of the
//! backend-agnostic module contract.
//!
//! Every layer follows the same lifecycle, defined by the [`Module`]
//! trait: construct with hyperparameters, build lazily when the first
//! real tensor arrives (fixing the input width, allocating parameters
//! and resolving backend operators), then execute forward passes against
//! that permanent shape commitment.
//!
//! ## Available Layers
//!
//! - [`Linear`]: fully connected / dense layer
//! - [`BinaryLinear`]: dense layer with ±1 weights at inference
//! - [`TernaryLinear`]: dense layer with {-1, 0, +1} weights at inference
//! - [`Sequential`]: composite container chaining child modules
//!
//! ## Example
//!
//! ```ignore
//! use layerkit::backend::BackendKind;
//! use layerkit::network::NetworkContext;
//! use layerkit::nn::{Activation, Linear, LinearConfig, Module};
//!
//! let ctx = NetworkContext::new(BackendKind::Cpu);
//! let mut fc1 = Linear::new(&ctx, LinearConfig::new(128).with_act(Activation::Relu))?;
//! let hidden = fc1.forward(&batch)?; // builds on this first call
//! ```

// Declare all submodules
pub mod activations;
pub mod binary_linear;
pub mod linear;
pub mod module;
pub mod sequential;
pub mod ternary_linear;

// Re-export structures for convenience

pub use activations::Activation;
pub use binary_linear::{BinaryLinear, BinaryLinearConfig};
pub use linear::{Linear, LinearConfig};
pub use sequential::Sequential;
pub use ternary_linear::{TernaryLinear, TernaryLinearConfig};

// Base contract
pub use module::{BuildState, LayerError, LayerResult, Module, ModuleBase};
