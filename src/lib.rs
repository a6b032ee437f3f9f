//! # layerkit: Backend-Agnostic Neural Network Layers in Rust
//!
//! **layerkit** lets you define network architectures - layers, parameter
//! initialization, forward computation - once, and execute them under
//! interchangeable numerical backends selected at process start.
//!
//! Layers follow a lazy-build protocol: a layer declared without an input
//! width defers its parameter allocation and operator resolution until the
//! first real tensor arrives, then commits to that shape permanently.
//!
//! ## Usage Example
//!
//! ```no_run
//! use layerkit::backend::BackendKind;
//! use layerkit::network::NetworkContext;
//! use layerkit::nn::{Activation, Linear, LinearConfig, Module};
//! use layerkit::tensor::Tensor;
//!
//! // 1. Create a context for the chosen backend.
//! let ctx = NetworkContext::new(BackendKind::Cpu);
//!
//! // 2. Declare a layer; the input width is detected on first use.
//! let mut fc = Linear::new(&ctx, LinearConfig::new(256).with_act(Activation::Relu))
//!     .expect("valid configuration");
//!
//! // 3. First forward call triggers the build, later calls reuse it.
//! let batch = Tensor::zeros(&[32, 100]);
//! let hidden = fc.forward(&batch).expect("forward");
//! assert_eq!(hidden.shape(), &[32, 256]);
//!
//! // 4. Hand the parameters to an external optimizer.
//! let weights = fc.trainable_weights();
//! assert_eq!(weights.len(), 2);
//! ```

// Declare public modules that constitute the core library API.
pub mod backend;
pub mod data;
pub mod graph;
pub mod init;
pub mod losses;
pub mod network;
pub mod nn;
pub mod optimizers;
pub mod params;
pub mod serialization;
pub mod tensor;
