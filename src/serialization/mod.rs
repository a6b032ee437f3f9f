//! Serialization of module weights.
//!
//! Trainable weights are checkpointed in the SafeTensors format, keyed
//! by qualified parameter name, so a module rebuilt in a later process
//! can reload the exact values it trained.
//!
//! # Example
//!
//! ```rust,ignore
//! use layerkit::serialization::{save_weights, load_weights};
//!
//! save_weights("model.safetensors", &net.trainable_weights())?;
//! // ... later, after rebuilding the same architecture:
//! load_weights("model.safetensors", &net.trainable_weights())?;
//! ```

pub mod weights_io;

pub use weights_io::{load_weights, save_weights, WeightsIoError};
