//! # Data Loading Module
//!
//! Dataset and DataLoader API for feeding batches to a training loop.
//!
//! The layer core has no dependency on the internals of this module -
//! it only receives batches shaped the way its layers expect. The
//! loader produces a finite, restartable sequence of (features, labels)
//! batches per epoch.
//!
//! ## Example
//!
//! ```ignore
//! use layerkit::data::{DataLoader, InMemoryDataset};
//!
//! let dataset = InMemoryDataset::new(features, labels);
//! let loader = DataLoader::new(dataset, 32).shuffle(true).seed(7);
//!
//! for epoch in 0..n_epochs {
//!     for batch in loader.iter() {
//!         // forward / loss / update
//!     }
//! }
//! ```

pub mod dataloader;
pub mod dataset;

pub use dataloader::{Batch, DataLoader};
pub use dataset::{Dataset, InMemoryDataset};
