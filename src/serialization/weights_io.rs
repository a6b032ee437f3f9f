//! SafeTensors persistence for module weights.
//!
//! SafeTensors is a safe, memory-mappable tensor format. Weights are
//! stored as F32 tensors under their qualified parameter names; loading
//! verifies the shape of every parameter before assigning into it.

use crate::params::Parameter;
use ndarray::{ArrayD, IxDyn};
use safetensors::tensor::TensorView;
use safetensors::{serialize_to_file, SafeTensors};
use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use thiserror::Error;

/// Errors raised while saving or loading weight files.
#[derive(Error, Debug)]
pub enum WeightsIoError {
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("safetensors error: {0}")]
    SafeTensors(#[from] safetensors::SafeTensorError),

    #[error("tensor '{0}' not found in the weight file")]
    TensorNotFound(String),

    #[error("shape mismatch for '{name}': file has {actual:?}, parameter has {expected:?}")]
    ShapeMismatch {
        name: String,
        expected: Vec<usize>,
        actual: Vec<usize>,
    },

    #[error("unsupported dtype {0:?} for tensor '{1}'")]
    UnsupportedDtype(safetensors::Dtype, String),
}

type Result<T> = std::result::Result<T, WeightsIoError>;

/// Saves the given parameters under their qualified names.
pub fn save_weights<P: AsRef<Path>>(path: P, weights: &[Parameter]) -> Result<()> {
    let mut buffers: HashMap<String, Vec<u8>> = HashMap::new();
    for param in weights {
        let data: Vec<u8> = param
            .value()
            .iter()
            .flat_map(|&x| x.to_le_bytes())
            .collect();
        buffers.insert(param.name().to_string(), data);
    }

    let mut views: Vec<(&str, TensorView<'_>)> = Vec::new();
    for param in weights {
        let data = &buffers[param.name()];
        views.push((
            param.name(),
            TensorView::new(safetensors::Dtype::F32, param.shape().to_vec(), data)?,
        ));
    }

    serialize_to_file(views, &None, path.as_ref())?;
    Ok(())
}

/// Loads values into the given parameters, matching by qualified name.
///
/// Every parameter must be present in the file with exactly its shape;
/// extra tensors in the file are ignored.
pub fn load_weights<P: AsRef<Path>>(path: P, weights: &[Parameter]) -> Result<()> {
    let mut buffer = Vec::new();
    File::open(path.as_ref())?.read_to_end(&mut buffer)?;
    let tensors = SafeTensors::deserialize(&buffer)?;

    for param in weights {
        let view = tensors
            .tensor(param.name())
            .map_err(|_| WeightsIoError::TensorNotFound(param.name().to_string()))?;

        if view.dtype() != safetensors::Dtype::F32 {
            return Err(WeightsIoError::UnsupportedDtype(
                view.dtype(),
                param.name().to_string(),
            ));
        }
        if view.shape() != param.shape() {
            return Err(WeightsIoError::ShapeMismatch {
                name: param.name().to_string(),
                expected: param.shape().to_vec(),
                actual: view.shape().to_vec(),
            });
        }

        let data: Vec<f32> = view
            .data()
            .chunks_exact(4)
            .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
            .collect();
        let array = ArrayD::from_shape_vec(IxDyn(param.shape()), data)
            .expect("verified shape matches buffer length");
        param.value_mut().assign(&array);
    }
    Ok(())
}
