//! Sequential composite module.
//!
//! Chains child modules in declaration order. The composite itself owns
//! no parameters: `trainable_weights` recurses into the children, and
//! each child performs its own lazy build as data first reaches it.

use crate::network::NetworkContext;
use crate::nn::module::{LayerResult, Module, ModuleBase};
use crate::params::Parameter;
use crate::tensor::Tensor;
use std::cell::RefCell;
use std::rc::Rc;

/// A module that runs its children one after another.
pub struct Sequential {
    base: ModuleBase,
    layers: Vec<Box<dyn Module>>,
}

impl Sequential {
    /// Creates an empty container.
    pub fn new(ctx: &Rc<RefCell<NetworkContext>>, name: Option<&str>) -> LayerResult<Self> {
        let base = ModuleBase::new(ctx, name, "sequential", None)?;
        Ok(Self {
            base,
            layers: Vec::new(),
        })
    }

    /// Appends a child module.
    pub fn push(&mut self, layer: Box<dyn Module>) {
        self.layers.push(layer);
    }

    /// Builder-style variant of [`push`](Self::push).
    pub fn with(mut self, layer: Box<dyn Module>) -> Self {
        self.push(layer);
        self
    }

    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }
}

impl Module for Sequential {
    fn base(&self) -> &ModuleBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut ModuleBase {
        &mut self.base
    }

    /// The container itself has nothing shape-dependent to allocate;
    /// children build lazily inside [`compute`](Self::compute).
    fn build(&mut self, _input_shape: &[usize]) -> LayerResult<()> {
        Ok(())
    }

    fn compute(&mut self, input: &Tensor) -> LayerResult<Tensor> {
        let mut current = input.clone();
        for layer in &mut self.layers {
            current = layer.forward(&current)?;
        }
        Ok(current)
    }

    fn trainable_weights(&self) -> Vec<Parameter> {
        let mut weights = self.base.trainable_weights();
        for layer in &self.layers {
            weights.extend(layer.trainable_weights());
        }
        weights
    }
}
