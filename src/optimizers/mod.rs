//! Optimizers updating module parameters in place.
//!
//! The core exposes no gradient computation: a training loop obtains the
//! parameter set through `Module::trainable_weights` and supplies the
//! gradients it computed externally, keyed by qualified parameter name.
//! Updates happen strictly between forward passes.

use crate::nn::module::{LayerError, LayerResult};
use crate::params::Parameter;
use ndarray::ArrayD;
use std::collections::HashMap;

/// Common interface of all optimizers.
pub trait Optimizer {
    /// Performs one optimization step over `weights`.
    ///
    /// `gradients` maps qualified parameter names (e.g.
    /// `"linear_1/weights"`) to gradient tensors. Parameters without an
    /// entry are skipped; a gradient whose shape disagrees with its
    /// parameter is a shape error.
    fn step(
        &mut self,
        weights: &[Parameter],
        gradients: &HashMap<String, ArrayD<f32>>,
    ) -> LayerResult<()>;
}

fn check_gradient_shape(param: &Parameter, grad: &ArrayD<f32>) -> LayerResult<()> {
    if grad.shape() != param.shape() {
        return Err(LayerError::Shape {
            context: param.name().to_string(),
            message: format!(
                "gradient shape {:?} does not match parameter shape {:?}",
                grad.shape(),
                param.shape()
            ),
        });
    }
    Ok(())
}

/// Stochastic gradient descent: `p -= lr * g`.
pub struct Sgd {
    lr: f32,
}

impl Sgd {
    pub fn new(lr: f32) -> Self {
        Self { lr }
    }
}

impl Optimizer for Sgd {
    fn step(
        &mut self,
        weights: &[Parameter],
        gradients: &HashMap<String, ArrayD<f32>>,
    ) -> LayerResult<()> {
        for param in weights {
            let Some(grad) = gradients.get(param.name()) else {
                continue;
            };
            check_gradient_shape(param, grad)?;
            let mut value = param.value_mut();
            ndarray::azip!((p in &mut *value, &g in grad) *p -= self.lr * g);
        }
        Ok(())
    }
}

struct AdamSlot {
    m: ArrayD<f32>,
    v: ArrayD<f32>,
}

/// Adam with bias-corrected first and second moment estimates.
pub struct Adam {
    lr: f32,
    beta1: f32,
    beta2: f32,
    eps: f32,
    step_count: i32,
    slots: HashMap<String, AdamSlot>,
}

impl Adam {
    pub fn new(lr: f32) -> Self {
        Self {
            lr,
            beta1: 0.9,
            beta2: 0.999,
            eps: 1e-8,
            step_count: 0,
            slots: HashMap::new(),
        }
    }

    pub fn with_betas(mut self, beta1: f32, beta2: f32) -> Self {
        self.beta1 = beta1;
        self.beta2 = beta2;
        self
    }
}

impl Optimizer for Adam {
    fn step(
        &mut self,
        weights: &[Parameter],
        gradients: &HashMap<String, ArrayD<f32>>,
    ) -> LayerResult<()> {
        self.step_count += 1;
        let bias1 = 1.0 - self.beta1.powi(self.step_count);
        let bias2 = 1.0 - self.beta2.powi(self.step_count);

        for param in weights {
            let Some(grad) = gradients.get(param.name()) else {
                continue;
            };
            check_gradient_shape(param, grad)?;

            let slot = self
                .slots
                .entry(param.name().to_string())
                .or_insert_with(|| AdamSlot {
                    m: ArrayD::zeros(grad.raw_dim()),
                    v: ArrayD::zeros(grad.raw_dim()),
                });

            let mut value = param.value_mut();
            let (lr, b1, b2, eps) = (self.lr, self.beta1, self.beta2, self.eps);
            ndarray::azip!(
                (p in &mut *value, m in &mut slot.m, v in &mut slot.v, &g in grad) {
                    *m = b1 * *m + (1.0 - b1) * g;
                    *v = b2 * *v + (1.0 - b2) * g * g;
                    let m_hat = *m / bias1;
                    let v_hat = *v / bias2;
                    *p -= lr * m_hat / (v_hat.sqrt() + eps);
                }
            );
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::init::Initializer;
    use crate::params::ParamStore;
    use ndarray::IxDyn;

    fn test_param() -> Parameter {
        let mut store = ParamStore::new("layer");
        store
            .create("weights", &[2], &Initializer::Ones, true)
            .unwrap()
    }

    #[test]
    fn test_sgd_applies_learning_rate() {
        let param = test_param();
        let mut grads = HashMap::new();
        grads.insert(
            "layer/weights".to_string(),
            ArrayD::from_shape_vec(IxDyn(&[2]), vec![1.0, -2.0]).unwrap(),
        );

        let mut sgd = Sgd::new(0.1);
        sgd.step(&[param.clone()], &grads).unwrap();

        let value = param.value();
        assert!((value[[0]] - 0.9).abs() < 1e-6);
        assert!((value[[1]] - 1.2).abs() < 1e-6);
    }

    #[test]
    fn test_sgd_skips_params_without_gradient() {
        let param = test_param();
        let mut sgd = Sgd::new(0.1);
        sgd.step(&[param.clone()], &HashMap::new()).unwrap();
        assert_eq!(param.value()[[0]], 1.0);
    }

    #[test]
    fn test_gradient_shape_mismatch_is_rejected() {
        let param = test_param();
        let mut grads = HashMap::new();
        grads.insert(
            "layer/weights".to_string(),
            ArrayD::zeros(IxDyn(&[3])),
        );
        let err = Sgd::new(0.1).step(&[param], &grads).unwrap_err();
        assert!(matches!(err, LayerError::Shape { .. }));
    }

    #[test]
    fn test_adam_first_step_moves_by_lr() {
        let param = test_param();
        let mut grads = HashMap::new();
        grads.insert(
            "layer/weights".to_string(),
            ArrayD::from_shape_vec(IxDyn(&[2]), vec![0.5, 0.5]).unwrap(),
        );

        let mut adam = Adam::new(0.01);
        adam.step(&[param.clone()], &grads).unwrap();

        // With bias correction, the very first step is ~lr in the
        // gradient's direction regardless of its magnitude.
        let value = param.value();
        assert!((value[[0]] - 0.99).abs() < 1e-4);
    }
}
