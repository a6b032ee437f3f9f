//! Fully connected (dense) layer.

use crate::backend::{OpAttrs, OpKind, OperatorFn};
use crate::init::{InitSpec, Initializer};
use crate::network::NetworkContext;
use crate::nn::activations::Activation;
use crate::nn::module::{
    check_feature_width, check_rank, LayerError, LayerResult, Module, ModuleBase,
};
use crate::params::Parameter;
use crate::tensor::Tensor;
use std::cell::RefCell;
use std::rc::Rc;

/// Configuration for [`Linear`].
#[derive(Debug, Clone)]
pub struct LinearConfig {
    /// Number of output features.
    pub out_features: usize,
    /// Optional activation applied after the affine map.
    pub act: Option<Activation>,
    /// Initializer for the weight matrix.
    pub w_init: InitSpec,
    /// Initializer for the bias vector; `None` skips the bias entirely.
    pub b_init: Option<InitSpec>,
    /// Input width. When `None` it is detected from the first forward
    /// call; when set, the layer is built synchronously at construction.
    pub in_features: Option<usize>,
    /// Explicit layer name; auto-generated when unset.
    pub name: Option<String>,
}

impl Default for LinearConfig {
    fn default() -> Self {
        Self {
            out_features: 100,
            act: None,
            w_init: InitSpec::preset("truncated_normal"),
            b_init: Some(InitSpec::preset("constant")),
            in_features: None,
            name: None,
        }
    }
}

impl LinearConfig {
    pub fn new(out_features: usize) -> Self {
        Self {
            out_features,
            ..Default::default()
        }
    }

    pub fn with_act(mut self, act: Activation) -> Self {
        self.act = Some(act);
        self
    }

    pub fn with_w_init(mut self, w_init: impl Into<InitSpec>) -> Self {
        self.w_init = w_init.into();
        self
    }

    /// Sets or removes the bias initializer.
    pub fn with_b_init(mut self, b_init: Option<InitSpec>) -> Self {
        self.b_init = b_init;
        self
    }

    pub fn with_in_features(mut self, in_features: usize) -> Self {
        self.in_features = Some(in_features);
        self
    }

    pub fn with_name(mut self, name: &str) -> Self {
        self.name = Some(name.to_string());
        self
    }
}

/// Operators and parameters bound together at build time.
#[derive(Debug)]
struct DenseKernel {
    in_features: usize,
    matmul: OperatorFn,
    bias_add: Option<OperatorFn>,
    weights: Parameter,
    biases: Option<Parameter>,
}

/// The fully connected layer: `y = x W + b`, rank-2 input contract.
#[derive(Debug)]
pub struct Linear {
    base: ModuleBase,
    out_features: usize,
    w_init: Initializer,
    b_init: Option<Initializer>,
    kernel: Option<DenseKernel>,
}

impl Linear {
    /// Creates the layer, resolving initializer presets immediately.
    ///
    /// When the configuration carries an explicit input width, the build
    /// transition runs before this constructor returns.
    pub fn new(ctx: &Rc<RefCell<NetworkContext>>, config: LinearConfig) -> LayerResult<Self> {
        let w_init = config.w_init.resolve()?;
        let b_init = config.b_init.as_ref().map(InitSpec::resolve).transpose()?;
        let base = ModuleBase::new(ctx, config.name.as_deref(), "linear", config.act)?;

        log::info!(
            "Linear {}: out_features={} act={}",
            base.name(),
            config.out_features,
            config.act.map_or("none", |a| a.as_str())
        );

        let mut layer = Self {
            base,
            out_features: config.out_features,
            w_init,
            b_init,
            kernel: None,
        };
        if let Some(in_features) = config.in_features {
            layer.build(&[1, in_features])?;
            layer.base.mark_built()?;
        }
        Ok(layer)
    }

    /// The input width, once fixed by build.
    pub fn in_features(&self) -> Option<usize> {
        self.kernel.as_ref().map(|k| k.in_features)
    }

    pub fn out_features(&self) -> usize {
        self.out_features
    }

    fn kernel(&self) -> LayerResult<&DenseKernel> {
        self.kernel
            .as_ref()
            .ok_or_else(|| LayerError::NotBuilt(self.base.name().to_string()))
    }
}

impl Module for Linear {
    fn base(&self) -> &ModuleBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut ModuleBase {
        &mut self.base
    }

    fn build(&mut self, input_shape: &[usize]) -> LayerResult<()> {
        check_rank(self.base.name(), 2, input_shape)?;
        let in_features = input_shape[input_shape.len() - 1];

        let weights = self.base.create_weight(
            "weights",
            &[in_features, self.out_features],
            &self.w_init,
            true,
        )?;
        let biases = match &self.b_init {
            Some(init) => Some(
                self.base
                    .create_weight("biases", &[self.out_features], init, true)?,
            ),
            None => None,
        };

        let matmul = self.base.resolve_op(OpKind::MatMul)?;
        let bias_add = if biases.is_some() {
            Some(self.base.resolve_op(OpKind::BiasAdd)?)
        } else {
            None
        };

        self.kernel = Some(DenseKernel {
            in_features,
            matmul,
            bias_add,
            weights,
            biases,
        });
        Ok(())
    }

    fn compute(&mut self, input: &Tensor) -> LayerResult<Tensor> {
        let kernel = self.kernel()?;
        check_feature_width(self.base.name(), kernel.in_features, input.shape())?;

        let attrs = OpAttrs::default();
        let w = kernel.weights.value();
        let mut out = (kernel.matmul)(&[input.data(), &*w], &attrs)?;
        if let (Some(bias_add), Some(biases)) = (kernel.bias_add, &kernel.biases) {
            let b = biases.value();
            out = bias_add(&[&out, &*b], &attrs)?;
        }
        Ok(Tensor::new(out))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::BackendKind;
    use crate::nn::module::BuildState;

    #[test]
    fn test_lazy_build_on_first_forward() {
        let ctx = NetworkContext::new(BackendKind::Cpu);
        let mut layer = Linear::new(&ctx, LinearConfig::new(8)).unwrap();
        assert_eq!(layer.base().build_state(), BuildState::Unbuilt);
        assert!(layer.in_features().is_none());

        let input = Tensor::zeros(&[4, 3]);
        let out = layer.forward(&input).unwrap();
        assert_eq!(layer.base().build_state(), BuildState::Built);
        assert_eq!(layer.in_features(), Some(3));
        assert_eq!(out.shape(), &[4, 8]);
    }

    #[test]
    fn test_explicit_in_features_builds_at_construct() {
        let ctx = NetworkContext::new(BackendKind::Cpu);
        let layer = Linear::new(&ctx, LinearConfig::new(8).with_in_features(3)).unwrap();
        assert_eq!(layer.base().build_state(), BuildState::Built);
        assert_eq!(layer.in_features(), Some(3));
        assert_eq!(layer.trainable_weights().len(), 2);
    }

    #[test]
    fn test_width_is_fixed_at_first_build() {
        let ctx = NetworkContext::new(BackendKind::Cpu);
        let mut layer = Linear::new(&ctx, LinearConfig::new(8)).unwrap();
        layer.forward(&Tensor::zeros(&[16, 50])).unwrap();

        let err = layer.forward(&Tensor::zeros(&[16, 51])).unwrap_err();
        assert!(matches!(err, LayerError::Shape { .. }));
        // Still built with the original width - no silent rebuild.
        assert_eq!(layer.in_features(), Some(50));
    }

    #[test]
    fn test_rank_violation_fails_at_build() {
        let ctx = NetworkContext::new(BackendKind::Cpu);
        let mut layer = Linear::new(&ctx, LinearConfig::new(8)).unwrap();
        let err = layer.forward(&Tensor::zeros(&[2, 3, 4])).unwrap_err();
        assert!(matches!(err, LayerError::Shape { .. }));
        assert!(err.to_string().contains("rank 2"));
    }

    #[test]
    fn test_parameters_survive_between_forwards() {
        let ctx = NetworkContext::new(BackendKind::Cpu);
        let mut layer = Linear::new(&ctx, LinearConfig::new(4)).unwrap();
        let input = Tensor::zeros(&[2, 3]);

        let a = layer.forward(&input).unwrap();
        let first = layer.trainable_weights();
        let b = layer.forward(&input).unwrap();
        let second = layer.trainable_weights();

        assert_eq!(a.shape(), b.shape());
        for (p, q) in first.iter().zip(second.iter()) {
            assert!(Parameter::same_storage(p, q));
        }
    }

    #[test]
    fn test_skipping_bias() {
        let ctx = NetworkContext::new(BackendKind::Cpu);
        let mut layer =
            Linear::new(&ctx, LinearConfig::new(4).with_b_init(None)).unwrap();
        layer.forward(&Tensor::zeros(&[2, 3])).unwrap();
        assert_eq!(layer.trainable_weights().len(), 1);
        assert_eq!(layer.trainable_weights()[0].name(), "linear_1/weights");
    }

    #[test]
    fn test_activation_applied_after_affine_map() {
        let ctx = NetworkContext::new(BackendKind::Cpu);
        let mut layer = Linear::new(
            &ctx,
            LinearConfig::new(2)
                .with_act(Activation::Relu)
                .with_w_init(Initializer::Constant { value: -1.0 }),
        )
        .unwrap();
        let out = layer
            .forward(&Tensor::from_vec(&[1, 2], vec![1.0, 2.0]).unwrap())
            .unwrap();
        // xW = [-3, -3], bias 0, relu clamps to zero.
        assert!(out.data().iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_unknown_preset_fails_at_construct() {
        let ctx = NetworkContext::new(BackendKind::Cpu);
        let err = Linear::new(
            &ctx,
            LinearConfig::new(4).with_w_init(InitSpec::preset("glorot_spherical")),
        )
        .unwrap_err();
        assert!(matches!(err, LayerError::UnknownInitializer(_)));
    }
}
