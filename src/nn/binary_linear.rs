//! Binary-quantized fully connected layer.
//!
//! Weights are quantized to -1 or +1 while inferencing; the bias vector
//! is not binarized. The `binary_dense` operator is implemented by the
//! `cpu` backend only, so building this layer under another backend
//! fails with `UnsupportedOperator` naming both sides.

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

/// Configuration for [`BinaryLinear`].
#[derive(Debug, Clone)]
pub struct BinaryLinearConfig {
    pub out_features: usize,
    pub act: Option<Activation>,
    /// Reserved: a dedicated gemm inference path. Selecting it fails at
    /// build with `UnimplementedOption`.
    pub use_gemm: bool,
    pub w_init: InitSpec,
    pub b_init: Option<InitSpec>,
    pub in_features: Option<usize>,
    pub name: Option<String>,
}

impl Default for BinaryLinearConfig {
    fn default() -> Self {
        Self {
            out_features: 100,
            act: None,
            use_gemm: false,
            w_init: InitSpec::preset("truncated_normal"),
            b_init: Some(InitSpec::preset("constant")),
            in_features: None,
            name: None,
        }
    }
}

impl BinaryLinearConfig {
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

    pub fn with_use_gemm(mut self, use_gemm: bool) -> Self {
        self.use_gemm = use_gemm;
        self
    }

    pub fn with_w_init(mut self, w_init: impl Into<InitSpec>) -> Self {
        self.w_init = w_init.into();
        self
    }

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

#[derive(Debug)]
struct BinaryKernel {
    in_features: usize,
    binary_dense: OperatorFn,
    bias_add: Option<OperatorFn>,
    weights: Parameter,
    biases: Option<Parameter>,
}

/// Fully connected layer with ±1 weights at inference time.
#[derive(Debug)]
pub struct BinaryLinear {
    base: ModuleBase,
    out_features: usize,
    use_gemm: bool,
    w_init: Initializer,
    b_init: Option<Initializer>,
    kernel: Option<BinaryKernel>,
}

impl BinaryLinear {
    pub fn new(
        ctx: &Rc<RefCell<NetworkContext>>,
        config: BinaryLinearConfig,
    ) -> LayerResult<Self> {
        let w_init = config.w_init.resolve()?;
        let b_init = config.b_init.as_ref().map(InitSpec::resolve).transpose()?;
        let base = ModuleBase::new(ctx, config.name.as_deref(), "binary_linear", config.act)?;

        log::info!(
            "BinaryLinear {}: out_features={} act={}",
            base.name(),
            config.out_features,
            config.act.map_or("none", |a| a.as_str())
        );

        let mut layer = Self {
            base,
            out_features: config.out_features,
            use_gemm: config.use_gemm,
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

    pub fn in_features(&self) -> Option<usize> {
        self.kernel.as_ref().map(|k| k.in_features)
    }

    fn kernel(&self) -> LayerResult<&BinaryKernel> {
        self.kernel
            .as_ref()
            .ok_or_else(|| LayerError::NotBuilt(self.base.name().to_string()))
    }
}

impl Module for BinaryLinear {
    fn base(&self) -> &ModuleBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut ModuleBase {
        &mut self.base
    }

    fn build(&mut self, input_shape: &[usize]) -> LayerResult<()> {
        check_rank(self.base.name(), 2, input_shape)?;
        if self.use_gemm {
            return Err(LayerError::UnimplementedOption {
                layer: self.base.name().to_string(),
                option: "use_gemm".to_string(),
                message: "inference currently routes through the matmul operator".to_string(),
            });
        }
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

        let binary_dense = self.base.resolve_op(OpKind::BinaryDense)?;
        let bias_add = if biases.is_some() {
            Some(self.base.resolve_op(OpKind::BiasAdd)?)
        } else {
            None
        };

        self.kernel = Some(BinaryKernel {
            in_features,
            binary_dense,
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
        let mut out = (kernel.binary_dense)(&[input.data(), &*w], &attrs)?;
        if let (Some(bias_add), Some(biases)) = (kernel.bias_add, &kernel.biases) {
            let b = biases.value();
            out = bias_add(&[&out, &*b], &attrs)?;
        }
        Ok(Tensor::new(out))
    }
}
