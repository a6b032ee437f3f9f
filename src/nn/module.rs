//! Module defining the core `Module` trait and the lazy-build machinery
//! shared by all neural network layers.
//!
//! A layer is declared before the shapes flowing through the network are
//! necessarily known. The base contract therefore splits a layer's life
//! into three phases:
//!
//! 1. **Construct** - hyperparameters are fixed, initializer presets are
//!    resolved, and the layer name is registered in the context's ledger.
//! 2. **Build** - runs once, on the first forward call (or synchronously
//!    at construction when an explicit input width is given). The input
//!    width is fixed, parameters are allocated, and the backend operators
//!    are resolved from the registry and cached.
//! 3. **Forward** - executes the cached operators. Shape commitments made
//!    at build are permanent; violating them is an error, never a silent
//!    rebuild.
//!
//! The transition logic lives here, in [`ModuleBase`] and the provided
//! [`Module::forward`], so concrete layers only declare *what* to build
//! and *what* to compute.

use crate::backend::{BackendError, OpKind, OperatorFn};
use crate::graph::NodeRecord;
use crate::init::Initializer;
use crate::network::NetworkContext;
use crate::nn::activations::Activation;
use crate::params::{ParamStore, Parameter};
use crate::tensor::Tensor;
use std::cell::RefCell;
use std::rc::Rc;
use thiserror::Error;

/// Errors raised by the module lifecycle.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LayerError {
    /// Input rank or dimension mismatch at build or forward.
    #[error("shape error in '{context}': {message}")]
    Shape { context: String, message: String },

    /// A module or parameter name is already taken in its scope.
    #[error("name '{0}' is already registered")]
    NameCollision(String),

    /// The active backend does not implement a required operator.
    #[error(transparent)]
    Backend(#[from] BackendError),

    /// A configuration flag selected a code path that is intentionally
    /// not implemented.
    #[error("option '{option}' of layer '{layer}' is not implemented: {message}")]
    UnimplementedOption {
        layer: String,
        option: String,
        message: String,
    },

    /// An initializer preset name did not match any known initializer.
    #[error("unknown initializer preset '{0}'")]
    UnknownInitializer(String),

    /// Build was attempted on an already-built layer.
    #[error("layer '{0}' was already built")]
    AlreadyBuilt(String),

    /// A layer was used before its build transition ran.
    #[error("layer '{0}' has not been built yet")]
    NotBuilt(String),
}

pub type LayerResult<T> = std::result::Result<T, LayerError>;

/// The lazy-build state machine: a single permanent transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildState {
    Unbuilt,
    Built,
}

/// State embedded by every layer: name, build state, parameters,
/// activation, and the handle to the shared network context.
#[derive(Debug)]
pub struct ModuleBase {
    name: String,
    ctx: Rc<RefCell<NetworkContext>>,
    state: BuildState,
    forward_done: bool,
    act: Option<Activation>,
    act_op: Option<OperatorFn>,
    params: ParamStore,
}

impl ModuleBase {
    /// Registers the layer name (auto-generated from `prefix` when
    /// `name` is unset) and prepares an empty parameter store.
    pub fn new(
        ctx: &Rc<RefCell<NetworkContext>>,
        name: Option<&str>,
        prefix: &'static str,
        act: Option<Activation>,
    ) -> LayerResult<Self> {
        let registered = ctx.borrow_mut().register_name(name, prefix)?;
        Ok(Self {
            name: registered.clone(),
            ctx: Rc::clone(ctx),
            state: BuildState::Unbuilt,
            forward_done: false,
            act,
            act_op: None,
            params: ParamStore::new(&registered),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn context(&self) -> &Rc<RefCell<NetworkContext>> {
        &self.ctx
    }

    pub fn build_state(&self) -> BuildState {
        self.state
    }

    pub fn is_built(&self) -> bool {
        self.state == BuildState::Built
    }

    pub fn activation(&self) -> Option<Activation> {
        self.act
    }

    /// Commits the Unbuilt → Built transition and resolves the
    /// activation's operator. A second transition is a contract
    /// violation.
    pub fn mark_built(&mut self) -> LayerResult<()> {
        if self.state == BuildState::Built {
            return Err(LayerError::AlreadyBuilt(self.name.clone()));
        }
        if let Some(act) = self.act {
            self.act_op = Some(self.resolve_op(act.op_kind())?);
        }
        self.state = BuildState::Built;
        log::debug!("built layer '{}'", self.name);
        Ok(())
    }

    /// Looks up an operator in the active backend's registry.
    pub fn resolve_op(&self, op: OpKind) -> LayerResult<OperatorFn> {
        Ok(self.ctx.borrow().registry().resolve(op)?)
    }

    /// Allocates a parameter through the store, qualified by this
    /// layer's name.
    pub fn create_weight(
        &mut self,
        name: &str,
        shape: &[usize],
        init: &Initializer,
        trainable: bool,
    ) -> LayerResult<Parameter> {
        self.params.create(name, shape, init, trainable)
    }

    /// This layer's own trainable parameters, in declaration order.
    pub fn trainable_weights(&self) -> Vec<Parameter> {
        self.params.trainable()
    }

    /// All of this layer's own parameters.
    pub fn weights(&self) -> &[Parameter] {
        self.params.all()
    }

    /// Applies the configured activation through its resolved operator.
    pub(crate) fn apply_activation(&self, output: Tensor) -> LayerResult<Tensor> {
        match (self.act, self.act_op) {
            (Some(act), Some(op)) => {
                let data = op(&[output.data()], &act.attrs())?;
                Ok(Tensor::new(data))
            }
            _ => Ok(output),
        }
    }

    /// First-forward bookkeeping: flips the forward flag and, when graph
    /// tracking is on, appends this layer's node record. Runs its body
    /// at most once per layer.
    pub(crate) fn after_forward(&mut self, input: &Tensor, output: &Tensor) {
        if self.forward_done {
            return;
        }
        self.forward_done = true;
        let record = NodeRecord {
            layer: self.name.clone(),
            input_shape: input.shape().to_vec(),
            output_shape: output.shape().to_vec(),
        };
        if let Some(recorder) = self.ctx.borrow_mut().recorder_mut() {
            recorder.record(input, output, record);
        }
    }
}

/// The contract every layer implements.
///
/// Concrete layers provide [`build`](Module::build) and
/// [`compute`](Module::compute); the provided [`forward`](Module::forward)
/// drives the lazy-build transition, activation, and graph recording so
/// all layers share identical lifecycle semantics.
pub trait Module {
    fn base(&self) -> &ModuleBase;

    fn base_mut(&mut self) -> &mut ModuleBase;

    /// One-time, shape-triggered allocation: fix the input width, create
    /// parameters, resolve and bind backend operators.
    ///
    /// Called by [`forward`](Module::forward) exactly once; layers with
    /// an explicit input width call it from their constructor instead.
    fn build(&mut self, input_shape: &[usize]) -> LayerResult<()>;

    /// The layer's computation over an already-built state.
    fn compute(&mut self, input: &Tensor) -> LayerResult<Tensor>;

    /// Runs the layer: builds on the first call, then executes the
    /// resolved operators and the configured activation.
    fn forward(&mut self, input: &Tensor) -> LayerResult<Tensor> {
        if !self.base().is_built() {
            self.build(input.shape())?;
            self.base_mut().mark_built()?;
        }
        let output = self.compute(input)?;
        let output = self.base().apply_activation(output)?;
        self.base_mut().after_forward(input, &output);
        Ok(output)
    }

    fn name(&self) -> &str {
        self.base().name()
    }

    /// Trainable parameters in declaration order. Composite modules
    /// override this to recurse into their children.
    fn trainable_weights(&self) -> Vec<Parameter> {
        self.base().trainable_weights()
    }
}

/// Checks a forward input against the width fixed at build time.
pub(crate) fn check_feature_width(
    layer: &str,
    expected: usize,
    input_shape: &[usize],
) -> LayerResult<()> {
    if input_shape.last().copied() != Some(expected) {
        return Err(LayerError::Shape {
            context: layer.to_string(),
            message: format!(
                "expected trailing dimension {expected}, got input shape {input_shape:?} \
                 (the input width is fixed at first build)"
            ),
        });
    }
    Ok(())
}

/// Checks the rank of a build-time input shape.
pub(crate) fn check_rank(layer: &str, expected: usize, input_shape: &[usize]) -> LayerResult<()> {
    if input_shape.len() != expected {
        return Err(LayerError::Shape {
            context: layer.to_string(),
            message: format!(
                "expected input of rank {expected}, got rank {} - reshape or flatten the input",
                input_shape.len()
            ),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::BackendKind;

    #[test]
    fn test_mark_built_transitions_once() {
        let ctx = NetworkContext::new(BackendKind::Cpu);
        let mut base = ModuleBase::new(&ctx, None, "linear", None).unwrap();
        assert_eq!(base.build_state(), BuildState::Unbuilt);

        base.mark_built().unwrap();
        assert_eq!(base.build_state(), BuildState::Built);

        let err = base.mark_built().unwrap_err();
        assert!(matches!(err, LayerError::AlreadyBuilt(name) if name == "linear_1"));
    }

    #[test]
    fn test_activation_resolution_fails_on_missing_operator() {
        // 'sign' is absent from the parallel backend, so the build-time
        // activation resolution must surface UnsupportedOperator.
        let ctx = NetworkContext::new(BackendKind::Parallel);
        let mut base = ModuleBase::new(&ctx, None, "linear", Some(Activation::Sign)).unwrap();
        let err = base.mark_built().unwrap_err();
        assert!(matches!(
            err,
            LayerError::Backend(BackendError::UnsupportedOperator { .. })
        ));
    }

    #[test]
    fn test_rank_check_message_names_both_ranks() {
        let err = check_rank("linear_1", 2, &[16, 8, 4]).unwrap_err();
        let text = err.to_string();
        assert!(text.contains("rank 2"));
        assert!(text.contains("rank 3"));
    }
}
