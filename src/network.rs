//! The network context: scoped state shared by the layers of one model.
//!
//! A [`NetworkContext`] owns the operator registry of the active backend,
//! the layer-name ledger, and (optionally) the graph recorder. It is
//! created once per model definition and threaded through every layer
//! constructor as `Rc<RefCell<NetworkContext>>` - creating a fresh
//! context is the reset point for names and the recorded graph.
//!
//! The backend identifier is fixed when the context is created and never
//! changes afterwards; layers built under this context keep their
//! resolved operators even if other contexts are created later with a
//! different backend.

use crate::backend::{BackendKind, OperatorRegistry};
use crate::graph::GraphRecorder;
use crate::nn::module::{LayerError, LayerResult};
use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::rc::Rc;

/// Shared, graph-scoped state: name ledger, operator registry, recorder.
#[derive(Debug)]
pub struct NetworkContext {
    registry: OperatorRegistry,
    names: HashSet<String>,
    counters: HashMap<&'static str, usize>,
    recorder: Option<GraphRecorder>,
}

impl NetworkContext {
    /// Creates a context for the given backend, without graph tracking.
    pub fn new(backend: BackendKind) -> Rc<RefCell<Self>> {
        Rc::new(RefCell::new(Self {
            registry: OperatorRegistry::for_backend(backend),
            names: HashSet::new(),
            counters: HashMap::new(),
            recorder: None,
        }))
    }

    /// Creates a context with the graph-node ledger enabled.
    pub fn with_graph_tracking(backend: BackendKind) -> Rc<RefCell<Self>> {
        let ctx = Self::new(backend);
        ctx.borrow_mut().recorder = Some(GraphRecorder::new());
        ctx
    }

    /// Creates a context for the backend named by `LAYERKIT_BACKEND`
    /// (default `cpu`). An unknown identifier fails fast.
    pub fn from_env() -> LayerResult<Rc<RefCell<Self>>> {
        let backend = BackendKind::from_env()?;
        Ok(Self::new(backend))
    }

    /// The backend this context was created for.
    pub fn backend(&self) -> BackendKind {
        self.registry.backend()
    }

    /// The read-only operator registry of the active backend.
    pub fn registry(&self) -> &OperatorRegistry {
        &self.registry
    }

    /// The graph recorder, when tracking is enabled.
    pub fn recorder(&self) -> Option<&GraphRecorder> {
        self.recorder.as_ref()
    }

    pub(crate) fn recorder_mut(&mut self) -> Option<&mut GraphRecorder> {
        self.recorder.as_mut()
    }

    /// Registers a layer name, enforcing uniqueness within this context.
    ///
    /// With `requested = None` a fresh `{prefix}_{n}` name is generated.
    /// A requested name that is already taken fails with
    /// [`LayerError::NameCollision`].
    pub(crate) fn register_name(
        &mut self,
        requested: Option<&str>,
        prefix: &'static str,
    ) -> LayerResult<String> {
        if let Some(name) = requested {
            if !self.names.insert(name.to_string()) {
                return Err(LayerError::NameCollision(name.to_string()));
            }
            return Ok(name.to_string());
        }

        loop {
            let counter = self.counters.entry(prefix).or_insert(0);
            *counter += 1;
            let candidate = format!("{prefix}_{counter}");
            if self.names.insert(candidate.clone()) {
                return Ok(candidate);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auto_names_count_per_prefix() {
        let ctx = NetworkContext::new(BackendKind::Cpu);
        let mut ctx = ctx.borrow_mut();
        assert_eq!(ctx.register_name(None, "linear").unwrap(), "linear_1");
        assert_eq!(ctx.register_name(None, "linear").unwrap(), "linear_2");
        assert_eq!(
            ctx.register_name(None, "binary_linear").unwrap(),
            "binary_linear_1"
        );
    }

    #[test]
    fn test_requested_duplicate_collides() {
        let ctx = NetworkContext::new(BackendKind::Cpu);
        let mut ctx = ctx.borrow_mut();
        ctx.register_name(Some("encoder"), "linear").unwrap();
        let err = ctx.register_name(Some("encoder"), "linear").unwrap_err();
        assert!(matches!(err, LayerError::NameCollision(name) if name == "encoder"));
    }

    #[test]
    fn test_auto_name_skips_taken_names() {
        let ctx = NetworkContext::new(BackendKind::Cpu);
        let mut ctx = ctx.borrow_mut();
        ctx.register_name(Some("linear_1"), "linear").unwrap();
        assert_eq!(ctx.register_name(None, "linear").unwrap(), "linear_2");
    }

    #[test]
    fn test_tracking_flag_controls_recorder() {
        let plain = NetworkContext::new(BackendKind::Cpu);
        assert!(plain.borrow().recorder().is_none());

        let tracked = NetworkContext::with_graph_tracking(BackendKind::Cpu);
        assert!(tracked.borrow().recorder().is_some());
    }
}
