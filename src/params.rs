//! Parameter storage: named, shared-mutable, backend-native weight tensors.
//!
//! Every layer owns a [`ParamStore`] that allocates its parameters during
//! build. A [`Parameter`] hands out shared access to the underlying
//! storage so an external optimizer can update it in place between
//! forward passes, while shape, name and the trainable flag stay fixed
//! for the parameter's whole lifetime. There is no deletion: parameters
//! live exactly as long as the layer that created them.

use crate::init::Initializer;
use crate::nn::module::{LayerError, LayerResult};
use ndarray::ArrayD;
use std::cell::{Ref, RefCell, RefMut};
use std::rc::Rc;

/// A named, owned, mutable weight tensor.
///
/// Cloning a `Parameter` clones the handle, not the storage - all clones
/// observe the same in-place updates.
#[derive(Debug, Clone)]
pub struct Parameter {
    name: String,
    shape: Vec<usize>,
    trainable: bool,
    data: Rc<RefCell<ArrayD<f32>>>,
}

impl Parameter {
    /// The qualified name, e.g. `"linear_1/weights"`.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The shape fixed at creation.
    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    /// Whether an optimizer should update this parameter.
    pub fn trainable(&self) -> bool {
        self.trainable
    }

    /// Borrows the current value.
    pub fn value(&self) -> Ref<'_, ArrayD<f32>> {
        self.data.borrow()
    }

    /// Mutably borrows the value for an in-place update.
    ///
    /// Callers must not hold this borrow across a forward call; the
    /// module lifecycle is strictly serialized.
    pub fn value_mut(&self) -> RefMut<'_, ArrayD<f32>> {
        self.data.borrow_mut()
    }

    /// Replaces the value, keeping the shape contract.
    pub fn assign(&self, value: ArrayD<f32>) -> LayerResult<()> {
        if value.shape() != self.shape.as_slice() {
            return Err(LayerError::Shape {
                context: self.name.clone(),
                message: format!(
                    "cannot assign value of shape {:?} to parameter of shape {:?}",
                    value.shape(),
                    self.shape
                ),
            });
        }
        *self.data.borrow_mut() = value;
        Ok(())
    }

    /// True when both handles point at the same storage.
    pub fn same_storage(a: &Parameter, b: &Parameter) -> bool {
        Rc::ptr_eq(&a.data, &b.data)
    }
}

/// Allocates and owns the parameters of one layer.
///
/// Parameter names are qualified with the owning layer's name, and stay
/// unique within the store. Creation order is preserved - it is the
/// order [`trainable`](ParamStore::trainable) reports.
#[derive(Debug, Default)]
pub struct ParamStore {
    owner: String,
    slots: Vec<Parameter>,
}

impl ParamStore {
    pub fn new(owner: &str) -> Self {
        Self {
            owner: owner.to_string(),
            slots: Vec::new(),
        }
    }

    /// Creates a parameter, sampling its initial value once.
    ///
    /// Fails with a shape error when any dimension is zero, and with a
    /// name collision when `name` was already created in this store.
    pub fn create(
        &mut self,
        name: &str,
        shape: &[usize],
        init: &Initializer,
        trainable: bool,
    ) -> LayerResult<Parameter> {
        if let Some(axis) = shape.iter().position(|&d| d == 0) {
            return Err(LayerError::Shape {
                context: self.owner.clone(),
                message: format!(
                    "dimension {axis} of parameter '{name}' must be positive, got shape {shape:?}"
                ),
            });
        }

        let qualified = format!("{}/{}", self.owner, name);
        if self.slots.iter().any(|p| p.name == qualified) {
            return Err(LayerError::NameCollision(qualified));
        }

        let param = Parameter {
            name: qualified,
            shape: shape.to_vec(),
            trainable,
            data: Rc::new(RefCell::new(init.sample(shape))),
        };
        self.slots.push(param.clone());
        Ok(param)
    }

    /// All parameters, in creation order.
    pub fn all(&self) -> &[Parameter] {
        &self.slots
    }

    /// Parameters with the trainable flag set, in creation order.
    pub fn trainable(&self) -> Vec<Parameter> {
        self.slots
            .iter()
            .filter(|p| p.trainable)
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_reports_requested_shape() {
        let mut store = ParamStore::new("dense_1");
        let p = store
            .create("weights", &[100, 256], &Initializer::Zeros, true)
            .unwrap();
        assert_eq!(p.shape(), &[100, 256]);
        assert_eq!(p.value().shape(), &[100, 256]);
        assert_eq!(p.name(), "dense_1/weights");
        assert!(p.trainable());
    }

    #[test]
    fn test_zero_dimension_is_a_shape_error() {
        let mut store = ParamStore::new("dense_1");
        let err = store
            .create("weights", &[0, 256], &Initializer::Zeros, true)
            .unwrap_err();
        assert!(matches!(err, LayerError::Shape { .. }));
    }

    #[test]
    fn test_duplicate_name_collides() {
        let mut store = ParamStore::new("dense_1");
        store
            .create("weights", &[4, 4], &Initializer::Zeros, true)
            .unwrap();
        let err = store
            .create("weights", &[4, 4], &Initializer::Zeros, true)
            .unwrap_err();
        assert!(
            matches!(err, LayerError::NameCollision(name) if name == "dense_1/weights")
        );
    }

    #[test]
    fn test_trainable_filter_keeps_declaration_order() {
        let mut store = ParamStore::new("layer");
        store
            .create("weights", &[2, 2], &Initializer::Zeros, true)
            .unwrap();
        store
            .create("running_mean", &[2], &Initializer::Zeros, false)
            .unwrap();
        store
            .create("biases", &[2], &Initializer::Zeros, true)
            .unwrap();

        let trainable = store.trainable();
        assert_eq!(trainable.len(), 2);
        assert_eq!(trainable[0].name(), "layer/weights");
        assert_eq!(trainable[1].name(), "layer/biases");
    }

    #[test]
    fn test_in_place_update_is_visible_through_all_handles() {
        let mut store = ParamStore::new("layer");
        let p = store
            .create("weights", &[2], &Initializer::Zeros, true)
            .unwrap();
        let other = store.trainable().remove(0);
        assert!(Parameter::same_storage(&p, &other));

        p.value_mut()[[0]] = 3.5;
        assert_eq!(other.value()[[0]], 3.5);
    }
}
