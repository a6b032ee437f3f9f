//! The `Dataset` trait and the in-memory implementation.

use ndarray::{ArrayD, Axis};

/// A finite, indexable source of (features, label) pairs.
pub trait Dataset {
    /// Number of samples.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// One sample and its label, or `None` past the end.
    fn get(&self, index: usize) -> Option<(ArrayD<f32>, ArrayD<f32>)>;
}

/// A dataset held entirely in memory.
///
/// The first axis of both arrays indexes samples.
#[derive(Debug, Clone)]
pub struct InMemoryDataset {
    features: ArrayD<f32>,
    labels: ArrayD<f32>,
    num_samples: usize,
}

impl InMemoryDataset {
    /// Creates a dataset from feature and label arrays.
    ///
    /// # Panics
    ///
    /// Panics if the arrays disagree on the number of samples.
    pub fn new(features: ArrayD<f32>, labels: ArrayD<f32>) -> Self {
        let num_samples = features.shape()[0];
        assert_eq!(
            num_samples,
            labels.shape()[0],
            "number of samples in features and labels must match"
        );
        Self {
            features,
            labels,
            num_samples,
        }
    }

    /// Shape of one feature sample (without the sample axis).
    pub fn feature_shape(&self) -> Vec<usize> {
        self.features.shape()[1..].to_vec()
    }

    /// Shape of one label (without the sample axis).
    pub fn label_shape(&self) -> Vec<usize> {
        self.labels.shape()[1..].to_vec()
    }

    /// Stacks the feature rows at `indices` into one batch array.
    pub fn features_batch(&self, indices: &[usize]) -> ArrayD<f32> {
        self.features.select(Axis(0), indices)
    }

    /// Stacks the label rows at `indices` into one batch array.
    pub fn labels_batch(&self, indices: &[usize]) -> ArrayD<f32> {
        self.labels.select(Axis(0), indices)
    }
}

impl Dataset for InMemoryDataset {
    fn len(&self) -> usize {
        self.num_samples
    }

    fn get(&self, index: usize) -> Option<(ArrayD<f32>, ArrayD<f32>)> {
        if index >= self.num_samples {
            return None;
        }
        Some((
            self.features.index_axis(Axis(0), index).to_owned(),
            self.labels.index_axis(Axis(0), index).to_owned(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::IxDyn;

    #[test]
    fn test_in_memory_dataset() {
        let features = ArrayD::from_shape_vec(
            IxDyn(&[4, 3]),
            vec![
                1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0, 10.0, 11.0, 12.0,
            ],
        )
        .unwrap();
        let labels = ArrayD::from_shape_vec(IxDyn(&[4, 1]), vec![0.0, 1.0, 0.0, 1.0]).unwrap();

        let dataset = InMemoryDataset::new(features, labels);
        assert_eq!(dataset.len(), 4);
        assert_eq!(dataset.feature_shape(), vec![3]);
        assert_eq!(dataset.label_shape(), vec![1]);

        let (item, label) = dataset.get(1).unwrap();
        assert_eq!(item.len(), 3);
        assert_eq!(item[[0]], 4.0);
        assert_eq!(label[[0]], 1.0);

        assert!(dataset.get(4).is_none());
    }

    #[test]
    fn test_batch_retrieval() {
        let features = ArrayD::from_shape_vec(
            IxDyn(&[4, 2]),
            vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0],
        )
        .unwrap();
        let labels = ArrayD::zeros(IxDyn(&[4]));

        let dataset = InMemoryDataset::new(features, labels);
        let batch = dataset.features_batch(&[0, 2]);
        assert_eq!(batch.shape(), &[2, 2]);
        assert_eq!(batch[[1, 0]], 5.0);
    }
}
