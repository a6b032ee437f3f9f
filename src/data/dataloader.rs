//! DataLoader: batched iteration over a dataset.

use super::dataset::{Dataset, InMemoryDataset};
use ndarray::ArrayD;
use rand::seq::SliceRandom;
use rand::SeedableRng;

/// One batch: stacked features and labels plus the source indices.
#[derive(Debug, Clone)]
pub struct Batch {
    pub features: ArrayD<f32>,
    pub labels: ArrayD<f32>,
    pub indices: Vec<usize>,
}

impl Batch {
    pub fn len(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }
}

/// Iterates a dataset in batches, optionally shuffled per epoch.
///
/// Every call to [`iter`](DataLoader::iter) starts a fresh, finite epoch
/// over the whole dataset, so the same loader can drive any number of
/// epochs.
pub struct DataLoader {
    dataset: InMemoryDataset,
    batch_size: usize,
    shuffle: bool,
    drop_last: bool,
    seed: Option<u64>,
}

impl DataLoader {
    pub fn new(dataset: InMemoryDataset, batch_size: usize) -> Self {
        assert!(batch_size > 0, "batch_size must be positive");
        Self {
            dataset,
            batch_size,
            shuffle: false,
            drop_last: false,
            seed: None,
        }
    }

    /// Enables or disables per-epoch shuffling.
    pub fn shuffle(mut self, shuffle: bool) -> Self {
        self.shuffle = shuffle;
        self
    }

    /// Drops the final batch when it is smaller than `batch_size`.
    pub fn drop_last(mut self, drop_last: bool) -> Self {
        self.drop_last = drop_last;
        self
    }

    /// Fixes the shuffle order for reproducible epochs.
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Number of batches per epoch.
    pub fn num_batches(&self) -> usize {
        let n = self.dataset.len();
        if self.drop_last {
            n / self.batch_size
        } else {
            n.div_ceil(self.batch_size)
        }
    }

    /// Starts a new epoch.
    pub fn iter(&self) -> BatchIter<'_> {
        let mut indices: Vec<usize> = (0..self.dataset.len()).collect();
        if self.shuffle {
            match self.seed {
                Some(seed) => {
                    let mut rng = rand::rngs::StdRng::seed_from_u64(seed);
                    indices.shuffle(&mut rng);
                }
                None => {
                    indices.shuffle(&mut rand::thread_rng());
                }
            }
        }
        BatchIter {
            loader: self,
            indices,
            cursor: 0,
        }
    }
}

/// One epoch's worth of batches.
pub struct BatchIter<'a> {
    loader: &'a DataLoader,
    indices: Vec<usize>,
    cursor: usize,
}

impl Iterator for BatchIter<'_> {
    type Item = Batch;

    fn next(&mut self) -> Option<Batch> {
        if self.cursor >= self.indices.len() {
            return None;
        }
        let end = (self.cursor + self.loader.batch_size).min(self.indices.len());
        let chunk = &self.indices[self.cursor..end];
        if self.loader.drop_last && chunk.len() < self.loader.batch_size {
            self.cursor = self.indices.len();
            return None;
        }
        self.cursor = end;

        Some(Batch {
            features: self.loader.dataset.features_batch(chunk),
            labels: self.loader.dataset.labels_batch(chunk),
            indices: chunk.to_vec(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::IxDyn;

    fn dataset(n: usize) -> InMemoryDataset {
        let features = ArrayD::from_shape_vec(
            IxDyn(&[n, 2]),
            (0..n * 2).map(|v| v as f32).collect(),
        )
        .unwrap();
        let labels = ArrayD::zeros(IxDyn(&[n, 1]));
        InMemoryDataset::new(features, labels)
    }

    #[test]
    fn test_batches_cover_the_dataset() {
        let loader = DataLoader::new(dataset(10), 4);
        let batches: Vec<Batch> = loader.iter().collect();
        assert_eq!(batches.len(), 3);
        assert_eq!(batches[0].len(), 4);
        assert_eq!(batches[2].len(), 2);
        assert_eq!(batches[0].features.shape(), &[4, 2]);
    }

    #[test]
    fn test_drop_last_discards_partial_batch() {
        let loader = DataLoader::new(dataset(10), 4).drop_last(true);
        assert_eq!(loader.num_batches(), 2);
        let batches: Vec<Batch> = loader.iter().collect();
        assert_eq!(batches.len(), 2);
    }

    #[test]
    fn test_epochs_are_restartable() {
        let loader = DataLoader::new(dataset(6), 2);
        let first: usize = loader.iter().count();
        let second: usize = loader.iter().count();
        assert_eq!(first, 3);
        assert_eq!(second, 3);
    }

    #[test]
    fn test_seeded_shuffle_is_reproducible() {
        let loader = DataLoader::new(dataset(16), 4).shuffle(true).seed(42);
        let a: Vec<Vec<usize>> = loader.iter().map(|b| b.indices).collect();
        let b: Vec<Vec<usize>> = loader.iter().map(|b| b.indices).collect();
        assert_eq!(a, b);

        let mut all: Vec<usize> = a.into_iter().flatten().collect();
        all.sort_unstable();
        assert_eq!(all, (0..16).collect::<Vec<_>>());
    }
}
