//! Length plus indexed-access adapter handed to the training loop

use ndarray::Array2;
use slice_lid_core::{Batch, BatchProvider, Batches, Result};

/// Exposes a decorated pipeline as an epoch-iterable batch sequence
pub struct BatchSequence {
    provider: Box<dyn BatchProvider>,
}

impl BatchSequence {
    /// Wrap the outermost provider of a pipeline
    pub fn new(provider: Box<dyn BatchProvider>) -> Self {
        Self { provider }
    }

    /// Number of batches per epoch
    pub fn len(&self) -> usize {
        self.provider.len()
    }

    /// Whether an epoch has no batches
    pub fn is_empty(&self) -> bool {
        self.provider.is_empty()
    }

    /// Batch `index` of the epoch
    pub fn get(&self, index: usize) -> Result<Batch> {
        self.provider.get_batch(index)
    }

    /// Iterate one epoch in order
    pub fn epoch(&self) -> Batches<'_> {
        Batches::new(&*self.provider)
    }

    /// One-hot targets of the whole partition
    pub fn target_data(&self) -> Result<Array2<f32>> {
        self.provider.target_data()
    }

    /// Unwrap the provider
    pub fn into_inner(self) -> Box<dyn BatchProvider> {
        self.provider
    }
}

impl<'a> IntoIterator for &'a BatchSequence {
    type Item = Result<Batch>;
    type IntoIter = Batches<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.epoch()
    }
}
