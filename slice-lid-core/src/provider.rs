//! The indexed batch provider contract shared by every pipeline stage

use std::sync::Arc;

use ndarray::Array2;

use crate::batch::Batch;
use crate::error::Result;

/// A finite, randomly addressable sequence of batches
///
/// `get_batch(i)` is defined for `0 <= i < len()` and fails with
/// [`crate::Error::IndexOutOfBounds`] otherwise. Decorators wrap another
/// provider and must preserve its length and batch order.
pub trait BatchProvider: Send + Sync {
    /// Number of batches
    fn len(&self) -> usize;

    /// Whether there are no batches
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Batch `index`
    fn get_batch(&self, index: usize) -> Result<Batch>;

    /// One-hot targets of every sample, in batch order
    fn target_data(&self) -> Result<Array2<f32>>;

    /// An equivalent provider that shares no mutable state with `self`
    ///
    /// The copy owns its own row storage, so it can be moved to a worker
    /// that must not touch this one.
    fn fork(&self) -> Result<Box<dyn BatchProvider>>;
}

impl<P: BatchProvider + ?Sized> BatchProvider for Box<P> {
    fn len(&self) -> usize {
        (**self).len()
    }

    fn get_batch(&self, index: usize) -> Result<Batch> {
        (**self).get_batch(index)
    }

    fn target_data(&self) -> Result<Array2<f32>> {
        (**self).target_data()
    }

    fn fork(&self) -> Result<Box<dyn BatchProvider>> {
        (**self).fork()
    }
}

impl<P: BatchProvider + ?Sized> BatchProvider for Arc<P> {
    fn len(&self) -> usize {
        (**self).len()
    }

    fn get_batch(&self, index: usize) -> Result<Batch> {
        (**self).get_batch(index)
    }

    fn target_data(&self) -> Result<Array2<f32>> {
        (**self).target_data()
    }

    fn fork(&self) -> Result<Box<dyn BatchProvider>> {
        (**self).fork()
    }
}

/// Iterator over every batch of a provider, in order
pub struct Batches<'a> {
    provider: &'a dyn BatchProvider,
    next: usize,
}

impl<'a> Batches<'a> {
    /// Iterate `provider` from its first batch
    pub fn new(provider: &'a dyn BatchProvider) -> Self {
        Self { provider, next: 0 }
    }
}

impl Iterator for Batches<'_> {
    type Item = Result<Batch>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.next >= self.provider.len() {
            return None;
        }
        let batch = self.provider.get_batch(self.next);
        self.next += 1;
        Some(batch)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.provider.len().saturating_sub(self.next);
        (remaining, Some(remaining))
    }
}
