//! In-memory batch cache

use std::sync::RwLock;

use ndarray::Array2;
use slice_lid_core::{check_index, Batch, BatchProvider, Result};
use tracing::debug;

/// Keeps every batch in memory after it is first computed
///
/// The first full pass over the provider materializes all batches, later
/// passes are served from memory.
pub struct DataCache {
    /// Wrapped provider
    inner: Box<dyn BatchProvider>,

    /// Retained batches by index
    slots: RwLock<Vec<Option<Batch>>>,
}

impl DataCache {
    /// Wrap `inner` with an empty cache
    pub fn new(inner: Box<dyn BatchProvider>) -> Self {
        let len = inner.len();
        Self {
            inner,
            slots: RwLock::new(vec![None; len]),
        }
    }

    /// Compute and retain every batch that is not cached yet
    pub fn warm(&self) -> Result<()> {
        for index in 0..self.len() {
            self.get_batch(index)?;
        }
        Ok(())
    }

    /// Number of batches currently retained
    pub fn cached(&self) -> Result<usize> {
        Ok(self.slots.read()?.iter().filter(|s| s.is_some()).count())
    }
}

impl BatchProvider for DataCache {
    fn len(&self) -> usize {
        self.inner.len()
    }

    fn get_batch(&self, index: usize) -> Result<Batch> {
        check_index(index, self.len())?;
        if let Some(batch) = &self.slots.read()?[index] {
            return Ok(batch.clone());
        }

        let batch = self.inner.get_batch(index)?;
        let mut slots = self.slots.write()?;
        // another caller may have filled the slot meanwhile, keep the first
        let retained = slots[index].get_or_insert_with(|| batch);
        debug!(index, "Cached batch");
        Ok(retained.clone())
    }

    fn target_data(&self) -> Result<Array2<f32>> {
        self.inner.target_data()
    }

    fn fork(&self) -> Result<Box<dyn BatchProvider>> {
        Ok(Box::new(DataCache::new(self.inner.fork()?)))
    }
}
