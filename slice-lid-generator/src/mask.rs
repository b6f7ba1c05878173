//! NaN padding replacement

use ndarray::Array2;
use slice_lid_core::{Batch, BatchProvider, Result};

/// Value that replaces NaN padding by default
pub const DEFAULT_MASK: f32 = 0.0;

/// Replaces NaN entries of ragged inputs with a fixed mask value
///
/// Meant to be the last decorator of a pipeline so caches below it keep
/// the NaN padded batches.
pub struct DataNANMask {
    /// Wrapped provider
    inner: Box<dyn BatchProvider>,

    /// Replacement for NaN padding
    mask: f32,
}

impl DataNANMask {
    /// Wrap `inner`, replacing NaN with `mask`
    pub fn new(inner: Box<dyn BatchProvider>, mask: f32) -> Self {
        Self { inner, mask }
    }

    /// Replacement value
    pub fn mask(&self) -> f32 {
        self.mask
    }
}

impl BatchProvider for DataNANMask {
    fn len(&self) -> usize {
        self.inner.len()
    }

    fn get_batch(&self, index: usize) -> Result<Batch> {
        let mut batch = self.inner.get_batch(index)?;
        if let Some(ragged) = batch.inputs.ragged.as_mut() {
            let mask = self.mask;
            ragged.mapv_inplace(|v| if v.is_nan() { mask } else { v });
        }
        Ok(batch)
    }

    fn target_data(&self) -> Result<Array2<f32>> {
        self.inner.target_data()
    }

    fn fork(&self) -> Result<Box<dyn BatchProvider>> {
        Ok(Box::new(DataNANMask::new(self.inner.fork()?, self.mask)))
    }
}
