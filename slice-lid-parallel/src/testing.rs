//! Providers used by the unit tests of this crate

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use ndarray::{Array1, Array2, Array3};
use slice_lid_core::{check_index, Batch, BatchInputs, BatchProvider, Error, Result};

fn numbered_batch(index: usize) -> Batch {
    let value = index as f32;
    let mut ragged = Array3::from_elem((1, 2, 1), value);
    ragged[[0, 1, 0]] = f32::NAN;
    Batch {
        inputs: BatchInputs {
            scalar: Some(Array2::from_elem((1, 2), value)),
            ragged: Some(ragged),
        },
        target: Array2::from_elem((1, 1), 1.0),
        weights: vec![Array1::from_elem(1, value as f64)],
    }
}

/// Provider whose later batches finish first
pub(crate) struct Scrambled {
    len: usize,
    calls: Arc<AtomicUsize>,
}

impl Scrambled {
    pub(crate) fn new(len: usize) -> Self {
        Self {
            len,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub(crate) fn calls(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.calls)
    }
}

impl BatchProvider for Scrambled {
    fn len(&self) -> usize {
        self.len
    }

    fn get_batch(&self, index: usize) -> Result<Batch> {
        check_index(index, self.len)?;
        self.calls.fetch_add(1, Ordering::SeqCst);
        let delay = (self.len - index) as u64 * 200;
        thread::sleep(Duration::from_micros(delay));
        Ok(numbered_batch(index))
    }

    fn target_data(&self) -> Result<Array2<f32>> {
        Ok(Array2::from_elem((self.len, 1), 1.0))
    }

    fn fork(&self) -> Result<Box<dyn BatchProvider>> {
        Ok(Box::new(Scrambled::new(self.len)))
    }
}

/// Provider that fails for one batch index
pub(crate) struct Failing {
    len: usize,
    bad: usize,
}

impl Failing {
    pub(crate) fn new(len: usize, bad: usize) -> Self {
        Self { len, bad }
    }
}

impl BatchProvider for Failing {
    fn len(&self) -> usize {
        self.len
    }

    fn get_batch(&self, index: usize) -> Result<Batch> {
        check_index(index, self.len)?;
        if index == self.bad {
            return Err(Error::PipelineExecution(format!("batch {index} failed")));
        }
        Ok(numbered_batch(index))
    }

    fn target_data(&self) -> Result<Array2<f32>> {
        Ok(Array2::from_elem((self.len, 1), 1.0))
    }

    fn fork(&self) -> Result<Box<dyn BatchProvider>> {
        Ok(Box::new(Failing::new(self.len, self.bad)))
    }
}
