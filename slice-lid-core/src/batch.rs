//! Assembled training batches

use ndarray::{Array, Array1, Array2, Array3, ArrayView2, Axis, Dimension};
use serde::{Deserialize, Serialize};

/// Name of the scalar input tensor
pub const INPUT_SCALAR: &str = "input_scalar";

/// Name of the ragged input tensor
pub const INPUT_RAGGED: &str = "input_ragged";

/// Name of the target tensor
pub const TARGET: &str = "target";

/// Input tensors of a batch
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct BatchInputs {
    /// `[rows, n_scalar_vars]`, present when scalar variables are configured
    pub scalar: Option<Array2<f32>>,

    /// `[rows, max_length, n_ragged_vars]`, NaN padded, present when ragged
    /// variables are configured
    pub ragged: Option<Array3<f32>>,
}

impl BatchInputs {
    /// Names of the tensors that are present
    pub fn names(&self) -> Vec<&'static str> {
        let mut names = Vec::with_capacity(2);
        if self.scalar.is_some() {
            names.push(INPUT_SCALAR);
        }
        if self.ragged.is_some() {
            names.push(INPUT_RAGGED);
        }
        names
    }
}

/// One batch: inputs, one-hot targets and per-sample weight vectors
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Batch {
    /// Input tensors
    pub inputs: BatchInputs,

    /// One-hot targets, `[rows, n_classes]`
    pub target: Array2<f32>,

    /// Per-sample weight vectors, one per output
    pub weights: Vec<Array1<f64>>,
}

impl Batch {
    /// Number of samples in the batch
    pub fn len(&self) -> usize {
        self.target.nrows()
    }

    /// Whether the batch has no samples
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Class index of every sample
    pub fn classes(&self) -> Vec<usize> {
        class_indices(self.target.view())
    }

    /// Equality that compares floats bit-for-bit, so NaN equals itself
    pub fn same_bits(&self, other: &Batch) -> bool {
        fn same<D: Dimension>(a: &Array<f32, D>, b: &Array<f32, D>) -> bool {
            a.shape() == b.shape() && a.iter().zip(b).all(|(x, y)| x.to_bits() == y.to_bits())
        }

        fn same_opt<D: Dimension>(a: Option<&Array<f32, D>>, b: Option<&Array<f32, D>>) -> bool {
            match (a, b) {
                (Some(a), Some(b)) => same(a, b),
                (None, None) => true,
                _ => false,
            }
        }

        same(&self.target, &other.target)
            && same_opt(self.inputs.scalar.as_ref(), other.inputs.scalar.as_ref())
            && same_opt(self.inputs.ragged.as_ref(), other.inputs.ragged.as_ref())
            && self.weights.len() == other.weights.len()
            && self.weights.iter().zip(&other.weights).all(|(a, b)| {
                a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.to_bits() == y.to_bits())
            })
    }
}

/// Index of the largest entry of every row (the first one on ties)
pub fn class_indices(targets: ArrayView2<'_, f32>) -> Vec<usize> {
    targets
        .axis_iter(Axis(0))
        .map(|row| {
            let mut best = 0;
            for (i, v) in row.iter().enumerate() {
                if *v > row[best] {
                    best = i;
                }
            }
            best
        })
        .collect()
}

/// Number of samples per class
pub fn class_counts(targets: ArrayView2<'_, f32>) -> Vec<usize> {
    let mut counts = vec![0; targets.ncols()];
    for class in class_indices(targets) {
        counts[class] += 1;
    }
    counts
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{arr1, arr2, Array3};

    fn batch(ragged_fill: f32) -> Batch {
        Batch {
            inputs: BatchInputs {
                scalar: Some(arr2(&[[1.0, 2.0]])),
                ragged: Some(Array3::from_elem((1, 2, 1), ragged_fill)),
            },
            target: arr2(&[[0.0, 1.0]]),
            weights: vec![arr1(&[1.0])],
        }
    }

    #[test]
    fn test_class_counts() {
        let t = arr2(&[[0.0, 1.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]]);
        assert_eq!(class_indices(t.view()), vec![1, 0, 1]);
        assert_eq!(class_counts(t.view()), vec![1, 2, 0]);
    }

    #[test]
    fn test_same_bits_handles_nan() {
        let a = batch(f32::NAN);
        assert_ne!(a, a.clone());
        assert!(a.same_bits(&a.clone()));
        assert!(!a.same_bits(&batch(0.0)));
    }

    #[test]
    fn test_input_names() {
        let b = batch(0.0);
        assert_eq!(b.inputs.names(), vec![INPUT_SCALAR, INPUT_RAGGED]);
        assert_eq!(BatchInputs::default().names(), Vec::<&str>::new());
        assert_eq!(b.len(), 1);
        assert_eq!(b.classes(), vec![1]);
    }

    #[test]
    fn test_bincode_preserves_nan_bits() {
        let b = batch(f32::NAN);
        let bytes = bincode::serialize(&b).unwrap();
        let back: Batch = bincode::deserialize(&bytes).unwrap();
        assert!(b.same_bits(&back));
    }
}
