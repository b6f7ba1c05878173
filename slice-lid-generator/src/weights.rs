//! Class weights and the decorator that applies them to sample weights

use std::fmt;
use std::str::FromStr;

use ndarray::{Array1, Array2, ArrayView2};
use serde::{Deserialize, Serialize};
use slice_lid_core::batch::{class_counts, class_indices};
use slice_lid_core::{Batch, BatchProvider, Error, Result};
use tracing::{debug, info};

/// Supported class weighting schemes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ClassWeightsKind {
    /// Every class contributes the same total weight
    Equal,
}

impl ClassWeightsKind {
    /// Configuration name of the scheme
    pub fn as_str(&self) -> &'static str {
        match self {
            ClassWeightsKind::Equal => "equal",
        }
    }
}

impl FromStr for ClassWeightsKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "equal" => Ok(ClassWeightsKind::Equal),
            other => Err(Error::Config(format!("Unknown class_weights: {other}"))),
        }
    }
}

impl TryFrom<String> for ClassWeightsKind {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<ClassWeightsKind> for String {
    fn from(kind: ClassWeightsKind) -> Self {
        kind.as_str().to_string()
    }
}

impl fmt::Display for ClassWeightsKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Weights `W_c = N / (C * N_c)` that equalize the total weight per class
///
/// Preserves `sum_c N_c * W_c == N`. Fails if any class has no samples.
#[allow(clippy::cast_precision_loss)]
pub fn equal_class_weights(targets: ArrayView2<'_, f32>) -> Result<Array1<f64>> {
    let counts = class_counts(targets);
    if let Some(class) = counts.iter().position(|&c| c == 0) {
        return Err(Error::ZeroClassCount { class });
    }

    let total: usize = counts.iter().sum();
    let n_classes = counts.len() as f64;
    Ok(counts
        .iter()
        .map(|&count| total as f64 / (n_classes * count as f64))
        .collect())
}

/// Class weights of the given kind for one-hot `targets`
pub fn calc_class_weights(kind: ClassWeightsKind, targets: ArrayView2<'_, f32>) -> Result<Array1<f64>> {
    match kind {
        ClassWeightsKind::Equal => equal_class_weights(targets),
    }
}

/// Multiplies every sample weight by the weight of the sample's class
///
/// Class weights are computed once, from the full target matrix of the
/// wrapped provider, when the decorator is built.
pub struct DataClassWeights {
    /// Wrapped provider
    inner: Box<dyn BatchProvider>,

    /// Weight per class index
    class_weights: Array1<f64>,
}

impl DataClassWeights {
    /// Compute class weights of `kind` over `inner` and wrap it
    pub fn new(inner: Box<dyn BatchProvider>, kind: ClassWeightsKind) -> Result<Self> {
        info!(kind = %kind, "Calculating class weights");
        let targets = inner.target_data()?;
        let class_weights = calc_class_weights(kind, targets.view())?;
        debug!(weights = ?class_weights.to_vec(), "Class weights");
        Ok(Self {
            inner,
            class_weights,
        })
    }

    /// Weight per class index
    pub fn class_weights(&self) -> &Array1<f64> {
        &self.class_weights
    }

    fn sample_weights(&self, target: ArrayView2<'_, f32>) -> Array1<f64> {
        class_indices(target)
            .into_iter()
            .map(|class| self.class_weights[class])
            .collect()
    }
}

impl BatchProvider for DataClassWeights {
    fn len(&self) -> usize {
        self.inner.len()
    }

    fn get_batch(&self, index: usize) -> Result<Batch> {
        let mut batch = self.inner.get_batch(index)?;
        let sample_weights = self.sample_weights(batch.target.view());
        for weights in &mut batch.weights {
            *weights *= &sample_weights;
        }
        Ok(batch)
    }

    fn target_data(&self) -> Result<Array2<f32>> {
        self.inner.target_data()
    }

    fn fork(&self) -> Result<Box<dyn BatchProvider>> {
        Ok(Box::new(Self {
            inner: self.inner.fork()?,
            class_weights: self.class_weights.clone(),
        }))
    }
}
