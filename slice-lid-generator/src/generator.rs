//! Batch assembly from a row store
//!
//! [`DataGenerator`] cuts a row store into consecutive row ranges of
//! `batch_size` rows and packs each range into dense tensors: scalar
//! variables into `[rows, n_vars]`, ragged variables into a NaN padded
//! `[rows, width, n_vars]` block and the target into a one-hot
//! `[rows, n_classes]` matrix.

use std::ops::Range;
use std::sync::Arc;

use ndarray::{Array1, Array2, Array3};
use serde::{Deserialize, Serialize};
use slice_lid_core::matching::MatchColumns;
use slice_lid_core::{
    check_index, Batch, BatchInputs, BatchProvider, Error, PdgIscc, PdgSign, Result, RowStore,
};
use tracing::debug;

/// Default number of rows per batch
pub const DEFAULT_BATCH_SIZE: usize = 1024;

/// Layout of the batches produced by a [`DataGenerator`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratorSpec {
    /// Rows per batch, the final batch may be shorter
    pub batch_size: usize,

    /// Cap on the ragged (prong) dimension
    pub max_length: Option<usize>,

    /// Target classes, class `i + 1` is pattern `i` and class 0 is "other"
    pub target_pdg_iscc_list: Vec<PdgIscc>,

    /// Scalar input variables, no scalar tensor when `None`
    pub vars_scalar: Option<Vec<String>>,

    /// Ragged input variables, no ragged tensor when `None`
    pub vars_ragged: Option<Vec<String>>,

    /// Particle id variable used for targets
    pub var_target_pdg: String,

    /// Interaction flag variable used for targets
    pub var_target_iscc: String,
}

impl Default for GeneratorSpec {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            max_length: None,
            target_pdg_iscc_list: Vec::new(),
            vars_scalar: None,
            vars_ragged: None,
            var_target_pdg: "mc.pdg".to_string(),
            var_target_iscc: "mc.isCC".to_string(),
        }
    }
}

impl GeneratorSpec {
    /// Number of output classes
    pub fn n_classes(&self) -> usize {
        self.target_pdg_iscc_list.len() + 1
    }

    fn variables(&self) -> impl Iterator<Item = &String> {
        self.vars_scalar
            .iter()
            .chain(self.vars_ragged.iter())
            .flatten()
            .chain([&self.var_target_pdg, &self.var_target_iscc])
    }
}

/// Assembles batches from consecutive rows of a row store
pub struct DataGenerator {
    /// Rows the batches are cut from
    store: Arc<dyn RowStore>,

    /// Batch layout
    spec: GeneratorSpec,
}

impl DataGenerator {
    /// Create a generator, checking that every configured variable exists
    pub fn new(store: Arc<dyn RowStore>, spec: GeneratorSpec) -> Result<Self> {
        if spec.batch_size == 0 {
            return Err(Error::InvalidArgument(
                "batch size must be positive".to_string(),
            ));
        }
        for name in spec.variables() {
            if !store.has_variable(name) {
                return Err(Error::missing_variable(name));
            }
        }

        debug!(
            rows = store.len(),
            batch_size = spec.batch_size,
            classes = spec.n_classes(),
            "Created data generator"
        );
        Ok(Self { store, spec })
    }

    /// Batch layout
    pub fn spec(&self) -> &GeneratorSpec {
        &self.spec
    }

    /// Underlying row store
    pub fn store(&self) -> &Arc<dyn RowStore> {
        &self.store
    }

    /// Rows covered by batch `index`
    pub fn batch_rows(&self, index: usize) -> Result<Range<usize>> {
        check_index(index, self.len())?;
        let start = index * self.spec.batch_size;
        let end = (start + self.spec.batch_size).min(self.store.len());
        Ok(start..end)
    }

    /// Pack scalar `variables` at `index` into `[rows, variables.len()]`
    #[allow(clippy::cast_possible_truncation)]
    pub fn scalar_data(&self, variables: &[String], index: &[usize]) -> Result<Array2<f32>> {
        let mut result = Array2::zeros((index.len(), variables.len()));
        for (col, name) in variables.iter().enumerate() {
            let values = self.store.get(name, Some(index))?.scalar_values(name)?;
            let values = Array1::from_iter(values.into_iter().map(|v| v as f32));
            result.column_mut(col).assign(&values);
        }
        Ok(result)
    }

    /// Pack ragged `variables` at `index` into a NaN padded
    /// `[rows, width, variables.len()]` block
    ///
    /// Rows are truncated to `max_length` when given. `width` is the longest
    /// truncated row.
    #[allow(clippy::cast_possible_truncation)]
    pub fn ragged_data(
        &self,
        variables: &[String],
        index: &[usize],
        max_length: Option<usize>,
    ) -> Result<Array3<f32>> {
        let columns = variables
            .iter()
            .map(|name| self.store.get(name, Some(index)))
            .collect::<Result<Vec<_>>>()?;
        let rows = columns
            .iter()
            .zip(variables)
            .map(|(column, name)| column.ragged_values(name))
            .collect::<Result<Vec<_>>>()?;

        let cap = max_length.unwrap_or(usize::MAX);
        let width = rows
            .iter()
            .flat_map(|values| values.iter().map(|row| row.len().min(cap)))
            .max()
            .unwrap_or(0);

        let mut result = Array3::from_elem((index.len(), width, variables.len()), f32::NAN);
        for (var, values) in rows.iter().enumerate() {
            for (row, items) in values.iter().enumerate() {
                for (pos, value) in items.iter().take(cap).enumerate() {
                    result[[row, pos, var]] = *value as f32;
                }
            }
        }
        Ok(result)
    }

    /// One-hot targets for the rows at `index`, all rows when `None`
    pub fn target_data_at(&self, index: Option<&[usize]>) -> Result<Array2<f32>> {
        let n_rows = index.map_or(self.store.len(), <[usize]>::len);
        let patterns = &self.spec.target_pdg_iscc_list;

        let pdg = self
            .store
            .get(&self.spec.var_target_pdg, index)?
            .scalar_values(&self.spec.var_target_pdg)?;
        let iscc = self
            .store
            .get(&self.spec.var_target_iscc, index)?
            .scalar_values(&self.spec.var_target_iscc)?;
        let cols = MatchColumns { pdg, iscc };

        let mut targets = Array2::zeros((n_rows, self.spec.n_classes()));
        for row in 0..n_rows {
            let class = cols
                .first_match(row, patterns, PdgSign::Unsigned)
                .map_or(0, |i| i + 1);
            targets[[row, class]] = 1.0;
        }
        Ok(targets)
    }

    /// Inputs and targets for the rows at `index`
    pub fn get_data(&self, index: &[usize]) -> Result<(BatchInputs, Array2<f32>)> {
        let scalar = match &self.spec.vars_scalar {
            Some(vars) => Some(self.scalar_data(vars, index)?),
            None => None,
        };
        let ragged = match &self.spec.vars_ragged {
            Some(vars) => Some(self.ragged_data(vars, index, self.spec.max_length)?),
            None => None,
        };
        let target = self.target_data_at(Some(index))?;
        Ok((BatchInputs { scalar, ragged }, target))
    }
}

impl BatchProvider for DataGenerator {
    fn len(&self) -> usize {
        self.store.len().div_ceil(self.spec.batch_size)
    }

    fn get_batch(&self, index: usize) -> Result<Batch> {
        let rows: Vec<usize> = self.batch_rows(index)?.collect();
        let (inputs, target) = self.get_data(&rows)?;
        Ok(Batch {
            inputs,
            target,
            weights: vec![Array1::ones(rows.len())],
        })
    }

    fn target_data(&self) -> Result<Array2<f32>> {
        self.target_data_at(None)
    }

    fn fork(&self) -> Result<Box<dyn BatchProvider>> {
        let store: Arc<dyn RowStore> = Arc::new(self.store.materialize()?);
        Ok(Box::new(Self {
            store,
            spec: self.spec.clone(),
        }))
    }
}
