//! Row stores and row-subset views

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;

use serde_json::Value;
use tracing::debug;

use crate::column::Column;
use crate::error::{check_index, Error, Result};

/// Columnar, randomly addressable collection of samples
///
/// Every variable has exactly [`RowStore::len`] rows. Reads with an index
/// list return rows in the order of the list.
pub trait RowStore: Send + Sync {
    /// Number of rows
    fn len(&self) -> usize;

    /// Whether the store has no rows
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Names of the variables held by this store
    fn variables(&self) -> Vec<String>;

    /// Read `variable` at `indices`, or every row when `indices` is `None`
    fn get(&self, variable: &str, indices: Option<&[usize]>) -> Result<Column>;

    /// Whether `variable` exists in this store
    fn has_variable(&self, variable: &str) -> bool {
        self.variables().iter().any(|v| v == variable)
    }

    /// Copy every variable into a standalone in-memory store
    fn materialize(&self) -> Result<MemoryStore> {
        let mut builder = MemoryStoreBuilder::new();
        for name in self.variables() {
            let column = self.get(&name, None)?;
            builder = builder.column(&name, column);
        }
        builder.build()
    }
}

/// A row store held entirely in memory
#[derive(Debug, Clone, PartialEq)]
pub struct MemoryStore {
    /// Columns keyed by variable name
    columns: BTreeMap<String, Column>,

    /// Shared row count of all columns
    len: usize,
}

impl MemoryStore {
    /// Create a store from named columns of equal length
    pub fn new<I, S>(columns: I) -> Result<Self>
    where
        I: IntoIterator<Item = (S, Column)>,
        S: Into<String>,
    {
        let mut builder = MemoryStoreBuilder::new();
        for (name, column) in columns {
            builder.columns.push((name.into(), column));
        }
        builder.build()
    }

    /// Load a store from a JSON object mapping variable names to arrays
    ///
    /// Arrays of arrays become ragged columns, arrays of integers or booleans
    /// become integer columns and any other numeric array becomes a float
    /// column.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)?;
        let store = Self::from_json_str(&text)?;
        debug!(
            path = %path.display(),
            rows = store.len,
            variables = store.columns.len(),
            "Loaded row store"
        );
        Ok(store)
    }

    /// Parse a store from JSON text, see [`MemoryStore::from_json_file`]
    pub fn from_json_str(text: &str) -> Result<Self> {
        let raw: BTreeMap<String, Value> = serde_json::from_str(text)?;
        let mut builder = MemoryStoreBuilder::new();
        for (name, value) in raw {
            let column = column_from_json(&name, &value)?;
            builder = builder.column(&name, column);
        }
        builder.build()
    }

    /// Borrow a column without copying
    pub fn column(&self, variable: &str) -> Option<&Column> {
        self.columns.get(variable)
    }
}

impl RowStore for MemoryStore {
    fn len(&self) -> usize {
        self.len
    }

    fn variables(&self) -> Vec<String> {
        self.columns.keys().cloned().collect()
    }

    fn get(&self, variable: &str, indices: Option<&[usize]>) -> Result<Column> {
        let column = self
            .columns
            .get(variable)
            .ok_or_else(|| Error::missing_variable(variable))?;
        match indices {
            None => Ok(column.clone()),
            Some(indices) => column.take(indices),
        }
    }

    fn has_variable(&self, variable: &str) -> bool {
        self.columns.contains_key(variable)
    }
}

/// Builder for [`MemoryStore`]
#[derive(Debug, Default)]
pub struct MemoryStoreBuilder {
    /// Columns in insertion order
    columns: Vec<(String, Column)>,
}

impl MemoryStoreBuilder {
    /// Create an empty builder
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a column
    pub fn column(mut self, name: &str, column: impl Into<Column>) -> Self {
        self.columns.push((name.to_string(), column.into()));
        self
    }

    /// Validate column lengths and build the store
    pub fn build(self) -> Result<MemoryStore> {
        let len = self.columns.first().map_or(0, |(_, c)| c.len());
        let mut columns = BTreeMap::new();
        for (name, column) in self.columns {
            if column.len() != len {
                return Err(Error::LengthMismatch {
                    name,
                    expected: len,
                    actual: column.len(),
                });
            }
            if columns.insert(name.clone(), column).is_some() {
                return Err(Error::InvalidArgument(format!(
                    "duplicate variable '{name}'"
                )));
            }
        }
        Ok(MemoryStore { columns, len })
    }
}

fn column_from_json(name: &str, value: &Value) -> Result<Column> {
    let rows = value.as_array().ok_or_else(|| {
        Error::TypeMismatch(format!("variable '{name}' must be a JSON array"))
    })?;

    let number = |v: &Value| {
        v.as_f64().ok_or_else(|| {
            Error::TypeMismatch(format!("variable '{name}' holds non-numeric value {v}"))
        })
    };

    if !rows.is_empty() && rows.iter().all(Value::is_array) {
        let ragged = rows
            .iter()
            .map(|row| {
                row.as_array()
                    .map_or(Ok(Vec::new()), |items| items.iter().map(number).collect())
            })
            .collect::<Result<Vec<_>>>()?;
        return Ok(Column::Ragged(ragged));
    }

    // flags stored as JSON booleans become 0/1 integers
    let integer = |v: &Value| v.as_i64().or_else(|| v.as_bool().map(i64::from));
    if rows.iter().all(|v| integer(v).is_some()) {
        let ints = rows.iter().filter_map(integer).collect();
        return Ok(Column::Int(ints));
    }

    let floats = rows.iter().map(number).collect::<Result<Vec<_>>>()?;
    Ok(Column::Float(floats))
}

/// A view of a subset of the rows of a parent store
///
/// Row `i` of the view is row `indices[i]` of the parent.
#[derive(Clone)]
pub struct RowSlice {
    /// Store the rows are read from
    parent: Arc<dyn RowStore>,

    /// Parent row of every view row
    indices: Vec<usize>,
}

impl RowSlice {
    /// Create a view over `indices` of `parent`
    pub fn new(parent: Arc<dyn RowStore>, indices: Vec<usize>) -> Result<Self> {
        let len = parent.len();
        for &index in &indices {
            check_index(index, len)?;
        }
        Ok(Self { parent, indices })
    }

    /// Parent row of every view row
    pub fn indices(&self) -> &[usize] {
        &self.indices
    }

    /// Store the rows are read from
    pub fn parent(&self) -> &Arc<dyn RowStore> {
        &self.parent
    }
}

impl std::fmt::Debug for RowSlice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RowSlice")
            .field("parent_len", &self.parent.len())
            .field("len", &self.indices.len())
            .finish()
    }
}

impl RowStore for RowSlice {
    fn len(&self) -> usize {
        self.indices.len()
    }

    fn variables(&self) -> Vec<String> {
        self.parent.variables()
    }

    fn get(&self, variable: &str, indices: Option<&[usize]>) -> Result<Column> {
        match indices {
            None => self.parent.get(variable, Some(&self.indices)),
            Some(local) => {
                let mapped = local
                    .iter()
                    .map(|&i| {
                        self.indices.get(i).copied().ok_or(Error::IndexOutOfBounds {
                            index: i,
                            len: self.indices.len(),
                        })
                    })
                    .collect::<Result<Vec<_>>>()?;
                self.parent.get(variable, Some(&mapped))
            }
        }
    }

    fn has_variable(&self, variable: &str) -> bool {
        self.parent.has_variable(variable)
    }
}
