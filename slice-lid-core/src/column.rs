//! Typed columns of per-row values

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Values of one variable, one entry per row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Column {
    /// Integer scalars (particle ids, interaction flags)
    Int(Vec<i64>),

    /// Floating point scalars
    Float(Vec<f64>),

    /// Variable-length sequences of floats, e.g. per-prong quantities
    Ragged(Vec<Vec<f64>>),
}

impl Column {
    /// Number of rows in the column
    pub fn len(&self) -> usize {
        match self {
            Column::Int(v) => v.len(),
            Column::Float(v) => v.len(),
            Column::Ragged(v) => v.len(),
        }
    }

    /// Whether the column has no rows
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether each row holds a sequence rather than a scalar
    pub fn is_ragged(&self) -> bool {
        matches!(self, Column::Ragged(_))
    }

    /// Name of the storage kind, used in error messages
    pub fn kind(&self) -> &'static str {
        match self {
            Column::Int(_) => "int",
            Column::Float(_) => "float",
            Column::Ragged(_) => "ragged",
        }
    }

    /// Gather the rows at `indices`, in the given order
    pub fn take(&self, indices: &[usize]) -> Result<Column> {
        fn gather<T: Clone>(values: &[T], indices: &[usize]) -> Result<Vec<T>> {
            indices
                .iter()
                .map(|&i| {
                    values.get(i).cloned().ok_or(Error::IndexOutOfBounds {
                        index: i,
                        len: values.len(),
                    })
                })
                .collect()
        }

        Ok(match self {
            Column::Int(v) => Column::Int(gather(v, indices)?),
            Column::Float(v) => Column::Float(gather(v, indices)?),
            Column::Ragged(v) => Column::Ragged(gather(v, indices)?),
        })
    }

    /// Scalar values widened to `f64`. Fails for ragged columns.
    pub fn scalar_values(&self, name: &str) -> Result<Vec<f64>> {
        match self {
            #[allow(clippy::cast_precision_loss)]
            Column::Int(v) => Ok(v.iter().map(|&x| x as f64).collect()),
            Column::Float(v) => Ok(v.clone()),
            Column::Ragged(_) => Err(Error::TypeMismatch(format!(
                "variable '{name}' is ragged, expected a scalar column"
            ))),
        }
    }

    /// Borrow the rows of a ragged column. Fails for scalar columns.
    pub fn ragged_values(&self, name: &str) -> Result<&[Vec<f64>]> {
        match self {
            Column::Ragged(v) => Ok(v),
            other => Err(Error::TypeMismatch(format!(
                "variable '{name}' is {}, expected a ragged column",
                other.kind()
            ))),
        }
    }
}

impl From<Vec<i64>> for Column {
    fn from(values: Vec<i64>) -> Self {
        Column::Int(values)
    }
}

impl From<Vec<f64>> for Column {
    fn from(values: Vec<f64>) -> Self {
        Column::Float(values)
    }
}

impl From<Vec<Vec<f64>>> for Column {
    fn from(values: Vec<Vec<f64>>) -> Self {
        Column::Ragged(values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_take_preserves_order() {
        let col = Column::Int(vec![10, 20, 30, 40]);
        assert_eq!(col.take(&[3, 0, 3]).unwrap(), Column::Int(vec![40, 10, 40]));
        assert!(col.take(&[]).unwrap().is_empty());
    }

    #[test]
    fn test_take_out_of_bounds() {
        let col = Column::Ragged(vec![vec![1.0], vec![]]);
        let err = col.take(&[0, 2]).unwrap_err();
        assert!(matches!(err, Error::IndexOutOfBounds { index: 2, len: 2 }));
    }

    #[test]
    fn test_scalar_values() {
        assert_eq!(
            Column::Int(vec![-3, 4]).scalar_values("pdg").unwrap(),
            vec![-3.0, 4.0]
        );
        assert!(matches!(
            Column::Ragged(vec![]).scalar_values("png"),
            Err(Error::TypeMismatch(_))
        ));
    }

    #[test]
    fn test_ragged_values() {
        let col = Column::Ragged(vec![vec![1.0, 2.0], vec![]]);
        assert_eq!(col.ragged_values("png").unwrap()[0], vec![1.0, 2.0]);
        assert!(Column::Float(vec![1.0]).ragged_values("x").is_err());
    }
}
