//! Particle-id / interaction-flag patterns

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};

use crate::error::Result;
use crate::store::RowStore;

/// Whether particle ids are compared with their sign or by absolute value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PdgSign {
    /// Compare the stored id as is
    Signed,
    /// Compare the absolute value of the stored id
    #[default]
    Unsigned,
}

/// A `(particle id, interaction flag)` pattern, `None` fields match anything
///
/// Serializes as a two element array, `[12, 1]` or `[null, 0]`. Flags may be
/// written as booleans when deserializing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PdgIscc(
    pub Option<i64>,
    #[serde(deserialize_with = "deserialize_flag")] pub Option<i64>,
);

impl PdgIscc {
    /// Pattern with both fields set
    pub fn new(pdg: i64, iscc: i64) -> Self {
        Self(Some(pdg), Some(iscc))
    }

    /// Particle id pattern
    pub fn pdg(&self) -> Option<i64> {
        self.0
    }

    /// Interaction flag pattern
    pub fn iscc(&self) -> Option<i64> {
        self.1
    }

    /// Whether a row with the given values matches
    pub fn matches(&self, pdg: f64, iscc: f64, sign: PdgSign) -> bool {
        let pdg = match sign {
            PdgSign::Signed => pdg,
            PdgSign::Unsigned => pdg.abs(),
        };
        field_matches(self.0, pdg) && field_matches(self.1, iscc)
    }
}

impl fmt::Display for PdgIscc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let show = |v: Option<i64>| v.map_or_else(|| "*".to_string(), |v| v.to_string());
        write!(f, "({}, {})", show(self.0), show(self.1))
    }
}

impl From<(i64, i64)> for PdgIscc {
    fn from((pdg, iscc): (i64, i64)) -> Self {
        Self::new(pdg, iscc)
    }
}

impl From<(Option<i64>, Option<i64>)> for PdgIscc {
    fn from((pdg, iscc): (Option<i64>, Option<i64>)) -> Self {
        Self(pdg, iscc)
    }
}

#[allow(clippy::cast_precision_loss)]
fn field_matches(pattern: Option<i64>, value: f64) -> bool {
    pattern.map_or(true, |exact| value == exact as f64)
}

fn deserialize_flag<'de, D>(deserializer: D) -> std::result::Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Flag {
        Bool(bool),
        Int(i64),
    }

    Ok(Option::<Flag>::deserialize(deserializer)?.map(|flag| match flag {
        Flag::Bool(b) => i64::from(b),
        Flag::Int(i) => i,
    }))
}

/// Particle id and interaction flag values of every row of a store
#[derive(Debug, Clone, PartialEq)]
pub struct MatchColumns {
    /// Particle id per row
    pub pdg: Vec<f64>,

    /// Interaction flag per row
    pub iscc: Vec<f64>,
}

impl MatchColumns {
    /// Read the columns needed to evaluate `patterns`
    ///
    /// A variable is only read when some pattern constrains it, a
    /// wildcard-only field is filled with zeros.
    pub fn load(
        store: &dyn RowStore,
        var_pdg: &str,
        var_iscc: &str,
        patterns: &[PdgIscc],
    ) -> Result<Self> {
        let read = |var: &str, needed: bool| -> Result<Vec<f64>> {
            if needed {
                store.get(var, None)?.scalar_values(var)
            } else {
                Ok(vec![0.0; store.len()])
            }
        };
        Ok(Self {
            pdg: read(var_pdg, patterns.iter().any(|p| p.0.is_some()))?,
            iscc: read(var_iscc, patterns.iter().any(|p| p.1.is_some()))?,
        })
    }

    /// Number of rows
    pub fn len(&self) -> usize {
        self.pdg.len()
    }

    /// Whether there are no rows
    pub fn is_empty(&self) -> bool {
        self.pdg.is_empty()
    }

    /// Whether row `row` matches `pattern`
    pub fn row_matches(&self, row: usize, pattern: &PdgIscc, sign: PdgSign) -> bool {
        pattern.matches(self.pdg[row], self.iscc[row], sign)
    }

    /// Index of the first pattern matching row `row`
    pub fn first_match(&self, row: usize, patterns: &[PdgIscc], sign: PdgSign) -> Option<usize> {
        patterns
            .iter()
            .position(|p| self.row_matches(row, p, sign))
    }
}
