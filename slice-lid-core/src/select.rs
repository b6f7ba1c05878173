//! Row selectors: pattern filters and class-balanced sampling

use std::sync::Arc;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::matching::{MatchColumns, PdgIscc, PdgSign};
use crate::store::{RowSlice, RowStore};

/// Seed used when none is configured
pub const DEFAULT_SEED: u64 = 1337;

/// Picks a subset of the rows of a store
pub trait RowSelector: Send + Sync {
    /// Indices of the selected rows, in output order
    fn select(&self, store: &dyn RowStore) -> Result<Vec<usize>>;

    /// Apply the selection and return a view over the selected rows
    fn apply(&self, store: Arc<dyn RowStore>) -> Result<RowSlice> {
        let indices = self.select(store.as_ref())?;
        RowSlice::new(store, indices)
    }
}

/// Keeps rows matching at least one `(pdg, iscc)` pattern
///
/// Particle ids are compared with their sign. Kept rows retain their
/// original relative order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataFilter {
    /// Particle id variable
    pub var_pdg: String,

    /// Interaction flag variable
    pub var_iscc: String,

    /// Patterns a row must match to be kept
    pub keep_list: Vec<PdgIscc>,
}

impl DataFilter {
    /// Create a filter
    pub fn new(var_pdg: &str, var_iscc: &str, keep_list: Vec<PdgIscc>) -> Self {
        Self {
            var_pdg: var_pdg.to_string(),
            var_iscc: var_iscc.to_string(),
            keep_list,
        }
    }
}

impl RowSelector for DataFilter {
    fn select(&self, store: &dyn RowStore) -> Result<Vec<usize>> {
        let cols = MatchColumns::load(store, &self.var_pdg, &self.var_iscc, &self.keep_list)?;
        let kept: Vec<usize> = (0..cols.len())
            .filter(|&row| {
                cols.first_match(row, &self.keep_list, PdgSign::Signed)
                    .is_some()
            })
            .collect();

        debug!(
            rows = cols.len(),
            kept = kept.len(),
            patterns = self.keep_list.len(),
            "Filtered rows"
        );
        Ok(kept)
    }
}

/// Draws an equal number of rows from every `(pdg, iscc)` bucket
///
/// Every pattern forms a bucket and rows matching no pattern form a final
/// "other" bucket. A row belongs to the first pattern it matches. The
/// result is shuffled and contains no row twice.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BalancedSampler {
    /// Particle id variable
    pub var_pdg: String,

    /// Interaction flag variable
    pub var_iscc: String,

    /// Bucket patterns
    pub pdg_iscc_list: Vec<PdgIscc>,

    /// Seed for drawing and shuffling
    pub seed: u64,

    /// Compare particle ids with their sign instead of by absolute value
    pub pdg_signed: bool,
}

impl BalancedSampler {
    /// Create a sampler that compares particle ids by absolute value
    pub fn new(var_pdg: &str, var_iscc: &str, pdg_iscc_list: Vec<PdgIscc>, seed: u64) -> Self {
        Self {
            var_pdg: var_pdg.to_string(),
            var_iscc: var_iscc.to_string(),
            pdg_iscc_list,
            seed,
            pdg_signed: false,
        }
    }

    /// Compare particle ids with their sign
    pub fn signed(mut self, pdg_signed: bool) -> Self {
        self.pdg_signed = pdg_signed;
        self
    }

    fn sign(&self) -> PdgSign {
        if self.pdg_signed {
            PdgSign::Signed
        } else {
            PdgSign::Unsigned
        }
    }

    /// Distinct patterns in first-seen order
    fn patterns(&self) -> Vec<PdgIscc> {
        let mut patterns: Vec<PdgIscc> = Vec::with_capacity(self.pdg_iscc_list.len());
        for p in &self.pdg_iscc_list {
            if !patterns.contains(p) {
                patterns.push(*p);
            }
        }
        patterns
    }

    /// Partition rows into labelled buckets
    fn buckets(&self, store: &dyn RowStore) -> Result<Vec<(String, Vec<usize>)>> {
        let patterns = self.patterns();
        let cols = MatchColumns::load(store, &self.var_pdg, &self.var_iscc, &patterns)?;
        let sign = self.sign();

        let mut matched = vec![Vec::new(); patterns.len()];
        let mut other = Vec::new();
        for row in 0..cols.len() {
            match cols.first_match(row, &patterns, sign) {
                Some(bucket) => matched[bucket].push(row),
                None => other.push(row),
            }
        }

        let mut buckets: Vec<(String, Vec<usize>)> = patterns
            .iter()
            .map(ToString::to_string)
            .zip(matched)
            .collect();
        if !other.is_empty() {
            buckets.push(("other".to_string(), other));
        }
        Ok(buckets)
    }
}

impl RowSelector for BalancedSampler {
    fn select(&self, store: &dyn RowStore) -> Result<Vec<usize>> {
        let buckets = self.buckets(store)?;
        if buckets.is_empty() {
            return Ok(Vec::new());
        }

        if let Some((label, _)) = buckets.iter().find(|(_, rows)| rows.is_empty()) {
            return Err(Error::EmptyBucket {
                bucket: label.clone(),
            });
        }

        let per_bucket = buckets
            .iter()
            .map(|(_, rows)| rows.len())
            .min()
            .unwrap_or(0);

        // Each bucket draws with a fresh generator seeded identically.
        let mut selected = Vec::with_capacity(per_bucket * buckets.len());
        for (label, rows) in &buckets {
            let mut rng = StdRng::seed_from_u64(self.seed);
            let picks = rand::seq::index::sample(&mut rng, rows.len(), per_bucket);
            selected.extend(picks.iter().map(|i| rows[i]));
            debug!(bucket = %label, available = rows.len(), drawn = per_bucket, "Sampled bucket");
        }

        let mut rng = StdRng::seed_from_u64(self.seed);
        selected.shuffle(&mut rng);

        info!(
            buckets = buckets.len(),
            per_bucket,
            rows = selected.len(),
            "Balanced sample drawn"
        );
        Ok(selected)
    }
}
