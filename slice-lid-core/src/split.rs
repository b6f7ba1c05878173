//! Seeded shuffling and train/test partitioning of row stores

use std::sync::Arc;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{Error, Result};
use crate::store::{RowSlice, RowStore};

/// Size of the held-out partition
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TestSize {
    /// Absolute number of rows
    Count(usize),
    /// Fraction of all rows, in `[0, 1)`
    Fraction(f64),
}

impl TestSize {
    /// Number of held-out rows out of `total`
    pub fn resolve(&self, total: usize) -> Result<usize> {
        match *self {
            TestSize::Count(count) if count <= total => Ok(count),
            TestSize::Count(count) => Err(Error::InvalidArgument(format!(
                "test size {count} exceeds {total} available rows"
            ))),
            TestSize::Fraction(f) if (0.0..1.0).contains(&f) => {
                #[allow(
                    clippy::cast_possible_truncation,
                    clippy::cast_sign_loss,
                    clippy::cast_precision_loss
                )]
                let count = (total as f64 * f).floor() as usize;
                Ok(count)
            }
            TestSize::Fraction(f) => Err(Error::InvalidArgument(format!(
                "test fraction {f} is outside [0, 1)"
            ))),
        }
    }
}

/// A view over a seeded permutation of the rows of `store`
pub fn shuffle(store: Arc<dyn RowStore>, seed: u64) -> Result<RowSlice> {
    let mut indices: Vec<usize> = (0..store.len()).collect();
    let mut rng = StdRng::seed_from_u64(seed);
    indices.shuffle(&mut rng);
    RowSlice::new(store, indices)
}

/// Split `store` into training rows followed by trailing test rows
///
/// Returns a single partition when `test_size` is `None` or resolves to
/// zero rows, otherwise `[train, test]`.
pub fn train_test_split(
    store: Arc<dyn RowStore>,
    test_size: Option<TestSize>,
) -> Result<Vec<Arc<dyn RowStore>>> {
    let total = store.len();
    let n_test = match test_size {
        None => 0,
        Some(size) => size.resolve(total)?,
    };

    if n_test == 0 {
        return Ok(vec![store]);
    }

    let n_train = total - n_test;
    let train = RowSlice::new(Arc::clone(&store), (0..n_train).collect())?;
    let test = RowSlice::new(store, (n_train..total).collect())?;
    info!(train = n_train, test = n_test, "Split rows into train and test");
    Ok(vec![Arc::new(train), Arc::new(test)])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::column::Column;
    use crate::store::MemoryStoreBuilder;
    use test_case::test_case;

    fn store(n: i64) -> Arc<dyn RowStore> {
        Arc::new(
            MemoryStoreBuilder::new()
                .column("id", (0..n).collect::<Vec<_>>())
                .build()
                .unwrap(),
        )
    }

    fn ids(store: &dyn RowStore) -> Vec<i64> {
        match store.get("id", None).unwrap() {
            Column::Int(v) => v,
            other => panic!("unexpected column {other:?}"),
        }
    }

    #[test_case(TestSize::Count(3), 10 => 3)]
    #[test_case(TestSize::Fraction(0.2), 10 => 2)]
    #[test_case(TestSize::Fraction(0.25), 10 => 2)]
    #[test_case(TestSize::Fraction(0.0), 10 => 0)]
    fn test_resolve(size: TestSize, total: usize) -> usize {
        size.resolve(total).unwrap()
    }

    #[test]
    fn test_resolve_rejects_bad_sizes() {
        assert!(TestSize::Count(11).resolve(10).is_err());
        assert!(TestSize::Fraction(1.0).resolve(10).is_err());
        assert!(TestSize::Fraction(-0.1).resolve(10).is_err());
    }

    #[test]
    fn test_test_size_serde() {
        assert_eq!(
            serde_json::from_str::<TestSize>("0.2").unwrap(),
            TestSize::Fraction(0.2)
        );
        assert_eq!(
            serde_json::from_str::<TestSize>("100").unwrap(),
            TestSize::Count(100)
        );
    }

    #[test]
    fn test_shuffle_is_seeded_permutation() {
        let a = shuffle(store(50), 1337).unwrap();
        let b = shuffle(store(50), 1337).unwrap();
        assert_eq!(a.indices(), b.indices());

        let mut sorted = ids(&a);
        assert_ne!(sorted, (0..50).collect::<Vec<_>>());
        sorted.sort_unstable();
        assert_eq!(sorted, (0..50).collect::<Vec<_>>());
    }

    #[test]
    fn test_split_trailing_rows_are_test() {
        let parts = train_test_split(store(10), Some(TestSize::Fraction(0.2))).unwrap();
        assert_eq!(parts.len(), 2);
        assert_eq!(ids(parts[0].as_ref()), (0..8).collect::<Vec<_>>());
        assert_eq!(ids(parts[1].as_ref()), vec![8, 9]);
    }

    #[test]
    fn test_split_without_test_size() {
        assert_eq!(train_test_split(store(4), None).unwrap().len(), 1);
        assert_eq!(
            train_test_split(store(4), Some(TestSize::Count(0)))
                .unwrap()
                .len(),
            1
        );
    }
}
