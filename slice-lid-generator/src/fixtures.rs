//! Five-row dataset shared by the unit tests

use std::sync::Arc;

use ndarray::{arr2, Array2};
use slice_lid_core::{MemoryStoreBuilder, PdgIscc, RowStore};

use crate::generator::GeneratorSpec;

pub(crate) const X_SLICE_1: [f32; 5] = [1.0, 2.0, 3.0, 2.0, 1.0];
pub(crate) const X_SLICE_2: [f32; 5] = [2.0, 3.0, 4.0, 3.0, 2.0];
pub(crate) const X_PNG3D_1: [&[f64]; 5] = [&[1.0, 2.0, 3.0], &[4.0], &[], &[4.0], &[1.0, 2.0]];
pub(crate) const X_PNG3D_2: [&[f64]; 5] = [&[4.0, 5.0, 6.0], &[5.0], &[], &[5.0], &[4.0, 5.0]];
pub(crate) const TARGET_PDG: [i64; 5] = [0, 0, 5, 0, 3];
pub(crate) const TARGET_ISCC: [i64; 5] = [1, 0, 6, 1, 3];

pub(crate) fn fixture_store() -> Arc<dyn RowStore> {
    let ragged = |rows: [&[f64]; 5]| rows.iter().map(|r| r.to_vec()).collect::<Vec<_>>();
    let scalar = |values: [f32; 5]| values.iter().map(|&v| f64::from(v)).collect::<Vec<_>>();
    Arc::new(
        MemoryStoreBuilder::new()
            .column("x_slice1", scalar(X_SLICE_1))
            .column("x_slice2", scalar(X_SLICE_2))
            .column("x_png3d1", ragged(X_PNG3D_1))
            .column("x_png3d2", ragged(X_PNG3D_2))
            .column("target_pdg", TARGET_PDG.to_vec())
            .column("target_iscc", TARGET_ISCC.to_vec())
            .build()
            .unwrap(),
    )
}

pub(crate) fn fixture_spec(batch_size: usize) -> GeneratorSpec {
    GeneratorSpec {
        batch_size,
        max_length: None,
        target_pdg_iscc_list: vec![PdgIscc::new(0, 1), PdgIscc::new(5, 6)],
        vars_scalar: Some(vec!["x_slice1".to_string(), "x_slice2".to_string()]),
        vars_ragged: Some(vec!["x_png3d1".to_string(), "x_png3d2".to_string()]),
        var_target_pdg: "target_pdg".to_string(),
        var_target_iscc: "target_iscc".to_string(),
    }
}

/// One-hot targets of the fixture under [`fixture_spec`]
pub(crate) fn targets() -> Array2<f32> {
    arr2(&[
        [0.0, 1.0, 0.0],
        [1.0, 0.0, 0.0],
        [0.0, 0.0, 1.0],
        [0.0, 1.0, 0.0],
        [1.0, 0.0, 0.0],
    ])
}
