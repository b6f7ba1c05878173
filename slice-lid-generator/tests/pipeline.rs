//! End to end tests of the pipeline built from a configuration

use std::fs;
use std::path::{Path, PathBuf};

use serde_json::json;
use slice_lid_core::{Batch, PdgIscc, TestSize};
use slice_lid_generator::{
    create_data_generators, BatchSequence, ClassWeightsKind, DataConfig, DataMods, DATADIR_ENV,
};
use slice_lid_parallel::ConcurrencyMode;
use test_case::test_case;

const ROWS: usize = 40;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_env_filter("debug")
        .try_init();
}

fn write_dataset(dir: &Path) {
    write_scaled_dataset(dir, 0.25);
}

fn write_scaled_dataset(dir: &Path, energy_scale: f64) {
    let pdg: Vec<i64> = (0..ROWS).map(|i| [0, 12, 14][i % 3]).collect();
    let iscc: Vec<i64> = (0..ROWS).map(|i| i64::from(i % 5 != 0)).collect();
    let energy: Vec<f64> = (0..ROWS).map(|i| energy_scale * i as f64).collect();
    let prongs: Vec<Vec<f64>> = (0..ROWS)
        .map(|i| (0..i % 4).map(|j| (i * 10 + j) as f64).collect())
        .collect();
    let lengths: Vec<Vec<f64>> = prongs
        .iter()
        .map(|row| row.iter().map(|v| v / 2.0).collect())
        .collect();

    let data = json!({
        "mc.pdg": pdg,
        "mc.isCC": iscc,
        "calE": energy,
        "png.calE": prongs,
        "png.len": lengths,
    });
    fs::write(dir.join("data.json"), data.to_string()).unwrap();
}

fn base_config(dir: &Path) -> DataConfig {
    DataConfig {
        datadir: dir.to_path_buf(),
        dataset: "data.json".to_string(),
        batch_size: 8,
        test_size: Some(TestSize::Count(10)),
        target_pdg_iscc_list: vec![PdgIscc::new(12, 1), PdgIscc::new(14, 1)],
        vars_input_slice: Some(vec!["calE".to_string()]),
        vars_input_png3d: Some(vec!["png.calE".to_string(), "png.len".to_string()]),
        cache: false,
        disk_cache: false,
        cache_dir: Some(dir.join("cache")),
        ..DataConfig::default()
    }
}

fn collect(seq: &BatchSequence) -> Vec<Batch> {
    seq.epoch().collect::<slice_lid_core::Result<_>>().unwrap()
}

fn assert_same(a: &[BatchSequence], b: &[BatchSequence]) {
    assert_eq!(a.len(), b.len());
    for (x, y) in a.iter().zip(b) {
        let (x, y) = (collect(x), collect(y));
        assert_eq!(x.len(), y.len());
        for (bx, by) in x.iter().zip(&y) {
            assert!(bx.same_bits(by));
        }
    }
}

#[test]
fn test_partitions_and_batch_layout() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    write_dataset(dir.path());

    let seqs = create_data_generators(&base_config(dir.path())).unwrap();
    assert_eq!(seqs.len(), 2);
    assert_eq!(seqs[0].len(), 4);
    assert_eq!(seqs[1].len(), 2);

    let train = collect(&seqs[0]);
    let rows: usize = train.iter().map(Batch::len).sum();
    assert_eq!(rows, 30);
    for batch in &train {
        assert_eq!(batch.target.ncols(), 3);
        assert_eq!(batch.inputs.scalar.as_ref().unwrap().ncols(), 1);
        let ragged = batch.inputs.ragged.as_ref().unwrap();
        assert_eq!(ragged.shape()[0], batch.len());
        assert_eq!(ragged.shape()[2], 2);
        assert!(ragged.iter().all(|v| !v.is_nan()));
        assert!(batch.weights[0].iter().all(|&w| w == 1.0));
    }
}

#[test_case(true, false, None, Some(1) ; "memory cache")]
#[test_case(true, true, None, Some(1) ; "memory and disk cache")]
#[test_case(true, false, Some(ConcurrencyMode::Thread), Some(3) ; "thread prefetch")]
#[test_case(true, false, Some(ConcurrencyMode::Process), Some(2) ; "process prefetch")]
#[test_case(true, true, Some(ConcurrencyMode::Thread), None ; "thread prefetch all cpus")]
fn test_caching_does_not_change_batches(
    cache: bool,
    disk_cache: bool,
    concurrency: Option<ConcurrencyMode>,
    workers: Option<usize>,
) {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    write_dataset(dir.path());

    let plain = create_data_generators(&base_config(dir.path())).unwrap();
    let config = DataConfig {
        cache,
        disk_cache,
        concurrency,
        workers,
        ..base_config(dir.path())
    };
    let cached = create_data_generators(&config).unwrap();
    assert_same(&plain, &cached);
}

#[test]
fn test_disk_cache_reused_across_runs() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    write_dataset(dir.path());
    let config = DataConfig {
        disk_cache: true,
        ..base_config(dir.path())
    };

    let first = create_data_generators(&config).unwrap();
    let entry = dir.path().join("cache").join(config.fingerprint().unwrap());
    let manifest = entry.join("part_0").join("manifest.json");
    assert!(manifest.exists());
    assert!(entry.join("part_1").join("manifest.json").exists());
    let written = fs::metadata(&manifest).unwrap().modified().unwrap();

    let second = create_data_generators(&config).unwrap();
    assert_eq!(fs::metadata(&manifest).unwrap().modified().unwrap(), written);
    assert_same(&first, &second);

    // a different seed is a different entry
    let reseeded = DataConfig {
        seed: 7,
        ..config.clone()
    };
    create_data_generators(&reseeded).unwrap();
    assert!(dir
        .path()
        .join("cache")
        .join(reseeded.fingerprint().unwrap())
        .join("part_0")
        .exists());
}

#[test]
fn test_disk_cache_separates_datadirs_from_env() {
    init_tracing();
    let first_dir = tempfile::tempdir().unwrap();
    let second_dir = tempfile::tempdir().unwrap();
    let cache_dir = tempfile::tempdir().unwrap();
    write_scaled_dataset(first_dir.path(), 1.0);
    write_scaled_dataset(second_dir.path(), 2.0);

    // only this test reads the data directory from the environment
    let config = DataConfig {
        datadir: PathBuf::new(),
        disk_cache: true,
        cache_dir: Some(cache_dir.path().to_path_buf()),
        ..base_config(first_dir.path())
    };

    std::env::set_var(DATADIR_ENV, first_dir.path());
    let first_fp = config.fingerprint().unwrap();
    let first = create_data_generators(&config).unwrap();

    std::env::set_var(DATADIR_ENV, second_dir.path());
    let second_fp = config.fingerprint().unwrap();
    let second = create_data_generators(&config).unwrap();
    std::env::remove_var(DATADIR_ENV);

    assert_ne!(first_fp, second_fp);
    let energy = |seqs: &[BatchSequence]| {
        let batch = seqs[0].get(0).unwrap();
        let scalar = batch.inputs.scalar.unwrap();
        scalar.iter().copied().map(f64::from).sum::<f64>()
    };
    // identical shuffles, so every energy of the second dataset is doubled
    assert!((energy(&second) - 2.0 * energy(&first)).abs() < 1e-3);
    assert!(energy(&first) > 0.0);
}

#[test]
fn test_class_weights_balance_the_train_partition() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    write_dataset(dir.path());
    let config = DataConfig {
        class_weights: Some(ClassWeightsKind::Equal),
        test_size: None,
        ..base_config(dir.path())
    };

    let seqs = create_data_generators(&config).unwrap();
    assert_eq!(seqs.len(), 1);

    let mut per_class = [0.0_f64; 3];
    for batch in collect(&seqs[0]) {
        for (class, weight) in batch.classes().iter().zip(batch.weights[0].iter()) {
            per_class[*class] += weight;
        }
    }
    let total: f64 = per_class.iter().sum();
    assert!((total - ROWS as f64).abs() < 1e-9);
    for weight in per_class {
        assert!((weight - ROWS as f64 / 3.0).abs() < 1e-9);
    }
}

#[test]
fn test_data_mods_shrink_the_dataset() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    write_dataset(dir.path());
    let config = DataConfig {
        data_mods: DataMods {
            keep_pdg_iscc_list: Some(vec![PdgIscc(Some(12), None), PdgIscc(Some(14), None)]),
            balance_pdg_iscc_list: Some(vec![PdgIscc(Some(12), None), PdgIscc(Some(14), None)]),
        },
        test_size: None,
        ..base_config(dir.path())
    };

    let seqs = create_data_generators(&config).unwrap();
    let batches = collect(&seqs[0]);
    let rows: usize = batches.iter().map(Batch::len).sum();
    // 13 rows of each pdg survive both selections
    assert_eq!(rows, 26);
}

#[test]
fn test_saved_config_rebuilds_same_pipeline() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    write_dataset(dir.path());
    let config = DataConfig {
        cache: true,
        concurrency: Some(ConcurrencyMode::Thread),
        workers: Some(2),
        ..base_config(dir.path())
    };
    config.save(dir.path()).unwrap();

    let loaded = DataConfig::load(dir.path()).unwrap();
    assert_eq!(loaded, config);
    assert_same(
        &create_data_generators(&config).unwrap(),
        &create_data_generators(&loaded).unwrap(),
    );
}
