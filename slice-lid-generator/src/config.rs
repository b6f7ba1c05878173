//! Data pipeline configuration

use std::env;
use std::fs::{self, File};
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use slice_lid_core::{Error, PdgIscc, Result, TestSize, DEFAULT_SEED};
use slice_lid_parallel::{default_workers, ConcurrencyMode};

use crate::disk_cache;
use crate::generator::{GeneratorSpec, DEFAULT_BATCH_SIZE};
use crate::mask::DEFAULT_MASK;
use crate::weights::ClassWeightsKind;

/// File name configurations are saved under
pub const CONFIG_FILE: &str = "config.json";

/// Environment variable holding the default data directory
pub const DATADIR_ENV: &str = "SLICE_LID_DATADIR";

/// Row selections applied before shuffling and splitting
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DataMods {
    /// Keep only rows matching one of these patterns
    pub keep_pdg_iscc_list: Option<Vec<PdgIscc>>,

    /// Draw an equal number of rows per pattern
    pub balance_pdg_iscc_list: Option<Vec<PdgIscc>>,
}

/// Configuration of the data pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DataConfig {
    /// Directory datasets are resolved against, `$SLICE_LID_DATADIR` when
    /// empty
    pub datadir: PathBuf,

    /// Dataset file inside `datadir`
    pub dataset: String,

    /// Row selections
    pub data_mods: DataMods,

    /// Rows per batch
    pub batch_size: usize,

    /// Class weighting scheme, none when `None`
    pub class_weights: Option<ClassWeightsKind>,

    /// Cap on the number of prongs per row
    pub max_prongs: Option<usize>,

    /// Seed for sampling and shuffling
    pub seed: u64,

    /// Held-out partition size, a single partition when `None`
    pub test_size: Option<TestSize>,

    /// Target classes
    pub target_pdg_iscc_list: Vec<PdgIscc>,

    /// Slice level (scalar) input variables
    pub vars_input_slice: Option<Vec<String>>,

    /// Prong level (ragged) input variables
    pub vars_input_png3d: Option<Vec<String>>,

    /// Particle id variable
    pub var_target_pdg: String,

    /// Interaction flag variable
    pub var_target_iscc: String,

    /// Cache batches in memory
    pub cache: bool,

    /// Cache batches on disk
    pub disk_cache: bool,

    /// Root of the disk cache, `<datadir>/.slice_lid_cache` when `None`
    pub cache_dir: Option<PathBuf>,

    /// Prefetch strategy, plain in-memory caching when `None`
    pub concurrency: Option<ConcurrencyMode>,

    /// Prefetch workers, one per CPU when `None`
    pub workers: Option<usize>,

    /// Replacement for NaN padding
    pub mask_value: f32,
}

impl Default for DataConfig {
    fn default() -> Self {
        let spec = GeneratorSpec::default();
        Self {
            datadir: PathBuf::new(),
            dataset: String::new(),
            data_mods: DataMods::default(),
            batch_size: DEFAULT_BATCH_SIZE,
            class_weights: None,
            max_prongs: None,
            seed: DEFAULT_SEED,
            test_size: Some(TestSize::Fraction(0.2)),
            target_pdg_iscc_list: Vec::new(),
            vars_input_slice: None,
            vars_input_png3d: None,
            var_target_pdg: spec.var_target_pdg,
            var_target_iscc: spec.var_target_iscc,
            cache: true,
            disk_cache: true,
            cache_dir: None,
            concurrency: None,
            workers: Some(1),
            mask_value: DEFAULT_MASK,
        }
    }
}

/// Configuration values the disk cache fingerprint is computed from
#[derive(Serialize)]
struct CacheKey<'a> {
    datadir: &'a Path,
    dataset: &'a str,
    data_mods: &'a DataMods,
    batch_size: usize,
    max_prongs: Option<usize>,
    seed: u64,
    test_size: Option<TestSize>,
    target_pdg_iscc_list: &'a [PdgIscc],
    vars_input_slice: Option<&'a [String]>,
    vars_input_png3d: Option<&'a [String]>,
    var_target_pdg: &'a str,
    var_target_iscc: &'a str,
}

impl DataConfig {
    /// Load `config.json` from `dir`
    pub fn load(dir: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(dir.as_ref().join(CONFIG_FILE))?;
        Ok(serde_json::from_reader(BufReader::new(file))?)
    }

    /// Save to `config.json` in `dir` with sorted keys
    pub fn save(&self, dir: impl AsRef<Path>) -> Result<()> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir)?;
        // round-trip through Value so object keys come out sorted
        let value = serde_json::to_value(self)?;
        let mut text = Vec::new();
        let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
        value.serialize(&mut serde_json::Serializer::with_formatter(&mut text, formatter))?;
        fs::write(dir.join(CONFIG_FILE), text)?;
        Ok(())
    }

    /// Apply a named preset of variable names
    pub fn with_preset(mut self, preset: Preset) -> Self {
        match preset {
            Preset::Standard => {
                self.var_target_pdg = "mc.pdg".to_string();
                self.var_target_iscc = "mc.isCC".to_string();
                self.vars_input_slice = Some(vec!["calE".to_string()]);
                self.vars_input_png3d = Some(
                    STANDARD_PNG3D_VARS
                        .iter()
                        .map(ToString::to_string)
                        .collect(),
                );
            }
        }
        self
    }

    /// Directory datasets are read from
    pub fn resolve_datadir(&self) -> Result<PathBuf> {
        if !self.datadir.as_os_str().is_empty() {
            return Ok(self.datadir.clone());
        }
        env::var_os(DATADIR_ENV).map(PathBuf::from).ok_or_else(|| {
            Error::Config(format!("no datadir configured and {DATADIR_ENV} is not set"))
        })
    }

    /// Path of the dataset file
    pub fn dataset_path(&self) -> Result<PathBuf> {
        Ok(self.resolve_datadir()?.join(&self.dataset))
    }

    /// Root directory of the disk cache
    pub fn cache_root(&self) -> Result<PathBuf> {
        match &self.cache_dir {
            Some(dir) => Ok(dir.clone()),
            None => Ok(self.resolve_datadir()?.join(".slice_lid_cache")),
        }
    }

    /// Number of prefetch workers
    pub fn resolve_workers(&self) -> usize {
        self.workers.unwrap_or_else(default_workers)
    }

    /// Batch layout of every partition
    pub fn generator_spec(&self) -> GeneratorSpec {
        GeneratorSpec {
            batch_size: self.batch_size,
            max_length: self.max_prongs,
            target_pdg_iscc_list: self.target_pdg_iscc_list.clone(),
            vars_scalar: self.vars_input_slice.clone(),
            vars_ragged: self.vars_input_png3d.clone(),
            var_target_pdg: self.var_target_pdg.clone(),
            var_target_iscc: self.var_target_iscc.clone(),
        }
    }

    /// Disk cache fingerprint of everything that shapes the batches
    ///
    /// The dataset directory enters the key as resolved, so an empty
    /// `datadir` fails when `$SLICE_LID_DATADIR` is not set.
    pub fn fingerprint(&self) -> Result<String> {
        let datadir = self.resolve_datadir()?;
        disk_cache::fingerprint(&CacheKey {
            datadir: &datadir,
            dataset: &self.dataset,
            data_mods: &self.data_mods,
            batch_size: self.batch_size,
            max_prongs: self.max_prongs,
            seed: self.seed,
            test_size: self.test_size,
            target_pdg_iscc_list: &self.target_pdg_iscc_list,
            vars_input_slice: self.vars_input_slice.as_deref(),
            vars_input_png3d: self.vars_input_png3d.as_deref(),
            var_target_pdg: &self.var_target_pdg,
            var_target_iscc: &self.var_target_iscc,
        })
    }
}

/// Named sets of input and target variables
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Preset {
    /// Slice calorimetric energy plus per-prong particle id and shower
    /// variables
    Standard,
}

impl FromStr for Preset {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "standard" => Ok(Preset::Standard),
            other => Err(Error::Config(format!("Unknown preset: {other}"))),
        }
    }
}

const STANDARD_PNG3D_VARS: &[&str] = &[
    "png.cvnpart.muonid",
    "png.cvnpart.electronid",
    "png.cvnpart.pionid",
    "png.cvnpart.protonid",
    "png.cvnpart.photonid",
    "png.shwlid.calE",
    "png.shwlid.dir.x",
    "png.shwlid.dir.y",
    "png.shwlid.dir.z",
    "png.shwlid.nhit",
    "png.shwlid.nhitx",
    "png.shwlid.nhity",
    "png.shwlid.len",
    "png.shwlid.nplanex",
    "png.shwlid.nplaney",
    "png.shwlid.gap",
    "png.shwlid.lid.eglll",
    "png.shwlid.lid.emulll",
    "png.shwlid.lid.epi0lll",
    "png.shwlid.lid.eplll",
    "png.shwlid.lid.enlll",
    "png.shwlid.lid.epilll",
    "png.shwlid.lid.egllt",
    "png.shwlid.lid.emullt",
    "png.shwlid.lid.epi0llt",
    "png.shwlid.lid.epllt",
    "png.shwlid.lid.enllt",
    "png.shwlid.lid.epillt",
];

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> DataConfig {
        DataConfig {
            datadir: PathBuf::from("/data"),
            dataset: "numu.json".to_string(),
            data_mods: DataMods {
                keep_pdg_iscc_list: Some(vec![PdgIscc(Some(14), None)]),
                balance_pdg_iscc_list: None,
            },
            class_weights: Some(ClassWeightsKind::Equal),
            target_pdg_iscc_list: vec![PdgIscc::new(14, 1), PdgIscc::new(12, 1)],
            concurrency: Some(ConcurrencyMode::Thread),
            ..DataConfig::default()
        }
    }

    #[test]
    fn test_defaults() {
        let config = DataConfig::default();
        assert_eq!(config.batch_size, 1024);
        assert_eq!(config.seed, 1337);
        assert_eq!(config.test_size, Some(TestSize::Fraction(0.2)));
        assert!(config.cache && config.disk_cache);
        assert_eq!(config.workers, Some(1));
        assert_eq!(config.mask_value, 0.0);
    }

    #[test]
    fn test_save_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let config = sample();
        config.save(dir.path()).unwrap();
        assert_eq!(DataConfig::load(dir.path()).unwrap(), config);

        let text = fs::read_to_string(dir.path().join(CONFIG_FILE)).unwrap();
        let batch = text.find("\"batch_size\"").unwrap();
        let var = text.find("\"var_target_pdg\"").unwrap();
        assert!(batch < var);
        assert!(text.contains("\"concurrency\": \"thread\""));
    }

    #[test]
    fn test_load_partial_config_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join(CONFIG_FILE),
            r#"{"dataset": "d.json", "class_weights": "equal",
                "target_pdg_iscc_list": [[12, true], [14, true]],
                "workers": null, "test_size": 100}"#,
        )
        .unwrap();
        let config = DataConfig::load(dir.path()).unwrap();
        assert_eq!(config.dataset, "d.json");
        assert_eq!(config.batch_size, 1024);
        assert_eq!(config.target_pdg_iscc_list[1], PdgIscc::new(14, 1));
        assert_eq!(config.test_size, Some(TestSize::Count(100)));
        assert_eq!(config.resolve_workers(), default_workers());
    }

    #[test]
    fn test_unknown_names_rejected_on_load() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(CONFIG_FILE), r#"{"concurrency": "fiber"}"#).unwrap();
        assert!(matches!(DataConfig::load(dir.path()), Err(Error::Json(_))));

        fs::write(dir.path().join(CONFIG_FILE), r#"{"class_weights": "inverse"}"#).unwrap();
        assert!(DataConfig::load(dir.path()).is_err());
    }

    #[test]
    fn test_fingerprint_tracks_batch_shaping_fields() {
        let base = sample();
        let fp = base.fingerprint().unwrap();
        assert_eq!(fp, sample().fingerprint().unwrap());

        // runtime knobs do not change the batches
        let runtime = DataConfig {
            workers: Some(8),
            concurrency: None,
            cache: false,
            mask_value: -1.0,
            class_weights: None,
            ..sample()
        };
        assert_eq!(runtime.fingerprint().unwrap(), fp);

        for changed in [
            DataConfig { batch_size: 512, ..sample() },
            DataConfig { seed: 1, ..sample() },
            DataConfig { max_prongs: Some(5), ..sample() },
            DataConfig { test_size: Some(TestSize::Count(10)), ..sample() },
            DataConfig { data_mods: DataMods::default(), ..sample() },
            DataConfig { var_target_iscc: "iscc".to_string(), ..sample() },
            DataConfig { datadir: PathBuf::from("/other"), ..sample() },
        ] {
            assert_ne!(changed.fingerprint().unwrap(), fp);
        }
    }

    #[test]
    fn test_generator_spec_mapping() {
        let config = DataConfig {
            max_prongs: Some(4),
            ..sample()
        }
        .with_preset(Preset::Standard);
        let spec = config.generator_spec();
        assert_eq!(spec.max_length, Some(4));
        assert_eq!(spec.vars_scalar, Some(vec!["calE".to_string()]));
        assert_eq!(spec.vars_ragged.as_ref().map(|v| v.len()), Some(28));
        assert_eq!(spec.n_classes(), 3);
    }

    #[test]
    fn test_paths() {
        let config = sample();
        assert_eq!(config.dataset_path().unwrap(), PathBuf::from("/data/numu.json"));
        assert_eq!(
            config.cache_root().unwrap(),
            PathBuf::from("/data/.slice_lid_cache")
        );
        assert!("custom".parse::<Preset>().is_err());
    }
}
