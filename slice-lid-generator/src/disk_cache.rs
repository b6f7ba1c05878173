//! On-disk batch cache keyed by a configuration fingerprint
//!
//! Layout under the cache root:
//!
//! ```text
//! <root>/<fingerprint>/part_<k>/manifest.json
//! <root>/<fingerprint>/part_<k>/batch_000000.bin
//! ```
//!
//! An entry is built in a uniquely named staging directory next to its
//! final location and renamed into place once every batch is written.
//! Concurrent writers to the same fingerprint are not coordinated: one
//! writer per entry is assumed.

use std::fs::{self, File};
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};

use ndarray::Array2;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use slice_lid_core::{check_index, Batch, BatchProvider, Error, Result};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Bumped whenever the on-disk batch encoding changes
const FORMAT_VERSION: u32 = 1;

const MANIFEST: &str = "manifest.json";

/// Hex SHA-256 of the canonical JSON encoding of `config`
///
/// Object keys are emitted in sorted order, so the fingerprint depends only
/// on the configuration values.
pub fn fingerprint<T: Serialize>(config: &T) -> Result<String> {
    let value = serde_json::to_value(config)?;
    let canonical = serde_json::to_string(&value)?;
    Ok(hex::encode(Sha256::digest(canonical.as_bytes())))
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Manifest {
    format_version: u32,
    fingerprint: String,
    part: usize,
    batches: usize,
}

/// Persists every batch of one data partition under a fingerprint directory
pub struct DataDiskCache {
    /// Wrapped provider, used to build the entry and to repair it
    inner: Box<dyn BatchProvider>,

    /// Entry directory of this partition
    dir: PathBuf,
}

impl DataDiskCache {
    /// Bind `inner` to the entry for `fingerprint` and `part` under `root`
    ///
    /// Builds the entry when it is missing or its manifest does not match.
    pub fn new(
        inner: Box<dyn BatchProvider>,
        root: impl AsRef<Path>,
        fingerprint: &str,
        part: usize,
    ) -> Result<Self> {
        let dir = root.as_ref().join(fingerprint).join(format!("part_{part}"));
        let expected = Manifest {
            format_version: FORMAT_VERSION,
            fingerprint: fingerprint.to_string(),
            part,
            batches: inner.len(),
        };

        let cache = Self { inner, dir };
        match read_manifest(&cache.dir) {
            Ok(found) if found == expected => {
                info!(dir = %cache.dir.display(), batches = found.batches, "Disk cache hit");
            }
            Ok(found) => {
                warn!(
                    dir = %cache.dir.display(),
                    ?found,
                    "Disk cache manifest mismatch, rebuilding"
                );
                cache.build(&expected)?;
            }
            Err(Error::Io(err)) if err.kind() == std::io::ErrorKind::NotFound => {
                info!(dir = %cache.dir.display(), "Disk cache miss");
                cache.build(&expected)?;
            }
            Err(err) => {
                warn!(dir = %cache.dir.display(), error = %err, "Unreadable disk cache manifest, rebuilding");
                cache.build(&expected)?;
            }
        }
        Ok(cache)
    }

    /// Entry directory of this partition
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn build(&self, manifest: &Manifest) -> Result<()> {
        let parent = self.dir.parent().ok_or_else(|| {
            Error::InvalidArgument(format!("invalid cache directory {}", self.dir.display()))
        })?;
        fs::create_dir_all(parent)?;

        let staging = parent.join(format!(".staging-{}", Uuid::new_v4()));
        fs::create_dir(&staging)?;

        let written = (0..self.inner.len())
            .into_par_iter()
            .try_for_each(|index| {
                let batch = self.inner.get_batch(index)?;
                write_batch(&batch_path(&staging, index), &batch)
            })
            .and_then(|()| {
                let file = BufWriter::new(File::create(staging.join(MANIFEST))?);
                serde_json::to_writer_pretty(file, manifest)?;
                Ok(())
            });
        if let Err(err) = written {
            let _ = fs::remove_dir_all(&staging);
            return Err(err);
        }

        if self.dir.exists() {
            fs::remove_dir_all(&self.dir)?;
        }
        fs::rename(&staging, &self.dir)?;
        info!(dir = %self.dir.display(), batches = manifest.batches, "Disk cache written");
        Ok(())
    }
}

fn batch_path(dir: &Path, index: usize) -> PathBuf {
    dir.join(format!("batch_{index:06}.bin"))
}

fn read_manifest(dir: &Path) -> Result<Manifest> {
    let file = File::open(dir.join(MANIFEST))?;
    Ok(serde_json::from_reader(BufReader::new(file))?)
}

fn write_batch(path: &Path, batch: &Batch) -> Result<()> {
    let file = BufWriter::new(File::create(path)?);
    bincode::serialize_into(file, batch)?;
    Ok(())
}

fn read_batch(path: &Path) -> Result<Batch> {
    let file = BufReader::new(File::open(path)?);
    Ok(bincode::deserialize_from(file)?)
}

impl BatchProvider for DataDiskCache {
    fn len(&self) -> usize {
        self.inner.len()
    }

    fn get_batch(&self, index: usize) -> Result<Batch> {
        check_index(index, self.len())?;
        let path = batch_path(&self.dir, index);
        match read_batch(&path) {
            Ok(batch) => {
                debug!(index, "Loaded batch from disk cache");
                Ok(batch)
            }
            Err(err) => {
                warn!(
                    path = %path.display(),
                    error = %err,
                    "Failed to read cached batch, recomputing"
                );
                let batch = self.inner.get_batch(index)?;
                write_batch(&path, &batch)?;
                Ok(batch)
            }
        }
    }

    fn target_data(&self) -> Result<Array2<f32>> {
        self.inner.target_data()
    }

    fn fork(&self) -> Result<Box<dyn BatchProvider>> {
        Ok(Box::new(Self {
            inner: self.inner.fork()?,
            dir: self.dir.clone(),
        }))
    }
}
