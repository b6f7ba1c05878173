//! Selection of the prefetch concurrency strategy

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use slice_lid_core::{BatchProvider, Error, Result};

use crate::multiprocessed::MultiprocessedCache;
use crate::multithreaded::MultithreadedCache;

/// How prefetch workers are isolated from each other
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ConcurrencyMode {
    /// Threads sharing the upstream provider
    Thread,
    /// Share-nothing workers with their own copy of the upstream data
    Process,
}

impl ConcurrencyMode {
    /// Configuration name of the mode
    pub fn as_str(&self) -> &'static str {
        match self {
            ConcurrencyMode::Thread => "thread",
            ConcurrencyMode::Process => "process",
        }
    }
}

impl FromStr for ConcurrencyMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "thread" => Ok(ConcurrencyMode::Thread),
            "process" => Ok(ConcurrencyMode::Process),
            other => Err(Error::Config(format!("Unknown concurrency type: {other}"))),
        }
    }
}

impl TryFrom<String> for ConcurrencyMode {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<ConcurrencyMode> for String {
    fn from(mode: ConcurrencyMode) -> Self {
        mode.as_str().to_string()
    }
}

impl fmt::Display for ConcurrencyMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Worker count to use when none is configured
pub fn default_workers() -> usize {
    num_cpus::get()
}

/// Wrap `upstream` in the prefetching cache selected by `mode`
pub fn prefetch_cache(
    upstream: Box<dyn BatchProvider>,
    mode: ConcurrencyMode,
    workers: usize,
) -> Result<Box<dyn BatchProvider>> {
    Ok(match mode {
        ConcurrencyMode::Thread => Box::new(MultithreadedCache::new(upstream, workers)?),
        ConcurrencyMode::Process => Box::new(MultiprocessedCache::new(upstream, workers)?),
    })
}
