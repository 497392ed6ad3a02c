//! Run configuration.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use casework_core::{PolicyPack, PolicyPackError};

use crate::scenarios::ScenarioId;

/// Configuration for a batch run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunConfig {
    /// Master seed for determinism
    pub seed: u64,

    /// Number of cases to generate
    pub count: usize,

    pub scenario: ScenarioId,

    /// Worker threads (1 = sequential)
    pub workers: usize,

    /// Pack directory to load instead of the built-in pack
    pub policy_pack: Option<PathBuf>,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            count: 100,
            scenario: ScenarioId::MissingDocs,
            workers: 1,
            policy_pack: None,
        }
    }
}

impl RunConfig {
    /// Loads the configured pack, or the built-in one.
    pub fn load_pack(&self) -> Result<PolicyPack, PolicyPackError> {
        match &self.policy_pack {
            Some(dir) => PolicyPack::load(dir),
            None => PolicyPack::builtin(),
        }
    }
}

/// Seed derived from time since the Unix epoch, for `--seed 0`.
///
/// Wraps instead of truncating a 128-bit nanosecond count, and never returns
/// 0 since that value requests a time seed.
pub fn seed_from_clock(elapsed: Duration) -> u64 {
    elapsed
        .as_secs()
        .wrapping_mul(1_000_000_000)
        .wrapping_add(u64::from(elapsed.subsec_nanos()))
        .max(1)
}
