//! Identifier and calendar types shared by the engine and the simulator.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Wall-clock instant used for every case timestamp.
pub type Timestamp = DateTime<Utc>;

/// Simulation epoch: 2026-01-01 00:00:00 UTC.
pub const SIMULATION_EPOCH_SECS: i64 = 1_767_225_600;

/// Returns the simulation epoch as a timestamp.
pub fn simulation_epoch() -> Timestamp {
    DateTime::from_timestamp(SIMULATION_EPOCH_SECS, 0).unwrap_or_default()
}

/// Returns `base` shifted by a whole number of calendar days.
pub fn add_days(base: Timestamp, days: i64) -> Timestamp {
    base + Duration::days(days)
}

/// Whole days elapsed from `from` to `to` (negative if `to` is earlier).
pub fn days_between(from: Timestamp, to: Timestamp) -> i64 {
    (to - from).num_days()
}

/// Builds a deterministic UUID from a 64-bit seed.
///
/// The same seed always yields the same id, so replays of a run produce
/// byte-identical output.
pub fn seeded_uuid(seed: u64) -> Uuid {
    let mut bytes = [0u8; 16];
    bytes[0..8].copy_from_slice(&seed.to_le_bytes());
    bytes[8..16].copy_from_slice(&seed.wrapping_mul(0x517cc1b727220a95).to_le_bytes());
    uuid::Builder::from_random_bytes(bytes).into_uuid()
}

macro_rules! seeded_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub Uuid);

        impl $name {
            /// Creates a new random id.
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            /// Creates a deterministic id from a seed (for simulation).
            pub fn from_seed(seed: u64) -> Self {
                Self(seeded_uuid(seed))
            }

            /// Returns the inner UUID.
            pub fn as_uuid(&self) -> Uuid {
                self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

seeded_id!(
    /// Identifier of a single case.
    CaseId
);

seeded_id!(
    /// Identifier of one recorded workflow event.
    EventId
);

seeded_id!(
    /// Identifier of one scenario run.
    RunId
);
