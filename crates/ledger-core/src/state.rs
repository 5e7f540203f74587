//! Shared sync state types.

use std::fmt;

/// Where the reconciliation engine currently is within a sync cycle.
///
/// A full cycle walks `Idle -> Pulling -> Pushing -> Idle`; the periodic
/// lightweight path walks `Idle -> IncrementalPulling -> Idle`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SyncPhase {
    #[default]
    Idle,
    Pulling,
    Pushing,
    IncrementalPulling,
}

impl fmt::Display for SyncPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Idle => "idle",
            Self::Pulling => "pulling",
            Self::Pushing => "pushing",
            Self::IncrementalPulling => "incremental-pulling",
        };
        f.write_str(label)
    }
}
