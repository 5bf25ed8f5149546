//! Engine policy knobs.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Longest accepted hold: one year.
pub const MAX_HOLD_SECS: u64 = 365 * 24 * 60 * 60;

/// What cancellation leaves behind.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum CancellationMode {
    /// Keep the row with status CANCELLED (audit history)
    #[default]
    MarkCancelled,
    /// Remove the row
    Delete,
}

/// Booking engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EngineConfig {
    /// Book into PENDING with a hold deadline instead of CONFIRMED.
    pub requires_confirmation: bool,
    /// Seconds a pending appointment holds its slot.
    pub hold_duration_secs: u64,
    /// Seconds between expiry sweeps.
    pub reap_interval_secs: u64,
    /// Upper bound on appointments expired per sweep.
    pub reap_batch_size: u32,
    pub cancellation: CancellationMode,
    /// How long a writer waits on a locked database before failing.
    pub busy_timeout_ms: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            requires_confirmation: true,
            hold_duration_secs: 120,
            reap_interval_secs: 30,
            reap_batch_size: 100,
            cancellation: CancellationMode::MarkCancelled,
            busy_timeout_ms: 5_000,
        }
    }
}

impl EngineConfig {
    /// Immediate confirmation, no holds.
    pub fn without_confirmation() -> Self {
        Self {
            requires_confirmation: false,
            ..Self::default()
        }
    }

    /// Reject settings the engine cannot honour.
    pub fn validate(&self) -> Result<(), String> {
        if self.hold_duration_secs > MAX_HOLD_SECS {
            return Err(format!(
                "hold_duration_secs {} exceeds the maximum of {MAX_HOLD_SECS}",
                self.hold_duration_secs
            ));
        }
        Ok(())
    }

    /// Hold length, capped at [`MAX_HOLD_SECS`].
    pub fn hold_duration(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.hold_duration_secs.min(MAX_HOLD_SECS) as i64)
    }

    pub fn reap_interval(&self) -> Duration {
        Duration::from_secs(self.reap_interval_secs.max(1))
    }

    pub fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.busy_timeout_ms)
    }
}
