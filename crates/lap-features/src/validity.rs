//! Lap validity checks

use serde::{Deserialize, Serialize};
use std::fmt;
use telemetry_store::LapRecord;

/// Lap counter value produced by an overflowed logger
pub const LAP_NUMBER_SENTINEL: i32 = 32768;

/// Longest plausible racing lap (seconds). Longer laps are pit stops or glitches.
pub const MAX_LAP_SECONDS: f64 = 300.0;

/// Why a lap was left out of the aggregation
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LapRejection {
    /// `is_valid` is false
    FlaggedInvalid,
    /// Lap number outside (0, 32768)
    LapNumberOutOfRange,
    /// Start or end timestamp missing
    MissingTimestamps,
    /// Derived duration outside (0, max]
    ImplausibleDuration,
}

impl fmt::Display for LapRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reason = match self {
            Self::FlaggedInvalid => "flagged invalid",
            Self::LapNumberOutOfRange => "lap number out of range",
            Self::MissingTimestamps => "missing start or end timestamp",
            Self::ImplausibleDuration => "implausible lap duration",
        };
        f.write_str(reason)
    }
}

/// Lap filter
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LapFilter {
    /// Reject laps flagged invalid or carrying an out-of-range lap number
    pub reject_flagged: bool,
    /// Upper bound on the derived lap time (inclusive)
    pub max_lap_seconds: f64,
}

impl Default for LapFilter {
    fn default() -> Self {
        Self::strict()
    }
}

impl LapFilter {
    /// Apply every check
    pub fn strict() -> Self {
        Self {
            reject_flagged: true,
            max_lap_seconds: MAX_LAP_SECONDS,
        }
    }

    /// Keep flagged laps; still require timestamps and a plausible duration
    pub fn lenient() -> Self {
        Self {
            reject_flagged: false,
            max_lap_seconds: MAX_LAP_SECONDS,
        }
    }

    /// Check a lap, returning its derived duration in seconds
    pub fn check(&self, lap: &LapRecord) -> Result<f64, LapRejection> {
        if self.reject_flagged {
            if !lap.is_valid {
                return Err(LapRejection::FlaggedInvalid);
            }
            if lap.lap_number <= 0 || lap.lap_number >= LAP_NUMBER_SENTINEL {
                return Err(LapRejection::LapNumberOutOfRange);
            }
        }

        let duration = lap
            .derived_duration_seconds()
            .ok_or(LapRejection::MissingTimestamps)?;

        if duration <= 0.0 || duration > self.max_lap_seconds {
            return Err(LapRejection::ImplausibleDuration);
        }
        Ok(duration)
    }
}
