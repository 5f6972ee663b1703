//! Stint Segmentation
//!
//! Partitions lap records by (vehicle, race), ranks laps by lap number and
//! measures how far each lap has drifted from the first lap of the stint.

use crate::aggregation::LapAggressionRecord;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;
use tracing::{debug, warn};

/// Default rolling window (laps)
pub const DEFAULT_DEGRADATION_WINDOW: usize = 5;

/// Errors during segmentation
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SegmentationError {
    #[error("Degradation window must be at least 1 lap, got {0}")]
    InvalidWindow(usize),
}

/// Lap record with its position in the stint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StintDegradationRecord {
    #[serde(flatten)]
    pub lap: LapAggressionRecord,
    /// 1-based rank within the (vehicle, race) partition
    pub lap_in_stint: u32,
    /// Lap time minus the first lap's time
    pub lap_time_delta: f64,
    /// Trailing-window mean lap time minus the first lap's time
    pub rolling_window_degradation: Option<f64>,
}

/// Stint segmenter
#[derive(Debug, Clone)]
pub struct StintSegmenter {
    window: usize,
}

impl Default for StintSegmenter {
    fn default() -> Self {
        Self {
            window: DEFAULT_DEGRADATION_WINDOW,
        }
    }
}

impl StintSegmenter {
    /// Create a segmenter with the given rolling window
    pub fn new(window: usize) -> Result<Self, SegmentationError> {
        if window == 0 {
            return Err(SegmentationError::InvalidWindow(window));
        }
        Ok(Self { window })
    }

    pub fn window(&self) -> usize {
        self.window
    }

    /// Add stint context to every record
    ///
    /// Output is sorted by `(race_id, vehicle_id, lap_number, lap_id)`. Two
    /// laps sharing a lap number inside one partition are logged and ordered
    /// by `lap_id`.
    pub fn segment(&self, records: Vec<LapAggressionRecord>) -> Vec<StintDegradationRecord> {
        let mut partitions: BTreeMap<(i64, i64), Vec<LapAggressionRecord>> = BTreeMap::new();
        for record in records {
            partitions
                .entry((record.race_id, record.vehicle_id))
                .or_default()
                .push(record);
        }

        let mut out = Vec::new();
        for ((race_id, vehicle_id), mut laps) in partitions {
            laps.sort_by_key(|l| (l.lap_number, l.lap_id));

            for pair in laps.windows(2) {
                if pair[0].lap_number == pair[1].lap_number {
                    warn!(
                        "Duplicate lap number {} for vehicle {} in race {} (laps {} and {}); ordering by lap id",
                        pair[0].lap_number, vehicle_id, race_id, pair[0].lap_id, pair[1].lap_id
                    );
                }
            }

            let times: Vec<f64> = laps.iter().map(|l| l.lap_time_seconds).collect();
            let first = times[0];

            for (idx, lap) in laps.into_iter().enumerate() {
                let from = (idx + 1).saturating_sub(self.window);
                let trailing = &times[from..=idx];
                let rolling_mean = trailing.iter().sum::<f64>() / trailing.len() as f64;
                let rolling = rolling_mean - first;

                out.push(StintDegradationRecord {
                    lap_time_delta: times[idx] - first,
                    rolling_window_degradation: rolling.is_finite().then_some(rolling),
                    lap_in_stint: (idx + 1) as u32,
                    lap,
                });
            }
        }

        debug!("Segmented {} laps (window={})", out.len(), self.window);
        out
    }
}
