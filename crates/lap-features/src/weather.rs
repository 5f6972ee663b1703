//! Nearest-in-time weather lookup

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use telemetry_store::WeatherReading;

/// Weather readings indexed by race, sorted by time
pub struct WeatherIndex {
    by_race: HashMap<i64, Vec<WeatherReading>>,
}

impl WeatherIndex {
    /// Build the index
    pub fn new(readings: &[WeatherReading]) -> Self {
        let mut by_race: HashMap<i64, Vec<WeatherReading>> = HashMap::new();
        for reading in readings {
            by_race.entry(reading.race_id).or_default().push(reading.clone());
        }
        for readings in by_race.values_mut() {
            readings.sort_by_key(|r| r.recorded_at);
        }
        Self { by_race }
    }

    /// Reading closest to `at` within the race. Ties go to the earlier reading.
    pub fn nearest(&self, race_id: i64, at: DateTime<Utc>) -> Option<&WeatherReading> {
        let readings = self.by_race.get(&race_id)?;
        let idx = readings.partition_point(|r| r.recorded_at < at);

        let after = readings.get(idx);
        let before = idx.checked_sub(1).and_then(|i| readings.get(i));

        match (before, after) {
            (Some(b), Some(a)) => {
                let gap_before = at.signed_duration_since(b.recorded_at);
                let gap_after = a.recorded_at.signed_duration_since(at);
                if gap_before <= gap_after {
                    Some(b)
                } else {
                    Some(a)
                }
            }
            (Some(b), None) => Some(b),
            (None, Some(a)) => Some(a),
            (None, None) => None,
        }
    }
}
