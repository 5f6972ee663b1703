//! Source Records

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// One circuit traversal by one vehicle in one session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct LapRecord {
    pub lap_id: i64,
    pub vehicle_id: i64,
    pub session_id: i64,
    pub race_id: i64,
    pub track_id: Option<i64>,
    pub race_date: Option<NaiveDate>,
    /// Sequence number within the session. 32768 marks an overflowed counter.
    pub lap_number: i32,
    pub lap_start_time: Option<DateTime<Utc>>,
    pub lap_end_time: Option<DateTime<Utc>>,
    /// Stored duration. Known to contain corrupted values; never used for
    /// derived lap times.
    pub lap_duration: Option<f64>,
    pub is_valid: bool,
}

impl LapRecord {
    /// Lap time derived from the start/end timestamps
    pub fn derived_duration_seconds(&self) -> Option<f64> {
        let start = self.lap_start_time?;
        let end = self.lap_end_time?;
        let elapsed = end.signed_duration_since(start);
        // Millisecond resolution keeps the value exact for whole-second laps.
        Some(elapsed.num_milliseconds() as f64 / 1000.0)
    }
}

/// One high-frequency sensor reading
///
/// Most channels are optional: large fractions of samples lack GPS and speed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct TelemetrySample {
    pub lap_id: Option<i64>,
    /// Reception timestamp. The onboard ECU clock drifts and is not used.
    pub meta_time: DateTime<Utc>,
    /// Speed (km/h)
    pub speed: Option<f64>,
    pub gear: Option<i32>,
    /// Engine RPM
    pub nmot: Option<f64>,
    /// Throttle pedal position (%)
    pub aps: Option<f64>,
    /// Throttle blade position (%)
    pub ath: Option<f64>,
    /// Front brake pressure (bar)
    pub pbrake_f: Option<f64>,
    /// Rear brake pressure (bar)
    pub pbrake_r: Option<f64>,
    /// Longitudinal acceleration (g)
    pub accx_can: Option<f64>,
    /// Lateral acceleration (g)
    pub accy_can: Option<f64>,
    /// Steering wheel angle (degrees)
    pub steering_angle: Option<f64>,
    pub gps_lat: Option<f64>,
    pub gps_long: Option<f64>,
    /// Distance from the start/finish line (m)
    pub lap_distance: Option<f64>,
}

/// Ambient and track conditions at a point in time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct WeatherReading {
    pub race_id: i64,
    pub recorded_at: DateTime<Utc>,
    pub air_temp: Option<f64>,
    pub track_temp: Option<f64>,
    pub humidity: Option<f64>,
    pub wind_speed: Option<f64>,
}

/// Which laps a query covers. Empty means every lap.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RaceScope {
    /// Races to include; all races when unset
    #[serde(default)]
    pub race_ids: Option<Vec<i64>>,
    /// Track the races were held at
    #[serde(default)]
    pub track_id: Option<i64>,
    /// Single vehicle; all vehicles when unset
    #[serde(default)]
    pub vehicle_id: Option<i64>,
}

impl RaceScope {
    /// Every lap in the store
    pub fn all() -> Self {
        Self::default()
    }

    /// Laps from the given races
    pub fn races(race_ids: impl IntoIterator<Item = i64>) -> Self {
        Self {
            race_ids: Some(race_ids.into_iter().collect()),
            ..Self::default()
        }
    }

    /// Laps from races held at the given track
    pub fn track(track_id: i64) -> Self {
        Self {
            track_id: Some(track_id),
            ..Self::default()
        }
    }

    /// One vehicle's laps in one race, i.e. a single stint partition
    pub fn stint(race_id: i64, vehicle_id: i64) -> Self {
        Self {
            race_ids: Some(vec![race_id]),
            vehicle_id: Some(vehicle_id),
            ..Self::default()
        }
    }

    /// Whether a lap falls inside this scope
    pub fn contains(&self, lap: &LapRecord) -> bool {
        let race_ok = self
            .race_ids
            .as_ref()
            .map_or(true, |ids| ids.contains(&lap.race_id));
        let track_ok = self
            .track_id
            .map_or(true, |track| lap.track_id == Some(track));
        let vehicle_ok = self.vehicle_id.map_or(true, |v| lap.vehicle_id == v);
        race_ok && track_ok && vehicle_ok
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn lap(race_id: i64, track_id: Option<i64>) -> LapRecord {
        LapRecord {
            lap_id: 1,
            vehicle_id: 1,
            session_id: 1,
            race_id,
            track_id,
            race_date: None,
            lap_number: 3,
            lap_start_time: Some(Utc.with_ymd_and_hms(2025, 4, 5, 14, 0, 0).unwrap()),
            lap_end_time: Some(Utc.with_ymd_and_hms(2025, 4, 5, 14, 1, 30).unwrap()),
            lap_duration: Some(784369.0),
            is_valid: true,
        }
    }

    #[test]
    fn test_duration_ignores_stored_value() {
        let lap = lap(1, None);
        assert_eq!(lap.derived_duration_seconds(), Some(90.0));
    }

    #[test]
    fn test_duration_requires_both_timestamps() {
        let mut lap = lap(1, None);
        lap.lap_end_time = None;
        assert_eq!(lap.derived_duration_seconds(), None);
    }

    #[test]
    fn test_scope_filters() {
        assert!(RaceScope::all().contains(&lap(7, None)));
        assert!(RaceScope::races([7, 8]).contains(&lap(7, None)));
        assert!(!RaceScope::races([8]).contains(&lap(7, None)));
        assert!(RaceScope::track(2).contains(&lap(7, Some(2))));
        assert!(!RaceScope::track(2).contains(&lap(7, None)));
        assert!(RaceScope::stint(7, 1).contains(&lap(7, None)));
        assert!(!RaceScope::stint(7, 2).contains(&lap(7, None)));
        assert!(!RaceScope::stint(8, 1).contains(&lap(7, None)));
    }
}
