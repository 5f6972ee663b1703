//! Feature rows for inference

use crate::PredictionError;
use lap_features::{FeatureColumn, StintDegradationRecord};
use ndarray::Array1;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

/// Fill values for columns a lap is missing at inference time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InferenceDefaults {
    pub air_temp: f64,
    pub track_temp: f64,
    pub humidity: f64,
    pub wind_speed: f64,
    pub temp_delta: f64,
    /// Used for every telemetry-derived column
    pub telemetry: f64,
}

impl Default for InferenceDefaults {
    fn default() -> Self {
        Self {
            air_temp: 25.0,
            track_temp: 30.0,
            humidity: 50.0,
            wind_speed: 5.0,
            temp_delta: 5.0,
            telemetry: 0.0,
        }
    }
}

impl InferenceDefaults {
    pub fn value_for(&self, column: FeatureColumn) -> f64 {
        match column {
            FeatureColumn::AirTemp => self.air_temp,
            FeatureColumn::TrackTemp => self.track_temp,
            FeatureColumn::Humidity => self.humidity,
            FeatureColumn::WindSpeed => self.wind_speed,
            FeatureColumn::TempDelta => self.temp_delta,
            _ => self.telemetry,
        }
    }
}

/// Raw (unscaled) model inputs keyed by column
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FeatureRow {
    values: BTreeMap<FeatureColumn, f64>,
}

impl FeatureRow {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style setter
    pub fn with(mut self, column: FeatureColumn, value: f64) -> Self {
        self.values.insert(column, value);
        self
    }

    pub fn set(&mut self, column: FeatureColumn, value: f64) {
        self.values.insert(column, value);
    }

    pub fn get(&self, column: FeatureColumn) -> Option<f64> {
        self.values.get(&column).copied()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (FeatureColumn, f64)> + '_ {
        self.values.iter().map(|(c, v)| (*c, *v))
    }

    /// Model columns present on the record. Missing values are left out.
    pub fn from_record(record: &StintDegradationRecord) -> Self {
        let values = FeatureColumn::MODEL_FEATURES
            .iter()
            .filter_map(|c| c.value(record).map(|v| (*c, v)))
            .collect();
        Self { values }
    }

    /// Every model column, filling missing values from `defaults`
    pub fn from_record_with_defaults(
        record: &StintDegradationRecord,
        defaults: &InferenceDefaults,
    ) -> Self {
        let mut row = Self::from_record(record);
        for column in FeatureColumn::MODEL_FEATURES {
            if !row.values.contains_key(&column) {
                let fill = defaults.value_for(column);
                debug!(
                    "Lap {}: {} missing, using default {}",
                    record.lap.lap_id, column, fill
                );
                row.values.insert(column, fill);
            }
        }
        row
    }

    pub(crate) fn value_mut(&mut self, column: FeatureColumn) -> Result<&mut f64, PredictionError> {
        self.values
            .get_mut(&column)
            .ok_or(PredictionError::MissingFeature(column))
    }

    /// Values in the given column order
    pub fn to_array(&self, columns: &[FeatureColumn]) -> Result<Array1<f64>, PredictionError> {
        columns
            .iter()
            .map(|c| self.get(*c).ok_or(PredictionError::MissingFeature(*c)))
            .collect::<Result<Vec<_>, _>>()
            .map(Array1::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use lap_features::{AggressionMetrics, LapAggressionRecord, WeatherConditions};

    fn record() -> StintDegradationRecord {
        StintDegradationRecord {
            lap: LapAggressionRecord {
                lap_id: 42,
                vehicle_id: 1,
                session_id: 1,
                race_id: 1,
                track_id: None,
                race_date: None,
                lap_number: 4,
                lap_start_time: Utc.with_ymd_and_hms(2025, 4, 5, 14, 0, 0).unwrap(),
                lap_time_seconds: 91.5,
                sample_count: 10,
                weather: WeatherConditions {
                    air_temp: Some(22.0),
                    ..Default::default()
                },
                aggression: AggressionMetrics {
                    avg_brake_front: Some(45.0),
                    ..Default::default()
                },
            },
            lap_in_stint: 4,
            lap_time_delta: 1.5,
            rolling_window_degradation: Some(0.65),
        }
    }

    #[test]
    fn test_from_record_skips_missing() {
        let row = FeatureRow::from_record(&record());
        assert_eq!(row.get(FeatureColumn::AirTemp), Some(22.0));
        assert_eq!(row.get(FeatureColumn::LapInStint), Some(4.0));
        assert_eq!(row.get(FeatureColumn::TrackTemp), None);
        // Target and lap time are not model inputs
        assert_eq!(row.get(FeatureColumn::RollingWindowDegradation), None);
        assert_eq!(row.len(), 3);
    }

    #[test]
    fn test_defaults_fill_every_column() {
        let row = FeatureRow::from_record_with_defaults(&record(), &InferenceDefaults::default());
        assert_eq!(row.len(), FeatureColumn::MODEL_FEATURES.len());
        assert_eq!(row.get(FeatureColumn::AirTemp), Some(22.0));
        assert_eq!(row.get(FeatureColumn::TrackTemp), Some(30.0));
        assert_eq!(row.get(FeatureColumn::Humidity), Some(50.0));
        assert_eq!(row.get(FeatureColumn::WindSpeed), Some(5.0));
        assert_eq!(row.get(FeatureColumn::TempDelta), Some(5.0));
        assert_eq!(row.get(FeatureColumn::AvgSpeed), Some(0.0));
    }

    #[test]
    fn test_to_array_order_and_missing() {
        let row = FeatureRow::new()
            .with(FeatureColumn::AvgSpeed, 150.0)
            .with(FeatureColumn::AirTemp, 20.0);
        let x = row
            .to_array(&[FeatureColumn::AirTemp, FeatureColumn::AvgSpeed])
            .unwrap();
        assert_eq!(x.to_vec(), vec![20.0, 150.0]);

        assert!(matches!(
            row.to_array(&[FeatureColumn::MaxRpm]),
            Err(PredictionError::MissingFeature(FeatureColumn::MaxRpm))
        ));
    }
}
