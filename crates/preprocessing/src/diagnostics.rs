//! Load diagnostics

use chrono::NaiveDate;
use lap_features::{FeatureColumn, StintDegradationRecord};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{info, warn};

/// Summary of a loaded record set
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LoadDiagnostics {
    pub row_count: usize,
    pub distinct_vehicles: usize,
    pub distinct_races: usize,
    /// Earliest and latest race date
    pub date_span: Option<(NaiveDate, NaiveDate)>,
    /// Missing cells per column, for columns with at least one
    pub null_columns: BTreeMap<FeatureColumn, usize>,
    pub missing_lap_times: usize,
}

impl LoadDiagnostics {
    pub fn from_records(records: &[StintDegradationRecord]) -> Self {
        let vehicles: BTreeSet<i64> = records.iter().map(|r| r.lap.vehicle_id).collect();
        let races: BTreeSet<i64> = records.iter().map(|r| r.lap.race_id).collect();

        let dates = records.iter().filter_map(|r| r.lap.race_date);
        let date_span = dates.clone().min().zip(dates.max());

        let mut null_columns = BTreeMap::new();
        for column in FeatureColumn::OUTLIER_SCREENED {
            let missing = records
                .iter()
                .filter(|r| !column.value(r).is_some_and(f64::is_finite))
                .count();
            if missing > 0 {
                null_columns.insert(column, missing);
            }
        }

        Self {
            row_count: records.len(),
            distinct_vehicles: vehicles.len(),
            distinct_races: races.len(),
            date_span,
            missing_lap_times: null_columns
                .get(&FeatureColumn::LapTimeSeconds)
                .copied()
                .unwrap_or(0),
            null_columns,
        }
    }

    pub fn log(&self) {
        info!(
            "Loaded {} laps from {} vehicles across {} races",
            self.row_count, self.distinct_vehicles, self.distinct_races
        );
        if let Some((first, last)) = self.date_span {
            info!("Date range: {} to {}", first, last);
        }
        for (column, missing) in &self.null_columns {
            warn!("Column {} has {} missing values", column, missing);
        }
        if self.missing_lap_times > 0 {
            warn!("{} laps are missing a lap time", self.missing_lap_times);
        }
    }
}
