//! In-memory store

use crate::records::{LapRecord, RaceScope, TelemetrySample, WeatherReading};
use crate::{StoreError, TelemetryStore};
use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::RwLock;
use tracing::{debug, info};

/// Store holding all tables in memory
pub struct MemoryStore {
    laps: RwLock<Vec<LapRecord>>,
    samples: RwLock<Vec<TelemetrySample>>,
    weather: RwLock<Vec<WeatherReading>>,
}

fn lock_error<E: std::fmt::Display>(e: E) -> StoreError {
    StoreError::Query(format!("Lock error: {}", e))
}

impl MemoryStore {
    /// Create an empty store
    pub fn new() -> Self {
        info!("Creating in-memory telemetry store");
        Self {
            laps: RwLock::new(Vec::new()),
            samples: RwLock::new(Vec::new()),
            weather: RwLock::new(Vec::new()),
        }
    }

    /// Insert a lap
    pub fn insert_lap(&self, lap: LapRecord) -> Result<(), StoreError> {
        let mut laps = self.laps.write().map_err(lock_error)?;
        laps.push(lap);
        Ok(())
    }

    /// Insert telemetry samples
    pub fn insert_samples(
        &self,
        samples: impl IntoIterator<Item = TelemetrySample>,
    ) -> Result<(), StoreError> {
        let mut stored = self.samples.write().map_err(lock_error)?;
        let before = stored.len();
        stored.extend(samples);
        debug!("Inserted {} samples", stored.len() - before);
        Ok(())
    }

    /// Insert a weather reading
    pub fn insert_weather(&self, reading: WeatherReading) -> Result<(), StoreError> {
        let mut weather = self.weather.write().map_err(lock_error)?;
        weather.push(reading);
        Ok(())
    }

    /// Total lap count
    pub fn lap_count(&self) -> usize {
        self.laps.read().map(|l| l.len()).unwrap_or(0)
    }

    /// Total sample count
    pub fn sample_count(&self) -> usize {
        self.samples.read().map(|s| s.len()).unwrap_or(0)
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TelemetryStore for MemoryStore {
    async fn laps(&self, scope: &RaceScope) -> Result<Vec<LapRecord>, StoreError> {
        let laps = self.laps.read().map_err(lock_error)?;
        Ok(laps.iter().filter(|l| scope.contains(l)).cloned().collect())
    }

    async fn lap(&self, lap_id: i64) -> Result<Option<LapRecord>, StoreError> {
        let laps = self.laps.read().map_err(lock_error)?;
        Ok(laps.iter().find(|l| l.lap_id == lap_id).cloned())
    }

    async fn samples_for_laps(&self, lap_ids: &[i64]) -> Result<Vec<TelemetrySample>, StoreError> {
        let wanted: HashSet<i64> = lap_ids.iter().copied().collect();
        let samples = self.samples.read().map_err(lock_error)?;
        Ok(samples
            .iter()
            .filter(|s| s.lap_id.map_or(false, |id| wanted.contains(&id)))
            .cloned()
            .collect())
    }

    async fn weather_for_races(&self, race_ids: &[i64]) -> Result<Vec<WeatherReading>, StoreError> {
        let weather = self.weather.read().map_err(lock_error)?;
        Ok(weather
            .iter()
            .filter(|w| race_ids.contains(&w.race_id))
            .cloned()
            .collect())
    }
}
