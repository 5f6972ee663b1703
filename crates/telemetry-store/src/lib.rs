//! Telemetry Store
//!
//! Read-only access to the racing database: laps, high-frequency telemetry
//! samples and weather readings. Backed by PostgreSQL in production and by an
//! in-memory store for tests and offline analysis.

mod config;
mod memory;
mod postgres;
mod records;

pub use config::StoreConfig;
pub use memory::MemoryStore;
pub use postgres::PgTelemetryStore;
pub use records::{LapRecord, RaceScope, TelemetrySample, WeatherReading};

use async_trait::async_trait;
use thiserror::Error;

/// Storage errors
#[derive(Debug, Error)]
pub enum StoreError {
    /// The store could not be reached. Not retried here.
    #[error("Telemetry store unreachable: {0}")]
    Connection(String),
    #[error("Query failed: {0}")]
    Query(String),
    #[error("Invalid store configuration: {0}")]
    InvalidConfig(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Io(_)
            | sqlx::Error::Tls(_)
            | sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed => StoreError::Connection(err.to_string()),
            other => StoreError::Query(other.to_string()),
        }
    }
}

/// Query interface over the source tables.
///
/// Implementations only read. Filtering beyond the scope (validity, duration,
/// outliers) is the caller's job.
#[async_trait]
pub trait TelemetryStore: Send + Sync {
    /// Laps belonging to the scope, in no particular order.
    async fn laps(&self, scope: &RaceScope) -> Result<Vec<LapRecord>, StoreError>;

    /// A single lap by id, regardless of validity.
    async fn lap(&self, lap_id: i64) -> Result<Option<LapRecord>, StoreError>;

    /// Samples linked to any of the given laps.
    async fn samples_for_laps(&self, lap_ids: &[i64]) -> Result<Vec<TelemetrySample>, StoreError>;

    /// Weather readings recorded for any of the given races.
    async fn weather_for_races(&self, race_ids: &[i64]) -> Result<Vec<WeatherReading>, StoreError>;
}

#[async_trait]
impl<T: TelemetryStore + ?Sized> TelemetryStore for std::sync::Arc<T> {
    async fn laps(&self, scope: &RaceScope) -> Result<Vec<LapRecord>, StoreError> {
        (**self).laps(scope).await
    }

    async fn lap(&self, lap_id: i64) -> Result<Option<LapRecord>, StoreError> {
        (**self).lap(lap_id).await
    }

    async fn samples_for_laps(&self, lap_ids: &[i64]) -> Result<Vec<TelemetrySample>, StoreError> {
        (**self).samples_for_laps(lap_ids).await
    }

    async fn weather_for_races(&self, race_ids: &[i64]) -> Result<Vec<WeatherReading>, StoreError> {
        (**self).weather_for_races(race_ids).await
    }
}
