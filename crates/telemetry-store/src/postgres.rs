//! PostgreSQL store

use crate::config::StoreConfig;
use crate::records::{LapRecord, RaceScope, TelemetrySample, WeatherReading};
use crate::{StoreError, TelemetryStore};
use async_trait::async_trait;
use sqlx::postgres::{PgConnectOptions, PgPool, PgPoolOptions};
use std::time::Duration;
use tracing::{debug, info};

/// Lap ids per telemetry query
const SAMPLE_QUERY_CHUNK: usize = 500;

macro_rules! lap_select {
    () => {
        r#"
SELECT
    l.lap_id::BIGINT AS lap_id,
    l.vehicle_id::BIGINT AS vehicle_id,
    l.session_id::BIGINT AS session_id,
    s.race_id::BIGINT AS race_id,
    r.track_id::BIGINT AS track_id,
    r.race_date::DATE AS race_date,
    l.lap_number::INTEGER AS lap_number,
    l.lap_start_time::TIMESTAMPTZ AS lap_start_time,
    l.lap_end_time::TIMESTAMPTZ AS lap_end_time,
    l.lap_duration::DOUBLE PRECISION AS lap_duration,
    COALESCE(l.is_valid_lap, TRUE) AS is_valid
FROM laps l
JOIN sessions s ON l.session_id = s.session_id
JOIN races r ON s.race_id = r.race_id
"#
    };
}

const LAPS_QUERY: &str = concat!(
    lap_select!(),
    r#"WHERE ($1::BIGINT[] IS NULL OR s.race_id = ANY($1))
  AND ($2::BIGINT IS NULL OR r.track_id = $2)
  AND ($3::BIGINT IS NULL OR l.vehicle_id = $3)
"#
);

const LAP_BY_ID_QUERY: &str = concat!(lap_select!(), "WHERE l.lap_id = $1\n");

const SAMPLES_QUERY: &str = r#"
SELECT
    lap_id::BIGINT AS lap_id,
    meta_time::TIMESTAMPTZ AS meta_time,
    speed::DOUBLE PRECISION AS speed,
    gear::INTEGER AS gear,
    nmot::DOUBLE PRECISION AS nmot,
    aps::DOUBLE PRECISION AS aps,
    ath::DOUBLE PRECISION AS ath,
    pbrake_f::DOUBLE PRECISION AS pbrake_f,
    pbrake_r::DOUBLE PRECISION AS pbrake_r,
    accx_can::DOUBLE PRECISION AS accx_can,
    accy_can::DOUBLE PRECISION AS accy_can,
    steering_angle::DOUBLE PRECISION AS steering_angle,
    vbox_lat_min::DOUBLE PRECISION AS gps_lat,
    vbox_long_minutes::DOUBLE PRECISION AS gps_long,
    laptrigger_lapdist_dls::DOUBLE PRECISION AS lap_distance
FROM telemetry_readings
WHERE lap_id = ANY($1)
  AND meta_time IS NOT NULL
ORDER BY lap_id, meta_time
"#;

const WEATHER_QUERY: &str = r#"
SELECT
    race_id::BIGINT AS race_id,
    "timestamp"::TIMESTAMPTZ AS recorded_at,
    air_temp::DOUBLE PRECISION AS air_temp,
    track_temp::DOUBLE PRECISION AS track_temp,
    humidity::DOUBLE PRECISION AS humidity,
    wind_speed::DOUBLE PRECISION AS wind_speed
FROM weather_data
WHERE race_id = ANY($1)
  AND "timestamp" IS NOT NULL
ORDER BY race_id, "timestamp"
"#;

/// Store reading from the racing PostgreSQL database
pub struct PgTelemetryStore {
    pool: PgPool,
}

impl PgTelemetryStore {
    /// Connect to the database. Fails immediately if it is unreachable.
    pub async fn connect(config: &StoreConfig) -> Result<Self, StoreError> {
        let options = Self::connect_options(config)?;
        info!(
            "Connecting to telemetry store at {}:{}/{}",
            config.host, config.port, config.database
        );

        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(Duration::from_secs(config.connect_timeout_secs))
            .connect_with(options)
            .await
            .map_err(|e| StoreError::Connection(e.to_string()))?;

        Ok(Self { pool })
    }

    /// Build connection options, validating the configuration first
    pub fn connect_options(config: &StoreConfig) -> Result<PgConnectOptions, StoreError> {
        if config.host.trim().is_empty() {
            return Err(StoreError::InvalidConfig("host is empty".to_string()));
        }
        if config.database.trim().is_empty() {
            return Err(StoreError::InvalidConfig("database is empty".to_string()));
        }
        if config.max_connections == 0 {
            return Err(StoreError::InvalidConfig(
                "max_connections must be at least 1".to_string(),
            ));
        }

        let mut options = PgConnectOptions::new()
            .host(&config.host)
            .port(config.port)
            .database(&config.database)
            .username(&config.user);
        if !config.password.is_empty() {
            options = options.password(&config.password);
        }
        Ok(options)
    }
}

#[async_trait]
impl TelemetryStore for PgTelemetryStore {
    async fn laps(&self, scope: &RaceScope) -> Result<Vec<LapRecord>, StoreError> {
        let laps = sqlx::query_as::<_, LapRecord>(LAPS_QUERY)
            .bind(scope.race_ids.as_deref())
            .bind(scope.track_id)
            .bind(scope.vehicle_id)
            .fetch_all(&self.pool)
            .await?;
        debug!("Fetched {} laps for scope {:?}", laps.len(), scope);
        Ok(laps)
    }

    async fn lap(&self, lap_id: i64) -> Result<Option<LapRecord>, StoreError> {
        let lap = sqlx::query_as::<_, LapRecord>(LAP_BY_ID_QUERY)
            .bind(lap_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(lap)
    }

    async fn samples_for_laps(&self, lap_ids: &[i64]) -> Result<Vec<TelemetrySample>, StoreError> {
        let mut samples = Vec::new();
        for chunk in lap_ids.chunks(SAMPLE_QUERY_CHUNK) {
            let batch = sqlx::query_as::<_, TelemetrySample>(SAMPLES_QUERY)
                .bind(chunk)
                .fetch_all(&self.pool)
                .await?;
            samples.extend(batch);
        }
        debug!("Fetched {} samples for {} laps", samples.len(), lap_ids.len());
        Ok(samples)
    }

    async fn weather_for_races(&self, race_ids: &[i64]) -> Result<Vec<WeatherReading>, StoreError> {
        if race_ids.is_empty() {
            return Ok(Vec::new());
        }
        let weather = sqlx::query_as::<_, WeatherReading>(WEATHER_QUERY)
            .bind(race_ids)
            .fetch_all(&self.pool)
            .await?;
        debug!("Fetched {} weather readings", weather.len());
        Ok(weather)
    }
}
