//! End-to-end pipeline over an in-memory store

use async_trait::async_trait;
use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use lap_features::{FeatureColumn, LapRejection, LAP_NUMBER_SENTINEL};
use preprocessing::{
    FeaturePipeline, LapLookup, NormalizationMethod, PipelineSettings, PreprocessError,
};
use std::sync::{Arc, Mutex};
use telemetry_store::{
    LapRecord, MemoryStore, RaceScope, StoreError, TelemetrySample, TelemetryStore, WeatherReading,
};

const LAP_MILLIS: [i64; 5] = [90_000, 90_300, 90_800, 91_500, 91_200];

fn race_start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 4, 5, 14, 0, 0).unwrap()
}

fn lap(lap_id: i64, lap_number: i32, start: DateTime<Utc>, millis: i64) -> LapRecord {
    LapRecord {
        lap_id,
        vehicle_id: 13,
        session_id: 1,
        race_id: 1,
        track_id: Some(2),
        race_date: NaiveDate::from_ymd_opt(2025, 4, 5),
        lap_number,
        lap_start_time: Some(start),
        lap_end_time: Some(start + Duration::milliseconds(millis)),
        lap_duration: None,
        is_valid: true,
    }
}

fn samples(lap_id: i64, start: DateTime<Utc>, intensity: f64) -> Vec<TelemetrySample> {
    (0..4)
        .map(|i| {
            let k = i as f64;
            TelemetrySample {
                lap_id: Some(lap_id),
                meta_time: start + Duration::seconds(i * 20),
                speed: Some(140.0 + 5.0 * k + intensity),
                gear: Some(4),
                nmot: Some(6000.0 + 100.0 * k),
                aps: Some(80.0),
                ath: Some(70.0 + k + intensity),
                pbrake_f: Some(20.0 + 10.0 * k + intensity),
                pbrake_r: Some(15.0 + 5.0 * k),
                accx_can: Some(-0.8 + 0.4 * k),
                accy_can: Some(1.0 - 0.3 * k),
                steering_angle: Some(-20.0 + 12.0 * k + intensity),
                gps_lat: None,
                gps_long: None,
                lap_distance: None,
            }
        })
        .collect()
}

/// One five-lap stint plus an invalid lap, a sentinel lap and a lap without telemetry
fn seeded_store() -> Arc<MemoryStore> {
    let store = MemoryStore::new();
    let mut start = race_start();

    for (i, millis) in LAP_MILLIS.iter().enumerate() {
        let lap_id = 100 + i as i64;
        store.insert_lap(lap(lap_id, i as i32 + 1, start, *millis)).unwrap();
        store.insert_samples(samples(lap_id, start, i as f64)).unwrap();
        start = start + Duration::milliseconds(*millis);
    }

    let mut flagged = lap(200, 6, start, 92_000);
    flagged.is_valid = false;
    store.insert_lap(flagged).unwrap();
    store.insert_samples(samples(200, start, 2.0)).unwrap();

    store
        .insert_lap(lap(201, LAP_NUMBER_SENTINEL, start, 92_000))
        .unwrap();
    store.insert_samples(samples(201, start, 2.0)).unwrap();

    store.insert_lap(lap(202, 7, start, 92_500)).unwrap();

    store
        .insert_weather(WeatherReading {
            race_id: 1,
            recorded_at: race_start(),
            air_temp: Some(24.0),
            track_temp: Some(33.5),
            humidity: Some(55.0),
            wind_speed: Some(3.0),
        })
        .unwrap();

    Arc::new(store)
}

fn pipeline(store: Arc<MemoryStore>) -> FeaturePipeline<Arc<MemoryStore>> {
    FeaturePipeline::new(store, PipelineSettings::default())
}

#[tokio::test]
async fn test_load_filters_and_segments() {
    let p = pipeline(seeded_store());
    let loaded = p.load(&RaceScope::all(), 3.0, true).await.unwrap();

    assert_eq!(loaded.records.len(), 5);
    assert_eq!(loaded.aggregation.rejected.get(&LapRejection::FlaggedInvalid), Some(&1));
    assert_eq!(
        loaded.aggregation.rejected.get(&LapRejection::LapNumberOutOfRange),
        Some(&1)
    );
    assert_eq!(loaded.aggregation.zero_sample_laps, 1);
    assert_eq!(loaded.outliers.removed, 0);

    let ranks: Vec<u32> = loaded.records.iter().map(|r| r.lap_in_stint).collect();
    assert_eq!(ranks, vec![1, 2, 3, 4, 5]);
    let deltas = [0.0, 0.3, 0.8, 1.5, 1.2];
    for (r, d) in loaded.records.iter().zip(deltas) {
        assert!((r.lap_time_delta - d).abs() < 1e-9);
        assert_eq!(r.lap.weather.air_temp, Some(24.0));
        assert_eq!(r.lap.weather.temp_delta, Some(9.5));
    }

    assert_eq!(loaded.diagnostics.row_count, 5);
    assert_eq!(loaded.diagnostics.distinct_vehicles, 1);
    assert_eq!(loaded.diagnostics.missing_lap_times, 0);
}

#[tokio::test]
async fn test_lenient_load_keeps_flagged_laps() {
    let p = pipeline(seeded_store());
    let loaded = p.load(&RaceScope::all(), 3.0, false).await.unwrap();
    let ids: Vec<i64> = loaded.records.iter().map(|r| r.lap.lap_id).collect();
    assert!(ids.contains(&200));
    assert!(ids.contains(&201));
    // Still no telemetry for this one
    assert!(!ids.contains(&202));
}

#[tokio::test]
async fn test_prepare_training_data() {
    let mut p = pipeline(seeded_store());
    let (x, y) = p
        .prepare_training_data(&RaceScope::all(), NormalizationMethod::Standard, 3.0, 5, true)
        .await
        .unwrap();

    assert_eq!(x.nrows(), 5);
    assert_eq!(x.ncols(), FeatureColumn::MODEL_FEATURES.len());
    assert_eq!(x.columns(), &FeatureColumn::MODEL_FEATURES[..]);
    assert_eq!(y.len(), 5);

    // Target stays in seconds
    let expected = [0.0, 0.15, 1.1 / 3.0, 0.65, 0.76];
    for (v, e) in y.values().iter().zip(expected) {
        assert!((v - e).abs() < 1e-9, "{} != {}", v, e);
    }

    // Stint rank passes through unscaled
    let stint = x.column(FeatureColumn::LapInStint).unwrap();
    assert_eq!(stint.to_vec(), vec![1.0, 2.0, 3.0, 4.0, 5.0]);

    // Scaled columns are centred
    let brake = x.column(FeatureColumn::AvgBrakeFront).unwrap();
    assert!(brake.sum().abs() < 1e-9);

    let scaler = p.fitted_transform().unwrap();
    assert_eq!(scaler.method(), NormalizationMethod::Standard);
    assert_eq!(scaler.samples(), 5);
}

#[tokio::test]
async fn test_window_override() {
    let mut p = pipeline(seeded_store());
    let (_, y) = p
        .prepare_training_data(&RaceScope::all(), NormalizationMethod::MinMax, 3.0, 2, true)
        .await
        .unwrap();
    // mean(90.3, 90.8) - 90.0
    assert!((y.values()[2] - 0.55).abs() < 1e-9);
}

#[tokio::test]
async fn test_prepare_is_deterministic() {
    let store = seeded_store();
    let mut first = pipeline(store.clone());
    let mut second = pipeline(store);

    let (xa, ya) = first.prepare_default().await.unwrap();
    let (xb, yb) = second.prepare_default().await.unwrap();

    let bits = |m: &preprocessing::FeatureMatrix| -> Vec<u64> {
        m.values().iter().map(|v| v.to_bits()).collect()
    };
    assert_eq!(bits(&xa), bits(&xb));
    assert_eq!(ya, yb);
    assert_eq!(xa.lap_ids(), xb.lap_ids());
}

#[tokio::test]
async fn test_refit_is_idempotent() {
    let mut p = pipeline(seeded_store());
    let loaded = p.load(&RaceScope::all(), 3.0, true).await.unwrap();

    let fitted = p
        .normalize(&loaded.records, NormalizationMethod::Standard, true)
        .unwrap();
    let refitted = p
        .normalize(&loaded.records, NormalizationMethod::Standard, true)
        .unwrap();
    let reused = p
        .normalize(&loaded.records, NormalizationMethod::Standard, false)
        .unwrap();
    let reused_again = p
        .normalize(&loaded.records, NormalizationMethod::Standard, false)
        .unwrap();

    assert_eq!(fitted, refitted);
    assert_eq!(fitted, reused);
    assert_eq!(reused, reused_again);
}

#[tokio::test]
async fn test_empty_scope() {
    let mut p = pipeline(seeded_store());
    let (x, y) = p
        .prepare_training_data(&RaceScope::races([99]), NormalizationMethod::Standard, 3.0, 5, true)
        .await
        .unwrap();
    assert!(x.is_empty());
    assert!(y.is_empty());
    assert!(p.fitted_transform().is_none());
}

#[tokio::test]
async fn test_invalid_window() {
    let mut p = pipeline(seeded_store());
    let err = p
        .prepare_training_data(&RaceScope::all(), NormalizationMethod::Standard, 3.0, 0, true)
        .await
        .unwrap_err();
    assert!(matches!(err, PreprocessError::Segmentation(_)));
}

struct UnreachableStore;

#[async_trait]
impl TelemetryStore for UnreachableStore {
    async fn laps(&self, _scope: &RaceScope) -> Result<Vec<LapRecord>, StoreError> {
        Err(StoreError::Connection("connection refused".to_string()))
    }

    async fn lap(&self, _lap_id: i64) -> Result<Option<LapRecord>, StoreError> {
        Err(StoreError::Connection("connection refused".to_string()))
    }

    async fn samples_for_laps(&self, _lap_ids: &[i64]) -> Result<Vec<TelemetrySample>, StoreError> {
        Ok(Vec::new())
    }

    async fn weather_for_races(&self, _race_ids: &[i64]) -> Result<Vec<WeatherReading>, StoreError> {
        Ok(Vec::new())
    }
}

#[tokio::test]
async fn test_store_failure_propagates() {
    let p = FeaturePipeline::new(UnreachableStore, PipelineSettings::default());
    let err = p.load(&RaceScope::all(), 3.0, true).await.unwrap_err();
    assert!(matches!(err, PreprocessError::Store(StoreError::Connection(_))));
}

#[tokio::test]
async fn test_stint_records_skip_outlier_screening() {
    let p = pipeline(seeded_store());
    let records = p.stint_records(&RaceScope::all(), true).await.unwrap();
    assert_eq!(records.len(), 5);
    assert_eq!(records[4].lap.lap_id, 104);
    assert_eq!(records[4].lap_in_stint, 5);
}

#[tokio::test]
async fn test_lap_record_outcomes() {
    let p = pipeline(seeded_store());

    let LapLookup::Found(record) = p.lap_record(104, true).await.unwrap() else {
        panic!("lap 104 should be found");
    };
    assert_eq!(record.lap_in_stint, 5);
    assert!((record.lap_time_delta - 1.2).abs() < 1e-9);

    assert_eq!(
        p.lap_record(200, true).await.unwrap(),
        LapLookup::Rejected(LapRejection::FlaggedInvalid)
    );
    assert_eq!(
        p.lap_record(201, true).await.unwrap(),
        LapLookup::Rejected(LapRejection::LapNumberOutOfRange)
    );
    assert_eq!(p.lap_record(202, true).await.unwrap(), LapLookup::NoTelemetry);
    assert_eq!(p.lap_record(999, true).await.unwrap(), LapLookup::Unknown);

    let scoped = FeaturePipeline::new(
        seeded_store(),
        PipelineSettings {
            race_ids: Some(vec![2]),
            ..Default::default()
        },
    );
    assert_eq!(
        scoped.lap_record(104, true).await.unwrap(),
        LapLookup::OutOfScope { race_id: 1 }
    );
}

/// Records the lap ids of every sample request
struct RecordingStore {
    inner: Arc<MemoryStore>,
    sample_requests: Mutex<Vec<usize>>,
}

impl RecordingStore {
    fn new(inner: Arc<MemoryStore>) -> Self {
        Self {
            inner,
            sample_requests: Mutex::new(Vec::new()),
        }
    }

    fn sample_requests(&self) -> Vec<usize> {
        self.sample_requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl TelemetryStore for RecordingStore {
    async fn laps(&self, scope: &RaceScope) -> Result<Vec<LapRecord>, StoreError> {
        self.inner.laps(scope).await
    }

    async fn lap(&self, lap_id: i64) -> Result<Option<LapRecord>, StoreError> {
        self.inner.lap(lap_id).await
    }

    async fn samples_for_laps(&self, lap_ids: &[i64]) -> Result<Vec<TelemetrySample>, StoreError> {
        self.sample_requests.lock().unwrap().push(lap_ids.len());
        self.inner.samples_for_laps(lap_ids).await
    }

    async fn weather_for_races(&self, race_ids: &[i64]) -> Result<Vec<WeatherReading>, StoreError> {
        self.inner.weather_for_races(race_ids).await
    }
}

#[tokio::test]
async fn test_telemetry_fetched_in_chunks() {
    let store = Arc::new(RecordingStore::new(seeded_store()));
    let mut chunked = FeaturePipeline::new(
        store.clone(),
        PipelineSettings {
            fetch_chunk_laps: 3,
            ..Default::default()
        },
    );
    let mut whole = pipeline(seeded_store());

    let (xa, ya) = chunked.prepare_default().await.unwrap();
    let (xb, yb) = whole.prepare_default().await.unwrap();

    // 8 laps in scope
    assert_eq!(store.sample_requests(), vec![3, 3, 2]);
    assert_eq!(ya, yb);
    assert_eq!(xa.lap_ids(), xb.lap_ids());
    let bits = |m: &preprocessing::FeatureMatrix| -> Vec<u64> {
        m.values().iter().map(|v| v.to_bits()).collect()
    };
    assert_eq!(bits(&xa), bits(&xb));
}

#[tokio::test]
async fn test_lap_record_fetches_only_its_stint() {
    let shared = seeded_store();
    let mut other_car = lap(300, 1, race_start(), 90_500);
    other_car.vehicle_id = 21;
    shared.insert_lap(other_car).unwrap();
    shared
        .insert_samples(samples(300, race_start(), 0.0))
        .unwrap();

    let store = Arc::new(RecordingStore::new(shared));
    let p = FeaturePipeline::new(store.clone(), PipelineSettings::default());
    assert!(matches!(
        p.lap_record(102, true).await.unwrap(),
        LapLookup::Found(_)
    ));
    // Vehicle 13's laps in race 1, not the other car's
    assert_eq!(store.sample_requests(), vec![8]);
}
