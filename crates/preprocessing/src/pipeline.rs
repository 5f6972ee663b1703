//! Feature pipeline
//!
//! Store → aggregation → stint segmentation → outlier removal → target
//! selection → normalization → model-ready matrices.

use crate::diagnostics::LoadDiagnostics;
use crate::error::PreprocessError;
use crate::matrix::{build_target, FeatureMatrix, TargetVector};
use crate::normalizer::{FittedScaler, NormalizationMethod};
use crate::outlier::{self, OutlierReport};
use crate::settings::PipelineSettings;
use lap_features::{
    AggregationReport, FeatureColumn, LapAggregator, LapRejection, StintDegradationRecord,
    StintSegmenter,
};
use std::collections::BTreeSet;
use std::sync::Arc;
use telemetry_store::{RaceScope, TelemetryStore};
use tracing::{info, warn};

/// Records produced by [`FeaturePipeline::load`]
#[derive(Debug, Clone)]
pub struct LoadedData {
    /// Screened stint records
    pub records: Vec<StintDegradationRecord>,
    /// Summary of the screened records
    pub diagnostics: LoadDiagnostics,
    /// Filtering counts from aggregation
    pub aggregation: AggregationReport,
    /// Outlier screening counts
    pub outliers: OutlierReport,
}

/// Result of looking up a single lap for inference
#[derive(Debug, Clone, PartialEq)]
pub enum LapLookup {
    /// Aggregated and ranked within its stint
    Found(StintDegradationRecord),
    /// No lap with that id
    Unknown,
    /// The lap's race is outside the configured races
    OutOfScope { race_id: i64 },
    /// The lap filter rejected it
    Rejected(LapRejection),
    /// Valid, but no telemetry samples were recorded
    NoTelemetry,
}

/// Feature pipeline over a telemetry store
pub struct FeaturePipeline<S> {
    /// Source of laps, samples and weather
    store: S,
    /// Pipeline configuration
    settings: PipelineSettings,
    /// Transform from the latest fit
    scaler: Option<Arc<FittedScaler>>,
}

impl<S: TelemetryStore> FeaturePipeline<S> {
    pub fn new(store: S, settings: PipelineSettings) -> Self {
        Self {
            store,
            settings,
            scaler: None,
        }
    }

    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Load, aggregate, segment and screen laps in scope
    pub async fn load(
        &self,
        scope: &RaceScope,
        outlier_threshold: f64,
        filter_invalid: bool,
    ) -> Result<LoadedData, PreprocessError> {
        self.load_with_window(scope, outlier_threshold, filter_invalid, self.settings.degradation_window)
            .await
    }

    async fn load_with_window(
        &self,
        scope: &RaceScope,
        outlier_threshold: f64,
        filter_invalid: bool,
        window: usize,
    ) -> Result<LoadedData, PreprocessError> {
        let (segmented, aggregation) = self.segmented(scope, filter_invalid, window).await?;
        let (records, outliers) = outlier::remove_outliers(segmented, outlier_threshold)?;

        let diagnostics = LoadDiagnostics::from_records(&records);
        diagnostics.log();

        Ok(LoadedData {
            records,
            diagnostics,
            aggregation,
            outliers,
        })
    }

    /// Aggregated and segmented laps in scope, without outlier screening
    ///
    /// Inference looks laps up here so an unusual lap can still be scored.
    pub async fn stint_records(
        &self,
        scope: &RaceScope,
        filter_invalid: bool,
    ) -> Result<Vec<StintDegradationRecord>, PreprocessError> {
        let (records, _) = self
            .segmented(scope, filter_invalid, self.settings.degradation_window)
            .await?;
        Ok(records)
    }

    async fn segmented(
        &self,
        scope: &RaceScope,
        filter_invalid: bool,
        window: usize,
    ) -> Result<(Vec<StintDegradationRecord>, AggregationReport), PreprocessError> {
        let segmenter = StintSegmenter::new(window)?;

        info!("Loading laps from telemetry store");
        let laps = self.store.laps(scope).await?;
        let race_ids: Vec<i64> = laps
            .iter()
            .map(|l| l.race_id)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let weather = self.store.weather_for_races(&race_ids).await?;

        // Samples are only held for one chunk of laps at a time
        let aggregator = LapAggregator::new(self.settings.aggregation(filter_invalid));
        let mut records = Vec::with_capacity(laps.len());
        let mut report = AggregationReport::default();
        let mut sample_total = 0;
        for chunk in laps.chunks(self.settings.fetch_chunk_laps.max(1)) {
            let lap_ids: Vec<i64> = chunk.iter().map(|l| l.lap_id).collect();
            let samples = self.store.samples_for_laps(&lap_ids).await?;
            sample_total += samples.len();
            let outcome = aggregator.aggregate(chunk, &samples, &weather);
            records.extend(outcome.records);
            report.merge(outcome.report);
        }
        info!(
            "Fetched {} laps, {} samples, {} weather readings",
            laps.len(),
            sample_total,
            weather.len()
        );

        for (reason, count) in &report.rejected {
            info!("Filtered {} laps: {:?}", count, reason);
        }
        if report.zero_sample_laps > 0 {
            warn!("{} laps have no telemetry samples", report.zero_sample_laps);
        }

        Ok((segmenter.segment(records), report))
    }

    /// Stint record for one lap, fetching only that lap's stint
    ///
    /// The lap's vehicle and race are resolved first so rank and rolling
    /// degradation are computed over its own stint. Outliers are not screened.
    pub async fn lap_record(
        &self,
        lap_id: i64,
        filter_invalid: bool,
    ) -> Result<LapLookup, PreprocessError> {
        let Some(lap) = self.store.lap(lap_id).await? else {
            return Ok(LapLookup::Unknown);
        };
        if !self.settings.scope().contains(&lap) {
            return Ok(LapLookup::OutOfScope {
                race_id: lap.race_id,
            });
        }
        if let Err(reason) = self.settings.aggregation(filter_invalid).filter.check(&lap) {
            return Ok(LapLookup::Rejected(reason));
        }

        let stint = RaceScope::stint(lap.race_id, lap.vehicle_id);
        let (records, _) = self
            .segmented(&stint, filter_invalid, self.settings.degradation_window)
            .await?;
        Ok(records
            .into_iter()
            .find(|r| r.lap.lap_id == lap_id)
            .map_or(LapLookup::NoTelemetry, LapLookup::Found))
    }

    /// Z-score outlier removal; see [`outlier::remove_outliers`]
    pub fn remove_outliers(
        &self,
        records: Vec<StintDegradationRecord>,
        threshold: f64,
    ) -> Result<(Vec<StintDegradationRecord>, OutlierReport), PreprocessError> {
        outlier::remove_outliers(records, threshold)
    }

    /// Scale the scaled columns
    ///
    /// With `fit` the scaler is (re)fitted on `records` and replaces any
    /// previous one. Without it the stored scaler is reused.
    pub fn normalize(
        &mut self,
        records: &[StintDegradationRecord],
        method: NormalizationMethod,
        fit: bool,
    ) -> Result<Vec<StintDegradationRecord>, PreprocessError> {
        if fit {
            let scaler = Arc::new(FittedScaler::fit(method, records));
            let out = scaler.transform(records);
            self.scaler = Some(scaler);
            info!("Fitted {} normalization on {} records", method, records.len());
            return Ok(out);
        }

        let scaler = self.scaler.as_ref().ok_or(PreprocessError::NotFitted)?;
        if scaler.method() != method {
            return Err(PreprocessError::MethodMismatch {
                fitted: scaler.method(),
                requested: method,
            });
        }
        Ok(scaler.transform(records))
    }

    /// Target selection; see [`build_target`]
    pub fn build_target(
        &self,
        records: Vec<StintDegradationRecord>,
        drop_null_targets: bool,
    ) -> (Vec<StintDegradationRecord>, usize) {
        build_target(records, drop_null_targets)
    }

    /// Full training-data preparation
    ///
    /// The target is taken before normalization and is never scaled.
    pub async fn prepare_training_data(
        &mut self,
        scope: &RaceScope,
        method: NormalizationMethod,
        outlier_threshold: f64,
        window: usize,
        drop_null_targets: bool,
    ) -> Result<(FeatureMatrix, TargetVector), PreprocessError> {
        info!("Step 1: loading and screening laps");
        let loaded = self
            .load_with_window(scope, outlier_threshold, self.settings.filter_invalid, window)
            .await?;

        info!("Step 2: selecting target");
        let (records, _) = build_target(loaded.records, drop_null_targets);
        if records.is_empty() {
            warn!("No laps left to train on");
            return Ok((FeatureMatrix::empty(), TargetVector::empty()));
        }

        info!("Step 3: normalizing features ({})", method);
        let target = TargetVector::from_records(&records);
        let normalized = self.normalize(&records, method, true)?;

        info!("Step 4: building feature matrix");
        let features = FeatureMatrix::from_records(&normalized, &FeatureColumn::MODEL_FEATURES);
        info!(
            "Prepared {} samples with {} features",
            features.nrows(),
            features.ncols()
        );
        Ok((features, target))
    }

    /// [`prepare_training_data`](Self::prepare_training_data) with the configured settings
    pub async fn prepare_default(&mut self) -> Result<(FeatureMatrix, TargetVector), PreprocessError> {
        let s = self.settings.clone();
        self.prepare_training_data(
            &s.scope(),
            s.normalization,
            s.outlier_threshold,
            s.degradation_window,
            s.drop_null_targets,
        )
        .await
    }

    /// The fitted scaler, once a fit has happened
    pub fn fitted_transform(&self) -> Option<Arc<FittedScaler>> {
        self.scaler.clone()
    }
}
