//! Command execution

use crate::command::Command;
use crate::export::write_training_csv;
use crate::settings::AppConfig;
use anyhow::{bail, Context, Result};
use degradation_model::{
    coaching_insights, efficiency_score, DegradationLevel, DegradationPredictor, FeatureRow,
    InferenceDefaults, StintProjection, WhatIfOutcome, WhatIfScenario, STINT_PROJECTION_LAPS,
};
use lap_features::{FeatureColumn, StintDegradationRecord};
use preprocessing::{FeaturePipeline, FittedScaler, LapLookup, NormalizationMethod};
use serde::Serialize;
use std::fs::{self, File};
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use telemetry_store::{PgTelemetryStore, TelemetryStore};
use tracing::info;

pub const FEATURES_FILE: &str = "features.csv";
pub const SCALER_FILE: &str = "scaler.json";

#[derive(Debug, Serialize)]
pub struct PrepareSummary {
    /// Training rows written
    pub samples: usize,
    /// Feature columns per row
    pub features: usize,
    /// Method of the fitted scaler; unset when nothing was fitted
    pub normalization: Option<NormalizationMethod>,
    /// Written `(X, y)` CSV
    pub features_path: PathBuf,
    /// Written scaler, if one was fitted
    pub scaler_path: Option<PathBuf>,
}

#[derive(Debug, Serialize)]
pub struct LapPrediction {
    /// Scored lap
    pub lap_id: i64,
    /// Car that drove it
    pub vehicle_id: i64,
    /// Race it belongs to
    pub race_id: i64,
    /// Sequence number within the session
    pub lap_number: i32,
    /// 1-based rank within the stint
    pub lap_in_stint: u32,
    /// Derived lap time
    pub lap_time_seconds: f64,
    /// Model output (seconds)
    pub predicted_degradation: f64,
    /// Band of the prediction
    pub level: DegradationLevel,
    /// Driver-facing description of the band
    pub assessment: &'static str,
    /// Rolling degradation measured on track
    pub observed_degradation: Option<f64>,
    /// Lap pace per unit of predicted wear
    pub efficiency_score: f64,
}

#[derive(Debug, Serialize)]
pub struct WhatIfReport {
    /// Baseline lap
    pub lap_id: i64,
    /// Baseline and adjusted predictions
    pub outcome: WhatIfOutcome,
    /// Band of the baseline prediction
    pub baseline_level: DegradationLevel,
    /// Band of the adjusted prediction
    pub adjusted_level: DegradationLevel,
    /// Wear over a full stint
    pub projection: StintProjection,
    /// Coaching notes
    pub insights: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct ImportanceEntry {
    /// Model input
    pub feature: FeatureColumn,
    /// Share of the forest's impurity reduction
    pub importance: f64,
}

/// Composition root: owns configuration and builds services on demand
pub struct AppContext {
    config: AppConfig,
}

impl AppContext {
    pub fn new(config: AppConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    async fn pipeline(&self) -> Result<FeaturePipeline<PgTelemetryStore>> {
        let store = PgTelemetryStore::connect(&self.config.store)
            .await
            .context("Could not connect to the telemetry store")?;
        Ok(FeaturePipeline::new(store, self.config.pipeline.clone()))
    }

    fn predictor(&self) -> Result<DegradationPredictor> {
        let model = &self.config.model;
        let scaler = model
            .scaler_path
            .as_deref()
            .map(load_scaler)
            .transpose()?;
        DegradationPredictor::load(&model.model_path, &model.metadata_path, scaler)
            .context("Could not load the degradation model")
    }

    /// Run one command and print its JSON report to stdout
    pub async fn run(&self, command: Command) -> Result<()> {
        match command {
            Command::Prepare { out_dir } => {
                let mut pipeline = self.pipeline().await?;
                print_json(&prepare(&mut pipeline, &out_dir).await?)
            }
            Command::Predict { lap_id } => {
                let predictor = self.predictor()?;
                let pipeline = self.pipeline().await?;
                let report =
                    predict_lap(&pipeline, &predictor, lap_id, &self.config.model.defaults).await?;
                print_json(&report)
            }
            Command::WhatIf { lap_id, scenario } => {
                let predictor = self.predictor()?;
                let pipeline = self.pipeline().await?;
                let report = what_if_lap(
                    &pipeline,
                    &predictor,
                    lap_id,
                    &scenario,
                    &self.config.model.defaults,
                )
                .await?;
                print_json(&report)
            }
            Command::Importance => print_json(&importance(&self.predictor()?)),
        }
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

pub fn load_scaler(path: &Path) -> Result<Arc<FittedScaler>> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("Could not read scaler {}", path.display()))?;
    let scaler: FittedScaler = serde_json::from_str(&text)
        .with_context(|| format!("Invalid scaler {}", path.display()))?;
    Ok(Arc::new(scaler))
}

/// Prepare training data with the configured settings and write it to `out_dir`
pub async fn prepare<S: TelemetryStore>(
    pipeline: &mut FeaturePipeline<S>,
    out_dir: &Path,
) -> Result<PrepareSummary> {
    let (features, target) = pipeline.prepare_default().await?;

    fs::create_dir_all(out_dir)
        .with_context(|| format!("Could not create {}", out_dir.display()))?;

    let features_path = out_dir.join(FEATURES_FILE);
    let file = File::create(&features_path)
        .with_context(|| format!("Could not create {}", features_path.display()))?;
    write_training_csv(BufWriter::new(file), &features, &target)?;
    info!("Wrote {} rows to {}", features.nrows(), features_path.display());

    let scaler = pipeline.fitted_transform();
    let scaler_path = match &scaler {
        Some(scaler) => {
            let path = out_dir.join(SCALER_FILE);
            fs::write(&path, serde_json::to_string_pretty(scaler.as_ref())?)
                .with_context(|| format!("Could not write {}", path.display()))?;
            info!("Wrote fitted scaler to {}", path.display());
            Some(path)
        }
        None => None,
    };

    Ok(PrepareSummary {
        samples: features.nrows(),
        features: features.ncols(),
        normalization: scaler.map(|s| s.method()),
        features_path,
        scaler_path,
    })
}

async fn find_lap<S: TelemetryStore>(
    pipeline: &FeaturePipeline<S>,
    lap_id: i64,
) -> Result<StintDegradationRecord> {
    match pipeline
        .lap_record(lap_id, pipeline.settings().filter_invalid)
        .await?
    {
        LapLookup::Found(record) => Ok(record),
        LapLookup::Unknown => bail!("Lap {} does not exist", lap_id),
        LapLookup::OutOfScope { race_id } => bail!(
            "Lap {} belongs to race {}, which is outside the configured races",
            lap_id,
            race_id
        ),
        LapLookup::Rejected(reason) => bail!("Lap {} was rejected: {}", lap_id, reason),
        LapLookup::NoTelemetry => bail!("Lap {} has no telemetry samples", lap_id),
    }
}

pub async fn predict_lap<S: TelemetryStore>(
    pipeline: &FeaturePipeline<S>,
    predictor: &DegradationPredictor,
    lap_id: i64,
    defaults: &InferenceDefaults,
) -> Result<LapPrediction> {
    let record = find_lap(pipeline, lap_id).await?;
    let row = FeatureRow::from_record_with_defaults(&record, defaults);
    let predicted = predictor.predict(&row)?;
    let level = DegradationLevel::from_prediction(predicted);

    Ok(LapPrediction {
        lap_id,
        vehicle_id: record.lap.vehicle_id,
        race_id: record.lap.race_id,
        lap_number: record.lap.lap_number,
        lap_in_stint: record.lap_in_stint,
        lap_time_seconds: record.lap.lap_time_seconds,
        predicted_degradation: predicted,
        level,
        assessment: level.description(),
        observed_degradation: record.rolling_window_degradation,
        efficiency_score: efficiency_score(record.lap.lap_time_seconds, predicted),
    })
}

pub async fn what_if_lap<S: TelemetryStore>(
    pipeline: &FeaturePipeline<S>,
    predictor: &DegradationPredictor,
    lap_id: i64,
    scenario: &WhatIfScenario,
    defaults: &InferenceDefaults,
) -> Result<WhatIfReport> {
    let record = find_lap(pipeline, lap_id).await?;
    let baseline = FeatureRow::from_record_with_defaults(&record, defaults);
    let outcome = predictor.what_if(&baseline, scenario)?;

    Ok(WhatIfReport {
        lap_id,
        baseline_level: DegradationLevel::from_prediction(outcome.baseline_prediction),
        adjusted_level: DegradationLevel::from_prediction(outcome.adjusted_prediction),
        projection: StintProjection::from_outcome(&outcome, STINT_PROJECTION_LAPS),
        insights: coaching_insights(&outcome, scenario),
        outcome,
    })
}

pub fn importance(predictor: &DegradationPredictor) -> Vec<ImportanceEntry> {
    predictor
        .feature_importance()
        .into_iter()
        .map(|(feature, importance)| ImportanceEntry {
            feature,
            importance,
        })
        .collect()
}
