//! Degradation predictor

use crate::model::{ModelMetadata, RandomForest, Regressor};
use crate::row::FeatureRow;
use crate::what_if::{WhatIfOutcome, WhatIfScenario};
use crate::PredictionError;
use lap_features::FeatureColumn;
use ndarray::{Array1, Axis};
use preprocessing::{FeatureMatrix, FittedScaler};
use std::cmp::Ordering;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

/// Loaded model plus the transform it was trained behind
///
/// Immutable after construction; share behind an `Arc`.
pub struct DegradationPredictor {
    model: Box<dyn Regressor>,
    metadata: ModelMetadata,
    features: Vec<FeatureColumn>,
    scaler: Option<Arc<FittedScaler>>,
}

impl DegradationPredictor {
    /// Wrap a model, checking it against its metadata and scaler
    pub fn new(
        model: Box<dyn Regressor>,
        metadata: ModelMetadata,
        scaler: Option<Arc<FittedScaler>>,
    ) -> Result<Self, PredictionError> {
        let features = metadata.feature_columns()?;
        if features.len() != model.n_features() {
            return Err(PredictionError::FeatureCountMismatch {
                expected: model.n_features(),
                actual: features.len(),
            });
        }

        if let Some(scaler) = &scaler {
            for column in features.iter().filter(|c| c.is_scaled()) {
                scaler
                    .require(*column)
                    .map_err(|e| PredictionError::InvalidModel(e.to_string()))?;
            }
        }

        info!(
            "Predictor ready: {} ({} features, test R² {:.3}, scaler: {})",
            metadata.best_model,
            features.len(),
            metadata.best_test_r2,
            scaler
                .as_ref()
                .map(|s| s.method().to_string())
                .unwrap_or_else(|| "none".to_string())
        );

        Ok(Self {
            model,
            metadata,
            features,
            scaler,
        })
    }

    /// Load a random forest and its metadata from JSON files
    pub fn load(
        model_path: impl AsRef<Path>,
        metadata_path: impl AsRef<Path>,
        scaler: Option<Arc<FittedScaler>>,
    ) -> Result<Self, PredictionError> {
        let forest = RandomForest::load(model_path)?;
        let metadata = ModelMetadata::load(metadata_path)?;
        Self::new(Box::new(forest), metadata, scaler)
    }

    pub fn metadata(&self) -> &ModelMetadata {
        &self.metadata
    }

    /// Input columns in model order
    pub fn features(&self) -> &[FeatureColumn] {
        &self.features
    }

    pub fn scaler(&self) -> Option<&Arc<FittedScaler>> {
        self.scaler.as_ref()
    }

    /// Model input for a raw row
    fn model_input(&self, row: &FeatureRow) -> Result<Array1<f64>, PredictionError> {
        let mut x = row.to_array(&self.features)?;
        if let Some(scaler) = &self.scaler {
            for (v, column) in x.iter_mut().zip(&self.features) {
                *v = scaler.transform_value(*column, *v);
            }
        }
        Ok(x)
    }

    /// Predicted rolling degradation (seconds) for one raw row
    pub fn predict(&self, row: &FeatureRow) -> Result<f64, PredictionError> {
        let x = self.model_input(row)?;
        Ok(self.model.predict_row(x.view()))
    }

    pub fn predict_batch(&self, rows: &[FeatureRow]) -> Result<Vec<f64>, PredictionError> {
        let predictions = rows
            .iter()
            .map(|row| self.predict(row))
            .collect::<Result<Vec<_>, _>>()?;
        debug!("Predicted {} rows", predictions.len());
        Ok(predictions)
    }

    /// Predict an already-normalized matrix whose columns follow the model order
    pub fn predict_matrix(&self, matrix: &FeatureMatrix) -> Result<Array1<f64>, PredictionError> {
        if matrix.ncols() != self.features.len() {
            return Err(PredictionError::FeatureCountMismatch {
                expected: self.features.len(),
                actual: matrix.ncols(),
            });
        }
        if let Some((expected, _)) = self
            .features
            .iter()
            .zip(matrix.columns())
            .find(|(expected, actual)| expected != actual)
        {
            return Err(PredictionError::MissingFeature(*expected));
        }

        Ok(matrix
            .values()
            .axis_iter(Axis(0))
            .map(|x| self.model.predict_row(x))
            .collect())
    }

    /// Predict a row before and after applying a scenario
    pub fn what_if(
        &self,
        baseline: &FeatureRow,
        scenario: &WhatIfScenario,
    ) -> Result<WhatIfOutcome, PredictionError> {
        let adjusted_row = scenario.apply(baseline)?;
        let baseline_prediction = self.predict(baseline)?;
        let adjusted_prediction = self.predict(&adjusted_row)?;
        Ok(WhatIfOutcome {
            baseline_prediction,
            adjusted_prediction,
            delta: adjusted_prediction - baseline_prediction,
            adjusted_row,
        })
    }

    /// Feature importances, highest first. Empty when the model has none.
    pub fn feature_importance(&self) -> Vec<(FeatureColumn, f64)> {
        let Some(importances) = self.model.feature_importances() else {
            return Vec::new();
        };
        let mut ranked: Vec<(FeatureColumn, f64)> =
            self.features.iter().copied().zip(importances.iter().copied()).collect();
        ranked.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));
        ranked
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{DecisionTree, ModelArtifact, TreeNode};
    use crate::what_if::{Adjustment, AdjustmentKind};
    use chrono::{TimeZone, Utc};
    use lap_features::{AggressionMetrics, LapAggressionRecord, StintDegradationRecord, WeatherConditions};
    use preprocessing::NormalizationMethod;

    const FEATURES: [FeatureColumn; 3] = [
        FeatureColumn::AvgBrakeFront,
        FeatureColumn::TrackTemp,
        FeatureColumn::LapInStint,
    ];

    fn metadata() -> ModelMetadata {
        ModelMetadata {
            best_model: "Random Forest (with weather)".to_string(),
            features: FEATURES.iter().map(|c| c.name().to_string()).collect(),
            best_test_r2: 0.8,
            best_test_mae: 0.1,
            best_test_rmse: 0.2,
            training_date: "2025-11-02 10:15:00".to_string(),
            training_samples: 100,
            test_samples: 25,
            weather_features: vec!["track_temp".to_string()],
            baseline_comparison: None,
        }
    }

    /// Brake above 40 costs 0.4 s; lap in stint above 5 costs 0.2 s
    fn forest() -> RandomForest {
        let split = |feature, threshold, low, high| DecisionTree {
            nodes: vec![
                TreeNode::Split {
                    feature,
                    threshold,
                    left: 1,
                    right: 2,
                },
                TreeNode::Leaf { value: low },
                TreeNode::Leaf { value: high },
            ],
        };
        RandomForest::from_artifact(ModelArtifact {
            n_features: 3,
            trees: vec![split(0, 40.0, 0.2, 1.0), split(2, 5.0, 0.2, 0.6)],
            feature_importances: Some(vec![0.6, 0.1, 0.3]),
        })
        .unwrap()
    }

    fn predictor() -> DegradationPredictor {
        DegradationPredictor::new(Box::new(forest()), metadata(), None).unwrap()
    }

    fn row(brake: f64, lap: f64) -> FeatureRow {
        FeatureRow::new()
            .with(FeatureColumn::AvgBrakeFront, brake)
            .with(FeatureColumn::MaxBrakeFront, brake * 2.0)
            .with(FeatureColumn::TrackTemp, 35.0)
            .with(FeatureColumn::LapInStint, lap)
    }

    #[test]
    fn test_predict() {
        let p = predictor();
        assert!((p.predict(&row(30.0, 3.0)).unwrap() - 0.2).abs() < 1e-12);
        assert!((p.predict(&row(50.0, 8.0)).unwrap() - 0.8).abs() < 1e-12);
        let batch = p.predict_batch(&[row(30.0, 3.0), row(50.0, 3.0)]).unwrap();
        assert_eq!(batch.len(), 2);
        assert!((batch[1] - 0.6).abs() < 1e-12);
    }

    #[test]
    fn test_missing_feature() {
        let p = predictor();
        let incomplete = FeatureRow::new().with(FeatureColumn::AvgBrakeFront, 30.0);
        assert!(matches!(
            p.predict(&incomplete),
            Err(PredictionError::MissingFeature(FeatureColumn::TrackTemp))
        ));
    }

    #[test]
    fn test_metadata_must_match_model() {
        let mut m = metadata();
        m.features.pop();
        assert!(matches!(
            DegradationPredictor::new(Box::new(forest()), m, None),
            Err(PredictionError::FeatureCountMismatch {
                expected: 3,
                actual: 2
            })
        ));
    }

    #[test]
    fn test_what_if_brake_reduction() {
        let p = predictor();
        let scenario = WhatIfScenario::new(vec![
            Adjustment::new(AdjustmentKind::BrakePressure, -20.0).unwrap(),
        ])
        .unwrap();
        let baseline = row(45.0, 3.0);
        let outcome = p.what_if(&baseline, &scenario).unwrap();

        let adjusted_brake = outcome.adjusted_row.get(FeatureColumn::AvgBrakeFront).unwrap();
        assert!((adjusted_brake - 36.0).abs() < 1e-9);
        assert!((outcome.baseline_prediction - 0.6).abs() < 1e-12);
        assert!((outcome.adjusted_prediction - 0.2).abs() < 1e-12);
        assert_eq!(
            outcome.delta,
            outcome.adjusted_prediction - outcome.baseline_prediction
        );
    }

    #[test]
    fn test_scaler_applied_before_model() {
        let record = |brake: f64| StintDegradationRecord {
            lap: LapAggressionRecord {
                lap_id: 1,
                vehicle_id: 1,
                session_id: 1,
                race_id: 1,
                track_id: None,
                race_date: None,
                lap_number: 1,
                lap_start_time: Utc.with_ymd_and_hms(2025, 4, 5, 14, 0, 0).unwrap(),
                lap_time_seconds: 90.0,
                sample_count: 10,
                weather: WeatherConditions {
                    track_temp: Some(35.0),
                    ..Default::default()
                },
                aggression: AggressionMetrics {
                    avg_brake_front: Some(brake),
                    ..Default::default()
                },
            },
            lap_in_stint: 1,
            lap_time_delta: 0.0,
            rolling_window_degradation: Some(0.0),
        };
        // Brake 0 and 100 scale to -1 and 1
        let scaler = Arc::new(FittedScaler::fit(
            NormalizationMethod::Standard,
            &[record(0.0), record(100.0)],
        ));

        // Threshold 40 now applies to scaled values, so raw 100 (scaled 1.0) stays left
        let p = DegradationPredictor::new(Box::new(forest()), metadata(), Some(scaler)).unwrap();
        assert!((p.predict(&row(100.0, 3.0)).unwrap() - 0.2).abs() < 1e-12);
    }

    #[test]
    fn test_predict_matrix_checks_columns() {
        let p = predictor();
        let wrong = FeatureMatrix::from_records(&[], &FeatureColumn::MODEL_FEATURES);
        assert!(matches!(
            p.predict_matrix(&wrong),
            Err(PredictionError::FeatureCountMismatch { .. })
        ));

        let right = FeatureMatrix::from_records(&[], &FEATURES);
        assert_eq!(p.predict_matrix(&right).unwrap().len(), 0);
    }

    #[test]
    fn test_feature_importance_ranked() {
        let ranked = predictor().feature_importance();
        let order: Vec<FeatureColumn> = ranked.iter().map(|(c, _)| *c).collect();
        assert_eq!(
            order,
            vec![
                FeatureColumn::AvgBrakeFront,
                FeatureColumn::LapInStint,
                FeatureColumn::TrackTemp
            ]
        );
    }
}
