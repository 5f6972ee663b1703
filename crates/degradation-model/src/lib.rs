//! Tire Degradation Model
//!
//! Loads a trained random forest from JSON artifacts and predicts rolling
//! lap-time degradation for single laps, batches and what-if scenarios.

mod engine;
mod insights;
mod model;
mod row;
mod what_if;

pub use engine::DegradationPredictor;
pub use insights::{
    coaching_insights, efficiency_score, DegradationLevel, StintProjection, STINT_PROJECTION_LAPS,
};
pub use model::{
    BaselineComparison, DecisionTree, ModelArtifact, ModelMetadata, RandomForest, Regressor,
    TreeNode,
};
pub use row::{FeatureRow, InferenceDefaults};
pub use what_if::{Adjustment, AdjustmentEffect, AdjustmentKind, WhatIfOutcome, WhatIfScenario};

use lap_features::FeatureColumn;
use thiserror::Error;

/// Errors during model loading and prediction
#[derive(Debug, Error)]
pub enum PredictionError {
    /// Artifact missing or unreadable. Fatal at startup.
    #[error("Failed to load model artifact {path}: {reason}")]
    ModelLoad { path: String, reason: String },

    #[error("Invalid model: {0}")]
    InvalidModel(String),

    #[error("Feature row is missing column {0}")]
    MissingFeature(FeatureColumn),

    #[error("Model expects {expected} features, got {actual}")]
    FeatureCountMismatch { expected: usize, actual: usize },

    #[error("Invalid {kind} adjustment {amount}: {reason}")]
    InvalidAdjustment {
        kind: AdjustmentKind,
        amount: f64,
        reason: String,
    },

    #[error("Adjustment {0} appears more than once in the scenario")]
    DuplicateAdjustment(AdjustmentKind),

    #[error("Unknown adjustment: {0}")]
    UnknownAdjustment(String),
}
