//! Preprocessing Error Types

use lap_features::{FeatureColumn, SegmentationError};
use telemetry_store::StoreError;
use thiserror::Error;

use crate::normalizer::NormalizationMethod;

/// Errors raised by the feature pipeline
///
/// Data-quality conditions (nulls, sentinel lap numbers, outliers) are
/// filtered and reported, never raised.
#[derive(Debug, Error)]
pub enum PreprocessError {
    /// Store unreachable or query failure
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("Unknown normalization method: {0} (expected \"standard\" or \"minmax\")")]
    UnknownNormalization(String),

    /// Transform requested before any fit
    #[error("Scaler must be fitted before transforming; call normalize with fit=true first")]
    NotFitted,

    #[error("Scaler was fitted with {fitted} but {requested} was requested")]
    MethodMismatch {
        fitted: NormalizationMethod,
        requested: NormalizationMethod,
    },

    #[error("Outlier threshold must be a positive finite number, got {0}")]
    InvalidThreshold(f64),

    #[error("Column {0} was not part of the fitted transform")]
    MissingColumn(FeatureColumn),

    #[error(transparent)]
    Segmentation(#[from] SegmentationError),
}
