//! Feature Preprocessing
//!
//! Turns stint degradation records into model-ready data: z-score outlier
//! removal, fit-once normalization and target selection.

mod diagnostics;
mod error;
mod matrix;
mod normalizer;
mod outlier;
mod pipeline;
mod settings;

pub use diagnostics::LoadDiagnostics;
pub use error::PreprocessError;
pub use matrix::{build_target, FeatureMatrix, TargetVector, TARGET_COLUMN};
pub use normalizer::{ColumnParams, FittedScaler, NormalizationMethod};
pub use outlier::{remove_outliers, OutlierReport, DEFAULT_OUTLIER_THRESHOLD};
pub use pipeline::{FeaturePipeline, LapLookup, LoadedData};
pub use settings::{PipelineSettings, DEFAULT_FETCH_CHUNK_LAPS};
