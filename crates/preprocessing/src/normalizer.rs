//! Fit-once feature scaling
//!
//! Parameters are learned from a training set and then reused verbatim for
//! every later transform, so inference sees the same scale as training.

use crate::error::PreprocessError;
use lap_features::{ChannelStats, FeatureColumn, NullPolicy, StintDegradationRecord};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use tracing::{debug, warn};

/// Normalization method
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum NormalizationMethod {
    /// Subtract mean, divide by population standard deviation
    #[default]
    Standard,
    /// Rescale to [0, 1] over the fitted range
    MinMax,
}

impl NormalizationMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Standard => "standard",
            Self::MinMax => "minmax",
        }
    }
}

impl fmt::Display for NormalizationMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NormalizationMethod {
    type Err = PreprocessError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "standard" => Ok(Self::Standard),
            "minmax" => Ok(Self::MinMax),
            _ => Err(PreprocessError::UnknownNormalization(s.to_string())),
        }
    }
}

impl TryFrom<String> for NormalizationMethod {
    type Error = PreprocessError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<NormalizationMethod> for String {
    fn from(method: NormalizationMethod) -> Self {
        method.as_str().to_string()
    }
}

/// Affine parameters for one column: `(v - offset) / scale`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ColumnParams {
    pub offset: f64,
    pub scale: f64,
}

impl ColumnParams {
    const IDENTITY: Self = Self {
        offset: 0.0,
        scale: 1.0,
    };

    pub fn apply(&self, value: f64) -> f64 {
        (value - self.offset) / self.scale
    }

    pub fn invert(&self, value: f64) -> f64 {
        value * self.scale + self.offset
    }
}

/// Scaler fitted on a training set
///
/// Immutable once built; share it behind an `Arc`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FittedScaler {
    method: NormalizationMethod,
    params: BTreeMap<FeatureColumn, ColumnParams>,
    samples: usize,
}

impl FittedScaler {
    /// Learn per-column parameters for every scaled column
    ///
    /// Missing values are skipped. A constant column gets scale 1, and a
    /// column with no values at all is left untouched.
    pub fn fit(method: NormalizationMethod, records: &[StintDegradationRecord]) -> Self {
        let mut params = BTreeMap::new();

        for column in FeatureColumn::SCALED {
            let stats = ChannelStats::from_optional(
                records.iter().map(|r| column.value(r)),
                NullPolicy::IgnoreMissing,
            );

            let fitted = match method {
                NormalizationMethod::Standard => stats.mean().map(|mean| ColumnParams {
                    offset: mean,
                    scale: non_zero(stats.population_std_dev().unwrap_or(0.0)),
                }),
                NormalizationMethod::MinMax => match (stats.min(), stats.max()) {
                    (Some(min), Some(max)) => Some(ColumnParams {
                        offset: min,
                        scale: non_zero(max - min),
                    }),
                    _ => None,
                },
            };

            let fitted = fitted.unwrap_or_else(|| {
                warn!("Column {} has no values; leaving it unscaled", column);
                ColumnParams::IDENTITY
            });
            params.insert(column, fitted);
        }

        debug!("Fitted {} scaler on {} records", method, records.len());
        Self {
            method,
            params,
            samples: records.len(),
        }
    }

    pub fn method(&self) -> NormalizationMethod {
        self.method
    }

    /// Number of records the scaler was fitted on
    pub fn samples(&self) -> usize {
        self.samples
    }

    pub fn params(&self, column: FeatureColumn) -> Option<&ColumnParams> {
        self.params.get(&column)
    }

    /// Parameters for a column that must have been fitted
    pub fn require(&self, column: FeatureColumn) -> Result<&ColumnParams, PreprocessError> {
        self.params
            .get(&column)
            .ok_or(PreprocessError::MissingColumn(column))
    }

    /// Scale one value. Unscaled columns pass through.
    pub fn transform_value(&self, column: FeatureColumn, value: f64) -> f64 {
        match self.params.get(&column) {
            Some(p) => p.apply(value),
            None => value,
        }
    }

    /// Undo [`transform_value`](Self::transform_value)
    pub fn inverse_value(&self, column: FeatureColumn, value: f64) -> f64 {
        match self.params.get(&column) {
            Some(p) => p.invert(value),
            None => value,
        }
    }

    /// Scale the scaled columns of every record. Missing values stay missing.
    pub fn transform(&self, records: &[StintDegradationRecord]) -> Vec<StintDegradationRecord> {
        records
            .iter()
            .map(|record| {
                let mut scaled = record.clone();
                for (column, p) in &self.params {
                    if let Some(slot) = column.scaled_slot_mut(&mut scaled) {
                        *slot = slot.map(|v| p.apply(v));
                    }
                }
                scaled
            })
            .collect()
    }
}

fn non_zero(spread: f64) -> f64 {
    if spread == 0.0 || !spread.is_finite() {
        1.0
    } else {
        spread
    }
}
