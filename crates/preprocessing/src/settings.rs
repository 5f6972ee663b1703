//! Pipeline settings

use crate::normalizer::NormalizationMethod;
use crate::outlier::DEFAULT_OUTLIER_THRESHOLD;
use lap_features::{
    AggregationConfig, LapFilter, NullPolicy, ZeroSamplePolicy, DEFAULT_DEGRADATION_WINDOW,
};
use serde::{Deserialize, Serialize};
use telemetry_store::RaceScope;

/// Settings for [`FeaturePipeline`](crate::FeaturePipeline)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineSettings {
    /// Scaling applied to the feature columns
    pub normalization: NormalizationMethod,
    /// Absolute z-score above which a lap is dropped
    pub outlier_threshold: f64,
    /// Trailing laps in the rolling degradation mean
    pub degradation_window: usize,
    /// Drop rows whose target is missing
    pub drop_null_targets: bool,
    /// Reject laps flagged invalid or carrying sentinel lap numbers
    pub filter_invalid: bool,
    /// Handling of valid laps without telemetry
    pub zero_sample_policy: ZeroSamplePolicy,
    /// Restrict loading to these races; all races when unset
    pub race_ids: Option<Vec<i64>>,
    /// Laps whose telemetry is fetched and aggregated per store round trip
    pub fetch_chunk_laps: usize,
}

/// Default for [`PipelineSettings::fetch_chunk_laps`]
pub const DEFAULT_FETCH_CHUNK_LAPS: usize = 200;

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            normalization: NormalizationMethod::Standard,
            outlier_threshold: DEFAULT_OUTLIER_THRESHOLD,
            degradation_window: DEFAULT_DEGRADATION_WINDOW,
            drop_null_targets: true,
            filter_invalid: true,
            zero_sample_policy: ZeroSamplePolicy::Drop,
            race_ids: None,
            fetch_chunk_laps: DEFAULT_FETCH_CHUNK_LAPS,
        }
    }
}

impl PipelineSettings {
    pub fn scope(&self) -> RaceScope {
        match &self.race_ids {
            Some(ids) => RaceScope::races(ids.clone()),
            None => RaceScope::all(),
        }
    }

    pub(crate) fn aggregation(&self, filter_invalid: bool) -> AggregationConfig {
        AggregationConfig {
            filter: if filter_invalid {
                LapFilter::strict()
            } else {
                LapFilter::lenient()
            },
            zero_samples: self.zero_sample_policy,
            null_policy: NullPolicy::IgnoreMissing,
        }
    }
}
