//! Lap Feature Engine
//!
//! Projects raw telemetry into one aggression record per lap, then adds
//! stint context (lap-in-stint rank, lap-time delta, rolling degradation).

mod aggregation;
mod columns;
mod statistics;
mod stint;
mod validity;
mod weather;

pub use aggregation::{
    AggregationConfig, AggregationOutcome, AggregationReport, AggressionMetrics, LapAggregator,
    LapAggressionRecord, WeatherConditions, ZeroSamplePolicy,
};
pub use columns::{FeatureColumn, UnknownColumn};
pub use statistics::{ChannelStats, NullPolicy};
pub use stint::{
    SegmentationError, StintDegradationRecord, StintSegmenter, DEFAULT_DEGRADATION_WINDOW,
};
pub use validity::{LapFilter, LapRejection, LAP_NUMBER_SENTINEL, MAX_LAP_SECONDS};
pub use weather::WeatherIndex;
