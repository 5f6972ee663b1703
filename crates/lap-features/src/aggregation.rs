//! Lap Aggregation
//!
//! Groups telemetry samples by lap and reduces each channel to the
//! aggression metrics used by the degradation model. Every metric follows the
//! configured [`NullPolicy`]; with the default `IgnoreMissing` a metric is
//! computed over the samples that carry the channel and is missing only when
//! none do.
//!
//! | Metric | Channel | Reduction |
//! |--------|---------|-----------|
//! | `avg_brake_front` / `max_brake_front` | `pbrake_f` | mean / max |
//! | `avg_brake_rear` / `max_brake_rear` | `pbrake_r` | mean / max |
//! | `avg_lateral_g` / `max_lateral_g` | `abs(accy_can)` | mean / max |
//! | `avg_long_g` / `max_accel_g` / `max_brake_g` | `accx_can` | mean / max / min |
//! | `steering_variance` | `steering_angle` | sample std dev |
//! | `avg_steering_angle` | `abs(steering_angle)` | mean |
//! | `avg_throttle_blade` | `ath` | mean |
//! | `avg_speed` / `max_speed` / `min_speed` | `speed` | mean / max / min |
//! | `avg_rpm` / `max_rpm` | `nmot` | mean / max |

use crate::statistics::{ChannelStats, NullPolicy};
use crate::validity::{LapFilter, LapRejection};
use crate::weather::WeatherIndex;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use telemetry_store::{LapRecord, TelemetrySample, WeatherReading};
use tracing::debug;

/// What to do with a valid lap that has no telemetry samples
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ZeroSamplePolicy {
    /// Leave the lap out (inner-join semantics)
    #[default]
    Drop,
    /// Emit the lap with every aggression metric missing
    RetainWithNulls,
}

/// Aggregation configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AggregationConfig {
    /// Which laps are accepted
    pub filter: LapFilter,
    /// Handling of accepted laps without telemetry
    pub zero_samples: ZeroSamplePolicy,
    /// Missing-value policy applied to every channel
    pub null_policy: NullPolicy,
}

/// Conditions from the weather reading nearest to the lap start
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WeatherConditions {
    /// Air temperature (°C)
    pub air_temp: Option<f64>,
    /// Track surface temperature (°C)
    pub track_temp: Option<f64>,
    /// Relative humidity (%)
    pub humidity: Option<f64>,
    /// Wind speed (km/h)
    pub wind_speed: Option<f64>,
    /// Track minus air temperature
    pub temp_delta: Option<f64>,
}

impl WeatherConditions {
    fn from_reading(reading: Option<&WeatherReading>) -> Self {
        let Some(r) = reading else {
            return Self::default();
        };
        let temp_delta = match (r.track_temp, r.air_temp) {
            (Some(track), Some(air)) => Some(track - air),
            _ => None,
        };
        Self {
            air_temp: r.air_temp,
            track_temp: r.track_temp,
            humidity: r.humidity,
            wind_speed: r.wind_speed,
            temp_delta,
        }
    }
}

/// Driving-style metrics for one lap
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AggressionMetrics {
    /// Mean front brake pressure (bar)
    pub avg_brake_front: Option<f64>,
    /// Peak front brake pressure (bar)
    pub max_brake_front: Option<f64>,
    /// Mean rear brake pressure (bar)
    pub avg_brake_rear: Option<f64>,
    /// Peak rear brake pressure (bar)
    pub max_brake_rear: Option<f64>,
    /// Mean absolute lateral acceleration (g)
    pub avg_lateral_g: Option<f64>,
    /// Peak absolute lateral acceleration (g)
    pub max_lateral_g: Option<f64>,
    /// Mean longitudinal acceleration (g)
    pub avg_long_g: Option<f64>,
    /// Peak positive longitudinal acceleration (g)
    pub max_accel_g: Option<f64>,
    /// Most negative longitudinal acceleration
    pub max_brake_g: Option<f64>,
    /// Sample standard deviation of the steering angle
    pub steering_variance: Option<f64>,
    /// Mean absolute steering angle (degrees)
    pub avg_steering_angle: Option<f64>,
    /// Mean throttle blade position (%)
    pub avg_throttle_blade: Option<f64>,
    /// Mean speed (km/h)
    pub avg_speed: Option<f64>,
    /// Top speed (km/h)
    pub max_speed: Option<f64>,
    /// Slowest speed (km/h)
    pub min_speed: Option<f64>,
    /// Mean engine RPM
    pub avg_rpm: Option<f64>,
    /// Peak engine RPM
    pub max_rpm: Option<f64>,
}

/// One valid lap reduced to aggregate features
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LapAggressionRecord {
    /// Source lap
    pub lap_id: i64,
    /// Car that drove the lap
    pub vehicle_id: i64,
    /// Session the lap belongs to
    pub session_id: i64,
    /// Race the session belongs to
    pub race_id: i64,
    /// Track of the race, when known
    pub track_id: Option<i64>,
    /// Race day, when known
    pub race_date: Option<NaiveDate>,
    /// Sequence number within the session
    pub lap_number: i32,
    /// Lap start timestamp
    pub lap_start_time: DateTime<Utc>,
    /// Derived from the lap timestamps, never from the stored duration
    pub lap_time_seconds: f64,
    /// Samples that contributed to the metrics
    pub sample_count: usize,
    /// Nearest weather reading
    pub weather: WeatherConditions,
    /// Per-lap driving metrics
    pub aggression: AggressionMetrics,
}

/// Counts describing one aggregation run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AggregationReport {
    /// Laps handed to the aggregator
    pub laps_considered: usize,
    /// Rejected laps per reason
    pub rejected: BTreeMap<LapRejection, usize>,
    /// Valid laps without telemetry
    pub zero_sample_laps: usize,
    /// Records produced
    pub emitted: usize,
}

impl AggregationReport {
    /// Fold the counts of another run into this one
    pub fn merge(&mut self, other: AggregationReport) {
        self.laps_considered += other.laps_considered;
        for (reason, count) in other.rejected {
            *self.rejected.entry(reason).or_insert(0) += count;
        }
        self.zero_sample_laps += other.zero_sample_laps;
        self.emitted += other.emitted;
    }
}

/// Records plus the report of how they were produced
#[derive(Debug, Clone)]
pub struct AggregationOutcome {
    /// One record per emitted lap
    pub records: Vec<LapAggressionRecord>,
    /// Counts for this run
    pub report: AggregationReport,
}

/// Per-lap channel accumulators
struct LapAccumulator {
    samples: usize,
    brake_front: ChannelStats,
    brake_rear: ChannelStats,
    lateral_abs: ChannelStats,
    longitudinal: ChannelStats,
    steering: ChannelStats,
    steering_abs: ChannelStats,
    throttle_blade: ChannelStats,
    speed: ChannelStats,
    rpm: ChannelStats,
}

impl LapAccumulator {
    fn new(policy: NullPolicy) -> Self {
        Self {
            samples: 0,
            brake_front: ChannelStats::new(policy),
            brake_rear: ChannelStats::new(policy),
            lateral_abs: ChannelStats::new(policy),
            longitudinal: ChannelStats::new(policy),
            steering: ChannelStats::new(policy),
            steering_abs: ChannelStats::new(policy),
            throttle_blade: ChannelStats::new(policy),
            speed: ChannelStats::new(policy),
            rpm: ChannelStats::new(policy),
        }
    }

    fn push(&mut self, sample: &TelemetrySample) {
        self.samples += 1;
        self.brake_front.push(sample.pbrake_f);
        self.brake_rear.push(sample.pbrake_r);
        self.lateral_abs.push(sample.accy_can.map(f64::abs));
        self.longitudinal.push(sample.accx_can);
        self.steering.push(sample.steering_angle);
        self.steering_abs.push(sample.steering_angle.map(f64::abs));
        self.throttle_blade.push(sample.ath);
        self.speed.push(sample.speed);
        self.rpm.push(sample.nmot);
    }

    fn metrics(&self) -> AggressionMetrics {
        AggressionMetrics {
            avg_brake_front: self.brake_front.mean(),
            max_brake_front: self.brake_front.max(),
            avg_brake_rear: self.brake_rear.mean(),
            max_brake_rear: self.brake_rear.max(),
            avg_lateral_g: self.lateral_abs.mean(),
            max_lateral_g: self.lateral_abs.max(),
            avg_long_g: self.longitudinal.mean(),
            max_accel_g: self.longitudinal.max(),
            max_brake_g: self.longitudinal.min(),
            steering_variance: self.steering.sample_std_dev(),
            avg_steering_angle: self.steering_abs.mean(),
            avg_throttle_blade: self.throttle_blade.mean(),
            avg_speed: self.speed.mean(),
            max_speed: self.speed.max(),
            min_speed: self.speed.min(),
            avg_rpm: self.rpm.mean(),
            max_rpm: self.rpm.max(),
        }
    }
}

/// Reduces raw telemetry to one record per valid lap
pub struct LapAggregator {
    config: AggregationConfig,
}

impl LapAggregator {
    /// Create an aggregator
    pub fn new(config: AggregationConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &AggregationConfig {
        &self.config
    }

    /// Aggregate laps with their samples and the race weather
    ///
    /// Output is sorted by `(race_id, vehicle_id, lap_number, lap_id)`.
    pub fn aggregate(
        &self,
        laps: &[LapRecord],
        samples: &[TelemetrySample],
        weather: &[WeatherReading],
    ) -> AggregationOutcome {
        let mut report = AggregationReport {
            laps_considered: laps.len(),
            ..Default::default()
        };

        let mut accepted: Vec<(&LapRecord, f64)> = Vec::with_capacity(laps.len());
        for lap in laps {
            match self.config.filter.check(lap) {
                Ok(duration) => accepted.push((lap, duration)),
                Err(reason) => *report.rejected.entry(reason).or_insert(0) += 1,
            }
        }

        let mut accumulators: HashMap<i64, LapAccumulator> = accepted
            .iter()
            .map(|(lap, _)| (lap.lap_id, LapAccumulator::new(self.config.null_policy)))
            .collect();

        for sample in samples {
            if let Some(acc) = sample.lap_id.and_then(|id| accumulators.get_mut(&id)) {
                acc.push(sample);
            }
        }

        let weather_index = WeatherIndex::new(weather);
        let mut records = Vec::with_capacity(accepted.len());

        for (lap, duration) in accepted {
            let acc = match accumulators.get(&lap.lap_id) {
                Some(acc) => acc,
                None => continue,
            };
            if acc.samples == 0 {
                report.zero_sample_laps += 1;
                if self.config.zero_samples == ZeroSamplePolicy::Drop {
                    continue;
                }
            }

            // Checked by the filter: both timestamps are present.
            let Some(start) = lap.lap_start_time else {
                continue;
            };

            records.push(LapAggressionRecord {
                lap_id: lap.lap_id,
                vehicle_id: lap.vehicle_id,
                session_id: lap.session_id,
                race_id: lap.race_id,
                track_id: lap.track_id,
                race_date: lap.race_date,
                lap_number: lap.lap_number,
                lap_start_time: start,
                lap_time_seconds: duration,
                sample_count: acc.samples,
                weather: WeatherConditions::from_reading(weather_index.nearest(lap.race_id, start)),
                aggression: acc.metrics(),
            });
        }

        records.sort_by_key(|r| (r.race_id, r.vehicle_id, r.lap_number, r.lap_id));
        report.emitted = records.len();

        debug!(
            "Aggregated {} of {} laps ({} rejected, {} without telemetry)",
            report.emitted,
            report.laps_considered,
            report.rejected.values().sum::<usize>(),
            report.zero_sample_laps
        );

        AggregationOutcome { records, report }
    }
}

impl Default for LapAggregator {
    fn default() -> Self {
        Self::new(AggregationConfig::default())
    }
}
