//! Feature column catalogue

use crate::stint::StintDegradationRecord;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Name that matches no feature column
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unknown feature column: {0}")]
pub struct UnknownColumn(pub String);

/// Numeric columns of a stint degradation record
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeatureColumn {
    AirTemp,
    TrackTemp,
    Humidity,
    WindSpeed,
    TempDelta,
    AvgBrakeFront,
    MaxBrakeFront,
    AvgBrakeRear,
    MaxBrakeRear,
    AvgLateralG,
    MaxLateralG,
    AvgLongG,
    MaxAccelG,
    MaxBrakeG,
    SteeringVariance,
    AvgSteeringAngle,
    AvgThrottleBlade,
    AvgSpeed,
    MaxSpeed,
    MinSpeed,
    AvgRpm,
    MaxRpm,
    LapInStint,
    LapTimeSeconds,
    LapTimeDelta,
    RollingWindowDegradation,
}

use FeatureColumn::*;

impl FeatureColumn {
    /// Columns that are normalized before training and inference
    pub const SCALED: [FeatureColumn; 22] = [
        AirTemp,
        TrackTemp,
        Humidity,
        WindSpeed,
        TempDelta,
        AvgBrakeFront,
        MaxBrakeFront,
        AvgBrakeRear,
        MaxBrakeRear,
        AvgLateralG,
        MaxLateralG,
        AvgLongG,
        MaxAccelG,
        MaxBrakeG,
        SteeringVariance,
        AvgSteeringAngle,
        AvgThrottleBlade,
        AvgSpeed,
        MaxSpeed,
        MinSpeed,
        AvgRpm,
        MaxRpm,
    ];

    /// Model input schema, in order
    pub const MODEL_FEATURES: [FeatureColumn; 23] = [
        AirTemp,
        TrackTemp,
        Humidity,
        WindSpeed,
        TempDelta,
        AvgBrakeFront,
        MaxBrakeFront,
        AvgBrakeRear,
        MaxBrakeRear,
        AvgLateralG,
        MaxLateralG,
        AvgLongG,
        MaxAccelG,
        MaxBrakeG,
        SteeringVariance,
        AvgSteeringAngle,
        AvgThrottleBlade,
        AvgSpeed,
        MaxSpeed,
        MinSpeed,
        AvgRpm,
        MaxRpm,
        LapInStint,
    ];

    /// Columns screened for statistical outliers (everything but the rank)
    pub const OUTLIER_SCREENED: [FeatureColumn; 25] = [
        AirTemp,
        TrackTemp,
        Humidity,
        WindSpeed,
        TempDelta,
        AvgBrakeFront,
        MaxBrakeFront,
        AvgBrakeRear,
        MaxBrakeRear,
        AvgLateralG,
        MaxLateralG,
        AvgLongG,
        MaxAccelG,
        MaxBrakeG,
        SteeringVariance,
        AvgSteeringAngle,
        AvgThrottleBlade,
        AvgSpeed,
        MaxSpeed,
        MinSpeed,
        AvgRpm,
        MaxRpm,
        LapTimeSeconds,
        LapTimeDelta,
        RollingWindowDegradation,
    ];

    /// Column name as used in model metadata and exports
    pub fn name(&self) -> &'static str {
        match self {
            AirTemp => "air_temp",
            TrackTemp => "track_temp",
            Humidity => "humidity",
            WindSpeed => "wind_speed",
            TempDelta => "temp_delta",
            AvgBrakeFront => "avg_brake_front",
            MaxBrakeFront => "max_brake_front",
            AvgBrakeRear => "avg_brake_rear",
            MaxBrakeRear => "max_brake_rear",
            AvgLateralG => "avg_lateral_g",
            MaxLateralG => "max_lateral_g",
            AvgLongG => "avg_long_g",
            MaxAccelG => "max_accel_g",
            MaxBrakeG => "max_brake_g",
            SteeringVariance => "steering_variance",
            AvgSteeringAngle => "avg_steering_angle",
            AvgThrottleBlade => "avg_throttle_blade",
            AvgSpeed => "avg_speed",
            MaxSpeed => "max_speed",
            MinSpeed => "min_speed",
            AvgRpm => "avg_rpm",
            MaxRpm => "max_rpm",
            LapInStint => "lap_in_stint",
            LapTimeSeconds => "lap_time_seconds",
            LapTimeDelta => "lap_time_delta",
            RollingWindowDegradation => "rolling_window_degradation",
        }
    }

    /// Whether the column is normalized
    pub fn is_scaled(&self) -> bool {
        Self::SCALED.contains(self)
    }

    /// Whether the column comes from the weather join
    pub fn is_weather(&self) -> bool {
        matches!(self, AirTemp | TrackTemp | Humidity | WindSpeed | TempDelta)
    }

    /// Read the column from a record
    pub fn value(&self, r: &StintDegradationRecord) -> Option<f64> {
        match self {
            LapInStint => Some(r.lap_in_stint as f64),
            LapTimeSeconds => Some(r.lap.lap_time_seconds),
            LapTimeDelta => Some(r.lap_time_delta),
            RollingWindowDegradation => r.rolling_window_degradation,
            _ => self.optional_field(r),
        }
    }

    fn optional_field(&self, r: &StintDegradationRecord) -> Option<f64> {
        let w = &r.lap.weather;
        let a = &r.lap.aggression;
        match self {
            AirTemp => w.air_temp,
            TrackTemp => w.track_temp,
            Humidity => w.humidity,
            WindSpeed => w.wind_speed,
            TempDelta => w.temp_delta,
            AvgBrakeFront => a.avg_brake_front,
            MaxBrakeFront => a.max_brake_front,
            AvgBrakeRear => a.avg_brake_rear,
            MaxBrakeRear => a.max_brake_rear,
            AvgLateralG => a.avg_lateral_g,
            MaxLateralG => a.max_lateral_g,
            AvgLongG => a.avg_long_g,
            MaxAccelG => a.max_accel_g,
            MaxBrakeG => a.max_brake_g,
            SteeringVariance => a.steering_variance,
            AvgSteeringAngle => a.avg_steering_angle,
            AvgThrottleBlade => a.avg_throttle_blade,
            AvgSpeed => a.avg_speed,
            MaxSpeed => a.max_speed,
            MinSpeed => a.min_speed,
            AvgRpm => a.avg_rpm,
            MaxRpm => a.max_rpm,
            LapInStint | LapTimeSeconds | LapTimeDelta | RollingWindowDegradation => None,
        }
    }

    /// Mutable slot for a scaled column; `None` for derived stint columns
    pub fn scaled_slot_mut<'a>(&self, r: &'a mut StintDegradationRecord) -> Option<&'a mut Option<f64>> {
        let w = &mut r.lap.weather;
        let a = &mut r.lap.aggression;
        let slot = match self {
            AirTemp => &mut w.air_temp,
            TrackTemp => &mut w.track_temp,
            Humidity => &mut w.humidity,
            WindSpeed => &mut w.wind_speed,
            TempDelta => &mut w.temp_delta,
            AvgBrakeFront => &mut a.avg_brake_front,
            MaxBrakeFront => &mut a.max_brake_front,
            AvgBrakeRear => &mut a.avg_brake_rear,
            MaxBrakeRear => &mut a.max_brake_rear,
            AvgLateralG => &mut a.avg_lateral_g,
            MaxLateralG => &mut a.max_lateral_g,
            AvgLongG => &mut a.avg_long_g,
            MaxAccelG => &mut a.max_accel_g,
            MaxBrakeG => &mut a.max_brake_g,
            SteeringVariance => &mut a.steering_variance,
            AvgSteeringAngle => &mut a.avg_steering_angle,
            AvgThrottleBlade => &mut a.avg_throttle_blade,
            AvgSpeed => &mut a.avg_speed,
            MaxSpeed => &mut a.max_speed,
            MinSpeed => &mut a.min_speed,
            AvgRpm => &mut a.avg_rpm,
            MaxRpm => &mut a.max_rpm,
            LapInStint | LapTimeSeconds | LapTimeDelta | RollingWindowDegradation => return None,
        };
        Some(slot)
    }
}

impl fmt::Display for FeatureColumn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for FeatureColumn {
    type Err = UnknownColumn;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::MODEL_FEATURES
            .iter()
            .chain([LapTimeSeconds, LapTimeDelta, RollingWindowDegradation].iter())
            .find(|c| c.name() == s)
            .copied()
            .ok_or_else(|| UnknownColumn(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_name_round_trip() {
        for column in FeatureColumn::OUTLIER_SCREENED.iter().chain([LapInStint].iter()) {
            assert_eq!(column.name().parse::<FeatureColumn>().unwrap(), *column);
        }
    }

    #[test]
    fn test_unknown_name() {
        assert_eq!(
            "tyre_pressure".parse::<FeatureColumn>().unwrap_err(),
            UnknownColumn("tyre_pressure".to_string())
        );
    }

    #[test]
    fn test_model_schema_shape() {
        assert_eq!(FeatureColumn::MODEL_FEATURES[22], LapInStint);
        assert_eq!(&FeatureColumn::MODEL_FEATURES[..22], &FeatureColumn::SCALED[..]);
        assert!(!LapInStint.is_scaled());
        assert!(AvgBrakeFront.is_scaled());
    }
}
