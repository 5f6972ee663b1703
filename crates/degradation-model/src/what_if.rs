//! What-if scenarios
//!
//! | Kind                   | Effect         | Columns                               | Bounds |
//! |------------------------|----------------|---------------------------------------|--------|
//! | `brake_pressure`       | percent        | avg_brake_front, max_brake_front      | ±30    |
//! | `steering_smoothness`  | percent        | steering_variance                     | ±40    |
//! | `cornering_speed`      | percent        | avg_speed                             | ±20    |
//! | `throttle_application` | percent        | avg_throttle_blade                    | ±20    |
//! | `track_temperature`    | additive (°C)  | track_temp, temp_delta                | ±15    |
//! | `air_temperature`      | additive (°C)  | air_temp, temp_delta (decreases)      | ±15    |

use crate::row::FeatureRow;
use crate::PredictionError;
use lap_features::FeatureColumn;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

/// How an adjustment changes its columns
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdjustmentEffect {
    /// `v * (1 + amount / 100)`
    Percent,
    /// `v + sign * amount`
    Additive,
}

/// Recognised adjustments
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdjustmentKind {
    BrakePressure,
    SteeringSmoothness,
    CorneringSpeed,
    ThrottleApplication,
    TrackTemperature,
    AirTemperature,
}

impl AdjustmentKind {
    pub const ALL: [AdjustmentKind; 6] = [
        AdjustmentKind::BrakePressure,
        AdjustmentKind::SteeringSmoothness,
        AdjustmentKind::CorneringSpeed,
        AdjustmentKind::ThrottleApplication,
        AdjustmentKind::TrackTemperature,
        AdjustmentKind::AirTemperature,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Self::BrakePressure => "brake_pressure",
            Self::SteeringSmoothness => "steering_smoothness",
            Self::CorneringSpeed => "cornering_speed",
            Self::ThrottleApplication => "throttle_application",
            Self::TrackTemperature => "track_temperature",
            Self::AirTemperature => "air_temperature",
        }
    }

    pub fn effect(&self) -> AdjustmentEffect {
        match self {
            Self::TrackTemperature | Self::AirTemperature => AdjustmentEffect::Additive,
            _ => AdjustmentEffect::Percent,
        }
    }

    /// Affected columns with the sign applied to additive amounts
    pub fn targets(&self) -> &'static [(FeatureColumn, f64)] {
        use FeatureColumn::*;
        match self {
            Self::BrakePressure => &[(AvgBrakeFront, 1.0), (MaxBrakeFront, 1.0)],
            Self::SteeringSmoothness => &[(SteeringVariance, 1.0)],
            Self::CorneringSpeed => &[(AvgSpeed, 1.0)],
            Self::ThrottleApplication => &[(AvgThrottleBlade, 1.0)],
            Self::TrackTemperature => &[(TrackTemp, 1.0), (TempDelta, 1.0)],
            Self::AirTemperature => &[(AirTemp, 1.0), (TempDelta, -1.0)],
        }
    }

    /// Largest accepted magnitude
    pub fn limit(&self) -> f64 {
        match self {
            Self::BrakePressure => 30.0,
            Self::SteeringSmoothness => 40.0,
            Self::CorneringSpeed | Self::ThrottleApplication => 20.0,
            Self::TrackTemperature | Self::AirTemperature => 15.0,
        }
    }
}

impl fmt::Display for AdjustmentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for AdjustmentKind {
    type Err = PredictionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .find(|k| k.name() == s)
            .copied()
            .ok_or_else(|| PredictionError::UnknownAdjustment(s.to_string()))
    }
}

/// A validated adjustment
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Adjustment {
    kind: AdjustmentKind,
    amount: f64,
}

impl Adjustment {
    /// `amount` is a percentage for percent kinds and degrees for temperatures
    pub fn new(kind: AdjustmentKind, amount: f64) -> Result<Self, PredictionError> {
        let invalid = |reason: String| PredictionError::InvalidAdjustment {
            kind,
            amount,
            reason,
        };
        if !amount.is_finite() {
            return Err(invalid("amount must be finite".to_string()));
        }
        if amount.abs() > kind.limit() {
            return Err(invalid(format!("must be within ±{}", kind.limit())));
        }
        Ok(Self { kind, amount })
    }

    pub fn kind(&self) -> AdjustmentKind {
        self.kind
    }

    pub fn amount(&self) -> f64 {
        self.amount
    }

    /// Apply to a raw feature row
    pub fn apply(&self, row: &mut FeatureRow) -> Result<(), PredictionError> {
        for &(column, sign) in self.kind.targets() {
            let value = row.value_mut(column)?;
            match self.kind.effect() {
                AdjustmentEffect::Percent => *value *= 1.0 + self.amount / 100.0,
                AdjustmentEffect::Additive => *value += sign * self.amount,
            }
        }
        Ok(())
    }
}

/// Parses `kind=amount`, e.g. `brake_pressure=-20`
impl FromStr for Adjustment {
    type Err = PredictionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (name, amount) = s
            .split_once('=')
            .ok_or_else(|| PredictionError::UnknownAdjustment(s.to_string()))?;
        let kind: AdjustmentKind = name.trim().parse()?;
        let amount: f64 = amount.trim().parse().map_err(|_| PredictionError::InvalidAdjustment {
            kind,
            amount: f64::NAN,
            reason: format!("{:?} is not a number", amount),
        })?;
        Self::new(kind, amount)
    }
}

/// Set of adjustments with at most one per kind
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct WhatIfScenario {
    adjustments: Vec<Adjustment>,
}

impl WhatIfScenario {
    pub fn new(adjustments: Vec<Adjustment>) -> Result<Self, PredictionError> {
        let mut seen = BTreeSet::new();
        for a in &adjustments {
            if !seen.insert(a.kind) {
                return Err(PredictionError::DuplicateAdjustment(a.kind));
            }
        }
        Ok(Self { adjustments })
    }

    pub fn adjustments(&self) -> &[Adjustment] {
        &self.adjustments
    }

    pub fn get(&self, kind: AdjustmentKind) -> Option<&Adjustment> {
        self.adjustments.iter().find(|a| a.kind == kind)
    }

    pub fn is_empty(&self) -> bool {
        self.adjustments.is_empty()
    }

    /// Copy of `row` with every adjustment applied
    pub fn apply(&self, row: &FeatureRow) -> Result<FeatureRow, PredictionError> {
        let mut adjusted = row.clone();
        for a in &self.adjustments {
            a.apply(&mut adjusted)?;
        }
        Ok(adjusted)
    }
}

/// Result of a what-if prediction
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WhatIfOutcome {
    pub baseline_prediction: f64,
    pub adjusted_prediction: f64,
    /// `adjusted_prediction - baseline_prediction`
    pub delta: f64,
    pub adjusted_row: FeatureRow,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row() -> FeatureRow {
        FeatureRow::new()
            .with(FeatureColumn::AvgBrakeFront, 50.0)
            .with(FeatureColumn::MaxBrakeFront, 120.0)
            .with(FeatureColumn::AvgSpeed, 150.0)
            .with(FeatureColumn::AirTemp, 25.0)
            .with(FeatureColumn::TrackTemp, 35.0)
            .with(FeatureColumn::TempDelta, 10.0)
    }

    #[test]
    fn test_brake_reduction() {
        let scenario =
            WhatIfScenario::new(vec![Adjustment::new(AdjustmentKind::BrakePressure, -20.0).unwrap()])
                .unwrap();
        let adjusted = scenario.apply(&row()).unwrap();
        let brake = adjusted.get(FeatureColumn::AvgBrakeFront).unwrap();
        assert!((brake - 40.0).abs() < 1e-9);
        let peak = adjusted.get(FeatureColumn::MaxBrakeFront).unwrap();
        assert!((peak - 96.0).abs() < 1e-9);
        assert_eq!(adjusted.get(FeatureColumn::AvgSpeed), Some(150.0));
    }

    #[test]
    fn test_temperature_shifts_delta() {
        let scenario = WhatIfScenario::new(vec![
            Adjustment::new(AdjustmentKind::TrackTemperature, 5.0).unwrap(),
            Adjustment::new(AdjustmentKind::AirTemperature, 2.0).unwrap(),
        ])
        .unwrap();
        let adjusted = scenario.apply(&row()).unwrap();
        assert_eq!(adjusted.get(FeatureColumn::TrackTemp), Some(40.0));
        assert_eq!(adjusted.get(FeatureColumn::AirTemp), Some(27.0));
        assert_eq!(adjusted.get(FeatureColumn::TempDelta), Some(13.0));
    }

    #[test]
    fn test_bounds_checked_at_construction() {
        assert!(Adjustment::new(AdjustmentKind::BrakePressure, 30.0).is_ok());
        assert!(matches!(
            Adjustment::new(AdjustmentKind::BrakePressure, 35.0),
            Err(PredictionError::InvalidAdjustment { .. })
        ));
        assert!(Adjustment::new(AdjustmentKind::SteeringSmoothness, -40.0).is_ok());
        assert!(Adjustment::new(AdjustmentKind::CorneringSpeed, f64::NAN).is_err());
    }

    #[test]
    fn test_duplicate_kind_rejected() {
        let a = Adjustment::new(AdjustmentKind::CorneringSpeed, 5.0).unwrap();
        let b = Adjustment::new(AdjustmentKind::CorneringSpeed, -5.0).unwrap();
        assert!(matches!(
            WhatIfScenario::new(vec![a, b]),
            Err(PredictionError::DuplicateAdjustment(AdjustmentKind::CorneringSpeed))
        ));
    }

    #[test]
    fn test_parse_adjustment() {
        let a: Adjustment = "brake_pressure=-20".parse().unwrap();
        assert_eq!(a.kind(), AdjustmentKind::BrakePressure);
        assert_eq!(a.amount(), -20.0);

        assert!(matches!(
            "tyre_pressure=5".parse::<Adjustment>(),
            Err(PredictionError::UnknownAdjustment(name)) if name == "tyre_pressure"
        ));
        assert!(matches!(
            "cornering_speed=fast".parse::<Adjustment>(),
            Err(PredictionError::InvalidAdjustment { .. })
        ));
    }

    #[test]
    fn test_missing_target_column() {
        let scenario = WhatIfScenario::new(vec![
            Adjustment::new(AdjustmentKind::SteeringSmoothness, -10.0).unwrap(),
        ])
        .unwrap();
        assert!(matches!(
            scenario.apply(&row()),
            Err(PredictionError::MissingFeature(FeatureColumn::SteeringVariance))
        ));
    }
}
