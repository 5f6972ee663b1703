//! Interpretation of predictions

use crate::what_if::{AdjustmentKind, WhatIfOutcome, WhatIfScenario};
use serde::Serialize;
use std::fmt;

/// Stint length used for projections
pub const STINT_PROJECTION_LAPS: u32 = 15;

/// Prediction change treated as noise (seconds)
const NEGLIGIBLE_DELTA: f64 = 0.1;

/// Degradation band for a predicted value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DegradationLevel {
    Excellent,
    Good,
    High,
    Critical,
}

impl DegradationLevel {
    pub fn from_prediction(seconds: f64) -> Self {
        if seconds < 0.2 {
            Self::Excellent
        } else if seconds < 0.5 {
            Self::Good
        } else if seconds < 0.8 {
            Self::High
        } else {
            Self::Critical
        }
    }

    pub fn color(&self) -> &'static str {
        match self {
            Self::Excellent => "green",
            Self::Good => "yellow",
            Self::High => "orange",
            Self::Critical => "red",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Self::Excellent => "Minimal tire wear, very efficient driving",
            Self::Good => "Moderate tire wear, sustainable pace",
            Self::High => "Elevated tire wear, consider adjusting style",
            Self::Critical => "Excessive tire wear, unsustainable pace",
        }
    }
}

impl fmt::Display for DegradationLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Excellent => "Excellent",
            Self::Good => "Good",
            Self::High => "High",
            Self::Critical => "Critical",
        };
        f.write_str(label)
    }
}

/// Tire management efficiency: lap pace per unit of wear
///
/// Non-positive degradation counts as 0.01.
pub fn efficiency_score(lap_time_seconds: f64, degradation: f64) -> f64 {
    let degradation = if degradation <= 0.0 { 0.01 } else { degradation };
    (100.0 / lap_time_seconds) * (1.0 / degradation)
}

/// Total wear over a projected stint
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct StintProjection {
    pub laps: u32,
    pub baseline_total: f64,
    pub adjusted_total: f64,
    pub delta: f64,
}

impl StintProjection {
    pub fn from_outcome(outcome: &WhatIfOutcome, laps: u32) -> Self {
        let baseline_total = outcome.baseline_prediction * laps as f64;
        let adjusted_total = outcome.adjusted_prediction * laps as f64;
        Self {
            laps,
            baseline_total,
            adjusted_total,
            delta: adjusted_total - baseline_total,
        }
    }
}

/// Driver-facing notes on a what-if result
pub fn coaching_insights(outcome: &WhatIfOutcome, scenario: &WhatIfScenario) -> Vec<String> {
    let delta = outcome.delta;
    let mut insights = Vec::new();

    if delta < -NEGLIGIBLE_DELTA {
        insights.push(format!(
            "Great adjustment: saves {:.2} seconds/lap in tire wear.",
            delta.abs()
        ));
    } else if delta > NEGLIGIBLE_DELTA {
        insights.push(format!(
            "This change increases tire wear by {:.2} seconds/lap.",
            delta
        ));
    } else {
        insights.push(format!(
            "Minimal impact on tire degradation ({:.2} sec/lap).",
            delta.abs()
        ));
    }

    for a in scenario.adjustments() {
        let softer = a.amount() < 0.0;
        let note = match (a.kind(), softer) {
            (_, _) if a.amount() == 0.0 => None,
            (AdjustmentKind::BrakePressure, true) => {
                Some("Softer braking reduces heat buildup in the tires.")
            }
            (AdjustmentKind::BrakePressure, false) => {
                Some("Harder braking increases tire temperature and wear.")
            }
            (AdjustmentKind::CorneringSpeed, true) => {
                Some("Slower cornering speeds reduce lateral tire stress.")
            }
            (AdjustmentKind::CorneringSpeed, false) => {
                Some("Aggressive cornering increases edge wear.")
            }
            (AdjustmentKind::SteeringSmoothness, true) => {
                Some("Smoother steering inputs preserve tire life.")
            }
            (AdjustmentKind::SteeringSmoothness, false) => {
                Some("Abrupt steering heats up the tire shoulders.")
            }
            _ => None,
        };
        if let Some(note) = note {
            insights.push(note.to_string());
        }
    }

    if delta < 0.0 {
        let projection = StintProjection::from_outcome(outcome, STINT_PROJECTION_LAPS);
        insights.push(format!(
            "Over a {}-lap stint this saves ~{:.1} seconds of tire life.",
            projection.laps,
            projection.delta.abs()
        ));
    }

    insights
}
