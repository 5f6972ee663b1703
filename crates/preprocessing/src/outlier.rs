//! Z-score outlier removal

use crate::error::PreprocessError;
use lap_features::{ChannelStats, FeatureColumn, NullPolicy, StintDegradationRecord};
use serde::{Deserialize, Serialize};
use tracing::info;

/// Default z-score cutoff
pub const DEFAULT_OUTLIER_THRESHOLD: f64 = 3.0;

/// Outcome of an outlier pass
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OutlierReport {
    pub initial: usize,
    pub removed: usize,
    pub percent_removed: f64,
    pub threshold: f64,
}

/// Column mean and sample standard deviation, computed once per pass
struct ColumnMoments {
    column: FeatureColumn,
    mean: f64,
    std_dev: f64,
}

/// Drop every record with a screened value more than `threshold` sample
/// standard deviations from its column mean
///
/// Statistics are computed once over the input, before any removal.
/// Missing values never trigger removal, and columns with zero spread are
/// skipped.
pub fn remove_outliers(
    records: Vec<StintDegradationRecord>,
    threshold: f64,
) -> Result<(Vec<StintDegradationRecord>, OutlierReport), PreprocessError> {
    if !threshold.is_finite() || threshold <= 0.0 {
        return Err(PreprocessError::InvalidThreshold(threshold));
    }

    let initial = records.len();
    let moments: Vec<ColumnMoments> = FeatureColumn::OUTLIER_SCREENED
        .iter()
        .filter_map(|&column| {
            let stats = ChannelStats::from_optional(
                records.iter().map(|r| column.value(r)),
                NullPolicy::IgnoreMissing,
            );
            let mean = stats.mean()?;
            let std_dev = stats.sample_std_dev()?;
            (std_dev > 0.0).then_some(ColumnMoments {
                column,
                mean,
                std_dev,
            })
        })
        .collect();

    let kept: Vec<StintDegradationRecord> = records
        .into_iter()
        .filter(|r| {
            moments.iter().all(|m| match m.column.value(r) {
                Some(v) if v.is_finite() => ((v - m.mean) / m.std_dev).abs() <= threshold,
                _ => true,
            })
        })
        .collect();

    let removed = initial - kept.len();
    let percent_removed = if initial == 0 {
        0.0
    } else {
        removed as f64 / initial as f64 * 100.0
    };

    info!(
        "Removed {} outliers ({:.2}%) at |z| > {}",
        removed, percent_removed, threshold
    );

    Ok((
        kept,
        OutlierReport {
            initial,
            removed,
            percent_removed,
            threshold,
        },
    ))
}
