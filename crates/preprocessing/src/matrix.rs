//! Model-ready feature matrix and target vector

use lap_features::{FeatureColumn, StintDegradationRecord};
use ndarray::{Array1, Array2, ArrayView1, Axis};
use tracing::info;

/// Column the model learns to predict
pub const TARGET_COLUMN: FeatureColumn = FeatureColumn::RollingWindowDegradation;

/// Row-per-lap feature matrix. Missing values are NaN.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureMatrix {
    columns: Vec<FeatureColumn>,
    lap_ids: Vec<i64>,
    values: Array2<f64>,
}

impl FeatureMatrix {
    /// Project records onto the given columns, in order
    pub fn from_records(records: &[StintDegradationRecord], columns: &[FeatureColumn]) -> Self {
        let values = Array2::from_shape_fn((records.len(), columns.len()), |(i, j)| {
            columns[j].value(&records[i]).unwrap_or(f64::NAN)
        });
        Self {
            columns: columns.to_vec(),
            lap_ids: records.iter().map(|r| r.lap.lap_id).collect(),
            values,
        }
    }

    /// Zero-row matrix with the model schema
    pub fn empty() -> Self {
        Self::from_records(&[], &FeatureColumn::MODEL_FEATURES)
    }

    pub fn columns(&self) -> &[FeatureColumn] {
        &self.columns
    }

    /// Lap id of each row
    pub fn lap_ids(&self) -> &[i64] {
        &self.lap_ids
    }

    pub fn values(&self) -> &Array2<f64> {
        &self.values
    }

    pub fn nrows(&self) -> usize {
        self.values.nrows()
    }

    pub fn ncols(&self) -> usize {
        self.values.ncols()
    }

    pub fn is_empty(&self) -> bool {
        self.nrows() == 0
    }

    pub fn row(&self, index: usize) -> ArrayView1<'_, f64> {
        self.values.row(index)
    }

    /// One column by name, if present
    pub fn column(&self, column: FeatureColumn) -> Option<ArrayView1<'_, f64>> {
        let idx = self.columns.iter().position(|c| *c == column)?;
        Some(self.values.column(idx))
    }

    /// Missing cells per column
    pub fn null_counts(&self) -> Vec<(FeatureColumn, usize)> {
        self.columns
            .iter()
            .zip(self.values.axis_iter(Axis(1)))
            .map(|(c, col)| (*c, col.iter().filter(|v| v.is_nan()).count()))
            .collect()
    }
}

/// Prediction target aligned with a [`FeatureMatrix`]
#[derive(Debug, Clone, PartialEq)]
pub struct TargetVector {
    column: FeatureColumn,
    values: Array1<f64>,
}

impl TargetVector {
    pub fn from_records(records: &[StintDegradationRecord]) -> Self {
        Self {
            column: TARGET_COLUMN,
            values: records
                .iter()
                .map(|r| TARGET_COLUMN.value(r).unwrap_or(f64::NAN))
                .collect(),
        }
    }

    pub fn empty() -> Self {
        Self::from_records(&[])
    }

    pub fn column(&self) -> FeatureColumn {
        self.column
    }

    pub fn values(&self) -> &Array1<f64> {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn null_count(&self) -> usize {
        self.values.iter().filter(|v| v.is_nan()).count()
    }
}

/// Keep or drop records whose target is missing
///
/// Returns the surviving records and the number dropped.
pub fn build_target(
    records: Vec<StintDegradationRecord>,
    drop_null_targets: bool,
) -> (Vec<StintDegradationRecord>, usize) {
    if !drop_null_targets {
        return (records, 0);
    }
    let before = records.len();
    let kept: Vec<_> = records
        .into_iter()
        .filter(|r| TARGET_COLUMN.value(r).is_some())
        .collect();
    let dropped = before - kept.len();
    if dropped > 0 {
        info!("Dropped {} records with a missing target", dropped);
    }
    (kept, dropped)
}
