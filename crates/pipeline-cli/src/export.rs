//! Training data export

use anyhow::{ensure, Result};
use preprocessing::{FeatureMatrix, TargetVector};
use std::io::Write;

/// Write `lap_id`, every feature column and the target as CSV
///
/// Missing values are written as empty fields.
pub fn write_training_csv<W: Write>(
    writer: W,
    features: &FeatureMatrix,
    target: &TargetVector,
) -> Result<()> {
    ensure!(
        features.nrows() == target.len(),
        "Feature matrix has {} rows but target has {}",
        features.nrows(),
        target.len()
    );

    let mut csv = csv::Writer::from_writer(writer);

    let mut header = vec!["lap_id".to_string()];
    header.extend(features.columns().iter().map(|c| c.name().to_string()));
    header.push(target.column().name().to_string());
    csv.write_record(&header)?;

    for (i, lap_id) in features.lap_ids().iter().enumerate() {
        let mut record = vec![lap_id.to_string()];
        record.extend(features.row(i).iter().map(|v| cell(*v)));
        record.push(cell(target.values()[i]));
        csv.write_record(&record)?;
    }

    csv.flush()?;
    Ok(())
}

fn cell(value: f64) -> String {
    if value.is_nan() {
        String::new()
    } else {
        value.to_string()
    }
}
