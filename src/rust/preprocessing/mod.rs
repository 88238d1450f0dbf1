//! Feature standardization and label encoding fitted once per training run.
//!
//! Both halves are fitted from the same full dataset and persisted together in
//! the artifact bundle, so inference indexes and scales inputs exactly as
//! training did.

mod labels;
mod scaler;

pub use labels::LabelMapping;
pub use scaler::ScalerParams;

use crate::dataset::Dataset;

#[derive(Debug, thiserror::Error)]
pub enum PreprocessingError {
    #[error("Cannot fit preprocessing on an empty dataset")]
    EmptyDataset,
    #[error("Invalid scaler parameters: {0}")]
    InvalidScaler(String),
    #[error("Invalid label mapping: {0}")]
    InvalidLabels(String),
}

/// Fits scaler parameters and the label mapping over the entire dataset.
pub fn fit(dataset: &Dataset) -> Result<(ScalerParams, LabelMapping), PreprocessingError> {
    let scaler = ScalerParams::fit(dataset)?;
    let labels = LabelMapping::fit(dataset.samples().iter().map(|s| s.label.as_str()))?;
    Ok((scaler, labels))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::{LabeledSample, SensorReading};

    #[test]
    fn test_fit_uses_full_dataset() {
        let dataset = Dataset::new(vec![
            LabeledSample { reading: SensorReading::new([0.0; 8]), label: "straight".into() },
            LabeledSample { reading: SensorReading::new([2.0; 8]), label: "lean_left".into() },
        ]);
        let (scaler, labels) = fit(&dataset).unwrap();
        assert_eq!(scaler.mean(), &[1.0; 8]);
        assert_eq!(scaler.std(), &[1.0; 8]);
        assert_eq!(labels.labels(), &["lean_left".to_string(), "straight".to_string()]);
    }

    #[test]
    fn test_fit_empty() {
        assert!(matches!(fit(&Dataset::default()), Err(PreprocessingError::EmptyDataset)));
    }
}
