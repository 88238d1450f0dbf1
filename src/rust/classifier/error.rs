use std::fmt;

use crate::bundle::BundleError;
use crate::preprocessing::PreprocessingError;

/// Represents the different types of errors that can occur in the posture classifier.
#[derive(Debug)]
pub enum ClassifierError {
    /// The model's weights or shape are unusable
    ModelError(String),
    /// Error occurred while configuring a trainer or constructing a model
    BuildError(String),
    /// Error occurred while making predictions
    PredictionError(String),
    /// Error occurred due to invalid input parameters
    ValidationError(String),
}

impl fmt::Display for ClassifierError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ModelError(msg) => write!(f, "Model error: {}", msg),
            Self::BuildError(msg) => write!(f, "Build error: {}", msg),
            Self::PredictionError(msg) => write!(f, "Prediction error: {}", msg),
            Self::ValidationError(msg) => write!(f, "Validation error: {}", msg),
        }
    }
}

impl std::error::Error for ClassifierError {}

impl From<ndarray::ShapeError> for ClassifierError {
    fn from(err: ndarray::ShapeError) -> Self {
        ClassifierError::ModelError(err.to_string())
    }
}

/// Fatal conditions of a training run.
#[derive(Debug, thiserror::Error)]
pub enum TrainingError {
    #[error("Preprocessing failed: {0}")]
    Preprocessing(#[from] PreprocessingError),
    #[error("Class '{label}' has {count} sample(s); at least 2 are needed for a stratified split")]
    StratificationInfeasible { label: String, count: usize },
    #[error(transparent)]
    Classifier(#[from] ClassifierError),
    #[error("Failed to assemble artifact bundle: {0}")]
    Bundle(#[from] BundleError),
}
