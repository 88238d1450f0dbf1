use log::info;
use serde::{Deserialize, Serialize};

use super::error::ClassifierError;
use super::trainer::Trainer;

/// Hyperparameters of a training run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainConfig {
    pub epochs: usize,
    pub batch_size: usize,
    pub learning_rate: f64,
    /// Width of each hidden layer, in order.
    pub hidden_layers: Vec<usize>,
    /// Share of every class held out for the final evaluation.
    pub test_fraction: f64,
    /// Share of the training partition used for per-epoch validation.
    pub validation_fraction: f64,
    pub seed: u64,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            epochs: 100,
            batch_size: 8,
            learning_rate: 1e-3,
            hidden_layers: vec![32; 5],
            test_fraction: 0.2,
            validation_fraction: 0.1,
            seed: 42,
        }
    }
}

/// A builder for constructing a Trainer with a fluent interface.
#[derive(Debug, Default)]
pub struct TrainerBuilder {
    config: TrainConfig,
}

impl TrainerBuilder {
    /// Creates a builder holding the default configuration
    ///
    /// # Example
    /// ```
    /// use posture::TrainerBuilder;
    ///
    /// let trainer = TrainerBuilder::new().build().unwrap();
    /// assert_eq!(trainer.config().epochs, 100);
    /// ```
    pub fn new() -> Self {
        Self {
            config: TrainConfig::default(),
        }
    }

    /// Replaces the whole configuration at once
    pub fn with_config(mut self, config: TrainConfig) -> Self {
        self.config = config;
        self
    }

    pub fn epochs(mut self, epochs: usize) -> Self {
        self.config.epochs = epochs;
        self
    }

    pub fn batch_size(mut self, batch_size: usize) -> Self {
        self.config.batch_size = batch_size;
        self
    }

    pub fn learning_rate(mut self, learning_rate: f64) -> Self {
        self.config.learning_rate = learning_rate;
        self
    }

    pub fn hidden_layers(mut self, hidden_layers: Vec<usize>) -> Self {
        self.config.hidden_layers = hidden_layers;
        self
    }

    pub fn test_fraction(mut self, test_fraction: f64) -> Self {
        self.config.test_fraction = test_fraction;
        self
    }

    pub fn validation_fraction(mut self, validation_fraction: f64) -> Self {
        self.config.validation_fraction = validation_fraction;
        self
    }

    pub fn seed(mut self, seed: u64) -> Self {
        self.config.seed = seed;
        self
    }

    /// Validates the configuration according to the following rules:
    /// - At least one epoch and a non-zero batch size
    /// - Learning rate finite and positive
    /// - No zero-width hidden layer
    /// - Test fraction strictly between 0 and 1
    /// - Validation fraction in [0, 1)
    fn validate_config(config: &TrainConfig) -> Result<(), ClassifierError> {
        if config.epochs == 0 {
            return Err(ClassifierError::ValidationError("Epochs must be at least 1".into()));
        }
        if config.batch_size == 0 {
            return Err(ClassifierError::ValidationError("Batch size must be at least 1".into()));
        }
        if !config.learning_rate.is_finite() || config.learning_rate <= 0.0 {
            return Err(ClassifierError::ValidationError(format!(
                "Learning rate must be positive, got {}",
                config.learning_rate
            )));
        }
        if let Some(pos) = config.hidden_layers.iter().position(|&w| w == 0) {
            return Err(ClassifierError::ValidationError(format!(
                "Hidden layer {} cannot have zero width",
                pos + 1
            )));
        }
        if !(config.test_fraction > 0.0 && config.test_fraction < 1.0) {
            return Err(ClassifierError::ValidationError(format!(
                "Test fraction must be between 0 and 1, got {}",
                config.test_fraction
            )));
        }
        if !(config.validation_fraction >= 0.0 && config.validation_fraction < 1.0) {
            return Err(ClassifierError::ValidationError(format!(
                "Validation fraction must be in [0, 1), got {}",
                config.validation_fraction
            )));
        }
        Ok(())
    }

    /// Builds and returns the final Trainer instance
    ///
    /// # Returns
    /// * `Result<Trainer, ClassifierError>` - The trainer if the configuration is valid
    pub fn build(self) -> Result<Trainer, ClassifierError> {
        Self::validate_config(&self.config)?;
        info!("Trainer configured: {:?}", self.config);
        Ok(Trainer::new(self.config))
    }
}
