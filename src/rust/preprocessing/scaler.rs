use log::warn;
use ndarray::Array1;
use serde::{Deserialize, Serialize};

use super::PreprocessingError;
use crate::dataset::{Dataset, SensorReading, CHANNELS, NUM_CHANNELS};

/// Channels whose standard deviation falls below this are treated as constant.
const MIN_STD: f64 = 1e-12;

/// Per-channel standardization parameters.
///
/// `std` is the population standard deviation as measured. A constant channel
/// keeps its measured `std` of zero but is scaled by 1.0, so `transform` only
/// centers it instead of dividing by zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScalerParams {
    mean: [f64; NUM_CHANNELS],
    std: [f64; NUM_CHANNELS],
}

impl ScalerParams {
    pub fn new(
        mean: [f64; NUM_CHANNELS],
        std: [f64; NUM_CHANNELS],
    ) -> Result<Self, PreprocessingError> {
        let params = Self { mean, std };
        params.validate()?;
        Ok(params)
    }

    /// Computes mean and population standard deviation of every channel.
    pub fn fit(dataset: &Dataset) -> Result<Self, PreprocessingError> {
        if dataset.is_empty() {
            return Err(PreprocessingError::EmptyDataset);
        }
        let n = dataset.len() as f64;

        let mut mean = [0.0; NUM_CHANNELS];
        for sample in dataset.samples() {
            for (m, v) in mean.iter_mut().zip(sample.reading.values()) {
                *m += v;
            }
        }
        mean.iter_mut().for_each(|m| *m /= n);

        let mut var = [0.0; NUM_CHANNELS];
        for sample in dataset.samples() {
            for ((acc, v), m) in var.iter_mut().zip(sample.reading.values()).zip(&mean) {
                *acc += (v - m) * (v - m);
            }
        }
        let std = var.map(|v| (v / n).sqrt());

        for (channel, s) in CHANNELS.iter().zip(&std) {
            if *s < MIN_STD {
                warn!("Channel {} has zero variance; it will be centered but not scaled", channel);
            }
        }

        Self::new(mean, std)
    }

    pub fn mean(&self) -> &[f64; NUM_CHANNELS] {
        &self.mean
    }

    pub fn std(&self) -> &[f64; NUM_CHANNELS] {
        &self.std
    }

    fn scale(&self, channel: usize) -> f64 {
        let s = self.std[channel];
        if s < MIN_STD {
            1.0
        } else {
            s
        }
    }

    /// Standardizes one reading as `(value - mean) / std`, channel by channel.
    pub fn transform(&self, reading: &SensorReading) -> Array1<f64> {
        Array1::from_iter(
            reading
                .values()
                .iter()
                .enumerate()
                .map(|(i, v)| (v - self.mean[i]) / self.scale(i)),
        )
    }

    pub fn validate(&self) -> Result<(), PreprocessingError> {
        for (i, channel) in CHANNELS.iter().enumerate() {
            if !self.mean[i].is_finite() {
                return Err(PreprocessingError::InvalidScaler(format!(
                    "mean of channel {} is not finite",
                    channel
                )));
            }
            if !self.std[i].is_finite() || self.std[i] < 0.0 {
                return Err(PreprocessingError::InvalidScaler(format!(
                    "std of channel {} must be finite and non-negative, got {}",
                    channel, self.std[i]
                )));
            }
        }
        Ok(())
    }
}
