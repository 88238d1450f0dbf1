use serde_json::Value;

use super::error::ApiError;
use crate::dataset::{SensorReading, CHANNELS, NUM_CHANNELS};

/// Validated body of a prediction request.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PredictRequest {
    pub reading: SensorReading,
}

impl PredictRequest {
    /// Checks that `body` is a JSON object carrying all eight channels as
    /// finite numbers. Extra keys are ignored.
    ///
    /// Every missing channel is reported, not just the first.
    pub fn parse(body: &Value) -> Result<Self, ApiError> {
        let object = match body {
            Value::Object(map) if !map.is_empty() => map,
            _ => return Err(ApiError::NoData),
        };

        let missing: Vec<String> = CHANNELS
            .iter()
            .filter(|name| !object.contains_key(**name))
            .map(|name| name.to_string())
            .collect();
        if !missing.is_empty() {
            return Err(ApiError::MissingFields { missing });
        }

        let mut values = [0.0; NUM_CHANNELS];
        for (slot, name) in values.iter_mut().zip(CHANNELS.iter()) {
            *slot = object
                .get(*name)
                .and_then(Value::as_f64)
                .filter(|v| v.is_finite())
                .ok_or_else(|| ApiError::InvalidValue {
                    field: name.to_string(),
                })?;
        }

        Ok(Self {
            reading: SensorReading::new(values),
        })
    }
}
