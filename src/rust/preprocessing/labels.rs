use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use super::PreprocessingError;

/// Canonical label to integer index, where the index is the position in `labels`.
///
/// Labels are sorted when fitted; the persisted order is what inference decodes
/// against, so it is never recomputed after training.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelMapping {
    labels: Vec<String>,
}

impl LabelMapping {
    pub fn new(labels: Vec<String>) -> Result<Self, PreprocessingError> {
        let mapping = Self { labels };
        mapping.validate()?;
        Ok(mapping)
    }

    /// Collects the unique labels in sorted order.
    pub fn fit<'a>(labels: impl IntoIterator<Item = &'a str>) -> Result<Self, PreprocessingError> {
        let unique: BTreeSet<&str> = labels.into_iter().collect();
        if unique.is_empty() {
            return Err(PreprocessingError::EmptyDataset);
        }
        Self::new(unique.into_iter().map(String::from).collect())
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn encode(&self, label: &str) -> Option<usize> {
        self.labels.iter().position(|l| l == label)
    }

    pub fn decode(&self, index: usize) -> Option<&str> {
        self.labels.get(index).map(String::as_str)
    }

    pub fn validate(&self) -> Result<(), PreprocessingError> {
        if self.labels.is_empty() {
            return Err(PreprocessingError::InvalidLabels("no labels".into()));
        }
        if let Some(pos) = self.labels.iter().position(|l| l.is_empty()) {
            return Err(PreprocessingError::InvalidLabels(format!("label {} is empty", pos)));
        }
        let unique: BTreeSet<&String> = self.labels.iter().collect();
        if unique.len() != self.labels.len() {
            return Err(PreprocessingError::InvalidLabels("duplicate labels".into()));
        }
        Ok(())
    }
}
