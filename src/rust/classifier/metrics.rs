use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Training statistics recorded at the end of every epoch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpochStats {
    /// 1-based epoch number.
    pub epoch: usize,
    pub train_loss: f64,
    /// Fraction of training rows classified correctly, in [0, 1].
    pub train_accuracy: f64,
    /// `None` when the validation fraction left no rows to validate on.
    pub val_loss: Option<f64>,
    pub val_accuracy: Option<f64>,
}

/// Loss and accuracy of the model over one set of rows.
#[derive(Debug, Clone, PartialEq)]
pub struct Evaluation {
    pub loss: f64,
    pub accuracy: f64,
    pub predictions: Vec<usize>,
}

/// Counts of (true class, predicted class) pairs; rows are truth, columns predictions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfusionMatrix {
    labels: Vec<String>,
    counts: Vec<Vec<usize>>,
}

impl ConfusionMatrix {
    pub fn from_predictions(labels: &[String], truth: &[usize], predicted: &[usize]) -> Self {
        let k = labels.len();
        let mut counts = vec![vec![0; k]; k];
        for (&t, &p) in truth.iter().zip(predicted) {
            if t < k && p < k {
                counts[t][p] += 1;
            }
        }
        Self {
            labels: labels.to_vec(),
            counts,
        }
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    pub fn count(&self, truth: usize, predicted: usize) -> usize {
        self.counts
            .get(truth)
            .and_then(|row| row.get(predicted))
            .copied()
            .unwrap_or(0)
    }

    pub fn total(&self) -> usize {
        self.counts.iter().flatten().sum()
    }

    pub fn accuracy(&self) -> f64 {
        let total = self.total();
        if total == 0 {
            return 0.0;
        }
        let correct: usize = (0..self.labels.len()).map(|i| self.counts[i][i]).sum();
        correct as f64 / total as f64
    }

    /// Recall per class, i.e. the diagonal of the row-normalized matrix.
    pub fn recall_per_class(&self) -> BTreeMap<String, f64> {
        self.labels
            .iter()
            .enumerate()
            .map(|(i, label)| {
                let row_total: usize = self.counts[i].iter().sum();
                let recall = if row_total > 0 {
                    self.counts[i][i] as f64 / row_total as f64
                } else {
                    0.0
                };
                (label.clone(), recall)
            })
            .collect()
    }
}

impl fmt::Display for ConfusionMatrix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let width = self
            .labels
            .iter()
            .map(|l| l.len())
            .max()
            .unwrap_or(0)
            .max(6);
        write!(f, "{:>width$}", "", width = width)?;
        for label in &self.labels {
            write!(f, " {:>width$}", label, width = width)?;
        }
        writeln!(f)?;
        for (label, row) in self.labels.iter().zip(&self.counts) {
            write!(f, "{:>width$}", label, width = width)?;
            for count in row {
                write!(f, " {:>width$}", count, width = width)?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

/// Everything a training run measured.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingReport {
    pub class_counts: BTreeMap<String, usize>,
    pub train_size: usize,
    pub validation_size: usize,
    pub test_size: usize,
    pub history: Vec<EpochStats>,
    pub test_loss: f64,
    pub test_accuracy: f64,
    pub confusion: ConfusionMatrix,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels() -> Vec<String> {
        vec!["lean_left".into(), "straight".into()]
    }

    #[test]
    fn test_confusion_counts() {
        let cm = ConfusionMatrix::from_predictions(&labels(), &[0, 0, 1, 1, 1], &[0, 1, 1, 1, 0]);
        assert_eq!(cm.count(0, 0), 1);
        assert_eq!(cm.count(0, 1), 1);
        assert_eq!(cm.count(1, 1), 2);
        assert_eq!(cm.count(1, 0), 1);
        assert_eq!(cm.total(), 5);
        assert!((cm.accuracy() - 0.6).abs() < 1e-12);

        let recall = cm.recall_per_class();
        assert!((recall["lean_left"] - 0.5).abs() < 1e-12);
        assert!((recall["straight"] - 2.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_display_has_one_line_per_class() {
        let cm = ConfusionMatrix::from_predictions(&labels(), &[0, 1], &[0, 1]);
        let rendered = cm.to_string();
        assert_eq!(rendered.lines().count(), 3);
        assert!(rendered.contains("straight"));
    }
}
