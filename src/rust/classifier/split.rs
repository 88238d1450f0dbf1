use std::collections::{BTreeMap, BTreeSet};

use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use super::error::TrainingError;
use crate::preprocessing::LabelMapping;

/// Row indices of the training and held-out partitions.
#[derive(Debug, Clone, PartialEq)]
pub struct Split {
    pub train: Vec<usize>,
    pub test: Vec<usize>,
}

/// Splits row indices per class so every class appears in both partitions.
///
/// Each class contributes `round(n * test_fraction)` rows to the test side,
/// clamped to `1..=n-1`. A class with fewer than two rows cannot be split and
/// fails the whole run instead of being dropped.
pub fn stratified_split(
    targets: &[usize],
    labels: &LabelMapping,
    test_fraction: f64,
    seed: u64,
) -> Result<Split, TrainingError> {
    let mut by_class: Vec<Vec<usize>> = vec![Vec::new(); labels.len()];
    for (row, &class) in targets.iter().enumerate() {
        by_class[class].push(row);
    }

    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut train = Vec::with_capacity(targets.len());
    let mut test = Vec::new();

    for (class, rows) in by_class.iter_mut().enumerate() {
        let n = rows.len();
        if n < 2 {
            return Err(TrainingError::StratificationInfeasible {
                label: labels.decode(class).unwrap_or_default().to_string(),
                count: n,
            });
        }
        rows.shuffle(&mut rng);
        let n_test = ((n as f64 * test_fraction).round() as usize).clamp(1, n - 1);
        test.extend_from_slice(&rows[..n_test]);
        train.extend_from_slice(&rows[n_test..]);
    }

    train.shuffle(&mut rng);
    test.shuffle(&mut rng);
    Ok(Split { train, test })
}

/// Splits the trailing `fraction` of each class's rows off for per-epoch
/// validation, keeping the relative order of `rows` on both sides.
///
/// Every class present in `rows` keeps at least one training row, so a class
/// with a single training row contributes nothing to validation.
pub fn validation_holdout(
    rows: &[usize],
    targets: &[usize],
    fraction: f64,
) -> (Vec<usize>, Vec<usize>) {
    if rows.is_empty() || fraction <= 0.0 {
        return (rows.to_vec(), Vec::new());
    }

    let mut by_class: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
    for &row in rows {
        by_class.entry(targets[row]).or_default().push(row);
    }

    let mut held_out: BTreeSet<usize> = BTreeSet::new();
    for class_rows in by_class.values() {
        let n = class_rows.len();
        let n_val = ((n as f64 * fraction).floor() as usize).min(n - 1);
        held_out.extend(&class_rows[n - n_val..]);
    }

    rows.iter().partition(|row| !held_out.contains(*row))
}
