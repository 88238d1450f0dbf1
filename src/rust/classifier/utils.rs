use ndarray::{Array1, Array2, ArrayView1, Axis};

const LOG_EPSILON: f64 = 1e-12;

/// Row-wise softmax, shifted by each row's maximum for numerical stability.
pub(crate) fn softmax_rows(logits: &Array2<f64>) -> Array2<f64> {
    let mut out = logits.clone();
    for mut row in out.rows_mut() {
        let max = row.fold(f64::NEG_INFINITY, |m, &v| m.max(v));
        row.mapv_inplace(|v| (v - max).exp());
        let sum = row.sum();
        row.mapv_inplace(|v| v / sum);
    }
    out
}

/// Index of the largest value; the first one wins ties and NaN never wins.
pub(crate) fn argmax(values: ArrayView1<f64>) -> usize {
    let mut best = 0;
    let mut best_value = f64::NEG_INFINITY;
    for (i, &v) in values.iter().enumerate() {
        if v > best_value {
            best = i;
            best_value = v;
        }
    }
    best
}

pub(crate) fn one_hot(targets: &[usize], num_classes: usize) -> Array2<f64> {
    let mut out = Array2::zeros((targets.len(), num_classes));
    for (row, &class) in targets.iter().enumerate() {
        out[[row, class]] = 1.0;
    }
    out
}

/// Mean categorical cross-entropy over the rows of a batch.
pub(crate) fn cross_entropy(probabilities: &Array2<f64>, targets: &Array2<f64>) -> f64 {
    let n = probabilities.nrows().max(1) as f64;
    let total: f64 = probabilities
        .iter()
        .zip(targets.iter())
        .map(|(&p, &y)| if y > 0.0 { -y * p.max(LOG_EPSILON).ln() } else { 0.0 })
        .sum();
    total / n
}

pub(crate) fn row_argmax(probabilities: &Array2<f64>) -> Vec<usize> {
    probabilities.axis_iter(Axis(0)).map(argmax).collect()
}

pub(crate) fn column_sums(values: &Array2<f64>) -> Array1<f64> {
    values.sum_axis(Axis(0))
}
