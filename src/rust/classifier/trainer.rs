use std::time::Instant;

use log::{debug, info};
use ndarray::{Array2, Axis};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use super::builder::{TrainConfig, TrainerBuilder};
use super::error::{ClassifierError, TrainingError};
use super::metrics::{ConfusionMatrix, EpochStats, Evaluation, TrainingReport};
use super::model::Mlp;
use super::optim::Adam;
use super::split::{stratified_split, validation_holdout};
use super::utils::{cross_entropy, one_hot, row_argmax};
use crate::bundle::ArtifactBundle;
use crate::dataset::{Dataset, NUM_CHANNELS};
use crate::preprocessing::{self, LabelMapping, ScalerParams};

/// Result of a successful training run: the deployable bundle and its report.
#[derive(Debug)]
pub struct TrainingOutcome {
    pub bundle: ArtifactBundle<Mlp>,
    pub report: TrainingReport,
}

/// Runs the offline pipeline from a labeled dataset to an artifact bundle.
#[derive(Debug, Clone)]
pub struct Trainer {
    config: TrainConfig,
}

/// Standardized features and encoded targets for every row of the dataset.
struct Encoded {
    features: Array2<f64>,
    targets: Vec<usize>,
    one_hot: Array2<f64>,
}

impl Encoded {
    fn new(
        dataset: &Dataset,
        scaler: &ScalerParams,
        labels: &LabelMapping,
    ) -> Result<Self, ClassifierError> {
        let mut flat = Vec::with_capacity(dataset.len() * NUM_CHANNELS);
        let mut targets = Vec::with_capacity(dataset.len());
        for sample in dataset.samples() {
            flat.extend(scaler.transform(&sample.reading).iter());
            let class = labels.encode(&sample.label).ok_or_else(|| {
                ClassifierError::ValidationError(format!(
                    "Label '{}' is missing from the label mapping",
                    sample.label
                ))
            })?;
            targets.push(class);
        }
        let features = Array2::from_shape_vec((dataset.len(), NUM_CHANNELS), flat)?;
        let one_hot = one_hot(&targets, labels.len());
        Ok(Self {
            features,
            targets,
            one_hot,
        })
    }

    fn evaluate(&self, model: &Mlp, rows: &[usize]) -> Evaluation {
        let x = self.features.select(Axis(0), rows);
        let y = self.one_hot.select(Axis(0), rows);
        let probabilities = model.forward(x.view());
        let predictions = row_argmax(&probabilities);
        let correct = predictions
            .iter()
            .zip(rows)
            .filter(|(&p, &row)| p == self.targets[row])
            .count();
        Evaluation {
            loss: cross_entropy(&probabilities, &y),
            accuracy: correct as f64 / rows.len().max(1) as f64,
            predictions,
        }
    }
}

impl Trainer {
    /// Creates a new TrainerBuilder for fluent construction
    pub fn builder() -> TrainerBuilder {
        TrainerBuilder::new()
    }

    pub(crate) fn new(config: TrainConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &TrainConfig {
        &self.config
    }

    /// Fits preprocessing on the whole dataset, trains on a stratified split
    /// and evaluates on the held-out rows.
    ///
    /// Scaler parameters and the label mapping come from 100% of the samples,
    /// so they are identical to what inference will apply.
    pub fn fit(&self, dataset: &Dataset) -> Result<TrainingOutcome, TrainingError> {
        let config = &self.config;
        let start = Instant::now();

        let (scaler, labels) = preprocessing::fit(dataset)?;
        info!("Label mapping: {:?}", labels.labels());

        let encoded = Encoded::new(dataset, &scaler, &labels)?;
        let split = stratified_split(&encoded.targets, &labels, config.test_fraction, config.seed)?;
        let (train_rows, val_rows) =
            validation_holdout(&split.train, &encoded.targets, config.validation_fraction);
        info!(
            "Split: train={} validation={} test={}",
            train_rows.len(),
            val_rows.len(),
            split.test.len()
        );

        let mut model = Mlp::new(NUM_CHANNELS, &config.hidden_layers, labels.len(), config.seed)?;
        let mut optimizer = Adam::new(&model, config.learning_rate);
        let mut rng = ChaCha8Rng::seed_from_u64(config.seed);
        let mut history = Vec::with_capacity(config.epochs);

        info!("--- Training Model ---");
        for epoch in 1..=config.epochs {
            let mut order = train_rows.clone();
            order.shuffle(&mut rng);

            for batch in order.chunks(config.batch_size) {
                let x = encoded.features.select(Axis(0), batch);
                let y = encoded.one_hot.select(Axis(0), batch);
                let trace = model.forward_trace(x.view());
                let grads = model.backward(&trace, &y);
                optimizer.step(&mut model, &grads);
            }

            let train = encoded.evaluate(&model, &train_rows);
            let val = (!val_rows.is_empty()).then(|| encoded.evaluate(&model, &val_rows));
            let stats = EpochStats {
                epoch,
                train_loss: train.loss,
                train_accuracy: train.accuracy,
                val_loss: val.as_ref().map(|v| v.loss),
                val_accuracy: val.as_ref().map(|v| v.accuracy),
            };
            debug!(
                "epoch {:3}/{} | loss={:.4} acc={:.4} | val_loss={:?} val_acc={:?}",
                epoch,
                config.epochs,
                stats.train_loss,
                stats.train_accuracy,
                stats.val_loss,
                stats.val_accuracy
            );
            history.push(stats);
        }

        let test = encoded.evaluate(&model, &split.test);
        let truth: Vec<usize> = split.test.iter().map(|&row| encoded.targets[row]).collect();
        let confusion =
            ConfusionMatrix::from_predictions(labels.labels(), &truth, &test.predictions);
        info!("Test Loss: {:.4}", test.loss);
        info!("Final Test Accuracy: {:.2}%", test.accuracy * 100.0);
        info!("Confusion matrix (rows = truth):\n{}", confusion);
        info!("Training finished in {:.2?}", start.elapsed());

        let report = TrainingReport {
            class_counts: dataset.class_counts(),
            train_size: train_rows.len(),
            validation_size: val_rows.len(),
            test_size: split.test.len(),
            history,
            test_loss: test.loss,
            test_accuracy: test.accuracy,
            confusion,
        };
        let bundle = ArtifactBundle::new(scaler, labels, model)?;
        Ok(TrainingOutcome { bundle, report })
    }
}
