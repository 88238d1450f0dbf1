use std::fmt::Debug;

use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use super::error::ClassifierError;
use super::utils::{column_sums, softmax_rows};

/// Anything that turns a standardized feature vector into a probability
/// distribution over the label mapping's classes.
///
/// Implementations must be `Send + Sync`: the inference service shares one
/// instance across every request handler without locking.
pub trait PostureModel: Send + Sync + Debug {
    /// Length of the feature vector accepted by `predict_proba`.
    fn num_features(&self) -> usize;

    /// Length of the distribution returned by `predict_proba`.
    fn num_classes(&self) -> usize;

    /// Returns one probability per class, indexed like the label mapping.
    fn predict_proba(&self, features: ArrayView1<f64>) -> Result<Array1<f64>, ClassifierError>;
}

/// A fully connected layer; `weights` is `inputs x outputs`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DenseLayer {
    pub(crate) weights: Array2<f64>,
    pub(crate) bias: Array1<f64>,
}

impl DenseLayer {
    /// Glorot-uniform weights, zero bias.
    fn glorot(inputs: usize, outputs: usize, rng: &mut ChaCha8Rng) -> Self {
        let limit = (6.0 / (inputs + outputs) as f64).sqrt();
        let weights = Array2::from_shape_fn((inputs, outputs), |_| rng.gen_range(-limit..limit));
        Self {
            weights,
            bias: Array1::zeros(outputs),
        }
    }
}

/// Gradient of the loss with respect to one layer's parameters.
#[derive(Debug, Clone)]
pub(crate) struct LayerGrad {
    pub(crate) weights: Array2<f64>,
    pub(crate) bias: Array1<f64>,
}

impl LayerGrad {
    pub(crate) fn zeros_like(layer: &DenseLayer) -> Self {
        Self {
            weights: Array2::zeros(layer.weights.raw_dim()),
            bias: Array1::zeros(layer.bias.raw_dim()),
        }
    }
}

/// Pre-activations and activations recorded during a forward pass.
pub(crate) struct ForwardTrace {
    /// `activations[0]` is the input batch, the last entry is the softmax output.
    activations: Vec<Array2<f64>>,
    pre_activations: Vec<Array2<f64>>,
}

impl ForwardTrace {
    pub(crate) fn output(&self) -> &Array2<f64> {
        // a trace always holds the input plus one entry per layer
        &self.activations[self.activations.len() - 1]
    }
}

/// Feed-forward classifier: ReLU hidden layers and a softmax output layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Mlp {
    layers: Vec<DenseLayer>,
}

// Compile-time verification of thread-safety
const _: () = {
    fn assert_send_sync<T: Send + Sync>() {}
    fn verify_thread_safety() {
        assert_send_sync::<Mlp>();
    }
};

impl Mlp {
    /// Creates a network with freshly initialized weights.
    ///
    /// # Arguments
    /// * `inputs` - Number of input features
    /// * `hidden` - Width of each hidden layer, in order
    /// * `outputs` - Number of classes
    /// * `seed` - Seed for the weight initializer
    pub fn new(
        inputs: usize,
        hidden: &[usize],
        outputs: usize,
        seed: u64,
    ) -> Result<Self, ClassifierError> {
        if inputs == 0 || outputs == 0 {
            return Err(ClassifierError::BuildError(
                "Network needs at least one input and one output".into(),
            ));
        }
        if let Some(pos) = hidden.iter().position(|&w| w == 0) {
            return Err(ClassifierError::BuildError(format!(
                "Hidden layer {} has zero width",
                pos + 1
            )));
        }

        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let mut widths = Vec::with_capacity(hidden.len() + 2);
        widths.push(inputs);
        widths.extend_from_slice(hidden);
        widths.push(outputs);

        let layers = widths
            .windows(2)
            .map(|w| DenseLayer::glorot(w[0], w[1], &mut rng))
            .collect();
        Ok(Self { layers })
    }

    pub fn from_layers(layers: Vec<DenseLayer>) -> Result<Self, ClassifierError> {
        let model = Self { layers };
        model.validate()?;
        Ok(model)
    }

    pub fn layers(&self) -> &[DenseLayer] {
        &self.layers
    }

    pub(crate) fn layers_mut(&mut self) -> &mut [DenseLayer] {
        &mut self.layers
    }

    pub fn input_size(&self) -> usize {
        self.layers.first().map_or(0, |l| l.weights.nrows())
    }

    pub fn output_size(&self) -> usize {
        self.layers.last().map_or(0, |l| l.weights.ncols())
    }

    /// Widths of the hidden layers.
    pub fn hidden_layers(&self) -> Vec<usize> {
        let n = self.layers.len();
        self.layers
            .iter()
            .take(n.saturating_sub(1))
            .map(|l| l.weights.ncols())
            .collect()
    }

    /// Checks that layer shapes chain together and every parameter is finite.
    pub fn validate(&self) -> Result<(), ClassifierError> {
        if self.layers.is_empty() {
            return Err(ClassifierError::ModelError("Model has no layers".into()));
        }
        for (i, layer) in self.layers.iter().enumerate() {
            if layer.weights.ncols() != layer.bias.len() {
                return Err(ClassifierError::ModelError(format!(
                    "Layer {} has {} outputs but {} biases",
                    i + 1,
                    layer.weights.ncols(),
                    layer.bias.len()
                )));
            }
            if layer.weights.iter().chain(layer.bias.iter()).any(|v| !v.is_finite()) {
                return Err(ClassifierError::ModelError(format!(
                    "Layer {} contains non-finite parameters",
                    i + 1
                )));
            }
        }
        for (i, pair) in self.layers.windows(2).enumerate() {
            if pair[0].weights.ncols() != pair[1].weights.nrows() {
                return Err(ClassifierError::ModelError(format!(
                    "Layer {} outputs {} values but layer {} expects {}",
                    i + 1,
                    pair[0].weights.ncols(),
                    i + 2,
                    pair[1].weights.nrows()
                )));
            }
        }
        Ok(())
    }

    /// Class probabilities for each row of `batch`.
    pub fn forward(&self, batch: ArrayView2<f64>) -> Array2<f64> {
        let last = self.layers.len() - 1;
        let mut current = batch.to_owned();
        for (i, layer) in self.layers.iter().enumerate() {
            let z = current.dot(&layer.weights) + &layer.bias;
            current = if i == last { softmax_rows(&z) } else { z.mapv(relu) };
        }
        current
    }

    pub(crate) fn forward_trace(&self, batch: ArrayView2<f64>) -> ForwardTrace {
        let last = self.layers.len() - 1;
        let mut activations = Vec::with_capacity(self.layers.len() + 1);
        let mut pre_activations = Vec::with_capacity(self.layers.len());
        activations.push(batch.to_owned());

        for (i, layer) in self.layers.iter().enumerate() {
            let z = activations[i].dot(&layer.weights) + &layer.bias;
            let a = if i == last { softmax_rows(&z) } else { z.mapv(relu) };
            pre_activations.push(z);
            activations.push(a);
        }

        ForwardTrace {
            activations,
            pre_activations,
        }
    }

    /// Backpropagates mean cross-entropy against one-hot `targets`.
    ///
    /// Softmax and cross-entropy combine so the output delta is `(p - y) / n`.
    pub(crate) fn backward(&self, trace: &ForwardTrace, targets: &Array2<f64>) -> Vec<LayerGrad> {
        let n = targets.nrows().max(1) as f64;
        let mut delta = (trace.output() - targets) / n;
        let mut grads = Vec::with_capacity(self.layers.len());

        for l in (0..self.layers.len()).rev() {
            let weights = trace.activations[l].t().dot(&delta);
            let bias = column_sums(&delta);
            if l > 0 {
                let mut upstream = delta.dot(&self.layers[l].weights.t());
                upstream.zip_mut_with(&trace.pre_activations[l - 1], |d, &z| {
                    if z <= 0.0 {
                        *d = 0.0;
                    }
                });
                delta = upstream;
            }
            grads.push(LayerGrad { weights, bias });
        }

        grads.reverse();
        grads
    }
}

fn relu(v: f64) -> f64 {
    v.max(0.0)
}

impl PostureModel for Mlp {
    fn num_features(&self) -> usize {
        self.input_size()
    }

    fn num_classes(&self) -> usize {
        self.output_size()
    }

    fn predict_proba(&self, features: ArrayView1<f64>) -> Result<Array1<f64>, ClassifierError> {
        if self.layers.is_empty() {
            return Err(ClassifierError::ModelError("Model has no layers".into()));
        }
        if features.len() != self.input_size() {
            return Err(ClassifierError::ValidationError(format!(
                "Expected {} features, got {}",
                self.input_size(),
                features.len()
            )));
        }
        let probabilities = self.forward(features.insert_axis(Axis(0)));
        Ok(probabilities.row(0).to_owned())
    }
}
