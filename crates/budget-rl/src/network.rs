//! Feed-forward Q-value approximator and its Adam optimizer
//!
//! The network maps an observation to one value per action. Hidden layers
//! use ReLU, the output layer is linear.

use ndarray::{Array, Array1, Array2, Axis, Dimension, Zip};
use rand::Rng;
use serde::{Deserialize, Serialize};

use budget_core::{BudgetError, Result};

/// One fully connected layer, `y = x · W + b`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DenseLayer {
    /// Shape `(inputs, outputs)`
    pub weights: Array2<f64>,
    pub bias: Array1<f64>,
}

impl DenseLayer {
    fn new<R: Rng + ?Sized>(inputs: usize, outputs: usize, rng: &mut R) -> Self {
        let bound = 1.0 / (inputs.max(1) as f64).sqrt();
        let weights = Array2::from_shape_fn((inputs, outputs), |_| rng.gen_range(-bound..bound));
        let bias = Array1::from_shape_fn(outputs, |_| rng.gen_range(-bound..bound));
        Self { weights, bias }
    }

    pub fn inputs(&self) -> usize {
        self.weights.nrows()
    }

    pub fn outputs(&self) -> usize {
        self.weights.ncols()
    }
}

/// Per-layer gradients of the loss
#[derive(Debug, Clone)]
pub struct LayerGradient {
    pub weights: Array2<f64>,
    pub bias: Array1<f64>,
}

/// Multi-layer perceptron producing one Q-value per action
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QNetwork {
    layers: Vec<DenseLayer>,
}

impl QNetwork {
    /// Build a randomly initialised network
    pub fn new<R: Rng + ?Sized>(
        input_dim: usize,
        hidden_sizes: &[usize],
        output_dim: usize,
        rng: &mut R,
    ) -> Self {
        let mut dims = Vec::with_capacity(hidden_sizes.len() + 2);
        dims.push(input_dim);
        dims.extend_from_slice(hidden_sizes);
        dims.push(output_dim);

        let layers = dims
            .windows(2)
            .map(|pair| DenseLayer::new(pair[0], pair[1], rng))
            .collect();

        Self { layers }
    }

    pub fn input_dim(&self) -> usize {
        self.layers.first().map_or(0, DenseLayer::inputs)
    }

    pub fn output_dim(&self) -> usize {
        self.layers.last().map_or(0, DenseLayer::outputs)
    }

    pub fn layers(&self) -> &[DenseLayer] {
        &self.layers
    }

    /// Check layer shapes chain together and match the expected dimensions
    pub fn validate(&self, input_dim: usize, output_dim: usize) -> Result<()> {
        if self.layers.is_empty() {
            return Err(BudgetError::CheckpointLoad("network has no layers".into()));
        }
        if self.input_dim() != input_dim || self.output_dim() != output_dim {
            return Err(BudgetError::CheckpointLoad(format!(
                "network maps {} -> {}, expected {input_dim} -> {output_dim}",
                self.input_dim(),
                self.output_dim()
            )));
        }
        for (i, layer) in self.layers.iter().enumerate() {
            if layer.bias.len() != layer.outputs() {
                return Err(BudgetError::CheckpointLoad(format!(
                    "layer {i} bias has {} entries for {} outputs",
                    layer.bias.len(),
                    layer.outputs()
                )));
            }
            if let Some(next) = self.layers.get(i + 1) {
                if next.inputs() != layer.outputs() {
                    return Err(BudgetError::CheckpointLoad(format!(
                        "layer {} expects {} inputs but layer {i} produces {}",
                        i + 1,
                        next.inputs(),
                        layer.outputs()
                    )));
                }
            }
            let finite = layer.weights.iter().chain(layer.bias.iter()).all(|v| v.is_finite());
            if !finite {
                return Err(BudgetError::CheckpointLoad(format!(
                    "layer {i} contains non-finite parameters"
                )));
            }
        }
        Ok(())
    }

    /// Q-values for a single input
    pub fn predict(&self, input: &[f64]) -> Array1<f64> {
        let mut activation = Array1::from(input.to_vec());
        let last = self.layers.len().saturating_sub(1);
        for (i, layer) in self.layers.iter().enumerate() {
            let z = activation.dot(&layer.weights) + &layer.bias;
            activation = if i == last { z } else { relu(z) };
        }
        activation
    }

    /// Q-values for a batch, one row per input
    pub fn predict_batch(&self, inputs: &Array2<f64>) -> Array2<f64> {
        let mut activation = inputs.to_owned();
        let last = self.layers.len().saturating_sub(1);
        for (i, layer) in self.layers.iter().enumerate() {
            let z = activation.dot(&layer.weights) + &layer.bias;
            activation = if i == last { z } else { relu(z) };
        }
        activation
    }

    /// Mean squared error between the value of each taken action and its
    /// target, with gradients for every layer.
    pub fn mse_gradients(
        &self,
        inputs: &Array2<f64>,
        actions: &[usize],
        targets: &[f64],
    ) -> (f64, Vec<LayerGradient>) {
        let batch = inputs.nrows();
        let last = self.layers.len() - 1;

        // activations[i] is the input to layer i; pre_activations[i] its output before ReLU
        let mut activations = Vec::with_capacity(self.layers.len() + 1);
        let mut pre_activations = Vec::with_capacity(self.layers.len());
        activations.push(inputs.to_owned());
        for (i, layer) in self.layers.iter().enumerate() {
            let z = activations[i].dot(&layer.weights) + &layer.bias;
            let a = if i == last { z.clone() } else { relu(z.clone()) };
            pre_activations.push(z);
            activations.push(a);
        }

        let outputs = &activations[self.layers.len()];
        let mut delta = Array2::<f64>::zeros(outputs.raw_dim());
        let mut loss = 0.0;
        for (row, (&action, &target)) in actions.iter().zip(targets).enumerate() {
            let error = outputs[[row, action]] - target;
            loss += error * error;
            delta[[row, action]] = 2.0 * error / batch as f64;
        }
        loss /= batch as f64;

        let mut gradients = Vec::with_capacity(self.layers.len());
        for i in (0..self.layers.len()).rev() {
            let weights = activations[i].t().dot(&delta);
            let bias = delta.sum_axis(Axis(0));
            gradients.push(LayerGradient { weights, bias });

            if i > 0 {
                let mut upstream = delta.dot(&self.layers[i].weights.t());
                Zip::from(&mut upstream)
                    .and(&pre_activations[i - 1])
                    .for_each(|d, &z| {
                        if z <= 0.0 {
                            *d = 0.0;
                        }
                    });
                delta = upstream;
            }
        }
        gradients.reverse();

        (loss, gradients)
    }
}

fn relu<D: Dimension>(mut z: Array<f64, D>) -> Array<f64, D> {
    z.mapv_inplace(|v| v.max(0.0));
    z
}

/// Index of the largest value; the first one wins on ties
pub fn argmax(values: &[f64]) -> usize {
    let mut best = 0;
    for (i, v) in values.iter().enumerate() {
        if *v > values[best] {
            best = i;
        }
    }
    best
}

/// First and second moment estimates for one layer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerMoments {
    pub m_weights: Array2<f64>,
    pub v_weights: Array2<f64>,
    pub m_bias: Array1<f64>,
    pub v_bias: Array1<f64>,
}

/// Adam optimizer state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdamOptimizer {
    pub learning_rate: f64,
    pub beta1: f64,
    pub beta2: f64,
    pub epsilon: f64,
    pub step: u64,
    moments: Vec<LayerMoments>,
}

impl AdamOptimizer {
    pub fn new(network: &QNetwork, learning_rate: f64) -> Self {
        let moments = network
            .layers
            .iter()
            .map(|layer| LayerMoments {
                m_weights: Array2::zeros(layer.weights.raw_dim()),
                v_weights: Array2::zeros(layer.weights.raw_dim()),
                m_bias: Array1::zeros(layer.bias.raw_dim()),
                v_bias: Array1::zeros(layer.bias.raw_dim()),
            })
            .collect();

        Self {
            learning_rate,
            beta1: 0.9,
            beta2: 0.999,
            epsilon: 1e-8,
            step: 0,
            moments,
        }
    }

    /// True when the moment shapes line up with the network's parameters
    pub fn matches(&self, network: &QNetwork) -> bool {
        self.moments.len() == network.layers.len()
            && self
                .moments
                .iter()
                .zip(&network.layers)
                .all(|(m, layer)| {
                    m.m_weights.dim() == layer.weights.dim()
                        && m.v_weights.dim() == layer.weights.dim()
                        && m.m_bias.len() == layer.bias.len()
                        && m.v_bias.len() == layer.bias.len()
                })
    }

    /// Apply one update to `network`
    pub fn step(&mut self, network: &mut QNetwork, gradients: &[LayerGradient]) {
        self.step += 1;
        let t = self.step as i32;
        let hyper = AdamStep {
            lr: self.learning_rate,
            beta1: self.beta1,
            beta2: self.beta2,
            epsilon: self.epsilon,
            correction1: 1.0 - self.beta1.powi(t),
            correction2: 1.0 - self.beta2.powi(t),
        };

        for ((layer, moments), grad) in network
            .layers
            .iter_mut()
            .zip(self.moments.iter_mut())
            .zip(gradients)
        {
            hyper.apply(
                &mut layer.weights,
                &mut moments.m_weights,
                &mut moments.v_weights,
                &grad.weights,
            );
            hyper.apply(
                &mut layer.bias,
                &mut moments.m_bias,
                &mut moments.v_bias,
                &grad.bias,
            );
        }
    }
}

struct AdamStep {
    lr: f64,
    beta1: f64,
    beta2: f64,
    epsilon: f64,
    correction1: f64,
    correction2: f64,
}

impl AdamStep {
    fn apply<D: Dimension>(
        &self,
        param: &mut Array<f64, D>,
        m: &mut Array<f64, D>,
        v: &mut Array<f64, D>,
        grad: &Array<f64, D>,
    ) {
        Zip::from(param)
            .and(m)
            .and(v)
            .and(grad)
            .for_each(|p, m, v, &g| {
                *m = self.beta1 * *m + (1.0 - self.beta1) * g;
                *v = self.beta2 * *v + (1.0 - self.beta2) * g * g;
                let m_hat = *m / self.correction1;
                let v_hat = *v / self.correction2;
                *p -= self.lr * m_hat / (v_hat.sqrt() + self.epsilon);
            });
    }
}
