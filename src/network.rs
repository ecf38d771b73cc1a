use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis};
use rand::Rng;
use serde::{Serialize, Deserialize};
use std::fs;
use std::path::Path;
use bincode::{serialize, deserialize};

use crate::activations::Activation;
use crate::error::{DuelError, Result};
use crate::layers::{DenseLayer, LayerTrait};

/// Gradients for every layer of a [`DuelingNetwork`], in [`DuelingNetwork::layers`] order
#[derive(Debug, Clone)]
pub struct NetworkGradients {
    pub layers: Vec<(Array2<f32>, Array1<f32>)>,
}

impl NetworkGradients {
    /// Add the gradient of `coefficient * Σ p²`, i.e. `2 * coefficient * p`, for every parameter
    pub fn add_l2(&mut self, network: &DuelingNetwork, coefficient: f32) {
        for ((weight_grads, bias_grads), layer) in self.layers.iter_mut().zip(network.layers()) {
            weight_grads.scaled_add(2.0 * coefficient, &layer.weights);
            bias_grads.scaled_add(2.0 * coefficient, &layer.biases);
        }
    }
}

/// A dueling Q-network.
///
/// Two ReLU layers build a shared representation of the state. A linear advantage head scores
/// every action and a linear value head scores the state; the Q-values are
/// `value + advantage[a] - mean(advantage)`. Centering the advantages pins down the split between
/// the two heads, so any change to the value head moves all Q-values by the same amount.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct DuelingNetwork {
    pub fc1: DenseLayer,
    pub fc2: DenseLayer,
    pub advantage: DenseLayer,
    pub value: DenseLayer,
}

impl DuelingNetwork {
    /// Create a new dueling network with freshly initialized parameters.
    pub fn new(n_states: usize, n_hidden1: usize, n_hidden2: usize, n_actions: usize) -> Self {
        Self::with_rng(n_states, n_hidden1, n_hidden2, n_actions, &mut rand::thread_rng())
    }

    /// Create a new dueling network drawing its initial parameters from `rng`.
    pub fn with_rng<R: Rng + ?Sized>(
        n_states: usize,
        n_hidden1: usize,
        n_hidden2: usize,
        n_actions: usize,
        rng: &mut R,
    ) -> Self {
        DuelingNetwork {
            fc1: DenseLayer::with_rng(n_states, n_hidden1, Activation::Relu, rng),
            fc2: DenseLayer::with_rng(n_hidden1, n_hidden2, Activation::Relu, rng),
            advantage: DenseLayer::with_rng(n_hidden2, n_actions, Activation::Linear, rng),
            value: DenseLayer::with_rng(n_hidden2, 1, Activation::Linear, rng),
        }
    }

    pub fn n_states(&self) -> usize {
        self.fc1.input_size()
    }

    pub fn n_actions(&self) -> usize {
        self.advantage.output_size()
    }

    /// The layers in a fixed order: trunk, then advantage head, then value head.
    pub fn layers(&self) -> [&DenseLayer; 4] {
        [&self.fc1, &self.fc2, &self.advantage, &self.value]
    }

    pub fn layers_mut(&mut self) -> [&mut DenseLayer; 4] {
        [&mut self.fc1, &mut self.fc2, &mut self.advantage, &mut self.value]
    }

    /// Q-values for a single state.
    pub fn evaluate(&self, state: ArrayView1<f32>) -> Result<Array1<f32>> {
        let q_values = self.evaluate_batch(state.insert_axis(Axis(0)))?;
        Ok(q_values.row(0).to_owned())
    }

    /// Q-values for a batch of states, one row per state.
    pub fn evaluate_batch(&self, states: ArrayView2<f32>) -> Result<Array2<f32>> {
        let hidden = self.fc1.infer_batch(states)?;
        let hidden = self.fc2.infer_batch(hidden.view())?;
        let advantage = self.advantage.infer_batch(hidden.view())?;
        let value = self.value.infer_batch(hidden.view())?;
        combine(value, advantage)
    }

    /// Q-values for a batch of states, keeping every layer's activations for `backward_batch`.
    pub fn forward_batch(&mut self, states: ArrayView2<f32>) -> Result<Array2<f32>> {
        let hidden = self.fc1.forward_batch(states)?;
        let hidden = self.fc2.forward_batch(hidden.view())?;
        let advantage = self.advantage.forward_batch(hidden.view())?;
        let value = self.value.forward_batch(hidden.view())?;
        combine(value, advantage)
    }

    /// Backpropagate `dL/dQ` through the dueling combination and all four layers.
    ///
    /// Must follow a `forward_batch` call on the same inputs.
    pub fn backward_batch(&self, q_errors: ArrayView2<f32>) -> Result<NetworkGradients> {
        if q_errors.ncols() != self.n_actions() {
            return Err(DuelError::dimension_mismatch(
                format!("{} action columns", self.n_actions()),
                format!("{} action columns", q_errors.ncols()),
            ));
        }

        // dQ[a]/dV = 1 for every a; dQ[a]/dA[b] = [a == b] - 1/n
        let value_errors = q_errors.sum_axis(Axis(1)).insert_axis(Axis(1));
        let mean_errors = row_means(q_errors)?;
        let advantage_errors = &q_errors - &mean_errors;

        let value_grads = self.value.backward_batch(value_errors.view())?;
        let advantage_grads = self.advantage.backward_batch(advantage_errors.view())?;
        let hidden_errors = &value_grads.input_error + &advantage_grads.input_error;
        let fc2_grads = self.fc2.backward_batch(hidden_errors.view())?;
        let fc1_grads = self.fc1.backward_batch(fc2_grads.input_error.view())?;

        Ok(NetworkGradients {
            layers: vec![
                (fc1_grads.weights, fc1_grads.biases),
                (fc2_grads.weights, fc2_grads.biases),
                (advantage_grads.weights, advantage_grads.biases),
                (value_grads.weights, value_grads.biases),
            ],
        })
    }

    /// Sum of squares over every weight and bias.
    pub fn sum_squared_parameters(&self) -> f32 {
        self.layers().iter().map(|layer| layer.sum_squared_parameters()).sum()
    }

    /// Overwrite all parameters with a deep copy of `other`'s.
    pub fn clone_parameters_from(&mut self, other: &DuelingNetwork) -> Result<()> {
        for (layer, source) in self.layers_mut().into_iter().zip(other.layers()) {
            layer.copy_parameters_from(source)?;
        }
        Ok(())
    }

    /// Whether both networks hold exactly the same parameter values.
    pub fn same_parameters(&self, other: &DuelingNetwork) -> bool {
        self.layers()
            .iter()
            .zip(other.layers())
            .all(|(a, b)| a.weights == b.weights && a.biases == b.biases)
    }

    /// Save the network's parameters to a file.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let serialized = serialize(self)?;
        fs::write(path, serialized)?;
        Ok(())
    }

    /// Load a network from a file written by [`DuelingNetwork::save`].
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let buffer = fs::read(path)?;
        let deserialized: Self = deserialize(&buffer)?;
        Ok(deserialized)
    }
}

fn row_means(batch: ArrayView2<f32>) -> Result<Array2<f32>> {
    batch
        .mean_axis(Axis(1))
        .map(|means| means.insert_axis(Axis(1)))
        .ok_or_else(|| DuelError::Numerical("cannot average over zero actions".to_string()))
}

fn combine(value: Array2<f32>, advantage: Array2<f32>) -> Result<Array2<f32>> {
    let mean_advantage = row_means(advantage.view())?;
    Ok(&advantage - &mean_advantage + &value)
}
