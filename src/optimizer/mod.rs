use ndarray::{Array, Array1, Array2, Dimension, Zip};
use serde::{Serialize, Deserialize};
use crate::config::OptimizerKind;
use crate::layers::DenseLayer;

/// A parameter-update rule.
///
/// Parameters are addressed by `slot`, the index of the layer they belong to, so stateful
/// optimizers keep one set of moments per layer. `begin_step` is called once before the
/// layers of a network are updated for a single training step.
pub trait Optimizer {
    fn begin_step(&mut self) {}
    fn update_weights(&mut self, slot: usize, weights: &mut Array2<f32>, gradients: &Array2<f32>, learning_rate: f32);
    fn update_biases(&mut self, slot: usize, biases: &mut Array1<f32>, gradients: &Array1<f32>, learning_rate: f32);
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub enum OptimizerWrapper {
    SGD(SGD),
    Adam(Adam),
}

impl OptimizerWrapper {
    /// Fresh optimizer state for the given layers
    pub fn new(kind: OptimizerKind, layers: &[&DenseLayer]) -> Self {
        match kind {
            OptimizerKind::Adam => OptimizerWrapper::Adam(Adam::default(layers)),
            OptimizerKind::Sgd => OptimizerWrapper::SGD(SGD::new()),
        }
    }
}

impl Optimizer for OptimizerWrapper {
    fn begin_step(&mut self) {
        match self {
            OptimizerWrapper::SGD(optimizer) => optimizer.begin_step(),
            OptimizerWrapper::Adam(optimizer) => optimizer.begin_step(),
        }
    }

    fn update_weights(&mut self, slot: usize, weights: &mut Array2<f32>, gradients: &Array2<f32>, learning_rate: f32) {
        match self {
            OptimizerWrapper::SGD(optimizer) => optimizer.update_weights(slot, weights, gradients, learning_rate),
            OptimizerWrapper::Adam(optimizer) => optimizer.update_weights(slot, weights, gradients, learning_rate),
        }
    }

    fn update_biases(&mut self, slot: usize, biases: &mut Array1<f32>, gradients: &Array1<f32>, learning_rate: f32) {
        match self {
            OptimizerWrapper::SGD(optimizer) => optimizer.update_biases(slot, biases, gradients, learning_rate),
            OptimizerWrapper::Adam(optimizer) => optimizer.update_biases(slot, biases, gradients, learning_rate),
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct SGD;

impl SGD {
    pub fn new() -> SGD {
        SGD
    }
}

impl Default for SGD {
    fn default() -> Self {
        Self::new()
    }
}

impl Optimizer for SGD {
    fn update_weights(&mut self, _slot: usize, weights: &mut Array2<f32>, gradients: &Array2<f32>, learning_rate: f32) {
        weights.scaled_add(-learning_rate, gradients);
    }

    fn update_biases(&mut self, _slot: usize, biases: &mut Array1<f32>, gradients: &Array1<f32>, learning_rate: f32) {
        biases.scaled_add(-learning_rate, gradients);
    }
}

/// Adam with bias-corrected first and second moments, one moment pair per layer slot
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct Adam {
    pub beta1: f32,
    pub beta2: f32,
    pub epsilon: f32,
    m_weights: Vec<Array2<f32>>,
    v_weights: Vec<Array2<f32>>,
    m_biases: Vec<Array1<f32>>,
    v_biases: Vec<Array1<f32>>,
    pub t: i32,
}

impl Adam {
    pub fn new(layers: &[&DenseLayer], beta1: f32, beta2: f32, epsilon: f32) -> Self {
        Adam {
            beta1,
            beta2,
            epsilon,
            m_weights: layers.iter().map(|layer| Array2::zeros(layer.weights.dim())).collect(),
            v_weights: layers.iter().map(|layer| Array2::zeros(layer.weights.dim())).collect(),
            m_biases: layers.iter().map(|layer| Array1::zeros(layer.biases.dim())).collect(),
            v_biases: layers.iter().map(|layer| Array1::zeros(layer.biases.dim())).collect(),
            t: 0,
        }
    }

    /// Adam with the usual `beta1 = 0.9`, `beta2 = 0.999`, `epsilon = 1e-8`
    pub fn default(layers: &[&DenseLayer]) -> Self {
        Self::new(layers, 0.9, 0.999, 1e-8)
    }

    fn moments(&self) -> AdamStep {
        // A step that was never announced through begin_step still gets bias correction for t = 1.
        let t = self.t.max(1);
        AdamStep {
            beta1: self.beta1,
            beta2: self.beta2,
            epsilon: self.epsilon,
            correction1: 1.0 - self.beta1.powi(t),
            correction2: 1.0 - self.beta2.powi(t),
        }
    }
}

impl Optimizer for Adam {
    fn begin_step(&mut self) {
        self.t += 1;
    }

    fn update_weights(&mut self, slot: usize, weights: &mut Array2<f32>, gradients: &Array2<f32>, learning_rate: f32) {
        let step = self.moments();
        step.apply(weights, gradients, &mut self.m_weights[slot], &mut self.v_weights[slot], learning_rate);
    }

    fn update_biases(&mut self, slot: usize, biases: &mut Array1<f32>, gradients: &Array1<f32>, learning_rate: f32) {
        let step = self.moments();
        step.apply(biases, gradients, &mut self.m_biases[slot], &mut self.v_biases[slot], learning_rate);
    }
}

struct AdamStep {
    beta1: f32,
    beta2: f32,
    epsilon: f32,
    correction1: f32,
    correction2: f32,
}

impl AdamStep {
    fn apply<D: Dimension>(
        &self,
        param: &mut Array<f32, D>,
        gradients: &Array<f32, D>,
        m: &mut Array<f32, D>,
        v: &mut Array<f32, D>,
        learning_rate: f32,
    ) {
        Zip::from(param)
            .and(gradients)
            .and(m)
            .and(v)
            .for_each(|p, &g, m, v| {
                *m = self.beta1 * *m + (1.0 - self.beta1) * g;
                *v = self.beta2 * *v + (1.0 - self.beta2) * g * g;
                let m_hat = *m / self.correction1;
                let v_hat = *v / self.correction2;
                *p -= learning_rate * m_hat / (v_hat.sqrt() + self.epsilon);
            });
    }
}
