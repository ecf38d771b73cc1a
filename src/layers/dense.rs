use ndarray::{Array1, Array2, ArrayView2, Axis};
use rand::Rng;
use serde::{Serialize, Deserialize};
use crate::activations::Activation;
use crate::error::{DuelError, Result};
use super::initialization::{fan_in_uniform_biases, fan_in_uniform_weights};
use super::traits::{Layer as LayerTrait, LayerGradients};

/// A fully connected (dense) layer in a neural network
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct DenseLayer {
    pub weights: Array2<f32>,
    pub biases: Array1<f32>,
    pub activation: Activation,
    #[serde(skip)]
    pre_activation_output: Option<Array2<f32>>,
    #[serde(skip)]
    inputs: Option<Array2<f32>>,
}

impl DenseLayer {
    /// Create a new dense layer whose weights and biases are drawn uniformly from
    /// `±1/sqrt(input_size)` using `rng`.
    pub fn with_rng<R: Rng + ?Sized>(
        input_size: usize,
        output_size: usize,
        activation: Activation,
        rng: &mut R,
    ) -> Self {
        DenseLayer {
            weights: fan_in_uniform_weights((input_size, output_size), rng),
            biases: fan_in_uniform_biases(input_size, output_size, rng),
            activation,
            pre_activation_output: None,
            inputs: None,
        }
    }

    /// Overwrite this layer's parameters with a copy of another layer's
    pub fn copy_parameters_from(&mut self, other: &DenseLayer) -> Result<()> {
        if self.weights.dim() != other.weights.dim() {
            return Err(DuelError::dimension_mismatch(
                format!("{:?}", self.weights.dim()),
                format!("{:?}", other.weights.dim()),
            ));
        }
        self.weights.assign(&other.weights);
        self.biases.assign(&other.biases);
        Ok(())
    }

    /// Sum of squares over weights and biases
    pub fn sum_squared_parameters(&self) -> f32 {
        self.weights.iter().map(|w| w * w).sum::<f32>() + self.biases.iter().map(|b| b * b).sum::<f32>()
    }

    fn check_inputs(&self, inputs: &ArrayView2<f32>) -> Result<()> {
        if inputs.ncols() != self.input_size() {
            return Err(DuelError::dimension_mismatch(
                format!("{} input features", self.input_size()),
                format!("{} input features", inputs.ncols()),
            ));
        }
        Ok(())
    }

    fn affine(&self, inputs: ArrayView2<f32>) -> Array2<f32> {
        inputs.dot(&self.weights) + &self.biases
    }
}

impl LayerTrait for DenseLayer {
    fn forward_batch(&mut self, inputs: ArrayView2<f32>) -> Result<Array2<f32>> {
        self.check_inputs(&inputs)?;
        let mut outputs = self.affine(inputs);
        self.inputs = Some(inputs.to_owned());
        self.pre_activation_output = Some(outputs.clone());
        self.activation.apply_batch(&mut outputs);
        Ok(outputs)
    }

    fn infer_batch(&self, inputs: ArrayView2<f32>) -> Result<Array2<f32>> {
        self.check_inputs(&inputs)?;
        let mut outputs = self.affine(inputs);
        self.activation.apply_batch(&mut outputs);
        Ok(outputs)
    }

    fn backward_batch(&self, output_errors: ArrayView2<f32>) -> Result<LayerGradients> {
        let pre_activation_output = self.pre_activation_output.as_ref()
            .ok_or_else(|| DuelError::Training("forward_batch() must be called before backward_batch()".to_string()))?;
        let inputs = self.inputs.as_ref()
            .ok_or_else(|| DuelError::Training("forward_batch() must be called before backward_batch()".to_string()))?;
        if output_errors.dim() != pre_activation_output.dim() {
            return Err(DuelError::dimension_mismatch(
                format!("{:?}", pre_activation_output.dim()),
                format!("{:?}", output_errors.dim()),
            ));
        }

        let activation_deriv = self.activation.derivative_batch(pre_activation_output.view());
        let adjusted_error = &output_errors * &activation_deriv;

        Ok(LayerGradients {
            input_error: adjusted_error.dot(&self.weights.t()),
            weights: inputs.t().dot(&adjusted_error),
            biases: adjusted_error.sum_axis(Axis(0)),
        })
    }

    fn output_size(&self) -> usize {
        self.weights.shape()[1]
    }

    fn input_size(&self) -> usize {
        self.weights.shape()[0]
    }
}
