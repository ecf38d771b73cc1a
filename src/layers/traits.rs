use ndarray::{Array1, Array2, ArrayView2};
use crate::error::Result;

/// Gradients produced by one layer's backward pass
#[derive(Debug, Clone)]
pub struct LayerGradients {
    /// Error with respect to the layer's inputs, fed to the previous layer
    pub input_error: Array2<f32>,
    pub weights: Array2<f32>,
    pub biases: Array1<f32>,
}

/// Trait defining the interface for neural network layers
pub trait Layer: Send + Sync {
    /// Forward propagation for a batch, keeping the activations needed by `backward_batch`
    fn forward_batch(&mut self, inputs: ArrayView2<f32>) -> Result<Array2<f32>>;

    /// Forward propagation for a batch without touching any cached state
    fn infer_batch(&self, inputs: ArrayView2<f32>) -> Result<Array2<f32>>;

    /// Backward propagation for a batch of output errors
    fn backward_batch(&self, output_errors: ArrayView2<f32>) -> Result<LayerGradients>;

    /// Get the output size of the layer
    fn output_size(&self) -> usize;

    /// Get the input size of the layer
    fn input_size(&self) -> usize;
}
