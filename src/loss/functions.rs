use ndarray::{Array1, ArrayView1};

/// Coefficient of the L2 penalty added to the temporal-difference loss
pub const L2_COEFFICIENT: f32 = 0.001;

/// Trait defining the interface for loss functions
pub trait Loss: Send + Sync {
    /// Compute the loss for a batch of scalar predictions and targets
    fn compute(&self, predictions: ArrayView1<f32>, targets: ArrayView1<f32>) -> f32;

    /// Compute the gradient of the loss with respect to predictions
    fn gradient(&self, predictions: ArrayView1<f32>, targets: ArrayView1<f32>) -> Array1<f32>;
}

/// Mean Squared Error loss, averaged over the batch
pub struct MSE;

impl Loss for MSE {
    fn compute(&self, predictions: ArrayView1<f32>, targets: ArrayView1<f32>) -> f32 {
        let diff = &predictions - &targets;
        diff.mapv(|d| d * d).mean().unwrap_or(0.0)
    }

    fn gradient(&self, predictions: ArrayView1<f32>, targets: ArrayView1<f32>) -> Array1<f32> {
        let n = predictions.len().max(1) as f32;
        (&predictions - &targets) * (2.0 / n)
    }
}

/// `coefficient * Σ p²`, with no normalization by batch or parameter count
pub fn l2_penalty(sum_squared_parameters: f32, coefficient: f32) -> f32 {
    coefficient * sum_squared_parameters
}
