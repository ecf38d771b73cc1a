//! # Activation Functions Module
//!
//! Activations used by the value estimator. The hidden trunk uses ReLU; the
//! value and advantage heads are linear so that the dueling combination sees
//! unbounded scores.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use duelq::activations::Activation;
//! use ndarray::array;
//!
//! let mut data = array![[1.0, -0.5, 0.0, 2.0]];
//! Activation::Relu.apply_batch(&mut data);
//! ```

pub mod functions;

pub use functions::Activation;
