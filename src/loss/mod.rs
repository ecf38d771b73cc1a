//! Loss functions used by the learner.

pub mod functions;

pub use functions::{Loss, MSE, l2_penalty, L2_COEFFICIENT};
