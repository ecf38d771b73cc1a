pub mod traits;
pub mod dense;
pub mod initialization;

pub use traits::{Layer as LayerTrait, LayerGradients};
pub use dense::DenseLayer;
