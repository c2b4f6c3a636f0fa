//! Sequence forecasting core: windowing, the autoregressive loop, the
//! transform pair wrapped around it, and accuracy metrics.

pub mod engine;
pub mod metrics;
pub mod transform;
pub mod window;

pub use engine::*;
pub use metrics::*;
pub use transform::*;
pub use window::*;
