//! Analyses run on top of the data and the fitted regressor
//!
//! - `alert`: regulation-limit checks on predictions
//! - `explain`: permutation importance and per-sample attribution
//! - `simulate`: what-if variation of one input
//! - `stats`: descriptive statistics of the daily export

pub mod alert;
pub mod explain;
pub mod simulate;
pub mod stats;

pub use alert::*;
pub use explain::*;
pub use simulate::*;
pub use stats::*;
