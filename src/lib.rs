//! NOx emission forecasting for power-plant operational data
//!
//! The crate turns a plant's daily stack measurements and monthly regulatory
//! reports into:
//! - a multi-day NOx forecast from a windowed autoregressive model
//! - a random-forest regressor over merged monthly features, with limit
//!   alerts, explanations and what-if simulation
//!
//! Every stage in `pipeline` reads and writes files named in `config::Config`
//! and is exposed as a subcommand of the `nox-forecast` binary.

pub mod analysis;
pub mod config;
pub mod domain;
pub mod forecast;
pub mod ingest;
pub mod ml;
pub mod pipeline;
pub mod telemetry;
