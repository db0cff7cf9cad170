//! Integration tests for the scenario calculation engine
//!
//! Tests are organized by topic:
//! - `projector` - deterministic baseline projection and driver chains
//! - `distributions` - distribution validation, quantiles, correlation
//! - `sampler` - draw determinism and the Gaussian copula
//! - `monte_carlo` - full simulation runs and the failure policy
//! - `sensitivity` - tornado sweeps and cross-dependency analysis
//! - `stress` - stress templates
//! - `api` - request shapes, legacy adapters, end-to-end orchestration

mod distributions;
mod projector;
mod sensitivity;
