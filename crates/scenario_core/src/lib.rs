//! Scenario calculation engine
//!
//! This crate turns a baseline metric snapshot plus a set of scenario
//! assumptions into risk analytics. It supports:
//! - Deterministic projection of assumptions over a baseline (with
//!   cross-metric driver dependencies)
//! - Monte Carlo simulation over declared parameter distributions,
//!   optionally correlated through a Gaussian copula
//! - Per-metric outcome distributions, Value-at-Risk and tail-event
//!   probabilities
//! - Tornado-style sensitivity sweeps with optional pairwise
//!   cross-dependency analysis
//! - Named stress-test templates
//!
//! Runs are reproducible: the same seed yields bit-identical results
//! regardless of how many workers execute the trials.
//!
//! ```ignore
//! use scenario_core::{
//!     Assumption, MetricSnapshot, MonteCarloConfig, run_monte_carlo,
//! };
//!
//! let baseline = MetricSnapshot::new().with_metric("revenue", 100_000.0);
//! let assumptions = vec![Assumption::percentage("growth", "revenue", 0.05)];
//! let summary = run_monte_carlo(
//!     &baseline,
//!     &assumptions,
//!     &distributions,
//!     None,
//!     &["revenue".to_string()],
//!     as_of,
//!     &MonteCarloConfig::default(),
//!     None,
//! )?;
//! ```

#![warn(clippy::all)]

// ============================================================================
// Engine modules
// ============================================================================

pub mod aggregate;
pub mod api;
pub mod error;
pub mod monte_carlo;
pub mod projector;
pub mod sampler;
pub mod sensitivity;
pub mod stress;

// ============================================================================
// Type definition modules
// ============================================================================

pub mod model;

// ============================================================================
// Test modules
// ============================================================================

#[cfg(test)]
mod tests;

// ============================================================================
// Public re-exports for convenience
// ============================================================================

pub use api::{
    BaselineProvider, MonteCarloRequest, MonteCarloResponse, SensitivityRequest,
    SensitivityResponse, run_monte_carlo_request, run_sensitivity_request,
};
pub use error::{Result, RunError, TrialFailure, ValidationError};
pub use model::{
    Assumption, AssumptionKind, CorrelationMatrix, MetricSnapshot, MonteCarloSummary,
    ParameterDistribution, SensitivityReport,
};
pub use monte_carlo::{MonteCarloConfig, RunProgress, run_monte_carlo};
pub use projector::{point_estimate, project};
pub use sensitivity::{SensitivityConfig, analyze_sensitivity};
pub use stress::{StressTemplate, run_stress_tests};
