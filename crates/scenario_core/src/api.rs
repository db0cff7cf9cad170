//! External interface of the engine: request/response shapes, bounds
//! validation, the baseline provider trait, and adapters that map the
//! historical API variants onto the one canonical engine.
//!
//! The wire shape for distributions is necessarily loose (optional
//! fields per family); it is converted to the closed
//! `ParameterDistribution` variant immediately on intake, so malformed
//! parameters are rejected before any computation.

use std::collections::BTreeMap;

use jiff::civil::Date;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::aggregate::{build_monte_carlo_response, build_sensitivity_response};
use crate::error::{RunError, ValidationError};
use crate::model::{
    Assumption, CorrelationMatrix, MetricDistribution, MetricSnapshot, ParameterCrossEffect,
    ParameterDistribution, StressTestOutcome, TornadoSeries, ValueAtRisk,
};
use crate::monte_carlo::{MonteCarloConfig, RunProgress, run_monte_carlo};
use crate::projector::point_estimate;
use crate::sensitivity::{SensitivityConfig, analyze_sensitivity};
use crate::stress::{StressTemplate, run_stress_tests};

/// The single call out of the engine: fetch the baseline metric
/// snapshot before any simulation starts.
pub trait BaselineProvider {
    fn get_baseline(
        &self,
        organization_id: &str,
        scenario_id: &str,
    ) -> Result<MetricSnapshot, RunError>;
}

fn default_num_simulations() -> usize {
    1000
}

fn default_seed() -> u64 {
    42
}

fn default_variation_range() -> f64 {
    0.2
}

fn default_steps() -> usize {
    5
}

/// Wire shape of one parameter distribution.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DistributionSpec {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mean: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub std: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub values: Option<Vec<f64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub probabilities: Option<Vec<f64>>,
}

impl DistributionSpec {
    /// Convert to the validated closed variant.
    pub fn resolve(&self, parameter: &str) -> Result<ParameterDistribution, ValidationError> {
        let missing = |reason: &'static str| ValidationError::InvalidDistribution {
            parameter: parameter.to_string(),
            reason,
        };
        match self.kind.as_str() {
            "normal" => ParameterDistribution::normal(
                self.mean.ok_or_else(|| missing("normal requires mean"))?,
                self.std.ok_or_else(|| missing("normal requires std"))?,
            ),
            "uniform" => ParameterDistribution::uniform(
                self.min.ok_or_else(|| missing("uniform requires min"))?,
                self.max.ok_or_else(|| missing("uniform requires max"))?,
            ),
            "triangular" => ParameterDistribution::triangular(
                self.min.ok_or_else(|| missing("triangular requires min"))?,
                self.mode.ok_or_else(|| missing("triangular requires mode"))?,
                self.max.ok_or_else(|| missing("triangular requires max"))?,
            ),
            "lognormal" => ParameterDistribution::log_normal(
                self.mean.ok_or_else(|| missing("lognormal requires mean"))?,
                self.std.ok_or_else(|| missing("lognormal requires std"))?,
            ),
            "custom" => ParameterDistribution::custom(
                self.values
                    .clone()
                    .ok_or_else(|| missing("custom requires values"))?,
                self.probabilities
                    .clone()
                    .ok_or_else(|| missing("custom requires probabilities"))?,
            ),
            _ => Err(missing("unknown distribution type")),
        }
    }
}

/// Canonical Monte Carlo request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonteCarloRequest {
    pub scenario_id: String,
    pub organization_id: String,
    #[serde(default)]
    pub parameter_distributions: BTreeMap<String, DistributionSpec>,
    pub target_metrics: Vec<String>,
    #[serde(default = "default_num_simulations")]
    pub num_simulations: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correlation_matrix: Option<BTreeMap<String, BTreeMap<String, f64>>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stress_test_params: Option<BTreeMap<String, f64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence_intervals: Option<Vec<f64>>,
    /// Not part of the original contract; callers that omit it get a
    /// fixed default so identical requests stay reproducible.
    #[serde(default = "default_seed")]
    pub seed: u64,
}

/// Presentation projections of the stored empirical CDF; absent when the
/// corresponding threshold was not evaluated.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricProbabilities {
    /// `P(metric < 0)`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub negative: Option<f64>,
    /// `P(metric < baseline)`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub below_baseline: Option<f64>,
    /// `P(metric < 0.8 * baseline)`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub significantly_negative: Option<f64>,
}

/// Point-estimate comparison carried alongside the distributions.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScenarioComparison {
    pub baseline_values: FxHashMap<String, f64>,
    pub scenario_values: FxHashMap<String, f64>,
    pub deltas: FxHashMap<String, f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonteCarloResponse {
    pub scenario_id: String,
    pub metrics: FxHashMap<String, MetricDistribution>,
    pub value_at_risk: FxHashMap<String, ValueAtRisk>,
    pub tail_event_probabilities: FxHashMap<String, f64>,
    pub probabilities: FxHashMap<String, MetricProbabilities>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub stress_tests: Vec<StressTestOutcome>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scenario_comparison: Option<ScenarioComparison>,
    pub num_trials: usize,
    pub completed_trials: usize,
    pub failed_trials: usize,
    pub degraded: bool,
    pub partial: bool,
    pub seed: u64,
}

/// Canonical sensitivity request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensitivityRequest {
    pub scenario_id: String,
    pub organization_id: String,
    pub target_metric: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parameters_to_analyze: Option<Vec<String>>,
    #[serde(default = "default_variation_range")]
    pub variation_range: f64,
    #[serde(default = "default_steps")]
    pub steps: usize,
    #[serde(default)]
    pub include_cross_dependencies: bool,
}

impl SensitivityRequest {
    /// Request-level bounds: `variation_range` in `(0.01, 1]` (the
    /// engine itself accepts down to 0).
    pub fn validate(&self) -> Result<(), ValidationError> {
        if !(self.variation_range > 0.01 && self.variation_range <= 1.0) {
            return Err(ValidationError::OutOfBounds {
                field: "variation_range",
                value: self.variation_range,
                min: 0.01,
                max: 1.0,
            });
        }
        Ok(())
    }

    #[must_use]
    pub fn to_config(&self) -> SensitivityConfig {
        SensitivityConfig {
            variation_range: self.variation_range,
            steps: self.steps,
            parameters: self.parameters_to_analyze.clone(),
            include_cross_dependencies: self.include_cross_dependencies,
        }
    }
}

/// `ParameterSensitivity` with its derived spread, as serialized.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensitivityEntry {
    pub parameter: String,
    pub min_impact: f64,
    pub max_impact: f64,
    pub range: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensitivityResponse {
    pub scenario_id: String,
    pub sensitivities: Vec<SensitivityEntry>,
    pub parameter_charts: FxHashMap<String, TornadoSeries>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cross_effects: Option<Vec<ParameterCrossEffect>>,
    pub failed_steps: usize,
}

/// Fetch the baseline and run the full Monte Carlo pipeline for one
/// request: point estimate, simulation, optional stress bundle.
pub fn run_monte_carlo_request<P: BaselineProvider>(
    provider: &P,
    assumptions: &[Assumption],
    request: &MonteCarloRequest,
    as_of: Date,
    progress: Option<&RunProgress>,
) -> Result<MonteCarloResponse, RunError> {
    let baseline = provider.get_baseline(&request.organization_id, &request.scenario_id)?;

    let mut distributions: FxHashMap<String, ParameterDistribution> = FxHashMap::default();
    for (name, spec) in &request.parameter_distributions {
        distributions.insert(name.clone(), spec.resolve(name)?);
    }
    let correlation = request
        .correlation_matrix
        .as_ref()
        .map(CorrelationMatrix::from_nested)
        .transpose()?;

    let mut config = MonteCarloConfig {
        num_trials: request.num_simulations,
        seed: request.seed,
        ..Default::default()
    };
    if let Some(confidences) = &request.confidence_intervals
        && !confidences.is_empty()
    {
        config.var_confidences = confidences.clone();
    }

    let summary = run_monte_carlo(
        &baseline,
        assumptions,
        &distributions,
        correlation.as_ref(),
        &request.target_metrics,
        as_of,
        &config,
        progress,
    )?;

    let point = point_estimate(&baseline, assumptions, as_of)?;

    let stress_tests = match &request.stress_test_params {
        Some(params) => {
            let values: FxHashMap<String, f64> =
                params.iter().map(|(k, v)| (k.clone(), *v)).collect();
            let template = StressTemplate::new("custom", values);
            run_stress_tests(&baseline, assumptions, &[template], as_of)?
        }
        None => Vec::new(),
    };

    Ok(build_monte_carlo_response(
        request.scenario_id.clone(),
        &baseline,
        &point,
        summary,
        stress_tests,
    ))
}

/// Fetch the baseline and run the sensitivity pipeline for one request.
/// Parameter base values come from the scenario's declared assumptions.
pub fn run_sensitivity_request<P: BaselineProvider>(
    provider: &P,
    assumptions: &[Assumption],
    request: &SensitivityRequest,
    as_of: Date,
) -> Result<SensitivityResponse, RunError> {
    request.validate()?;
    let baseline = provider.get_baseline(&request.organization_id, &request.scenario_id)?;

    let base_values: FxHashMap<String, f64> = assumptions
        .iter()
        .map(|a| (a.name.clone(), a.kind.value()))
        .collect();

    let report = analyze_sensitivity(
        &baseline,
        assumptions,
        &base_values,
        &request.target_metric,
        as_of,
        &request.to_config(),
    )?;

    Ok(build_sensitivity_response(
        request.scenario_id.clone(),
        report,
    ))
}

// ---------------------------------------------------------------------
// Historical request shapes
//
// Earlier API generations shipped near-duplicate simulation endpoints
// differing mainly in field naming. They adapt onto the canonical
// request here instead of keeping separate engines.
// ---------------------------------------------------------------------

/// First-generation simulation request (`simulations`, flat parameter
/// bags per distribution).
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct LegacyMonteCarloRequest {
    pub scenario_id: String,
    pub organization_id: String,
    #[serde(default)]
    pub distributions: BTreeMap<String, LegacyDistribution>,
    #[serde(default)]
    pub metrics: Vec<String>,
    #[serde(default = "default_num_simulations")]
    pub simulations: usize,
    #[serde(default)]
    pub correlations: Option<BTreeMap<String, BTreeMap<String, f64>>>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct LegacyDistribution {
    pub distribution_type: String,
    #[serde(default)]
    pub parameters: BTreeMap<String, f64>,
}

impl From<LegacyMonteCarloRequest> for MonteCarloRequest {
    fn from(legacy: LegacyMonteCarloRequest) -> Self {
        let parameter_distributions = legacy
            .distributions
            .into_iter()
            .map(|(name, d)| {
                let get = |key: &str| d.parameters.get(key).copied();
                let spec = DistributionSpec {
                    kind: d.distribution_type,
                    mean: get("mean"),
                    std: get("std").or_else(|| get("std_dev")),
                    min: get("min"),
                    max: get("max"),
                    mode: get("mode"),
                    values: None,
                    probabilities: None,
                };
                (name, spec)
            })
            .collect();

        MonteCarloRequest {
            scenario_id: legacy.scenario_id,
            organization_id: legacy.organization_id,
            parameter_distributions,
            target_metrics: legacy.metrics,
            num_simulations: legacy.simulations,
            correlation_matrix: legacy.correlations,
            stress_test_params: None,
            confidence_intervals: None,
            seed: default_seed(),
        }
    }
}

/// First-generation sensitivity request.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct LegacySensitivityRequest {
    pub scenario_id: String,
    pub organization_id: String,
    pub target: String,
    #[serde(default)]
    pub params: Option<Vec<String>>,
    #[serde(default = "default_variation_range")]
    pub range: f64,
    #[serde(default = "default_steps")]
    pub steps: usize,
}

impl From<LegacySensitivityRequest> for SensitivityRequest {
    fn from(legacy: LegacySensitivityRequest) -> Self {
        SensitivityRequest {
            scenario_id: legacy.scenario_id,
            organization_id: legacy.organization_id,
            target_metric: legacy.target,
            parameters_to_analyze: legacy.params,
            variation_range: legacy.range,
            steps: legacy.steps,
            include_cross_dependencies: false,
        }
    }
}
