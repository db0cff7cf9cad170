//! Engine outputs: per-metric distributions, sensitivity rankings,
//! stress deltas and the deterministic point estimate.

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

/// Direction of an empirical CDF evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Comparison {
    Below,
    Above,
}

/// One empirical CDF evaluation: `P(metric <cmp> threshold)` over valid
/// trials.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ThresholdProbability {
    pub threshold: f64,
    pub comparison: Comparison,
    pub probability: f64,
}

/// A fixed-bin histogram spanning `[min, max]` of the valid trials.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HistogramBin {
    pub lower: f64,
    pub upper: f64,
    pub count: usize,
}

/// Empirical outcome distribution of one target metric.
///
/// Invariants: `min <= p10 <= p25 <= median <= p75 <= p90 <= max`, and
/// histogram counts sum to the number of valid trials.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricDistribution {
    pub mean: f64,
    pub median: f64,
    /// Population standard deviation over valid trials.
    pub std_dev: f64,
    pub min: f64,
    pub max: f64,
    /// `(percentile in 0-1, value)` pairs; always 0.10, 0.25, 0.75, 0.90.
    pub percentiles: Vec<(f64, f64)>,
    pub histogram: Vec<HistogramBin>,
    pub threshold_probabilities: Vec<ThresholdProbability>,
}

impl MetricDistribution {
    /// Value at a stored percentile, if present.
    #[must_use]
    pub fn percentile(&self, p: f64) -> Option<f64> {
        self.percentiles
            .iter()
            .find(|(stored, _)| (stored - p).abs() < 1e-9)
            .map(|(_, v)| *v)
    }

    /// Probability from the stored CDF evaluations, if present.
    #[must_use]
    pub fn probability(&self, threshold: f64, comparison: Comparison) -> Option<f64> {
        self.threshold_probabilities
            .iter()
            .find(|t| t.comparison == comparison && (t.threshold - threshold).abs() < 1e-9)
            .map(|t| t.probability)
    }
}

/// Value-at-Risk entries for one metric: `(confidence, loss magnitude)`.
pub type ValueAtRisk = Vec<(f64, f64)>;

/// Aggregated Monte Carlo output across all target metrics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonteCarloSummary {
    pub metrics: FxHashMap<String, MetricDistribution>,
    /// Metric -> `(confidence, VaR)` pairs. Losses are measured against
    /// the baseline value; magnitudes are floored at zero.
    pub value_at_risk: FxHashMap<String, ValueAtRisk>,
    /// Metric -> fraction of trials beyond the configured number of
    /// standard deviations from the mean.
    pub tail_event_probabilities: FxHashMap<String, f64>,
    /// Trials requested.
    pub num_trials: usize,
    /// Trials that completed (in a cancelled run, fewer than requested).
    pub completed_trials: usize,
    /// Trials excluded from aggregation.
    pub failed_trials: usize,
    /// Failure rate crossed the degraded threshold.
    pub degraded: bool,
    /// Run was cancelled; aggregation covers completed trials only.
    pub partial: bool,
    pub seed: u64,
}

impl MonteCarloSummary {
    #[must_use]
    pub fn failure_rate(&self) -> f64 {
        if self.completed_trials == 0 {
            0.0
        } else {
            self.failed_trials as f64 / self.completed_trials as f64
        }
    }
}

/// Influence of one parameter on the target metric across its sweep.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterSensitivity {
    pub parameter: String,
    /// Smallest metric deviation from the base projection over the sweep.
    pub min_impact: f64,
    /// Largest metric deviation from the base projection over the sweep.
    pub max_impact: f64,
}

impl ParameterSensitivity {
    /// Spread of impacts; always non-negative.
    #[must_use]
    pub fn range(&self) -> f64 {
        self.max_impact - self.min_impact
    }
}

/// Tornado series for one parameter: swept values and the metric impact
/// at each point.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TornadoSeries {
    pub parameter_values: Vec<f64>,
    pub impact_values: Vec<f64>,
}

/// Pairwise interaction: how far the joint effect of moving two
/// parameters together deviates from the sum of their individual
/// effects. Magnitude is the mean absolute deviation across steps; the
/// sign follows the mean signed deviation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterCrossEffect {
    pub parameter_a: String,
    pub parameter_b: String,
    pub interaction_strength: f64,
}

/// Full sensitivity engine output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensitivityReport {
    /// Ranked by `range` descending; ties keep declaration order.
    pub sensitivities: Vec<ParameterSensitivity>,
    pub charts: FxHashMap<String, TornadoSeries>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cross_effects: Option<Vec<ParameterCrossEffect>>,
    /// Sweep steps that failed projection, excluded from the series.
    pub failed_steps: usize,
}

/// Result of one stress template: a single deterministic projection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StressTestOutcome {
    pub template: String,
    /// Metric -> projected value under the template.
    pub metric_values: FxHashMap<String, f64>,
    /// Metric -> projected value minus baseline value.
    pub metric_deltas: FxHashMap<String, f64>,
}

/// Deterministic point estimate: the scenario applied once, no sampling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioOutcome {
    pub projected: super::MetricSnapshot,
    /// Metric -> projected value minus baseline value.
    pub deltas: FxHashMap<String, f64>,
}
