//! Result aggregator: shapes engine outputs into the response objects.
//!
//! Pure merge code. Every field here is a lookup, a clone, or a move of
//! a number the engines already produced; nothing is recomputed or
//! re-validated on this path.

use crate::api::{
    MetricProbabilities, MonteCarloResponse, ScenarioComparison, SensitivityEntry,
    SensitivityResponse,
};
use crate::model::{
    Comparison, MetricSnapshot, MonteCarloSummary, ScenarioOutcome, SensitivityReport,
    StressTestOutcome,
};

/// Assemble the Monte Carlo response from the simulation summary, the
/// deterministic point estimate, and any stress outcomes.
///
/// The convenience probabilities are projections of the threshold
/// evaluations already stored on each metric distribution; a threshold
/// the run did not evaluate stays absent rather than being re-derived.
#[must_use]
pub fn build_monte_carlo_response(
    scenario_id: String,
    baseline: &MetricSnapshot,
    point: &ScenarioOutcome,
    summary: MonteCarloSummary,
    stress_tests: Vec<StressTestOutcome>,
) -> MonteCarloResponse {
    let probabilities = summary
        .metrics
        .iter()
        .map(|(metric, distribution)| {
            let baseline_value = baseline.get(metric).unwrap_or(0.0);
            let probabilities = MetricProbabilities {
                negative: distribution.probability(0.0, Comparison::Below),
                below_baseline: distribution.probability(baseline_value, Comparison::Below),
                significantly_negative: distribution
                    .probability(baseline_value * 0.8, Comparison::Below),
            };
            (metric.clone(), probabilities)
        })
        .collect();

    let scenario_comparison = Some(ScenarioComparison {
        baseline_values: baseline.values.clone(),
        scenario_values: point.projected.values.clone(),
        deltas: point.deltas.clone(),
    });

    MonteCarloResponse {
        scenario_id,
        metrics: summary.metrics,
        value_at_risk: summary.value_at_risk,
        tail_event_probabilities: summary.tail_event_probabilities,
        probabilities,
        stress_tests,
        scenario_comparison,
        num_trials: summary.num_trials,
        completed_trials: summary.completed_trials,
        failed_trials: summary.failed_trials,
        degraded: summary.degraded,
        partial: summary.partial,
        seed: summary.seed,
    }
}

/// Assemble the sensitivity response; the ranking order of the report is
/// preserved, with each entry carrying its derived spread.
#[must_use]
pub fn build_sensitivity_response(
    scenario_id: String,
    report: SensitivityReport,
) -> SensitivityResponse {
    let sensitivities = report
        .sensitivities
        .iter()
        .map(|s| SensitivityEntry {
            parameter: s.parameter.clone(),
            min_impact: s.min_impact,
            max_impact: s.max_impact,
            range: s.range(),
        })
        .collect();

    SensitivityResponse {
        scenario_id,
        sensitivities,
        parameter_charts: report.charts,
        cross_effects: report.cross_effects,
        failed_steps: report.failed_steps,
    }
}
