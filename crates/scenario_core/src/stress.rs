//! Stress test runner: named extreme parameter combinations, each a
//! single deterministic projector invocation.

use jiff::civil::Date;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::error::RunError;
use crate::model::{Assumption, MetricSnapshot, StressTestOutcome};
use crate::projector::{override_assumptions, project, validate_override_names};

/// A fixed parameter-value bundle. Not sampled; applied as-is.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StressTemplate {
    pub name: String,
    /// Assumption name -> stressed value.
    pub parameter_values: FxHashMap<String, f64>,
}

impl StressTemplate {
    #[must_use]
    pub fn new(name: &str, parameter_values: FxHashMap<String, f64>) -> Self {
        Self {
            name: name.to_string(),
            parameter_values,
        }
    }

    /// Every base value scaled by `factor`.
    #[must_use]
    pub fn scaled(name: &str, base_values: &FxHashMap<String, f64>, factor: f64) -> Self {
        let parameter_values = base_values
            .iter()
            .map(|(parameter, base)| (parameter.clone(), base * factor))
            .collect();
        Self::new(name, parameter_values)
    }

    /// Severe downside: every parameter at half its base effect.
    #[must_use]
    pub fn recession(base_values: &FxHashMap<String, f64>) -> Self {
        Self::scaled("recession", base_values, 0.5)
    }

    /// Mild downside: every parameter at 75% of its base effect.
    #[must_use]
    pub fn growth_stall(base_values: &FxHashMap<String, f64>) -> Self {
        Self::scaled("growth_stall", base_values, 0.75)
    }

    /// Upside: every parameter at 125% of its base effect.
    #[must_use]
    pub fn upside(base_values: &FxHashMap<String, f64>) -> Self {
        Self::scaled("upside", base_values, 1.25)
    }
}

/// Apply each template and report per-metric deltas vs the baseline
/// snapshot. No partial failure handling beyond the projector's own
/// error contract: a template the projector rejects fails the call.
pub fn run_stress_tests(
    baseline: &MetricSnapshot,
    assumptions: &[Assumption],
    templates: &[StressTemplate],
    as_of: Date,
) -> Result<Vec<StressTestOutcome>, RunError> {
    let mut outcomes = Vec::with_capacity(templates.len());

    for template in templates {
        validate_override_names(
            assumptions,
            template.parameter_values.keys().map(String::as_str),
        )?;

        let overrides: Vec<(&str, f64)> = template
            .parameter_values
            .iter()
            .map(|(name, value)| (name.as_str(), *value))
            .collect();
        let stressed = override_assumptions(assumptions, &overrides);
        let projected = project(baseline, &stressed, as_of)?;

        let metric_deltas = projected
            .values
            .iter()
            .map(|(metric, value)| {
                let base = baseline.get(metric).unwrap_or(0.0);
                (metric.clone(), value - base)
            })
            .collect();

        outcomes.push(StressTestOutcome {
            template: template.name.clone(),
            metric_values: projected.values.clone(),
            metric_deltas,
        });
    }

    Ok(outcomes)
}
