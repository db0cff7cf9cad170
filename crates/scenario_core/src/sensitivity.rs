//! Sensitivity (tornado) engine: sweeps each parameter across a range
//! around its base value, recomputing the target metric through the
//! projector, to rank which parameters matter most.
//!
//! Sweeps are independent per `(parameter, step)` and share the same
//! evaluation function as the Monte Carlo engine. Cross-dependency
//! analysis is O(steps x pairs) and only runs when requested.

use jiff::civil::Date;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use tracing::debug;

#[cfg(feature = "parallel")]
use rayon::iter::{IntoParallelRefIterator, ParallelIterator};

use crate::error::{RunError, ValidationError};
use crate::model::{
    Assumption, MetricSnapshot, ParameterCrossEffect, ParameterSensitivity, SensitivityReport,
    TornadoSeries,
};
use crate::projector::{override_assumptions, project, validate_override_names};

pub const MIN_STEPS: usize = 3;
pub const MAX_STEPS: usize = 20;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensitivityConfig {
    /// Half-width of the sweep as a fraction of the base value, (0, 1].
    pub variation_range: f64,
    /// Points per sweep, bounds `[3, 20]`.
    pub steps: usize,
    /// Parameters to analyze; all declared parameters when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parameters: Option<Vec<String>>,
    /// Also measure pairwise interaction effects (expensive).
    #[serde(default)]
    pub include_cross_dependencies: bool,
}

impl Default for SensitivityConfig {
    fn default() -> Self {
        Self {
            variation_range: 0.2,
            steps: 5,
            parameters: None,
            include_cross_dependencies: false,
        }
    }
}

impl SensitivityConfig {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if !(self.variation_range > 0.0 && self.variation_range <= 1.0) {
            return Err(ValidationError::OutOfBounds {
                field: "variation_range",
                value: self.variation_range,
                min: 0.0,
                max: 1.0,
            });
        }
        if self.steps < MIN_STEPS || self.steps > MAX_STEPS {
            return Err(ValidationError::OutOfBounds {
                field: "steps",
                value: self.steps as f64,
                min: MIN_STEPS as f64,
                max: MAX_STEPS as f64,
            });
        }
        Ok(())
    }
}

/// Per-parameter sweep outcome kept internally; `impacts[i]` is `None`
/// when step `i` failed projection.
struct Sweep {
    parameter: String,
    values: Vec<f64>,
    impacts: Vec<Option<f64>>,
}

/// Run the sensitivity analysis for one target metric.
///
/// `base_values` holds each parameter's base (point-estimate) value;
/// every sweep holds the other parameters at those bases. Parameters are
/// ranked by impact range descending; equal ranges keep declaration
/// order (the order parameters appear in the assumption set, or the
/// caller's explicit list).
pub fn analyze_sensitivity(
    baseline: &MetricSnapshot,
    assumptions: &[Assumption],
    base_values: &FxHashMap<String, f64>,
    target_metric: &str,
    as_of: Date,
    config: &SensitivityConfig,
) -> Result<SensitivityReport, RunError> {
    config.validate()?;
    if !baseline.values.contains_key(target_metric) {
        return Err(ValidationError::UnknownTargetMetric(target_metric.to_string()).into());
    }
    validate_override_names(assumptions, base_values.keys().map(String::as_str))?;

    let parameters: Vec<String> = match &config.parameters {
        Some(explicit) => {
            for name in explicit {
                if !base_values.contains_key(name) {
                    return Err(ValidationError::UnknownParameter(name.clone()).into());
                }
            }
            explicit.clone()
        }
        // Declaration order: the order parameters appear in the
        // assumption set.
        None => assumptions
            .iter()
            .filter(|a| base_values.contains_key(&a.name))
            .map(|a| a.name.clone())
            .collect(),
    };

    let base_overrides: Vec<(&str, f64)> = base_values
        .iter()
        .map(|(name, value)| (name.as_str(), *value))
        .collect();

    let evaluate = |overrides: &[(&str, f64)]| -> Option<f64> {
        let adjusted = override_assumptions(assumptions, overrides);
        project(baseline, &adjusted, as_of)
            .ok()
            .and_then(|projected| projected.get(target_metric))
            .filter(|v| v.is_finite())
    };

    // The reference point: every parameter at its base value. Failing
    // here is a scenario problem, not a step failure.
    let reference_assumptions = override_assumptions(assumptions, &base_overrides);
    let reference = project(baseline, &reference_assumptions, as_of)?
        .get(target_metric)
        .ok_or_else(|| ValidationError::UnknownTargetMetric(target_metric.to_string()))?;

    let sweep_values = |base: f64| -> Vec<f64> {
        let low = base * (1.0 - config.variation_range);
        let high = base * (1.0 + config.variation_range);
        let step = (high - low) / (config.steps - 1) as f64;
        (0..config.steps).map(|i| low + step * i as f64).collect()
    };

    let run_sweep = |parameter: &String| -> Sweep {
        let base = base_values[parameter];
        let values = sweep_values(base);
        let impacts = values
            .iter()
            .map(|value| {
                let mut overrides = base_overrides.clone();
                for entry in &mut overrides {
                    if entry.0 == parameter.as_str() {
                        entry.1 = *value;
                    }
                }
                evaluate(&overrides).map(|metric| metric - reference)
            })
            .collect();
        Sweep {
            parameter: parameter.clone(),
            values,
            impacts,
        }
    };

    #[cfg(feature = "parallel")]
    let sweeps: Vec<Sweep> = parameters.par_iter().map(run_sweep).collect();
    #[cfg(not(feature = "parallel"))]
    let sweeps: Vec<Sweep> = parameters.iter().map(run_sweep).collect();

    let mut failed_steps = 0;
    let mut charts = FxHashMap::default();
    let mut sensitivities = Vec::with_capacity(sweeps.len());

    for sweep in &sweeps {
        let mut series = TornadoSeries::default();
        let mut min_impact = f64::INFINITY;
        let mut max_impact = f64::NEG_INFINITY;

        for (value, impact) in sweep.values.iter().zip(&sweep.impacts) {
            match impact {
                Some(impact) => {
                    series.parameter_values.push(*value);
                    series.impact_values.push(*impact);
                    min_impact = min_impact.min(*impact);
                    max_impact = max_impact.max(*impact);
                }
                None => failed_steps += 1,
            }
        }

        if series.impact_values.is_empty() {
            min_impact = 0.0;
            max_impact = 0.0;
        }

        charts.insert(sweep.parameter.clone(), series);
        sensitivities.push(ParameterSensitivity {
            parameter: sweep.parameter.clone(),
            min_impact,
            max_impact,
        });
    }

    // Stable sort: ties keep declaration order.
    sensitivities.sort_by(|a, b| b.range().partial_cmp(&a.range()).unwrap_or(std::cmp::Ordering::Equal));

    let cross_effects = if config.include_cross_dependencies {
        let mut effects = Vec::new();

        for i in 0..sweeps.len() {
            for j in (i + 1)..sweeps.len() {
                let (a, b) = (&sweeps[i], &sweeps[j]);
                let mut deviations = Vec::with_capacity(config.steps);

                for step in 0..config.steps {
                    // Both parameters move by the same step fraction.
                    let (Some(impact_a), Some(impact_b)) = (a.impacts[step], b.impacts[step])
                    else {
                        failed_steps += 1;
                        continue;
                    };

                    let mut overrides = base_overrides.clone();
                    for entry in &mut overrides {
                        if entry.0 == a.parameter.as_str() {
                            entry.1 = a.values[step];
                        } else if entry.0 == b.parameter.as_str() {
                            entry.1 = b.values[step];
                        }
                    }

                    match evaluate(&overrides) {
                        Some(metric) => {
                            let joint = metric - reference;
                            deviations.push(joint - (impact_a + impact_b));
                        }
                        None => failed_steps += 1,
                    }
                }

                // Magnitude: mean absolute deviation of joint vs additive
                // effect. Sign: direction of the mean deviation.
                let interaction_strength = if deviations.is_empty() {
                    0.0
                } else {
                    let n = deviations.len() as f64;
                    let magnitude = deviations.iter().map(|d| d.abs()).sum::<f64>() / n;
                    let mean = deviations.iter().sum::<f64>() / n;
                    if mean < 0.0 { -magnitude } else { magnitude }
                };

                effects.push(ParameterCrossEffect {
                    parameter_a: a.parameter.clone(),
                    parameter_b: b.parameter.clone(),
                    interaction_strength,
                });
            }
        }

        Some(effects)
    } else {
        None
    };

    debug!(
        parameters = parameters.len(),
        failed_steps, "sensitivity analysis finished"
    );

    Ok(SensitivityReport {
        sensitivities,
        charts,
        cross_effects,
        failed_steps,
    })
}
