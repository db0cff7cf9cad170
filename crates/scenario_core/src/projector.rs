//! Baseline projector: applies a scenario's assumptions to a metric
//! snapshot, producing one deterministic outcome.
//!
//! Pure function of its inputs. This is the single evaluation function
//! shared by the Monte Carlo, sensitivity and stress engines, so all
//! three agree on how a parameter vector maps to a metric value.

use jiff::civil::Date;
use rustc_hash::{FxHashMap, FxHashSet};

use crate::error::ValidationError;
use crate::model::{Assumption, AssumptionKind, MetricSnapshot, ScenarioOutcome};

/// Apply `assumptions` to every metric in `baseline` as of the given
/// evaluation date.
///
/// Assumptions apply in declared order; percentage changes compose
/// multiplicatively, absolute changes additively. Date-bounded
/// assumptions apply only when `as_of` falls inside their window.
///
/// Errors: an assumption targeting a metric absent from the baseline, an
/// unresolvable or cyclic driver reference, or a projection pushing a
/// non-negative metric below zero. Never clamps.
pub fn project(
    baseline: &MetricSnapshot,
    assumptions: &[Assumption],
    as_of: Date,
) -> Result<MetricSnapshot, ValidationError> {
    for assumption in assumptions {
        if !baseline.values.contains_key(&assumption.target_metric) {
            return Err(ValidationError::UnknownTargetMetric(
                assumption.target_metric.clone(),
            ));
        }
    }

    let mut memo: FxHashMap<String, f64> = FxHashMap::default();
    let mut projected = baseline.clone();

    for metric in baseline.metric_names() {
        let mut visiting = FxHashSet::default();
        let value = project_metric(metric, baseline, assumptions, as_of, &mut memo, &mut visiting)?;
        projected.values.insert(metric.to_string(), value);
    }

    Ok(projected)
}

/// Project the scenario once and report per-metric deltas vs baseline.
pub fn point_estimate(
    baseline: &MetricSnapshot,
    assumptions: &[Assumption],
    as_of: Date,
) -> Result<ScenarioOutcome, ValidationError> {
    let projected = project(baseline, assumptions, as_of)?;
    let deltas = projected
        .values
        .iter()
        .map(|(metric, value)| {
            let base = baseline.get(metric).unwrap_or(0.0);
            (metric.clone(), value - base)
        })
        .collect();
    Ok(ScenarioOutcome { projected, deltas })
}

fn project_metric(
    metric: &str,
    baseline: &MetricSnapshot,
    assumptions: &[Assumption],
    as_of: Date,
    memo: &mut FxHashMap<String, f64>,
    visiting: &mut FxHashSet<String>,
) -> Result<f64, ValidationError> {
    if let Some(value) = memo.get(metric) {
        return Ok(*value);
    }
    if !visiting.insert(metric.to_string()) {
        return Err(ValidationError::DriverCycle(metric.to_string()));
    }

    let mut value = baseline
        .get(metric)
        .ok_or_else(|| ValidationError::UnknownTargetMetric(metric.to_string()))?;

    for assumption in assumptions {
        if assumption.target_metric != metric || !assumption.is_active(as_of) {
            continue;
        }
        match &assumption.kind {
            AssumptionKind::Percentage { value: pct } => value *= 1.0 + pct,
            AssumptionKind::Absolute { value: abs } => value += abs,
            AssumptionKind::DriverChange {
                driver,
                value: elasticity,
            } => {
                if !baseline.values.contains_key(driver) {
                    return Err(ValidationError::UnknownDriver {
                        assumption: assumption.name.clone(),
                        driver: driver.clone(),
                    });
                }
                let driver_value =
                    project_metric(driver, baseline, assumptions, as_of, memo, visiting)?;
                value *= 1.0 + elasticity * driver_value;
            }
        }
    }

    if baseline.spec(metric).non_negative && value < 0.0 {
        return Err(ValidationError::NegativeMetric {
            metric: metric.to_string(),
            value,
        });
    }

    visiting.remove(metric);
    memo.insert(metric.to_string(), value);
    Ok(value)
}

/// Clone the assumption set with scalar values overridden by name.
///
/// `overrides` pairs assumption names with replacement values (a sampled
/// parameter vector, a sweep point, or a stress template). Names are
/// validated against the assumption set before engines run, so unmatched
/// entries are ignored here.
#[must_use]
pub fn override_assumptions(assumptions: &[Assumption], overrides: &[(&str, f64)]) -> Vec<Assumption> {
    assumptions
        .iter()
        .map(|assumption| {
            match overrides
                .iter()
                .find(|(name, _)| *name == assumption.name)
            {
                Some((_, value)) => Assumption {
                    kind: assumption.kind.with_value(*value),
                    ..assumption.clone()
                },
                None => assumption.clone(),
            }
        })
        .collect()
}

/// Check that every override name matches a declared assumption.
pub fn validate_override_names<'a, I>(
    assumptions: &[Assumption],
    names: I,
) -> Result<(), ValidationError>
where
    I: IntoIterator<Item = &'a str>,
{
    for name in names {
        if !assumptions.iter().any(|a| a.name == name) {
            return Err(ValidationError::UnknownParameter(name.to_string()));
        }
    }
    Ok(())
}
