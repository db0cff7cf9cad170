//! Monte Carlo engine: N trials through the sampler and projector,
//! aggregated into per-metric outcome distributions and risk metrics.
//!
//! Trials are embarrassingly parallel: each fixed-size batch derives its
//! own generator from the run seed, so results are bit-identical for a
//! given seed regardless of worker count. Cancellation is checked
//! between batches, not per trial; a cancelled run returns whatever
//! aggregation is available, tagged partial.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use jiff::civil::Date;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

#[cfg(feature = "parallel")]
use rayon::iter::{IntoParallelIterator, ParallelIterator};

use crate::error::{RunError, TrialFailure, ValidationError};
use crate::model::{
    Assumption, Comparison, CorrelationMatrix, HistogramBin, MetricDistribution, MetricSnapshot,
    MonteCarloSummary, ParameterDistribution, ThresholdProbability,
};
use crate::projector::{override_assumptions, project, validate_override_names};
use crate::sampler::{Sampler, TRIAL_BATCH_SIZE};

pub const MIN_TRIALS: usize = 100;
pub const MAX_TRIALS: usize = 10_000;

/// Progress and cancellation shared with the caller's worker thread.
#[derive(Debug, Clone)]
pub struct RunProgress {
    completed: Arc<AtomicUsize>,
    total: Arc<AtomicUsize>,
    cancelled: Arc<AtomicBool>,
}

impl RunProgress {
    #[must_use]
    pub fn new(total: usize) -> Self {
        Self {
            completed: Arc::new(AtomicUsize::new(0)),
            total: Arc::new(AtomicUsize::new(total)),
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Share existing atomics (UI worker integration).
    #[must_use]
    pub fn from_atomics(
        completed: Arc<AtomicUsize>,
        total: Arc<AtomicUsize>,
        cancelled: Arc<AtomicBool>,
    ) -> Self {
        Self {
            completed,
            total,
            cancelled,
        }
    }

    #[must_use]
    pub fn completed(&self) -> usize {
        self.completed.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn total(&self) -> usize {
        self.total.load(Ordering::Relaxed)
    }

    pub fn add(&self, n: usize) {
        self.completed.fetch_add(n, Ordering::Relaxed);
    }

    pub fn reset(&self, total: usize) {
        self.completed.store(0, Ordering::Relaxed);
        self.total.store(total, Ordering::Relaxed);
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }
}

impl Default for RunProgress {
    fn default() -> Self {
        Self::new(0)
    }
}

/// Where an empirical CDF evaluation gets its cutoff.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ThresholdSpec {
    /// Fixed cutoff in metric units.
    Absolute { value: f64, comparison: Comparison },
    /// Cutoff at `ratio` times the metric's baseline value.
    BaselineRatio { ratio: f64, comparison: Comparison },
}

impl ThresholdSpec {
    fn resolve(&self, baseline_value: f64) -> (f64, Comparison) {
        match *self {
            ThresholdSpec::Absolute { value, comparison } => (value, comparison),
            ThresholdSpec::BaselineRatio { ratio, comparison } => {
                (baseline_value * ratio, comparison)
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonteCarloConfig {
    /// Number of trials, bounds `[100, 10000]`.
    pub num_trials: usize,
    pub seed: u64,
    pub histogram_bins: usize,
    /// Failure rate above this flags the response as degraded.
    pub degraded_failure_rate: f64,
    /// Failure rate above this fails the whole run.
    pub max_failure_rate: f64,
    /// VaR confidence levels, each in (0, 1).
    pub var_confidences: Vec<f64>,
    /// Tail events lie beyond this many standard deviations from the mean.
    pub tail_std_devs: f64,
    /// CDF evaluations carried on every metric distribution.
    pub thresholds: Vec<ThresholdSpec>,
}

impl Default for MonteCarloConfig {
    fn default() -> Self {
        Self {
            num_trials: 1000,
            seed: 42,
            histogram_bins: 20,
            degraded_failure_rate: 0.05,
            max_failure_rate: 0.50,
            var_confidences: vec![0.95],
            tail_std_devs: 3.0,
            thresholds: vec![
                // P(below baseline) and P(below 80% of baseline): the
                // presentation layer's "negative" / "significantly
                // negative" projections of the same empirical CDF.
                ThresholdSpec::BaselineRatio {
                    ratio: 1.0,
                    comparison: Comparison::Below,
                },
                ThresholdSpec::BaselineRatio {
                    ratio: 0.8,
                    comparison: Comparison::Below,
                },
                ThresholdSpec::Absolute {
                    value: 0.0,
                    comparison: Comparison::Below,
                },
            ],
        }
    }
}

impl MonteCarloConfig {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.num_trials < MIN_TRIALS || self.num_trials > MAX_TRIALS {
            return Err(ValidationError::OutOfBounds {
                field: "num_trials",
                value: self.num_trials as f64,
                min: MIN_TRIALS as f64,
                max: MAX_TRIALS as f64,
            });
        }
        if self.histogram_bins == 0 {
            return Err(ValidationError::OutOfBounds {
                field: "histogram_bins",
                value: 0.0,
                min: 1.0,
                max: f64::INFINITY,
            });
        }
        for confidence in &self.var_confidences {
            if !(*confidence > 0.0 && *confidence < 1.0) {
                return Err(ValidationError::OutOfBounds {
                    field: "confidence",
                    value: *confidence,
                    min: 0.0,
                    max: 1.0,
                });
            }
        }
        if !(self.max_failure_rate > 0.0 && self.max_failure_rate <= 1.0) {
            return Err(ValidationError::OutOfBounds {
                field: "max_failure_rate",
                value: self.max_failure_rate,
                min: 0.0,
                max: 1.0,
            });
        }
        Ok(())
    }
}

/// Per-batch accumulation, merged in batch order after the parallel map.
struct BatchOutcome {
    /// False when the batch was skipped due to cancellation.
    ran: bool,
    completed: usize,
    failed: usize,
    /// Valid trial values, indexed by target metric.
    values: Vec<Vec<f64>>,
}

/// Run the Monte Carlo simulation.
///
/// Sampled parameters override the scalar of the assumption with the
/// same name; each trial is one projector call over the overridden
/// assumption set. Failed trials (projection rejection, non-finite
/// outcome) are excluded from aggregation and counted.
#[allow(clippy::too_many_arguments)]
pub fn run_monte_carlo(
    baseline: &MetricSnapshot,
    assumptions: &[Assumption],
    distributions: &FxHashMap<String, ParameterDistribution>,
    correlation: Option<&CorrelationMatrix>,
    target_metrics: &[String],
    as_of: Date,
    config: &MonteCarloConfig,
    progress: Option<&RunProgress>,
) -> Result<MonteCarloSummary, RunError> {
    config.validate()?;
    for metric in target_metrics {
        if !baseline.values.contains_key(metric) {
            return Err(ValidationError::UnknownTargetMetric(metric.clone()).into());
        }
    }

    let sampler = Sampler::new(distributions, correlation)?;
    validate_override_names(assumptions, sampler.names().iter().map(String::as_str))?;

    // Surface scenario-level validation (unknown drivers, cycles) before
    // burning trials on it.
    project(baseline, assumptions, as_of)?;

    let num_trials = config.num_trials;
    let num_batches = num_trials.div_ceil(TRIAL_BATCH_SIZE);
    if let Some(p) = progress {
        p.reset(num_trials);
    }

    debug!(
        trials = num_trials,
        parameters = sampler.len(),
        seed = config.seed,
        "starting monte carlo run"
    );

    let run_batch = |batch: usize| -> BatchOutcome {
        let mut outcome = BatchOutcome {
            ran: false,
            completed: 0,
            failed: 0,
            values: vec![Vec::new(); target_metrics.len()],
        };
        if progress.is_some_and(RunProgress::is_cancelled) {
            return outcome;
        }
        outcome.ran = true;

        let start = batch * TRIAL_BATCH_SIZE;
        let count = TRIAL_BATCH_SIZE.min(num_trials - start);
        let vectors = sampler.sample_batch(config.seed, batch as u64, count);

        for vector in vectors {
            outcome.completed += 1;
            let overrides: Vec<(&str, f64)> = sampler
                .names()
                .iter()
                .map(String::as_str)
                .zip(vector.iter().copied())
                .collect();
            let trial_assumptions = override_assumptions(assumptions, &overrides);

            match evaluate_trial(baseline, &trial_assumptions, target_metrics, as_of) {
                Ok(trial_values) => {
                    for (slot, value) in outcome.values.iter_mut().zip(trial_values) {
                        slot.push(value);
                    }
                }
                Err(_) => outcome.failed += 1,
            }
        }

        if let Some(p) = progress {
            p.add(count);
        }
        outcome
    };

    #[cfg(feature = "parallel")]
    let batches: Vec<BatchOutcome> = (0..num_batches).into_par_iter().map(run_batch).collect();
    #[cfg(not(feature = "parallel"))]
    let batches: Vec<BatchOutcome> = (0..num_batches).map(run_batch).collect();

    let partial = batches.iter().any(|b| !b.ran);
    let completed: usize = batches.iter().map(|b| b.completed).sum();
    let failed: usize = batches.iter().map(|b| b.failed).sum();
    let valid = completed - failed;

    if valid == 0 && partial {
        return Err(RunError::Cancelled);
    }
    if valid == 0 || failed as f64 / completed.max(1) as f64 > config.max_failure_rate {
        return Err(RunError::FailureRateExceeded {
            failed,
            total: completed,
        });
    }

    // Merge per-metric trial values in batch order so aggregation is
    // independent of worker scheduling.
    let mut per_metric: Vec<Vec<f64>> = vec![Vec::with_capacity(valid); target_metrics.len()];
    for batch in &batches {
        for (merged, values) in per_metric.iter_mut().zip(&batch.values) {
            merged.extend_from_slice(values);
        }
    }

    let degraded = completed > 0 && failed as f64 / completed as f64 > config.degraded_failure_rate;
    if degraded {
        warn!(
            failed,
            completed, "monte carlo run degraded by trial failures"
        );
    }

    let mut metrics = FxHashMap::default();
    let mut value_at_risk = FxHashMap::default();
    let mut tail_event_probabilities = FxHashMap::default();

    for (metric, mut values) in target_metrics.iter().zip(per_metric) {
        let baseline_value = baseline.get(metric).unwrap_or(0.0);
        values.sort_unstable_by(f64::total_cmp);

        let thresholds: Vec<(f64, Comparison)> = config
            .thresholds
            .iter()
            .map(|spec| spec.resolve(baseline_value))
            .collect();
        let distribution = aggregate_metric(&values, config.histogram_bins, &thresholds);

        let var: Vec<(f64, f64)> = config
            .var_confidences
            .iter()
            .map(|confidence| {
                let deviation = percentile_sorted(&values, 1.0 - confidence) - baseline_value;
                (*confidence, (-deviation).max(0.0))
            })
            .collect();

        let tail = tail_probability(&values, distribution.mean, distribution.std_dev, config.tail_std_devs);

        metrics.insert(metric.clone(), distribution);
        value_at_risk.insert(metric.clone(), var);
        tail_event_probabilities.insert(metric.clone(), tail);
    }

    debug!(
        completed,
        failed, partial, "monte carlo run finished"
    );

    Ok(MonteCarloSummary {
        metrics,
        value_at_risk,
        tail_event_probabilities,
        num_trials,
        completed_trials: completed,
        failed_trials: failed,
        degraded,
        partial,
        seed: config.seed,
    })
}

/// Evaluate one trial's assumption set. A rejection or a non-finite
/// target value fails the trial; failed trials are counted and excluded
/// from aggregation, never treated as zero.
fn evaluate_trial(
    baseline: &MetricSnapshot,
    assumptions: &[Assumption],
    target_metrics: &[String],
    as_of: Date,
) -> Result<Vec<f64>, TrialFailure> {
    let projected = project(baseline, assumptions, as_of)?;
    let mut values = Vec::with_capacity(target_metrics.len());
    for metric in target_metrics {
        let value = projected.get(metric).unwrap_or(f64::NAN);
        if !value.is_finite() {
            return Err(TrialFailure::NonFinite {
                metric: metric.clone(),
            });
        }
        values.push(value);
    }
    Ok(values)
}

/// Linear-interpolation percentile over an ascending-sorted slice.
/// `p` in 0-1. Empty input returns NaN.
#[must_use]
pub fn percentile_sorted(sorted: &[f64], p: f64) -> f64 {
    if sorted.is_empty() {
        return f64::NAN;
    }
    if sorted.len() == 1 {
        return sorted[0];
    }
    let rank = p.clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;
    let fraction = rank - lower as f64;
    sorted[lower] + (sorted[upper] - sorted[lower]) * fraction
}

fn aggregate_metric(
    sorted: &[f64],
    bins: usize,
    thresholds: &[(f64, Comparison)],
) -> MetricDistribution {
    let n = sorted.len();
    let mean = sorted.iter().sum::<f64>() / n as f64;
    let variance = sorted.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n as f64;
    let std_dev = variance.sqrt();
    let min = sorted[0];
    let max = sorted[n - 1];

    let percentiles = [0.10, 0.25, 0.75, 0.90]
        .into_iter()
        .map(|p| (p, percentile_sorted(sorted, p)))
        .collect();

    let histogram = build_histogram(sorted, min, max, bins);

    let threshold_probabilities = thresholds
        .iter()
        .map(|(threshold, comparison)| {
            let count = match comparison {
                Comparison::Below => sorted.iter().filter(|v| **v < *threshold).count(),
                Comparison::Above => sorted.iter().filter(|v| **v > *threshold).count(),
            };
            ThresholdProbability {
                threshold: *threshold,
                comparison: *comparison,
                probability: count as f64 / n as f64,
            }
        })
        .collect();

    MetricDistribution {
        mean,
        median: percentile_sorted(sorted, 0.5),
        std_dev,
        min,
        max,
        percentiles,
        histogram,
        threshold_probabilities,
    }
}

fn build_histogram(sorted: &[f64], min: f64, max: f64, bins: usize) -> Vec<HistogramBin> {
    // Degenerate spread collapses to a single bin holding every trial.
    if max <= min {
        return vec![HistogramBin {
            lower: min,
            upper: max,
            count: sorted.len(),
        }];
    }

    let width = (max - min) / bins as f64;
    let mut histogram: Vec<HistogramBin> = (0..bins)
        .map(|i| HistogramBin {
            lower: min + width * i as f64,
            upper: if i == bins - 1 {
                max
            } else {
                min + width * (i + 1) as f64
            },
            count: 0,
        })
        .collect();

    for value in sorted {
        let index = (((value - min) / width) as usize).min(bins - 1);
        histogram[index].count += 1;
    }

    histogram
}

fn tail_probability(sorted: &[f64], mean: f64, std_dev: f64, k: f64) -> f64 {
    if sorted.is_empty() || std_dev == 0.0 {
        return 0.0;
    }
    let cutoff = k * std_dev;
    let count = sorted.iter().filter(|v| (**v - mean).abs() > cutoff).count();
    count as f64 / sorted.len() as f64
}
