//! Scenario assumptions and baseline metric snapshots.
//!
//! An assumption is a single declared change to one target metric. A
//! scenario is an ordered list of assumptions; application order is the
//! declaration order and is part of the contract (percentage changes
//! compose multiplicatively, absolute changes additively).

use jiff::civil::Date;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

/// The change an assumption applies to its target metric.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AssumptionKind {
    /// Relative change: `value = 0.05` means +5%.
    Percentage { value: f64 },
    /// Additive change in the metric's own units.
    Absolute { value: f64 },
    /// Driver-linked change: the named driver metric is projected through
    /// the same mechanism, then applied as a multiplicative factor
    /// `1 + value * driver`, where `value` is the elasticity of the
    /// target with respect to the driver.
    DriverChange { driver: String, value: f64 },
}

impl AssumptionKind {
    /// The scalar that uncertainty sampling overrides.
    #[must_use]
    pub fn value(&self) -> f64 {
        match self {
            AssumptionKind::Percentage { value }
            | AssumptionKind::Absolute { value }
            | AssumptionKind::DriverChange { value, .. } => *value,
        }
    }

    /// Return a copy with the scalar replaced by `value`.
    #[must_use]
    pub fn with_value(&self, value: f64) -> Self {
        match self {
            AssumptionKind::Percentage { .. } => AssumptionKind::Percentage { value },
            AssumptionKind::Absolute { .. } => AssumptionKind::Absolute { value },
            AssumptionKind::DriverChange { driver, .. } => AssumptionKind::DriverChange {
                driver: driver.clone(),
                value,
            },
        }
    }
}

/// A single declared change to a target metric.
///
/// `name` identifies the assumption to the sampler: a parameter
/// distribution with the same name draws uncertain values for this
/// assumption's scalar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Assumption {
    pub name: String,
    pub target_metric: String,
    #[serde(flatten)]
    pub kind: AssumptionKind,
    /// Optional business scope tag (entity, product line). Carried
    /// through untouched; the engine does not interpret it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
    /// Open start of the active window (unbounded when absent).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active_from: Option<Date>,
    /// Open end of the active window (unbounded when absent).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active_to: Option<Date>,
}

impl Assumption {
    #[must_use]
    pub fn percentage(name: &str, target_metric: &str, value: f64) -> Self {
        Self {
            name: name.to_string(),
            target_metric: target_metric.to_string(),
            kind: AssumptionKind::Percentage { value },
            scope: None,
            active_from: None,
            active_to: None,
        }
    }

    #[must_use]
    pub fn absolute(name: &str, target_metric: &str, value: f64) -> Self {
        Self {
            name: name.to_string(),
            target_metric: target_metric.to_string(),
            kind: AssumptionKind::Absolute { value },
            scope: None,
            active_from: None,
            active_to: None,
        }
    }

    #[must_use]
    pub fn driver_change(name: &str, target_metric: &str, driver: &str, value: f64) -> Self {
        Self {
            name: name.to_string(),
            target_metric: target_metric.to_string(),
            kind: AssumptionKind::DriverChange {
                driver: driver.to_string(),
                value,
            },
            scope: None,
            active_from: None,
            active_to: None,
        }
    }

    /// Restrict the assumption to `[from, to]` (either end may be open).
    #[must_use]
    pub fn between(mut self, from: Option<Date>, to: Option<Date>) -> Self {
        self.active_from = from;
        self.active_to = to;
        self
    }

    /// Whether the assumption applies when evaluating at `as_of`.
    #[must_use]
    pub fn is_active(&self, as_of: Date) -> bool {
        if let Some(from) = self.active_from
            && as_of < from
        {
            return false;
        }
        if let Some(to) = self.active_to
            && as_of > to
        {
            return false;
        }
        true
    }
}

/// Per-metric metadata carried alongside the baseline values.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricSpec {
    /// Projections below zero are a validation error, not clamped.
    #[serde(default)]
    pub non_negative: bool,
}

/// A snapshot of current financial metrics for an organization.
///
/// This is the engine's only input from the outside world, fetched once
/// per request before any simulation starts. Read-only for the duration
/// of a run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricSnapshot {
    /// Metric name -> current numeric value.
    pub values: FxHashMap<String, f64>,
    /// Metadata per metric; metrics absent here use the defaults.
    #[serde(default)]
    pub specs: FxHashMap<String, MetricSpec>,
}

impl MetricSnapshot {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert of a metric value.
    #[must_use]
    pub fn with_metric(mut self, name: &str, value: f64) -> Self {
        self.values.insert(name.to_string(), value);
        self
    }

    /// Builder-style insert of a non-negative metric value.
    #[must_use]
    pub fn with_non_negative_metric(mut self, name: &str, value: f64) -> Self {
        self.values.insert(name.to_string(), value);
        self.specs
            .insert(name.to_string(), MetricSpec { non_negative: true });
        self
    }

    #[must_use]
    pub fn get(&self, metric: &str) -> Option<f64> {
        self.values.get(metric).copied()
    }

    #[must_use]
    pub fn spec(&self, metric: &str) -> MetricSpec {
        self.specs.get(metric).copied().unwrap_or_default()
    }

    /// Metric names in a deterministic (sorted) order.
    #[must_use]
    pub fn metric_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.values.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}
