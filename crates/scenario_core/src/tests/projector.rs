//! Tests for deterministic baseline projection
//!
//! These tests verify that:
//! - Percentage and absolute assumptions compose in declared order
//! - Driver-linked assumptions resolve through the projected driver
//! - Driver cycles and unknown references are rejected
//! - Non-negative metrics fail validation rather than being clamped
//! - Date-bounded assumptions apply only inside their window

use crate::error::ValidationError;
use crate::model::{Assumption, MetricSnapshot};
use crate::projector::{override_assumptions, point_estimate, project};

fn as_of() -> jiff::civil::Date {
    jiff::civil::date(2026, 1, 1)
}

#[test]
fn test_percentage_assumption() {
    let baseline = MetricSnapshot::new().with_metric("revenue", 100.0);
    let assumptions = vec![Assumption::percentage("growth", "revenue", 0.05)];

    let projected = project(&baseline, &assumptions, as_of()).unwrap();

    assert!((projected.get("revenue").unwrap() - 105.0).abs() < 1e-9);
}

#[test]
fn test_declared_order_is_part_of_the_contract() {
    let baseline = MetricSnapshot::new().with_metric("revenue", 100.0);

    // percentage then absolute: 100 * 1.1 + 10 = 120
    let pct_first = vec![
        Assumption::percentage("growth", "revenue", 0.10),
        Assumption::absolute("bonus", "revenue", 10.0),
    ];
    let projected = project(&baseline, &pct_first, as_of()).unwrap();
    assert!((projected.get("revenue").unwrap() - 120.0).abs() < 1e-9);

    // absolute then percentage: (100 + 10) * 1.1 = 121
    let abs_first = vec![
        Assumption::absolute("bonus", "revenue", 10.0),
        Assumption::percentage("growth", "revenue", 0.10),
    ];
    let projected = project(&baseline, &abs_first, as_of()).unwrap();
    assert!((projected.get("revenue").unwrap() - 121.0).abs() < 1e-9);
}

#[test]
fn test_driver_change_uses_projected_driver() {
    let baseline = MetricSnapshot::new()
        .with_metric("revenue", 100.0)
        .with_metric("churn", 0.05);
    // Churn doubles, revenue shrinks by elasticity -1 per unit of churn.
    let assumptions = vec![
        Assumption::percentage("churn_shock", "churn", 1.0),
        Assumption::driver_change("churn_drag", "revenue", "churn", -1.0),
    ];

    let projected = project(&baseline, &assumptions, as_of()).unwrap();

    // Driver projects to 0.10, so revenue = 100 * (1 - 0.10) = 90.
    assert!((projected.get("churn").unwrap() - 0.10).abs() < 1e-9);
    assert!((projected.get("revenue").unwrap() - 90.0).abs() < 1e-9);
}

#[test]
fn test_driver_cycle_is_rejected() {
    let baseline = MetricSnapshot::new()
        .with_metric("a", 1.0)
        .with_metric("b", 1.0);
    let assumptions = vec![
        Assumption::driver_change("a_on_b", "a", "b", 0.1),
        Assumption::driver_change("b_on_a", "b", "a", 0.1),
    ];

    let err = project(&baseline, &assumptions, as_of()).unwrap_err();
    assert!(matches!(err, ValidationError::DriverCycle(_)), "{err}");
}

#[test]
fn test_unknown_target_metric_is_rejected() {
    let baseline = MetricSnapshot::new().with_metric("revenue", 100.0);
    let assumptions = vec![Assumption::percentage("growth", "profit", 0.05)];

    let err = project(&baseline, &assumptions, as_of()).unwrap_err();
    assert_eq!(err, ValidationError::UnknownTargetMetric("profit".into()));
}

#[test]
fn test_unknown_driver_is_rejected() {
    let baseline = MetricSnapshot::new().with_metric("revenue", 100.0);
    let assumptions = vec![Assumption::driver_change("drag", "revenue", "churn", -1.0)];

    let err = project(&baseline, &assumptions, as_of()).unwrap_err();
    assert!(
        matches!(err, ValidationError::UnknownDriver { ref driver, .. } if driver == "churn"),
        "{err}"
    );
}

#[test]
fn test_non_negative_metric_fails_instead_of_clamping() {
    let baseline = MetricSnapshot::new().with_non_negative_metric("headcount", 50.0);
    let assumptions = vec![Assumption::absolute("layoffs", "headcount", -80.0)];

    let err = project(&baseline, &assumptions, as_of()).unwrap_err();
    match err {
        ValidationError::NegativeMetric { metric, value } => {
            assert_eq!(metric, "headcount");
            assert!((value - -30.0).abs() < 1e-9);
        }
        other => panic!("expected NegativeMetric, got {other:?}"),
    }
}

#[test]
fn test_empty_scenario_is_identity() {
    let baseline = MetricSnapshot::new()
        .with_metric("revenue", 100.0)
        .with_metric("costs", 60.0);

    let projected = project(&baseline, &[], as_of()).unwrap();

    assert_eq!(projected.values, baseline.values);
}

#[test]
fn test_date_window_gates_application() {
    let baseline = MetricSnapshot::new().with_metric("revenue", 100.0);
    let assumptions = vec![
        Assumption::percentage("growth", "revenue", 0.05)
            .between(Some(jiff::civil::date(2026, 6, 1)), None),
    ];

    let before = project(&baseline, &assumptions, jiff::civil::date(2026, 1, 1)).unwrap();
    assert!((before.get("revenue").unwrap() - 100.0).abs() < 1e-9);

    let after = project(&baseline, &assumptions, jiff::civil::date(2026, 7, 1)).unwrap();
    assert!((after.get("revenue").unwrap() - 105.0).abs() < 1e-9);
}

#[test]
fn test_point_estimate_reports_deltas() {
    let baseline = MetricSnapshot::new()
        .with_metric("revenue", 100.0)
        .with_metric("costs", 60.0);
    let assumptions = vec![Assumption::percentage("growth", "revenue", 0.05)];

    let outcome = point_estimate(&baseline, &assumptions, as_of()).unwrap();

    assert!((outcome.deltas["revenue"] - 5.0).abs() < 1e-9);
    assert!((outcome.deltas["costs"] - 0.0).abs() < 1e-9);
}

#[test]
fn test_override_assumptions_replaces_scalar_by_name() {
    let assumptions = vec![
        Assumption::percentage("growth", "revenue", 0.05),
        Assumption::absolute("bonus", "revenue", 10.0),
    ];

    let overridden = override_assumptions(&assumptions, &[("growth", 0.08)]);

    assert!((overridden[0].kind.value() - 0.08).abs() < 1e-9);
    assert!((overridden[1].kind.value() - 10.0).abs() < 1e-9);
    assert_eq!(overridden[0].target_metric, "revenue");
}
