//! Tests for the sensitivity (tornado) engine
//!
//! These tests verify that:
//! - Sweep points are evenly spaced over the variation range
//! - Impacts are measured against the all-base reference projection
//! - Parameters rank by impact range, descending
//! - Config bounds are enforced
//! - Failed sweep steps are counted and excluded, never zero-filled
//! - Cross-dependency analysis detects multiplicative interaction

use jiff::civil::Date;
use rustc_hash::FxHashMap;

use crate::error::{RunError, ValidationError};
use crate::model::{Assumption, MetricSnapshot};
use crate::sensitivity::{SensitivityConfig, analyze_sensitivity};

fn as_of() -> Date {
    jiff::civil::date(2026, 1, 1)
}

fn base_values(entries: &[(&str, f64)]) -> FxHashMap<String, f64> {
    entries
        .iter()
        .map(|(name, value)| (name.to_string(), *value))
        .collect()
}

#[test]
fn test_sweep_points_are_evenly_spaced() {
    let baseline = MetricSnapshot::new().with_metric("revenue", 100.0);
    let assumptions = vec![Assumption::percentage("growth", "revenue", 0.05)];

    let report = analyze_sensitivity(
        &baseline,
        &assumptions,
        &base_values(&[("growth", 0.05)]),
        "revenue",
        as_of(),
        &SensitivityConfig::default(),
    )
    .unwrap();

    // base 0.05, range 0.2, 5 steps: 0.04, 0.045, 0.05, 0.055, 0.06
    let chart = &report.charts["growth"];
    let expected = [0.04, 0.045, 0.05, 0.055, 0.06];
    assert_eq!(chart.parameter_values.len(), 5);
    for (actual, expected) in chart.parameter_values.iter().zip(expected) {
        assert!((actual - expected).abs() < 1e-12, "{actual} != {expected}");
    }

    // Impact at the base step is zero, extremes are +/- 1 unit of revenue.
    assert!(chart.impact_values[2].abs() < 1e-9);
    assert!((chart.impact_values[0] - -1.0).abs() < 1e-9);
    assert!((chart.impact_values[4] - 1.0).abs() < 1e-9);
}

#[test]
fn test_min_max_impact_at_sweep_extremes() {
    let baseline = MetricSnapshot::new().with_metric("revenue", 100.0);
    let assumptions = vec![Assumption::percentage("growth", "revenue", 0.05)];

    let report = analyze_sensitivity(
        &baseline,
        &assumptions,
        &base_values(&[("growth", 0.05)]),
        "revenue",
        as_of(),
        &SensitivityConfig::default(),
    )
    .unwrap();

    let growth = &report.sensitivities[0];
    assert_eq!(growth.parameter, "growth");
    assert!((growth.min_impact - -1.0).abs() < 1e-9);
    assert!((growth.max_impact - 1.0).abs() < 1e-9);
    assert!((growth.range() - 2.0).abs() < 1e-9);
    assert_eq!(report.failed_steps, 0);
}

#[test]
fn test_parameters_rank_by_range_descending() {
    let baseline = MetricSnapshot::new().with_metric("revenue", 100.0);
    let assumptions = vec![
        Assumption::absolute("small_adjust", "revenue", 1.0),
        Assumption::percentage("growth", "revenue", 0.05),
    ];

    let report = analyze_sensitivity(
        &baseline,
        &assumptions,
        &base_values(&[("small_adjust", 1.0), ("growth", 0.05)]),
        "revenue",
        as_of(),
        &SensitivityConfig::default(),
    )
    .unwrap();

    // growth sweeps +/- 1 revenue unit, small_adjust only +/- 0.2.
    assert_eq!(report.sensitivities[0].parameter, "growth");
    assert_eq!(report.sensitivities[1].parameter, "small_adjust");
    assert!(report.sensitivities[0].range() > report.sensitivities[1].range());
}

#[test]
fn test_config_bounds() {
    let baseline = MetricSnapshot::new().with_metric("revenue", 100.0);
    let assumptions = vec![Assumption::percentage("growth", "revenue", 0.05)];
    let values = base_values(&[("growth", 0.05)]);

    for (variation_range, steps) in [(0.0, 5), (1.5, 5), (0.2, 2), (0.2, 21)] {
        let config = SensitivityConfig {
            variation_range,
            steps,
            ..Default::default()
        };
        let err = analyze_sensitivity(&baseline, &assumptions, &values, "revenue", as_of(), &config)
            .unwrap_err();
        assert!(
            matches!(err, RunError::Validation(ValidationError::OutOfBounds { .. })),
            "({variation_range}, {steps}): {err}"
        );
    }
}

#[test]
fn test_unknown_explicit_parameter_is_rejected() {
    let baseline = MetricSnapshot::new().with_metric("revenue", 100.0);
    let assumptions = vec![Assumption::percentage("growth", "revenue", 0.05)];
    let config = SensitivityConfig {
        parameters: Some(vec!["margin".to_string()]),
        ..Default::default()
    };

    let err = analyze_sensitivity(
        &baseline,
        &assumptions,
        &base_values(&[("growth", 0.05)]),
        "revenue",
        as_of(),
        &config,
    )
    .unwrap_err();
    assert_eq!(
        err,
        RunError::Validation(ValidationError::UnknownParameter("margin".into()))
    );
}

#[test]
fn test_failed_steps_are_counted_and_excluded() {
    // margin is non-negative at 1.0; the hit sweeps from -0.72 to -1.08,
    // so only the last step projects negative and fails.
    let baseline = MetricSnapshot::new().with_non_negative_metric("margin", 1.0);
    let assumptions = vec![Assumption::absolute("hit", "margin", -0.9)];

    let report = analyze_sensitivity(
        &baseline,
        &assumptions,
        &base_values(&[("hit", -0.9)]),
        "margin",
        as_of(),
        &SensitivityConfig::default(),
    )
    .unwrap();

    assert_eq!(report.failed_steps, 1);
    let chart = &report.charts["hit"];
    assert_eq!(chart.impact_values.len(), 4);
    // Surviving impacts never dip below the reference by more than the
    // valid sweep allows; the failed point is absent, not zeroed.
    assert!(chart.impact_values.iter().all(|v| v.is_finite()));
}

#[test]
fn test_cross_dependencies_detect_multiplicative_interaction() {
    let baseline = MetricSnapshot::new().with_metric("revenue", 100.0);
    // Two percentage changes on the same metric compose multiplicatively,
    // so their joint effect exceeds the sum of individual effects.
    let assumptions = vec![
        Assumption::percentage("a", "revenue", 1.0),
        Assumption::percentage("b", "revenue", 1.0),
    ];
    let config = SensitivityConfig {
        variation_range: 0.5,
        include_cross_dependencies: true,
        ..Default::default()
    };

    let report = analyze_sensitivity(
        &baseline,
        &assumptions,
        &base_values(&[("a", 1.0), ("b", 1.0)]),
        "revenue",
        as_of(),
        &config,
    )
    .unwrap();

    let effects = report.cross_effects.unwrap();
    assert_eq!(effects.len(), 1);
    assert!(
        effects[0].interaction_strength > 1.0,
        "interaction {} should be clearly positive",
        effects[0].interaction_strength
    );
}

#[test]
fn test_additive_parameters_have_no_interaction() {
    let baseline = MetricSnapshot::new().with_metric("revenue", 100.0);
    let assumptions = vec![
        Assumption::absolute("a", "revenue", 10.0),
        Assumption::absolute("b", "revenue", 5.0),
    ];
    let config = SensitivityConfig {
        include_cross_dependencies: true,
        ..Default::default()
    };

    let report = analyze_sensitivity(
        &baseline,
        &assumptions,
        &base_values(&[("a", 10.0), ("b", 5.0)]),
        "revenue",
        as_of(),
        &config,
    )
    .unwrap();

    let effects = report.cross_effects.unwrap();
    assert!(
        effects[0].interaction_strength.abs() < 1e-9,
        "additive assumptions should not interact, got {}",
        effects[0].interaction_strength
    );
}
