//! Tests for parameter distributions and correlation structure
//!
//! These tests verify that:
//! - Malformed distribution parameters are rejected at construction
//! - Degenerate (zero-variance) distributions always return their point
//! - Quantile functions match known values of each family
//! - The normal CDF approximations hit their documented accuracy
//! - Correlation matrices validate shape, symmetry, range and PSD

use crate::error::ValidationError;
use crate::model::{CorrelationMatrix, ParameterDistribution, norm_cdf, norm_inv_cdf};
use rand::SeedableRng;
use rand::rngs::SmallRng;

#[test]
fn test_invalid_parameters_are_rejected() {
    assert!(ParameterDistribution::normal(0.0, -1.0).is_err());
    assert!(ParameterDistribution::uniform(2.0, 1.0).is_err());
    assert!(ParameterDistribution::triangular(0.0, 2.0, 1.0).is_err());
    assert!(ParameterDistribution::log_normal(0.0, f64::NAN).is_err());
    assert!(ParameterDistribution::custom(vec![], vec![]).is_err());
    assert!(ParameterDistribution::custom(vec![1.0], vec![0.5]).is_err());
    assert!(ParameterDistribution::custom(vec![1.0, 2.0], vec![0.9]).is_err());
}

#[test]
fn test_invalid_distribution_error_names_the_parameter() {
    let d = ParameterDistribution::Normal {
        mean: 0.0,
        std_dev: -1.0,
    };
    let err = d.validate("growth_rate").unwrap_err();
    assert!(
        matches!(err, ValidationError::InvalidDistribution { ref parameter, .. } if parameter == "growth_rate"),
        "{err}"
    );
}

#[test]
fn test_degenerate_distributions_return_their_point() {
    let mut rng = SmallRng::seed_from_u64(7);

    let normal = ParameterDistribution::normal(0.05, 0.0).unwrap();
    let uniform = ParameterDistribution::uniform(3.0, 3.0).unwrap();
    let custom = ParameterDistribution::custom(vec![1.5], vec![1.0]).unwrap();

    assert!(normal.is_degenerate());
    for _ in 0..20 {
        assert_eq!(normal.sample(&mut rng), 0.05);
        assert_eq!(uniform.sample(&mut rng), 3.0);
        assert_eq!(custom.sample(&mut rng), 1.5);
    }
}

#[test]
fn test_quantiles_match_known_values() {
    let normal = ParameterDistribution::normal(10.0, 2.0).unwrap();
    assert!((normal.quantile(0.5) - 10.0).abs() < 1e-6);
    // P97.5 of N(10, 2) is 10 + 1.96 * 2
    assert!((normal.quantile(0.975) - 13.92).abs() < 1e-2);

    let uniform = ParameterDistribution::uniform(0.0, 4.0).unwrap();
    assert!((uniform.quantile(0.25) - 1.0).abs() < 1e-9);

    // Symmetric triangular: median at the mode.
    let triangular = ParameterDistribution::triangular(0.0, 1.0, 2.0).unwrap();
    assert!((triangular.quantile(0.5) - 1.0).abs() < 1e-9);
    // p is clamped away from 0, so the lower bound is approached.
    assert!((triangular.quantile(0.0) - 0.0).abs() < 1e-5);

    let custom =
        ParameterDistribution::custom(vec![1.0, 2.0, 3.0], vec![0.2, 0.3, 0.5]).unwrap();
    assert_eq!(custom.quantile(0.1), 1.0);
    assert_eq!(custom.quantile(0.4), 2.0);
    assert_eq!(custom.quantile(0.9), 3.0);
}

#[test]
fn test_norm_cdf_known_values() {
    assert!((norm_cdf(0.0) - 0.5).abs() < 1e-7);
    assert!((norm_cdf(1.96) - 0.975).abs() < 1e-4);
    assert!((norm_cdf(-1.96) - 0.025).abs() < 1e-4);
    assert!(norm_cdf(8.0) > 0.999999);
    assert!(norm_cdf(-8.0) < 1e-6);
}

#[test]
fn test_norm_inv_cdf_inverts_the_cdf() {
    for x in [-3.0, -1.5, -0.3, 0.0, 0.3, 1.5, 3.0] {
        let roundtrip = norm_inv_cdf(norm_cdf(x));
        assert!(
            (roundtrip - x).abs() < 1e-3,
            "inverse CDF roundtrip at {x}: got {roundtrip}"
        );
    }
}

#[test]
fn test_correlation_matrix_validation() {
    let names = vec!["a".to_string(), "b".to_string()];

    // Wrong number of entries.
    assert!(matches!(
        CorrelationMatrix::new(names.clone(), vec![1.0, 0.5, 0.5]),
        Err(ValidationError::CorrelationDimensions { .. })
    ));

    // Off-unit diagonal.
    assert!(matches!(
        CorrelationMatrix::new(names.clone(), vec![1.0, 0.5, 0.5, 0.9]),
        Err(ValidationError::CorrelationDiagonal { .. })
    ));

    // Asymmetry.
    assert!(matches!(
        CorrelationMatrix::new(names.clone(), vec![1.0, 0.5, 0.4, 1.0]),
        Err(ValidationError::CorrelationNotSymmetric { .. })
    ));

    // Out of [-1, 1].
    assert!(matches!(
        CorrelationMatrix::new(names.clone(), vec![1.0, 1.5, 1.5, 1.0]),
        Err(ValidationError::CorrelationOutOfRange { .. })
    ));

    assert!(CorrelationMatrix::new(names, vec![1.0, 0.5, 0.5, 1.0]).is_ok());
}

#[test]
fn test_cholesky_factor_of_known_matrix() {
    let matrix = CorrelationMatrix::new(
        vec!["a".to_string(), "b".to_string()],
        vec![1.0, 0.5, 0.5, 1.0],
    )
    .unwrap();
    let factor = matrix.cholesky().unwrap();

    // L = [[1, 0], [0.5, sqrt(0.75)]]
    let w = factor.transform(&[1.0, 0.0]);
    assert!((w[0] - 1.0).abs() < 1e-12);
    assert!((w[1] - 0.5).abs() < 1e-12);

    let w = factor.transform(&[0.0, 1.0]);
    assert!((w[1] - 0.75_f64.sqrt()).abs() < 1e-12);
}

#[test]
fn test_perfect_correlation_is_semi_definite_not_an_error() {
    let matrix = CorrelationMatrix::new(
        vec!["a".to_string(), "b".to_string()],
        vec![1.0, 1.0, 1.0, 1.0],
    )
    .unwrap();
    let factor = matrix.cholesky().unwrap();

    // Both outputs move together.
    let w = factor.transform(&[2.0, -1.0]);
    assert!((w[0] - 2.0).abs() < 1e-12);
    assert!((w[1] - 2.0).abs() < 1e-12);
}

#[test]
fn test_indefinite_matrix_is_rejected() {
    let matrix = CorrelationMatrix::new(
        vec!["a".to_string(), "b".to_string(), "c".to_string()],
        vec![1.0, 0.9, 0.9, 0.9, 1.0, -0.9, 0.9, -0.9, 1.0],
    )
    .unwrap();

    assert_eq!(
        matrix.cholesky().unwrap_err(),
        ValidationError::CorrelationNotPositiveSemiDefinite
    );
}

#[test]
fn test_from_nested_defaults_missing_entries() {
    let mut entries = std::collections::BTreeMap::new();
    let mut row_a = std::collections::BTreeMap::new();
    row_a.insert("b".to_string(), 0.3);
    let mut row_b = std::collections::BTreeMap::new();
    row_b.insert("a".to_string(), 0.3);
    entries.insert("a".to_string(), row_a);
    entries.insert("b".to_string(), row_b);

    let matrix = CorrelationMatrix::from_nested(&entries).unwrap();

    // Diagonal defaults to 1, declared off-diagonals carried through.
    assert_eq!(matrix.get(0, 0), 1.0);
    assert_eq!(matrix.get(1, 1), 1.0);
    assert_eq!(matrix.get(0, 1), 0.3);
    assert_eq!(matrix.get(1, 0), 0.3);
}
