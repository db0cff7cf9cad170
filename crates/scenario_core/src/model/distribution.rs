//! Parameter uncertainty distributions and correlation structure.
//!
//! `ParameterDistribution` is a closed tagged variant validated fully at
//! construction; malformed parameters are rejected before any trial
//! runs, never inside the sampling loop.

use rand::Rng;
use rand::distr::Distribution;
use rand::distr::weighted::WeightedIndex;
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Tolerance for "weights sum to 1" and matrix symmetry checks.
const EPSILON: f64 = 1e-9;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ParameterDistribution {
    Normal {
        mean: f64,
        std_dev: f64,
    },
    Uniform {
        min: f64,
        max: f64,
    },
    Triangular {
        min: f64,
        mode: f64,
        max: f64,
    },
    /// Parameters of the underlying normal (log-space mean and std).
    LogNormal {
        mean: f64,
        std_dev: f64,
    },
    /// Weighted discrete draw over explicit values.
    Custom {
        values: Vec<f64>,
        weights: Vec<f64>,
    },
}

impl ParameterDistribution {
    pub fn normal(mean: f64, std_dev: f64) -> Result<Self, ValidationError> {
        let d = ParameterDistribution::Normal { mean, std_dev };
        d.validate("normal")?;
        Ok(d)
    }

    pub fn uniform(min: f64, max: f64) -> Result<Self, ValidationError> {
        let d = ParameterDistribution::Uniform { min, max };
        d.validate("uniform")?;
        Ok(d)
    }

    pub fn triangular(min: f64, mode: f64, max: f64) -> Result<Self, ValidationError> {
        let d = ParameterDistribution::Triangular { min, mode, max };
        d.validate("triangular")?;
        Ok(d)
    }

    pub fn log_normal(mean: f64, std_dev: f64) -> Result<Self, ValidationError> {
        let d = ParameterDistribution::LogNormal { mean, std_dev };
        d.validate("log_normal")?;
        Ok(d)
    }

    pub fn custom(values: Vec<f64>, weights: Vec<f64>) -> Result<Self, ValidationError> {
        let d = ParameterDistribution::Custom { values, weights };
        d.validate("custom")?;
        Ok(d)
    }

    /// Check distribution parameters. `parameter` names the offending
    /// parameter in the error.
    pub fn validate(&self, parameter: &str) -> Result<(), ValidationError> {
        let fail = |reason: &'static str| ValidationError::InvalidDistribution {
            parameter: parameter.to_string(),
            reason,
        };

        match self {
            ParameterDistribution::Normal { mean, std_dev }
            | ParameterDistribution::LogNormal { mean, std_dev } => {
                if !mean.is_finite() || !std_dev.is_finite() {
                    return Err(fail("mean and std_dev must be finite"));
                }
                if *std_dev < 0.0 {
                    return Err(fail("std_dev must be non-negative"));
                }
            }
            ParameterDistribution::Uniform { min, max } => {
                if !min.is_finite() || !max.is_finite() {
                    return Err(fail("min and max must be finite"));
                }
                if min > max {
                    return Err(fail("min must not exceed max"));
                }
            }
            ParameterDistribution::Triangular { min, mode, max } => {
                if !min.is_finite() || !mode.is_finite() || !max.is_finite() {
                    return Err(fail("min, mode and max must be finite"));
                }
                if !(min <= mode && mode <= max) {
                    return Err(fail("triangular requires min <= mode <= max"));
                }
            }
            ParameterDistribution::Custom { values, weights } => {
                if values.is_empty() {
                    return Err(fail("custom distribution has no values"));
                }
                if values.len() != weights.len() {
                    return Err(fail("values and weights lengths differ"));
                }
                if values.iter().any(|v| !v.is_finite()) {
                    return Err(fail("custom values must be finite"));
                }
                if weights.iter().any(|w| !w.is_finite() || *w < 0.0) {
                    return Err(fail("weights must be finite and non-negative"));
                }
                let total: f64 = weights.iter().sum();
                if (total - 1.0).abs() > 1e-6 {
                    return Err(fail("weights must sum to 1"));
                }
            }
        }
        Ok(())
    }

    /// Whether every draw returns the same value (zero-variance case).
    #[must_use]
    pub fn is_degenerate(&self) -> bool {
        match self {
            ParameterDistribution::Normal { std_dev, .. }
            | ParameterDistribution::LogNormal { std_dev, .. } => *std_dev == 0.0,
            ParameterDistribution::Uniform { min, max } => min == max,
            ParameterDistribution::Triangular { min, max, .. } => min == max,
            ParameterDistribution::Custom { values, weights } => {
                values.len() == 1 || weights.iter().filter(|w| **w > 0.0).count() <= 1
            }
        }
    }

    /// Draw one value from the marginal distribution.
    ///
    /// Assumes `validate` passed; parameter errors from `rand_distr`
    /// can then only arise from degenerate shapes, which are handled
    /// explicitly here.
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> f64 {
        match self {
            ParameterDistribution::Normal { mean, std_dev } => {
                if *std_dev == 0.0 {
                    *mean
                } else {
                    rand_distr::Normal::new(*mean, *std_dev)
                        .map(|d| d.sample(rng))
                        .unwrap_or(*mean)
                }
            }
            ParameterDistribution::Uniform { min, max } => {
                if min == max {
                    *min
                } else {
                    min + (max - min) * rng.random::<f64>()
                }
            }
            ParameterDistribution::Triangular { min, mode, max } => {
                if min == max {
                    *min
                } else {
                    rand_distr::Triangular::new(*min, *max, *mode)
                        .map(|d| d.sample(rng))
                        .unwrap_or(*mode)
                }
            }
            ParameterDistribution::LogNormal { mean, std_dev } => {
                if *std_dev == 0.0 {
                    mean.exp()
                } else {
                    rand_distr::LogNormal::new(*mean, *std_dev)
                        .map(|d| d.sample(rng))
                        .unwrap_or_else(|_| mean.exp())
                }
            }
            ParameterDistribution::Custom { values, weights } => {
                if values.len() == 1 {
                    values[0]
                } else {
                    match WeightedIndex::new(weights) {
                        Ok(index) => values[index.sample(rng)],
                        Err(_) => values[0],
                    }
                }
            }
        }
    }

    /// Inverse CDF, used to map copula normals back to the native
    /// distribution. `p` is clamped away from 0 and 1.
    #[must_use]
    pub fn quantile(&self, p: f64) -> f64 {
        let p = p.clamp(1e-12, 1.0 - 1e-12);
        match self {
            ParameterDistribution::Normal { mean, std_dev } => mean + std_dev * norm_inv_cdf(p),
            ParameterDistribution::Uniform { min, max } => min + (max - min) * p,
            ParameterDistribution::Triangular { min, mode, max } => {
                let span = max - min;
                if span == 0.0 {
                    return *min;
                }
                let cut = (mode - min) / span;
                if p < cut {
                    min + (p * span * (mode - min)).sqrt()
                } else {
                    max - ((1.0 - p) * span * (max - mode)).sqrt()
                }
            }
            ParameterDistribution::LogNormal { mean, std_dev } => {
                (mean + std_dev * norm_inv_cdf(p)).exp()
            }
            ParameterDistribution::Custom { values, weights } => {
                let mut cumulative = 0.0;
                for (value, weight) in values.iter().zip(weights) {
                    cumulative += weight;
                    if p <= cumulative + EPSILON {
                        return *value;
                    }
                }
                *values.last().expect("validated custom has values")
            }
        }
    }
}

/// Standard normal CDF via the Abramowitz & Stegun 7.1.26 erfc
/// approximation (max error 1.5e-7).
#[must_use]
pub fn norm_cdf(x: f64) -> f64 {
    0.5 * erfc(-x / std::f64::consts::SQRT_2)
}

fn erfc(x: f64) -> f64 {
    let abs_x = x.abs();
    let t = 1.0 / (1.0 + 0.3275911 * abs_x);
    let poly = t
        * (0.254829592
            + t * (-0.284496736 + t * (1.421413741 + t * (-1.453152027 + t * 1.061405429))));
    let erfc_abs = poly * (-abs_x * abs_x).exp();
    if x < 0.0 { 2.0 - erfc_abs } else { erfc_abs }
}

/// Standard normal inverse CDF, Beasley-Springer-Moro approximation.
#[must_use]
pub fn norm_inv_cdf(u: f64) -> f64 {
    const A: [f64; 4] = [
        2.50662823884,
        -18.61500062529,
        41.39119773534,
        -25.44106049637,
    ];
    const B: [f64; 4] = [
        -8.47351093090,
        23.08336743743,
        -21.06224101826,
        3.13082909833,
    ];
    const C: [f64; 9] = [
        0.3374754822726147,
        0.9761690190917186,
        0.1607979714918209,
        0.0276438810333863,
        0.0038405729373609,
        0.0003951896511919,
        0.0000321767881768,
        0.0000002888167364,
        0.0000003960315187,
    ];

    let u = u.clamp(1e-12, 1.0 - 1e-12);
    let y = u - 0.5;

    if y.abs() <= 0.42 {
        let r = y * y;
        let numer = A[0] + r * (A[1] + r * (A[2] + r * A[3]));
        let denom = 1.0 + r * (B[0] + r * (B[1] + r * (B[2] + r * B[3])));
        y * numer / denom
    } else {
        let r = if y > 0.0 { 1.0 - u } else { u };
        let k = (-r.ln()).ln();
        let mut x = C[8];
        for c in C[..8].iter().rev() {
            x = x * k + c;
        }
        if y < 0.0 { -x } else { x }
    }
}

/// Symmetric correlation matrix over named parameters.
///
/// Validated at construction: unit diagonal, symmetry within epsilon,
/// entries in `[-1, 1]`. Positive semi-definiteness is checked when the
/// Cholesky factor is taken, which the sampler does before any trial
/// runs (fail fast rather than projecting to a nearby valid matrix).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorrelationMatrix {
    /// Parameter names in matrix order.
    names: Vec<String>,
    /// Row-major entries, `names.len() x names.len()`.
    data: Vec<f64>,
}

impl CorrelationMatrix {
    /// Build from row-major entries over `names`.
    pub fn new(names: Vec<String>, data: Vec<f64>) -> Result<Self, ValidationError> {
        let n = names.len();
        if data.len() != n * n {
            return Err(ValidationError::CorrelationDimensions {
                expected: n * n,
                got: data.len(),
            });
        }

        for i in 0..n {
            let diag = data[i * n + i];
            if (diag - 1.0).abs() > EPSILON {
                return Err(ValidationError::CorrelationDiagonal {
                    index: i,
                    value: diag,
                });
            }
        }

        for i in 0..n {
            for j in (i + 1)..n {
                let ij = data[i * n + j];
                let ji = data[j * n + i];
                if (ij - ji).abs() > EPSILON {
                    return Err(ValidationError::CorrelationNotSymmetric { i, j });
                }
                if !(-1.0..=1.0).contains(&ij) {
                    return Err(ValidationError::CorrelationOutOfRange { i, j, value: ij });
                }
            }
        }

        Ok(Self { names, data })
    }

    /// Build from the nested-map wire shape `{ name: { name: rho } }`.
    ///
    /// Missing off-diagonal entries default to 0 (uncorrelated);
    /// missing diagonal entries default to 1.
    pub fn from_nested(
        entries: &std::collections::BTreeMap<String, std::collections::BTreeMap<String, f64>>,
    ) -> Result<Self, ValidationError> {
        let names: Vec<String> = entries.keys().cloned().collect();
        let n = names.len();
        let mut data = vec![0.0; n * n];
        for (i, row_name) in names.iter().enumerate() {
            for (j, col_name) in names.iter().enumerate() {
                let value = entries
                    .get(row_name)
                    .and_then(|row| row.get(col_name))
                    .copied();
                data[i * n + j] = value.unwrap_or(if i == j { 1.0 } else { 0.0 });
            }
        }
        Self::new(names, data)
    }

    #[must_use]
    pub fn names(&self) -> &[String] {
        &self.names
    }

    #[must_use]
    pub fn dim(&self) -> usize {
        self.names.len()
    }

    #[must_use]
    pub fn get(&self, i: usize, j: usize) -> f64 {
        self.data[i * self.names.len() + j]
    }

    /// Lower-triangular Cholesky factor `L` with `C = L * L^T`.
    ///
    /// Rows with a zero pivot are allowed (semi-definite case, e.g.
    /// perfectly correlated parameters); a negative pivot fails.
    pub fn cholesky(&self) -> Result<CholeskyFactor, ValidationError> {
        let n = self.dim();
        let mut lower = vec![0.0; n * n];

        for i in 0..n {
            for j in 0..=i {
                let mut sum = 0.0;
                for k in 0..j {
                    sum += lower[i * n + k] * lower[j * n + k];
                }
                if i == j {
                    let pivot = self.get(i, i) - sum;
                    if pivot < -EPSILON {
                        return Err(ValidationError::CorrelationNotPositiveSemiDefinite);
                    }
                    lower[i * n + i] = pivot.max(0.0).sqrt();
                } else {
                    let pivot = lower[j * n + j];
                    if pivot == 0.0 {
                        if (self.get(i, j) - sum).abs() > EPSILON {
                            return Err(ValidationError::CorrelationNotPositiveSemiDefinite);
                        }
                        lower[i * n + j] = 0.0;
                    } else {
                        lower[i * n + j] = (self.get(i, j) - sum) / pivot;
                    }
                }
            }
        }

        Ok(CholeskyFactor { data: lower, dim: n })
    }
}

/// Lower-triangular factor used to turn independent standard normals
/// into correlated ones (`w = L * z`).
#[derive(Debug, Clone)]
pub struct CholeskyFactor {
    data: Vec<f64>,
    dim: usize,
}

impl CholeskyFactor {
    #[must_use]
    pub fn dim(&self) -> usize {
        self.dim
    }

    /// Transform independent standard normals `z` into correlated
    /// normals. `z.len()` must equal `dim`.
    #[must_use]
    pub fn transform(&self, z: &[f64]) -> Vec<f64> {
        debug_assert_eq!(z.len(), self.dim);
        let n = self.dim;
        let mut w = vec![0.0; n];
        for i in 0..n {
            let mut sum = 0.0;
            for j in 0..=i {
                sum += self.data[i * n + j] * z[j];
            }
            w[i] = sum;
        }
        w
    }
}
