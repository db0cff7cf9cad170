use std::fmt;

/// Caller-fixable input errors. Surfaced before any trial runs.
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationError {
    UnknownTargetMetric(String),
    UnknownDriver {
        assumption: String,
        driver: String,
    },
    DriverCycle(String),
    NegativeMetric {
        metric: String,
        value: f64,
    },
    InvalidDistribution {
        parameter: String,
        reason: &'static str,
    },
    /// A sampled parameter name has no matching assumption to override.
    UnknownParameter(String),
    /// A correlation matrix entry references an undeclared parameter.
    UnknownCorrelationParameter(String),
    CorrelationDimensions {
        expected: usize,
        got: usize,
    },
    CorrelationDiagonal {
        index: usize,
        value: f64,
    },
    CorrelationNotSymmetric {
        i: usize,
        j: usize,
    },
    CorrelationOutOfRange {
        i: usize,
        j: usize,
        value: f64,
    },
    CorrelationNotPositiveSemiDefinite,
    OutOfBounds {
        field: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationError::UnknownTargetMetric(name) => {
                write!(f, "target metric {name:?} not present in baseline")
            }
            ValidationError::UnknownDriver { assumption, driver } => {
                write!(
                    f,
                    "assumption {assumption:?} references driver {driver:?} which does not resolve"
                )
            }
            ValidationError::DriverCycle(metric) => {
                write!(f, "driver chain through metric {metric:?} is cyclic")
            }
            ValidationError::NegativeMetric { metric, value } => {
                write!(
                    f,
                    "metric {metric:?} is declared non-negative but projected to {value}"
                )
            }
            ValidationError::InvalidDistribution { parameter, reason } => {
                write!(f, "invalid distribution for parameter {parameter:?}: {reason}")
            }
            ValidationError::UnknownParameter(name) => {
                write!(f, "parameter {name:?} does not match any assumption")
            }
            ValidationError::UnknownCorrelationParameter(name) => {
                write!(
                    f,
                    "correlation matrix references undeclared parameter {name:?}"
                )
            }
            ValidationError::CorrelationDimensions { expected, got } => {
                write!(
                    f,
                    "correlation matrix has {got} entries, expected {expected}"
                )
            }
            ValidationError::CorrelationDiagonal { index, value } => {
                write!(
                    f,
                    "correlation matrix diagonal at {index} is {value}, expected 1.0"
                )
            }
            ValidationError::CorrelationNotSymmetric { i, j } => {
                write!(f, "correlation matrix is not symmetric at ({i}, {j})")
            }
            ValidationError::CorrelationOutOfRange { i, j, value } => {
                write!(
                    f,
                    "correlation at ({i}, {j}) is {value}, must be in [-1, 1]"
                )
            }
            ValidationError::CorrelationNotPositiveSemiDefinite => {
                write!(f, "correlation matrix is not positive semi-definite")
            }
            ValidationError::OutOfBounds {
                field,
                value,
                min,
                max,
            } => {
                write!(f, "{field} = {value} is outside [{min}, {max}]")
            }
        }
    }
}

impl std::error::Error for ValidationError {}

/// A single trial or sweep step that could not be evaluated.
///
/// Recovered locally: the trial is excluded from aggregation and counted,
/// never treated as zero.
#[derive(Debug, Clone, PartialEq)]
pub enum TrialFailure {
    /// The projector rejected the sampled parameter combination.
    Projection(ValidationError),
    /// The projected value was NaN or infinite.
    NonFinite { metric: String },
}

impl fmt::Display for TrialFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrialFailure::Projection(e) => write!(f, "{e}"),
            TrialFailure::NonFinite { metric } => {
                write!(f, "metric {metric:?} evaluated to a non-finite value")
            }
        }
    }
}

impl std::error::Error for TrialFailure {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            TrialFailure::Projection(e) => Some(e),
            TrialFailure::NonFinite { .. } => None,
        }
    }
}

impl From<ValidationError> for TrialFailure {
    fn from(e: ValidationError) -> Self {
        TrialFailure::Projection(e)
    }
}

/// Fatal run errors surfaced to the caller.
#[derive(Debug, Clone, PartialEq)]
pub enum RunError {
    Validation(ValidationError),
    /// Trial failure rate crossed the hard ceiling.
    FailureRateExceeded { failed: usize, total: usize },
    /// Cancelled before any valid trial completed.
    Cancelled,
    /// Baseline snapshot could not be fetched from the provider.
    BaselineUnavailable(String),
}

impl fmt::Display for RunError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunError::Validation(e) => write!(f, "{e}"),
            RunError::FailureRateExceeded { failed, total } => {
                write!(f, "{failed} of {total} trials failed, above the hard ceiling")
            }
            RunError::Cancelled => write!(f, "run cancelled before any valid trial completed"),
            RunError::BaselineUnavailable(msg) => {
                write!(f, "baseline snapshot unavailable: {msg}")
            }
        }
    }
}

impl std::error::Error for RunError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RunError::Validation(e) => Some(e),
            _ => None,
        }
    }
}

impl From<ValidationError> for RunError {
    fn from(e: ValidationError) -> Self {
        RunError::Validation(e)
    }
}

pub type Result<T> = std::result::Result<T, RunError>;
