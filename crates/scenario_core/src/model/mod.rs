mod assumption;
mod distribution;
mod results;

pub use assumption::{Assumption, AssumptionKind, MetricSnapshot, MetricSpec};
pub use distribution::{
    CholeskyFactor, CorrelationMatrix, ParameterDistribution, norm_cdf, norm_inv_cdf,
};
pub use results::{
    Comparison, HistogramBin, MetricDistribution, MonteCarloSummary, ParameterCrossEffect,
    ParameterSensitivity, ScenarioOutcome, SensitivityReport, StressTestOutcome,
    ThresholdProbability, TornadoSeries, ValueAtRisk,
};
