//! Pass/fail assertions over a run's aggregated metrics and stats.
//! Evaluation never errors: bad baseline files, missing metrics, and
//! failing custom checks all surface as failed `AssertionResult`s.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use verdict_types::{AggregatedMetric, AssertionResult, SuiteStats};

pub type CheckFn =
    dyn Fn(&BTreeMap<String, AggregatedMetric>, &SuiteStats) -> anyhow::Result<bool> + Send + Sync;

pub enum Assertion {
    Threshold {
        /// `"name"` compares the mean; `"name.field"` a specific aggregate
        /// field such as `p95`.
        metric_path: String,
        value: f64,
    },
    NoRegression {
        baseline_path: PathBuf,
        tolerance: f64,
    },
    Custom {
        name: String,
        check: Arc<CheckFn>,
        message: Option<String>,
    },
}

/// Whether smaller values of this metric are better. Latency- and
/// cost-flavored names invert the comparison direction.
pub(crate) fn lower_is_better(name: &str) -> bool {
    let n = name.to_lowercase();
    n.starts_with("latency") || n.starts_with("cost") || n.ends_with("duration") || n.ends_with("latency")
}

impl Assertion {
    pub fn threshold(metric_path: impl Into<String>, value: f64) -> Self {
        Assertion::Threshold { metric_path: metric_path.into(), value }
    }

    pub fn no_regression(baseline_path: impl Into<PathBuf>) -> Self {
        Assertion::NoRegression { baseline_path: baseline_path.into(), tolerance: 0.05 }
    }

    pub fn with_tolerance(self, tolerance: f64) -> Self {
        match self {
            Assertion::NoRegression { baseline_path, .. } => {
                Assertion::NoRegression { baseline_path, tolerance }
            }
            other => other,
        }
    }

    pub fn custom(
        name: impl Into<String>,
        check: impl Fn(&BTreeMap<String, AggregatedMetric>, &SuiteStats) -> anyhow::Result<bool>
            + Send
            + Sync
            + 'static,
    ) -> Self {
        Assertion::Custom { name: name.into(), check: Arc::new(check), message: None }
    }

    pub fn with_message(self, message: impl Into<String>) -> Self {
        match self {
            Assertion::Custom { name, check, .. } => {
                Assertion::Custom { name, check, message: Some(message.into()) }
            }
            other => other,
        }
    }

    pub fn evaluate(
        &self,
        aggregated: &BTreeMap<String, AggregatedMetric>,
        stats: &SuiteStats,
    ) -> AssertionResult {
        match self {
            Assertion::Threshold { metric_path, value } => {
                evaluate_threshold(metric_path, *value, aggregated)
            }
            Assertion::NoRegression { baseline_path, tolerance } => {
                evaluate_no_regression(baseline_path, *tolerance, aggregated)
            }
            Assertion::Custom { name, check, message } => match check(aggregated, stats) {
                Ok(passed) => AssertionResult {
                    name: name.clone(),
                    passed,
                    message: message
                        .clone()
                        .unwrap_or_else(|| if passed { "check passed" } else { "check failed" }.to_string()),
                    actual: None,
                    expected: None,
                },
                Err(err) => AssertionResult {
                    name: name.clone(),
                    passed: false,
                    message: format!("check errored: {err}"),
                    actual: None,
                    expected: None,
                },
            },
        }
    }
}

fn evaluate_threshold(
    metric_path: &str,
    value: f64,
    aggregated: &BTreeMap<String, AggregatedMetric>,
) -> AssertionResult {
    let name = format!("threshold({metric_path})");
    let (metric_name, field) = match metric_path.split_once('.') {
        Some((m, f)) => (m, f),
        None => (metric_path, "mean"),
    };
    let Some(agg) = aggregated.get(metric_name) else {
        return AssertionResult {
            name,
            passed: false,
            message: format!("metric '{metric_name}' not found"),
            actual: None,
            expected: Some(value),
        };
    };
    let Some(actual) = agg.field(field) else {
        return AssertionResult {
            name,
            passed: false,
            message: format!("unknown aggregate field '{field}'"),
            actual: None,
            expected: Some(value),
        };
    };
    let lower = lower_is_better(metric_name);
    let passed = if lower { actual <= value } else { actual >= value };
    let direction = if lower { "<=" } else { ">=" };
    AssertionResult {
        name,
        passed,
        message: format!("{metric_path} = {actual:.4}, required {direction} {value:.4}"),
        actual: Some(actual),
        expected: Some(value),
    }
}

fn evaluate_no_regression(
    baseline_path: &std::path::Path,
    tolerance: f64,
    aggregated: &BTreeMap<String, AggregatedMetric>,
) -> AssertionResult {
    let name = "no_regression".to_string();
    let baseline: BTreeMap<String, f64> = match std::fs::read_to_string(baseline_path)
        .map_err(anyhow::Error::from)
        .and_then(|s| serde_json::from_str(&s).map_err(anyhow::Error::from))
    {
        Ok(map) => map,
        Err(err) => {
            return AssertionResult {
                name,
                passed: false,
                message: format!("could not read baseline {}: {err}", baseline_path.display()),
                actual: None,
                expected: None,
            };
        }
    };

    // Small slack so "exactly at tolerance" passes despite float rounding.
    const EPS: f64 = 1e-9;
    let mut regressions = Vec::new();
    for (metric_name, baseline_value) in &baseline {
        // Metrics absent from the current run are skipped.
        let Some(agg) = aggregated.get(metric_name) else { continue };
        let current = agg.mean;
        let worsened = if lower_is_better(metric_name) {
            current > baseline_value * (1.0 + tolerance) + EPS
        } else {
            current < baseline_value * (1.0 - tolerance) - EPS
        };
        if worsened {
            regressions.push(format!("{metric_name}: {baseline_value:.4} -> {current:.4}"));
        }
    }

    if regressions.is_empty() {
        AssertionResult {
            name,
            passed: true,
            message: format!("no regressions beyond {:.0}% tolerance", tolerance * 100.0),
            actual: None,
            expected: None,
        }
    } else {
        AssertionResult {
            name,
            passed: false,
            message: format!("regressed: {}", regressions.join(", ")),
            actual: None,
            expected: None,
        }
    }
}
