//! Suite-level statistical metrics. By convention their score is 0 and the
//! real numbers ride in `metadata`; the suite folds them into the
//! aggregated map under their own names.

use serde_json::json;
use verdict_types::{CaseResult, MetricScore};

use crate::metric::SuiteMetric;
use crate::stats;

/// Latency distribution over per-case durations.
pub struct LatencyStats;

impl SuiteMetric for LatencyStats {
    fn name(&self) -> &str {
        "latency"
    }

    fn score(&self, results: &[CaseResult]) -> MetricScore {
        let durations: Vec<f64> = results.iter().map(|r| r.duration_ms as f64).collect();
        MetricScore::new(self.name(), 0.0).with_metadata(json!({
            "mean_ms": stats::mean(&durations),
            "p50_ms": stats::percentile(&durations, 0.50),
            "p95_ms": stats::percentile(&durations, 0.95),
            "p99_ms": stats::percentile(&durations, 0.99),
            "max_ms": durations.iter().cloned().fold(0.0, f64::max),
        }))
    }
}

/// Total and per-case cost, from reported usage.
pub struct CostStats;

impl SuiteMetric for CostStats {
    fn name(&self) -> &str {
        "cost"
    }

    fn score(&self, results: &[CaseResult]) -> MetricScore {
        let costs: Vec<f64> = results
            .iter()
            .map(|r| r.usage.as_ref().map(|u| u.cost).unwrap_or(0.0))
            .collect();
        MetricScore::new(self.name(), 0.0).with_metadata(json!({
            "total": costs.iter().sum::<f64>(),
            "mean": stats::mean(&costs),
            "max": costs.iter().cloned().fold(0.0, f64::max),
        }))
    }
}

/// Token throughput, from reported usage.
pub struct TokenStats;

impl SuiteMetric for TokenStats {
    fn name(&self) -> &str {
        "tokens"
    }

    fn score(&self, results: &[CaseResult]) -> MetricScore {
        let mut input = 0u64;
        let mut output = 0u64;
        for r in results {
            if let Some(u) = &r.usage {
                input += u.input_tokens as u64;
                output += u.output_tokens as u64;
            }
        }
        MetricScore::new(self.name(), 0.0).with_metadata(json!({
            "input_tokens": input,
            "output_tokens": output,
            "total_tokens": input + output,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use verdict_types::{EvalCase, Usage};

    fn result(duration_ms: u64, cost: f64) -> CaseResult {
        CaseResult {
            case: EvalCase::new("q"),
            output: "o".to_string(),
            duration_ms,
            error: None,
            usage: Some(Usage {
                input_tokens: 10,
                output_tokens: 5,
                total_tokens: 15,
                cost,
                duration_ms,
            }),
            tool_calls: vec![],
            scores: vec![],
        }
    }

    #[test]
    fn latency_metadata_carries_the_distribution() {
        let results: Vec<CaseResult> = (1..=10).map(|i| result(i * 10, 0.0)).collect();
        let score = LatencyStats.score(&results);
        assert_eq!(score.score, 0.0);
        let meta = score.metadata.unwrap();
        assert_eq!(meta["mean_ms"], 55.0);
        assert_eq!(meta["max_ms"], 100.0);
    }

    #[test]
    fn cost_and_tokens_sum_over_usage() {
        let results = vec![result(1, 0.002), result(1, 0.003)];
        let cost = CostStats.score(&results);
        assert!((cost.metadata.unwrap()["total"].as_f64().unwrap() - 0.005).abs() < 1e-12);
        let tokens = TokenStats.score(&results);
        assert_eq!(tokens.metadata.unwrap()["total_tokens"], 30);
    }
}
