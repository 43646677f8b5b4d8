//! Baseline-versus-challenger comparison. Two suites run fully in
//! parallel over the same dataset and metrics; every metric's score
//! distribution is then tested for significance and an overall winner is
//! determined by majority vote.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use tracing::info;
use verdict_types::{
    ComparisonMethod, ComparisonResult, ComparisonSummary, EvalSuiteResult, MetricComparison,
    Winner,
};

use crate::dataset::Dataset;
use crate::error::Error;
use crate::judge::Judge;
use crate::metric::Metric;
use crate::stats;
use crate::suite::{EvalSuite, EvalSuiteBuilder};
use crate::target::{Agent, AgentRuntime, Target};

pub struct EvalComparisonBuilder {
    dataset: Option<Dataset>,
    metrics: Vec<Metric>,
    judge: Option<Arc<dyn Judge>>,
    baseline: Option<Arc<dyn Target>>,
    challenger: Option<Arc<dyn Target>>,
    baseline_agent: Option<(Arc<dyn Agent>, Arc<dyn AgentRuntime>)>,
    challenger_agent: Option<(Arc<dyn Agent>, Arc<dyn AgentRuntime>)>,
    concurrency: usize,
    timeout: Duration,
    retries: u32,
}

impl EvalComparisonBuilder {
    pub fn new() -> Self {
        Self {
            dataset: None,
            metrics: Vec::new(),
            judge: None,
            baseline: None,
            challenger: None,
            baseline_agent: None,
            challenger_agent: None,
            concurrency: 5,
            timeout: Duration::from_secs(30),
            retries: 0,
        }
    }

    pub fn dataset(mut self, dataset: Dataset) -> Self {
        self.dataset = Some(dataset);
        self
    }

    pub fn metric(mut self, metric: impl Into<Metric>) -> Self {
        self.metrics.push(metric.into());
        self
    }

    pub fn judge(mut self, judge: Arc<dyn Judge>) -> Self {
        self.judge = Some(judge);
        self
    }

    pub fn baseline(mut self, target: Arc<dyn Target>) -> Self {
        self.baseline = Some(target);
        self
    }

    pub fn challenger(mut self, target: Arc<dyn Target>) -> Self {
        self.challenger = Some(target);
        self
    }

    pub fn baseline_agent(
        mut self,
        agent: Arc<dyn Agent>,
        runtime: Arc<dyn AgentRuntime>,
    ) -> Self {
        self.baseline_agent = Some((agent, runtime));
        self
    }

    pub fn challenger_agent(
        mut self,
        agent: Arc<dyn Agent>,
        runtime: Arc<dyn AgentRuntime>,
    ) -> Self {
        self.challenger_agent = Some((agent, runtime));
        self
    }

    pub fn concurrency(mut self, n: usize) -> Self {
        self.concurrency = n.max(1);
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn retries(mut self, retries: u32) -> Self {
        self.retries = retries;
        self
    }

    /// Validates both sides eagerly; each suite gets its own scheduling
    /// pool, so total in-flight work may reach twice `concurrency`.
    pub fn build(self) -> Result<EvalComparison, Error> {
        let dataset = self
            .dataset
            .ok_or_else(|| Error::InvalidConfig("dataset must be set".to_string()))?;

        let make_suite = |target: Option<Arc<dyn Target>>,
                          agent: Option<(Arc<dyn Agent>, Arc<dyn AgentRuntime>)>|
         -> Result<EvalSuite, Error> {
            let mut builder = EvalSuiteBuilder::new()
                .dataset(dataset.clone())
                .metrics(self.metrics.iter().cloned())
                .concurrency(self.concurrency)
                .timeout(self.timeout)
                .retries(self.retries);
            if let Some(judge) = &self.judge {
                builder = builder.judge(judge.clone());
            }
            if let Some(target) = target {
                builder = builder.target(target);
            }
            if let Some((agent, runtime)) = agent {
                builder = builder.agent(agent, runtime);
            }
            builder.build()
        };

        Ok(EvalComparison {
            baseline: make_suite(self.baseline, self.baseline_agent)?,
            challenger: make_suite(self.challenger, self.challenger_agent)?,
        })
    }
}

impl Default for EvalComparisonBuilder {
    fn default() -> Self {
        Self::new()
    }
}

pub struct EvalComparison {
    baseline: EvalSuite,
    challenger: EvalSuite,
}

impl EvalComparison {
    pub fn builder() -> EvalComparisonBuilder {
        EvalComparisonBuilder::new()
    }

    pub async fn run(&self) -> ComparisonResult {
        // No shared scheduling state between the two pools.
        let (baseline, challenger) =
            tokio::join!(self.baseline.run(), self.challenger.run());
        let summary = compare_results(&baseline, &challenger);
        info!(
            winner = ?summary.winner,
            metrics = summary.metrics.len(),
            "comparison complete"
        );
        ComparisonResult { summary, baseline, challenger }
    }
}

/// Statistically compare two completed runs over the same dataset.
pub fn compare_results(
    baseline: &EvalSuiteResult,
    challenger: &EvalSuiteResult,
) -> ComparisonSummary {
    // Metric names observed in the baseline's per-case scores drive the
    // comparison; suite-level metrics have no per-case distribution.
    let mut metric_names: Vec<String> = Vec::new();
    for result in &baseline.results {
        for score in &result.scores {
            if !metric_names.contains(&score.name) {
                metric_names.push(score.name.clone());
            }
        }
    }

    let mut metrics = BTreeMap::new();
    for name in metric_names {
        let a = score_vector(baseline, &name);
        let b = score_vector(challenger, &name);
        metrics.insert(name, compare_metric(&a, &b));
    }

    let challenger_wins = metrics.values().filter(|m| m.winner == Winner::Challenger).count();
    let baseline_wins = metrics.values().filter(|m| m.winner == Winner::Baseline).count();
    let winner = match challenger_wins.cmp(&baseline_wins) {
        std::cmp::Ordering::Greater => Winner::Challenger,
        std::cmp::Ordering::Less => Winner::Baseline,
        std::cmp::Ordering::Equal => Winner::Tie,
    };

    ComparisonSummary { winner, metrics }
}

/// Per-case scores for one metric, indexed by dataset case order; cases
/// missing the metric contribute 0.
fn score_vector(result: &EvalSuiteResult, metric_name: &str) -> Vec<f64> {
    result
        .results
        .iter()
        .map(|r| {
            r.scores
                .iter()
                .find(|s| s.name == metric_name)
                .map(|s| s.score)
                .unwrap_or(0.0)
        })
        .collect()
}

fn is_binary(values: &[f64]) -> bool {
    values.iter().all(|&v| v == 0.0 || v == 1.0)
}

fn compare_metric(baseline: &[f64], challenger: &[f64]) -> MetricComparison {
    let base_mean = stats::mean(baseline);
    let chal_mean = stats::mean(challenger);

    if baseline.len() < 2 {
        return MetricComparison {
            baseline: base_mean,
            challenger: chal_mean,
            p_value: 1.0,
            significant: false,
            winner: Winner::Tie,
            method: ComparisonMethod::TooFewSamples,
        };
    }

    let (p_value, significant, method) = if is_binary(baseline) && is_binary(challenger) {
        // Paired binary outcomes: only the discordant pairs carry signal.
        let mut b = 0u64;
        let mut c = 0u64;
        for (&x, &y) in baseline.iter().zip(challenger.iter()) {
            if x == 1.0 && y == 0.0 {
                b += 1;
            } else if x == 0.0 && y == 1.0 {
                c += 1;
            }
        }
        let r = stats::mcnemars_test(b, c);
        (r.p_value, r.significant, ComparisonMethod::McNemar)
    } else {
        // Lengths always match here: both vectors are indexed by the same
        // dataset, so the precondition cannot fail.
        let r = stats::paired_t_test(baseline, challenger)
            .expect("score vectors share the dataset length");
        (r.p_value, r.significant, ComparisonMethod::PairedT)
    };

    let winner = if !significant {
        Winner::Tie
    } else if chal_mean > base_mean {
        Winner::Challenger
    } else {
        Winner::Baseline
    };

    MetricComparison {
        baseline: base_mean,
        challenger: chal_mean,
        p_value,
        significant,
        winner,
        method,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use verdict_types::EvalCase;

    use crate::metric::Metric;
    use crate::metrics::exact::ExactMatch;
    use crate::target::from_async_fn;

    fn dataset(n: usize) -> Dataset {
        Dataset::new(
            (0..n)
                .map(|i| EvalCase::with_expected(format!("q{i}"), format!("a{i}")))
                .collect(),
        )
    }

    #[test]
    fn binary_detection() {
        assert!(is_binary(&[0.0, 1.0, 1.0]));
        assert!(!is_binary(&[0.0, 0.5, 1.0]));
    }

    #[test]
    fn too_few_samples_short_circuits_to_tie() {
        let c = compare_metric(&[1.0], &[0.0]);
        assert_eq!(c.method, ComparisonMethod::TooFewSamples);
        assert_eq!(c.p_value, 1.0);
        assert_eq!(c.winner, Winner::Tie);
    }

    #[test]
    fn binary_vectors_use_mcnemar() {
        let baseline = vec![0.0; 10];
        let challenger = vec![1.0; 10];
        let c = compare_metric(&baseline, &challenger);
        assert_eq!(c.method, ComparisonMethod::McNemar);
        assert!(c.significant);
        assert_eq!(c.winner, Winner::Challenger);
    }

    #[test]
    fn graded_vectors_use_paired_t() {
        let baseline = vec![0.5, 0.55, 0.45, 0.52, 0.48, 0.5];
        let challenger = vec![0.9, 0.85, 0.95, 0.88, 0.92, 0.9];
        let c = compare_metric(&baseline, &challenger);
        assert_eq!(c.method, ComparisonMethod::PairedT);
        assert!(c.significant);
        assert_eq!(c.winner, Winner::Challenger);
    }

    #[tokio::test]
    async fn challenger_sweep_wins_end_to_end() {
        let comparison = EvalComparison::builder()
            .dataset(dataset(10))
            .metric(Metric::Deterministic(Arc::new(ExactMatch::new())))
            .baseline(from_async_fn(|_input| async move { Ok("wrong".to_string()) }))
            .challenger(from_async_fn(|input: String| async move {
                // Echo the expected answer for q<i>.
                Ok(input.replace('q', "a"))
            }))
            .build()
            .unwrap();
        let result = comparison.run().await;

        assert_eq!(result.baseline.aggregated["exact_match"].mean, 0.0);
        assert_eq!(result.challenger.aggregated["exact_match"].mean, 1.0);
        let m = &result.summary.metrics["exact_match"];
        assert_eq!(m.method, ComparisonMethod::McNemar);
        assert!(m.significant);
        assert_eq!(m.winner, Winner::Challenger);
        assert_eq!(result.summary.winner, Winner::Challenger);
    }

    #[tokio::test]
    async fn identical_targets_tie_on_every_metric() {
        let make_target =
            || from_async_fn(|input: String| async move { Ok(input.replace('q', "a")) });
        let comparison = EvalComparison::builder()
            .dataset(dataset(6))
            .metric(Metric::Deterministic(Arc::new(ExactMatch::new())))
            .baseline(make_target())
            .challenger(make_target())
            .build()
            .unwrap();
        let result = comparison.run().await;
        assert_eq!(result.summary.winner, Winner::Tie);
        for m in result.summary.metrics.values() {
            assert_eq!(m.winner, Winner::Tie);
            assert!(!m.significant);
        }
    }
}
