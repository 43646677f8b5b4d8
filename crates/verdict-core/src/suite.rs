//! The case-execution scheduler. Runs a target against every case of a
//! dataset with bounded concurrency, a per-case timeout, and per-case
//! retries, then scores, aggregates, and checks assertions.
//!
//! Ordering guarantee: `results` always comes back in original dataset
//! order, regardless of completion order. Completions are written into a
//! preallocated slot vector by case index, so no post-sort is needed.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::future::join_all;
use futures::stream::{self, StreamExt};
use tracing::{debug, info, warn};
use verdict_types::{CaseResult, EvalCase, EvalSuiteResult, SuiteStats};

use crate::assertion::Assertion;
use crate::dataset::Dataset;
use crate::error::Error;
use crate::judge::Judge;
use crate::metric::{CaseMetric, Metric, SuiteMetric};
use crate::target::{Agent, AgentRequest, AgentResponse, AgentRuntime, Target};

/// Progress notification fired once per completed case.
#[derive(Debug, Clone)]
pub struct Progress {
	pub completed: usize,
	pub total: usize,
	pub current_input: String,
}

pub type ProgressFn = dyn Fn(Progress) + Send + Sync;

enum TargetKind {
	Fn(Arc<dyn Target>),
	Agent {
		agent: Arc<dyn Agent>,
		runtime: Arc<dyn AgentRuntime>,
	},
}

pub struct EvalSuiteBuilder {
	dataset: Option<Dataset>,
	target: Option<Arc<dyn Target>>,
	agent: Option<(Arc<dyn Agent>, Arc<dyn AgentRuntime>)>,
	metrics: Vec<Metric>,
	judge: Option<Arc<dyn Judge>>,
	assertions: Vec<Assertion>,
	concurrency: usize,
	timeout: Duration,
	retries: u32,
	on_progress: Option<Arc<ProgressFn>>,
}

impl EvalSuiteBuilder {
	pub fn new() -> Self {
		Self {
			dataset: None,
			target: None,
			agent: None,
			metrics: Vec::new(),
			judge: None,
			assertions: Vec::new(),
			concurrency: 5,
			timeout: Duration::from_secs(30),
			retries: 0,
			on_progress: None,
		}
	}

	pub fn dataset(mut self, dataset: Dataset) -> Self {
		self.dataset = Some(dataset);
		self
	}

	pub fn target(mut self, target: Arc<dyn Target>) -> Self {
		self.target = Some(target);
		self
	}

	pub fn agent(mut self, agent: Arc<dyn Agent>, runtime: Arc<dyn AgentRuntime>) -> Self {
		self.agent = Some((agent, runtime));
		self
	}

	pub fn metric(mut self, metric: impl Into<Metric>) -> Self {
		self.metrics.push(metric.into());
		self
	}

	pub fn metrics<I>(mut self, metrics: I) -> Self
	where
		I: IntoIterator<Item = Metric>,
	{
		self.metrics.extend(metrics);
		self
	}

	pub fn judge(mut self, judge: Arc<dyn Judge>) -> Self {
		self.judge = Some(judge);
		self
	}

	pub fn assertion(mut self, assertion: Assertion) -> Self {
		self.assertions.push(assertion);
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

	pub fn on_progress(mut self, f: impl Fn(Progress) + Send + Sync + 'static) -> Self {
		self.on_progress = Some(Arc::new(f));
		self
	}

	/// Validate eagerly. Misconfiguration is a programmer error and is
	/// surfaced here, never deferred into `run()`.
	pub fn build(self) -> Result<EvalSuite, Error> {
		let dataset = self
			.dataset
			.ok_or_else(|| Error::InvalidConfig("dataset must be set".to_string()))?;
		let target = match (self.target, self.agent) {
			(Some(t), None) => TargetKind::Fn(t),
			(None, Some((agent, runtime))) => TargetKind::Agent { agent, runtime },
			(None, None) => return Err(Error::NoTarget),
			(Some(_), Some(_)) => return Err(Error::AmbiguousTarget),
		};

		// Judge templates are bound here so scoring later is uniform.
		let mut case_metrics: Vec<Arc<dyn CaseMetric>> = Vec::new();
		let mut suite_metrics: Vec<Arc<dyn SuiteMetric>> = Vec::new();
		for metric in self.metrics {
			match metric {
				Metric::Deterministic(m) => case_metrics.push(m),
				Metric::Statistical(m) => suite_metrics.push(m),
				Metric::Judge(template) => {
					let judge = self
						.judge
						.clone()
						.ok_or_else(|| Error::JudgeRequired(template.name.clone()))?;
					match template.bind(judge) {
						Metric::Deterministic(m) => case_metrics.push(m),
						_ => unreachable!("bind produces a deterministic metric"),
					}
				}
			}
		}

		Ok(EvalSuite {
			dataset,
			target,
			case_metrics,
			suite_metrics,
			assertions: self.assertions,
			concurrency: self.concurrency,
			timeout: self.timeout,
			retries: self.retries,
			on_progress: self.on_progress,
		})
	}
}

impl Default for EvalSuiteBuilder {
	fn default() -> Self {
		Self::new()
	}
}

pub struct EvalSuite {
	dataset: Dataset,
	target: TargetKind,
	case_metrics: Vec<Arc<dyn CaseMetric>>,
	suite_metrics: Vec<Arc<dyn SuiteMetric>>,
	assertions: Vec<Assertion>,
	concurrency: usize,
	timeout: Duration,
	retries: u32,
	on_progress: Option<Arc<ProgressFn>>,
}

impl std::fmt::Debug for EvalSuite {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("EvalSuite")
			.field("dataset", &self.dataset)
			.field("case_metrics", &self.case_metrics.len())
			.field("suite_metrics", &self.suite_metrics.len())
			.field("assertions", &self.assertions.len())
			.field("concurrency", &self.concurrency)
			.field("timeout", &self.timeout)
			.field("retries", &self.retries)
			.finish_non_exhaustive()
	}
}

impl EvalSuite {
	pub fn builder() -> EvalSuiteBuilder {
		EvalSuiteBuilder::new()
	}

	pub fn dataset(&self) -> &Dataset {
		&self.dataset
	}

	/// Execute every case, score, aggregate, and evaluate assertions.
	/// Per-case failures never surface as errors: after the configured
	/// retries a case falls back to an empty-output result.
	pub async fn run(&self) -> EvalSuiteResult {
		let run_started = Instant::now();
		let cases: Vec<EvalCase> = self.dataset.cases().to_vec();
		let total = cases.len();

		let mut slots: Vec<Option<CaseResult>> = (0..total).map(|_| None).collect();
		{
			let mut in_flight = stream::iter(cases.into_iter().enumerate())
				.map(|(idx, case)| async move { (idx, self.run_case(idx, case).await) })
				.buffer_unordered(self.concurrency);
			let mut completed = 0usize;
			while let Some((idx, result)) = in_flight.next().await {
				completed += 1;
				debug!(case = idx, duration_ms = result.duration_ms, "case completed");
				if let Some(cb) = &self.on_progress {
					cb(Progress {
						completed,
						total,
						current_input: result.case.input.clone(),
					});
				}
				slots[idx] = Some(result);
			}
		}
		let mut results: Vec<CaseResult> = slots.into_iter().flatten().collect();

		// Per-case metrics fan out in parallel within each case.
		for result in &mut results {
			let scores = join_all(self.case_metrics.iter().map(|m| m.score(result))).await;
			result.scores = scores;
		}

		let mut by_metric: BTreeMap<String, Vec<f64>> = BTreeMap::new();
		for result in &results {
			for score in &result.scores {
				by_metric.entry(score.name.clone()).or_default().push(score.score);
			}
		}
		let mut aggregated: BTreeMap<_, _> = by_metric
			.iter()
			.map(|(name, values)| (name.clone(), crate::stats::aggregate(name, values)))
			.collect();

		let mut suite_scores = Vec::new();
		for metric in &self.suite_metrics {
			let score = metric.score(&results);
			aggregated.insert(
				metric.name().to_string(),
				crate::stats::aggregate(metric.name(), &[score.score]),
			);
			suite_scores.push(score);
		}

		let stats = SuiteStats {
			total,
			duration_ms: run_started.elapsed().as_millis() as u64,
			cost: results
				.iter()
				.map(|r| r.usage.as_ref().map(|u| u.cost).unwrap_or(0.0))
				.sum(),
		};

		let assertions = self
			.assertions
			.iter()
			.map(|a| a.evaluate(&aggregated, &stats))
			.collect();

		info!(
			total,
			duration_ms = stats.duration_ms,
			metrics = aggregated.len(),
			"suite run complete"
		);

		EvalSuiteResult { results, aggregated, suite_scores, assertions, stats }
	}

	/// One case: invoke the target under the timeout, retrying the same
	/// slot synchronously on errors. A timeout ends the case immediately
	/// (the attempt future is dropped, cancelling the in-flight call) and
	/// is never retried.
	async fn run_case(&self, idx: usize, case: EvalCase) -> CaseResult {
		let started = Instant::now();
		let mut attempt = 0u32;
		loop {
			match tokio::time::timeout(self.timeout, self.invoke(&case)).await {
				Ok(Ok(response)) => {
					return CaseResult {
						case,
						output: response.output,
						duration_ms: started.elapsed().as_millis() as u64,
						error: None,
						usage: response.usage,
						tool_calls: response.tool_calls,
						scores: Vec::new(),
					};
				}
				Ok(Err(err)) => {
					if attempt < self.retries {
						attempt += 1;
						warn!(case = idx, attempt, error = %err, "target errored, retrying");
						continue;
					}
					warn!(case = idx, error = %err, "target errored, retries exhausted");
					return empty_result(case, started, Some(err.to_string()));
				}
				Err(_) => {
					warn!(case = idx, timeout_ms = self.timeout.as_millis() as u64, "case timed out");
					return empty_result(
						case,
						started,
						Some(format!("timed out after {}ms", self.timeout.as_millis())),
					);
				}
			}
		}
	}

	async fn invoke(&self, case: &EvalCase) -> anyhow::Result<AgentResponse> {
		match &self.target {
			TargetKind::Fn(target) => Ok(AgentResponse {
				output: target.run(&case.input).await?,
				usage: None,
				tool_calls: Vec::new(),
			}),
			TargetKind::Agent { agent, runtime } => {
				runtime
					.run(
						agent.as_ref(),
						AgentRequest {
							input: case.input.clone(),
							context: case.context.clone(),
						},
					)
					.await
			}
		}
	}
}

fn empty_result(case: EvalCase, started: Instant, error: Option<String>) -> CaseResult {
	CaseResult {
		case,
		output: String::new(),
		duration_ms: started.elapsed().as_millis() as u64,
		error,
		usage: None,
		tool_calls: Vec::new(),
		scores: Vec::new(),
	}
}
