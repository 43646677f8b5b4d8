use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tabled::Tabled;

/// One evaluation case: an input plus optional expected output and
/// free-form context/metadata. Immutable once loaded into a dataset.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvalCase {
	pub input: String,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub expected: Option<String>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub context: Option<BTreeMap<String, Value>>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub metadata: Option<BTreeMap<String, Value>>,
}

impl EvalCase {
	pub fn new(input: impl Into<String>) -> Self {
		Self { input: input.into(), expected: None, context: None, metadata: None }
	}

	pub fn with_expected(input: impl Into<String>, expected: impl Into<String>) -> Self {
		Self {
			input: input.into(),
			expected: Some(expected.into()),
			context: None,
			metadata: None,
		}
	}
}

/// Token/cost accounting reported by an agent runtime for one case.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Usage {
	pub input_tokens: u32,
	pub output_tokens: u32,
	pub total_tokens: u32,
	pub cost: f64,
	pub duration_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
	pub name: String,
	pub arguments: Value,
}

/// A single metric score for one case. `score` is always in [0, 1]:
/// out-of-range values are clamped at construction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricScore {
	pub name: String,
	pub score: f64,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub details: Option<String>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub metadata: Option<Value>,
}

impl MetricScore {
	pub fn new(name: impl Into<String>, score: f64) -> Self {
		let score = if score.is_nan() { 0.0 } else { score.clamp(0.0, 1.0) };
		Self { name: name.into(), score, details: None, metadata: None }
	}

	pub fn with_details(mut self, details: impl Into<String>) -> Self {
		self.details = Some(details.into());
		self
	}

	pub fn with_metadata(mut self, metadata: Value) -> Self {
		self.metadata = Some(metadata);
		self
	}
}

/// Outcome of executing one case against the target. `duration_ms` spans
/// only this case's execution, not the whole run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaseResult {
	pub case: EvalCase,
	pub output: String,
	pub duration_ms: u64,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub error: Option<String>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub usage: Option<Usage>,
	#[serde(skip_serializing_if = "Vec::is_empty", default)]
	pub tool_calls: Vec<ToolCall>,
	#[serde(skip_serializing_if = "Vec::is_empty", default)]
	pub scores: Vec<MetricScore>,
}

/// Aggregate statistics for one metric over a whole run. Derived data,
/// recomputed fresh on every run and never persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregatedMetric {
	pub name: String,
	pub mean: f64,
	pub median: f64,
	pub min: f64,
	pub max: f64,
	pub std_dev: f64,
	pub p50: f64,
	pub p95: f64,
	pub p99: f64,
}

impl AggregatedMetric {
	pub fn zero(name: impl Into<String>) -> Self {
		Self {
			name: name.into(),
			mean: 0.0,
			median: 0.0,
			min: 0.0,
			max: 0.0,
			std_dev: 0.0,
			p50: 0.0,
			p95: 0.0,
			p99: 0.0,
		}
	}

	pub fn field(&self, field: &str) -> Option<f64> {
		match field {
			"mean" => Some(self.mean),
			"median" => Some(self.median),
			"min" => Some(self.min),
			"max" => Some(self.max),
			"std_dev" | "stddev" => Some(self.std_dev),
			"p50" => Some(self.p50),
			"p95" => Some(self.p95),
			"p99" => Some(self.p99),
			_ => None,
		}
	}
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssertionResult {
	pub name: String,
	pub passed: bool,
	pub message: String,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub actual: Option<f64>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub expected: Option<f64>,
}

/// Whole-run statistics. `duration_ms` is wall clock for the run, which is
/// less than the sum of per-case durations whenever cases overlap.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuiteStats {
	pub total: usize,
	pub duration_ms: u64,
	pub cost: f64,
}

/// The full bundle produced by one suite run. Results are always in
/// original dataset order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvalSuiteResult {
	pub results: Vec<CaseResult>,
	pub aggregated: BTreeMap<String, AggregatedMetric>,
	#[serde(skip_serializing_if = "Vec::is_empty", default)]
	pub suite_scores: Vec<MetricScore>,
	#[serde(skip_serializing_if = "Vec::is_empty", default)]
	pub assertions: Vec<AssertionResult>,
	pub stats: SuiteStats,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Winner {
	Baseline,
	Challenger,
	Tie,
}

/// Which significance test decided a metric comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComparisonMethod {
	PairedT,
	McNemar,
	TooFewSamples,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricComparison {
	pub baseline: f64,
	pub challenger: f64,
	pub p_value: f64,
	pub significant: bool,
	pub winner: Winner,
	pub method: ComparisonMethod,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComparisonSummary {
	pub winner: Winner,
	pub metrics: BTreeMap<String, MetricComparison>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComparisonResult {
	pub summary: ComparisonSummary,
	pub baseline: EvalSuiteResult,
	pub challenger: EvalSuiteResult,
}

#[derive(Debug, Clone, Serialize, Deserialize, Tabled)]
struct SummaryRow {
	input: String,
	output: String,
	expected: String,
	scores: String,
	duration_ms: u64,
}

impl EvalSuiteResult {
	/// Render a console table of per-case results plus aggregate lines.
	pub fn summary_table(&self) -> String {
		use tabled::Table;
		let rows: Vec<SummaryRow> = self
			.results
			.iter()
			.map(|r| {
				let scores = r
					.scores
					.iter()
					.map(|s| format!("{}: {:.3}", s.name, s.score))
					.collect::<Vec<_>>()
					.join("  ");
				SummaryRow {
					input: truncate(r.case.input.clone(), 48),
					output: truncate(r.output.clone(), 48),
					expected: truncate(
						r.case.expected.clone().unwrap_or_else(|| "-".to_string()),
						48,
					),
					scores,
					duration_ms: r.duration_ms,
				}
			})
			.collect();

		let table = Table::new(rows).to_string();

		let mut lines = vec![table, String::new()];
		for agg in self.aggregated.values() {
			lines.push(format!(
				"{}: mean {:.3}  p95 {:.3}  stddev {:.3}",
				agg.name, agg.mean, agg.p95, agg.std_dev
			));
		}
		for a in &self.assertions {
			let mark = if a.passed { "PASS" } else { "FAIL" };
			lines.push(format!("[{}] {}: {}", mark, a.name, a.message));
		}
		lines.push(format!(
			"Cases: {}  Duration: {}ms  Cost: ${:.4}",
			self.stats.total, self.stats.duration_ms, self.stats.cost
		));
		lines.join("\n")
	}

	/// Flat `{metric name: mean}` view, the shape consumed by regression
	/// baselines.
	pub fn baseline_map(&self) -> BTreeMap<String, f64> {
		self.aggregated
			.iter()
			.map(|(name, agg)| (name.clone(), agg.mean))
			.collect()
	}

	/// Write the baseline map as flat JSON for later `no_regression` checks.
	pub fn save_baseline(&self, path: impl AsRef<Path>) -> std::io::Result<()> {
		let json = serde_json::to_string_pretty(&self.baseline_map())?;
		std::fs::write(path, json)
	}
}

fn truncate(s: String, max_len: usize) -> String {
	if s.len() <= max_len {
		return s;
	}
	let mut truncated = s.chars().take(max_len.saturating_sub(1)).collect::<String>();
	truncated.push('…');
	truncated
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn metric_score_clamps_out_of_range() {
		assert_eq!(MetricScore::new("m", 1.7).score, 1.0);
		assert_eq!(MetricScore::new("m", -0.3).score, 0.0);
		assert_eq!(MetricScore::new("m", f64::NAN).score, 0.0);
		assert_eq!(MetricScore::new("m", 0.42).score, 0.42);
	}

	#[test]
	fn aggregated_field_lookup() {
		let mut agg = AggregatedMetric::zero("accuracy");
		agg.p95 = 0.9;
		assert_eq!(agg.field("p95"), Some(0.9));
		assert_eq!(agg.field("nope"), None);
	}
}
