use async_trait::async_trait;
use verdict_types::{CaseResult, MetricScore};

use crate::metric::CaseMetric;

/// Output equals the case's expected value. Case-insensitive and
/// whitespace-trimmed by default.
pub struct ExactMatch {
	case_sensitive: bool,
	trim: bool,
}

impl ExactMatch {
	pub fn new() -> Self {
		Self { case_sensitive: false, trim: true }
	}

	pub fn case_sensitive(mut self) -> Self {
		self.case_sensitive = true;
		self
	}

	pub fn no_trim(mut self) -> Self {
		self.trim = false;
		self
	}

	fn normalize(&self, s: &str) -> String {
		let s = if self.trim { s.trim() } else { s };
		if self.case_sensitive {
			s.to_string()
		} else {
			s.to_lowercase()
		}
	}
}

impl Default for ExactMatch {
	fn default() -> Self {
		Self::new()
	}
}

#[async_trait]
impl CaseMetric for ExactMatch {
	fn name(&self) -> &str {
		"exact_match"
	}

	async fn score(&self, result: &CaseResult) -> MetricScore {
		let Some(expected) = result.case.expected.as_deref() else {
			return MetricScore::new(self.name(), 0.0).with_details("no expected value");
		};
		let matched = self.normalize(expected) == self.normalize(&result.output);
		MetricScore::new(self.name(), if matched { 1.0 } else { 0.0 })
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use verdict_types::EvalCase;

	fn result(expected: Option<&str>, output: &str) -> CaseResult {
		CaseResult {
			case: match expected {
				Some(e) => EvalCase::with_expected("q", e),
				None => EvalCase::new("q"),
			},
			output: output.to_string(),
			duration_ms: 0,
			error: None,
			usage: None,
			tool_calls: vec![],
			scores: vec![],
		}
	}

	#[tokio::test]
	async fn default_is_case_insensitive_and_trimmed() {
		let m = ExactMatch::new();
		assert_eq!(m.score(&result(Some("Paris"), "  paris \n")).await.score, 1.0);
		assert_eq!(m.score(&result(Some("Paris"), "London")).await.score, 0.0);
	}

	#[tokio::test]
	async fn case_sensitive_mode() {
		let m = ExactMatch::new().case_sensitive();
		assert_eq!(m.score(&result(Some("Paris"), "paris")).await.score, 0.0);
		assert_eq!(m.score(&result(Some("Paris"), "Paris")).await.score, 1.0);
	}

	#[tokio::test]
	async fn missing_expected_scores_zero() {
		let m = ExactMatch::new();
		let score = m.score(&result(None, "anything")).await;
		assert_eq!(score.score, 0.0);
		assert_eq!(score.details.as_deref(), Some("no expected value"));
	}
}
