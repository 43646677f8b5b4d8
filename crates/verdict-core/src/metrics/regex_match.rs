use anyhow::Result;
use async_trait::async_trait;
use regex::Regex;
use verdict_types::{CaseResult, MetricScore};

use crate::metric::CaseMetric;

/// Output matches a regex pattern. The pattern is compiled at construction
/// so a bad pattern fails fast rather than per case.
pub struct RegexMatch {
	pattern: Regex,
}

impl RegexMatch {
	pub fn new(pattern: &str) -> Result<Self> {
		Ok(Self { pattern: Regex::new(pattern)? })
	}
}

#[async_trait]
impl CaseMetric for RegexMatch {
	fn name(&self) -> &str {
		"regex_match"
	}

	async fn score(&self, result: &CaseResult) -> MetricScore {
		let matched = self.pattern.is_match(&result.output);
		MetricScore::new(self.name(), if matched { 1.0 } else { 0.0 }).with_metadata(
			serde_json::json!({
				"pattern": self.pattern.as_str(),
				"matched": matched,
			}),
		)
	}
}
