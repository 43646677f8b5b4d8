use async_trait::async_trait;
use verdict_types::{CaseResult, MetricScore};

use crate::metric::CaseMetric;

/// Output contains a substring: either an explicit literal, or the case's
/// expected value when no literal is given.
pub struct Contains {
    literal: Option<String>,
    case_sensitive: bool,
}

impl Contains {
    /// Check that the output contains the case's expected value.
    pub fn expected() -> Self {
        Self { literal: None, case_sensitive: false }
    }

    /// Check that the output contains the given literal.
    pub fn literal(literal: impl Into<String>) -> Self {
        Self { literal: Some(literal.into()), case_sensitive: false }
    }

    pub fn case_sensitive(mut self) -> Self {
        self.case_sensitive = true;
        self
    }
}

#[async_trait]
impl CaseMetric for Contains {
    fn name(&self) -> &str {
        "contains"
    }

    async fn score(&self, result: &CaseResult) -> MetricScore {
        let needle = match &self.literal {
            Some(s) => s.as_str(),
            None => match result.case.expected.as_deref() {
                Some(e) => e,
                None => {
                    return MetricScore::new(self.name(), 0.0).with_details("no expected value")
                }
            },
        };
        let found = if self.case_sensitive {
            result.output.contains(needle)
        } else {
            result.output.to_lowercase().contains(&needle.to_lowercase())
        };
        MetricScore::new(self.name(), if found { 1.0 } else { 0.0 }).with_metadata(
            serde_json::json!({
                "substring": needle,
                "case_sensitive": self.case_sensitive,
                "found": found,
            }),
        )
    }
}
