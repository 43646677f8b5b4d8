use async_trait::async_trait;
use verdict_types::{CaseResult, MetricScore};

use crate::metric::CaseMetric;

/// Normalized Levenshtein similarity between output and expected, as a
/// graded score in [0, 1]. An optional minimum similarity marks each case
/// as passed or failed in the score metadata.
pub struct Similarity {
    min_similarity: Option<f64>,
}

impl Similarity {
    pub fn new() -> Self {
        Self { min_similarity: None }
    }

    /// Require at least this similarity for a case to count as passed.
    pub fn with_threshold(mut self, min_similarity: f64) -> Self {
        self.min_similarity = Some(min_similarity);
        self
    }
}

impl Default for Similarity {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CaseMetric for Similarity {
    fn name(&self) -> &str {
        "similarity"
    }

    async fn score(&self, result: &CaseResult) -> MetricScore {
        let Some(expected) = result.case.expected.as_deref() else {
            return MetricScore::new(self.name(), 0.0).with_details("no expected value");
        };
        let similarity = strsim::normalized_levenshtein(expected.trim(), result.output.trim());
        let score = MetricScore::new(self.name(), similarity);
        match self.min_similarity {
            Some(min) => score.with_metadata(serde_json::json!({
                "min_similarity": min,
                "passed": similarity >= min,
            })),
            None => score,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use verdict_types::EvalCase;

    fn result(expected: &str, output: &str) -> CaseResult {
        CaseResult {
            case: EvalCase::with_expected("q", expected),
            output: output.to_string(),
            duration_ms: 0,
            error: None,
            usage: None,
            tool_calls: vec![],
            scores: vec![],
        }
    }

    #[tokio::test]
    async fn identical_strings_score_one() {
        assert_eq!(Similarity::new().score(&result("hello", "hello")).await.score, 1.0);
    }

    #[tokio::test]
    async fn near_miss_scores_between_zero_and_one() {
        let s = Similarity::new().score(&result("kitten", "sitting")).await.score;
        assert!(s > 0.0 && s < 1.0);
    }

    #[tokio::test]
    async fn threshold_marks_pass_and_fail_in_metadata() {
        let m = Similarity::new().with_threshold(0.8);

        let close = m.score(&result("hello world", "hello worlds")).await;
        assert!(close.score >= 0.8);
        assert_eq!(close.metadata.unwrap()["passed"], true);

        let far = m.score(&result("hello world", "goodbye moon")).await;
        assert!(far.score < 0.8);
        let meta = far.metadata.unwrap();
        assert_eq!(meta["passed"], false);
        assert_eq!(meta["min_similarity"], 0.8);
    }

    #[tokio::test]
    async fn graded_score_carries_no_metadata_without_threshold() {
        let s = Similarity::new().score(&result("a", "b")).await;
        assert!(s.metadata.is_none());
    }
}
