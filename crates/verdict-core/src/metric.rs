//! Metric abstractions. Three kinds, unified by name:
//!
//! - per-case metrics, scored asynchronously against one `CaseResult`;
//! - suite-level statistical metrics, scored once over the whole ordered
//!   result set (score 0 by convention, aggregates in `metadata`);
//! - LLM-judge templates, inert until bound to a `Judge`.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::warn;
use verdict_types::{CaseResult, MetricScore};

use crate::judge::{parse_judge_reply, Judge, JudgeRequest};

/// A deterministic per-case metric. Scoring never fails: anything that goes
/// wrong is reported as a 0 score with a diagnostic in `details`.
#[async_trait]
pub trait CaseMetric: Send + Sync {
    fn name(&self) -> &str;
    async fn score(&self, result: &CaseResult) -> MetricScore;
}

/// A suite-level statistical metric over the full, ordered result set.
pub trait SuiteMetric: Send + Sync {
    fn name(&self) -> &str;
    fn score(&self, results: &[CaseResult]) -> MetricScore;
}

/// The three metric kinds a suite accepts.
#[derive(Clone)]
pub enum Metric {
    Deterministic(Arc<dyn CaseMetric>),
    Statistical(Arc<dyn SuiteMetric>),
    Judge(JudgeTemplate),
}

impl Metric {
    pub fn name(&self) -> &str {
        match self {
            Metric::Deterministic(m) => m.name(),
            Metric::Statistical(m) => m.name(),
            Metric::Judge(t) => &t.name,
        }
    }

    pub fn requires_judge(&self) -> bool {
        matches!(self, Metric::Judge(_))
    }
}

impl From<Arc<dyn CaseMetric>> for Metric {
    fn from(m: Arc<dyn CaseMetric>) -> Self {
        Metric::Deterministic(m)
    }
}

/// An unbound LLM-judge metric: a name and a grading rubric, nothing else.
/// Scoring it directly yields 0 with an explanatory detail; `bind` turns it
/// into an ordinary per-case metric closed over a judge.
#[derive(Debug, Clone)]
pub struct JudgeTemplate {
    pub name: String,
    pub system_prompt: String,
}

impl JudgeTemplate {
    pub fn new(name: impl Into<String>, system_prompt: impl Into<String>) -> Self {
        Self { name: name.into(), system_prompt: system_prompt.into() }
    }

    pub fn bind(&self, judge: Arc<dyn Judge>) -> Metric {
        Metric::Deterministic(Arc::new(BoundJudgeMetric {
            template: self.clone(),
            judge,
        }))
    }
}

#[async_trait]
impl CaseMetric for JudgeTemplate {
    fn name(&self) -> &str {
        &self.name
    }

    async fn score(&self, _result: &CaseResult) -> MetricScore {
        MetricScore::new(&self.name, 0.0)
            .with_details("unbound judge metric: bind a judge context first")
    }
}

struct BoundJudgeMetric {
    template: JudgeTemplate,
    judge: Arc<dyn Judge>,
}

impl BoundJudgeMetric {
    fn render_prompt(&self, result: &CaseResult) -> String {
        let expected = result.case.expected.as_deref().unwrap_or("(none provided)");
        format!(
            "{}\n\nInput:\n{}\n\nExpected:\n{}\n\nActual output:\n{}\n\n\
             Reply with JSON: {{\"score\": <0.0-1.0>, \"reasoning\": \"...\"}}",
            self.template.system_prompt, result.case.input, expected, result.output
        )
    }
}

#[async_trait]
impl CaseMetric for BoundJudgeMetric {
    fn name(&self) -> &str {
        &self.template.name
    }

    async fn score(&self, result: &CaseResult) -> MetricScore {
        let reply = match self.judge.run(JudgeRequest { input: self.render_prompt(result) }).await
        {
            Ok(reply) => reply,
            Err(err) => {
                warn!(metric = %self.template.name, error = %err, "judge invocation failed");
                return MetricScore::new(&self.template.name, 0.0).with_details(err.to_string());
            }
        };
        match parse_judge_reply(&reply.output) {
            Some((score, reasoning)) => {
                let mut metric_score = MetricScore::new(&self.template.name, score);
                if let Some(reasoning) = reasoning {
                    metric_score = metric_score.with_details(reasoning);
                }
                metric_score
            }
            None => {
                warn!(metric = %self.template.name, "unparsable judge reply");
                MetricScore::new(&self.template.name, 0.0)
                    .with_details("could not parse judge response")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;
    use verdict_types::EvalCase;

    use crate::judge::JudgeReply;

    fn result_for(output: &str) -> CaseResult {
        CaseResult {
            case: EvalCase::with_expected("q", "a"),
            output: output.to_string(),
            duration_ms: 1,
            error: None,
            usage: None,
            tool_calls: vec![],
            scores: vec![],
        }
    }

    struct CannedJudge(&'static str);

    #[async_trait]
    impl Judge for CannedJudge {
        async fn run(&self, _request: JudgeRequest) -> anyhow::Result<JudgeReply> {
            Ok(JudgeReply { output: self.0.to_string() })
        }
    }

    struct BrokenJudge;

    #[async_trait]
    impl Judge for BrokenJudge {
        async fn run(&self, _request: JudgeRequest) -> anyhow::Result<JudgeReply> {
            Err(anyhow!("judge backend unavailable"))
        }
    }

    #[tokio::test]
    async fn unbound_template_scores_zero_without_erroring() {
        let template = JudgeTemplate::new("quality", "Grade the answer.");
        let score = template.score(&result_for("anything")).await;
        assert_eq!(score.score, 0.0);
        assert!(score.details.unwrap().contains("unbound"));
    }

    #[tokio::test]
    async fn bound_judge_parses_and_clamps() {
        let template = JudgeTemplate::new("quality", "Grade the answer.");
        let metric = template.bind(Arc::new(CannedJudge(r#"{"score": 2.5}"#)));
        let Metric::Deterministic(metric) = metric else {
            panic!("bind must produce a deterministic metric");
        };
        let score = metric.score(&result_for("out")).await;
        assert_eq!(score.score, 1.0);
    }

    #[tokio::test]
    async fn unparsable_reply_scores_zero() {
        let template = JudgeTemplate::new("quality", "Grade the answer.");
        let Metric::Deterministic(metric) = template.bind(Arc::new(CannedJudge("shrug"))) else {
            panic!("bind must produce a deterministic metric");
        };
        let score = metric.score(&result_for("out")).await;
        assert_eq!(score.score, 0.0);
        assert_eq!(score.details.as_deref(), Some("could not parse judge response"));
    }

    #[tokio::test]
    async fn judge_failure_is_captured_in_details() {
        let template = JudgeTemplate::new("quality", "Grade the answer.");
        let Metric::Deterministic(metric) = template.bind(Arc::new(BrokenJudge)) else {
            panic!("bind must produce a deterministic metric");
        };
        let score = metric.score(&result_for("out")).await;
        assert_eq!(score.score, 0.0);
        assert!(score.details.unwrap().contains("unavailable"));
    }
}
