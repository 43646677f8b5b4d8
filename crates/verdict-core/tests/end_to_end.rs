//! Whole-pipeline tests: dataset → suite → aggregated result → comparison.

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use verdict_core::{
    from_async_fn, Agent, AgentRequest, AgentResponse, AgentRuntime, Assertion, Dataset,
    EvalCase, EvalComparison, EvalSuite, ExactMatch, Judge, JudgeReply, JudgeRequest,
    JudgeTemplate, Metric, Usage, Winner,
};

fn qa_dataset(n: usize) -> Dataset {
    Dataset::new(
        (0..n)
            .map(|i| EvalCase::with_expected(format!("question {i}"), format!("answer {i}")))
            .collect(),
    )
}

fn perfect_target() -> Arc<dyn verdict_core::Target> {
    from_async_fn(|input: String| async move { Ok(input.replace("question", "answer")) })
}

#[tokio::test]
async fn baseline_sweep_loses_to_perfect_challenger() {
    let comparison = EvalComparison::builder()
        .dataset(qa_dataset(10))
        .metric(Metric::Deterministic(Arc::new(ExactMatch::new())))
        .baseline(from_async_fn(|_| async move { Ok("wrong".to_string()) }))
        .challenger(perfect_target())
        .build()
        .unwrap();
    let result = comparison.run().await;

    assert_eq!(result.baseline.aggregated["exact_match"].mean, 0.0);
    assert_eq!(result.challenger.aggregated["exact_match"].mean, 1.0);
    assert!(result.summary.metrics["exact_match"].significant);
    assert_eq!(result.summary.winner, Winner::Challenger);

    // Results on both sides stay in dataset order.
    for (i, r) in result.challenger.results.iter().enumerate() {
        assert_eq!(r.case.input, format!("question {i}"));
    }
}

#[tokio::test]
async fn save_baseline_then_no_regression_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let baseline_path = dir.path().join("baseline.json");

    let suite = EvalSuite::builder()
        .dataset(qa_dataset(5))
        .target(perfect_target())
        .metric(Metric::Deterministic(Arc::new(ExactMatch::new())))
        .build()
        .unwrap();
    let result = suite.run().await;
    result.save_baseline(&baseline_path).unwrap();

    // The same configuration checked against its own baseline passes.
    let checked = EvalSuite::builder()
        .dataset(qa_dataset(5))
        .target(perfect_target())
        .metric(Metric::Deterministic(Arc::new(ExactMatch::new())))
        .assertion(Assertion::no_regression(&baseline_path))
        .build()
        .unwrap();
    let result = checked.run().await;
    assert!(result.assertions[0].passed, "{}", result.assertions[0].message);

    // A broken target regresses against it.
    let regressed = EvalSuite::builder()
        .dataset(qa_dataset(5))
        .target(from_async_fn(|_| async move { Ok("nope".to_string()) }))
        .metric(Metric::Deterministic(Arc::new(ExactMatch::new())))
        .assertion(Assertion::no_regression(&baseline_path))
        .build()
        .unwrap();
    let result = regressed.run().await;
    assert!(!result.assertions[0].passed);
}

struct EchoAgent;

impl Agent for EchoAgent {
    fn name(&self) -> &str {
        "echo"
    }
}

struct CountingRuntime;

#[async_trait]
impl AgentRuntime for CountingRuntime {
    async fn run(&self, _agent: &dyn Agent, request: AgentRequest) -> Result<AgentResponse> {
        Ok(AgentResponse {
            output: request.input.replace("question", "answer"),
            usage: Some(Usage {
                input_tokens: 7,
                output_tokens: 3,
                total_tokens: 10,
                cost: 0.001,
                duration_ms: 1,
            }),
            tool_calls: vec![],
        })
    }
}

#[tokio::test]
async fn agent_runtime_usage_feeds_suite_cost() {
    let suite = EvalSuite::builder()
        .dataset(qa_dataset(4))
        .agent(Arc::new(EchoAgent), Arc::new(CountingRuntime))
        .metric(Metric::Deterministic(Arc::new(ExactMatch::new())))
        .build()
        .unwrap();
    let result = suite.run().await;
    assert_eq!(result.aggregated["exact_match"].mean, 1.0);
    assert!((result.stats.cost - 0.004).abs() < 1e-12);
    assert!(result.results.iter().all(|r| r.usage.is_some()));
}

struct AgreeableJudge;

#[async_trait]
impl Judge for AgreeableJudge {
    async fn run(&self, _request: JudgeRequest) -> Result<JudgeReply> {
        Ok(JudgeReply { output: r#"{"score": 0.9, "reasoning": "close enough"}"#.to_string() })
    }
}

#[tokio::test]
async fn judge_metric_is_bound_at_build_and_scored_per_case() {
    let suite = EvalSuite::builder()
        .dataset(qa_dataset(3))
        .target(perfect_target())
        .metric(Metric::Judge(JudgeTemplate::new("helpfulness", "Grade helpfulness 0-1.")))
        .judge(Arc::new(AgreeableJudge))
        .build()
        .unwrap();
    let result = suite.run().await;
    assert!((result.aggregated["helpfulness"].mean - 0.9).abs() < 1e-12);
    for r in &result.results {
        assert_eq!(r.scores[0].details.as_deref(), Some("close enough"));
    }
}
