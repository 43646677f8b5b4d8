//! verdict-core: evaluation and statistical comparison engine for
//! generative targets. Compose a dataset, a target (your model or agent),
//! and metrics; run with bounded concurrency; compare a challenger against
//! a baseline with paired significance tests.

pub mod assertion;
pub mod comparison;
pub mod config;
pub mod dataset;
pub mod datasource;
pub mod error;
pub mod judge;
pub mod metric;
pub mod report;
pub mod stats;
pub mod suite;
pub mod target;
pub mod testing;

pub mod metrics {
    pub mod contains;
    pub mod exact;
    pub mod json_schema;
    pub mod regex_match;
    pub mod run_stats;
    pub mod similarity;
}

pub use assertion::Assertion;
pub use comparison::{compare_results, EvalComparison, EvalComparisonBuilder};
pub use dataset::Dataset;
pub use datasource::{CsvDataSource, DataSource, JsonlDataSource, VecDataSource};
pub use error::Error;
pub use judge::{Judge, JudgeConfig, JudgeReply, JudgeRequest};
pub use metric::{CaseMetric, JudgeTemplate, Metric, SuiteMetric};
pub use metrics::{
    contains::Contains,
    exact::ExactMatch,
    json_schema::JsonSchemaMatch,
    regex_match::RegexMatch,
    run_stats::{CostStats, LatencyStats, TokenStats},
    similarity::Similarity,
};
pub use report::{render_comparison, render_suite, Report, ReportFormat};
pub use stats::{McNemarResult, StatsError, TTestResult};
pub use suite::{EvalSuite, EvalSuiteBuilder, Progress};
pub use target::{from_async_fn, Agent, AgentRequest, AgentResponse, AgentRuntime, Target};
pub use verdict_types::{
    AggregatedMetric, AssertionResult, CaseResult, ComparisonMethod, ComparisonResult,
    ComparisonSummary, EvalCase, EvalSuiteResult, MetricComparison, MetricScore, SuiteStats,
    ToolCall, Usage, Winner,
};
