use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use clap::{ArgAction, Parser, Subcommand};
use verdict_core::{
	render_comparison, render_suite, Assertion, Contains, CsvDataSource, DataSource, Dataset,
	EvalComparison, EvalSuite, ExactMatch, JsonlDataSource, LatencyStats, Metric, RegexMatch,
	ReportFormat, Similarity, Target,
};

#[derive(Debug, Parser)]
#[command(name = "verdict", about = "Run evaluations and statistical A/B comparisons")]
struct Cli {
	#[command(subcommand)]
	command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
	/// Run one target over a dataset and report aggregated metrics.
	Run(RunArgs),
	/// Run baseline and challenger targets and decide a winner.
	Compare(CompareArgs),
}

#[derive(Debug, Clone, Parser)]
struct DataArgs {
	/// Dataset file: JSONL lines { "input": string, "expected"?: string, ... }
	#[arg(long)]
	data: PathBuf,

	/// Treat the dataset file as CSV (header row with input/expected columns)
	#[arg(long, action = ArgAction::SetTrue)]
	csv: bool,

	/// Evaluate a random subset of this many cases
	#[arg(long)]
	sample: Option<usize>,
}

#[derive(Debug, Clone, Parser)]
struct MetricArgs {
	/// Exact match against expected (case-insensitive, trimmed)
	#[arg(long, action = ArgAction::SetTrue)]
	exact: bool,

	/// Output must contain the expected value
	#[arg(long, action = ArgAction::SetTrue)]
	contains: bool,

	/// Output must match this regex
	#[arg(long)]
	regex: Option<String>,

	/// Normalized Levenshtein similarity against expected
	#[arg(long, action = ArgAction::SetTrue)]
	similarity: bool,

	/// Collect latency distribution as a suite metric
	#[arg(long, action = ArgAction::SetTrue)]
	latency: bool,
}

#[derive(Debug, Clone, Parser)]
struct SchedulerArgs {
	/// Cases in flight at once
	#[arg(long, default_value_t = 5)]
	concurrency: usize,

	/// Per-case timeout in milliseconds
	#[arg(long, default_value_t = 30_000)]
	timeout_ms: u64,

	/// Retries per case after an error
	#[arg(long, default_value_t = 0)]
	retries: u32,
}

#[derive(Debug, Clone, Parser)]
struct RunArgs {
	#[command(flatten)]
	data: DataArgs,

	/// Target endpoint: POST {"input": ...}, read {"output": ...} or raw text
	#[arg(long)]
	url: String,

	#[command(flatten)]
	metrics: MetricArgs,

	#[command(flatten)]
	scheduler: SchedulerArgs,

	/// Report format: console, json, or csv
	#[arg(long, default_value = "console")]
	report: String,

	/// Write {metric: mean} baseline JSON here after the run
	#[arg(long)]
	save_baseline: Option<PathBuf>,

	/// Fail metrics that regressed beyond 5% of this baseline file
	#[arg(long)]
	check_baseline: Option<PathBuf>,

	/// Persist the run summary to this SQLite database
	#[arg(long)]
	save_db: Option<PathBuf>,

	/// Label for the persisted run
	#[arg(long, default_value = "run")]
	label: String,
}

#[derive(Debug, Clone, Parser)]
struct CompareArgs {
	#[command(flatten)]
	data: DataArgs,

	/// Baseline target endpoint
	#[arg(long)]
	baseline_url: String,

	/// Challenger target endpoint
	#[arg(long)]
	challenger_url: String,

	#[command(flatten)]
	metrics: MetricArgs,

	#[command(flatten)]
	scheduler: SchedulerArgs,

	/// Report format: console, json, or csv
	#[arg(long, default_value = "console")]
	report: String,
}

/// POSTs each input to an HTTP endpoint and reads the reply.
struct HttpTarget {
	client: reqwest::Client,
	url: String,
}

impl HttpTarget {
	fn new(url: impl Into<String>) -> Self {
		Self { client: reqwest::Client::new(), url: url.into() }
	}
}

#[async_trait]
impl Target for HttpTarget {
	async fn run(&self, input: &str) -> Result<String> {
		let response = self
			.client
			.post(&self.url)
			.json(&serde_json::json!({ "input": input }))
			.send()
			.await?
			.error_for_status()?;
		let text = response.text().await?;
		if let Ok(value) = serde_json::from_str::<serde_json::Value>(&text) {
			if let Some(output) = value.get("output").and_then(|v| v.as_str()) {
				return Ok(output.to_string());
			}
		}
		Ok(text)
	}
}

async fn load_dataset(args: &DataArgs) -> Result<Dataset> {
	let dataset = if args.csv {
		CsvDataSource::new(&args.data).load().await?
	} else {
		JsonlDataSource::new(&args.data).load().await?
	};
	Ok(match args.sample {
		Some(n) => dataset.sample(n),
		None => dataset,
	})
}

fn build_metrics(args: &MetricArgs) -> Result<Vec<Metric>> {
	let mut metrics = Vec::new();
	if args.exact {
		metrics.push(Metric::Deterministic(Arc::new(ExactMatch::new())));
	}
	if args.contains {
		metrics.push(Metric::Deterministic(Arc::new(Contains::expected())));
	}
	if let Some(pattern) = &args.regex {
		metrics.push(Metric::Deterministic(Arc::new(RegexMatch::new(pattern)?)));
	}
	if args.similarity {
		metrics.push(Metric::Deterministic(Arc::new(Similarity::new())));
	}
	if args.latency {
		metrics.push(Metric::Statistical(Arc::new(LatencyStats)));
	}
	if metrics.is_empty() {
		anyhow::bail!("no metrics selected; pass at least one of --exact, --contains, --regex, --similarity");
	}
	Ok(metrics)
}

async fn run(args: RunArgs) -> Result<()> {
	let dataset = load_dataset(&args.data).await?;
	let metrics = build_metrics(&args.metrics)?;
	let format: ReportFormat = args.report.parse()?;

	let mut builder = EvalSuite::builder()
		.dataset(dataset)
		.target(Arc::new(HttpTarget::new(&args.url)) as Arc<dyn Target>)
		.metrics(metrics)
		.concurrency(args.scheduler.concurrency)
		.timeout(Duration::from_millis(args.scheduler.timeout_ms))
		.retries(args.scheduler.retries);
	if let Some(baseline) = &args.check_baseline {
		builder = builder.assertion(Assertion::no_regression(baseline));
	}
	if format == ReportFormat::Console {
		builder = builder.on_progress(|p| {
			eprint!("\r{}/{} cases", p.completed, p.total);
			if p.completed == p.total {
				eprintln!();
			}
		});
	}
	let suite = builder.build()?;
	let result = suite.run().await;

	println!("{}", render_suite(&result, format)?);

	if let Some(path) = &args.save_baseline {
		result.save_baseline(path)?;
		eprintln!("baseline written to {}", path.display());
	}
	if let Some(db) = &args.save_db {
		let store = verdict_store::Store::open(db)?;
		let run_id = store.save_result(&args.label, &result)?;
		eprintln!("saved as run {run_id} in {}", db.display());
	}
	if result.assertions.iter().any(|a| !a.passed) {
		std::process::exit(1);
	}
	Ok(())
}

async fn compare(args: CompareArgs) -> Result<()> {
	let dataset = load_dataset(&args.data).await?;
	let metrics = build_metrics(&args.metrics)?;
	let format: ReportFormat = args.report.parse()?;

	let mut builder = EvalComparison::builder()
		.dataset(dataset)
		.baseline(Arc::new(HttpTarget::new(&args.baseline_url)) as Arc<dyn Target>)
		.challenger(Arc::new(HttpTarget::new(&args.challenger_url)) as Arc<dyn Target>)
		.concurrency(args.scheduler.concurrency)
		.timeout(Duration::from_millis(args.scheduler.timeout_ms))
		.retries(args.scheduler.retries);
	for metric in metrics {
		builder = builder.metric(metric);
	}
	let comparison = builder.build()?;
	let result = comparison.run().await;

	println!("{}", render_comparison(&result, format)?);
	Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
	tracing_subscriber::fmt()
		.with_env_filter(
			tracing_subscriber::EnvFilter::try_from_default_env()
				.unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
		)
		.with_writer(std::io::stderr)
		.init();

	let cli = Cli::parse();
	match cli.command {
		Commands::Run(args) => run(args).await,
		Commands::Compare(args) => compare(args).await,
	}
}
