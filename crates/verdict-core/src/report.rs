//! Render result bundles for consumers: a console summary, verbatim JSON,
//! or one CSV row per case/score pair. Rendering returns strings; writing
//! them anywhere is the caller's job.

use anyhow::Result;
use verdict_types::{ComparisonResult, EvalSuiteResult, Winner};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportFormat {
    Console,
    Json,
    Csv,
}

impl std::str::FromStr for ReportFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "console" | "table" => Ok(ReportFormat::Console),
            "json" => Ok(ReportFormat::Json),
            "csv" => Ok(ReportFormat::Csv),
            other => anyhow::bail!("unknown report format '{other}'"),
        }
    }
}

/// Render a result bundle in a chosen format, as a method on the bundle
/// itself.
pub trait Report {
    fn report(&self, format: ReportFormat) -> Result<String>;
}

impl Report for EvalSuiteResult {
    fn report(&self, format: ReportFormat) -> Result<String> {
        render_suite(self, format)
    }
}

impl Report for ComparisonResult {
    fn report(&self, format: ReportFormat) -> Result<String> {
        render_comparison(self, format)
    }
}

pub fn render_suite(result: &EvalSuiteResult, format: ReportFormat) -> Result<String> {
    match format {
        ReportFormat::Console => Ok(result.summary_table()),
        ReportFormat::Json => Ok(serde_json::to_string_pretty(result)?),
        ReportFormat::Csv => Ok(suite_csv(result)),
    }
}

pub fn render_comparison(result: &ComparisonResult, format: ReportFormat) -> Result<String> {
    match format {
        ReportFormat::Console => Ok(comparison_console(result)),
        ReportFormat::Json => Ok(serde_json::to_string_pretty(result)?),
        ReportFormat::Csv => Ok(comparison_csv(result)),
    }
}

fn suite_csv(result: &EvalSuiteResult) -> String {
    let mut out = String::from("case_index,input,output,metric,score,duration_ms\n");
    for (idx, r) in result.results.iter().enumerate() {
        for s in &r.scores {
            out.push_str(&format!(
                "{},{},{},{},{},{}\n",
                idx,
                csv_field(&r.case.input),
                csv_field(&r.output),
                csv_field(&s.name),
                s.score,
                r.duration_ms
            ));
        }
    }
    out
}

fn comparison_console(result: &ComparisonResult) -> String {
    let mut lines = vec!["metric                baseline  challenger  p-value   winner".to_string()];
    for (name, m) in &result.summary.metrics {
        lines.push(format!(
            "{:<20}  {:>8.4}  {:>10.4}  {:>8.5}  {}{}",
            name,
            m.baseline,
            m.challenger,
            m.p_value,
            winner_label(m.winner),
            if m.significant { " *" } else { "" }
        ));
    }
    lines.push(String::new());
    lines.push(format!("Overall winner: {}", winner_label(result.summary.winner)));
    lines.join("\n")
}

fn comparison_csv(result: &ComparisonResult) -> String {
    let mut out = String::from("metric,baseline,challenger,p_value,significant,winner\n");
    for (name, m) in &result.summary.metrics {
        out.push_str(&format!(
            "{},{},{},{},{},{}\n",
            csv_field(name),
            m.baseline,
            m.challenger,
            m.p_value,
            m.significant,
            winner_label(m.winner)
        ));
    }
    out
}

fn winner_label(winner: Winner) -> &'static str {
    match winner {
        Winner::Baseline => "baseline",
        Winner::Challenger => "challenger",
        Winner::Tie => "tie",
    }
}

fn csv_field(s: &str) -> String {
    if s.contains(',') || s.contains('"') || s.contains('\n') {
        format!("\"{}\"", s.replace('"', "\"\""))
    } else {
        s.to_string()
    }
}
