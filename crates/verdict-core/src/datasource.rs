use std::path::PathBuf;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use serde_json::Value;
use verdict_types::EvalCase;

use crate::dataset::Dataset;

/// Anything that can yield a frozen, order-preserving `Dataset`.
#[async_trait]
pub trait DataSource: Send + Sync {
    async fn load(&self) -> Result<Dataset>;
}

pub struct VecDataSource {
    cases: Vec<EvalCase>,
}

impl VecDataSource {
    pub fn new(cases: Vec<EvalCase>) -> Self {
        Self { cases }
    }
}

#[async_trait]
impl DataSource for VecDataSource {
    async fn load(&self) -> Result<Dataset> {
        Ok(Dataset::new(self.cases.clone()))
    }
}

/// Read JSONL where each line is
/// `{"input": "...", "expected"?: "...", "context"?: {...}, "metadata"?: {...}}`.
pub struct JsonlDataSource {
    path: PathBuf,
}

impl JsonlDataSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl DataSource for JsonlDataSource {
    async fn load(&self) -> Result<Dataset> {
        let content = tokio::fs::read_to_string(&self.path)
            .await
            .with_context(|| format!("Failed to read {:?}", self.path))?;
        let mut cases = Vec::new();
        for (idx, line) in content.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let value: Value = serde_json::from_str(line)
                .with_context(|| format!("Invalid JSON on line {}", idx + 1))?;
            cases.push(parse_case(&value).with_context(|| format!("Line {}", idx + 1))?);
        }
        Ok(Dataset::new(cases))
    }
}

/// Read CSV with a header row naming at least an `input` column; `expected`
/// is picked up when present. Quoted fields may contain commas.
pub struct CsvDataSource {
    path: PathBuf,
}

impl CsvDataSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl DataSource for CsvDataSource {
    async fn load(&self) -> Result<Dataset> {
        let content = tokio::fs::read_to_string(&self.path)
            .await
            .with_context(|| format!("Failed to read {:?}", self.path))?;
        let mut lines = content.lines().enumerate();
        let (_, header) = lines
            .next()
            .ok_or_else(|| anyhow!("CSV file {:?} is empty", self.path))?;
        let columns = split_csv_line(header);
        let input_col = columns
            .iter()
            .position(|c| c == "input")
            .ok_or_else(|| anyhow!("CSV header has no 'input' column"))?;
        let expected_col = columns.iter().position(|c| c == "expected");

        let mut cases = Vec::new();
        for (idx, line) in lines {
            if line.trim().is_empty() {
                continue;
            }
            let fields = split_csv_line(line);
            let input = fields
                .get(input_col)
                .ok_or_else(|| anyhow!("Line {}: missing input field", idx + 1))?
                .clone();
            let mut case = EvalCase::new(input);
            case.expected = expected_col.and_then(|i| fields.get(i)).cloned();
            cases.push(case);
        }
        Ok(Dataset::new(cases))
    }
}

fn parse_case(value: &Value) -> Result<EvalCase> {
    let obj = value.as_object().ok_or_else(|| anyhow!("expected object"))?;
    let input = obj
        .get("input")
        .and_then(|v| v.as_str())
        .ok_or_else(|| anyhow!("missing string field 'input'"))?
        .to_string();
    let expected = obj
        .get("expected")
        .and_then(|v| v.as_str())
        .map(|s| s.to_string());
    let context = obj
        .get("context")
        .and_then(|v| v.as_object())
        .map(|m| m.iter().map(|(k, v)| (k.clone(), v.clone())).collect());
    let metadata = obj
        .get("metadata")
        .and_then(|v| v.as_object())
        .map(|m| m.iter().map(|(k, v)| (k.clone(), v.clone())).collect());
    Ok(EvalCase { input, expected, context, metadata })
}

fn split_csv_line(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();
    while let Some(ch) = chars.next() {
        match ch {
            '"' if in_quotes && chars.peek() == Some(&'"') => {
                chars.next();
                field.push('"');
            }
            '"' => in_quotes = !in_quotes,
            ',' if !in_quotes => {
                fields.push(std::mem::take(&mut field));
            }
            _ => field.push(ch),
        }
    }
    fields.push(field);
    fields
}
