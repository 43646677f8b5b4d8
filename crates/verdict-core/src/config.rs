//! Serde configuration for CLI-driven runs (YAML or JSON).

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuiteConfig {
    pub data: DataConfig,
    pub target: TargetConfig,
    #[serde(default)]
    pub metrics: Vec<MetricConfig>,
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default)]
    pub retries: u32,
}

fn default_concurrency() -> usize {
    5
}

fn default_timeout_ms() -> u64 {
    30_000
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataConfig {
    pub path: PathBuf,
    #[serde(default)]
    pub format: DataFormat,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DataFormat {
    #[default]
    Jsonl,
    Csv,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
#[serde(rename_all = "snake_case")]
pub enum TargetConfig {
    Http {
        url: String,
        #[serde(default = "default_http_method")]
        method: String,
    },
}

fn default_http_method() -> String {
    "POST".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
#[serde(rename_all = "snake_case")]
pub enum MetricConfig {
    Exact {
        #[serde(default)]
        case_sensitive: bool,
    },
    Contains {
        #[serde(skip_serializing_if = "Option::is_none")]
        substring: Option<String>,
        #[serde(default)]
        case_sensitive: bool,
    },
    Regex {
        pattern: String,
    },
    JsonSchema {
        #[serde(skip_serializing_if = "Option::is_none")]
        schema_path: Option<PathBuf>,
    },
    Similarity,
    Latency,
    Cost,
    Tokens,
}

impl SuiteConfig {
    pub fn from_yaml(yaml: &str) -> anyhow::Result<Self> {
        Ok(serde_yaml::from_str(yaml)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_minimal_yaml() {
        let cfg = SuiteConfig::from_yaml(
            r#"
data:
  path: cases.jsonl
target:
  type: http
  url: http://localhost:8080/run
metrics:
  - type: exact
  - type: regex
    pattern: "\\d+"
  - type: latency
"#,
        )
        .unwrap();
        assert_eq!(cfg.concurrency, 5);
        assert_eq!(cfg.timeout_ms, 30_000);
        assert_eq!(cfg.metrics.len(), 3);
        assert_eq!(cfg.data.format, DataFormat::Jsonl);
    }
}
