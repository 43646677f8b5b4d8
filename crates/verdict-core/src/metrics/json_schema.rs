use anyhow::Result;
use async_trait::async_trait;
use jsonschema::JSONSchema;
use serde_json::Value;
use verdict_types::{CaseResult, MetricScore};

use crate::metric::CaseMetric;

/// Output parses as JSON and validates against a schema. With no schema,
/// parseability alone scores 1.
pub struct JsonSchemaMatch {
	schema: Option<JSONSchema>,
}

impl JsonSchemaMatch {
	pub fn any_json() -> Self {
		Self { schema: None }
	}

	pub fn with_schema(schema: Value) -> Result<Self> {
		let compiled = JSONSchema::compile(&schema)
			.map_err(|e| anyhow::anyhow!("Invalid JSON schema: {}", e))?;
		Ok(Self { schema: Some(compiled) })
	}
}

#[async_trait]
impl CaseMetric for JsonSchemaMatch {
	fn name(&self) -> &str {
		"json_schema"
	}

	async fn score(&self, result: &CaseResult) -> MetricScore {
		let parsed: Value = match serde_json::from_str(&result.output) {
			Ok(v) => v,
			Err(err) => {
				return MetricScore::new(self.name(), 0.0)
					.with_details(format!("output is not valid JSON: {err}"));
			}
		};
		let Some(schema) = &self.schema else {
			return MetricScore::new(self.name(), 1.0);
		};
		let score = match schema.validate(&parsed) {
			Ok(_) => MetricScore::new(self.name(), 1.0),
			Err(errors) => {
				let msgs: Vec<String> =
					errors.map(|e| format!("{}: {}", e.instance_path, e)).collect();
				MetricScore::new(self.name(), 0.0).with_details(msgs.join("; "))
			}
		};
		score
	}
}
