use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;
use verdict_types::{ToolCall, Usage};

/// The system under evaluation, in its simplest form: input text in,
/// output text out.
#[async_trait]
pub trait Target: Send + Sync {
	async fn run(&self, input: &str) -> Result<String>;
}

/// Wrap an async closure as a `Target`.
pub fn from_async_fn<F, Fut>(f: F) -> Arc<dyn Target>
where
	F: Send + Sync + 'static + Fn(String) -> Fut,
	Fut: Future<Output = Result<String>> + Send + 'static,
{
	struct ClosureTarget<F> {
		f: F,
	}

	#[async_trait]
	impl<F, Fut> Target for ClosureTarget<F>
	where
		F: Send + Sync + 'static + Fn(String) -> Fut,
		Fut: Future<Output = Result<String>> + Send + 'static,
	{
		async fn run(&self, input: &str) -> Result<String> {
			(self.f)(input.to_string()).await
		}
	}

	Arc::new(ClosureTarget { f })
}

/// An agent under evaluation. Opaque to the engine; the runtime knows how
/// to execute it.
pub trait Agent: Send + Sync {
	fn name(&self) -> &str;
}

#[derive(Debug, Clone)]
pub struct AgentRequest {
	pub input: String,
	pub context: Option<BTreeMap<String, Value>>,
}

#[derive(Debug, Clone)]
pub struct AgentResponse {
	pub output: String,
	pub usage: Option<Usage>,
	pub tool_calls: Vec<ToolCall>,
}

/// Executes an agent against one request, reporting usage and tool calls
/// alongside the output.
#[async_trait]
pub trait AgentRuntime: Send + Sync {
	async fn run(&self, agent: &dyn Agent, request: AgentRequest) -> Result<AgentResponse>;
}
