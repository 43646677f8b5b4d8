//! The LLM-judge contract and reply parsing. The engine never talks to a
//! model API itself; callers hand in a `Judge` and the binder in
//! `metric` closes over it.

use anyhow::Result;
use async_trait::async_trait;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

#[derive(Debug, Clone)]
pub struct JudgeRequest {
    pub input: String,
}

#[derive(Debug, Clone)]
pub struct JudgeReply {
    pub output: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JudgeConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
}

/// Caller-supplied judge invocation. `run` receives the fully rendered
/// grading prompt and returns the judge's free-text reply.
#[async_trait]
pub trait Judge: Send + Sync {
    async fn run(&self, request: JudgeRequest) -> Result<JudgeReply>;

    fn config(&self) -> JudgeConfig {
        JudgeConfig::default()
    }
}

#[derive(Deserialize)]
struct JudgeVerdict {
    score: f64,
    reasoning: Option<String>,
}

/// Parse a judge reply: structured JSON `{score, reasoning?}` first, then a
/// bare score token anywhere in the text. `None` means unparsable.
pub(crate) fn parse_judge_reply(text: &str) -> Option<(f64, Option<String>)> {
    if let Ok(verdict) = serde_json::from_str::<JudgeVerdict>(text.trim()) {
        return Some((verdict.score, verdict.reasoning));
    }
    // Judges often wrap JSON in prose or code fences; look for an embedded
    // object before falling back to a bare number.
    if let (Some(start), Some(end)) = (text.find('{'), text.rfind('}')) {
        if start < end {
            if let Ok(verdict) = serde_json::from_str::<JudgeVerdict>(&text[start..=end]) {
                return Some((verdict.score, verdict.reasoning));
            }
        }
    }
    static SCORE_TOKEN: OnceLock<Regex> = OnceLock::new();
    let re = SCORE_TOKEN.get_or_init(|| Regex::new(r"\b(0(\.\d+)?|1(\.0+)?)\b").unwrap());
    re.find(text)
        .and_then(|m| m.as_str().parse::<f64>().ok())
        .map(|score| (score, None))
}
