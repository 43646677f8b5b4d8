use thiserror::Error;

/// Construction-time misconfiguration. Surfaced eagerly from builders so
/// programmer error is never deferred into `run()`.
#[derive(Debug, Error)]
pub enum Error {
    #[error("no target configured: set either a target fn or an agent/runtime pair")]
    NoTarget,
    #[error("ambiguous target: set either a target fn or an agent/runtime pair, not both")]
    AmbiguousTarget,
    #[error("metric '{0}' requires a judge, but no judge was configured")]
    JudgeRequired(String),
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}
