use thiserror::Error;

/// Validation failures detected before any step is scheduled or executed.
///
/// None of these are retryable: the pipeline definition itself is malformed
/// and must be corrected by the caller.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PipelineError {
  #[error("duplicate step id: {0}")]
  DuplicateStep(String),

  #[error("step '{step}' depends on unknown step '{dependency}'")]
  UnknownDependency { step: String, dependency: String },

  #[error("edge references unknown step: from={from}, to={to}")]
  EdgeUnknownStep { from: String, to: String },

  #[error("dependency cycle involving steps: {}", remaining.join(", "))]
  Cycle { remaining: Vec<String> },
}
