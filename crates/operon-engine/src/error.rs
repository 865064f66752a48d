use operon_config::ScriptLanguage;
use operon_workflow::PipelineError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
  /// The pipeline definition failed validation or scheduling.
  #[error("invalid pipeline: {0}")]
  Validation(#[from] PipelineError),

  /// A step names a type no builtin and no element provides.
  #[error("step '{step}' has unknown type '{step_type}'")]
  UnknownStepType { step: String, step_type: String },

  /// A step resolved to an element whose language has no configured runner.
  #[error("no runner configured for language '{language}'")]
  NoRunner { language: ScriptLanguage },

  /// No run tracked under the given id.
  #[error("unknown run: {run_id}")]
  UnknownRun { run_id: String },

  /// The run has not reached a terminal state yet.
  #[error("run '{run_id}' is still in progress")]
  RunInProgress { run_id: String },

  /// The run task went away without publishing a terminal snapshot.
  #[error("run '{run_id}' was interrupted before reaching a terminal state")]
  Interrupted { run_id: String },
}
