//! Sequential pipeline execution.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use operon_config::{PipelineDef, ScriptLanguage, StepDef};
use operon_registry::{BuiltinStep, CustomElement, ResolvedStep, StepRegistry};
use operon_runtime::{Deadline, ExecutionResult, FailureKind, ScriptJob, ScriptRunner};
use operon_workflow::{Pipeline, Schedule};
use serde_json::{Map, Value};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, instrument};
use uuid::Uuid;

use crate::context::{RunContext, RunSnapshot};
use crate::error::EngineError;
use crate::events::{ExecutionNotifier, NoopNotifier, PipelineEvent};

/// Deadline applied when neither the step nor the pipeline sets one.
pub const DEFAULT_STEP_TIMEOUT_MS: u64 = 300_000;

/// Drives one run at a time: schedules the pipeline, walks the scheduled
/// order strictly sequentially, and records every step outcome.
///
/// The executor owns no run state between calls — each run's state lives
/// in the [`RunContext`] passed through `drive`, so independent runs never
/// share anything mutable.
pub struct PipelineExecutor {
  registry: Arc<StepRegistry>,
  runners: HashMap<ScriptLanguage, Arc<dyn ScriptRunner>>,
  notifier: Arc<dyn ExecutionNotifier>,
}

impl PipelineExecutor {
  pub fn new(registry: Arc<StepRegistry>) -> Self {
    Self {
      registry,
      runners: HashMap::new(),
      notifier: Arc::new(NoopNotifier),
    }
  }

  /// Attach a runner; its language is taken from the runner itself.
  pub fn with_runner(mut self, runner: Arc<dyn ScriptRunner>) -> Self {
    self.runners.insert(runner.language(), runner);
    self
  }

  pub fn with_notifier(mut self, notifier: Arc<dyn ExecutionNotifier>) -> Self {
    self.notifier = notifier;
    self
  }

  pub fn registry(&self) -> &StepRegistry {
    &self.registry
  }

  /// Validate, schedule, and run a pipeline to its terminal snapshot.
  ///
  /// `Err` means the run never started: the definition failed validation
  /// or a step type cannot be resolved. Step failures are not errors —
  /// they are recorded in the returned snapshot.
  #[instrument(name = "pipeline_execute", skip_all, fields(pipeline_id = %def.pipeline_id))]
  pub async fn execute(
    &self,
    def: PipelineDef,
    payload: Value,
    cancel: CancellationToken,
  ) -> Result<RunSnapshot, EngineError> {
    let pipeline = Pipeline::new(def)?;
    let schedule = Schedule::plan(&pipeline)?;
    self.check_resolvable(&pipeline).await?;

    let run_id = Uuid::new_v4().to_string();
    let (context, _subscription) =
      RunContext::new(&run_id, pipeline.pipeline_id(), schedule.order());
    Ok(self.drive(context, &pipeline, &schedule, payload, cancel).await)
  }

  /// Run the same pre-flight checks as [`execute`](Self::execute) without
  /// starting anything. Returns the order steps would run in.
  pub async fn validate(&self, def: PipelineDef) -> Result<Vec<String>, EngineError> {
    let pipeline = Pipeline::new(def)?;
    let schedule = Schedule::plan(&pipeline)?;
    self.check_resolvable(&pipeline).await?;
    Ok(schedule.order().to_vec())
  }

  /// Every step type must resolve before a single step runs, and every
  /// resolved element must have a runner for its language.
  pub(crate) async fn check_resolvable(&self, pipeline: &Pipeline) -> Result<(), EngineError> {
    for step in &pipeline.def().steps {
      match self.registry.resolve(&step.step_type).await {
        None => {
          return Err(EngineError::UnknownStepType {
            step: step.id.clone(),
            step_type: step.step_type.clone(),
          });
        }
        Some(ResolvedStep::Custom(element)) => {
          if !self.runners.contains_key(&element.language()) {
            return Err(EngineError::NoRunner {
              language: element.language(),
            });
          }
        }
        Some(ResolvedStep::Builtin(_)) => {}
      }
    }
    Ok(())
  }

  /// Walk the schedule. Fail-fast: after the first failure (or a
  /// cancellation) every not-yet-executed step is marked skipped and the
  /// run ends failed.
  #[instrument(
    name = "pipeline_run",
    skip_all,
    fields(run_id = %context.run_id(), pipeline_id = %pipeline.pipeline_id())
  )]
  pub(crate) async fn drive(
    &self,
    mut context: RunContext,
    pipeline: &Pipeline,
    schedule: &Schedule,
    payload: Value,
    cancel: CancellationToken,
  ) -> RunSnapshot {
    let run_id = context.run_id().to_string();

    context.mark_running();
    self.notifier.notify(PipelineEvent::RunStarted {
      run_id: run_id.clone(),
      pipeline_id: pipeline.pipeline_id().to_string(),
      at: chrono::Utc::now(),
    });
    info!(steps = schedule.len(), "run_started");

    let graph = pipeline.graph();
    let mut outputs: HashMap<String, Value> = HashMap::new();
    let mut run_error: Option<String> = None;

    for step_id in schedule.iter() {
      if run_error.is_none() && cancel.is_cancelled() {
        run_error = Some("run cancelled".to_string());
      }
      if run_error.is_some() {
        context.step_skipped(step_id);
        self.notifier.notify(PipelineEvent::StepSkipped {
          run_id: run_id.clone(),
          step_id: step_id.clone(),
          at: chrono::Utc::now(),
        });
        info!(step_id = %step_id, "step_skipped");
        continue;
      }

      let Some(step) = pipeline.step(step_id) else {
        // Shouldn't happen: the schedule is derived from the pipeline.
        run_error = Some(format!("scheduled step '{step_id}' not in pipeline"));
        context.step_skipped(step_id);
        continue;
      };

      let input = resolve_input(graph.upstream(step_id), &outputs, &payload);

      let Some(resolved) = self.registry.resolve(&step.step_type).await else {
        // Resolved at start, but the registry changed under the run.
        let detail = format!("step type '{}' is no longer registered", step.step_type);
        let result = ExecutionResult::failure(
          FailureKind::Infrastructure,
          detail.clone(),
          Vec::new(),
          Duration::ZERO,
        );
        run_error = Some(format!("step '{step_id}' failed: {detail}"));
        self.record_failure(&mut context, &run_id, step_id, result);
        continue;
      };

      context.step_started(step_id);
      self.notifier.notify(PipelineEvent::StepStarted {
        run_id: run_id.clone(),
        step_id: step_id.clone(),
        at: chrono::Utc::now(),
      });
      info!(step_id = %step_id, step_type = %step.step_type, "step_started");

      let result = match resolved {
        ResolvedStep::Builtin(builtin) => invoke_builtin(&*builtin, input, &step.parameters).await,
        ResolvedStep::Custom(element) => {
          self
            .invoke_element(
              &element,
              step,
              pipeline.def().timeout_ms,
              input,
              cancel.child_token(),
            )
            .await
        }
      };

      if result.success {
        outputs.insert(step_id.clone(), result.output.clone());
        context.step_finished(step_id, result);
        self.notifier.notify(PipelineEvent::StepCompleted {
          run_id: run_id.clone(),
          step_id: step_id.clone(),
          at: chrono::Utc::now(),
        });
        info!(step_id = %step_id, "step_completed");
      } else {
        let detail = result
          .errors
          .first()
          .cloned()
          .unwrap_or_else(|| "step failed".to_string());
        run_error = Some(format!("step '{step_id}' failed: {detail}"));
        self.record_failure(&mut context, &run_id, step_id, result);
      }
    }

    match run_error {
      None => {
        context.complete();
        self.notifier.notify(PipelineEvent::RunCompleted {
          run_id: run_id.clone(),
          at: chrono::Utc::now(),
        });
        info!("run_completed");
      }
      Some(error) => {
        context.fail(&error);
        self.notifier.notify(PipelineEvent::RunFailed {
          run_id: run_id.clone(),
          error: error.clone(),
          at: chrono::Utc::now(),
        });
        error!(error = %error, "run_failed");
      }
    }

    context.snapshot()
  }

  fn record_failure(
    &self,
    context: &mut RunContext,
    run_id: &str,
    step_id: &str,
    result: ExecutionResult,
  ) {
    let detail = result
      .errors
      .first()
      .cloned()
      .unwrap_or_else(|| "step failed".to_string());
    error!(step_id = %step_id, error = %detail, "step_failed");
    context.step_finished(step_id, result);
    self.notifier.notify(PipelineEvent::StepFailed {
      run_id: run_id.to_string(),
      step_id: step_id.to_string(),
      error: detail,
      at: chrono::Utc::now(),
    });
  }

  /// Run a custom element under its per-step deadline.
  async fn invoke_element(
    &self,
    element: &CustomElement,
    step: &StepDef,
    pipeline_timeout_ms: Option<u64>,
    input: Value,
    cancel: CancellationToken,
  ) -> ExecutionResult {
    // The verdict was checked at registration; refuse to run anything
    // whose stored verdict is not clean.
    if !element.verdict.safe {
      return ExecutionResult::failure(
        FailureKind::Infrastructure,
        format!(
          "element '{}' carries a rejected verdict: {}",
          element.name(),
          element.verdict.summary()
        ),
        Vec::new(),
        Duration::ZERO,
      );
    }

    let Some(runner) = self.runners.get(&element.language()) else {
      return ExecutionResult::failure(
        FailureKind::Infrastructure,
        format!("no runner configured for language '{}'", element.language()),
        Vec::new(),
        Duration::ZERO,
      );
    };

    let timeout_ms = step
      .timeout_ms
      .or(pipeline_timeout_ms)
      .unwrap_or(DEFAULT_STEP_TIMEOUT_MS);
    let job = ScriptJob::new(
      element.script(),
      input,
      merged_parameters(element, step),
      Deadline::after(Duration::from_millis(timeout_ms)),
    );
    runner.execute(job, cancel).await
  }
}

async fn invoke_builtin(
  builtin: &dyn BuiltinStep,
  input: Value,
  parameters: &Map<String, Value>,
) -> ExecutionResult {
  let started = Instant::now();
  match builtin.invoke(input, parameters).await {
    Ok(output) => ExecutionResult::success(output, Vec::new(), started.elapsed()),
    Err(e) => ExecutionResult::failure(
      FailureKind::Runtime,
      e.to_string(),
      Vec::new(),
      started.elapsed(),
    ),
  }
}

/// A step's input: no dependencies — the run payload; one — that step's
/// output verbatim; several — an object keyed by dependency id.
fn resolve_input(deps: &[String], outputs: &HashMap<String, Value>, payload: &Value) -> Value {
  match deps {
    [] => payload.clone(),
    [only] => outputs.get(only).cloned().unwrap_or(Value::Null),
    many => {
      let mut object = Map::new();
      for dep in many {
        object.insert(dep.clone(), outputs.get(dep).cloned().unwrap_or(Value::Null));
      }
      Value::Object(object)
    }
  }
}

/// Element defaults with the step's own parameters layered on top.
fn merged_parameters(element: &CustomElement, step: &StepDef) -> Map<String, Value> {
  let mut merged = element.def.parameters.clone();
  for (key, value) in &step.parameters {
    merged.insert(key.clone(), value.clone());
  }
  merged
}
