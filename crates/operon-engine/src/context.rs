//! Run state, owned by the executor and observed through snapshots.

use chrono::{DateTime, Utc};
use operon_runtime::ExecutionResult;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;

/// Lifecycle of a whole run. Terminal states are final — a run is never
/// reopened or retried in place.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
  Pending,
  Running,
  Completed,
  Failed,
}

impl RunStatus {
  pub fn is_terminal(&self) -> bool {
    matches!(self, RunStatus::Completed | RunStatus::Failed)
  }
}

/// Lifecycle of one step within a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
  Pending,
  Running,
  Completed,
  Failed,
  /// Never invoked because the run had already failed or been cancelled.
  Skipped,
}

/// Everything recorded about one step of a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepRecord {
  pub step_id: String,
  pub status: StepStatus,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub result: Option<ExecutionResult>,
  pub started_at: Option<DateTime<Utc>>,
  pub completed_at: Option<DateTime<Utc>>,
}

impl StepRecord {
  fn pending(step_id: &str) -> Self {
    Self {
      step_id: step_id.to_string(),
      status: StepStatus::Pending,
      result: None,
      started_at: None,
      completed_at: None,
    }
  }
}

/// Immutable view of a run, published after every state change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSnapshot {
  pub run_id: String,
  pub pipeline_id: String,
  pub status: RunStatus,
  /// Step currently executing, while the run is `Running`.
  pub current_step: Option<String>,
  /// Step records in scheduled order.
  pub steps: Vec<StepRecord>,
  pub error: Option<String>,
  pub started_at: Option<DateTime<Utc>>,
  pub completed_at: Option<DateTime<Utc>>,
}

impl RunSnapshot {
  pub fn step(&self, step_id: &str) -> Option<&StepRecord> {
    self.steps.iter().find(|record| record.step_id == step_id)
  }

  pub fn is_terminal(&self) -> bool {
    self.status.is_terminal()
  }
}

/// Mutable run state with a single owner.
///
/// Only the executor driving the run holds a `RunContext`; everyone else
/// observes through the watch subscription, which receives a fresh
/// [`RunSnapshot`] after every mutation. There is no shared mutable state
/// to lock.
pub struct RunContext {
  snapshot: RunSnapshot,
  publisher: watch::Sender<RunSnapshot>,
}

impl RunContext {
  /// A pending run with one pending record per scheduled step, plus the
  /// subscription handle snapshots are published through.
  pub fn new(
    run_id: &str,
    pipeline_id: &str,
    scheduled: &[String],
  ) -> (Self, watch::Receiver<RunSnapshot>) {
    let snapshot = RunSnapshot {
      run_id: run_id.to_string(),
      pipeline_id: pipeline_id.to_string(),
      status: RunStatus::Pending,
      current_step: None,
      steps: scheduled.iter().map(|id| StepRecord::pending(id)).collect(),
      error: None,
      started_at: None,
      completed_at: None,
    };
    let (publisher, subscription) = watch::channel(snapshot.clone());
    (
      Self {
        snapshot,
        publisher,
      },
      subscription,
    )
  }

  pub fn run_id(&self) -> &str {
    &self.snapshot.run_id
  }

  pub fn snapshot(&self) -> RunSnapshot {
    self.snapshot.clone()
  }

  pub fn mark_running(&mut self) {
    self.snapshot.status = RunStatus::Running;
    self.snapshot.started_at = Some(Utc::now());
    self.publish();
  }

  pub fn step_started(&mut self, step_id: &str) {
    self.snapshot.current_step = Some(step_id.to_string());
    if let Some(record) = self.record_mut(step_id) {
      record.status = StepStatus::Running;
      record.started_at = Some(Utc::now());
    }
    self.publish();
  }

  /// Record a finished invocation; the result decides completed vs failed.
  pub fn step_finished(&mut self, step_id: &str, result: ExecutionResult) {
    let status = if result.success {
      StepStatus::Completed
    } else {
      StepStatus::Failed
    };
    if let Some(record) = self.record_mut(step_id) {
      record.status = status;
      record.result = Some(result);
      record.completed_at = Some(Utc::now());
    }
    self.snapshot.current_step = None;
    self.publish();
  }

  pub fn step_skipped(&mut self, step_id: &str) {
    if let Some(record) = self.record_mut(step_id) {
      record.status = StepStatus::Skipped;
    }
    self.publish();
  }

  pub fn complete(&mut self) {
    self.snapshot.status = RunStatus::Completed;
    self.snapshot.current_step = None;
    self.snapshot.completed_at = Some(Utc::now());
    self.publish();
  }

  pub fn fail(&mut self, error: impl Into<String>) {
    self.snapshot.status = RunStatus::Failed;
    self.snapshot.current_step = None;
    self.snapshot.error = Some(error.into());
    self.snapshot.completed_at = Some(Utc::now());
    self.publish();
  }

  fn record_mut(&mut self, step_id: &str) -> Option<&mut StepRecord> {
    self
      .snapshot
      .steps
      .iter_mut()
      .find(|record| record.step_id == step_id)
  }

  fn publish(&self) {
    // Send fails only when every subscriber is gone; the run still
    // finishes and the final state is returned to the caller directly.
    let _ = self.publisher.send(self.snapshot.clone());
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use operon_runtime::{ExecutionResult, FailureKind};
  use serde_json::json;
  use std::time::Duration;

  fn new_context() -> (RunContext, watch::Receiver<RunSnapshot>) {
    RunContext::new(
      "run-1",
      "pipe-1",
      &["a".to_string(), "b".to_string(), "c".to_string()],
    )
  }

  #[test]
  fn starts_pending_with_pending_steps() {
    let (context, subscription) = new_context();
    let snapshot = context.snapshot();
    assert_eq!(snapshot.status, RunStatus::Pending);
    assert!(snapshot.steps.iter().all(|s| s.status == StepStatus::Pending));
    assert_eq!(subscription.borrow().status, RunStatus::Pending);
  }

  #[test]
  fn publishes_every_transition() {
    let (mut context, subscription) = new_context();

    context.mark_running();
    assert_eq!(subscription.borrow().status, RunStatus::Running);

    context.step_started("a");
    assert_eq!(
      subscription.borrow().current_step.as_deref(),
      Some("a")
    );

    context.step_finished(
      "a",
      ExecutionResult::success(json!(1), vec![], Duration::from_millis(2)),
    );
    let seen = subscription.borrow().clone();
    assert_eq!(seen.step("a").unwrap().status, StepStatus::Completed);
    assert!(seen.current_step.is_none());
  }

  #[test]
  fn failure_and_skip_reach_terminal_failed() {
    let (mut context, subscription) = new_context();
    context.mark_running();
    context.step_started("a");
    context.step_finished(
      "a",
      ExecutionResult::failure(FailureKind::Runtime, "boom", vec![], Duration::ZERO),
    );
    context.step_skipped("b");
    context.step_skipped("c");
    context.fail("step 'a' failed: boom");

    let seen = subscription.borrow().clone();
    assert_eq!(seen.status, RunStatus::Failed);
    assert!(seen.is_terminal());
    assert_eq!(seen.step("a").unwrap().status, StepStatus::Failed);
    assert_eq!(seen.step("b").unwrap().status, StepStatus::Skipped);
    assert_eq!(seen.error.as_deref(), Some("step 'a' failed: boom"));
  }

  #[test]
  fn snapshots_are_detached_copies() {
    let (mut context, _subscription) = new_context();
    let before = context.snapshot();
    context.mark_running();
    assert_eq!(before.status, RunStatus::Pending);
    assert_eq!(context.snapshot().status, RunStatus::Running);
  }
}
