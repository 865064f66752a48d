//! Execution events and notifiers.
//!
//! Events are emitted while a run progresses so consumers can persist
//! state, stream progress to a UI, or just log. The engine never waits on
//! a consumer.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

/// Events emitted during a pipeline run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum PipelineEvent {
  RunStarted {
    run_id: String,
    pipeline_id: String,
    at: DateTime<Utc>,
  },

  StepStarted {
    run_id: String,
    step_id: String,
    at: DateTime<Utc>,
  },

  StepCompleted {
    run_id: String,
    step_id: String,
    at: DateTime<Utc>,
  },

  StepFailed {
    run_id: String,
    step_id: String,
    error: String,
    at: DateTime<Utc>,
  },

  StepSkipped {
    run_id: String,
    step_id: String,
    at: DateTime<Utc>,
  },

  RunCompleted {
    run_id: String,
    at: DateTime<Utc>,
  },

  RunFailed {
    run_id: String,
    error: String,
    at: DateTime<Utc>,
  },
}

impl PipelineEvent {
  pub fn run_id(&self) -> &str {
    match self {
      PipelineEvent::RunStarted { run_id, .. }
      | PipelineEvent::StepStarted { run_id, .. }
      | PipelineEvent::StepCompleted { run_id, .. }
      | PipelineEvent::StepFailed { run_id, .. }
      | PipelineEvent::StepSkipped { run_id, .. }
      | PipelineEvent::RunCompleted { run_id, .. }
      | PipelineEvent::RunFailed { run_id, .. } => run_id,
    }
  }
}

/// Trait for receiving execution events.
///
/// The executor calls `notify` once per event; implementations decide what
/// to do with them (persist, broadcast, log, ignore).
pub trait ExecutionNotifier: Send + Sync {
  fn notify(&self, event: PipelineEvent);
}

/// Discards all events. The default when nothing observes a run.
#[derive(Debug, Clone, Default)]
pub struct NoopNotifier;

impl ExecutionNotifier for NoopNotifier {
  fn notify(&self, _event: PipelineEvent) {}
}

/// Sends events to an unbounded channel.
///
/// Unbounded so a slow consumer never stalls a run; volume is a handful
/// of events per step, so growth stays negligible.
#[derive(Debug, Clone)]
pub struct ChannelNotifier {
  sender: mpsc::UnboundedSender<PipelineEvent>,
}

impl ChannelNotifier {
  pub fn new(sender: mpsc::UnboundedSender<PipelineEvent>) -> Self {
    Self { sender }
  }
}

impl ExecutionNotifier for ChannelNotifier {
  fn notify(&self, event: PipelineEvent) {
    // Receiver may be gone already; that is the consumer's choice.
    let _ = self.sender.send(event);
  }
}
