//! Run tracking on top of the executor.

use std::collections::HashMap;
use std::sync::Arc;

use operon_config::PipelineDef;
use operon_workflow::{Pipeline, Schedule};
use serde_json::Value;
use tokio::sync::{Mutex, watch};
use tokio_util::sync::CancellationToken;
use tracing::info;
use uuid::Uuid;

use crate::context::{RunContext, RunSnapshot};
use crate::error::EngineError;
use crate::executor::PipelineExecutor;

struct RunHandle {
  subscription: watch::Receiver<RunSnapshot>,
  cancel: CancellationToken,
}

/// Owns concurrent pipeline runs.
///
/// Each started run is a detached tokio task driving its own
/// [`RunContext`]; the engine keeps only a snapshot subscription and the
/// run's cancellation token, so runs share no mutable state with each
/// other or with callers.
pub struct PipelineEngine {
  executor: Arc<PipelineExecutor>,
  runs: Mutex<HashMap<String, RunHandle>>,
}

impl PipelineEngine {
  pub fn new(executor: Arc<PipelineExecutor>) -> Self {
    Self {
      executor,
      runs: Mutex::new(HashMap::new()),
    }
  }

  /// Pre-flight a definition without running it. Returns the order steps
  /// would run in.
  pub async fn validate(&self, def: PipelineDef) -> Result<Vec<String>, EngineError> {
    self.executor.validate(def).await
  }

  /// Validate and schedule the pipeline, then start it in the background.
  /// Returns the run id immediately; failures of individual steps land in
  /// the run's snapshots, not here.
  pub async fn start(&self, def: PipelineDef, payload: Value) -> Result<String, EngineError> {
    let pipeline = Pipeline::new(def)?;
    let schedule = Schedule::plan(&pipeline)?;
    self.executor.check_resolvable(&pipeline).await?;

    let run_id = Uuid::new_v4().to_string();
    let (context, subscription) =
      RunContext::new(&run_id, pipeline.pipeline_id(), schedule.order());
    let cancel = CancellationToken::new();

    self.runs.lock().await.insert(
      run_id.clone(),
      RunHandle {
        subscription,
        cancel: cancel.clone(),
      },
    );

    info!(run_id = %run_id, pipeline_id = %pipeline.pipeline_id(), "run_accepted");

    let executor = Arc::clone(&self.executor);
    tokio::spawn(async move {
      executor
        .drive(context, &pipeline, &schedule, payload, cancel)
        .await;
    });

    Ok(run_id)
  }

  /// The latest snapshot of a tracked run.
  pub async fn snapshot(&self, run_id: &str) -> Result<RunSnapshot, EngineError> {
    let runs = self.runs.lock().await;
    runs
      .get(run_id)
      .map(|handle| handle.subscription.borrow().clone())
      .ok_or_else(|| EngineError::UnknownRun {
        run_id: run_id.to_string(),
      })
  }

  /// Wait until the run reaches a terminal state and return that snapshot.
  pub async fn wait(&self, run_id: &str) -> Result<RunSnapshot, EngineError> {
    let mut subscription = {
      let runs = self.runs.lock().await;
      runs
        .get(run_id)
        .map(|handle| handle.subscription.clone())
        .ok_or_else(|| EngineError::UnknownRun {
          run_id: run_id.to_string(),
        })?
    };

    match subscription.wait_for(RunSnapshot::is_terminal).await {
      Ok(snapshot) => Ok(snapshot.clone()),
      // Publisher gone without a terminal snapshot: the run task died.
      Err(_) => Err(EngineError::Interrupted {
        run_id: run_id.to_string(),
      }),
    }
  }

  /// Cancel a run. The in-flight step's token fires and every remaining
  /// step is skipped; the run ends failed.
  pub async fn cancel(&self, run_id: &str) -> Result<(), EngineError> {
    let runs = self.runs.lock().await;
    let handle = runs.get(run_id).ok_or_else(|| EngineError::UnknownRun {
      run_id: run_id.to_string(),
    })?;
    handle.cancel.cancel();
    info!(run_id = %run_id, "run_cancel_requested");
    Ok(())
  }

  /// Forget a terminal run, returning its final snapshot.
  pub async fn remove(&self, run_id: &str) -> Result<RunSnapshot, EngineError> {
    let mut runs = self.runs.lock().await;
    let snapshot = {
      let handle = runs.get(run_id).ok_or_else(|| EngineError::UnknownRun {
        run_id: run_id.to_string(),
      })?;
      handle.subscription.borrow().clone()
    };
    if !snapshot.is_terminal() {
      return Err(EngineError::RunInProgress {
        run_id: run_id.to_string(),
      });
    }
    runs.remove(run_id);
    Ok(snapshot)
  }

  /// Run a pipeline to completion and clean up its tracking entry. The
  /// blocking convenience for one-shot callers.
  pub async fn execute(&self, def: PipelineDef, payload: Value) -> Result<RunSnapshot, EngineError> {
    let run_id = self.start(def, payload).await?;
    self.wait(&run_id).await?;
    self.remove(&run_id).await
  }

  /// Ids of every tracked run.
  pub async fn run_ids(&self) -> Vec<String> {
    let runs = self.runs.lock().await;
    let mut ids: Vec<String> = runs.keys().cloned().collect();
    ids.sort_unstable();
    ids
  }
}
