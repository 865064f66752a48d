use async_trait::async_trait;
use operon_config::ScriptLanguage;
use tokio_util::sync::CancellationToken;

use crate::job::ScriptJob;
use crate::result::ExecutionResult;

/// Common contract for language runners.
///
/// `execute` never raises past its boundary: script errors, deadline
/// expiry, cancellation, and spawn failures are all encoded in the
/// returned [`ExecutionResult`]. The runner owns deadline enforcement —
/// the caller blocks on the future but regains control at or before the
/// job's deadline.
#[async_trait]
pub trait ScriptRunner: Send + Sync {
  /// The language this runner executes.
  fn language(&self) -> ScriptLanguage;

  /// Execute one script job.
  async fn execute(&self, job: ScriptJob, cancel: CancellationToken) -> ExecutionResult;
}
