//! Runner invocation results.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// What class of failure a runner invocation ended in.
///
/// Distinct kinds let an external caller retry infrastructure failures
/// (the platform broke) without ever retrying script failures (the code
/// broke) or timeouts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
  /// The deadline elapsed; the evaluation was aborted or the child killed.
  Timeout,
  /// The script's own logic raised or produced unusable output.
  Runtime,
  /// The runner could not start or drive the execution at all.
  Infrastructure,
}

/// Result of one runner invocation.
///
/// `output` is opaque to the engine: it is recorded verbatim and handed to
/// dependent steps. `failure` is `None` exactly when `success` is true.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionResult {
  pub success: bool,
  pub output: Value,
  pub log: Vec<String>,
  pub errors: Vec<String>,
  pub elapsed: Duration,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub failure: Option<FailureKind>,
}

impl ExecutionResult {
  pub fn success(output: Value, log: Vec<String>, elapsed: Duration) -> Self {
    Self {
      success: true,
      output,
      log,
      errors: Vec::new(),
      elapsed,
      failure: None,
    }
  }

  pub fn failure(
    kind: FailureKind,
    error: impl Into<String>,
    log: Vec<String>,
    elapsed: Duration,
  ) -> Self {
    Self {
      success: false,
      output: Value::Null,
      log,
      errors: vec![error.into()],
      elapsed,
      failure: Some(kind),
    }
  }

  pub fn timeout(elapsed: Duration) -> Self {
    Self::failure(
      FailureKind::Timeout,
      "deadline exceeded",
      Vec::new(),
      elapsed,
    )
  }

  /// Whether an external caller may retry this invocation blindly.
  pub fn retryable(&self) -> bool {
    matches!(self.failure, Some(FailureKind::Infrastructure))
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  #[test]
  fn success_has_no_failure_kind() {
    let result = ExecutionResult::success(json!({"n": 1}), vec![], Duration::from_millis(5));
    assert!(result.success);
    assert!(result.failure.is_none());
    assert!(!result.retryable());
  }

  #[test]
  fn only_infrastructure_failures_are_retryable() {
    let timeout = ExecutionResult::timeout(Duration::from_secs(1));
    let runtime = ExecutionResult::failure(FailureKind::Runtime, "boom", vec![], Duration::ZERO);
    let infra =
      ExecutionResult::failure(FailureKind::Infrastructure, "no interpreter", vec![], Duration::ZERO);
    assert!(!timeout.retryable());
    assert!(!runtime.retryable());
    assert!(infra.retryable());
  }

  #[test]
  fn serializes_failure_kind_snake_case() {
    let result = ExecutionResult::timeout(Duration::from_secs(2));
    let json = serde_json::to_value(&result).unwrap();
    assert_eq!(json["failure"], "timeout");
    assert_eq!(json["success"], false);
    assert_eq!(json["errors"][0], "deadline exceeded");
  }
}
