use std::process::Stdio;
use std::time::Instant;

use async_trait::async_trait;
use operon_config::ScriptLanguage;
use operon_runtime::{ExecutionResult, FailureKind, ScriptJob, ScriptRunner};
use serde_json::{Value, json};
use tempfile::TempDir;
use tokio::fs;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tokio_util::sync::CancellationToken;

use crate::harness::{Harness, INPUT_FILE};

/// Bytes of stdout/stderr retained per invocation.
const CAPTURE_LIMIT: usize = 1024 * 1024;

/// The only directories visible through `PATH` inside the child.
const SEARCH_PATH: &str = "/usr/local/bin:/usr/bin:/bin";

const CANCELLED_MSG: &str = "execution cancelled";

/// Executes python and shell scripts as short-lived child processes.
///
/// Every invocation gets a fresh scratch workspace (removed on drop, on
/// every exit path), a scrubbed environment, and an assembled program file;
/// results come back over the stdout JSON protocol described in
/// [`harness`](crate::harness).
#[derive(Debug, Clone, Copy)]
pub struct ProcessRunner {
  harness: Harness,
}

impl ProcessRunner {
  /// Runner for python elements, executed by `python3`.
  pub fn python() -> Self {
    Self {
      harness: Harness::Python,
    }
  }

  /// Runner for shell elements, executed by `/bin/sh`.
  pub fn shell() -> Self {
    Self {
      harness: Harness::Shell,
    }
  }
}

#[async_trait]
impl ScriptRunner for ProcessRunner {
  fn language(&self) -> ScriptLanguage {
    self.harness.language()
  }

  async fn execute(&self, job: ScriptJob, cancel: CancellationToken) -> ExecutionResult {
    let started = Instant::now();
    match self.run(job, cancel).await {
      Ok(result) => result,
      Err(detail) => ExecutionResult::failure(
        FailureKind::Infrastructure,
        detail,
        Vec::new(),
        started.elapsed(),
      ),
    }
  }
}

impl ProcessRunner {
  /// Drive one invocation. `Err` is reserved for infrastructure problems
  /// (workspace, spawn, wait); everything the script itself does wrong
  /// comes back as an `Ok` failure result.
  async fn run(
    &self,
    job: ScriptJob,
    cancel: CancellationToken,
  ) -> Result<ExecutionResult, String> {
    let started = Instant::now();
    let deadline = job.deadline;

    let workspace = TempDir::new().map_err(|e| format!("creating workspace failed: {e}"))?;
    let program = self.harness.program(&job.script);
    let program_path = workspace.path().join(self.harness.file_name());
    let input_path = workspace.path().join(INPUT_FILE);

    let payload = serde_json::to_vec(&json!({
      "input": job.input,
      "parameters": job.parameters,
    }))
    .map_err(|e| format!("encoding payload failed: {e}"))?;
    fs::write(&input_path, payload)
      .await
      .map_err(|e| format!("writing {INPUT_FILE} failed: {e}"))?;
    fs::write(&program_path, program)
      .await
      .map_err(|e| format!("writing program failed: {e}"))?;

    let mut command = Command::new(self.harness.interpreter());
    command
      .arg(&program_path)
      .current_dir(workspace.path())
      .env_clear()
      .env("PATH", SEARCH_PATH)
      .env("HOME", workspace.path())
      .env("TMPDIR", workspace.path())
      .env("INPUT_FILE", &input_path)
      .stdin(Stdio::null())
      .stdout(Stdio::piped())
      .stderr(Stdio::piped())
      .kill_on_drop(true);

    let mut child = command
      .spawn()
      .map_err(|e| format!("spawning {} failed: {e}", self.harness.interpreter()))?;
    let child_stdout = child.stdout.take();
    let child_stderr = child.stderr.take();

    let (status, stdout, stderr) = tokio::select! {
      waited = async {
        let (status, stdout, stderr) = tokio::join!(
          child.wait(),
          read_capped(child_stdout),
          read_capped(child_stderr),
        );
        status.map(|status| (status, stdout, stderr))
      } => {
        waited.map_err(|e| format!("waiting for {} failed: {e}", self.harness.interpreter()))?
      }
      _ = tokio::time::sleep_until(deadline.instant()) => {
        // Returning drops the child handle; kill_on_drop reaps it.
        return Ok(ExecutionResult::timeout(started.elapsed()));
      }
      _ = cancel.cancelled() => {
        return Ok(ExecutionResult::failure(
          FailureKind::Timeout,
          CANCELLED_MSG,
          Vec::new(),
          started.elapsed(),
        ));
      }
    };

    let (stderr_bytes, stderr_discarded) = stderr;
    let log = capture_lines(&stderr_bytes, stderr_discarded);
    let elapsed = started.elapsed();

    if !status.success() {
      let code = status.code().unwrap_or(-1);
      let message = match log.iter().rev().find(|line| !line.trim().is_empty()) {
        Some(detail) => format!("exited with status {code}: {detail}"),
        None => format!("exited with status {code}"),
      };
      return Ok(ExecutionResult::failure(
        FailureKind::Runtime,
        message,
        log,
        elapsed,
      ));
    }

    let (stdout_bytes, stdout_discarded) = stdout;
    let stdout = capture(&stdout_bytes, stdout_discarded);
    let body = stdout.trim();
    if body.is_empty() {
      return Ok(ExecutionResult::success(Value::Null, log, elapsed));
    }
    match serde_json::from_str(body) {
      Ok(output) => Ok(ExecutionResult::success(output, log, elapsed)),
      Err(e) => Ok(ExecutionResult::failure(
        FailureKind::Runtime,
        format!("stdout is not valid JSON: {e}"),
        log,
        elapsed,
      )),
    }
  }
}

/// Drain a child stream to EOF, retaining at most [`CAPTURE_LIMIT`] bytes.
///
/// Bytes past the cap are dropped as they arrive, never buffered; the pipe
/// is still read to the end so the child cannot block on a full buffer.
/// Returns the retained bytes and a count of the dropped ones.
async fn read_capped<R>(stream: Option<R>) -> (Vec<u8>, usize)
where
  R: AsyncRead + Unpin,
{
  let Some(mut stream) = stream else {
    return (Vec::new(), 0);
  };
  let mut collected = Vec::new();
  let mut discarded = 0usize;
  let mut chunk = [0u8; 8192];
  loop {
    match stream.read(&mut chunk).await {
      Ok(0) | Err(_) => break,
      Ok(n) => {
        let remaining = CAPTURE_LIMIT.saturating_sub(collected.len());
        let keep = n.min(remaining);
        collected.extend_from_slice(&chunk[..keep]);
        discarded += n - keep;
      }
    }
  }
  (collected, discarded)
}

/// Lossy text of a captured stream, with a marker line when output was
/// dropped at the cap.
fn capture(bytes: &[u8], discarded: usize) -> String {
  let text = String::from_utf8_lossy(bytes).into_owned();
  if discarded == 0 {
    return text;
  }
  format!("{text}\n[truncated at {CAPTURE_LIMIT} bytes]")
}

fn capture_lines(bytes: &[u8], discarded: usize) -> Vec<String> {
  capture(bytes, discarded).lines().map(str::to_string).collect()
}

#[cfg(test)]
mod tests {
  use super::*;
  use operon_runtime::Deadline;
  use serde_json::Map;
  use std::time::Duration;

  fn job(script: &str) -> ScriptJob {
    ScriptJob::new(
      script,
      json!(null),
      Map::new(),
      Deadline::after(Duration::from_secs(10)),
    )
  }

  #[tokio::test]
  async fn shell_step_emits_json_result() {
    let runner = ProcessRunner::shell();
    let result = runner
      .execute(job(r#"echo "{\"total\": 7}""#), CancellationToken::new())
      .await;
    assert!(result.success, "errors: {:?}", result.errors);
    assert_eq!(result.output, json!({"total": 7}));
  }

  #[tokio::test]
  async fn shell_reads_payload_through_input_file() {
    let runner = ProcessRunner::shell();
    let script_job = ScriptJob::new(
      r#"cat "$INPUT_FILE""#,
      json!({"n": 3}),
      Map::new(),
      Deadline::after(Duration::from_secs(10)),
    );
    let result = runner.execute(script_job, CancellationToken::new()).await;
    assert!(result.success, "errors: {:?}", result.errors);
    assert_eq!(result.output, json!({"input": {"n": 3}, "parameters": {}}));
  }

  #[tokio::test]
  async fn stderr_becomes_log_lines() {
    let runner = ProcessRunner::shell();
    let result = runner
      .execute(
        job("echo \"fetching records\" >&2\necho null"),
        CancellationToken::new(),
      )
      .await;
    assert!(result.success);
    assert_eq!(result.output, Value::Null);
    assert_eq!(result.log, vec!["fetching records".to_string()]);
  }

  #[tokio::test]
  async fn empty_stdout_is_null_output() {
    let runner = ProcessRunner::shell();
    let result = runner.execute(job("true"), CancellationToken::new()).await;
    assert!(result.success);
    assert_eq!(result.output, Value::Null);
  }

  #[tokio::test]
  async fn environment_is_scrubbed() {
    let runner = ProcessRunner::shell();
    let result = runner
      .execute(job(r#"echo "{\"path\": \"$PATH\"}""#), CancellationToken::new())
      .await;
    assert!(result.success);
    assert_eq!(result.output, json!({"path": SEARCH_PATH}));
  }

  #[tokio::test]
  async fn nonzero_exit_is_runtime_failure() {
    let runner = ProcessRunner::shell();
    let result = runner
      .execute(
        job("echo \"input missing a field\" >&2\nexit 3"),
        CancellationToken::new(),
      )
      .await;
    assert!(!result.success);
    assert_eq!(result.failure, Some(FailureKind::Runtime));
    assert!(result.errors[0].contains("status 3"));
    assert!(result.errors[0].contains("input missing a field"));
    assert_eq!(result.log, vec!["input missing a field".to_string()]);
  }

  #[tokio::test]
  async fn unset_variable_aborts_the_script() {
    let runner = ProcessRunner::shell();
    let result = runner
      .execute(job(r#"echo "$OPERON_NO_SUCH_VAR""#), CancellationToken::new())
      .await;
    assert!(!result.success);
    assert_eq!(result.failure, Some(FailureKind::Runtime));
  }

  #[tokio::test]
  async fn unparsable_stdout_is_runtime_failure() {
    let runner = ProcessRunner::shell();
    let result = runner
      .execute(job("echo done"), CancellationToken::new())
      .await;
    assert!(!result.success);
    assert_eq!(result.failure, Some(FailureKind::Runtime));
    assert!(result.errors[0].contains("not valid JSON"));
  }

  #[tokio::test]
  async fn deadline_kills_the_child() {
    let runner = ProcessRunner::shell();
    let script_job = ScriptJob::new(
      "sleep 5\necho '{}'",
      json!(null),
      Map::new(),
      Deadline::after(Duration::from_millis(100)),
    );
    let started = Instant::now();
    let result = runner.execute(script_job, CancellationToken::new()).await;
    assert!(!result.success);
    assert_eq!(result.failure, Some(FailureKind::Timeout));
    assert_eq!(result.errors[0], "deadline exceeded");
    assert!(started.elapsed() < Duration::from_secs(2));
  }

  #[tokio::test]
  async fn cancellation_stops_the_child() {
    let runner = ProcessRunner::shell();
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
      tokio::time::sleep(Duration::from_millis(20)).await;
      trigger.cancel();
    });
    let script_job = ScriptJob::new(
      "sleep 5",
      json!(null),
      Map::new(),
      Deadline::after(Duration::from_secs(30)),
    );
    let result = runner.execute(script_job, cancel).await;
    assert!(!result.success);
    assert_eq!(result.failure, Some(FailureKind::Timeout));
    assert_eq!(result.errors[0], CANCELLED_MSG);
  }

  #[tokio::test]
  async fn runners_report_their_language() {
    assert_eq!(ProcessRunner::python().language(), ScriptLanguage::Python);
    assert_eq!(ProcessRunner::shell().language(), ScriptLanguage::Shell);
  }

  #[tokio::test]
  async fn reader_retains_at_most_the_capture_limit() {
    let total = 64 * 1024 * 1024u64;
    let stream = tokio::io::repeat(b'a').take(total);
    let (bytes, discarded) = read_capped(Some(stream)).await;
    assert_eq!(bytes.len(), CAPTURE_LIMIT);
    // Capacity reflects what was ever buffered, not just what was kept.
    assert!(bytes.capacity() <= 2 * CAPTURE_LIMIT, "capacity {}", bytes.capacity());
    assert_eq!(discarded, total as usize - CAPTURE_LIMIT);
  }

  #[tokio::test]
  async fn oversized_stderr_is_capped_in_flight() {
    let runner = ProcessRunner::shell();
    // 16 bytes doubled 17 times is 2 MiB, twice the capture limit.
    let script = concat!(
      "s=0123456789abcdef\n",
      "i=0\n",
      "while [ \"$i\" -lt 17 ]; do s=\"$s$s\"; i=$((i+1)); done\n",
      "echo \"$s\" >&2\n",
      "echo null",
    );
    let result = runner.execute(job(script), CancellationToken::new()).await;
    assert!(result.success, "errors: {:?}", result.errors);
    let marker = format!("[truncated at {CAPTURE_LIMIT} bytes]");
    assert_eq!(result.log.last(), Some(&marker));
    let retained: usize = result.log.iter().map(String::len).sum();
    assert!(retained <= CAPTURE_LIMIT + marker.len(), "retained {retained} bytes");
  }

  #[test]
  fn capture_marks_dropped_output() {
    let kept = vec![b'x'; CAPTURE_LIMIT];
    let text = capture(&kept, 64);
    assert!(text.ends_with(&format!("[truncated at {CAPTURE_LIMIT} bytes]")));
    assert_eq!(capture(b"all here", 0), "all here");
  }
}
