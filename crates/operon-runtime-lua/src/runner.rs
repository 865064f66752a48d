use std::sync::{Arc, Mutex};
use std::time::Instant;

use async_trait::async_trait;
use mlua::{HookTriggers, Lua, LuaOptions, LuaSerdeExt, StdLib, Value, VmState};
use operon_config::ScriptLanguage;
use operon_runtime::{ExecutionResult, FailureKind, ScriptJob, ScriptRunner};
use tokio_util::sync::CancellationToken;

/// Base globals stripped from the evaluation environment. Everything here
/// either loads code, touches the host process, or pokes through the VM's
/// abstraction; the standard `os`, `io`, `package`, and `debug` libraries
/// are never loaded in the first place.
const REMOVED_GLOBALS: &[&str] = &[
  "load",
  "loadstring",
  "dofile",
  "loadfile",
  "require",
  "collectgarbage",
  "getmetatable",
  "setmetatable",
  "rawget",
  "rawset",
  "rawequal",
  "rawlen",
];

/// How many VM instructions run between deadline checks.
const HOOK_INTERVAL: u32 = 2048;

const DEADLINE_MSG: &str = "deadline exceeded";
const CANCELLED_MSG: &str = "execution cancelled";

/// Executes Lua scripts in a per-invocation restricted VM.
#[derive(Debug, Default, Clone, Copy)]
pub struct LuaRunner;

impl LuaRunner {
  pub fn new() -> Self {
    Self
  }
}

#[async_trait]
impl ScriptRunner for LuaRunner {
  fn language(&self) -> ScriptLanguage {
    ScriptLanguage::Lua
  }

  async fn execute(&self, job: ScriptJob, cancel: CancellationToken) -> ExecutionResult {
    let started = Instant::now();
    let deadline = job.deadline;
    let log: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));

    let eval_log = Arc::clone(&log);
    let eval_cancel = cancel.clone();
    let mut handle = tokio::task::spawn_blocking(move || evaluate(job, eval_cancel, eval_log));

    tokio::select! {
      joined = &mut handle => match joined {
        Ok(result) => result,
        Err(e) => ExecutionResult::failure(
          FailureKind::Infrastructure,
          format!("evaluation task failed: {e}"),
          drain_log(&log),
          started.elapsed(),
        ),
      },
      _ = tokio::time::sleep_until(deadline.instant()) => {
        // The hook aborts the VM shortly after; the caller is released now.
        ExecutionResult::failure(
          FailureKind::Timeout,
          DEADLINE_MSG,
          drain_log(&log),
          started.elapsed(),
        )
      }
      _ = cancel.cancelled() => {
        ExecutionResult::failure(
          FailureKind::Timeout,
          CANCELLED_MSG,
          drain_log(&log),
          started.elapsed(),
        )
      }
    }
  }
}

/// Run the script to completion on the blocking thread.
fn evaluate(
  job: ScriptJob,
  cancel: CancellationToken,
  log: Arc<Mutex<Vec<String>>>,
) -> ExecutionResult {
  let started = Instant::now();
  match run_restricted(&job, cancel, Arc::clone(&log)) {
    Ok(output) => ExecutionResult::success(output, drain_log(&log), started.elapsed()),
    Err(e) => {
      let kind = if is_deadline_error(&e) {
        FailureKind::Timeout
      } else {
        FailureKind::Runtime
      };
      ExecutionResult::failure(kind, e.to_string(), drain_log(&log), started.elapsed())
    }
  }
}

/// Build the restricted environment and evaluate the chunk inside it.
fn run_restricted(
  job: &ScriptJob,
  cancel: CancellationToken,
  log: Arc<Mutex<Vec<String>>>,
) -> mlua::Result<serde_json::Value> {
  let lua = Lua::new_with(
    StdLib::MATH | StdLib::STRING | StdLib::TABLE,
    LuaOptions::default(),
  )?;
  let globals = lua.globals();

  for name in REMOVED_GLOBALS {
    globals.set(*name, Value::Nil)?;
  }

  let print_log = Arc::clone(&log);
  let print = lua.create_function(move |_, args: mlua::Variadic<Value>| {
    let line = args
      .iter()
      .map(display_value)
      .collect::<Vec<_>>()
      .join("\t");
    if let Ok(mut lines) = print_log.lock() {
      lines.push(line);
    }
    Ok(())
  })?;
  globals.set("print", print)?;

  globals.set("input", lua.to_value(&job.input)?)?;
  globals.set("parameters", lua.to_value(&job.parameters)?)?;

  let deadline = job.deadline;
  let _ = lua.set_hook(
    HookTriggers::new().every_nth_instruction(HOOK_INTERVAL),
    move |_lua, _debug| {
      if cancel.is_cancelled() {
        return Err(mlua::Error::RuntimeError(CANCELLED_MSG.to_string()));
      }
      if deadline.expired() {
        return Err(mlua::Error::RuntimeError(DEADLINE_MSG.to_string()));
      }
      Ok(VmState::Continue)
    },
  );

  let returned: Value = lua.load(job.script.as_str()).set_name("element").eval()?;

  // The designated output variable wins; a bare return value is the
  // fallback for expression-style scripts.
  let output: Value = globals.get("output")?;
  let chosen = if output.is_nil() { returned } else { output };
  lua.from_value(chosen)
}

fn display_value(value: &Value) -> String {
  match value {
    Value::Nil => "nil".to_string(),
    Value::Boolean(b) => b.to_string(),
    Value::Integer(i) => i.to_string(),
    Value::Number(n) => n.to_string(),
    Value::String(s) => s.to_string_lossy().to_string(),
    other => format!("<{}>", other.type_name()),
  }
}

fn drain_log(log: &Arc<Mutex<Vec<String>>>) -> Vec<String> {
  match log.lock() {
    Ok(mut lines) => std::mem::take(&mut *lines),
    Err(_) => Vec::new(),
  }
}

/// Hook errors surface wrapped in callback errors; walk the chain to tell
/// a deadline abort apart from the script's own failures.
fn is_deadline_error(error: &mlua::Error) -> bool {
  match error {
    mlua::Error::CallbackError { cause, .. } => is_deadline_error(cause),
    mlua::Error::RuntimeError(message) => {
      message.contains(DEADLINE_MSG) || message.contains(CANCELLED_MSG)
    }
    _ => false,
  }
}
