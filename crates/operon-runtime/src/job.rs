use serde_json::{Map, Value};

use crate::deadline::Deadline;

/// One runner invocation: the script plus everything it may observe.
///
/// `input` is the resolved output of the step's dependencies, `parameters`
/// the step's own configuration (element defaults already merged under it).
/// The runner exposes both to the script and nothing else.
#[derive(Debug, Clone)]
pub struct ScriptJob {
  pub script: String,
  pub input: Value,
  pub parameters: Map<String, Value>,
  pub deadline: Deadline,
}

impl ScriptJob {
  pub fn new(
    script: impl Into<String>,
    input: Value,
    parameters: Map<String, Value>,
    deadline: Deadline,
  ) -> Self {
    Self {
      script: script.into(),
      input,
      parameters,
      deadline,
    }
  }
}
