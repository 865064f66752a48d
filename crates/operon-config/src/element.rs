use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::language::ScriptLanguage;

/// Registration payload for a custom element.
///
/// This is what the element-management surface submits; the registry turns
/// it into a stored descriptor only after the security analyzer accepts the
/// script.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElementDef {
  pub name: String,
  pub language: ScriptLanguage,
  pub script: String,
  #[serde(default)]
  pub input_schema: Value,
  #[serde(default)]
  pub output_schema: Value,
  /// Default parameters, merged under a step's own parameters at invocation.
  #[serde(default)]
  pub parameters: Map<String, Value>,
}

impl ElementDef {
  pub fn new(
    name: impl Into<String>,
    language: ScriptLanguage,
    script: impl Into<String>,
  ) -> Self {
    Self {
      name: name.into(),
      language,
      script: script.into(),
      input_schema: Value::Null,
      output_schema: Value::Null,
      parameters: Map::new(),
    }
  }
}
