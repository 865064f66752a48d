use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The closed set of scripting languages custom elements may be written in.
///
/// Lua scripts run inside an in-process restricted evaluation environment;
/// Python and Shell scripts run in an isolated subprocess per invocation.
/// Adding a language means adding one variant here and one runner crate —
/// nothing in the executor branches on concrete languages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScriptLanguage {
  Lua,
  Python,
  Shell,
}

impl ScriptLanguage {
  /// All supported languages, in declaration order.
  pub const ALL: [ScriptLanguage; 3] = [
    ScriptLanguage::Lua,
    ScriptLanguage::Python,
    ScriptLanguage::Shell,
  ];

  pub fn as_str(&self) -> &'static str {
    match self {
      ScriptLanguage::Lua => "lua",
      ScriptLanguage::Python => "python",
      ScriptLanguage::Shell => "shell",
    }
  }

  /// Whether scripts in this language are evaluated in-process rather than
  /// in a spawned subprocess.
  pub fn is_in_process(&self) -> bool {
    matches!(self, ScriptLanguage::Lua)
  }
}

impl fmt::Display for ScriptLanguage {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

#[derive(Debug, Error)]
#[error("unknown script language: {0}")]
pub struct UnknownLanguage(pub String);

impl FromStr for ScriptLanguage {
  type Err = UnknownLanguage;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s {
      "lua" => Ok(ScriptLanguage::Lua),
      "python" => Ok(ScriptLanguage::Python),
      "shell" => Ok(ScriptLanguage::Shell),
      other => Err(UnknownLanguage(other.to_string())),
    }
  }
}
