use chrono::{DateTime, Utc};
use operon_config::{ElementDef, ScriptLanguage};
use operon_sandbox::SecurityVerdict;
use serde::{Deserialize, Serialize};

/// A user-supplied script step that passed registration analysis.
///
/// The verdict is computed once at registration and cached with the
/// element; execution checks the cached verdict but never re-analyzes.
/// Changing a script means registering a new element.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomElement {
  pub id: String,
  pub def: ElementDef,
  pub verdict: SecurityVerdict,
  pub created_at: DateTime<Utc>,
}

impl CustomElement {
  pub fn name(&self) -> &str {
    &self.def.name
  }

  pub fn language(&self) -> ScriptLanguage {
    self.def.language
  }

  pub fn script(&self) -> &str {
    &self.def.script
  }
}
