use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One step in a pipeline definition.
///
/// `step_type` names a registry entry: either a built-in operation or a
/// registered custom element (by id or unique name). Dependencies may be
/// declared inline here via `depends_on` or as explicit pipeline edges;
/// both reduce to the same adjacency structure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepDef {
  pub id: String,
  #[serde(rename = "type")]
  pub step_type: String,
  #[serde(default)]
  pub parameters: Map<String, Value>,
  #[serde(default)]
  pub depends_on: Vec<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub timeout_ms: Option<u64>,
}

impl StepDef {
  /// Convenience constructor for a step with no parameters or dependencies.
  pub fn new(id: impl Into<String>, step_type: impl Into<String>) -> Self {
    Self {
      id: id.into(),
      step_type: step_type.into(),
      parameters: Map::new(),
      depends_on: Vec::new(),
      timeout_ms: None,
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn deserializes_with_defaults() {
    let step: StepDef =
      serde_json::from_str(r#"{"id": "stats", "type": "sequence_stats"}"#).unwrap();
    assert_eq!(step.id, "stats");
    assert_eq!(step.step_type, "sequence_stats");
    assert!(step.parameters.is_empty());
    assert!(step.depends_on.is_empty());
    assert!(step.timeout_ms.is_none());
  }

  #[test]
  fn deserializes_full_form() {
    let step: StepDef = serde_json::from_str(
      r#"{
        "id": "filter",
        "type": "filter_records",
        "parameters": {"min_length": 50},
        "depends_on": ["load"],
        "timeout_ms": 1000
      }"#,
    )
    .unwrap();
    assert_eq!(step.depends_on, vec!["load".to_string()]);
    assert_eq!(step.parameters["min_length"], 50);
    assert_eq!(step.timeout_ms, Some(1000));
  }
}
