use serde::{Deserialize, Serialize};

use crate::edge::Edge;
use crate::step::StepDef;

/// A pipeline definition: a set of steps plus dependency edges.
///
/// Read-only once a run starts. Dependencies declared per-step via
/// `depends_on` and the explicit `edges` list are unioned during
/// validation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineDef {
  pub pipeline_id: String,
  pub name: String,
  /// Default per-step deadline for this pipeline, overridable per step.
  #[serde(skip_serializing_if = "Option::is_none")]
  pub timeout_ms: Option<u64>,
  pub steps: Vec<StepDef>,
  #[serde(default)]
  pub edges: Vec<Edge>,
}

impl PipelineDef {
  /// Look up a step definition by id.
  pub fn step(&self, id: &str) -> Option<&StepDef> {
    self.steps.iter().find(|s| s.id == id)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn deserializes_minimal_pipeline() {
    let def: PipelineDef = serde_json::from_str(
      r#"{
        "pipeline_id": "p1",
        "name": "Minimal",
        "steps": [
          {"id": "a", "type": "sequence_stats"},
          {"id": "b", "type": "filter_records", "depends_on": ["a"]}
        ]
      }"#,
    )
    .unwrap();
    assert_eq!(def.steps.len(), 2);
    assert!(def.edges.is_empty());
    assert_eq!(def.step("b").unwrap().depends_on, vec!["a".to_string()]);
    assert!(def.step("missing").is_none());
  }

  #[test]
  fn deserializes_explicit_edges() {
    let def: PipelineDef = serde_json::from_str(
      r#"{
        "pipeline_id": "p2",
        "name": "Edges",
        "steps": [
          {"id": "a", "type": "x"},
          {"id": "b", "type": "y"}
        ],
        "edges": [{"from": "a", "to": "b"}]
      }"#,
    )
    .unwrap();
    assert_eq!(def.edges.len(), 1);
    assert_eq!(def.edges[0].from, "a");
    assert_eq!(def.edges[0].to, "b");
  }
}
