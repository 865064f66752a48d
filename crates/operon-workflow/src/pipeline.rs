use std::collections::HashSet;

use operon_config::{PipelineDef, StepDef};

use crate::error::PipelineError;
use crate::graph::Graph;

/// A validated pipeline ready for scheduling.
///
/// Construction checks referential integrity — unique step ids, every
/// `depends_on` entry and edge endpoint naming an existing step — and
/// reduces the two dependency representations (per-step `depends_on` and
/// the explicit edge list) into one normalized, de-duplicated edge set.
/// Cycle detection happens at scheduling time, where the offending steps
/// can be named precisely.
#[derive(Debug, Clone)]
pub struct Pipeline {
  def: PipelineDef,
  edges: Vec<(String, String)>,
}

impl Pipeline {
  pub fn new(def: PipelineDef) -> Result<Self, PipelineError> {
    let mut known: HashSet<&str> = HashSet::with_capacity(def.steps.len());
    for step in &def.steps {
      if !known.insert(step.id.as_str()) {
        return Err(PipelineError::DuplicateStep(step.id.clone()));
      }
    }

    let mut edges: Vec<(String, String)> = Vec::new();
    let mut seen: HashSet<(String, String)> = HashSet::new();

    for step in &def.steps {
      for dependency in &step.depends_on {
        if !known.contains(dependency.as_str()) {
          return Err(PipelineError::UnknownDependency {
            step: step.id.clone(),
            dependency: dependency.clone(),
          });
        }
        let edge = (dependency.clone(), step.id.clone());
        if seen.insert(edge.clone()) {
          edges.push(edge);
        }
      }
    }

    for edge in &def.edges {
      if !known.contains(edge.from.as_str()) || !known.contains(edge.to.as_str()) {
        return Err(PipelineError::EdgeUnknownStep {
          from: edge.from.clone(),
          to: edge.to.clone(),
        });
      }
      let pair = (edge.from.clone(), edge.to.clone());
      if seen.insert(pair.clone()) {
        edges.push(pair);
      }
    }

    Ok(Self { def, edges })
  }

  pub fn def(&self) -> &PipelineDef {
    &self.def
  }

  pub fn pipeline_id(&self) -> &str {
    &self.def.pipeline_id
  }

  /// Get a step definition by id.
  pub fn step(&self, step_id: &str) -> Option<&StepDef> {
    self.def.step(step_id)
  }

  pub fn step_ids(&self) -> impl Iterator<Item = &String> {
    self.def.steps.iter().map(|s| &s.id)
  }

  /// Normalized dependency edges, `depends_on` and explicit edges unioned.
  pub fn edges(&self) -> &[(String, String)] {
    &self.edges
  }

  /// Build the graph structure for traversal.
  pub fn graph(&self) -> Graph {
    Graph::new(self.step_ids(), &self.edges)
  }
}
