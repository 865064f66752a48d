use std::collections::{BTreeSet, HashMap};

use crate::error::PipelineError;
use crate::pipeline::Pipeline;

/// A linear execution order consistent with every dependency edge.
///
/// Produced by Kahn's algorithm over the pipeline graph. When several steps
/// are ready at once the lowest step id is scheduled first, so the same
/// definition always yields the same order — scheduling is reproducible
/// across runs by construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schedule {
  order: Vec<String>,
}

impl Schedule {
  /// Compute the execution order, or report the steps stuck in a cycle.
  pub fn plan(pipeline: &Pipeline) -> Result<Self, PipelineError> {
    let graph = pipeline.graph();

    let mut in_degree: HashMap<&str, usize> = pipeline
      .step_ids()
      .map(|id| (id.as_str(), graph.in_degree(id)))
      .collect();

    // BTreeSet keeps the ready steps ordered; the first element is always
    // the lowest id, which is the deterministic tie-break.
    let mut ready: BTreeSet<&str> = in_degree
      .iter()
      .filter(|(_, degree)| **degree == 0)
      .map(|(id, _)| *id)
      .collect();

    let mut order: Vec<String> = Vec::with_capacity(in_degree.len());

    while let Some(&next) = ready.iter().next() {
      ready.remove(next);
      in_degree.remove(next);
      order.push(next.to_string());

      for downstream in graph.downstream(next) {
        if let Some(degree) = in_degree.get_mut(downstream.as_str()) {
          *degree -= 1;
          if *degree == 0 {
            ready.insert(downstream.as_str());
          }
        }
      }
    }

    if !in_degree.is_empty() {
      let mut remaining: Vec<String> = in_degree.keys().map(|id| id.to_string()).collect();
      remaining.sort();
      return Err(PipelineError::Cycle { remaining });
    }

    Ok(Self { order })
  }

  /// Step ids in execution order.
  pub fn order(&self) -> &[String] {
    &self.order
  }

  pub fn len(&self) -> usize {
    self.order.len()
  }

  pub fn is_empty(&self) -> bool {
    self.order.is_empty()
  }

  pub fn iter(&self) -> impl Iterator<Item = &String> {
    self.order.iter()
  }
}
