use std::collections::HashMap;

/// Adjacency structure over step ids.
///
/// Steps never hold references to each other; the graph is a pair of
/// id-keyed adjacency maps, which keeps traversal cheap and ownership flat.
#[derive(Debug, Clone)]
pub struct Graph {
  /// step_id -> downstream step ids (steps that depend on it).
  adjacency: HashMap<String, Vec<String>>,
  /// step_id -> upstream step ids (its dependencies).
  reverse_adjacency: HashMap<String, Vec<String>>,
  /// Steps with no dependencies, sorted by id.
  entry_points: Vec<String>,
}

impl Graph {
  /// Build a graph from step ids and normalized `(from, to)` edges.
  ///
  /// Edges are assumed validated: both endpoints name known steps.
  pub fn new<'a>(step_ids: impl IntoIterator<Item = &'a String>, edges: &[(String, String)]) -> Self {
    let mut adjacency: HashMap<String, Vec<String>> = HashMap::new();
    let mut reverse_adjacency: HashMap<String, Vec<String>> = HashMap::new();

    for id in step_ids {
      adjacency.entry(id.clone()).or_default();
      reverse_adjacency.entry(id.clone()).or_default();
    }

    for (from, to) in edges {
      adjacency.entry(from.clone()).or_default().push(to.clone());
      reverse_adjacency
        .entry(to.clone())
        .or_default()
        .push(from.clone());
    }

    let mut entry_points: Vec<String> = reverse_adjacency
      .iter()
      .filter(|(_, incoming)| incoming.is_empty())
      .map(|(id, _)| id.clone())
      .collect();
    entry_points.sort();

    Self {
      adjacency,
      reverse_adjacency,
      entry_points,
    }
  }

  /// Steps with no dependencies, in id order.
  pub fn entry_points(&self) -> &[String] {
    &self.entry_points
  }

  /// Steps that depend on the given step.
  pub fn downstream(&self, step_id: &str) -> &[String] {
    self
      .adjacency
      .get(step_id)
      .map(|v| v.as_slice())
      .unwrap_or(&[])
  }

  /// The given step's dependencies.
  pub fn upstream(&self, step_id: &str) -> &[String] {
    self
      .reverse_adjacency
      .get(step_id)
      .map(|v| v.as_slice())
      .unwrap_or(&[])
  }

  /// Number of dependencies of the given step.
  pub fn in_degree(&self, step_id: &str) -> usize {
    self.upstream(step_id).len()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn ids(names: &[&str]) -> Vec<String> {
    names.iter().map(|s| s.to_string()).collect()
  }

  fn edge(from: &str, to: &str) -> (String, String) {
    (from.to_string(), to.to_string())
  }

  #[test]
  fn tracks_upstream_and_downstream() {
    let steps = ids(&["a", "b", "c"]);
    let edges = vec![edge("a", "b"), edge("a", "c")];
    let graph = Graph::new(&steps, &edges);

    assert_eq!(graph.downstream("a"), &["b".to_string(), "c".to_string()]);
    assert_eq!(graph.upstream("b"), &["a".to_string()]);
    assert_eq!(graph.upstream("a"), &[] as &[String]);
    assert_eq!(graph.in_degree("c"), 1);
  }

  #[test]
  fn entry_points_are_sorted() {
    let steps = ids(&["z", "m", "a", "sink"]);
    let edges = vec![edge("z", "sink"), edge("m", "sink"), edge("a", "sink")];
    let graph = Graph::new(&steps, &edges);

    assert_eq!(
      graph.entry_points(),
      &["a".to_string(), "m".to_string(), "z".to_string()]
    );
  }

  #[test]
  fn unknown_step_has_empty_neighbourhood() {
    let steps = ids(&["a"]);
    let graph = Graph::new(&steps, &[]);

    assert!(graph.upstream("missing").is_empty());
    assert!(graph.downstream("missing").is_empty());
  }
}
