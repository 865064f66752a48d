use serde::{Deserialize, Serialize};

/// An explicit dependency edge: `from` must complete before `to` starts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Edge {
  pub from: String,
  pub to: String,
}
