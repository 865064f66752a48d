use operon_sandbox::Violation;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RegistryError {
  /// Analysis found denied constructs; the element was not stored.
  #[error("element rejected: {}", violations.iter().map(|v| v.to_string()).collect::<Vec<_>>().join("; "))]
  Rejected { violations: Vec<Violation> },

  /// No element stored under the given id.
  #[error("element not found: {id}")]
  NotFound { id: String },

  /// IO error reading or writing element documents.
  #[error("io error: {0}")]
  Io(#[from] std::io::Error),

  /// Failed to parse a stored element document.
  #[error("invalid element document: {0}")]
  InvalidDocument(#[from] serde_json::Error),
}
