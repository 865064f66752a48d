use std::fmt;

use serde::{Deserialize, Serialize};

/// Capability categories a script may be rejected for referencing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViolationCategory {
  ProcessControl,
  FileIo,
  DynamicEval,
  EnvironmentAccess,
  NetworkEgress,
  PrivilegeEscalation,
  DestructiveCommand,
  Syntax,
}

impl ViolationCategory {
  pub fn as_str(&self) -> &'static str {
    match self {
      ViolationCategory::ProcessControl => "process_control",
      ViolationCategory::FileIo => "file_io",
      ViolationCategory::DynamicEval => "dynamic_eval",
      ViolationCategory::EnvironmentAccess => "environment_access",
      ViolationCategory::NetworkEgress => "network_egress",
      ViolationCategory::PrivilegeEscalation => "privilege_escalation",
      ViolationCategory::DestructiveCommand => "destructive_command",
      ViolationCategory::Syntax => "syntax",
    }
  }
}

impl fmt::Display for ViolationCategory {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

/// One denied construct found in a script.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Violation {
  pub category: ViolationCategory,
  pub detail: String,
}

impl Violation {
  pub fn new(category: ViolationCategory, detail: impl Into<String>) -> Self {
    Self {
      category,
      detail: detail.into(),
    }
  }
}

impl fmt::Display for Violation {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}: {}", self.category, self.detail)
  }
}

/// The immutable outcome of analyzing one script.
///
/// `safe` is true exactly when `violations` is empty. The verdict is never
/// recomputed implicitly — re-registration is required to re-validate a
/// changed script.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecurityVerdict {
  pub safe: bool,
  pub violations: Vec<Violation>,
}

impl SecurityVerdict {
  pub fn from_violations(violations: Vec<Violation>) -> Self {
    Self {
      safe: violations.is_empty(),
      violations,
    }
  }

  pub fn accepted() -> Self {
    Self::from_violations(Vec::new())
  }

  /// Human-readable one-line summary of every violation.
  pub fn summary(&self) -> String {
    self
      .violations
      .iter()
      .map(|v| v.to_string())
      .collect::<Vec<_>>()
      .join("; ")
  }
}
