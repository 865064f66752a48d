use std::time::Duration;

use tokio::time::Instant;

/// The absolute time bound for one runner invocation.
///
/// Runners own enforcement: an in-process runner aborts its evaluation
/// cooperatively, a subprocess runner kills the child. The executor blocks
/// on the call but always regains control at or before the deadline.
#[derive(Debug, Clone, Copy)]
pub struct Deadline {
  at: Instant,
}

impl Deadline {
  /// A deadline the given duration from now.
  pub fn after(timeout: Duration) -> Self {
    Self {
      at: Instant::now() + timeout,
    }
  }

  /// A deadline at an absolute instant.
  pub fn at(instant: Instant) -> Self {
    Self { at: instant }
  }

  /// The absolute instant this deadline expires.
  pub fn instant(&self) -> Instant {
    self.at
  }

  /// Time left before expiry; zero once expired.
  pub fn remaining(&self) -> Duration {
    self.at.saturating_duration_since(Instant::now())
  }

  pub fn expired(&self) -> bool {
    Instant::now() >= self.at
  }
}
