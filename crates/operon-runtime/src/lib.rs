//! Operon Runtime
//!
//! Runner abstraction for operon script execution. Every supported language
//! has one [`ScriptRunner`] implementation; the executor never branches on
//! concrete languages, it just dispatches a [`ScriptJob`] to the matching
//! runner.
//!
//! The contract is deliberately infallible at the type level: `execute`
//! returns an [`ExecutionResult`] in every case. Script errors, deadline
//! expiry, and spawn failures are all encoded as failure results with a
//! [`FailureKind`] so callers can tell "your code failed" apart from "the
//! platform failed" — only the latter is safe to retry blindly.

mod deadline;
mod job;
mod result;
mod runner;

pub use deadline::Deadline;
pub use job::ScriptJob;
pub use result::{ExecutionResult, FailureKind};
pub use runner::ScriptRunner;
