//! Operon Sandbox
//!
//! Static security analysis for custom element scripts. The analyzer
//! inspects a script's source — it never executes anything — and produces
//! an immutable [`SecurityVerdict`] recording whether the script references
//! any denied capability.
//!
//! The analysis is deliberately conservative: a denied token anywhere in
//! the script is sufficient to reject it, even if the surrounding code path
//! would never run. False positives are accepted in exchange for never
//! executing unverified constructs. The verdict is computed exactly once at
//! element registration and cached on the descriptor; invocation never
//! re-analyzes.

mod analyzer;
mod policy;
mod verdict;

pub use analyzer::ScriptAnalyzer;
pub use policy::{LanguagePolicy, policy_for};
pub use verdict::{SecurityVerdict, Violation, ViolationCategory};
