//! Operon Runtime Process
//!
//! The out-of-process [`ScriptRunner`](operon_runtime::ScriptRunner)
//! implementation for python and shell elements. Each invocation runs in a
//! throwaway workspace directory with a scrubbed environment: the child
//! sees a minimal `PATH`, `HOME` and `TMPDIR` inside the workspace, and an
//! `input.json` carrying the step's input and parameters. The harness
//! wraps the user script so the result comes back as a single JSON
//! document on stdout while stderr carries log lines.
//!
//! Deadlines and cancellation kill the child outright; the workspace is
//! removed on every exit path.

mod harness;
mod runner;

pub use runner::ProcessRunner;
