//! Operon Runtime Lua
//!
//! The in-process [`ScriptRunner`](operon_runtime::ScriptRunner)
//! implementation. Every invocation builds a fresh Lua VM exposing only a
//! fixed allow-list of pure primitives — the `math`, `string`, and `table`
//! libraries plus the side-effect-free base functions — with the chunk
//! loaders and introspection globals removed. The script sees two bound
//! variables, `input` and `parameters`, and reports its result through the
//! `output` global (or the chunk's return value). `print` is captured into
//! the result's log lines.
//!
//! Deadlines are enforced cooperatively: an instruction-count hook aborts
//! the VM once the deadline passes or the step is cancelled, and the caller
//! is additionally released at the deadline even if the VM is stuck inside
//! a long native operation.

mod runner;

pub use runner::LuaRunner;
