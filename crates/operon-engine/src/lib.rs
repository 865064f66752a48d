//! Operon Engine
//!
//! Turns validated pipeline definitions into runs. The
//! [`PipelineExecutor`] owns the step registry, one runner per script
//! language, and a notifier; it walks a scheduled pipeline strictly
//! sequentially, records every step outcome, and fails fast. The
//! [`PipelineEngine`] layers run tracking on top: runs execute as
//! detached tasks, observed through [`RunSnapshot`]s and cancelled
//! through their tokens.
//!
//! ```text
//! PipelineDef ──validate──▶ Pipeline ──plan──▶ Schedule
//!                                                │
//!                         PipelineEngine::start  ▼
//!            RunContext ◀──── PipelineExecutor::drive ────▶ events
//!                │                     │
//!            snapshots           ScriptRunner / BuiltinStep
//! ```

mod context;
mod engine;
mod error;
mod events;
mod executor;

pub use context::{RunContext, RunSnapshot, RunStatus, StepRecord, StepStatus};
pub use engine::PipelineEngine;
pub use error::EngineError;
pub use events::{ChannelNotifier, ExecutionNotifier, NoopNotifier, PipelineEvent};
pub use executor::{DEFAULT_STEP_TIMEOUT_MS, PipelineExecutor};
