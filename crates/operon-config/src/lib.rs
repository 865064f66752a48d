//! Operon Config
//!
//! This crate contains the serializable pipeline configuration types for
//! operon. These types describe a pipeline before it is validated and
//! scheduled by the engine.
//!
//! Configuration can be loaded from:
//! - JSON files (via CLI with `operon run pipeline.json`)
//! - Document storage (as JSON blobs)
//!
//! The engine takes these configuration types, validates their referential
//! integrity, and resolves them into a scheduled form for execution.

mod edge;
mod element;
mod language;
mod pipeline;
mod step;

pub use edge::Edge;
pub use element::ElementDef;
pub use language::{ScriptLanguage, UnknownLanguage};
pub use pipeline::PipelineDef;
pub use step::StepDef;
