//! Operon Registry
//!
//! The lookup surface between pipeline definitions and runnable code. A
//! step's `type` field names either a builtin (compiled into the embedding
//! process, trusted) or a custom element (a user script admitted through
//! the security analyzer, addressed by id or by unambiguous name).
//!
//! Registration is the single security gate: an element whose script the
//! analyzer rejects is never stored, and the accepted verdict travels with
//! the element for the rest of its life. [`FsElementStore`] persists
//! elements between invocations of the embedding process; reloaded
//! elements pass the analyzer again on admission.

mod builtin;
mod element;
mod error;
mod registry;
mod store;
mod template;

pub use builtin::{BuiltinError, BuiltinFn, BuiltinStep};
pub use element::CustomElement;
pub use error::RegistryError;
pub use operon_sandbox::{SecurityVerdict, Violation, ViolationCategory};
pub use registry::{ResolvedStep, StepRegistry, StepRegistryBuilder};
pub use store::FsElementStore;
pub use template::script_template;
