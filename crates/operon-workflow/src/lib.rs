//! Operon Workflow
//!
//! This crate provides the validated pipeline representation for operon.
//! A [`Pipeline`] is the checked form of a [`operon_config::PipelineDef`]:
//! step ids are unique, every declared dependency and edge endpoint refers
//! to an existing step, and the per-step `depends_on` lists and explicit
//! edge list have been reduced to one adjacency structure.
//!
//! Scheduling ([`Schedule::plan`]) is pure and side-effect-free: it orders
//! steps so that every step appears after all of its dependencies, with a
//! deterministic tie-break so the same definition always schedules the same
//! way, and reports cycles as hard validation errors.

mod error;
mod graph;
mod pipeline;
mod schedule;

pub use error::PipelineError;
pub use graph::Graph;
pub use pipeline::Pipeline;
pub use schedule::Schedule;
