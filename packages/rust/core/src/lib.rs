//! Core graph assembly and domain logic for SkyDAG.
//!
//! This crate ties together naming, stage templates, and the workflow
//! graph into the end-to-end build (`build_workflow`).

pub mod builder;
pub mod graph;
pub mod naming;
pub mod stage;
