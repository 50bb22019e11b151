//! Shared types, error model, and configuration for SkyDAG.
//!
//! This crate is the foundation depended on by all other SkyDAG crates.
//! It provides:
//! - [`SkyDagError`] — the unified error type
//! - Domain types ([`Instrument`], [`SkyPatch`], [`SearchParameters`], [`ValidationPolicy`])
//! - Configuration ([`AppConfig`], config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, DefaultsConfig, config_dir, config_file_path, init_config, load_config,
    load_config_from,
};
pub use error::{Result, SkyDagError};
pub use types::{
    Instrument, MetricMode, SearchParameters, SkyCoord, SkyPatch, SkyRegion, ValidationPolicy,
};
