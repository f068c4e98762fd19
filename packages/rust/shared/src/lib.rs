//! Shared types, error model, and configuration for subharvest.
//!
//! This crate is the foundation depended on by all other subharvest crates.
//! It provides:
//! - [`SubharvestError`] — the unified error type
//! - The [`Submission`] domain record
//! - Configuration ([`AppConfig`], [`RunSettings`], [`Credentials`], config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, Credentials, PreviewConfig, RedditConfig, RunSettings, StorageConfig, config_dir,
    config_file_path, init_config, load_config, load_config_from,
};
pub use error::{Result, SubharvestError};
pub use types::Submission;
