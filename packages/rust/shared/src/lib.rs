//! Shared types, error model, and configuration for masterdoc.
//!
//! This crate is the foundation depended on by all other masterdoc crates.
//! It provides:
//! - [`MasterDocError`]: the unified error type
//! - Domain types ([`ArticleMeta`], [`SegmentRole`], [`RunWarning`], [`RunReport`])
//! - Configuration ([`AppConfig`] and its sections, config loading)
//! - [`write_atomic`]: temp-file-then-rename output writes

pub mod config;
pub mod error;
pub mod fs;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, BannerConfig, OutputConfig, PathsConfig, SectionsConfig, StyleConflict,
    TypographyConfig, config_dir, config_file_path, init_config, load_config, load_config_from,
};
pub use error::{MasterDocError, Result};
pub use fs::write_atomic;
pub use types::{ArticleMeta, ReportEntry, RunReport, RunWarning, SegmentRole};
