//! sizewatch - build artifact size tracking
//!
//! This library provides the core functionality for measuring build
//! artifact sizes, deriving stable hash-free names for them, determining
//! build provenance, and submitting readings to a tracking API.

pub mod api;
pub mod ci;
pub mod cli;
pub mod collector;
pub mod config;
pub mod naming;
pub mod repo;
pub mod submission;

/// Re-export commonly used types
pub use collector::MeasuredFile;
pub use naming::{remove_base_folder, remove_file_name_hash, Extraction};
pub use repo::RepoInfo;
pub use submission::SubmissionOptions;

/// Application-wide error type
pub use anyhow::Result;

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const APP_NAME: &str = "sizewatch";
