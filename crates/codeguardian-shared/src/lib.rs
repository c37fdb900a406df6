//! # CodeGuardian Shared
//!
//! Shared types, errors and configuration for CodeGuardian.
//! This crate provides the foundation types used across all CodeGuardian components.

pub mod config;
pub mod error;
pub mod types;

// Re-export commonly used types
pub use crate::config::*;
pub use crate::error::*;
pub use crate::types::*;

/// Version information for CodeGuardian
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
