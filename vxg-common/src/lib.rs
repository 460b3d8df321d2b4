//! # VoxGuard Common Library
//!
//! Shared code for the VoxGuard crates including:
//! - Common error and result types
//! - TOML bootstrap configuration and config file resolution
//! - Logging (tracing) initialization

pub mod config;
pub mod error;

pub use error::{Error, Result};
