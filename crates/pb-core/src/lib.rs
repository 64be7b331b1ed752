//! Core types and utilities for ping-buddy
//!
//! # Modules
//!
//! - `config`: Environment loading and application configuration
//! - `error`: Error taxonomy and Result alias

pub mod config;
pub mod error;

// Re-exports
pub use config::AppConfig;
pub use error::{Error, ErrorCategory, Result};
