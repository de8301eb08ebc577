//! CLI command implementations.
//!
//! # Command Modules
//!
//! - [`cache`] - Cache listing, statistics and element operations
//! - [`common`] - Configuration loading and registry sessions

pub mod cache;
pub mod common;
