//! # Anime Suggestion Common Library
//!
//! Shared code for the anisug crates including:
//! - Error type and result alias
//! - TOML configuration loading and atomic write-back
//! - Data folder resolution

pub mod config;
pub mod error;

pub use error::{Error, Result};
