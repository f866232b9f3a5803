//! # FACET Common Library
//!
//! Shared code for the FACET crates including:
//! - Common error type
//! - TOML configuration loading and root folder resolution
//! - Logging initialization
//! - Numeric helpers for stable, serializable scores

pub mod config;
pub mod error;
pub mod logging;
pub mod numeric;

pub use error::{Error, Result};
