//! # PSQ Common Library
//!
//! Shared code for the pesticide-screen quantitation tools including:
//! - Common error and result types
//! - TOML bootstrap configuration loading
//! - Timestamp utilities

pub mod config;
pub mod error;
pub mod time;

pub use error::{Error, Result};
