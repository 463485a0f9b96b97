//! # mediarisk common library
//!
//! Shared code for the mediarisk crates:
//! - Error type used across crates
//! - Bootstrap configuration (TOML) and config file resolution

pub mod config;
pub mod error;

pub use error::{Error, Result};
