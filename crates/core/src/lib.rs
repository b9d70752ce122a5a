//! Core types and utilities for the trending token aggregator
//!
//! This crate provides shared types used across all components:
//! - Canonical token shape and merge keys
//! - Time windows and raw upstream records
//! - Application configuration
//! - Error taxonomy

pub mod types;
pub mod tokens;
pub mod config;
pub mod errors;

pub use types::*;
pub use tokens::*;
pub use config::*;
pub use errors::*;
