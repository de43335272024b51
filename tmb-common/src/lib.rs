//! # TMB Common Library
//!
//! Shared code for the translation bridge services including:
//! - Database models and queries (jobs, job items, remote mappings)
//! - Error taxonomy shared by the engine and vendor adapters
//! - Configuration loading
//! - XLIFF export/import

pub mod config;
pub mod db;
pub mod error;
pub mod xliff;

pub use error::{Error, Result};
