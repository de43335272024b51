//! HTTP API

pub mod error;
pub mod health;
pub mod jobs;
pub mod pull;
pub mod webhook;

pub use error::{ApiError, ApiResult};
