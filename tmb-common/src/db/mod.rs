//! Database models and queries

pub mod init;
pub mod jobs;
pub mod mappings;
pub mod models;

pub use init::*;
pub use jobs::*;
pub use mappings::*;
pub use models::*;
