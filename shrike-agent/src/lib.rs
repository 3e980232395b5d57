//! Shrike Agent Library
//!
//! Backs up selected files and directories to a cloud-mounted folder by
//! driving rsync, either interactively or through a loopback HTTP trigger.

pub mod api;
pub mod config;
pub mod daemon;
pub mod executor;
pub mod models;
pub mod store;
pub mod utils;

// Re-export commonly used types
pub use config::Config;
pub use executor::SyncOrchestrator;
pub use utils::errors::SyncError;
pub type Result<T> = std::result::Result<T, SyncError>;
