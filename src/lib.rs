pub mod cli;
pub mod config;
pub mod core;
pub mod error;
pub mod logging;
pub mod storage;

pub use core::{SyncConfig, SyncEngine, SyncReport};
pub use error::{SyncError, SyncResult};
