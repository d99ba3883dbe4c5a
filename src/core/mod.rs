pub mod comparator;
pub mod engine;
pub mod hasher;
pub mod scanner;
pub mod scheduler;

pub use comparator::{ActionSummary, CompareConfig, CopyReason, FileComparator, SyncAction};
pub use engine::{check_source, SyncConfig, SyncEngine, SyncReport};
pub use hasher::{ContentHasher, Fingerprint};
pub use scanner::{FileScanner, WalkOrder};
pub use scheduler::{RunStats, Scheduler, StopHandle};
