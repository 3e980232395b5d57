//! Domain types shared by the pipeline, the store and the HTTP layer.

pub mod destination;
pub mod entry;
pub mod sync_result;

pub use destination::Destination;
pub use entry::{BackupEntry, EntryKind};
pub use sync_result::{SyncResult, SyncSnapshot, SyncStatus};
