//! Artifact persistence: atomic store, document layouts and the workspace lock.

pub mod documents;
pub mod lock;
pub mod store;

pub use documents::{Documents, Layout};
pub use lock::WorkspaceLock;
pub use store::{ArtifactStore, BackupEntry, StagedWrite, WriteReceipt};
