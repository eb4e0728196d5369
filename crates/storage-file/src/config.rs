//! File storage configuration

use std::path::PathBuf;

/// Configuration for file-backed queue storage
#[derive(Debug, Clone)]
pub struct FileStorageConfig {
    /// Root directory holding the `pending/` and `reservations/` areas
    pub root_dir: PathBuf,

    /// Call `fsync` on every written file before it replaces the old one
    pub sync_writes: bool,
}

impl FileStorageConfig {
    /// Create a new config with the given root directory
    pub fn new(root_dir: impl Into<PathBuf>) -> Self {
        Self {
            root_dir: root_dir.into(),
            sync_writes: false,
        }
    }

    /// Set whether writes are synced to disk
    pub fn with_sync_writes(mut self, sync_writes: bool) -> Self {
        self.sync_writes = sync_writes;
        self
    }
}
