//! Filesystem-based queue storage with crash recovery
//!
//! Layout under the root directory:
//! - `pending/<queue-id>`: CBOR-encoded pending sequence
//! - `reservations/<queue-id>`: CBOR-encoded reservation snapshot
//!
//! Every write goes to a hidden temporary file in the same directory and is
//! then renamed over the old file, so readers only ever see a complete blob.

mod config;

pub use config::FileStorageConfig;

use serde::Serialize;
use serde::de::DeserializeOwned;
use std::fs;
use std::io::{self, BufReader, ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;
use visq_common::{Error, QueueId, Reservation, Result, Timestamp};
use visq_storage::{
    PendingMessages, RecoveryReport, ReservationTable, StorageBackend, restore_to_front,
};

const PENDING_DIR: &str = "pending";
const RESERVATIONS_DIR: &str = "reservations";
const TEMP_PREFIX: &str = ".tmp-";

/// Filesystem-based storage backend
pub struct FileStorage {
    config: FileStorageConfig,
    pending_dir: PathBuf,
    reservations_dir: PathBuf,
}

impl FileStorage {
    /// Open (or create) a file store rooted at `config.root_dir`
    pub fn open(config: FileStorageConfig) -> Result<Self> {
        let pending_dir = config.root_dir.join(PENDING_DIR);
        let reservations_dir = config.root_dir.join(RESERVATIONS_DIR);

        fs::create_dir_all(&pending_dir).map_err(|e| {
            Error::Storage(format!("Failed to create {}: {}", pending_dir.display(), e))
        })?;
        fs::create_dir_all(&reservations_dir).map_err(|e| {
            Error::Storage(format!(
                "Failed to create {}: {}",
                reservations_dir.display(),
                e
            ))
        })?;

        tracing::info!("Opened file queue storage at {:?}", config.root_dir);

        Ok(Self {
            config,
            pending_dir,
            reservations_dir,
        })
    }

    fn pending_file(&self, queue: &QueueId) -> Option<PathBuf> {
        is_valid_file_name(queue.as_str()).then(|| self.pending_dir.join(queue.as_str()))
    }

    fn reservations_file(&self, queue: &QueueId) -> Option<PathBuf> {
        is_valid_file_name(queue.as_str()).then(|| self.reservations_dir.join(queue.as_str()))
    }

    /// Read and decode a blob; missing or undecodable files are absent
    fn read_blob<T: DeserializeOwned>(path: &Path) -> Option<T> {
        let file = match fs::File::open(path) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => return None,
            Err(e) => {
                tracing::warn!("Failed to open {:?}: {}", path, e);
                return None;
            }
        };

        match ciborium::from_reader(BufReader::new(file)) {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::warn!("Ignoring unreadable queue file {:?}: {}", path, e);
                None
            }
        }
    }

    /// Encode a blob and atomically replace `path` with it
    fn write_blob<T: Serialize>(&self, path: &Path, value: &T) -> Result<()> {
        let mut bytes = Vec::new();
        ciborium::into_writer(value, &mut bytes).map_err(|e| Error::Encoding(e.to_string()))?;

        let dir = path
            .parent()
            .ok_or_else(|| Error::Storage(format!("No parent directory for {:?}", path)))?;
        let temp_path = dir.join(format!("{}{}", TEMP_PREFIX, uuid::Uuid::new_v4()));

        let result = self
            .write_file(&temp_path, &bytes)
            .and_then(|()| fs::rename(&temp_path, path));

        if let Err(e) = result {
            let _ = fs::remove_file(&temp_path);
            tracing::warn!("Failed to write queue file {:?}: {}", path, e);
            return Err(Error::Storage(format!("Failed to write {:?}: {}", path, e)));
        }

        Ok(())
    }

    fn write_file(&self, path: &Path, bytes: &[u8]) -> io::Result<()> {
        let mut file = fs::File::create(path)?;
        file.write_all(bytes)?;
        if self.config.sync_writes {
            file.sync_all()?;
        }
        Ok(())
    }

    fn remove_file(path: &Path) -> Result<()> {
        match fs::remove_file(path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Error::Storage(format!("Failed to remove {:?}: {}", path, e))),
        }
    }

    /// Queue ids found in one of the two areas
    fn list_dir(dir: &Path) -> Vec<QueueId> {
        let mut queues = Vec::new();

        if let Ok(entries) = fs::read_dir(dir) {
            for entry in entries.filter_map(|e| e.ok()) {
                if let Some(name) = entry.file_name().to_str()
                    && is_valid_file_name(name)
                    && entry.file_type().map(|t| t.is_file()).unwrap_or(false)
                {
                    queues.push(QueueId::from(name));
                }
            }
        }

        queues.sort();
        queues
    }

    /// Delete temporary files left in `dir` by interrupted writes
    fn remove_temp_files(dir: &Path) -> usize {
        let Ok(entries) = fs::read_dir(dir) else {
            return 0;
        };

        let mut removed = 0;
        for entry in entries.filter_map(|e| e.ok()) {
            let is_temp = entry
                .file_name()
                .to_str()
                .is_some_and(|name| name.starts_with(TEMP_PREFIX));
            if !is_temp {
                continue;
            }
            match fs::remove_file(entry.path()) {
                Ok(()) => removed += 1,
                Err(e) => tracing::warn!("Failed to remove {:?}: {}", entry.path(), e),
            }
        }
        removed
    }

    /// Restore the expired reservations of a single queue
    ///
    /// Returns `None` if the snapshot was an orphan and got deleted,
    /// otherwise the number of messages moved back to pending.
    fn recover_queue(
        &self,
        queue: &QueueId,
        visibility_timeout: Duration,
        now: Timestamp,
    ) -> Result<Option<usize>> {
        let Some(mut pending) = self.read_pending(queue) else {
            if let Some(path) = self.reservations_file(queue) {
                Self::remove_file(&path)?;
            }
            return Ok(None);
        };

        let Some(table) = self.read_reservations(queue) else {
            return Ok(Some(0));
        };

        let (expired, live): (Vec<Reservation>, Vec<Reservation>) = table
            .into_values()
            .partition(|r| r.is_expired(visibility_timeout, now));

        if expired.is_empty() {
            return Ok(Some(0));
        }

        let restored = expired.len();
        restore_to_front(&mut pending, expired);

        // Pending first: a crash between the two writes duplicates a
        // message instead of losing it
        self.write_pending(queue, &pending)?;

        let live: ReservationTable = live
            .into_iter()
            .map(|r| (r.receipt_handle.clone(), r))
            .collect();
        self.write_reservations(queue, &live)?;

        tracing::debug!("Restored {} expired messages to queue {}", restored, queue);
        Ok(Some(restored))
    }
}

/// Queue ids are used verbatim as file names
fn is_valid_file_name(name: &str) -> bool {
    !name.is_empty()
        && !name.starts_with('.')
        && !name.contains(['/', '\\', '\0'])
}

impl StorageBackend for FileStorage {
    fn read_pending(&self, queue: &QueueId) -> Option<PendingMessages> {
        Self::read_blob(&self.pending_file(queue)?)
    }

    fn write_pending(&self, queue: &QueueId, pending: &PendingMessages) -> Result<()> {
        let path = self
            .pending_file(queue)
            .ok_or_else(|| Error::Storage(format!("Invalid queue id for file storage: {}", queue)))?;
        self.write_blob(&path, pending)
    }

    fn read_reservations(&self, queue: &QueueId) -> Option<ReservationTable> {
        // Stored as a list; the table is rebuilt keyed by receipt handle
        let list: Vec<Reservation> = Self::read_blob(&self.reservations_file(queue)?)?;
        Some(
            list.into_iter()
                .map(|r| (r.receipt_handle.clone(), r))
                .collect(),
        )
    }

    fn write_reservations(&self, queue: &QueueId, reservations: &ReservationTable) -> Result<()> {
        let path = self
            .reservations_file(queue)
            .ok_or_else(|| Error::Storage(format!("Invalid queue id for file storage: {}", queue)))?;
        let list: Vec<&Reservation> = reservations.values().collect();
        self.write_blob(&path, &list)
    }

    fn remove_queue(&self, queue: &QueueId) -> Result<()> {
        if let Some(path) = self.pending_file(queue) {
            Self::remove_file(&path)?;
        }
        if let Some(path) = self.reservations_file(queue) {
            Self::remove_file(&path)?;
        }
        Ok(())
    }

    fn list_queues(&self) -> Vec<QueueId> {
        Self::list_dir(&self.pending_dir)
    }

    fn recover(&self, visibility_timeout: Duration) -> Result<RecoveryReport> {
        let now = Timestamp::now();
        let mut report = RecoveryReport {
            temp_files_removed: Self::remove_temp_files(&self.pending_dir)
                + Self::remove_temp_files(&self.reservations_dir),
            ..RecoveryReport::default()
        };

        for queue in Self::list_dir(&self.reservations_dir) {
            report.queues_scanned += 1;
            match self.recover_queue(&queue, visibility_timeout, now)? {
                Some(restored) => report.messages_restored += restored,
                None => report.orphans_removed += 1,
            }
        }

        tracing::info!(
            "Recovered file queue storage at {:?}: {} queues scanned, {} messages restored, {} orphans removed, {} temp files removed",
            self.config.root_dir,
            report.queues_scanned,
            report.messages_restored,
            report.orphans_removed,
            report.temp_files_removed
        );

        Ok(report)
    }

    fn backend_name(&self) -> &'static str {
        "file"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use visq_common::{Message, MessageId, ReceiptHandle};

    fn open(dir: &Path) -> FileStorage {
        FileStorage::open(FileStorageConfig::new(dir)).unwrap()
    }

    fn message(body: &str) -> Message {
        Message::new(MessageId::generate(), body)
    }

    fn reserve(body: &str, reserved_at: Timestamp) -> Reservation {
        Reservation::new(message(body), ReceiptHandle::generate(), reserved_at)
    }

    fn table(reservations: Vec<Reservation>) -> ReservationTable {
        reservations
            .into_iter()
            .map(|r| (r.receipt_handle.clone(), r))
            .collect()
    }

    #[test]
    fn test_file_storage_persists_across_reopen() {
        let temp_dir = tempfile::tempdir().unwrap();
        let queue = QueueId::generate();

        let mut pending = PendingMessages::new();
        pending.push_back(message("one"));
        pending.push_back(message("two"));
        let reservations = table(vec![reserve("three", Timestamp::now())]);

        {
            let storage = open(temp_dir.path());
            assert!(storage.read_pending(&queue).is_none());
            storage.write_pending(&queue, &pending).unwrap();
            storage.write_reservations(&queue, &reservations).unwrap();
        }

        // Directory layout
        assert!(temp_dir.path().join("pending").join(queue.as_str()).is_file());
        assert!(
            temp_dir
                .path()
                .join("reservations")
                .join(queue.as_str())
                .is_file()
        );

        let storage = open(temp_dir.path());
        assert_eq!(storage.read_pending(&queue), Some(pending));
        assert_eq!(storage.read_reservations(&queue), Some(reservations));
        assert_eq!(storage.list_queues(), vec![queue.clone()]);

        storage.remove_queue(&queue).unwrap();
        assert!(storage.read_pending(&queue).is_none());
        assert!(storage.read_reservations(&queue).is_none());
        assert!(storage.list_queues().is_empty());
    }

    #[test]
    fn test_corrupt_file_reads_as_absent() {
        let temp_dir = tempfile::tempdir().unwrap();
        let storage = open(temp_dir.path());
        let queue = QueueId::from("broken");

        fs::write(temp_dir.path().join("pending").join("broken"), b"not cbor at all").unwrap();
        fs::write(temp_dir.path().join("reservations").join("broken"), [0xff, 0x00]).unwrap();

        assert!(storage.read_pending(&queue).is_none());
        assert!(storage.read_reservations(&queue).is_none());
    }

    #[test]
    fn test_invalid_queue_ids() {
        let temp_dir = tempfile::tempdir().unwrap();
        let storage = open(temp_dir.path());

        for id in ["", "../escape", ".hidden", "a/b"] {
            let queue = QueueId::from(id);
            assert!(storage.read_pending(&queue).is_none());
            assert!(matches!(
                storage.write_pending(&queue, &PendingMessages::new()),
                Err(Error::Storage(_))
            ));
            storage.remove_queue(&queue).unwrap();
        }
    }

    #[test]
    fn test_temp_files_are_not_listed() {
        let temp_dir = tempfile::tempdir().unwrap();
        let storage = open(temp_dir.path());

        fs::write(temp_dir.path().join("pending").join(".tmp-leftover"), b"").unwrap();
        assert!(storage.list_queues().is_empty());
    }

    #[test]
    fn test_recover_removes_leftover_temp_files() {
        let temp_dir = tempfile::tempdir().unwrap();
        let storage = open(temp_dir.path());
        let queue = QueueId::generate();
        storage.write_pending(&queue, &PendingMessages::new()).unwrap();

        let pending_leftover = temp_dir.path().join("pending").join(".tmp-interrupted");
        let reservations_leftover = temp_dir.path().join("reservations").join(".tmp-interrupted");
        fs::write(&pending_leftover, b"half a blob").unwrap();
        fs::write(&reservations_leftover, b"").unwrap();

        let report = storage.recover(Duration::from_secs(1)).unwrap();
        assert_eq!(report.temp_files_removed, 2);
        assert!(!pending_leftover.exists());
        assert!(!reservations_leftover.exists());

        // Real queue files are untouched
        assert_eq!(storage.read_pending(&queue), Some(PendingMessages::new()));
    }

    #[test]
    fn test_synced_writes_round_trip() {
        let temp_dir = tempfile::tempdir().unwrap();
        let config = FileStorageConfig::new(temp_dir.path()).with_sync_writes(true);
        assert!(config.sync_writes);

        let storage = FileStorage::open(config).unwrap();
        let queue = QueueId::generate();
        let mut pending = PendingMessages::new();
        pending.push_back(message("durable"));
        let reservations = table(vec![reserve("held", Timestamp::now())]);

        storage.write_pending(&queue, &pending).unwrap();
        storage.write_reservations(&queue, &reservations).unwrap();

        let reopened = open(temp_dir.path());
        assert_eq!(reopened.read_pending(&queue), Some(pending));
        assert_eq!(reopened.read_reservations(&queue), Some(reservations));
    }

    #[test]
    fn test_recover_restores_expired_reservations() {
        let temp_dir = tempfile::tempdir().unwrap();
        let storage = open(temp_dir.path());
        let queue = QueueId::generate();
        let timeout = Duration::from_secs(10);

        let long_ago = Timestamp::from_micros(1_000);
        let a_bit_later = Timestamp::from_micros(2_000);
        let first = reserve("first", long_ago);
        let second = reserve("second", a_bit_later);
        let live = reserve("live", Timestamp::now());
        let live_handle = live.receipt_handle.clone();

        let mut pending = PendingMessages::new();
        pending.push_back(message("newer"));
        storage.write_pending(&queue, &pending).unwrap();
        storage
            .write_reservations(&queue, &table(vec![second, live, first]))
            .unwrap();

        let report = storage.recover(timeout).unwrap();
        assert_eq!(
            report,
            RecoveryReport {
                queues_scanned: 1,
                messages_restored: 2,
                orphans_removed: 0,
                temp_files_removed: 0,
            }
        );

        let pending = storage.read_pending(&queue).unwrap();
        let bodies: Vec<&str> = pending.iter().map(|m| m.body()).collect();
        assert_eq!(bodies, vec!["first", "second", "newer"]);

        let reservations = storage.read_reservations(&queue).unwrap();
        assert_eq!(reservations.len(), 1);
        assert!(reservations.contains_key(&live_handle));

        // A second pass finds nothing to do
        let report = storage.recover(timeout).unwrap();
        assert_eq!(report.messages_restored, 0);
    }

    #[test]
    fn test_recover_removes_orphaned_snapshots() {
        let temp_dir = tempfile::tempdir().unwrap();
        let storage = open(temp_dir.path());
        let queue = QueueId::generate();

        storage
            .write_reservations(&queue, &table(vec![reserve("lost", Timestamp::from_micros(1))]))
            .unwrap();

        let report = storage.recover(Duration::from_millis(1)).unwrap();
        assert_eq!(report.orphans_removed, 1);
        assert!(storage.read_reservations(&queue).is_none());
        assert!(storage.read_pending(&queue).is_none());
    }
}
