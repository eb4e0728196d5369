//! In-memory storage backend
//!
//! State lives only as long as the process. Clone the `Arc` the engine was
//! built with to let several engines share one store.
//!
//! Reads hand out copies and writes replace the stored value whole, the same
//! contract the file backend has. A push or pull therefore costs O(n) in the
//! length of the queue.

use parking_lot::RwLock;
use std::collections::HashMap;
use visq_common::{QueueId, Result};
use visq_storage::{PendingMessages, ReservationTable, StorageBackend};

/// Volatile storage backend
pub struct MemoryStorage {
    // queue -> pending sequence
    pending: RwLock<HashMap<QueueId, PendingMessages>>,
    // queue -> reservation table
    reservations: RwLock<HashMap<QueueId, ReservationTable>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self {
            pending: RwLock::new(HashMap::new()),
            reservations: RwLock::new(HashMap::new()),
        }
    }
}

impl Default for MemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl StorageBackend for MemoryStorage {
    fn read_pending(&self, queue: &QueueId) -> Option<PendingMessages> {
        self.pending.read().get(queue).cloned()
    }

    fn write_pending(&self, queue: &QueueId, pending: &PendingMessages) -> Result<()> {
        self.pending.write().insert(queue.clone(), pending.clone());
        Ok(())
    }

    fn read_reservations(&self, queue: &QueueId) -> Option<ReservationTable> {
        self.reservations.read().get(queue).cloned()
    }

    fn write_reservations(&self, queue: &QueueId, reservations: &ReservationTable) -> Result<()> {
        self.reservations
            .write()
            .insert(queue.clone(), reservations.clone());
        Ok(())
    }

    fn remove_queue(&self, queue: &QueueId) -> Result<()> {
        self.pending.write().remove(queue);
        self.reservations.write().remove(queue);
        Ok(())
    }

    fn list_queues(&self) -> Vec<QueueId> {
        self.pending.read().keys().cloned().collect()
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}
