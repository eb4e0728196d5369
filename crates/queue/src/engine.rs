//! Queue engine
//!
//! Implements create/delete queue, push, pull and delete on top of a
//! `StorageBackend`. One mutex per engine is held for the whole of every
//! operation across all queues, so no two operations ever observe a half
//! updated queue.
//!
//! Expired reservations are swept opportunistically: `pull` and `delete`
//! restore them before doing anything else, and `reap_expired` sweeps every
//! queue on demand. A persistent backend additionally restores them once at
//! startup (see `StorageBackend::recover`).

use crate::cache::ReservationCache;
use crate::config::QueueConfig;
use crate::service::QueueService;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use visq_common::{
    Message, MessageId, QueueId, ReceiptHandle, Reservation, Result, Timestamp,
};
use visq_storage::{PendingMessages, StorageBackend};
use visq_storage_file::{FileStorage, FileStorageConfig};
use visq_storage_memory::MemoryStorage;

/// Queue engine over volatile storage
pub type InMemoryQueueService = QueueEngine<MemoryStorage>;

/// Queue engine over file storage
pub type FileQueueService = QueueEngine<FileStorage>;

/// Message counts of a queue at a point in time
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueStats {
    /// Messages waiting for delivery, including expired reservations not yet swept
    pub pending: usize,
    /// Reservations that have not expired
    pub reserved: usize,
}

/// Reservation-based queue engine
pub struct QueueEngine<S: StorageBackend> {
    storage: Arc<S>,

    visibility_timeout: Duration,

    /// Reservation caches of the queues this engine has touched, loaded from
    /// storage on first use. The mutex doubles as the engine-wide lock.
    reservations: Mutex<HashMap<QueueId, ReservationCache>>,
}

impl QueueEngine<MemoryStorage> {
    /// Create an engine with its own volatile store
    pub fn in_memory(config: QueueConfig) -> Result<Self> {
        Self::new(Arc::new(MemoryStorage::new()), config)
    }
}

impl QueueEngine<FileStorage> {
    /// Open an engine on a file store, recovering expired reservations
    pub fn open(config: QueueConfig, storage_config: FileStorageConfig) -> Result<Self> {
        Self::new(Arc::new(FileStorage::open(storage_config)?), config)
    }
}

impl<S: StorageBackend> QueueEngine<S> {
    /// Create an engine on top of `storage`
    ///
    /// Fails on an invalid config or if the backend cannot complete its
    /// startup recovery.
    pub fn new(storage: Arc<S>, config: QueueConfig) -> Result<Self> {
        config.validate()?;

        let report = storage.recover(config.visibility_timeout)?;
        tracing::debug!(
            "Queue engine started on {} storage (visibility timeout {:?}, {} messages recovered)",
            storage.backend_name(),
            config.visibility_timeout,
            report.messages_restored
        );

        Ok(Self {
            storage,
            visibility_timeout: config.visibility_timeout,
            reservations: Mutex::new(HashMap::new()),
        })
    }

    pub fn visibility_timeout(&self) -> Duration {
        self.visibility_timeout
    }

    pub fn storage(&self) -> &Arc<S> {
        &self.storage
    }

    /// Create an empty queue and return its id
    pub fn create_queue(&self) -> Result<QueueId> {
        let mut registry = self.reservations.lock();
        let queue = QueueId::generate();
        let cache = ReservationCache::new(self.visibility_timeout);

        let persisted = self
            .storage
            .write_pending(&queue, &PendingMessages::new())
            .and_then(|()| self.storage.write_reservations(&queue, cache.table()));
        if let Err(e) = persisted {
            let _ = self.storage.remove_queue(&queue);
            return Err(e);
        }

        registry.insert(queue.clone(), cache);
        tracing::debug!("Created queue {}", queue);
        Ok(queue)
    }

    /// Remove a queue with all its messages. Unknown queues are ignored.
    pub fn delete_queue(&self, queue: &QueueId) -> Result<()> {
        let mut registry = self.reservations.lock();
        registry.remove(queue);
        self.storage.remove_queue(queue)?;
        tracing::debug!("Deleted queue {}", queue);
        Ok(())
    }

    /// Append a message to the tail of a queue
    ///
    /// Returns `None` if the queue does not exist.
    pub fn push(&self, queue: &QueueId, body: &str) -> Result<Option<MessageId>> {
        let _registry = self.reservations.lock();

        let Some(mut pending) = self.storage.read_pending(queue) else {
            return Ok(None);
        };

        let message_id = MessageId::generate();
        pending.push_back(Message::new(message_id.clone(), body));
        self.storage.write_pending(queue, &pending)?;

        Ok(Some(message_id))
    }

    /// Reserve the message at the head of a queue
    ///
    /// Returns `None` if the queue does not exist or has no visible message.
    /// The message stays hidden until the returned receipt handle is deleted
    /// or the visibility timeout passes.
    pub fn pull(&self, queue: &QueueId) -> Result<Option<Reservation>> {
        let mut registry = self.reservations.lock();

        let Some(mut pending) = self.storage.read_pending(queue) else {
            registry.remove(queue);
            return Ok(None);
        };

        let cache = Self::cache_for(&self.storage, self.visibility_timeout, &mut registry, queue);
        let now = Timestamp::now();
        self.restore_expired(queue, cache, &mut pending, now)?;

        let Some(message) = pending.pop_front() else {
            return Ok(None);
        };

        let reservation = Reservation::new(message, ReceiptHandle::generate(), now);
        cache.put(reservation.clone());

        // Reservation snapshot before pending: a crash in between leaves the
        // message in both places, so it is redelivered rather than lost
        let persisted = self
            .storage
            .write_reservations(queue, cache.table())
            .and_then(|()| self.storage.write_pending(queue, &pending));
        if let Err(e) = persisted {
            cache.invalidate(&reservation.receipt_handle);
            let _ = self.storage.write_reservations(queue, cache.table());
            return Err(e);
        }

        Ok(Some(reservation))
    }

    /// Acknowledge a pulled message, removing it for good
    ///
    /// Unknown queues and unknown or expired receipt handles are ignored; an
    /// expired reservation's message has already gone back to the queue.
    pub fn delete(&self, queue: &QueueId, receipt_handle: &ReceiptHandle) -> Result<()> {
        let mut registry = self.reservations.lock();

        let Some(mut pending) = self.storage.read_pending(queue) else {
            registry.remove(queue);
            return Ok(());
        };

        let cache = Self::cache_for(&self.storage, self.visibility_timeout, &mut registry, queue);
        let now = Timestamp::now();
        self.restore_expired(queue, cache, &mut pending, now)?;

        if cache.get(receipt_handle, now).is_none() {
            tracing::debug!(
                "Ignoring unknown receipt handle {} on queue {}",
                receipt_handle,
                queue
            );
            return Ok(());
        }
        let Some(reservation) = cache.invalidate(receipt_handle) else {
            return Ok(());
        };

        if let Err(e) = self.storage.write_reservations(queue, cache.table()) {
            cache.put(reservation);
            return Err(e);
        }

        tracing::debug!(
            "Deleted message {} from queue {}",
            reservation.message.id(),
            queue
        );
        Ok(())
    }

    /// Sweep every queue in storage, restoring expired reservations
    ///
    /// Returns the number of messages made visible again. Redelivery does
    /// not depend on this being called; it only shortens the time an expired
    /// message waits for the next `pull`.
    pub fn reap_expired(&self) -> Result<usize> {
        let mut registry = self.reservations.lock();
        let queues = self.storage.list_queues();
        registry.retain(|queue, _| queues.contains(queue));

        let now = Timestamp::now();
        let mut restored = 0;

        for queue in &queues {
            let Some(mut pending) = self.storage.read_pending(queue) else {
                continue;
            };
            let cache =
                Self::cache_for(&self.storage, self.visibility_timeout, &mut registry, queue);
            restored += self.restore_expired(queue, cache, &mut pending, now)?;
        }

        Ok(restored)
    }

    /// Message counts of a queue, or `None` if it does not exist
    pub fn stats(&self, queue: &QueueId) -> Option<QueueStats> {
        let mut registry = self.reservations.lock();
        let pending = self.storage.read_pending(queue)?;
        let cache = Self::cache_for(&self.storage, self.visibility_timeout, &mut registry, queue);
        let now = Timestamp::now();

        Some(QueueStats {
            pending: pending.len() + cache.len() - cache.live_count(now),
            reserved: cache.live_count(now),
        })
    }

    /// Get the cache of a queue, loading its snapshot from storage while the
    /// cache is empty
    ///
    /// An empty cache is reloaded on every call, so it picks up reservations
    /// another engine on the same store has taken since.
    fn cache_for<'a>(
        storage: &S,
        visibility_timeout: Duration,
        registry: &'a mut HashMap<QueueId, ReservationCache>,
        queue: &QueueId,
    ) -> &'a mut ReservationCache {
        let cache = registry
            .entry(queue.clone())
            .or_insert_with(|| ReservationCache::new(visibility_timeout));

        if cache.is_empty()
            && let Some(table) = storage.read_reservations(queue)
        {
            *cache = ReservationCache::from_table(visibility_timeout, table);
        }
        cache
    }

    /// Move expired reservations of `queue` back to the front of `pending`
    /// and persist both structures if anything changed
    ///
    /// Runs with the engine lock held by the caller; it persists directly
    /// instead of going back through `push`, so the lock is never taken twice.
    /// On a write failure the swept reservations go back into the cache and
    /// `pending` is left untouched.
    fn restore_expired(
        &self,
        queue: &QueueId,
        cache: &mut ReservationCache,
        pending: &mut PendingMessages,
        now: Timestamp,
    ) -> Result<usize> {
        if !cache.has_expired(now) {
            return Ok(0);
        }

        let mut restored = pending.clone();
        let expired = cache.sweep(now, &mut restored);

        for reservation in &expired {
            tracing::debug!(
                "Reservation {} on queue {} expired, redelivering message {}",
                reservation.receipt_handle,
                queue,
                reservation.message.id()
            );
        }

        // Pending before the snapshot: a crash in between duplicates the
        // message rather than losing it
        let persisted = self.storage.write_pending(queue, &restored).and_then(|()| {
            self.storage
                .write_reservations(queue, cache.table())
                .inspect_err(|_| {
                    // Undo, or the messages would be both pending and reserved
                    let _ = self.storage.write_pending(queue, pending);
                })
        });
        if let Err(e) = persisted {
            tracing::warn!(
                "Failed to restore {} expired messages on queue {}: {}",
                expired.len(),
                queue,
                e
            );
            for reservation in expired {
                cache.put(reservation);
            }
            return Err(e);
        }

        *pending = restored;
        Ok(expired.len())
    }
}

impl<S: StorageBackend> QueueService for QueueEngine<S> {
    fn create_queue(&self) -> Result<QueueId> {
        QueueEngine::create_queue(self)
    }

    fn delete_queue(&self, queue: &QueueId) -> Result<()> {
        QueueEngine::delete_queue(self, queue)
    }

    fn push(&self, queue: &QueueId, body: &str) -> Result<Option<MessageId>> {
        QueueEngine::push(self, queue, body)
    }

    fn pull(&self, queue: &QueueId) -> Result<Option<Reservation>> {
        QueueEngine::pull(self, queue)
    }

    fn delete(&self, queue: &QueueId, receipt_handle: &ReceiptHandle) -> Result<()> {
        QueueEngine::delete(self, queue, receipt_handle)
    }
}
