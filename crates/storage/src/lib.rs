//! Storage backend trait and types for visq queues
//!
//! A backend holds two structures per queue: the pending sequence (messages
//! waiting for delivery, in delivery order) and the reservation table
//! (messages currently handed out, keyed by receipt handle).

use std::collections::{HashMap, VecDeque};
use std::time::Duration;
use visq_common::{Message, QueueId, ReceiptHandle, Reservation, Result};

/// Messages waiting for delivery, head first
pub type PendingMessages = VecDeque<Message>;

/// Live reservations of a queue, keyed by receipt handle
pub type ReservationTable = HashMap<ReceiptHandle, Reservation>;

/// Outcome of a startup recovery pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RecoveryReport {
    /// Queues whose reservation snapshot was scanned
    pub queues_scanned: usize,
    /// Expired reservations whose messages went back to pending
    pub messages_restored: usize,
    /// Reservation snapshots deleted because their queue no longer exists
    pub orphans_removed: usize,
    /// Leftovers of interrupted writes deleted
    pub temp_files_removed: usize,
}

/// Trait for queue storage backends
///
/// Reads never fail: a missing or unreadable slot is reported as `None`,
/// which callers treat as "queue does not exist". Write failures are
/// returned as `Error::Storage`.
pub trait StorageBackend: Send + Sync {
    /// Read the pending sequence of a queue
    fn read_pending(&self, queue: &QueueId) -> Option<PendingMessages>;

    /// Replace the pending sequence of a queue
    fn write_pending(&self, queue: &QueueId, pending: &PendingMessages) -> Result<()>;

    /// Read the reservation table of a queue
    fn read_reservations(&self, queue: &QueueId) -> Option<ReservationTable>;

    /// Replace the reservation table of a queue
    fn write_reservations(&self, queue: &QueueId, reservations: &ReservationTable) -> Result<()>;

    /// Remove both structures of a queue. Unknown queues are ignored.
    fn remove_queue(&self, queue: &QueueId) -> Result<()>;

    /// List every queue that has a pending sequence
    fn list_queues(&self) -> Vec<QueueId>;

    /// Return messages of reservations that expired while no engine was
    /// running back to the front of their queues.
    ///
    /// Called once when an engine is built on top of the backend. Volatile
    /// backends start empty and have nothing to recover.
    fn recover(&self, _visibility_timeout: Duration) -> Result<RecoveryReport> {
        Ok(RecoveryReport::default())
    }

    /// Short name used in log lines
    fn backend_name(&self) -> &'static str;
}

/// Move the messages of `expired` reservations to the front of `pending`
///
/// The earliest reserved message ends up at the head, so redelivery order
/// follows the order in which the messages were originally handed out.
pub fn restore_to_front(pending: &mut PendingMessages, mut expired: Vec<Reservation>) {
    expired.sort_by(|a, b| b.reserved_at.cmp(&a.reserved_at));
    for reservation in expired {
        pending.push_front(reservation.into_message());
    }
}
