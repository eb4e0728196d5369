//! The queue service facade
//!
//! Callers program against `QueueService`; the local engine and the remote
//! pass-through adapter both implement it.

use visq_common::{MessageId, QueueId, ReceiptHandle, Reservation, Result};

/// Operations of a reservation-based message queue
pub trait QueueService: Send + Sync {
    /// Create a new, empty queue
    fn create_queue(&self) -> Result<QueueId>;

    /// Delete a queue and everything in it. Unknown queues are ignored.
    fn delete_queue(&self, queue: &QueueId) -> Result<()>;

    /// Push a message to the tail of a queue.
    ///
    /// Returns the generated message id, or `None` if the queue is unknown.
    fn push(&self, queue: &QueueId, body: &str) -> Result<Option<MessageId>>;

    /// Pull a single message from a queue.
    ///
    /// The message becomes invisible to other consumers until the visibility
    /// timeout passes. If it is not deleted in that time it is delivered
    /// again. Returns `None` if the queue is unknown or has nothing visible.
    fn pull(&self, queue: &QueueId) -> Result<Option<Reservation>>;

    /// Delete a message received by `pull`, using its receipt handle.
    ///
    /// Unknown or expired handles are ignored.
    fn delete(&self, queue: &QueueId, receipt_handle: &ReceiptHandle) -> Result<()>;
}
