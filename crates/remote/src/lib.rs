//! Remote queue adapter
//!
//! Forwards every `QueueService` call to an existing managed queue service.
//! The remote side owns reservations and redelivery; nothing is tracked
//! locally. The transport is behind `RemoteQueueClient` so any SDK can be
//! plugged in.

use visq_common::{
    Error, Message, MessageId, QueueId, ReceiptHandle, Reservation, Result, Timestamp,
};
use visq_queue::QueueService;

/// A message as returned by the remote receive call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteMessage {
    pub message_id: String,
    pub body: String,
    pub receipt_handle: String,
}

/// Primitives of a managed remote queue
///
/// Implementations map transport failures to `Error::Remote`.
pub trait RemoteQueueClient: Send + Sync {
    /// Create a queue with the given name, returning its URL
    fn create_queue(&self, name: &str) -> Result<String>;

    fn delete_queue(&self, queue_url: &str) -> Result<()>;

    /// Send a message, returning the id the remote assigned
    fn send_message(&self, queue_url: &str, body: &str) -> Result<String>;

    /// Receive at most one message
    fn receive_message(&self, queue_url: &str) -> Result<Option<RemoteMessage>>;

    fn delete_message(&self, queue_url: &str, receipt_handle: &str) -> Result<()>;
}

/// `QueueService` backed by a remote queue
pub struct RemoteQueueService<C: RemoteQueueClient> {
    client: C,
}

impl<C: RemoteQueueClient> RemoteQueueService<C> {
    pub fn new(client: C) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &C {
        &self.client
    }
}

impl<C: RemoteQueueClient> QueueService for RemoteQueueService<C> {
    fn create_queue(&self) -> Result<QueueId> {
        let name = uuid::Uuid::new_v4().to_string();
        let url = self.client.create_queue(&name)?;
        tracing::debug!("Created remote queue {} at {}", name, url);
        Ok(QueueId::from(url))
    }

    fn delete_queue(&self, queue: &QueueId) -> Result<()> {
        self.client.delete_queue(queue.as_str())
    }

    fn push(&self, queue: &QueueId, body: &str) -> Result<Option<MessageId>> {
        let message_id = self.client.send_message(queue.as_str(), body)?;
        Ok(Some(MessageId::from(message_id)))
    }

    fn pull(&self, queue: &QueueId) -> Result<Option<Reservation>> {
        let received_at = Timestamp::now();
        let reservation = self.client.receive_message(queue.as_str())?.map(|m| {
            Reservation::new(
                Message::new(MessageId::from(m.message_id), m.body),
                ReceiptHandle::from(m.receipt_handle),
                received_at,
            )
        });
        Ok(reservation)
    }

    fn delete(&self, queue: &QueueId, receipt_handle: &ReceiptHandle) -> Result<()> {
        self.client
            .delete_message(queue.as_str(), receipt_handle.as_str())
    }
}

/// Wrap a transport error message as `Error::Remote`
pub fn remote_error(e: impl std::fmt::Display) -> Error {
    Error::Remote(e.to_string())
}
