//! Messages and reservations

use crate::id::{MessageId, ReceiptHandle};
use crate::timestamp::Timestamp;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// A message body together with the id assigned at push time
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    id: MessageId,
    body: String,
}

impl Message {
    pub fn new(id: MessageId, body: impl Into<String>) -> Self {
        Self {
            id,
            body: body.into(),
        }
    }

    pub fn id(&self) -> &MessageId {
        &self.id
    }

    pub fn body(&self) -> &str {
        &self.body
    }
}

/// A consumer's claim on a pulled message
///
/// Returned by `pull`. The receipt handle is the only way to acknowledge the
/// message; once `reserved_at + visibility_timeout` has passed the claim is
/// void and the message goes back to the queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reservation {
    pub message: Message,
    pub receipt_handle: ReceiptHandle,
    pub reserved_at: Timestamp,
}

impl Reservation {
    pub fn new(message: Message, receipt_handle: ReceiptHandle, reserved_at: Timestamp) -> Self {
        Self {
            message,
            receipt_handle,
            reserved_at,
        }
    }

    /// Instant at which the message becomes visible again
    pub fn expires_at(&self, visibility_timeout: Duration) -> Timestamp {
        self.reserved_at.saturating_add(visibility_timeout)
    }

    pub fn is_expired(&self, visibility_timeout: Duration, now: Timestamp) -> bool {
        now >= self.expires_at(visibility_timeout)
    }

    pub fn into_message(self) -> Message {
        self.message
    }
}
