//! Reservation-based message queue
//!
//! Producers push text messages; consumers pull one message at a time and
//! receive a receipt handle. A pulled message is hidden from other consumers
//! until it is deleted with that handle or its visibility timeout passes, in
//! which case it goes back to the front of the queue for redelivery.
//!
//! Delivery is at-least-once. State lives in a `StorageBackend`: volatile
//! (`InMemoryQueueService`) or file-backed with crash recovery
//! (`FileQueueService`).

pub mod cache;
pub mod config;
pub mod engine;
pub mod service;

pub use cache::ReservationCache;
pub use config::QueueConfig;
pub use engine::{FileQueueService, InMemoryQueueService, QueueEngine, QueueStats};
pub use service::QueueService;

pub use visq_common::{Error, Message, MessageId, QueueId, ReceiptHandle, Reservation, Result};
pub use visq_storage_file::FileStorageConfig;
