//! Common types for visq
//!
//! This crate defines:
//! - Opaque identifiers for queues, messages and receipt handles
//! - Messages and the reservations handed out by `pull`
//! - Physical timestamps (microseconds since Unix epoch)
//! - The error type shared by every visq crate

mod error;
mod id;
mod message;
mod timestamp;

pub use error::{Error, Result};
pub use id::{MessageId, QueueId, ReceiptHandle};
pub use message::{Message, Reservation};
pub use timestamp::Timestamp;
