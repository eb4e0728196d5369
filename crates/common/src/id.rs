//! Opaque identifiers for queues, messages and reservations
//!
//! All three are UUIDv4 strings when generated locally. They are kept as
//! strings rather than `Uuid` because identifiers handed out by a remote
//! queue service (queue URLs, receipt handles) have no fixed shape.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

macro_rules! opaque_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Generate a fresh random identifier
            pub fn generate() -> Self {
                Self(Uuid::new_v4().to_string())
            }

            /// Borrow the identifier as a string slice
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

opaque_id! {
    /// Identifies a queue.
    ///
    /// Used as the storage key for both the pending sequence and the
    /// reservation table of the queue. A caller may build one from a known
    /// string to address a queue shared between engine instances.
    QueueId
}

opaque_id! {
    /// Identifies a message, assigned once at push time
    MessageId
}

opaque_id! {
    /// Single-use token returned by a pull, needed to acknowledge the message
    ReceiptHandle
}
