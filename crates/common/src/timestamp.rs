//! Physical timestamps (microseconds since Unix epoch)

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Wall-clock timestamp in microseconds since the Unix epoch
///
/// Wall-clock time (rather than `Instant`) is used so that reservation
/// timestamps written by one process can be compared by another after a
/// restart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Timestamp(u64);

impl Timestamp {
    /// Current wall-clock time
    pub fn now() -> Self {
        let micros = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_micros() as u64)
            .unwrap_or(0);
        Self(micros)
    }

    pub fn from_micros(micros: u64) -> Self {
        Self(micros)
    }

    pub fn as_micros(&self) -> u64 {
        self.0
    }

    /// Add a duration, saturating at `u64::MAX` microseconds
    pub fn saturating_add(&self, duration: Duration) -> Self {
        let micros = u64::try_from(duration.as_micros()).unwrap_or(u64::MAX);
        Self(self.0.saturating_add(micros))
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_saturating_add() {
        let ts = Timestamp::from_micros(1_000);
        assert_eq!(
            ts.saturating_add(Duration::from_millis(2)),
            Timestamp::from_micros(3_000)
        );

        let max = Timestamp::from_micros(u64::MAX - 1);
        assert_eq!(
            max.saturating_add(Duration::from_secs(1)),
            Timestamp::from_micros(u64::MAX)
        );
    }
}
