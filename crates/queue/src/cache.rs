//! Reservation cache
//!
//! Holds the live reservations of one queue together with the visibility
//! timeout that bounds them. Expiry is checked against a caller-supplied
//! `now`, so the cache itself never reads the clock.
//!
//! Expired entries stay in the map until the next sweep, but are invisible
//! to lookups from the moment they expire.

use std::time::Duration;
use visq_common::{ReceiptHandle, Reservation, Timestamp};
use visq_storage::{PendingMessages, ReservationTable, restore_to_front};

/// Per-queue map from receipt handle to reservation
#[derive(Debug, Clone)]
pub struct ReservationCache {
    visibility_timeout: Duration,
    entries: ReservationTable,
}

impl ReservationCache {
    pub fn new(visibility_timeout: Duration) -> Self {
        Self::from_table(visibility_timeout, ReservationTable::new())
    }

    /// Build a cache from a persisted reservation snapshot
    pub fn from_table(visibility_timeout: Duration, entries: ReservationTable) -> Self {
        Self {
            visibility_timeout,
            entries,
        }
    }

    /// All entries, including expired ones not yet swept
    pub fn table(&self) -> &ReservationTable {
        &self.entries
    }

    pub fn visibility_timeout(&self) -> Duration {
        self.visibility_timeout
    }

    pub fn put(&mut self, reservation: Reservation) {
        self.entries
            .insert(reservation.receipt_handle.clone(), reservation);
    }

    /// Look up a live reservation
    pub fn get(&self, handle: &ReceiptHandle, now: Timestamp) -> Option<&Reservation> {
        self.entries
            .get(handle)
            .filter(|r| !r.is_expired(self.visibility_timeout, now))
    }

    /// Remove a reservation without redelivering its message
    pub fn invalidate(&mut self, handle: &ReceiptHandle) -> Option<Reservation> {
        self.entries.remove(handle)
    }

    /// Remove and return every expired reservation
    fn drain_expired(&mut self, now: Timestamp) -> Vec<Reservation> {
        let timeout = self.visibility_timeout;
        let expired_handles: Vec<ReceiptHandle> = self
            .entries
            .values()
            .filter(|r| r.is_expired(timeout, now))
            .map(|r| r.receipt_handle.clone())
            .collect();

        expired_handles
            .iter()
            .filter_map(|handle| self.entries.remove(handle))
            .collect()
    }

    /// Evict expired reservations, putting their messages back at the front
    /// of `pending`
    ///
    /// Returns the evicted reservations so a caller that fails to persist the
    /// result can `put` them back.
    pub fn sweep(&mut self, now: Timestamp, pending: &mut PendingMessages) -> Vec<Reservation> {
        let expired = self.drain_expired(now);
        restore_to_front(pending, expired.clone());
        expired
    }

    /// Whether any entry has expired and is waiting to be swept
    pub fn has_expired(&self, now: Timestamp) -> bool {
        self.entries
            .values()
            .any(|r| r.is_expired(self.visibility_timeout, now))
    }

    /// Number of reservations that have not yet expired
    pub fn live_count(&self, now: Timestamp) -> usize {
        self.entries
            .values()
            .filter(|r| !r.is_expired(self.visibility_timeout, now))
            .count()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use visq_common::{Message, MessageId};

    const TIMEOUT: Duration = Duration::from_millis(100);

    fn at(millis: u64) -> Timestamp {
        Timestamp::from_micros(millis * 1_000)
    }

    fn reservation(body: &str, reserved_at: Timestamp) -> Reservation {
        Reservation::new(
            Message::new(MessageId::generate(), body),
            ReceiptHandle::generate(),
            reserved_at,
        )
    }

    #[test]
    fn test_get_hides_expired_entries() {
        let mut cache = ReservationCache::new(TIMEOUT);
        let r = reservation("m", at(1_000));
        let handle = r.receipt_handle.clone();
        cache.put(r);

        assert!(cache.get(&handle, at(1_050)).is_some());
        assert!(cache.get(&handle, at(1_100)).is_none());

        // Still stored until swept
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.live_count(at(1_100)), 0);
    }

    #[test]
    fn test_invalidate_does_not_redeliver() {
        let mut cache = ReservationCache::new(TIMEOUT);
        let r = reservation("m", at(1_000));
        let handle = r.receipt_handle.clone();
        cache.put(r);

        assert!(cache.invalidate(&handle).is_some());
        assert!(cache.invalidate(&handle).is_none());

        let mut pending = PendingMessages::new();
        assert!(cache.sweep(at(5_000), &mut pending).is_empty());
        assert!(pending.is_empty());
        assert!(cache.is_empty());
    }

    #[test]
    fn test_sweep_restores_only_expired() {
        let mut cache = ReservationCache::new(TIMEOUT);
        cache.put(reservation("old-1", at(1_000)));
        cache.put(reservation("old-2", at(1_010)));
        let fresh = reservation("fresh", at(1_090));
        let fresh_handle = fresh.receipt_handle.clone();
        cache.put(fresh);

        let mut pending = PendingMessages::new();
        pending.push_back(Message::new(MessageId::generate(), "queued"));

        let now = at(1_120);
        assert!(cache.has_expired(now));
        assert_eq!(cache.sweep(now, &mut pending).len(), 2);
        assert!(!cache.has_expired(now));

        let bodies: Vec<&str> = pending.iter().map(|m| m.body()).collect();
        assert_eq!(bodies, vec!["old-1", "old-2", "queued"]);

        assert_eq!(cache.len(), 1);
        assert!(cache.get(&fresh_handle, now).is_some());
    }

    #[test]
    fn test_swept_reservations_can_be_put_back() {
        let mut cache = ReservationCache::new(TIMEOUT);
        let r = reservation("m", at(1_000));
        let handle = r.receipt_handle.clone();
        cache.put(r);

        let mut pending = PendingMessages::new();
        let swept = cache.sweep(at(1_200), &mut pending);
        assert_eq!(pending.len(), 1);
        assert!(cache.is_empty());

        for reservation in swept {
            cache.put(reservation);
        }
        assert_eq!(cache.len(), 1);
        assert!(cache.has_expired(at(1_200)));
        assert!(cache.get(&handle, at(1_050)).is_some());
    }
}
