//! Small TTL cache injected into the engine.
//!
//! Time is passed in by the caller (from the engine `Clock`), so expiry is
//! deterministic in tests. Expired entries are dropped on lookup and swept
//! on every insert, so keys that are never read again do not accumulate.

use chrono::{DateTime, Duration, Utc};
use std::{collections::HashMap, hash::Hash};

#[derive(Debug)]
pub struct TtlCache<K, V> {
    ttl:     Duration,
    entries: HashMap<K, (DateTime<Utc>, V)>,
}

impl<K: Eq + Hash, V: Clone> TtlCache<K, V> {
    /// A zero TTL disables caching: inserts are ignored.
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: HashMap::new(),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.ttl > Duration::zero()
    }

    pub fn get(&mut self, key: &K, now: DateTime<Utc>) -> Option<V> {
        match self.entries.get(key) {
            Some((expires_at, value)) if now < *expires_at => Some(value.clone()),
            Some(_) => {
                self.entries.remove(key);
                None
            }
            None => None,
        }
    }

    pub fn insert(&mut self, key: K, value: V, now: DateTime<Utc>) {
        self.insert_until(key, value, now, DateTime::<Utc>::MAX_UTC);
    }

    /// Insert an entry that expires after the TTL or at `deadline`,
    /// whichever comes first.
    pub fn insert_until(
        &mut self,
        key: K,
        value: V,
        now: DateTime<Utc>,
        deadline: DateTime<Utc>,
    ) {
        if !self.is_enabled() {
            return;
        }
        self.purge_expired(now);
        let expires_at = now
            .checked_add_signed(self.ttl)
            .map_or(deadline, |at| at.min(deadline));
        if now < expires_at {
            self.entries.insert(key, (expires_at, value));
        } else {
            self.entries.remove(&key);
        }
    }

    pub fn purge_expired(&mut self, now: DateTime<Utc>) {
        self.entries.retain(|_, (expires_at, _)| now < *expires_at);
    }

    pub fn invalidate(&mut self, key: &K) {
        self.entries.remove(key);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
