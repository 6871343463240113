//! Per-user in-memory state with inactivity expiry.
//!
//! Each user holds at most one value per map. Mutations for a single user run
//! under that user's shard lock; different users never wait on each other
//! beyond shard collisions.

use chrono::{DateTime, Duration, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

const MAX_TTL_SECS: u64 = 10 * 365 * 24 * 60 * 60;

/// What to do with a slot after [`UserStateMap::alter`] ran.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Slot {
    Keep,
    Clear,
}

struct Stamped<T> {
    value: T,
    touched: DateTime<Utc>,
}

impl<T> Stamped<T> {
    fn new(value: T) -> Self {
        Self {
            value,
            touched: Utc::now(),
        }
    }
}

pub struct UserStateMap<T> {
    entries: DashMap<String, Stamped<T>>,
    ttl: Duration,
}

impl<T> UserStateMap<T> {
    pub fn new(ttl_seconds: u64) -> Self {
        Self {
            entries: DashMap::new(),
            ttl: Duration::seconds(ttl_seconds.min(MAX_TTL_SECS) as i64),
        }
    }

    fn is_expired(&self, stamped: &Stamped<T>, now: DateTime<Utc>) -> bool {
        now - stamped.touched >= self.ttl
    }

    /// Whether a live (non-expired) value exists for `user`.
    pub fn contains(&self, user: &str) -> bool {
        let now = Utc::now();
        match self.entries.get(user) {
            Some(stamped) => !self.is_expired(&stamped, now),
            None => false,
        }
    }

    /// Stores `value`, replacing whatever the user had.
    pub fn insert(&self, user: &str, value: T) {
        self.entries.insert(user.to_string(), Stamped::new(value));
    }

    /// Stores `value` only when the user has no live value. Gives the value
    /// back on conflict.
    pub fn insert_if_vacant(&self, user: &str, value: T) -> Result<(), T> {
        let now = Utc::now();
        match self.entries.entry(user.to_string()) {
            Entry::Occupied(mut occupied) => {
                if self.is_expired(occupied.get(), now) {
                    occupied.insert(Stamped::new(value));
                    Ok(())
                } else {
                    Err(value)
                }
            }
            Entry::Vacant(vacant) => {
                vacant.insert(Stamped::new(value));
                Ok(())
            }
        }
    }

    /// Runs `f` on the user's live value under its lock, refreshing the
    /// inactivity clock, and removes the slot when `f` answers [`Slot::Clear`].
    /// Returns `None` when there is no live value.
    pub fn alter<R>(&self, user: &str, f: impl FnOnce(&mut T) -> (R, Slot)) -> Option<R> {
        let now = Utc::now();
        match self.entries.entry(user.to_string()) {
            Entry::Occupied(mut occupied) => {
                if self.is_expired(occupied.get(), now) {
                    occupied.remove();
                    return None;
                }
                let stamped = occupied.get_mut();
                stamped.touched = now;
                let (result, slot) = f(&mut stamped.value);
                if slot == Slot::Clear {
                    occupied.remove();
                }
                Some(result)
            }
            Entry::Vacant(_) => None,
        }
    }

    /// Removes and returns the user's live value.
    pub fn take(&self, user: &str) -> Option<T> {
        let now = Utc::now();
        let (_, stamped) = self.entries.remove(user)?;
        if self.is_expired(&stamped, now) {
            None
        } else {
            Some(stamped.value)
        }
    }

    /// Drops every expired slot, returning how many went away.
    pub fn purge_expired(&self) -> usize {
        let now = Utc::now();
        let before = self.entries.len();
        self.entries
            .retain(|_, stamped| now - stamped.touched < self.ttl);
        before.saturating_sub(self.entries.len())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}
