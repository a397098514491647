//! Per-entity leases.
//!
//! A [`LockTable`] hands out blocking shared or exclusive leases keyed by
//! entity id. Leases are RAII guards: dropping one releases it, so every
//! exit path of a resolution (success, validation failure, panic) lets
//! waiting callers proceed.
//!
//! Stores wrap a lease together with a snapshot of the entity in
//! [`Exclusive`] or [`Shared`], which deref to the snapshot.

use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;
use std::ops::{Deref, DerefMut};
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};

#[derive(Debug, Default, Clone, Copy)]
struct Holders {
    readers: usize,
    writer: bool,
    waiting_writers: usize,
}

impl Holders {
    const fn is_idle(self) -> bool {
        !self.writer && self.readers == 0 && self.waiting_writers == 0
    }
}

/// Blocking reader/writer leases keyed by `K`.
///
/// Waiting writers take priority: once an exclusive request is queued, new
/// shared requests for that key wait behind it.
///
/// Keys with no holders are not stored, so the table only grows with the
/// number of entities currently leased.
#[derive(Debug)]
pub struct LockTable<K> {
    held: Mutex<HashMap<K, Holders>>,
    released: Condvar,
}

impl<K> Default for LockTable<K> {
    fn default() -> Self {
        Self {
            held: Mutex::new(HashMap::new()),
            released: Condvar::new(),
        }
    }
}

impl<K: Copy + Eq + Hash + fmt::Debug> LockTable<K> {
    /// Create an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn table(&self) -> MutexGuard<'_, HashMap<K, Holders>> {
        // The map is only mutated in small non-panicking sections.
        self.held.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Block until no one else holds `key`, then hold it exclusively.
    pub fn exclusive(&self, key: K) -> LockGuard<'_, K> {
        let mut held = self.table();
        held.entry(key).or_default().waiting_writers += 1;
        loop {
            let holders = held.entry(key).or_default();
            if !holders.writer && holders.readers == 0 {
                holders.writer = true;
                holders.waiting_writers -= 1;
                break;
            }
            held = self
                .released
                .wait(held)
                .unwrap_or_else(PoisonError::into_inner);
        }
        tracing::trace!(?key, "exclusive lease acquired");
        LockGuard {
            table: self,
            key,
            mode: Mode::Exclusive,
        }
    }

    /// Block until no one holds `key` exclusively, then share it.
    pub fn shared(&self, key: K) -> LockGuard<'_, K> {
        let mut held = self.table();
        loop {
            let holders = held.entry(key).or_default();
            if !holders.writer && holders.waiting_writers == 0 {
                holders.readers += 1;
                break;
            }
            held = self
                .released
                .wait(held)
                .unwrap_or_else(PoisonError::into_inner);
        }
        LockGuard {
            table: self,
            key,
            mode: Mode::Shared,
        }
    }

    /// Whether anyone currently holds `key`.
    #[must_use]
    pub fn is_held(&self, key: K) -> bool {
        self.table().contains_key(&key)
    }

    fn release(&self, key: K, mode: Mode) {
        let mut held = self.table();
        if let Some(holders) = held.get_mut(&key) {
            match mode {
                Mode::Exclusive => holders.writer = false,
                Mode::Shared => holders.readers = holders.readers.saturating_sub(1),
            }
            if holders.is_idle() {
                held.remove(&key);
            }
        }
        drop(held);
        self.released.notify_all();
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Shared,
    Exclusive,
}

/// A held lease. Released on drop.
#[derive(Debug)]
#[must_use = "the lease is released as soon as the guard is dropped"]
pub struct LockGuard<'a, K: Copy + Eq + Hash + fmt::Debug> {
    table: &'a LockTable<K>,
    key: K,
    mode: Mode,
}

impl<K: Copy + Eq + Hash + fmt::Debug> LockGuard<'_, K> {
    /// Key this lease covers.
    #[must_use]
    pub fn key(&self) -> K {
        self.key
    }
}

impl<K: Copy + Eq + Hash + fmt::Debug> Drop for LockGuard<'_, K> {
    fn drop(&mut self) {
        self.table.release(self.key, self.mode);
    }
}

/// Snapshot of an entity read under an exclusive lease.
///
/// Mutate the snapshot through `DerefMut`, then hand it back to the store's
/// `save` while the lease is still alive.
#[derive(Debug)]
pub struct Exclusive<'a, K: Copy + Eq + Hash + fmt::Debug, T> {
    _lease: LockGuard<'a, K>,
    value: T,
}

impl<'a, K: Copy + Eq + Hash + fmt::Debug, T> Exclusive<'a, K, T> {
    /// Pair a lease with the snapshot read under it.
    pub fn new(lease: LockGuard<'a, K>, value: T) -> Self {
        Self {
            _lease: lease,
            value,
        }
    }
}

impl<K: Copy + Eq + Hash + fmt::Debug, T> Deref for Exclusive<'_, K, T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.value
    }
}

impl<K: Copy + Eq + Hash + fmt::Debug, T> DerefMut for Exclusive<'_, K, T> {
    fn deref_mut(&mut self) -> &mut T {
        &mut self.value
    }
}

/// Snapshot of an entity read under a shared lease. Read-only.
#[derive(Debug)]
pub struct Shared<'a, K: Copy + Eq + Hash + fmt::Debug, T> {
    _lease: LockGuard<'a, K>,
    value: T,
}

impl<'a, K: Copy + Eq + Hash + fmt::Debug, T> Shared<'a, K, T> {
    /// Pair a lease with the snapshot read under it.
    pub fn new(lease: LockGuard<'a, K>, value: T) -> Self {
        Self {
            _lease: lease,
            value,
        }
    }
}

impl<K: Copy + Eq + Hash + fmt::Debug, T> Deref for Shared<'_, K, T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.value
    }
}
