//! Per-key critical sections with bounded waits.

use std::collections::HashSet;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use thiserror::Error;

use webmarket_core::CartKey;

const SHARDS: usize = 16;

#[derive(Debug, Error)]
pub enum LockError {
    #[error("timed out after {waited:?} waiting for cart {key}")]
    Timeout { key: CartKey, waited: Duration },
}

#[derive(Debug, Default)]
struct Shard {
    held: Mutex<HashSet<CartKey>>,
    released: Condvar,
}

impl Shard {
    // The set is only touched by insert/remove, so a poisoned mutex still
    // guards consistent data.
    fn held(&self) -> MutexGuard<'_, HashSet<CartKey>> {
        self.held.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Table of exclusively-held cart keys, sharded by key hash.
///
/// At most one guard holds a given key at a time. Multi-key acquisition walks
/// the keys in lexical order, so two callers locking `{a, b}` in opposite
/// argument order cannot deadlock. Every wait is bounded by `timeout`.
#[derive(Debug)]
pub struct KeyLockTable {
    shards: Vec<Shard>,
    timeout: Duration,
}

impl KeyLockTable {
    pub fn new(timeout: Duration) -> Self {
        Self {
            shards: (0..SHARDS).map(|_| Shard::default()).collect(),
            timeout,
        }
    }

    fn shard(&self, key: &CartKey) -> &Shard {
        let mut hasher = DefaultHasher::new();
        key.hash(&mut hasher);
        let idx = (hasher.finish() as usize) % self.shards.len();
        &self.shards[idx]
    }

    /// Enter the critical section for one key.
    pub fn lock(&self, key: &CartKey) -> Result<KeyGuard<'_>, LockError> {
        self.lock_all(&[key])
    }

    /// Enter the critical sections for several keys at once.
    ///
    /// Duplicates collapse to one. On timeout, every key taken so far is
    /// released before returning.
    pub fn lock_all(&self, keys: &[&CartKey]) -> Result<KeyGuard<'_>, LockError> {
        let mut ordered: Vec<CartKey> = keys.iter().map(|k| (*k).clone()).collect();
        ordered.sort();
        ordered.dedup();

        let deadline = Instant::now() + self.timeout;
        let mut guard = KeyGuard {
            table: self,
            keys: Vec::with_capacity(ordered.len()),
        };

        for key in ordered {
            // On early return `guard` drops and releases what it holds.
            self.acquire(&key, deadline)?;
            guard.keys.push(key);
        }

        Ok(guard)
    }

    fn acquire(&self, key: &CartKey, deadline: Instant) -> Result<(), LockError> {
        let shard = self.shard(key);
        let mut held = shard.held();

        while held.contains(key) {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(LockError::Timeout {
                    key: key.clone(),
                    waited: self.timeout,
                });
            }
            held = shard
                .released
                .wait_timeout(held, remaining)
                .map(|(g, _)| g)
                .unwrap_or_else(|e| e.into_inner().0);
        }

        held.insert(key.clone());
        Ok(())
    }

    fn release(&self, key: &CartKey) {
        let shard = self.shard(key);
        shard.held().remove(key);
        shard.released.notify_all();
    }

    /// Whether any guard currently holds `key`.
    pub fn is_held(&self, key: &CartKey) -> bool {
        self.shard(key).held().contains(key)
    }
}

/// Holds one or more keys; releases them on drop.
#[derive(Debug)]
pub struct KeyGuard<'a> {
    table: &'a KeyLockTable,
    keys: Vec<CartKey>,
}

impl KeyGuard<'_> {
    pub fn keys(&self) -> &[CartKey] {
        &self.keys
    }
}

impl Drop for KeyGuard<'_> {
    fn drop(&mut self) {
        for key in self.keys.iter().rev() {
            self.table.release(key);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;

    fn key(raw: &str) -> CartKey {
        CartKey::from_raw(raw)
    }

    #[test]
    fn guard_releases_on_drop() {
        let table = KeyLockTable::new(Duration::from_millis(50));
        let a = key("a");
        {
            let _g = table.lock(&a).unwrap();
            assert!(table.is_held(&a));
        }
        assert!(!table.is_held(&a));
    }

    #[test]
    fn second_locker_times_out() {
        let table = KeyLockTable::new(Duration::from_millis(30));
        let a = key("a");
        let _g = table.lock(&a).unwrap();

        let err = table.lock(&a).unwrap_err();
        assert!(matches!(err, LockError::Timeout { .. }));
    }

    #[test]
    fn failed_multi_lock_releases_partial_keys() {
        let table = KeyLockTable::new(Duration::from_millis(30));
        let (a, b) = (key("a"), key("b"));
        let _held_b = table.lock(&b).unwrap();

        assert!(table.lock_all(&[&b, &a]).is_err());

        // `a` was taken first (lexical order) and must have been given back.
        assert!(!table.is_held(&a));
    }

    #[test]
    fn duplicate_keys_collapse() {
        let table = KeyLockTable::new(Duration::from_millis(30));
        let a = key("a");
        let g = table.lock_all(&[&a, &a]).unwrap();
        assert_eq!(g.keys().len(), 1);
    }

    #[test]
    fn distinct_keys_do_not_block_each_other() {
        let table = KeyLockTable::new(Duration::from_millis(30));
        let _a = table.lock(&key("a")).unwrap();
        assert!(table.lock(&key("b")).is_ok());
    }

    #[test]
    fn opposite_order_multi_locks_do_not_deadlock() {
        let table = Arc::new(KeyLockTable::new(Duration::from_secs(5)));
        let done = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let table = Arc::clone(&table);
                let done = Arc::clone(&done);
                thread::spawn(move || {
                    let (a, b) = (key("a"), key("b"));
                    for _ in 0..200 {
                        let _g = if i % 2 == 0 {
                            table.lock_all(&[&a, &b]).unwrap()
                        } else {
                            table.lock_all(&[&b, &a]).unwrap()
                        };
                    }
                    done.fetch_add(1, Ordering::SeqCst);
                })
            })
            .collect();

        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(done.load(Ordering::SeqCst), 8);
    }

    #[test]
    fn waiter_proceeds_after_release() {
        let table = Arc::new(KeyLockTable::new(Duration::from_secs(2)));
        let a = key("a");
        let guard = table.lock(&a).unwrap();

        let waiter = {
            let table = Arc::clone(&table);
            let a = a.clone();
            thread::spawn(move || table.lock(&a).map(|_| ()).is_ok())
        };

        thread::sleep(Duration::from_millis(20));
        drop(guard);
        assert!(waiter.join().unwrap());
    }
}
