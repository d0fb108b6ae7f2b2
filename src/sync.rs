//! A concurrent table layering reader/writer coordination and per-slot
//! atomic replacement over the same reorganization algorithm as
//! [`unsync`](crate::unsync).
//!
//! Slot records are immutable once published and live behind
//! `crossbeam_epoch` atomic pointers, so a record can be replaced whole with
//! a compare-and-set while holding only a shared read permit. Structural
//! changes (grow, rehash in place) run exclusively under the write permit of
//! a `parking_lot` reader-writer lock, so they never interleave with
//! slot-level compare-and-sets.
//!
//! # Contention semantics
//!
//! A lost compare-and-set race is not an error: `insert`, `update`, and
//! `delete` report it as `Ok(false)`, meaning "not applied, caller may
//! retry". Only one thread can hold the upgradable permit `insert` takes, so
//! concurrent inserts serialize against each other; `search`, `update`, and
//! `delete` hold shared permits and run concurrently with each other and
//! with the non-upgraded portion of an insert. Updates and deletes racing on
//! the same slot are coordinated only by the atomicity of their own
//! compare-and-set; there is no ordering guarantee between them.

use std::collections::hash_map::RandomState;
use std::hash::{BuildHasher, Hash};
use std::sync::atomic::{AtomicUsize, Ordering};

use crossbeam_epoch::{self as epoch, Atomic, Guard, Owned};
use crossbeam_utils::CachePadded;
use parking_lot::{RwLock, RwLockUpgradableReadGuard};

use crate::error::TableError;
use crate::hash::{key_code, CarterWegmanProvider, HashFunction, HashFunctionProvider};
use crate::policy::{self, ReorgDecision};
use crate::slot::{conflict_free_indices, Slot};

/// A concurrent hash table over a universal hash-function family.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use std::thread;
///
/// use cwtable::sync::Table;
///
/// let table = Arc::new(Table::new());
/// let writer = {
///     let table = Arc::clone(&table);
///     thread::spawn(move || {
///         for k in 0u64..16 {
///             while table.insert(k, k * 2) == Ok(false) {}
///         }
///     })
/// };
/// writer.join().unwrap();
///
/// assert_eq!(table.len(), 16);
/// assert_eq!(table.search(&7), Ok(14));
/// ```
pub struct Table<K, V, S = RandomState, P = CarterWegmanProvider>
where
    P: HashFunctionProvider,
{
    inner: RwLock<Inner<K, V, P::Function>>,
    len: CachePadded<AtomicUsize>,
    provider: P,
    build_hasher: S,
}

/// Structural state guarded by the reader-writer lock. The slot array and
/// the active hash function are only ever replaced wholesale while the
/// exclusive write permit is held.
struct Inner<K, V, F> {
    slots: Box<[Atomic<Slot<K, V>>]>,
    hash_fn: F,
    collisions: u32,
}

impl<K, V> Table<K, V> {
    /// Creates a table with the initial capacity (8) and a freshly drawn
    /// Carter-Wegman hash function.
    pub fn new() -> Self {
        Self::with_capacity(policy::INITIAL_CAPACITY)
    }

    /// Creates a table with at least the given capacity, rounded up to a
    /// power of two no smaller than 8.
    pub fn with_capacity(capacity: usize) -> Self {
        Self::with_hasher_and_provider(capacity, RandomState::default(), CarterWegmanProvider)
    }
}

impl<K, V> Default for Table<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V, S, P> Table<K, V, S, P>
where
    S: BuildHasher,
    P: HashFunctionProvider,
{
    /// Creates a table with the given key hasher and hash-function provider.
    pub fn with_hasher_and_provider(capacity: usize, build_hasher: S, provider: P) -> Self {
        let capacity = policy::normalize_capacity(capacity);
        let hash_fn = provider.get_hash_function(capacity);
        Self {
            inner: RwLock::new(Inner {
                slots: empty_slots(capacity),
                hash_fn,
                collisions: 0,
            }),
            len: CachePadded::new(AtomicUsize::new(0)),
            provider,
            build_hasher,
        }
    }

    /// Number of live entries.
    pub fn len(&self) -> usize {
        self.len.load(Ordering::Relaxed)
    }

    /// `true` when the table holds no live entries.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Current slot-array capacity. Always a power of two >= 8.
    pub fn capacity(&self) -> usize {
        self.inner.read().slots.len()
    }

    /// Ratio of live entries to capacity.
    pub fn load_factor(&self) -> f64 {
        let capacity = self.inner.read().slots.len();
        self.len() as f64 / capacity as f64
    }

    /// Count of consecutive same-capacity rehashes since the last grow.
    pub fn collisions(&self) -> u32 {
        self.inner.read().collisions
    }
}

impl<K, V, S, P> Table<K, V, S, P>
where
    K: Clone + Eq + Hash,
    V: Clone,
    S: BuildHasher,
    P: HashFunctionProvider,
{
    /// Inserts a key-value pair.
    ///
    /// Takes the upgradable read permit; placement into an empty or
    /// tombstoned slot is a single compare-and-set, and a lost race against
    /// a concurrent update/delete returns `Ok(false)` (the caller may
    /// retry). A collision with a different live key upgrades to the write
    /// permit, reorganizes, and retries the insert there.
    pub fn insert(&self, key: K, value: V) -> Result<bool, TableError> {
        let code = key_code(&self.build_hasher, &key);
        let inner = self.inner.upgradable_read();
        let guard = epoch::pin();

        let pos = inner.hash_fn.index(code);
        let current = inner.slots[pos].load(Ordering::Acquire, &guard);
        match unsafe { current.as_ref() } {
            Some(slot) if slot.is_live() && slot.key == key => Err(TableError::DuplicateKey),
            Some(slot) if slot.is_live() => {
                let mut inner = RwLockUpgradableReadGuard::upgrade(inner);
                inner.reorganize_and_insert(Slot::new(code, key, value), &self.provider, &guard)?;
                self.len.fetch_add(1, Ordering::Relaxed);
                Ok(true)
            }
            _ => {
                let replacement = Owned::new(Slot::new(code, key, value));
                match inner.slots[pos].compare_exchange(
                    current,
                    replacement,
                    Ordering::AcqRel,
                    Ordering::Acquire,
                    &guard,
                ) {
                    Ok(_) => {
                        if !current.is_null() {
                            // Replaced a tombstone record.
                            unsafe { guard.defer_destroy(current) };
                        }
                        self.len.fetch_add(1, Ordering::Relaxed);
                        Ok(true)
                    }
                    Err(_) => Ok(false),
                }
            }
        }
    }

    /// Looks up the value for a key under a shared read permit, cloning it
    /// out of the slot record.
    pub fn search(&self, key: &K) -> Result<V, TableError> {
        let code = key_code(&self.build_hasher, key);
        let inner = self.inner.read();
        let guard = epoch::pin();

        let pos = inner.hash_fn.index(code);
        let current = inner.slots[pos].load(Ordering::Acquire, &guard);
        match unsafe { current.as_ref() } {
            Some(slot) if slot.is_live() && slot.key == *key => Ok(slot.value.clone()),
            _ => Err(TableError::KeyNotFound),
        }
    }

    /// Replaces the value for a key by installing a fresh record with a
    /// compare-and-set under a shared read permit. The tombstone flag is
    /// carried over unchanged. A lost race returns `Ok(false)`.
    pub fn update(&self, key: &K, new_value: V) -> Result<bool, TableError> {
        let code = key_code(&self.build_hasher, key);
        let inner = self.inner.read();
        let guard = epoch::pin();

        let pos = inner.hash_fn.index(code);
        let current = inner.slots[pos].load(Ordering::Acquire, &guard);
        match unsafe { current.as_ref() } {
            Some(slot) if slot.key == *key => {
                let replacement = Owned::new(Slot {
                    code: slot.code,
                    key: slot.key.clone(),
                    value: new_value,
                    deleted: slot.deleted,
                });
                match inner.slots[pos].compare_exchange(
                    current,
                    replacement,
                    Ordering::AcqRel,
                    Ordering::Acquire,
                    &guard,
                ) {
                    Ok(_) => {
                        unsafe { guard.defer_destroy(current) };
                        Ok(true)
                    }
                    Err(_) => Ok(false),
                }
            }
            _ => Err(TableError::KeyNotFound),
        }
    }

    /// Tombstones the entry for a key by installing a tombstoned copy of its
    /// record with a compare-and-set under a shared read permit. A lost race
    /// returns `Ok(false)`.
    pub fn delete(&self, key: &K) -> Result<bool, TableError> {
        let code = key_code(&self.build_hasher, key);
        let inner = self.inner.read();
        let guard = epoch::pin();

        let pos = inner.hash_fn.index(code);
        let current = inner.slots[pos].load(Ordering::Acquire, &guard);
        match unsafe { current.as_ref() } {
            Some(slot) if slot.is_live() && slot.key == *key => {
                let replacement = Owned::new(Slot {
                    code: slot.code,
                    key: slot.key.clone(),
                    value: slot.value.clone(),
                    deleted: true,
                });
                match inner.slots[pos].compare_exchange(
                    current,
                    replacement,
                    Ordering::AcqRel,
                    Ordering::Acquire,
                    &guard,
                ) {
                    Ok(_) => {
                        unsafe { guard.defer_destroy(current) };
                        self.len.fetch_sub(1, Ordering::Relaxed);
                        Ok(true)
                    }
                    Err(_) => Ok(false),
                }
            }
            _ => Err(TableError::KeyNotFound),
        }
    }
}

impl<K, V, F> Inner<K, V, F>
where
    K: Clone + Eq,
    V: Clone,
    F: HashFunction,
{
    /// Runs the reorganization protocol and places the pending record.
    /// Called with the exclusive write permit held, after the caller
    /// observed a collision with a different live key; a retry collision
    /// reorganizes again.
    fn reorganize_and_insert<P>(
        &mut self,
        pending: Slot<K, V>,
        provider: &P,
        guard: &Guard,
    ) -> Result<(), TableError>
    where
        P: HashFunctionProvider<Function = F>,
    {
        loop {
            self.reorganize(provider, guard)?;
            let pos = self.hash_fn.index(pending.code);
            let current = self.slots[pos].load(Ordering::Acquire, guard);
            match unsafe { current.as_ref() } {
                Some(slot) if slot.is_live() && slot.key == pending.key => {
                    return Err(TableError::DuplicateKey);
                }
                Some(slot) if slot.is_live() => {
                    // Collided again under the new function; go around.
                }
                _ => {
                    let previous = self.slots[pos].swap(Owned::new(pending), Ordering::Release, guard);
                    if !previous.is_null() {
                        unsafe { guard.defer_destroy(previous) };
                    }
                    return Ok(());
                }
            }
        }
    }

    /// Drains the live records and rebuilds the slot array with a freshly
    /// drawn hash function, growing or rehashing in place per the policy.
    /// Requires the exclusive write permit: no reader or slot-level
    /// compare-and-set can interleave with the swap of the array.
    ///
    /// Tombstoned records are dropped here, and every retired record is
    /// handed to the epoch collector rather than freed in place, since
    /// earlier readers may still be pinned.
    fn reorganize<P>(&mut self, provider: &P, guard: &Guard) -> Result<(), TableError>
    where
        P: HashFunctionProvider<Function = F>,
    {
        let mut entries = Vec::new();
        for cell in self.slots.iter() {
            let ptr = cell.load(Ordering::Acquire, guard);
            if let Some(slot) = unsafe { ptr.as_ref() } {
                if slot.is_live() {
                    entries.push(slot.clone());
                }
                unsafe { guard.defer_destroy(ptr) };
            }
        }
        let mut capacity = self.slots.len();

        loop {
            match policy::decide(entries.len(), capacity, self.collisions) {
                ReorgDecision::Grow => {
                    capacity =
                        capacity
                            .checked_mul(2)
                            .ok_or_else(|| TableError::ReorganizeFailed {
                                reason: format!("capacity overflow doubling {capacity}"),
                            })?;
                    self.collisions = 0;
                    #[cfg(feature = "logging")]
                    log::debug!("growing table to capacity {capacity}");
                }
                ReorgDecision::RehashInPlace => {
                    self.collisions += 1;
                    #[cfg(feature = "logging")]
                    log::trace!(
                        "rehashing in place at capacity {capacity} (streak {})",
                        self.collisions
                    );
                }
            }

            let hash_fn = provider.get_hash_function(capacity);
            if let Some(indices) = conflict_free_indices(&entries, &hash_fn) {
                let mut slots = empty_slots(capacity);
                for (slot, pos) in entries.into_iter().zip(indices) {
                    slots[pos] = Atomic::new(slot);
                }
                self.slots = slots;
                self.hash_fn = hash_fn;
                return Ok(());
            }
        }
    }
}

impl<K, V, S, P> Drop for Table<K, V, S, P>
where
    P: HashFunctionProvider,
{
    fn drop(&mut self) {
        // The table is being torn down, so no thread can observe these
        // records anymore and they can be freed without deferral.
        let guard = unsafe { epoch::unprotected() };
        let inner = self.inner.get_mut();
        for cell in inner.slots.iter() {
            let ptr = cell.load(Ordering::Relaxed, guard);
            if !ptr.is_null() {
                drop(unsafe { ptr.into_owned() });
            }
        }
    }
}

fn empty_slots<K, V>(capacity: usize) -> Box<[Atomic<Slot<K, V>>]> {
    (0..capacity)
        .map(|_| Atomic::null())
        .collect::<Vec<_>>()
        .into_boxed_slice()
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::thread;

    use super::Table;
    use crate::error::TableError;
    use crate::test_util::{IdentityState, ModProvider, VEGETABLES};

    #[test]
    fn insert_seventeen_and_search_all() {
        let table = Table::new();
        for (i, name) in VEGETABLES.iter().enumerate() {
            assert_eq!(table.insert(i as u64 + 1, *name), Ok(true));
        }

        assert_eq!(table.len(), 17);
        assert!(table.load_factor() <= 0.7);
        for (i, name) in VEGETABLES.iter().enumerate() {
            assert_eq!(table.search(&(i as u64 + 1)), Ok(*name));
        }
    }

    #[test]
    fn duplicate_insert_fails() {
        let table = Table::new();
        table.insert(5u64, "beet").unwrap();
        assert_eq!(table.insert(5, "sorrel"), Err(TableError::DuplicateKey));
        assert_eq!(table.search(&5), Ok("beet"));
    }

    #[test]
    fn delete_then_search_fails() {
        let table = Table::new();
        table.insert(3u64, "radish").unwrap();
        assert_eq!(table.delete(&3), Ok(true));
        assert_eq!(table.search(&3), Err(TableError::KeyNotFound));
        assert_eq!(table.delete(&3), Err(TableError::KeyNotFound));
        assert_eq!(table.delete(&99), Err(TableError::KeyNotFound));
        assert_eq!(table.len(), 0);
    }

    #[test]
    fn reinsert_after_delete() {
        let table = Table::new();
        table.insert(8u64, "cucumber").unwrap();
        table.delete(&8).unwrap();
        assert_eq!(table.insert(8, "green bean"), Ok(true));
        assert_eq!(table.search(&8), Ok("green bean"));
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn update_replaces_value() {
        let table = Table::new();
        table.insert(2u64, "cabbage").unwrap();
        assert_eq!(table.update(&2, "plantain"), Ok(true));
        assert_eq!(table.search(&2), Ok("plantain"));
        assert_eq!(table.update(&7, "spinach"), Err(TableError::KeyNotFound));
    }

    #[test]
    fn update_on_tombstone_keeps_it_hidden() {
        let table = Table::new();
        table.insert(4u64, "lima beans").unwrap();
        table.delete(&4).unwrap();
        assert_eq!(table.update(&4, "grape leaves"), Ok(true));
        assert_eq!(table.search(&4), Err(TableError::KeyNotFound));
        assert_eq!(table.len(), 0);
    }

    #[test]
    fn forced_collision_rehashes_then_grows() {
        let table: Table<u64, &str, _, _> =
            Table::with_hasher_and_provider(8, IdentityState, ModProvider);
        table.insert(1, "one").unwrap();
        assert_eq!(table.insert(9, "nine"), Ok(true));

        assert_eq!(table.capacity(), 16);
        assert_eq!(table.collisions(), 0, "streak resets on grow");
        assert_eq!(table.search(&1), Ok("one"));
        assert_eq!(table.search(&9), Ok("nine"));
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn grow_preserves_entries() {
        let table: Table<u64, u64, _, _> =
            Table::with_hasher_and_provider(8, IdentityState, ModProvider);
        for k in 0..6u64 {
            table.insert(k, k + 100).unwrap();
        }
        assert_eq!(table.insert(8, 108), Ok(true));

        assert_eq!(table.capacity(), 16);
        assert_eq!(table.len(), 7);
        for k in (0..6u64).chain([8]) {
            assert_eq!(table.search(&k), Ok(k + 100));
        }
    }

    #[test]
    fn concurrent_inserts_with_caller_retry() {
        let table = Arc::new(Table::new());
        let threads = 4u64;
        let per_thread = 64u64;

        let handles: Vec<_> = (0..threads)
            .map(|t| {
                let table = Arc::clone(&table);
                thread::spawn(move || {
                    for i in 0..per_thread {
                        let key = t * 1000 + i;
                        loop {
                            match table.insert(key, key * 3) {
                                Ok(true) => break,
                                Ok(false) => continue,
                                Err(e) => panic!("insert({key}) failed: {e}"),
                            }
                        }
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(table.len(), (threads * per_thread) as usize);
        for t in 0..threads {
            for i in 0..per_thread {
                let key = t * 1000 + i;
                assert_eq!(table.search(&key), Ok(key * 3));
            }
        }
    }
}
