//! A single-threaded table with direct single-slot placement.
//!
//! Each key maps to exactly one slot; there is no probe sequence. A collision
//! between two distinct live keys triggers a reorganization that draws a new
//! hash function, either at the same capacity (rehash in place) or at double
//! the capacity (grow), and re-places every live entry before the colliding
//! operation is retried. Tombstoned entries are dropped during
//! reorganization, which is the table's garbage-collection point.

use std::collections::hash_map::RandomState;
use std::hash::{BuildHasher, Hash};

use crate::error::TableError;
use crate::hash::{key_code, CarterWegmanProvider, HashFunction, HashFunctionProvider};
use crate::policy::{self, ReorgDecision};
use crate::slot::{conflict_free_indices, Slot};

/// A single-threaded hash table over a universal hash-function family.
///
/// # Examples
///
/// ```
/// use cwtable::unsync::Table;
///
/// let mut table = Table::new();
/// table.insert(1u64, "broccoli")?;
/// table.insert(2, "carrot")?;
/// assert_eq!(table.search(&2)?, &"carrot");
///
/// table.delete(&1)?;
/// assert!(table.search(&1).is_err());
/// # Ok::<(), cwtable::TableError>(())
/// ```
pub struct Table<K, V, S = RandomState, P = CarterWegmanProvider>
where
    P: HashFunctionProvider,
{
    slots: Box<[Option<Slot<K, V>>]>,
    hash_fn: P::Function,
    provider: P,
    build_hasher: S,
    len: usize,
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
            slots: empty_slots(capacity),
            hash_fn,
            provider,
            build_hasher,
            len: 0,
            collisions: 0,
        }
    }

    /// Number of live entries.
    pub fn len(&self) -> usize {
        self.len
    }

    /// `true` when the table holds no live entries.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Current slot-array capacity. Always a power of two >= 8.
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Ratio of live entries to capacity.
    pub fn load_factor(&self) -> f64 {
        self.len as f64 / self.slots.len() as f64
    }

    /// Count of consecutive same-capacity rehashes since the last grow.
    pub fn collisions(&self) -> u32 {
        self.collisions
    }
}

impl<K, V, S, P> Table<K, V, S, P>
where
    K: Eq + Hash,
    S: BuildHasher,
    P: HashFunctionProvider,
{
    /// Inserts a key-value pair.
    ///
    /// Fails with [`TableError::DuplicateKey`] if the key is already live in
    /// its slot; the table never silently overwrites on insert. A collision
    /// with a different live key reorganizes the table and retries.
    pub fn insert(&mut self, key: K, value: V) -> Result<bool, TableError> {
        let code = key_code(&self.build_hasher, &key);
        let pending = Slot::new(code, key, value);
        loop {
            let pos = self.hash_fn.index(pending.code);
            match &self.slots[pos] {
                Some(slot) if slot.is_live() => {
                    if slot.key == pending.key {
                        return Err(TableError::DuplicateKey);
                    }
                    // Collision with a different live key. Reorganize, then
                    // retry against the new state; a retry collision
                    // reorganizes again.
                    self.reorganize()?;
                }
                _ => {
                    self.slots[pos] = Some(pending);
                    self.len += 1;
                    return Ok(true);
                }
            }
        }
    }

    /// Looks up the value for a key.
    ///
    /// This performs no collision recovery: the key is found only if it sits
    /// live in the single slot its code maps to.
    pub fn search(&self, key: &K) -> Result<&V, TableError> {
        let pos = self.hash_fn.index(key_code(&self.build_hasher, key));
        match &self.slots[pos] {
            Some(slot) if slot.is_live() && slot.key == *key => Ok(&slot.value),
            _ => Err(TableError::KeyNotFound),
        }
    }

    /// Replaces the value for a key, regardless of tombstone state. The
    /// tombstone flag itself is left untouched.
    pub fn update(&mut self, key: &K, new_value: V) -> Result<bool, TableError> {
        let pos = self.hash_fn.index(key_code(&self.build_hasher, key));
        match &mut self.slots[pos] {
            Some(slot) if slot.key == *key => {
                slot.value = new_value;
                Ok(true)
            }
            _ => Err(TableError::KeyNotFound),
        }
    }

    /// Tombstones the entry for a key. The slot is reclaimed by a later
    /// insert or during reorganization.
    pub fn delete(&mut self, key: &K) -> Result<bool, TableError> {
        let pos = self.hash_fn.index(key_code(&self.build_hasher, key));
        match &mut self.slots[pos] {
            Some(slot) if slot.is_live() && slot.key == *key => {
                slot.deleted = true;
                self.len -= 1;
                Ok(true)
            }
            _ => Err(TableError::KeyNotFound),
        }
    }

    /// Drains the live entries and rebuilds the slot array with a freshly
    /// drawn hash function, growing or rehashing in place per the policy.
    ///
    /// The rehash branch loops: every failed same-capacity attempt bumps the
    /// collision streak, and once the streak passes the threshold the next
    /// decision is a grow. Tombstones are never copied forward.
    fn reorganize(&mut self) -> Result<(), TableError> {
        let entries: Vec<Slot<K, V>> = self
            .slots
            .iter_mut()
            .filter_map(Option::take)
            .filter(|slot| slot.is_live())
            .collect();
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

            let hash_fn = self.provider.get_hash_function(capacity);
            if let Some(indices) = conflict_free_indices(&entries, &hash_fn) {
                let mut slots = empty_slots(capacity);
                for (slot, pos) in entries.into_iter().zip(indices) {
                    slots[pos] = Some(slot);
                }
                self.slots = slots;
                self.hash_fn = hash_fn;
                return Ok(());
            }
            // The fresh function still collided on the drained entries; loop
            // and decide again with the updated streak.
        }
    }
}

fn empty_slots<K, V>(capacity: usize) -> Box<[Option<Slot<K, V>>]> {
    (0..capacity).map(|_| None).collect::<Vec<_>>().into_boxed_slice()
}
