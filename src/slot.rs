/// A storage cell record: a key, its value, and a tombstone flag.
///
/// The 64-bit key code is cached alongside the key. Only the index function
/// changes across a grow or rehash, never the code, so reorganization
/// re-places entries without re-hashing any key.
#[derive(Clone, Debug)]
pub(crate) struct Slot<K, V> {
    pub(crate) code: u64,
    pub(crate) key: K,
    pub(crate) value: V,
    pub(crate) deleted: bool,
}

impl<K, V> Slot<K, V> {
    pub(crate) fn new(code: u64, key: K, value: V) -> Self {
        Self {
            code,
            key,
            value,
            deleted: false,
        }
    }

    /// A slot record is live when it has not been tombstoned.
    #[inline]
    pub(crate) fn is_live(&self) -> bool {
        !self.deleted
    }
}

/// Computes a target index for every entry under the given function, or
/// `None` as soon as two entries land on the same slot.
///
/// Entries are only borrowed, so a failed attempt costs nothing but the
/// occupancy scan and the caller can try again with a fresh function.
pub(crate) fn conflict_free_indices<K, V, F>(
    entries: &[Slot<K, V>],
    hash_fn: &F,
) -> Option<Vec<usize>>
where
    F: crate::hash::HashFunction,
{
    let mut taken = vec![false; hash_fn.capacity()];
    let mut indices = Vec::with_capacity(entries.len());
    for slot in entries {
        let pos = hash_fn.index(slot.code);
        if taken[pos] {
            return None;
        }
        taken[pos] = true;
        indices.push(pos);
    }
    Some(indices)
}
