//! The grow/rehash decision, isolated from storage and locking so it can be
//! tested on its own.

/// Capacity every table starts with.
pub(crate) const INITIAL_CAPACITY: usize = 8;

/// Load factor above which a collision forces a grow instead of a rehash.
pub(crate) const MAX_LOAD_FACTOR: f64 = 0.7;

/// Number of consecutive same-capacity rehashes tolerated before growing.
pub(crate) const MAX_COLLISION_STREAK: u32 = 2;

/// What to do about a collision.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum ReorgDecision {
    /// Double the capacity and draw a new function sized for it.
    Grow,
    /// Keep the capacity, draw a new function, and bump the collision streak.
    RehashInPlace,
}

/// Decides between growing and rehashing in place.
///
/// Growing is the expensive path; a handful of alternative hash functions are
/// tried first in case a single bad draw is the cause of the collision.
pub(crate) fn decide(len: usize, capacity: usize, collision_streak: u32) -> ReorgDecision {
    let load_factor = len as f64 / capacity as f64;
    if load_factor > MAX_LOAD_FACTOR || collision_streak > MAX_COLLISION_STREAK {
        ReorgDecision::Grow
    } else {
        ReorgDecision::RehashInPlace
    }
}

/// Rounds a requested capacity up to a power of two no smaller than the
/// initial capacity.
pub(crate) fn normalize_capacity(capacity: usize) -> usize {
    capacity.next_power_of_two().max(INITIAL_CAPACITY)
}
