/// The error type for table operations.
///
/// `KeyNotFound` and `DuplicateKey` are reported synchronously at the point of
/// the offending operation; no retries are performed for them. A lost
/// compare-and-set race in the concurrent table is *not* an error and is
/// reported as `Ok(false)` instead.
#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum TableError {
    /// A search, update, or delete targeted a key that is absent or
    /// tombstoned in its slot.
    #[error("key not found")]
    KeyNotFound,

    /// An insert targeted a key that is already live in its slot. The table
    /// never silently overwrites on insert; use `update` to replace a value.
    #[error("duplicate key")]
    DuplicateKey,

    /// The grow/rehash path failed. Structural changes must not silently
    /// corrupt state, so any failure while reorganizing propagates to the
    /// caller instead of being discarded.
    #[error("table reorganization failed: {reason}")]
    ReorganizeFailed {
        /// Description of what went wrong while reorganizing.
        reason: String,
    },
}
