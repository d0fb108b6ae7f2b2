#![warn(clippy::all)]
#![warn(rust_2018_idioms)]

//! A key-value hash table built on a universal (Carter-Wegman style)
//! hash-function family.
//!
//! Collisions are not resolved by probing or chaining: each key maps to
//! exactly one slot, and a conflict between two distinct live keys makes the
//! table swap its hash function — first at the same capacity (rehash in
//! place), then at double the capacity once the load factor or the rehash
//! streak crosses a threshold. Deletion is tombstone-based, and tombstones
//! are reclaimed when the table reorganizes.
//!
//! Two variants share the algorithm:
//!
//! - [`unsync::Table`] owns its slot array outright and mutates it in
//!   place. Use it from a single thread.
//! - [`sync::Table`] layers a reader-writer lock over the structural
//!   operations and replaces individual slot records with atomic
//!   compare-and-sets, allowing concurrent readers during steady-state
//!   access.
//!
//! The hash functions come from a [`hash::HashFunctionProvider`], which
//! draws freshly randomized parameters on every request; the default is the
//! Carter-Wegman family `((a * x + b) mod p) mod capacity`.
//!
//! # Examples
//!
//! ```
//! use cwtable::unsync::Table;
//!
//! let mut table = Table::new();
//! for (i, name) in ["broccoli", "carrot", "beet"].iter().enumerate() {
//!     table.insert(i as u64, *name)?;
//! }
//! assert_eq!(table.search(&1)?, &"carrot");
//! assert_eq!(table.len(), 3);
//! # Ok::<(), cwtable::TableError>(())
//! ```

pub mod hash;
pub mod sync;
pub mod unsync;

mod error;
pub(crate) mod policy;
pub(crate) mod slot;

#[cfg(test)]
pub(crate) mod test_util;

pub use error::TableError;
