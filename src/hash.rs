//! The universal hash-function capability consumed by the tables.
//!
//! A [`HashFunctionProvider`] draws a fresh [`HashFunction`] from a universal
//! family every time it is asked for one; the tables call it at construction
//! and again whenever a grow or rehash selects a new function. A function is
//! valid only for the capacity it was drawn for: replacing the capacity
//! invalidates every previously computed index and forces a full re-placement
//! of the live entries.

use std::hash::{BuildHasher, Hash, Hasher};

use rand::Rng;

/// An opaque mapping from a 64-bit key code to a slot index.
pub trait HashFunction {
    /// Returns a slot index in `[0, capacity)` for the given key code.
    fn index(&self, key_code: u64) -> usize;

    /// The capacity this function was drawn for.
    fn capacity(&self) -> usize;
}

/// A source of hash functions drawn from a universal family.
///
/// Every call must return a function with freshly randomized parameters, so
/// that for any two distinct key codes the probability of a collision across
/// the family is at most `1 / capacity`.
pub trait HashFunctionProvider {
    /// The concrete function type this provider draws.
    type Function: HashFunction;

    /// Draws a fresh function whose output range is exactly `[0, capacity)`.
    fn get_hash_function(&self, capacity: usize) -> Self::Function;
}

/// The Mersenne prime 2^61 - 1, used as the field modulus for the
/// Carter-Wegman family.
const MERSENNE_PRIME: u64 = (1 << 61) - 1;

/// The default provider, drawing from the Carter-Wegman family
/// `h(x) = ((a * x + b) mod p) mod capacity`.
#[derive(Clone, Copy, Debug, Default)]
pub struct CarterWegmanProvider;

impl HashFunctionProvider for CarterWegmanProvider {
    type Function = CarterWegmanFunction;

    fn get_hash_function(&self, capacity: usize) -> CarterWegmanFunction {
        assert!(capacity > 0, "capacity must be positive");
        let mut rng = rand::thread_rng();
        CarterWegmanFunction {
            a: rng.gen_range(1..MERSENNE_PRIME),
            b: rng.gen_range(0..MERSENNE_PRIME),
            capacity,
        }
    }
}

/// A single member of the Carter-Wegman family.
#[derive(Clone, Copy, Debug)]
pub struct CarterWegmanFunction {
    a: u64,
    b: u64,
    capacity: usize,
}

impl HashFunction for CarterWegmanFunction {
    fn index(&self, key_code: u64) -> usize {
        // Reduce the code into the field first; multiply-add in u128 to
        // avoid overflow before the modular reduction.
        let x = u128::from(key_code % MERSENNE_PRIME);
        let p = u128::from(MERSENNE_PRIME);
        let h = (u128::from(self.a) * x + u128::from(self.b)) % p;
        (h % self.capacity as u128) as usize
    }

    fn capacity(&self) -> usize {
        self.capacity
    }
}

/// Folds a key into the 64-bit code fed to the hash function.
#[inline]
pub(crate) fn key_code<Q, S>(build_hasher: &S, key: &Q) -> u64
where
    Q: Hash + ?Sized,
    S: BuildHasher,
{
    let mut hasher = build_hasher.build_hasher();
    key.hash(&mut hasher);
    hasher.finish()
}

#[cfg(test)]
mod tests {
    use super::{CarterWegmanProvider, HashFunction, HashFunctionProvider};

    #[test]
    fn index_stays_in_range() {
        let provider = CarterWegmanProvider;
        for capacity in [1usize, 8, 31, 64, 1024] {
            let f = provider.get_hash_function(capacity);
            assert_eq!(f.capacity(), capacity);
            for code in [0u64, 1, 7, u64::MAX, 0xdead_beef_cafe_f00d] {
                assert!(f.index(code) < capacity);
            }
        }
    }

    #[test]
    fn function_is_deterministic() {
        let f = CarterWegmanProvider.get_hash_function(64);
        for code in 0..1000u64 {
            assert_eq!(f.index(code), f.index(code));
        }
    }

    #[test]
    fn draws_are_independent() {
        // Two draws for the same capacity should almost never map a large key
        // range identically; if they do, the parameters were not fresh.
        let f1 = CarterWegmanProvider.get_hash_function(1024);
        let f2 = CarterWegmanProvider.get_hash_function(1024);
        let identical = (0..1024u64).all(|code| f1.index(code) == f2.index(code));
        assert!(!identical, "two draws produced the same function");
    }

    #[test]
    fn collisions_are_rare_across_the_family() {
        // Universality: for a fixed pair of distinct codes, the fraction of
        // functions mapping them together should be around 1/capacity. Allow
        // generous slack since this is a statistical property.
        let capacity = 64;
        let trials = 2000;
        let collisions = (0..trials)
            .filter(|_| {
                let f = CarterWegmanProvider.get_hash_function(capacity);
                f.index(12345) == f.index(67890)
            })
            .count();
        assert!(
            collisions < trials / capacity * 4 + 20,
            "too many collisions: {collisions}/{trials}"
        );
    }
}
