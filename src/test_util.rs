//! Deterministic hashers and providers shared by the table tests.

use std::hash::{BuildHasher, Hasher};

use crate::hash::{HashFunction, HashFunctionProvider};

pub(crate) const VEGETABLES: [&str; 17] = [
    "broccoli",
    "cauliflower",
    "carrot",
    "sorrel",
    "baby turnip",
    "beet",
    "brussel sprout",
    "cabbage",
    "plantain",
    "spinach",
    "grape leaves",
    "lime leaves",
    "corn",
    "radish",
    "cucumber",
    "raddichio",
    "lima beans",
];

/// Hashes a `u64` key to itself, so tests can steer keys onto chosen slots.
#[derive(Clone, Copy, Debug, Default)]
pub(crate) struct IdentityState;

impl BuildHasher for IdentityState {
    type Hasher = IdentityHasher;

    fn build_hasher(&self) -> IdentityHasher {
        IdentityHasher(0)
    }
}

#[derive(Default)]
pub(crate) struct IdentityHasher(u64);

impl Hasher for IdentityHasher {
    fn finish(&self) -> u64 {
        self.0
    }

    fn write(&mut self, bytes: &[u8]) {
        for &b in bytes {
            self.0 = (self.0 << 8) | u64::from(b);
        }
    }

    fn write_u64(&mut self, n: u64) {
        self.0 = n;
    }
}

/// Draws the same modulo function for a given capacity every time, making
/// collisions and the resulting rehash/grow walk fully deterministic.
#[derive(Clone, Copy, Debug, Default)]
pub(crate) struct ModProvider;

impl HashFunctionProvider for ModProvider {
    type Function = ModFunction;

    fn get_hash_function(&self, capacity: usize) -> ModFunction {
        ModFunction { capacity }
    }
}

pub(crate) struct ModFunction {
    capacity: usize,
}

impl HashFunction for ModFunction {
    fn index(&self, key_code: u64) -> usize {
        (key_code % self.capacity as u64) as usize
    }

    fn capacity(&self) -> usize {
        self.capacity
    }
}
