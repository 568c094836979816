use core::hash::Hash;
use std::hash::Hasher;

#[cfg(feature = "std-hash")]
pub mod default {
    pub use std::collections::hash_map::DefaultHasher;

    #[inline]
    pub fn new() -> DefaultHasher {
        DefaultHasher::new()
    }
}

#[cfg(not(feature = "std-hash"))]
pub mod default {
    pub use ahash::AHasher as DefaultHasher;

    #[inline]
    pub fn new() -> DefaultHasher {
        DefaultHasher::default()
    }
}

/// convenience: hash a single value with whichever default is active
#[inline]
pub fn hash_one<T: Hash>(v: &T) -> u64 {
    let mut h = default::new();
    v.hash(&mut h);
    h.finish()
}

/// Derive a reconciliation key from any hashable value. Zero means
/// "no key", so a hash that lands on zero is nudged off it.
#[inline]
pub fn key_of<T: Hash>(v: &T) -> crate::Key {
    match hash_one(v) {
        0 => 1,
        k => k,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_are_stable_and_never_zero() {
        assert_eq!(key_of(&"item-17"), key_of(&"item-17"));
        assert_ne!(key_of(&"item-17"), 0);
    }
}
