mod signature;

pub use signature::*;

/// Hasher used for label signatures.
pub type FastHasher = xxhash_rust::xxh3::Xxh3;
