//! Hashing utilities.
//!
//! - [`ContentHash`]: blake3, used for node versions (stable across runs)
//! - [`fingerprint`]: FxHash, used for cheap change detection (config reloads)
//!
//! # Usage
//!
//! ```ignore
//! use crate::utils::hash;
//!
//! let v = hash::ContentHash::of(b"body { }").short(8); // -> "a1b2c3d4"
//! let fp = hash::fingerprint("galley.toml content");   // -> u64
//! ```

use rustc_hash::FxHasher;
use std::hash::Hasher;

/// A 256-bit content hash (blake3 output).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContentHash([u8; 32]);

impl ContentHash {
    /// Hash a single byte slice.
    pub fn of(bytes: &[u8]) -> Self {
        Self(*blake3::hash(bytes).as_bytes())
    }

    /// Get the raw bytes.
    #[inline]
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Convert to hex string.
    pub fn to_hex(self) -> String {
        hex::encode(self.0)
    }

    /// First `len` hex characters (clamped to 64).
    pub fn short(self, len: usize) -> String {
        let mut hex = self.to_hex();
        hex.truncate(len.clamp(1, 64));
        hex
    }
}

impl std::fmt::Display for ContentHash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", &self.to_hex()[..16])
    }
}

/// Incremental blake3 hasher with length-prefixed fields.
///
/// Each field is prefixed with its length so that `("ab", "c")` and
/// `("a", "bc")` never collide.
#[derive(Default)]
pub struct VersionHasher(blake3::Hasher);

impl VersionHasher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn field(&mut self, bytes: &[u8]) -> &mut Self {
        self.0.update(&(bytes.len() as u64).to_le_bytes());
        self.0.update(bytes);
        self
    }

    pub fn finish(&self) -> ContentHash {
        ContentHash(*self.0.finalize().as_bytes())
    }
}

/// Compute 64-bit FxHash fingerprint from byte data.
#[inline]
pub fn fingerprint<T: AsRef<[u8]> + ?Sized>(data: &T) -> u64 {
    let mut hasher = FxHasher::default();
    hasher.write(data.as_ref());
    hasher.finish()
}
