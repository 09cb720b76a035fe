use std::hash::Hasher;

use derive_more::{Display, From, Into};
use metrohash::MetroHash64;

/// 64-bit MetroHash of a file's content, or of a directory's entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Display, From, Into)]
#[display("{_0:016x}")]
pub struct ContentHash(u64);

impl ContentHash {
    pub const fn from_u64(value: u64) -> Self {
        Self(value)
    }

    pub const fn as_u64(&self) -> u64 {
        self.0
    }

    pub fn of_bytes(bytes: &[u8]) -> Self {
        let mut hasher = ContentHasher::new();
        hasher.update(bytes);
        hasher.finish()
    }
}

/// Incremental hasher producing [`ContentHash`] values.
#[derive(Default)]
pub struct ContentHasher {
    inner: MetroHash64,
}

impl ContentHasher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update(&mut self, bytes: &[u8]) {
        self.inner.write(bytes);
    }

    /// Length-prefixed so that adjacent strings cannot run into each other.
    pub fn update_str(&mut self, value: &str) {
        self.inner.write_u64(value.len() as u64);
        self.inner.write(value.as_bytes());
    }

    pub fn update_hash(&mut self, hash: ContentHash) {
        self.inner.write_u64(hash.as_u64());
    }

    pub fn update_tag(&mut self, tag: u8) {
        self.inner.write_u8(tag);
    }

    pub fn finish(&self) -> ContentHash {
        ContentHash(self.inner.finish())
    }
}
