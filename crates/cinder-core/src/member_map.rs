//! Member index: content-hashed map from member bytes to the live entry.
//!
//! Backed by `ahash::AHashMap` (hashbrown open addressing underneath);
//! `Bytes` keys hash and compare by content, so a looked-up `&[u8]` finds
//! the member regardless of which buffer it arrived in.
//!
//! The map also owns the set's heap accounting. Every insert, overwrite
//! and removal adjusts a running byte estimate, so eviction and stats
//! never need to scan.

use std::mem::size_of;

use ahash::AHashMap;
use bytes::Bytes;

use crate::entry::Entry;

/// Estimated per-member bookkeeping: the `Bytes` key handle, the entry
/// struct, and hashbrown's control byte plus empty-slot waste at its load
/// factor. Calibrated for 64-bit platforms; precision only affects
/// eviction timing, not correctness.
const MEMBER_OVERHEAD: usize = size_of::<Bytes>() + size_of::<Entry>() + 16;

/// Map from member bytes to the entry shared with the score tree.
#[derive(Debug, Clone, Default)]
pub struct MemberMap {
    inner: AHashMap<Bytes, Entry>,
    data_bytes: usize,
}

impl MemberMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            inner: AHashMap::with_capacity(capacity),
            data_bytes: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    pub fn contains(&self, member: &[u8]) -> bool {
        self.inner.contains_key(member)
    }

    pub fn get(&self, member: &[u8]) -> Option<&Entry> {
        self.inner.get(member)
    }

    /// Inserts or overwrites the entry for its member; returns the
    /// previous entry if one existed.
    pub fn insert(&mut self, entry: Entry) -> Option<Entry> {
        self.data_bytes += entry.member().len() + entry.score_bytes().len();
        let old = self.inner.insert(entry.member().clone(), entry);
        if let Some(ref old) = old {
            self.data_bytes = self
                .data_bytes
                .saturating_sub(old.member().len() + old.score_bytes().len());
        }
        old
    }

    pub fn remove(&mut self, member: &[u8]) -> Option<Entry> {
        let old = self.inner.remove(member);
        if let Some(ref old) = old {
            self.data_bytes = self
                .data_bytes
                .saturating_sub(old.member().len() + old.score_bytes().len());
        }
        old
    }

    /// Entries in map iteration order. The order is unspecified and not
    /// observable through any command; serialization uses it.
    pub fn iter(&self) -> impl Iterator<Item = &Entry> {
        self.inner.values()
    }

    /// Estimated heap footprint: per-member overhead plus member and
    /// score text bytes.
    pub fn size_in_bytes(&self) -> usize {
        size_of::<Self>() + self.inner.len() * MEMBER_OVERHEAD + self.data_bytes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(member: &str, score: f64) -> Entry {
        Entry::new(
            Bytes::copy_from_slice(member.as_bytes()),
            crate::score::format_score(score),
            score,
        )
    }

    #[test]
    fn insert_get_remove() {
        let mut map = MemberMap::new();
        assert!(map.insert(entry("alice", 1.0)).is_none());
        assert_eq!(map.get(b"alice").unwrap().score(), 1.0);
        assert!(map.contains(b"alice"));
        assert!(!map.contains(b"bob"));

        let old = map.insert(entry("alice", 2.0)).unwrap();
        assert_eq!(old.score(), 1.0);
        assert_eq!(map.len(), 1);

        let removed = map.remove(b"alice").unwrap();
        assert_eq!(removed.score(), 2.0);
        assert!(map.is_empty());
        assert!(map.remove(b"alice").is_none());
    }

    #[test]
    fn lookup_is_by_content_not_buffer() {
        let mut map = MemberMap::new();
        map.insert(entry("key", 1.0));
        let other_buffer = b"key".to_vec();
        assert!(map.contains(&other_buffer));
    }

    #[test]
    fn accounting_tracks_mutations() {
        let mut map = MemberMap::new();
        let empty = map.size_in_bytes();

        map.insert(entry("alice", 100.0));
        let one = map.size_in_bytes();
        assert!(one > empty);

        map.insert(entry("bob", 200.0));
        assert!(map.size_in_bytes() > one);

        // overwrite with a longer score grows only by the text delta
        map.insert(entry("bob", 200.125));
        let grown = map.size_in_bytes();
        assert!(grown > one);

        map.remove(b"alice");
        map.remove(b"bob");
        assert_eq!(map.size_in_bytes(), empty);
    }
}
