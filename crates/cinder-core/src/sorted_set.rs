//! The sorted set: dual-indexed members and the command surface.
//!
//! A `SortedSet` keeps every member in two indexes that always agree: the
//! member map for O(1) lookup by bytes, and the order-statistics tree for
//! O(log n) rank and range queries over (score, member) order. A score
//! update never mutates a tree entry in place — the entry is removed,
//! rewritten, and re-inserted, because its sort key changed.
//!
//! Callers own mutual exclusion: mutators take `&mut self`, reads take
//! `&self`, and `to_data` borrows shared, so the borrow checker enforces
//! the same mutator/serializer exclusion the surrounding per-key executor
//! provides at runtime. Wrap the set in a lock for concurrent use.
//!
//! Mutating commands hand one delta per call to the supplied
//! [`DeltaSink`]; a sink failure is logged and the command still
//! succeeds (replica repair is the replication layer's job).

use std::io::{Read, Write};
use std::mem::size_of;

use bytes::Bytes;
use tracing::warn;

use crate::delta::{Delta, DeltaSink};
use crate::entry::{Entry, Probe};
use crate::error::CommandError;
use crate::format::{self, FormatError};
use crate::member_map::MemberMap;
use crate::range::{LexBound, LexRange, Limit, ScoreBound, ScoreRange};
use crate::score;
use crate::tree::ScoreSet;

/// ZADD behavior flags.
#[derive(Debug, Clone, Copy, Default)]
pub struct ZAddOptions {
    /// Only add new members, never update existing scores.
    pub nx: bool,
    /// Only update existing members, never add new ones.
    pub xx: bool,
    /// Count changed scores in the reply, not just additions.
    pub ch: bool,
    /// Increment mode: exactly one pair, ZINCRBY semantics.
    pub incr: bool,
}

impl ZAddOptions {
    fn validate(&self) -> Result<(), CommandError> {
        if self.nx && self.xx {
            return Err(CommandError::IncompatibleFlags);
        }
        Ok(())
    }
}

/// Reply from ZADD.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ZAddResponse {
    /// Members added — plus members whose score text changed, under CH.
    Applied(usize),
    /// INCR mode: the new canonical score, or `None` when NX/XX filtered
    /// the pair (the nil reply).
    Score(Option<Bytes>),
}

/// A Redis-compatible sorted set.
#[derive(Debug, Clone, Default)]
pub struct SortedSet {
    members: MemberMap,
    scores: ScoreSet,
}

impl SortedSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of members (ZCARD).
    pub fn zcard(&self) -> usize {
        self.members.len()
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    /// `true` once ZREM/ZPOPMAX have drained the set — the signal for the
    /// storage layer to delete the containing key.
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Estimated heap footprint of both indexes plus member/score bytes.
    pub fn size_in_bytes(&self) -> usize {
        size_of::<Self>() + self.members.size_in_bytes() + self.scores.size_in_bytes()
    }

    // -- write commands --

    /// ZADD: applies `(score text, member)` pairs under `options`.
    ///
    /// All score text is validated before the first mutation, so a
    /// malformed pair leaves the set untouched and emits nothing. The
    /// emitted delta carries every applied pair — updates included, even
    /// when the score text did not change — but never NX/XX-skipped ones.
    pub fn zadd(
        &mut self,
        pairs: &[(Bytes, Bytes)],
        options: ZAddOptions,
        sink: &mut dyn DeltaSink,
    ) -> Result<ZAddResponse, CommandError> {
        options.validate()?;
        if options.incr {
            return self.zadd_incr(pairs, options, sink);
        }

        let mut parsed = Vec::with_capacity(pairs.len());
        for (score_text, member) in pairs {
            let (canonical, value) = score::canonical_score(score_text)?;
            parsed.push((member, canonical, value));
        }

        let initial_len = self.scores.len();
        let mut changes = 0usize;
        let mut applied = Vec::new();
        for (member, canonical, value) in parsed {
            if options.nx && self.members.contains(member) {
                continue;
            }
            if options.xx && !self.members.contains(member) {
                continue;
            }
            let old_score = self.member_add(member.clone(), canonical.clone(), value);
            if options.ch && matches!(old_score, Some(ref old) if *old != canonical) {
                changes += 1;
            }
            applied.push((member.clone(), canonical));
        }

        let added = self.scores.len() - initial_len;
        if !applied.is_empty() {
            self.emit(Delta::Adds(applied), sink);
        }
        let count = if options.ch { added + changes } else { added };
        Ok(ZAddResponse::Applied(count))
    }

    /// ZADD INCR: the parser guarantees a single pair.
    fn zadd_incr(
        &mut self,
        pairs: &[(Bytes, Bytes)],
        options: ZAddOptions,
        sink: &mut dyn DeltaSink,
    ) -> Result<ZAddResponse, CommandError> {
        debug_assert!(pairs.len() == 1, "INCR takes exactly one pair");
        let (increment, member) = &pairs[0];
        if options.nx && self.members.contains(member) {
            return Ok(ZAddResponse::Score(None));
        }
        if options.xx && !self.members.contains(member) {
            return Ok(ZAddResponse::Score(None));
        }
        let new_score = self.zincrby(increment, member.clone(), sink)?;
        Ok(ZAddResponse::Score(Some(new_score)))
    }

    /// ZINCRBY: adds `increment` to the member's score (0 when absent)
    /// and returns the new canonical score text.
    ///
    /// A sum of opposite infinities fails with `OperationProducedNan`
    /// and leaves the member untouched.
    pub fn zincrby(
        &mut self,
        increment: &[u8],
        member: Bytes,
        sink: &mut dyn DeltaSink,
    ) -> Result<Bytes, CommandError> {
        let mut value = score::parse_score(increment)?;
        if let Some(existing) = self.members.get(&member) {
            value += existing.score();
            if value.is_nan() {
                return Err(CommandError::OperationProducedNan);
            }
        }
        let score_text = score::format_score(value);
        self.member_add(member.clone(), score_text.clone(), value);
        self.emit(Delta::Adds(vec![(member, score_text.clone())]), sink);
        Ok(score_text)
    }

    /// ZREM: removes each present member, returns how many were removed.
    pub fn zrem(&mut self, members: &[Bytes], sink: &mut dyn DeltaSink) -> usize {
        let mut removed = Vec::new();
        for member in members {
            if self.member_remove(member).is_some() {
                removed.push(member.clone());
            }
        }
        let count = removed.len();
        if count > 0 {
            self.emit(Delta::Rems(removed), sink);
        }
        count
    }

    /// ZPOPMAX: removes up to `count` highest-ranked members, returning
    /// alternating member and score text, highest first.
    pub fn zpopmax(&mut self, count: usize, sink: &mut dyn DeltaSink) -> Vec<Bytes> {
        let take = count.min(self.scores.len());
        if take == 0 {
            return Vec::new();
        }
        let mut result = Vec::with_capacity(take * 2);
        let mut removed = Vec::with_capacity(take);
        for _ in 0..take {
            let Some(entry) = self.scores.remove_index(self.scores.len() - 1) else {
                break;
            };
            self.members.remove(entry.member());
            result.push(entry.member().clone());
            result.push(entry.score_bytes().clone());
            removed.push(entry.member().clone());
        }
        self.emit(Delta::Rems(removed), sink);
        result
    }

    /// Applies a replicated delta: adds behave as unconditional ZADD,
    /// removes as ZREM. Never re-emits.
    pub fn apply_delta(&mut self, delta: &Delta) -> Result<(), CommandError> {
        match delta {
            Delta::Adds(pairs) => {
                for (member, score_text) in pairs {
                    let (canonical, value) = score::canonical_score(score_text)?;
                    self.member_add(member.clone(), canonical, value);
                }
            }
            Delta::Rems(members) => {
                for member in members {
                    self.member_remove(member);
                }
            }
        }
        Ok(())
    }

    // -- read commands --

    /// ZSCORE: the member's canonical score text, or `None` (nil).
    pub fn zscore(&self, member: &[u8]) -> Option<Bytes> {
        self.members
            .get(member)
            .map(|entry| entry.score_bytes().clone())
    }

    /// ZRANK: 0-based rank in ascending order, or `None` (nil).
    pub fn zrank(&self, member: &[u8]) -> Option<usize> {
        let entry = self.members.get(member)?;
        Some(self.scores.index_of(entry))
    }

    /// ZREVRANK: 0-based rank in descending order, or `None` (nil).
    pub fn zrevrank(&self, member: &[u8]) -> Option<usize> {
        Some(self.scores.len() - 1 - self.zrank(member)?)
    }

    /// ZCOUNT: members whose score falls inside the range. Inverted
    /// ranges count zero.
    pub fn zcount(&self, range: &ScoreRange) -> usize {
        let min_index = self.score_index(&range.min, true);
        let max_index = self.score_index(&range.max, false);
        max_index.saturating_sub(min_index)
    }

    /// ZRANGE: members by rank, negative indices counting from the end,
    /// both ends inclusive.
    pub fn zrange(&self, start: i64, stop: i64, with_scores: bool) -> Vec<Bytes> {
        self.index_range(start, stop, with_scores, false)
    }

    /// ZREVRANGE: like ZRANGE with ranks counted from the highest score.
    pub fn zrevrange(&self, start: i64, stop: i64, with_scores: bool) -> Vec<Bytes> {
        self.index_range(start, stop, with_scores, true)
    }

    /// ZRANGEBYSCORE: members inside the score range, ascending.
    pub fn zrangebyscore(&self, range: &ScoreRange, with_scores: bool) -> Vec<Bytes> {
        let min_index = self.score_index(&range.min, true);
        if min_index >= self.scores.len() {
            return Vec::new();
        }
        let max_index = self.score_index(&range.max, false);
        if max_index <= min_index {
            return Vec::new();
        }
        self.limited_range(range.limit, min_index, max_index, with_scores, false)
    }

    /// ZREVRANGEBYSCORE: members inside the score range, descending;
    /// LIMIT offsets count from the high end.
    pub fn zrevrangebyscore(&self, range: &ScoreRange, with_scores: bool) -> Vec<Bytes> {
        let min_index = self.score_index(&range.min, true);
        let max_index = self.score_index(&range.max, false);
        if max_index <= min_index {
            return Vec::new();
        }
        self.limited_range(range.limit, min_index, max_index, with_scores, true)
    }

    /// ZRANGEBYLEX: members inside the lex range.
    ///
    /// Assumes every member shares one score and probes with the score of
    /// the lowest-ranked entry; results are unspecified when scores are
    /// mixed. An empty set yields an empty reply.
    pub fn zrangebylex(&self, range: &LexRange) -> Vec<Bytes> {
        let Some(first) = self.scores.get(0) else {
            return Vec::new();
        };
        let shared_score = first.score();
        let min_index = self.lex_index(&range.min, shared_score, true);
        if min_index >= self.scores.len() {
            return Vec::new();
        }
        let max_index = self.lex_index(&range.max, shared_score, false);
        if max_index <= min_index {
            return Vec::new();
        }
        self.limited_range(range.limit, min_index, max_index, false, false)
    }

    // -- serialization --

    /// Writes the set: header, size, then length-prefixed member and
    /// canonical-score pairs in map iteration order.
    pub fn to_data(&self, w: &mut impl Write) -> Result<(), FormatError> {
        format::write_header(w, format::SET_MAGIC)?;
        format::write_len(w, self.members.len())?;
        for entry in self.members.iter() {
            format::write_bytes(w, entry.member())?;
            format::write_bytes(w, entry.score_bytes())?;
        }
        Ok(())
    }

    /// Rebuilds a set written by [`Self::to_data`], re-validating every
    /// score on the way in.
    pub fn from_data(r: &mut impl Read) -> Result<Self, FormatError> {
        format::read_header(r, format::SET_MAGIC)?;
        let size = format::read_u32(r)?;
        let mut set = Self {
            members: MemberMap::with_capacity(format::capped_capacity(size)),
            scores: ScoreSet::new(),
        };
        for _ in 0..size {
            let member = Bytes::from(format::read_bytes(r)?);
            let score_text = format::read_bytes(r)?;
            let (canonical, value) = score::canonical_score(&score_text).map_err(|_| {
                FormatError::InvalidData("stored score is not a valid float".into())
            })?;
            set.member_add(member, canonical, value);
        }
        Ok(set)
    }

    // -- internals --

    /// Adds or rescores one member in both indexes. Returns the previous
    /// canonical score text when the member already existed.
    fn member_add(&mut self, member: Bytes, score_text: Bytes, value: f64) -> Option<Bytes> {
        match self.members.get(&member).cloned() {
            None => {
                let entry = Entry::new(member, score_text, value);
                self.scores.insert(entry.clone());
                self.members.insert(entry);
                None
            }
            Some(old) => {
                // the sort key changes, so the tree entry must come out
                // before it is rewritten
                self.scores.remove(&old);
                let updated = old.with_score(score_text, value);
                self.scores.insert(updated.clone());
                self.members.insert(updated);
                Some(old.score_bytes().clone())
            }
        }
    }

    /// Removes one member from both indexes. Returns its score text.
    fn member_remove(&mut self, member: &[u8]) -> Option<Bytes> {
        let entry = self.members.remove(member)?;
        self.scores.remove(&entry);
        Some(entry.score_bytes().clone())
    }

    fn emit(&self, delta: Delta, sink: &mut dyn DeltaSink) {
        let members = delta.len();
        if let Err(error) = sink.publish(delta) {
            warn!(members, %error, "delta sink rejected update; replicas may be stale");
        }
    }

    fn score_index(&self, bound: &ScoreBound, minimum: bool) -> usize {
        let probe = Probe::score_bound(bound.value, bound.exclusive, minimum);
        self.scores.index_of(&probe)
    }

    fn lex_index(&self, bound: &LexBound, shared_score: f64, minimum: bool) -> usize {
        let probe = match bound {
            LexBound::Min => Probe::lex_least(shared_score),
            LexBound::Max => Probe::lex_greatest(shared_score),
            LexBound::Inclusive(bytes) => Probe::lex_bound(bytes, shared_score, false, minimum),
            LexBound::Exclusive(bytes) => Probe::lex_bound(bytes, shared_score, true, minimum),
        };
        self.scores.index_of(&probe)
    }

    /// Shared ZRANGE/ZREVRANGE index arithmetic. The asymmetric floors
    /// (0 for start, -1 for stop) keep a hugely negative stop from
    /// wrapping back past the front.
    fn index_range(&self, min: i64, max: i64, with_scores: bool, reverse: bool) -> Vec<Bytes> {
        let len = self.scores.len() as i64;
        let (start, range_size) = if reverse {
            let start = len - 1 - bounded_start(min, len);
            let end = len - 1 - bounded_end(max, len);
            (start, start - end + 1)
        } else {
            let start = bounded_start(min, len);
            let end = bounded_end(max, len);
            (start, end - start + 1)
        };
        if range_size <= 0 || start < 0 || start == len {
            return Vec::new();
        }
        self.collect(start as usize, range_size as usize, reverse, with_scores)
    }

    /// Applies LIMIT to a `[min_index, max_index)` window and walks it.
    fn limited_range(
        &self,
        limit: Limit,
        mut min_index: usize,
        mut max_index: usize,
        with_scores: bool,
        reverse: bool,
    ) -> Vec<Bytes> {
        if !limit.is_unlimited() {
            if reverse {
                if limit.offset > max_index {
                    return Vec::new();
                }
                max_index -= limit.offset;
            } else {
                min_index += limit.offset;
                if min_index > self.scores.len() {
                    return Vec::new();
                }
            }
            if max_index <= min_index {
                return Vec::new();
            }
        }
        let take = limit.take(max_index - min_index);
        let start = if reverse { max_index - 1 } else { min_index };
        self.collect(start, take, reverse, with_scores)
    }

    fn collect(&self, start: usize, count: usize, reverse: bool, with_scores: bool) -> Vec<Bytes> {
        let width = if with_scores { 2 } else { 1 };
        let mut result = Vec::with_capacity(count.min(self.scores.len()) * width);
        for entry in self.scores.range(start, count, reverse) {
            result.push(entry.member().clone());
            if with_scores {
                result.push(entry.score_bytes().clone());
            }
        }
        result
    }
}

/// Equality by member set and per-member score value, like the original
/// replication checks: score text may differ, the doubles must not.
impl PartialEq for SortedSet {
    fn eq(&self, other: &Self) -> bool {
        self.members.len() == other.members.len()
            && self.members.iter().all(|entry| {
                other
                    .members
                    .get(entry.member())
                    .is_some_and(|theirs| theirs.score().total_cmp(&entry.score()).is_eq())
            })
    }
}

fn bounded_start(index: i64, len: i64) -> i64 {
    if index >= 0 {
        index.min(len)
    } else {
        (index + len).max(0)
    }
}

fn bounded_end(index: i64, len: i64) -> i64 {
    if index >= 0 {
        index.min(len)
    } else {
        (index + len).max(-1)
    }
}
