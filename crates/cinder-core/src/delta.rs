//! Incremental replication deltas.
//!
//! Every mutating command that changed anything produces exactly one
//! delta: the applied (member, score-text) pairs for additive commands,
//! or the removed members for subtractive ones. A surrounding cluster
//! layer consumes deltas through the [`DeltaSink`] seam and ships them to
//! replicas instead of whole snapshots; applying them in order on an
//! empty replica reproduces the set.
//!
//! Deltas carry a tagged little-endian wire form (`write`/`read`) so the
//! transport can frame them without knowing their shape.

use std::io::{Read, Write};

use bytes::Bytes;
use thiserror::Error;

use crate::format::{self, FormatError};

const TAG_ADDS: u8 = 1;
const TAG_REMS: u8 = 2;

/// An incremental change to one sorted set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delta {
    /// Members added or rescored, with their canonical score text.
    Adds(Vec<(Bytes, Bytes)>),
    /// Members removed.
    Rems(Vec<Bytes>),
}

impl Delta {
    /// Number of members this delta touches.
    pub fn len(&self) -> usize {
        match self {
            Delta::Adds(pairs) => pairs.len(),
            Delta::Rems(members) => members.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Writes the tagged wire form.
    pub fn write(&self, w: &mut impl Write) -> Result<(), FormatError> {
        match self {
            Delta::Adds(pairs) => {
                format::write_u8(w, TAG_ADDS)?;
                format::write_len(w, pairs.len())?;
                for (member, score_bytes) in pairs {
                    format::write_bytes(w, member)?;
                    format::write_bytes(w, score_bytes)?;
                }
            }
            Delta::Rems(members) => {
                format::write_u8(w, TAG_REMS)?;
                format::write_len(w, members.len())?;
                for member in members {
                    format::write_bytes(w, member)?;
                }
            }
        }
        Ok(())
    }

    /// Reads one delta from the tagged wire form.
    pub fn read(r: &mut impl Read) -> Result<Self, FormatError> {
        let tag = format::read_u8(r)?;
        let count = format::read_u32(r)?;
        match tag {
            TAG_ADDS => {
                let mut pairs = Vec::with_capacity(format::capped_capacity(count));
                for _ in 0..count {
                    let member = Bytes::from(format::read_bytes(r)?);
                    let score_bytes = Bytes::from(format::read_bytes(r)?);
                    pairs.push((member, score_bytes));
                }
                Ok(Delta::Adds(pairs))
            }
            TAG_REMS => {
                let mut members = Vec::with_capacity(format::capped_capacity(count));
                for _ in 0..count {
                    members.push(Bytes::from(format::read_bytes(r)?));
                }
                Ok(Delta::Rems(members))
            }
            other => Err(FormatError::UnknownTag(other)),
        }
    }
}

/// Error a sink reports when it cannot accept a delta. The core logs it
/// and lets the command succeed — delta loss is visible to replicas and
/// is the replication layer's problem to repair.
#[derive(Debug, Error)]
#[error("delta sink unavailable: {reason}")]
pub struct SinkError {
    pub reason: String,
}

impl SinkError {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

/// Consumer of per-command deltas. Called synchronously under the
/// caller's per-key lock; implementations must not block.
pub trait DeltaSink {
    fn publish(&mut self, delta: Delta) -> Result<(), SinkError>;
}

/// Discards every delta. For standalone (non-replicated) use.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl DeltaSink for NullSink {
    fn publish(&mut self, _delta: Delta) -> Result<(), SinkError> {
        Ok(())
    }
}

/// Buffers every delta in order; handy in tests and for batching layers.
#[derive(Debug, Clone, Default)]
pub struct RecordingSink {
    pub deltas: Vec<Delta>,
}

impl DeltaSink for RecordingSink {
    fn publish(&mut self, delta: Delta) -> Result<(), SinkError> {
        self.deltas.push(delta);
        Ok(())
    }
}

/// Ships deltas to a replication task over a channel.
impl DeltaSink for std::sync::mpsc::Sender<Delta> {
    fn publish(&mut self, delta: Delta) -> Result<(), SinkError> {
        self.send(delta)
            .map_err(|_| SinkError::new("replication channel closed"))
    }
}
