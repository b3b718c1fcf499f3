//! cinder-core: the sorted-set engine.
//!
//! A Redis-compatible sorted set keeps each unique member alongside an
//! IEEE-754 score and answers rank, score-range, and lex-range queries in
//! O(log n). Two indexes back every set — a content-hashed member map and
//! an order-statistics tree over (score, member) — and a delta stream lets
//! a surrounding cluster layer replicate mutations incrementally.
//!
//! The crate is the storage core only: wire protocol, connection
//! lifecycle, per-key executors, and cluster membership live outside and
//! plug into the `&mut self` command surface, the [`DeltaSink`] seam, and
//! the `to_data`/`from_data` hooks.

pub mod delta;
pub mod entry;
pub mod error;
pub mod format;
pub mod member_map;
pub mod range;
pub mod score;
pub mod sorted_set;
pub mod tree;

pub use delta::{Delta, DeltaSink, NullSink, RecordingSink, SinkError};
pub use entry::Entry;
pub use error::CommandError;
pub use format::FormatError;
pub use member_map::MemberMap;
pub use range::{LexBound, LexRange, Limit, ScoreBound, ScoreRange};
pub use sorted_set::{SortedSet, ZAddOptions, ZAddResponse};
pub use tree::ScoreSet;
