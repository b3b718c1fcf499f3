//! Error types for the sorted-set core.

use thiserror::Error;

/// Errors surfaced by sorted-set commands.
///
/// Display strings match the replies a Redis client expects, so the reply
/// layer can forward them verbatim. Input-format and semantic errors are
/// raised before any mutation: a command that returns one of these has not
/// touched the set and has not emitted a delta.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CommandError {
    /// A score argument could not be parsed as a double, or parsed to NaN.
    #[error("ERR value is not a valid float")]
    NotAValidFloat,

    /// A ZINCRBY (or ZADD INCR) sum came out as NaN, e.g. `+inf + -inf`.
    #[error("ERR resulting score is not a number (NaN)")]
    OperationProducedNan,

    /// A ZRANGEBYSCORE/ZCOUNT bound was not `(score`, `score`, or `±inf`.
    #[error("ERR min or max is not a float")]
    InvalidScoreRange,

    /// A ZRANGEBYLEX bound was not `-`, `+`, `[member` or `(member`.
    #[error("ERR min or max not valid string range item")]
    InvalidLexRange,

    /// NX and XX were both requested.
    #[error("ERR XX and NX options at the same time are not compatible")]
    IncompatibleFlags,
}
