//! Range options for score, lex, and limited range commands.
//!
//! Bounds arrive in Redis text form — `(5`, `3.5`, `+inf` for scores;
//! `-`, `+`, `[member`, `(member` for lex — and parse into structured
//! bounds the command layer turns into tree probes.

use bytes::Bytes;

use crate::error::CommandError;
use crate::score;

/// One end of a score range.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoreBound {
    pub value: f64,
    pub exclusive: bool,
}

impl ScoreBound {
    pub fn inclusive(value: f64) -> Self {
        Self {
            value,
            exclusive: false,
        }
    }

    pub fn exclusive(value: f64) -> Self {
        Self {
            value,
            exclusive: true,
        }
    }

    /// Parses `(score` as exclusive, bare `score` as inclusive.
    /// `±inf` endpoints are accepted; NaN is not a bound.
    pub fn parse(bytes: &[u8]) -> Result<Self, CommandError> {
        let (exclusive, rest) = match bytes.split_first() {
            Some((b'(', rest)) => (true, rest),
            _ => (false, bytes),
        };
        let value = score::parse_score(rest).map_err(|_| CommandError::InvalidScoreRange)?;
        Ok(Self { value, exclusive })
    }
}

/// A score interval plus an optional LIMIT.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoreRange {
    pub min: ScoreBound,
    pub max: ScoreBound,
    pub limit: Limit,
}

impl ScoreRange {
    pub fn new(min: ScoreBound, max: ScoreBound) -> Self {
        Self {
            min,
            max,
            limit: Limit::default(),
        }
    }

    pub fn parse(min: &[u8], max: &[u8]) -> Result<Self, CommandError> {
        Ok(Self::new(ScoreBound::parse(min)?, ScoreBound::parse(max)?))
    }

    pub fn with_limit(mut self, limit: Limit) -> Self {
        self.limit = limit;
        self
    }
}

/// One end of a lexicographic range.
#[derive(Debug, Clone, PartialEq)]
pub enum LexBound {
    /// `-`: before every member.
    Min,
    /// `+`: after every member.
    Max,
    /// `[member`
    Inclusive(Bytes),
    /// `(member`
    Exclusive(Bytes),
}

impl LexBound {
    pub fn parse(bytes: &[u8]) -> Result<Self, CommandError> {
        match bytes.split_first() {
            Some((b'-', rest)) if rest.is_empty() => Ok(LexBound::Min),
            Some((b'+', rest)) if rest.is_empty() => Ok(LexBound::Max),
            Some((b'[', rest)) => Ok(LexBound::Inclusive(Bytes::copy_from_slice(rest))),
            Some((b'(', rest)) => Ok(LexBound::Exclusive(Bytes::copy_from_slice(rest))),
            _ => Err(CommandError::InvalidLexRange),
        }
    }
}

/// A lex interval plus an optional LIMIT.
#[derive(Debug, Clone, PartialEq)]
pub struct LexRange {
    pub min: LexBound,
    pub max: LexBound,
    pub limit: Limit,
}

impl LexRange {
    pub fn new(min: LexBound, max: LexBound) -> Self {
        Self {
            min,
            max,
            limit: Limit::default(),
        }
    }

    pub fn parse(min: &[u8], max: &[u8]) -> Result<Self, CommandError> {
        Ok(Self::new(LexBound::parse(min)?, LexBound::parse(max)?))
    }

    pub fn with_limit(mut self, limit: Limit) -> Self {
        self.limit = limit;
        self
    }
}

/// LIMIT offset/count. `count: None` means unbounded (Redis's negative
/// count); the default limit passes everything through.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Limit {
    pub offset: usize,
    pub count: Option<usize>,
}

impl Limit {
    pub fn new(offset: usize, count: Option<usize>) -> Self {
        Self { offset, count }
    }

    /// How many of `available` entries this limit lets through.
    pub(crate) fn take(&self, available: usize) -> usize {
        match self.count {
            Some(count) => count.min(available),
            None => available,
        }
    }

    pub(crate) fn is_unlimited(&self) -> bool {
        self.offset == 0 && self.count.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn score_bound_parses_inclusive_and_exclusive() {
        assert_eq!(ScoreBound::parse(b"5").unwrap(), ScoreBound::inclusive(5.0));
        assert_eq!(
            ScoreBound::parse(b"(5").unwrap(),
            ScoreBound::exclusive(5.0)
        );
        assert_eq!(
            ScoreBound::parse(b"-inf").unwrap(),
            ScoreBound::inclusive(f64::NEG_INFINITY)
        );
        assert_eq!(
            ScoreBound::parse(b"(+inf").unwrap(),
            ScoreBound::exclusive(f64::INFINITY)
        );
    }

    #[test]
    fn score_bound_rejects_garbage() {
        assert_eq!(
            ScoreBound::parse(b"abc").unwrap_err(),
            CommandError::InvalidScoreRange
        );
        assert_eq!(
            ScoreBound::parse(b"(nan").unwrap_err(),
            CommandError::InvalidScoreRange
        );
        assert_eq!(
            ScoreBound::parse(b"").unwrap_err(),
            CommandError::InvalidScoreRange
        );
    }

    #[test]
    fn lex_bound_parses_all_forms() {
        assert_eq!(LexBound::parse(b"-").unwrap(), LexBound::Min);
        assert_eq!(LexBound::parse(b"+").unwrap(), LexBound::Max);
        assert_eq!(
            LexBound::parse(b"[abc").unwrap(),
            LexBound::Inclusive(Bytes::from_static(b"abc"))
        );
        assert_eq!(
            LexBound::parse(b"(abc").unwrap(),
            LexBound::Exclusive(Bytes::from_static(b"abc"))
        );
        // empty member after the marker is legal
        assert_eq!(
            LexBound::parse(b"[").unwrap(),
            LexBound::Inclusive(Bytes::new())
        );
    }

    #[test]
    fn lex_bound_rejects_unmarked_members() {
        assert_eq!(
            LexBound::parse(b"abc").unwrap_err(),
            CommandError::InvalidLexRange
        );
        assert_eq!(
            LexBound::parse(b"-x").unwrap_err(),
            CommandError::InvalidLexRange
        );
        assert_eq!(
            LexBound::parse(b"").unwrap_err(),
            CommandError::InvalidLexRange
        );
    }

    #[test]
    fn limit_take_caps_available() {
        assert_eq!(Limit::default().take(7), 7);
        assert_eq!(Limit::new(0, Some(3)).take(7), 3);
        assert_eq!(Limit::new(0, Some(10)).take(7), 7);
    }
}
