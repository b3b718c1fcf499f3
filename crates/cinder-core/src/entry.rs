//! The entry model and the (score, member) total order.
//!
//! Every member lives in the set as an [`Entry`]: the member bytes, the
//! canonical score text, and the parsed double. The same logical entry is
//! held by both indexes; `Bytes` ref-counting keeps the underlying member
//! buffer shared rather than duplicated.
//!
//! Range endpoints are encoded as [`Probe`] values — short-lived
//! comparator operands that are never inserted. A probe's member is a
//! tagged variant: `Least` sorts before every real member and `Greatest`
//! after, which turns inclusive/exclusive range bounds into plain
//! insertion-index lookups. Because probes are a separate type from
//! stored entries, two sentinels can never meet in a comparison.

use std::cmp::Ordering;

use bytes::Bytes;
use ordered_float::OrderedFloat;

/// A single sorted-set entry: member bytes, canonical score text, and the
/// parsed score. Entries never hold NaN.
#[derive(Debug, Clone, PartialEq)]
pub struct Entry {
    member: Bytes,
    score_bytes: Bytes,
    score: f64,
}

impl Entry {
    /// `score` must be the parsed value of `score_bytes` and never NaN;
    /// the command layer guarantees both.
    pub fn new(member: Bytes, score_bytes: Bytes, score: f64) -> Self {
        debug_assert!(!score.is_nan());
        Self {
            member,
            score_bytes,
            score,
        }
    }

    /// Placeholder for vacated tree slots; never observable.
    pub(crate) fn vacant() -> Self {
        Self {
            member: Bytes::new(),
            score_bytes: Bytes::new(),
            score: 0.0,
        }
    }

    /// A copy of this entry with a new score, sharing the member buffer.
    pub(crate) fn with_score(&self, score_bytes: Bytes, score: f64) -> Self {
        Self::new(self.member.clone(), score_bytes, score)
    }

    pub fn member(&self) -> &Bytes {
        &self.member
    }

    pub fn score_bytes(&self) -> &Bytes {
        &self.score_bytes
    }

    pub fn score(&self) -> f64 {
        self.score
    }
}

/// Unsigned lexicographic byte comparison; a proper prefix is less.
fn compare_members(a: &[u8], b: &[u8]) -> Ordering {
    a.cmp(b)
}

/// The set's total order: score first, member bytes as tie-break.
pub(crate) fn compare_entries(a: &Entry, b: &Entry) -> Ordering {
    OrderedFloat(a.score)
        .cmp(&OrderedFloat(b.score))
        .then_with(|| compare_members(&a.member, &b.member))
}

/// Anything the order-statistics tree can rank against stored entries:
/// real entries and range probes.
pub(crate) trait OrderKey {
    fn cmp_entry(&self, entry: &Entry) -> Ordering;
}

impl OrderKey for Entry {
    fn cmp_entry(&self, entry: &Entry) -> Ordering {
        compare_entries(self, entry)
    }
}

/// The member half of a range probe.
#[derive(Debug, Clone, Copy)]
enum ProbeMember<'a> {
    /// Sorts before every real member.
    Least,
    /// Sorts after every real member.
    Greatest,
    /// Real bound bytes; `on_equal` decides the order against a
    /// byte-identical stored member.
    Lex {
        bytes: &'a [u8],
        on_equal: Ordering,
    },
}

/// A synthetic comparator operand standing in for a range endpoint.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Probe<'a> {
    score: f64,
    member: ProbeMember<'a>,
}

impl<'a> Probe<'a> {
    /// Probe for a score bound.
    ///
    /// An inclusive minimum or exclusive maximum must sort before every
    /// entry with the bound score; the other two cases sort after.
    pub(crate) fn score_bound(score: f64, exclusive: bool, minimum: bool) -> Probe<'static> {
        let member = if exclusive ^ minimum {
            ProbeMember::Least
        } else {
            ProbeMember::Greatest
        };
        Probe { score, member }
    }

    /// Probe for a lex bound at the given (shared) score.
    ///
    /// On byte-equal members the probe sorts before the entry for an
    /// inclusive minimum or exclusive maximum, after it otherwise.
    pub(crate) fn lex_bound(bytes: &'a [u8], score: f64, exclusive: bool, minimum: bool) -> Self {
        let on_equal = if minimum ^ exclusive {
            Ordering::Less
        } else {
            Ordering::Greater
        };
        Probe {
            score,
            member: ProbeMember::Lex { bytes, on_equal },
        }
    }

    /// Probe for the unbounded lex minimum (`-`).
    pub(crate) fn lex_least(score: f64) -> Probe<'static> {
        Probe {
            score,
            member: ProbeMember::Least,
        }
    }

    /// Probe for the unbounded lex maximum (`+`).
    pub(crate) fn lex_greatest(score: f64) -> Probe<'static> {
        Probe {
            score,
            member: ProbeMember::Greatest,
        }
    }
}

impl OrderKey for Probe<'_> {
    fn cmp_entry(&self, entry: &Entry) -> Ordering {
        OrderedFloat(self.score)
            .cmp(&OrderedFloat(entry.score))
            .then_with(|| match self.member {
                ProbeMember::Least => Ordering::Less,
                ProbeMember::Greatest => Ordering::Greater,
                ProbeMember::Lex { bytes, on_equal } => {
                    match compare_members(bytes, &entry.member) {
                        Ordering::Equal => on_equal,
                        other => other,
                    }
                }
            })
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
    fn orders_by_score_then_member() {
        let a = entry("a", 1.0);
        let b = entry("b", 1.0);
        let c = entry("a", 2.0);
        assert_eq!(compare_entries(&a, &b), Ordering::Less);
        assert_eq!(compare_entries(&b, &a), Ordering::Greater);
        assert_eq!(compare_entries(&b, &c), Ordering::Less);
        assert_eq!(compare_entries(&a, &a), Ordering::Equal);
    }

    #[test]
    fn prefix_member_is_less() {
        let ab = entry("ab", 0.0);
        let abc = entry("abc", 0.0);
        assert_eq!(compare_entries(&ab, &abc), Ordering::Less);
    }

    #[test]
    fn member_bytes_compare_unsigned() {
        // 0x80 is negative as i8; unsigned comparison puts it after 0x7f
        let ascii = entry("\u{7f}", 0.0);
        let high_bit = Entry::new(Bytes::from_static(&[0x80]), Bytes::from_static(b"0"), 0.0);
        assert_eq!(compare_entries(&ascii, &high_bit), Ordering::Less);
    }

    #[test]
    fn infinite_scores_order() {
        let low = entry("m", f64::NEG_INFINITY);
        let mid = entry("m", 0.0);
        let high = entry("m", f64::INFINITY);
        assert_eq!(compare_entries(&low, &mid), Ordering::Less);
        assert_eq!(compare_entries(&mid, &high), Ordering::Less);
    }

    #[test]
    fn inclusive_min_probe_sorts_before_equal_score() {
        let e = entry("m", 5.0);
        let probe = Probe::score_bound(5.0, false, true);
        assert_eq!(probe.cmp_entry(&e), Ordering::Less);
    }

    #[test]
    fn exclusive_min_probe_sorts_after_equal_score() {
        let e = entry("m", 5.0);
        let probe = Probe::score_bound(5.0, true, true);
        assert_eq!(probe.cmp_entry(&e), Ordering::Greater);
    }

    #[test]
    fn inclusive_max_probe_sorts_after_equal_score() {
        let e = entry("m", 5.0);
        let probe = Probe::score_bound(5.0, false, false);
        assert_eq!(probe.cmp_entry(&e), Ordering::Greater);
    }

    #[test]
    fn exclusive_max_probe_sorts_before_equal_score() {
        let e = entry("m", 5.0);
        let probe = Probe::score_bound(5.0, true, false);
        assert_eq!(probe.cmp_entry(&e), Ordering::Less);
    }

    #[test]
    fn lex_probe_tie_breaks_on_equal_bytes() {
        let e = entry("b", 0.0);
        assert_eq!(
            Probe::lex_bound(b"b", 0.0, false, true).cmp_entry(&e),
            Ordering::Less
        );
        assert_eq!(
            Probe::lex_bound(b"b", 0.0, true, true).cmp_entry(&e),
            Ordering::Greater
        );
        assert_eq!(
            Probe::lex_bound(b"b", 0.0, false, false).cmp_entry(&e),
            Ordering::Greater
        );
        assert_eq!(
            Probe::lex_bound(b"b", 0.0, true, false).cmp_entry(&e),
            Ordering::Less
        );
    }

    #[test]
    fn lex_sentinels_bracket_every_member() {
        let e = entry("", 0.0);
        assert_eq!(Probe::lex_least(0.0).cmp_entry(&e), Ordering::Less);
        assert_eq!(Probe::lex_greatest(0.0).cmp_entry(&e), Ordering::Greater);
    }
}
