//! Temporal predicate evaluation against a stored result.
//!
//! Each predicate is first checked against the result's sampling interval.
//! When the interval cannot straddle the predicate's bound the predicate is
//! skipped and the block passes through that step unchanged; otherwise the
//! predicate becomes a row-level test handed to the codec. Predicates run in
//! sequence over the running block, so every step narrows the previous one.

use tracing::debug;

use crate::codec::filter_rows;
use crate::model::{Encoding, TemporalPredicate, TimeInterval, Timestamp};

/// Row-level comparison applied to the timestamp of each row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowTest {
    Equals(Timestamp),
    Before(Timestamp),
    After(Timestamp),
    /// Strict on both ends.
    Between(Timestamp, Timestamp),
}

impl RowTest {
    pub fn matches(&self, t: Timestamp) -> bool {
        match *self {
            RowTest::Equals(e) => t == e,
            RowTest::Before(b) => t < b,
            RowTest::After(a) => t > a,
            RowTest::Between(begin, end) => begin < t && t < end,
        }
    }
}

/// Which interval relation let a `TM_During` predicate through the pre-check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DuringOverlap {
    /// The result straddles the predicate begin but not its end.
    Begin,
    /// The result straddles the predicate end but not its begin.
    End,
    /// The result spans the whole predicate period.
    Contains,
}

/// Classifies how a sampling interval overlaps `[begin, end)`.
///
/// A predicate period that covers the whole sampling interval has no case
/// and yields `None`, as does no overlap at all.
pub fn during_overlap(
    sampling: &TimeInterval,
    begin: Timestamp,
    end: Timestamp,
) -> Option<DuringOverlap> {
    let straddles_begin = sampling.begins_before(begin) && sampling.ends_after(begin);
    let straddles_end = sampling.begins_before(end) && sampling.ends_after(end);

    if straddles_begin && straddles_end {
        Some(DuringOverlap::Contains)
    } else if straddles_begin {
        Some(DuringOverlap::Begin)
    } else if straddles_end {
        Some(DuringOverlap::End)
    } else {
        None
    }
}

/// Turns one predicate into a row test, or `None` when the sampling interval
/// makes row filtering unnecessary for it.
pub fn plan_row_test(sampling: &TimeInterval, predicate: &TemporalPredicate) -> Option<RowTest> {
    match *predicate {
        TemporalPredicate::Equals(e) => Some(RowTest::Equals(e)),
        TemporalPredicate::Before(b) => {
            (sampling.begins_before(b) && sampling.ends_after(b)).then_some(RowTest::Before(b))
        }
        TemporalPredicate::After(a) => {
            (sampling.begins_before(a) && sampling.ends_after(a)).then_some(RowTest::After(a))
        }
        TemporalPredicate::During { begin, end } => {
            let overlap = during_overlap(sampling, begin, end)?;
            debug!("TM_During overlap case: {:?}", overlap);
            Some(RowTest::Between(begin, end))
        }
    }
}

/// Applies every predicate in order to `values` and returns the narrowed block.
///
/// With no predicates the block is returned as stored.
pub fn apply_predicates(
    values: &str,
    encoding: &Encoding,
    sampling: &TimeInterval,
    predicates: &[TemporalPredicate],
) -> String {
    let mut current = values.to_string();

    for predicate in predicates {
        match plan_row_test(sampling, predicate) {
            Some(test) => {
                debug!("Applying {} as {:?}", predicate.operator_name(), test);
                current = filter_rows(&current, encoding, |t| test.matches(t));
            }
            None => {
                debug!(
                    "{} does not cut the sampling interval; block unchanged",
                    predicate.operator_name()
                );
            }
        }
    }

    current
}
