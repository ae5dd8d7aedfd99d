use chrono::NaiveDate;
use sos_result::codec::filter_rows;
use sos_result::temporal::apply_predicates;
use sos_result::{Encoding, EncodingSpec, TemporalPredicate, TimeInterval, Timestamp};

fn at(day: u32, hour: u32) -> Timestamp {
    NaiveDate::from_ymd_opt(2020, 1, day)
        .unwrap()
        .and_hms_opt(hour, 0, 0)
        .unwrap()
}

fn day(d: u32) -> Timestamp {
    at(d, 0)
}

fn encoding() -> Encoding {
    Encoding::TextBlock(EncodingSpec::new(";", ",", "."))
}

/// Rows at 2020-01-01 .. 2020-01-0N, one per day, value = day.
fn daily_block(days: u32) -> String {
    (1..=days)
        .map(|d| format!("2020-01-0{}T00:00:00,{}.0;", d, d))
        .collect()
}

#[test]
fn test_accept_all_normalizes_separators() {
    let with_trailing = "2020-01-01T00:00:00,1.0;2020-01-02T00:00:00,2.0;";
    let without_trailing = "2020-01-01T00:00:00,1.0;2020-01-02T00:00:00,2.0";

    assert_eq!(filter_rows(with_trailing, &encoding(), |_| true), with_trailing);
    assert_eq!(filter_rows(without_trailing, &encoding(), |_| true), with_trailing);
}

#[test]
fn test_equals_keeps_only_the_exact_row() {
    let filtered = apply_predicates(
        &daily_block(3),
        &encoding(),
        &TimeInterval::new(day(1), day(3)),
        &[TemporalPredicate::Equals(day(2))],
    );
    assert_eq!(filtered, "2020-01-02T00:00:00,2.0;");
}

#[test]
fn test_before_and_after_exclude_the_bound() {
    let sampling = TimeInterval::new(day(1), day(5));

    let before = apply_predicates(
        &daily_block(5),
        &encoding(),
        &sampling,
        &[TemporalPredicate::Before(day(3))],
    );
    assert_eq!(before, "2020-01-01T00:00:00,1.0;2020-01-02T00:00:00,2.0;");

    let after = apply_predicates(
        &daily_block(5),
        &encoding(),
        &sampling,
        &[TemporalPredicate::After(day(3))],
    );
    assert_eq!(after, "2020-01-04T00:00:00,4.0;2020-01-05T00:00:00,5.0;");
}

#[test]
fn test_during_excludes_both_bounds() {
    let filtered = apply_predicates(
        &daily_block(5),
        &encoding(),
        &TimeInterval::new(day(1), day(5)),
        &[TemporalPredicate::During {
            begin: day(2),
            end: day(4),
        }],
    );
    assert_eq!(filtered, "2020-01-03T00:00:00,3.0;");
}

#[test]
fn test_bound_outside_sampling_leaves_block_untouched() {
    let block = daily_block(3);
    let sampling = TimeInterval::new(day(1), day(3));

    // end == bound: the pre-check fails, so no row is cut
    for predicate in [
        TemporalPredicate::Before(day(3)),
        TemporalPredicate::After(day(3)),
        TemporalPredicate::Before(day(1)),
        TemporalPredicate::After(day(1)),
    ] {
        assert_eq!(
            apply_predicates(&block, &encoding(), &sampling, &[predicate]),
            block,
            "{:?}",
            predicate
        );
    }
}

#[test]
fn test_predicates_narrow_sequentially() {
    let filtered = apply_predicates(
        &daily_block(5),
        &encoding(),
        &TimeInterval::new(day(1), day(5)),
        &[
            TemporalPredicate::After(day(2)),
            TemporalPredicate::Before(day(4)),
        ],
    );
    assert_eq!(filtered, "2020-01-03T00:00:00,3.0;");
}

#[test]
fn test_malformed_row_is_skipped() {
    let block = "2020-01-01T00:00:00,1.0;yesterday,9.9;2020-01-02T00:00:00,2.0;";
    let filtered = apply_predicates(
        block,
        &encoding(),
        &TimeInterval::new(day(1), day(3)),
        &[TemporalPredicate::Before(at(2, 12))],
    );
    assert_eq!(filtered, "2020-01-01T00:00:00,1.0;2020-01-02T00:00:00,2.0;");
}

#[test]
fn test_during_half_day_window() {
    let block = "2020-01-01T00:00:00,1.0;2020-01-02T00:00:00,2.0;2020-01-03T00:00:00,3.0;";
    let filtered = apply_predicates(
        block,
        &encoding(),
        &TimeInterval::new(day(1), day(4)),
        &[TemporalPredicate::During {
            begin: at(1, 12),
            end: day(3),
        }],
    );
    assert_eq!(filtered, "2020-01-02T00:00:00,2.0;");
}

#[test]
fn test_during_covering_whole_sampling_passes_through() {
    let block = daily_block(3);
    let filtered = apply_predicates(
        &block,
        &encoding(),
        &TimeInterval::new(day(1), day(3)),
        &[TemporalPredicate::During {
            begin: at(1, 0) - chrono::Duration::days(1),
            end: day(5),
        }],
    );
    assert_eq!(filtered, block);
}

#[test]
fn test_binary_encoding_is_returned_unchanged() {
    let encoding = Encoding::Other("BinaryBlock".to_string());
    let filtered = apply_predicates(
        "AAECAw==",
        &encoding,
        &TimeInterval::new(day(1), day(5)),
        &[TemporalPredicate::Equals(day(2))],
    );
    assert_eq!(filtered, "AAECAw==");
}
