//! Property-based tests for order month assignment and month ranges
//!
//! The cutoff rule decides which purchasing cycle every request ends up in,
//! and the month ranges decide what each filtered view shows. Both have to
//! hold for every day of every month, so they are checked with proptest
//! rather than a handful of hand-picked dates.

use chrono::{Datelike, TimeDelta, TimeZone, Utc};
use proptest::prelude::*;
use snack_request::cycle::{
    CUTOFF_DAYS, OrderMonth, compute_effective_order_month, month_range,
};

// PROPERTY TEST STRATEGIES

/// Strategy to generate any instant between 1990 and 2100
fn instant_strategy() -> impl Strategy<Value = chrono::DateTime<Utc>> {
    (1990i32..=2100, 1u32..=12, 1u32..=31, 0u32..24, 0u32..60, 0u32..60).prop_filter_map(
        "day must exist in month",
        |(year, month, day, hour, min, sec)| {
            Utc.with_ymd_and_hms(year, month, day, hour, min, sec).single()
        },
    )
}

/// Strategy to generate (year, month) pairs, including out-of-range months
fn year_month_strategy() -> impl Strategy<Value = (i32, i32)> {
    (1990i32..=2100, -24i32..=36)
}

// PROPERTY TESTS
proptest! {
    /// Property: the effective month is always one or two months after the request month
    #[test]
    fn prop_effective_month_is_one_or_two_ahead(date in instant_strategy()) {
        let request_month = OrderMonth::of(date);
        let effective = compute_effective_order_month(date);
        let ahead = effective.months_since(&request_month);

        prop_assert!(
            ahead == 1 || ahead == 2,
            "{} mapped to {} ({} months ahead)", date, effective, ahead
        );
    }

    /// Property: the branch taken depends only on whether the cutoff has passed
    #[test]
    fn prop_cutoff_decides_branch(date in instant_strategy()) {
        let request_month = OrderMonth::of(date);
        let deadline_day = request_month.days_in_month() - CUTOFF_DAYS;
        let expected = if date.day() <= deadline_day { 1 } else { 2 };

        prop_assert_eq!(
            compute_effective_order_month(date).months_since(&request_month),
            expected
        );
    }

    /// Property: time of day never changes the outcome
    #[test]
    fn prop_time_of_day_is_irrelevant(date in instant_strategy()) {
        let midnight = Utc
            .with_ymd_and_hms(date.year(), date.month(), date.day(), 0, 0, 0)
            .unwrap();

        prop_assert_eq!(
            compute_effective_order_month(date),
            compute_effective_order_month(midnight)
        );
    }

    /// Property: the effective month is stored as midnight on the first of the month
    #[test]
    fn prop_effective_month_starts_on_the_first(date in instant_strategy()) {
        let first = compute_effective_order_month(date).first_instant();

        prop_assert_eq!(first.day(), 1);
        prop_assert_eq!(first, first.date_naive().and_hms_opt(0, 0, 0).unwrap().and_utc());
    }

    /// Property: consecutive month ranges touch without overlapping
    #[test]
    fn prop_month_ranges_are_contiguous((year, month) in year_month_strategy()) {
        let this = month_range(year, month);
        let next = month_range(year, month + 1);

        prop_assert_eq!(this.end + TimeDelta::milliseconds(1), next.start);
        prop_assert!(this.start < this.end);
    }

    /// Property: every instant falls in the range of its own month and no other
    #[test]
    fn prop_instant_belongs_to_its_month(date in instant_strategy()) {
        let own = OrderMonth::of(date);

        prop_assert!(own.range().contains(date));
        prop_assert!(!own.add_months(1).range().contains(date));
        prop_assert!(!own.add_months(-1).range().contains(date));
    }
}

// TARGETED TESTS FOR SPECIFIC EDGE CASES

#[test]
fn thirty_one_day_month_boundary() {
    let on_deadline = Utc.with_ymd_and_hms(2025, 7, 24, 23, 59, 59).unwrap();
    let after_deadline = Utc.with_ymd_and_hms(2025, 7, 25, 0, 0, 0).unwrap();

    assert_eq!(compute_effective_order_month(on_deadline), OrderMonth::new(2025, 8));
    assert_eq!(compute_effective_order_month(after_deadline), OrderMonth::new(2025, 9));
}

#[test]
fn february_boundary_in_common_year() {
    let on_deadline = Utc.with_ymd_and_hms(2025, 2, 21, 8, 0, 0).unwrap();
    let after_deadline = Utc.with_ymd_and_hms(2025, 2, 22, 8, 0, 0).unwrap();

    assert_eq!(compute_effective_order_month(on_deadline), OrderMonth::new(2025, 3));
    assert_eq!(compute_effective_order_month(after_deadline), OrderMonth::new(2025, 4));
}

#[test]
fn late_november_and_december_roll_into_next_year() {
    let late_november = Utc.with_ymd_and_hms(2025, 11, 28, 0, 0, 0).unwrap();
    let late_december = Utc.with_ymd_and_hms(2025, 12, 30, 0, 0, 0).unwrap();

    assert_eq!(compute_effective_order_month(late_november), OrderMonth::new(2026, 1));
    assert_eq!(compute_effective_order_month(late_december), OrderMonth::new(2026, 2));
}

#[test]
fn leap_february_range_is_inclusive() {
    let range = month_range(2024, 2);

    assert_eq!(range.start, Utc.with_ymd_and_hms(2024, 2, 1, 0, 0, 0).unwrap());
    assert_eq!(
        range.end,
        Utc.with_ymd_and_hms(2024, 2, 29, 23, 59, 59).unwrap() + TimeDelta::milliseconds(999)
    );
    assert!(range.contains(range.start));
    assert!(range.contains(range.end));
    assert!(!range.contains(range.end + TimeDelta::milliseconds(1)));
}

#[test]
fn out_of_range_months_carry_over() {
    assert_eq!(month_range(2024, 13), month_range(2025, 1));
    assert_eq!(month_range(2024, 0), month_range(2023, 12));
    assert_eq!(month_range(2024, 25), month_range(2026, 1));
}
