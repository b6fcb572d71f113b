//! Order cycle calculation: which purchasing month a request belongs to,
//! and the instant ranges used to filter requests by month.
//!
//! A month's purchasing cycle closes [`CUTOFF_DAYS`] days before the last day
//! of the month. Requests made on or before the closing day go into next
//! month's order, later requests go into the order after that.
//!
//! All calendar arithmetic is done in UTC.
use super::error::ValidationError;
use chrono::{DateTime, Datelike, NaiveDate, TimeDelta, Utc};
use std::fmt;

/// Days before the end of the month at which the current cycle closes.
pub const CUTOFF_DAYS: u32 = 7;

/// A calendar month. Always normalized so that `month` is in `1..=12`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct OrderMonth {
    year: i32,
    month: u32,
}

/// An inclusive instant range covering one calendar month.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonthRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl OrderMonth {
    /// Build a month from a possibly out-of-range 1-indexed month number.
    /// `(2024, 13)` is January 2025 and `(2024, 0)` is December 2023.
    pub fn new(year: i32, month: i32) -> Self {
        let index = i64::from(year) * 12 + i64::from(month) - 1;
        Self {
            year: index.div_euclid(12) as i32,
            month: index.rem_euclid(12) as u32 + 1,
        }
    }

    /// The month containing `date`.
    pub fn of(date: DateTime<Utc>) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }

    /// The current calendar month.
    pub fn current() -> Self {
        Self::of(Utc::now())
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn month(&self) -> u32 {
        self.month
    }

    pub fn add_months(self, months: i32) -> Self {
        Self::new(self.year, self.month as i32 + months)
    }

    /// Signed number of months from `earlier` to `self`.
    pub fn months_since(&self, earlier: &OrderMonth) -> i64 {
        (i64::from(self.year) * 12 + i64::from(self.month))
            - (i64::from(earlier.year) * 12 + i64::from(earlier.month))
    }

    pub fn days_in_month(&self) -> u32 {
        // day 0 of the following month
        let end = self.add_months(1).first_instant() - TimeDelta::days(1);
        end.day()
    }

    /// UTC midnight on the first day of the month. Months outside the
    /// calendar's range saturate to the latest representable instant, see
    /// [`OrderMonth::is_representable`].
    pub fn first_instant(&self) -> DateTime<Utc> {
        self.first_day()
            .and_then(|date| date.and_hms_opt(0, 0, 0))
            .map(|naive| naive.and_utc())
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }

    /// Whether the whole month, up to the first instant of the next one,
    /// lies within the calendar's supported years.
    pub fn is_representable(&self) -> bool {
        self.first_day().is_some() && self.add_months(1).first_day().is_some()
    }

    fn first_day(&self) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(self.year, self.month, 1)
    }

    pub fn range(&self) -> MonthRange {
        MonthRange {
            start: self.first_instant(),
            end: self.add_months(1).first_instant() - TimeDelta::milliseconds(1),
        }
    }

    /// e.g. "October 2026"
    pub fn label(&self) -> String {
        self.first_instant().format("%B %Y").to_string()
    }

    /// e.g. "Oct 2026"
    pub fn short_label(&self) -> String {
        self.first_instant().format("%b %Y").to_string()
    }
}

impl fmt::Display for OrderMonth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

impl MonthRange {
    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        self.start <= instant && instant <= self.end
    }
}

/// The order month a request made at `request_date` is assigned to.
pub fn compute_effective_order_month(request_date: DateTime<Utc>) -> OrderMonth {
    let month = OrderMonth::of(request_date);
    let deadline_day = month.days_in_month() - CUTOFF_DAYS;

    if request_date.day() <= deadline_day {
        month.add_months(1)
    } else {
        month.add_months(2)
    }
}

/// Inclusive range from the first to the last millisecond of a month.
/// Months outside `1..=12` carry over into neighbouring years.
pub fn month_range(year: i32, month: i32) -> MonthRange {
    OrderMonth::new(year, month).range()
}

/// Parse a `YYYY-MM` month filter. Empty input means no filter. Years the
/// calendar cannot represent are rejected.
pub fn parse_month_filter(input: &str) -> Result<Option<OrderMonth>, ValidationError> {
    let input = input.trim();
    if input.is_empty() {
        return Ok(None);
    }

    let invalid = || ValidationError::InvalidMonthFilter(input.to_string());
    // the year may itself carry a sign, so split on the last '-'
    let (year, month) = input.rsplit_once('-').ok_or_else(invalid)?;
    let year: i32 = year.parse().map_err(|_| invalid())?;
    let month: i32 = month.parse().map_err(|_| invalid())?;

    let month = OrderMonth::new(year, month);
    if !month.is_representable() {
        return Err(invalid());
    }
    Ok(Some(month))
}
