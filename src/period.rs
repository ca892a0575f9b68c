//! Turns a time-window request into concrete calendar boundaries and an
//! ordered, gap-free list of bucket labels.

use crate::calendar::{self, last_day_of_month};
use crate::error::{LedgerError, Result};
use crate::store::OrderTypeFilter;
use chrono::{Datelike, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A calendar month, the unit both month-range endpoints are expressed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct YearMonth {
    pub year: i32,
    pub month: u32,
}

impl YearMonth {
    pub fn new(year: i32, month: u32) -> Result<Self> {
        if !(1..=12).contains(&month) {
            return Err(LedgerError::InvalidTimeWindow(format!(
                "month {} out of range 1-12",
                month
            )));
        }
        Ok(Self { year, month })
    }

    /// Parses the wire format "YYYY-MM".
    pub fn parse(s: &str) -> Result<Self> {
        let invalid = || {
            LedgerError::InvalidTimeWindow(format!("invalid month '{}': expected YYYY-MM", s))
        };

        let (y, m) = s.trim().split_once('-').ok_or_else(invalid)?;
        let year: i32 = y.parse().map_err(|_| invalid())?;
        let month: u32 = m.parse().map_err(|_| invalid())?;
        Self::new(year, month)
    }

    pub fn from_date(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }

    pub fn succ(self) -> Self {
        if self.month == 12 {
            Self {
                year: self.year + 1,
                month: 1,
            }
        } else {
            Self {
                year: self.year,
                month: self.month + 1,
            }
        }
    }

    pub fn first_day(self) -> NaiveDate {
        NaiveDate::from_ymd_opt(self.year, self.month, 1).unwrap()
    }

    pub fn last_day(self) -> NaiveDate {
        last_day_of_month(self.year, self.month)
    }
}

impl fmt::Display for YearMonth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

/// The tagged request shape: either a whole calendar year bucketed by month,
/// or an inclusive month range (a single month buckets by day).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimeDimension {
    Year(i32),
    Months { start: YearMonth, end: YearMonth },
}

impl TimeDimension {
    /// Month-range constructor with the defaulting rule: an absent range
    /// falls back to the current month used as both endpoints.
    pub fn months_or_current(range: Option<(YearMonth, YearMonth)>, today: NaiveDate) -> Self {
        let (start, end) = range.unwrap_or_else(|| {
            let current = YearMonth::from_date(today);
            (current, current)
        });
        Self::Months { start, end }
    }

    pub fn is_yearly(&self) -> bool {
        matches!(self, Self::Year(_))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Granularity {
    Day,
    Month,
}

impl Granularity {
    /// The bucket key for a timestamp at this granularity.
    pub fn label_for(self, ts: NaiveDateTime) -> String {
        match self {
            Self::Day => ts.format("%Y-%m-%d").to_string(),
            Self::Month => ts.format("%Y-%m").to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeWindowRequest {
    pub dimension: TimeDimension,
    pub order_type: OrderTypeFilter,
}

impl TimeWindowRequest {
    pub fn new(dimension: TimeDimension, order_type: OrderTypeFilter) -> Self {
        Self {
            dimension,
            order_type,
        }
    }

    pub fn resolve(&self) -> Result<ResolvedRange> {
        resolve(&self.dimension)
    }
}

/// Concrete boundaries for a request. `end` is inclusive (end of day);
/// `labels` covers `[start, end]` contiguously with no duplicates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedRange {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    pub granularity: Granularity,
    pub labels: Vec<String>,
}

impl ResolvedRange {
    pub fn contains(&self, ts: NaiveDateTime) -> bool {
        ts >= self.start && ts <= self.end
    }

    pub fn previous(&self, dimension: &TimeDimension) -> (NaiveDateTime, NaiveDateTime) {
        calendar::previous_period(self.start, self.end, dimension)
    }
}

pub fn resolve(dimension: &TimeDimension) -> Result<ResolvedRange> {
    match dimension {
        TimeDimension::Year(year) => {
            let start = NaiveDate::from_ymd_opt(*year, 1, 1)
                .ok_or_else(|| {
                    LedgerError::InvalidTimeWindow(format!("year {} out of range", year))
                })?
                .and_hms_opt(0, 0, 0)
                .unwrap();
            let end = NaiveDate::from_ymd_opt(*year, 12, 31)
                .unwrap()
                .and_hms_opt(23, 59, 59)
                .unwrap();

            // Always exactly 12, regardless of data presence.
            let labels = (1..=12).map(|m| format!("{:04}-{:02}", year, m)).collect();

            Ok(ResolvedRange {
                start,
                end,
                granularity: Granularity::Month,
                labels,
            })
        }
        TimeDimension::Months { start, end } => {
            if start > end {
                return Err(LedgerError::InvalidTimeWindow(format!(
                    "month range {} to {} is reversed",
                    start, end
                )));
            }

            let range_start = start.first_day().and_hms_opt(0, 0, 0).unwrap();
            let range_end = end.last_day().and_hms_opt(23, 59, 59).unwrap();

            if start == end {
                let labels = (1..=end.last_day().day())
                    .map(|d| format!("{:04}-{:02}-{:02}", start.year, start.month, d))
                    .collect();
                Ok(ResolvedRange {
                    start: range_start,
                    end: range_end,
                    granularity: Granularity::Day,
                    labels,
                })
            } else {
                Ok(ResolvedRange {
                    start: range_start,
                    end: range_end,
                    granularity: Granularity::Month,
                    labels: month_labels(*start, *end),
                })
            }
        }
    }
}

/// Inclusive month labels from `start` to `end`. Always terminates and always
/// yields at least `[start]`, even for a reversed pair.
pub fn month_labels(start: YearMonth, end: YearMonth) -> Vec<String> {
    let mut labels = vec![start.to_string()];
    let mut curr = start;
    while curr < end {
        curr = curr.succ();
        labels.push(curr.to_string());
    }
    labels
}
