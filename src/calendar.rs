//! Pure Gregorian calendar arithmetic shared by the period resolver and the
//! report layer. All functions are total: anything that would overflow the
//! calendar falls back softly instead of erroring.

use crate::period::TimeDimension;
use chrono::{Datelike, Days, NaiveDate, NaiveDateTime, Timelike};

pub fn last_day_of_month(year: i32, month: u32) -> NaiveDate {
    let next_month = if month == 12 { 1 } else { month + 1 };
    let next_year = if month == 12 { year + 1 } else { year };

    NaiveDate::from_ymd_opt(next_year, next_month, 1)
        .unwrap()
        .checked_sub_days(Days::new(1))
        .unwrap()
}

pub fn days_in_month(year: i32, month: u32) -> u32 {
    last_day_of_month(year, month).day()
}

/// Moves a date by whole months, clamping the day when the source day does
/// not exist in the target month (e.g. Mar 31 - 1 month = Feb 28/29).
pub fn shift_month(date: NaiveDate, delta: i32) -> NaiveDate {
    let zero_based = date.year() * 12 + date.month0() as i32 + delta;
    let year = zero_based.div_euclid(12);
    let month = zero_based.rem_euclid(12) as u32 + 1;

    let day = date.day().min(days_in_month(year, month));
    NaiveDate::from_ymd_opt(year, month, day).unwrap_or(date)
}

/// Previous comparable period for a resolved window.
///
/// Year windows shift back one whole year (Feb 29 clamps to Feb 28 when the
/// previous year is not a leap year). Month windows shift back one month; the
/// end keeps its day-of-month when the current window is a partial month, but
/// snaps to the previous month's last day when the window ends on a month
/// boundary, so full months compare against full months.
///
/// Falls back to the original `(start, end)` if the shift cannot be
/// represented; callers never see a calendar error.
pub fn previous_period(
    start: NaiveDateTime,
    end: NaiveDateTime,
    dimension: &TimeDimension,
) -> (NaiveDateTime, NaiveDateTime) {
    match dimension {
        TimeDimension::Year(_) => previous_year_period(start, end),
        TimeDimension::Months { .. } => previous_month_period(start, end),
    }
    .unwrap_or((start, end))
}

fn previous_year_period(
    start: NaiveDateTime,
    end: NaiveDateTime,
) -> Option<(NaiveDateTime, NaiveDateTime)> {
    let prev_start = with_ymd(start, start.year() - 1, start.month(), start.day())?;

    // Feb 29 has no counterpart in a non-leap year.
    let prev_end = with_ymd(end, end.year() - 1, end.month(), end.day())
        .or_else(|| with_ymd(end, end.year() - 1, end.month(), 28))?;

    Some((prev_start, prev_end))
}

fn previous_month_period(
    start: NaiveDateTime,
    end: NaiveDateTime,
) -> Option<(NaiveDateTime, NaiveDateTime)> {
    let prev_start_date = shift_month(start.date(), -1);
    let prev_start = with_ymd(
        start,
        prev_start_date.year(),
        prev_start_date.month(),
        prev_start_date.day(),
    )?;

    let (prev_year, prev_month) = if end.month() == 1 {
        (end.year() - 1, 12)
    } else {
        (end.year(), end.month() - 1)
    };

    let is_last_day = end.day() == days_in_month(end.year(), end.month());
    let prev_last_day = days_in_month(prev_year, prev_month);
    let day = if is_last_day {
        prev_last_day
    } else {
        end.day().min(prev_last_day)
    };

    let prev_end = with_ymd(end, prev_year, prev_month, day)?;
    Some((prev_start, prev_end))
}

fn with_ymd(ts: NaiveDateTime, year: i32, month: u32, day: u32) -> Option<NaiveDateTime> {
    NaiveDate::from_ymd_opt(year, month, day)?.and_hms_opt(ts.hour(), ts.minute(), ts.second())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::period::YearMonth;

    fn dt(y: i32, m: u32, d: u32, h: u32, min: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(h, min, s)
            .unwrap()
    }

    fn month_dim() -> TimeDimension {
        TimeDimension::Months {
            start: YearMonth::new(2024, 1).unwrap(),
            end: YearMonth::new(2024, 1).unwrap(),
        }
    }

    #[test]
    fn test_last_day_of_month() {
        assert_eq!(
            last_day_of_month(2023, 2),
            NaiveDate::from_ymd_opt(2023, 2, 28).unwrap()
        );
        assert_eq!(
            last_day_of_month(2024, 2),
            NaiveDate::from_ymd_opt(2024, 2, 29).unwrap()
        );
        assert_eq!(
            last_day_of_month(2023, 12),
            NaiveDate::from_ymd_opt(2023, 12, 31).unwrap()
        );
        assert_eq!(days_in_month(2024, 4), 30);
    }

    #[test]
    fn test_shift_month_clamps_day() {
        let jan31 = NaiveDate::from_ymd_opt(2024, 1, 31).unwrap();
        assert_eq!(
            shift_month(jan31, -1),
            NaiveDate::from_ymd_opt(2023, 12, 31).unwrap()
        );

        let mar31 = NaiveDate::from_ymd_opt(2024, 3, 31).unwrap();
        assert_eq!(
            shift_month(mar31, -1),
            NaiveDate::from_ymd_opt(2024, 2, 29).unwrap()
        );
        assert_eq!(
            shift_month(mar31, 11),
            NaiveDate::from_ymd_opt(2025, 2, 28).unwrap()
        );
    }

    #[test]
    fn test_shift_month_across_year_boundary() {
        let jan15 = NaiveDate::from_ymd_opt(2024, 1, 15).unwrap();
        assert_eq!(
            shift_month(jan15, -2),
            NaiveDate::from_ymd_opt(2023, 11, 15).unwrap()
        );
        assert_eq!(
            shift_month(jan15, 12),
            NaiveDate::from_ymd_opt(2025, 1, 15).unwrap()
        );
    }

    #[test]
    fn test_previous_year_period_leap_fallback() {
        let (prev_start, prev_end) = previous_period(
            dt(2024, 2, 1, 0, 0, 0),
            dt(2024, 2, 29, 23, 59, 59),
            &TimeDimension::Year(2024),
        );
        assert_eq!(prev_start, dt(2023, 2, 1, 0, 0, 0));
        assert_eq!(prev_end, dt(2023, 2, 28, 23, 59, 59));
    }

    #[test]
    fn test_previous_month_period_full_month() {
        // A full-month window compares against the previous full month,
        // not a day-31 clamp artifact.
        let (prev_start, prev_end) = previous_period(
            dt(2024, 1, 1, 0, 0, 0),
            dt(2024, 1, 31, 23, 59, 59),
            &month_dim(),
        );
        assert_eq!(prev_start, dt(2023, 12, 1, 0, 0, 0));
        assert_eq!(prev_end, dt(2023, 12, 31, 23, 59, 59));
    }

    #[test]
    fn test_previous_month_period_partial_month_keeps_day() {
        // In-progress month: Mar 1..Mar 15 compares against Feb 1..Feb 15.
        let (prev_start, prev_end) = previous_period(
            dt(2024, 3, 1, 0, 0, 0),
            dt(2024, 3, 15, 23, 59, 59),
            &month_dim(),
        );
        assert_eq!(prev_start, dt(2024, 2, 1, 0, 0, 0));
        assert_eq!(prev_end, dt(2024, 2, 15, 23, 59, 59));
    }

    #[test]
    fn test_previous_month_period_day_overflow_clamps() {
        // Mar 30 is not the last day of March, but February has no day 30.
        let (_, prev_end) = previous_period(
            dt(2023, 3, 1, 0, 0, 0),
            dt(2023, 3, 30, 23, 59, 59),
            &month_dim(),
        );
        assert_eq!(prev_end, dt(2023, 2, 28, 23, 59, 59));
    }
}
