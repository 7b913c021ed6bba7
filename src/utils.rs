use crate::error::{ForecastError, Result};
use chrono::{Datelike, Days, Months, NaiveDate};

pub fn last_day_of_month(year: i32, month: u32) -> NaiveDate {
    let (next_year, next_month) = if month >= 12 {
        (year + 1, 1)
    } else {
        (year, month + 1)
    };

    NaiveDate::from_ymd_opt(next_year, next_month, 1)
        .and_then(|d| d.pred_opt())
        .unwrap_or(NaiveDate::MAX)
}

pub fn first_day_of_month(date: NaiveDate) -> NaiveDate {
    date.with_day(1).unwrap_or(date)
}

pub fn days_in_month(year: i32, month: u32) -> u32 {
    last_day_of_month(year, month).day()
}

/// Adds calendar months, clamping to the end of shorter months.
pub fn add_months(date: NaiveDate, months: u32) -> Option<NaiveDate> {
    date.checked_add_months(Months::new(months))
}

pub fn sub_months(date: NaiveDate, months: u32) -> Option<NaiveDate> {
    date.checked_sub_months(Months::new(months))
}

/// Shifts a date by a signed number of days.
pub fn shift_days(date: NaiveDate, days: i64) -> Option<NaiveDate> {
    if days >= 0 {
        date.checked_add_days(Days::new(days.unsigned_abs()))
    } else {
        date.checked_sub_days(Days::new(days.unsigned_abs()))
    }
}

/// First-of-month dates for every month touched by `[start, end]`.
pub fn months_spanned(start: NaiveDate, end: NaiveDate) -> Vec<NaiveDate> {
    let mut months = Vec::new();
    let mut current = first_day_of_month(start);

    while current <= end {
        months.push(current);
        match add_months(current, 1) {
            Some(next) => current = next,
            None => break,
        }
    }

    months
}

/// Fiscal year end for a calendar year, clamping the day to the month's
/// length (a 29 February year end falls on the 28th in non-leap years).
pub fn fiscal_year_end(year: i32, month: u32, day: u32) -> Option<NaiveDate> {
    if !(1..=12).contains(&month) || day == 0 {
        return None;
    }
    let day = day.min(days_in_month(year, month));
    NaiveDate::from_ymd_opt(year, month, day)
}

/// Parses a budget month in the format "YYYY-MM" (a trailing "-DD" is tolerated).
/// Returns the first day of that month.
pub fn parse_month_year(value: &str) -> Result<NaiveDate> {
    let trimmed = value.trim();
    let month_part = trimmed.get(..7).unwrap_or(trimmed);
    let start_str = format!("{}-01", month_part);

    NaiveDate::parse_from_str(&start_str, "%Y-%m-%d").map_err(|_| {
        ForecastError::DateError(format!(
            "Invalid month format: {}. Expected YYYY-MM",
            value
        ))
    })
}
