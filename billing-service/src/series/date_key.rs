//! Parsing and formatting of period keys.
//!
//! Accepted inputs: `2024-01-05`, RFC 3339 timestamps, `2024-01-05 13:00:00`,
//! `Jan 5, 2024`, and month keys `2024-01` / `Jan 2024`.

use time::{
    format_description::well_known::Rfc3339, macros::format_description, Date, Month, OffsetDateTime,
    PrimitiveDateTime,
};

use super::{Granularity, OutputFormat};
use crate::error::{BillingError, Result};

pub fn parse_date_key(key: &str) -> Result<Date> {
    let key = key.trim();
    if key.is_empty() {
        return Err(BillingError::InvalidSample("missing date key".to_string()));
    }

    if let Ok(d) = Date::parse(key, format_description!("[year]-[month]-[day]")) {
        return Ok(d);
    }
    if let Ok(dt) = OffsetDateTime::parse(key, &Rfc3339) {
        return Ok(dt.date());
    }
    if let Ok(dt) = PrimitiveDateTime::parse(
        key,
        format_description!("[year]-[month]-[day] [hour]:[minute]:[second]"),
    ) {
        return Ok(dt.date());
    }
    if let Ok(d) = Date::parse(
        key,
        format_description!("[month repr:short] [day padding:none], [year]"),
    ) {
        return Ok(d);
    }
    // Month keys resolve to the first of the month.
    if let Ok(d) = Date::parse(&format!("{key}-01"), format_description!("[year]-[month]-[day]")) {
        return Ok(d);
    }
    if let Some((month, year)) = key.split_once(' ') {
        if let Ok(d) = Date::parse(
            &format!("{month} 1, {year}"),
            format_description!("[month repr:short] [day padding:none], [year]"),
        ) {
            return Ok(d);
        }
    }

    Err(BillingError::InvalidDate(key.to_string()))
}

pub fn bucket_start(date: Date, granularity: Granularity) -> Date {
    match granularity {
        Granularity::Day => date,
        Granularity::Month => first_of_month(date),
    }
}

pub fn first_of_month(date: Date) -> Date {
    date.replace_day(1).unwrap_or(date)
}

/// First day of the month `months` before the month containing `date`.
pub fn months_before(date: Date, months: u32) -> Date {
    let index = date.year() * 12 + (date.month() as i32 - 1) - months as i32;
    let year = index.div_euclid(12);
    let month = Month::try_from((index.rem_euclid(12) + 1) as u8).unwrap_or(Month::January);
    Date::from_calendar_date(year, month, 1).unwrap_or(date)
}

/// First day of the month after the one containing `date`.
pub fn next_month(date: Date) -> Option<Date> {
    let (year, month) = match date.month() {
        Month::December => (date.year() + 1, Month::January),
        m => (date.year(), m.next()),
    };
    Date::from_calendar_date(year, month, 1).ok()
}

pub fn next_bucket(date: Date, granularity: Granularity) -> Option<Date> {
    match granularity {
        Granularity::Day => date.next_day(),
        Granularity::Month => next_month(date),
    }
}

/// `YYYY-MM-DD` for days, `YYYY-MM` for months.
pub fn canonical_key(date: Date, granularity: Granularity) -> String {
    match granularity {
        Granularity::Day => format!("{:04}-{:02}-{:02}", date.year(), date.month() as u8, date.day()),
        Granularity::Month => format!("{:04}-{:02}", date.year(), date.month() as u8),
    }
}

pub fn format_key(date: Date, granularity: Granularity, format: OutputFormat) -> Result<String> {
    let formatted = match (format, granularity) {
        (OutputFormat::Canonical, g) => return Ok(canonical_key(date, g)),
        (OutputFormat::Display, Granularity::Day) => {
            date.format(format_description!("[month repr:short] [day padding:none], [year]"))
        }
        (OutputFormat::Display, Granularity::Month) => {
            date.format(format_description!("[month repr:short] [year]"))
        }
    };

    formatted.map_err(|_| BillingError::InvalidDate(date.to_string()))
}
