//! Calendar helpers shared by the resolver, the ledger and the scheduler.
//!
//! Weekdays are always indexed Monday=0..Sunday=6. Any other numbering is
//! converted at the boundary through [`weekday_index`] / [`weekday_from_index`].

use crate::error::AppError;
use time::format_description::BorrowedFormatItem;
use time::macros::format_description;
use time::{Date, Duration, OffsetDateTime, PrimitiveDateTime, Time, UtcOffset, Weekday};

pub const DATE_FORMAT: &[BorrowedFormatItem<'static>] = format_description!("[year]-[month]-[day]");
pub const TIME_FORMAT: &[BorrowedFormatItem<'static>] = format_description!("[hour]:[minute]");

time::serde::format_description!(pub iso_date, Date, "[year]-[month]-[day]");
time::serde::format_description!(pub hour_minute, Time, "[hour]:[minute]");

/// `Option<Time>` as `"HH:MM"`. Reads both a missing key and an explicit
/// `null` as `None`, including inside flattened tagged enums.
pub mod optional_hour_minute {
    use super::TIME_FORMAT;
    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer, Serializer};
    use time::Time;

    pub fn serialize<S: Serializer>(
        value: &Option<Time>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match value {
            Some(time) => super::hour_minute::serialize(time, serializer),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<Time>, D::Error> {
        Option::<String>::deserialize(deserializer)?
            .map(|raw| Time::parse(&raw, TIME_FORMAT).map_err(D::Error::custom))
            .transpose()
    }
}

pub const DAYS_IN_WEEK: u8 = 7;

pub fn weekday_index(date: Date) -> u8 {
    date.weekday().number_days_from_monday()
}

pub fn weekday_from_index(index: u8) -> Option<Weekday> {
    match index {
        0 => Some(Weekday::Monday),
        1 => Some(Weekday::Tuesday),
        2 => Some(Weekday::Wednesday),
        3 => Some(Weekday::Thursday),
        4 => Some(Weekday::Friday),
        5 => Some(Weekday::Saturday),
        6 => Some(Weekday::Sunday),
        _ => None,
    }
}

/// Signed whole days from `from` to `to`.
pub fn days_between(from: Date, to: Date) -> i64 {
    (to - from).whole_days()
}

/// 1-based week number of `date` inside a cycle anchored at `anchor`, or
/// `None` when `date` precedes the anchor.
pub fn week_index(anchor: Date, date: Date) -> Option<i64> {
    let days = days_between(anchor, date);
    if days < 0 {
        return None;
    }
    Some(days.div_euclid(7) + 1)
}

pub fn at_time(date: Date, time: Time, offset: UtcOffset) -> OffsetDateTime {
    PrimitiveDateTime::new(date, time).assume_offset(offset)
}

pub fn local_date(instant: OffsetDateTime, offset: UtcOffset) -> Date {
    instant.to_offset(offset).date()
}

/// The `days` dates ending at `today`, newest first.
pub fn trailing_window(today: Date, days: u32) -> impl Iterator<Item = Date> {
    (0..i64::from(days)).filter_map(move |back| today.checked_sub(Duration::days(back)))
}

pub fn parse_date(raw: &str) -> Result<Date, AppError> {
    Date::parse(raw.trim(), DATE_FORMAT)
        .map_err(|_| AppError::invalid_input("date must be YYYY-MM-DD"))
}

pub fn parse_time_of_day(raw: &str) -> Result<Time, AppError> {
    Time::parse(raw.trim(), TIME_FORMAT).map_err(|_| AppError::invalid_input("time must be HH:MM"))
}

pub fn format_date(date: Date) -> String {
    date.format(DATE_FORMAT)
        .unwrap_or_else(|_| date.to_string())
}

pub fn format_hour_minute(time: Time) -> String {
    time.format(TIME_FORMAT)
        .unwrap_or_else(|_| time.to_string())
}

pub fn format_time_of_day(instant: OffsetDateTime) -> String {
    instant
        .time()
        .format(TIME_FORMAT)
        .unwrap_or_else(|_| instant.time().to_string())
}
