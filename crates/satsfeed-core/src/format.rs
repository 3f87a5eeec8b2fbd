//! Display formatting for prices, changes and axis labels.

use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

use crate::clock::EpochMillis;
use crate::Granularity;

/// `$61,235`.
pub fn format_price(value: f64) -> String {
    if !value.is_finite() {
        return String::from("$--");
    }
    format!("{}${}", sign(value), group_thousands(value.abs().round() as u64))
}

/// `$61,234.50`.
pub fn format_price_cents(value: f64) -> String {
    if !value.is_finite() {
        return String::from("$--");
    }
    let cents = (value.abs() * 100.0).round() as u64;
    format!(
        "{}${}.{:02}",
        sign(value),
        group_thousands(cents / 100),
        cents % 100
    )
}

/// Axis label: `$1.2M`, `$61.2k`, `$950`.
pub fn format_short_price(value: f64) -> String {
    if !value.is_finite() {
        return String::from("$--");
    }
    if value >= 1_000_000.0 {
        format!("${:.1}M", value / 1_000_000.0)
    } else if value >= 1_000.0 {
        format!("${:.1}k", value / 1_000.0)
    } else {
        format_price(value)
    }
}

/// `+1.25%` / `-0.40%`.
pub fn format_change(percent: f64) -> String {
    if !percent.is_finite() {
        return String::from("--");
    }
    let sign = if percent >= 0.0 { "+" } else { "" };
    format!("{sign}{percent:.2}%")
}

pub fn format_btc(value: f64) -> String {
    if !value.is_finite() {
        return String::from("0 BTC");
    }
    format!("{value:.6} BTC")
}

/// `Jun 15`.
pub fn format_month_day(time: EpochMillis) -> String {
    datetime(time)
        .map(|dt| format!("{} {}", short_month(dt.month()), dt.day()))
        .unwrap_or_default()
}

/// `Jun 2024`.
pub fn format_month_year(time: EpochMillis) -> String {
    datetime(time)
        .map(|dt| format!("{} {}", short_month(dt.month()), dt.year()))
        .unwrap_or_default()
}

/// `14:05` UTC.
pub fn format_hour_minute(time: EpochMillis) -> String {
    datetime(time)
        .map(|dt| format!("{:02}:{:02}", dt.hour(), dt.minute()))
        .unwrap_or_default()
}

/// Axis label for `time` at the given granularity.
pub fn format_axis_label(time: EpochMillis, granularity: Granularity) -> String {
    match granularity {
        Granularity::Hour => format_hour_minute(time),
        Granularity::Day => format_month_day(time),
        Granularity::Month => format_month_year(time),
        Granularity::Year => datetime(time)
            .map(|dt| dt.year().to_string())
            .unwrap_or_default(),
    }
}

pub fn format_timestamp(time: EpochMillis) -> String {
    datetime(time)
        .and_then(|dt| dt.format(&Rfc3339).ok())
        .unwrap_or_else(|| time.to_string())
}

fn datetime(time: EpochMillis) -> Option<OffsetDateTime> {
    OffsetDateTime::from_unix_timestamp_nanos(i128::from(time) * 1_000_000).ok()
}

fn short_month(month: time::Month) -> &'static str {
    use time::Month::*;
    match month {
        January => "Jan",
        February => "Feb",
        March => "Mar",
        April => "Apr",
        May => "May",
        June => "Jun",
        July => "Jul",
        August => "Aug",
        September => "Sep",
        October => "Oct",
        November => "Nov",
        December => "Dec",
    }
}

fn sign(value: f64) -> &'static str {
    if value < 0.0 {
        "-"
    } else {
        ""
    }
}

fn group_thousands(value: u64) -> String {
    let digits = value.to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (index, digit) in digits.chars().enumerate() {
        if index > 0 && (digits.len() - index) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(digit);
    }
    grouped
}
