// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Shared helpers for date/time formatting and Xero date parsing.

use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, Utc};

/// Format a UTC timestamp as RFC3339 using a `Z` suffix.
pub fn format_utc_rfc3339(date: DateTime<Utc>) -> String {
    date.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Convert epoch milliseconds to a UTC timestamp.
pub fn from_epoch_millis(millis: i64) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp_millis(millis)
}

/// Parse a date as Xero returns it.
///
/// Xero's JSON carries both `DateString` (`2024-01-31T00:00:00`, no offset,
/// organisation-local) and the .NET form `/Date(1706659200000+0000)/`.
/// Plain dates and RFC3339 are accepted too.
pub fn parse_xero_date(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();

    if let Some(inner) = raw
        .strip_prefix("/Date(")
        .and_then(|s| s.strip_suffix(")/"))
    {
        // Offset suffix is informational; the millis are already UTC.
        let millis_end = inner
            .char_indices()
            .skip(1)
            .find(|(_, c)| *c == '+' || *c == '-')
            .map(|(i, _)| i)
            .unwrap_or(inner.len());
        return inner[..millis_end]
            .parse::<i64>()
            .ok()
            .and_then(from_epoch_millis);
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }

    if let Ok(naive) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S") {
        return Some(naive.and_utc());
    }

    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|n| n.and_utc())
}
