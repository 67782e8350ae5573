// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Shared helpers for date/time formatting and relative ranges.

use std::str::FromStr;

use chrono::{DateTime, Duration, Months, SecondsFormat, Utc};

/// Format a UTC timestamp as RFC3339 using a `Z` suffix.
pub fn format_utc_rfc3339(date: DateTime<Utc>) -> String {
    date.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Parse an RFC3339 timestamp into UTC.
pub fn parse_utc_rfc3339(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Relative date ranges offered by the audit log view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateRangePreset {
    /// Since midnight UTC
    Today,
    /// Last 7 days
    Week,
    /// Same time one calendar month ago
    Month,
}

impl DateRangePreset {
    /// Start of the range ending at `now`.
    pub fn start(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        match self {
            DateRangePreset::Today => now
                .date_naive()
                .and_hms_opt(0, 0, 0)
                .map(|midnight| midnight.and_utc())
                .unwrap_or(now),
            DateRangePreset::Week => now - Duration::days(7),
            DateRangePreset::Month => now
                .checked_sub_months(Months::new(1))
                .unwrap_or(now - Duration::days(30)),
        }
    }
}

impl FromStr for DateRangePreset {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "today" => Ok(DateRangePreset::Today),
            "week" => Ok(DateRangePreset::Week),
            "month" => Ok(DateRangePreset::Month),
            other => Err(format!("unknown date range: {other}")),
        }
    }
}
