//! Permissive calendar-date parsing
//!
//! Object files are produced by tools that print dates in whatever format
//! their runtime prefers (`Sun Feb 28 2021`, `2021-02-28`, ...), sometimes
//! with a time-of-day tail. Only the calendar day is kept.

use chrono::NaiveDate;

/// Accepted layouts, tried in order
const DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d",
    "%a %b %d %Y",
    "%b %d %Y",
    "%d %b %Y",
    "%B %d %Y",
    "%A %B %d %Y",
    "%m/%d/%Y",
];

/// Longest token prefix considered a date
const MAX_DATE_TOKENS: usize = 4;

/// Parse a calendar day, ignoring any trailing time-of-day tokens
///
/// Returns `None` when no accepted layout matches.
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let text = raw.trim();
    if text.is_empty() {
        return None;
    }

    // 2021-02-28T10:00:00Z
    if let Some(date) = text.get(..10).and_then(|head| NaiveDate::parse_from_str(head, "%Y-%m-%d").ok()) {
        return Some(date);
    }

    let tokens: Vec<&str> = text.split([' ', '\t', ',']).filter(|t| !t.is_empty()).collect();
    // A misstated weekday should not hide an otherwise valid date
    for start in 0..tokens.len().min(2) {
        let rest = &tokens[start..];
        for len in (1..=rest.len().min(MAX_DATE_TOKENS)).rev() {
            let candidate = rest[..len].join(" ");
            if let Some(date) = DATE_FORMATS
                .iter()
                .find_map(|format| NaiveDate::parse_from_str(&candidate, format).ok())
            {
                return Some(date);
            }
        }
    }
    None
}
