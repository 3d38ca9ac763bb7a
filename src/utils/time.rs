//! Date utilities for provider range queries

use chrono::{Duration, NaiveDate};

/// Split the inclusive span `start..=end` into consecutive inclusive chunks
/// no longer than `max_days` days each.
///
/// Returns an empty list when `start` is after `end` or `max_days` is zero.
///
/// # Examples
/// ```
/// use chrono::NaiveDate;
/// use download_badges::utils::time::date_chunks;
///
/// let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
/// let end = NaiveDate::from_ymd_opt(2024, 1, 10).unwrap();
/// let chunks = date_chunks(start, end, 4);
/// assert_eq!(chunks.len(), 3);
/// assert_eq!(chunks[0].1, NaiveDate::from_ymd_opt(2024, 1, 4).unwrap());
/// assert_eq!(chunks[2], (NaiveDate::from_ymd_opt(2024, 1, 9).unwrap(), end));
/// ```
pub fn date_chunks(start: NaiveDate, end: NaiveDate, max_days: u32) -> Vec<(NaiveDate, NaiveDate)> {
    let mut chunks = Vec::new();
    if start > end || max_days == 0 {
        return chunks;
    }

    let step = Duration::days(i64::from(max_days));
    let mut chunk_start = start;
    while chunk_start <= end {
        let chunk_end = (chunk_start + step - Duration::days(1)).min(end);
        chunks.push((chunk_start, chunk_end));
        chunk_start = chunk_end + Duration::days(1);
    }
    chunks
}

/// Format a date the way provider range endpoints expect (YYYY-MM-DD)
pub fn iso_date(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}
