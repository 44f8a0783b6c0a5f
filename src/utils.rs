//! Small formatting helpers shared by the pipeline and its logging.
//!
//! - Date labels for `metadata.articlePublishedOn`
//! - Clock labels for the per-pipeline totals log
//! - String truncation for log fields

use chrono::{DateTime, Local, NaiveDate};

/// Render the extraction date for `metadata.articlePublishedOn`.
///
/// # Examples
///
/// ```ignore
/// assert_eq!(extraction_date_label(NaiveDate::from_ymd_opt(2024, 5, 9).unwrap()), "09 May, 2024");
/// ```
pub fn extraction_date_label(date: NaiveDate) -> String {
    date.format("%d %B, %Y").to_string()
}

/// Split a local instant into `("YYYY-MM-DD", "HH:MM:SS")`.
pub fn clock_labels(now: DateTime<Local>) -> (String, String) {
    (
        now.format("%Y-%m-%d").to_string(),
        now.format("%H:%M:%S").to_string(),
    )
}

/// Truncate a string for logging purposes.
///
/// Long strings are cut to at most `max` bytes, on a character boundary,
/// with an ellipsis and the dropped byte count appended.
///
/// # Arguments
///
/// * `s` - The string to potentially truncate
/// * `max` - Maximum number of bytes to keep
///
/// # Returns
///
/// The original string if it fits, otherwise a truncated version with
/// `"…(+N bytes)"` appended.
pub fn truncate_for_log(s: &str, max: usize) -> String {
    if s.len() <= max {
        return s.to_string();
    }
    let mut cut = max;
    while !s.is_char_boundary(cut) {
        cut -= 1;
    }
    format!("{}…(+{} bytes)", &s[..cut], s.len() - cut)
}
