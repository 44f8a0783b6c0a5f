//! Recency filter.
//!
//! A candidate is accepted when its date, truncated to a calendar day, lies
//! in the inclusive window `[today - window_days, today]`. Timestamps are
//! truncated in their own offset, i.e. the date a publisher wrote is the
//! date that counts.
//!
//! Sources that carry recency data in their sitemap reject any candidate
//! whose date is missing or unparsable. Sources without a date field
//! (listing pages) accept every candidate.

use crate::config::{DateFormat, RecencyRule};
use crate::models::CandidateUrl;
use chrono::{DateTime, Days, NaiveDate, NaiveDateTime};

/// Parse a recency value into the calendar date it names.
pub fn parse_date(raw: &str, format: DateFormat) -> Option<NaiveDate> {
    let raw = raw.trim();
    match format {
        DateFormat::DateOnly => NaiveDate::parse_from_str(raw, "%Y-%m-%d").ok(),
        DateFormat::Timestamp => DateTime::parse_from_rfc3339(raw)
            .map(|dt| dt.date_naive())
            .or_else(|_| DateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%z").map(|dt| dt.date_naive()))
            .or_else(|_| DateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M%:z").map(|dt| dt.date_naive()))
            .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f").map(|dt| dt.date()))
            .or_else(|_| NaiveDate::parse_from_str(raw, "%Y-%m-%d"))
            .ok(),
    }
}

/// `true` iff `date` lies in `[today - window_days, today]`.
pub fn in_window(date: NaiveDate, today: NaiveDate, window_days: u32) -> bool {
    let earliest = today
        .checked_sub_days(Days::new(u64::from(window_days)))
        .unwrap_or(NaiveDate::MIN);
    date >= earliest && date <= today
}

/// A present language tag must match the target; an absent tag passes.
pub fn language_matches(candidate: &CandidateUrl, target: Option<&str>) -> bool {
    match (target, candidate.language_tag.as_deref()) {
        (Some(target), Some(tag)) => tag.trim().eq_ignore_ascii_case(target),
        _ => true,
    }
}

/// Decide whether `candidate` should be fetched.
pub fn accept(candidate: &CandidateUrl, rule: &RecencyRule, today: NaiveDate) -> bool {
    if !language_matches(candidate, rule.language.as_deref()) {
        return false;
    }
    if rule.field.element_name().is_none() {
        return true;
    }
    candidate
        .recency_value
        .as_deref()
        .and_then(|raw| parse_date(raw, rule.format))
        .is_some_and(|date| in_window(date, today, rule.window_days))
}

/// Keep the candidates [`accept`] admits, preserving order.
pub fn filter(candidates: Vec<CandidateUrl>, rule: &RecencyRule, today: NaiveDate) -> Vec<CandidateUrl> {
    candidates
        .into_iter()
        .filter(|c| accept(c, rule, today))
        .collect()
}

/// Sitemap date rendered for `metadata.articlePublishedOn`, e.g. `"May 10, 2024"`.
pub fn published_label(raw: &str, format: DateFormat) -> Option<String> {
    parse_date(raw, format).map(|d| d.format("%B %d, %Y").to_string())
}
