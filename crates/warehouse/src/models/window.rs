//! Sync windows for bounded API queries

use chrono::{DateTime, Duration, Utc};
use std::fmt;

use super::timestamp::format_query;

/// A half-open `[start, end)` range of modification times
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl SyncWindow {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }
}

impl fmt::Display for SyncWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {})", format_query(&self.start), format_query(&self.end))
    }
}

/// Split `[watermark, now)` into consecutive windows of at most `step`
///
/// The last window is clamped to `now`. Returns no windows when
/// `watermark >= now`. A non-positive step yields a single window covering
/// the whole range.
pub fn windows(watermark: DateTime<Utc>, now: DateTime<Utc>, step: Duration) -> Vec<SyncWindow> {
    if watermark >= now {
        return Vec::new();
    }

    if step <= Duration::zero() {
        return vec![SyncWindow::new(watermark, now)];
    }

    let mut result = Vec::new();
    let mut start = watermark;
    while start < now {
        let end = (start + step).min(now);
        result.push(SyncWindow::new(start, end));
        start = end;
    }
    result
}
