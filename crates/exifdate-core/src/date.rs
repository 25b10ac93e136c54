use std::fmt;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::Serialize;

/// A capture date as inferred from a path or read from EXIF.
/// `time` is `None` for date-only values (folder rules, EXIF fields with a blank time).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct PhotoDate {
    pub date: NaiveDate,
    pub time: Option<NaiveTime>,
}

impl PhotoDate {
    pub fn date_only(date: NaiveDate) -> Self {
        Self { date, time: None }
    }

    pub fn with_time(dt: NaiveDateTime) -> Self {
        Self {
            date: dt.date(),
            time: Some(dt.time()),
        }
    }

    /// Build from raw numeric fields. Returns `None` if any field is out of range
    /// (month 13, Feb 30, hour 24, ...).
    pub fn from_parts(year: i32, month: u32, day: u32, time: Option<(u32, u32, u32)>) -> Option<Self> {
        let date = NaiveDate::from_ymd_opt(year, month, day)?;
        let time = match time {
            Some((h, m, s)) => Some(NaiveTime::from_hms_opt(h, m, s)?),
            None => None,
        };
        Some(Self { date, time })
    }

    /// Date-only values are placed at midnight.
    pub fn to_naive_datetime(&self) -> NaiveDateTime {
        self.date.and_time(self.time.unwrap_or_default())
    }

    /// Whether two dates describe the same capture moment.
    /// When either side has no time, equal calendar dates are enough.
    pub fn same_moment(&self, other: &PhotoDate) -> bool {
        match (self.time, other.time) {
            (Some(a), Some(b)) => self.date == other.date && a == b,
            _ => self.date == other.date,
        }
    }

    /// EXIF `DateTimeOriginal` representation: `YYYY:MM:DD HH:MM:SS`.
    pub fn to_exif_string(&self) -> String {
        self.to_naive_datetime().format("%Y:%m:%d %H:%M:%S").to_string()
    }

    /// Parse an EXIF datetime string. Tolerates `-`, `/`, `\` and `.` as separators
    /// (some cameras write them) and a blank or missing time part.
    pub fn parse_exif(s: &str) -> Option<Self> {
        let cleaned = s
            .trim_matches(|c: char| c == '\0' || c.is_whitespace())
            .replace(['-', '/', '\\', '.'], ":");

        if let Ok(dt) = NaiveDateTime::parse_from_str(&cleaned, "%Y:%m:%d %H:%M:%S") {
            return Some(Self::with_time(dt));
        }

        let date_part = cleaned.split_whitespace().next()?;
        NaiveDate::parse_from_str(date_part, "%Y:%m:%d")
            .ok()
            .map(Self::date_only)
    }

    /// Parse a config literal: `YYYY-MM-DD`, optionally followed by a time.
    pub fn parse_iso(s: &str) -> Option<Self> {
        let s = s.trim();
        if let Ok(d) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
            return Some(Self::date_only(d));
        }
        for fmt in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S"] {
            if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
                return Some(Self::with_time(dt));
            }
        }
        None
    }
}

impl fmt::Display for PhotoDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.time {
            Some(t) => write!(f, "{}T{}", self.date.format("%Y-%m-%d"), t.format("%H:%M:%S")),
            None => write!(f, "{}", self.date.format("%Y-%m-%d")),
        }
    }
}

/// EXIF writes all-blank or zeroed fields for an unknown date.
pub fn is_blank_exif(s: &str) -> bool {
    s.chars()
        .all(|c| c == '\0' || c == ' ' || c == ':' || c == '0')
}
