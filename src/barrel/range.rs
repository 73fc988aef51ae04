use std::fmt;
use std::sync::OnceLock;

use regex::Regex;
use serde::Serialize;

use crate::error::{BoltError, Result};

/// Inclusive id range covered by one barrel
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct BarrelRange {
    pub start: u64,
    pub end: u64,
}

impl BarrelRange {
    pub fn new(start: u64, end: u64) -> Self {
        Self { start, end }
    }

    /// Width-aligned range containing `id`: `[floor(id / w) * w, start + w - 1]`
    pub fn aligned(id: u64, width: u64) -> Self {
        let start = (id / width) * width;
        Self {
            start,
            end: start.saturating_add(width - 1),
        }
    }

    /// First range of a fresh posting index
    pub fn first(width: u64) -> Self {
        Self::new(0, width - 1)
    }

    /// Range of `width` ids directly after this one, if it does not overflow
    pub fn successor(&self, width: u64) -> Option<Self> {
        let start = self.end.checked_add(1)?;
        let end = start.checked_add(width - 1)?;
        Some(Self { start, end })
    }

    pub fn contains(&self, id: u64) -> bool {
        self.start <= id && id <= self.end
    }

    /// `"{start}-{end}.csv"`
    pub fn posting_file_name(&self) -> String {
        format!("{}-{}.csv", self.start, self.end)
    }

    /// `"barrel_{start}_to_{end}.csv"`
    pub fn forward_file_name(&self) -> String {
        format!("barrel_{}_to_{}.csv", self.start, self.end)
    }

    pub fn parse_posting_file_name(name: &str) -> Option<Self> {
        static RE: OnceLock<Regex> = OnceLock::new();
        let re = RE.get_or_init(|| Regex::new(r"^(\d+)-(\d+)\.csv$").expect("valid regex"));
        Self::from_captures(re, name)
    }

    pub fn parse_forward_file_name(name: &str) -> Option<Self> {
        static RE: OnceLock<Regex> = OnceLock::new();
        let re =
            RE.get_or_init(|| Regex::new(r"^barrel_(\d+)_to_(\d+)\.csv$").expect("valid regex"));
        Self::from_captures(re, name)
    }

    fn from_captures(re: &Regex, name: &str) -> Option<Self> {
        let caps = re.captures(name)?;
        let start = caps.get(1)?.as_str().parse().ok()?;
        let end = caps.get(2)?.as_str().parse().ok()?;
        Some(Self { start, end })
    }
}

impl fmt::Display for BarrelRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}]", self.start, self.end)
    }
}

/// Check that sorted ranges start at zero, are well formed, and leave
/// neither gaps nor overlaps.
pub fn validate_contiguous(ranges: &[BarrelRange]) -> Result<()> {
    let Some(first) = ranges.first() else {
        return Ok(());
    };
    if first.start != 0 {
        return Err(BoltError::RangeGap {
            previous: "origin".to_string(),
            next: first.to_string(),
        });
    }
    for range in ranges {
        if range.start > range.end {
            return Err(BoltError::RangeGap {
                previous: range.to_string(),
                next: "inverted bounds".to_string(),
            });
        }
    }
    for pair in ranges.windows(2) {
        let (prev, next) = (pair[0], pair[1]);
        if prev.end.checked_add(1) != Some(next.start) {
            return Err(BoltError::RangeGap {
                previous: prev.to_string(),
                next: next.to_string(),
            });
        }
    }
    Ok(())
}
