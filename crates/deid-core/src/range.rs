//! Folder range parsing: `"S-E"` → the ordered folder numbers `S..=E`.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// Why a range string was rejected. Any of these aborts the run before dispatch.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RangeError {
    #[error("range is empty")]
    Empty,
    #[error("expected START-END, got {0:?}")]
    MissingSeparator(String),
    #[error("{0:?} is not a folder number")]
    NotANumber(String),
    #[error("folder numbers must not be negative")]
    Negative,
    #[error("start {start} is greater than end {end}")]
    Reversed { start: u64, end: u64 },
    #[error("range covers {len} folders, more than the limit of {max}")]
    TooWide { len: u128, max: u64 },
}

/// Closed range of folder numbers `[start, end]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FolderRange {
    start: u64,
    end: u64,
}

impl FolderRange {
    pub fn new(start: u64, end: u64) -> Result<Self, RangeError> {
        if start > end {
            return Err(RangeError::Reversed { start, end });
        }
        Ok(Self { start, end })
    }

    /// Parses `START-END` (surrounding whitespace allowed, both bounds inclusive).
    pub fn parse(input: &str) -> Result<Self, RangeError> {
        let s = input.trim();
        if s.is_empty() {
            return Err(RangeError::Empty);
        }
        if s.starts_with('-') {
            return Err(RangeError::Negative);
        }
        let Some((a, b)) = s.split_once('-') else {
            return Err(RangeError::MissingSeparator(s.to_string()));
        };
        let (a, b) = (a.trim(), b.trim());
        if b.starts_with('-') {
            return Err(RangeError::Negative);
        }
        let start = parse_bound(a)?;
        let end = parse_bound(b)?;
        Self::new(start, end)
    }

    pub fn start(&self) -> u64 {
        self.start
    }

    pub fn end(&self) -> u64 {
        self.end
    }

    /// Number of folders in the range (never zero). `0-u64::MAX` holds 2^64.
    pub fn len(&self) -> u128 {
        u128::from(self.end - self.start) + 1
    }

    /// Rejects ranges holding more than `max` folders.
    pub fn ensure_within(&self, max: u64) -> Result<(), RangeError> {
        let len = self.len();
        if len > u128::from(max) {
            return Err(RangeError::TooWide { len, max });
        }
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        false
    }

    /// Fresh iterator over `start..=end`; every call yields the same sequence.
    pub fn items(&self) -> impl Iterator<Item = u64> {
        self.start..=self.end
    }
}

fn parse_bound(s: &str) -> Result<u64, RangeError> {
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return Err(RangeError::NotANumber(s.to_string()));
    }
    s.parse::<u64>()
        .map_err(|_| RangeError::NotANumber(s.to_string()))
}

impl FromStr for FolderRange {
    type Err = RangeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for FolderRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.start, self.end)
    }
}
