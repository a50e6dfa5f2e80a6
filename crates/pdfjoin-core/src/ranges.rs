//! Section page ranges
//!
//! A section range is either `"n"` or `"a-b"`, 1-based and inclusive.
//! Ranges are clamped to the document instead of rejected: a range that
//! starts past the last page, or runs backwards, selects nothing.

use std::fmt;
use std::ops::RangeInclusive;

use crate::error::PdfJoinError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRange {
    pub start: u32,
    pub end: u32,
}

impl PageRange {
    pub fn parse(input: &str) -> Result<Self, PdfJoinError> {
        let input = input.trim();
        match input.split_once('-') {
            Some((start, end)) => Ok(Self {
                start: parse_page(start)?,
                end: parse_page(end)?,
            }),
            None => {
                let page = parse_page(input)?;
                Ok(Self {
                    start: page,
                    end: page,
                })
            }
        }
    }

    /// 1-based pages to keep from a document with `total_pages` pages.
    ///
    /// Both bounds are pulled into `[1, total_pages]`. Returns `None` when the
    /// document is empty, the range starts after the last page, or the range
    /// is reversed.
    pub fn clamp(&self, total_pages: u32) -> Option<RangeInclusive<u32>> {
        if total_pages == 0 || self.start > total_pages || self.start > self.end {
            return None;
        }
        let start = self.start.clamp(1, total_pages);
        let end = self.end.clamp(1, total_pages);
        Some(start..=end)
    }

    /// True when clamping changes which pages the range asks for
    pub fn exceeds(&self, total_pages: u32) -> bool {
        self.start == 0 || self.end > total_pages
    }
}

impl fmt::Display for PageRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.start == self.end {
            write!(f, "{}", self.start)
        } else {
            write!(f, "{}-{}", self.start, self.end)
        }
    }
}

/// Page numbers too large for u32 saturate so clamping still applies
fn parse_page(part: &str) -> Result<u32, PdfJoinError> {
    let part = part.trim();
    match part.parse() {
        Ok(page) => Ok(page),
        Err(_) if !part.is_empty() && part.bytes().all(|b| b.is_ascii_digit()) => Ok(u32::MAX),
        Err(_) => Err(PdfJoinError::InvalidRange(format!("Invalid page: {}", part))),
    }
}
