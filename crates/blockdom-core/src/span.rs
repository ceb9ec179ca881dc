//! Byte ranges into the raw markup text.
//!
//! Every element and text node produced by [`crate::markup::parse_fragment`]
//! remembers where it came from, so a flattening failure can point at the
//! offending element instead of just naming it.

use std::fmt;
use std::ops::Range;

/// A `[start, end)` byte range in the markup passed to the supplier.
///
/// Nodes built by hand (rather than parsed) carry the empty default span.
///
/// # Example
///
/// ```rust
/// use blockdom_core::span::Span;
///
/// let span = Span::new(4, 10);
/// assert_eq!(span.len(), 6);
/// assert!(span.contains(4));
/// assert!(!span.contains(10));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Span {
    /// Starting byte offset (inclusive).
    pub start: u32,
    /// Ending byte offset (exclusive).
    pub end: u32,
}

impl Span {
    #[inline]
    pub const fn new(start: u32, end: u32) -> Self {
        Self { start, end }
    }

    /// Build a span from a `usize` range, saturating offsets that do not
    /// fit in 32 bits.
    #[inline]
    pub fn from_range(range: Range<usize>) -> Self {
        let clamp = |offset: usize| u32::try_from(offset).unwrap_or(u32::MAX);
        Self::new(clamp(range.start), clamp(range.end))
    }

    #[inline]
    pub const fn len(&self) -> u32 {
        self.end.saturating_sub(self.start)
    }

    #[inline]
    pub const fn is_empty(&self) -> bool {
        self.start >= self.end
    }

    #[inline]
    pub const fn contains(&self, offset: u32) -> bool {
        offset >= self.start && offset < self.end
    }

    /// The covered slice of `source`, if the span lies on char boundaries
    /// inside it.
    pub fn slice<'a>(&self, source: &'a str) -> Option<&'a str> {
        source.get(self.start as usize..self.end as usize)
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "bytes {}..{}", self.start, self.end)
    }
}
