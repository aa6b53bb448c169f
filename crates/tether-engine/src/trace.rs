//! Conversion path tracking

use std::fmt;

/// Path segments of the value currently being converted.
///
/// Segments are pushed and truncated by the scoped helpers of the encoder
/// and decoder, so the previous length is restored on every exit path.
#[derive(Debug, Default, Clone)]
pub struct Trace {
    segments: Vec<String>,
}

impl Trace {
    /// Create an empty trace
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a segment
    pub fn push(&mut self, segment: impl fmt::Display) {
        self.segments.push(segment.to_string());
    }

    /// Number of segments
    pub fn len(&self) -> usize {
        self.segments.len()
    }

    /// True at the root
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Drop segments past `len`
    pub fn truncate(&mut self, len: usize) {
        self.segments.truncate(len);
    }

    /// Dotted rendering, e.g. `Args.2.Name`
    pub fn render(&self) -> String {
        self.segments.join(".")
    }
}
