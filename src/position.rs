//! Source positions and incremental position tracking.

use std::fmt;

/// A location in the source document.
///
/// Lines are 1-based. The column is derived, not stored: it is the number
/// of bytes between the start of the line and the position itself, so the
/// first character of a line is at column 0.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Default, Hash)]
pub struct Position {
    /// 1-based line number. Zero when position tracking is disabled.
    pub line: u64,
    /// Byte offset of the first byte of the current line.
    pub line_start: u64,
    /// Absolute byte offset from the start of the document.
    pub absolute: u64,
}

impl Position {
    /// The start of a document: line 1, offset 0.
    pub const START: Position = Position {
        line: 1,
        line_start: 0,
        absolute: 0,
    };

    /// 0-based column, derived from the offsets.
    #[inline]
    pub fn column(&self) -> u64 {
        self.absolute - self.line_start
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column())
    }
}

/// How much position information the reader records on events.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PositionMode {
    /// Track line, line start and absolute offset (the default).
    Full,
    /// Track the line number only; offsets stay zero.
    LineOnly,
    /// Attach a zero position to every event.
    None,
}

impl Default for PositionMode {
    fn default() -> Self {
        PositionMode::Full
    }
}

/// Tracks the current position while the reader consumes bytes.
///
/// Every byte the source consumes is fed through [`advance`], including
/// delimiters that never show up in an event payload, so the absolute
/// offset always equals the number of bytes consumed so far.
///
/// [`advance`]: PositionTracker::advance
#[derive(Clone, Debug)]
pub(crate) struct PositionTracker {
    mode: PositionMode,
    line: u64,
    line_start: u64,
    absolute: u64,
}

impl PositionTracker {
    pub(crate) fn new(mode: PositionMode) -> Self {
        Self {
            mode,
            line: 1,
            line_start: 0,
            absolute: 0,
        }
    }

    /// Advance over a consumed chunk, counting newlines.
    pub(crate) fn advance(&mut self, bytes: &[u8]) {
        if let PositionMode::None = self.mode {
            self.absolute += bytes.len() as u64;
            return;
        }
        if let Some(last) = memchr::memrchr(b'\n', bytes) {
            self.line += memchr::memchr_iter(b'\n', bytes).count() as u64;
            self.line_start = self.absolute + last as u64 + 1;
        }
        self.absolute += bytes.len() as u64;
    }

    /// The position of the next unconsumed byte.
    pub(crate) fn position(&self) -> Position {
        match self.mode {
            PositionMode::Full => Position {
                line: self.line,
                line_start: self.line_start,
                absolute: self.absolute,
            },
            PositionMode::LineOnly => Position {
                line: self.line,
                line_start: 0,
                absolute: 0,
            },
            PositionMode::None => Position::default(),
        }
    }

    /// Absolute byte offset consumed so far, regardless of mode.
    pub(crate) fn absolute(&self) -> u64 {
        self.absolute
    }
}
