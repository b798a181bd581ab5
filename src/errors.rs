//! Error types for the whole crate.
//!
//! Faults discovered while scanning a document are values: they travel the
//! event stream as [`Event::Error`] carrying a [`ParseError`], and the
//! consumer decides whether to tolerate them or halt. Only faults of the
//! pull machinery itself (I/O, invalid UTF-8) surface as [`Error`] through
//! `Result`.
//!
//! [`Event::Error`]: crate::events::Event::Error

use std::collections::BTreeMap;
use std::fmt;
use std::str::Utf8Error;

use crate::position::Position;

/// The result type used throughout this crate.
pub type Result<T> = std::result::Result<T, Error>;

/// An error of the pull machinery: the stream could not be read at all.
#[derive(Debug)]
pub enum Error {
    /// I/O error from the underlying byte source.
    Io(::std::io::Error),
    /// The input is not valid UTF-8.
    Utf8(Utf8Error),
    /// A document fault, promoted out of the event stream by an API that
    /// returns `Result` instead of emitting inline `Error` events.
    Parse(ParseError),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Io(e) => write!(f, "I/O error: {}", e),
            Error::Utf8(e) => write!(f, "UTF8 error: {}", e),
            Error::Parse(e) => e.fmt(f),
        }
    }
}

impl ::std::error::Error for Error {
    fn source(&self) -> Option<&(dyn ::std::error::Error + 'static)> {
        match self {
            Error::Io(e) => Some(e),
            Error::Utf8(e) => Some(e),
            Error::Parse(_) => None,
        }
    }
}

impl From<::std::io::Error> for Error {
    #[inline]
    fn from(error: ::std::io::Error) -> Error {
        Error::Io(error)
    }
}

impl From<Utf8Error> for Error {
    #[inline]
    fn from(error: Utf8Error) -> Error {
        Error::Utf8(error)
    }
}

impl From<ParseError> for Error {
    #[inline]
    fn from(error: ParseError) -> Error {
        Error::Parse(error)
    }
}

/// The closed set of document fault kinds.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ErrorKind {
    /// A fault with no more specific kind (bad entity declarations,
    /// expansion limits, reference cycles and similar).
    ParseError,
    /// A closing tag does not match the innermost open element.
    TagMismatch,
    /// A closing tag with no element open.
    UnexpectedClose,
    /// The same attribute name appears twice on one element.
    DuplicateAttr,
    /// A character that is not allowed where it appeared.
    InvalidCharacter,
    /// A name begins with a character that is not a NameStartChar.
    InvalidNameStart,
    /// A namespace prefix is used without an in-scope declaration.
    UndeclaredNamespace,
    /// An element was still open at end of input.
    UnclosedTag,
    /// A CDATA section without its `]]>`.
    UnclosedCdata,
    /// A comment without its `-->`.
    UnclosedComment,
    /// A processing instruction without its `?>`.
    UnclosedProcessingInstruction,
    /// An attribute name without `= value`.
    MissingAttrValue,
    /// An attribute value not delimited by `'` or `"`.
    InvalidQuote,
    /// Chunked input exceeded the implementation's working-buffer limit.
    BufferOverflow,
    /// The underlying byte source failed.
    StreamError,
}

impl ErrorKind {
    /// `true` when the stream cannot meaningfully continue past this fault.
    pub fn is_fatal(self) -> bool {
        matches!(
            self,
            ErrorKind::UnclosedCdata
                | ErrorKind::UnclosedComment
                | ErrorKind::UnclosedProcessingInstruction
                | ErrorKind::BufferOverflow
                | ErrorKind::StreamError
        )
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::ParseError => "parse error",
            ErrorKind::TagMismatch => "tag mismatch",
            ErrorKind::UnexpectedClose => "unexpected closing tag",
            ErrorKind::DuplicateAttr => "duplicate attribute",
            ErrorKind::InvalidCharacter => "invalid character",
            ErrorKind::InvalidNameStart => "invalid name start character",
            ErrorKind::UndeclaredNamespace => "undeclared namespace prefix",
            ErrorKind::UnclosedTag => "unclosed tag",
            ErrorKind::UnclosedCdata => "unclosed CDATA section",
            ErrorKind::UnclosedComment => "unclosed comment",
            ErrorKind::UnclosedProcessingInstruction => "unclosed processing instruction",
            ErrorKind::MissingAttrValue => "missing attribute value",
            ErrorKind::InvalidQuote => "invalid attribute value delimiter",
            ErrorKind::BufferOverflow => "working buffer limit exceeded",
            ErrorKind::StreamError => "stream error",
        };
        f.write_str(name)
    }
}

/// A document fault: kind, message, position and structured context.
///
/// The context map carries machine-readable details, e.g. `expected` and
/// `got` for a [`TagMismatch`](ErrorKind::TagMismatch).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ParseError {
    kind: ErrorKind,
    message: String,
    position: Position,
    context: BTreeMap<&'static str, String>,
}

impl ParseError {
    pub fn new(kind: ErrorKind, message: impl Into<String>, position: Position) -> Self {
        Self {
            kind,
            message: message.into(),
            position,
            context: BTreeMap::new(),
        }
    }

    /// Attach a context entry, builder style.
    pub fn with(mut self, key: &'static str, value: impl Into<String>) -> Self {
        self.context.insert(key, value.into());
        self
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn position(&self) -> Position {
        self.position
    }

    pub fn context(&self) -> &BTreeMap<&'static str, String> {
        &self.context
    }

    /// Shorthand for a context lookup.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.context.get(key).map(String::as_str)
    }

    pub fn is_fatal(&self) -> bool {
        self.kind.is_fatal()
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}: {}", self.position, self.kind, self.message)
    }
}

impl ::std::error::Error for ParseError {}

/// Renders a window of the source around `position`: up to three lines of
/// context on either side, with a `^` caret under the offending column.
///
/// The caller supplies the original source text; the engine itself never
/// retains it.
pub fn format_context(source: &str, position: Position) -> String {
    let line = position.line.max(1) as usize;
    let column = position.column() as usize;
    let first = line.saturating_sub(3).max(1);
    let width = digits(line + 3);

    let mut out = String::new();
    for (i, text) in source.lines().enumerate().skip(first - 1).take(7) {
        let number = i + 1;
        out.push_str(&format!("{:>width$} | {}\n", number, text, width = width));
        if number == line {
            out.push_str(&format!(
                "{:>width$} | {}^\n",
                "",
                " ".repeat(column),
                width = width
            ));
        }
    }
    out
}

fn digits(mut n: usize) -> usize {
    let mut count = 1;
    while n >= 10 {
        n /= 10;
        count += 1;
    }
    count
}
