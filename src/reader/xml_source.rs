//! Module for the [`XmlSource`] trait.

use std::io::{self, BufRead};

use crate::errors::{Error, ErrorKind, ParseError, Result};
use crate::position::PositionTracker;

/// Upper bound on a single indivisible token in chunked mode. A start tag,
/// comment, CDATA section or text run larger than this aborts the parse
/// with a [`BufferOverflow`](ErrorKind::BufferOverflow).
pub(crate) const MAX_TOKEN_BYTES: usize = 1 << 30;

/// Represents an input for a reader that can return borrowed data.
///
/// There are two implementors of this trait: a generic one that reads data
/// from `Self`, copies it into a provided buffer of type `B` and returns
/// data borrowing from that buffer, and one for `&[u8]` that returns
/// slices of the input itself without copying.
///
/// Every byte consumed, payload and delimiters alike, is fed through the
/// [`PositionTracker`], so the tracker's absolute offset always equals the
/// number of bytes taken from the input.
///
/// # Parameters
/// - `'r`: lifetime of a buffer from which scanned bytes are borrowed
/// - `B`: type of the working buffer (`&mut Vec<u8>` or `()`)
pub(crate) trait XmlSource<'r, B> {
    /// Read input until `byte` is found or the input ends.
    ///
    /// Returns the bytes before `byte` and whether the delimiter was
    /// actually found (and consumed). `Ok(None)` means the input was
    /// already exhausted.
    fn read_bytes_until(
        &mut self,
        byte: u8,
        buf: B,
        tracker: &mut PositionTracker,
    ) -> Result<Option<(&'r [u8], bool)>>;

    /// Read a construct opened by `<!`: a comment, CDATA section or
    /// DOCTYPE declaration. Expects the `!` to be the next unconsumed
    /// byte. Returns the bytes from the `!` up to (not including) the
    /// terminating `>`, which is consumed.
    ///
    /// An unterminated construct is a fatal error; an unrecognized one
    /// (`<!x`) is a recoverable error and the caller resynchronizes.
    fn read_bang_element(
        &mut self,
        buf: B,
        tracker: &mut PositionTracker,
    ) -> Result<(BangKind, &'r [u8])>;

    /// Read a start tag after `<`: everything up to the matching `>`,
    /// honoring quoted attribute values. The `>` is consumed and excluded.
    fn read_element(&mut self, buf: B, tracker: &mut PositionTracker) -> Result<&'r [u8]>;

    /// Read a processing instruction after `<`: everything up to `?>`.
    /// The final `>` is consumed; the returned bytes end with the `?`.
    fn read_pi(&mut self, buf: B, tracker: &mut PositionTracker) -> Result<&'r [u8]>;

    /// Consume and discard one byte if it matches. Returns whether it did.
    fn skip_one(&mut self, byte: u8, tracker: &mut PositionTracker) -> Result<bool>;

    /// Return the next byte without consuming it, `None` on end of input.
    fn peek_one(&mut self) -> Result<Option<u8>>;

    /// Consume a UTF-8 byte-order mark if the input starts with one.
    fn skip_bom(&mut self, tracker: &mut PositionTracker) -> Result<()>;

    /// Discard input up to (not including) the next `<`. Used to
    /// resynchronize after a recoverable scanning error.
    fn skip_to_markup(&mut self, tracker: &mut PositionTracker) -> Result<()>;
}

/// The three constructs a `<!` may open.
#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) enum BangKind {
    /// `<!--...-->`
    Comment,
    /// `<![CDATA[...]]>`
    CData,
    /// `<!DOCTYPE...>`
    Doctype,
}

impl BangKind {
    fn classify(byte: Option<u8>, tracker: &PositionTracker) -> Result<Self> {
        match byte {
            Some(b'-') => Ok(BangKind::Comment),
            Some(b'[') => Ok(BangKind::CData),
            Some(b'D') | Some(b'd') => Ok(BangKind::Doctype),
            Some(b) => Err(Error::Parse(ParseError::new(
                ErrorKind::ParseError,
                format!("Unexpected markup declaration <!{}", b as char),
                tracker.position(),
            ))),
            None => Err(Error::Parse(ParseError::new(
                ErrorKind::UnclosedTag,
                "Unexpected end of input after <!",
                tracker.position(),
            ))),
        }
    }

    fn unclosed(self, tracker: &PositionTracker) -> Error {
        let (kind, what) = match self {
            BangKind::Comment => (ErrorKind::UnclosedComment, "comment"),
            BangKind::CData => (ErrorKind::UnclosedCdata, "CDATA section"),
            BangKind::Doctype => (ErrorKind::UnclosedTag, "DOCTYPE declaration"),
        };
        Error::Parse(ParseError::new(
            kind,
            format!("Unexpected end of input inside {}", what),
            tracker.position(),
        ))
    }
}

/// Outcome of feeding one chunk to a construct scanner.
enum Scan {
    /// Terminator found; index of the final byte within the chunk.
    Done(usize),
    /// The construct cannot be what its opener claimed; index of the
    /// offending byte.
    Invalid(usize),
    /// Need more input.
    More,
}

/// Incremental scanner for `<!` constructs. Keeps its own state so a
/// terminator split across chunk boundaries is still found.
struct BangScan {
    prefix: &'static [u8],
    matched: usize,
    state: BangState,
}

enum BangState {
    /// Consecutive `-` seen while looking for `-->`.
    Comment { dashes: u8 },
    /// Consecutive `]` seen while looking for `]]>`.
    CData { brackets: u8 },
    Doctype(DoctypeScan),
}

/// Tracks nesting inside a DOCTYPE declaration: quoted strings, nested
/// `<...>` markup declarations and `<!-- -->` comments all hide `>` from
/// the terminator search. The nested-bracket grammar is why this is a
/// hand-written machine and not a pattern.
struct DoctypeScan {
    depth: u32,
    quote: Option<u8>,
    arm: MarkupArm,
    in_comment: bool,
    dashes: u8,
}

/// Progress through a potential `<!--` opener.
#[derive(Clone, Copy, PartialEq)]
enum MarkupArm {
    None,
    Lt,
    LtBang,
    LtBangDash,
}

impl BangScan {
    fn new(kind: BangKind) -> Self {
        let (prefix, state) = match kind {
            BangKind::Comment => (&b"!--"[..], BangState::Comment { dashes: 0 }),
            BangKind::CData => (&b"![CDATA["[..], BangState::CData { brackets: 0 }),
            BangKind::Doctype => (
                &b"!DOCTYPE"[..],
                BangState::Doctype(DoctypeScan {
                    depth: 0,
                    quote: None,
                    arm: MarkupArm::None,
                    in_comment: false,
                    dashes: 0,
                }),
            ),
        };
        Self {
            prefix,
            matched: 0,
            state,
        }
    }

    fn step(&mut self, chunk: &[u8]) -> Scan {
        for (i, &b) in chunk.iter().enumerate() {
            if self.matched < self.prefix.len() {
                let expected = self.prefix[self.matched];
                // The DOCTYPE keyword may be lowercased.
                if b != expected && b.to_ascii_uppercase() != expected {
                    return Scan::Invalid(i);
                }
                self.matched += 1;
                continue;
            }
            match &mut self.state {
                BangState::Comment { dashes } => {
                    if b == b'-' {
                        *dashes = (*dashes + 1).min(2);
                    } else if b == b'>' && *dashes >= 2 {
                        return Scan::Done(i);
                    } else {
                        *dashes = 0;
                    }
                }
                BangState::CData { brackets } => {
                    if b == b']' {
                        *brackets = (*brackets + 1).min(2);
                    } else if b == b'>' && *brackets >= 2 {
                        return Scan::Done(i);
                    } else {
                        *brackets = 0;
                    }
                }
                BangState::Doctype(scan) => {
                    if scan.feed(b) {
                        return Scan::Done(i);
                    }
                }
            }
        }
        Scan::More
    }
}

impl DoctypeScan {
    /// Returns `true` when `b` is the `>` that closes the declaration.
    fn feed(&mut self, b: u8) -> bool {
        if self.in_comment {
            if b == b'-' {
                self.dashes = (self.dashes + 1).min(2);
            } else {
                if b == b'>' && self.dashes >= 2 {
                    self.in_comment = false;
                }
                self.dashes = 0;
            }
            return false;
        }
        if let Some(q) = self.quote {
            if b == q {
                self.quote = None;
            }
            return false;
        }
        match b {
            b'"' | b'\'' => {
                self.quote = Some(b);
                self.arm = MarkupArm::None;
            }
            b'<' => {
                self.depth += 1;
                self.arm = MarkupArm::Lt;
            }
            b'!' if self.arm == MarkupArm::Lt => self.arm = MarkupArm::LtBang,
            b'-' if self.arm == MarkupArm::LtBang => self.arm = MarkupArm::LtBangDash,
            b'-' if self.arm == MarkupArm::LtBangDash => {
                // `<!--`: the opener does not count as a declaration.
                self.in_comment = true;
                self.dashes = 0;
                self.arm = MarkupArm::None;
                self.depth -= 1;
            }
            b'>' => {
                self.arm = MarkupArm::None;
                if self.depth == 0 {
                    return true;
                }
                self.depth -= 1;
            }
            _ => self.arm = MarkupArm::None,
        }
        false
    }
}

/// State machine for [`XmlSource::read_element`]: `>` only terminates the
/// tag while outside an attribute value.
#[derive(Clone, Copy)]
enum ReadElementState {
    /// Inside the element but outside of an attribute value.
    Elem,
    /// Inside a single-quoted attribute value.
    SingleQ,
    /// Inside a double-quoted attribute value.
    DoubleQ,
}

impl ReadElementState {
    /// Returns the index of the closing `>` within `chunk`, if present.
    #[inline(always)]
    fn change(&mut self, chunk: &[u8]) -> Option<usize> {
        for i in memchr::memchr3_iter(b'>', b'\'', b'"', chunk) {
            *self = match (*self, chunk[i]) {
                (Self::Elem, b'>') => return Some(i),
                (Self::Elem, b'\'') => Self::SingleQ,
                (Self::Elem, b'"') => Self::DoubleQ,
                (Self::SingleQ, b'\'') | (Self::DoubleQ, b'"') => Self::Elem,
                _ => *self,
            };
        }
        None
    }
}

/// Scanner for the `?>` that closes a processing instruction.
struct PiScan {
    question: bool,
}

impl PiScan {
    fn step(&mut self, chunk: &[u8]) -> Option<usize> {
        for (i, &b) in chunk.iter().enumerate() {
            if b == b'>' && self.question {
                return Some(i);
            }
            self.question = b == b'?';
        }
        None
    }
}

fn overflow(tracker: &PositionTracker) -> Error {
    Error::Parse(ParseError::new(
        ErrorKind::BufferOverflow,
        "Token exceeds the working buffer limit",
        tracker.position(),
    ))
}

/// Implementation of `XmlSource` for any `BufRead` reader using a
/// caller-provided `Vec<u8>` as working buffer. This is the chunked mode:
/// a partial token is held in the buffer until enough input arrives.
impl<'b, R: BufRead> XmlSource<'b, &'b mut Vec<u8>> for R {
    fn read_bytes_until(
        &mut self,
        byte: u8,
        buf: &'b mut Vec<u8>,
        tracker: &mut PositionTracker,
    ) -> Result<Option<(&'b [u8], bool)>> {
        let start = buf.len();
        let mut read = 0usize;
        let mut found = false;
        while !found {
            let used = {
                let available = match self.fill_buf() {
                    Ok(n) if n.is_empty() => break,
                    Ok(n) => n,
                    Err(ref e) if e.kind() == io::ErrorKind::Interrupted => continue,
                    Err(e) => return Err(Error::Io(e)),
                };
                match memchr::memchr(byte, available) {
                    Some(i) => {
                        buf.extend_from_slice(&available[..i]);
                        tracker.advance(&available[..=i]);
                        found = true;
                        i + 1
                    }
                    None => {
                        buf.extend_from_slice(available);
                        tracker.advance(available);
                        available.len()
                    }
                }
            };
            self.consume(used);
            read += used;
            if buf.len() > MAX_TOKEN_BYTES {
                return Err(overflow(tracker));
            }
        }
        if read == 0 {
            Ok(None)
        } else {
            Ok(Some((&buf[start..], found)))
        }
    }

    fn read_bang_element(
        &mut self,
        buf: &'b mut Vec<u8>,
        tracker: &mut PositionTracker,
    ) -> Result<(BangKind, &'b [u8])> {
        // The caller peeked the '!' before calling.
        let start = buf.len();
        buf.push(b'!');
        self.consume(1);
        tracker.advance(b"!");

        let kind = BangKind::classify(self.peek_one()?, tracker)?;
        let mut scan = BangScan::new(kind);
        loop {
            let (outcome, used) = {
                let available = match self.fill_buf() {
                    Ok(n) if n.is_empty() => return Err(kind.unclosed(tracker)),
                    Ok(n) => n,
                    Err(ref e) if e.kind() == io::ErrorKind::Interrupted => continue,
                    Err(e) => return Err(Error::Io(e)),
                };
                match scan.step(available) {
                    Scan::Done(i) => {
                        buf.extend_from_slice(&available[..i]);
                        tracker.advance(&available[..=i]);
                        (Scan::Done(i), i + 1)
                    }
                    Scan::Invalid(i) => {
                        tracker.advance(&available[..=i]);
                        (Scan::Invalid(i), i + 1)
                    }
                    Scan::More => {
                        buf.extend_from_slice(available);
                        tracker.advance(available);
                        (Scan::More, available.len())
                    }
                }
            };
            self.consume(used);
            if buf.len() > MAX_TOKEN_BYTES {
                return Err(overflow(tracker));
            }
            match outcome {
                Scan::Done(_) => break,
                Scan::Invalid(_) => {
                    return Err(Error::Parse(ParseError::new(
                        ErrorKind::ParseError,
                        "Unexpected markup declaration",
                        tracker.position(),
                    )))
                }
                Scan::More => {}
            }
        }
        Ok((kind, &buf[start..]))
    }

    fn read_element(
        &mut self,
        buf: &'b mut Vec<u8>,
        tracker: &mut PositionTracker,
    ) -> Result<&'b [u8]> {
        let start = buf.len();
        let mut state = ReadElementState::Elem;
        loop {
            let (done, used) = {
                let available = match self.fill_buf() {
                    Ok(n) if n.is_empty() => {
                        return Err(Error::Parse(ParseError::new(
                            ErrorKind::UnclosedTag,
                            "Unexpected end of input inside tag",
                            tracker.position(),
                        )))
                    }
                    Ok(n) => n,
                    Err(ref e) if e.kind() == io::ErrorKind::Interrupted => continue,
                    Err(e) => return Err(Error::Io(e)),
                };
                match state.change(available) {
                    Some(i) => {
                        buf.extend_from_slice(&available[..i]);
                        tracker.advance(&available[..=i]);
                        (true, i + 1)
                    }
                    None => {
                        buf.extend_from_slice(available);
                        tracker.advance(available);
                        (false, available.len())
                    }
                }
            };
            self.consume(used);
            if buf.len() > MAX_TOKEN_BYTES {
                return Err(overflow(tracker));
            }
            if done {
                return Ok(&buf[start..]);
            }
        }
    }

    fn read_pi(&mut self, buf: &'b mut Vec<u8>, tracker: &mut PositionTracker) -> Result<&'b [u8]> {
        let start = buf.len();
        let mut scan = PiScan { question: false };
        loop {
            let (done, used) = {
                let available = match self.fill_buf() {
                    Ok(n) if n.is_empty() => {
                        return Err(Error::Parse(ParseError::new(
                            ErrorKind::UnclosedProcessingInstruction,
                            "Unexpected end of input inside processing instruction",
                            tracker.position(),
                        )))
                    }
                    Ok(n) => n,
                    Err(ref e) if e.kind() == io::ErrorKind::Interrupted => continue,
                    Err(e) => return Err(Error::Io(e)),
                };
                match scan.step(available) {
                    Some(i) => {
                        buf.extend_from_slice(&available[..i]);
                        tracker.advance(&available[..=i]);
                        (true, i + 1)
                    }
                    None => {
                        buf.extend_from_slice(available);
                        tracker.advance(available);
                        (false, available.len())
                    }
                }
            };
            self.consume(used);
            if buf.len() > MAX_TOKEN_BYTES {
                return Err(overflow(tracker));
            }
            if done {
                return Ok(&buf[start..]);
            }
        }
    }

    fn skip_one(&mut self, byte: u8, tracker: &mut PositionTracker) -> Result<bool> {
        match self.peek_one()? {
            Some(b) if b == byte => {
                self.consume(1);
                tracker.advance(&[byte]);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    fn peek_one(&mut self) -> Result<Option<u8>> {
        loop {
            break match self.fill_buf() {
                Ok(n) if n.is_empty() => Ok(None),
                Ok(n) => Ok(Some(n[0])),
                Err(ref e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => Err(Error::Io(e)),
            };
        }
    }

    fn skip_bom(&mut self, tracker: &mut PositionTracker) -> Result<()> {
        // 0xEF at offset zero can only open a BOM in a well-formed
        // document, so committing byte by byte is safe.
        if self.skip_one(0xEF, tracker)? {
            self.skip_one(0xBB, tracker)?;
            self.skip_one(0xBF, tracker)?;
        }
        Ok(())
    }

    fn skip_to_markup(&mut self, tracker: &mut PositionTracker) -> Result<()> {
        loop {
            let (done, used) = {
                let available = match self.fill_buf() {
                    Ok(n) if n.is_empty() => return Ok(()),
                    Ok(n) => n,
                    Err(ref e) if e.kind() == io::ErrorKind::Interrupted => continue,
                    Err(e) => return Err(Error::Io(e)),
                };
                match memchr::memchr(b'<', available) {
                    Some(i) => {
                        tracker.advance(&available[..i]);
                        (true, i)
                    }
                    None => {
                        tracker.advance(available);
                        (false, available.len())
                    }
                }
            };
            self.consume(used);
            if done {
                return Ok(());
            }
        }
    }
}

/// Implementation of `XmlSource` for `&[u8]`: scanned bytes borrow from
/// the input itself, no copies.
impl<'a> XmlSource<'a, ()> for &'a [u8] {
    fn read_bytes_until(
        &mut self,
        byte: u8,
        _buf: (),
        tracker: &mut PositionTracker,
    ) -> Result<Option<(&'a [u8], bool)>> {
        if self.is_empty() {
            return Ok(None);
        }
        Ok(Some(match memchr::memchr(byte, self) {
            Some(i) => {
                let bytes = &self[..i];
                tracker.advance(&self[..=i]);
                *self = &self[i + 1..];
                (bytes, true)
            }
            None => {
                let bytes = &self[..];
                tracker.advance(bytes);
                *self = &[];
                (bytes, false)
            }
        }))
    }

    fn read_bang_element(
        &mut self,
        _buf: (),
        tracker: &mut PositionTracker,
    ) -> Result<(BangKind, &'a [u8])> {
        debug_assert_eq!(self.first(), Some(&b'!'));
        let full = *self;
        tracker.advance(b"!");
        *self = &self[1..];

        let kind = BangKind::classify(self.first().copied(), tracker)?;
        let mut scan = BangScan::new(kind);
        match scan.step(self) {
            Scan::Done(i) => {
                // full[0] is '!', full[i + 1] the terminating '>'.
                let bytes = &full[..=i];
                tracker.advance(&self[..=i]);
                *self = &self[i + 1..];
                Ok((kind, bytes))
            }
            Scan::Invalid(i) => {
                tracker.advance(&self[..=i]);
                *self = &self[i + 1..];
                Err(Error::Parse(ParseError::new(
                    ErrorKind::ParseError,
                    "Unexpected markup declaration",
                    tracker.position(),
                )))
            }
            Scan::More => {
                tracker.advance(self);
                *self = &[];
                Err(kind.unclosed(tracker))
            }
        }
    }

    fn read_element(&mut self, _buf: (), tracker: &mut PositionTracker) -> Result<&'a [u8]> {
        let mut state = ReadElementState::Elem;
        match state.change(self) {
            Some(i) => {
                let bytes = &self[..i];
                tracker.advance(&self[..=i]);
                *self = &self[i + 1..];
                Ok(bytes)
            }
            None => {
                tracker.advance(self);
                *self = &[];
                Err(Error::Parse(ParseError::new(
                    ErrorKind::UnclosedTag,
                    "Unexpected end of input inside tag",
                    tracker.position(),
                )))
            }
        }
    }

    fn read_pi(&mut self, _buf: (), tracker: &mut PositionTracker) -> Result<&'a [u8]> {
        let mut scan = PiScan { question: false };
        match scan.step(self) {
            Some(i) => {
                let bytes = &self[..i];
                tracker.advance(&self[..=i]);
                *self = &self[i + 1..];
                Ok(bytes)
            }
            None => {
                tracker.advance(self);
                *self = &[];
                Err(Error::Parse(ParseError::new(
                    ErrorKind::UnclosedProcessingInstruction,
                    "Unexpected end of input inside processing instruction",
                    tracker.position(),
                )))
            }
        }
    }

    fn skip_one(&mut self, byte: u8, tracker: &mut PositionTracker) -> Result<bool> {
        if self.first() == Some(&byte) {
            tracker.advance(&[byte]);
            *self = &self[1..];
            Ok(true)
        } else {
            Ok(false)
        }
    }

    fn peek_one(&mut self) -> Result<Option<u8>> {
        Ok(self.first().copied())
    }

    fn skip_bom(&mut self, tracker: &mut PositionTracker) -> Result<()> {
        if self.starts_with(&[0xEF, 0xBB, 0xBF]) {
            tracker.advance(&self[..3]);
            *self = &self[3..];
        }
        Ok(())
    }

    fn skip_to_markup(&mut self, tracker: &mut PositionTracker) -> Result<()> {
        let skip = memchr::memchr(b'<', self).unwrap_or(self.len());
        tracker.advance(&self[..skip]);
        *self = &self[skip..];
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::position::PositionMode;

    fn tracker() -> PositionTracker {
        PositionTracker::new(PositionMode::Full)
    }

    #[test]
    fn doctype_scan_honors_nested_markup() {
        let mut input: &[u8] = b"!DOCTYPE r [<!ENTITY x \"<>\"><!-- > --><!ELEMENT r ANY>]>rest";
        let mut t = tracker();
        let (kind, bytes) = input.read_bang_element((), &mut t).unwrap();
        assert_eq!(kind, BangKind::Doctype);
        assert_eq!(
            bytes,
            &b"!DOCTYPE r [<!ENTITY x \"<>\"><!-- > --><!ELEMENT r ANY>]"[..]
        );
        assert_eq!(input, b"rest");
    }

    #[test]
    fn cdata_scan_allows_double_brackets() {
        let mut input: &[u8] = b"![CDATA[a]]b]]>after";
        let mut t = tracker();
        let (kind, bytes) = input.read_bang_element((), &mut t).unwrap();
        assert_eq!(kind, BangKind::CData);
        assert_eq!(bytes, &b"![CDATA[a]]b]]"[..]);
        assert_eq!(input, b"after");
    }

    #[test]
    fn comment_requires_double_dash_close() {
        let mut input: &[u8] = b"!-- a > b -->x";
        let mut t = tracker();
        let (kind, bytes) = input.read_bang_element((), &mut t).unwrap();
        assert_eq!(kind, BangKind::Comment);
        assert_eq!(bytes, &b"!-- a > b --"[..]);
        assert_eq!(input, b"x");
    }

    #[test]
    fn unclosed_cdata_is_fatal() {
        let mut input: &[u8] = b"![CDATA[never ends";
        let mut t = tracker();
        match input.read_bang_element((), &mut t) {
            Err(Error::Parse(e)) => assert_eq!(e.kind(), ErrorKind::UnclosedCdata),
            _ => panic!("expected a parse error"),
        }
    }

    #[test]
    fn element_scan_ignores_gt_in_quotes() {
        let mut input: &[u8] = b"a href='x>y'>tail";
        let mut t = tracker();
        let bytes = input.read_element((), &mut t).unwrap();
        assert_eq!(bytes, &b"a href='x>y'"[..]);
        assert_eq!(input, b"tail");
    }

    #[test]
    fn pi_scan_allows_gt_in_data() {
        let mut input: &[u8] = b"?pi a>b?>tail";
        let mut t = tracker();
        let bytes = input.read_pi((), &mut t).unwrap();
        assert_eq!(bytes, &b"?pi a>b?"[..]);
        assert_eq!(input, b"tail");
    }

    #[test]
    fn buffered_impl_matches_slice_impl() {
        let data = b"abc<def".to_vec();
        let mut cursor = std::io::Cursor::new(data);
        let mut buf = Vec::new();
        let mut t = tracker();
        let (bytes, found) = cursor
            .read_bytes_until(b'<', &mut buf, &mut t)
            .unwrap()
            .unwrap();
        assert_eq!(bytes, b"abc");
        assert!(found);
        assert_eq!(t.absolute(), 4);
    }
}
