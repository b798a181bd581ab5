//! A module to handle `Reader`

mod builder;
pub(crate) mod parser;
pub(crate) mod xml_source;

use std::io::{self, BufRead, Read};

use crate::chars::{Edition, Edition5};
use crate::errors::{Error, ErrorKind, ParseError, Result};
use crate::events::Event;
use crate::position::Position;

use self::parser::FlowParser;
use self::xml_source::XmlSource;

pub use self::builder::ReaderBuilder;

/// Possible reader states. The state transition diagram:
///
/// ```mermaid
/// flowchart LR
///   Init   -- StartDocument          --> Closed
///   Closed -- Text\n"(or no event)"  --> Opened
///   Opened -- markup event           --> Closed
///   Closed -- EndDocument            --> Exit
/// ```
#[derive(Copy, Clone)]
pub(crate) enum TagState {
    /// Initial state. The first pull emits the synthetic `StartDocument`
    /// and consumes a byte-order mark if one is present.
    Init,
    /// Outside of markup: the reader searches for the next `<` and
    /// returns the bytes before it as character data.
    Closed,
    /// Just after a `<`: the next byte decides which construct follows.
    Opened,
    /// After `EndDocument`, or after a fatal error. The reader stays here
    /// forever.
    Exit,
}

/// A low level streaming XML event reader.
///
/// Consumes bytes and pulls XML [`Event`]s one at a time, in document
/// order, with constant memory in the size of the document. The type
/// parameter `E` selects the [`Edition`] whose name character classes are
/// compiled into the scanning loops.
///
/// # Examples
///
/// ```
/// use xml_flow::events::Event;
/// use xml_flow::Reader;
///
/// let xml = r#"<tag1 att1="test">
///                 <tag2><!--Test comment-->Test</tag2>
///                 <tag2>Test 2</tag2>
///             </tag1>"#;
/// let mut reader = Reader::from_str(xml);
/// let mut count = 0;
/// let mut txt = Vec::new();
/// loop {
///     match reader.read_event().unwrap() {
///         Event::StartElement(ref e) if e.name().local_name() == "tag2" => count += 1,
///         Event::Characters(e) => txt.push(e.content().to_string()),
///         Event::EndDocument => break,
///         _ => (),
///     }
/// }
/// assert_eq!(count, 2);
/// assert_eq!(txt, vec!["Test".to_string(), "Test 2".to_string()]);
/// ```
pub struct Reader<R, E: Edition = Edition5> {
    pub(crate) reader: R,
    pub(crate) parser: FlowParser<E>,
    pub(crate) buf: Vec<u8>,
}

impl Reader<(), Edition5> {
    /// Create a new builder for configuring a reader.
    pub fn builder() -> ReaderBuilder<Edition5> {
        ReaderBuilder::new()
    }
}

/// Builder methods
impl<R: BufRead> Reader<R, Edition5> {
    /// Creates a `Reader` with default settings that reads from the given
    /// reader.
    pub fn from_reader(reader: R) -> Self {
        Reader::builder().into_reader(reader)
    }
}

impl<'a> Reader<&'a [u8], Edition5> {
    /// Creates a `Reader` with default settings over an in-memory string.
    pub fn from_str(input: &'a str) -> Self {
        Reader::builder().into_str_reader(input)
    }

    /// Creates a `Reader` with default settings over an in-memory buffer.
    pub fn from_bytes(input: &'a [u8]) -> Self {
        Reader::builder().into_bytes_reader(input)
    }
}

impl<I: Iterator<Item = Vec<u8>>> Reader<ChunkSource<I>, Edition5> {
    /// Creates a `Reader` with default settings pulling input chunks from
    /// an iterator.
    pub fn from_chunks(chunks: I) -> Self {
        Reader::builder().into_chunk_reader(chunks)
    }
}

/// Getters
impl<R, E: Edition> Reader<R, E> {
    /// Consumes `Reader` returning the underlying reader.
    pub fn into_inner(self) -> R {
        self.reader
    }

    /// Gets a reference to the underlying reader.
    pub fn get_ref(&self) -> &R {
        &self.reader
    }

    /// Gets a mutable reference to the underlying reader.
    pub fn get_mut(&mut self) -> &mut R {
        &mut self.reader
    }

    /// The current position in the input, just past the last event
    /// returned. Useful when reporting errors.
    pub fn position(&self) -> Position {
        self.parser.current_position()
    }

    /// Absolute byte offset consumed so far, regardless of the configured
    /// position mode.
    pub fn buffer_position(&self) -> u64 {
        self.parser.absolute()
    }
}

/// Read methods
impl<R: BufRead, E: Edition> Reader<R, E> {
    /// Reads the next [`Event`], buffering input chunks in the given
    /// scratch buffer.
    ///
    /// The buffer only has to live between two calls; reusing it between
    /// pulls avoids repeated allocations. This is the entry point for
    /// chunked input: a token split across chunk boundaries is held in
    /// `buf` until enough bytes have arrived.
    ///
    /// After `EndDocument` has been returned, every further call returns
    /// `EndDocument` again.
    pub fn read_event_into(&mut self, buf: &mut Vec<u8>) -> Result<Event> {
        loop {
            buf.clear();
            match self.read_event_impl(&mut *buf)? {
                Some(ref event) if self.parser.suppressed(event) => continue,
                Some(event) => return Ok(event),
                None => continue,
            }
        }
    }

    /// Reads the next [`Event`] using the reader's internal scratch
    /// buffer.
    pub fn read_event_buffered(&mut self) -> Result<Event> {
        let mut buf = std::mem::take(&mut self.buf);
        let event = self.read_event_into(&mut buf);
        self.buf = buf;
        event
    }

    /// Turns the reader into an iterator over events.
    ///
    /// I/O failures surface as an [`Event::Error`] with kind
    /// [`StreamError`](crate::ErrorKind::StreamError) followed by
    /// `EndDocument`. The iterator ends after `EndDocument`.
    pub fn into_events(self) -> Events<R, E> {
        Events {
            reader: self,
            buf: Vec::new(),
            trailing: None,
            done: false,
        }
    }
}

/// Read methods for in-memory input
impl<'a, E: Edition> Reader<&'a [u8], E> {
    /// Reads the next [`Event`] without copying: scanned bytes borrow
    /// from the input slice itself.
    pub fn read_event(&mut self) -> Result<Event> {
        loop {
            match self.read_event_impl(())? {
                Some(ref event) if self.parser.suppressed(event) => continue,
                Some(event) => return Ok(event),
                None => continue,
            }
        }
    }
}

/// Private methods for reading
impl<R, E: Edition> Reader<R, E> {
    /// Drives the state machine one step. `Ok(None)` means no event was
    /// produced by this step and the caller should call again.
    fn read_event_impl<'i, B>(&mut self, buf: B) -> Result<Option<Event>>
    where
        R: XmlSource<'i, B>,
    {
        if let Some(event) = self.parser.pop_pending() {
            return Ok(Some(event));
        }
        let result = match self.parser.tag_state() {
            TagState::Init => {
                self.reader.skip_bom(self.parser.tracker_mut())?;
                self.parser.set_tag_state(TagState::Closed);
                return Ok(Some(Event::StartDocument));
            }
            TagState::Closed => self.read_until_open(buf),
            TagState::Opened => self.read_until_close(buf),
            TagState::Exit => return Ok(Some(Event::EndDocument)),
        };
        match result {
            Ok(event) => {
                // The prolog window closes once a construct has actually
                // been scanned, not on the eventless `<` transition.
                if event.is_some() {
                    self.parser.leave_document_start();
                }
                Ok(event)
            }
            Err(Error::Parse(e)) => {
                if e.is_fatal() {
                    self.parser.set_tag_state(TagState::Exit);
                } else {
                    // Recoverable: resynchronize at the next markup.
                    self.reader.skip_to_markup(self.parser.tracker_mut())?;
                    self.parser.set_tag_state(TagState::Closed);
                }
                self.parser.leave_document_start();
                Ok(Some(Event::Error(e)))
            }
            Err(e) => {
                self.parser.set_tag_state(TagState::Exit);
                Err(e)
            }
        }
    }

    /// In the `Closed` state: consume character data up to the next `<`.
    fn read_until_open<'i, B>(&mut self, buf: B) -> Result<Option<Event>>
    where
        R: XmlSource<'i, B>,
    {
        let start = self.parser.current_position();
        if self.reader.skip_one(b'<', self.parser.tracker_mut())? {
            self.parser.set_markup_start(start);
            self.parser.set_tag_state(TagState::Opened);
            return Ok(None);
        }
        match self
            .reader
            .read_bytes_until(b'<', buf, self.parser.tracker_mut())?
        {
            None => {
                self.parser.set_tag_state(TagState::Exit);
                Ok(Some(Event::EndDocument))
            }
            Some((bytes, found)) => {
                if found {
                    // The construct starts at the consumed '<'.
                    let lt = self.parser.offset(start, bytes);
                    self.parser.set_markup_start(lt);
                    self.parser.set_tag_state(TagState::Opened);
                }
                Ok(self.parser.parse_text(bytes, start))
            }
        }
    }

    /// In the `Opened` state: the next byte decides the construct.
    fn read_until_close<'i, B>(&mut self, buf: B) -> Result<Option<Event>>
    where
        R: XmlSource<'i, B>,
    {
        self.parser.set_tag_state(TagState::Closed);
        let pos = self.parser.markup_start();

        match self.reader.peek_one()? {
            // `<!` - comment, CDATA or DOCTYPE declaration
            Some(b'!') => {
                let (kind, bytes) = self
                    .reader
                    .read_bang_element(buf, self.parser.tracker_mut())?;
                Ok(Some(self.parser.parse_bang(kind, bytes, pos)))
            }
            // `</` - closing tag
            Some(b'/') => {
                match self
                    .reader
                    .read_bytes_until(b'>', buf, self.parser.tracker_mut())?
                {
                    Some((bytes, true)) => Ok(Some(self.parser.parse_closing(bytes, pos))),
                    _ => Err(Error::Parse(ParseError::new(
                        ErrorKind::UnclosedTag,
                        "Unexpected end of input inside closing tag",
                        pos,
                    ))),
                }
            }
            // `<?` - processing instruction or XML declaration
            Some(b'?') => {
                let bytes = self.reader.read_pi(buf, self.parser.tracker_mut())?;
                Ok(Some(self.parser.parse_pi(bytes, pos)))
            }
            // `<...` - opening or self-closed tag
            Some(_) => {
                let bytes = self.reader.read_element(buf, self.parser.tracker_mut())?;
                Ok(Some(self.parser.parse_start(bytes, pos)))
            }
            None => Err(Error::Parse(ParseError::new(
                ErrorKind::UnclosedTag,
                "Unexpected end of input after <",
                pos,
            ))),
        }
    }
}

/// A function to check whether the byte is a whitespace (blank, new line,
/// carriage return or tab).
#[inline]
pub(crate) fn is_whitespace(b: u8) -> bool {
    match b {
        b' ' | b'\r' | b'\n' | b'\t' => true,
        _ => false,
    }
}

/// Adapts an iterator of byte chunks into a `BufRead`, so that input
/// arriving in pieces (sockets, decompressors, test fixtures) can drive a
/// [`Reader`]. Backpressure belongs to the caller: the next chunk is only
/// pulled when the current one is exhausted.
pub struct ChunkSource<I> {
    chunks: I,
    current: Vec<u8>,
    offset: usize,
}

impl<I: Iterator<Item = Vec<u8>>> ChunkSource<I> {
    pub fn new(chunks: I) -> Self {
        Self {
            chunks,
            current: Vec::new(),
            offset: 0,
        }
    }
}

impl<I: Iterator<Item = Vec<u8>>> Read for ChunkSource<I> {
    fn read(&mut self, out: &mut [u8]) -> io::Result<usize> {
        let available = self.fill_buf()?;
        let len = available.len().min(out.len());
        out[..len].copy_from_slice(&available[..len]);
        self.consume(len);
        Ok(len)
    }
}

impl<I: Iterator<Item = Vec<u8>>> BufRead for ChunkSource<I> {
    fn fill_buf(&mut self) -> io::Result<&[u8]> {
        while self.offset >= self.current.len() {
            match self.chunks.next() {
                Some(chunk) => {
                    self.current = chunk;
                    self.offset = 0;
                }
                None => return Ok(&[]),
            }
        }
        Ok(&self.current[self.offset..])
    }

    fn consume(&mut self, amt: usize) {
        self.offset += amt;
    }
}

/// Iterator over the events of a parse. See [`Reader::into_events`].
pub struct Events<R, E: Edition> {
    reader: Reader<R, E>,
    buf: Vec<u8>,
    trailing: Option<Event>,
    done: bool,
}

impl<R, E: Edition> Events<R, E> {
    /// The current position of the underlying reader.
    pub fn position(&self) -> Position {
        self.reader.position()
    }
}

impl<R: BufRead, E: Edition> Iterator for Events<R, E> {
    type Item = Event;

    fn next(&mut self) -> Option<Event> {
        if let Some(event) = self.trailing.take() {
            self.done = true;
            return Some(event);
        }
        if self.done {
            return None;
        }
        match self.reader.read_event_into(&mut self.buf) {
            Ok(Event::EndDocument) => {
                self.done = true;
                Some(Event::EndDocument)
            }
            Ok(event) => Some(event),
            Err(Error::Parse(e)) => {
                self.trailing = Some(Event::EndDocument);
                Some(Event::Error(e))
            }
            Err(e) => {
                self.trailing = Some(Event::EndDocument);
                Some(Event::Error(ParseError::new(
                    ErrorKind::StreamError,
                    e.to_string(),
                    self.reader.position(),
                )))
            }
        }
    }
}

impl<R: BufRead, E: Edition> IntoIterator for Reader<R, E> {
    type Item = Event;
    type IntoIter = Events<R, E>;

    fn into_iter(self) -> Self::IntoIter {
        self.into_events()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::Event;
    use pretty_assertions::assert_eq;

    fn collect(xml: &str) -> Vec<Event> {
        Reader::from_str(xml).into_events().collect()
    }

    #[test]
    fn empty_input_brackets_only() {
        assert_eq!(collect(""), vec![Event::StartDocument, Event::EndDocument]);
    }

    #[test]
    fn self_closing_expands() {
        let events = collect("<a/>");
        assert_eq!(events.len(), 4);
        match (&events[1], &events[2]) {
            (Event::StartElement(s), Event::EndElement(e)) => {
                assert_eq!(s.name().local_name(), "a");
                assert_eq!(e.name().local_name(), "a");
                // Both point at the same construct.
                assert_eq!(s.position(), e.position());
            }
            other => panic!("unexpected events: {:?}", other),
        }
    }

    #[test]
    fn positions_point_at_the_angle_bracket() {
        let events = collect("ab\n<x/>");
        match &events[2] {
            Event::StartElement(e) => {
                assert_eq!(e.position().line, 2);
                assert_eq!(e.position().column(), 0);
                assert_eq!(e.position().absolute, 3);
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[test]
    fn bom_is_consumed_silently() {
        let events: Vec<Event> = Reader::from_bytes(b"\xEF\xBB\xBF<a/>")
            .into_events()
            .collect();
        assert_eq!(events.len(), 4);
        assert!(matches!(events[1], Event::StartElement(_)));
    }

    #[test]
    fn chunked_input_matches_in_memory() {
        let xml = "<root a=\"1\"><child>text &amp; more</child><!-- c --></root>";
        let whole: Vec<Event> = collect(xml);
        for size in [1usize, 2, 3, 7].iter() {
            let chunks: Vec<Vec<u8>> = xml
                .as_bytes()
                .chunks(*size)
                .map(|c| c.to_vec())
                .collect();
            let chunked: Vec<Event> = Reader::from_chunks(chunks.into_iter())
                .into_events()
                .collect();
            assert_eq!(chunked, whole, "chunk size {}", size);
        }
    }

    #[test]
    fn fatal_unclosed_comment_ends_the_stream() {
        let events = collect("<a><!-- never closed");
        let kinds: Vec<String> = events.iter().map(|e| e.to_string()).collect();
        assert_eq!(
            kinds,
            vec![
                "StartDocument",
                "StartElement(a)",
                "Error(unclosed comment)",
                "EndDocument"
            ]
        );
    }

    #[test]
    fn recoverable_bad_markup_resynchronizes() {
        let events = collect("<a><!bogus League><b/></a>");
        assert!(events.iter().any(|e| e.is_error()));
        let starts: Vec<&str> = events
            .iter()
            .filter_map(|e| match e {
                Event::StartElement(s) => Some(s.name().local_name()),
                _ => None,
            })
            .collect();
        assert_eq!(starts, vec!["a", "b"]);
    }

    #[test]
    fn prolog_only_at_document_start() {
        let events = collect("<?xml version=\"1.0\"?><r><?xml not-a-prolog?></r>");
        assert!(matches!(events[1], Event::Prolog(_)));
        assert!(events
            .iter()
            .any(|e| matches!(e, Event::ProcessingInstruction(pi) if pi.target() == "xml")));
    }

    #[test]
    fn skip_filters_apply_at_source() {
        let events: Vec<Event> = Reader::builder()
            .skip_whitespace(true)
            .skip_comments(true)
            .into_str_reader("<a>  <!-- hi -->  <b/></a>")
            .into_events()
            .collect();
        assert!(!events
            .iter()
            .any(|e| matches!(e, Event::Whitespace(_) | Event::Comment(_))));
    }

    #[test]
    fn edition4_rejects_supplementary_names() {
        let xml = "<\u{10000}tag/>";
        let ed5: Vec<Event> = Reader::builder()
            .into_str_reader(xml)
            .into_events()
            .collect();
        assert!(matches!(ed5[1], Event::StartElement(_)));

        let ed4: Vec<Event> = Reader::builder()
            .edition4()
            .into_str_reader(xml)
            .into_events()
            .collect();
        assert!(ed4[1].is_error());
    }
}
