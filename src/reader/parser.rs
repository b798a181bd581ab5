use std::collections::VecDeque;
use std::marker::PhantomData;
use std::str::from_utf8;

use delegate::delegate;

use crate::chars::Edition;
use crate::errors::{ErrorKind, ParseError};
use crate::escape::{normalize_newlines, resolve_attr_value, resolve_text};
use crate::events::{
    Attribute, Attributes, Doctype, EndElement, Event, Pi, Prolog, StartElement, Text,
};
use crate::name::Name;
use crate::position::{Position, PositionMode, PositionTracker};
use crate::reader::builder::InnerReaderBuilder;
use crate::reader::xml_source::BangKind;
use crate::reader::{is_whitespace, TagState};

/// Edition-independent scanner state shared by both monomorphizations of
/// [`FlowParser`].
pub(crate) struct ParserCore {
    /// Line/offset bookkeeping; fed by the byte source.
    tracker: PositionTracker,
    /// Current scanner state.
    tag_state: TagState,
    /// Position of the `<` that opened the construct being parsed.
    markup_start: Position,
    /// Events waiting to be pulled: error events preceding their payload
    /// event, and the synthesized end of a self-closing tag.
    pending: VecDeque<Event>,
    /// True until the first construct has been scanned; gates the prolog.
    at_document_start: bool,
    positions: PositionMode,
    skip_whitespace: bool,
    skip_comments: bool,
    skip_cdata: bool,
    skip_prolog: bool,
    skip_characters: bool,
    skip_processing_instructions: bool,
}

impl ParserCore {
    fn from_builder(builder: &InnerReaderBuilder) -> Self {
        Self {
            tracker: PositionTracker::new(builder.positions),
            tag_state: TagState::Init,
            markup_start: Position::START,
            pending: VecDeque::new(),
            at_document_start: true,
            positions: builder.positions,
            skip_whitespace: builder.skip_whitespace,
            skip_comments: builder.skip_comments,
            skip_cdata: builder.skip_cdata,
            skip_prolog: builder.skip_prolog,
            skip_characters: builder.skip_characters,
            skip_processing_instructions: builder.skip_processing_instructions,
        }
    }

    fn tag_state(&self) -> TagState {
        self.tag_state
    }

    fn set_tag_state(&mut self, tag_state: TagState) {
        self.tag_state = tag_state;
    }

    fn tracker_mut(&mut self) -> &mut PositionTracker {
        &mut self.tracker
    }

    fn current_position(&self) -> Position {
        self.tracker.position()
    }

    fn absolute(&self) -> u64 {
        self.tracker.absolute()
    }

    fn set_markup_start(&mut self, position: Position) {
        self.markup_start = position;
    }

    fn markup_start(&self) -> Position {
        self.markup_start
    }

    fn leave_document_start(&mut self) {
        self.at_document_start = false;
    }

    fn pop_pending(&mut self) -> Option<Event> {
        self.pending.pop_front()
    }

    /// Position of a byte inside a construct, `prefix` being everything in
    /// the construct before it, `base` the construct start.
    fn offset(&self, base: Position, prefix: &[u8]) -> Position {
        match self.positions {
            PositionMode::None => Position::default(),
            PositionMode::LineOnly => Position {
                line: base.line + memchr::memchr_iter(b'\n', prefix).count() as u64,
                line_start: 0,
                absolute: 0,
            },
            PositionMode::Full => {
                let absolute = base.absolute + prefix.len() as u64;
                match memchr::memrchr(b'\n', prefix) {
                    Some(last) => Position {
                        line: base.line + memchr::memchr_iter(b'\n', prefix).count() as u64,
                        line_start: base.absolute + last as u64 + 1,
                        absolute,
                    },
                    None => Position {
                        line: base.line,
                        line_start: base.line_start,
                        absolute,
                    },
                }
            }
        }
    }
}

/// The tag-level parser: turns raw construct bytes handed over by the byte
/// source into [`Event`]s, monomorphized over the [`Edition`] so the name
/// predicates inline into the scanning loops.
pub(crate) struct FlowParser<E: Edition> {
    core: ParserCore,
    _edition: PhantomData<E>,
}

impl<E: Edition> FlowParser<E> {
    delegate! {
        to self.core {
            pub(crate) fn tag_state(&self) -> TagState;
            pub(crate) fn set_tag_state(&mut self, tag_state: TagState);
            pub(crate) fn tracker_mut(&mut self) -> &mut PositionTracker;
            pub(crate) fn current_position(&self) -> Position;
            pub(crate) fn absolute(&self) -> u64;
            pub(crate) fn set_markup_start(&mut self, position: Position);
            pub(crate) fn markup_start(&self) -> Position;
            pub(crate) fn leave_document_start(&mut self);
            pub(crate) fn pop_pending(&mut self) -> Option<Event>;
            pub(crate) fn offset(&self, base: Position, prefix: &[u8]) -> Position;
        }
    }

    pub(crate) fn from_builder(builder: &InnerReaderBuilder) -> Self {
        Self {
            core: ParserCore::from_builder(builder),
            _edition: PhantomData,
        }
    }

    /// Whether the builder asked for this event to be skipped at source.
    pub(crate) fn suppressed(&self, event: &Event) -> bool {
        match event {
            Event::Whitespace(_) => self.core.skip_whitespace,
            Event::Comment(_) => self.core.skip_comments,
            Event::CData(_) => self.core.skip_cdata,
            Event::Prolog(_) => self.core.skip_prolog,
            Event::Characters(_) => self.core.skip_characters,
            Event::ProcessingInstruction(_) => self.core.skip_processing_instructions,
            _ => false,
        }
    }

    /// Queue all but the first event, return the first.
    fn emit(&mut self, mut events: Vec<Event>) -> Event {
        debug_assert!(!events.is_empty());
        let first = events.remove(0);
        self.core.pending.extend(events);
        first
    }

    /// Parses a text run (everything between two pieces of markup).
    /// Returns `None` for an empty run.
    pub(crate) fn parse_text(&mut self, raw: &[u8], start: Position) -> Option<Event> {
        if raw.is_empty() {
            return None;
        }
        let s = match from_utf8(raw) {
            Ok(s) => s,
            Err(e) => {
                return Some(Event::Error(ParseError::new(
                    ErrorKind::InvalidCharacter,
                    format!("Invalid UTF-8 in character data: {}", e),
                    start,
                )))
            }
        };
        let (text, errors) = resolve_text(s, start);
        let mut events: Vec<Event> = errors.into_iter().map(Event::Error).collect();
        let event = if text.bytes().all(is_whitespace) {
            Event::Whitespace(Text::new(text, start))
        } else {
            Event::Characters(Text::new(text, start))
        };
        events.push(event);
        Some(self.emit(events))
    }

    /// Parses a start tag. `raw` is the content between `<` and `>`;
    /// `pos` is the position of the `<`.
    pub(crate) fn parse_start(&mut self, raw: &[u8], pos: Position) -> Event {
        let s = match from_utf8(raw) {
            Ok(s) => s,
            Err(e) => {
                return Event::Error(ParseError::new(
                    ErrorKind::InvalidCharacter,
                    format!("Invalid UTF-8 in start tag: {}", e),
                    pos,
                ))
            }
        };
        let (s, self_closing) = match s.strip_suffix('/') {
            Some(rest) => (rest, true),
            None => (s, false),
        };
        let base = self.core.offset(pos, b"<");

        let name = match self.scan_name(s, base) {
            Ok(name) => name.to_string(),
            Err(e) => return Event::Error(e),
        };
        let mut events = Vec::new();

        let rest = &s[name.len()..];
        let attrs = if rest.is_empty() {
            Attributes::new()
        } else if !is_ascii_whitespace_start(rest) {
            events.push(Event::Error(ParseError::new(
                ErrorKind::InvalidCharacter,
                format!(
                    "Invalid character {:?} in tag name",
                    rest.chars().next().unwrap()
                ),
                self.core.offset(base, name.as_bytes()),
            )));
            Attributes::new()
        } else {
            self.parse_attributes(s, name.len(), base, &mut events)
        };

        let name = Name::from_qualified(&name);
        events.push(Event::StartElement(StartElement::new(
            name.clone(),
            attrs,
            pos,
        )));
        if self_closing {
            events.push(Event::EndElement(EndElement::new(name, pos)));
        }
        self.emit(events)
    }

    /// Parses a closing tag. `raw` is the content between `<` and `>`,
    /// starting with `/`.
    pub(crate) fn parse_closing(&mut self, raw: &[u8], pos: Position) -> Event {
        let s = match from_utf8(raw) {
            Ok(s) => s,
            Err(e) => {
                return Event::Error(ParseError::new(
                    ErrorKind::InvalidCharacter,
                    format!("Invalid UTF-8 in closing tag: {}", e),
                    pos,
                ))
            }
        };
        // Whitespace after the name is legal: `</a  >`.
        let name_text = s[1..].trim_end_matches(|c: char| c.is_ascii() && is_whitespace(c as u8));
        let base = self.core.offset(pos, b"</");
        match self.scan_name(name_text, base) {
            Ok(name) if name.len() == name_text.len() => {
                Event::EndElement(EndElement::new(Name::from_qualified(name), pos))
            }
            Ok(name) => Event::Error(ParseError::new(
                ErrorKind::InvalidCharacter,
                format!("Invalid character after name in closing tag </{}", name),
                self.core.offset(base, name.as_bytes()),
            )),
            Err(e) => Event::Error(e),
        }
    }

    /// Parses a `<!` construct already delimited by the byte source.
    /// `raw` starts at the `!` and excludes the final `>`.
    pub(crate) fn parse_bang(&mut self, kind: BangKind, raw: &[u8], pos: Position) -> Event {
        let (content, what) = match kind {
            // Strip `!--` and the trailing `--`.
            BangKind::Comment => (&raw[3..raw.len() - 2], "comment"),
            // Strip `![CDATA[` and the trailing `]]`.
            BangKind::CData => (&raw[8..raw.len() - 2], "CDATA section"),
            // Keep everything after the `!`.
            BangKind::Doctype => (&raw[1..], "DOCTYPE declaration"),
        };
        let content = match from_utf8(content) {
            Ok(s) => s,
            Err(e) => {
                return Event::Error(ParseError::new(
                    ErrorKind::InvalidCharacter,
                    format!("Invalid UTF-8 in {}: {}", what, e),
                    pos,
                ))
            }
        };
        let content = normalize_newlines(content);
        match kind {
            BangKind::Comment => Event::Comment(Text::new(content, pos)),
            BangKind::CData => Event::CData(Text::new(content, pos)),
            BangKind::Doctype => Event::Doctype(Doctype::new(content, pos)),
        }
    }

    /// Parses a processing instruction or, at the very start of the
    /// document, the XML declaration. `raw` is the content between `<`
    /// and `>`, starting and ending with `?`.
    pub(crate) fn parse_pi(&mut self, raw: &[u8], pos: Position) -> Event {
        let s = match from_utf8(&raw[1..raw.len().saturating_sub(1).max(1)]) {
            Ok(s) => s,
            Err(e) => {
                return Event::Error(ParseError::new(
                    ErrorKind::InvalidCharacter,
                    format!("Invalid UTF-8 in processing instruction: {}", e),
                    pos,
                ))
            }
        };
        let base = self.core.offset(pos, b"<?");
        let target = match self.scan_name(s, base) {
            Ok(target) => target.to_string(),
            Err(e) => return Event::Error(e),
        };
        let rest = &s[target.len()..];
        if !rest.is_empty() && !is_ascii_whitespace_start(rest) {
            return Event::Error(ParseError::new(
                ErrorKind::InvalidCharacter,
                format!(
                    "Invalid character after processing instruction target {}",
                    target
                ),
                self.core.offset(base, target.as_bytes()),
            ));
        }

        if target == "xml" && self.core.at_document_start {
            let mut events = Vec::new();
            let attrs = self.parse_attributes(s, target.len(), base, &mut events);
            events.push(Event::Prolog(Prolog::new(attrs, pos)));
            return self.emit(events);
        }

        let data = rest.trim_start_matches(|c: char| c.is_ascii() && is_whitespace(c as u8));
        Event::ProcessingInstruction(Pi::new(target, normalize_newlines(data), pos))
    }

    /// Scans a name at the start of `s` and validates it against the
    /// edition's character classes.
    fn scan_name<'s>(&self, s: &'s str, base: Position) -> Result<&'s str, ParseError> {
        let mut chars = s.char_indices();
        match chars.next() {
            None => Err(ParseError::new(
                ErrorKind::InvalidNameStart,
                "Expected a name",
                base,
            )),
            Some((_, c)) if !E::is_name_start_char(c) => Err(ParseError::new(
                ErrorKind::InvalidNameStart,
                format!("Character {:?} cannot start a name", c),
                base,
            )
            .with("character", c.to_string())),
            Some(_) => {
                let mut end = s.len();
                for (i, c) in chars {
                    if !E::is_name_char(c) {
                        end = i;
                        break;
                    }
                }
                Ok(&s[..end])
            }
        }
    }

    /// Parses the attribute list of a start tag or the pseudo-attributes
    /// of the XML declaration. `s` is the whole tag content, `from` the
    /// byte offset just past the name, `base` the position of `s[0]`.
    /// Faults become `Error` events pushed onto `events`; the attributes
    /// parsed before the fault are kept.
    fn parse_attributes(
        &mut self,
        s: &str,
        from: usize,
        base: Position,
        events: &mut Vec<Event>,
    ) -> Attributes {
        let mut attrs = Attributes::new();
        let b = s.as_bytes();
        let mut i = from;
        loop {
            while i < b.len() && is_whitespace(b[i]) {
                i += 1;
            }
            if i >= b.len() {
                break;
            }
            let name = match self.scan_name(&s[i..], self.core.offset(base, &b[..i])) {
                Ok(name) => name.to_string(),
                Err(e) => {
                    events.push(Event::Error(e));
                    break;
                }
            };
            i += name.len();
            while i < b.len() && is_whitespace(b[i]) {
                i += 1;
            }
            if b.get(i) != Some(&b'=') {
                events.push(Event::Error(
                    ParseError::new(
                        ErrorKind::MissingAttrValue,
                        format!("Attribute {} has no value", name),
                        self.core.offset(base, &b[..i]),
                    )
                    .with("attribute", name),
                ));
                break;
            }
            i += 1;
            while i < b.len() && is_whitespace(b[i]) {
                i += 1;
            }
            let quote = match b.get(i) {
                Some(&q) if q == b'"' || q == b'\'' => q,
                _ => {
                    events.push(Event::Error(
                        ParseError::new(
                            ErrorKind::InvalidQuote,
                            format!("Attribute {} value must be quoted", name),
                            self.core.offset(base, &b[..i]),
                        )
                        .with("attribute", name),
                    ));
                    break;
                }
            };
            i += 1;
            let value_start = i;
            let value_end = match memchr::memchr(quote, &b[i..]) {
                Some(p) => i + p,
                None => {
                    events.push(Event::Error(
                        ParseError::new(
                            ErrorKind::InvalidQuote,
                            format!("Attribute {} value is not terminated", name),
                            self.core.offset(base, &b[..i]),
                        )
                        .with("attribute", name),
                    ));
                    break;
                }
            };
            let (value, errors) = resolve_attr_value(
                &s[value_start..value_end],
                self.core.offset(base, &b[..value_start]),
            );
            events.extend(errors.into_iter().map(Event::Error));
            attrs.push(Attribute::new(Name::from_qualified(&name), value));
            i = value_end + 1;
        }
        attrs
    }
}

fn is_ascii_whitespace_start(s: &str) -> bool {
    s.as_bytes().first().map_or(false, |&b| is_whitespace(b))
}
