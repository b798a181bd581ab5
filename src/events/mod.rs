//! The event model.
//!
//! A parse is a sequence of [`Event`]s: one `StartDocument` first, one
//! `EndDocument` last, and between them one event per tokenized construct
//! in document order. Faults travel inline as [`Event::Error`].
//!
//! Payload structs are `#[non_exhaustive]`; consumers go through the
//! accessors (`tag`, `attributes`, `content`, `position`) so that fields
//! like the resolved namespace URI can be added without breakage.

pub mod attributes;

use std::fmt;

use crate::dtd::DtdModel;
use crate::errors::ParseError;
use crate::name::Name;
use crate::position::Position;

pub use self::attributes::{Attribute, Attributes};

/// The `<?xml version="1.0" ...?>` declaration.
#[derive(Clone, Debug, PartialEq)]
#[non_exhaustive]
pub struct Prolog {
    target: String,
    attributes: Attributes,
    position: Position,
}

impl Prolog {
    pub fn new(attributes: Attributes, position: Position) -> Self {
        Self {
            target: "xml".to_string(),
            attributes,
            position,
        }
    }

    /// Always `xml`.
    pub fn target(&self) -> &str {
        &self.target
    }

    /// The pseudo-attributes: `version`, `encoding`, `standalone`.
    pub fn attributes(&self) -> &Attributes {
        &self.attributes
    }

    pub fn version(&self) -> Option<&str> {
        self.attributes.get("version")
    }

    pub fn encoding(&self) -> Option<&str> {
        self.attributes.get("encoding")
    }

    pub fn standalone(&self) -> Option<&str> {
        self.attributes.get("standalone")
    }

    pub fn position(&self) -> Position {
        self.position
    }
}

/// A raw `<!DOCTYPE ...>` declaration.
///
/// The content runs from after `<!` to before the closing `>`, internal
/// subset included. The [`EntityResolver`](crate::entity::EntityResolver)
/// parses it into a [`DtdModel`].
#[derive(Clone, Debug, PartialEq)]
#[non_exhaustive]
pub struct Doctype {
    content: String,
    position: Position,
}

impl Doctype {
    pub fn new(content: impl Into<String>, position: Position) -> Self {
        Self {
            content: content.into(),
            position,
        }
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn position(&self) -> Position {
        self.position
    }
}

/// An element start tag.
#[derive(Clone, Debug, PartialEq)]
#[non_exhaustive]
pub struct StartElement {
    name: Name,
    attributes: Attributes,
    position: Position,
}

impl StartElement {
    pub fn new(name: impl Into<Name>, attributes: Attributes, position: Position) -> Self {
        Self {
            name: name.into(),
            attributes,
            position,
        }
    }

    pub fn name(&self) -> &Name {
        &self.name
    }

    pub fn attributes(&self) -> &Attributes {
        &self.attributes
    }

    pub(crate) fn attributes_mut(&mut self) -> &mut Attributes {
        &mut self.attributes
    }

    pub(crate) fn set_name(&mut self, name: Name) {
        self.name = name;
    }

    pub fn position(&self) -> Position {
        self.position
    }
}

/// An element end tag.
///
/// For a self-closing tag the reader synthesizes this event at the same
/// position as the matching [`StartElement`].
#[derive(Clone, Debug, PartialEq)]
#[non_exhaustive]
pub struct EndElement {
    name: Name,
    position: Position,
}

impl EndElement {
    pub fn new(name: impl Into<Name>, position: Position) -> Self {
        Self {
            name: name.into(),
            position,
        }
    }

    pub fn name(&self) -> &Name {
        &self.name
    }

    pub(crate) fn set_name(&mut self, name: Name) {
        self.name = name;
    }

    pub fn position(&self) -> Position {
        self.position
    }
}

/// Textual payload: character data, whitespace, a comment or a CDATA
/// section, depending on the enclosing [`Event`] variant.
#[derive(Clone, Debug, PartialEq)]
#[non_exhaustive]
pub struct Text {
    content: String,
    position: Position,
}

impl Text {
    pub fn new(content: impl Into<String>, position: Position) -> Self {
        Self {
            content: content.into(),
            position,
        }
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn position(&self) -> Position {
        self.position
    }
}

/// A processing instruction.
#[derive(Clone, Debug, PartialEq)]
#[non_exhaustive]
pub struct Pi {
    target: String,
    data: String,
    position: Position,
}

impl Pi {
    pub fn new(target: impl Into<String>, data: impl Into<String>, position: Position) -> Self {
        Self {
            target: target.into(),
            data: data.into(),
            position,
        }
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn data(&self) -> &str {
        &self.data
    }

    pub fn position(&self) -> Position {
        self.position
    }
}

/// One tokenized piece of an XML document.
#[derive(Clone, Debug, PartialEq)]
pub enum Event {
    /// Synthetic first event of every parse.
    StartDocument,
    /// Synthetic last event of every parse.
    EndDocument,
    /// The XML declaration; at most one, before everything else.
    Prolog(Prolog),
    /// The raw DOCTYPE declaration.
    Doctype(Doctype),
    /// The parsed DTD, emitted by the entity stage just before the
    /// [`Doctype`](Event::Doctype) event it was built from.
    DoctypeModel(Box<DtdModel>),
    /// An element start tag (self-closing tags expand to start + end).
    StartElement(StartElement),
    /// An element end tag.
    EndElement(EndElement),
    /// Character data containing at least one non-whitespace character.
    Characters(Text),
    /// Whitespace-only character data.
    Whitespace(Text),
    /// A comment.
    Comment(Text),
    /// A CDATA section.
    CData(Text),
    /// A processing instruction.
    ProcessingInstruction(Pi),
    /// An inline fault; non-fatal unless the consumer halts.
    Error(ParseError),
}

impl Event {
    /// The element name, for start and end tags.
    pub fn tag(&self) -> Option<&Name> {
        match self {
            Event::StartElement(e) => Some(e.name()),
            Event::EndElement(e) => Some(e.name()),
            _ => None,
        }
    }

    /// The attribute list of a start tag or prolog.
    pub fn attributes(&self) -> Option<&Attributes> {
        match self {
            Event::StartElement(e) => Some(e.attributes()),
            Event::Prolog(e) => Some(e.attributes()),
            _ => None,
        }
    }

    /// The textual content of character data, whitespace, comments,
    /// CDATA sections, PI data and raw doctypes.
    pub fn content(&self) -> Option<&str> {
        match self {
            Event::Characters(t)
            | Event::Whitespace(t)
            | Event::Comment(t)
            | Event::CData(t) => Some(t.content()),
            Event::ProcessingInstruction(pi) => Some(pi.data()),
            Event::Doctype(d) => Some(d.content()),
            _ => None,
        }
    }

    /// The source position, absent on the synthetic document brackets and
    /// the parsed DTD model.
    pub fn position(&self) -> Option<Position> {
        match self {
            Event::StartDocument | Event::EndDocument | Event::DoctypeModel(_) => None,
            Event::Prolog(e) => Some(e.position()),
            Event::Doctype(e) => Some(e.position()),
            Event::StartElement(e) => Some(e.position()),
            Event::EndElement(e) => Some(e.position()),
            Event::Characters(e)
            | Event::Whitespace(e)
            | Event::Comment(e)
            | Event::CData(e) => Some(e.position()),
            Event::ProcessingInstruction(e) => Some(e.position()),
            Event::Error(e) => Some(e.position()),
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Event::Error(_))
    }

    /// The fault payload of an [`Error`](Event::Error) event.
    pub fn error(&self) -> Option<&ParseError> {
        match self {
            Event::Error(e) => Some(e),
            _ => None,
        }
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Event::StartDocument => f.write_str("StartDocument"),
            Event::EndDocument => f.write_str("EndDocument"),
            Event::Prolog(_) => f.write_str("Prolog"),
            Event::Doctype(_) => f.write_str("Doctype"),
            Event::DoctypeModel(_) => f.write_str("DoctypeModel"),
            Event::StartElement(e) => write!(f, "StartElement({})", e.name()),
            Event::EndElement(e) => write!(f, "EndElement({})", e.name()),
            Event::Characters(_) => f.write_str("Characters"),
            Event::Whitespace(_) => f.write_str("Whitespace"),
            Event::Comment(_) => f.write_str("Comment"),
            Event::CData(_) => f.write_str("CData"),
            Event::ProcessingInstruction(e) => write!(f, "PI({})", e.target()),
            Event::Error(e) => write!(f, "Error({})", e.kind()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ErrorKind;
    use pretty_assertions::assert_eq;

    #[test]
    fn accessors_cover_the_payloads() {
        let start = Event::StartElement(StartElement::new(
            "a",
            vec![Attribute::from(("k", "v"))].into_iter().collect(),
            Position::START,
        ));
        assert_eq!(start.tag().unwrap().local_name(), "a");
        assert_eq!(start.attributes().unwrap().get("k"), Some("v"));
        assert_eq!(start.position(), Some(Position::START));
        assert_eq!(start.content(), None);

        let text = Event::Characters(Text::new("hi", Position::START));
        assert_eq!(text.content(), Some("hi"));
        assert_eq!(text.tag(), None);
    }

    #[test]
    fn synthetic_events_have_no_position() {
        assert_eq!(Event::StartDocument.position(), None);
        assert_eq!(Event::EndDocument.position(), None);
    }

    #[test]
    fn error_accessor() {
        let event = Event::Error(ParseError::new(
            ErrorKind::TagMismatch,
            "Expected </a>, got </b>",
            Position::START,
        ));
        assert!(event.is_error());
        assert_eq!(event.error().unwrap().kind(), ErrorKind::TagMismatch);
    }
}
