//! The transformer substrate: a stack-tracking fold over event streams.
//!
//! A [`Pipeline`] consumes an upstream event source, maintains the stack
//! of open elements, hands every event to a [`Transform`] together with
//! the current element path, and yields whatever the transform emits.
//! Structural faults (mismatched or stray closing tags, text outside the
//! root, elements left open at end of input) are injected by the
//! pipeline itself, always ahead of the transform's own output for the
//! same input event.
//!
//! Stages compose by nesting pipelines; the [`EventStream`] extension
//! trait provides the combinator surface:
//!
//! ```
//! use xml_flow::pipeline::EventStream;
//! use xml_flow::validate::{Attributes, WellFormed};
//! use xml_flow::Reader;
//!
//! let events = Reader::from_str("<a><b/></a>")
//!     .into_events()
//!     .transform(WellFormed::new())
//!     .transform(Attributes::new());
//! assert!(events.filter(|e| e.is_error()).count() == 0);
//! ```

use std::collections::VecDeque;
use std::fmt;

use crate::entity::{EntityOptions, EntityResolver};
use crate::errors::{ErrorKind, ParseError};
use crate::events::Event;
use crate::name::Name;
use crate::namespace::NamespaceResolver;
use crate::position::Position;
use crate::reader::is_whitespace;

/// One open element on the pipeline stack.
#[derive(Clone, Debug, PartialEq)]
pub struct PathSegment {
    local: String,
    prefix: Option<String>,
    start: Position,
}

impl PathSegment {
    fn new(name: &Name, start: Position) -> Self {
        Self {
            local: name.local_name().to_string(),
            prefix: name.prefix().map(String::from),
            start,
        }
    }

    pub fn local_name(&self) -> &str {
        &self.local
    }

    pub fn prefix(&self) -> Option<&str> {
        self.prefix.as_deref()
    }

    /// Where the element was opened.
    pub fn start(&self) -> Position {
        self.start
    }

    fn matches(&self, name: &Name) -> bool {
        self.local == name.local_name() && self.prefix.as_deref() == name.prefix()
    }
}

impl fmt::Display for PathSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.prefix {
            Some(p) => write!(f, "{}:{}", p, self.local),
            None => f.write_str(&self.local),
        }
    }
}

/// A pipeline stage callback.
///
/// Receives each event together with the path of open elements (the
/// element itself included for start *and* end tags) and returns the
/// events to emit downstream: the input event unchanged, a rewritten
/// version, several events, or none at all to suppress it.
pub trait Transform {
    fn transform(&mut self, event: Event, path: &[PathSegment]) -> Vec<Event>;
}

impl<F> Transform for F
where
    F: FnMut(Event, &[PathSegment]) -> Vec<Event>,
{
    fn transform(&mut self, event: Event, path: &[PathSegment]) -> Vec<Event> {
        self(event, path)
    }
}

/// A stack-tracking fold over an event stream. See the module docs.
pub struct Pipeline<I, T> {
    source: I,
    transform: T,
    stack: Vec<PathSegment>,
    pending: VecDeque<Event>,
}

impl<I, T> Pipeline<I, T>
where
    I: Iterator<Item = Event>,
    T: Transform,
{
    pub fn new(source: I, transform: T) -> Self {
        Self {
            source,
            transform,
            stack: Vec::new(),
            pending: VecDeque::new(),
        }
    }

    /// The elements currently open, outermost first.
    pub fn path(&self) -> &[PathSegment] {
        &self.stack
    }
}

impl<I, T> Iterator for Pipeline<I, T>
where
    I: Iterator<Item = Event>,
    T: Transform,
{
    type Item = Event;

    fn next(&mut self) -> Option<Event> {
        loop {
            if let Some(event) = self.pending.pop_front() {
                return Some(event);
            }
            let event = self.source.next()?;

            // Structural checks first; their errors precede whatever the
            // transform emits for this event.
            let mut popping = false;
            match &event {
                Event::StartElement(e) => {
                    self.stack.push(PathSegment::new(e.name(), e.position()));
                }
                Event::EndElement(e) => match self.stack.last() {
                    None => {
                        self.pending.push_back(Event::Error(
                            ParseError::new(
                                ErrorKind::UnexpectedClose,
                                format!("Unexpected closing tag </{}>", e.name()),
                                e.position(),
                            )
                            .with("got", e.name().to_string()),
                        ));
                    }
                    Some(top) => {
                        if !top.matches(e.name()) {
                            self.pending.push_back(Event::Error(
                                ParseError::new(
                                    ErrorKind::TagMismatch,
                                    format!("Expected </{}>, got </{}>", top, e.name()),
                                    e.position(),
                                )
                                .with("expected", top.to_string())
                                .with("got", e.name().to_string()),
                            ));
                        }
                        popping = true;
                    }
                },
                Event::Characters(t) => {
                    if self.stack.is_empty() && !t.content().bytes().all(is_whitespace) {
                        self.pending.push_back(Event::Error(ParseError::new(
                            ErrorKind::ParseError,
                            "Character data outside of the root element",
                            t.position(),
                        )));
                    }
                }
                Event::EndDocument => {
                    // Finalizer: report everything still open, innermost
                    // to outermost.
                    while let Some(open) = self.stack.pop() {
                        self.pending.push_back(Event::Error(
                            ParseError::new(
                                ErrorKind::UnclosedTag,
                                format!("Element <{}> is never closed", open),
                                open.start(),
                            )
                            .with("element", open.to_string()),
                        ));
                    }
                }
                _ => {}
            }

            let emitted = self.transform.transform(event, &self.stack);
            if popping {
                self.stack.pop();
            }
            self.pending.extend(emitted);
        }
    }
}

/// Passes events through until the first [`Event::Error`], emits it and a
/// closing `EndDocument`, then ends. See [`EventStream::halt_on_error`].
pub struct HaltOnError<I> {
    source: I,
    trailing: Option<Event>,
    done: bool,
}

impl<I: Iterator<Item = Event>> Iterator for HaltOnError<I> {
    type Item = Event;

    fn next(&mut self) -> Option<Event> {
        if let Some(event) = self.trailing.take() {
            self.done = true;
            return Some(event);
        }
        if self.done {
            return None;
        }
        match self.source.next()? {
            Event::Error(e) => {
                self.trailing = Some(Event::EndDocument);
                Some(Event::Error(e))
            }
            Event::EndDocument => {
                self.done = true;
                Some(Event::EndDocument)
            }
            event => Some(event),
        }
    }
}

/// Combinators over event streams.
///
/// Implemented for every `Iterator<Item = Event>`, so stages chain the
/// way the data flows: `parse ▷ entities ▷ namespaces ▷ validators`.
pub trait EventStream: Iterator<Item = Event> + Sized {
    /// Runs this stream through a [`Pipeline`] with the given transform.
    fn transform<T: Transform>(self, transform: T) -> Pipeline<Self, T> {
        Pipeline::new(self, transform)
    }

    /// Short-circuits at the first error: the error is emitted, followed
    /// by `EndDocument`, and the stream ends.
    fn halt_on_error(self) -> HaltOnError<Self> {
        HaltOnError {
            source: self,
            trailing: None,
            done: false,
        }
    }

    /// Materializes the stream, separating data events from errors.
    fn split_errors(self) -> (Vec<Event>, Vec<ParseError>) {
        let mut events = Vec::new();
        let mut errors = Vec::new();
        for event in self {
            match event {
                Event::Error(e) => errors.push(e),
                other => events.push(other),
            }
        }
        (events, errors)
    }

    /// Adds expanded namespace URIs to element and attribute names.
    fn resolve_namespaces(self) -> NamespaceResolver<Self> {
        NamespaceResolver::new(self)
    }

    /// Resolves entity references against the document's DTD.
    fn resolve_entities(self, options: EntityOptions) -> EntityResolver<Self> {
        EntityResolver::new(self, options)
    }
}

impl<I: Iterator<Item = Event>> EventStream for I {}
