//! Single-pass entity resolution.
//!
//! [`EntityResolver`] is a stream stage that buffers everything before
//! the root element. When the DOCTYPE arrives it is parsed into a
//! [`DtdModel`], the buffer is flushed, a synthetic
//! [`DoctypeModel`](Event::DoctypeModel) event is emitted just before the
//! [`Doctype`](Event::Doctype) event, and the stage switches to streaming.
//! A root element with no preceding DOCTYPE flushes the buffer unchanged
//! and streams with the predefined entities only.
//!
//! In streaming mode every character run and attribute value has its
//! remaining `&name;` references replaced. A replacement value containing
//! markup is re-parsed through a nested reader and the resulting events
//! are spliced into the stream in place of the character run; spliced
//! events report positions within the entity replacement text, starting
//! over at line 1.
//!
//! Expansion is guarded three ways: a recursion depth cap, a total-size
//! cap counted per original reference, and up-front cycle detection over
//! the entity reference graph. Any cycle is fatal before expansion is
//! even attempted.

use std::collections::VecDeque;
use std::io;

use crate::dtd::{DtdModel, EntityValue};
use crate::errors::{ErrorKind, ParseError};
use crate::events::{Doctype, Event, Text};
use crate::position::Position;
use crate::Reader;

/// What to do with a reference to an entity that has no declaration.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum UnknownEntityPolicy {
    /// Fatal: emit an error event and end the stream.
    Raise,
    /// Emit an error event and keep the reference verbatim.
    EmitError,
    /// Keep the reference verbatim, silently (the default).
    Keep,
    /// Drop the reference from the output.
    Drop,
}

/// Caller-supplied hook fetching the bytes of an external entity, given
/// `(system_id, public_id)`. Without one, no file or network access ever
/// happens.
pub type ExternalResolver = Box<dyn FnMut(&str, Option<&str>) -> io::Result<Vec<u8>>>;

/// Configuration for the [`EntityResolver`] stage.
pub struct EntityOptions {
    max_expansion_depth: usize,
    max_total_expansion: usize,
    on_unknown_entity: UnknownEntityPolicy,
    external_resolver: Option<ExternalResolver>,
}

impl Default for EntityOptions {
    fn default() -> Self {
        Self {
            max_expansion_depth: 10,
            max_total_expansion: 1_000_000,
            on_unknown_entity: UnknownEntityPolicy::Keep,
            external_resolver: None,
        }
    }
}

impl EntityOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Maximum depth of recursive expansion on any single resolution
    /// path. (10 by default)
    pub fn max_expansion_depth(mut self, depth: usize) -> Self {
        self.max_expansion_depth = depth;
        self
    }

    /// Maximum number of expanded bytes per original reference.
    /// (1 000 000 by default)
    pub fn max_total_expansion(mut self, bytes: usize) -> Self {
        self.max_total_expansion = bytes;
        self
    }

    /// Policy for references to undeclared entities.
    /// ([`Keep`](UnknownEntityPolicy::Keep) by default)
    pub fn on_unknown_entity(mut self, policy: UnknownEntityPolicy) -> Self {
        self.on_unknown_entity = policy;
        self
    }

    /// Hook invoked to fetch external entity content. (none by default)
    pub fn external_resolver(mut self, resolver: ExternalResolver) -> Self {
        self.external_resolver = Some(resolver);
        self
    }
}

enum Mode {
    /// Before the DOCTYPE or the root element: events accumulate here.
    Buffering(Vec<Event>),
    Streaming,
    Done,
}

/// A piece of resolved text: plain characters, or a replacement value
/// that contains markup and needs a nested parse.
enum Segment {
    Text(String),
    Markup(String),
}

/// Fatal expansion faults abort the stream.
struct Fatal(ParseError);

/// Stream stage resolving entity references. Construct through
/// [`EventStream::resolve_entities`](crate::pipeline::EventStream::resolve_entities).
pub struct EntityResolver<I> {
    source: I,
    options: EntityOptions,
    mode: Mode,
    model: Option<DtdModel>,
    pending: VecDeque<Event>,
}

impl<I: Iterator<Item = Event>> EntityResolver<I> {
    pub fn new(source: I, options: EntityOptions) -> Self {
        Self {
            source,
            options,
            mode: Mode::Buffering(Vec::new()),
            model: None,
            pending: VecDeque::new(),
        }
    }

    /// The DTD model, once a DOCTYPE has been seen.
    pub fn model(&self) -> Option<&DtdModel> {
        self.model.as_ref()
    }

    fn flush_buffer(&mut self) {
        if let Mode::Buffering(buffer) = &mut self.mode {
            let drained: Vec<Event> = buffer.drain(..).collect();
            self.pending.extend(drained);
        }
    }

    fn fail(&mut self, error: ParseError) {
        self.pending.push_back(Event::Error(error));
        self.pending.push_back(Event::EndDocument);
        self.mode = Mode::Done;
    }

    fn handle_doctype(&mut self, doctype: Doctype) {
        let position = doctype.position();
        let (model, errors) = DtdModel::parse(doctype.content(), position);
        self.flush_buffer();
        self.pending.extend(errors.into_iter().map(Event::Error));

        if let Some(cycle) = model.find_entity_cycle() {
            self.fail(
                ParseError::new(
                    ErrorKind::ParseError,
                    format!("Entity reference cycle: {}", cycle.join(" -> ")),
                    position,
                )
                .with("entities", cycle.join(",")),
            );
            return;
        }
        if self.model.is_none() {
            self.pending
                .push_back(Event::DoctypeModel(Box::new(model.clone())));
            self.model = Some(model);
        }
        self.pending.push_back(Event::Doctype(doctype));
        self.mode = Mode::Streaming;
    }

    /// Streaming-mode handling of one event.
    fn process(&mut self, event: Event) {
        match event {
            Event::Characters(text) => {
                if !text.content().contains('&') {
                    self.pending.push_back(Event::Characters(text));
                    return;
                }
                let mut errors = Vec::new();
                let mut budget = 0usize;
                let segments =
                    match self.resolve_refs(text.content(), text.position(), 0, &mut budget, &mut errors)
                    {
                        Ok(segments) => segments,
                        Err(Fatal(error)) => {
                            self.pending.extend(errors.into_iter().map(Event::Error));
                            self.fail(error);
                            return;
                        }
                    };
                self.pending.extend(errors.into_iter().map(Event::Error));
                self.splice(segments, text.position());
            }
            Event::StartElement(mut element) => {
                let position = element.position();
                let mut errors = Vec::new();
                let mut fatal = None;
                for attr in element.attributes_mut().iter_mut() {
                    if !attr.value().contains('&') {
                        continue;
                    }
                    let mut budget = 0usize;
                    match self.resolve_refs(attr.value(), position, 0, &mut budget, &mut errors) {
                        Ok(segments) => {
                            let mut value = String::new();
                            for segment in segments {
                                match segment {
                                    Segment::Text(text) => value.push_str(&text),
                                    Segment::Markup(markup) => {
                                        errors.push(ParseError::new(
                                            ErrorKind::InvalidCharacter,
                                            format!(
                                                "Entity expansion brings '<' into the value of {}",
                                                attr.name()
                                            ),
                                            position,
                                        ));
                                        value.push_str(&markup);
                                    }
                                }
                            }
                            attr.set_value(value);
                        }
                        Err(Fatal(error)) => {
                            fatal = Some(error);
                            break;
                        }
                    }
                }
                self.pending.extend(errors.into_iter().map(Event::Error));
                match fatal {
                    Some(error) => self.fail(error),
                    None => self.pending.push_back(Event::StartElement(element)),
                }
            }
            Event::EndDocument => {
                self.pending.push_back(Event::EndDocument);
                self.mode = Mode::Done;
            }
            other => self.pending.push_back(other),
        }
    }

    /// Splits `raw` at its entity references and expands each one.
    /// `depth` is the current recursion depth; `budget` accumulates the
    /// expanded size for the enclosing top-level reference.
    fn resolve_refs(
        &mut self,
        raw: &str,
        position: Position,
        depth: usize,
        budget: &mut usize,
        errors: &mut Vec<ParseError>,
    ) -> Result<Vec<Segment>, Fatal> {
        let mut segments = Vec::new();
        let mut rest = raw;
        loop {
            let at = match rest.find('&') {
                Some(at) => at,
                None => {
                    if !rest.is_empty() {
                        segments.push(Segment::Text(rest.to_string()));
                    }
                    return Ok(segments);
                }
            };
            if at > 0 {
                segments.push(Segment::Text(rest[..at].to_string()));
            }
            rest = &rest[at..];
            let semi = match rest.find(';') {
                // A bare '&' was already reported by the reader; keep it.
                None | Some(1) => {
                    segments.push(Segment::Text("&".to_string()));
                    rest = &rest[1..];
                    continue;
                }
                Some(semi) => semi,
            };
            let name = &rest[1..semi];
            // A reference name never spans whitespace or another '&';
            // such an ampersand is literal text, not a reference.
            if name
                .bytes()
                .any(|b| b == b'&' || crate::reader::is_whitespace(b))
            {
                segments.push(Segment::Text("&".to_string()));
                rest = &rest[1..];
                continue;
            }
            let reference = &rest[..semi + 1];
            if let Some(resolved) = predefined(name) {
                segments.push(Segment::Text(resolved.to_string()));
            } else if name.starts_with('#') {
                // Unresolved character references were already reported;
                // pass them through untouched.
                segments.push(Segment::Text(reference.to_string()));
            } else if depth == 0 {
                // The size cap is counted per top-level reference: two
                // independent references may each use the full budget.
                let mut fresh = 0usize;
                self.expand_entity(name, reference, position, depth, &mut fresh, &mut segments, errors)?;
            } else {
                self.expand_entity(name, reference, position, depth, budget, &mut segments, errors)?;
            }
            rest = &rest[semi + 1..];
        }
    }

    /// Expands a single `&name;` reference into `segments`.
    fn expand_entity(
        &mut self,
        name: &str,
        reference: &str,
        position: Position,
        depth: usize,
        budget: &mut usize,
        segments: &mut Vec<Segment>,
        errors: &mut Vec<ParseError>,
    ) -> Result<(), Fatal> {
        if depth >= self.options.max_expansion_depth {
            return Err(Fatal(
                ParseError::new(
                    ErrorKind::ParseError,
                    format!("Entity expansion depth limit exceeded at &{};", name),
                    position,
                )
                .with("entity", name),
            ));
        }
        let value = match self.model.as_ref().and_then(|m| m.entity(name)) {
            Some(EntityValue::Internal(value)) => value.clone(),
            Some(EntityValue::External(id)) => {
                let (system, public) = (id.system_id().to_string(), id.public_id().map(String::from));
                match self.options.external_resolver.as_mut() {
                    Some(resolver) => match resolver(&system, public.as_deref()) {
                        Ok(bytes) => match String::from_utf8(bytes) {
                            Ok(value) => value,
                            Err(e) => {
                                errors.push(
                                    ParseError::new(
                                        ErrorKind::InvalidCharacter,
                                        format!("External entity {} is not UTF-8: {}", name, e),
                                        position,
                                    )
                                    .with("entity", name),
                                );
                                return Ok(());
                            }
                        },
                        Err(e) => {
                            errors.push(
                                ParseError::new(
                                    ErrorKind::StreamError,
                                    format!("Failed to resolve external entity {}: {}", name, e),
                                    position,
                                )
                                .with("entity", name),
                            );
                            return Ok(());
                        }
                    },
                    None => return self.unknown(name, reference, position, segments, errors),
                }
            }
            None => return self.unknown(name, reference, position, segments, errors),
        };

        *budget += value.len();
        if *budget > self.options.max_total_expansion {
            return Err(Fatal(
                ParseError::new(
                    ErrorKind::ParseError,
                    format!("Entity expansion size limit exceeded at &{};", name),
                    position,
                )
                .with("entity", name),
            ));
        }
        if value.contains('<') {
            segments.push(Segment::Markup(value));
        } else {
            let mut inner = self.resolve_refs(&value, position, depth + 1, budget, errors)?;
            segments.append(&mut inner);
        }
        Ok(())
    }

    fn unknown(
        &mut self,
        name: &str,
        reference: &str,
        position: Position,
        segments: &mut Vec<Segment>,
        errors: &mut Vec<ParseError>,
    ) -> Result<(), Fatal> {
        let error = || {
            ParseError::new(
                ErrorKind::ParseError,
                format!("Entity {} is not declared", name),
                position,
            )
            .with("entity", name)
        };
        match self.options.on_unknown_entity {
            UnknownEntityPolicy::Raise => return Err(Fatal(error())),
            UnknownEntityPolicy::EmitError => {
                errors.push(error());
                segments.push(Segment::Text(reference.to_string()));
            }
            UnknownEntityPolicy::Keep => {
                segments.push(Segment::Text(reference.to_string()));
            }
            UnknownEntityPolicy::Drop => {}
        }
        Ok(())
    }

    /// Queues the resolved segments: text runs coalesce into `Characters`
    /// events, markup segments are re-parsed and their events spliced in.
    fn splice(&mut self, segments: Vec<Segment>, position: Position) {
        let mut text = String::new();
        let mut spliced = Vec::new();
        for segment in segments {
            match segment {
                Segment::Text(part) => text.push_str(&part),
                Segment::Markup(markup) => {
                    if !text.is_empty() {
                        spliced.push(Event::Characters(Text::new(
                            std::mem::take(&mut text),
                            position,
                        )));
                    }
                    // Positions inside the spliced events are relative to
                    // the entity replacement text.
                    for event in Reader::from_str(&markup).into_events() {
                        match event {
                            Event::StartDocument | Event::EndDocument => {}
                            nested => spliced.push(nested),
                        }
                    }
                }
            }
        }
        if !text.is_empty() {
            spliced.push(Event::Characters(Text::new(text, position)));
        }
        // Nested character data may itself hold references (an entity
        // whose markup contains another entity); feed it back through the
        // streaming path. The reference graph is acyclic by the time any
        // expansion happens, so this recursion terminates.
        for event in spliced {
            match event {
                Event::Characters(t) if t.content().contains('&') => {
                    self.process(Event::Characters(t));
                }
                other => self.pending.push_back(other),
            }
        }
    }
}

/// The replacement for one of the five predefined entities.
fn predefined(name: &str) -> Option<&'static str> {
    match name {
        "amp" => Some("&"),
        "lt" => Some("<"),
        "gt" => Some(">"),
        "apos" => Some("'"),
        "quot" => Some("\""),
        _ => None,
    }
}

impl<I: Iterator<Item = Event>> Iterator for EntityResolver<I> {
    type Item = Event;

    fn next(&mut self) -> Option<Event> {
        loop {
            if let Some(event) = self.pending.pop_front() {
                return Some(event);
            }
            match &mut self.mode {
                Mode::Done => return None,
                Mode::Streaming => {
                    let event = self.source.next()?;
                    self.process(event);
                }
                Mode::Buffering(buffer) => {
                    let event = match self.source.next() {
                        Some(event) => event,
                        None => {
                            self.flush_buffer();
                            self.mode = Mode::Done;
                            continue;
                        }
                    };
                    match event {
                        Event::Doctype(d) => self.handle_doctype(d),
                        Event::DoctypeModel(model) => {
                            // Already resolved upstream; adopt the model
                            // and stay idempotent.
                            self.model = Some((*model).clone());
                            buffer.push(Event::DoctypeModel(model));
                        }
                        Event::StartElement(_) => {
                            self.flush_buffer();
                            self.mode = Mode::Streaming;
                            self.process(event);
                        }
                        Event::Error(e) => {
                            self.flush_buffer();
                            self.pending.push_back(Event::Error(e));
                        }
                        Event::EndDocument => {
                            self.flush_buffer();
                            self.pending.push_back(Event::EndDocument);
                            self.mode = Mode::Done;
                        }
                        other => {
                            if let Mode::Buffering(buffer) = &mut self.mode {
                                buffer.push(other);
                            }
                        }
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::Event;
    use crate::pipeline::EventStream;
    use crate::Reader;
    use pretty_assertions::assert_eq;

    fn resolve(xml: &str) -> Vec<Event> {
        Reader::from_str(xml)
            .into_events()
            .resolve_entities(EntityOptions::default())
            .collect()
    }

    fn character_data(events: &[Event]) -> String {
        events
            .iter()
            .filter_map(|e| match e {
                Event::Characters(t) => Some(t.content()),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn internal_entity_resolves() {
        let events = resolve("<!DOCTYPE r [<!ENTITY x \"y\">]><r>&x;</r>");
        assert_eq!(character_data(&events), "y");
        assert!(events.iter().all(|e| !e.is_error()));
    }

    #[test]
    fn doctype_model_precedes_doctype() {
        let events = resolve("<!DOCTYPE r [<!ENTITY x \"y\">]><r>&x;</r>");
        let model_idx = events
            .iter()
            .position(|e| matches!(e, Event::DoctypeModel(_)))
            .unwrap();
        assert!(matches!(events[model_idx + 1], Event::Doctype(_)));
    }

    #[test]
    fn no_doctype_means_predefined_only() {
        let events = resolve("<r>&x; &amp;</r>");
        // &x; is unknown and kept verbatim under the default policy; &amp;
        // was already handled by the reader.
        assert_eq!(character_data(&events), "&x; &");
        assert!(events.iter().all(|e| !e.is_error()));
    }

    #[test]
    fn nested_entities_resolve() {
        let events =
            resolve("<!DOCTYPE r [<!ENTITY inner \"core\"><!ENTITY outer \"[&inner;]\">]><r>&outer;</r>");
        assert_eq!(character_data(&events), "[core]");
    }

    #[test]
    fn cycle_is_fatal_before_expansion() {
        let events = resolve("<!DOCTYPE r [<!ENTITY a \"&b;\"><!ENTITY b \"&a;\">]><r>&a;</r>");
        let error = events.iter().find_map(|e| e.error()).expect("cycle error");
        assert!(error.message().contains("cycle"));
        assert_eq!(events.last(), Some(&Event::EndDocument));
        // The stream never reaches the root element.
        assert!(!events.iter().any(|e| matches!(e, Event::StartElement(_))));
    }

    #[test]
    fn depth_limit_is_fatal() {
        let xml = "<!DOCTYPE r [\
            <!ENTITY e0 \"x\">\
            <!ENTITY e1 \"&e0;\">\
            <!ENTITY e2 \"&e1;\">\
            <!ENTITY e3 \"&e2;\">\
        ]><r>&e3;</r>";
        let events: Vec<Event> = Reader::from_str(xml)
            .into_events()
            .resolve_entities(EntityOptions::default().max_expansion_depth(2))
            .collect();
        let error = events.iter().find_map(|e| e.error()).expect("depth error");
        assert!(error.message().contains("depth"));
        assert_eq!(events.last(), Some(&Event::EndDocument));
    }

    #[test]
    fn size_limit_is_fatal() {
        let xml = "<!DOCTYPE r [<!ENTITY big \"0123456789\">]><r>&big;</r>";
        let events: Vec<Event> = Reader::from_str(xml)
            .into_events()
            .resolve_entities(EntityOptions::default().max_total_expansion(5))
            .collect();
        let error = events.iter().find_map(|e| e.error()).expect("size error");
        assert!(error.message().contains("size"));
    }

    #[test]
    fn markup_in_entity_value_is_spliced() {
        let events = resolve("<!DOCTYPE r [<!ENTITY frag \"<b>inner</b>\">]><r>pre&frag;post</r>");
        let names: Vec<String> = events
            .iter()
            .filter_map(|e| match e {
                Event::StartElement(s) => Some(s.name().to_string()),
                _ => None,
            })
            .collect();
        assert_eq!(names, vec!["r", "b"]);
        assert_eq!(character_data(&events), "preinnerpost");
    }

    #[test]
    fn spliced_markup_balances_through_downstream_pipelines() {
        use crate::pipeline::EventStream;
        use crate::validate::WellFormed;

        let events: Vec<Event> = Reader::from_str(
            "<!DOCTYPE r [<!ENTITY frag \"<b>inner</b>\">]><r>&frag;</r>",
        )
        .into_events()
        .resolve_entities(EntityOptions::default())
        .transform(WellFormed::new())
        .collect();
        assert!(events.iter().all(|e| !e.is_error()));
    }

    #[test]
    fn attribute_values_resolve() {
        let events = resolve("<!DOCTYPE r [<!ENTITY who \"world\">]><r greet=\"hello &who;\"/>");
        let start = events
            .iter()
            .find_map(|e| match e {
                Event::StartElement(s) => Some(s),
                _ => None,
            })
            .unwrap();
        assert_eq!(start.attributes().get("greet"), Some("hello world"));
    }

    #[test]
    fn markup_in_attribute_value_is_an_error() {
        let events = resolve("<!DOCTYPE r [<!ENTITY frag \"<b/>\">]><r a=\"&frag;\"/>");
        assert!(events.iter().any(|e| e.is_error()));
    }

    #[test]
    fn unknown_entity_policies() {
        let xml = "<r>&nope;</r>";
        let run = |policy| -> Vec<Event> {
            Reader::from_str(xml)
                .into_events()
                .resolve_entities(EntityOptions::default().on_unknown_entity(policy))
                .collect()
        };

        let kept = run(UnknownEntityPolicy::Keep);
        assert_eq!(character_data(&kept), "&nope;");
        assert!(kept.iter().all(|e| !e.is_error()));

        let flagged = run(UnknownEntityPolicy::EmitError);
        assert_eq!(character_data(&flagged), "&nope;");
        assert_eq!(flagged.iter().filter(|e| e.is_error()).count(), 1);

        let dropped = run(UnknownEntityPolicy::Drop);
        assert_eq!(character_data(&dropped), "");

        let raised = run(UnknownEntityPolicy::Raise);
        assert!(raised.iter().any(|e| e.is_error()));
        assert_eq!(raised.last(), Some(&Event::EndDocument));
    }

    #[test]
    fn external_entities_use_the_hook() {
        let xml = "<!DOCTYPE r [<!ENTITY ext SYSTEM \"greeting.txt\">]><r>&ext;</r>";
        let resolver: ExternalResolver = Box::new(|system, _public| {
            assert_eq!(system, "greeting.txt");
            Ok(b"from outside".to_vec())
        });
        let events: Vec<Event> = Reader::from_str(xml)
            .into_events()
            .resolve_entities(EntityOptions::default().external_resolver(resolver))
            .collect();
        assert_eq!(character_data(&events), "from outside");
    }

    #[test]
    fn external_entities_without_hook_follow_unknown_policy() {
        let xml = "<!DOCTYPE r [<!ENTITY ext SYSTEM \"greeting.txt\">]><r>&ext;</r>";
        let events = resolve(xml);
        assert_eq!(character_data(&events), "&ext;");
    }

    #[test]
    fn without_dtd_resolution_is_identity() {
        let xml = "<a>hello &amp; goodbye<b> nested </b></a>";
        let plain: Vec<Event> = Reader::from_str(xml).into_events().collect();
        let resolved = resolve(xml);
        assert_eq!(plain, resolved);
    }
}
