//! Namespace resolution.
//!
//! [`NamespaceResolver`] is a stream stage that maintains the stack of
//! namespace scopes and rewrites every element and attribute [`Name`]
//! with its expanded URI. Per Namespaces in XML §6.2, unprefixed
//! attribute names never take the default namespace.

use std::collections::{HashMap, VecDeque};

use crate::errors::{ErrorKind, ParseError};
use crate::events::Event;
use crate::name::{Name, NS_XMLNS_URI, NS_XML_URI};
use crate::position::Position;

/// One scope: the declarations introduced by a single element. A `None`
/// URI records `xmlns=""`, which removes the default namespace.
type Scope = HashMap<String, Option<String>>;

/// Stream stage that expands namespace prefixes. Construct through
/// [`EventStream::resolve_namespaces`](crate::pipeline::EventStream::resolve_namespaces).
///
/// ```
/// use xml_flow::events::Event;
/// use xml_flow::pipeline::EventStream;
/// use xml_flow::Reader;
///
/// let mut events = Reader::from_str(r#"<d xmlns="urn:doc"><e/></d>"#)
///     .into_events()
///     .resolve_namespaces();
/// events.next(); // StartDocument
/// match events.next() {
///     Some(Event::StartElement(e)) => assert_eq!(e.name().namespace(), Some("urn:doc")),
///     other => panic!("unexpected {:?}", other),
/// }
/// ```
pub struct NamespaceResolver<I> {
    source: I,
    scopes: Vec<Scope>,
    pending: VecDeque<Event>,
}

impl<I: Iterator<Item = Event>> NamespaceResolver<I> {
    pub fn new(source: I) -> Self {
        Self {
            source,
            scopes: Vec::new(),
            pending: VecDeque::new(),
        }
    }

    /// Resolves `prefix` against the scope stack. `Ok(None)` means "no
    /// namespace" (unprefixed name with no default declaration in scope,
    /// or an explicitly removed default).
    fn resolve(&self, prefix: Option<&str>) -> Result<Option<String>, ()> {
        match prefix {
            Some("xml") => return Ok(Some(NS_XML_URI.to_string())),
            Some("xmlns") => return Ok(Some(NS_XMLNS_URI.to_string())),
            _ => {}
        }
        let key = prefix.unwrap_or("");
        for scope in self.scopes.iter().rev() {
            if let Some(binding) = scope.get(key) {
                return Ok(binding.clone());
            }
        }
        if prefix.is_none() {
            Ok(None)
        } else {
            Err(())
        }
    }

    /// Expands a name in the current scope; an unbound prefix produces an
    /// `UndeclaredNamespace` error queued ahead of the event.
    fn expand(
        &mut self,
        name: &Name,
        default_applies: bool,
        position: Position,
    ) -> Name {
        let prefix = name.prefix();
        if prefix.is_none() && !default_applies {
            return name.clone();
        }
        match self.resolve(prefix) {
            Ok(uri) => name.clone().with_namespace(uri),
            Err(()) => {
                self.pending.push_back(Event::Error(
                    ParseError::new(
                        ErrorKind::UndeclaredNamespace,
                        format!("Namespace prefix {} is not declared", prefix.unwrap_or("")),
                        position,
                    )
                    .with("prefix", prefix.unwrap_or("")),
                ));
                name.clone()
            }
        }
    }
}

impl<I: Iterator<Item = Event>> Iterator for NamespaceResolver<I> {
    type Item = Event;

    fn next(&mut self) -> Option<Event> {
        if let Some(event) = self.pending.pop_front() {
            return Some(event);
        }
        let event = self.source.next()?;
        let event = match event {
            Event::StartElement(mut e) => {
                let mut scope = Scope::new();
                for attr in e.attributes() {
                    let name = attr.name();
                    match (name.prefix(), name.local_name()) {
                        (Some("xmlns"), local) => {
                            scope.insert(local.to_string(), Some(attr.value().to_string()));
                        }
                        (None, "xmlns") => {
                            let value = attr.value();
                            let binding = if value.is_empty() {
                                None
                            } else {
                                Some(value.to_string())
                            };
                            scope.insert(String::new(), binding);
                        }
                        _ => {}
                    }
                }
                self.scopes.push(scope);

                let position = e.position();
                let name = self.expand(e.name(), true, position);
                e.set_name(name);
                let mut resolved = Vec::with_capacity(e.attributes().len());
                for attr in e.attributes() {
                    resolved.push(self.expand(attr.name(), false, position));
                }
                for (attr, name) in e.attributes_mut().iter_mut().zip(resolved) {
                    attr.set_name(name);
                }
                Event::StartElement(e)
            }
            Event::EndElement(mut e) => {
                let position = e.position();
                let name = self.expand(e.name(), true, position);
                e.set_name(name);
                self.scopes.pop();
                Event::EndElement(e)
            }
            other => other,
        };
        self.pending.push_back(event);
        self.pending.pop_front()
    }
}
