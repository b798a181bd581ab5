//! Well-formedness validators.
//!
//! Each validator is a [`Transform`] that never rewrites payloads: it
//! relays every event and injects [`Event::Error`]s ahead of the event
//! that triggered them. Validators compose by stacking pipelines:
//!
//! ```
//! use xml_flow::pipeline::EventStream;
//! use xml_flow::validate::{Attributes, Comments, WellFormed};
//! use xml_flow::Reader;
//!
//! let errors = Reader::from_str(r#"<a b="1" b="2"/>"#)
//!     .into_events()
//!     .transform(WellFormed::new())
//!     .transform(Attributes::new())
//!     .transform(Comments::new())
//!     .filter(|e| e.is_error())
//!     .count();
//! assert_eq!(errors, 1);
//! ```

use std::collections::HashMap;

use crate::errors::{ErrorKind, ParseError};
use crate::events::Event;
use crate::name::{NS_XMLNS_URI, NS_XML_URI};
use crate::pipeline::{PathSegment, Transform};

/// Structural boundary checks on top of the pipeline's stack discipline:
/// exactly one root element per document.
///
/// Mismatched tags, stray closing tags and text outside the root are
/// already reported by the [`Pipeline`](crate::pipeline::Pipeline) this
/// validator runs in; what remains here are the document-level counts.
#[derive(Default)]
pub struct WellFormed {
    roots: usize,
}

impl WellFormed {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Transform for WellFormed {
    fn transform(&mut self, event: Event, path: &[PathSegment]) -> Vec<Event> {
        match &event {
            Event::StartElement(e) if path.len() == 1 => {
                self.roots += 1;
                if self.roots > 1 {
                    return vec![
                        Event::Error(
                            ParseError::new(
                                ErrorKind::ParseError,
                                format!("Document has a second root element <{}>", e.name()),
                                e.position(),
                            )
                            .with("element", e.name().to_string()),
                        ),
                        event,
                    ];
                }
            }
            Event::EndDocument if self.roots == 0 => {
                return vec![
                    Event::Error(ParseError::new(
                        ErrorKind::ParseError,
                        "Document has no root element",
                        Default::default(),
                    )),
                    event,
                ];
            }
            _ => {}
        }
        vec![event]
    }
}

/// Rejects duplicate attribute names within a single start tag.
#[derive(Default)]
pub struct Attributes;

impl Attributes {
    pub fn new() -> Self {
        Self
    }
}

impl Transform for Attributes {
    fn transform(&mut self, event: Event, _path: &[PathSegment]) -> Vec<Event> {
        let mut out = Vec::new();
        if let Event::StartElement(e) = &event {
            let mut seen: Vec<String> = Vec::with_capacity(e.attributes().len());
            for attr in e.attributes() {
                let name = attr.name().to_string();
                if seen.contains(&name) {
                    out.push(Event::Error(
                        ParseError::new(
                            ErrorKind::DuplicateAttr,
                            format!("Attribute {} appears more than once on <{}>", name, e.name()),
                            e.position(),
                        )
                        .with("attribute", name.clone())
                        .with("element", e.name().to_string()),
                    ));
                } else {
                    seen.push(name);
                }
            }
        }
        out.push(event);
        out
    }
}

/// Rejects `--` inside comment bodies, which XML 1.0 §2.5 forbids.
#[derive(Default)]
pub struct Comments;

impl Comments {
    pub fn new() -> Self {
        Self
    }
}

impl Transform for Comments {
    fn transform(&mut self, event: Event, _path: &[PathSegment]) -> Vec<Event> {
        if let Event::Comment(text) = &event {
            let body = text.content().as_bytes();
            let double_dash = memchr::memchr_iter(b'-', body)
                .any(|i| body.get(i + 1) == Some(&b'-'))
                // A comment ending in `-` smuggles a `--` in via the
                // closing delimiter.
                || body.last() == Some(&b'-');
            if double_dash {
                return vec![
                    Event::Error(ParseError::new(
                        ErrorKind::InvalidCharacter,
                        "'--' is not allowed inside comments",
                        text.position(),
                    )),
                    event,
                ];
            }
        }
        vec![event]
    }
}

/// Rejects processing instructions with the reserved target `xml` in any
/// capitalization. The genuine XML declaration is a
/// [`Prolog`](Event::Prolog) event and passes through untouched, so this
/// also catches an `<?xml ...?>` that appears after the document start.
#[derive(Default)]
pub struct ProcessingInstructions;

impl ProcessingInstructions {
    pub fn new() -> Self {
        Self
    }
}

impl Transform for ProcessingInstructions {
    fn transform(&mut self, event: Event, _path: &[PathSegment]) -> Vec<Event> {
        if let Event::ProcessingInstruction(pi) = &event {
            if pi.target().eq_ignore_ascii_case("xml") {
                return vec![
                    Event::Error(
                        ParseError::new(
                            ErrorKind::ParseError,
                            format!("Processing instruction target {} is reserved", pi.target()),
                            pi.position(),
                        )
                        .with("target", pi.target()),
                    ),
                    event,
                ];
            }
        }
        vec![event]
    }
}

/// Checks namespace declarations and prefix use.
///
/// `xml` and `xmlns` are pre-bound; `xml` may only be re-declared to its
/// own URI, `xmlns` not at all, and no other prefix may be bound to either
/// reserved URI. Every prefix used by an element or attribute must have an
/// in-scope declaration. Payloads are never rewritten; use
/// [`NamespaceResolver`](crate::namespace::NamespaceResolver) to expand
/// names.
#[derive(Default)]
pub struct Namespaces {
    scopes: Vec<HashMap<String, bool>>,
}

impl Namespaces {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether `prefix` has an in-scope declaration with a non-empty URI.
    fn declared(&self, prefix: &str) -> bool {
        if prefix == "xml" || prefix == "xmlns" {
            return true;
        }
        self.scopes
            .iter()
            .rev()
            .find_map(|scope| scope.get(prefix).copied())
            .unwrap_or(false)
    }
}

impl Transform for Namespaces {
    fn transform(&mut self, event: Event, _path: &[PathSegment]) -> Vec<Event> {
        let mut out = Vec::new();
        match &event {
            Event::StartElement(e) => {
                let mut scope = HashMap::new();
                for attr in e.attributes() {
                    let name = attr.name();
                    let declared_prefix = match (name.prefix(), name.local_name()) {
                        (Some("xmlns"), local) => local,
                        (None, "xmlns") => "",
                        _ => continue,
                    };
                    let value = attr.value();
                    let fault = if declared_prefix == "xmlns" {
                        Some("The xmlns prefix cannot be declared".to_string())
                    } else if declared_prefix == "xml" && value != NS_XML_URI {
                        Some(format!(
                            "The xml prefix cannot be bound to {:?}",
                            value
                        ))
                    } else if declared_prefix != "xml"
                        && (value == NS_XML_URI || value == NS_XMLNS_URI)
                    {
                        Some(format!("{:?} is reserved and cannot be bound", value))
                    } else if !declared_prefix.is_empty() && value.is_empty() {
                        Some(format!("Prefix {} cannot be undeclared", declared_prefix))
                    } else {
                        None
                    };
                    if let Some(message) = fault {
                        out.push(Event::Error(
                            ParseError::new(ErrorKind::ParseError, message, e.position())
                                .with("prefix", declared_prefix)
                                .with("uri", value),
                        ));
                    }
                    scope.insert(declared_prefix.to_string(), !value.is_empty());
                }
                self.scopes.push(scope);

                let mut used: Vec<&str> = Vec::new();
                if let Some(prefix) = e.name().prefix() {
                    used.push(prefix);
                }
                for attr in e.attributes() {
                    match attr.name().prefix() {
                        Some("xmlns") | None => {}
                        Some(prefix) => used.push(prefix),
                    }
                }
                for prefix in used {
                    if !self.declared(prefix) {
                        out.push(Event::Error(
                            ParseError::new(
                                ErrorKind::UndeclaredNamespace,
                                format!("Namespace prefix {} is not declared", prefix),
                                e.position(),
                            )
                            .with("prefix", prefix),
                        ));
                    }
                }
            }
            Event::EndElement(e) => {
                if let Some(prefix) = e.name().prefix() {
                    if !self.declared(prefix) {
                        out.push(Event::Error(
                            ParseError::new(
                                ErrorKind::UndeclaredNamespace,
                                format!("Namespace prefix {} is not declared", prefix),
                                e.position(),
                            )
                            .with("prefix", prefix),
                        ));
                    }
                }
                self.scopes.pop();
            }
            _ => {}
        }
        out.push(event);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::EventStream;
    use crate::Reader;
    use pretty_assertions::assert_eq;

    fn errors_with<T: Transform>(xml: &str, validator: T) -> Vec<ParseError> {
        Reader::from_str(xml)
            .into_events()
            .transform(validator)
            .filter_map(|e| e.error().cloned())
            .collect()
    }

    #[test]
    fn exactly_one_root_is_fine() {
        assert!(errors_with("<a><b/></a>", WellFormed::new()).is_empty());
    }

    #[test]
    fn second_root_is_flagged() {
        let errors = errors_with("<a/><b/>", WellFormed::new());
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].get("element"), Some("b"));
    }

    #[test]
    fn missing_root_is_flagged() {
        let errors = errors_with("<?xml version=\"1.0\"?>", WellFormed::new());
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].message(), "Document has no root element");
    }

    #[test]
    fn duplicate_attributes() {
        let errors = errors_with(r#"<a x="1" y="2" x="3"/>"#, Attributes::new());
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].kind(), ErrorKind::DuplicateAttr);
        assert_eq!(errors[0].get("attribute"), Some("x"));
    }

    #[test]
    fn same_local_name_different_prefix_is_not_a_duplicate() {
        assert!(errors_with(r#"<a x:n="1" y:n="2" xmlns:x="u1" xmlns:y="u2"/>"#, Attributes::new())
            .is_empty());
    }

    #[test]
    fn double_dash_in_comment() {
        let errors = errors_with("<a><!-- not -- allowed --></a>", Comments::new());
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].kind(), ErrorKind::InvalidCharacter);
    }

    #[test]
    fn trailing_dash_in_comment() {
        let errors = errors_with("<a><!-- bad- --></a>", Comments::new());
        assert!(errors.is_empty());
        let errors = errors_with("<a><!--bad---></a>", Comments::new());
        assert_eq!(errors.len(), 1);
    }

    #[test]
    fn reserved_pi_target() {
        let errors = errors_with("<a><?xMl data?></a>", ProcessingInstructions::new());
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].get("target"), Some("xMl"));
    }

    #[test]
    fn prolog_is_not_a_reserved_pi() {
        assert!(
            errors_with("<?xml version=\"1.0\"?><a/>", ProcessingInstructions::new()).is_empty()
        );
    }

    #[test]
    fn undeclared_prefix() {
        let errors = errors_with("<x:a/>", Namespaces::new());
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].kind(), ErrorKind::UndeclaredNamespace);
        assert_eq!(errors[0].get("prefix"), Some("x"));
    }

    #[test]
    fn declarations_scope_to_the_subtree() {
        let xml = r#"<a xmlns:p="urn:x"><p:b/></a><p:c/>"#;
        // The second root is ill-formed anyway, but namespace-wise only
        // <p:c/> is out of scope.
        let errors = errors_with(xml, Namespaces::new());
        let undeclared: Vec<_> = errors
            .iter()
            .filter(|e| e.kind() == ErrorKind::UndeclaredNamespace)
            .collect();
        assert_eq!(undeclared.len(), 2); // start and end of <p:c/>
    }

    #[test]
    fn redeclaring_a_prefix_is_permitted() {
        let xml = r#"<a xmlns:p="urn:1"><b xmlns:p="urn:2"><p:c/></b></a>"#;
        assert!(errors_with(xml, Namespaces::new()).is_empty());
    }

    #[test]
    fn reserved_bindings_are_rejected() {
        let errors = errors_with(
            r#"<a xmlns:xml="urn:wrong" xmlns:p="http://www.w3.org/XML/1998/namespace"/>"#,
            Namespaces::new(),
        );
        assert_eq!(errors.len(), 2);
    }

    #[test]
    fn xml_prefix_may_rebind_to_its_own_uri() {
        let errors = errors_with(
            r#"<a xmlns:xml="http://www.w3.org/XML/1998/namespace"/>"#,
            Namespaces::new(),
        );
        assert!(errors.is_empty());
    }
}
