//! Canonical XML serialization (C14N 1.0 and Exclusive C14N).
//!
//! A specimen consumer of the event stream: takes events in document
//! order and writes the canonical byte form: UTF-8, no BOM, namespace
//! declarations first and sorted, attributes sorted by (namespace URI,
//! local name), empty elements always written as `<tag></tag>`. The
//! empty-element rule needs exactly one event of lookahead: a start tag
//! is held until the next event shows whether its matching end tag
//! follows immediately.
//!
//! The prolog and DOCTYPE never appear in canonical output; comments only
//! in the `WithComments` modes. `Error` events are not serializable and
//! are skipped; run the stream through
//! [`halt_on_error`](crate::pipeline::EventStream::halt_on_error) first
//! if faults should abort instead.

use std::collections::BTreeMap;
use std::io::Write;

use crate::errors::Result;
use crate::escape::{escape_attr_into, escape_text_into};
use crate::events::{Attributes, Event, StartElement};
use crate::name::NS_XML_URI;

/// The four canonicalization algorithms, with their W3C identifiers.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum C14nMode {
    /// Canonical XML 1.0, comments removed.
    Canonical,
    /// Canonical XML 1.0, comments retained.
    CanonicalWithComments,
    /// Exclusive canonicalization, comments removed.
    Exclusive,
    /// Exclusive canonicalization, comments retained.
    ExclusiveWithComments,
}

impl C14nMode {
    /// The algorithm identifier URI, byte for byte as published.
    pub fn uri(self) -> &'static str {
        match self {
            C14nMode::Canonical => "http://www.w3.org/TR/2001/REC-xml-c14n-20010315",
            C14nMode::CanonicalWithComments => {
                "http://www.w3.org/TR/2001/REC-xml-c14n-20010315#WithComments"
            }
            C14nMode::Exclusive => "http://www.w3.org/2001/10/xml-exc-c14n#",
            C14nMode::ExclusiveWithComments => {
                "http://www.w3.org/2001/10/xml-exc-c14n#WithComments"
            }
        }
    }

    /// Parses an algorithm identifier URI.
    pub fn from_uri(uri: &str) -> Option<Self> {
        [
            C14nMode::Canonical,
            C14nMode::CanonicalWithComments,
            C14nMode::Exclusive,
            C14nMode::ExclusiveWithComments,
        ]
        .iter()
        .copied()
        .find(|mode| mode.uri() == uri)
    }

    fn with_comments(self) -> bool {
        matches!(
            self,
            C14nMode::CanonicalWithComments | C14nMode::ExclusiveWithComments
        )
    }

    fn exclusive(self) -> bool {
        matches!(self, C14nMode::Exclusive | C14nMode::ExclusiveWithComments)
    }
}

/// Canonicalization options.
pub struct C14nOptions {
    mode: C14nMode,
    inclusive_namespaces: Vec<String>,
}

impl Default for C14nOptions {
    fn default() -> Self {
        Self {
            mode: C14nMode::Canonical,
            inclusive_namespaces: Vec::new(),
        }
    }
}

impl C14nOptions {
    pub fn new(mode: C14nMode) -> Self {
        Self {
            mode,
            inclusive_namespaces: Vec::new(),
        }
    }

    /// Prefixes to treat by the inclusive rule even in exclusive modes
    /// (the `InclusiveNamespaces PrefixList` of the spec).
    pub fn inclusive_namespaces<S: Into<String>>(
        mut self,
        prefixes: impl IntoIterator<Item = S>,
    ) -> Self {
        self.inclusive_namespaces = prefixes.into_iter().map(Into::into).collect();
        self
    }
}

/// Canonicalizes an event stream into a writer.
pub fn canonicalize<I, W>(events: I, options: &C14nOptions, out: &mut W) -> Result<()>
where
    I: Iterator<Item = Event>,
    W: Write,
{
    let mut serializer = Canonicalizer {
        options,
        stack: vec![Frame::default()],
        held: None,
        depth: 0,
        seen_root: false,
        buffer: String::new(),
    };
    for event in events {
        serializer.event(event);
        if !serializer.buffer.is_empty() {
            out.write_all(serializer.buffer.as_bytes())?;
            serializer.buffer.clear();
        }
    }
    Ok(())
}

/// Canonicalizes an event stream into a `String`.
pub fn canonicalize_to_string<I>(events: I, options: &C14nOptions) -> Result<String>
where
    I: Iterator<Item = Event>,
{
    let mut out = Vec::new();
    canonicalize(events, options, &mut out)?;
    // The serializer only ever writes UTF-8.
    Ok(String::from_utf8(out).expect("canonical output is UTF-8"))
}

/// Namespace bookkeeping for one open element: everything in scope, and
/// everything an ancestor (or the element itself) has already written.
#[derive(Clone, Default)]
struct Frame {
    in_scope: BTreeMap<String, String>,
    rendered: BTreeMap<String, String>,
}

/// A start tag held back one event for the empty-element rule.
struct Held {
    name: String,
    markup: String,
}

struct Canonicalizer<'o> {
    options: &'o C14nOptions,
    stack: Vec<Frame>,
    held: Option<Held>,
    depth: usize,
    seen_root: bool,
    buffer: String,
}

impl<'o> Canonicalizer<'o> {
    fn event(&mut self, event: Event) {
        match event {
            Event::StartDocument
            | Event::EndDocument
            | Event::Prolog(_)
            | Event::Doctype(_)
            | Event::DoctypeModel(_)
            | Event::Error(_) => {}
            Event::StartElement(e) => {
                self.flush_held();
                self.start_element(e);
                self.depth += 1;
                self.seen_root = true;
            }
            Event::EndElement(e) => {
                match self.held.take() {
                    Some(held) => {
                        // The very next event after the start tag is its
                        // end tag: the canonical empty-element form.
                        self.buffer.push_str(&held.markup);
                        self.buffer.push('>');
                        self.buffer.push_str("</");
                        self.buffer.push_str(&held.name);
                        self.buffer.push('>');
                    }
                    None => {
                        self.buffer.push_str("</");
                        self.buffer.push_str(&e.name().to_string());
                        self.buffer.push('>');
                    }
                }
                // Ill-formed input may close more than it opened; the
                // base frame stays.
                if self.stack.len() > 1 {
                    self.stack.pop();
                }
                self.depth = self.depth.saturating_sub(1);
            }
            Event::Characters(t) | Event::Whitespace(t) | Event::CData(t) => {
                if self.depth == 0 {
                    // Character data outside the document element does not
                    // appear in canonical form.
                    return;
                }
                self.flush_held();
                escape_text_into(&mut self.buffer, t.content());
            }
            Event::Comment(t) => {
                if !self.options.mode.with_comments() {
                    return;
                }
                self.flush_held();
                self.outside_root_break_before();
                self.buffer.push_str("<!--");
                self.buffer.push_str(t.content());
                self.buffer.push_str("-->");
                self.outside_root_break_after();
            }
            Event::ProcessingInstruction(pi) => {
                self.flush_held();
                self.outside_root_break_before();
                self.buffer.push_str("<?");
                self.buffer.push_str(pi.target());
                if !pi.data().is_empty() {
                    self.buffer.push(' ');
                    self.buffer.push_str(pi.data());
                }
                self.buffer.push_str("?>");
                self.outside_root_break_after();
            }
        }
    }

    /// Document-level comments and PIs are set off with line feeds: a
    /// trailing one before the root, a leading one after it.
    fn outside_root_break_before(&mut self) {
        if self.depth == 0 && self.seen_root {
            self.buffer.push('\n');
        }
    }

    fn outside_root_break_after(&mut self) {
        if self.depth == 0 && !self.seen_root {
            self.buffer.push('\n');
        }
    }

    /// A held start tag survives only until the next event; anything but
    /// the matching end tag turns it into a plain `<...>`.
    fn flush_held(&mut self) {
        if let Some(held) = self.held.take() {
            self.buffer.push_str(&held.markup);
            self.buffer.push('>');
        }
    }

    fn start_element(&mut self, element: StartElement) {
        let parent = self.stack.last().expect("root frame always present");
        let mut in_scope = parent.in_scope.clone();
        let mut rendered = parent.rendered.clone();

        for attr in element.attributes() {
            let name = attr.name();
            match (name.prefix(), name.local_name()) {
                (Some("xmlns"), local) => {
                    in_scope.insert(local.to_string(), attr.value().to_string());
                }
                (None, "xmlns") => {
                    in_scope.insert(String::new(), attr.value().to_string());
                }
                _ => {}
            }
        }

        let candidates = self.declaration_candidates(&element, &in_scope);

        let name = element.name().to_string();
        let mut markup = String::with_capacity(name.len() + 16);
        markup.push('<');
        markup.push_str(&name);

        for (prefix, uri) in candidates {
            let already = rendered.get(&prefix).map(String::as_str);
            if already == Some(uri.as_str()) {
                continue;
            }
            if uri.is_empty() {
                // xmlns="" is only needed to shadow a rendered non-empty
                // default; prefixes cannot be undeclared at all.
                if !prefix.is_empty() || already.map_or(true, str::is_empty) {
                    continue;
                }
            }
            if prefix.is_empty() {
                markup.push_str(" xmlns=\"");
            } else {
                markup.push_str(" xmlns:");
                markup.push_str(&prefix);
                markup.push_str("=\"");
            }
            escape_attr_into(&mut markup, &uri);
            markup.push('"');
            rendered.insert(prefix, uri);
        }

        for (_, attr) in sorted_attributes(element.attributes(), &in_scope) {
            markup.push(' ');
            markup.push_str(&attr.0);
            markup.push_str("=\"");
            escape_attr_into(&mut markup, &attr.1);
            markup.push('"');
        }

        self.stack.push(Frame { in_scope, rendered });
        self.held = Some(Held { name, markup });
    }

    /// The namespace declarations this element should consider rendering,
    /// sorted by prefix with the default namespace first.
    fn declaration_candidates(
        &self,
        element: &StartElement,
        in_scope: &BTreeMap<String, String>,
    ) -> BTreeMap<String, String> {
        if !self.options.mode.exclusive() {
            return in_scope.clone();
        }
        // Exclusive: only visibly utilized prefixes, plus the caller's
        // inclusive list.
        let mut candidates = BTreeMap::new();
        let mut utilize = |prefix: &str| {
            let uri = in_scope.get(prefix).cloned().unwrap_or_default();
            candidates.insert(prefix.to_string(), uri);
        };
        utilize(element.name().prefix().unwrap_or(""));
        for attr in element.attributes() {
            match attr.name().prefix() {
                Some("xmlns") | None => {}
                Some(prefix) => utilize(prefix),
            }
        }
        for prefix in &self.options.inclusive_namespaces {
            utilize(prefix);
        }
        candidates
    }
}

/// Attributes in canonical order: by namespace URI of the prefix (no
/// namespace first), then by local name. `xmlns` declarations are not
/// attributes in canonical form.
fn sorted_attributes(
    attributes: &Attributes,
    in_scope: &BTreeMap<String, String>,
) -> Vec<((String, String), (String, String))> {
    let mut sorted: Vec<((String, String), (String, String))> = attributes
        .iter()
        .filter(|attr| {
            let name = attr.name();
            !matches!(
                (name.prefix(), name.local_name()),
                (Some("xmlns"), _) | (None, "xmlns")
            )
        })
        .map(|attr| {
            let name = attr.name();
            let uri = match name.prefix() {
                None => String::new(),
                Some("xml") => NS_XML_URI.to_string(),
                Some(prefix) => in_scope.get(prefix).cloned().unwrap_or_default(),
            };
            (
                (uri, name.local_name().to_string()),
                (name.to_string(), attr.value().to_string()),
            )
        })
        .collect();
    sorted.sort();
    sorted
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Reader;
    use pretty_assertions::assert_eq;

    fn c14n(xml: &str) -> String {
        canonicalize_to_string(
            Reader::from_str(xml).into_events(),
            &C14nOptions::default(),
        )
        .unwrap()
    }

    fn c14n_with(xml: &str, options: &C14nOptions) -> String {
        canonicalize_to_string(Reader::from_str(xml).into_events(), options).unwrap()
    }

    #[test]
    fn algorithm_uris_are_exact() {
        assert_eq!(
            C14nMode::Canonical.uri(),
            "http://www.w3.org/TR/2001/REC-xml-c14n-20010315"
        );
        assert_eq!(
            C14nMode::CanonicalWithComments.uri(),
            "http://www.w3.org/TR/2001/REC-xml-c14n-20010315#WithComments"
        );
        assert_eq!(C14nMode::Exclusive.uri(), "http://www.w3.org/2001/10/xml-exc-c14n#");
        assert_eq!(
            C14nMode::ExclusiveWithComments.uri(),
            "http://www.w3.org/2001/10/xml-exc-c14n#WithComments"
        );
        assert_eq!(
            C14nMode::from_uri("http://www.w3.org/2001/10/xml-exc-c14n#"),
            Some(C14nMode::Exclusive)
        );
    }

    #[test]
    fn attributes_sort_and_empty_elements_expand() {
        assert_eq!(
            c14n("<root b='2' a='1'><child/></root>"),
            "<root a=\"1\" b=\"2\"><child></child></root>"
        );
    }

    #[test]
    fn prolog_and_doctype_are_suppressed() {
        assert_eq!(
            c14n("<?xml version=\"1.0\"?><!DOCTYPE r><r/>"),
            "<r></r>"
        );
    }

    #[test]
    fn comments_depend_on_the_mode() {
        let xml = "<a><!-- inner --></a>";
        assert_eq!(c14n(xml), "<a></a>");
        assert_eq!(
            c14n_with(xml, &C14nOptions::new(C14nMode::CanonicalWithComments)),
            "<a><!-- inner --></a>"
        );
    }

    #[test]
    fn document_level_comments_get_line_breaks() {
        let xml = "<!--before--><a/><!--after-->";
        assert_eq!(
            c14n_with(xml, &C14nOptions::new(C14nMode::CanonicalWithComments)),
            "<!--before-->\n<a></a>\n<!--after-->"
        );
    }

    #[test]
    fn pi_spacing() {
        assert_eq!(c14n("<a><?t d?><?empty?></a>"), "<a><?t d?><?empty?></a>");
    }

    #[test]
    fn text_escaping() {
        assert_eq!(
            c14n("<a>1 &lt; 2 &amp; 3 &gt; 2</a>"),
            "<a>1 &lt; 2 &amp; 3 &gt; 2</a>"
        );
    }

    #[test]
    fn cdata_becomes_escaped_text() {
        assert_eq!(c14n("<a><![CDATA[x < y & z]]></a>"), "<a>x &lt; y &amp; z</a>");
    }

    #[test]
    fn attribute_escaping_preserves_gt() {
        assert_eq!(
            c14n("<a v='x<y>&#x9;'/>"),
            "<a v=\"x&lt;y>&#x9;\"></a>"
        );
    }

    #[test]
    fn namespace_declarations_sort_default_first() {
        assert_eq!(
            c14n("<r xmlns:b='urn:b' xmlns='urn:d' xmlns:a='urn:a'/>"),
            "<r xmlns=\"urn:d\" xmlns:a=\"urn:a\" xmlns:b=\"urn:b\"></r>"
        );
    }

    #[test]
    fn inherited_declarations_are_not_repeated() {
        assert_eq!(
            c14n("<a xmlns:p='urn:p'><b xmlns:p='urn:p'><p:c/></b></a>"),
            "<a xmlns:p=\"urn:p\"><b><p:c></p:c></b></a>"
        );
    }

    #[test]
    fn attributes_sort_by_namespace_then_local() {
        let xml = "<r xmlns:z='urn:a' xmlns:y='urn:b' y:a='1' z:b='2' c='3'/>";
        assert_eq!(
            c14n(xml),
            "<r xmlns:y=\"urn:b\" xmlns:z=\"urn:a\" c=\"3\" z:b=\"2\" y:a=\"1\"></r>"
        );
    }

    #[test]
    fn exclusive_omits_unused_declarations() {
        let xml = "<a xmlns:p='urn:p' xmlns:q='urn:q'><p:b/></a>";
        assert_eq!(
            c14n_with(xml, &C14nOptions::new(C14nMode::Exclusive)),
            "<a><p:b xmlns:p=\"urn:p\"></p:b></a>"
        );
        // Inclusive keeps everything in scope on the element that
        // declared it.
        assert_eq!(
            c14n(xml),
            "<a xmlns:p=\"urn:p\" xmlns:q=\"urn:q\"><p:b></p:b></a>"
        );
    }

    #[test]
    fn exclusive_honors_the_inclusive_prefix_list() {
        let xml = "<a xmlns:p='urn:p' xmlns:q='urn:q'><p:b/></a>";
        let options =
            C14nOptions::new(C14nMode::Exclusive).inclusive_namespaces(vec!["q"]);
        assert_eq!(
            c14n_with(xml, &options),
            "<a xmlns:q=\"urn:q\"><p:b xmlns:p=\"urn:p\"></p:b></a>"
        );
    }

    #[test]
    fn empty_default_namespace_only_when_shadowing() {
        assert_eq!(c14n("<a xmlns=''/>"), "<a></a>");
        assert_eq!(
            c14n("<a xmlns='urn:d'><b xmlns=''/></a>"),
            "<a xmlns=\"urn:d\"><b xmlns=\"\"></b></a>"
        );
    }

    #[test]
    fn canonical_form_is_a_fixed_point() {
        let inputs = [
            "<root b='2' a='1'><child/>text &amp; tail</root>",
            "<a xmlns:p='urn:p'><p:b p:x='1' a='2'>v</p:b></a>",
            "<a>line1\r\nline2</a>",
        ];
        for xml in inputs.iter() {
            let once = c14n(xml);
            let twice = c14n(&once);
            assert_eq!(once, twice, "input {}", xml);
        }
    }
}
