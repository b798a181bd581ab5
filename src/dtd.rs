//! DOCTYPE declaration parsing and the DTD model.
//!
//! The reader hands the raw declaration text over as a single
//! [`Doctype`](crate::events::Event::Doctype) event; this module parses it
//! into a [`DtdModel`]: the root element name, element content models,
//! attribute-list declarations, general and parameter entities, and
//! notations. The model is built once and read-only afterwards; the
//! entity stage borrows it for resolution.
//!
//! The internal subset is scanned by a hand-written cursor: quoted
//! strings, nested `<...>` declarations and comments are all significant
//! when locating declaration boundaries.

use std::collections::BTreeMap;

use crate::chars::is_pubid_char;
use crate::errors::{ErrorKind, ParseError};
use crate::escape::resolve_char_refs_only;
use crate::position::Position;
use crate::reader::is_whitespace;

/// A `SYSTEM` or `PUBLIC` external identifier.
#[derive(Clone, Debug, PartialEq)]
pub struct ExternalId {
    system: String,
    public: Option<String>,
}

impl ExternalId {
    pub fn system(system: impl Into<String>) -> Self {
        Self {
            system: system.into(),
            public: None,
        }
    }

    pub fn public(public: impl Into<String>, system: impl Into<String>) -> Self {
        Self {
            system: system.into(),
            public: Some(public.into()),
        }
    }

    pub fn system_id(&self) -> &str {
        &self.system
    }

    pub fn public_id(&self) -> Option<&str> {
        self.public.as_deref()
    }
}

/// The replacement text of an entity, or where to find it.
#[derive(Clone, Debug, PartialEq)]
pub enum EntityValue {
    /// A literal value from the declaration, with character and
    /// parameter-entity references already substituted.
    Internal(String),
    /// An external identifier; fetched only through a caller-supplied
    /// resolver hook.
    External(ExternalId),
}

/// A simplified element content model.
#[derive(Clone, Debug, PartialEq)]
pub enum ContentModel {
    Empty,
    Any,
    /// `(#PCDATA)`
    PcData,
    /// `(#PCDATA | a | b)*`: character data mixed with the listed names.
    Mixed(Vec<String>),
    /// A children content model, kept as its raw descriptor text.
    Children(String),
}

/// The default discipline of a declared attribute.
#[derive(Clone, Debug, PartialEq)]
pub enum AttDefault {
    Required,
    Implied,
    Fixed(String),
    Value(String),
}

/// One attribute declaration from an `<!ATTLIST>`.
#[derive(Clone, Debug, PartialEq)]
pub struct AttlistDecl {
    name: String,
    att_type: String,
    default: AttDefault,
}

impl AttlistDecl {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The declared type, e.g. `CDATA`, `ID` or an enumeration.
    pub fn att_type(&self) -> &str {
        &self.att_type
    }

    pub fn default(&self) -> &AttDefault {
        &self.default
    }
}

/// The parsed document type declaration.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DtdModel {
    root: String,
    external_id: Option<ExternalId>,
    elements: BTreeMap<String, ContentModel>,
    attlists: BTreeMap<String, Vec<AttlistDecl>>,
    general: BTreeMap<String, EntityValue>,
    parameters: BTreeMap<String, EntityValue>,
    notations: BTreeMap<String, ExternalId>,
}

impl DtdModel {
    /// The declared root element name.
    pub fn root(&self) -> &str {
        &self.root
    }

    pub fn external_id(&self) -> Option<&ExternalId> {
        self.external_id.as_ref()
    }

    pub fn element(&self, name: &str) -> Option<&ContentModel> {
        self.elements.get(name)
    }

    pub fn elements(&self) -> &BTreeMap<String, ContentModel> {
        &self.elements
    }

    pub fn attributes_of(&self, element: &str) -> &[AttlistDecl] {
        self.attlists.get(element).map_or(&[], Vec::as_slice)
    }

    pub fn entity(&self, name: &str) -> Option<&EntityValue> {
        self.general.get(name)
    }

    pub fn entities(&self) -> &BTreeMap<String, EntityValue> {
        &self.general
    }

    pub fn parameter_entity(&self, name: &str) -> Option<&EntityValue> {
        self.parameters.get(name)
    }

    pub fn notation(&self, name: &str) -> Option<&ExternalId> {
        self.notations.get(name)
    }

    /// Parses the raw content of a DOCTYPE declaration (everything
    /// between `<!` and the closing `>`). Faults are collected rather
    /// than aborting the scan, so a usable model comes back even from a
    /// sloppy subset.
    pub fn parse(content: &str, base: Position) -> (DtdModel, Vec<ParseError>) {
        let mut cursor = Cursor::new(content, base);
        let mut model = DtdModel::default();
        let mut errors = Vec::new();

        if !cursor.take_keyword("DOCTYPE") {
            errors.push(cursor.fault("Expected DOCTYPE"));
            return (model, errors);
        }
        cursor.skip_ws();
        model.root = cursor.take_name().to_string();
        if model.root.is_empty() {
            errors.push(cursor.fault("DOCTYPE must name a root element"));
            return (model, errors);
        }
        cursor.skip_ws();
        if let Some(id) = cursor.take_external_id(&mut errors) {
            model.external_id = Some(id);
        }
        cursor.skip_ws();
        if cursor.take_byte(b'[') {
            parse_subset(&mut cursor, &mut model, &mut errors);
        }
        (model, errors)
    }

    /// Looks for a reference cycle among the general entities, walking
    /// the entity-to-entity reference graph. Returns the entities on the
    /// first cycle found; expansion must not be attempted if this is
    /// `Some`.
    pub fn find_entity_cycle(&self) -> Option<Vec<String>> {
        #[derive(Clone, Copy, PartialEq)]
        enum Mark {
            White,
            Grey,
            Black,
        }

        fn visit(
            model: &DtdModel,
            name: &str,
            marks: &mut BTreeMap<String, Mark>,
            trail: &mut Vec<String>,
        ) -> bool {
            match marks.get(name).copied().unwrap_or(Mark::White) {
                Mark::Black => return false,
                Mark::Grey => {
                    trail.push(name.to_string());
                    return true;
                }
                Mark::White => {}
            }
            marks.insert(name.to_string(), Mark::Grey);
            if let Some(EntityValue::Internal(value)) = model.general.get(name) {
                for reference in scan_entity_refs(value) {
                    if model.general.contains_key(&reference)
                        && visit(model, &reference, marks, trail)
                    {
                        trail.push(name.to_string());
                        return true;
                    }
                }
            }
            marks.insert(name.to_string(), Mark::Black);
            false
        }

        let mut marks = BTreeMap::new();
        for name in self.general.keys() {
            let mut trail = Vec::new();
            if visit(self, name, &mut marks, &mut trail) {
                trail.reverse();
                return Some(trail);
            }
        }
        None
    }
}

/// The `&name;` references inside an entity value, in order.
pub(crate) fn scan_entity_refs(value: &str) -> Vec<String> {
    let mut refs = Vec::new();
    let bytes = value.as_bytes();
    for start in memchr::memchr_iter(b'&', bytes) {
        if bytes.get(start + 1) == Some(&b'#') {
            continue;
        }
        if let Some(len) = memchr::memchr(b';', &bytes[start + 1..]) {
            if len > 0 {
                refs.push(value[start + 1..start + 1 + len].to_string());
            }
        }
    }
    refs
}

/// Scanning cursor over the declaration text.
struct Cursor<'a> {
    s: &'a str,
    i: usize,
    base: Position,
}

impl<'a> Cursor<'a> {
    fn new(s: &'a str, base: Position) -> Self {
        Self { s, i: 0, base }
    }

    fn bytes(&self) -> &'a [u8] {
        self.s.as_bytes()
    }

    fn peek(&self) -> Option<u8> {
        self.bytes().get(self.i).copied()
    }

    fn at_end(&self) -> bool {
        self.i >= self.s.len()
    }

    fn position(&self) -> Position {
        let prefix = &self.bytes()[..self.i];
        match memchr::memrchr(b'\n', prefix) {
            Some(last) => Position {
                line: self.base.line + memchr::memchr_iter(b'\n', prefix).count() as u64,
                line_start: self.base.absolute + last as u64 + 1,
                absolute: self.base.absolute + self.i as u64,
            },
            None => Position {
                line: self.base.line,
                line_start: self.base.line_start,
                absolute: self.base.absolute + self.i as u64,
            },
        }
    }

    fn fault(&self, message: impl Into<String>) -> ParseError {
        ParseError::new(ErrorKind::ParseError, message, self.position())
    }

    fn skip_ws(&mut self) {
        while self.peek().map_or(false, is_whitespace) {
            self.i += 1;
        }
    }

    fn take_byte(&mut self, byte: u8) -> bool {
        if self.peek() == Some(byte) {
            self.i += 1;
            true
        } else {
            false
        }
    }

    fn take_keyword(&mut self, keyword: &str) -> bool {
        if self.s[self.i..]
            .as_bytes()
            .get(..keyword.len())
            .map_or(false, |head| head.eq_ignore_ascii_case(keyword.as_bytes()))
        {
            self.i += keyword.len();
            true
        } else {
            false
        }
    }

    /// Takes a run of name characters (loose: anything that is not
    /// whitespace or a declaration delimiter).
    fn take_name(&mut self) -> &'a str {
        let start = self.i;
        while let Some(b) = self.peek() {
            if is_whitespace(b) || matches!(b, b'>' | b'<' | b'[' | b']' | b'(' | b')' | b'"' | b'\'' | b'%' | b';' | b'=') {
                break;
            }
            self.i += 1;
        }
        &self.s[start..self.i]
    }

    /// Takes a quoted literal, either quote style.
    fn take_literal(&mut self, errors: &mut Vec<ParseError>) -> Option<&'a str> {
        let quote = match self.peek() {
            Some(q) if q == b'"' || q == b'\'' => q,
            _ => {
                errors.push(self.fault("Expected a quoted literal"));
                return None;
            }
        };
        self.i += 1;
        let start = self.i;
        match memchr::memchr(quote, &self.bytes()[self.i..]) {
            Some(len) => {
                let literal = &self.s[start..start + len];
                self.i = start + len + 1;
                Some(literal)
            }
            None => {
                errors.push(self.fault("Unterminated literal"));
                self.i = self.s.len();
                None
            }
        }
    }

    /// Takes `SYSTEM "..."` or `PUBLIC "..." "..."` if present.
    fn take_external_id(&mut self, errors: &mut Vec<ParseError>) -> Option<ExternalId> {
        if self.take_keyword("SYSTEM") {
            self.skip_ws();
            let system = self.take_literal(errors)?;
            Some(ExternalId::system(system))
        } else if self.take_keyword("PUBLIC") {
            self.skip_ws();
            let public = self.take_literal(errors)?;
            if let Some(bad) = public.chars().find(|&c| !is_pubid_char(c)) {
                errors.push(self.fault(format!(
                    "Character {:?} is not allowed in a public identifier",
                    bad
                )));
            }
            self.skip_ws();
            // The system literal is optional for notations.
            let system = match self.peek() {
                Some(q) if q == b'"' || q == b'\'' => self.take_literal(errors)?,
                _ => "",
            };
            Some(ExternalId::public(public, system))
        } else {
            None
        }
    }

    /// Skips past the next occurrence of `needle`.
    fn skip_past(&mut self, needle: &str) {
        match self.s[self.i..].find(needle) {
            Some(at) => self.i += at + needle.len(),
            None => self.i = self.s.len(),
        }
    }

    /// Skips the remainder of a malformed declaration.
    fn skip_declaration(&mut self) {
        let mut depth = 0u32;
        while let Some(b) = self.peek() {
            self.i += 1;
            match b {
                b'"' | b'\'' => {
                    match memchr::memchr(b, &self.bytes()[self.i..]) {
                        Some(len) => self.i += len + 1,
                        None => self.i = self.s.len(),
                    }
                }
                b'<' => depth += 1,
                b'>' => {
                    if depth == 0 {
                        return;
                    }
                    depth -= 1;
                }
                _ => {}
            }
        }
    }
}

fn parse_subset(cursor: &mut Cursor<'_>, model: &mut DtdModel, errors: &mut Vec<ParseError>) {
    loop {
        cursor.skip_ws();
        match cursor.peek() {
            None => return,
            Some(b']') => return,
            Some(b'%') => {
                // DeclSep: a parameter-entity reference at subset level.
                cursor.i += 1;
                let name = cursor.take_name().to_string();
                if !cursor.take_byte(b';') {
                    errors.push(cursor.fault("Parameter entity reference is not terminated"));
                    cursor.skip_declaration();
                    continue;
                }
                match model.parameters.get(&name).cloned() {
                    Some(EntityValue::Internal(replacement)) => {
                        // Parse the replacement text as subset content.
                        let mut nested = Cursor::new(&replacement, cursor.position());
                        parse_subset(&mut nested, model, errors);
                    }
                    Some(EntityValue::External(_)) => {
                        // External parameter entities are not fetched.
                    }
                    None => {
                        errors.push(
                            cursor
                                .fault(format!("Parameter entity %{}; is not declared", name))
                                .with("entity", name),
                        );
                    }
                }
            }
            Some(b'<') => {
                if cursor.s[cursor.i..].starts_with("<!--") {
                    cursor.skip_past("-->");
                } else if cursor.s[cursor.i..].starts_with("<?") {
                    cursor.skip_past("?>");
                } else if cursor.take_keyword("<!ENTITY") {
                    parse_entity_decl(cursor, model, errors);
                } else if cursor.take_keyword("<!ELEMENT") {
                    parse_element_decl(cursor, model, errors);
                } else if cursor.take_keyword("<!ATTLIST") {
                    parse_attlist_decl(cursor, model, errors);
                } else if cursor.take_keyword("<!NOTATION") {
                    parse_notation_decl(cursor, model, errors);
                } else {
                    errors.push(cursor.fault("Unknown markup declaration"));
                    cursor.skip_declaration();
                }
            }
            Some(_) => {
                errors.push(cursor.fault("Unexpected content in internal subset"));
                cursor.skip_declaration();
            }
        }
    }
}

fn parse_entity_decl(cursor: &mut Cursor<'_>, model: &mut DtdModel, errors: &mut Vec<ParseError>) {
    cursor.skip_ws();
    let parameter = cursor.take_byte(b'%');
    if parameter {
        cursor.skip_ws();
    }
    let name = cursor.take_name().to_string();
    if name.is_empty() {
        errors.push(cursor.fault("Entity declaration without a name"));
        cursor.skip_declaration();
        return;
    }
    cursor.skip_ws();

    let value = if let Some(id) = cursor.take_external_id(errors) {
        cursor.skip_ws();
        // An optional NDATA clause marks an unparsed entity; the notation
        // name itself is not retained in the model.
        if cursor.take_keyword("NDATA") {
            cursor.skip_ws();
            cursor.take_name();
            cursor.skip_ws();
        }
        Some(EntityValue::External(id))
    } else {
        match cursor.take_literal(errors) {
            Some(literal) => {
                let resolved = substitute_in_entity_value(literal, cursor, model, errors);
                Some(EntityValue::Internal(resolved))
            }
            None => None,
        }
    };
    cursor.skip_ws();
    if !cursor.take_byte(b'>') {
        errors.push(cursor.fault(format!("Entity declaration {} is not terminated", name)));
        cursor.skip_declaration();
    }

    if let Some(value) = value {
        // The first declaration of an entity is binding.
        let table = if parameter {
            &mut model.parameters
        } else {
            &mut model.general
        };
        table.entry(name).or_insert(value);
    }
}

/// Substitutes character references and parameter-entity references in an
/// entity value literal, per XML 1.0 §4.4.5. General entity references
/// stay untouched until the value is actually used.
fn substitute_in_entity_value(
    literal: &str,
    cursor: &Cursor<'_>,
    model: &DtdModel,
    errors: &mut Vec<ParseError>,
) -> String {
    let (step, mut faults) = resolve_char_refs_only(literal, cursor.position());
    errors.append(&mut faults);

    if !step.contains('%') {
        return step;
    }
    let mut out = String::with_capacity(step.len());
    let mut rest = step.as_str();
    while let Some(at) = rest.find('%') {
        out.push_str(&rest[..at]);
        let tail = &rest[at + 1..];
        match tail.find(';') {
            Some(end) if end > 0 => {
                let name = &tail[..end];
                match model.parameters.get(name) {
                    Some(EntityValue::Internal(value)) => out.push_str(value),
                    Some(EntityValue::External(_)) => {}
                    None => {
                        errors.push(
                            cursor
                                .fault(format!("Parameter entity %{}; is not declared", name))
                                .with("entity", name),
                        );
                    }
                }
                rest = &tail[end + 1..];
            }
            _ => {
                out.push('%');
                rest = tail;
            }
        }
    }
    out.push_str(rest);
    out
}

fn parse_element_decl(cursor: &mut Cursor<'_>, model: &mut DtdModel, errors: &mut Vec<ParseError>) {
    cursor.skip_ws();
    let name = cursor.take_name().to_string();
    if name.is_empty() {
        errors.push(cursor.fault("Element declaration without a name"));
        cursor.skip_declaration();
        return;
    }
    cursor.skip_ws();

    let content = if cursor.take_keyword("EMPTY") {
        ContentModel::Empty
    } else if cursor.take_keyword("ANY") {
        ContentModel::Any
    } else if cursor.peek() == Some(b'(') {
        let descriptor = take_balanced_parens(cursor);
        if descriptor.contains("#PCDATA") {
            let names: Vec<String> = descriptor
                .trim_start_matches('(')
                .trim_end_matches(|c| c == ')' || c == '*')
                .split('|')
                .map(str::trim)
                .filter(|part| !part.is_empty() && *part != "#PCDATA")
                .map(String::from)
                .collect();
            if names.is_empty() {
                ContentModel::PcData
            } else {
                ContentModel::Mixed(names)
            }
        } else {
            ContentModel::Children(descriptor)
        }
    } else {
        errors.push(cursor.fault(format!("Element {} has no content model", name)));
        cursor.skip_declaration();
        return;
    };
    cursor.skip_ws();
    if !cursor.take_byte(b'>') {
        errors.push(cursor.fault(format!("Element declaration {} is not terminated", name)));
        cursor.skip_declaration();
    }
    model.elements.entry(name).or_insert(content);
}

/// Takes a parenthesized group including nested groups and an optional
/// occurrence marker, returning its text.
fn take_balanced_parens(cursor: &mut Cursor<'_>) -> String {
    let start = cursor.i;
    if cursor.peek() != Some(b'(') {
        return String::new();
    }
    let mut depth = 0u32;
    while let Some(b) = cursor.peek() {
        cursor.i += 1;
        match b {
            b'(' => depth += 1,
            b')' => {
                depth -= 1;
                if depth == 0 {
                    break;
                }
            }
            _ => {}
        }
    }
    if matches!(cursor.peek(), Some(b'?') | Some(b'*') | Some(b'+')) {
        cursor.i += 1;
    }
    cursor.s[start..cursor.i].to_string()
}

fn parse_attlist_decl(cursor: &mut Cursor<'_>, model: &mut DtdModel, errors: &mut Vec<ParseError>) {
    cursor.skip_ws();
    let element = cursor.take_name().to_string();
    if element.is_empty() {
        errors.push(cursor.fault("Attribute-list declaration without an element name"));
        cursor.skip_declaration();
        return;
    }
    let decls = model.attlists.entry(element).or_insert_with(Vec::new);

    loop {
        cursor.skip_ws();
        if cursor.take_byte(b'>') || cursor.at_end() {
            return;
        }
        let name = cursor.take_name().to_string();
        if name.is_empty() {
            errors.push(cursor.fault("Attribute declaration without a name"));
            cursor.skip_declaration();
            return;
        }
        cursor.skip_ws();
        let att_type = if cursor.peek() == Some(b'(') {
            take_balanced_parens(cursor)
        } else {
            let keyword = cursor.take_name().to_string();
            if keyword == "NOTATION" {
                cursor.skip_ws();
                format!("NOTATION {}", take_balanced_parens(cursor))
            } else {
                keyword
            }
        };
        cursor.skip_ws();
        let default = if cursor.take_keyword("#REQUIRED") {
            AttDefault::Required
        } else if cursor.take_keyword("#IMPLIED") {
            AttDefault::Implied
        } else if cursor.take_keyword("#FIXED") {
            cursor.skip_ws();
            match cursor.take_literal(errors) {
                Some(value) => AttDefault::Fixed(value.to_string()),
                None => {
                    cursor.skip_declaration();
                    return;
                }
            }
        } else {
            match cursor.take_literal(errors) {
                Some(value) => AttDefault::Value(value.to_string()),
                None => {
                    cursor.skip_declaration();
                    return;
                }
            }
        };
        decls.push(AttlistDecl {
            name,
            att_type,
            default,
        });
    }
}

fn parse_notation_decl(cursor: &mut Cursor<'_>, model: &mut DtdModel, errors: &mut Vec<ParseError>) {
    cursor.skip_ws();
    let name = cursor.take_name().to_string();
    if name.is_empty() {
        errors.push(cursor.fault("Notation declaration without a name"));
        cursor.skip_declaration();
        return;
    }
    cursor.skip_ws();
    match cursor.take_external_id(errors) {
        Some(id) => {
            cursor.skip_ws();
            if !cursor.take_byte(b'>') {
                errors.push(cursor.fault(format!("Notation declaration {} is not terminated", name)));
                cursor.skip_declaration();
            }
            model.notations.entry(name).or_insert(id);
        }
        None => {
            errors.push(cursor.fault(format!(
                "Notation {} must have a SYSTEM or PUBLIC identifier",
                name
            )));
            cursor.skip_declaration();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn parse(content: &str) -> (DtdModel, Vec<ParseError>) {
        DtdModel::parse(content, Position::START)
    }

    #[test]
    fn bare_doctype() {
        let (model, errors) = parse("DOCTYPE greeting");
        assert!(errors.is_empty());
        assert_eq!(model.root(), "greeting");
        assert!(model.external_id().is_none());
    }

    #[test]
    fn external_id_forms() {
        let (model, errors) = parse("DOCTYPE r SYSTEM \"http://example.com/r.dtd\"");
        assert!(errors.is_empty());
        assert_eq!(model.external_id().unwrap().system_id(), "http://example.com/r.dtd");

        let (model, errors) = parse("DOCTYPE r PUBLIC \"-//EX//DTD r//EN\" 'r.dtd'");
        assert!(errors.is_empty());
        let id = model.external_id().unwrap();
        assert_eq!(id.public_id(), Some("-//EX//DTD r//EN"));
        assert_eq!(id.system_id(), "r.dtd");
    }

    #[test]
    fn entity_declarations() {
        let (model, errors) = parse(
            "DOCTYPE r [\n  <!ENTITY x \"y\">\n  <!ENTITY % p \"param\">\n  <!ENTITY ext SYSTEM \"e.txt\">\n]",
        );
        assert!(errors.is_empty());
        assert_eq!(
            model.entity("x"),
            Some(&EntityValue::Internal("y".to_string()))
        );
        assert_eq!(
            model.parameter_entity("p"),
            Some(&EntityValue::Internal("param".to_string()))
        );
        assert_eq!(
            model.entity("ext"),
            Some(&EntityValue::External(ExternalId::system("e.txt")))
        );
    }

    #[test]
    fn first_entity_declaration_wins() {
        let (model, _) = parse("DOCTYPE r [<!ENTITY a \"one\"><!ENTITY a \"two\">]");
        assert_eq!(
            model.entity("a"),
            Some(&EntityValue::Internal("one".to_string()))
        );
    }

    #[test]
    fn parameter_entities_substitute_into_values() {
        let (model, errors) =
            parse("DOCTYPE r [<!ENTITY % base \"core\"><!ENTITY full \"%base; extended\">]");
        assert!(errors.is_empty());
        assert_eq!(
            model.entity("full"),
            Some(&EntityValue::Internal("core extended".to_string()))
        );
    }

    #[test]
    fn char_refs_resolve_in_entity_values() {
        let (model, _) = parse("DOCTYPE r [<!ENTITY a \"&#65;&amp;\">]");
        // &#65; resolves at declaration time; &amp; stays for use time.
        assert_eq!(
            model.entity("a"),
            Some(&EntityValue::Internal("A&amp;".to_string()))
        );
    }

    #[test]
    fn element_declarations() {
        let (model, errors) = parse(
            "DOCTYPE r [\n  <!ELEMENT br EMPTY>\n  <!ELEMENT box ANY>\n  <!ELEMENT p (#PCDATA)>\n  <!ELEMENT m (#PCDATA | em | strong)*>\n  <!ELEMENT spec (front, body, back?)>\n]",
        );
        assert!(errors.is_empty());
        assert_eq!(model.element("br"), Some(&ContentModel::Empty));
        assert_eq!(model.element("box"), Some(&ContentModel::Any));
        assert_eq!(model.element("p"), Some(&ContentModel::PcData));
        assert_eq!(
            model.element("m"),
            Some(&ContentModel::Mixed(vec![
                "em".to_string(),
                "strong".to_string()
            ]))
        );
        assert_eq!(
            model.element("spec"),
            Some(&ContentModel::Children("(front, body, back?)".to_string()))
        );
    }

    #[test]
    fn attlist_declarations_accumulate() {
        let (model, errors) = parse(
            "DOCTYPE r [\n  <!ATTLIST img src CDATA #REQUIRED alt CDATA #IMPLIED>\n  <!ATTLIST img width CDATA \"auto\">\n]",
        );
        assert!(errors.is_empty());
        let attrs = model.attributes_of("img");
        assert_eq!(attrs.len(), 3);
        assert_eq!(attrs[0].name(), "src");
        assert_eq!(attrs[0].default(), &AttDefault::Required);
        assert_eq!(attrs[2].default(), &AttDefault::Value("auto".to_string()));
    }

    #[test]
    fn enumerated_attribute_types() {
        let (model, errors) =
            parse("DOCTYPE r [<!ATTLIST note kind (todo | done) \"todo\">]");
        assert!(errors.is_empty());
        let attrs = model.attributes_of("note");
        assert_eq!(attrs[0].att_type(), "(todo | done)");
    }

    #[test]
    fn notation_declarations() {
        let (model, errors) =
            parse("DOCTYPE r [<!NOTATION gif PUBLIC \"+//ISBN 0-7923-9432-1::gif\">]");
        assert!(errors.is_empty());
        assert!(model.notation("gif").is_some());
    }

    #[test]
    fn comments_and_pis_are_skipped() {
        let (model, errors) = parse(
            "DOCTYPE r [<!-- <!ENTITY fake \"x\"> --><?keep going?><!ENTITY real \"y\">]",
        );
        assert!(errors.is_empty());
        assert!(model.entity("fake").is_none());
        assert!(model.entity("real").is_some());
    }

    #[test]
    fn quoted_angle_brackets_do_not_confuse_the_scan() {
        let (model, errors) = parse("DOCTYPE r [<!ENTITY a \"<b>\">]");
        assert!(errors.is_empty());
        assert_eq!(
            model.entity("a"),
            Some(&EntityValue::Internal("<b>".to_string()))
        );
    }

    #[test]
    fn direct_cycle_is_found() {
        let (model, _) = parse("DOCTYPE r [<!ENTITY a \"&b;\"><!ENTITY b \"&a;\">]");
        let cycle = model.find_entity_cycle().expect("cycle");
        assert!(cycle.contains(&"a".to_string()));
        assert!(cycle.contains(&"b".to_string()));
    }

    #[test]
    fn self_reference_is_a_cycle() {
        let (model, _) = parse("DOCTYPE r [<!ENTITY a \"x &a; y\">]");
        assert!(model.find_entity_cycle().is_some());
    }

    #[test]
    fn acyclic_references_pass() {
        let (model, _) = parse("DOCTYPE r [<!ENTITY a \"&b; &b;\"><!ENTITY b \"leaf\">]");
        assert!(model.find_entity_cycle().is_none());
    }

    #[test]
    fn unknown_declarations_are_reported_and_skipped() {
        let (model, errors) = parse("DOCTYPE r [<!WAT nope><!ENTITY ok \"v\">]");
        assert_eq!(errors.len(), 1);
        assert!(model.entity("ok").is_some());
    }
}
