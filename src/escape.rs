//! Reference resolution and serialization escaping.
//!
//! The reader resolves character references and the five predefined
//! entities while it scans; any other `&name;` passes through untouched
//! for the entity stage. The escape direction lives here too, split into
//! the attribute and character-data rule sets the canonical form requires.

use std::borrow::Cow;

use crate::chars::is_xml_char;
use crate::errors::{ErrorKind, ParseError};
use crate::position::Position;

/// Resolves `&#N;`, `&#xN;` and the five predefined entity references in
/// character data, leaving all other `&name;` references verbatim.
///
/// Line ends are normalized (`\r\n` and bare `\r` become `\n`). Faults
/// such as a bare `&` or a character reference outside the XML `Char`
/// production are reported with positions relative to
/// `base` while the offending bytes stay in the output verbatim.
pub(crate) fn resolve_text(raw: &str, base: Position) -> (String, Vec<ParseError>) {
    resolve(raw, base, false)
}

/// Resolves references in an attribute value and applies the
/// unconditional attribute-value normalization step: every literal
/// whitespace character becomes a space. Whitespace introduced through
/// character references is preserved.
pub(crate) fn resolve_attr_value(raw: &str, base: Position) -> (String, Vec<ParseError>) {
    resolve(raw, base, true)
}

fn resolve(raw: &str, base: Position, attr: bool) -> (String, Vec<ParseError>) {
    let mut out = String::with_capacity(raw.len());
    let mut errors = Vec::new();
    let bytes = raw.as_bytes();
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            b'&' => match parse_reference(&raw[i..]) {
                Reference::Char(c, len) => {
                    out.push(c);
                    i += len;
                }
                Reference::Entity(len) => {
                    out.push_str(&raw[i..i + len]);
                    i += len;
                }
                Reference::Invalid(len, message) => {
                    errors.push(ParseError::new(
                        ErrorKind::InvalidCharacter,
                        message,
                        offset_position(raw, i, base),
                    ));
                    out.push_str(&raw[i..i + len]);
                    i += len;
                }
            },
            b'\r' => {
                out.push(if attr { ' ' } else { '\n' });
                i += 1;
                if bytes.get(i) == Some(&b'\n') {
                    i += 1;
                }
            }
            b'\t' | b'\n' if attr => {
                out.push(' ');
                i += 1;
            }
            _ => {
                // Copy plain bytes through in one slice; the current byte
                // is already known to be plain, so start past it.
                let rest = &bytes[i + 1..];
                let stop = if attr {
                    let tabs = memchr::memchr3(b'&', b'\r', b'\t', rest);
                    let newline = memchr::memchr(b'\n', rest);
                    match (tabs, newline) {
                        (Some(a), Some(b)) => Some(a.min(b)),
                        (a, b) => a.or(b),
                    }
                } else {
                    memchr::memchr2(b'&', b'\r', rest)
                };
                let next = stop.map_or(bytes.len(), |p| i + 1 + p);
                out.push_str(&raw[i..next]);
                i = next;
            }
        }
    }
    (out, errors)
}

enum Reference {
    /// A resolved character, and the byte length of the reference.
    Char(char, usize),
    /// A syntactically valid `&name;` that is not predefined; kept as-is.
    Entity(usize),
    /// Not a reference at all; the length to copy through verbatim.
    Invalid(usize, String),
}

/// Parses the reference starting at the `&` in `rest[0..]`.
fn parse_reference(rest: &str) -> Reference {
    let end = match memchr::memchr(b';', rest.as_bytes()) {
        Some(end) if end > 1 => end,
        _ => {
            return Reference::Invalid(
                1,
                "'&' must start a character or entity reference".to_string(),
            )
        }
    };
    let body = &rest[1..end];
    let len = end + 1;

    if let Some(num) = body.strip_prefix('#') {
        let cp = if let Some(hex) = num.strip_prefix('x') {
            u32::from_str_radix(hex, 16)
        } else {
            num.parse::<u32>()
        };
        return match cp {
            Ok(cp) if is_xml_char(cp) => {
                // Checked against the Char production just above.
                Reference::Char(std::char::from_u32(cp).unwrap(), len)
            }
            Ok(cp) => Reference::Invalid(len, format!("Invalid character U+{:04X}", cp)),
            Err(_) => Reference::Invalid(len, format!("Invalid character reference: &{};", body)),
        };
    }

    match body {
        "amp" => Reference::Char('&', len),
        "lt" => Reference::Char('<', len),
        "gt" => Reference::Char('>', len),
        "apos" => Reference::Char('\'', len),
        "quot" => Reference::Char('"', len),
        _ => Reference::Entity(len),
    }
}

/// Position of byte offset `i` within `raw`, relative to `base`.
fn offset_position(raw: &str, i: usize, base: Position) -> Position {
    if base == Position::default() {
        return base;
    }
    let prefix = &raw.as_bytes()[..i];
    let newlines = memchr::memchr_iter(b'\n', prefix).count() as u64;
    match memchr::memrchr(b'\n', prefix) {
        Some(last) => Position {
            line: base.line + newlines,
            line_start: base.absolute + last as u64 + 1,
            absolute: base.absolute + i as u64,
        },
        None => Position {
            line: base.line,
            line_start: base.line_start,
            absolute: base.absolute + i as u64,
        },
    }
}

/// Resolves numeric character references only, leaving every `&name;`
/// reference untouched, the predefined five included. This is the
/// substitution XML 1.0 §4.4 prescribes inside entity value literals.
pub(crate) fn resolve_char_refs_only(raw: &str, base: Position) -> (String, Vec<ParseError>) {
    let mut out = String::with_capacity(raw.len());
    let mut errors = Vec::new();
    let mut rest = raw;
    let mut consumed = 0usize;
    while let Some(at) = rest.find("&#") {
        out.push_str(&rest[..at]);
        match parse_reference(&rest[at..]) {
            Reference::Char(c, len) => {
                out.push(c);
                consumed += at + len;
                rest = &rest[at + len..];
            }
            Reference::Invalid(len, message) => {
                errors.push(ParseError::new(
                    ErrorKind::InvalidCharacter,
                    message,
                    offset_position(raw, consumed + at, base),
                ));
                out.push_str(&rest[at..at + len]);
                consumed += at + len;
                rest = &rest[at + len..];
            }
            Reference::Entity(len) => {
                out.push_str(&rest[at..at + len]);
                consumed += at + len;
                rest = &rest[at + len..];
            }
        }
    }
    out.push_str(rest);
    (out, errors)
}

/// Normalizes line ends: `\r\n` and bare `\r` become `\n` (XML 1.0
/// §2.11).
pub(crate) fn normalize_newlines(raw: &str) -> String {
    if memchr::memchr(b'\r', raw.as_bytes()).is_none() {
        return raw.to_string();
    }
    let mut out = String::with_capacity(raw.len());
    let bytes = raw.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        let next = memchr::memchr(b'\r', &bytes[i..]).map_or(bytes.len(), |p| i + p);
        out.push_str(&raw[i..next]);
        if next < bytes.len() {
            out.push('\n');
            i = next + 1;
            if bytes.get(i) == Some(&b'\n') {
                i += 1;
            }
        } else {
            i = next;
        }
    }
    out
}

/// Escapes `&`, `<`, `>`, `"` and `'` into predefined entity references.
pub fn escape(raw: &str) -> Cow<'_, str> {
    if memchr::memchr3(b'&', b'<', b'>', raw.as_bytes()).is_none()
        && memchr::memchr2(b'"', b'\'', raw.as_bytes()).is_none()
    {
        return Cow::Borrowed(raw);
    }
    let mut out = String::with_capacity(raw.len() + 8);
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(c),
        }
    }
    Cow::Owned(out)
}

/// Resolves character references and the five predefined entities,
/// ignoring positions. Unknown `&name;` references stay verbatim.
pub fn unescape(raw: &str) -> String {
    resolve(raw, Position::default(), false).0
}

/// Attribute-value escaping for the canonical form: `&`, `<`, `"` and
/// whitespace escaped, `>` preserved.
pub(crate) fn escape_attr_into(out: &mut String, value: &str) {
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '"' => out.push_str("&quot;"),
            '\t' => out.push_str("&#x9;"),
            '\n' => out.push_str("&#xA;"),
            '\r' => out.push_str("&#xD;"),
            _ => out.push(c),
        }
    }
}

/// Character-data escaping for the canonical form.
pub(crate) fn escape_text_into(out: &mut String, value: &str) {
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '\r' => out.push_str("&#xD;"),
            _ => out.push(c),
        }
    }
}
