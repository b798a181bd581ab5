//! Qualified names.

use std::fmt;

/// Namespace URI bound to the `xml` prefix.
pub const NS_XML_URI: &str = "http://www.w3.org/XML/1998/namespace";
/// Namespace URI bound to the `xmlns` prefix.
pub const NS_XMLNS_URI: &str = "http://www.w3.org/2000/xmlns/";

/// A qualified XML name: optional prefix, local part, and (once a
/// namespace stage has run) the expanded namespace URI.
///
/// The reader leaves `namespace` unset; the
/// [`NamespaceResolver`](crate::namespace::NamespaceResolver) stage fills
/// it in. Equality includes all three parts, so comparing a resolved name
/// against an unresolved one fails; compare [`local_name`] and
/// [`namespace`] explicitly when that matters.
///
/// [`local_name`]: Name::local_name
/// [`namespace`]: Name::namespace
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Name {
    prefix: Option<String>,
    local: String,
    namespace: Option<String>,
}

impl Name {
    /// Splits a raw qualified name at the first colon.
    ///
    /// `a:b:c` splits into prefix `a`, local `b:c`; whether that local
    /// part is acceptable is a namespace-layer concern, not a tokenizer
    /// one (`:` is a plain name character in both editions).
    pub fn from_qualified(raw: &str) -> Self {
        match raw.find(':') {
            Some(i) if i > 0 && i + 1 < raw.len() => Self {
                prefix: Some(raw[..i].to_string()),
                local: raw[i + 1..].to_string(),
                namespace: None,
            },
            _ => Self {
                prefix: None,
                local: raw.to_string(),
                namespace: None,
            },
        }
    }

    /// A name known to have no prefix.
    pub fn local(local: impl Into<String>) -> Self {
        Self {
            prefix: None,
            local: local.into(),
            namespace: None,
        }
    }

    /// A prefixed name.
    pub fn prefixed(prefix: impl Into<String>, local: impl Into<String>) -> Self {
        Self {
            prefix: Some(prefix.into()),
            local: local.into(),
            namespace: None,
        }
    }

    pub fn prefix(&self) -> Option<&str> {
        self.prefix.as_deref()
    }

    pub fn local_name(&self) -> &str {
        &self.local
    }

    /// The expanded namespace URI, if a resolver stage has run.
    pub fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref()
    }

    /// Returns the same name with the namespace field set.
    pub fn with_namespace(mut self, uri: Option<String>) -> Self {
        self.namespace = uri;
        self
    }

    /// The name as written in the document, `prefix:local`.
    pub fn qualified(&self) -> String {
        self.to_string()
    }

    /// `true` when prefix and local part match, ignoring any resolved URI.
    pub fn matches(&self, other: &Name) -> bool {
        self.prefix == other.prefix && self.local == other.local
    }
}

impl fmt::Display for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.prefix {
            Some(p) => write!(f, "{}:{}", p, self.local),
            None => f.write_str(&self.local),
        }
    }
}

impl From<&str> for Name {
    fn from(raw: &str) -> Self {
        Name::from_qualified(raw)
    }
}
