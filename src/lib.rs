//! Streaming XML 1.0 processing: a pull tokenizer, a composable event
//! pipeline, and canonical (C14N) serialization.
//!
//! A parse is a lazy sequence of [`Event`]s produced in document order
//! with constant memory in the size of the input: bytes go in from a
//! slice, any `BufRead` or an iterator of chunks, and events come out,
//! each carrying the [`Position`] where its construct began. Faults are
//! values on the same stream ([`Event::Error`]), so the consumer decides
//! whether to tolerate, collect, or halt.
//!
//! Downstream stages compose over any `Iterator<Item = Event>`:
//! [`pipeline::Pipeline`] folds transforms over the stream while
//! enforcing tag balance, [`validate`] holds the well-formedness checks,
//! [`namespace::NamespaceResolver`] expands prefixes,
//! [`entity::EntityResolver`] applies the DTD, and [`c14n`] serializes
//! the canonical byte form.
//!
//! ## Example
//!
//! ```
//! use xml_flow::events::Event;
//! use xml_flow::pipeline::EventStream;
//! use xml_flow::validate::{Attributes, WellFormed};
//! use xml_flow::Reader;
//!
//! let xml = r#"<greeting lang="en">hello &amp; welcome</greeting>"#;
//! let events = Reader::from_str(xml)
//!     .into_events()
//!     .transform(WellFormed::new())
//!     .transform(Attributes::new());
//!
//! for event in events {
//!     match event {
//!         Event::StartElement(e) => {
//!             assert_eq!(e.name().local_name(), "greeting");
//!             assert_eq!(e.attributes().get("lang"), Some("en"));
//!         }
//!         Event::Characters(t) => assert_eq!(t.content(), "hello & welcome"),
//!         Event::Error(e) => panic!("fault at {}: {}", e.position(), e),
//!         _ => {}
//!     }
//! }
//! ```
//!
//! ## Editions
//!
//! Name validation follows the W3C XML 1.0 Fifth Edition by default; the
//! Fourth Edition's Appendix B classes are available through
//! [`ReaderBuilder::edition4`]. The reader is monomorphized over the
//! edition, so the choice costs nothing at the scanning hot path.
//!
//! ## Input
//!
//! Input must be UTF-8; a byte-order mark is consumed silently. Callers
//! holding other encodings transcode before parsing.
//!
//! ## Features
#![cfg_attr(
    feature = "document-features",
    cfg_attr(doc, doc = ::document_features::document_features!())
)]

pub mod c14n;
pub mod chars;
pub mod dtd;
pub mod entity;
pub mod errors;
pub mod escape;
pub mod events;
pub mod name;
pub mod namespace;
pub mod pipeline;
pub mod position;
pub mod reader;
pub mod validate;

pub use crate::chars::{Edition, Edition4, Edition5};
pub use crate::errors::{format_context, Error, ErrorKind, ParseError, Result};
pub use crate::events::Event;
pub use crate::position::{Position, PositionMode};
pub use crate::reader::{ChunkSource, Events, Reader, ReaderBuilder};
