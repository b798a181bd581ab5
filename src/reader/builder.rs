use std::fs::File;
use std::io::BufReader;
use std::marker::PhantomData;
use std::path::Path;

use crate::chars::{Edition, Edition4, Edition5};
use crate::errors::Result;
use crate::position::PositionMode;
use crate::reader::parser::FlowParser;
use crate::reader::{ChunkSource, Reader};

/// The raw option set shared by every builder front-end.
pub(crate) struct InnerReaderBuilder {
    pub(crate) positions: PositionMode,
    pub(crate) skip_whitespace: bool,
    pub(crate) skip_comments: bool,
    pub(crate) skip_cdata: bool,
    pub(crate) skip_prolog: bool,
    pub(crate) skip_characters: bool,
    pub(crate) skip_processing_instructions: bool,
}

impl Default for InnerReaderBuilder {
    fn default() -> Self {
        Self {
            positions: PositionMode::Full,
            skip_whitespace: false,
            skip_comments: false,
            skip_cdata: false,
            skip_prolog: false,
            skip_characters: false,
            skip_processing_instructions: false,
        }
    }
}

/// Builder for configuring a new [`Reader`].
///
/// The edition is part of the builder's type so that the reader it
/// produces is monomorphized over the right character classes:
///
/// ```
/// use xml_flow::{Reader, Edition4};
///
/// let reader = Reader::builder()
///     .skip_whitespace(true)
///     .edition4()
///     .into_str_reader("<doc/>");
/// # let _: xml_flow::Reader<&[u8], Edition4> = reader;
/// ```
pub struct ReaderBuilder<E: Edition = Edition5> {
    inner: InnerReaderBuilder,
    _edition: PhantomData<E>,
}

impl ReaderBuilder<Edition5> {
    /// Creates a new builder with default settings: Fifth Edition names,
    /// full positions, no events skipped.
    pub fn new() -> Self {
        Self {
            inner: InnerReaderBuilder::default(),
            _edition: PhantomData,
        }
    }
}

impl Default for ReaderBuilder<Edition5> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: Edition> ReaderBuilder<E> {
    /// Switches name validation to the Fourth Edition character classes.
    pub fn edition4(self) -> ReaderBuilder<Edition4> {
        ReaderBuilder {
            inner: self.inner,
            _edition: PhantomData,
        }
    }

    /// Switches name validation to the Fifth Edition character classes
    /// (the default).
    pub fn edition5(self) -> ReaderBuilder<Edition5> {
        ReaderBuilder {
            inner: self.inner,
            _edition: PhantomData,
        }
    }

    /// Changes how much position information events carry.
    ///
    /// ([`PositionMode::Full`] by default)
    pub fn positions(mut self, mode: PositionMode) -> Self {
        self.inner.positions = mode;
        self
    }

    /// Skips whitespace-only character data at the source.
    ///
    /// (`false` by default)
    pub fn skip_whitespace(mut self, val: bool) -> Self {
        self.inner.skip_whitespace = val;
        self
    }

    /// Skips comments at the source.
    ///
    /// (`false` by default)
    pub fn skip_comments(mut self, val: bool) -> Self {
        self.inner.skip_comments = val;
        self
    }

    /// Skips CDATA sections at the source.
    ///
    /// (`false` by default)
    pub fn skip_cdata(mut self, val: bool) -> Self {
        self.inner.skip_cdata = val;
        self
    }

    /// Skips the XML declaration at the source.
    ///
    /// (`false` by default)
    pub fn skip_prolog(mut self, val: bool) -> Self {
        self.inner.skip_prolog = val;
        self
    }

    /// Skips non-whitespace character data at the source.
    ///
    /// (`false` by default)
    pub fn skip_characters(mut self, val: bool) -> Self {
        self.inner.skip_characters = val;
        self
    }

    /// Skips processing instructions at the source.
    ///
    /// (`false` by default)
    pub fn skip_processing_instructions(mut self, val: bool) -> Self {
        self.inner.skip_processing_instructions = val;
        self
    }

    /// Builds a [`Reader`] reading from the given `BufRead`.
    pub fn into_reader<R>(self, reader: R) -> Reader<R, E> {
        Reader {
            reader,
            parser: FlowParser::from_builder(&self.inner),
            buf: Vec::new(),
        }
    }

    /// Builds a [`Reader`] reading from a string slice.
    pub fn into_str_reader(self, input: &str) -> Reader<&[u8], E> {
        self.into_reader(input.as_bytes())
    }

    /// Builds a [`Reader`] reading from an in-memory byte buffer.
    pub fn into_bytes_reader(self, input: &[u8]) -> Reader<&[u8], E> {
        self.into_reader(input)
    }

    /// Builds a [`Reader`] pulling chunks from an iterator, for input that
    /// arrives in pieces.
    pub fn into_chunk_reader<I>(self, chunks: I) -> Reader<ChunkSource<I>, E>
    where
        I: Iterator<Item = Vec<u8>>,
    {
        self.into_reader(ChunkSource::new(chunks))
    }

    /// Builds a [`Reader`] reading from a file path.
    pub fn into_file_reader<P: AsRef<Path>>(self, path: P) -> Result<Reader<BufReader<File>, E>> {
        let file = File::open(path)?;
        Ok(self.into_reader(BufReader::new(file)))
    }
}
