//! Parse session context
//!
//! A `ParserContext` fixes the input and its encoding before any handler
//! exists. The engine is only created when a parser is attached through
//! [`ParserContext::parse_with`]; configuration set before that moment is
//! held back and handed over to the engine when it appears.

use std::io::Read;
use std::marker::PhantomData;
use std::path::Path;

use crate::config::{Dialect, ParserConfig, Xml};
use crate::encoding::{self, EncodingId};
use crate::engine::Engine;
use crate::error::ParseError;
use crate::handler::DocumentHandler;
use crate::parser::{ParseReport, Parser, drive_memory, drive_stream};
use crate::push_parser::PushParser;
use crate::source::{self, Memory, Source};

/// Owner of the entity replacement setting
#[derive(Debug)]
enum EntityReplacement {
    /// Never set, no engine yet
    Unset,
    /// Set before the engine existed
    Pending(bool),
    /// The engine holds it
    Bound(Box<dyn Engine>),
}

/// Input waiting for a document handler
pub struct ParserContext<'a, D: Dialect = Xml> {
    source: Option<Source<'a>>,
    encoding: Option<EncodingId>,
    filename: Option<String>,
    replacement: EntityReplacement,
    dialect: PhantomData<D>,
}

impl<'a> ParserContext<'a> {
    /// XML context over an in-memory buffer
    pub fn memory(data: impl Into<Memory<'a>>, encoding: Option<&str>) -> Result<Self, ParseError> {
        Self::from_memory(data, encoding)
    }

    /// XML context over a reader
    pub fn io(reader: impl Read + 'a, encoding: Option<&str>) -> Self {
        Self::from_io(reader, encoding)
    }

    /// XML context over a file
    pub fn file(path: impl AsRef<Path>, encoding: Option<&str>) -> Result<Self, ParseError> {
        Self::from_file(path, encoding)
    }
}

impl<'a, D: Dialect> ParserContext<'a, D> {
    pub fn from_memory(
        data: impl Into<Memory<'a>>,
        encoding: Option<&str>,
    ) -> Result<Self, ParseError> {
        Self::from_memory_with_config(data, encoding, &D::config())
    }

    /// Memory context checked against `config` instead of the dialect
    /// defaults, so an `Accept` empty-buffer policy admits `""`.
    pub fn from_memory_with_config(
        data: impl Into<Memory<'a>>,
        encoding: Option<&str>,
        config: &ParserConfig,
    ) -> Result<Self, ParseError> {
        let data = data.into().bytes(config.empty_buffers)?;
        let encoding = encoding.unwrap_or(&config.memory_encoding);
        Ok(Self::new(Source::Memory(data), encoding, None))
    }

    pub fn from_io(reader: impl Read + 'a, encoding: Option<&str>) -> Self {
        Self::from_io_with_config(reader, encoding, &D::config())
    }

    pub fn from_io_with_config(
        reader: impl Read + 'a,
        encoding: Option<&str>,
        config: &ParserConfig,
    ) -> Self {
        let encoding = encoding.unwrap_or(&config.io_encoding);
        Self::new(Source::Stream(Box::new(reader)), encoding, None)
    }

    pub fn from_file(path: impl AsRef<Path>, encoding: Option<&str>) -> Result<Self, ParseError> {
        Self::from_file_with_config(path, encoding, &D::config())
    }

    pub fn from_file_with_config(
        path: impl AsRef<Path>,
        encoding: Option<&str>,
        config: &ParserConfig,
    ) -> Result<Self, ParseError> {
        let path = path.as_ref();
        let file = source::open_file(path)?;
        let encoding = encoding.unwrap_or(&config.io_encoding);
        let filename = path.to_string_lossy().into_owned();
        Ok(Self::new(Source::Stream(Box::new(file)), encoding, Some(filename)))
    }

    fn new(source: Source<'a>, encoding: &str, filename: Option<String>) -> Self {
        Self {
            source: Some(source),
            encoding: encoding::resolve(encoding),
            filename,
            replacement: EntityReplacement::Unset,
            dialect: PhantomData,
        }
    }

    /// Parse the stored input into `parser`'s document handler
    pub fn parse_with<H: DocumentHandler>(
        &mut self,
        parser: &mut Parser<H, D>,
    ) -> Result<ParseReport, ParseError> {
        self.parse_with_config(parser, |_| {})
    }

    /// Like [`parse_with`](Self::parse_with), letting `configure` adjust the
    /// session before any byte is fed.
    ///
    /// The input can be parsed once; a second call fails with
    /// [`ParseError::InvalidArgument`].
    pub fn parse_with_config<H, F>(
        &mut self,
        parser: &mut Parser<H, D>,
        configure: F,
    ) -> Result<ParseReport, ParseError>
    where
        H: DocumentHandler,
        F: FnOnce(&mut PushParser<&mut H>),
    {
        let source = self
            .source
            .take()
            .ok_or(ParseError::InvalidArgument("parser context input was already parsed"))?;
        let read_size = parser.config().read_size;

        let mut push = PushParser::with_options(
            parser.document_mut(),
            D::MODE,
            self.filename.as_deref(),
            self.encoding,
        );
        if let EntityReplacement::Pending(replace) = self.replacement {
            push.set_replace_entities(replace);
        }
        configure(&mut push);

        let result = match source {
            Source::Memory(data) => Ok(drive_memory(&mut push, data)),
            Source::Stream(mut reader) => drive_stream(&mut push, &mut reader, read_size),
        };
        self.replacement = EntityReplacement::Bound(push.into_engine());
        result
    }

    /// Line of the engine cursor, 0 before parsing
    pub fn line(&self) -> u32 {
        match &self.replacement {
            EntityReplacement::Bound(engine) => engine.position().line,
            _ => 0,
        }
    }

    /// Column of the engine cursor, 0 before parsing
    pub fn column(&self) -> u32 {
        match &self.replacement {
            EntityReplacement::Bound(engine) => engine.position().column,
            _ => 0,
        }
    }

    pub fn replace_entities(&self) -> bool {
        match &self.replacement {
            EntityReplacement::Unset => false,
            EntityReplacement::Pending(replace) => *replace,
            EntityReplacement::Bound(engine) => engine.replace_entities(),
        }
    }

    pub fn set_replace_entities(&mut self, replace: bool) {
        match &mut self.replacement {
            EntityReplacement::Bound(engine) => engine.set_replace_entities(replace),
            pending => *pending = EntityReplacement::Pending(replace),
        }
    }

    /// Whether the input is still waiting to be parsed
    pub fn is_pending(&self) -> bool {
        self.source.is_some()
    }
}

impl<D: Dialect> std::fmt::Debug for ParserContext<'_, D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ParserContext")
            .field("mode", &D::MODE)
            .field("source", &self.source)
            .field("encoding", &self.encoding)
            .field("filename", &self.filename)
            .field("replacement", &self.replacement)
            .finish()
    }
}
