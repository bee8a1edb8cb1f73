//! Batch orchestrator
//!
//! Drives a push parser to completion over a whole input: an in-memory
//! buffer, a reader, or a file. Engine failures met along the way are
//! absorbed into the [`ParseReport`]; only precondition failures are
//! returned as errors.

use std::io::{self, Read};
use std::marker::PhantomData;
use std::path::Path;

use tracing::{debug, warn};

use crate::config::{Dialect, ParserConfig, Xml};
use crate::encoding::{self, EncodingId};
use crate::error::{EngineError, ParseError};
use crate::handler::DocumentHandler;
use crate::push_parser::PushParser;
use crate::source::{self, IntoSource, Memory, Source};

/// Engine failures absorbed during one parse
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParseReport {
    pub engine_errors: Vec<EngineError>,
}

impl ParseReport {
    /// No engine failure occurred
    pub fn is_clean(&self) -> bool {
        self.engine_errors.is_empty()
    }

    /// First malformed-markup failure, if any
    pub fn first_malformed(&self) -> Option<&EngineError> {
        self.engine_errors.iter().find(|err| err.is_malformed())
    }

    pub(crate) fn absorb(&mut self, result: Result<(), EngineError>) {
        if let Err(err) = result {
            warn!(error = %err, "Absorbed engine failure");
            self.engine_errors.push(err);
        }
    }
}

/// Batch parser delivering events to a document handler
#[derive(Debug)]
pub struct Parser<H: DocumentHandler, D: Dialect = Xml> {
    document: H,
    config: ParserConfig,
    /// Encoding name used by the last parse
    encoding: Option<String>,
    dialect: PhantomData<D>,
}

impl<H: DocumentHandler> Parser<H> {
    /// Strict XML parser
    pub fn new(document: H) -> Self {
        Self::with_config(document, Xml::config())
    }
}

impl<H: DocumentHandler, D: Dialect> Parser<H, D> {
    pub fn with_config(document: H, config: ParserConfig) -> Self {
        Self {
            document,
            config,
            encoding: None,
            dialect: PhantomData,
        }
    }

    /// Parse a buffer or a reader, whichever `source` is
    pub fn parse<'s>(&mut self, source: impl IntoSource<'s>) -> Result<ParseReport, ParseError> {
        match source.into_source()? {
            Source::Memory(data) => self.parse_memory(data, None),
            Source::Stream(reader) => self.parse_io(reader, None),
        }
    }

    /// Parse an in-memory buffer
    pub fn parse_memory<'m>(
        &mut self,
        data: impl Into<Memory<'m>>,
        encoding: Option<&str>,
    ) -> Result<ParseReport, ParseError> {
        self.parse_memory_with(data, encoding, |_| {})
    }

    /// Parse an in-memory buffer, letting `configure` adjust the session
    /// before any byte is fed
    pub fn parse_memory_with<'m, F>(
        &mut self,
        data: impl Into<Memory<'m>>,
        encoding: Option<&str>,
        configure: F,
    ) -> Result<ParseReport, ParseError>
    where
        F: FnOnce(&mut PushParser<&mut H>),
    {
        let data = data.into().bytes(self.config.empty_buffers)?;
        let encoding = self.select_encoding(encoding, false);

        let mut parser = PushParser::with_options(&mut self.document, D::MODE, None, encoding);
        configure(&mut parser);
        Ok(drive_memory(&mut parser, data))
    }

    /// Parse everything `reader` yields
    pub fn parse_io<R: Read>(
        &mut self,
        reader: R,
        encoding: Option<&str>,
    ) -> Result<ParseReport, ParseError> {
        self.parse_io_with(reader, encoding, |_| {})
    }

    pub fn parse_io_with<R: Read, F>(
        &mut self,
        mut reader: R,
        encoding: Option<&str>,
        configure: F,
    ) -> Result<ParseReport, ParseError>
    where
        F: FnOnce(&mut PushParser<&mut H>),
    {
        let encoding = self.select_encoding(encoding, true);
        let read_size = self.config.read_size;

        let mut parser = PushParser::with_options(&mut self.document, D::MODE, None, encoding);
        configure(&mut parser);
        drive_stream(&mut parser, &mut reader, read_size)
    }

    /// Parse the file at `path`; its name prefixes diagnostics
    pub fn parse_file(&mut self, path: impl AsRef<Path>) -> Result<ParseReport, ParseError> {
        self.parse_file_with(path, None, |_| {})
    }

    pub fn parse_file_with<F>(
        &mut self,
        path: impl AsRef<Path>,
        encoding: Option<&str>,
        configure: F,
    ) -> Result<ParseReport, ParseError>
    where
        F: FnOnce(&mut PushParser<&mut H>),
    {
        let path = path.as_ref();
        let mut file = source::open_file(path)?;
        let filename = path.to_string_lossy();
        let encoding = self.select_encoding(encoding, true);
        let read_size = self.config.read_size;

        let mut parser =
            PushParser::with_options(&mut self.document, D::MODE, Some(&filename), encoding);
        configure(&mut parser);
        drive_stream(&mut parser, &mut file, read_size)
    }

    pub fn document(&self) -> &H {
        &self.document
    }

    pub fn document_mut(&mut self) -> &mut H {
        &mut self.document
    }

    pub fn into_document(self) -> H {
        self.document
    }

    pub fn config(&self) -> &ParserConfig {
        &self.config
    }

    /// Encoding name used by the last parse
    pub fn encoding(&self) -> Option<&str> {
        self.encoding.as_deref()
    }

    /// Pick the requested or default encoding and resolve it.
    /// Unknown names resolve to nothing, which means auto-detect.
    fn select_encoding(&mut self, requested: Option<&str>, stream: bool) -> Option<EncodingId> {
        let name = match requested {
            Some(name) => name,
            None if stream => self.config.io_encoding.as_str(),
            None => self.config.memory_encoding.as_str(),
        }
        .to_string();

        let id = encoding::resolve(&name);
        if id.is_none() {
            debug!(encoding = %name, "Unknown encoding, auto-detecting");
        }
        self.encoding = Some(name);
        id
    }
}

/// Feed a whole buffer and finish
pub(crate) fn drive_memory<H: DocumentHandler>(parser: &mut PushParser<H>, data: &[u8]) -> ParseReport {
    let mut report = ParseReport::default();
    report.absorb(parser.feed(data));
    report.absorb(parser.finish());
    report
}

/// Read fixed-size chunks until the reader is exhausted, then finish.
///
/// A read failure still finishes the session before it is returned.
pub(crate) fn drive_stream<H: DocumentHandler>(
    parser: &mut PushParser<H>,
    reader: &mut dyn Read,
    read_size: usize,
) -> Result<ParseReport, ParseError> {
    let mut report = ParseReport::default();
    let mut buffer = vec![0u8; read_size.max(1)];

    let outcome = loop {
        match reader.read(&mut buffer) {
            Ok(0) => break Ok(()),
            Ok(n) => report.absorb(parser.feed(&buffer[..n])),
            Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
            Err(err) => break Err(err),
        }
    };
    report.absorb(parser.finish());

    outcome?;
    Ok(report)
}
