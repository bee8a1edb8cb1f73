//! fOS SAX Parser
//!
//! Event-driven XML and HTML parsing. Input is turned into callbacks on a
//! [`DocumentHandler`] without building a tree.
//!
//! Three entry points share the same engines:
//! - [`Parser`] parses a whole buffer, reader or file.
//! - [`PushParser`] takes input chunk by chunk.
//! - [`ParserContext`] fixes the input first and attaches a handler later.
//!
//! HTML parsing uses the same types with the [`Html`] dialect, see
//! [`HtmlParser`] and [`HtmlParserContext`].
//!
//! Malformed markup never fails a parse call. Engine failures are reported
//! through the handler's `error` callback and collected in the returned
//! [`ParseReport`]; only bad arguments and unreadable input are errors.

pub mod encoding;
pub mod engine;

mod config;
mod context;
mod decode;
mod error;
mod handler;
mod html;
mod parser;
mod push_parser;
mod source;

pub use config::{Dialect, EmptyBufferPolicy, Html, ParserConfig, Xml};
pub use context::ParserContext;
pub use encoding::EncodingId;
pub use engine::{Mode, Position};
pub use error::{EngineError, ParseError};
pub use handler::{Attribute, DocumentHandler, EventRecorder, NullHandler, SaxEvent};
pub use html::{HtmlParser, HtmlParserContext};
pub use parser::{ParseReport, Parser};
pub use push_parser::PushParser;
pub use source::{IntoSource, Memory, Source, Stream};

/// Parse an XML buffer into `document`
pub fn parse_xml<H: DocumentHandler>(
    document: H,
    data: &[u8],
) -> Result<(H, ParseReport), ParseError> {
    let mut parser = Parser::new(document);
    let report = parser.parse_memory(data, None)?;
    Ok((parser.into_document(), report))
}

/// Parse an HTML buffer into `document`
pub fn parse_html<H: DocumentHandler>(
    document: H,
    data: &[u8],
) -> Result<(H, ParseReport), ParseError> {
    let mut parser = HtmlParser::html(document);
    let report = parser.parse_memory(data, None)?;
    Ok((parser.into_document(), report))
}
