//! HTML parsing
//!
//! The batch parser and the parse context with the [`Html`] dialect:
//! tolerant tokenization, `UTF-8` as the buffer default, `ASCII` as the
//! stream default and smaller reads.

use std::io::Read;
use std::path::Path;

use crate::config::{Dialect, Html};
use crate::context::ParserContext;
use crate::error::ParseError;
use crate::handler::DocumentHandler;
use crate::parser::Parser;
use crate::source::Memory;

/// Batch HTML parser
pub type HtmlParser<H> = Parser<H, Html>;

/// Parse context for HTML input
pub type HtmlParserContext<'a> = ParserContext<'a, Html>;

impl<H: DocumentHandler> Parser<H, Html> {
    /// Tolerant HTML parser with the HTML defaults
    pub fn html(document: H) -> Self {
        Self::with_config(document, Html::config())
    }
}

impl<'a> ParserContext<'a, Html> {
    pub fn html_memory(
        data: impl Into<Memory<'a>>,
        encoding: Option<&str>,
    ) -> Result<Self, ParseError> {
        Self::from_memory(data, encoding)
    }

    pub fn html_io(reader: impl Read + 'a, encoding: Option<&str>) -> Self {
        Self::from_io(reader, encoding)
    }

    pub fn html_file(path: impl AsRef<Path>, encoding: Option<&str>) -> Result<Self, ParseError> {
        Self::from_file(path, encoding)
    }
}
