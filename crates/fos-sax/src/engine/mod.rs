//! Tokenizing engines
//!
//! An engine owns the grammar: it takes raw bytes, decodes them, recognizes
//! markup and calls the document handler. Two engines exist, a strict XML
//! one and a tolerant HTML one built on html5ever. Orchestration code only
//! talks to them through [`Engine`].

pub mod entities;
pub mod html;
pub mod xml;

use std::fmt;

use crate::encoding::EncodingId;
use crate::error::EngineError;
use crate::handler::{Attribute, DocumentHandler};

/// Tokenization mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Mode {
    /// Well-formedness errors stop the session
    Xml,
    /// Malformed markup is corrected
    Html,
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Xml => f.write_str("xml"),
            Self::Html => f.write_str("html"),
        }
    }
}

/// Line and column of the engine cursor, both 1-based
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Position {
    pub line: u32,
    pub column: u32,
}

impl Position {
    pub const START: Position = Position { line: 1, column: 1 };

    pub(crate) fn advance(&mut self, c: char) {
        if c == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
    }
}

/// One live engine session
///
/// `feed` and `finish` may call the handler any number of times before
/// returning. After `finish` the session is terminal and every further call
/// returns [`EngineError::Finished`].
pub trait Engine: fmt::Debug {
    fn mode(&self) -> Mode;

    fn feed(&mut self, chunk: &[u8], handler: &mut dyn DocumentHandler) -> Result<(), EngineError>;

    fn finish(&mut self, handler: &mut dyn DocumentHandler) -> Result<(), EngineError>;

    /// Decode input with this encoding regardless of what detection says
    fn force_encoding(&mut self, encoding: EncodingId) -> Result<(), EngineError>;

    fn replace_entities(&self) -> bool;

    fn set_replace_entities(&mut self, replace: bool);

    /// Whether errors are reported and parsing continues
    fn recover(&self) -> bool;

    fn set_recover(&mut self, recover: bool);

    fn position(&self) -> Position;

    fn is_finished(&self) -> bool;
}

/// Construct an engine session
pub fn create(mode: Mode, filename: Option<&str>, encoding: Option<EncodingId>) -> Box<dyn Engine> {
    match mode {
        Mode::Xml => Box::new(xml::XmlEngine::new(filename, encoding)),
        Mode::Html => Box::new(html::HtmlEngine::new(filename, encoding)),
    }
}

/// Handler wrapper merging adjacent character data.
///
/// Text is held in `pending` and flushed right before the next non-text
/// event, so the handler sees the same calls however the input was split.
pub(crate) struct Coalesce<'a> {
    pub handler: &'a mut dyn DocumentHandler,
    pub pending: &'a mut String,
}

impl Coalesce<'_> {
    pub fn flush(&mut self) {
        if !self.pending.is_empty() {
            let text = std::mem::take(&mut *self.pending);
            self.handler.characters(&text);
        }
    }
}

impl DocumentHandler for Coalesce<'_> {
    fn xml_decl(&mut self, version: &str, encoding: Option<&str>, standalone: Option<&str>) {
        self.flush();
        self.handler.xml_decl(version, encoding, standalone);
    }

    fn start_document(&mut self) {
        self.flush();
        self.handler.start_document();
    }

    fn end_document(&mut self) {
        self.flush();
        self.handler.end_document();
    }

    fn start_element(&mut self, name: &str, attributes: &[Attribute]) {
        self.flush();
        self.handler.start_element(name, attributes);
    }

    fn end_element(&mut self, name: &str) {
        self.flush();
        self.handler.end_element(name);
    }

    fn characters(&mut self, text: &str) {
        self.pending.push_str(text);
    }

    fn comment(&mut self, text: &str) {
        self.flush();
        self.handler.comment(text);
    }

    fn cdata_block(&mut self, text: &str) {
        self.flush();
        self.handler.cdata_block(text);
    }

    fn processing_instruction(&mut self, target: &str, data: &str) {
        self.flush();
        self.handler.processing_instruction(target, data);
    }

    fn warning(&mut self, message: &str) {
        self.flush();
        self.handler.warning(message);
    }

    fn error(&mut self, message: &str) {
        self.flush();
        self.handler.error(message);
    }
}

/// Prefix a diagnostic with the source filename, if any
pub(crate) fn diagnostic(filename: Option<&str>, position: Position, message: &str) -> String {
    match filename {
        Some(name) => format!("{name}:{}: {message}", position.line),
        None => message.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::{EventRecorder, SaxEvent};

    #[test]
    fn test_coalesce_merges_text() {
        let mut recorder = EventRecorder::new();
        let mut pending = String::new();
        {
            let mut sink = Coalesce {
                handler: &mut recorder,
                pending: &mut pending,
            };
            sink.characters("he");
            sink.characters("llo");
            sink.end_element("p");
            sink.characters("tail");
        }
        assert_eq!(pending, "tail");
        assert_eq!(
            recorder.events,
            vec![SaxEvent::text("hello"), SaxEvent::end("p")]
        );
    }

    #[test]
    fn test_position_advance() {
        let mut position = Position::START;
        for c in "ab\ncd".chars() {
            position.advance(c);
        }
        assert_eq!(position, Position { line: 2, column: 3 });
    }

    #[test]
    fn test_diagnostic_prefix() {
        let at = Position { line: 3, column: 1 };
        assert_eq!(diagnostic(Some("a.xml"), at, "boom"), "a.xml:3: boom");
        assert_eq!(diagnostic(None, at, "boom"), "boom");
    }
}
