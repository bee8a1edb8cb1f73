//! Strict XML engine
//!
//! Markup is recognized by quick-xml. Decoded text is buffered across
//! `feed` calls and only complete markup is read from it; an unfinished tag
//! or a text run that may continue stays buffered until more input (or the
//! end of input) arrives. The engine on top checks well-formedness and
//! drives the document handler.

use std::borrow::Cow;

use quick_xml::Reader;
use quick_xml::errors::{Error as XmlError, IllFormedError, SyntaxError};
use quick_xml::events::attributes::AttrError;
use quick_xml::events::{BytesStart, Event};

use super::entities;
use super::{Engine, Mode, Position, diagnostic};
use crate::decode::InputDecoder;
use crate::encoding::EncodingId;
use crate::error::EngineError;
use crate::handler::{Attribute, DocumentHandler};

/// Where the engine is in the document
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ParsePhase {
    /// Before the root element
    Prolog,
    /// Inside the root element
    Content,
    /// After the root element closed
    Epilog,
    /// End of input processed
    Complete,
    /// Fatal error occurred
    Stopped,
}

/// Strict XML engine session
#[derive(Debug)]
pub struct XmlEngine {
    filename: Option<String>,
    decoder: InputDecoder,
    /// Decoded text not yet read as events
    pending: String,
    /// Previous decoded character was a CR
    after_cr: bool,
    /// Position of the first pending character
    cursor: Position,
    /// Bytes of decoded text already read
    offset: u64,
    phase: ParsePhase,
    document_started: bool,
    /// Open elements stack (tag names)
    open_elements: Vec<String>,
    recover: bool,
    replace_entities: bool,
}

impl XmlEngine {
    pub fn new(filename: Option<&str>, encoding: Option<EncodingId>) -> Self {
        Self {
            filename: filename.map(str::to_string),
            decoder: InputDecoder::new(encoding, true),
            pending: String::new(),
            after_cr: false,
            cursor: Position::START,
            offset: 0,
            phase: ParsePhase::Prolog,
            document_started: false,
            open_elements: Vec::new(),
            recover: false,
            replace_entities: false,
        }
    }

    fn check_live(&self) -> Result<(), EngineError> {
        match self.phase {
            ParsePhase::Complete => Err(EngineError::Finished),
            ParsePhase::Stopped => Err(EngineError::Stopped),
            _ => Ok(()),
        }
    }

    /// Decode bytes onto the pending text, turning CR LF and lone CR into LF
    fn decode(&mut self, bytes: &[u8], last: bool) {
        let mut text = String::new();
        self.decoder.decode(bytes, last, &mut text);
        self.pending.reserve(text.len());
        for c in text.chars() {
            if self.after_cr && c == '\n' {
                self.after_cr = false;
                continue;
            }
            self.after_cr = c == '\r';
            self.pending.push(if c == '\r' { '\n' } else { c });
        }
    }

    fn advance(&mut self, text: &str) {
        for c in text.chars() {
            self.cursor.advance(c);
        }
        self.offset += text.len() as u64;
    }

    /// Read every complete event out of the pending text
    fn scan(&mut self, last: bool, handler: &mut dyn DocumentHandler) -> Result<(), EngineError> {
        let buffer = std::mem::take(&mut self.pending);
        let mut consumed = 0;
        let result = self.read_events(&buffer, &mut consumed, last, handler);
        if result.is_ok() {
            self.pending.push_str(&buffer[consumed..]);
        }
        result
    }

    fn read_events(
        &mut self,
        buffer: &str,
        consumed: &mut usize,
        last: bool,
        handler: &mut dyn DocumentHandler,
    ) -> Result<(), EngineError> {
        // A new reader starts after markup the reader could not get past
        'restart: loop {
            let base = *consumed;
            let mut reader = event_reader(&buffer[base..]);
            loop {
                let event = reader.read_event();
                let mut end = base + reader.buffer_position() as usize;
                match event {
                    Ok(Event::Eof) => return Ok(()),

                    Ok(event) => {
                        if let Event::Text(_) = event {
                            if !last && end == buffer.len() {
                                // The run may continue in the next chunk
                                return Ok(());
                            }
                            // The reader consumes the `<` that ends a text run
                            if buffer[..end].ends_with('<') {
                                end -= 1;
                            }
                        }
                        let raw = &buffer[*consumed..end];
                        let at = self.cursor;
                        let offset = self.offset;
                        self.advance(raw);
                        *consumed = end;
                        self.handle_event(event, raw, at, offset, handler)?;
                    }

                    Err(XmlError::IllFormed(err)) => {
                        let at = self.cursor;
                        self.advance(&buffer[*consumed..end]);
                        *consumed = end;
                        self.fail(at, &ill_formed_message(&err), handler)?;
                    }

                    Err(err) => {
                        let unfinished = match err {
                            XmlError::Syntax(SyntaxError::InvalidBangMarkup) => {
                                buffer.len() - *consumed < 3
                            }
                            XmlError::Syntax(_) => end >= buffer.len(),
                            _ => false,
                        };
                        if unfinished && !last {
                            return Ok(());
                        }

                        let at = self.cursor;
                        let message = syntax_message(&err, &buffer[*consumed..]);
                        let mut resume = end.max(*consumed + 2).min(buffer.len());
                        while !buffer.is_char_boundary(resume) {
                            resume += 1;
                        }
                        self.advance(&buffer[*consumed..resume]);
                        *consumed = resume;
                        self.fail(at, &message, handler)?;
                        continue 'restart;
                    }
                }
            }
        }
    }

    fn handle_event(
        &mut self,
        event: Event<'_>,
        raw: &str,
        at: Position,
        offset: u64,
        handler: &mut dyn DocumentHandler,
    ) -> Result<(), EngineError> {
        match event {
            Event::Decl(decl) => {
                if offset != 0 {
                    return self.fail(
                        at,
                        "XML declaration allowed only at the start of the document",
                        handler,
                    );
                }
                let Ok(version) = decl.version() else {
                    return self.fail(at, "Malformed declaration expecting version", handler);
                };
                let encoding = decl
                    .encoding()
                    .and_then(Result::ok)
                    .map(|value| String::from_utf8_lossy(&value).into_owned());
                let standalone = decl
                    .standalone()
                    .and_then(Result::ok)
                    .map(|value| String::from_utf8_lossy(&value).into_owned());
                handler.xml_decl(
                    &String::from_utf8_lossy(&version),
                    encoding.as_deref(),
                    standalone.as_deref(),
                );
                self.start_document(handler);
            }

            Event::DocType(_) => {
                self.start_document(handler);
                if self.phase != ParsePhase::Prolog {
                    self.fail(at, "DOCTYPE not allowed after the root element", handler)?;
                }
            }

            Event::Start(start) => self.start_element(&start, false, at, handler)?,

            Event::Empty(start) => self.start_element(&start, true, at, handler)?,

            Event::End(end) => {
                self.start_document(handler);
                let name = String::from_utf8_lossy(end.name().as_ref()).into_owned();
                self.close_element(&name, at, handler)?;
            }

            Event::Text(_) => self.text(raw, at, handler)?,

            Event::CData(cdata) => {
                self.start_document(handler);
                if self.open_elements.is_empty() {
                    self.fail(at, "CDATA section outside the root element", handler)?;
                } else {
                    handler.cdata_block(&String::from_utf8_lossy(&cdata));
                }
            }

            Event::Comment(comment) => {
                self.start_document(handler);
                handler.comment(&String::from_utf8_lossy(&comment));
            }

            Event::PI(pi) => {
                self.start_document(handler);
                let target = String::from_utf8_lossy(pi.target());
                if !entities::is_name(&target) {
                    return self.fail(at, "xmlParsePI : no target name", handler);
                }
                if target.eq_ignore_ascii_case("xml") {
                    return self.fail(at, "xmlParsePITarget: invalid name prefix 'xml'", handler);
                }
                let content = String::from_utf8_lossy(pi.content());
                handler.processing_instruction(&target, content.trim_start());
            }

            Event::Eof => {}
        }
        Ok(())
    }

    fn start_element(
        &mut self,
        start: &BytesStart<'_>,
        empty: bool,
        at: Position,
        handler: &mut dyn DocumentHandler,
    ) -> Result<(), EngineError> {
        self.start_document(handler);
        let name = String::from_utf8_lossy(start.name().as_ref()).into_owned();
        if !entities::is_name(&name) {
            return self.fail(at, "StartTag: invalid element name", handler);
        }
        if self.phase == ParsePhase::Epilog {
            self.fail(at, "Extra content at the end of the document", handler)?;
        }

        let attributes = self.attributes(start, at, handler)?;
        handler.start_element(&name, &attributes);
        if empty {
            handler.end_element(&name);
            if self.open_elements.is_empty() {
                self.phase = ParsePhase::Epilog;
            }
        } else {
            self.open_elements.push(name);
            self.phase = ParsePhase::Content;
        }
        Ok(())
    }

    fn attributes(
        &mut self,
        start: &BytesStart<'_>,
        at: Position,
        handler: &mut dyn DocumentHandler,
    ) -> Result<Vec<Attribute>, EngineError> {
        let mut attributes = Vec::new();
        for attr in start.attributes() {
            let attr = match attr {
                Ok(attr) => attr,
                Err(err) => {
                    self.fail(at, &attribute_message(&err, start), handler)?;
                    continue;
                }
            };
            let name = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
            let raw = String::from_utf8_lossy(&attr.value);
            if raw.contains('<') {
                self.fail(at, "Unescaped '<' not allowed in attributes values", handler)?;
                continue;
            }
            let normalized = raw.replace(|c: char| matches!(c, '\t' | '\n' | '\r'), " ");
            if let Some(value) = self.expand(&normalized, at, handler)? {
                attributes.push(Attribute { name, value });
            }
        }
        Ok(attributes)
    }

    fn text(
        &mut self,
        raw: &str,
        at: Position,
        handler: &mut dyn DocumentHandler,
    ) -> Result<(), EngineError> {
        if !self.open_elements.is_empty() {
            if let Some(text) = self.expand(raw, at, handler)? {
                handler.characters(&text);
            }
            return Ok(());
        }

        let content = raw.trim_start_matches(|c: char| matches!(c, ' ' | '\t' | '\n'));
        if content.is_empty() {
            return Ok(());
        }
        // Point at the first character that is not blank
        let mut at = at;
        for c in raw[..raw.len() - content.len()].chars() {
            at.advance(c);
        }
        let message = if self.phase == ParsePhase::Epilog {
            "Extra content at the end of the document"
        } else {
            "Start tag expected, '<' not found"
        };
        self.fail(at, message, handler)
    }

    /// Expand references, warning about undeclared entities kept literally.
    /// `None` when the text was rejected and the session recovers.
    fn expand(
        &mut self,
        raw: &str,
        at: Position,
        handler: &mut dyn DocumentHandler,
    ) -> Result<Option<String>, EngineError> {
        match entities::expand(raw, !self.replace_entities) {
            Ok(expansion) => {
                for name in &expansion.undeclared {
                    let message = entities::undeclared_message(name);
                    handler.warning(&diagnostic(self.filename.as_deref(), at, &message));
                }
                Ok(Some(expansion.text.into_owned()))
            }
            Err(message) => {
                self.fail(at, &message, handler)?;
                Ok(None)
            }
        }
    }

    fn close_element(
        &mut self,
        name: &str,
        at: Position,
        handler: &mut dyn DocumentHandler,
    ) -> Result<(), EngineError> {
        match self.open_elements.last() {
            Some(top) if top == name => {
                self.open_elements.pop();
                handler.end_element(name);
            }
            Some(top) => {
                let message = format!("Opening and ending tag mismatch: {top} and {name}");
                self.fail(at, &message, handler)?;
                // Recovering: close up to the matching element, if any
                if let Some(index) = self.open_elements.iter().rposition(|open| open == name) {
                    while self.open_elements.len() > index {
                        if let Some(open) = self.open_elements.pop() {
                            handler.end_element(&open);
                        }
                    }
                }
            }
            None => {
                let message = format!("Unexpected end tag : {name}");
                self.fail(at, &message, handler)?;
            }
        }
        if self.open_elements.is_empty() && self.phase == ParsePhase::Content {
            self.phase = ParsePhase::Epilog;
        }
        Ok(())
    }

    fn start_document(&mut self, handler: &mut dyn DocumentHandler) {
        if !self.document_started {
            self.document_started = true;
            handler.start_document();
        }
    }

    /// Report a well-formedness error. Stops the session unless recovering.
    fn fail(
        &mut self,
        at: Position,
        message: &str,
        handler: &mut dyn DocumentHandler,
    ) -> Result<(), EngineError> {
        self.start_document(handler);
        handler.error(&diagnostic(self.filename.as_deref(), at, message));
        if self.recover {
            return Ok(());
        }
        self.phase = ParsePhase::Stopped;
        Err(EngineError::Malformed {
            line: at.line,
            column: at.column,
            message: message.to_string(),
        })
    }
}

fn event_reader(input: &str) -> Reader<&[u8]> {
    let mut reader = Reader::from_str(input);
    let config = reader.config_mut();
    config.trim_text(false);
    config.check_comments = true;
    // Nesting is checked by the engine, which can recover from a mismatch
    config.check_end_names = false;
    config.allow_unmatched_ends = true;
    reader
}

/// Message for markup the reader could not get past, starting at `markup`
fn syntax_message(err: &XmlError, markup: &str) -> String {
    let XmlError::Syntax(err) = err else {
        return err.to_string();
    };
    match err {
        SyntaxError::UnclosedComment => "Comment not terminated".to_string(),
        SyntaxError::UnclosedCData => "CData section not finished".to_string(),
        SyntaxError::UnclosedDoctype => "DOCTYPE improperly terminated".to_string(),
        SyntaxError::UnclosedPIOrXmlDecl => "PI not terminated".to_string(),
        SyntaxError::InvalidBangMarkup => "StartTag: invalid element name".to_string(),
        SyntaxError::UnclosedTag => {
            let tag = markup.strip_prefix('<').unwrap_or(markup);
            let (kind, tag) = match tag.strip_prefix('/') {
                Some(rest) => ("End", rest),
                None => ("Start", tag),
            };
            let name = tag
                .split(|c: char| c.is_whitespace() || c == '/' || c == '>')
                .next()
                .unwrap_or_default();
            if name.is_empty() {
                "StartTag: invalid element name".to_string()
            } else {
                format!("Couldn't find end of {kind} Tag {name}")
            }
        }
    }
}

fn ill_formed_message(err: &IllFormedError) -> String {
    match err {
        IllFormedError::DoubleHyphenInComment => "Double hyphen within comment".to_string(),
        IllFormedError::MissingDoctypeName => "xmlParseDocTypeDecl : no DOCTYPE name !".to_string(),
        other => other.to_string(),
    }
}

fn attribute_message(err: &AttrError, tag: &[u8]) -> String {
    match *err {
        AttrError::Duplicated(at, _) => {
            let name: Cow<'_, str> = match tag.get(at..) {
                Some(rest) => {
                    let len = rest
                        .iter()
                        .position(|b| b.is_ascii_whitespace() || *b == b'=')
                        .unwrap_or(rest.len());
                    String::from_utf8_lossy(&rest[..len])
                }
                None => Cow::Borrowed(""),
            };
            format!("Attribute {name} redefined")
        }
        AttrError::ExpectedEq(_) | AttrError::ExpectedValue(_) => {
            "AttValue: value expected".to_string()
        }
        AttrError::UnquotedValue(_) => "AttValue: \" or ' expected".to_string(),
        AttrError::ExpectedQuote(_, quote) => format!("AttValue: {} expected", quote as char),
    }
}

impl Engine for XmlEngine {
    fn mode(&self) -> Mode {
        Mode::Xml
    }

    fn feed(&mut self, chunk: &[u8], handler: &mut dyn DocumentHandler) -> Result<(), EngineError> {
        self.check_live()?;
        if chunk.is_empty() {
            return Ok(());
        }
        self.decode(chunk, false);
        self.scan(false, handler)
    }

    fn finish(&mut self, handler: &mut dyn DocumentHandler) -> Result<(), EngineError> {
        self.check_live()?;
        self.decode(&[], true);
        self.scan(true, handler)?;

        let at = self.cursor;
        if let Some(top) = self.open_elements.last().cloned() {
            self.fail(at, &format!("Premature end of data in tag {top}"), handler)?;
            while let Some(open) = self.open_elements.pop() {
                handler.end_element(&open);
            }
        } else if self.phase == ParsePhase::Prolog {
            self.fail(at, "Document is empty", handler)?;
        }

        self.start_document(handler);
        handler.end_document();
        self.phase = ParsePhase::Complete;
        Ok(())
    }

    fn force_encoding(&mut self, encoding: EncodingId) -> Result<(), EngineError> {
        self.decoder.force(encoding)
    }

    fn replace_entities(&self) -> bool {
        self.replace_entities
    }

    fn set_replace_entities(&mut self, replace: bool) {
        self.replace_entities = replace;
    }

    fn recover(&self) -> bool {
        self.recover
    }

    fn set_recover(&mut self, recover: bool) {
        self.recover = recover;
    }

    fn position(&self) -> Position {
        self.cursor
    }

    fn is_finished(&self) -> bool {
        matches!(self.phase, ParsePhase::Complete | ParsePhase::Stopped)
    }
}
