//! Tolerant HTML engine
//!
//! Tokenization is html5ever's. Its tokens are queued by the sink and then
//! corrected here into a balanced event stream: void elements close
//! immediately, an end tag closes everything opened after its start tag,
//! stray end tags are reported and dropped, and elements still open at the
//! end of input are closed before `end_document`. Correction never
//! stops the session, so HTML sessions always recover.

use std::cell::RefCell;
use std::fmt;

use html5ever::TokenizerResult;
use html5ever::tendril::StrTendril;
use html5ever::tokenizer::{
    BufferQueue, Tag, TagKind, Token, TokenSink, TokenSinkResult, Tokenizer, TokenizerOpts,
    states,
};

use super::{Engine, Mode, Position, diagnostic};
use crate::decode::InputDecoder;
use crate::encoding::EncodingId;
use crate::error::EngineError;
use crate::handler::{Attribute, DocumentHandler};

/// Token as queued by the sink
#[derive(Debug, Clone, PartialEq)]
enum HtmlEvent {
    StartTag {
        name: String,
        attributes: Vec<Attribute>,
        self_closing: bool,
    },
    /// End tag with the line it was read on
    EndTag {
        name: String,
        line: u64,
    },
    Text(String),
    Comment(String),
    Error {
        message: String,
        line: u64,
    },
}

/// Token sink collecting events for the engine to drain
#[derive(Default)]
struct HtmlSink {
    events: RefCell<Vec<HtmlEvent>>,
}

impl HtmlSink {
    fn push(&self, event: HtmlEvent) {
        self.events.borrow_mut().push(event);
    }

    fn take(&self) -> Vec<HtmlEvent> {
        std::mem::take(&mut *self.events.borrow_mut())
    }

    fn start_tag(&self, tag: Tag) -> TokenSinkResult<()> {
        let name = tag.name.to_string();
        let attributes = tag
            .attrs
            .iter()
            .map(|attr| Attribute::new(attr.name.local.to_string(), attr.value.to_string()))
            .collect();

        // Elements whose content is not markup switch the tokenizer state
        let result = match name.as_str() {
            "script" => TokenSinkResult::RawData(states::RawKind::ScriptData),
            "style" | "xmp" | "iframe" | "noembed" | "noframes" => {
                TokenSinkResult::RawData(states::RawKind::Rawtext)
            }
            "textarea" | "title" => TokenSinkResult::RawData(states::RawKind::Rcdata),
            "plaintext" => TokenSinkResult::Plaintext,
            _ => TokenSinkResult::Continue,
        };
        let raw = !matches!(result, TokenSinkResult::Continue);

        self.push(HtmlEvent::StartTag {
            name,
            attributes,
            self_closing: tag.self_closing,
        });
        if raw && tag.self_closing {
            return TokenSinkResult::Continue;
        }
        result
    }
}

impl TokenSink for HtmlSink {
    type Handle = ();

    fn process_token(&self, token: Token, line_number: u64) -> TokenSinkResult<()> {
        match token {
            Token::TagToken(tag) => match tag.kind {
                TagKind::StartTag => return self.start_tag(tag),
                TagKind::EndTag => self.push(HtmlEvent::EndTag {
                    name: tag.name.to_string(),
                    line: line_number,
                }),
            },
            Token::CharacterTokens(text) => self.push(HtmlEvent::Text(text.to_string())),
            Token::CommentToken(text) => self.push(HtmlEvent::Comment(text.to_string())),
            Token::ParseError(message) => self.push(HtmlEvent::Error {
                message: message.into_owned(),
                line: line_number,
            }),
            // Doctypes, NUL characters and EOF carry nothing for the handler
            _ => {}
        }
        TokenSinkResult::Continue
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Fresh,
    Open,
    Complete,
}

/// Tolerant HTML engine session
pub struct HtmlEngine {
    filename: Option<String>,
    decoder: InputDecoder,
    tokenizer: Tokenizer<HtmlSink>,
    input: BufferQueue,
    phase: Phase,
    open_elements: Vec<String>,
    /// Cursor over the decoded text fed so far
    position: Position,
    replace_entities: bool,
}

impl HtmlEngine {
    pub fn new(filename: Option<&str>, encoding: Option<EncodingId>) -> Self {
        Self {
            filename: filename.map(str::to_string),
            decoder: InputDecoder::new(encoding, false),
            tokenizer: Tokenizer::new(HtmlSink::default(), TokenizerOpts::default()),
            input: BufferQueue::default(),
            phase: Phase::Fresh,
            open_elements: Vec::new(),
            position: Position::START,
            replace_entities: false,
        }
    }

    fn start(&mut self, handler: &mut dyn DocumentHandler) {
        if self.phase == Phase::Fresh {
            self.phase = Phase::Open;
            handler.start_document();
        }
    }

    fn push_text(&mut self, text: &str) {
        if text.is_empty() {
            return;
        }
        for c in text.chars() {
            self.position.advance(c);
        }
        self.input.push_back(StrTendril::from(text));
        match self.tokenizer.feed(&self.input) {
            TokenizerResult::Done => {}
            // Only returned after the sink answers `TokenSinkResult::Script`,
            // which `HtmlSink` never does
            TokenizerResult::Script(()) => {}
        }
    }

    fn drain(&mut self, handler: &mut dyn DocumentHandler) {
        for event in self.tokenizer.sink.take() {
            match event {
                HtmlEvent::StartTag {
                    name,
                    attributes,
                    self_closing,
                } => {
                    handler.start_element(&name, &attributes);
                    if self_closing || is_void_element(&name) {
                        handler.end_element(&name);
                    } else {
                        self.open_elements.push(name);
                    }
                }
                HtmlEvent::EndTag { name, line } => {
                    match self.open_elements.iter().rposition(|open| *open == name) {
                        Some(index) => {
                            while self.open_elements.len() > index {
                                if let Some(open) = self.open_elements.pop() {
                                    handler.end_element(&open);
                                }
                            }
                        }
                        None => {
                            let message = format!("Unexpected end tag : {name}");
                            self.report(line, &message, handler);
                        }
                    }
                }
                HtmlEvent::Text(text) => handler.characters(&text),
                HtmlEvent::Comment(text) => handler.comment(&text),
                HtmlEvent::Error { message, line } => self.report(line, &message, handler),
            }
        }
    }

    /// Report an error on the line the tokenizer read it from
    fn report(&self, line: u64, message: &str, handler: &mut dyn DocumentHandler) {
        let at = Position {
            line: u32::try_from(line).unwrap_or(u32::MAX),
            column: 1,
        };
        handler.error(&diagnostic(self.filename.as_deref(), at, message));
    }
}

impl fmt::Debug for HtmlEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HtmlEngine")
            .field("filename", &self.filename)
            .field("decoder", &self.decoder)
            .field("phase", &self.phase)
            .field("open_elements", &self.open_elements)
            .field("position", &self.position)
            .finish_non_exhaustive()
    }
}

impl Engine for HtmlEngine {
    fn mode(&self) -> Mode {
        Mode::Html
    }

    fn feed(&mut self, chunk: &[u8], handler: &mut dyn DocumentHandler) -> Result<(), EngineError> {
        if self.phase == Phase::Complete {
            return Err(EngineError::Finished);
        }
        if chunk.is_empty() {
            return Ok(());
        }
        self.start(handler);
        let mut text = String::new();
        self.decoder.decode(chunk, false, &mut text);
        self.push_text(&text);
        self.drain(handler);
        Ok(())
    }

    fn finish(&mut self, handler: &mut dyn DocumentHandler) -> Result<(), EngineError> {
        if self.phase == Phase::Complete {
            return Err(EngineError::Finished);
        }
        self.start(handler);
        let mut text = String::new();
        self.decoder.decode(&[], true, &mut text);
        self.push_text(&text);
        self.tokenizer.end();
        self.drain(handler);

        while let Some(open) = self.open_elements.pop() {
            handler.end_element(&open);
        }
        handler.end_document();
        self.phase = Phase::Complete;
        Ok(())
    }

    fn force_encoding(&mut self, encoding: EncodingId) -> Result<(), EngineError> {
        self.decoder.force(encoding)
    }

    fn replace_entities(&self) -> bool {
        self.replace_entities
    }

    /// Stored only; character references are always expanded in HTML
    fn set_replace_entities(&mut self, replace: bool) {
        self.replace_entities = replace;
    }

    fn recover(&self) -> bool {
        true
    }

    /// Ignored; malformed HTML is always corrected
    fn set_recover(&mut self, _recover: bool) {}

    fn position(&self) -> Position {
        self.position
    }

    fn is_finished(&self) -> bool {
        self.phase == Phase::Complete
    }
}

/// Check if element is a void element (no closing tag)
fn is_void_element(name: &str) -> bool {
    matches!(
        name,
        "area"
            | "base"
            | "br"
            | "col"
            | "embed"
            | "hr"
            | "img"
            | "input"
            | "link"
            | "meta"
            | "param"
            | "source"
            | "track"
            | "wbr"
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::Coalesce;
    use crate::handler::{EventRecorder, SaxEvent};

    fn run(chunks: &[&[u8]]) -> EventRecorder {
        run_engine(HtmlEngine::new(None, Some(EncodingId::UTF_8)), chunks)
    }

    fn run_engine(mut engine: HtmlEngine, chunks: &[&[u8]]) -> EventRecorder {
        let mut recorder = EventRecorder::new();
        let mut pending = String::new();
        {
            let mut sink = Coalesce {
                handler: &mut recorder,
                pending: &mut pending,
            };
            for chunk in chunks {
                engine.feed(chunk, &mut sink).unwrap();
            }
            engine.finish(&mut sink).unwrap();
            sink.flush();
        }
        recorder
    }

    #[test]
    fn test_unclosed_elements_are_closed() {
        let recorder = run(&[b"<div><p>hello"]);
        assert_eq!(
            recorder.structural(),
            vec![
                SaxEvent::StartDocument,
                SaxEvent::start("div", &[]),
                SaxEvent::start("p", &[]),
                SaxEvent::text("hello"),
                SaxEvent::end("p"),
                SaxEvent::end("div"),
                SaxEvent::EndDocument,
            ]
        );
    }

    #[test]
    fn test_void_elements() {
        let recorder = run(&[b"<p>a<br>b<img src=x></p>"]);
        assert_eq!(
            recorder.structural(),
            vec![
                SaxEvent::StartDocument,
                SaxEvent::start("p", &[]),
                SaxEvent::text("a"),
                SaxEvent::start("br", &[]),
                SaxEvent::end("br"),
                SaxEvent::text("b"),
                SaxEvent::start("img", &[("src", "x")]),
                SaxEvent::end("img"),
                SaxEvent::end("p"),
                SaxEvent::EndDocument,
            ]
        );
    }

    #[test]
    fn test_stray_end_tag_reported() {
        let recorder = run(&[b"<b>x</i></b>"]);
        assert_eq!(recorder.errors(), vec!["Unexpected end tag : i"]);
        assert_eq!(recorder.count(&SaxEvent::end("b")), 1);
    }

    #[test]
    fn test_errors_carry_their_own_line() {
        let input = b"<p>one\n<b>two</i></b>\n\n\n<p>three\n";
        let engine = HtmlEngine::new(Some("page.html"), Some(EncodingId::UTF_8));
        let whole = run_engine(engine, &[input]);
        assert_eq!(whole.errors(), vec!["page.html:2: Unexpected end tag : i"]);

        for size in 1..input.len() {
            let engine = HtmlEngine::new(Some("page.html"), Some(EncodingId::UTF_8));
            let chunks: Vec<&[u8]> = input.chunks(size).collect();
            assert_eq!(run_engine(engine, &chunks).events, whole.events, "chunk size {size}");
        }
    }

    #[test]
    fn test_recover_cannot_be_disabled() {
        let mut engine = HtmlEngine::new(None, Some(EncodingId::UTF_8));
        engine.set_recover(false);
        assert!(engine.recover());
        let recorder = run_engine(engine, &[b"<b>x</i></b><p>after"]);
        assert_eq!(recorder.errors(), vec!["Unexpected end tag : i"]);
        assert!(recorder.events.contains(&SaxEvent::text("after")));
        assert_eq!(recorder.events.last(), Some(&SaxEvent::EndDocument));
    }

    #[test]
    fn test_prefixed_attribute_names() {
        let recorder = run(&[b"<svg xmlns:xlink=\"x\"><use xlink:href=\"#a\"/></svg>"]);
        assert!(recorder
            .events
            .contains(&SaxEvent::start("use", &[("xlink:href", "#a")])));
    }

    #[test]
    fn test_end_tag_closes_inner_elements() {
        let recorder = run(&[b"<ul><li>one<li>two</ul>"]);
        let ends: Vec<SaxEvent> = recorder
            .structural()
            .into_iter()
            .filter(|event| matches!(event, SaxEvent::EndElement { .. }))
            .collect();
        assert_eq!(
            ends,
            vec![SaxEvent::end("li"), SaxEvent::end("li"), SaxEvent::end("ul")]
        );
    }

    #[test]
    fn test_entities_and_case() {
        let recorder = run(&[b"<DIV CLASS=\"a\">caf&eacute; &amp; co</DIV>"]);
        assert!(recorder.events.contains(&SaxEvent::start("div", &[("class", "a")])));
        assert!(recorder.events.contains(&SaxEvent::text("café & co")));
    }

    #[test]
    fn test_script_content_is_raw() {
        let recorder = run(&[b"<script>if (a < b) { x = \"</p>\"; }</script>"]);
        assert!(recorder
            .events
            .contains(&SaxEvent::text("if (a < b) { x = \"</p>\"; }")));
        assert!(recorder.errors().is_empty());
    }

    #[test]
    fn test_chunking_does_not_change_events() {
        let input = b"<html><body><p class=\"x\">caf&eacute;</p><!-- note --><br/></body></html>";
        let whole = run(&[input]);
        let chunks: Vec<&[u8]> = input.chunks(3).collect();
        assert_eq!(whole.events, run(&chunks).events);
        assert!(whole.events.contains(&SaxEvent::Comment(" note ".into())));
    }

    #[test]
    fn test_empty_input_still_brackets_document() {
        let recorder = run(&[]);
        assert_eq!(
            recorder.events,
            vec![SaxEvent::StartDocument, SaxEvent::EndDocument]
        );
    }

    #[test]
    fn test_finish_twice() {
        let mut engine = HtmlEngine::new(None, None);
        let mut recorder = EventRecorder::new();
        engine.finish(&mut recorder).unwrap();
        assert_eq!(engine.finish(&mut recorder), Err(EngineError::Finished));
        assert_eq!(engine.feed(b"<p>", &mut recorder), Err(EngineError::Finished));
        assert!(engine.is_finished());
    }
}
