//! Incremental engine adapter
//!
//! A `PushParser` owns one engine session and the document handler it
//! drives. Bytes arrive through [`PushParser::feed`] in whatever pieces the
//! caller has; [`PushParser::finish`] ends the session.

use tracing::{debug, trace, warn};

use crate::encoding::{self, EncodingId};
use crate::engine::{self, Coalesce, Engine, Mode};
use crate::error::EngineError;
use crate::handler::DocumentHandler;

/// Push parser over one engine session
#[derive(Debug)]
pub struct PushParser<H: DocumentHandler> {
    document: H,
    engine: Box<dyn Engine>,
    /// Character data waiting for the next non-text event
    pending_text: String,
}

impl<H: DocumentHandler> PushParser<H> {
    /// Strict XML session with encoding auto-detection
    pub fn new(document: H) -> Self {
        Self::with_options(document, Mode::Xml, None, None)
    }

    pub fn with_mode(document: H, mode: Mode) -> Self {
        Self::with_options(document, mode, None, None)
    }

    /// Create a session.
    ///
    /// `filename` only prefixes diagnostics. A resolved `encoding` is both
    /// the initial hint and forced onto the engine, so that detection cannot
    /// override it; `None` and [`EncodingId::NONE`] leave detection on.
    pub fn with_options(
        document: H,
        mode: Mode,
        filename: Option<&str>,
        encoding: Option<EncodingId>,
    ) -> Self {
        let mut engine = engine::create(mode, filename, encoding);
        if let Some(id) = encoding.filter(|id| !id.is_none()) {
            if let Err(err) = engine.force_encoding(id) {
                warn!(encoding = %id, error = %err, "Cannot force encoding, auto-detecting");
            }
        }
        debug!(%mode, filename, encoding = ?encoding.map(EncodingId::name), "Created parser session");

        Self {
            document,
            engine,
            pending_text: String::new(),
        }
    }

    /// Feed a chunk of raw bytes. An empty chunk does nothing.
    pub fn feed(&mut self, chunk: &[u8]) -> Result<(), EngineError> {
        trace!(bytes = chunk.len(), "Feeding chunk");
        let mut sink = Coalesce {
            handler: &mut self.document,
            pending: &mut self.pending_text,
        };
        let result = self.engine.feed(chunk, &mut sink);
        if self.engine.is_finished() {
            sink.flush();
        }
        result
    }

    /// Signal end of input. The session is terminal afterwards.
    pub fn finish(&mut self) -> Result<(), EngineError> {
        let mut sink = Coalesce {
            handler: &mut self.document,
            pending: &mut self.pending_text,
        };
        let result = self.engine.finish(&mut sink);
        sink.flush();
        debug!(mode = %self.engine.mode(), ok = result.is_ok(), "Finished parser session");
        result
    }

    /// Force a named encoding for the rest of the input.
    ///
    /// Bytes of a character left incomplete by the previous encoding are
    /// decoded as U+FFFD.
    pub fn force_encoding(&mut self, name: &str) -> Result<(), EngineError> {
        let id = encoding::resolve(name)
            .ok_or_else(|| EngineError::UnsupportedEncoding(name.to_string()))?;
        self.engine.force_encoding(id)
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

    pub fn mode(&self) -> Mode {
        self.engine.mode()
    }

    /// Current line, 1-based
    pub fn line(&self) -> u32 {
        self.engine.position().line
    }

    /// Current column, 1-based
    pub fn column(&self) -> u32 {
        self.engine.position().column
    }

    pub fn replace_entities(&self) -> bool {
        self.engine.replace_entities()
    }

    pub fn set_replace_entities(&mut self, replace: bool) {
        self.engine.set_replace_entities(replace);
    }

    pub fn recover(&self) -> bool {
        self.engine.recover()
    }

    /// Keep parsing after well-formedness errors. HTML sessions always
    /// recover and ignore this.
    pub fn set_recover(&mut self, recover: bool) {
        self.engine.set_recover(recover);
    }

    pub fn is_finished(&self) -> bool {
        self.engine.is_finished()
    }

    /// Give up the handler and keep the engine session
    pub(crate) fn into_engine(self) -> Box<dyn Engine> {
        self.engine
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::{EventRecorder, SaxEvent};

    #[test]
    fn test_feed_and_finish() {
        let mut parser = PushParser::new(EventRecorder::new());
        parser.feed(b"<greeting>he").unwrap();
        parser.feed(b"llo</gree").unwrap();
        parser.feed(b"ting>").unwrap();
        parser.finish().unwrap();
        assert_eq!(
            parser.document().events,
            vec![
                SaxEvent::StartDocument,
                SaxEvent::start("greeting", &[]),
                SaxEvent::text("hello"),
                SaxEvent::end("greeting"),
                SaxEvent::EndDocument,
            ]
        );
    }

    #[test]
    fn test_empty_feed_is_noop() {
        let mut parser = PushParser::new(EventRecorder::new());
        assert_eq!(parser.feed(b""), Ok(()));
        assert!(parser.document().events.is_empty());
    }

    #[test]
    fn test_terminal_after_finish() {
        let mut parser = PushParser::new(EventRecorder::new());
        parser.feed(b"<a/>").unwrap();
        parser.finish().unwrap();
        assert!(parser.is_finished());
        assert_eq!(parser.finish(), Err(EngineError::Finished));
        assert_eq!(parser.feed(b"<b/>"), Err(EngineError::Finished));
        assert_eq!(parser.into_document().count(&SaxEvent::EndDocument), 1);
    }

    #[test]
    fn test_forced_encoding_from_constructor() {
        let mut parser = PushParser::with_options(
            EventRecorder::new(),
            Mode::Xml,
            None,
            Some(EncodingId::ISO_8859_1),
        );
        parser.feed(b"<a>caf\xE9</a>").unwrap();
        parser.finish().unwrap();
        assert!(parser.document().events.contains(&SaxEvent::text("café")));
    }

    #[test]
    fn test_force_encoding_by_name() {
        let mut parser = PushParser::new(EventRecorder::new());
        assert_eq!(parser.force_encoding("ISO-8859-1"), Ok(()));
        assert_eq!(
            parser.force_encoding("KLINGON"),
            Err(EngineError::UnsupportedEncoding("KLINGON".into()))
        );
        assert!(matches!(
            parser.force_encoding("EBCDIC"),
            Err(EngineError::UnsupportedEncoding(_))
        ));
    }

    #[test]
    fn test_position_tracks_input() {
        let mut parser = PushParser::new(EventRecorder::new());
        assert_eq!((parser.line(), parser.column()), (1, 1));
        parser.feed(b"<a>\n\n  <b/>").unwrap();
        assert_eq!(parser.line(), 3);
        assert_eq!(parser.column(), 7);
    }

    #[test]
    fn test_html_session_always_recovers() {
        let mut parser = PushParser::with_mode(EventRecorder::new(), Mode::Html);
        assert_eq!(parser.mode(), Mode::Html);
        parser.set_recover(false);
        assert!(parser.recover());
        parser.feed(b"<p>a</span>b").unwrap();
        parser.finish().unwrap();

        let recorder = parser.into_document();
        assert_eq!(recorder.errors(), vec!["Unexpected end tag : span"]);
        assert!(recorder.events.contains(&SaxEvent::text("b")));
        assert_eq!(recorder.count(&SaxEvent::end("p")), 1);
        assert_eq!(recorder.events.last(), Some(&SaxEvent::EndDocument));
    }

    #[test]
    fn test_replace_entities_rejects_undeclared() {
        let mut parser = PushParser::new(EventRecorder::new());
        assert!(!parser.replace_entities());
        parser.set_replace_entities(true);
        assert!(parser.replace_entities());
        assert!(parser.feed(b"<a>&custom;</a>").unwrap_err().is_malformed());
        assert_eq!(parser.document().errors(), vec!["Entity 'custom' not defined"]);
    }

    #[test]
    fn test_borrowed_handler() {
        let mut recorder = EventRecorder::new();
        {
            let mut parser = PushParser::new(&mut recorder);
            parser.feed(b"<x/>").unwrap();
            parser.finish().unwrap();
        }
        assert_eq!(recorder.count(&SaxEvent::StartDocument), 1);
    }
}
