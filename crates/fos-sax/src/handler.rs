//! Document handler
//!
//! The sink that receives parse events. Every callback has a no-op default,
//! so a handler only implements the events it cares about.

/// Attribute on a start tag, in document order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    pub name: String,
    pub value: String,
}

impl Attribute {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// Receiver of parse events
#[allow(unused_variables)]
pub trait DocumentHandler {
    /// XML declaration, delivered before `start_document`
    fn xml_decl(&mut self, version: &str, encoding: Option<&str>, standalone: Option<&str>) {}

    fn start_document(&mut self) {}

    fn end_document(&mut self) {}

    fn start_element(&mut self, name: &str, attributes: &[Attribute]) {}

    fn end_element(&mut self, name: &str) {}

    /// Character data. Adjacent runs are merged into one call.
    fn characters(&mut self, text: &str) {}

    fn comment(&mut self, text: &str) {}

    fn cdata_block(&mut self, text: &str) {}

    fn processing_instruction(&mut self, target: &str, data: &str) {}

    fn warning(&mut self, message: &str) {}

    fn error(&mut self, message: &str) {}
}

impl<T: DocumentHandler + ?Sized> DocumentHandler for &mut T {
    fn xml_decl(&mut self, version: &str, encoding: Option<&str>, standalone: Option<&str>) {
        (**self).xml_decl(version, encoding, standalone)
    }

    fn start_document(&mut self) {
        (**self).start_document()
    }

    fn end_document(&mut self) {
        (**self).end_document()
    }

    fn start_element(&mut self, name: &str, attributes: &[Attribute]) {
        (**self).start_element(name, attributes)
    }

    fn end_element(&mut self, name: &str) {
        (**self).end_element(name)
    }

    fn characters(&mut self, text: &str) {
        (**self).characters(text)
    }

    fn comment(&mut self, text: &str) {
        (**self).comment(text)
    }

    fn cdata_block(&mut self, text: &str) {
        (**self).cdata_block(text)
    }

    fn processing_instruction(&mut self, target: &str, data: &str) {
        (**self).processing_instruction(target, data)
    }

    fn warning(&mut self, message: &str) {
        (**self).warning(message)
    }

    fn error(&mut self, message: &str) {
        (**self).error(message)
    }
}

impl<T: DocumentHandler + ?Sized> DocumentHandler for Box<T> {
    fn xml_decl(&mut self, version: &str, encoding: Option<&str>, standalone: Option<&str>) {
        (**self).xml_decl(version, encoding, standalone)
    }

    fn start_document(&mut self) {
        (**self).start_document()
    }

    fn end_document(&mut self) {
        (**self).end_document()
    }

    fn start_element(&mut self, name: &str, attributes: &[Attribute]) {
        (**self).start_element(name, attributes)
    }

    fn end_element(&mut self, name: &str) {
        (**self).end_element(name)
    }

    fn characters(&mut self, text: &str) {
        (**self).characters(text)
    }

    fn comment(&mut self, text: &str) {
        (**self).comment(text)
    }

    fn cdata_block(&mut self, text: &str) {
        (**self).cdata_block(text)
    }

    fn processing_instruction(&mut self, target: &str, data: &str) {
        (**self).processing_instruction(target, data)
    }

    fn warning(&mut self, message: &str) {
        (**self).warning(message)
    }

    fn error(&mut self, message: &str) {
        (**self).error(message)
    }
}

/// A handler that ignores every event
#[derive(Debug, Default, Clone, Copy)]
pub struct NullHandler;

impl DocumentHandler for NullHandler {}

/// Owned form of a handler callback
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaxEvent {
    XmlDecl {
        version: String,
        encoding: Option<String>,
        standalone: Option<String>,
    },
    StartDocument,
    EndDocument,
    StartElement {
        name: String,
        attributes: Vec<Attribute>,
    },
    EndElement {
        name: String,
    },
    Characters(String),
    Comment(String),
    CdataBlock(String),
    ProcessingInstruction {
        target: String,
        data: String,
    },
    Warning(String),
    Error(String),
}

impl SaxEvent {
    /// Replay this event into a handler
    pub fn dispatch(&self, handler: &mut dyn DocumentHandler) {
        match self {
            Self::XmlDecl {
                version,
                encoding,
                standalone,
            } => handler.xml_decl(version, encoding.as_deref(), standalone.as_deref()),
            Self::StartDocument => handler.start_document(),
            Self::EndDocument => handler.end_document(),
            Self::StartElement { name, attributes } => handler.start_element(name, attributes),
            Self::EndElement { name } => handler.end_element(name),
            Self::Characters(text) => handler.characters(text),
            Self::Comment(text) => handler.comment(text),
            Self::CdataBlock(text) => handler.cdata_block(text),
            Self::ProcessingInstruction { target, data } => {
                handler.processing_instruction(target, data)
            }
            Self::Warning(message) => handler.warning(message),
            Self::Error(message) => handler.error(message),
        }
    }

    pub fn start(name: &str, attributes: &[(&str, &str)]) -> Self {
        Self::StartElement {
            name: name.to_string(),
            attributes: attributes
                .iter()
                .map(|(name, value)| Attribute::new(*name, *value))
                .collect(),
        }
    }

    pub fn end(name: &str) -> Self {
        Self::EndElement {
            name: name.to_string(),
        }
    }

    pub fn text(text: &str) -> Self {
        Self::Characters(text.to_string())
    }

    /// Whether this is a diagnostic rather than a structural event
    pub fn is_diagnostic(&self) -> bool {
        matches!(self, Self::Warning(_) | Self::Error(_))
    }
}

/// Handler that records every event it receives
#[derive(Debug, Default, Clone)]
pub struct EventRecorder {
    pub events: Vec<SaxEvent>,
}

impl EventRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Recorded events without warnings and errors
    pub fn structural(&self) -> Vec<SaxEvent> {
        self.events
            .iter()
            .filter(|event| !event.is_diagnostic())
            .cloned()
            .collect()
    }

    /// Messages passed to `error`
    pub fn errors(&self) -> Vec<&str> {
        self.events
            .iter()
            .filter_map(|event| match event {
                SaxEvent::Error(message) => Some(message.as_str()),
                _ => None,
            })
            .collect()
    }

    pub fn count(&self, wanted: &SaxEvent) -> usize {
        self.events.iter().filter(|event| *event == wanted).count()
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }
}

impl DocumentHandler for EventRecorder {
    fn xml_decl(&mut self, version: &str, encoding: Option<&str>, standalone: Option<&str>) {
        self.events.push(SaxEvent::XmlDecl {
            version: version.to_string(),
            encoding: encoding.map(str::to_string),
            standalone: standalone.map(str::to_string),
        });
    }

    fn start_document(&mut self) {
        self.events.push(SaxEvent::StartDocument);
    }

    fn end_document(&mut self) {
        self.events.push(SaxEvent::EndDocument);
    }

    fn start_element(&mut self, name: &str, attributes: &[Attribute]) {
        self.events.push(SaxEvent::StartElement {
            name: name.to_string(),
            attributes: attributes.to_vec(),
        });
    }

    fn end_element(&mut self, name: &str) {
        self.events.push(SaxEvent::end(name));
    }

    fn characters(&mut self, text: &str) {
        self.events.push(SaxEvent::text(text));
    }

    fn comment(&mut self, text: &str) {
        self.events.push(SaxEvent::Comment(text.to_string()));
    }

    fn cdata_block(&mut self, text: &str) {
        self.events.push(SaxEvent::CdataBlock(text.to_string()));
    }

    fn processing_instruction(&mut self, target: &str, data: &str) {
        self.events.push(SaxEvent::ProcessingInstruction {
            target: target.to_string(),
            data: data.to_string(),
        });
    }

    fn warning(&mut self, message: &str) {
        self.events.push(SaxEvent::Warning(message.to_string()));
    }

    fn error(&mut self, message: &str) {
        self.events.push(SaxEvent::Error(message.to_string()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recorder_through_mut_ref() {
        fn drive<H: DocumentHandler>(mut handler: H) {
            handler.start_document();
            handler.start_element("a", &[Attribute::new("id", "1")]);
            handler.end_element("a");
            handler.end_document();
        }

        let mut recorder = EventRecorder::new();
        drive(&mut recorder);
        assert_eq!(
            recorder.events,
            vec![
                SaxEvent::StartDocument,
                SaxEvent::start("a", &[("id", "1")]),
                SaxEvent::end("a"),
                SaxEvent::EndDocument,
            ]
        );
    }

    #[test]
    fn test_dispatch_replays_event() {
        let mut recorder = EventRecorder::new();
        let event = SaxEvent::ProcessingInstruction {
            target: "php".into(),
            data: "echo 1".into(),
        };
        event.dispatch(&mut recorder);
        assert_eq!(recorder.events, vec![event]);
    }

    #[test]
    fn test_structural_filters_diagnostics() {
        let mut recorder = EventRecorder::new();
        recorder.start_document();
        recorder.error("boom");
        recorder.warning("hmm");
        assert_eq!(recorder.structural(), vec![SaxEvent::StartDocument]);
        assert_eq!(recorder.errors(), vec!["boom"]);
    }
}
