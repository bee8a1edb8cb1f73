//! Streaming tests for fos-sax
//!
//! The same bytes must produce the same events whether they arrive as one
//! buffer, as reads of any size, or as pushed chunks split anywhere.

use std::io::{self, Read};

use fos_sax::{
    EventRecorder, HtmlParser, HtmlParserContext, Parser, ParserConfig, ParserContext,
    PushParser, SaxEvent,
};

const XML: &str = r#"<?xml version="1.0"?>
<!-- inventory -->
<inventory region="eu">
  <item sku="A&amp;1" qty="3">Café crème &#x263A;</item>
  <item sku="B2"><![CDATA[<raw> & unparsed]]></item>
  <?audit ok?>
  <empty/>
  <note>&custom; entity kept</note>
</inventory>
"#;

const HTML: &str = r#"<!DOCTYPE html>
<html><head><title>Menu &amp; Prices</title><style>td > b { x: 1 }</style></head>
<body class="main"><table><tr><td>Café<br>crème</td><td>&eacute;t&eacute;</td></tr></table>
<p>one<p>two</span><img src="a.png" alt='A'>
<script>if (a < b) { document.write("</p>"); }</script>
<!-- trailing comment -->
"#;

/// Reader returning at most `size` bytes per call
struct Chunked<'a> {
    data: &'a [u8],
    size: usize,
}

impl Read for Chunked<'_> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.size.min(buf.len()).min(self.data.len());
        buf[..n].copy_from_slice(&self.data[..n]);
        self.data = &self.data[n..];
        Ok(n)
    }
}

/// Reader that is interrupted before every successful read
struct Flaky<'a> {
    data: &'a [u8],
    interrupt: bool,
}

impl Read for Flaky<'_> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.interrupt = !self.interrupt;
        if self.interrupt {
            return Err(io::Error::from(io::ErrorKind::Interrupted));
        }
        let n = buf.len().min(self.data.len()).min(7);
        buf[..n].copy_from_slice(&self.data[..n]);
        self.data = &self.data[n..];
        Ok(n)
    }
}

fn xml_from_memory() -> EventRecorder {
    let mut parser = Parser::new(EventRecorder::new());
    parser.parse_memory(XML, None).unwrap();
    parser.into_document()
}

fn html_from_memory() -> EventRecorder {
    let mut parser = HtmlParser::html(EventRecorder::new());
    parser.parse_memory(HTML, Some("UTF-8")).unwrap();
    parser.into_document()
}

fn assert_bracketed(recorder: &EventRecorder) {
    let events = &recorder.events;
    let starts: Vec<usize> = events
        .iter()
        .enumerate()
        .filter(|(_, event)| **event == SaxEvent::StartDocument)
        .map(|(index, _)| index)
        .collect();
    assert_eq!(starts.len(), 1, "start_document must be called once");
    let first_element = events
        .iter()
        .position(|event| matches!(event, SaxEvent::StartElement { .. }))
        .unwrap();
    assert!(starts[0] < first_element);

    assert_eq!(recorder.count(&SaxEvent::EndDocument), 1);
    assert_eq!(events.last(), Some(&SaxEvent::EndDocument));
}

#[test]
fn test_xml_document_is_bracketed() {
    let recorder = xml_from_memory();
    assert_bracketed(&recorder);
    assert!(recorder.errors().is_empty());
    assert!(recorder.events.contains(&SaxEvent::text("Café crème ☺")));
    assert!(recorder.events.contains(&SaxEvent::text("&custom; entity kept")));
}

#[test]
fn test_xml_read_sizes_do_not_change_events() {
    let expected = xml_from_memory();
    for size in 1..=32 {
        let mut parser = Parser::new(EventRecorder::new());
        let report = parser
            .parse_io(Chunked { data: XML.as_bytes(), size }, None)
            .unwrap();
        assert!(report.is_clean(), "read size {size}");
        assert_eq!(parser.document().events, expected.events, "read size {size}");
        assert_bracketed(parser.document());
    }
}

#[test]
fn test_xml_push_split_anywhere() {
    let expected = xml_from_memory();
    let bytes = XML.as_bytes();
    for split in 0..=bytes.len() {
        let mut parser = PushParser::new(EventRecorder::new());
        parser.feed(&bytes[..split]).unwrap();
        parser.feed(&bytes[split..]).unwrap();
        parser.finish().unwrap();
        assert_eq!(parser.document().events, expected.events, "split at {split}");
    }
}

#[test]
fn test_html_read_sizes_do_not_change_events() {
    let expected = html_from_memory();
    assert_bracketed(&expected);
    for size in [1, 2, 3, 5, 8, 13, 64, 1024] {
        let mut parser = HtmlParser::html(EventRecorder::new());
        parser
            .parse_io(Chunked { data: HTML.as_bytes(), size }, Some("UTF-8"))
            .unwrap();
        assert_eq!(parser.document().events, expected.events, "read size {size}");
    }
}

#[test]
fn test_html_push_split_anywhere() {
    let expected = html_from_memory();
    let bytes = HTML.as_bytes();
    for split in (0..=bytes.len()).step_by(3) {
        let mut parser = PushParser::with_options(
            EventRecorder::new(),
            fos_sax::Mode::Html,
            None,
            Some(fos_sax::EncodingId::UTF_8),
        );
        parser.feed(&bytes[..split]).unwrap();
        parser.feed(&bytes[split..]).unwrap();
        parser.finish().unwrap();
        assert_eq!(parser.document().events, expected.events, "split at {split}");
    }
}

#[test]
fn test_html_events_are_corrected() {
    let recorder = html_from_memory();
    assert!(recorder.events.contains(&SaxEvent::text("Menu & Prices")));
    assert!(recorder.events.contains(&SaxEvent::text("été")));
    assert!(recorder.errors().contains(&"Unexpected end tag : span"));

    let opened = recorder
        .events
        .iter()
        .filter(|event| matches!(event, SaxEvent::StartElement { .. }))
        .count();
    let closed = recorder
        .events
        .iter()
        .filter(|event| matches!(event, SaxEvent::EndElement { .. }))
        .count();
    assert_eq!(opened, closed);
}

#[test]
fn test_malformed_xml_is_split_invariant() {
    let input = b"<root><a>one</b><c/></root>";
    let mut whole = Parser::new(EventRecorder::new());
    whole.parse_memory(input, None).unwrap();

    for size in 1..input.len() {
        let mut chunked = Parser::new(EventRecorder::new());
        let report = chunked
            .parse_io(Chunked { data: input, size }, None)
            .unwrap();
        assert!(report.first_malformed().is_some());
        assert_eq!(chunked.document().events, whole.document().events, "read size {size}");
    }
}

#[test]
fn test_interrupted_reads_are_retried() {
    let expected = xml_from_memory();
    let mut parser = Parser::new(EventRecorder::new());
    parser
        .parse_io(Flaky { data: XML.as_bytes(), interrupt: false }, None)
        .unwrap();
    assert_eq!(parser.document().events, expected.events);
}

#[test]
fn test_configured_read_size() {
    let expected = xml_from_memory();
    let config = ParserConfig::xml().with_read_size(3);
    let mut parser: Parser<_> = Parser::with_config(EventRecorder::new(), config);
    parser.parse_io(XML.as_bytes(), None).unwrap();
    assert_eq!(parser.document().events, expected.events);
}

#[test]
fn test_context_stream_matches_memory() {
    let expected = xml_from_memory();
    let mut context = ParserContext::io(Chunked { data: XML.as_bytes(), size: 4 }, None);
    let mut parser = Parser::new(EventRecorder::new());
    assert!(context.parse_with(&mut parser).unwrap().is_clean());
    assert_eq!(parser.document().events, expected.events);
    assert!(context.line() > 1);
}

#[test]
fn test_context_flag_set_before_and_after() {
    let mut context = ParserContext::io(Chunked { data: XML.as_bytes(), size: 16 }, None);
    context.set_replace_entities(false);
    assert!(!context.replace_entities());

    let mut parser = Parser::new(EventRecorder::new());
    context.parse_with(&mut parser).unwrap();
    assert!(!context.replace_entities());

    context.set_replace_entities(true);
    assert!(context.replace_entities());
}

#[test]
fn test_html_context_stream() {
    let expected = html_from_memory();
    let mut context =
        HtmlParserContext::html_io(Chunked { data: HTML.as_bytes(), size: 9 }, Some("UTF-8"));
    let mut parser = HtmlParser::html(EventRecorder::new());
    context.parse_with(&mut parser).unwrap();
    assert_eq!(parser.document().events, expected.events);
}
