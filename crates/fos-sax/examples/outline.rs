//! Example: print the element outline of a document
//!
//! Run with `RUST_LOG=debug` to see the parser session logs.

use fos_sax::{Attribute, DocumentHandler, HtmlParser, Parser};

/// Prints one indented line per element
#[derive(Default)]
struct Outline {
    depth: usize,
}

impl DocumentHandler for Outline {
    fn start_element(&mut self, name: &str, attributes: &[Attribute]) {
        let attrs: Vec<String> = attributes
            .iter()
            .map(|attr| format!("{}={:?}", attr.name, attr.value))
            .collect();
        println!("{}{} {}", "  ".repeat(self.depth), name, attrs.join(" "));
        self.depth += 1;
    }

    fn end_element(&mut self, _name: &str) {
        self.depth = self.depth.saturating_sub(1);
    }

    fn error(&mut self, message: &str) {
        eprintln!("error: {message}");
    }
}

fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt::init();

    let xml = r#"<feed><entry id="1"><title>First</title></entry><entry id="2"/></feed>"#;
    let mut parser = Parser::new(Outline::default());
    parser.parse_memory(xml, None)?;

    let html = "<ul><li>one<li>two</ul><p>unclosed";
    let mut parser = HtmlParser::html(Outline::default());
    let report = parser.parse_memory(html, None)?;
    println!("absorbed engine errors: {}", report.engine_errors.len());

    Ok(())
}
