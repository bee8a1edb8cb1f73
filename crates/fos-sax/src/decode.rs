//! Input decoding
//!
//! Turns raw byte chunks into text for the engines. The encoding is picked
//! on the first bytes: a forced encoding wins, then a byte order mark, then
//! (XML only) the `encoding` pseudo-attribute of the XML declaration, then
//! the hint, then UTF-8. Multi-byte sequences split across chunks are
//! carried over by the decoder.

use encoding_rs::{CoderResult, Decoder, Encoding, UTF_8};

use crate::encoding::EncodingId;
use crate::error::EngineError;

/// Bytes inspected for an XML declaration before giving up
const DECLARATION_WINDOW: usize = 1024;

/// Incremental byte-to-text decoder
pub struct InputDecoder {
    hint: Option<&'static Encoding>,
    forced: Option<&'static Encoding>,
    sniff_declaration: bool,
    decoder: Option<Decoder>,
    /// Bytes held back until the encoding is known
    pending: Vec<u8>,
    /// Text flushed out of a replaced decoder, emitted on the next call
    carry: String,
    done: bool,
}

impl InputDecoder {
    /// `sniff_declaration` enables XML declaration detection
    pub fn new(hint: Option<EncodingId>, sniff_declaration: bool) -> Self {
        Self {
            hint: hint.and_then(EncodingId::to_encoding),
            forced: None,
            sniff_declaration,
            decoder: None,
            pending: Vec::new(),
            carry: String::new(),
            done: false,
        }
    }

    /// Force an encoding, overriding any detection.
    ///
    /// `NONE` is accepted and leaves detection in effect. Forcing after
    /// decoding started switches the decoder for the following bytes; the
    /// old decoder is flushed first, so a character it had only partly seen
    /// comes out as U+FFFD.
    pub fn force(&mut self, id: EncodingId) -> Result<(), EngineError> {
        if id.is_none() {
            return Ok(());
        }
        let encoding = id
            .to_encoding()
            .ok_or_else(|| EngineError::UnsupportedEncoding(id.name().to_string()))?;
        self.forced = Some(encoding);
        if self.decoder.is_some() && !self.done {
            let mut carry = std::mem::take(&mut self.carry);
            self.run(&[], true, &mut carry);
            self.carry = carry;
            self.decoder = Some(encoding.new_decoder_without_bom_handling());
        }
        Ok(())
    }

    /// Encoding in use, once it has been decided
    pub fn encoding(&self) -> Option<&'static Encoding> {
        self.decoder.as_ref().map(Decoder::encoding)
    }

    /// Decode a chunk, appending text to `out`.
    ///
    /// With `last` set, held-back bytes are flushed and the decoder closes;
    /// later calls produce nothing.
    pub fn decode(&mut self, bytes: &[u8], last: bool, out: &mut String) {
        if self.done {
            return;
        }
        out.push_str(&std::mem::take(&mut self.carry));
        if self.decoder.is_none() {
            self.pending.extend_from_slice(bytes);
            let Some(decoder) = self.select(last) else {
                return;
            };
            self.decoder = Some(decoder);
            let pending = std::mem::take(&mut self.pending);
            self.run(&pending, last, out);
        } else {
            self.run(bytes, last, out);
        }
        if last {
            self.done = true;
        }
    }

    fn run(&mut self, mut input: &[u8], last: bool, out: &mut String) {
        let Some(decoder) = self.decoder.as_mut() else {
            return;
        };
        loop {
            let room = decoder
                .max_utf8_buffer_length(input.len())
                .unwrap_or(input.len().saturating_mul(3) + 16);
            out.reserve(room);
            let (result, read, _had_errors) = decoder.decode_to_string(input, out, last);
            input = &input[read..];
            match result {
                CoderResult::InputEmpty => break,
                CoderResult::OutputFull => continue,
            }
        }
    }

    fn select(&self, last: bool) -> Option<Decoder> {
        if let Some(forced) = self.forced {
            return Some(forced.new_decoder_with_bom_removal());
        }

        let head = self.pending.as_slice();
        if head.len() < 3 && !last {
            return None;
        }
        if let Some((encoding, _)) = Encoding::for_bom(head) {
            return Some(encoding.new_decoder_with_bom_removal());
        }

        if self.sniff_declaration {
            match sniff_declaration(head, last) {
                Sniff::Pending => return None,
                Sniff::Found(encoding) => return Some(encoding.new_decoder_without_bom_handling()),
                Sniff::Absent => {}
            }
        }

        let fallback = self.hint.unwrap_or(UTF_8);
        Some(fallback.new_decoder_without_bom_handling())
    }
}

impl std::fmt::Debug for InputDecoder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InputDecoder")
            .field("hint", &self.hint.map(Encoding::name))
            .field("forced", &self.forced.map(Encoding::name))
            .field("encoding", &self.encoding().map(Encoding::name))
            .field("pending", &self.pending.len())
            .finish()
    }
}

enum Sniff {
    Pending,
    Found(&'static Encoding),
    Absent,
}

fn sniff_declaration(head: &[u8], last: bool) -> Sniff {
    const OPEN: &[u8] = b"<?xml";

    if head.len() < OPEN.len() {
        return if !last && OPEN.starts_with(head) {
            Sniff::Pending
        } else {
            Sniff::Absent
        };
    }
    if !head.starts_with(OPEN) {
        return Sniff::Absent;
    }

    let window = &head[..head.len().min(DECLARATION_WINDOW)];
    let Some(close) = window.windows(2).position(|pair| pair == b"?>") else {
        return if !last && head.len() < DECLARATION_WINDOW {
            Sniff::Pending
        } else {
            Sniff::Absent
        };
    };

    let Ok(decl) = std::str::from_utf8(&window[OPEN.len()..close]) else {
        return Sniff::Absent;
    };
    match pseudo_attribute(decl, "encoding").and_then(|label| Encoding::for_label(label.as_bytes())) {
        // A declaration readable as ASCII cannot be UTF-16
        Some(encoding) if encoding.is_ascii_compatible() => Sniff::Found(encoding),
        _ => Sniff::Absent,
    }
}

/// Value of `name="..."` inside an XML declaration
pub(crate) fn pseudo_attribute<'a>(decl: &'a str, name: &str) -> Option<&'a str> {
    let mut rest = decl;
    while let Some(at) = rest.find(name) {
        let after = rest[at + name.len()..].trim_start();
        if let Some(after_eq) = after.strip_prefix('=') {
            let value = after_eq.trim_start();
            let quote = value.chars().next()?;
            if quote == '"' || quote == '\'' {
                let body = &value[1..];
                let end = body.find(quote)?;
                return Some(&body[..end]);
            }
            return None;
        }
        rest = &rest[at + name.len()..];
    }
    None
}
