//! Parser configuration
//!
//! XML and HTML parsing share one orchestrator. What differs between them
//! is captured by a [`Dialect`]: the tokenization mode and the defaults in
//! [`ParserConfig`].

use crate::engine::Mode;

/// What to do with a zero-length in-memory buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EmptyBufferPolicy {
    /// Fail with [`crate::ParseError::EmptyInput`] before any engine exists
    #[default]
    Reject,
    /// Parse it like any other buffer
    Accept,
}

/// Batch parser configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParserConfig {
    /// Encoding used by buffer parsing when none is given
    pub memory_encoding: String,
    /// Encoding used by stream and file parsing when none is given
    pub io_encoding: String,
    /// Bytes requested per stream read
    pub read_size: usize,
    pub empty_buffers: EmptyBufferPolicy,
}

impl ParserConfig {
    /// Strict XML defaults: auto-detect everywhere
    pub fn xml() -> Self {
        Self {
            memory_encoding: "NONE".to_string(),
            io_encoding: "NONE".to_string(),
            read_size: 4096,
            empty_buffers: EmptyBufferPolicy::Reject,
        }
    }

    /// Tolerant HTML defaults
    pub fn html() -> Self {
        Self {
            memory_encoding: "UTF-8".to_string(),
            io_encoding: "ASCII".to_string(),
            read_size: 1024,
            empty_buffers: EmptyBufferPolicy::Reject,
        }
    }

    pub fn with_empty_buffers(mut self, policy: EmptyBufferPolicy) -> Self {
        self.empty_buffers = policy;
        self
    }

    pub fn with_read_size(mut self, read_size: usize) -> Self {
        self.read_size = read_size.max(1);
        self
    }
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self::xml()
    }
}

/// Engine construction policy
pub trait Dialect {
    const MODE: Mode;

    fn config() -> ParserConfig;
}

/// Strict XML parsing
#[derive(Debug, Clone, Copy, Default)]
pub struct Xml;

/// Error-tolerant HTML parsing
#[derive(Debug, Clone, Copy, Default)]
pub struct Html;

impl Dialect for Xml {
    const MODE: Mode = Mode::Xml;

    fn config() -> ParserConfig {
        ParserConfig::xml()
    }
}

impl Dialect for Html {
    const MODE: Mode = Mode::Html;

    fn config() -> ParserConfig {
        ParserConfig::html()
    }
}
