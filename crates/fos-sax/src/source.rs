//! Input sources
//!
//! [`Parser::parse`](crate::Parser::parse) takes anything that can become a
//! [`Source`]. Byte and string buffers are parsed from memory; readers are
//! parsed as streams.

use std::fs::{self, File};
use std::io::{self, BufReader, Cursor, Read};
use std::path::Path;

use crate::config::EmptyBufferPolicy;
use crate::error::ParseError;

/// Possibly absent in-memory input
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Memory<'a>(Option<&'a [u8]>);

impl<'a> Memory<'a> {
    /// Check the buffer against the call's preconditions
    pub fn bytes(self, policy: EmptyBufferPolicy) -> Result<&'a [u8], ParseError> {
        let data = self
            .0
            .ok_or(ParseError::InvalidArgument("data cannot be nil"))?;
        if data.is_empty() && policy == EmptyBufferPolicy::Reject {
            return Err(ParseError::EmptyInput);
        }
        Ok(data)
    }
}

impl<'a> From<&'a [u8]> for Memory<'a> {
    fn from(data: &'a [u8]) -> Self {
        Memory(Some(data))
    }
}

impl<'a, const N: usize> From<&'a [u8; N]> for Memory<'a> {
    fn from(data: &'a [u8; N]) -> Self {
        Memory(Some(data.as_slice()))
    }
}

impl<'a> From<&'a str> for Memory<'a> {
    fn from(data: &'a str) -> Self {
        Memory(Some(data.as_bytes()))
    }
}

impl<'a> From<&'a String> for Memory<'a> {
    fn from(data: &'a String) -> Self {
        Memory(Some(data.as_bytes()))
    }
}

impl<'a> From<&'a Vec<u8>> for Memory<'a> {
    fn from(data: &'a Vec<u8>) -> Self {
        Memory(Some(data.as_slice()))
    }
}

impl<'a> From<Option<&'a [u8]>> for Memory<'a> {
    fn from(data: Option<&'a [u8]>) -> Self {
        Memory(data)
    }
}

impl<'a> From<Option<&'a str>> for Memory<'a> {
    fn from(data: Option<&'a str>) -> Self {
        Memory(data.map(str::as_bytes))
    }
}

/// Parse input, classified by capability
pub enum Source<'a> {
    Memory(&'a [u8]),
    Stream(Box<dyn Read + 'a>),
}

impl std::fmt::Debug for Source<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Memory(data) => f.debug_tuple("Memory").field(&data.len()).finish(),
            Self::Stream(_) => f.write_str("Stream"),
        }
    }
}

/// Wrap any reader so it is parsed as a stream
#[derive(Debug)]
pub struct Stream<R>(pub R);

/// Conversion into a parse source
pub trait IntoSource<'a> {
    fn into_source(self) -> Result<Source<'a>, ParseError>;
}

impl<'a> IntoSource<'a> for Source<'a> {
    fn into_source(self) -> Result<Source<'a>, ParseError> {
        Ok(self)
    }
}

impl<'a> IntoSource<'a> for Memory<'a> {
    fn into_source(self) -> Result<Source<'a>, ParseError> {
        self.0
            .map(Source::Memory)
            .ok_or(ParseError::InvalidArgument("data cannot be nil"))
    }
}

impl<'a> IntoSource<'a> for &'a [u8] {
    fn into_source(self) -> Result<Source<'a>, ParseError> {
        Ok(Source::Memory(self))
    }
}

impl<'a, const N: usize> IntoSource<'a> for &'a [u8; N] {
    fn into_source(self) -> Result<Source<'a>, ParseError> {
        Ok(Source::Memory(self.as_slice()))
    }
}

impl<'a> IntoSource<'a> for &'a str {
    fn into_source(self) -> Result<Source<'a>, ParseError> {
        Ok(Source::Memory(self.as_bytes()))
    }
}

impl<'a> IntoSource<'a> for &'a String {
    fn into_source(self) -> Result<Source<'a>, ParseError> {
        Ok(Source::Memory(self.as_bytes()))
    }
}

impl<'a> IntoSource<'a> for &'a Vec<u8> {
    fn into_source(self) -> Result<Source<'a>, ParseError> {
        Ok(Source::Memory(self.as_slice()))
    }
}

impl<'a, R: Read + 'a> IntoSource<'a> for Stream<R> {
    fn into_source(self) -> Result<Source<'a>, ParseError> {
        Ok(Source::Stream(Box::new(self.0)))
    }
}

impl<'a> IntoSource<'a> for File {
    fn into_source(self) -> Result<Source<'a>, ParseError> {
        Ok(Source::Stream(Box::new(self)))
    }
}

impl<'a, R: Read + 'a> IntoSource<'a> for BufReader<R> {
    fn into_source(self) -> Result<Source<'a>, ParseError> {
        Ok(Source::Stream(Box::new(self)))
    }
}

impl<'a, T: AsRef<[u8]> + 'a> IntoSource<'a> for Cursor<T> {
    fn into_source(self) -> Result<Source<'a>, ParseError> {
        Ok(Source::Stream(Box::new(self)))
    }
}

impl<'a> IntoSource<'a> for Box<dyn Read + 'a> {
    fn into_source(self) -> Result<Source<'a>, ParseError> {
        Ok(Source::Stream(self))
    }
}

/// Absent input is an invalid argument
impl<'a, T: IntoSource<'a>> IntoSource<'a> for Option<T> {
    fn into_source(self) -> Result<Source<'a>, ParseError> {
        self.ok_or(ParseError::InvalidArgument("data cannot be nil"))?
            .into_source()
    }
}

/// Open a path for parsing, classifying resolution failures
pub(crate) fn open_file(path: &Path) -> Result<File, ParseError> {
    if path.as_os_str().is_empty() {
        return Err(ParseError::InvalidArgument("filename cannot be empty"));
    }
    let metadata = fs::metadata(path).map_err(|err| match err.kind() {
        io::ErrorKind::NotFound => ParseError::NotFound(path.to_path_buf()),
        _ => ParseError::Io(err),
    })?;
    if metadata.is_dir() {
        return Err(ParseError::IsADirectory(path.to_path_buf()));
    }
    Ok(File::open(path)?)
}
