//! Stream framing: bytes in, complete protocol lines out.
//!
//! [`LineFramer`] turns an unbounded byte stream into discrete protocol
//! lines. Each call to [`feed`](LineFramer::feed) appends newly received
//! bytes to a carried fragment, splits the combined buffer on line
//! terminators, yields every complete segment in order, and retains the
//! final (possibly empty) segment as the new fragment — it is never yielded,
//! since it may still be incomplete.
//!
//! The fragment is kept as raw bytes; decoding (with the configured text
//! encoding) happens per complete line, so a decode failure on one line is
//! recoverable and never corrupts the carried fragment. The fragment size is
//! bounded: a peer that never sends a terminator fails the connection
//! instead of growing the buffer without limit.

use bytes::BytesMut;
use encoding::Encoding;

use crate::error::{Error, Result};

/// Maximum allowed size of the retained fragment, in bytes.
///
/// Matches the largest legal IRC line (tags section + message body).
pub const MAX_FRAGMENT_LEN: usize = 8191;

/// Buffered line source for one connection.
///
/// Exclusively owns the unterminated trailing bytes from the most recent
/// read; the fragment is never observed outside the framer.
#[derive(Debug)]
pub struct LineFramer {
    buf: BytesMut,
    encoding: &'static Encoding,
    max_fragment: usize,
}

impl Default for LineFramer {
    fn default() -> Self {
        Self::utf8()
    }
}

impl LineFramer {
    /// Create a framer for the encoding named by `label` (e.g. `"utf-8"`,
    /// `"latin1"`). Returns `None` for an unknown label.
    pub fn new(label: &str) -> Option<Self> {
        Encoding::for_label(label.as_bytes()).map(|encoding| LineFramer {
            buf: BytesMut::with_capacity(4096),
            encoding,
            max_fragment: MAX_FRAGMENT_LEN,
        })
    }

    /// Create a UTF-8 framer.
    pub fn utf8() -> Self {
        Self::new("utf-8").expect("utf-8 label is always known")
    }

    /// Override the maximum retained fragment size.
    #[must_use]
    pub fn with_max_fragment(mut self, max_fragment: usize) -> Self {
        self.max_fragment = max_fragment;
        self
    }

    /// The configured text encoding.
    pub fn encoding(&self) -> &'static Encoding {
        self.encoding
    }

    /// Size of the currently retained fragment, in bytes.
    pub fn fragment_len(&self) -> usize {
        self.buf.len()
    }

    /// Append `input` and split off every complete line.
    ///
    /// Returns one entry per complete line, in arrival order. A line that
    /// fails to decode yields `Err(Error::Decode { .. })` in its slot —
    /// recoverable, and the fragment state is unaffected. The outer `Err`
    /// is fatal: the retained fragment exceeded its bound.
    ///
    /// Lines are terminated by LF; a preceding CR is stripped, so both CRLF
    /// and bare LF framing are accepted.
    pub fn feed(&mut self, input: &[u8]) -> Result<Vec<Result<String>>> {
        self.buf.extend_from_slice(input);

        let mut lines = Vec::new();
        while let Some(pos) = self.buf.iter().position(|&b| b == b'\n') {
            let segment = self.buf.split_to(pos + 1);
            let mut end = segment.len() - 1;
            if end > 0 && segment[end - 1] == b'\r' {
                end -= 1;
            }
            lines.push(self.decode(&segment[..end]));
        }

        if self.buf.len() > self.max_fragment {
            return Err(Error::FragmentTooLong {
                actual: self.buf.len(),
                limit: self.max_fragment,
            });
        }

        Ok(lines)
    }

    /// Encode one outbound line with the configured encoding and append the
    /// CRLF terminator exactly once.
    pub fn encode_line(&self, line: &str) -> Vec<u8> {
        let (bytes, _, _) = self.encoding.encode(line);
        let mut out = Vec::with_capacity(bytes.len() + 2);
        out.extend_from_slice(&bytes);
        out.extend_from_slice(b"\r\n");
        out
    }

    fn decode(&self, bytes: &[u8]) -> Result<String> {
        let (text, had_errors) = self.encoding.decode_without_bom_handling(bytes);
        if had_errors {
            Err(Error::Decode {
                encoding: self.encoding.name(),
            })
        } else {
            Ok(text.into_owned())
        }
    }
}
