//! RFC-822 envelope header parser.
//!
//! The envelope is the block of `Key: Value` lines terminating in an empty
//! line that precedes a body, both in HTTP and in MIME parts. This parser
//! is push-driven: the caller feeds byte chunks split at arbitrary
//! positions and receives one [`HeaderSink::on_header_line`] call per
//! completed header. Folded continuation lines (lines starting with
//! whitespace) are appended to the previous header's value, which is why
//! the last key/value pair is held back until the next line proves it is
//! complete.
//!
//! Only the bytes of the current unterminated line are buffered; the
//! parser never retains the whole header block.

use std::fmt;

/// Receiver for parsed header lines.
pub trait HeaderSink {
    /// Called once per completed header line, continuations folded in.
    fn on_header_line(&mut self, key: &str, value: &str);
}

/// Error produced while parsing an envelope.
#[derive(Debug, PartialEq, Eq)]
pub enum EnvelopeError {
    /// A header line contained no `:` separator.
    MissingColon,
    /// A continuation line arrived with no header to continue.
    OrphanContinuation,
}

impl fmt::Display for EnvelopeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingColon => write!(f, "header line has no colon separator"),
            Self::OrphanContinuation => {
                write!(f, "continuation line without a preceding header")
            }
        }
    }
}

impl std::error::Error for EnvelopeError {}

/// Push parser for an envelope header block.
#[derive(Debug)]
pub struct EnvelopeParser {
    /// True while the final empty line has not been seen. Once false, the
    /// parser consumes nothing.
    in_headers: bool,
    /// Bytes of the current unterminated line.
    pending: Vec<u8>,
    /// Key of the most recently parsed header, held for continuations.
    last_key: String,
    /// Value of the most recently parsed header, held for continuations.
    last_value: String,
}

impl EnvelopeParser {
    /// Creates a parser positioned at the start of a header block.
    #[must_use]
    pub fn new() -> Self {
        Self {
            in_headers: true,
            pending: Vec::new(),
            last_key: String::new(),
            last_value: String::new(),
        }
    }

    /// Returns true if more header input is expected.
    #[must_use]
    pub fn is_in_headers(&self) -> bool {
        self.in_headers
    }

    /// Overrides the in-headers flag.
    ///
    /// The multipart parser presets this to `false` so that any preamble
    /// before the first boundary is treated as body data.
    pub fn set_in_headers(&mut self, in_headers: bool) {
        self.in_headers = in_headers;
    }

    /// Forgets everything parsed so far so the parser can be reused.
    pub fn reset(&mut self) {
        self.in_headers = true;
        self.pending.clear();
        self.last_key.clear();
        self.last_value.clear();
    }

    /// Parses a chunk of incoming data.
    ///
    /// Returns the number of bytes of `data` that belong to the header
    /// block. The count is less than `data.len()` only when the final
    /// empty line was found, in which case the remainder belongs to the
    /// body. Once the block has ended, further calls consume nothing.
    pub fn parse<S: HeaderSink>(
        &mut self,
        data: &[u8],
        sink: &mut S,
    ) -> Result<usize, EnvelopeError> {
        if !self.in_headers {
            return Ok(0);
        }

        // Restart the scan one byte before the previous tail so a CR that
        // arrived in the last chunk still pairs with an LF in this one.
        let prev_len = self.pending.len();
        let search_start = prev_len.saturating_sub(1);
        self.pending.extend_from_slice(data);

        let Some(mut idx_crlf) = crate::text::find_bytes(&self.pending, b"\r\n", search_start)
        else {
            // Not a complete line yet, all input consumed.
            return Ok(data.len());
        };

        let mut last = 0usize;
        loop {
            if idx_crlf == last {
                // Empty line: the header block is finished. Flush the
                // pending key/value and count the final CRLF as consumed.
                self.notify_last(sink);
                self.in_headers = false;
                let consumed = idx_crlf + 2 - prev_len;
                self.pending.clear();
                return Ok(consumed);
            }
            let line = self.pending[last..idx_crlf].to_vec();
            if let Err(err) = self.parse_line(&line, sink) {
                self.in_headers = false;
                return Err(err);
            }
            last = idx_crlf + 2;
            match crate::text::find_bytes(&self.pending, b"\r\n", last) {
                Some(idx) => idx_crlf = idx,
                None => break,
            }
        }
        self.pending.drain(..last);

        // Parsed all complete lines and still expecting more.
        Ok(data.len())
    }

    /// Flushes the held-back key/value pair to the sink, if any.
    fn notify_last<S: HeaderSink>(&mut self, sink: &mut S) {
        if !self.last_key.is_empty() {
            sink.on_header_line(&self.last_key, &self.last_value);
            self.last_key.clear();
        }
        self.last_value.clear();
    }

    /// Parses one complete, non-empty header line.
    fn parse_line<S: HeaderSink>(
        &mut self,
        line: &[u8],
        sink: &mut S,
    ) -> Result<(), EnvelopeError> {
        if line[0] <= b' ' {
            // Continuation of the previous header's value; the leading
            // whitespace is kept verbatim.
            if self.last_key.is_empty() {
                return Err(EnvelopeError::OrphanContinuation);
            }
            self.last_value
                .push_str(&String::from_utf8_lossy(line));
            return Ok(());
        }

        // A line with a new key: flush the previous one first.
        self.notify_last(sink);
        for (i, &b) in line.iter().enumerate() {
            if b == b':' {
                self.last_key = String::from_utf8_lossy(&line[..i]).into_owned();
                // The single byte after the colon (the customary space)
                // is not part of the value.
                self.last_value = if line.len() > i + 1 {
                    String::from_utf8_lossy(&line[i + 2..]).into_owned()
                } else {
                    String::new()
                };
                return Ok(());
            }
        }
        Err(EnvelopeError::MissingColon)
    }
}

impl Default for EnvelopeParser {
    fn default() -> Self {
        Self::new()
    }
}
