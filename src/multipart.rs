//! Streaming multipart body parser.
//!
//! Splits a `multipart/*` body into its parts, driving a per-part
//! envelope parser for the part headers and reporting payload bytes as
//! they arrive. The body has this shape (RFC 2046 §5.1):
//!
//! ```text
//! preamble (discarded)
//! --boundary\r\n
//! Content-Disposition: form-data; name="field"\r\n
//! \r\n
//! payload bytes\r\n
//! --boundary\r\n
//! ...
//! --boundary--\r\n
//! epilogue
//! ```
//!
//! The parser never reports payload bytes that could still turn out to
//! be part of an emerging boundary line: a margin of `boundary.len() + 8`
//! trailing bytes is withheld until more input resolves it.
//!
//! Events per part arrive in order: part-start, part-header (n),
//! part-data (k), part-end. The preamble and epilogue surface as
//! part-data outside any part (the preamble's terminating boundary also
//! produces a part-end before the first part-start); consumers track
//! part boundaries and ignore stray data.

use log::{debug, trace};

use crate::envelope::{EnvelopeParser, HeaderSink};
use crate::params::ParamParser;
use crate::text;

/// Receiver for multipart parse events.
pub trait PartSink {
    /// Called when a boundary opens a new part.
    fn on_part_start(&mut self);
    /// Called for each header line of the current part.
    fn on_part_header(&mut self, key: &str, value: &str);
    /// Called for each run of payload bytes.
    fn on_part_data(&mut self, data: &[u8]);
    /// Called when a boundary closes the current part.
    fn on_part_end(&mut self);
}

/// Forwards part-header lines from the embedded envelope parser.
struct PartHeaderBridge<'a, S: PartSink> {
    sink: &'a mut S,
}

impl<S: PartSink> HeaderSink for PartHeaderBridge<'_, S> {
    fn on_header_line(&mut self, key: &str, value: &str) {
        self.sink.on_part_header(key, value);
    }
}

/// Push parser for one multipart body.
#[derive(Debug)]
pub struct MultipartParser {
    /// The boundary token, without the leading `--` or framing CRLFs.
    boundary: String,
    /// False once construction or parsing failed; further input is
    /// silently ignored.
    valid: bool,
    /// Parses part headers; doubles as the preamble skip by starting in
    /// the not-in-headers state.
    envelope: EnvelopeParser,
    /// Rolling buffer of not-yet-attributed input.
    buffer: Vec<u8>,
}

impl MultipartParser {
    /// Creates a parser from the full `Content-Type` header value, which
    /// must be `multipart/...` with a non-empty `boundary` parameter.
    /// On a malformed content type the parser is created invalid and
    /// ignores all input.
    #[must_use]
    pub fn new(content_type: &str) -> Self {
        let mut parser = Self {
            boundary: String::new(),
            valid: true,
            envelope: EnvelopeParser::new(),
            buffer: Vec::new(),
        };

        if !content_type.starts_with("multipart/") {
            debug!("not a multipart content type: {content_type:?}");
            parser.valid = false;
            return parser;
        }
        let Some(idx_params) = content_type[10..].find(';').map(|i| i + 10) else {
            debug!("multipart content type without parameters: {content_type:?}");
            parser.valid = false;
            return parser;
        };

        let mut params = ParamParser::new();
        params.parse(content_type[idx_params + 1..].as_bytes());
        if !params.finish() {
            parser.valid = false;
            return parser;
        }
        match params.get("boundary") {
            Some(boundary) if !boundary.is_empty() => {
                parser.boundary = boundary.to_string();
                trace!("multipart boundary {:?}", parser.boundary);
            }
            _ => {
                debug!("multipart content type without a boundary");
                parser.valid = false;
                return parser;
            }
        }

        // The preamble before the first boundary is treated as data of a
        // pseudo-part, so the envelope starts outside the headers state.
        parser.envelope.set_in_headers(false);
        // Seeding the buffer lets a body that opens directly with
        // `--boundary` match the same `\r\n--boundary` pattern as every
        // later boundary.
        parser.buffer.extend_from_slice(b"\r\n");
        parser
    }

    /// Returns false once the content type or the stream turned out to
    /// be malformed.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.valid
    }

    /// Parses a chunk of the multipart body, invoking sink callbacks for
    /// everything the chunk completes. Malformed part headers mark the
    /// parser invalid; further input is then ignored.
    pub fn parse<S: PartSink>(&mut self, data: &[u8], sink: &mut S) {
        if !self.valid {
            return;
        }
        self.buffer.extend_from_slice(data);

        loop {
            if self.envelope.is_in_headers() {
                let mut bridge = PartHeaderBridge { sink: &mut *sink };
                let consumed = match self.envelope.parse(&self.buffer, &mut bridge) {
                    Ok(consumed) => consumed,
                    Err(err) => {
                        debug!("part header parse failed: {err}");
                        self.valid = false;
                        return;
                    }
                };
                self.buffer.drain(..consumed);
                if self.envelope.is_in_headers() {
                    // Everything consumed and the headers continue; the
                    // envelope holds the partial line.
                    return;
                }
            }

            // Find the start of a candidate boundary line.
            let Some(idx_boundary) = text::find_bytes(&self.buffer, b"\r\n--", 0) else {
                self.flush_with_margin(sink);
                return;
            };
            if idx_boundary > 0 {
                sink.on_part_data(&self.buffer[..idx_boundary]);
                self.buffer.drain(..idx_boundary);
            }

            // The candidate boundary text starts after `\r\n--`.
            let Some(line_end) = text::find_bytes(&self.buffer, b"\r\n", 4) else {
                self.flush_with_margin(sink);
                return;
            };

            let line_len = line_end - 4;
            if line_len != self.boundary.len() && line_len != self.boundary.len() + 2 {
                // A complete line of the wrong length cannot be a
                // boundary; it is part data through the line start.
                sink.on_part_data(&self.buffer[..line_end]);
                self.buffer.drain(..line_end);
                continue;
            }

            if self.buffer[4..4 + self.boundary.len()] == *self.boundary.as_bytes() {
                sink.on_part_end();
                let idx_tail = 4 + self.boundary.len();
                if self.buffer[idx_tail..idx_tail + 2] == *b"--" {
                    // Closing boundary: whatever follows is the epilogue.
                    sink.on_part_data(&self.buffer[idx_tail + 4..]);
                    self.buffer.clear();
                    return;
                }
                sink.on_part_start();
                self.buffer.drain(..line_end + 2);
                // The new part's headers follow immediately.
                self.envelope.reset();
                continue;
            }

            // Right length, wrong bytes: an ordinary data line. A
            // boundary cannot span lines, so the whole line is data.
            sink.on_part_data(&self.buffer[..line_end]);
            self.buffer.drain(..line_end);
        }
    }

    /// Reports as much buffered data as possible while withholding a
    /// tail in which a boundary could still be forming.
    fn flush_with_margin<S: PartSink>(&mut self, sink: &mut S) {
        let margin = self.boundary.len() + 8;
        if self.buffer.len() > margin {
            let report = self.buffer.len() - margin;
            sink.on_part_data(&self.buffer[..report]);
            self.buffer.drain(..report);
        }
    }
}
