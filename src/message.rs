//! HTTP/1.1 message parser.
//!
//! Sequences the three phases of a message (first line, envelope
//! headers, transfer-encoded body) over arbitrarily split input chunks,
//! reusing the envelope and transfer-encoding parsers. Events are
//! delivered to a [`MessageSink`] in stream order: first-line (once),
//! header-line (n), headers-finished (once), body-data (k), body-finished
//! (once).
//!
//! `parse` returns the number of bytes consumed from the pushed slice;
//! the caller keeps any unconsumed suffix, which belongs to the next
//! message on a pipelined connection. [`MessageParser::reset`] prepares
//! the parser for that next message.

use std::fmt;

use log::{debug, trace};

use crate::envelope::{EnvelopeError, EnvelopeParser, HeaderSink};
use crate::text;
use crate::transfer::{BodySink, TransferDecoder, TransferError};

/// Receiver for message parse events.
pub trait MessageSink {
    /// Called once with the first line, CRLF stripped. The line is not
    /// validated, only extracted.
    fn on_first_line(&mut self, line: &str);
    /// Called for each parsed header line.
    fn on_header_line(&mut self, key: &str, value: &str);
    /// Called once, between the last header line and the first body byte.
    fn on_headers_finished(&mut self);
    /// Called for each run of decoded body bytes.
    fn on_body_data(&mut self, data: &[u8]);
    /// Called once, when the body is complete.
    fn on_body_finished(&mut self);
}

/// Error produced while parsing a message.
#[derive(Debug, PartialEq, Eq)]
pub enum MessageError {
    /// The header block was malformed.
    Envelope(EnvelopeError),
    /// The `Content-Length` header did not parse as an integer.
    InvalidContentLength {
        /// The header value as sent.
        value: String,
    },
    /// The `Transfer-Encoding` header named an unsupported encoding.
    UnknownTransferEncoding {
        /// The encoding name as sent.
        encoding: String,
    },
    /// The body framing was malformed or truncated.
    Transfer(TransferError),
}

impl fmt::Display for MessageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Envelope(err) => write!(f, "failed to parse the envelope: {err}"),
            Self::InvalidContentLength { value } => {
                write!(f, "invalid content length header value: \"{value}\"")
            }
            Self::UnknownTransferEncoding { encoding } => {
                write!(f, "unknown transfer encoding: {encoding}")
            }
            Self::Transfer(err) => write!(f, "{err}"),
        }
    }
}

impl std::error::Error for MessageError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Envelope(err) => Some(err),
            Self::Transfer(err) => Some(err),
            _ => None,
        }
    }
}

impl From<EnvelopeError> for MessageError {
    fn from(err: EnvelopeError) -> Self {
        Self::Envelope(err)
    }
}

impl From<TransferError> for MessageError {
    fn from(err: TransferError) -> Self {
        Self::Transfer(err)
    }
}

/// Bridges envelope callbacks to the message sink while capturing the
/// headers that pick the body framing.
struct HeaderCollector<'a, S: MessageSink> {
    sink: &'a mut S,
    transfer_encoding: &'a mut String,
    content_length: &'a mut usize,
    bad_content_length: &'a mut Option<String>,
}

impl<S: MessageSink> HeaderSink for HeaderCollector<'_, S> {
    fn on_header_line(&mut self, key: &str, value: &str) {
        self.sink.on_header_line(key, value);
        if key.eq_ignore_ascii_case("content-length") {
            match value.parse::<usize>() {
                Ok(length) => *self.content_length = length,
                Err(_) => *self.bad_content_length = Some(value.to_string()),
            }
        } else if key.eq_ignore_ascii_case("transfer-encoding") {
            *self.transfer_encoding = value.to_string();
        }
    }
}

/// Forwards body events to the message sink and latches completion.
struct BodyBridge<'a, S: MessageSink> {
    sink: &'a mut S,
    finished: &'a mut bool,
}

impl<S: MessageSink> BodySink for BodyBridge<'_, S> {
    fn on_body_data(&mut self, data: &[u8]) {
        self.sink.on_body_data(data);
    }

    fn on_body_finished(&mut self) {
        *self.finished = true;
        self.sink.on_body_finished();
    }
}

/// Push parser for one HTTP message.
#[derive(Debug)]
pub struct MessageParser {
    /// The complete first line; empty while not yet parsed.
    first_line: String,
    /// Buffer used only until the first line is complete.
    buffer: Vec<u8>,
    envelope: EnvelopeParser,
    /// Body decoder, constructed when the headers end.
    decoder: Option<TransferDecoder>,
    /// `Transfer-Encoding` value collected from the headers.
    transfer_encoding: String,
    /// `Content-Length` value collected from the headers.
    content_length: usize,
    bad_content_length: Option<String>,
    finished: bool,
    errored: bool,
}

impl MessageParser {
    /// Creates a parser positioned at the start of a message.
    #[must_use]
    pub fn new() -> Self {
        Self {
            first_line: String::new(),
            buffer: Vec::new(),
            envelope: EnvelopeParser::new(),
            decoder: None,
            transfer_encoding: String::new(),
            content_length: 0,
            bad_content_length: None,
            finished: false,
            errored: false,
        }
    }

    /// Returns true once the entire message has been parsed.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Returns the parser to its initial state so a keep-alive connection
    /// can parse its next message.
    pub fn reset(&mut self) {
        self.first_line.clear();
        self.buffer.clear();
        self.envelope.reset();
        self.decoder = None;
        self.transfer_encoding.clear();
        self.content_length = 0;
        self.bad_content_length = None;
        self.finished = false;
        self.errored = false;
    }

    /// Parses a chunk of incoming data, invoking sink callbacks for every
    /// event the chunk completes.
    ///
    /// Returns the number of bytes consumed from `data`. The caller must
    /// retain any unconsumed suffix and, after [`reset`][Self::reset],
    /// feed it into the next parse. After an error or a finished message,
    /// calls consume nothing.
    pub fn parse<S: MessageSink>(
        &mut self,
        data: &[u8],
        sink: &mut S,
    ) -> Result<usize, MessageError> {
        if self.finished || self.errored {
            return Ok(0);
        }

        // Phase one: accumulate until the first line is complete, then
        // run the rest of the accumulated buffer through the later
        // phases within the same call.
        if self.first_line.is_empty() {
            let buffered = self.buffer.len();
            self.buffer.extend_from_slice(data);
            let Some(idx) = text::find_bytes(&self.buffer, b"\r\n", 0) else {
                return Ok(data.len());
            };
            self.first_line = String::from_utf8_lossy(&self.buffer[..idx]).into_owned();
            trace!("first line parsed: {:?}", self.first_line);
            sink.on_first_line(&self.first_line);
            let first_consumed = idx + 2;
            self.buffer.drain(..first_consumed);

            let env_consumed = self.parse_envelope_from_buffer(sink)?;
            if self.envelope.is_in_headers() {
                // Headers continue; everything so far is consumed.
                return Ok(data.len());
            }
            self.headers_finished(sink)?;
            let body = std::mem::take(&mut self.buffer);
            let unconsumed = self.parse_body(&body, sink)?;
            let used = first_consumed + env_consumed + (body.len() - unconsumed);
            return Ok(used - buffered);
        }

        // Phase two: headers.
        if self.envelope.is_in_headers() {
            let env_consumed = self.parse_envelope(data, sink)?;
            if self.envelope.is_in_headers() {
                return Ok(data.len());
            }
            self.headers_finished(sink)?;
            let unconsumed = self.parse_body(&data[env_consumed..], sink)?;
            return Ok(data.len() - unconsumed);
        }

        // Phase three: body.
        let unconsumed = self.parse_body(data, sink)?;
        Ok(data.len() - unconsumed)
    }

    /// Signals upstream EOF (an HTTP/1.0 close-delimited stream).
    /// Delegates to the transfer decoder, which errors if body bytes were
    /// still outstanding.
    pub fn finish(&mut self) -> Result<(), MessageError> {
        match self.decoder.as_mut() {
            Some(decoder) => decoder.finish().map_err(|err| {
                self.errored = true;
                err.into()
            }),
            None => Ok(()),
        }
    }

    /// Feeds the internal buffer to the envelope parser and drains the
    /// consumed prefix.
    fn parse_envelope_from_buffer<S: MessageSink>(
        &mut self,
        sink: &mut S,
    ) -> Result<usize, MessageError> {
        let buffer = std::mem::take(&mut self.buffer);
        let consumed = self.parse_envelope(&buffer, sink)?;
        self.buffer = buffer;
        self.buffer.drain(..consumed);
        Ok(consumed)
    }

    /// Feeds input to the envelope parser through the header-collecting
    /// bridge.
    fn parse_envelope<S: MessageSink>(
        &mut self,
        data: &[u8],
        sink: &mut S,
    ) -> Result<usize, MessageError> {
        let mut collector = HeaderCollector {
            sink,
            transfer_encoding: &mut self.transfer_encoding,
            content_length: &mut self.content_length,
            bad_content_length: &mut self.bad_content_length,
        };
        let consumed = match self.envelope.parse(data, &mut collector) {
            Ok(consumed) => consumed,
            Err(err) => {
                debug!("envelope parse failed: {err}");
                self.errored = true;
                return Err(err.into());
            }
        };
        if let Some(value) = self.bad_content_length.take() {
            self.errored = true;
            return Err(MessageError::InvalidContentLength { value });
        }
        Ok(consumed)
    }

    /// Runs once when the headers end: reports the event and constructs
    /// the transfer decoder.
    fn headers_finished<S: MessageSink>(&mut self, sink: &mut S) -> Result<(), MessageError> {
        sink.on_headers_finished();
        if self.transfer_encoding.is_empty() {
            self.transfer_encoding.push_str("identity");
        }
        match TransferDecoder::for_encoding(&self.transfer_encoding, self.content_length) {
            Some(decoder) => {
                trace!(
                    "headers finished, transfer encoding {:?}, content length {}",
                    self.transfer_encoding,
                    self.content_length
                );
                self.decoder = Some(decoder);
                Ok(())
            }
            None => {
                debug!("unknown transfer encoding {:?}", self.transfer_encoding);
                self.errored = true;
                Err(MessageError::UnknownTransferEncoding {
                    encoding: self.transfer_encoding.clone(),
                })
            }
        }
    }

    /// Forwards body bytes to the transfer decoder. Returns the number of
    /// unconsumed trailing bytes.
    fn parse_body<S: MessageSink>(
        &mut self,
        data: &[u8],
        sink: &mut S,
    ) -> Result<usize, MessageError> {
        let Some(decoder) = self.decoder.as_mut() else {
            return Ok(data.len());
        };
        let mut bridge = BodyBridge {
            sink,
            finished: &mut self.finished,
        };
        match decoder.parse(data, &mut bridge) {
            Ok(unconsumed) => Ok(unconsumed),
            Err(err) => {
                self.errored = true;
                Err(err.into())
            }
        }
    }
}

impl Default for MessageParser {
    fn default() -> Self {
        Self::new()
    }
}
