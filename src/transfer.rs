//! Body framing parsers selected by the `Transfer-Encoding` header.
//!
//! Two framings are supported: `identity` (a known `Content-Length`
//! countdown) and `chunked` (RFC 7230 §4.1 hex-length-prefixed chunks
//! with an optional trailer header block). Both accept input split at
//! arbitrary byte boundaries, forward decoded body bytes to a
//! [`BodySink`], and return the number of **unconsumed** trailing bytes,
//! which belong to the next message on the connection.

use std::fmt;

use log::debug;

use crate::envelope::{EnvelopeError, EnvelopeParser, HeaderSink};

/// Receiver for decoded body bytes.
pub trait BodySink {
    /// Called for each decoded run of body bytes.
    fn on_body_data(&mut self, data: &[u8]);
    /// Called exactly once, when the body has been fully delivered.
    fn on_body_finished(&mut self);
}

/// Error produced while decoding a transfer encoding.
#[derive(Debug, PartialEq, Eq)]
pub enum TransferError {
    /// A byte in the chunk length line was neither hex, `;` nor CR.
    InvalidChunkLength {
        /// The offending byte.
        byte: u8,
    },
    /// The accumulated chunk length does not fit in `usize`.
    ChunkLengthOverflow,
    /// The byte after the chunk length's CR was not LF.
    InvalidChunkLengthLf {
        /// The offending byte.
        byte: u8,
    },
    /// The byte after the chunk data was not CR.
    InvalidChunkDataCr {
        /// The offending byte.
        byte: u8,
    },
    /// The byte after the chunk data's CR was not LF.
    InvalidChunkDataLf {
        /// The offending byte.
        byte: u8,
    },
    /// The trailer header block was malformed.
    Trailer(EnvelopeError),
    /// EOF was signalled while body bytes were still expected.
    Truncated,
    /// EOF was signalled while the chunked stream was mid-frame.
    FinishBeforeEnd,
}

impl fmt::Display for TransferError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidChunkLength { byte } => {
                write!(f, "invalid character in chunk length line: 0x{byte:02x}")
            }
            Self::ChunkLengthOverflow => write!(f, "chunk length overflows"),
            Self::InvalidChunkLengthLf { byte } => {
                write!(f, "invalid character past chunk length's CR: 0x{byte:02x}")
            }
            Self::InvalidChunkDataCr { byte } => {
                write!(f, "invalid character past chunk data: 0x{byte:02x}")
            }
            Self::InvalidChunkDataLf { byte } => {
                write!(f, "invalid character past chunk data's CR: 0x{byte:02x}")
            }
            Self::Trailer(err) => write!(f, "error while parsing the trailer: {err}"),
            Self::Truncated => write!(f, "body was truncated"),
            Self::FinishBeforeEnd => {
                write!(f, "finish signal received before the data stream ended")
            }
        }
    }
}

impl std::error::Error for TransferError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Trailer(err) => Some(err),
            _ => None,
        }
    }
}

/// Trailer headers are recognized but not surfaced.
struct DiscardHeaders;

impl HeaderSink for DiscardHeaders {
    fn on_header_line(&mut self, _key: &str, _value: &str) {}
}

// ============================================================================
// Identity
// ============================================================================

/// Decoder for a body delimited by a known content length.
#[derive(Debug)]
pub struct IdentityDecoder {
    /// Body bytes still expected.
    remaining: usize,
    /// Latched once body-finished has been reported.
    finished: bool,
}

impl IdentityDecoder {
    /// Creates a decoder expecting exactly `content_length` body bytes.
    #[must_use]
    pub fn new(content_length: usize) -> Self {
        Self {
            remaining: content_length,
            finished: false,
        }
    }

    /// Forwards up to the remaining byte count to the sink and returns
    /// the number of unconsumed trailing bytes.
    ///
    /// A zero-length body reports body-finished on the first call.
    pub fn parse<S: BodySink>(&mut self, data: &[u8], sink: &mut S) -> Result<usize, TransferError> {
        if self.finished {
            return Ok(data.len());
        }
        let take = data.len().min(self.remaining);
        if take > 0 {
            sink.on_body_data(&data[..take]);
        }
        self.remaining -= take;
        if self.remaining == 0 {
            self.finished = true;
            sink.on_body_finished();
        }
        Ok(data.len() - take)
    }

    /// Signals upstream EOF. Errors if body bytes were still expected.
    pub fn finish(&mut self) -> Result<(), TransferError> {
        if self.remaining > 0 {
            debug!(
                "identity body truncated with {} bytes outstanding",
                self.remaining
            );
            return Err(TransferError::Truncated);
        }
        Ok(())
    }
}

// ============================================================================
// Chunked
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ChunkedState {
    /// Parsing the chunk length hex number.
    Length,
    /// Skipping a chunk extension after `;`.
    LengthExtension,
    /// Expecting the LF that terminates the chunk length line.
    LengthLf,
    /// Relaying chunk data.
    Data,
    /// Expecting the CR after chunk data.
    DataCr,
    /// Expecting the LF after chunk data's CR.
    DataLf,
    /// Zero-length chunk seen; parsing the trailer header block.
    Trailer,
    /// Parsing has ended, successfully or with an error.
    Finished,
}

/// Decoder for `Transfer-Encoding: chunked` bodies.
#[derive(Debug)]
pub struct ChunkedDecoder {
    state: ChunkedState,
    /// Bytes left in the current chunk; while in [`ChunkedState::Length`]
    /// this accumulates the hex digits instead.
    remaining: usize,
    /// Parser for the final chunk's trailer block.
    trailer: EnvelopeParser,
}

impl ChunkedDecoder {
    /// Creates a decoder positioned before the first chunk length line.
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: ChunkedState::Length,
            remaining: 0,
            trailer: EnvelopeParser::new(),
        }
    }

    /// Decodes a chunk of incoming data, forwarding chunk payloads to the
    /// sink. Returns the number of unconsumed trailing bytes.
    pub fn parse<S: BodySink>(
        &mut self,
        data: &[u8],
        sink: &mut S,
    ) -> Result<usize, TransferError> {
        let mut rest = data;
        while !rest.is_empty() && self.state != ChunkedState::Finished {
            let consumed = match self.state {
                ChunkedState::Length => self.parse_length(rest)?,
                ChunkedState::LengthExtension => self.parse_length_extension(rest)?,
                ChunkedState::LengthLf => self.parse_length_lf(rest)?,
                ChunkedState::Data => self.parse_data(rest, sink),
                ChunkedState::DataCr => self.parse_data_cr(rest)?,
                ChunkedState::DataLf => self.parse_data_lf(rest)?,
                ChunkedState::Trailer => self.parse_trailer(rest, sink)?,
                ChunkedState::Finished => 0,
            };
            rest = &rest[consumed..];
        }
        Ok(rest.len())
    }

    /// Signals upstream EOF. Errors unless the final chunk and trailer
    /// have been seen.
    pub fn finish(&mut self) -> Result<(), TransferError> {
        if self.state != ChunkedState::Finished {
            debug!("chunked stream ended mid-frame in state {:?}", self.state);
            self.state = ChunkedState::Finished;
            return Err(TransferError::FinishBeforeEnd);
        }
        Ok(())
    }

    fn fail(&mut self, err: TransferError) -> TransferError {
        self.state = ChunkedState::Finished;
        err
    }

    /// Accumulates hex digits of the chunk length until `;` or CR.
    fn parse_length(&mut self, data: &[u8]) -> Result<usize, TransferError> {
        for (i, &b) in data.iter().enumerate() {
            let digit = match b {
                b'0'..=b'9' => b - b'0',
                b'a'..=b'f' => b - b'a' + 10,
                b'A'..=b'F' => b - b'A' + 10,
                b'\r' => {
                    self.state = ChunkedState::LengthLf;
                    return Ok(i + 1);
                }
                b';' => {
                    self.state = ChunkedState::LengthExtension;
                    return Ok(i + 1);
                }
                _ => return Err(self.fail(TransferError::InvalidChunkLength { byte: b })),
            };
            match self
                .remaining
                .checked_mul(16)
                .and_then(|n| n.checked_add(usize::from(digit)))
            {
                Some(length) => self.remaining = length,
                None => return Err(self.fail(TransferError::ChunkLengthOverflow)),
            }
        }
        Ok(data.len())
    }

    /// Skips the chunk extension; only printable bytes are allowed. The
    /// terminating CR is consumed, leaving the LF for the next state.
    fn parse_length_extension(&mut self, data: &[u8]) -> Result<usize, TransferError> {
        for (i, &b) in data.iter().enumerate() {
            if b == b'\r' {
                self.state = ChunkedState::LengthLf;
                return Ok(i + 1);
            }
            if b < 0x20 {
                return Err(self.fail(TransferError::InvalidChunkLength { byte: b }));
            }
        }
        Ok(data.len())
    }

    fn parse_length_lf(&mut self, data: &[u8]) -> Result<usize, TransferError> {
        if data[0] != b'\n' {
            return Err(self.fail(TransferError::InvalidChunkLengthLf { byte: data[0] }));
        }
        self.state = if self.remaining == 0 {
            ChunkedState::Trailer
        } else {
            ChunkedState::Data
        };
        Ok(1)
    }

    fn parse_data<S: BodySink>(&mut self, data: &[u8], sink: &mut S) -> usize {
        let take = data.len().min(self.remaining);
        self.remaining -= take;
        sink.on_body_data(&data[..take]);
        if self.remaining == 0 {
            self.state = ChunkedState::DataCr;
        }
        take
    }

    fn parse_data_cr(&mut self, data: &[u8]) -> Result<usize, TransferError> {
        if data[0] != b'\r' {
            return Err(self.fail(TransferError::InvalidChunkDataCr { byte: data[0] }));
        }
        self.state = ChunkedState::DataLf;
        Ok(1)
    }

    fn parse_data_lf(&mut self, data: &[u8]) -> Result<usize, TransferError> {
        if data[0] != b'\n' {
            return Err(self.fail(TransferError::InvalidChunkDataLf { byte: data[0] }));
        }
        self.state = ChunkedState::Length;
        Ok(1)
    }

    /// Delegates to the trailer envelope parser; reports body-finished
    /// the moment the trailer block ends.
    fn parse_trailer<S: BodySink>(
        &mut self,
        data: &[u8],
        sink: &mut S,
    ) -> Result<usize, TransferError> {
        let consumed = match self.trailer.parse(data, &mut DiscardHeaders) {
            Ok(n) => n,
            Err(err) => return Err(self.fail(TransferError::Trailer(err))),
        };
        if consumed < data.len() || !self.trailer.is_in_headers() {
            sink.on_body_finished();
            self.state = ChunkedState::Finished;
        }
        Ok(consumed)
    }
}

impl Default for ChunkedDecoder {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Factory
// ============================================================================

/// A transfer-encoding decoder, selected by encoding name.
#[derive(Debug)]
pub enum TransferDecoder {
    /// Known-length body.
    Identity(IdentityDecoder),
    /// `Transfer-Encoding: chunked` body.
    Chunked(ChunkedDecoder),
}

impl TransferDecoder {
    /// Maps a case-insensitive encoding name to a decoder. Returns `None`
    /// for unknown encodings.
    #[must_use]
    pub fn for_encoding(encoding: &str, content_length: usize) -> Option<Self> {
        if encoding.eq_ignore_ascii_case("chunked") {
            Some(Self::Chunked(ChunkedDecoder::new()))
        } else if encoding.eq_ignore_ascii_case("identity") {
            Some(Self::Identity(IdentityDecoder::new(content_length)))
        } else {
            None
        }
    }

    /// Decodes a chunk of incoming data. Returns the number of
    /// unconsumed trailing bytes, which belong to the next message.
    pub fn parse<S: BodySink>(
        &mut self,
        data: &[u8],
        sink: &mut S,
    ) -> Result<usize, TransferError> {
        match self {
            Self::Identity(decoder) => decoder.parse(data, sink),
            Self::Chunked(decoder) => decoder.parse(data, sink),
        }
    }

    /// Signals upstream EOF to the decoder.
    pub fn finish(&mut self) -> Result<(), TransferError> {
        match self {
            Self::Identity(decoder) => decoder.finish(),
            Self::Chunked(decoder) => decoder.finish(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Record {
        body: Vec<u8>,
        finished: u32,
    }

    impl BodySink for Record {
        fn on_body_data(&mut self, data: &[u8]) {
            self.body.extend_from_slice(data);
        }
        fn on_body_finished(&mut self) {
            self.finished += 1;
        }
    }

    // ========================================================================
    // Identity
    // ========================================================================

    #[test]
    fn identity_forwards_and_returns_excess() {
        let mut decoder = IdentityDecoder::new(5);
        let mut sink = Record::default();

        let unconsumed = decoder.parse(b"helloNEXT", &mut sink).unwrap();
        assert_eq!(unconsumed, 4);
        assert_eq!(sink.body, b"hello");
        assert_eq!(sink.finished, 1);
        assert!(decoder.finish().is_ok());
    }

    #[test]
    fn identity_across_pushes() {
        let mut decoder = IdentityDecoder::new(5);
        let mut sink = Record::default();

        assert_eq!(decoder.parse(b"he", &mut sink).unwrap(), 0);
        assert_eq!(sink.finished, 0);
        assert_eq!(decoder.parse(b"llo", &mut sink).unwrap(), 0);
        assert_eq!(sink.body, b"hello");
        assert_eq!(sink.finished, 1);
    }

    #[test]
    fn identity_zero_length_finishes_immediately() {
        let mut decoder = IdentityDecoder::new(0);
        let mut sink = Record::default();

        assert_eq!(decoder.parse(b"", &mut sink).unwrap(), 0);
        assert_eq!(sink.finished, 1);
        // Further pushes are all excess and never re-report.
        assert_eq!(decoder.parse(b"next", &mut sink).unwrap(), 4);
        assert_eq!(sink.finished, 1);
    }

    #[test]
    fn identity_truncation_errors_at_finish() {
        let mut decoder = IdentityDecoder::new(10);
        let mut sink = Record::default();

        decoder.parse(b"partial", &mut sink).unwrap();
        assert_eq!(decoder.finish(), Err(TransferError::Truncated));
        assert_eq!(format!("{}", TransferError::Truncated), "body was truncated");
    }

    // ========================================================================
    // Chunked
    // ========================================================================

    fn chunked_decode(chunks: &[&[u8]]) -> (Record, Result<usize, TransferError>) {
        let mut decoder = ChunkedDecoder::new();
        let mut sink = Record::default();
        let mut last = Ok(0);
        for chunk in chunks {
            last = decoder.parse(chunk, &mut sink);
            if last.is_err() {
                break;
            }
        }
        (sink, last)
    }

    #[test]
    fn chunked_simple() {
        let (sink, last) = chunked_decode(&[b"5\r\nhello\r\n0\r\n\r\n"]);
        assert_eq!(last, Ok(0));
        assert_eq!(sink.body, b"hello");
        assert_eq!(sink.finished, 1);
    }

    #[test]
    fn chunked_with_extension() {
        let (sink, last) = chunked_decode(&[b"4;foo=bar\r\nabcd\r\n0\r\n\r\n"]);
        assert_eq!(last, Ok(0));
        assert_eq!(sink.body, b"abcd");
        assert_eq!(sink.finished, 1);
    }

    #[test]
    fn chunked_multiple_chunks_split_anywhere() {
        let (sink, last) = chunked_decode(&[b"3\r\nab", b"c\r\n", b"2\r", b"\nde\r\n0\r\n", b"\r\n"]);
        assert_eq!(last, Ok(0));
        assert_eq!(sink.body, b"abcde");
        assert_eq!(sink.finished, 1);
    }

    #[test]
    fn chunked_hex_length_cases() {
        let (sink, last) = chunked_decode(&[b"A\r\n0123456789\r\n0\r\n\r\n"]);
        assert_eq!(last, Ok(0));
        assert_eq!(sink.body, b"0123456789");

        let (sink, _) = chunked_decode(&[b"a\r\n0123456789\r\n0\r\n\r\n"]);
        assert_eq!(sink.body, b"0123456789");
    }

    #[test]
    fn chunked_trailer_headers_are_swallowed() {
        let (sink, last) = chunked_decode(&[b"2\r\nok\r\n0\r\nX-Checksum: abc\r\n\r\n"]);
        assert_eq!(last, Ok(0));
        assert_eq!(sink.body, b"ok");
        assert_eq!(sink.finished, 1);
    }

    #[test]
    fn chunked_returns_pipelined_excess() {
        let (sink, last) = chunked_decode(&[b"2\r\nok\r\n0\r\n\r\nGET / HTTP/1.1"]);
        assert_eq!(last, Ok(14));
        assert_eq!(sink.finished, 1);
        assert_eq!(sink.body, b"ok");
    }

    #[test]
    fn chunked_rejects_bad_length_byte() {
        let (_, last) = chunked_decode(&[b"5x\r\n"]);
        assert_eq!(last, Err(TransferError::InvalidChunkLength { byte: b'x' }));
    }

    #[test]
    fn chunked_rejects_control_in_extension() {
        let (_, last) = chunked_decode(&[b"5;ext\x01\r\n"]);
        assert_eq!(last, Err(TransferError::InvalidChunkLength { byte: 0x01 }));
    }

    #[test]
    fn chunked_rejects_missing_lf() {
        let (_, last) = chunked_decode(&[b"5\rX"]);
        assert_eq!(last, Err(TransferError::InvalidChunkLengthLf { byte: b'X' }));
    }

    #[test]
    fn chunked_rejects_bad_data_terminator() {
        let (_, last) = chunked_decode(&[b"2\r\nokXY"]);
        assert_eq!(last, Err(TransferError::InvalidChunkDataCr { byte: b'X' }));
    }

    #[test]
    fn chunked_finish_mid_stream_errors() {
        let mut decoder = ChunkedDecoder::new();
        let mut sink = Record::default();
        decoder.parse(b"5\r\nhe", &mut sink).unwrap();
        assert_eq!(decoder.finish(), Err(TransferError::FinishBeforeEnd));
    }

    #[test]
    fn chunked_finish_after_end_is_ok() {
        let mut decoder = ChunkedDecoder::new();
        let mut sink = Record::default();
        decoder.parse(b"0\r\n\r\n", &mut sink).unwrap();
        assert!(decoder.finish().is_ok());
    }

    #[test]
    fn chunked_parse_after_error_consumes_nothing() {
        let mut decoder = ChunkedDecoder::new();
        let mut sink = Record::default();
        assert!(decoder.parse(b"zz\r\n", &mut sink).is_err());
        // Everything is returned unconsumed once the decoder is dead.
        assert_eq!(decoder.parse(b"0\r\n\r\n", &mut sink).unwrap(), 5);
        assert_eq!(sink.finished, 0);
    }

    #[test]
    fn chunk_length_overflow_is_rejected() {
        let (_, last) = chunked_decode(&[b"ffffffffffffffffff\r\n"]);
        assert_eq!(last, Err(TransferError::ChunkLengthOverflow));
    }

    // ========================================================================
    // Factory
    // ========================================================================

    #[test]
    fn factory_is_case_insensitive() {
        assert!(matches!(
            TransferDecoder::for_encoding("Chunked", 0),
            Some(TransferDecoder::Chunked(_))
        ));
        assert!(matches!(
            TransferDecoder::for_encoding("IDENTITY", 10),
            Some(TransferDecoder::Identity(_))
        ));
        assert!(TransferDecoder::for_encoding("gzip", 0).is_none());
    }
}
