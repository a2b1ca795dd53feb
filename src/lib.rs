//! Streaming push parsers for HTTP/1.1 messages and the MIME-style
//! payloads they carry.
//!
//! Every parser in this crate is a small state machine driven by the
//! caller: bytes are pushed in chunks split at arbitrary positions and
//! structured events come back through a callback sink, without the
//! message ever being buffered whole. The parsers compose: the message
//! parser embeds the envelope and transfer-encoding parsers, the
//! multipart parser recursively drives an envelope parser per part, and
//! the form parser sits on top of all of them.
//!
//! # Parsers
//!
//! - [`EnvelopeParser`]: `Key: Value` header blocks with folded
//!   continuation lines
//! - [`ParamParser`]: `name=value; name="value"` header parameter lists
//! - [`IdentityDecoder`] / [`ChunkedDecoder`]: body framing, picked via
//!   [`TransferDecoder`]
//! - [`MessageParser`]: first line, headers and body of one message
//! - [`MultipartParser`]: MIME boundary splitting with per-part headers
//! - [`FormParser`]: URL query, urlencoded and multipart forms unified
//!   into a field map plus file-upload events
//!
//! The crate performs no I/O: the host owns the transport and pushes
//! whatever bytes it has, and return values say how much was consumed.
//! Anything unconsumed belongs to the next message on the connection.
//!
//! # Example
//!
//! ```ignore
//! use sax_http::{MessageParser, MessageSink};
//!
//! struct Printer;
//! impl MessageSink for Printer {
//!     fn on_first_line(&mut self, line: &str) { println!("> {line}"); }
//!     fn on_header_line(&mut self, key: &str, value: &str) { println!("  {key}: {value}"); }
//!     fn on_headers_finished(&mut self) {}
//!     fn on_body_data(&mut self, data: &[u8]) { println!("  {} body bytes", data.len()); }
//!     fn on_body_finished(&mut self) {}
//! }
//!
//! let mut parser = MessageParser::new();
//! let mut sink = Printer;
//! let consumed = parser.parse(b"GET / HTTP/1.1\r\nHost: example.com\r\n\r\n", &mut sink)?;
//! ```

#![deny(unsafe_code)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::uninlined_format_args)]
#![allow(clippy::single_char_pattern)]
#![allow(clippy::return_self_not_must_use)]
#![allow(clippy::module_name_repetitions)]

pub mod envelope;
pub mod form;
pub mod headers;
pub mod message;
pub mod multipart;
pub mod params;
pub mod request;
pub mod response;
pub mod text;
pub mod transfer;

pub use envelope::{EnvelopeError, EnvelopeParser, HeaderSink};
pub use form::{FileSink, FormKind, FormParser};
pub use headers::HeaderMap;
pub use message::{MessageError, MessageParser, MessageSink};
pub use multipart::{MultipartParser, PartSink};
pub use params::ParamParser;
pub use request::IncomingRequest;
pub use response::{
    OutgoingResponse, SimpleResponse, HTTP_BAD_REQUEST, HTTP_NOT_FOUND, HTTP_OK,
};
pub use text::{base64_decode, url_decode, DecodeError};
pub use transfer::{
    BodySink, ChunkedDecoder, IdentityDecoder, TransferDecoder, TransferError,
};
