//! Outgoing HTTP response storage and serialization.

use std::collections::BTreeMap;

use crate::headers::HeaderMap;

/// Status code 200.
pub const HTTP_OK: u16 = 200;
/// Status code 400.
pub const HTTP_BAD_REQUEST: u16 = 400;
/// Status code 404.
pub const HTTP_NOT_FOUND: u16 = 404;

/// Stores outgoing response headers and serializes them to an HTTP/1.1
/// data stream. The status code and reason text are supplied at emit
/// time; the caller sends the serialized prefix and then the body.
#[derive(Debug, Clone, Default)]
pub struct OutgoingResponse {
    headers: HeaderMap,
}

impl OutgoingResponse {
    /// Creates a response with no headers.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the response headers.
    #[must_use]
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Adds a header.
    pub fn add_header(&mut self, key: &str, value: &str) {
        self.headers.add(key, value);
    }

    /// Sets the `content-type` header.
    pub fn set_content_type(&mut self, content_type: &str) {
        self.headers.set_content_type(content_type);
    }

    /// Sets the `content-length` header.
    pub fn set_content_length(&mut self, content_length: usize) {
        self.headers.set_content_length(content_length);
    }

    /// Serializes the status line, all headers, and the terminating empty
    /// line. The body, if any, is sent by the caller afterwards.
    #[must_use]
    pub fn serialize(&self, status_code: u16, reason: &str) -> String {
        let mut out = format!("HTTP/1.1 {status_code} {reason}\r\n");
        for (key, value) in self.headers.iter() {
            out.push_str(key);
            out.push_str(": ");
            out.push_str(value);
            out.push_str("\r\n");
        }
        out.push_str("\r\n");
        out
    }
}

/// Serializer for simple complete responses: a status line, a small set
/// of headers, and a short body, emitted as one byte buffer.
#[derive(Debug)]
pub struct SimpleResponse;

impl SimpleResponse {
    /// Serializes a response carrying only a synthesized
    /// `Content-Length` header.
    #[must_use]
    pub fn serialize(status_code: u16, reason: &str, body: &[u8]) -> Vec<u8> {
        let mut headers = BTreeMap::new();
        headers.insert("Content-Length".to_string(), body.len().to_string());
        Self::serialize_with_headers(status_code, reason, &headers, body)
    }

    /// Serializes a response with synthesized `Content-Type` and
    /// `Content-Length` headers.
    #[must_use]
    pub fn serialize_with_content_type(
        status_code: u16,
        reason: &str,
        content_type: &str,
        body: &[u8],
    ) -> Vec<u8> {
        let mut headers = BTreeMap::new();
        headers.insert("Content-Type".to_string(), content_type.to_string());
        headers.insert("Content-Length".to_string(), body.len().to_string());
        Self::serialize_with_headers(status_code, reason, &headers, body)
    }

    /// Serializes a response with the given headers and body.
    #[must_use]
    pub fn serialize_with_headers(
        status_code: u16,
        reason: &str,
        headers: &BTreeMap<String, String>,
        body: &[u8],
    ) -> Vec<u8> {
        let mut out = format!("HTTP/1.1 {status_code} {reason}\r\n").into_bytes();
        for (key, value) in headers {
            out.extend_from_slice(key.as_bytes());
            out.extend_from_slice(b": ");
            out.extend_from_slice(value.as_bytes());
            out.extend_from_slice(b"\r\n");
        }
        out.extend_from_slice(b"\r\n");
        out.extend_from_slice(body);
        out
    }
}
