//! End-to-end form handling tests.
//!
//! Drives the form parser the way a server would: build the request from
//! parsed message data, push body bytes in arbitrary chunks, finish, and
//! inspect the field map and file events.

use proptest::prelude::*;
use sax_http::{url_decode, FileSink, FormKind, FormParser, IncomingRequest};

#[derive(Default)]
struct Files {
    started: Vec<String>,
    data: Vec<u8>,
    ended: u32,
}

impl FileSink for Files {
    fn on_file_start(&mut self, filename: &str) {
        self.started.push(filename.to_string());
    }
    fn on_file_data(&mut self, data: &[u8]) {
        self.data.extend_from_slice(data);
    }
    fn on_file_end(&mut self) {
        self.ended += 1;
    }
}

// ============================================================================
// Multipart upload scenarios
// ============================================================================

const UPLOAD_BODY: &[u8] = b"--ABC\r\n\
    Content-Disposition: form-data; name=\"field\"\r\n\
    \r\n\
    value\r\n\
    --ABC\r\n\
    Content-Disposition: form-data; name=\"up\"; filename=\"f.txt\"\r\n\
    \r\n\
    DATA\r\n\
    --ABC--\r\n";

fn upload_request() -> IncomingRequest {
    let mut request = IncomingRequest::new("POST", "/upload");
    request.add_header("Content-Type", "multipart/form-data; boundary=ABC");
    request
}

#[test]
fn multipart_upload_whole_body() {
    let mut form = FormParser::from_request(&upload_request());
    let mut files = Files::default();
    form.parse(UPLOAD_BODY, &mut files);
    assert!(form.finish());

    assert_eq!(form.get("field"), Some("value"));
    assert_eq!(form.get("up"), None);
    assert_eq!(files.started, vec!["f.txt".to_string()]);
    assert_eq!(files.data, b"DATA");
    assert_eq!(files.ended, 1);
}

#[test]
fn multipart_upload_any_chunking() {
    for chunk in [1, 2, 3, 5, 8, 13, 21] {
        let mut form = FormParser::from_request(&upload_request());
        let mut files = Files::default();
        for piece in UPLOAD_BODY.chunks(chunk) {
            form.parse(piece, &mut files);
        }
        assert!(form.finish(), "chunk size {chunk}");
        assert_eq!(form.get("field"), Some("value"), "chunk size {chunk}");
        assert_eq!(files.started, vec!["f.txt".to_string()], "chunk size {chunk}");
        assert_eq!(files.data, b"DATA", "chunk size {chunk}");
        assert_eq!(files.ended, 1, "chunk size {chunk}");
    }
}

#[test]
fn multipart_preamble_and_epilogue_are_ignored() {
    let body = b"this is a preamble\r\n--ABC\r\n\
        Content-Disposition: form-data; name=\"a\"\r\n\
        \r\n\
        1\r\n\
        --ABC--\r\n\
        this is an epilogue";
    let mut form = FormParser::from_request(&upload_request());
    let mut files = Files::default();
    form.parse(body, &mut files);
    assert!(form.finish());
    assert_eq!(form.fields().len(), 1);
    assert_eq!(form.get("a"), Some("1"));
    assert!(files.started.is_empty());
}

#[test]
fn multipart_file_payload_with_crlf_lines() {
    let body = b"--ABC\r\n\
        Content-Disposition: form-data; name=\"up\"; filename=\"lines.txt\"\r\n\
        \r\n\
        line one\r\nline two\r\nline three\r\n\
        --ABC--\r\n";
    let mut form = FormParser::from_request(&upload_request());
    let mut files = Files::default();
    for piece in body.chunks(7) {
        form.parse(piece, &mut files);
    }
    assert!(form.finish());
    assert_eq!(files.data, b"line one\r\nline two\r\nline three");
    assert_eq!(files.ended, 1);
}

// ============================================================================
// Urlencoded and query scenarios
// ============================================================================

#[test]
fn urlencoded_body_with_escapes() {
    let mut request = IncomingRequest::new("POST", "/submit");
    request.add_header("Content-Type", "application/x-www-form-urlencoded");
    let mut form = FormParser::from_request(&request);
    let mut files = Files::default();
    form.parse(b"a+b=c%20d&x=%u00e9", &mut files);
    assert!(form.finish());
    assert_eq!(form.get("a b"), Some("c d"));
    assert_eq!(form.get("x"), Some("é"));
}

#[test]
fn query_form_from_get_request() {
    let request = IncomingRequest::new("GET", "/search?term=push+parser&lang=en");
    let mut form = FormParser::from_request(&request);
    assert_eq!(form.kind(), FormKind::Query);
    assert!(form.finish());
    assert_eq!(form.get("term"), Some("push parser"));
    assert_eq!(form.get("lang"), Some("en"));
}

// ============================================================================
// Request ingestion scenarios
// ============================================================================

#[test]
fn basic_auth_credentials_are_decoded() {
    let mut request = IncomingRequest::new("GET", "/private");
    request.add_header("Authorization", "Basic dXNlcjpwYXNz");
    assert!(request.has_auth());
    assert_eq!(request.auth_username(), "user");
    assert_eq!(request.auth_password(), "pass");
}

#[test]
fn repeated_headers_fold_into_one_value() {
    let mut request = IncomingRequest::new("GET", "/");
    request.add_header("Accept", "text/html");
    request.add_header("Accept", "application/json");
    assert_eq!(
        request.headers().get("accept"),
        Some("text/html, application/json")
    );
}

// ============================================================================
// URL-decoding round trip
// ============================================================================

/// Reference encoder: alphanumerics pass through, everything else is
/// percent-encoded.
fn url_encode(input: &[u8]) -> String {
    let mut out = String::new();
    for &b in input {
        if b.is_ascii_alphanumeric() {
            out.push(b as char);
        } else {
            out.push_str(&format!("%{b:02X}"));
        }
    }
    out
}

proptest! {
    #[test]
    fn url_decode_round_trips(bytes in proptest::collection::vec(any::<u8>(), 0..200)) {
        let encoded = url_encode(&bytes);
        let decoded = url_decode(encoded.as_bytes()).expect("reference encoding decodes");
        prop_assert_eq!(decoded, bytes);
    }
}
