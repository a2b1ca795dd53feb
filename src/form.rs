//! HTML form parser.
//!
//! A form reaches an HTTP server as URL query parameters, as an
//! `application/x-www-form-urlencoded` body, or as a
//! `multipart/form-data` body. This parser unifies the three into one
//! field map plus a stream of file-upload callbacks. Simple values
//! accumulate in the map; file
//! parts, which may be large, are only ever reported through the
//! [`FileSink`] and never stored.
//!
//! The caller pushes body bytes with [`FormParser::parse`] and calls
//! [`FormParser::finish`] at the end of the request; query and
//! urlencoded input is small and is parsed wholesale at finish time,
//! while multipart input streams through an embedded
//! [`MultipartParser`].

use std::collections::BTreeMap;

use crate::multipart::{MultipartParser, PartSink};
use crate::params::ParamParser;
use crate::request::IncomingRequest;
use crate::text;

/// Receiver for file-upload events.
pub trait FileSink {
    /// Called once when a file part produces its first payload bytes.
    fn on_file_start(&mut self, filename: &str);
    /// Called for each run of file payload bytes.
    fn on_file_data(&mut self, data: &[u8]);
    /// Called when the file part ends.
    fn on_file_end(&mut self);
}

/// How the form data was transmitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormKind {
    /// Parameters of a GET request's URL, after the `?`.
    Query,
    /// A POST/PUT body with `application/x-www-form-urlencoded`.
    UrlEncoded,
    /// A POST/PUT body with `multipart/form-data`.
    Multipart,
}

/// Routes multipart events into the form state and the caller's
/// [`FileSink`].
struct FieldBridge<'a, S: FileSink> {
    fields: &'a mut BTreeMap<String, String>,
    current_name: &'a mut String,
    current_filename: &'a mut String,
    current_value: &'a mut Vec<u8>,
    file_announced: &'a mut bool,
    valid: &'a mut bool,
    sink: &'a mut S,
}

impl<S: FileSink> PartSink for FieldBridge<'_, S> {
    fn on_part_start(&mut self) {
        self.current_name.clear();
        self.current_filename.clear();
        self.current_value.clear();
        *self.file_announced = false;
    }

    fn on_part_header(&mut self, key: &str, value: &str) {
        if !key.eq_ignore_ascii_case("content-disposition") {
            return;
        }
        let bytes = value.as_bytes();
        // The disposition type must be form-data, leading whitespace
        // aside; anything else invalidates the whole form.
        let Some(start) = bytes.iter().position(|&b| b > b' ') else {
            *self.valid = false;
            return;
        };
        if bytes.len() < start + 9 || !bytes[start..start + 9].eq_ignore_ascii_case(b"form-data") {
            *self.valid = false;
            return;
        }
        let Some(params_start) = text::find_bytes(bytes, b";", start + 9) else {
            *self.valid = false;
            return;
        };

        let mut params = ParamParser::new();
        params.parse(&bytes[params_start..]);
        params.finish();
        let name = params.get("name").unwrap_or("");
        if !params.is_valid() || name.is_empty() {
            // The required name parameter is missing.
            *self.valid = false;
            return;
        }
        *self.current_name = name.to_string();
        *self.current_filename = params.get("filename").unwrap_or("").to_string();
    }

    fn on_part_data(&mut self, data: &[u8]) {
        if self.current_name.is_empty() {
            // Preamble, epilogue, or a part with no usable disposition.
            return;
        }
        if self.current_filename.is_empty() {
            self.current_value.extend_from_slice(data);
        } else {
            if !*self.file_announced {
                self.sink.on_file_start(self.current_filename);
                *self.file_announced = true;
            }
            self.sink.on_file_data(data);
        }
    }

    fn on_part_end(&mut self) {
        if !self.current_name.is_empty() && self.current_filename.is_empty() {
            let value = String::from_utf8_lossy(self.current_value.as_slice()).into_owned();
            self.fields
                .entry(std::mem::take(self.current_name))
                .or_default()
                .push_str(&value);
            self.current_value.clear();
        }
        if *self.file_announced {
            self.sink.on_file_end();
        }
        self.current_name.clear();
        self.current_filename.clear();
    }
}

/// Push parser for form data; owns the accumulated field map.
#[derive(Debug)]
pub struct FormParser {
    kind: FormKind,
    /// False once the input turned out not to be a valid form; further
    /// input is ignored.
    valid: bool,
    /// Buffered query/urlencoded input, parsed at finish time.
    incoming: Vec<u8>,
    /// The multipart parser, for [`FormKind::Multipart`] only.
    multipart: Option<MultipartParser>,
    fields: BTreeMap<String, String>,
    current_name: String,
    current_filename: String,
    current_value: Vec<u8>,
    file_announced: bool,
}

impl FormParser {
    /// Creates a parser for the form carried by `request`.
    ///
    /// - `GET` with a `?` in the URL parses the query immediately.
    /// - `POST`/`PUT` with an urlencoded content type buffers body bytes
    ///   until [`finish`][Self::finish].
    /// - `POST`/`PUT` with `multipart/form-data` streams through a
    ///   multipart parser.
    /// - Anything else is not a form; the parser is invalid and ignores
    ///   all input.
    #[must_use]
    pub fn from_request(request: &IncomingRequest) -> Self {
        let mut parser = Self::empty(FormKind::Query);
        if request.method() == "GET" {
            if let Some(idx) = request.url().find('?') {
                parser
                    .incoming
                    .extend_from_slice(&request.url().as_bytes()[idx + 1..]);
            }
            return parser;
        }
        if request.method() == "POST" || request.method() == "PUT" {
            let content_type = request.headers().content_type();
            if content_type.starts_with("application/x-www-form-urlencoded") {
                parser.kind = FormKind::UrlEncoded;
                return parser;
            }
            if content_type.starts_with("multipart/form-data") {
                parser.kind = FormKind::Multipart;
                parser.multipart = Some(MultipartParser::new(content_type));
                return parser;
            }
        }
        parser.valid = false;
        parser
    }

    /// Creates a parser of the given kind over a raw buffer, without a
    /// request. Only the query and urlencoded kinds carry enough context
    /// to parse this way; a multipart kind has no boundary and is
    /// invalid.
    #[must_use]
    pub fn with_kind(kind: FormKind, data: &[u8]) -> Self {
        let mut parser = Self::empty(kind);
        match kind {
            FormKind::Query | FormKind::UrlEncoded => parser.incoming.extend_from_slice(data),
            FormKind::Multipart => parser.valid = false,
        }
        parser
    }

    fn empty(kind: FormKind) -> Self {
        Self {
            kind,
            valid: true,
            incoming: Vec::new(),
            multipart: None,
            fields: BTreeMap::new(),
            current_name: String::new(),
            current_filename: String::new(),
            current_value: Vec::new(),
            file_announced: false,
        }
    }

    /// Returns true if the request's headers suggest it carries form
    /// data this parser can handle.
    #[must_use]
    pub fn has_form_data(request: &IncomingRequest) -> bool {
        let content_type = request.headers().content_type();
        content_type == "application/x-www-form-urlencoded"
            || content_type.starts_with("multipart/form-data")
            || (request.method() == "GET" && request.url().contains('?'))
    }

    /// Returns the kind decided at construction.
    #[must_use]
    pub fn kind(&self) -> FormKind {
        self.kind
    }

    /// Returns false once the input turned out not to be a valid form.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.valid
    }

    /// Returns the accumulated field map.
    #[must_use]
    pub fn fields(&self) -> &BTreeMap<String, String> {
        &self.fields
    }

    /// Returns the value of a single field, if present.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }

    /// Consumes the parser, returning the field map.
    #[must_use]
    pub fn into_fields(self) -> BTreeMap<String, String> {
        self.fields
    }

    /// Pushes body bytes into the parser. File events for multipart
    /// input are delivered to `sink`.
    pub fn parse<S: FileSink>(&mut self, data: &[u8], sink: &mut S) {
        if !self.valid {
            return;
        }
        match self.kind {
            FormKind::Query | FormKind::UrlEncoded => {
                // Urlencoded forms are small; parsing waits for finish().
                self.incoming.extend_from_slice(data);
            }
            FormKind::Multipart => {
                let Some(multipart) = self.multipart.as_mut() else {
                    return;
                };
                let mut bridge = FieldBridge {
                    fields: &mut self.fields,
                    current_name: &mut self.current_name,
                    current_filename: &mut self.current_filename,
                    current_value: &mut self.current_value,
                    file_announced: &mut self.file_announced,
                    valid: &mut self.valid,
                    sink,
                };
                multipart.parse(data, &mut bridge);
            }
        }
    }

    /// Signals the end of the request body. Parses buffered
    /// query/urlencoded input and returns whether the form was valid and
    /// fully drained.
    pub fn finish(&mut self) -> bool {
        match self.kind {
            FormKind::Query | FormKind::UrlEncoded => self.parse_urlencoded(),
            FormKind::Multipart => {}
        }
        self.valid && self.incoming.is_empty()
    }

    /// Parses the accumulated buffer as `name=value&name=value` pairs.
    fn parse_urlencoded(&mut self) {
        let incoming = std::mem::take(&mut self.incoming);
        for segment in text::split(&incoming, b'&') {
            let pieces = text::split(segment, b'=');
            match pieces.len() {
                1 => {
                    // Name with no value; plus signs become spaces.
                    let name: Vec<u8> = pieces[0]
                        .iter()
                        .map(|&b| if b == b'+' { b' ' } else { b })
                        .collect();
                    if let Ok(name) = text::url_decode(&name) {
                        self.fields
                            .insert(String::from_utf8_lossy(&name).into_owned(), String::new());
                    }
                }
                2 => {
                    // A decode failure on either side skips the entry.
                    if let (Ok(name), Ok(value)) =
                        (text::url_decode(pieces[0]), text::url_decode(pieces[1]))
                    {
                        self.fields.insert(
                            String::from_utf8_lossy(&name).into_owned(),
                            String::from_utf8_lossy(&value).into_owned(),
                        );
                    }
                }
                _ => {
                    // An empty segment or too many equal signs is not a
                    // form.
                    self.valid = false;
                    return;
                }
            }
        }
    }
}
