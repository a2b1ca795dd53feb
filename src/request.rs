//! Incoming HTTP request value object.

use std::any::Any;

use crate::headers::HeaderMap;
use crate::text;

/// Storage for an incoming HTTP request.
///
/// The method and URL are kept exactly as sent; no semantic validation is
/// performed on either. Header ingestion recognizes `Authorization:
/// Basic` credentials and `Connection: keep-alive` on the fly.
pub struct IncomingRequest {
    method: String,
    url: String,
    headers: HeaderMap,
    has_auth: bool,
    auth_username: String,
    auth_password: String,
    allow_keep_alive: bool,
    user_data: Option<Box<dyn Any + Send>>,
}

impl IncomingRequest {
    /// Creates a request with the method and URL provided by the client.
    #[must_use]
    pub fn new(method: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            url: url.into(),
            headers: HeaderMap::new(),
            has_auth: false,
            auth_username: String::new(),
            auth_password: String::new(),
            allow_keep_alive: false,
            user_data: None,
        }
    }

    /// Returns the method, as sent.
    #[must_use]
    pub fn method(&self) -> &str {
        &self.method
    }

    /// Returns the entire URL, including any query after `?`.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Returns the path part of the URL, without the query after `?`.
    #[must_use]
    pub fn url_path(&self) -> &str {
        match self.url.find('?') {
            Some(idx) => &self.url[..idx],
            None => &self.url,
        }
    }

    /// Returns the request headers.
    #[must_use]
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Adds a header, recognizing auth and keep-alive on the way.
    ///
    /// `Authorization: Basic` values are decoded; the credentials are
    /// populated only when the decoded value contains a `:`.
    pub fn add_header(&mut self, key: &str, value: &str) {
        if key.eq_ignore_ascii_case("authorization") {
            let bytes = value.as_bytes();
            if bytes.len() >= 6 && bytes[..6].eq_ignore_ascii_case(b"basic ") {
                let decoded = text::base64_decode(&bytes[6..]);
                if let Some(colon) = decoded.iter().position(|&b| b == b':') {
                    self.auth_username = String::from_utf8_lossy(&decoded[..colon]).into_owned();
                    self.auth_password =
                        String::from_utf8_lossy(&decoded[colon + 1..]).into_owned();
                    self.has_auth = true;
                }
            }
        }
        if key.eq_ignore_ascii_case("connection") && value.eq_ignore_ascii_case("keep-alive") {
            self.allow_keep_alive = true;
        }
        self.headers.add(key, value);
    }

    /// Returns true if an understood `Authorization` header was present.
    #[must_use]
    pub fn has_auth(&self) -> bool {
        self.has_auth
    }

    /// The username presented by the request; meaningful only when
    /// [`has_auth`][Self::has_auth] is true.
    #[must_use]
    pub fn auth_username(&self) -> &str {
        &self.auth_username
    }

    /// The password presented by the request; meaningful only when
    /// [`has_auth`][Self::has_auth] is true.
    #[must_use]
    pub fn auth_password(&self) -> &str {
        &self.auth_password
    }

    /// Returns true if the client indicated it supports keep-alive.
    #[must_use]
    pub fn allows_keep_alive(&self) -> bool {
        self.allow_keep_alive
    }

    /// Attaches opaque caller data to the request.
    pub fn set_user_data(&mut self, data: Box<dyn Any + Send>) {
        self.user_data = Some(data);
    }

    /// Returns the attached caller data, if any.
    #[must_use]
    pub fn user_data(&self) -> Option<&(dyn Any + Send)> {
        self.user_data.as_deref()
    }

    /// Returns the attached caller data mutably, if any.
    pub fn user_data_mut(&mut self) -> Option<&mut (dyn Any + Send)> {
        self.user_data.as_deref_mut()
    }
}

impl std::fmt::Debug for IncomingRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IncomingRequest")
            .field("method", &self.method)
            .field("url", &self.url)
            .field("has_auth", &self.has_auth)
            .field("allow_keep_alive", &self.allow_keep_alive)
            .finish_non_exhaustive()
    }
}
