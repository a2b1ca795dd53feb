//! Header storage shared by requests and responses.

use std::collections::btree_map::Entry;
use std::collections::BTreeMap;

/// Map of header names to values.
///
/// Names are stored lowercased; values keep their original case. When the
/// same name is added again the values are combined into a
/// comma-separated list (RFC 2616 §4.2). The derived `content_type` and
/// `content_length` fields track the corresponding headers as they are
/// added.
#[derive(Debug, Clone, Default)]
pub struct HeaderMap {
    headers: BTreeMap<String, String>,
    content_type: String,
    content_length: Option<usize>,
}

impl HeaderMap {
    /// Creates an empty header map.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a header, folding repeated names into a comma-separated
    /// value.
    pub fn add(&mut self, key: &str, value: &str) {
        let key = key.to_ascii_lowercase();
        match self.headers.entry(key.clone()) {
            Entry::Vacant(entry) => {
                entry.insert(value.to_string());
            }
            Entry::Occupied(mut entry) => {
                let combined = entry.get_mut();
                combined.push_str(", ");
                combined.push_str(value);
            }
        }

        if key == "content-type" {
            self.content_type = self.headers[&key].clone();
        } else if key == "content-length" {
            self.content_length = Some(self.headers[&key].parse().unwrap_or(0));
        }
    }

    /// Looks up a header value; the key is matched case-insensitively.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.headers.get(&key.to_ascii_lowercase()).map(String::as_str)
    }

    /// Looks up a header value, falling back to `default`.
    #[must_use]
    pub fn get_or<'a>(&'a self, key: &str, default: &'a str) -> &'a str {
        self.get(key).unwrap_or(default)
    }

    /// Looks up a header value as a number, falling back to `default`
    /// when the header is missing, empty or not a number.
    #[must_use]
    pub fn number_or(&self, key: &str, default: usize) -> usize {
        match self.get(key) {
            Some(value) if !value.is_empty() => value.parse().unwrap_or(default),
            _ => default,
        }
    }

    /// Sets the `content-type` header and the derived field.
    pub fn set_content_type(&mut self, content_type: &str) {
        self.headers
            .insert("content-type".to_string(), content_type.to_string());
        self.content_type = content_type.to_string();
    }

    /// Sets the `content-length` header and the derived field.
    pub fn set_content_length(&mut self, content_length: usize) {
        self.headers
            .insert("content-length".to_string(), content_length.to_string());
        self.content_length = Some(content_length);
    }

    /// Returns the derived content type, empty if none was set.
    #[must_use]
    pub fn content_type(&self) -> &str {
        &self.content_type
    }

    /// Returns the derived content length, if one was set.
    #[must_use]
    pub fn content_length(&self) -> Option<usize> {
        self.content_length
    }

    /// Iterates over `(name, value)` pairs, names lowercased.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.headers.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Number of distinct header names.
    #[must_use]
    pub fn len(&self) -> usize {
        self.headers.len()
    }

    /// Returns true if no headers have been added.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.headers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_are_lowercased() {
        let mut headers = HeaderMap::new();
        headers.add("X-Custom-Header", "Value");
        assert_eq!(headers.get("x-custom-header"), Some("Value"));
        assert_eq!(headers.get("X-CUSTOM-HEADER"), Some("Value"));
        assert_eq!(headers.iter().next(), Some(("x-custom-header", "Value")));
    }

    #[test]
    fn values_keep_their_case() {
        let mut headers = HeaderMap::new();
        headers.add("Accept", "Text/HTML");
        assert_eq!(headers.get("accept"), Some("Text/HTML"));
    }

    #[test]
    fn repeated_names_fold_with_comma() {
        let mut headers = HeaderMap::new();
        headers.add("Set-Cookie", "a=1");
        headers.add("set-cookie", "b=2");
        headers.add("SET-COOKIE", "c=3");
        assert_eq!(headers.get("set-cookie"), Some("a=1, b=2, c=3"));
        assert_eq!(headers.len(), 1);
    }

    #[test]
    fn content_fields_are_derived() {
        let mut headers = HeaderMap::new();
        assert_eq!(headers.content_length(), None);
        headers.add("Content-Type", "text/plain");
        headers.add("Content-Length", "42");
        assert_eq!(headers.content_type(), "text/plain");
        assert_eq!(headers.content_length(), Some(42));
    }

    #[test]
    fn bad_content_length_derives_zero() {
        let mut headers = HeaderMap::new();
        headers.add("Content-Length", "not-a-number");
        assert_eq!(headers.content_length(), Some(0));
    }

    #[test]
    fn setters_keep_map_and_fields_in_sync() {
        let mut headers = HeaderMap::new();
        headers.set_content_type("application/octet-stream");
        headers.set_content_length(7);
        assert_eq!(headers.get("content-type"), Some("application/octet-stream"));
        assert_eq!(headers.get("content-length"), Some("7"));
        assert_eq!(headers.content_length(), Some(7));
    }

    #[test]
    fn defaults_and_numbers() {
        let mut headers = HeaderMap::new();
        headers.add("Retry-After", "30");
        headers.add("X-Empty", "");
        assert_eq!(headers.get_or("retry-after", "0"), "30");
        assert_eq!(headers.get_or("missing", "fallback"), "fallback");
        assert_eq!(headers.number_or("Retry-After", 0), 30);
        assert_eq!(headers.number_or("X-Empty", 9), 9);
        assert_eq!(headers.number_or("missing", 9), 9);
    }
}
