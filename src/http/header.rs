//! `HttpHeader` and the case-insensitive header map it lives in.
//!
//! Grounded on spec section 9's redesign flag: "case-insensitive header map
//! built on a general map with linear lookup... use a dedicated
//! case-insensitive-keyed mapping to get O(1) lookup." This keys a regular
//! `HashMap` on a lowercased copy of the header name, storing the
//! originally-cased [`HttpHeader`] as the value, the same shape
//! `golem_common`'s various `*Id`-keyed maps take when the lookup key and
//! the display value differ.

use std::collections::HashMap;
use std::fmt;

/// One `Name: Value` header line. Name equality is case-insensitive; see
/// [`HeaderMap`] for the map that enforces that.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpHeader {
    name: String,
    value: String,
}

impl HttpHeader {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        HttpHeader {
            name: name.into(),
            value: value.into(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    /// Splits the value on commas, trimming surrounding whitespace from
    /// each group — the shape `Accept`, `Accept-Encoding`, `Connection`
    /// and other list-valued headers use.
    pub fn comma_groups(&self) -> Vec<&str> {
        self.value.split(',').map(str::trim).filter(|s| !s.is_empty()).collect()
    }

    /// Splits the value on semicolons, trimming surrounding whitespace —
    /// the shape `Content-Type`'s `charset=`/`boundary=` parameters and
    /// `Cookie` pairs use.
    pub fn semicolon_groups(&self) -> Vec<&str> {
        self.value.split(';').map(str::trim).filter(|s| !s.is_empty()).collect()
    }
}

impl fmt::Display for HttpHeader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.name, self.value)
    }
}

/// A case-insensitive-keyed map from header name to [`HttpHeader`].
/// Duplicate names coalesce by last-write-wins, per spec section 4.6.
#[derive(Debug, Clone, Default)]
pub struct HeaderMap {
    entries: HashMap<String, HttpHeader>,
}

impl HeaderMap {
    pub fn new() -> Self {
        HeaderMap { entries: HashMap::new() }
    }

    pub fn insert(&mut self, header: HttpHeader) {
        self.entries.insert(header.name().to_ascii_lowercase(), header);
    }

    pub fn get(&self, name: &str) -> Option<&HttpHeader> {
        self.entries.get(&name.to_ascii_lowercase())
    }

    pub fn get_value(&self, name: &str) -> Option<&str> {
        self.get(name).map(HttpHeader::value)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(&name.to_ascii_lowercase())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &HttpHeader> {
        self.entries.values()
    }
}
