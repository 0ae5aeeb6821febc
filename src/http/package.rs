//! `HttpPackage`: the incremental header/body parser driven by
//! arbitrarily-fragmented byte arrivals.
//!
//! Grounded on spec section 4.6 and the redesign flag in section 9: "split
//! parser-private mutable state from public message state" (here, an
//! `Inner<K>` the public type locks behind one `Mutex`, rather than a class
//! whose fields are half public message data and half parser scratch
//! space) and "a correct rewrite must remember a trailing `\r` between
//! chunks" (the `pending_cr` flag below is exactly that fix — the one
//! concrete bug spec section 9 calls out as something a correct rewrite
//! must not reproduce).

use std::sync::Mutex;
use tracing::{debug, trace};

use crate::error::HttpError;
use crate::http::header::{HeaderMap, HttpHeader};

/// The scheme this package was received over. Spec section 4.6: "protocol
/// header emission (subclass-supplied) returns the literal token `"HTTP"`
/// or `"HTTPS"` in the final serialized first line."
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Protocol {
    Http,
    Https,
}

impl Protocol {
    pub fn token(&self) -> &'static str {
        match self {
            Protocol::Http => "HTTP",
            Protocol::Https => "HTTPS",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    Headers,
    Body,
    Complete,
}

/// The subtype-specific hooks spec section 3/4.6 calls out: `processFirstLine`
/// (method/URI/version for a request, version/status/reason for a
/// response) and `processBody` (typically a form/multipart/octet
/// pass-through). `trim_body` is the hook spec section 4.6 reserves for
/// transfer-encoding handling ("chunked, gzip") this parser itself never
/// performs.
pub trait HttpPackageKind: Send {
    fn process_first_line(&mut self, line: &str) -> Result<(), HttpError>;

    fn process_body(&mut self, _body: &[u8]) {}

    fn trim_body(&self, body: Vec<u8>) -> Vec<u8> {
        body
    }
}

struct Inner<K> {
    headers: HeaderMap,
    body: Vec<u8>,
    complete: bool,
    stage: Stage,
    accumulator: Vec<u8>,
    pending_cr: bool,
    lines: Vec<String>,
    start_line: Option<String>,
    parse_error: Option<HttpError>,
    kind: K,
}

/// An in-flight HTTP request or response, assembled incrementally from
/// byte chunks via [`HttpPackage::add_data`]. One instance per connection;
/// per spec section 4.6, `add_data` is serialized by an internal lock and
/// the parser is not reentrant.
pub struct HttpPackage<K: HttpPackageKind> {
    protocol: Protocol,
    inner: Mutex<Inner<K>>,
}

impl<K: HttpPackageKind> HttpPackage<K> {
    pub fn new(protocol: Protocol, kind: K) -> Self {
        HttpPackage {
            protocol,
            inner: Mutex::new(Inner {
                headers: HeaderMap::new(),
                body: Vec::new(),
                complete: false,
                stage: Stage::Headers,
                accumulator: Vec::new(),
                pending_cr: false,
                lines: Vec::new(),
                start_line: None,
                parse_error: None,
                kind,
            }),
        }
    }

    pub fn protocol(&self) -> Protocol {
        self.protocol
    }

    pub fn is_complete(&self) -> bool {
        self.lock().complete
    }

    /// Only populated once [`HttpPackage::is_complete`] is true — spec
    /// section 3's invariant: "headers are extractable only after
    /// completion".
    pub fn headers(&self) -> Option<HeaderMap> {
        let inner = self.lock();
        if inner.complete {
            Some(inner.headers.clone())
        } else {
            None
        }
    }

    pub fn body(&self) -> Option<Vec<u8>> {
        let inner = self.lock();
        if inner.complete {
            Some(inner.body.clone())
        } else {
            None
        }
    }

    /// A parse error recorded during assembly, if any. Per spec section
    /// 4.6/7, `add_data` never throws; a connection owner can inspect
    /// this to decide whether to abort.
    pub fn parse_error(&self) -> Option<HttpError> {
        self.lock().parse_error.clone()
    }

    /// Reads the subtype-specific parsed state (method/URI/version, or
    /// version/status/reason) under the instance lock.
    pub fn with_kind<R>(&self, f: impl FnOnce(&K) -> R) -> R {
        let inner = self.lock();
        f(&inner.kind)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner<K>> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Feeds another chunk of bytes. Chunks may split anywhere — mid-header,
    /// mid-CRLF, mid-body — the only durable state across calls is the
    /// internal accumulator. A no-op (diagnostically logged) once the
    /// package is already complete, per spec section 4.6.
    pub fn add_data(&self, data: &[u8]) {
        let mut inner = self.lock();
        if inner.complete {
            debug!("addData called on a completed HttpPackage, ignoring");
            return;
        }

        let mut i = 0;
        while i < data.len() {
            let byte = data[i];
            match inner.stage {
                Stage::Headers => {
                    if inner.pending_cr {
                        inner.pending_cr = false;
                        if byte == b'\n' {
                            let raw = std::mem::take(&mut inner.accumulator);
                            let line = String::from_utf8_lossy(&raw).into_owned();
                            if line.is_empty() {
                                finalize_headers(&mut inner);
                                inner.stage = Stage::Body;
                            } else {
                                inner.lines.push(line);
                            }
                            i += 1;
                            continue;
                        }
                        // A lone '\r' not followed by '\n': treat it as a
                        // literal byte in the line rather than a line end.
                        inner.accumulator.push(b'\r');
                    }
                    if byte == b'\r' {
                        inner.pending_cr = true;
                    } else {
                        inner.accumulator.push(byte);
                    }
                    i += 1;
                }
                Stage::Body => {
                    inner.body.push(byte);
                    i += 1;
                }
                Stage::Complete => break,
            }
        }

        if inner.stage == Stage::Body && body_done(&inner) {
            complete(&mut inner);
        }
    }
}

fn finalize_headers<K>(inner: &mut Inner<K>) {
    let mut lines = std::mem::take(&mut inner.lines).into_iter();
    inner.start_line = lines.next();
    for line in lines {
        match parse_header_line(&line) {
            Ok(header) => inner.headers.insert(header),
            Err(err) => {
                trace!(line = line, "malformed header line");
                inner.parse_error = Some(err);
            }
        }
    }
}

fn parse_header_line(line: &str) -> Result<HttpHeader, HttpError> {
    let idx = line.find(':').ok_or_else(|| HttpError::MissingColon(line.to_string()))?;
    let (name, rest) = line.split_at(idx);
    let value = rest[1..].trim();
    let name = name.trim();
    if name.is_empty() {
        return Err(HttpError::MalformedHeaderLine(line.to_string()));
    }
    Ok(HttpHeader::new(name, value))
}

fn body_done<K>(inner: &Inner<K>) -> bool {
    let declared = inner
        .headers
        .get_value("Content-Length")
        .and_then(|v| v.trim().parse::<usize>().ok())
        .unwrap_or(0);
    inner.body.len() >= declared
}

fn complete<K: HttpPackageKind>(inner: &mut Inner<K>) {
    if let Some(start_line) = inner.start_line.take() {
        if let Err(err) = inner.kind.process_first_line(&start_line) {
            inner.parse_error = Some(err);
        }
    }
    let trimmed = inner.kind.trim_body(std::mem::take(&mut inner.body));
    inner.kind.process_body(&trimmed);
    inner.body = trimmed;
    inner.accumulator.clear();
    inner.stage = Stage::Complete;
    inner.complete = true;
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_r::test;

    struct NoopKind;
    impl HttpPackageKind for NoopKind {
        fn process_first_line(&mut self, _line: &str) -> Result<(), HttpError> {
            Ok(())
        }
    }

    fn package() -> HttpPackage<NoopKind> {
        HttpPackage::new(Protocol::Http, NoopKind)
    }

    #[test]
    pub fn s1_split_header_arrival_one_byte_at_a_time() {
        let pkg = package();
        let message = b"GET /x HTTP/1.1\r\nHost: a\r\nContent-Length: 0\r\n\r\n";
        for byte in message {
            pkg.add_data(&[*byte]);
        }
        assert!(pkg.is_complete());
        assert_eq!(pkg.headers().unwrap().get_value("host"), Some("a"));
        assert_eq!(pkg.body().unwrap().len(), 0);
    }

    #[test]
    pub fn s2_body_straddles_chunk_boundary() {
        let pkg = package();
        pkg.add_data(b"POST /y HTTP/1.1\r\nContent-Length: 5\r\n\r\nhel");
        assert!(!pkg.is_complete());
        pkg.add_data(b"lo");
        assert!(pkg.is_complete());
        assert_eq!(pkg.body().unwrap(), b"hello".to_vec());
    }

    #[test]
    pub fn s3_overshoot_body_in_one_chunk() {
        let pkg = package();
        pkg.add_data(b"POST /z HTTP/1.1\r\nContent-Length: 3\r\n\r\nabcde");
        assert!(pkg.is_complete());
        assert!(pkg.body().unwrap().len() >= 3);
    }

    #[test]
    pub fn invariant_complete_is_stable_regardless_of_split_points() {
        let message: &[u8] = b"GET / HTTP/1.1\r\nContent-Length: 3\r\n\r\nxyz";
        for split in 0..message.len() {
            let pkg = package();
            pkg.add_data(&message[..split]);
            pkg.add_data(&message[split..]);
            assert!(pkg.is_complete(), "failed at split {split}");
            assert_eq!(pkg.body().unwrap(), b"xyz".to_vec());
        }
    }

    #[test]
    pub fn invariant_add_data_after_complete_is_a_no_op() {
        let pkg = package();
        pkg.add_data(b"GET / HTTP/1.1\r\nContent-Length: 0\r\n\r\n");
        assert!(pkg.is_complete());
        let body_before = pkg.body();
        let headers_before = pkg.headers().unwrap().len();
        pkg.add_data(b"more garbage bytes");
        assert_eq!(pkg.body(), body_before);
        assert_eq!(pkg.headers().unwrap().len(), headers_before);
    }

    #[test]
    pub fn trailing_cr_split_exactly_between_chunks_is_recognized() {
        let pkg = package();
        // The CRLF ending the blank line is split: '\r' in one chunk, '\n'
        // in the next. Spec section 9's explicitly-flagged bug: a correct
        // rewrite must remember this across `add_data` calls.
        pkg.add_data(b"GET / HTTP/1.1\r\nContent-Length: 0\r\n\r");
        assert!(!pkg.is_complete());
        pkg.add_data(b"\n");
        assert!(pkg.is_complete());
    }

    #[test]
    pub fn missing_content_length_completes_immediately() {
        let pkg = package();
        pkg.add_data(b"GET / HTTP/1.1\r\nHost: a\r\n\r\n");
        assert!(pkg.is_complete());
        assert_eq!(pkg.body().unwrap().len(), 0);
    }

    #[test]
    pub fn malformed_header_line_is_recorded_not_thrown() {
        let pkg = package();
        pkg.add_data(b"GET / HTTP/1.1\r\nnotaheader\r\nContent-Length: 0\r\n\r\n");
        assert!(pkg.is_complete());
        assert!(pkg.parse_error().is_some());
    }

    #[test]
    pub fn duplicate_header_names_coalesce_last_write_wins() {
        let pkg = package();
        pkg.add_data(b"GET / HTTP/1.1\r\nX-Tag: a\r\nX-Tag: b\r\nContent-Length: 0\r\n\r\n");
        assert!(pkg.is_complete());
        assert_eq!(pkg.headers().unwrap().get_value("x-tag"), Some("b"));
    }
}
