//! `HttpRequest`: first-line interpretation of method, target URI, and
//! version, layered on the generic [`HttpPackage`] parser.

use crate::error::HttpError;
use crate::http::header::HeaderMap;
use crate::http::package::{HttpPackage, HttpPackageKind, Protocol};

#[derive(Debug, Clone, Default)]
struct RequestLine {
    method: String,
    target: String,
    version: String,
}

#[derive(Default)]
struct RequestKind {
    line: Option<RequestLine>,
}

impl HttpPackageKind for RequestKind {
    fn process_first_line(&mut self, line: &str) -> Result<(), HttpError> {
        let mut parts = line.splitn(3, ' ');
        let method = parts.next().filter(|s| !s.is_empty());
        let target = parts.next().filter(|s| !s.is_empty());
        let (method, target) = match (method, target) {
            (Some(m), Some(t)) => (m, t),
            _ => return Err(HttpError::MalformedHeaderLine(line.to_string())),
        };
        let version = parts.next().unwrap_or("HTTP/1.1");
        self.line = Some(RequestLine {
            method: method.to_string(),
            target: target.to_string(),
            version: version.to_string(),
        });
        Ok(())
    }
}

/// An incrementally-assembled HTTP request. Spec section 3: "processFirstLine"
/// here splits `METHOD URI VERSION`.
pub struct HttpRequest(HttpPackage<RequestKind>);

impl HttpRequest {
    pub fn new(protocol: Protocol) -> Self {
        HttpRequest(HttpPackage::new(protocol, RequestKind::default()))
    }

    pub fn add_data(&self, data: &[u8]) {
        self.0.add_data(data)
    }

    pub fn is_complete(&self) -> bool {
        self.0.is_complete()
    }

    pub fn protocol(&self) -> Protocol {
        self.0.protocol()
    }

    pub fn headers(&self) -> Option<HeaderMap> {
        self.0.headers()
    }

    pub fn body(&self) -> Option<Vec<u8>> {
        self.0.body()
    }

    pub fn parse_error(&self) -> Option<HttpError> {
        self.0.parse_error()
    }

    pub fn method(&self) -> Option<String> {
        self.0.with_kind(|k| k.line.as_ref().map(|l| l.method.clone()))
    }

    pub fn target(&self) -> Option<String> {
        self.0.with_kind(|k| k.line.as_ref().map(|l| l.target.clone()))
    }

    pub fn http_version(&self) -> Option<String> {
        self.0.with_kind(|k| k.line.as_ref().map(|l| l.version.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_r::test;

    #[test]
    pub fn parses_method_target_and_version() {
        let req = HttpRequest::new(Protocol::Http);
        req.add_data(b"GET /x?y=1 HTTP/1.1\r\nHost: a\r\nContent-Length: 0\r\n\r\n");
        assert!(req.is_complete());
        assert_eq!(req.method().as_deref(), Some("GET"));
        assert_eq!(req.target().as_deref(), Some("/x?y=1"));
        assert_eq!(req.http_version().as_deref(), Some("HTTP/1.1"));
        assert_eq!(req.headers().unwrap().get_value("Host"), Some("a"));
    }

    #[test]
    pub fn malformed_start_line_is_recorded() {
        let req = HttpRequest::new(Protocol::Http);
        req.add_data(b"garbage\r\nContent-Length: 0\r\n\r\n");
        assert!(req.is_complete());
        assert!(req.parse_error().is_some());
        assert!(req.method().is_none());
    }
}
