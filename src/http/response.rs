//! `HttpResponse`: first-line interpretation of version, status, and
//! reason phrase, layered on the generic [`HttpPackage`] parser.

use crate::error::HttpError;
use crate::http::header::HeaderMap;
use crate::http::package::{HttpPackage, HttpPackageKind, Protocol};

#[derive(Debug, Clone, Default)]
struct StatusLine {
    version: String,
    status: u16,
    reason: String,
}

#[derive(Default)]
struct ResponseKind {
    line: Option<StatusLine>,
}

impl HttpPackageKind for ResponseKind {
    fn process_first_line(&mut self, line: &str) -> Result<(), HttpError> {
        let mut parts = line.splitn(3, ' ');
        let version = parts.next().filter(|s| !s.is_empty());
        let status = parts.next().filter(|s| !s.is_empty());
        let (version, status) = match (version, status) {
            (Some(v), Some(s)) => (v, s),
            _ => return Err(HttpError::MalformedHeaderLine(line.to_string())),
        };
        let status: u16 = status
            .parse()
            .map_err(|_| HttpError::MalformedHeaderLine(line.to_string()))?;
        let reason = parts.next().unwrap_or("").to_string();
        self.line = Some(StatusLine {
            version: version.to_string(),
            status,
            reason,
        });
        Ok(())
    }
}

/// An incrementally-assembled HTTP response. Spec section 3:
/// "processFirstLine" here splits `VERSION STATUS REASON`.
pub struct HttpResponse(HttpPackage<ResponseKind>);

impl HttpResponse {
    pub fn new(protocol: Protocol) -> Self {
        HttpResponse(HttpPackage::new(protocol, ResponseKind::default()))
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

    pub fn status(&self) -> Option<u16> {
        self.0.with_kind(|k| k.line.as_ref().map(|l| l.status))
    }

    pub fn reason(&self) -> Option<String> {
        self.0.with_kind(|k| k.line.as_ref().map(|l| l.reason.clone()))
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
    pub fn parses_version_status_and_reason() {
        let resp = HttpResponse::new(Protocol::Https);
        resp.add_data(b"HTTP/1.1 404 Not Found\r\nContent-Length: 0\r\n\r\n");
        assert!(resp.is_complete());
        assert_eq!(resp.status(), Some(404));
        assert_eq!(resp.reason().as_deref(), Some("Not Found"));
        assert_eq!(resp.protocol().token(), "HTTPS");
    }

    #[test]
    pub fn non_numeric_status_is_recorded_as_a_parse_error() {
        let resp = HttpResponse::new(Protocol::Http);
        resp.add_data(b"HTTP/1.1 OK Whatever\r\nContent-Length: 0\r\n\r\n");
        assert!(resp.is_complete());
        assert!(resp.parse_error().is_some());
        assert!(resp.status().is_none());
    }
}
