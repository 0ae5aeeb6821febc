//! HTTP package framing: the incremental header/body parser (spec section
//! 4.6) and its two concrete first-line interpretations.

pub mod header;
pub mod package;
pub mod request;
pub mod response;

pub use header::{HeaderMap, HttpHeader};
pub use package::{HttpPackage, HttpPackageKind, Protocol};
pub use request::HttpRequest;
pub use response::HttpResponse;
