//! OCSP revocation checking (RFC 6960)
//!
//! Request building, response parsing and the HTTP transport used to query
//! responders named in a certificate's Authority Information Access
//! extension.

pub mod request;
pub mod response;
pub mod transport;

pub use request::{build_chain_requests, OcspRequest, OcspRequestBuilder};
pub use response::{CertificateStatus, OcspResponse};
pub use transport::{HttpTransport, OcspTransport};
