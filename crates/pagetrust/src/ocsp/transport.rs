//! HTTP transport for OCSP (RFC 6960 appendix A)
//!
//! Small requests go out as GET with the base64 request in the path, which
//! lets intermediate HTTP caches serve repeat lookups; anything larger is
//! POSTed. The transport is a trait so the evaluator can be exercised
//! without a network.

use crate::config::OcspConfig;
use crate::error::TrustError;
use async_trait::async_trait;
use base64::Engine;
use std::time::Duration;

/// RFC 6960 A.1: GET is used when the base64 request fits in 255 bytes
const MAX_GET_REQUEST_LEN: usize = 255;

/// Fetches a DER-encoded OCSP response for a DER-encoded request
#[async_trait]
pub trait OcspTransport: Send + Sync {
    async fn fetch(&self, url: &str, request_der: &[u8]) -> Result<Vec<u8>, TrustError>;
}

/// reqwest-backed [`OcspTransport`]
#[derive(Debug)]
pub struct HttpTransport {
    client: reqwest::Client,
    max_response_size: usize,
}

impl HttpTransport {
    pub fn new(config: &OcspConfig) -> Result<Self, TrustError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.http_timeout_secs))
            .build()
            .map_err(|e| TrustError::Config(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            max_response_size: config.max_response_size_bytes,
        })
    }

    fn check_response(
        &self,
        status: reqwest::StatusCode,
        content_type: Option<&str>,
        body_len: usize,
    ) -> Result<(), TrustError> {
        if !status.is_success() {
            return Err(TrustError::OcspTransport(format!(
                "responder returned HTTP {}",
                status
            )));
        }

        if let Some(ct) = content_type {
            if !ct.contains("application/ocsp-response") {
                return Err(TrustError::OcspTransport(format!(
                    "unexpected content type: {}",
                    ct
                )));
            }
        }

        if body_len > self.max_response_size {
            return Err(TrustError::OcspTransport(format!(
                "response too large: {} bytes (max {})",
                body_len, self.max_response_size
            )));
        }

        Ok(())
    }
}

#[async_trait]
impl OcspTransport for HttpTransport {
    async fn fetch(&self, url: &str, request_der: &[u8]) -> Result<Vec<u8>, TrustError> {
        if !url.starts_with("http://") && !url.starts_with("https://") {
            return Err(TrustError::InvalidUrl(url.to_string()));
        }

        let encoded = encode_request_for_get(request_der);

        let response = if encoded.len() <= MAX_GET_REQUEST_LEN {
            let get_url = format!("{}/{}", url.trim_end_matches('/'), encoded);
            tracing::debug!(url = %url, "sending OCSP request via GET");
            self.client
                .get(&get_url)
                .header("Accept", "application/ocsp-response")
                .send()
                .await
        } else {
            tracing::debug!(url = %url, "sending OCSP request via POST");
            self.client
                .post(url)
                .header("Content-Type", "application/ocsp-request")
                .header("Accept", "application/ocsp-response")
                .body(request_der.to_vec())
                .send()
                .await
        }
        .map_err(|e| TrustError::OcspTransport(format!("request to {} failed: {}", url, e)))?;

        let status = response.status();
        let content_type = response
            .headers()
            .get("Content-Type")
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned);

        let body = response
            .bytes()
            .await
            .map_err(|e| TrustError::OcspTransport(format!("failed to read body: {}", e)))?;

        self.check_response(status, content_type.as_deref(), body.len())?;

        Ok(body.to_vec())
    }
}

/// Encode a request for the GET form: base64, then percent-escape the
/// characters base64 uses that are reserved in a URL path
fn encode_request_for_get(request_der: &[u8]) -> String {
    let b64 = base64::engine::general_purpose::STANDARD.encode(request_der);
    let mut out = String::with_capacity(b64.len());
    for c in b64.chars() {
        match c {
            '+' => out.push_str("%2B"),
            '/' => out.push_str("%2F"),
            '=' => out.push_str("%3D"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_encoding_escapes_reserved_characters() {
        // 0xFB 0xEF 0xFF encodes to "++//" padding-free patterns; use bytes
        // that exercise all three escapes
        let encoded = encode_request_for_get(&[0xFB, 0xEF]);
        assert_eq!(encoded, "%2B%2B8%3D");

        let encoded = encode_request_for_get(&[0xFF, 0xFF, 0xFF]);
        assert_eq!(encoded, "%2F%2F%2F%2F");
    }

    #[test]
    fn test_get_encoding_plain() {
        // "Man" is the classic base64 example with no reserved characters
        assert_eq!(encode_request_for_get(b"Man"), "TWFu");
    }

    #[test]
    fn test_rejects_non_http_url() {
        let transport = HttpTransport::new(&OcspConfig::default()).unwrap();
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        let result = rt.block_on(transport.fetch("ldap://ocsp.example.test", &[0x30]));
        assert!(matches!(result, Err(TrustError::InvalidUrl(_))));
    }

    #[test]
    fn test_response_checks() {
        let transport = HttpTransport::new(&OcspConfig {
            max_response_size_bytes: 10,
            ..OcspConfig::default()
        })
        .unwrap();

        assert!(transport
            .check_response(
                reqwest::StatusCode::OK,
                Some("application/ocsp-response"),
                5
            )
            .is_ok());

        assert!(matches!(
            transport.check_response(reqwest::StatusCode::NOT_FOUND, None, 0),
            Err(TrustError::OcspTransport(_))
        ));

        assert!(matches!(
            transport.check_response(reqwest::StatusCode::OK, Some("text/html"), 5),
            Err(TrustError::OcspTransport(_))
        ));

        assert!(matches!(
            transport.check_response(
                reqwest::StatusCode::OK,
                Some("application/ocsp-response"),
                11
            ),
            Err(TrustError::OcspTransport(_))
        ));
    }
}
