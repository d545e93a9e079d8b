//! OCSP response parsing and validity checks (RFC 6960 section 4.2)
//!
//! The wire structures are decoded with the `x509-ocsp` crate; this module
//! reduces them to the single verdict the evaluator needs for one
//! certificate, plus the timestamps that drive freshness and cache TTL.

use crate::error::TrustError;
use chrono::{DateTime, TimeZone, Utc};
use const_oid::db::rfc6960::{ID_PKIX_OCSP_BASIC, ID_PKIX_OCSP_NONCE};
use der::Decode;
use std::time::Duration;
use x509_ocsp::{BasicOcspResponse, CertStatus, OcspResponseStatus};

/// Revocation status of one certificate as asserted by a responder
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CertificateStatus {
    /// Not revoked at thisUpdate
    Good,
    /// Revoked; the connection must be rejected
    Revoked {
        revocation_time: DateTime<Utc>,
        /// CRLReason code, if the responder included one
        reason: Option<u8>,
    },
    /// The responder has no record of the certificate
    Unknown,
}

/// A parsed OCSP response, reduced to the status of one target certificate
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OcspResponse {
    pub status: CertificateStatus,
    pub produced_at: DateTime<Utc>,
    pub this_update: DateTime<Utc>,
    pub next_update: Option<DateTime<Utc>>,
    /// Nonce echoed in the response extensions, if any
    pub nonce: Option<Vec<u8>>,
}

impl OcspResponse {
    /// Parse a DER-encoded OCSPResponse and extract the status for the
    /// certificate with the given serial number.
    ///
    /// Fails if the responder reported an error status, the response is not
    /// a BasicOCSPResponse, or no SingleResponse covers `serial`.
    pub fn parse(der_bytes: &[u8], serial: &[u8]) -> Result<Self, TrustError> {
        let outer = x509_ocsp::OcspResponse::from_der(der_bytes)
            .map_err(|e| TrustError::OcspResponse(format!("malformed response: {}", e)))?;

        if outer.response_status != OcspResponseStatus::Successful {
            return Err(TrustError::OcspResponse(format!(
                "responder returned {:?}",
                outer.response_status
            )));
        }

        let rb = outer
            .response_bytes
            .ok_or_else(|| TrustError::OcspResponse("successful response without responseBytes".to_string()))?;

        if rb.response_type != ID_PKIX_OCSP_BASIC {
            return Err(TrustError::OcspResponse(format!(
                "unsupported response type {}",
                rb.response_type
            )));
        }

        let basic = BasicOcspResponse::from_der(rb.response.as_bytes())
            .map_err(|e| TrustError::OcspResponse(format!("malformed BasicOCSPResponse: {}", e)))?;

        let produced_at = to_datetime(
            basic.tbs_response_data.produced_at.0.to_unix_duration().as_secs(),
        )?;

        let nonce = extract_nonce(&basic)?;

        // Find the SingleResponse for our certificate
        for sr in &basic.tbs_response_data.responses {
            if !serial_eq(sr.cert_id.serial_number.as_bytes(), serial) {
                continue;
            }

            let status = match &sr.cert_status {
                CertStatus::Good(_) => CertificateStatus::Good,
                CertStatus::Revoked(info) => CertificateStatus::Revoked {
                    revocation_time: to_datetime(
                        info.revocation_time.0.to_unix_duration().as_secs(),
                    )?,
                    reason: info.revocation_reason.map(|r| r as u8),
                },
                CertStatus::Unknown(_) => CertificateStatus::Unknown,
            };

            let this_update = to_datetime(sr.this_update.0.to_unix_duration().as_secs())?;
            let next_update = match &sr.next_update {
                Some(nu) => Some(to_datetime(nu.0.to_unix_duration().as_secs())?),
                None => None,
            };

            return Ok(Self {
                status,
                produced_at,
                this_update,
                next_update,
                nonce,
            });
        }

        Err(TrustError::OcspResponse(
            "no status for the requested certificate".to_string(),
        ))
    }

    /// True while the response is within its validity window at `now`
    pub fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        if now < self.this_update {
            return false;
        }
        match self.next_update {
            Some(next) => now < next,
            None => true,
        }
    }

    /// How long a verdict from this response may be cached: until nextUpdate,
    /// or `default` when the responder did not provide one
    pub fn cache_ttl(&self, now: DateTime<Utc>, default: Duration) -> Duration {
        self.next_update
            .and_then(|next| (next - now).to_std().ok())
            .unwrap_or(default)
    }

    pub fn is_revoked(&self) -> bool {
        matches!(self.status, CertificateStatus::Revoked { .. })
    }
}

/// Compare serial numbers ignoring leading zero padding
fn serial_eq(a: &[u8], b: &[u8]) -> bool {
    fn strip(s: &[u8]) -> &[u8] {
        let mut s = s;
        while s.len() > 1 && s[0] == 0 {
            s = &s[1..];
        }
        s
    }
    strip(a) == strip(b)
}

fn to_datetime(unix_secs: u64) -> Result<DateTime<Utc>, TrustError> {
    Utc.timestamp_opt(unix_secs as i64, 0)
        .single()
        .ok_or_else(|| TrustError::OcspResponse("timestamp out of range".to_string()))
}

fn extract_nonce(basic: &BasicOcspResponse) -> Result<Option<Vec<u8>>, TrustError> {
    let exts = match &basic.tbs_response_data.response_extensions {
        Some(exts) => exts,
        None => return Ok(None),
    };

    for ext in exts {
        if ext.extn_id != ID_PKIX_OCSP_NONCE {
            continue;
        }
        // extnValue wraps the nonce in an inner OCTET STRING
        let inner = der::asn1::OctetString::from_der(ext.extn_value.as_bytes())
            .map_err(|e| TrustError::OcspResponse(format!("malformed nonce extension: {}", e)))?;
        return Ok(Some(inner.as_bytes().to_vec()));
    }

    Ok(None)
}
